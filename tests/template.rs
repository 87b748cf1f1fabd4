use std::collections::BTreeSet;
use techblog_ai::template::{
    extract_placeholders, substitute, substitute_checked, validate, Substitution, Template,
    TemplateError, TemplateVars,
};

fn names(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn substitute_replaces_every_occurrence() {
    let vars = TemplateVars::new().with("x", "value");
    let output = substitute("{{x}} and {{x}} and again {{x}}", &vars);

    assert_eq!(output, "value and value and again value");
    assert!(!output.contains("{{x}}"));
}

#[test]
fn substitute_leaves_missing_placeholder_in_place() {
    let vars = TemplateVars::new().with("title", "Ownership in Rust");
    let output = substitute("# {{title}}\n{{missingName}}", &vars);

    assert_eq!(output, "# Ownership in Rust\n{{missingName}}");
}

#[test]
fn substitute_checked_reports_missing_names_once() {
    let vars = TemplateVars::new().with("a", 1i64);
    let result = substitute_checked("{{a}} {{b}} {{b}} {{c}}", &vars);

    match result {
        Substitution::Partial { text, missing } => {
            assert_eq!(text, "1 {{b}} {{b}} {{c}}");
            assert_eq!(missing, vec!["b".to_string(), "c".to_string()]);
        }
        other => panic!("expected partial substitution, got {:?}", other),
    }
}

#[test]
fn substitute_checked_complete_when_all_present() {
    let vars = TemplateVars::new().with("n", 8usize).with("flag", true).with("ratio", 0.5);
    let result = substitute_checked("{{n}}/{{flag}}/{{ratio}}", &vars);

    assert!(result.is_complete());
    assert_eq!(result.text(), "8/true/0.5");
    assert!(result.missing().is_empty());
}

#[test]
fn template_without_placeholders_is_unchanged() {
    let text = "Plain prompt with a JSON example: {\"a\": 1}";
    assert_eq!(substitute(text, &TemplateVars::new()), text);
    assert!(extract_placeholders(text).is_empty());
}

#[test]
fn non_identifier_braces_pass_through() {
    let vars = TemplateVars::new().with("name", "x");
    let text = "{{not a name}} {{with-dash}} {{}} {{name}}";

    assert_eq!(substitute(text, &vars), "{{not a name}} {{with-dash}} {{}} x");
    assert_eq!(extract_placeholders(text), names(&["name"]));
}

#[test]
fn extract_placeholders_returns_distinct_names() {
    let found = extract_placeholders("{{c}} {{a}} text {{b}} {{a}}");
    assert_eq!(found, names(&["a", "b", "c"]));
}

#[test]
fn check_detects_unbalanced_delimiters() {
    assert!(Template::new("{{a}} and {{b}}").check().is_ok());
    assert_eq!(
        Template::new("start {{open").check(),
        Err(TemplateError::Unterminated { offset: 6 })
    );
    assert_eq!(
        Template::new("{{a {{b}}").check(),
        Err(TemplateError::Nested { offset: 0 })
    );
    assert_eq!(
        Template::new("Score it }} now").check(),
        Err(TemplateError::UnmatchedClose { offset: 9 })
    );
    assert_eq!(
        Template::new("{{a}} and b}}").check(),
        Err(TemplateError::UnmatchedClose { offset: 11 })
    );
    assert_eq!(
        Template::new("x}} {{a}}").check(),
        Err(TemplateError::UnmatchedClose { offset: 1 })
    );
}

#[test]
fn merge_defaults_keeps_caller_values() {
    let defaults = TemplateVars::new().with("tone", "professional").with("max", 3usize);
    let mut vars = TemplateVars::new().with("tone", "casual");
    vars.merge_defaults(&defaults);

    assert_eq!(substitute("{{tone}} {{max}}", &vars), "casual 3");
}

#[test]
fn validate_reports_missing_variables() {
    let report = validate("{{title}} {{content}}", &TemplateVars::new().with("title", "Hello"));

    assert!(!report.is_valid);
    assert_eq!(report.missing_variables, vec!["content".to_string()]);
    assert!(report.invalid_variables.is_empty());
}

#[test]
fn validate_applies_length_rules() {
    let vars = TemplateVars::new()
        .with("title", "Hi")
        .with("content", "too short");
    let report = validate("{{title}} {{content}}", &vars);

    let invalid: Vec<&str> = report
        .invalid_variables
        .iter()
        .map(|entry| entry.variable.as_str())
        .collect();
    assert!(!report.is_valid);
    assert_eq!(invalid, vec!["content", "title"]);

    let long_title = "t".repeat(101);
    let report = validate("{{title}}", &TemplateVars::new().with("title", long_title));
    assert!(!report.is_valid);

    let report = validate(
        "{{title}} {{content}}",
        &TemplateVars::new()
            .with("title", "Lifetimes")
            .with("content", "Lifetimes describe how long references stay valid."),
    );
    assert!(report.is_valid);
}

#[test]
fn validate_rejects_blank_values() {
    let report = validate("{{tone}}", &TemplateVars::new().with("tone", "   "));
    assert!(!report.is_valid);
    assert_eq!(report.invalid_variables[0].variable, "tone");
}

#[test]
fn validate_checks_json_array_fields() {
    let template = "{{keywords}} {{categories}}";

    let ok = TemplateVars::new()
        .with("keywords", r#"["rust","async"]"#)
        .with("categories", "[]");
    assert!(validate(template, &ok).is_valid);

    let empty_keywords = TemplateVars::new()
        .with("keywords", "[]")
        .with("categories", "[]");
    let report = validate(template, &empty_keywords);
    assert_eq!(report.invalid_variables.len(), 1);
    assert_eq!(report.invalid_variables[0].variable, "keywords");

    let not_array = TemplateVars::new()
        .with("keywords", r#"{"a":1}"#)
        .with("categories", "not json");
    let report = validate(template, &not_array);
    assert_eq!(report.invalid_variables.len(), 2);
    assert!(report.invalid_variables.iter().all(|entry| !entry.reason.is_empty()));
}

#[test]
fn validation_report_converts_to_invalid_request() {
    let report = validate("{{content}}", &TemplateVars::new());
    let err = report.into_result().unwrap_err();

    assert_eq!(err.kind(), techblog_ai::AiErrorKind::InvalidRequest);
    assert!(err.to_string().contains("missing: content"));
}

#[test]
fn numeric_counts_are_not_treated_as_lists() {
    let vars = TemplateVars::new()
        .with("max_keywords", 8usize)
        .with("max_categories", 3usize);
    assert!(validate("{{max_keywords}} {{max_categories}}", &vars).is_valid);
}
