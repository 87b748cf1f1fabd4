use serde::Serialize;

use super::{extract_placeholders, TemplateValue, TemplateVars};
use crate::error::AiError;

const CONTENT_LEN: (usize, usize) = (10, 50_000);
const TITLE_LEN: (usize, usize) = (3, 100);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidVariable {
    pub variable: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub missing_variables: Vec<String>,
    pub invalid_variables: Vec<InvalidVariable>,
}

impl ValidationReport {
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing_variables.is_empty() {
            parts.push(format!("missing: {}", self.missing_variables.join(", ")));
        }
        for invalid in &self.invalid_variables {
            parts.push(format!("{}: {}", invalid.variable, invalid.reason));
        }
        parts.join("; ")
    }

    pub fn into_result(self) -> Result<(), AiError> {
        if self.is_valid {
            Ok(())
        } else {
            Err(AiError::InvalidRequest(format!(
                "invalid prompt variables ({})",
                self.summary()
            )))
        }
    }
}

/// Checks that `vars` covers every placeholder in `template` with a usable
/// value. Problems are reported, never raised.
pub fn validate(template: &str, vars: &TemplateVars) -> ValidationReport {
    let mut missing_variables = Vec::new();
    let mut invalid_variables = Vec::new();

    for name in extract_placeholders(template) {
        match vars.get(&name) {
            None => missing_variables.push(name),
            Some(value) => {
                if let Some(reason) = check_variable(&name, value) {
                    invalid_variables.push(InvalidVariable {
                        variable: name,
                        reason,
                    });
                }
            }
        }
    }

    ValidationReport {
        is_valid: missing_variables.is_empty() && invalid_variables.is_empty(),
        missing_variables,
        invalid_variables,
    }
}

fn check_variable(name: &str, value: &TemplateValue) -> Option<String> {
    let rendered = value.render();
    if rendered.trim().is_empty() {
        return Some("value must not be empty".to_string());
    }

    let lowered = name.to_lowercase();
    if name == "content" {
        return check_length(&rendered, CONTENT_LEN);
    }
    if name == "title" {
        return check_length(&rendered, TITLE_LEN);
    }
    // Counts such as max_keywords are not lists.
    if matches!(value, TemplateValue::Number(_)) {
        return None;
    }
    if lowered.contains("keyword") {
        return check_json_array(&rendered, false);
    }
    if lowered.contains("categor") {
        return check_json_array(&rendered, true);
    }
    None
}

fn check_length(value: &str, (min, max): (usize, usize)) -> Option<String> {
    let len = value.chars().count();
    if len < min || len > max {
        Some(format!(
            "length must be between {} and {} characters (got {})",
            min, max, len
        ))
    } else {
        None
    }
}

fn check_json_array(value: &str, allow_empty: bool) -> Option<String> {
    match serde_json::from_str::<serde_json::Value>(value) {
        Ok(serde_json::Value::Array(items)) => {
            if items.is_empty() && !allow_empty {
                Some("array must not be empty".to_string())
            } else {
                None
            }
        }
        Ok(_) => Some("value must be a JSON array".to_string()),
        Err(err) => Some(format!("value is not valid JSON: {}", err)),
    }
}
