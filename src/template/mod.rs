//! `{{name}}` placeholder templates used to build AI prompts.
//!
//! Substitution is fail-soft: a placeholder with no value is left in the
//! output verbatim and reported, never turned into an error. The prompt goes
//! to a best-effort model endpoint, not a strict parser.

pub mod validate;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::warn;

pub use validate::{validate, InvalidVariable, ValidationReport};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("unterminated placeholder at byte {offset}")]
    Unterminated { offset: usize },

    #[error("nested placeholder opening at byte {offset}")]
    Nested { offset: usize },

    #[error("unmatched placeholder close at byte {offset}")]
    UnmatchedClose { offset: usize },
}

/// An immutable prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    text: Cow<'static, str>,
}

impl Template {
    pub const fn from_static(text: &'static str) -> Self {
        Self {
            text: Cow::Borrowed(text),
        }
    }

    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Cow::Owned(text.into()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Rejects templates whose `{{` openings are never closed or are opened
    /// again before closing, and `}}` closings with no opening.
    pub fn check(&self) -> Result<(), TemplateError> {
        let text = self.as_str();
        let mut cursor = 0;
        while let Some(found) = text[cursor..].find(OPEN) {
            let offset = cursor + found;
            if let Some(stray) = text[cursor..offset].find(CLOSE) {
                return Err(TemplateError::UnmatchedClose {
                    offset: cursor + stray,
                });
            }
            let body_start = offset + OPEN.len();
            let Some(close) = text[body_start..].find(CLOSE) else {
                return Err(TemplateError::Unterminated { offset });
            };
            if text[body_start..body_start + close].contains(OPEN) {
                return Err(TemplateError::Nested { offset });
            }
            cursor = body_start + close + CLOSE.len();
        }
        match text[cursor..].find(CLOSE) {
            Some(stray) => Err(TemplateError::UnmatchedClose {
                offset: cursor + stray,
            }),
            None => Ok(()),
        }
    }

    pub fn placeholders(&self) -> BTreeSet<String> {
        extract_placeholders(self.as_str())
    }

    pub fn render(&self, vars: &TemplateVars) -> Substitution {
        substitute_checked(self.as_str(), vars)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A primitive value bound to a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl TemplateValue {
    pub fn render(&self) -> String {
        match self {
            TemplateValue::Text(text) => text.clone(),
            TemplateValue::Bool(value) => value.to_string(),
            TemplateValue::Number(value) => format_number(*value),
        }
    }
}

impl From<&str> for TemplateValue {
    fn from(value: &str) -> Self {
        TemplateValue::Text(value.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(value: String) -> Self {
        TemplateValue::Text(value)
    }
}

impl From<f64> for TemplateValue {
    fn from(value: f64) -> Self {
        TemplateValue::Number(value)
    }
}

impl From<i64> for TemplateValue {
    fn from(value: i64) -> Self {
        TemplateValue::Number(value as f64)
    }
}

impl From<usize> for TemplateValue {
    fn from(value: usize) -> Self {
        TemplateValue::Number(value as f64)
    }
}

impl From<bool> for TemplateValue {
    fn from(value: bool) -> Self {
        TemplateValue::Bool(value)
    }
}

/// Per-request placeholder values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateVars {
    values: BTreeMap<String, TemplateValue>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<TemplateValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<TemplateValue>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&TemplateValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Fills in every default the caller did not set.
    pub fn merge_defaults(&mut self, defaults: &TemplateVars) {
        for (name, value) in &defaults.values {
            self.values
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

/// Outcome of a substitution pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Substitution {
    Substituted(String),
    Partial { text: String, missing: Vec<String> },
}

impl Substitution {
    pub fn text(&self) -> &str {
        match self {
            Substitution::Substituted(text) => text,
            Substitution::Partial { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Substitution::Substituted(text) => text,
            Substitution::Partial { text, .. } => text,
        }
    }

    pub fn missing(&self) -> &[String] {
        match self {
            Substitution::Substituted(_) => &[],
            Substitution::Partial { missing, .. } => missing,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Substitution::Substituted(_))
    }
}

/// Replaces every `{{name}}` that has a value; unknown placeholders pass
/// through untouched with a warning.
pub fn substitute(template: &str, vars: &TemplateVars) -> String {
    substitute_checked(template, vars).into_text()
}

pub fn substitute_checked(template: &str, vars: &TemplateVars) -> Substitution {
    let mut output = String::with_capacity(template.len());
    let mut missing: Vec<String> = Vec::new();

    for segment in segments(template) {
        match segment {
            Segment::Literal(text) => output.push_str(text),
            Segment::Placeholder { name, raw } => match vars.get(name) {
                Some(value) => output.push_str(&value.render()),
                None => {
                    output.push_str(raw);
                    if !missing.iter().any(|seen| seen == name) {
                        warn!(placeholder = name, "template variable missing, left unsubstituted");
                        missing.push(name.to_string());
                    }
                }
            },
        }
    }

    if missing.is_empty() {
        Substitution::Substituted(output)
    } else {
        Substitution::Partial {
            text: output,
            missing,
        }
    }
}

/// Every distinct placeholder name referenced by `template`.
pub fn extract_placeholders(template: &str) -> BTreeSet<String> {
    segments(template)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder { name, .. } => Some(name.to_string()),
            Segment::Literal(_) => None,
        })
        .collect()
}

pub fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

enum Segment<'a> {
    Literal(&'a str),
    Placeholder { name: &'a str, raw: &'a str },
}

fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find(OPEN) {
        let body = &rest[open + OPEN.len()..];
        match body.find(CLOSE) {
            Some(close) if is_placeholder_name(&body[..close]) => {
                if open > 0 {
                    out.push(Segment::Literal(&rest[..open]));
                }
                let end = open + OPEN.len() + close + CLOSE.len();
                out.push(Segment::Placeholder {
                    name: &body[..close],
                    raw: &rest[open..end],
                });
                rest = &rest[end..];
            }
            _ => {
                out.push(Segment::Literal(&rest[..open + OPEN.len()]));
                rest = body;
            }
        }
    }

    if !rest.is_empty() {
        out.push(Segment::Literal(rest));
    }
    out
}

fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
