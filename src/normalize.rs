//! Turns free-form model output into bounded, typed payloads.
//!
//! Models wrap JSON in prose, invent fields and drift outside the ranges they
//! were asked for. Nothing here trusts the response: objects are located with a
//! bracket-depth scan, scores are clamped and optional lists default to empty.

use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::error::AiError;
use crate::{CategoryRecommendation, CategorySuggestions, ScoreBreakdown, SeoMetadata, StyleUpgrade};

pub const META_TITLE_MAX: usize = 60;
pub const META_DESCRIPTION_MAX: usize = 160;
pub const DEFAULT_SCORE: f64 = 70.0;
pub const FALLBACK_SUGGESTION: &str =
    "AI readability analysis could not run; showing neutral default scores.";

/// Source field -> breakdown field for readability scores.
const SCORE_FIELDS: [&str; 5] = [
    "title_structure",
    "paragraph_length",
    "code_quality",
    "technical_clarity",
    "overall_score",
];

/// Returns the first top-level balanced `{...}` span in `text`.
///
/// Braces inside JSON string literals are ignored, so a `}` in a quoted value
/// does not end the object early.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.max(0.0).min(100.0)
}

pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.max(0.0).min(1.0)
}

/// Parses a readability score response. `None` means the caller decides what
/// to show; no default is substituted here.
pub fn parse_score(raw: &str) -> Option<ScoreBreakdown> {
    let object = parse_object(raw).ok()?;

    let mut values = [0.0f64; SCORE_FIELDS.len()];
    for (slot, field) in values.iter_mut().zip(SCORE_FIELDS) {
        *slot = clamp_score(object.get(field)?.as_f64()?);
    }
    let [heading_structure, paragraph_length, code_quality, clarity, overall] = values;

    Some(ScoreBreakdown {
        heading_structure,
        paragraph_length,
        code_quality,
        clarity,
        overall,
        suggestions: string_list(object.get("suggestions")),
    })
}

pub fn default_score() -> ScoreBreakdown {
    ScoreBreakdown {
        heading_structure: DEFAULT_SCORE,
        paragraph_length: DEFAULT_SCORE,
        code_quality: DEFAULT_SCORE,
        clarity: DEFAULT_SCORE,
        overall: DEFAULT_SCORE,
        suggestions: vec![FALLBACK_SUGGESTION.to_string()],
    }
}

/// Parses the style-upgrade response. The readability score is attached later
/// by the caller.
pub fn parse_style_upgrade(raw: &str) -> Result<StyleUpgrade, AiError> {
    let object = parse_object(raw)?;
    let enhanced_content = non_empty_string(object.get("enhanced_content")).ok_or_else(|| {
        AiError::InvalidResponse("style upgrade response missing enhanced_content".to_string())
    })?;

    Ok(StyleUpgrade {
        enhanced_content,
        changes: string_list(object.get("changes")),
        readability: None,
        readability_fallback: false,
    })
}

pub fn parse_seo_metadata(raw: &str, max_keywords: usize) -> Result<SeoMetadata, AiError> {
    let object = parse_object(raw)?;
    let meta_title = non_empty_string(object.get("meta_title"))
        .ok_or_else(|| AiError::InvalidResponse("SEO response missing meta_title".to_string()))?;
    let meta_description = non_empty_string(object.get("meta_description")).ok_or_else(|| {
        AiError::InvalidResponse("SEO response missing meta_description".to_string())
    })?;

    let mut seen = HashSet::new();
    let keywords = string_list(object.get("keywords"))
        .into_iter()
        .filter(|keyword| seen.insert(keyword.to_lowercase()))
        .take(max_keywords)
        .collect();

    let slug = non_empty_string(object.get("slug"))
        .map(|slug| slugify(&slug))
        .filter(|slug| !slug.is_empty())
        .unwrap_or_else(|| slugify(&meta_title));

    Ok(SeoMetadata {
        meta_title: truncate_chars(&meta_title, META_TITLE_MAX),
        meta_description: truncate_chars(&meta_description, META_DESCRIPTION_MAX),
        keywords,
        slug,
    })
}

/// Parses category recommendations, keeping only ids from `known_ids` when it
/// is non-empty.
pub fn parse_category_recommendations(
    raw: &str,
    known_ids: &[String],
    max_categories: usize,
) -> Result<CategorySuggestions, AiError> {
    let object = parse_object(raw)?;
    let entries = object
        .get("recommendations")
        .or_else(|| object.get("categories"))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            AiError::InvalidResponse("category response missing recommendations".to_string())
        })?;

    let mut seen = HashSet::new();
    let mut recommendations: Vec<CategoryRecommendation> = entries
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|entry| {
            let category_id = non_empty_string(entry.get("category_id").or_else(|| entry.get("id")))?;
            let confidence = clamp_confidence(entry.get("confidence")?.as_f64()?);
            Some(CategoryRecommendation {
                category_id,
                confidence,
                reason: non_empty_string(entry.get("reason")),
            })
        })
        .filter(|rec| known_ids.is_empty() || known_ids.iter().any(|id| id == &rec.category_id))
        .filter(|rec| seen.insert(rec.category_id.clone()))
        .collect();

    recommendations.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    recommendations.truncate(max_categories);

    Ok(CategorySuggestions { recommendations })
}

fn parse_object(raw: &str) -> Result<Map<String, Value>, AiError> {
    let json = extract_json_object(raw)
        .ok_or_else(|| AiError::InvalidResponse("AI response missing JSON".to_string()))?;
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(AiError::InvalidResponse(
            "AI response JSON is not an object".to_string(),
        )),
        Err(err) => Err(AiError::InvalidResponse(format!(
            "AI JSON parse failed: {}",
            err
        ))),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn truncate_chars(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    value.chars().take(max).collect::<String>().trim_end().to_string()
}

pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
