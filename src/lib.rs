pub mod apply;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod invoker;
pub mod llm;
pub mod normalize;
pub mod prompts;
pub mod store;
pub mod template;

use serde::{Deserialize, Serialize};

pub use apply::{
    filter_confident, invalid_confidence, CategoryApplier, CategoryTagStore,
    DEFAULT_CONFIDENCE_THRESHOLD,
};
pub use coordinator::{AiCoordinator, FeatureFlags, FeatureOutcome, IntegrationResult};
pub use error::{AiError, AiErrorKind};
pub use invoker::{FeatureInvoker, FeatureOptions, FeaturePayload, FeatureRequest, LlmFeatureInvoker};
pub use normalize::{default_score, parse_score};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Styling,
    Seo,
    Categories,
}

impl Feature {
    pub fn label(self) -> &'static str {
        match self {
            Feature::Styling => "styling",
            Feature::Seo => "seo",
            Feature::Categories => "categories",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Markdown,
    Html,
    PlainText,
}

impl ContentType {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "markdown" | "md" => Some(ContentType::Markdown),
            "html" | "htm" => Some(ContentType::Html),
            "text" | "plain" | "plain_text" | "txt" => Some(ContentType::PlainText),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ContentType::Markdown => "markdown",
            ContentType::Html => "html",
            ContentType::PlainText => "plain text",
        }
    }
}

/// Readability sub-scores, each in [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub heading_structure: f64,
    pub paragraph_length: f64,
    pub code_quality: f64,
    pub clarity: f64,
    pub overall: f64,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleUpgrade {
    pub enhanced_content: String,
    pub changes: Vec<String>,
    pub readability: Option<ScoreBreakdown>,
    /// Set when `readability` holds the neutral default instead of a model score.
    pub readability_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoMetadata {
    pub meta_title: String,
    pub meta_description: String,
    pub keywords: Vec<String>,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecommendation {
    pub category_id: String,
    /// In [0, 1].
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CategoryRecommendation {
    pub fn new(category_id: impl Into<String>, confidence: f64) -> Self {
        Self {
            category_id: category_id.into(),
            confidence,
            reason: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorySuggestions {
    pub recommendations: Vec<CategoryRecommendation>,
}

pub fn format_score(value: f64) -> String {
    format!("{:.0}", value)
}

pub fn format_confidence(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}
