use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::CategoryDef;
use crate::error::AiError;
use crate::llm::ChatModel;
use crate::normalize::{
    default_score, parse_category_recommendations, parse_score, parse_seo_metadata,
    parse_style_upgrade,
};
use crate::prompts::{build_prompt, PromptKind};
use crate::template::{TemplateValue, TemplateVars};
use crate::{
    CategorySuggestions, ContentType, Feature, ScoreBreakdown, SeoMetadata, StyleUpgrade,
};

const DEFAULT_MAX_KEYWORDS: usize = 8;
const DEFAULT_MAX_CATEGORIES: usize = 3;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureOptions {
    pub tone: Option<String>,
    pub target_audience: Option<String>,
    pub focus_keywords: Vec<String>,
    pub max_keywords: Option<usize>,
    pub categories: Option<Vec<CategoryDef>>,
    pub max_categories: Option<usize>,
}

impl FeatureOptions {
    /// Uses `max` unless the caller already chose a limit.
    pub fn default_max_categories(&mut self, max: usize) {
        self.max_categories.get_or_insert(max);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRequest {
    pub title: Option<String>,
    pub content: String,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub options: FeatureOptions,
}

impl FeatureRequest {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: content.into(),
            content_type: ContentType::default(),
            options: FeatureOptions::default(),
        }
    }

    /// Base prompt variables shared by every feature.
    fn vars(&self) -> TemplateVars {
        let mut vars = TemplateVars::new()
            .with("content", self.content.as_str())
            .with("content_type", self.content_type.label());
        if let Some(title) = self.title.clone().or_else(|| first_heading(&self.content)) {
            vars.set("title", title);
        }
        if let Some(tone) = self.options.tone.as_deref() {
            vars.set("tone", tone);
        }
        if let Some(audience) = self.options.target_audience.as_deref() {
            vars.set("target_audience", audience);
        }
        vars
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeaturePayload {
    Styling(StyleUpgrade),
    Seo(SeoMetadata),
    Categories(CategorySuggestions),
}

/// Boundary to whatever actually runs an AI feature.
#[async_trait]
pub trait FeatureInvoker: Send + Sync {
    async fn invoke(&self, feature: Feature, request: FeatureRequest)
        -> Result<FeaturePayload, AiError>;
}

/// Runs features against a chat model using the prompt registry.
pub struct LlmFeatureInvoker<M> {
    model: M,
    catalog: Vec<CategoryDef>,
}

impl<M: ChatModel> LlmFeatureInvoker<M> {
    pub fn new(model: M, catalog: Vec<CategoryDef>) -> Self {
        Self { model, catalog }
    }

    async fn run(&self, kind: PromptKind, vars: &TemplateVars) -> Result<String, AiError> {
        let prompt = build_prompt(kind, vars)?;
        self.model.complete(&prompt).await
    }

    pub async fn style_upgrade(&self, request: &FeatureRequest) -> Result<StyleUpgrade, AiError> {
        let raw = self.run(PromptKind::StyleUpgrade, &request.vars()).await?;
        let mut upgrade = parse_style_upgrade(&raw)?;

        let score_vars = TemplateVars::new()
            .with("content", upgrade.enhanced_content.as_str())
            .with("content_type", request.content_type.label());
        let score = match self.run(PromptKind::Readability, &score_vars).await {
            Ok(raw) => parse_score(&raw),
            Err(err) => {
                warn!(kind = err.kind().label(), error = %err, "readability scoring failed");
                None
            }
        };
        upgrade.readability_fallback = score.is_none();
        upgrade.readability = Some(score.unwrap_or_else(default_score));
        Ok(upgrade)
    }

    /// Scores a post as-is.
    pub async fn readability(
        &self,
        content: &str,
        content_type: ContentType,
    ) -> Result<Option<ScoreBreakdown>, AiError> {
        let vars = TemplateVars::new()
            .with("content", content)
            .with("content_type", content_type.label());
        let raw = self.run(PromptKind::Readability, &vars).await?;
        Ok(parse_score(&raw))
    }

    pub async fn seo(&self, request: &FeatureRequest) -> Result<SeoMetadata, AiError> {
        let mut vars = request.vars();
        let max_keywords = request.options.max_keywords.unwrap_or(DEFAULT_MAX_KEYWORDS);
        vars.set("max_keywords", max_keywords);

        let kind = if request.options.focus_keywords.is_empty() {
            PromptKind::Seo
        } else {
            vars.set("focus_keywords", to_json(&request.options.focus_keywords)?);
            PromptKind::SeoFocused
        };

        let raw = self.run(kind, &vars).await?;
        parse_seo_metadata(&raw, max_keywords)
    }

    pub async fn categories(&self, request: &FeatureRequest) -> Result<CategorySuggestions, AiError> {
        let catalog = request.options.categories.as_ref().unwrap_or(&self.catalog);
        let max_categories = request
            .options
            .max_categories
            .unwrap_or(DEFAULT_MAX_CATEGORIES);

        let mut vars = request.vars();
        vars.set("categories", to_json(catalog)?);
        vars.set("max_categories", max_categories);

        let raw = self.run(PromptKind::Categories, &vars).await?;
        let known_ids: Vec<String> = catalog.iter().map(|category| category.id.clone()).collect();
        parse_category_recommendations(&raw, &known_ids, max_categories)
    }
}

#[async_trait]
impl<M: ChatModel> FeatureInvoker for LlmFeatureInvoker<M> {
    async fn invoke(
        &self,
        feature: Feature,
        request: FeatureRequest,
    ) -> Result<FeaturePayload, AiError> {
        info!(feature = feature.label(), "invoking AI feature");
        match feature {
            Feature::Styling => self.style_upgrade(&request).await.map(FeaturePayload::Styling),
            Feature::Seo => self.seo(&request).await.map(FeaturePayload::Seo),
            Feature::Categories => self
                .categories(&request)
                .await
                .map(FeaturePayload::Categories),
        }
    }
}

/// Falls back to the post's first markdown heading when no title was given.
fn first_heading(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|heading| !heading.is_empty())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<TemplateValue, AiError> {
    serde_json::to_string(value)
        .map(TemplateValue::Text)
        .map_err(|err| AiError::InvalidRequest(format!("failed to encode prompt variable: {}", err)))
}
