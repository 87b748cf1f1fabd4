use serde::{Deserialize, Serialize};
use techblog_ai::store::AppliedTag;
use techblog_ai::{
    CategoryRecommendation, ContentType, FeatureFlags, FeatureOptions, FeatureRequest,
    IntegrationResult, ScoreBreakdown,
};

#[derive(Debug, Deserialize)]
pub struct ApiEnhanceRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub content_type: Option<String>,
    pub request_id: Option<String>,
    pub enable_styling: Option<bool>,
    pub enable_seo: Option<bool>,
    pub enable_categories: Option<bool>,
    pub options: Option<FeatureOptions>,
    pub post_id: Option<String>,
    pub apply_categories: Option<bool>,
    pub threshold: Option<f64>,
}

/// Apply settings carried alongside an enhancement request.
pub struct ApplyTarget {
    pub post_id: String,
    pub threshold: Option<f64>,
}

impl ApiEnhanceRequest {
    pub fn into_parts(self) -> Result<(FeatureRequest, FeatureFlags, Option<ApplyTarget>), String> {
        let content = self.content.unwrap_or_default().trim().to_string();
        if content.is_empty() {
            return Err("content is required".to_string());
        }

        let mut request = FeatureRequest::new(String::new(), content);
        request.title = self
            .title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty());
        if let Some(content_type) = self.content_type.as_deref() {
            request.content_type = ContentType::from_str(content_type)
                .ok_or_else(|| format!("invalid content type: {}", content_type))?;
        }
        if let Some(options) = self.options {
            request.options = options;
        }

        let mut flags = FeatureFlags::default();
        if let Some(value) = self.enable_styling {
            flags.enable_styling = value;
        }
        if let Some(value) = self.enable_seo {
            flags.enable_seo = value;
        }
        if let Some(value) = self.enable_categories {
            flags.enable_categories = value;
        }
        if !flags.any() {
            return Err("at least one feature must be enabled".to_string());
        }

        if let Some(threshold) = self.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(format!("threshold must be within 0..1: {}", threshold));
            }
        }

        let apply = match (self.apply_categories.unwrap_or(false), self.post_id) {
            (true, Some(post_id)) if !post_id.trim().is_empty() => Some(ApplyTarget {
                post_id,
                threshold: self.threshold,
            }),
            (true, _) => return Err("post_id is required to apply categories".to_string()),
            (false, _) => None,
        };

        Ok((request, flags, apply))
    }
}

#[derive(Debug, Serialize)]
pub struct ApiEnhanceResponse {
    pub request_id: String,
    #[serde(flatten)]
    pub result: IntegrationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories_applied: Option<bool>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiReadabilityRequest {
    pub content: Option<String>,
    pub content_type: Option<String>,
}

impl ApiReadabilityRequest {
    pub fn into_input(self) -> Result<(String, ContentType), String> {
        let content = self.content.unwrap_or_default().trim().to_string();
        if content.is_empty() {
            return Err("content is required".to_string());
        }
        let content_type = match self.content_type.as_deref() {
            Some(value) => ContentType::from_str(value)
                .ok_or_else(|| format!("invalid content type: {}", value))?,
            None => ContentType::default(),
        };
        Ok((content, content_type))
    }
}

#[derive(Debug, Serialize)]
pub struct ApiReadabilityResponse {
    pub score: ScoreBreakdown,
    pub fallback: bool,
}

#[derive(Debug, Deserialize)]
pub struct ApiApplyRequest {
    pub recommendations: Vec<CategoryRecommendation>,
    pub threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ApiApplyResponse {
    pub success: bool,
    pub applied: Vec<CategoryRecommendation>,
}

#[derive(Debug, Serialize)]
pub struct ApiTagsResponse {
    pub post_id: String,
    pub tags: Vec<AppliedTag>,
}
