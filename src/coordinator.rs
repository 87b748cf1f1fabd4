//! Fans the enabled AI features out concurrently and settles all of them.
//!
//! One feature failing never cancels or hides another: every attempted feature
//! ends up as a [`FeatureOutcome`] keyed by feature, whatever order they
//! finish in. Nothing is retried here.

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::AiError;
use crate::invoker::{FeatureInvoker, FeaturePayload, FeatureRequest};
use crate::{CategorySuggestions, Feature, SeoMetadata, StyleUpgrade};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub enable_styling: bool,
    pub enable_seo: bool,
    pub enable_categories: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_styling: true,
            enable_seo: true,
            enable_categories: true,
        }
    }
}

impl FeatureFlags {
    pub fn none() -> Self {
        Self {
            enable_styling: false,
            enable_seo: false,
            enable_categories: false,
        }
    }

    pub fn only(feature: Feature) -> Self {
        let mut flags = Self::none();
        match feature {
            Feature::Styling => flags.enable_styling = true,
            Feature::Seo => flags.enable_seo = true,
            Feature::Categories => flags.enable_categories = true,
        }
        flags
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::Styling => self.enable_styling,
            Feature::Seo => self.enable_seo,
            Feature::Categories => self.enable_categories,
        }
    }

    pub fn any(&self) -> bool {
        self.enable_styling || self.enable_seo || self.enable_categories
    }
}

/// Result of one feature call: exactly one of data or error.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureOutcome<T> {
    Success(T),
    Failure(AiError),
}

impl<T> FeatureOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, FeatureOutcome::Success(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            FeatureOutcome::Success(data) => Some(data),
            FeatureOutcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&AiError> {
        match self {
            FeatureOutcome::Success(_) => None,
            FeatureOutcome::Failure(err) => Some(err),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error().map(AiError::message)
    }
}

impl<T: Serialize> Serialize for FeatureOutcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FeatureOutcome::Success(data) => {
                let mut state = serializer.serialize_struct("FeatureOutcome", 2)?;
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
                state.end()
            }
            FeatureOutcome::Failure(err) => {
                let mut state = serializer.serialize_struct("FeatureOutcome", 3)?;
                state.serialize_field("success", &false)?;
                state.serialize_field("error", err.message())?;
                state.serialize_field("kind", &err.kind())?;
                state.end()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrationResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub styling: Option<FeatureOutcome<StyleUpgrade>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seo: Option<FeatureOutcome<SeoMetadata>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<FeatureOutcome<CategorySuggestions>>,
    pub overall_success: bool,
    pub timestamp: DateTime<Utc>,
}

impl IntegrationResult {
    pub fn failed_features(&self) -> Vec<Feature> {
        let mut failed = Vec::new();
        if matches!(self.styling, Some(FeatureOutcome::Failure(_))) {
            failed.push(Feature::Styling);
        }
        if matches!(self.seo, Some(FeatureOutcome::Failure(_))) {
            failed.push(Feature::Seo);
        }
        if matches!(self.categories, Some(FeatureOutcome::Failure(_))) {
            failed.push(Feature::Categories);
        }
        failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStage {
    Started,
    Succeeded,
    Failed,
}

impl FeatureStage {
    pub fn label(self) -> &'static str {
        match self {
            FeatureStage::Started => "started",
            FeatureStage::Succeeded => "succeeded",
            FeatureStage::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureEvent {
    pub feature: Feature,
    pub stage: FeatureStage,
    pub message: String,
}

/// Observer for per-feature progress while a request is in flight.
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: FeatureEvent);
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_event(&self, _event: FeatureEvent) {}
}

#[derive(Clone)]
pub struct AiCoordinator {
    invoker: Arc<dyn FeatureInvoker>,
}

impl AiCoordinator {
    pub fn new(invoker: Arc<dyn FeatureInvoker>) -> Self {
        Self { invoker }
    }

    pub async fn process(&self, title: &str, content: &str, flags: FeatureFlags) -> IntegrationResult {
        self.process_with(FeatureRequest::new(title, content), flags, Arc::new(NoProgress))
            .await
    }

    pub async fn process_with(
        &self,
        request: FeatureRequest,
        flags: FeatureFlags,
        progress: Arc<dyn ProgressSink>,
    ) -> IntegrationResult {
        info!(
            styling = flags.enable_styling,
            seo = flags.enable_seo,
            categories = flags.enable_categories,
            "processing AI enhancement"
        );

        let styling = self.dispatch(flags, Feature::Styling, &request, &progress);
        let seo = self.dispatch(flags, Feature::Seo, &request, &progress);
        let categories = self.dispatch(flags, Feature::Categories, &request, &progress);

        let (styling, seo, categories) =
            tokio::join!(settle(styling), settle(seo), settle(categories));

        let styling = styling.map(|result| outcome(result, Feature::Styling, as_styling));
        let seo = seo.map(|result| outcome(result, Feature::Seo, as_seo));
        let categories = categories.map(|result| outcome(result, Feature::Categories, as_categories));

        let overall_success = styling.as_ref().map_or(true, FeatureOutcome::is_success)
            && seo.as_ref().map_or(true, FeatureOutcome::is_success)
            && categories.as_ref().map_or(true, FeatureOutcome::is_success);

        let result = IntegrationResult {
            styling,
            seo,
            categories,
            overall_success,
            timestamp: Utc::now(),
        };
        info!(
            overall_success,
            failed = ?result.failed_features(),
            "AI enhancement settled"
        );
        result
    }

    fn dispatch(
        &self,
        flags: FeatureFlags,
        feature: Feature,
        request: &FeatureRequest,
        progress: &Arc<dyn ProgressSink>,
    ) -> Option<JoinHandle<Result<FeaturePayload, AiError>>> {
        if !flags.is_enabled(feature) {
            return None;
        }
        let invoker = Arc::clone(&self.invoker);
        let progress = Arc::clone(progress);
        let request = request.clone();

        Some(tokio::spawn(async move {
            progress.on_event(FeatureEvent {
                feature,
                stage: FeatureStage::Started,
                message: format!("{} started", feature.label()),
            });
            let result = invoker.invoke(feature, request).await;
            match &result {
                Ok(_) => progress.on_event(FeatureEvent {
                    feature,
                    stage: FeatureStage::Succeeded,
                    message: format!("{} finished", feature.label()),
                }),
                Err(err) => {
                    warn!(
                        feature = feature.label(),
                        kind = err.kind().label(),
                        error = %err,
                        "AI feature failed"
                    );
                    progress.on_event(FeatureEvent {
                        feature,
                        stage: FeatureStage::Failed,
                        message: err.message().to_string(),
                    });
                }
            }
            result
        }))
    }
}

/// Waits for a dispatched feature; a panicked task becomes a failure.
async fn settle(
    handle: Option<JoinHandle<Result<FeaturePayload, AiError>>>,
) -> Option<Result<FeaturePayload, AiError>> {
    let handle = handle?;
    Some(match handle.await {
        Ok(result) => result,
        Err(err) => Err(AiError::Unknown(format!("feature task aborted: {}", err))),
    })
}

fn outcome<T>(
    result: Result<FeaturePayload, AiError>,
    feature: Feature,
    extract: fn(FeaturePayload) -> Option<T>,
) -> FeatureOutcome<T> {
    match result {
        Ok(payload) => match extract(payload) {
            Some(data) => FeatureOutcome::Success(data),
            None => FeatureOutcome::Failure(AiError::InvalidResponse(format!(
                "{} returned a payload for another feature",
                feature.label()
            ))),
        },
        Err(err) => FeatureOutcome::Failure(err),
    }
}

fn as_styling(payload: FeaturePayload) -> Option<StyleUpgrade> {
    match payload {
        FeaturePayload::Styling(data) => Some(data),
        _ => None,
    }
}

fn as_seo(payload: FeaturePayload) -> Option<SeoMetadata> {
    match payload {
        FeaturePayload::Seo(data) => Some(data),
        _ => None,
    }
}

fn as_categories(payload: FeaturePayload) -> Option<CategorySuggestions> {
    match payload {
        FeaturePayload::Categories(data) => Some(data),
        _ => None,
    }
}
