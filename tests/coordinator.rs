use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use techblog_ai::coordinator::{FeatureEvent, FeatureStage, ProgressSink};
use techblog_ai::{
    AiCoordinator, AiError, AiErrorKind, CategoryRecommendation, CategorySuggestions, Feature,
    FeatureFlags, FeatureInvoker, FeaturePayload, FeatureRequest, SeoMetadata, StyleUpgrade,
};

enum Behavior {
    Reply(Result<FeaturePayload, AiError>),
    Delayed(Duration, Result<FeaturePayload, AiError>),
    Panic,
}

struct ScriptedInvoker {
    behaviors: HashMap<Feature, Behavior>,
    calls: Mutex<Vec<Feature>>,
}

impl ScriptedInvoker {
    fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with(mut self, feature: Feature, behavior: Behavior) -> Self {
        self.behaviors.insert(feature, behavior);
        self
    }

    fn calls(&self) -> Vec<Feature> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeatureInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        feature: Feature,
        _request: FeatureRequest,
    ) -> Result<FeaturePayload, AiError> {
        self.calls.lock().unwrap().push(feature);
        match self.behaviors.get(&feature) {
            Some(Behavior::Reply(result)) => result.clone(),
            Some(Behavior::Delayed(delay, result)) => {
                tokio::time::sleep(*delay).await;
                result.clone()
            }
            Some(Behavior::Panic) => panic!("invoker exploded"),
            None => Err(AiError::Unknown("no behavior scripted".to_string())),
        }
    }
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<FeatureEvent>>,
}

impl ProgressSink for RecordingProgress {
    fn on_event(&self, event: FeatureEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn styling_payload() -> FeaturePayload {
    FeaturePayload::Styling(StyleUpgrade {
        enhanced_content: "# Improved".to_string(),
        changes: vec!["Tightened intro".to_string()],
        readability: None,
        readability_fallback: false,
    })
}

fn seo_payload() -> FeaturePayload {
    FeaturePayload::Seo(SeoMetadata {
        meta_title: "Async Rust".to_string(),
        meta_description: "A tour of async Rust.".to_string(),
        keywords: vec!["rust".to_string()],
        slug: "async-rust".to_string(),
    })
}

fn categories_payload() -> FeaturePayload {
    FeaturePayload::Categories(CategorySuggestions {
        recommendations: vec![CategoryRecommendation::new("rust", 0.9)],
    })
}

const TITLE: &str = "Async Rust";
const CONTENT: &str = "Futures are lazy state machines driven by an executor.";

#[tokio::test]
async fn one_failure_does_not_abort_the_others() {
    let invoker = ScriptedInvoker::new()
        .with(
            Feature::Styling,
            Behavior::Reply(Err(AiError::QuotaExceeded("quota exceeded".to_string()))),
        )
        .with(Feature::Seo, Behavior::Reply(Ok(seo_payload())))
        .with(Feature::Categories, Behavior::Reply(Ok(categories_payload())));
    let coordinator = AiCoordinator::new(Arc::new(invoker));

    let result = coordinator
        .process(TITLE, CONTENT, FeatureFlags::default())
        .await;

    let styling = result.styling.as_ref().expect("styling attempted");
    assert!(!styling.is_success());
    assert_eq!(styling.error_message(), Some("quota exceeded"));
    assert_eq!(styling.error().map(AiError::kind), Some(AiErrorKind::QuotaExceeded));
    assert!(result.seo.as_ref().expect("seo attempted").is_success());
    assert!(result
        .categories
        .as_ref()
        .expect("categories attempted")
        .is_success());
    assert!(!result.overall_success);
    assert_eq!(result.failed_features(), vec![Feature::Styling]);
}

#[tokio::test]
async fn disabled_features_are_not_called_and_do_not_count() {
    let invoker = Arc::new(
        ScriptedInvoker::new()
            .with(
                Feature::Styling,
                Behavior::Reply(Err(AiError::Network("down".to_string()))),
            )
            .with(Feature::Seo, Behavior::Reply(Ok(seo_payload()))),
    );
    let coordinator = AiCoordinator::new(invoker.clone());

    let result = coordinator
        .process(TITLE, CONTENT, FeatureFlags::only(Feature::Seo))
        .await;

    assert!(result.overall_success);
    assert!(result.styling.is_none());
    assert!(result.categories.is_none());
    assert!(result.seo.expect("seo").is_success());
    assert_eq!(invoker.calls(), vec![Feature::Seo]);
}

#[tokio::test]
async fn all_failures_are_reported_per_feature() {
    let invoker = ScriptedInvoker::new()
        .with(
            Feature::Styling,
            Behavior::Reply(Err(AiError::Timeout("styling timed out".to_string()))),
        )
        .with(
            Feature::Seo,
            Behavior::Reply(Err(AiError::Auth("bad key".to_string()))),
        )
        .with(
            Feature::Categories,
            Behavior::Reply(Err(AiError::ContentRejected("unsafe".to_string()))),
        );
    let coordinator = AiCoordinator::new(Arc::new(invoker));

    let result = coordinator
        .process(TITLE, CONTENT, FeatureFlags::default())
        .await;

    assert!(!result.overall_success);
    assert_eq!(
        result.styling.as_ref().and_then(|o| o.error_message()),
        Some("styling timed out")
    );
    assert_eq!(result.seo.as_ref().and_then(|o| o.error_message()), Some("bad key"));
    assert_eq!(
        result.categories.as_ref().and_then(|o| o.error_message()),
        Some("unsafe")
    );
}

#[tokio::test]
async fn features_run_concurrently() {
    let delay = Duration::from_millis(200);
    let invoker = ScriptedInvoker::new()
        .with(Feature::Styling, Behavior::Delayed(delay, Ok(styling_payload())))
        .with(Feature::Seo, Behavior::Delayed(delay, Ok(seo_payload())))
        .with(
            Feature::Categories,
            Behavior::Delayed(delay, Ok(categories_payload())),
        );
    let coordinator = AiCoordinator::new(Arc::new(invoker));

    let started = std::time::Instant::now();
    let result = coordinator
        .process(TITLE, CONTENT, FeatureFlags::default())
        .await;

    assert!(result.overall_success);
    assert!(started.elapsed() < delay * 3);
}

#[tokio::test]
async fn slow_failure_does_not_block_fast_success() {
    let invoker = ScriptedInvoker::new()
        .with(
            Feature::Styling,
            Behavior::Delayed(
                Duration::from_millis(50),
                Err(AiError::Network("reset".to_string())),
            ),
        )
        .with(Feature::Seo, Behavior::Reply(Ok(seo_payload())));
    let coordinator = AiCoordinator::new(Arc::new(invoker));

    let flags = FeatureFlags {
        enable_styling: true,
        enable_seo: true,
        enable_categories: false,
    };
    let before = chrono::Utc::now();
    let result = coordinator.process(TITLE, CONTENT, flags).await;

    assert!(result.seo.as_ref().expect("seo").is_success());
    assert_eq!(
        result.styling.as_ref().and_then(|o| o.error_message()),
        Some("reset")
    );
    assert!(result.timestamp >= before);
}

#[tokio::test]
async fn panicking_feature_becomes_a_failure() {
    let invoker = ScriptedInvoker::new()
        .with(Feature::Styling, Behavior::Panic)
        .with(Feature::Seo, Behavior::Reply(Ok(seo_payload())))
        .with(Feature::Categories, Behavior::Reply(Ok(categories_payload())));
    let coordinator = AiCoordinator::new(Arc::new(invoker));

    let result = coordinator
        .process(TITLE, CONTENT, FeatureFlags::default())
        .await;

    let styling = result.styling.as_ref().expect("styling");
    assert_eq!(styling.error().map(AiError::kind), Some(AiErrorKind::Unknown));
    assert!(result.seo.as_ref().expect("seo").is_success());
    assert!(!result.overall_success);
}

#[tokio::test]
async fn mismatched_payload_is_a_failure() {
    let invoker = ScriptedInvoker::new().with(Feature::Seo, Behavior::Reply(Ok(styling_payload())));
    let coordinator = AiCoordinator::new(Arc::new(invoker));

    let result = coordinator
        .process(TITLE, CONTENT, FeatureFlags::only(Feature::Seo))
        .await;

    let seo = result.seo.expect("seo");
    assert_eq!(seo.error().map(AiError::kind), Some(AiErrorKind::InvalidResponse));
    assert!(!result.overall_success);
}

#[tokio::test]
async fn progress_events_cover_each_attempted_feature() {
    let invoker = ScriptedInvoker::new()
        .with(Feature::Seo, Behavior::Reply(Ok(seo_payload())))
        .with(
            Feature::Categories,
            Behavior::Reply(Err(AiError::Unknown("boom".to_string()))),
        );
    let coordinator = AiCoordinator::new(Arc::new(invoker));
    let progress = Arc::new(RecordingProgress::default());

    let flags = FeatureFlags {
        enable_styling: false,
        enable_seo: true,
        enable_categories: true,
    };
    coordinator
        .process_with(FeatureRequest::new(TITLE, CONTENT), flags, progress.clone())
        .await;

    let events = progress.events.lock().unwrap().clone();
    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|event| event.feature != Feature::Styling));
    assert!(events
        .iter()
        .any(|event| event.feature == Feature::Seo && event.stage == FeatureStage::Succeeded));
    assert!(events.iter().any(|event| event.feature == Feature::Categories
        && event.stage == FeatureStage::Failed
        && event.message == "boom"));
}

#[tokio::test]
async fn result_serializes_with_success_flags() {
    let invoker = ScriptedInvoker::new()
        .with(
            Feature::Styling,
            Behavior::Reply(Err(AiError::QuotaExceeded("quota exceeded".to_string()))),
        )
        .with(Feature::Seo, Behavior::Reply(Ok(seo_payload())));
    let coordinator = AiCoordinator::new(Arc::new(invoker));
    let flags = FeatureFlags {
        enable_styling: true,
        enable_seo: true,
        enable_categories: false,
    };

    let result = coordinator.process(TITLE, CONTENT, flags).await;
    let json = serde_json::to_value(&result).expect("json");

    assert_eq!(json["styling"]["success"], false);
    assert_eq!(json["styling"]["error"], "quota exceeded");
    assert_eq!(json["styling"]["kind"], "quota_exceeded");
    assert_eq!(json["seo"]["success"], true);
    assert_eq!(json["seo"]["data"]["slug"], "async-rust");
    assert!(json.get("categories").is_none());
    assert_eq!(json["overall_success"], false);
}
