use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use techblog_ai::store::JsonTagStore;
use techblog_ai::{
    filter_confident, invalid_confidence, CategoryApplier, CategoryRecommendation,
    CategoryTagStore, DEFAULT_CONFIDENCE_THRESHOLD,
};

#[derive(Default)]
struct RecordingStore {
    fail: bool,
    calls: Mutex<Vec<(String, Vec<CategoryRecommendation>)>>,
}

#[async_trait]
impl CategoryTagStore for RecordingStore {
    async fn apply_category_tags(
        &self,
        post_id: &str,
        tags: &[CategoryRecommendation],
    ) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((post_id.to_string(), tags.to_vec()));
        if self.fail {
            anyhow::bail!("database unavailable");
        }
        Ok(())
    }
}

fn boundary_recommendations() -> Vec<CategoryRecommendation> {
    vec![
        CategoryRecommendation::new("A", 0.8),
        CategoryRecommendation::new("B", 0.7),
        CategoryRecommendation::new("C", 0.69),
    ]
}

#[test]
fn threshold_comparison_is_strict() {
    let filtered = filter_confident(&boundary_recommendations(), 0.7);
    assert_eq!(filtered, vec![CategoryRecommendation::new("A", 0.8)]);
}

#[test]
fn confidence_outside_unit_range_is_flagged() {
    let body = r#"[{"category_id": "web", "confidence": 0.9}, {"category_id": "rust", "confidence": 7.5}]"#;
    let recommendations: Vec<CategoryRecommendation> =
        serde_json::from_str(body).expect("recommendations");

    let invalid = invalid_confidence(&recommendations).expect("out of range");
    assert_eq!(invalid.category_id, "rust");
    assert_eq!(invalid.confidence, 7.5);

    assert!(invalid_confidence(&[CategoryRecommendation::new("ai", -0.1)]).is_some());
    assert!(invalid_confidence(&[CategoryRecommendation::new("ai", f64::NAN)]).is_some());
    assert!(invalid_confidence(&[
        CategoryRecommendation::new("ai", 0.0),
        CategoryRecommendation::new("web", 1.0),
    ])
    .is_none());
    assert!(invalid_confidence(&[]).is_none());
}

#[tokio::test]
async fn applies_only_confident_recommendations() {
    let store = Arc::new(RecordingStore::default());
    let applier = CategoryApplier::new(store.clone());

    let applied = applier
        .apply_if_confident("post-1", &boundary_recommendations(), DEFAULT_CONFIDENCE_THRESHOLD)
        .await;

    assert!(applied);
    let calls = store.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "post-1");
    assert_eq!(calls[0].1, vec![CategoryRecommendation::new("A", 0.8)]);
}

#[tokio::test]
async fn nothing_confident_succeeds_without_store_call() {
    let store = Arc::new(RecordingStore {
        fail: true,
        ..Default::default()
    });
    let applier = CategoryApplier::new(store.clone());
    let recommendations = vec![
        CategoryRecommendation::new("web", 0.3),
        CategoryRecommendation::new("ai", 0.7),
    ];

    assert!(applier.apply_if_confident("post-2", &recommendations, 0.7).await);
    assert!(applier.apply_if_confident("post-2", &[], 0.7).await);
    assert!(store.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn store_failure_is_reported_as_false() {
    let store = Arc::new(RecordingStore {
        fail: true,
        ..Default::default()
    });
    let applier = CategoryApplier::new(store.clone());

    let applied = applier
        .apply_if_confident("post-3", &[CategoryRecommendation::new("rust", 0.95)], 0.7)
        .await;

    assert!(!applied);
    assert_eq!(store.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn json_store_persists_and_replaces_tags() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("tags.json");

    let store = JsonTagStore::load(path.clone()).await.expect("load");
    store
        .apply_category_tags(
            "post-1",
            &[
                CategoryRecommendation::new("rust", 0.8),
                CategoryRecommendation::new("web", 0.75),
            ],
        )
        .await
        .expect("apply");
    store
        .apply_category_tags("post-1", &[CategoryRecommendation::new("rust", 0.95)])
        .await
        .expect("reapply");

    let reloaded = JsonTagStore::load(path).await.expect("reload");
    let tags = reloaded.tags_for("post-1").await;
    let mut summary: Vec<(String, f64)> = tags
        .iter()
        .map(|tag| (tag.category_id.clone(), tag.confidence))
        .collect();
    summary.sort_by(|a, b| a.0.cmp(&b.0));

    assert_eq!(
        summary,
        vec![("rust".to_string(), 0.95), ("web".to_string(), 0.75)]
    );
    assert!(reloaded.tags_for("post-2").await.is_empty());
}

#[tokio::test]
async fn applier_works_with_json_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(
        JsonTagStore::load(dir.path().join("tags.json"))
            .await
            .expect("load"),
    );
    let applier = CategoryApplier::new(store.clone());

    assert!(
        applier
            .apply_if_confident("post-9", &boundary_recommendations(), 0.7)
            .await
    );
    let tags = store.tags_for("post-9").await;
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].category_id, "A");
}
