use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::CategoryRecommendation;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Persists category tags for a post.
#[async_trait]
pub trait CategoryTagStore: Send + Sync {
    async fn apply_category_tags(
        &self,
        post_id: &str,
        tags: &[CategoryRecommendation],
    ) -> anyhow::Result<()>;
}

/// Recommendations strictly above `threshold`; one exactly at the threshold is
/// left out.
pub fn filter_confident(
    recommendations: &[CategoryRecommendation],
    threshold: f64,
) -> Vec<CategoryRecommendation> {
    recommendations
        .iter()
        .filter(|rec| rec.confidence > threshold)
        .cloned()
        .collect()
}

/// First recommendation whose confidence lies outside [0, 1]. NaN counts as
/// outside.
pub fn invalid_confidence(
    recommendations: &[CategoryRecommendation],
) -> Option<&CategoryRecommendation> {
    recommendations
        .iter()
        .find(|rec| !(0.0..=1.0).contains(&rec.confidence))
}

#[derive(Clone)]
pub struct CategoryApplier {
    store: Arc<dyn CategoryTagStore>,
}

impl CategoryApplier {
    pub fn new(store: Arc<dyn CategoryTagStore>) -> Self {
        Self { store }
    }

    /// Tags the post with every confident recommendation. Nothing to apply
    /// counts as success; a store failure is reported as `false`.
    pub async fn apply_if_confident(
        &self,
        post_id: &str,
        recommendations: &[CategoryRecommendation],
        threshold: f64,
    ) -> bool {
        let confident = filter_confident(recommendations, threshold);
        if confident.is_empty() {
            info!(post_id, threshold, "no confident category recommendations to apply");
            return true;
        }

        match self.store.apply_category_tags(post_id, &confident).await {
            Ok(()) => {
                info!(post_id, applied = confident.len(), "applied category tags");
                true
            }
            Err(err) => {
                warn!(post_id, error = %err, "failed to apply category tags");
                false
            }
        }
    }
}
