use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::apply::CategoryTagStore;
use crate::CategoryRecommendation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedTag {
    pub category_id: String,
    pub confidence: f64,
    pub applied_at: DateTime<Utc>,
}

/// Post id -> applied category tags, kept in a single JSON file.
pub struct JsonTagStore {
    path: PathBuf,
    tags: Mutex<BTreeMap<String, Vec<AppliedTag>>>,
}

impl JsonTagStore {
    pub async fn load(path: PathBuf) -> anyhow::Result<Self> {
        let tags = if path.exists() {
            let data = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read tag store {}", path.display()))?;
            if data.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&data)
                    .with_context(|| format!("failed to parse tag store {}", path.display()))?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            tags: Mutex::new(tags),
        })
    }

    pub async fn tags_for(&self, post_id: &str) -> Vec<AppliedTag> {
        let guard = self.tags.lock().await;
        guard.get(post_id).cloned().unwrap_or_default()
    }

    async fn persist(&self, tags: &BTreeMap<String, Vec<AppliedTag>>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent).await?;
        }
        let payload = serde_json::to_string_pretty(tags).context("failed to serialize tags")?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, payload)
            .await
            .context("failed to write tag store")?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .context("failed to finalize tag store")?;
        Ok(())
    }
}

#[async_trait]
impl CategoryTagStore for JsonTagStore {
    async fn apply_category_tags(
        &self,
        post_id: &str,
        tags: &[CategoryRecommendation],
    ) -> anyhow::Result<()> {
        let mut guard = self.tags.lock().await;
        let mut updated = guard.clone();
        let now = Utc::now();
        let entry = updated.entry(post_id.to_string()).or_default();
        for tag in tags {
            entry.retain(|existing| existing.category_id != tag.category_id);
            entry.push(AppliedTag {
                category_id: tag.category_id.clone(),
                confidence: tag.confidence,
                applied_at: now,
            });
        }
        // Only keep the change in memory once it is on disk.
        self.persist(&updated).await?;
        *guard = updated;
        Ok(())
    }
}

async fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    if path.as_os_str().is_empty() || path.exists() {
        return Ok(());
    }
    tokio::fs::create_dir_all(path)
        .await
        .context("failed to create tag store dir")
}
