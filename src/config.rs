use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::apply::DEFAULT_CONFIDENCE_THRESHOLD;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub temperature: f64,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            timeout_ms: 60_000,
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryConfig {
    pub confidence_threshold: f64,
    pub max_recommendations: usize,
    pub catalog: Vec<CategoryDef>,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            max_recommendations: 3,
            catalog: default_catalog(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/category_tags.json"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ai: AiConfig,
    pub categories: CategoryConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    pub fn load(path: Option<PathBuf>) -> Result<(Self, Option<PathBuf>), String> {
        let config_path = path.or_else(default_config_path);
        let mut config = match config_path.as_ref() {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(path)
                    .map_err(|err| format!("failed to read config: {}", err))?;
                Self::from_toml(&contents)?
            }
            _ => AppConfig::default(),
        };

        config.apply_env_overrides();
        Ok((config, config_path))
    }

    pub fn from_toml(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|err| format!("failed to parse config: {}", err))
    }

    pub fn write(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| format!("failed to create config dir: {}", err))?;
        }
        let payload = toml::to_string_pretty(self)
            .map_err(|err| format!("failed to serialize config: {}", err))?;
        std::fs::write(path, payload).map_err(|err| format!("failed to write config: {}", err))?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = env::var("AI_API_KEY") {
            if !key.trim().is_empty() {
                self.ai.api_key = Some(key);
            }
        }
        if let Ok(base) = env::var("AI_API_BASE") {
            if !base.trim().is_empty() {
                self.ai.api_base = base;
            }
        }
        if let Ok(model) = env::var("AI_MODEL") {
            if !model.trim().is_empty() {
                self.ai.model = model;
            }
        }
        if let Ok(timeout) = env::var("AI_TIMEOUT_MS") {
            if let Ok(value) = timeout.parse::<u64>() {
                self.ai.timeout_ms = value;
            }
        }
        if let Ok(retries) = env::var("AI_MAX_RETRIES") {
            if let Ok(value) = retries.parse::<u32>() {
                self.ai.max_retries = value;
            }
        }
        if let Ok(threshold) = env::var("CATEGORY_CONFIDENCE_THRESHOLD") {
            if let Ok(value) = threshold.parse::<f64>() {
                self.categories.confidence_threshold = value.clamp(0.0, 1.0);
            }
        }
        if let Ok(path) = env::var("TAG_STORE_PATH") {
            if !path.trim().is_empty() {
                self.store.path = PathBuf::from(path);
            }
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    env::var("TECHBLOG_AI_CONFIG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| Some(PathBuf::from("config/techblog-ai.toml")))
}

fn default_catalog() -> Vec<CategoryDef> {
    [
        ("rust", "Rust", "The Rust language, its ecosystem and tooling"),
        ("web", "Web Development", "Frontend and backend web engineering"),
        ("devops", "DevOps", "Deployment, CI/CD, containers and infrastructure"),
        ("databases", "Databases", "Data modelling, SQL and storage engines"),
        ("ai", "AI & ML", "Machine learning and language model applications"),
        ("career", "Career", "Working as a software engineer"),
    ]
    .into_iter()
    .map(|(id, name, description)| CategoryDef {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
    })
    .collect()
}
