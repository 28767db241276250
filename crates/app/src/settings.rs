use anyhow::Context;
use idscan_core::{ExtractionConfig, ExtractionSettings};
use idscan_ocr::PoolConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "idscan.toml";

/// Contents of `idscan.toml`. Every section and key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppSettings {
    pub extraction: ExtractionSettings,
    pub pool: PoolSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    pub workers: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub poll_timeout_secs: Option<u64>,
}

impl AppSettings {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Read `explicit` if given, else the per-user config file if one
    /// exists, else fall back to defaults.
    pub async fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let settings = Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(settings)
    }

    pub fn extraction_config(&self) -> anyhow::Result<ExtractionConfig> {
        self.extraction
            .clone()
            .into_config()
            .context("Invalid [extraction] settings")
    }

    /// Command-line values win over the file, which wins over defaults.
    pub fn pool_config(
        &self,
        workers: Option<usize>,
        queue_capacity: Option<usize>,
    ) -> anyhow::Result<PoolConfig> {
        let mut config = PoolConfig::default();
        if let Some(n) = workers.or(self.pool.workers) {
            config.workers = n;
        }
        if let Some(n) = queue_capacity.or(self.pool.queue_capacity) {
            config.queue_capacity = n;
        }
        if let Some(secs) = self.pool.poll_timeout_secs {
            // A zero timeout turns every blocking wait into a busy loop.
            anyhow::ensure!(secs > 0, "[pool] poll_timeout_secs must be at least 1");
            config.poll_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "idscan").map(|d| d.config_dir().join(CONFIG_FILE_NAME))
}
