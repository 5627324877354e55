use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::jobs::worker_count;
use crate::pager::PrefetchBehavior;
use crate::{Error, Result};

pub const DEFAULT_MAX_BODY_BYTES: usize = 20 * 1024 * 1024;
pub const DEFAULT_MAX_REDIRECTS: usize = 5;
const MAX_DEFAULT_WORKERS: usize = 4;

fn default_user_agent() -> String {
    format!("photoload/{}", env!("CARGO_PKG_VERSION"))
}

fn default_worker_threads() -> usize {
    worker_count(MAX_DEFAULT_WORKERS)
}

/// Loader settings. Every field falls back to its default when missing
/// from the serialized form.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct LoaderConfig {
    /// Threads used to decode fetched still images.
    pub worker_threads: usize,
    pub max_body_bytes: usize,
    pub max_redirects: usize,
    pub user_agent: String,
    /// Decode fetched non-GIF bytes into an image before delivering them.
    /// When off, all fetched content is delivered as raw bytes.
    pub decode_stills: bool,
    pub prefetch: PrefetchBehavior,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: default_user_agent(),
            decode_stills: true,
            prefetch: PrefetchBehavior::default(),
        }
    }
}

impl LoaderConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: LoaderConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        info!("loaded loader config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(Error::Config("worker_threads must be at least 1".to_owned()));
        }

        if self.max_body_bytes == 0 {
            return Err(Error::Config("max_body_bytes must be non-zero".to_owned()));
        }

        Ok(())
    }
}
