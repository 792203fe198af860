use std::sync::LazyLock;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use vidshrink_core::CompressionPreset;

use crate::upload::UploadGate;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "VIDSHRINK_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub preset: CompressionPreset,
    pub max_upload_mb: u64,
    pub compress_above_mb: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let gate = UploadGate::default();
        Self {
            preset: CompressionPreset::default(),
            max_upload_mb: gate.max_upload_mb,
            compress_above_mb: gate.compress_above_mb,
        }
    }
}

impl AppConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("parse config")
    }

    pub fn load() -> anyhow::Result<Self> {
        let Ok(path) = std::env::var(CONFIG_ENV) else {
            return Ok(Self::default());
        };
        let json = std::fs::read_to_string(&path).with_context(|| format!("read {}", path))?;
        let config = Self::from_json(&json)?;
        log::info!("loaded config from {}", path);
        Ok(config)
    }

    pub fn preset(&self) -> &CompressionPreset {
        &self.preset
    }

    pub fn upload_gate(&self) -> UploadGate {
        UploadGate {
            max_upload_mb: self.max_upload_mb,
            compress_above_mb: self.compress_above_mb,
        }
    }
}

pub fn config() -> &'static AppConfig {
    static CONFIG: LazyLock<AppConfig> = LazyLock::new(|| {
        AppConfig::load().unwrap_or_else(|e| {
            log::warn!("{:#}, using default config", e);
            AppConfig::default()
        })
    });
    &CONFIG
}
