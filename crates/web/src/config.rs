//! Web application configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use viewkit_common::OptionSet;

/// Web application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Listen address
    pub listen: SocketAddr,

    /// Component preview pages
    pub previews: PreviewConfig,

    /// Content of the `/sample` page
    pub sample: SampleConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 3000)),
            previews: PreviewConfig::default(),
            sample: SampleConfig::default(),
        }
    }
}

/// Preview configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Serve `/previews` routes
    pub enabled: bool,

    /// CSS class of the element wrapping a rendered scenario
    pub container_class: Option<String>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            container_class: None,
        }
    }
}

/// Sample page configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    pub title: String,

    /// One SampleButton option set per button
    pub buttons: Vec<OptionSet>,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            title: "Samples".to_string(),
            buttons: vec![
                OptionSet::new().with("url", "#").with("text", "Click me"),
                OptionSet::new()
                    .with("url", "/previews")
                    .with("text", "Browse previews"),
            ],
        }
    }
}

impl WebConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `VIEWKIT_WEB_ADDR` and `VIEWKIT_PREVIEWS_ENABLED` overrides
    pub fn apply_env(self) -> anyhow::Result<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub fn apply_env_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        if let Some(addr) = lookup("VIEWKIT_WEB_ADDR").filter(|v| !v.trim().is_empty()) {
            self.listen = addr
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid VIEWKIT_WEB_ADDR {:?}: {}", addr, e))?;
        }

        if let Some(enabled) = lookup("VIEWKIT_PREVIEWS_ENABLED") {
            self.previews.enabled = matches!(enabled.trim(), "1" | "true" | "yes");
        }

        Ok(self)
    }
}
