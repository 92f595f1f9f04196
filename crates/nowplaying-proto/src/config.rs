use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;
use crate::protocol::{Size, ViewState};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub widget: WidgetConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Volume the resource starts at, `0.0..=1.0`.
    #[serde(default = "default_volume")]
    pub default_volume: f32,
    /// `pip` or `hidden`; any other state is coerced to `pip`.
    #[serde(default)]
    pub initial_view: ViewState,
    /// How long the "couldn't play this track" notice stays up.
    #[serde(default = "default_notice_secs")]
    pub notice_secs: u64,
}

/// Widget geometry, in CSS pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    #[serde(default = "default_pip_width")]
    pub pip_width: f64,
    #[serde(default = "default_pip_height")]
    pub pip_height: f64,
    #[serde(default = "default_minimized_width")]
    pub minimized_width: f64,
    #[serde(default = "default_minimized_height")]
    pub minimized_height: f64,
    /// Inset from the bottom-right corner for the pip and minimized placements.
    #[serde(default = "default_margin")]
    pub margin: f64,
    /// Assumed viewport until the host reports a real one.
    #[serde(default = "default_viewport_width")]
    pub viewport_width: f64,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: f64,
}

/// Catalog source: an `http(s)://` URL or a local file path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_source")]
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            initial_view: ViewState::default(),
            notice_secs: default_notice_secs(),
        }
    }
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            pip_width: default_pip_width(),
            pip_height: default_pip_height(),
            minimized_width: default_minimized_width(),
            minimized_height: default_minimized_height(),
            margin: default_margin(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
        }
    }
}

impl WidgetConfig {
    pub fn pip_size(&self) -> Size {
        Size::new(self.pip_width, self.pip_height)
    }

    pub fn minimized_size(&self) -> Size {
        Size::new(self.minimized_width, self.minimized_height)
    }

    pub fn initial_viewport(&self) -> Size {
        Size::new(self.viewport_width, self.viewport_height)
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            source: default_catalog_source(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_volume() -> f32 {
    0.8
}

fn default_notice_secs() -> u64 {
    5
}

fn default_pip_width() -> f64 {
    400.0
}

fn default_pip_height() -> f64 {
    300.0
}

fn default_minimized_width() -> f64 {
    320.0
}

fn default_minimized_height() -> f64 {
    48.0
}

fn default_margin() -> f64 {
    16.0
}

fn default_viewport_width() -> f64 {
    1280.0
}

fn default_viewport_height() -> f64 {
    800.0
}

fn default_catalog_source() -> String {
    platform::config_dir()
        .join("catalog.json")
        .display()
        .to_string()
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8990
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        if !matches!(config.player.initial_view, ViewState::Pip | ViewState::Hidden) {
            tracing::warn!(
                "initial_view {:?} is not pip or hidden, using pip",
                config.player.initial_view
            );
            config.player.initial_view = ViewState::Pip;
        }
        config.player.default_volume = config.player.default_volume.clamp(0.0, 1.0);
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
