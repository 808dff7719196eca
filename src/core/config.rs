use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_TARGETS_FILE: &str = "targets.json";

/// A position already held in the portfolio.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Holding {
    /// Market symbol; target shares are keyed by it.
    pub symbol: String,
    /// Order identifier, the symbol when not set.
    pub id: Option<String>,
    /// Display name used in reports and notifications.
    pub name: Option<String>,
    pub units: f64,
    /// Price per unit. Fetched from the quote provider when absent.
    pub price: Option<f64>,
}

impl Holding {
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.symbol)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig {
                base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub currency: String,
    /// Unused cash available for purchases.
    #[serde(default)]
    pub cash: f64,
    pub holdings: Vec<Holding>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    pub targets_path: Option<String>,
    pub data_path: Option<String>,
    /// Directory the config was loaded from; relative paths resolve against it.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("", "topup", "topup").context("Could not determine project directories")
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.yaml"))
    }

    pub fn default_targets_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join(DEFAULT_TARGETS_FILE))
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config.base_dir = path.as_ref().parent().map(Path::to_path_buf);
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Targets file location: `targets_path` if set, otherwise `targets.json`
    /// next to the config file.
    pub fn targets_path(&self) -> Result<PathBuf> {
        match (&self.targets_path, &self.base_dir) {
            (Some(custom), _) => Ok(self.resolve(custom)),
            (None, Some(dir)) => Ok(dir.join(DEFAULT_TARGETS_FILE)),
            (None, None) => Self::default_targets_path(),
        }
    }

    /// Root for run history and the notification outbox.
    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom) = &self.data_path {
            return Ok(self.resolve(custom));
        }
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    pub fn yahoo_base_url(&self) -> &str {
        self.providers
            .yahoo
            .as_ref()
            .map_or(DEFAULT_YAHOO_BASE_URL, |p| &p.base_url)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        match &self.base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path,
        }
    }
}
