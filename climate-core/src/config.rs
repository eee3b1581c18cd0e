use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::{
    model::Coordinate,
    source::{
        openweather,
        trends::{DEFAULT_CO2_URL, DEFAULT_RELAY_URL, DEFAULT_TEMPERATURE_URL},
    },
};

/// Fixed position used instead of live geolocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

/// Where each dataset is fetched from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub openweather: String,
    /// CORS relay the CSV datasets are fetched through. `None` fetches
    /// directly and is stored as `relay = ""`.
    #[serde(with = "relay_url")]
    pub relay: Option<String>,
    pub co2_csv: String,
    pub temperature_csv: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            openweather: openweather::DEFAULT_BASE_URL.to_string(),
            relay: Some(DEFAULT_RELAY_URL.to_string()),
            co2_csv: DEFAULT_CO2_URL.to_string(),
            temperature_csv: DEFAULT_TEMPERATURE_URL.to_string(),
        }
    }
}

/// A missing `relay` key means "use the default relay", so direct fetching
/// has to be written out explicitly as an empty string.
mod relay_url {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(relay: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(relay.as_deref().unwrap_or_default())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let raw = String::deserialize(d)?;
        Ok(Some(raw).filter(|r| !r.trim().is_empty()))
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// refresh_interval_secs = 300
///
/// [location]
/// latitude = 48.85
/// longitude = 2.35
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OpenWeather API key.
    pub api_key: Option<String>,
    pub location: Option<LocationConfig>,
    pub endpoints: Endpoints,
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
    /// Extra attempts after a transport failure.
    pub retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            location: None,
            endpoints: Endpoints::default(),
            refresh_interval_secs: 300,
            request_timeout_secs: 15,
            retries: 0,
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        // Validate eagerly so a bad location surfaces at load time.
        cfg.coordinate()?;
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "climate-dashboard", "climate")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn set_api_key(&mut self, api_key: String) {
        let api_key = api_key.trim();
        self.api_key = (!api_key.is_empty()).then(|| api_key.to_string());
    }

    pub fn set_location(&mut self, coord: Option<Coordinate>) {
        self.location = coord.map(|c| LocationConfig {
            latitude: c.latitude,
            longitude: c.longitude,
        });
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            anyhow!(
                "No OpenWeather API key configured.\n\
                 Hint: run `climate configure` and enter your API key."
            )
        })
    }

    /// The configured fixed location, validated.
    pub fn coordinate(&self) -> Result<Option<Coordinate>> {
        self.location
            .map(|l| Coordinate::new(l.latitude, l.longitude))
            .transpose()
            .context("Invalid [location] in configuration")
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
