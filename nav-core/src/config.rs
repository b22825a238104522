//! Configuration file management for adsb-nav.
//!
//! Reads/writes `~/.adsb-nav/config.toml` with the ENU reference point and
//! CPR cache settings. Missing keys fall back to defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::geodesy::{GeodeticPoint, ReferenceFrame};
use crate::resolver::DEFAULT_CACHE_TIMEOUT;
use crate::types::{NavError, Result};

/// Default ENU anchor: Beijing, 10 km above the ellipsoid.
pub const DEFAULT_REF_LAT: f64 = 39.9;
pub const DEFAULT_REF_LON: f64 = 116.4;
pub const DEFAULT_REF_ALT_M: f64 = 10000.0;

/// Full configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reference: ReferenceConfig,
    pub cpr: CprConfig,
}

/// Geodetic anchor of the local East-North-Up frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CprConfig {
    /// Seconds a cached even/odd half stays eligible for pairing.
    pub cache_timeout_secs: f64,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        ReferenceConfig {
            latitude: DEFAULT_REF_LAT,
            longitude: DEFAULT_REF_LON,
            altitude_m: DEFAULT_REF_ALT_M,
        }
    }
}

impl Default for CprConfig {
    fn default() -> Self {
        CprConfig {
            cache_timeout_secs: DEFAULT_CACHE_TIMEOUT,
        }
    }
}

impl Config {
    /// Reject values the projection or cache cannot work with.
    pub fn validate(&self) -> Result<()> {
        let r = &self.reference;
        if !(-90.0..=90.0).contains(&r.latitude) {
            return Err(NavError::Config(format!(
                "reference latitude {} outside [-90, 90]",
                r.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&r.longitude) {
            return Err(NavError::Config(format!(
                "reference longitude {} outside [-180, 180]",
                r.longitude
            )));
        }
        if !r.altitude_m.is_finite() {
            return Err(NavError::Config("reference altitude must be finite".into()));
        }

        let timeout = self.cpr.cache_timeout_secs;
        if !(timeout.is_finite() && timeout > 0.0) {
            return Err(NavError::Config(format!(
                "cache timeout {timeout} must be a positive number of seconds"
            )));
        }
        Ok(())
    }

    pub fn reference_point(&self) -> GeodeticPoint {
        GeodeticPoint::new(
            self.reference.latitude,
            self.reference.longitude,
            self.reference.altitude_m,
        )
    }

    pub fn reference_frame(&self) -> ReferenceFrame {
        ReferenceFrame::new(self.reference_point())
    }
}

/// Get the config directory path (`~/.adsb-nav/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".adsb-nav")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.adsb-nav/config.toml`.
pub fn load_config() -> Result<Config> {
    load_config_from(&config_file())
}

/// Load config from `path`. Returns the default config if the file doesn't exist.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path)?;
    parse_config(&text)
}

/// Save config to `~/.adsb-nav/config.toml`.
pub fn save_config(config: &Config) -> Result<PathBuf> {
    let path = config_file();
    save_config_to(config, &path)?;
    Ok(path)
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, serialize_config(config)?)?;
    Ok(())
}

/// Parse and validate TOML config text.
pub fn parse_config(text: &str) -> Result<Config> {
    let config: Config = toml::from_str(text).map_err(|e| NavError::Config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

pub fn serialize_config(config: &Config) -> Result<String> {
    let body = toml::to_string_pretty(config).map_err(|e| NavError::Config(e.to_string()))?;
    Ok(format!("# adsb-nav configuration\n\n{body}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
