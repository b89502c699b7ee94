//! Layered runtime settings
//!
//! Sources, lowest priority first: built-in defaults for the selected
//! profile, an optional config file, then `DROWSY_*` environment variables
//! (`__` separates nesting, e.g. `DROWSY_DMS__THRESHOLDS__EAR_THRESHOLD=0.2`).

use std::path::Path;

use alerting::AlertConfig;
use anyhow::{Context, Result};
use camera_capture::CameraConfig;
use clap::ValueEnum;
use config::{Config, Environment, File};
use dms::DmsConfig;
use serde::{Deserialize, Serialize};

/// Threshold preset used as the base layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Profile {
    #[default]
    Default,
    Strict,
    Lenient,
}

impl Profile {
    pub fn dms_config(self) -> DmsConfig {
        match self {
            Profile::Default => DmsConfig::default(),
            Profile::Strict => DmsConfig::strict(),
            Profile::Lenient => DmsConfig::lenient(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub dms: DmsConfig,
    pub camera: CameraSettings,
    pub alerts: AlertConfig,
    pub logging: LogSettings,
}

/// Size of synthesized frames when no image sequence is given
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        let cabin = CameraConfig::cabin();
        Self {
            width: cabin.width,
            height: cabin.height,
        }
    }
}

impl From<CameraSettings> for CameraConfig {
    fn from(s: CameraSettings) -> Self {
        CameraConfig {
            width: s.width,
            height: s.height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Settings {
    /// Build settings from all layers and validate the DMS section
    pub fn load(file: Option<&Path>, profile: Profile) -> Result<Self> {
        let base = Settings {
            dms: profile.dms_config(),
            ..Default::default()
        };

        let mut builder = Config::builder()
            .add_source(Config::try_from(&base).context("Failed to encode default settings")?);
        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix("DROWSY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")?;
        settings.dms.validate()?;
        Ok(settings)
    }
}
