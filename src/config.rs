//! Tunables for discovery, evidence extraction and size matching.
//!
//! Everything has a default so an empty (or absent) config file is valid.
//! [`AppConfig::load`] layers, lowest priority first:
//!
//! 1. built-in defaults,
//! 2. a TOML file (`Unquarantine.toml` unless a path is given; optional),
//! 3. environment variables `UNQUARANTINE_<SECTION>__<KEY>`,
//!    e.g. `UNQUARANTINE_MATCHING__LARGE_THRESHOLD=1000000`.

use std::path::Path;

use config::{Config, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::size::MIB;

pub const DEFAULT_CONFIG_NAME: &str = "Unquarantine";
pub const ENV_PREFIX: &str = "UNQUARANTINE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ── MatchConfig ───────────────────────────────────────────────────────────────

/// Size tolerance bands used by the matcher.
///
/// An artifact of `S` bytes matches a candidate of `T` bytes when
/// `|S - T| / T` does not exceed the band for `S`: `large_tolerance` once
/// `S >= large_threshold`, `small_tolerance` below it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub small_tolerance:   f64,
    pub large_tolerance:   f64,
    /// Artifact size at which the large band starts.  1 MiB by default; some
    /// variants of the tool used 1 000 000.
    pub large_threshold:   u64,
    /// Artifacts smaller than this are never matched.
    pub min_artifact_size: u64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            small_tolerance:   0.03,
            large_tolerance:   0.02,
            large_threshold:   MIB,
            min_artifact_size: 0,
        }
    }
}

impl MatchConfig {
    /// Tolerance band that applies to an artifact of `size` bytes.
    pub fn tolerance_for(&self, size: u64) -> f64 {
        if size >= self.large_threshold {
            self.large_tolerance
        } else {
            self.small_tolerance
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, tol) in [("small_tolerance", self.small_tolerance), ("large_tolerance", self.large_tolerance)] {
            if !tol.is_finite() || tol < 0.0 {
                return Err(ConfigError::Invalid(format!("{name} must be a non-negative number, got {tol}")));
            }
        }
        Ok(())
    }
}

// ── ExtractConfig ─────────────────────────────────────────────────────────────

pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "zip", "rar", "7z", "exe", "msi", "apk", "img", "iso", "bin", "gz", "bz2",
    "xz", "tar", "dll", "scr", "php", "jar", "pdf", "sis", "sisx",
];

/// Candidate extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// File extensions (without the dot) a name must end in to be a candidate.
    pub extensions:  Vec<String>,
    /// How many lines above and below a filename are searched for its size.
    pub size_window: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            extensions:  DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            size_window: 1,
        }
    }
}

impl ExtractConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extensions.iter().all(|e| e.trim().is_empty()) {
            return Err(ConfigError::Invalid("extensions must not be empty".into()));
        }
        Ok(())
    }
}

// ── ScanConfig ────────────────────────────────────────────────────────────────

pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Quarantine discovery and evidence directory settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Container extension, compared case-insensitively.
    pub container_extension: String,
    /// Evidence files treated as screenshots.
    pub image_extensions:    Vec<String>,
    /// Also place a copy of the original container in each artifact directory.
    pub copy_container:      bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            container_extension: "nqf".into(),
            image_extensions:    DEFAULT_IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            copy_container:      false,
        }
    }
}

// ── AppConfig ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub matching: MatchConfig,
    pub extract:  ExtractConfig,
    pub scan:     ScanConfig,
}

impl AppConfig {
    /// Load defaults, then the optional file, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => ConfigFile::from(p).required(true),
            None    => ConfigFile::with_name(DEFAULT_CONFIG_NAME).required(false),
        };
        let cfg: AppConfig = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.matching.validate()?;
        self.extract.validate()
    }
}
