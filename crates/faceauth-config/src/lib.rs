use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const PRIMARY_CONFIG_PATH: &str = "/etc/faceauth/config.toml";
pub const SECONDARY_CONFIG_PATH: &str = "/usr/local/etc/faceauth/config.toml";
/// Shared default for both thresholds; mirrors `faceauth_core::ACCEPTANCE_THRESHOLD`.
pub const DEFAULT_THRESHOLD: f64 = 0.6;
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_INTERVAL_MILLIS: u64 = 0;
pub const DEFAULT_VIDEO_DEVICE: &str = "/dev/video0";
pub const DEFAULT_PIXEL_FORMAT: &str = "YUYV";
pub const DEFAULT_WARMUP_FRAMES: u32 = 4;
pub const DEFAULT_JITTERS: u32 = 1;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub enrollment_threshold: Option<f64>,
    pub match_threshold: Option<f64>,
    pub auth_timeout_secs: Option<u64>,
    pub frame_interval_millis: Option<u64>,
    pub refresh_snapshot_each_frame: Option<bool>,
    pub store_path: Option<PathBuf>,
    pub video_device: Option<String>,
    pub pixel_format: Option<String>,
    pub warmup_frames: Option<u32>,
    pub jitters: Option<u32>,
    pub landmark_model: Option<PathBuf>,
    pub encoder_model: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub enrollment_threshold: f64,
    pub match_threshold: f64,
    pub auth_timeout: Duration,
    pub frame_interval: Duration,
    pub refresh_snapshot_each_frame: bool,
    /// `None` defers to the store's own resolution (env var, then built-in path).
    pub store_path: Option<PathBuf>,
    pub video_device: String,
    pub pixel_format: String,
    pub warmup_frames: u32,
    pub jitters: u32,
    pub landmark_model: Option<PathBuf>,
    pub encoder_model: Option<PathBuf>,
}

impl ResolvedConfig {
    pub fn from_raw(raw: ConfigFile) -> Self {
        Self {
            enrollment_threshold: clamp_threshold(
                raw.enrollment_threshold.unwrap_or(DEFAULT_THRESHOLD),
            ),
            match_threshold: clamp_threshold(raw.match_threshold.unwrap_or(DEFAULT_THRESHOLD)),
            auth_timeout: Duration::from_secs(
                raw.auth_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS).max(1),
            ),
            frame_interval: Duration::from_millis(
                raw.frame_interval_millis.unwrap_or(DEFAULT_INTERVAL_MILLIS),
            ),
            refresh_snapshot_each_frame: raw.refresh_snapshot_each_frame.unwrap_or(false),
            store_path: raw.store_path,
            video_device: raw
                .video_device
                .unwrap_or_else(|| DEFAULT_VIDEO_DEVICE.to_string()),
            pixel_format: raw
                .pixel_format
                .unwrap_or_else(|| DEFAULT_PIXEL_FORMAT.to_string()),
            warmup_frames: raw.warmup_frames.unwrap_or(DEFAULT_WARMUP_FRAMES),
            jitters: raw.jitters.unwrap_or(DEFAULT_JITTERS),
            landmark_model: raw.landmark_model,
            encoder_model: raw.encoder_model,
        }
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self::from_raw(ConfigFile::default())
    }
}

fn clamp_threshold(value: f64) -> f64 {
    if value.is_nan() {
        DEFAULT_THRESHOLD
    } else {
        value.clamp(-1.0, 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub contents: ConfigFile,
    pub source: PathBuf,
}

impl LoadedConfig {
    pub fn new(contents: ConfigFile, source: PathBuf) -> Self {
        Self { contents, source }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfigWithSource {
    pub resolved: ResolvedConfig,
    pub source: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("configuration file {path} does not exist")]
    Missing { path: PathBuf },
}

pub fn default_sources() -> [PathBuf; 2] {
    [
        PathBuf::from(PRIMARY_CONFIG_PATH),
        PathBuf::from(SECONDARY_CONFIG_PATH),
    ]
}

pub fn load_resolved_config() -> Result<ResolvedConfigWithSource, ConfigError> {
    load_resolved_from_paths(&default_sources())
}

/// An explicitly requested file must exist; the default locations are optional.
pub fn load_resolved_config_from(
    explicit: Option<&Path>,
) -> Result<ResolvedConfigWithSource, ConfigError> {
    match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::Missing {
                    path: path.to_path_buf(),
                });
            }
            load_resolved_from_paths(&[path.to_path_buf()])
        }
        None => load_resolved_config(),
    }
}

pub fn load_from_paths(paths: &[PathBuf]) -> Result<Option<LoadedConfig>, ConfigError> {
    for path in paths {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let parsed =
                    toml::from_str::<ConfigFile>(&contents).map_err(|err| ConfigError::Parse {
                        path: path.clone(),
                        message: err.to_string(),
                    })?;
                return Ok(Some(LoadedConfig::new(parsed, path.clone())));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(ConfigError::Read {
                    path: path.clone(),
                    source: err,
                })
            }
        }
    }

    Ok(None)
}

pub fn load_resolved_from_paths(
    paths: &[PathBuf],
) -> Result<ResolvedConfigWithSource, ConfigError> {
    match load_from_paths(paths)? {
        Some(entry) => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::from_raw(entry.contents),
            source: Some(entry.source),
        }),
        None => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::default(),
            source: None,
        }),
    }
}
