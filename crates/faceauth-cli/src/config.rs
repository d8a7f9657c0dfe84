use std::path::PathBuf;
use std::time::Duration;

use faceauth_config::{self as config_loader, ResolvedConfig};
use faceauth_core::capture::{CaptureConfig, DeviceLocator};
use faceauth_core::faces::{
    EmbedderConfig, EnrollmentPolicy, EnvStorePathResolver, StorePathResolver,
};
use faceauth_core::session::{SessionConfig, SnapshotPolicy};
use tracing::debug;

use crate::cli::{CaptureArgs, GlobalOptions, LoginArgs, ModelArgs};
use crate::errors::{config_error, AppResult};

/// Configuration file values with command-line overrides applied on top.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub resolved: ResolvedConfig,
    pub store_path: PathBuf,
}

pub fn load_settings(globals: &GlobalOptions) -> AppResult<Settings> {
    let loaded = config_loader::load_resolved_config_from(globals.config.as_deref())
        .map_err(config_error)?;
    match &loaded.source {
        Some(path) => debug!(path = %path.display(), "loaded configuration"),
        None => debug!("no configuration file found; using defaults"),
    }
    Ok(Settings::new(loaded.resolved, globals))
}

impl Settings {
    pub fn new(resolved: ResolvedConfig, globals: &GlobalOptions) -> Self {
        let override_path = globals.store.clone().or_else(|| resolved.store_path.clone());
        let store_path = EnvStorePathResolver.resolve(override_path.as_deref());
        Self {
            resolved,
            store_path,
        }
    }

    pub fn capture_config(&self, args: &CaptureArgs) -> CaptureConfig {
        let device = args
            .device
            .clone()
            .unwrap_or_else(|| self.resolved.video_device.clone());
        CaptureConfig {
            device: DeviceLocator::from_option(Some(device)),
            pixel_format: args
                .pixel_format
                .clone()
                .unwrap_or_else(|| self.resolved.pixel_format.clone()),
            width: None,
            height: None,
            warmup_frames: args.warmup_frames.unwrap_or(self.resolved.warmup_frames),
        }
    }

    pub fn embedder_config(&self, args: &ModelArgs) -> EmbedderConfig {
        EmbedderConfig {
            landmark_model: args
                .landmark_model
                .clone()
                .or_else(|| self.resolved.landmark_model.clone()),
            encoder_model: args
                .encoder_model
                .clone()
                .or_else(|| self.resolved.encoder_model.clone()),
            jitters: args.jitters.unwrap_or(self.resolved.jitters),
        }
    }

    pub fn enrollment_policy(&self) -> EnrollmentPolicy {
        EnrollmentPolicy {
            duplicate_threshold: self.resolved.enrollment_threshold,
        }
    }

    pub fn session_config(&self, args: &LoginArgs) -> SessionConfig {
        let deadline = args
            .timeout
            .map(|secs| Duration::from_secs(secs.max(1)))
            .unwrap_or(self.resolved.auth_timeout);
        SessionConfig {
            deadline,
            threshold: self.resolved.match_threshold,
            frame_interval: self.resolved.frame_interval,
            snapshot_policy: if self.resolved.refresh_snapshot_each_frame {
                SnapshotPolicy::EveryFrame
            } else {
                SnapshotPolicy::AtStart
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faceauth_config::{ConfigFile, DEFAULT_THRESHOLD};
    use faceauth_core::ACCEPTANCE_THRESHOLD;
    use std::fs;
    use tempfile::tempdir;

    fn login_args(timeout: Option<u64>) -> LoginArgs {
        LoginArgs {
            timeout,
            capture: CaptureArgs::default(),
            models: ModelArgs::default(),
        }
    }

    #[test]
    fn config_default_threshold_matches_core() {
        assert_eq!(DEFAULT_THRESHOLD, ACCEPTANCE_THRESHOLD);
    }

    #[test]
    fn store_flag_beats_config_path() {
        let resolved = ResolvedConfig::from_raw(ConfigFile {
            store_path: Some(PathBuf::from("/srv/config.json")),
            ..ConfigFile::default()
        });
        let from_config = Settings::new(resolved.clone(), &GlobalOptions::default());
        assert_eq!(from_config.store_path, PathBuf::from("/srv/config.json"));

        let globals = GlobalOptions {
            config: None,
            store: Some(PathBuf::from("/tmp/flag.json")),
        };
        let from_flag = Settings::new(resolved, &globals);
        assert_eq!(from_flag.store_path, PathBuf::from("/tmp/flag.json"));
    }

    #[test]
    fn capture_flags_override_config() {
        let resolved = ResolvedConfig::from_raw(ConfigFile {
            video_device: Some("/dev/video3".into()),
            pixel_format: Some("GREY".into()),
            warmup_frames: Some(2),
            ..ConfigFile::default()
        });
        let settings = Settings::new(resolved, &GlobalOptions::default());

        let from_config = settings.capture_config(&CaptureArgs::default());
        assert_eq!(from_config.device.display(), "/dev/video3");
        assert_eq!(from_config.pixel_format, "GREY");
        assert_eq!(from_config.warmup_frames, 2);

        let from_flags = settings.capture_config(&CaptureArgs {
            device: Some("1".into()),
            pixel_format: Some("Y16".into()),
            warmup_frames: Some(0),
        });
        assert_eq!(from_flags.device.display(), "/dev/video1");
        assert_eq!(from_flags.pixel_format, "Y16");
        assert_eq!(from_flags.warmup_frames, 0);
    }

    #[test]
    fn thresholds_feed_policy_and_session_independently() {
        let resolved = ResolvedConfig::from_raw(ConfigFile {
            enrollment_threshold: Some(0.5),
            match_threshold: Some(0.7),
            auth_timeout_secs: Some(9),
            refresh_snapshot_each_frame: Some(true),
            ..ConfigFile::default()
        });
        let settings = Settings::new(resolved, &GlobalOptions::default());
        assert_eq!(settings.enrollment_policy().duplicate_threshold, 0.5);

        let session = settings.session_config(&login_args(None));
        assert_eq!(session.threshold, 0.7);
        assert_eq!(session.deadline, Duration::from_secs(9));
        assert_eq!(session.snapshot_policy, SnapshotPolicy::EveryFrame);

        let overridden = settings.session_config(&login_args(Some(0)));
        assert_eq!(overridden.deadline, Duration::from_secs(1));
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("faceauth.toml");
        fs::write(&path, "match_threshold = 0.8\njitters = 3\n").unwrap();

        let settings = load_settings(&GlobalOptions {
            config: Some(path),
            store: Some(dir.path().join("store.json")),
        })
        .unwrap();
        assert_eq!(settings.resolved.match_threshold, 0.8);
        assert_eq!(settings.embedder_config(&ModelArgs::default()).jitters, 3);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempdir().unwrap();
        let err = load_settings(&GlobalOptions {
            config: Some(dir.path().join("absent.toml")),
            store: None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
