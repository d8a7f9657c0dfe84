pub use faceauth_core::errors::{AppError, AppResult};

use faceauth_config::ConfigError;

pub fn config_error(err: ConfigError) -> AppError {
    AppError::Config(err.to_string())
}
