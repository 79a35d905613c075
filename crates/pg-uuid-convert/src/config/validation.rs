//! Configuration validation.

use super::Config;
use crate::error::{ConvertError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.database.host.is_empty() {
        return Err(ConvertError::Config("database.host is required".into()));
    }
    if config.database.database.is_empty() {
        return Err(ConvertError::Config("database.database is required".into()));
    }
    if config.database.user.is_empty() {
        return Err(ConvertError::Config("database.user is required".into()));
    }

    match config.database.ssl_mode.as_str() {
        "disable" | "prefer" | "require" => {}
        other => {
            return Err(ConvertError::Config(format!(
                "database.ssl_mode must be 'disable', 'prefer' or 'require', got '{}'",
                other
            )));
        }
    }

    if config.convert.uuid_extension.is_empty() {
        return Err(ConvertError::Config(
            "convert.uuid_extension must not be empty".into(),
        ));
    }

    Ok(())
}
