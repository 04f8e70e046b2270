//! Configuration validation.

use super::types::{check_sslmode, Config, DbConfig};
use crate::error::{CompareError, Result};

fn require(role: &str, key: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(CompareError::config(format!(
            "Missing mandatory option {}-{}",
            role, key
        )));
    }
    Ok(())
}

fn validate_db(role: &str, db: &DbConfig) -> Result<()> {
    require(role, "host", &db.host)?;
    require(role, "dbname", &db.dbname)?;
    require(role, "user", &db.user)?;
    check_sslmode(role, &db.sslmode)?;
    Ok(())
}

/// Validate a configuration. The repository is always required;
/// source/target endpoints only for actions that touch them
/// (everything except `init`).
pub fn validate(config: &Config, require_endpoints: bool) -> Result<()> {
    validate_db("repo", &config.repo)?;

    if require_endpoints {
        validate_db("source", &config.source)?;
        validate_db("target", &config.target)?;
    }

    if config.batch_fetch_size == 0 {
        return Err(CompareError::config("batch-fetch-size must be positive"));
    }
    if config.batch_commit_size == 0 {
        return Err(CompareError::config("batch-commit-size must be positive"));
    }
    if config.message_queue_size == 0 {
        return Err(CompareError::config("message-queue-size must be positive"));
    }
    if config.observer_throttle && config.observer_throttle_size == 0 {
        return Err(CompareError::config(
            "observer-throttle-size must be positive when observer-throttle is enabled",
        ));
    }

    Ok(())
}
