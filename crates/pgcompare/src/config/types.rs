//! Configuration type definitions.
//!
//! One immutable [`Config`] value is built at startup and passed explicitly
//! into the reconciler and its workers; there is no global property bag.
//! Keys in the properties file are the kebab-case option names.

use crate::cast::{CastNotation, CastOptions, HashMethod};
use crate::dialect::Platform;
use crate::error::{CompareError, Result};
use serde::Deserialize;
use std::fmt;

/// Connection parameters for one database role.
#[derive(Clone)]
pub struct DbConfig {
    pub platform: Platform,
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub sslmode: String,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("platform", &self.platform)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("sslmode", &self.sslmode)
            .finish()
    }
}

/// Immutable run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Active project id.
    pub project: i32,

    /// Extractor fetch block size (rows per batch).
    pub batch_fetch_size: usize,

    /// Loader commit group size (rows per commit).
    pub batch_commit_size: usize,

    /// Progress log interval in rows.
    pub batch_progress_report_size: u64,

    /// Loader workers per side; 0 disables loaders and extractors write
    /// staging rows synchronously.
    pub loader_threads: usize,

    /// Queue capacity in batches.
    pub message_queue_size: usize,

    /// Rendering of very large exact numerics.
    pub number_cast: CastNotation,

    /// Rendering of very large floats.
    pub float_cast: CastNotation,

    /// Raw or normalized hash input.
    pub column_hash_method: HashMethod,

    /// Observer throttling of extractors by staged volume.
    pub observer_throttle: bool,
    pub observer_throttle_size: u64,
    pub observer_vacuum: bool,

    /// Append ORDER BY to extractor SELECTs.
    pub database_sort: bool,

    pub log_level: String,
    pub log_destination: Option<String>,

    pub repo: DbConfig,
    pub source: DbConfig,
    pub target: DbConfig,
}

impl Config {
    /// Cast-compiler options derived from this configuration.
    pub fn cast_options(&self) -> CastOptions {
        CastOptions {
            method: self.column_hash_method,
            number_cast: self.number_cast,
            float_cast: self.float_cast,
        }
    }

    /// Connection parameters for a side.
    pub fn side(&self, side: crate::model::Side) -> &DbConfig {
        match side {
            crate::model::Side::Source => &self.source,
            crate::model::Side::Target => &self.target,
        }
    }
}

/// Flat deserialization view of the properties file. All keys are optional
/// so validation can report the missing ones by name.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RawConfig {
    pub project: Option<i32>,

    pub batch_fetch_size: Option<usize>,
    pub batch_commit_size: Option<usize>,
    pub batch_progress_report_size: Option<u64>,
    pub loader_threads: Option<usize>,
    pub message_queue_size: Option<usize>,

    pub number_cast: Option<CastNotation>,
    pub float_cast: Option<CastNotation>,
    pub column_hash_method: Option<HashMethod>,

    pub observer_throttle: Option<bool>,
    pub observer_throttle_size: Option<u64>,
    pub observer_vacuum: Option<bool>,

    pub database_sort: Option<bool>,

    pub log_level: Option<String>,
    pub log_destination: Option<String>,

    pub repo_host: Option<String>,
    pub repo_port: Option<u16>,
    pub repo_dbname: Option<String>,
    pub repo_user: Option<String>,
    pub repo_password: Option<String>,
    pub repo_sslmode: Option<String>,

    pub source_type: Option<String>,
    pub source_host: Option<String>,
    pub source_port: Option<u16>,
    pub source_dbname: Option<String>,
    pub source_user: Option<String>,
    pub source_password: Option<String>,
    pub source_sslmode: Option<String>,

    pub target_type: Option<String>,
    pub target_host: Option<String>,
    pub target_port: Option<u16>,
    pub target_dbname: Option<String>,
    pub target_user: Option<String>,
    pub target_password: Option<String>,
    pub target_sslmode: Option<String>,
}

fn default_port(platform: Platform) -> u16 {
    match platform {
        Platform::Postgres => 5432,
        Platform::Oracle => 1521,
        Platform::Mysql | Platform::Mariadb => 3306,
        Platform::Mssql => 1433,
        Platform::Db2 => 50000,
    }
}

fn build_db(
    platform: Platform,
    host: Option<String>,
    port: Option<u16>,
    dbname: Option<String>,
    user: Option<String>,
    password: Option<String>,
    sslmode: Option<String>,
) -> DbConfig {
    DbConfig {
        platform,
        host: host.unwrap_or_default(),
        port: port.unwrap_or_else(|| default_port(platform)),
        dbname: dbname.unwrap_or_default(),
        user: user.unwrap_or_default(),
        password: password.unwrap_or_default(),
        sslmode: sslmode.unwrap_or_else(|| "prefer".to_string()),
    }
}

impl RawConfig {
    /// Resolve the flat key set into a [`Config`] with defaults applied.
    pub fn into_config(self) -> Result<Config> {
        let source_platform = match &self.source_type {
            Some(name) => Platform::parse(name)?,
            None => Platform::Postgres,
        };
        let target_platform = match &self.target_type {
            Some(name) => Platform::parse(name)?,
            None => Platform::Postgres,
        };

        Ok(Config {
            project: self.project.unwrap_or(1),
            batch_fetch_size: self.batch_fetch_size.unwrap_or(2000),
            batch_commit_size: self.batch_commit_size.unwrap_or(2000),
            batch_progress_report_size: self.batch_progress_report_size.unwrap_or(1_000_000),
            loader_threads: self.loader_threads.unwrap_or(2),
            message_queue_size: self.message_queue_size.unwrap_or(100),
            number_cast: self.number_cast.unwrap_or_default(),
            float_cast: self.float_cast.unwrap_or_default(),
            column_hash_method: self.column_hash_method.unwrap_or_default(),
            observer_throttle: self.observer_throttle.unwrap_or(true),
            observer_throttle_size: self.observer_throttle_size.unwrap_or(2_000_000),
            observer_vacuum: self.observer_vacuum.unwrap_or(false),
            database_sort: self.database_sort.unwrap_or(false),
            log_level: self.log_level.unwrap_or_else(|| "info".to_string()),
            log_destination: self.log_destination,
            repo: build_db(
                Platform::Postgres,
                self.repo_host,
                self.repo_port,
                self.repo_dbname,
                self.repo_user,
                self.repo_password,
                self.repo_sslmode,
            ),
            source: build_db(
                source_platform,
                self.source_host,
                self.source_port,
                self.source_dbname,
                self.source_user,
                self.source_password,
                self.source_sslmode,
            ),
            target: build_db(
                target_platform,
                self.target_host,
                self.target_port,
                self.target_dbname,
                self.target_user,
                self.target_password,
                self.target_sslmode,
            ),
        })
    }
}

/// Valid `sslmode` values for any role.
pub(crate) fn check_sslmode(role: &str, sslmode: &str) -> Result<()> {
    match sslmode {
        "disable" | "prefer" | "require" => Ok(()),
        other => Err(CompareError::config(format!(
            "Invalid {}-sslmode '{}'. Valid options: disable, prefer, require",
            role, other
        ))),
    }
}
