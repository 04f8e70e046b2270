//! Error types for the reconciliation library.

use thiserror::Error;

/// Main error type for reconciliation operations.
#[derive(Error, Debug)]
pub enum CompareError {
    /// Configuration error (missing option, unknown dialect, bad value).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection failure to the repository, source, or target database.
    #[error("Connection error ({role}): {message}")]
    Connect { role: String, message: String },

    /// Repository database error.
    #[error("Repository error: {0}")]
    Repo(#[from] tokio_postgres::Error),

    /// Repository pool error with context about where it occurred.
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// SQL Server source/target error.
    #[error("SQL Server error: {0}")]
    Mssql(#[from] tiberius::error::Error),

    /// MySQL/MariaDB source/target error.
    #[error("MySQL error: {0}")]
    Mysql(#[from] mysql_async::Error),

    /// Oracle source/target error.
    #[error("Oracle error: {0}")]
    Oracle(#[from] oracle::Error),

    /// ODBC (DB2) source/target error.
    #[error("ODBC error: {0}")]
    Odbc(String),

    /// SQL failure while extracting a table shard.
    #[error("Extract failed for table {table}: {message}")]
    Extract { table: String, message: String },

    /// SQL failure while loading a fingerprint batch into staging.
    #[error("Load failed into {staging}: {message}")]
    Load { staging: String, message: String },

    /// Column-map compilation failure (misaligned primary keys, etc.)
    #[error("Column map error for table {table}: {message}")]
    Map { table: String, message: String },

    /// IO error (config file, report file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file parse error.
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Run was cancelled (SIGINT, SIGTERM).
    #[error("Run cancelled")]
    Cancelled,
}

impl CompareError {
    /// Create a Config error.
    pub fn config(message: impl Into<String>) -> Self {
        CompareError::Config(message.into())
    }

    /// Create a Connect error for the given role (repo/source/target).
    pub fn connect(role: impl Into<String>, message: impl std::fmt::Display) -> Self {
        CompareError::Connect {
            role: role.into(),
            message: message.to_string(),
        }
    }

    /// Create a Pool error with context about where it occurred.
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        CompareError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create an Extract error.
    pub fn extract(table: impl Into<String>, message: impl std::fmt::Display) -> Self {
        CompareError::Extract {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Load error.
    pub fn load(staging: impl Into<String>, message: impl std::fmt::Display) -> Self {
        CompareError::Load {
            staging: staging.into(),
            message: message.to_string(),
        }
    }

    /// Create a Map error.
    pub fn map(table: impl Into<String>, message: impl Into<String>) -> Self {
        CompareError::Map {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for this error. Configuration and connection
    /// failures exit 1; the out-of-sync exit code 2 is assigned by the CLI
    /// from the run summary, not from an error.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, CompareError>;
