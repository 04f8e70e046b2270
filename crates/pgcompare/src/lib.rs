//! # pgcompare
//!
//! Cross-platform database reconciliation engine.
//!
//! Reconciles the contents of two relational tables, a source and a
//! target that may live on heterogeneous engines (Postgres, Oracle,
//! MySQL/MariaDB, SQL Server, DB2), by computing content-addressed row
//! fingerprints on each side in parallel, staging them in a neutral
//! Postgres repository, and classifying every row by set-difference SQL:
//!
//! - **equal**: pk and column hashes match on both sides
//! - **not_equal**: same pk, different column hash
//! - **missing_source / missing_target**: pk present on one side only
//!
//! A second *check* pass re-reads previously out-of-sync rows on both
//! sides to confirm or clear each finding.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pgcompare::{Config, Reconciler, RepoPool, RunFilter, RunMode};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> pgcompare::Result<()> {
//!     let config = Arc::new(Config::load("pgcompare.properties")?);
//!     config.validate(true)?;
//!     let repo = RepoPool::connect(&config.repo, 16).await?;
//!     let reconciler = Reconciler::new(Arc::clone(&config), repo, CancellationToken::new());
//!     let summary = reconciler.run(RunMode::Compare, &RunFilter::default()).await?;
//!     println!("out of sync rows: {}", summary.out_of_sync());
//!     Ok(())
//! }
//! ```

pub mod cast;
pub mod config;
pub mod dialect;
pub mod discover;
pub mod driver;
pub mod error;
pub mod mapping;
pub mod model;
pub mod recon;
pub mod repo;
pub mod report;

// Re-exports for convenient access
pub use cast::{CastNotation, CastOptions, HashMethod};
pub use config::{Config, DbConfig};
pub use dialect::Platform;
pub use error::{CompareError, Result};
pub use mapping::{CompiledSide, CompiledTable};
pub use model::{
    CompareCounts, Finding, FindingStatus, RecheckOutcome, RecheckSummary, RowFingerprint,
    RunMode, RunSummary, Side, TableEntry, TableMap, TableResult, TableStatus,
};
pub use recon::{RunFilter, Reconciler};
pub use repo::RepoPool;
