//! Source/target connection layer.
//!
//! One client type per engine, unified behind [`SourceClient`]. Every
//! client exposes the same four operations: connect, stream a fingerprint
//! query (pk_hash, column_hash, pk projected as text), fetch a single row's
//! fingerprint for recheck, and run the catalog metadata queries.
//!
//! Streaming follows the channel pattern: the client is consumed by a
//! producer task that sends fingerprint batches into a bounded channel,
//! giving the extractor backpressure for free. Blocking drivers (Oracle,
//! DB2/ODBC) run their producers on the blocking pool.

mod db2;
mod mssql;
mod mysql;
mod oracle;
mod postgres;
pub mod tls;

pub use db2::Db2Client;
pub use mssql::MssqlClient;
pub use mysql::MysqlClient;
pub use oracle::OracleClient;
pub use postgres::PgClient;

use crate::config::DbConfig;
use crate::dialect::Platform;
use crate::error::Result;
use crate::model::{CatalogColumn, CatalogTable, RowFingerprint};
use tokio::sync::mpsc;

/// Depth of the per-extractor stream channel, in batches.
const STREAM_CHANNEL_DEPTH: usize = 4;

/// A fingerprint SELECT ready to stream.
#[derive(Debug, Clone)]
pub struct FingerprintQuery {
    pub sql: String,
    pub tid: i32,
    pub fetch_size: usize,
}

/// A connected source or target database client.
pub enum SourceClient {
    Postgres(PgClient),
    Mssql(MssqlClient),
    Mysql(MysqlClient),
    Oracle(OracleClient),
    Db2(Db2Client),
}

impl SourceClient {
    /// Connect to the configured endpoint. `role` is used in error and log
    /// messages ("source" / "target").
    pub async fn connect(role: &str, cfg: &DbConfig) -> Result<SourceClient> {
        match cfg.platform {
            Platform::Postgres => Ok(SourceClient::Postgres(PgClient::connect(role, cfg).await?)),
            Platform::Mssql => Ok(SourceClient::Mssql(MssqlClient::connect(role, cfg).await?)),
            Platform::Mysql | Platform::Mariadb => {
                Ok(SourceClient::Mysql(MysqlClient::connect(role, cfg).await?))
            }
            Platform::Oracle => Ok(SourceClient::Oracle(OracleClient::connect(role, cfg).await?)),
            Platform::Db2 => Ok(SourceClient::Db2(Db2Client::connect(role, cfg).await?)),
        }
    }

    /// Start streaming fingerprint batches. Consumes the client; the
    /// producer ends (and the channel closes) at end of cursor or on error.
    pub fn stream_fingerprints(
        self,
        query: FingerprintQuery,
    ) -> mpsc::Receiver<Result<Vec<RowFingerprint>>> {
        match self {
            SourceClient::Postgres(c) => c.stream_fingerprints(query),
            SourceClient::Mssql(c) => c.stream_fingerprints(query),
            SourceClient::Mysql(c) => c.stream_fingerprints(query),
            SourceClient::Oracle(c) => c.stream_fingerprints(query),
            SourceClient::Db2(c) => c.stream_fingerprints(query),
        }
    }

    /// Fetch at most one fingerprint row. `binds` are the canonical text
    /// values of the pk columns, in the order the SQL references them.
    pub async fn fetch_fingerprint(
        &mut self,
        sql: &str,
        binds: &[String],
        tid: i32,
    ) -> Result<Option<RowFingerprint>> {
        match self {
            SourceClient::Postgres(c) => c.fetch_fingerprint(sql, binds, tid).await,
            SourceClient::Mssql(c) => c.fetch_fingerprint(sql, binds, tid).await,
            SourceClient::Mysql(c) => c.fetch_fingerprint(sql, binds, tid).await,
            SourceClient::Oracle(c) => c.fetch_fingerprint(sql, binds, tid).await,
            SourceClient::Db2(c) => c.fetch_fingerprint(sql, binds, tid).await,
        }
    }

    /// Run the engine's column metadata query for one table.
    pub async fn query_catalog_columns(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<CatalogColumn>> {
        match self {
            SourceClient::Postgres(c) => c.query_catalog_columns(schema, table).await,
            SourceClient::Mssql(c) => c.query_catalog_columns(schema, table).await,
            SourceClient::Mysql(c) => c.query_catalog_columns(schema, table).await,
            SourceClient::Oracle(c) => c.query_catalog_columns(schema, table).await,
            SourceClient::Db2(c) => c.query_catalog_columns(schema, table).await,
        }
    }

    /// Run the engine's table listing query for one schema.
    pub async fn query_catalog_tables(&mut self, schema: &str) -> Result<Vec<CatalogTable>> {
        match self {
            SourceClient::Postgres(c) => c.query_catalog_tables(schema).await,
            SourceClient::Mssql(c) => c.query_catalog_tables(schema).await,
            SourceClient::Mysql(c) => c.query_catalog_tables(schema).await,
            SourceClient::Oracle(c) => c.query_catalog_tables(schema).await,
            SourceClient::Db2(c) => c.query_catalog_tables(schema).await,
        }
    }
}

/// Assemble a [`RowFingerprint`] from the three projected text columns.
pub(crate) fn fingerprint(
    tid: i32,
    pk_hash: Option<String>,
    column_hash: Option<String>,
    pk: Option<String>,
) -> RowFingerprint {
    RowFingerprint {
        tid,
        pk_hash: pk_hash.unwrap_or_default(),
        column_hash: column_hash.unwrap_or_default(),
        pk: pk.unwrap_or_default(),
    }
}

/// Build a catalog column from the uniform projection's text flags.
pub(crate) fn catalog_column(
    owner: String,
    table_name: String,
    column_name: String,
    data_type: String,
    data_length: i32,
    data_precision: i32,
    data_scale: i32,
    nullable: &str,
    pk: &str,
) -> CatalogColumn {
    CatalogColumn {
        owner,
        table_name,
        column_name,
        data_type,
        data_length,
        data_precision,
        data_scale,
        nullable: nullable == "Y",
        primary_key: pk == "Y",
    }
}
