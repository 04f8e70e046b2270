//! Oracle source/target client.
//!
//! The `oracle` crate is a blocking driver; connects and row streaming run
//! on the tokio blocking pool with `spawn_blocking`, feeding the same
//! channel shape as the async drivers.

use super::{catalog_column, fingerprint, FingerprintQuery, STREAM_CHANNEL_DEPTH};
use crate::config::DbConfig;
use crate::error::{CompareError, Result};
use crate::model::{CatalogColumn, CatalogTable, RowFingerprint};
use oracle::sql_type::ToSql;
use oracle::Connection;
use tokio::sync::mpsc;
use tracing::info;

pub struct OracleClient {
    conn: Connection,
}

impl OracleClient {
    pub async fn connect(role: &str, cfg: &DbConfig) -> Result<OracleClient> {
        let connect_string = format!("//{}:{}/{}", cfg.host, cfg.port, cfg.dbname);
        let user = cfg.user.clone();
        let password = cfg.password.clone();
        let role_owned = role.to_string();

        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::connect(&user, &password, &connect_string)
                .map_err(|e| CompareError::connect(&role_owned, e))?;
            // Timestamp and numeric canonicalization assume a UTC session
            // with '.' as the decimal separator.
            conn.execute("ALTER SESSION SET TIME_ZONE = 'UTC'", &[])?;
            conn.execute("ALTER SESSION SET NLS_NUMERIC_CHARACTERS = '.,'", &[])?;
            Ok(conn)
        })
        .await
        .map_err(|e| CompareError::connect(role, e))??;

        info!(
            "Connected to Oracle {}: {}:{}/{}",
            role, cfg.host, cfg.port, cfg.dbname
        );
        Ok(OracleClient { conn })
    }

    pub fn stream_fingerprints(
        self,
        query: FingerprintQuery,
    ) -> mpsc::Receiver<Result<Vec<RowFingerprint>>> {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_DEPTH);
        tokio::task::spawn_blocking(move || {
            let result = (|| {
                let rows = self.conn.query(&query.sql, &[])?;
                let mut batch = Vec::with_capacity(query.fetch_size);
                for row in rows {
                    let row = row?;
                    batch.push(fingerprint(
                        query.tid,
                        row.get::<usize, Option<String>>(0)?,
                        row.get::<usize, Option<String>>(1)?,
                        row.get::<usize, Option<String>>(2)?,
                    ));
                    if batch.len() >= query.fetch_size {
                        let full = std::mem::replace(
                            &mut batch,
                            Vec::with_capacity(query.fetch_size),
                        );
                        if tx.blocking_send(Ok(full)).is_err() {
                            return Ok(());
                        }
                    }
                }
                if !batch.is_empty() {
                    let _ = tx.blocking_send(Ok(batch));
                }
                Ok::<(), CompareError>(())
            })();

            if let Err(e) = result {
                let _ = tx.blocking_send(Err(e));
            }
        });
        rx
    }

    pub async fn fetch_fingerprint(
        &mut self,
        sql: &str,
        binds: &[String],
        tid: i32,
    ) -> Result<Option<RowFingerprint>> {
        // A single-row lookup is short; run it inline on the blocking
        // driver rather than round-tripping through spawn_blocking.
        let params: Vec<&dyn ToSql> = binds.iter().map(|b| b as &dyn ToSql).collect();
        match self.conn.query_row(sql, &params) {
            Ok(row) => Ok(Some(fingerprint(
                tid,
                row.get::<usize, Option<String>>(0)?,
                row.get::<usize, Option<String>>(1)?,
                row.get::<usize, Option<String>>(2)?,
            ))),
            Err(oracle::Error::NoDataFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn query_catalog_columns(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<CatalogColumn>> {
        let sql = crate::dialect::select_columns_sql(crate::dialect::Platform::Oracle);
        let rows = self.conn.query(sql, &[&schema, &table])?;
        let mut columns = Vec::new();
        for row in rows {
            let row = row?;
            columns.push(catalog_column(
                row.get::<usize, String>(0)?,
                row.get::<usize, String>(1)?,
                row.get::<usize, String>(2)?,
                row.get::<usize, String>(3)?,
                row.get::<usize, i32>(4)?,
                row.get::<usize, i32>(5)?,
                row.get::<usize, i32>(6)?,
                &row.get::<usize, String>(7)?,
                &row.get::<usize, String>(8)?,
            ));
        }
        Ok(columns)
    }

    pub async fn query_catalog_tables(&mut self, schema: &str) -> Result<Vec<CatalogTable>> {
        let sql = crate::dialect::select_tables_sql(crate::dialect::Platform::Oracle);
        let rows = self.conn.query(sql, &[&schema])?;
        let mut tables = Vec::new();
        for row in rows {
            let row = row?;
            tables.push(CatalogTable {
                owner: row.get::<usize, String>(0)?,
                table_name: row.get::<usize, String>(1)?,
            });
        }
        Ok(tables)
    }
}
