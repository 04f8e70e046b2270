//! DB2 source/target client over ODBC.
//!
//! ODBC is a blocking API; every operation opens a connection from the
//! shared environment inside `spawn_blocking`. Requires the IBM DB2 ODBC
//! driver to be installed on the host.

use super::{catalog_column, fingerprint, FingerprintQuery, STREAM_CHANNEL_DEPTH};
use crate::config::DbConfig;
use crate::error::{CompareError, Result};
use crate::model::{CatalogColumn, CatalogTable, RowFingerprint};
use odbc_api::{buffers::TextRowSet, ConnectionOptions, Cursor, Environment, ResultSetMetadata};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Rows fetched per ODBC buffer cycle.
const ODBC_BUFFER_ROWS: usize = 1000;

/// Maximum bytes buffered per text cell.
const ODBC_MAX_CELL: usize = 8192;

pub struct Db2Client {
    env: Arc<Environment>,
    connection_string: String,
}

fn escape_sql_literal(s: &str) -> String {
    s.replace('\'', "''")
}

fn odbc_err(e: impl std::fmt::Display) -> CompareError {
    CompareError::Odbc(e.to_string())
}

/// Run `sql` to completion and return all rows as text cells.
fn fetch_all_text(
    env: &Environment,
    connection_string: &str,
    sql: &str,
) -> Result<Vec<Vec<Option<String>>>> {
    let conn = env
        .connect_with_connection_string(connection_string, ConnectionOptions::default())
        .map_err(odbc_err)?;

    let mut rows = Vec::new();
    if let Some(mut cursor) = conn.execute(sql, ()).map_err(odbc_err)? {
        let num_cols = cursor.num_result_cols().map_err(odbc_err)? as usize;
        let mut buffers = TextRowSet::for_cursor(ODBC_BUFFER_ROWS, &mut cursor, Some(ODBC_MAX_CELL))
            .map_err(odbc_err)?;
        let mut row_cursor = cursor.bind_buffer(&mut buffers).map_err(odbc_err)?;

        while let Some(batch) = row_cursor.fetch().map_err(odbc_err)? {
            for row_idx in 0..batch.num_rows() {
                let mut row = Vec::with_capacity(num_cols);
                for col_idx in 0..num_cols {
                    row.push(
                        batch
                            .at(col_idx, row_idx)
                            .map(|bytes| String::from_utf8_lossy(bytes).to_string()),
                    );
                }
                rows.push(row);
            }
        }
    }
    Ok(rows)
}

/// Substitute `?` placeholders with escaped string literals. The generated
/// recheck SQL contains no other question marks.
fn inline_binds(sql: &str, binds: &[String]) -> String {
    let mut out = sql.to_string();
    for bind in binds {
        if let Some(pos) = out.find('?') {
            out.replace_range(pos..pos + 1, &format!("'{}'", escape_sql_literal(bind)));
        }
    }
    out
}

impl Db2Client {
    pub async fn connect(role: &str, cfg: &DbConfig) -> Result<Db2Client> {
        let env = Environment::new().map_err(|e| {
            CompareError::connect(
                role,
                format!(
                    "Failed to create ODBC environment: {}. \
                     Make sure the IBM DB2 ODBC driver is installed.",
                    e
                ),
            )
        })?;

        let connection_string = format!(
            "Driver={{IBM DB2 ODBC DRIVER}};Hostname={};Port={};Database={};Protocol=TCPIP;Uid={};Pwd={};",
            cfg.host, cfg.port, cfg.dbname, cfg.user, cfg.password
        );

        // Fail fast if the endpoint is unreachable.
        {
            let conn = env
                .connect_with_connection_string(&connection_string, ConnectionOptions::default())
                .map_err(|e| CompareError::connect(role, e))?;
            let _ = conn.execute("SELECT 1 FROM sysibm.sysdummy1", ());
        }

        info!(
            "Connected to DB2 {}: {}:{}/{}",
            role, cfg.host, cfg.port, cfg.dbname
        );
        Ok(Db2Client {
            env: Arc::new(env),
            connection_string,
        })
    }

    pub fn stream_fingerprints(
        self,
        query: FingerprintQuery,
    ) -> mpsc::Receiver<Result<Vec<RowFingerprint>>> {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_DEPTH);
        tokio::task::spawn_blocking(move || {
            let result = (|| {
                let conn = self
                    .env
                    .connect_with_connection_string(
                        &self.connection_string,
                        ConnectionOptions::default(),
                    )
                    .map_err(odbc_err)?;

                if let Some(mut cursor) = conn.execute(&query.sql, ()).map_err(odbc_err)? {
                    let mut buffers =
                        TextRowSet::for_cursor(query.fetch_size, &mut cursor, Some(ODBC_MAX_CELL))
                            .map_err(odbc_err)?;
                    let mut row_cursor = cursor.bind_buffer(&mut buffers).map_err(odbc_err)?;

                    while let Some(batch) = row_cursor.fetch().map_err(odbc_err)? {
                        let mut out = Vec::with_capacity(batch.num_rows());
                        for row_idx in 0..batch.num_rows() {
                            out.push(fingerprint(
                                query.tid,
                                batch
                                    .at(0, row_idx)
                                    .map(|b| String::from_utf8_lossy(b).to_string()),
                                batch
                                    .at(1, row_idx)
                                    .map(|b| String::from_utf8_lossy(b).to_string()),
                                batch
                                    .at(2, row_idx)
                                    .map(|b| String::from_utf8_lossy(b).to_string()),
                            ));
                        }
                        if !out.is_empty() && tx.blocking_send(Ok(out)).is_err() {
                            return Ok(());
                        }
                    }
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
        let env = Arc::clone(&self.env);
        let connection_string = self.connection_string.clone();
        let sql = inline_binds(sql, binds);
        let rows =
            tokio::task::spawn_blocking(move || fetch_all_text(&env, &connection_string, &sql))
                .await
                .map_err(|e| CompareError::Odbc(e.to_string()))??;
        Ok(rows.into_iter().next().map(|mut row| {
            let pk = row.pop().flatten();
            let column_hash = row.pop().flatten();
            let pk_hash = row.pop().flatten();
            fingerprint(tid, pk_hash, column_hash, pk)
        }))
    }

    pub async fn query_catalog_columns(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<CatalogColumn>> {
        let sql = inline_binds(
            crate::dialect::select_columns_sql(crate::dialect::Platform::Db2),
            &[schema.to_string(), table.to_string()],
        );
        let env = Arc::clone(&self.env);
        let connection_string = self.connection_string.clone();
        let rows =
            tokio::task::spawn_blocking(move || fetch_all_text(&env, &connection_string, &sql))
                .await
                .map_err(|e| CompareError::Odbc(e.to_string()))??;

        Ok(rows
            .into_iter()
            .map(|row| {
                let cell = |i: usize| -> String {
                    row.get(i).cloned().flatten().unwrap_or_default()
                };
                let num = |i: usize| -> i32 { cell(i).trim().parse().unwrap_or(0) };
                catalog_column(
                    cell(0),
                    cell(1),
                    cell(2),
                    cell(3),
                    num(4),
                    num(5),
                    num(6),
                    &cell(7),
                    &cell(8),
                )
            })
            .collect())
    }

    pub async fn query_catalog_tables(&mut self, schema: &str) -> Result<Vec<CatalogTable>> {
        let sql = inline_binds(
            crate::dialect::select_tables_sql(crate::dialect::Platform::Db2),
            &[schema.to_string()],
        );
        let env = Arc::clone(&self.env);
        let connection_string = self.connection_string.clone();
        let rows =
            tokio::task::spawn_blocking(move || fetch_all_text(&env, &connection_string, &sql))
                .await
                .map_err(|e| CompareError::Odbc(e.to_string()))??;

        Ok(rows
            .into_iter()
            .map(|row| CatalogTable {
                owner: row.first().cloned().flatten().unwrap_or_default(),
                table_name: row.get(1).cloned().flatten().unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_binds_escapes_quotes() {
        let sql = "SELECT 1 FROM t WHERE a = ? AND b = ?";
        let out = inline_binds(sql, &["x".to_string(), "O'Brien".to_string()]);
        assert_eq!(out, "SELECT 1 FROM t WHERE a = 'x' AND b = 'O''Brien'");
    }
}
