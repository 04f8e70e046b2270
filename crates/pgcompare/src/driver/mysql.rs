//! MySQL/MariaDB source/target client.

use super::{catalog_column, fingerprint, FingerprintQuery, STREAM_CHANNEL_DEPTH};
use crate::config::DbConfig;
use crate::error::{CompareError, Result};
use crate::model::{CatalogColumn, CatalogTable, RowFingerprint};
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Row, SslOpts};
use tokio::sync::mpsc;
use tracing::info;

pub struct MysqlClient {
    conn: Conn,
}

fn build_opts(cfg: &DbConfig) -> Opts {
    let mut builder = OptsBuilder::default()
        .ip_or_hostname(cfg.host.clone())
        .tcp_port(cfg.port)
        .db_name(Some(cfg.dbname.clone()))
        .user(Some(cfg.user.clone()))
        .pass(Some(cfg.password.clone()));
    if cfg.sslmode != "disable" {
        builder = builder.ssl_opts(Some(
            SslOpts::default()
                .with_danger_accept_invalid_certs(true)
                .with_danger_skip_domain_validation(true),
        ));
    }
    Opts::from(builder)
}

impl MysqlClient {
    pub async fn connect(role: &str, cfg: &DbConfig) -> Result<MysqlClient> {
        let mut conn = Conn::new(build_opts(cfg))
            .await
            .map_err(|e| CompareError::connect(role, e))?;

        // Timestamp canonicalization assumes a UTC session.
        conn.query_drop("SET time_zone = '+00:00'").await?;

        info!(
            "Connected to MySQL {}: {}:{}/{}",
            role, cfg.host, cfg.port, cfg.dbname
        );
        Ok(MysqlClient { conn })
    }

    pub fn stream_fingerprints(
        mut self,
        query: FingerprintQuery,
    ) -> mpsc::Receiver<Result<Vec<RowFingerprint>>> {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_DEPTH);
        tokio::spawn(async move {
            let result = async {
                let mut stream = self.conn.query_iter(query.sql.as_str()).await?;
                let mut batch = Vec::with_capacity(query.fetch_size);
                while let Some(mut row) = stream.next().await? {
                    batch.push(fingerprint(
                        query.tid,
                        row.take(0),
                        row.take(1),
                        row.take(2),
                    ));
                    if batch.len() >= query.fetch_size {
                        let full = std::mem::replace(
                            &mut batch,
                            Vec::with_capacity(query.fetch_size),
                        );
                        if tx.send(Ok(full)).await.is_err() {
                            return Ok(());
                        }
                    }
                }
                drop(stream);
                if !batch.is_empty() {
                    let _ = tx.send(Ok(batch)).await;
                }
                Ok::<(), CompareError>(())
            }
            .await;

            if let Err(e) = result {
                let _ = tx.send(Err(e)).await;
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
        let row: Option<Row> = self.conn.exec_first(sql, binds.to_vec()).await?;
        Ok(row.map(|mut r| fingerprint(tid, r.take(0), r.take(1), r.take(2))))
    }

    pub async fn query_catalog_columns(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<CatalogColumn>> {
        let sql = crate::dialect::select_columns_sql(crate::dialect::Platform::Mysql);
        let rows: Vec<Row> = self
            .conn
            .exec(sql, (schema, table))
            .await?;
        Ok(rows
            .into_iter()
            .map(|mut r| {
                catalog_column(
                    r.take::<String, _>(0).unwrap_or_default(),
                    r.take::<String, _>(1).unwrap_or_default(),
                    r.take::<String, _>(2).unwrap_or_default(),
                    r.take::<String, _>(3).unwrap_or_default(),
                    r.take::<i64, _>(4).unwrap_or(0) as i32,
                    r.take::<i64, _>(5).unwrap_or(0) as i32,
                    r.take::<i64, _>(6).unwrap_or(0) as i32,
                    &r.take::<String, _>(7).unwrap_or_else(|| "N".to_string()),
                    &r.take::<String, _>(8).unwrap_or_else(|| "N".to_string()),
                )
            })
            .collect())
    }

    pub async fn query_catalog_tables(&mut self, schema: &str) -> Result<Vec<CatalogTable>> {
        let sql = crate::dialect::select_tables_sql(crate::dialect::Platform::Mysql);
        let rows: Vec<Row> = self.conn.exec(sql, (schema,)).await?;
        Ok(rows
            .into_iter()
            .map(|mut r| CatalogTable {
                owner: r.take::<String, _>(0).unwrap_or_default(),
                table_name: r.take::<String, _>(1).unwrap_or_default(),
            })
            .collect())
    }
}
