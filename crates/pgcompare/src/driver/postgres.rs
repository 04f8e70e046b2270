//! PostgreSQL source/target client.

use super::{catalog_column, fingerprint, FingerprintQuery, STREAM_CHANNEL_DEPTH};
use crate::config::DbConfig;
use crate::dialect::{self, Platform};
use crate::error::{CompareError, Result};
use crate::model::{CatalogColumn, CatalogTable, RowFingerprint};
use futures::{pin_mut, TryStreamExt};
use tokio::sync::mpsc;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config as PgConfig, NoTls};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, info};

/// A single PostgreSQL connection. Extractors connect one each; sharing a
/// connection across workers is never done.
pub struct PgClient {
    client: Client,
}

impl PgClient {
    pub async fn connect(role: &str, cfg: &DbConfig) -> Result<PgClient> {
        let mut pg_config = PgConfig::new();
        pg_config
            .host(&cfg.host)
            .port(cfg.port)
            .dbname(&cfg.dbname)
            .user(&cfg.user)
            .password(&cfg.password);

        let client = match super::tls::build_tls_config(role, &cfg.sslmode)? {
            None => {
                let (client, connection) = pg_config
                    .connect(NoTls)
                    .await
                    .map_err(|e| CompareError::connect(role, e))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        debug!("postgres connection closed: {}", e);
                    }
                });
                client
            }
            Some(tls) => {
                let connector = MakeRustlsConnect::new(tls);
                let (client, connection) = pg_config
                    .connect(connector)
                    .await
                    .map_err(|e| CompareError::connect(role, e))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        debug!("postgres connection closed: {}", e);
                    }
                });
                client
            }
        };

        // Timestamp canonicalization assumes a UTC session.
        client.simple_query("SET TIME ZONE 'UTC'").await?;

        info!(
            "Connected to PostgreSQL {}: {}:{}/{}",
            role, cfg.host, cfg.port, cfg.dbname
        );
        Ok(PgClient { client })
    }

    pub fn stream_fingerprints(
        self,
        query: FingerprintQuery,
    ) -> mpsc::Receiver<Result<Vec<RowFingerprint>>> {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_DEPTH);
        tokio::spawn(async move {
            let result = async {
                let params: Vec<&(dyn ToSql + Sync)> = Vec::new();
                let stream = self.client.query_raw(query.sql.as_str(), params).await?;
                pin_mut!(stream);

                let mut batch = Vec::with_capacity(query.fetch_size);
                while let Some(row) = stream.try_next().await? {
                    batch.push(fingerprint(
                        query.tid,
                        row.get(0),
                        row.get(1),
                        row.get(2),
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
        let params: Vec<&(dyn ToSql + Sync)> =
            binds.iter().map(|b| b as &(dyn ToSql + Sync)).collect();
        let row = self.client.query_opt(sql, &params).await?;
        Ok(row.map(|r| fingerprint(tid, r.get(0), r.get(1), r.get(2))))
    }

    pub async fn query_catalog_columns(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<CatalogColumn>> {
        let sql = dialect::select_columns_sql(Platform::Postgres);
        let rows = self.client.query(sql, &[&schema, &table]).await?;
        Ok(rows
            .iter()
            .map(|r| {
                catalog_column(
                    r.get(0),
                    r.get(1),
                    r.get(2),
                    r.get(3),
                    r.get(4),
                    r.get(5),
                    r.get(6),
                    r.get::<_, &str>(7),
                    r.get::<_, &str>(8),
                )
            })
            .collect())
    }

    pub async fn query_catalog_tables(&mut self, schema: &str) -> Result<Vec<CatalogTable>> {
        let sql = dialect::select_tables_sql(Platform::Postgres);
        let rows = self.client.query(sql, &[&schema]).await?;
        Ok(rows
            .iter()
            .map(|r| CatalogTable {
                owner: r.get(0),
                table_name: r.get(1),
            })
            .collect())
    }
}
