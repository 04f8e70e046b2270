//! SQL Server source/target client (Tiberius).

use super::{catalog_column, fingerprint, FingerprintQuery, STREAM_CHANNEL_DEPTH};
use crate::config::DbConfig;
use crate::error::{CompareError, Result};
use crate::model::{CatalogColumn, CatalogTable, RowFingerprint};
use futures::TryStreamExt;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Query};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::info;

pub struct MssqlClient {
    client: Client<Compat<TcpStream>>,
}

impl MssqlClient {
    pub async fn connect(role: &str, cfg: &DbConfig) -> Result<MssqlClient> {
        let mut config = Config::new();
        config.host(&cfg.host);
        config.port(cfg.port);
        config.database(&cfg.dbname);
        config.authentication(AuthMethod::sql_server(&cfg.user, &cfg.password));
        match cfg.sslmode.as_str() {
            "disable" => config.encryption(EncryptionLevel::NotSupported),
            _ => {
                // prefer/require encrypt without peer verification.
                config.trust_cert();
                config.encryption(EncryptionLevel::Required);
            }
        }

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| CompareError::connect(role, e))?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| CompareError::connect(role, e))?;

        info!(
            "Connected to SQL Server {}: {}:{}/{}",
            role, cfg.host, cfg.port, cfg.dbname
        );
        Ok(MssqlClient { client })
    }

    pub fn stream_fingerprints(
        mut self,
        query: FingerprintQuery,
    ) -> mpsc::Receiver<Result<Vec<RowFingerprint>>> {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_DEPTH);
        tokio::spawn(async move {
            let result = async {
                let mut stream = self.client.query(query.sql.as_str(), &[]).await?;
                let mut batch = Vec::with_capacity(query.fetch_size);
                while let Some(item) = stream.try_next().await? {
                    if let Some(row) = item.as_row() {
                        batch.push(fingerprint(
                            query.tid,
                            row.get::<&str, _>(0).map(str::to_string),
                            row.get::<&str, _>(1).map(str::to_string),
                            row.get::<&str, _>(2).map(str::to_string),
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
        let mut query = Query::new(sql.to_string());
        for bind in binds {
            query.bind(bind.as_str());
        }
        let row = query.query(&mut self.client).await?.into_row().await?;
        Ok(row.map(|r| {
            fingerprint(
                tid,
                r.get::<&str, _>(0).map(str::to_string),
                r.get::<&str, _>(1).map(str::to_string),
                r.get::<&str, _>(2).map(str::to_string),
            )
        }))
    }

    pub async fn query_catalog_columns(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<CatalogColumn>> {
        let sql = crate::dialect::select_columns_sql(crate::dialect::Platform::Mssql);
        let mut query = Query::new(sql.to_string());
        query.bind(schema);
        query.bind(table);
        let rows = query
            .query(&mut self.client)
            .await?
            .into_first_result()
            .await?;
        Ok(rows
            .iter()
            .map(|r| {
                catalog_column(
                    r.get::<&str, _>(0).unwrap_or_default().to_string(),
                    r.get::<&str, _>(1).unwrap_or_default().to_string(),
                    r.get::<&str, _>(2).unwrap_or_default().to_string(),
                    r.get::<&str, _>(3).unwrap_or_default().to_string(),
                    r.get::<i32, _>(4).unwrap_or(0),
                    r.get::<i32, _>(5).unwrap_or(0),
                    r.get::<i32, _>(6).unwrap_or(0),
                    r.get::<&str, _>(7).unwrap_or("N"),
                    r.get::<&str, _>(8).unwrap_or("N"),
                )
            })
            .collect())
    }

    pub async fn query_catalog_tables(&mut self, schema: &str) -> Result<Vec<CatalogTable>> {
        let sql = crate::dialect::select_tables_sql(crate::dialect::Platform::Mssql);
        let mut query = Query::new(sql.to_string());
        query.bind(schema);
        let rows = query
            .query(&mut self.client)
            .await?
            .into_first_result()
            .await?;
        Ok(rows
            .iter()
            .map(|r| CatalogTable {
                owner: r.get::<&str, _>(0).unwrap_or_default().to_string(),
                table_name: r.get::<&str, _>(1).unwrap_or_default().to_string(),
            })
            .collect())
    }
}
