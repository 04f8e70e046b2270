//! Repository (Postgres) access: the dc_* schema, staging, findings,
//! history, and table/column-map CRUD.

pub mod ddl;

use crate::config::DbConfig;
use crate::driver::tls;
use crate::error::{CompareError, Result};
use crate::model::{
    ColumnInfo, ColumnMapEntry, DataClass, Finding, FindingStatus, RowFingerprint, Side,
    TableEntry, TableMap,
};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::Config as PgConfig;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, info};

/// Shared repository connection pool.
#[derive(Clone)]
pub struct RepoPool {
    pool: Pool,
}

impl RepoPool {
    /// Connect and verify the repository endpoint.
    pub async fn connect(cfg: &DbConfig, max_size: usize) -> Result<RepoPool> {
        let mut pg_config = PgConfig::new();
        pg_config
            .host(&cfg.host)
            .port(cfg.port)
            .dbname(&cfg.dbname)
            .user(&cfg.user)
            .password(&cfg.password);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let pool = match tls::build_tls_config("repo", &cfg.sslmode)? {
            None => {
                let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(max_size)
                    .build()
                    .map_err(|e| CompareError::pool(e, "creating repository pool"))?
            }
            Some(tls_config) => {
                let connector = MakeRustlsConnect::new(tls_config);
                let mgr = Manager::from_config(pg_config, connector, mgr_config);
                Pool::builder(mgr)
                    .max_size(max_size)
                    .build()
                    .map_err(|e| CompareError::pool(e, "creating repository pool"))?
            }
        };

        let client = pool
            .get()
            .await
            .map_err(|e| CompareError::connect("repo", e))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to repository: {}:{}/{}",
            cfg.host, cfg.port, cfg.dbname
        );
        Ok(RepoPool { pool })
    }

    /// Check out a pooled connection.
    pub async fn get(&self) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| CompareError::pool(e, "getting repository connection"))
    }

    /// Check out a connection tuned for staging ingest. Durability of
    /// staging rows is traded for sustained rate; a crash is recovered by
    /// re-running the compare.
    pub async fn loader_connection(&self) -> Result<Object> {
        let client = self.get().await?;
        client.simple_query("SET synchronous_commit = off").await?;
        client.simple_query("SET work_mem = '256MB'").await?;
        Ok(client)
    }

    /// Create the dc_* schema (the `init` action).
    pub async fn init_schema(&self) -> Result<()> {
        let client = self.get().await?;
        for stmt in ddl::CREATE_STATEMENTS {
            client.batch_execute(stmt).await?;
        }
        info!("Repository schema initialized");
        Ok(())
    }

    // ===== table registry =====

    /// Enabled tables for a project, optionally narrowed to one batch
    /// number (0 selects all) and/or one alias.
    pub async fn get_tables(
        &self,
        pid: i32,
        batch_nbr: i32,
        alias: Option<&str>,
    ) -> Result<Vec<TableEntry>> {
        let client = self.get().await?;
        let alias = alias.unwrap_or("");
        let rows = client
            .query(
                r#"SELECT tid, pid, alias, enabled, batch_nbr, parallel_degree
                   FROM dc_table
                   WHERE pid = $1 AND enabled
                     AND ($2 = 0 OR batch_nbr = $2)
                     AND ($3 = '' OR alias = $3)
                   ORDER BY tid"#,
                &[&pid, &batch_nbr, &alias],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|r| TableEntry {
                tid: r.get(0),
                pid: r.get(1),
                alias: r.get(2),
                enabled: r.get(3),
                batch_nbr: r.get(4),
                parallel_degree: r.get(5),
            })
            .collect())
    }

    /// Register a table (idempotent), returning its tid.
    pub async fn save_table(&self, pid: i32, alias: &str) -> Result<i32> {
        let client = self.get().await?;
        let row = client
            .query_one(
                r#"INSERT INTO dc_table (pid, alias)
                   VALUES ($1, $2)
                   ON CONFLICT (pid, alias) DO UPDATE SET enabled = dc_table.enabled
                   RETURNING tid"#,
                &[&pid, &alias],
            )
            .await?;
        Ok(row.get(0))
    }

    /// Both sides of a table map. Errors when either side is missing,
    /// since a tid is only reconcilable with both present.
    pub async fn get_table_maps(&self, entry: &TableEntry) -> Result<(TableMap, TableMap)> {
        let client = self.get().await?;
        let rows = client
            .query(
                r#"SELECT dest_type, schema_name, table_name, mod_column, table_filter,
                          schema_preserve_case, table_preserve_case
                   FROM dc_table_map WHERE tid = $1"#,
                &[&entry.tid],
            )
            .await?;

        let mut source = None;
        let mut target = None;
        for r in rows {
            let dest: String = r.get(0);
            let side = if dest == "source" { Side::Source } else { Side::Target };
            let map = TableMap {
                tid: entry.tid,
                side,
                schema_name: r.get(1),
                table_name: r.get(2),
                mod_column: r.get(3),
                table_filter: r.get(4),
                schema_preserve_case: r.get(5),
                table_preserve_case: r.get(6),
            };
            match side {
                Side::Source => source = Some(map),
                Side::Target => target = Some(map),
            }
        }

        match (source, target) {
            (Some(s), Some(t)) => Ok((s, t)),
            _ => Err(CompareError::map(
                &entry.alias,
                "table map must exist for both source and target",
            )),
        }
    }

    pub async fn save_table_map(&self, map: &TableMap) -> Result<()> {
        let client = self.get().await?;
        client
            .execute(
                r#"INSERT INTO dc_table_map
                     (tid, dest_type, schema_name, table_name, mod_column, table_filter,
                      schema_preserve_case, table_preserve_case)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                   ON CONFLICT (tid, dest_type) DO UPDATE SET
                     schema_name = EXCLUDED.schema_name,
                     table_name = EXCLUDED.table_name,
                     mod_column = EXCLUDED.mod_column,
                     table_filter = EXCLUDED.table_filter,
                     schema_preserve_case = EXCLUDED.schema_preserve_case,
                     table_preserve_case = EXCLUDED.table_preserve_case"#,
                &[
                    &map.tid,
                    &map.side.as_str(),
                    &map.schema_name,
                    &map.table_name,
                    &map.mod_column,
                    &map.table_filter,
                    &map.schema_preserve_case,
                    &map.table_preserve_case,
                ],
            )
            .await?;
        Ok(())
    }

    // ===== column maps =====

    /// Load the persisted column map for a tid, aligned by alias.
    pub async fn get_column_map(&self, tid: i32) -> Result<Vec<ColumnMapEntry>> {
        let client = self.get().await?;
        let rows = client
            .query(
                r#"SELECT column_alias, dest_type, column_name, data_type, data_length,
                          data_precision, data_scale, nullable, pk, data_class,
                          preserve_case, value_expression, supported
                   FROM dc_table_column_map
                   WHERE tid = $1
                   ORDER BY column_alias"#,
                &[&tid],
            )
            .await?;

        let mut entries: Vec<ColumnMapEntry> = Vec::new();
        for r in rows {
            let alias: String = r.get(0);
            let dest: String = r.get(1);
            let data_class: String = r.get(9);
            let info = ColumnInfo {
                column_name: r.get(2),
                data_type: r.get(3),
                data_length: r.get(4),
                data_precision: r.get(5),
                data_scale: r.get(6),
                nullable: r.get(7),
                primary_key: r.get(8),
                data_class: DataClass::parse(&data_class),
                preserve_case: r.get(10),
                value_expression: r.get(11),
                supported: r.get(12),
            };

            let entry = match entries.iter_mut().find(|e| e.alias == alias) {
                Some(e) => e,
                None => {
                    entries.push(ColumnMapEntry {
                        alias: alias.clone(),
                        source: None,
                        target: None,
                    });
                    entries.last_mut().unwrap()
                }
            };
            match dest.as_str() {
                "source" => entry.source = Some(info),
                _ => entry.target = Some(info),
            }
        }
        Ok(entries)
    }

    /// Replace the persisted column map for one side of a tid.
    pub async fn save_column_map(
        &self,
        tid: i32,
        side: Side,
        entries: &[ColumnMapEntry],
    ) -> Result<()> {
        let mut client = self.get().await?;
        let tx = client.transaction().await?;
        tx.execute(
            "DELETE FROM dc_table_column_map WHERE tid = $1 AND dest_type = $2",
            &[&tid, &side.as_str()],
        )
        .await?;

        let stmt = tx
            .prepare(
                r#"INSERT INTO dc_table_column_map
                     (tid, column_alias, dest_type, column_name, data_type, data_length,
                      data_precision, data_scale, nullable, pk, data_class, preserve_case,
                      value_expression, supported)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"#,
            )
            .await?;

        for entry in entries {
            if let Some(info) = entry.side(side) {
                tx.execute(
                    &stmt,
                    &[
                        &tid,
                        &entry.alias,
                        &side.as_str(),
                        &info.column_name,
                        &info.data_type,
                        &info.data_length,
                        &info.data_precision,
                        &info.data_scale,
                        &info.nullable,
                        &info.primary_key,
                        &info.data_class.as_str(),
                        &info.preserve_case,
                        &info.value_expression,
                        &info.supported,
                    ],
                )
                .await?;
            }
        }
        tx.commit().await?;
        debug!("Saved {} column map for tid {}", side, tid);
        Ok(())
    }

    // ===== staging =====

    /// Clear one side's staging slice for a tid/batch.
    pub async fn clear_staging(&self, side: Side, tid: i32, batch_nbr: i32) -> Result<u64> {
        let client = self.get().await?;
        let deleted = client
            .execute(
                &format!(
                    "DELETE FROM {} WHERE tid = $1 AND batch_nbr = $2",
                    side.staging_table()
                ),
                &[&tid, &batch_nbr],
            )
            .await?;
        Ok(deleted)
    }

    /// Insert a fingerprint batch directly (degraded mode with
    /// loader-threads = 0; loaders use their own prepared path).
    pub async fn insert_fingerprints(
        &self,
        side: Side,
        batch_nbr: i32,
        batch: &[RowFingerprint],
    ) -> Result<()> {
        let staging = side.staging_table();
        let mut client = self.get().await?;
        let result = async {
            let tx = client.transaction().await?;
            let stmt = tx
                .prepare(&format!(
                    "INSERT INTO {} (tid, batch_nbr, pk_hash, column_hash, pk) \
                     VALUES ($1, $2, $3, $4, ($5)::jsonb)",
                    staging
                ))
                .await?;
            for fp in batch {
                tx.execute(
                    &stmt,
                    &[&fp.tid, &batch_nbr, &fp.pk_hash, &fp.column_hash, &fp.pk],
                )
                .await?;
            }
            tx.commit().await?;
            Ok::<(), tokio_postgres::Error>(())
        }
        .await;
        result.map_err(|e| CompareError::load(staging, e))
    }

    /// Staged row count for one side of a tid/batch (observer watermark).
    pub async fn count_staged(&self, side: Side, tid: i32, batch_nbr: i32) -> Result<i64> {
        let client = self.get().await?;
        let row = client
            .query_one(
                &format!(
                    "SELECT COUNT(*) FROM {} WHERE tid = $1 AND batch_nbr = $2",
                    side.staging_table()
                ),
                &[&tid, &batch_nbr],
            )
            .await?;
        Ok(row.get(0))
    }

    /// VACUUM one side's staging table (observer-vacuum).
    pub async fn vacuum_staging(&self, side: Side) -> Result<()> {
        let client = self.get().await?;
        client
            .simple_query(&format!("VACUUM {}", side.staging_table()))
            .await?;
        Ok(())
    }

    // ===== findings =====

    pub async fn clear_findings(&self, side: Side, tid: i32, batch_nbr: i32) -> Result<u64> {
        let client = self.get().await?;
        let deleted = client
            .execute(
                &format!(
                    "DELETE FROM {} WHERE tid = $1 AND batch_nbr = $2",
                    side.findings_table()
                ),
                &[&tid, &batch_nbr],
            )
            .await?;
        Ok(deleted)
    }

    /// All findings for a tid/batch across both sides.
    pub async fn get_findings(&self, tid: i32, batch_nbr: i32) -> Result<Vec<Finding>> {
        let client = self.get().await?;
        let rows = client
            .query(
                r#"SELECT 'source' AS side, tid, batch_nbr, pk, status
                   FROM dc_source_findings WHERE tid = $1 AND batch_nbr = $2
                   UNION ALL
                   SELECT 'target' AS side, tid, batch_nbr, pk, status
                   FROM dc_target_findings WHERE tid = $1 AND batch_nbr = $2"#,
                &[&tid, &batch_nbr],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|r| {
                let side: String = r.get(0);
                let status: String = r.get(4);
                Finding {
                    tid: r.get(1),
                    batch_nbr: r.get(2),
                    side: if side == "source" { Side::Source } else { Side::Target },
                    pk: r.get(3),
                    status: FindingStatus::parse(&status),
                }
            })
            .collect())
    }

    /// Remove a cleared finding (recheck outcome `resolved`).
    pub async fn delete_finding(&self, finding: &Finding) -> Result<u64> {
        let client = self.get().await?;
        let deleted = client
            .execute(
                &format!(
                    "DELETE FROM {} WHERE tid = $1 AND batch_nbr = $2 AND pk = $3",
                    finding.side.findings_table()
                ),
                &[&finding.tid, &finding.batch_nbr, &finding.pk],
            )
            .await?;
        Ok(deleted)
    }

    // ===== history =====

    pub async fn start_table_history(&self, tid: i32, action: &str, batch_nbr: i32) -> Result<()> {
        let client = self.get().await?;
        client
            .execute(
                "INSERT INTO dc_table_history (tid, action, batch_nbr) VALUES ($1, $2, $3)",
                &[&tid, &action, &batch_nbr],
            )
            .await?;
        Ok(())
    }

    pub async fn complete_table_history(
        &self,
        tid: i32,
        action: &str,
        batch_nbr: i32,
        result: &serde_json::Value,
    ) -> Result<()> {
        let client = self.get().await?;
        client
            .execute(
                r#"UPDATE dc_table_history
                   SET end_ts = NOW(), result = $4
                   WHERE tid = $1 AND action = $2 AND batch_nbr = $3 AND end_ts IS NULL"#,
                &[&tid, &action, &batch_nbr, result],
            )
            .await?;
        Ok(())
    }

    // ===== copy-table =====

    /// Duplicate a table entry (with its table and column maps) under a new
    /// alias, returning the new tid.
    pub async fn copy_table(&self, pid: i32, from_alias: &str, to_alias: &str) -> Result<i32> {
        let mut client = self.get().await?;
        let tx = client.transaction().await?;

        let old = tx
            .query_opt(
                "SELECT tid FROM dc_table WHERE pid = $1 AND alias = $2",
                &[&pid, &from_alias],
            )
            .await?
            .ok_or_else(|| {
                CompareError::config(format!("copy-table: no table with alias '{}'", from_alias))
            })?;
        let old_tid: i32 = old.get(0);

        let new = tx
            .query_one(
                r#"INSERT INTO dc_table (pid, alias, enabled, batch_nbr, parallel_degree)
                   SELECT pid, $2, enabled, batch_nbr, parallel_degree
                   FROM dc_table WHERE tid = $1
                   RETURNING tid"#,
                &[&old_tid, &to_alias],
            )
            .await?;
        let new_tid: i32 = new.get(0);

        tx.execute(
            r#"INSERT INTO dc_table_map
                 (tid, dest_type, schema_name, table_name, mod_column, table_filter,
                  schema_preserve_case, table_preserve_case)
               SELECT $2, dest_type, schema_name, table_name, mod_column, table_filter,
                      schema_preserve_case, table_preserve_case
               FROM dc_table_map WHERE tid = $1"#,
            &[&old_tid, &new_tid],
        )
        .await?;

        tx.execute(
            r#"INSERT INTO dc_table_column_map
                 (tid, column_alias, dest_type, column_name, data_type, data_length,
                  data_precision, data_scale, nullable, pk, data_class, preserve_case,
                  value_expression, supported)
               SELECT $2, column_alias, dest_type, column_name, data_type, data_length,
                      data_precision, data_scale, nullable, pk, data_class, preserve_case,
                      value_expression, supported
               FROM dc_table_column_map WHERE tid = $1"#,
            &[&old_tid, &new_tid],
        )
        .await?;

        tx.commit().await?;
        info!(
            "Copied table '{}' (tid {}) to '{}' (tid {})",
            from_alias, old_tid, to_alias, new_tid
        );
        Ok(new_tid)
    }
}
