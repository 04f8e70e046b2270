//! Reconciler: drives extractors, loaders, and the observer for each
//! table, then classifies staged rows and records verdicts.

pub mod compare;
pub mod extract;
pub mod load;
pub mod observer;
pub mod queue;
pub mod recheck;
pub mod sync;

use crate::cast;
use crate::config::Config;
use crate::error::{CompareError, Result};
use crate::mapping::{self, CompiledTable};
use crate::model::{
    RunMode, RunSummary, Side, TableEntry, TableMap, TableResult, TableStatus,
};
use crate::repo::RepoPool;
use chrono::Utc;
use extract::ShardSpec;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Which tables one invocation touches.
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    /// Batch number; 0 selects every batch.
    pub batch_nbr: i32,
    /// Restrict to one table alias.
    pub table: Option<String>,
    /// Compile and persist column maps, skip the data pass.
    pub map_only: bool,
}

pub struct Reconciler {
    cfg: Arc<Config>,
    repo: RepoPool,
    cancel: CancellationToken,
}

impl Reconciler {
    pub fn new(cfg: Arc<Config>, repo: RepoPool, cancel: CancellationToken) -> Self {
        Self { cfg, repo, cancel }
    }

    /// Reconcile every selected table sequentially.
    pub async fn run(&self, mode: RunMode, filter: &RunFilter) -> Result<RunSummary> {
        let started_at = Utc::now();
        let tables = self
            .repo
            .get_tables(self.cfg.project, filter.batch_nbr, filter.table.as_deref())
            .await?;

        if tables.is_empty() {
            warn!(
                "No enabled tables for project {} (batch {}, table {:?})",
                self.cfg.project, filter.batch_nbr, filter.table
            );
        }

        let mut results = Vec::with_capacity(tables.len());
        for entry in tables {
            if self.cancel.is_cancelled() {
                let mut result = TableResult::new(&entry.alias, entry.tid, entry.batch_nbr);
                result.status = TableStatus::Skipped;
                results.push(result);
                continue;
            }

            let result = match self.run_table(&entry, mode, filter.map_only).await {
                Ok(result) => result,
                Err(CompareError::Cancelled) => {
                    let mut result =
                        TableResult::new(&entry.alias, entry.tid, entry.batch_nbr);
                    result.status = TableStatus::Skipped;
                    result
                }
                Err(e) => {
                    error!("Table {} failed: {}", entry.alias, e);
                    let mut result =
                        TableResult::new(&entry.alias, entry.tid, entry.batch_nbr);
                    result.status = TableStatus::Failed;
                    result
                }
            };
            results.push(result);
        }

        Ok(RunSummary {
            started_at,
            completed_at: Utc::now(),
            tables: results,
        })
    }

    async fn run_table(
        &self,
        entry: &TableEntry,
        mode: RunMode,
        map_only: bool,
    ) -> Result<TableResult> {
        let clock = Instant::now();
        let mut result = TableResult::new(&entry.alias, entry.tid, entry.batch_nbr);

        let (source_map, target_map) = self.repo.get_table_maps(entry).await?;
        let entries = self.repo.get_column_map(entry.tid).await?;
        if entries.is_empty() {
            return Err(CompareError::map(
                &entry.alias,
                "no column map found; run discover first",
            ));
        }

        if map_only {
            self.recompile_column_maps(entry).await?;
            result.status = TableStatus::Compared;
            return Ok(result);
        }

        let compiled = mapping::compile(
            self.cfg.source.platform,
            self.cfg.target.platform,
            entries,
            &entry.alias,
        )?;

        let action = match mode {
            RunMode::Compare => "reconcile",
            RunMode::Check => "recheck",
        };
        self.repo
            .start_table_history(entry.tid, action, entry.batch_nbr)
            .await?;

        let outcome = match mode {
            RunMode::Compare => {
                self.compare_table(entry, &source_map, &target_map, &compiled, &mut result)
                    .await
            }
            RunMode::Check => {
                result.status = TableStatus::Rechecking;
                let summary = recheck::run_recheck(
                    &self.cfg,
                    &self.repo,
                    entry,
                    &source_map,
                    &target_map,
                    &compiled,
                )
                .await?;
                result.recheck = Some(summary);
                result.status = TableStatus::Rechecked;
                Ok(())
            }
        };

        result.elapsed_ms = clock.elapsed().as_millis() as u64;
        let elapsed_secs = (result.elapsed_ms as i64 / 1000).max(1);
        result.rows_per_second = result.counts.total() / elapsed_secs;

        let history = serde_json::to_value(&result)?;
        self.repo
            .complete_table_history(entry.tid, action, entry.batch_nbr, &history)
            .await?;

        outcome.map(|_| result)
    }

    /// Full extract/load/compare pass for one table.
    async fn compare_table(
        &self,
        entry: &TableEntry,
        source_map: &TableMap,
        target_map: &TableMap,
        compiled: &CompiledTable,
        result: &mut TableResult,
    ) -> Result<()> {
        result.status = TableStatus::Running;
        info!(
            "Start reconciliation for {} (tid {}, batch {})",
            entry.alias, entry.tid, entry.batch_nbr
        );

        for side in [Side::Source, Side::Target] {
            self.repo
                .clear_staging(side, entry.tid, entry.batch_nbr)
                .await?;
            self.repo
                .clear_findings(side, entry.tid, entry.batch_nbr)
                .await?;
        }

        let sync = Arc::new(sync::SyncState::new());
        let observer_cancel = self.cancel.child_token();
        let observer = tokio::spawn(observer::run_observer(
            Arc::clone(&self.cfg),
            self.repo.clone(),
            Arc::clone(&sync),
            observer_cancel.clone(),
        ));

        let mut extractor_handles = Vec::new();
        let mut loader_handles = Vec::new();

        for (side, table_map, compiled_side) in [
            (Side::Source, source_map, &compiled.source),
            (Side::Target, target_map, &compiled.target),
        ] {
            let platform = self.cfg.side(side).platform;
            let mod_column = table_map.mod_column.as_deref().and_then(|name| {
                extract::resolve_mod_column(platform, &compiled.entries, side, name)
            });
            // Sharding needs a mod column; without one the side runs a
            // single extractor.
            let shards = match mod_column {
                Some(_) => entry.parallel_degree.max(1),
                None => 1,
            };

            let (tx, rx) = if self.cfg.loader_threads > 0 {
                let (tx, rx) = queue::batch_queue(self.cfg.message_queue_size);
                (Some(tx), Some(rx))
            } else {
                (None, None)
            };

            if let Some(rx) = rx {
                for loader_nbr in 0..self.cfg.loader_threads {
                    loader_handles.push(tokio::spawn(load::run_loader(
                        self.repo.clone(),
                        side,
                        entry.batch_nbr,
                        rx.clone(),
                        Arc::clone(&sync),
                        self.cfg.batch_commit_size,
                        loader_nbr,
                    )));
                }
            }

            for shard in 0..shards {
                let spec = ShardSpec {
                    side,
                    shard,
                    shard_count: shards,
                    tid: entry.tid,
                    batch_nbr: entry.batch_nbr,
                };
                let sql = extract::build_extract_sql(
                    platform,
                    table_map,
                    compiled_side,
                    &spec,
                    mod_column.as_ref(),
                    self.cfg.database_sort,
                );
                sync.extractor_started(side);
                extractor_handles.push(tokio::spawn(extract::run_extractor(
                    Arc::clone(&self.cfg),
                    entry.alias.clone(),
                    spec,
                    sql,
                    tx.clone(),
                    self.repo.clone(),
                    Arc::clone(&sync),
                    self.cancel.clone(),
                )));
            }
            // The extractors own the only senders now; the channel closes
            // when the last shard finishes.
            drop(tx);
        }

        let mut failed_shards = 0usize;
        for handle in extractor_handles {
            match handle.await {
                Ok(Ok(_)) => {}
                Ok(Err(CompareError::Cancelled)) => {}
                Ok(Err(_)) => failed_shards += 1,
                Err(e) => {
                    error!("extractor task panicked: {}", e);
                    failed_shards += 1;
                }
            }
        }
        for handle in loader_handles {
            if let Err(e) = handle.await {
                error!("loader task panicked: {}", e);
            }
        }
        observer_cancel.cancel();
        let _ = observer.await;

        if self.cancel.is_cancelled() {
            // Workers drained cleanly; staging rows remain for inspection
            // and no findings are written.
            return Err(CompareError::Cancelled);
        }

        if failed_shards > 0 || sync.extract_errors() > 0 {
            result.status = TableStatus::Failed;
            return Err(CompareError::extract(
                &entry.alias,
                format!("{} extractor shard(s) failed", failed_shards.max(1)),
            ));
        }

        info!(
            "Extract complete for {}: source={} target={} rows",
            entry.alias,
            sync.rows_extracted(Side::Source),
            sync.rows_extracted(Side::Target)
        );

        result.counts = compare::run_compare(&self.repo, entry.tid, entry.batch_nbr).await?;
        result.status = TableStatus::Compared;
        Ok(())
    }

    /// Recompile every persisted value expression from the stored column
    /// metadata and current cast options (`--map-only`).
    async fn recompile_column_maps(&self, entry: &TableEntry) -> Result<()> {
        let mut entries = self.repo.get_column_map(entry.tid).await?;
        let opts = self.cfg.cast_options();

        for map_entry in &mut entries {
            for (side, platform) in [
                (Side::Source, self.cfg.source.platform),
                (Side::Target, self.cfg.target.platform),
            ] {
                let info = match side {
                    Side::Source => map_entry.source.as_mut(),
                    Side::Target => map_entry.target.as_mut(),
                };
                if let Some(info) = info {
                    let quoted = platform.quote(&info.column_name, info.preserve_case);
                    info.value_expression = cast::cast_expr(
                        platform,
                        &quoted,
                        &info.data_type,
                        info.data_precision,
                        info.data_scale,
                        &opts,
                    );
                }
            }
        }

        self.repo
            .save_column_map(entry.tid, Side::Source, &entries)
            .await?;
        self.repo
            .save_column_map(entry.tid, Side::Target, &entries)
            .await?;
        info!("Recompiled column map for {} (map-only)", entry.alias);
        Ok(())
    }
}
