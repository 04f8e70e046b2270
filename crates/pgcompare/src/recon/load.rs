//! Loader workers: drain fingerprint batches from the queue into the
//! side's staging table with a prepared batched insert.

use super::queue::{BatchReceiver, Poll};
use super::sync::SyncState;
use crate::error::Result;
use crate::model::{RowFingerprint, Side};
use crate::repo::RepoPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Queue poll timeout; bounds how often a loader re-checks for shutdown.
const POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Run one loader worker until the queue closes and drains.
///
/// A failed commit group is rolled back and logged, and loading continues:
/// the downstream effect is indistinguishable from missing rows, which a
/// rerun resolves.
pub async fn run_loader(
    repo: RepoPool,
    side: Side,
    batch_nbr: i32,
    queue: BatchReceiver,
    sync: Arc<SyncState>,
    commit_size: usize,
    loader_nbr: usize,
) -> Result<u64> {
    let worker = format!("loader-{}-t{}", side, loader_nbr);
    info!("{}: start repository loader", worker);

    let mut client = repo.loader_connection().await?;
    let insert_sql = format!(
        "INSERT INTO {} (tid, batch_nbr, pk_hash, column_hash, pk) \
         VALUES ($1, $2, $3, $4, ($5)::jsonb)",
        side.staging_table()
    );
    let stmt = client.prepare(&insert_sql).await?;

    let mut buffer: Vec<RowFingerprint> = Vec::with_capacity(commit_size);
    let mut total: u64 = 0;

    loop {
        match queue.poll(POLL_TIMEOUT).await {
            Poll::Batch(batch) => {
                // Empty batches are end-of-shard sentinels.
                if batch.is_empty() {
                    continue;
                }
                buffer.extend(batch);
                while buffer.len() >= commit_size {
                    let group: Vec<RowFingerprint> =
                        buffer.drain(..commit_size).collect();
                    total += flush(&mut client, &stmt, side, batch_nbr, &group, &sync, &worker)
                        .await;
                }
            }
            Poll::Timeout => continue,
            Poll::Closed => break,
        }
    }

    if !buffer.is_empty() {
        total += flush(&mut client, &stmt, side, batch_nbr, &buffer, &sync, &worker).await;
    }

    sync.loader_finished();
    info!("{}: loader complete, {} rows", worker, total);
    Ok(total)
}

/// Insert one commit group inside a transaction. Returns the number of
/// rows persisted (zero when the group rolls back).
async fn flush(
    client: &mut deadpool_postgres::Object,
    stmt: &tokio_postgres::Statement,
    side: Side,
    batch_nbr: i32,
    group: &[RowFingerprint],
    sync: &SyncState,
    worker: &str,
) -> u64 {
    let result = async {
        let tx = client.transaction().await?;
        for fp in group {
            tx.execute(
                stmt,
                &[&fp.tid, &batch_nbr, &fp.pk_hash, &fp.column_hash, &fp.pk],
            )
            .await?;
        }
        tx.commit().await?;
        Ok::<(), tokio_postgres::Error>(())
    }
    .await;

    match result {
        Ok(()) => {
            let rows = group.len() as u64;
            sync.add_rows_loaded(side, rows);
            debug!("{}: committed {} rows", worker, rows);
            rows
        }
        Err(e) => {
            // Batch is lost; the compare reports the rows as missing and a
            // rerun is always safe.
            warn!("{}: batch insert failed, rolled back: {}", worker, e);
            0
        }
    }
}
