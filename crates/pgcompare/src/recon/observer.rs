//! Observer: throttling supervisor for one table's compare.
//!
//! Watches the in-flight volume (rows extracted but not yet persisted by
//! the loaders) and raises the throttle flag when it passes the watermark;
//! extractors stall before their next enqueue until the loaders drain the
//! backlog below half the watermark. Optionally vacuums the staging
//! tables while the run is in flight.

use super::sync::SyncState;
use crate::config::Config;
use crate::model::Side;
use crate::repo::RepoPool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Interval between observer checks.
const OBSERVER_INTERVAL: Duration = Duration::from_secs(2);

/// Checks between optional VACUUM passes.
const VACUUM_EVERY: u32 = 30;

pub async fn run_observer(
    cfg: Arc<Config>,
    repo: RepoPool,
    sync: Arc<SyncState>,
    cancel: CancellationToken,
) {
    if !cfg.observer_throttle {
        return;
    }

    let watermark = cfg.observer_throttle_size;
    let clear_below = watermark / 2;
    let mut ticks: u32 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(OBSERVER_INTERVAL) => {}
        }
        ticks += 1;

        let backlog = sync.backlog();
        if !sync.is_throttled() && backlog > watermark {
            warn!(
                "observer: backlog {} rows exceeds watermark {}, throttling extractors",
                backlog, watermark
            );
            sync.set_throttle(true);
        } else if sync.is_throttled() && backlog < clear_below {
            info!(
                "observer: backlog drained to {} rows, releasing extractors",
                backlog
            );
            sync.set_throttle(false);
        }

        if cfg.observer_vacuum && ticks % VACUUM_EVERY == 0 {
            for side in [Side::Source, Side::Target] {
                if let Err(e) = repo.vacuum_staging(side).await {
                    debug!("observer: vacuum of {} failed: {}", side.staging_table(), e);
                }
            }
        }
    }

    // Never leave extractors stalled on shutdown.
    sync.set_throttle(false);
}
