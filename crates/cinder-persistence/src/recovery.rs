//! Startup recovery.
//!
//! The recovery sequence, run once before the server accepts
//! connections and before the log channel is attached:
//! 1. If snapshots are enabled and a snapshot file exists, load it and
//!    install it into the store.
//! 2. Otherwise, if the command log is enabled and a log file exists,
//!    replay it.
//! 3. Otherwise start empty. Corrupt files log a warning and fall
//!    through to the next source.
//!
//! This module is the only caller of snapshot-load and replay.

use std::path::Path;

use cinder_core::Store;
use tracing::{info, warn};

use crate::{aof, snapshot};

/// What recovery found and applied.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryOutcome {
    /// A snapshot was loaded.
    pub loaded_snapshot: bool,
    /// The command log was replayed.
    pub replayed_aof: bool,
}

/// Rebuilds store state from the persisted artifacts in `data_dir`.
pub async fn recover(
    store: &Store,
    data_dir: &Path,
    use_rdb: bool,
    use_aof: bool,
) -> RecoveryOutcome {
    let mut outcome = RecoveryOutcome::default();

    if use_rdb {
        let path = snapshot::snapshot_path(data_dir);
        if path.exists() {
            match snapshot::load(&path) {
                Ok(dbs) => {
                    let entries: usize = dbs.iter().map(Vec::len).sum();
                    store.install_snapshot(dbs).await;
                    outcome.loaded_snapshot = true;
                    info!(entries, "restored state from snapshot");
                }
                Err(e) => {
                    warn!("failed to load snapshot, falling back to log replay: {e}");
                }
            }
        }
    }

    if use_aof && !outcome.loaded_snapshot {
        let path = aof::aof_path(data_dir);
        if path.exists() {
            match aof::replay(store, &path).await {
                Ok(records) => {
                    outcome.replayed_aof = true;
                    info!(records, "rebuilt state from append-only file");
                }
                Err(e) => {
                    warn!("failed to replay append-only file: {e}");
                }
            }
        }
    }

    if !outcome.loaded_snapshot && !outcome.replayed_aof {
        info!("no recovery artifacts found, starting with an empty store");
    }

    outcome
}
