//! cinder-server entry point.
//!
//! Startup order: config → data dir → recovery → log channel + AOF
//! writer thread → snapshot timer → listener. Shutdown (ctrl-c) closes
//! the log channel first so the writer drains and fsyncs, then writes
//! a final snapshot.

mod config;
mod connection;
mod server;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cinder_core::Store;
use cinder_persistence::{aof, recovery, snapshot};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// How often the snapshot timer fires.
const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinder=info".into()),
        )
        .init();

    let config = config::Config::from_env();
    let data_dir = Path::new(&config.data_dir).to_path_buf();

    if config.use_rdb || config.use_aof {
        if let Err(e) = std::fs::create_dir_all(&data_dir) {
            error!("failed to create data directory {}: {e}", data_dir.display());
            std::process::exit(1);
        }
    }

    let store = Arc::new(Store::new());

    // recovery runs before the log channel exists, so replayed writes
    // are never re-appended to the file being read
    if config.use_rdb || config.use_aof {
        recovery::recover(&store, &data_dir, config.use_rdb, config.use_aof).await;
    }

    let mut aof_thread = None;
    if config.use_aof {
        let (tx, rx) = mpsc::channel(aof::CHANNEL_CAPACITY);
        store.attach_log(tx);
        aof_thread = Some(aof::spawn_writer(aof::aof_path(&data_dir), rx));
        info!("append-only file enabled");
    }

    if config.use_rdb {
        let store = store.clone();
        let dir = data_dir.clone();
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(SNAPSHOT_INTERVAL);
            // the first tick completes immediately; skip it
            timer.tick().await;
            loop {
                timer.tick().await;
                let snap = store.snapshot().await;
                match snapshot::save(&snapshot::snapshot_path(&dir), &snap) {
                    Ok(()) => info!("snapshot saved"),
                    Err(e) => warn!("periodic snapshot failed: {e}"),
                }
            }
        });
        info!("snapshot persistence enabled");
    }

    let addr = config.bind_addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    info!(version = env!("CARGO_PKG_VERSION"), "listening on {addr}");

    let config = Arc::new(config);
    tokio::select! {
        result = server::run(listener, store.clone(), config.clone()) => {
            if let Err(e) = result {
                error!("accept loop failed: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    // close the channel so the writer drains, flushes, and exits
    store.close_log();
    if let Some(handle) = aof_thread {
        let _ = tokio::task::spawn_blocking(move || handle.join()).await;
    }

    if config.use_rdb {
        let snap = store.snapshot().await;
        match snapshot::save(&snapshot::snapshot_path(&data_dir), &snap) {
            Ok(()) => info!("final snapshot written"),
            Err(e) => warn!("final snapshot failed: {e}"),
        }
    }

    info!("bye");
}
