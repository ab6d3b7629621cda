//! The append-only command log.
//!
//! One line per write command, fields separated by single spaces,
//! terminated by `\n`:
//!
//! ```text
//! SET      <db> <key> <value>
//! DEL      <db> <key>
//! SETNX    <db> <key> <value>
//! EXPIRE   <db> <key> <seconds>
//! INCR     <db> <key>
//! DECR     <db> <key>
//! LPUSH    <db> <key> <v1> <v2> ...
//! RPUSH    <db> <key> <v1> <v2> ...
//! LPOP     <db> <key> <count>
//! RPOP     <db> <key> <count>
//! LTRIM    <db> <key> <start> <stop>
//! RENAME   <db> <src> <dst>
//! FLUSHDB  <db>
//! FLUSHALL
//! ```
//!
//! The writer is a dedicated OS thread that drains the store's bounded
//! log channel; it is the single consumer and the only owner of the
//! file handle. A write failure is fatal: the process exits rather
//! than accept writes it cannot durably record. Replay re-joins the
//! token tail for SET/SETNX so single-space values round-trip;
//! multi-value pushes remain one token per value.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use cinder_core::{Store, DB_COUNT};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// File name of the append-only log inside the data directory.
pub const AOF_FILE: &str = "appendonly.aof";

/// Capacity of the command-log channel. Writers block when the AOF
/// thread falls this many records behind.
pub const CHANNEL_CAPACITY: usize = 100;

/// Returns the AOF path inside a data directory.
pub fn aof_path(data_dir: &Path) -> PathBuf {
    data_dir.join(AOF_FILE)
}

/// Buffered writer for appending log lines to the file.
pub struct AofWriter {
    writer: BufWriter<File>,
}

impl AofWriter {
    /// Opens (or creates) the log file for appending.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Appends one record followed by a newline and flushes it to the OS.
    pub fn append(&mut self, record: &str) -> io::Result<()> {
        self.writer.write_all(record.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    /// Flushes and fsyncs the file.
    pub fn sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }
}

/// Spawns the log-writer thread: the single consumer of the command
/// channel. Exits when the channel closes (after a final flush and
/// fsync) or the process dies on a write error.
pub fn spawn_writer(path: PathBuf, mut rx: mpsc::Receiver<String>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut writer = match AofWriter::open(&path) {
            Ok(writer) => writer,
            Err(e) => {
                error!("failed to open append-only file {}: {e}", path.display());
                std::process::exit(1);
            }
        };

        while let Some(record) = rx.blocking_recv() {
            if let Err(e) = writer.append(&record) {
                error!("failed to write to append-only file: {e}");
                std::process::exit(1);
            }
        }

        // channel closed: shutdown path
        if let Err(e) = writer.sync() {
            error!("failed to sync append-only file: {e}");
            std::process::exit(1);
        }
        info!("append-only file writer stopped");
    })
}

/// Replays the log file against a store, line by line.
///
/// The store must have no log channel attached, so replayed writes are
/// not re-appended to the file being read. Unknown commands and
/// malformed lines are logged and skipped. Returns the number of lines
/// applied.
pub async fn replay(store: &Store, path: &Path) -> io::Result<usize> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut applied = 0usize;

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        match apply_line(store, &line).await {
            Ok(()) => applied += 1,
            Err(reason) => warn!(%line, reason, "skipping log line"),
        }
    }

    Ok(applied)
}

/// Applies one log line to the store. Errors describe why the line
/// was skipped.
async fn apply_line(store: &Store, line: &str) -> Result<(), &'static str> {
    let tokens: Vec<&str> = line.split(' ').collect();

    if tokens[0] == "FLUSHALL" {
        store.flush_all().await;
        return Ok(());
    }

    let db = tokens
        .get(1)
        .and_then(|t| t.parse::<usize>().ok())
        .filter(|db| *db < DB_COUNT)
        .ok_or("invalid database index")?;

    match tokens[0] {
        "SET" => {
            if tokens.len() < 4 {
                return Err("malformed SET");
            }
            let value = Bytes::from(tokens[3..].join(" "));
            store.set(db, tokens[2], value, None, false, false).await;
            Ok(())
        }
        "SETNX" => {
            if tokens.len() < 4 {
                return Err("malformed SETNX");
            }
            let value = Bytes::from(tokens[3..].join(" "));
            store.set_nx(db, tokens[2], value).await;
            Ok(())
        }
        "DEL" => {
            if tokens.len() != 3 {
                return Err("malformed DEL");
            }
            store.del(db, tokens[2]).await;
            Ok(())
        }
        "EXPIRE" => {
            if tokens.len() != 4 {
                return Err("malformed EXPIRE");
            }
            let seconds = tokens[3].parse::<i64>().map_err(|_| "invalid TTL")?;
            store.expire(db, tokens[2], seconds).await;
            Ok(())
        }
        "INCR" => {
            if tokens.len() != 3 {
                return Err("malformed INCR");
            }
            store
                .incr(db, tokens[2])
                .await
                .map_err(|_| "INCR target is not an integer")?;
            Ok(())
        }
        "DECR" => {
            if tokens.len() != 3 {
                return Err("malformed DECR");
            }
            store
                .decr(db, tokens[2])
                .await
                .map_err(|_| "DECR target is not an integer")?;
            Ok(())
        }
        "LPUSH" | "RPUSH" => {
            if tokens.len() < 4 {
                return Err("malformed push");
            }
            let values: Vec<Bytes> = tokens[3..]
                .iter()
                .map(|t| Bytes::copy_from_slice(t.as_bytes()))
                .collect();
            let result = if tokens[0] == "LPUSH" {
                store.lpush(db, tokens[2], &values).await
            } else {
                store.rpush(db, tokens[2], &values).await
            };
            result.map_err(|_| "push target is not a list")?;
            Ok(())
        }
        "LPOP" | "RPOP" => {
            if tokens.len() != 4 {
                return Err("malformed pop");
            }
            let count = tokens[3].parse::<i64>().map_err(|_| "invalid count")?;
            let result = if tokens[0] == "LPOP" {
                store.lpop(db, tokens[2], Some(count)).await
            } else {
                store.rpop(db, tokens[2], Some(count)).await
            };
            result.map_err(|_| "pop target is not a list")?;
            Ok(())
        }
        "LTRIM" => {
            if tokens.len() != 5 {
                return Err("malformed LTRIM");
            }
            let start = tokens[3].parse::<i64>().map_err(|_| "invalid range")?;
            let stop = tokens[4].parse::<i64>().map_err(|_| "invalid range")?;
            store
                .ltrim(db, tokens[2], start, stop)
                .await
                .map_err(|_| "LTRIM target is not a list")?;
            Ok(())
        }
        "RENAME" => {
            if tokens.len() != 4 {
                return Err("malformed RENAME");
            }
            store
                .rename(db, tokens[2], tokens[3])
                .await
                .map_err(|_| "RENAME source missing")?;
            Ok(())
        }
        "FLUSHDB" => {
            if tokens.len() != 2 {
                return Err("malformed FLUSHDB");
            }
            store.flush_db(db).await;
            Ok(())
        }
        _ => Err("unknown command"),
    }
}
