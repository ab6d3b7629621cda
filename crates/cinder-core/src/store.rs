//! The multi-database store.
//!
//! Binds sixteen independent [`Keyspace`]s behind a single
//! reader-writer lock and owns the send half of the command-log
//! channel. Read commands acquire the lock in shared mode and never
//! mutate; write commands acquire it exclusively, apply the primitive,
//! and append a canonical log line to the channel while the guard is
//! still held, so the log order always matches the commit order. A
//! full channel applies back-pressure to the writing command.
//!
//! Log lines follow the append-only file grammar: space-separated
//! fields starting with the uppercase command name and the database
//! index. Values are rendered as UTF-8 (lossily for binary data);
//! values containing whitespace do not survive a replay round-trip,
//! which is a known limitation of the line format.

use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use regex::Regex;
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tracing::error;

use crate::keyspace::{
    glob_to_regex, IncrError, Keyspace, PopError, Popped, RenameError, SetOutcome, TtlResult,
    WrongType,
};
use crate::value::Value;

/// Number of databases in a store. Fixed for the store's lifetime.
pub const DB_COUNT: usize = 16;

/// Error returned when a KEYS/SCAN pattern fails to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPattern(pub String);

impl std::fmt::Display for InvalidPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ERR invalid pattern: {}", self.0)
    }
}

impl std::error::Error for InvalidPattern {}

/// An owned copy of one entry, produced by [`Store::snapshot`].
///
/// `expire_ms` is the remaining TTL in milliseconds, or -1 for no
/// expiration.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub key: String,
    pub value: Value,
    pub expire_ms: i64,
}

/// The store: sixteen keyspaces, one lock, one log channel.
pub struct Store {
    dbs: RwLock<Vec<Keyspace>>,
    log: Mutex<Option<mpsc::Sender<String>>>,
}

impl Store {
    /// Creates a store with sixteen empty keyspaces and no log
    /// channel attached. Recovery runs against this state so replayed
    /// writes are not re-logged.
    pub fn new() -> Self {
        let dbs = (0..DB_COUNT).map(|_| Keyspace::new()).collect();
        Self {
            dbs: RwLock::new(dbs),
            log: Mutex::new(None),
        }
    }

    /// Attaches the command-log sender. Called once at startup, after
    /// recovery and before the listener accepts connections.
    pub fn attach_log(&self, tx: mpsc::Sender<String>) {
        *self.log.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
    }

    /// Drops the command-log sender, closing the channel. The AOF
    /// writer drains whatever is buffered and exits. Exclusive to the
    /// shutdown path.
    pub fn close_log(&self) {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    /// Appends one record to the command log, waiting if the channel
    /// is full. Called with the writer lock held so file order equals
    /// commit order.
    async fn append_log(&self, line: String) {
        let tx = self
            .log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(tx) = tx {
            if tx.send(line).await.is_err() {
                // the channel only closes during shutdown; a command
                // racing it completes unlogged and the final snapshot
                // captures its effect
                error!("command log channel closed, record dropped");
            }
        }
    }

    /// Renders a value for the log line.
    fn render(value: &Bytes) -> String {
        String::from_utf8_lossy(value).into_owned()
    }

    // -- string commands --

    /// SET with optional NX/XX conditions and TTL. Returns `true` when
    /// the value was stored.
    pub async fn set(
        &self,
        db: usize,
        key: &str,
        value: Bytes,
        expire: Option<Duration>,
        nx: bool,
        xx: bool,
    ) -> bool {
        let mut dbs = self.dbs.write().await;
        let outcome = dbs[db].set(key, value.clone(), expire, nx, xx);
        if outcome == SetOutcome::Applied {
            self.append_log(format!("SET {db} {key} {}", Self::render(&value)))
                .await;
        }
        outcome == SetOutcome::Applied
    }

    /// SETNX. Returns `true` when the key was absent and is now set.
    pub async fn set_nx(&self, db: usize, key: &str, value: Bytes) -> bool {
        let mut dbs = self.dbs.write().await;
        let outcome = dbs[db].set(key, value.clone(), None, true, false);
        if outcome == SetOutcome::Applied {
            self.append_log(format!("SETNX {db} {key} {}", Self::render(&value)))
                .await;
        }
        outcome == SetOutcome::Applied
    }

    /// GET. `None` for absent or expired keys.
    pub async fn get(&self, db: usize, key: &str) -> Result<Option<Bytes>, WrongType> {
        self.dbs.read().await[db].get(key)
    }

    /// GETRANGE. Absent keys yield the empty string.
    pub async fn getrange(
        &self,
        db: usize,
        key: &str,
        start: i64,
        end: i64,
    ) -> Result<Bytes, WrongType> {
        self.dbs.read().await[db].getrange(key, start, end)
    }

    /// STRLEN. Absent keys yield 0.
    pub async fn strlen(&self, db: usize, key: &str) -> Result<usize, WrongType> {
        self.dbs.read().await[db].strlen(key)
    }

    /// DEL of a single key. Returns 1 if a live key was removed.
    pub async fn del(&self, db: usize, key: &str) -> usize {
        let mut dbs = self.dbs.write().await;
        if dbs[db].del(key) {
            self.append_log(format!("DEL {db} {key}")).await;
            1
        } else {
            0
        }
    }

    /// EXISTS over any number of keys; counts the live ones. A key
    /// named more than once is counted each time.
    pub async fn exists(&self, db: usize, keys: &[String]) -> usize {
        let dbs = self.dbs.read().await;
        keys.iter().filter(|key| dbs[db].exists(key)).count()
    }

    /// EXPIRE. Returns `true` if the key exists and the TTL was set.
    pub async fn expire(&self, db: usize, key: &str, seconds: i64) -> bool {
        let mut dbs = self.dbs.write().await;
        if dbs[db].expire(key, seconds) {
            self.append_log(format!("EXPIRE {db} {key} {seconds}")).await;
            true
        } else {
            false
        }
    }

    /// TTL in seconds; see [`TtlResult`].
    pub async fn ttl(&self, db: usize, key: &str) -> TtlResult {
        self.dbs.read().await[db].ttl(key)
    }

    /// INCR. Returns the new value.
    pub async fn incr(&self, db: usize, key: &str) -> Result<i64, IncrError> {
        let mut dbs = self.dbs.write().await;
        let val = dbs[db].incr_by(key, 1)?;
        self.append_log(format!("INCR {db} {key}")).await;
        Ok(val)
    }

    /// DECR. Returns the new value.
    pub async fn decr(&self, db: usize, key: &str) -> Result<i64, IncrError> {
        let mut dbs = self.dbs.write().await;
        let val = dbs[db].incr_by(key, -1)?;
        self.append_log(format!("DECR {db} {key}")).await;
        Ok(val)
    }

    // -- list commands --

    /// LPUSH. Returns the new list length.
    pub async fn lpush(&self, db: usize, key: &str, values: &[Bytes]) -> Result<usize, WrongType> {
        let mut dbs = self.dbs.write().await;
        let len = dbs[db].lpush(key, values)?;
        self.append_log(Self::push_line("LPUSH", db, key, values)).await;
        Ok(len)
    }

    /// RPUSH. Returns the new list length.
    pub async fn rpush(&self, db: usize, key: &str, values: &[Bytes]) -> Result<usize, WrongType> {
        let mut dbs = self.dbs.write().await;
        let len = dbs[db].rpush(key, values)?;
        self.append_log(Self::push_line("RPUSH", db, key, values)).await;
        Ok(len)
    }

    fn push_line(cmd: &str, db: usize, key: &str, values: &[Bytes]) -> String {
        let rendered: Vec<String> = values.iter().map(Self::render).collect();
        format!("{cmd} {db} {key} {}", rendered.join(" "))
    }

    /// LPOP with optional count.
    pub async fn lpop(
        &self,
        db: usize,
        key: &str,
        count: Option<i64>,
    ) -> Result<Option<Popped>, PopError> {
        let mut dbs = self.dbs.write().await;
        let popped = dbs[db].lpop(key, count)?;
        if let Some(n) = popped_len(&popped) {
            self.append_log(format!("LPOP {db} {key} {n}")).await;
        }
        Ok(popped)
    }

    /// RPOP with optional count.
    pub async fn rpop(
        &self,
        db: usize,
        key: &str,
        count: Option<i64>,
    ) -> Result<Option<Popped>, PopError> {
        let mut dbs = self.dbs.write().await;
        let popped = dbs[db].rpop(key, count)?;
        if let Some(n) = popped_len(&popped) {
            self.append_log(format!("RPOP {db} {key} {n}")).await;
        }
        Ok(popped)
    }

    /// LRANGE.
    pub async fn lrange(
        &self,
        db: usize,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<Bytes>, WrongType> {
        self.dbs.read().await[db].lrange(key, start, stop)
    }

    /// LTRIM. An empty retained range deletes the key.
    pub async fn ltrim(
        &self,
        db: usize,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<(), WrongType> {
        let mut dbs = self.dbs.write().await;
        let existed = dbs[db].exists(key);
        dbs[db].ltrim(key, start, stop)?;
        if existed {
            self.append_log(format!("LTRIM {db} {key} {start} {stop}")).await;
        }
        Ok(())
    }

    // -- keyspace commands --

    /// RENAME. Moves the value and expiration; overwrites the
    /// destination.
    pub async fn rename(&self, db: usize, key: &str, newkey: &str) -> Result<(), RenameError> {
        let mut dbs = self.dbs.write().await;
        dbs[db].rename(key, newkey)?;
        self.append_log(format!("RENAME {db} {key} {newkey}")).await;
        Ok(())
    }

    /// TYPE. `"none"` for absent keys.
    pub async fn value_type(&self, db: usize, key: &str) -> &'static str {
        self.dbs.read().await[db].value_type(key)
    }

    /// KEYS with a `*`/`?` glob pattern.
    pub async fn keys(&self, db: usize, pattern: &str) -> Result<Vec<String>, InvalidPattern> {
        let re = compile_pattern(pattern)?;
        Ok(self.dbs.read().await[db].keys(&re))
    }

    /// SCAN: cursor-paginated key listing with optional MATCH/COUNT.
    pub async fn scan(
        &self,
        db: usize,
        cursor: u64,
        pattern: Option<&str>,
        count: usize,
    ) -> Result<(u64, Vec<String>), InvalidPattern> {
        let re = match pattern {
            // a bare "*" matches everything; skip the regex machinery
            Some("*") | None => None,
            Some(p) => Some(compile_pattern(p)?),
        };
        Ok(self.dbs.read().await[db].scan(cursor, count, re.as_ref()))
    }

    /// FLUSHDB: clears one database.
    pub async fn flush_db(&self, db: usize) {
        let mut dbs = self.dbs.write().await;
        dbs[db].clear();
        self.append_log(format!("FLUSHDB {db}")).await;
    }

    /// FLUSHALL: clears every database.
    pub async fn flush_all(&self) {
        let mut dbs = self.dbs.write().await;
        for ks in dbs.iter_mut() {
            ks.clear();
        }
        self.append_log("FLUSHALL".to_string()).await;
    }

    /// Returns the entry count of each database. Counts include
    /// expired-but-unpurged entries.
    pub async fn key_counts(&self) -> Vec<usize> {
        self.dbs.read().await.iter().map(Keyspace::len).collect()
    }

    // -- snapshot --

    /// Produces an owned deep copy of every keyspace under the shared
    /// lock. Expired entries are skipped; TTLs are captured as
    /// remaining milliseconds.
    pub async fn snapshot(&self) -> Vec<Vec<SnapshotEntry>> {
        let dbs = self.dbs.read().await;
        dbs.iter()
            .map(|ks| {
                ks.iter_entries()
                    .map(|(key, value, expire_ms)| SnapshotEntry {
                        key: key.to_string(),
                        value: value.clone(),
                        expire_ms,
                    })
                    .collect()
            })
            .collect()
    }

    /// Atomically replaces the live keyspaces with recovered state
    /// under the writer lock. Entries beyond the sixteenth database
    /// are discarded; entries with a non-negative `expire_ms` get a
    /// fresh deadline that many milliseconds from now.
    pub async fn install_snapshot(&self, snapshot: Vec<Vec<SnapshotEntry>>) {
        let mut fresh: Vec<Keyspace> = (0..DB_COUNT).map(|_| Keyspace::new()).collect();
        for (db, entries) in snapshot.into_iter().take(DB_COUNT).enumerate() {
            for entry in entries {
                let ttl = if entry.expire_ms >= 0 {
                    Some(Duration::from_millis(entry.expire_ms as u64))
                } else {
                    None
                };
                fresh[db].restore(entry.key, entry.value, ttl);
            }
        }
        let mut dbs = self.dbs.write().await;
        *dbs = fresh;
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of elements a pop removed, or `None` when nothing changed.
fn popped_len(popped: &Option<Popped>) -> Option<usize> {
    match popped {
        Some(Popped::One(_)) => Some(1),
        Some(Popped::Many(items)) if !items.is_empty() => Some(items.len()),
        _ => None,
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, InvalidPattern> {
    glob_to_regex(pattern).map_err(|e| InvalidPattern(e.to_string()))
}
