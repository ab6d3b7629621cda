//! A keyspace: one of the sixteen independent key-value databases.
//!
//! A `Keyspace` owns a flat `AHashMap<Box<str>, Entry>` and implements
//! every command primitive. Expired keys are handled lazily: read-path
//! operations take `&self` and treat expired entries as absent without
//! touching them (they run under the store's shared lock), while
//! write-path operations take `&mut self` and purge an expired entry
//! before acting on the key.

use std::collections::VecDeque;
use std::time::Duration;

use ahash::AHashMap;
use bytes::Bytes;
use regex::Regex;
use tracing::warn;

use crate::time;
use crate::value::{self, normalize_range, Value};

mod list;
mod string;

const WRONGTYPE_MSG: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

/// Error returned when a command is used against a key holding the
/// wrong type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrongType;

impl std::fmt::Display for WrongType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{WRONGTYPE_MSG}")
    }
}

impl std::error::Error for WrongType {}

/// Errors from INCR/DECR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrError {
    /// Key holds a non-string type.
    WrongType,
    /// Value is not a base-10 signed integer, or the result overflows.
    NotAnInteger,
}

impl std::fmt::Display for IncrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncrError::WrongType => write!(f, "{WRONGTYPE_MSG}"),
            IncrError::NotAnInteger => write!(f, "ERR value is not an integer or out of range"),
        }
    }
}

impl std::error::Error for IncrError {}

/// Error returned when RENAME fails because the source key is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameError {
    NoSuchKey,
}

impl std::fmt::Display for RenameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenameError::NoSuchKey => write!(f, "ERR no such key"),
        }
    }
}

impl std::error::Error for RenameError {}

/// Errors from LPOP/RPOP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopError {
    /// Key holds a non-list type.
    WrongType,
    /// A negative count was supplied.
    OutOfRange,
}

impl std::fmt::Display for PopError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PopError::WrongType => write!(f, "{WRONGTYPE_MSG}"),
            PopError::OutOfRange => write!(f, "ERR value is out of range, must be positive"),
        }
    }
}

impl std::error::Error for PopError {}

/// Result of a SET with NX/XX conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The key was stored.
    Applied,
    /// The NX/XX condition was not met; nothing changed.
    Blocked,
}

/// Result of a pop operation.
///
/// A bare LPOP/RPOP yields a single element; a pop with an explicit
/// count always yields a sequence, even for count 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Popped {
    One(Bytes),
    Many(Vec<Bytes>),
}

/// Result of a TTL query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlResult {
    /// Key exists and has a TTL; remaining whole seconds.
    Seconds(u64),
    /// Key exists but has no expiration set.
    NoExpiry,
    /// Key does not exist.
    NotFound,
}

/// Default SCAN page size when no COUNT is given.
const SCAN_DEFAULT_COUNT: usize = 10;

/// A single entry: a value plus an optional expiration deadline on the
/// process-local monotonic clock (0 = no expiry).
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) value: Value,
    pub(crate) expires_at_ms: u64,
}

impl Entry {
    fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at_ms: time::expiry_from_duration(ttl),
        }
    }

    /// Returns `true` if this entry has passed its expiration time.
    pub(crate) fn is_expired(&self) -> bool {
        time::is_expired(self.expires_at_ms)
    }
}

/// One of the store's sixteen databases.
///
/// Single-threaded; all synchronization happens in the [`Store`]
/// wrapper above this type.
///
/// [`Store`]: crate::store::Store
#[derive(Default)]
pub struct Keyspace {
    entries: AHashMap<Box<str>, Entry>,
}

impl Keyspace {
    /// Creates a new, empty keyspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries, counting entries that have
    /// expired but not yet been purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the keyspace has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up an entry, filtering out expired ones. Never mutates,
    /// so it is safe under the shared lock.
    fn live_entry(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key).filter(|e| !e.is_expired())
    }

    /// Removes the entry for `key` if it has expired. Returns `true`
    /// if the key is now absent because it was expired. Write paths
    /// call this before acting on a key.
    pub(crate) fn purge_expired(&mut self, key: &str) -> bool {
        let expired = self
            .entries
            .get(key)
            .map(|e| e.is_expired())
            .unwrap_or(false);
        if expired {
            self.entries.remove(key);
        }
        expired
    }

    /// Removes a key. Returns `true` if a live key was removed.
    pub fn del(&mut self, key: &str) -> bool {
        if self.purge_expired(key) {
            return false;
        }
        self.entries.remove(key).is_some()
    }

    /// Returns `true` if the key exists and has not expired.
    pub fn exists(&self, key: &str) -> bool {
        self.live_entry(key).is_some()
    }

    /// Sets an expiration deadline `seconds` from now. A non-positive
    /// TTL leaves the key expired immediately. Returns `true` if the
    /// key exists, `false` otherwise.
    pub fn expire(&mut self, key: &str, seconds: i64) -> bool {
        if self.purge_expired(key) {
            return false;
        }
        match self.entries.get_mut(key) {
            Some(entry) => {
                let now = time::now_ms();
                entry.expires_at_ms = if seconds > 0 {
                    now.saturating_add((seconds as u64).saturating_mul(1000))
                } else {
                    now
                };
                true
            }
            None => false,
        }
    }

    /// Returns the TTL status for a key.
    pub fn ttl(&self, key: &str) -> TtlResult {
        match self.live_entry(key) {
            Some(entry) => match time::remaining_secs(entry.expires_at_ms) {
                Some(secs) => TtlResult::Seconds(secs),
                None => TtlResult::NoExpiry,
            },
            None => TtlResult::NotFound,
        }
    }

    /// Renames a key, moving its value and expiration. The destination
    /// is overwritten if present. Errors when the source is absent.
    pub fn rename(&mut self, key: &str, newkey: &str) -> Result<(), RenameError> {
        self.purge_expired(key);
        self.purge_expired(newkey);

        let entry = match self.entries.remove(key) {
            Some(entry) => entry,
            None => return Err(RenameError::NoSuchKey),
        };
        self.entries.insert(Box::from(newkey), entry);
        Ok(())
    }

    /// Returns all live keys matching the compiled pattern.
    ///
    /// O(n) over the whole keyspace; SCAN is the paginated alternative.
    pub fn keys(&self, pattern: &Regex) -> Vec<String> {
        let len = self.entries.len();
        if len > 10_000 {
            warn!(key_count = len, "KEYS on large keyspace, consider SCAN");
        }
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .filter(|(key, _)| pattern.is_match(key))
            .map(|(key, _)| String::from(&**key))
            .collect()
    }

    /// Paginated key enumeration.
    ///
    /// The cursor is an offset into a list of live keys materialized at
    /// call time; `count` (0 = default 10) slices the page and `pattern`
    /// filters the slice afterwards. Returns the next cursor (0 when
    /// complete) and the page. The cursor is only meaningful against an
    /// unchanged keyspace; concurrent mutation may cause duplicates or
    /// misses across calls.
    pub fn scan(
        &self,
        cursor: u64,
        count: usize,
        pattern: Option<&Regex>,
    ) -> (u64, Vec<String>) {
        let all_keys: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .map(|(key, _)| &**key)
            .collect();

        let cursor = cursor as usize;
        if cursor >= all_keys.len() {
            return (0, Vec::new());
        }
        let count = if count == 0 { SCAN_DEFAULT_COUNT } else { count };

        let end = (cursor + count).min(all_keys.len());
        let page = all_keys[cursor..end]
            .iter()
            .filter(|key| pattern.map(|re| re.is_match(key)).unwrap_or(true))
            .map(|key| String::from(*key))
            .collect();

        let next_cursor = if end >= all_keys.len() { 0 } else { end as u64 };
        (next_cursor, page)
    }

    /// Removes all keys.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates over all live entries, yielding the key, the value, and
    /// the remaining TTL in milliseconds (-1 for no expiry). Used by
    /// the snapshot path.
    pub fn iter_entries(&self) -> impl Iterator<Item = (&str, &Value, i64)> {
        self.entries.iter().filter_map(|(key, entry)| {
            if entry.is_expired() {
                return None;
            }
            let ttl_ms = match time::remaining_ms(entry.expires_at_ms) {
                Some(ms) => ms.min(i64::MAX as u64) as i64,
                None => -1,
            };
            Some((&**key, &entry.value, ttl_ms))
        })
    }

    /// Inserts an entry during recovery, bypassing the normal write
    /// commands. `ttl` is the remaining time-to-live; `None` means no
    /// expiry.
    pub fn restore(&mut self, key: String, value: Value, ttl: Option<Duration>) {
        self.entries
            .insert(key.into_boxed_str(), Entry::new(value, ttl));
    }
}

/// Compiles a `*`/`?` glob pattern into an anchored regular expression.
///
/// `*` matches any (possibly empty) character sequence, `?` exactly one
/// character, and everything else matches literally.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            ch => {
                let mut buf = [0u8; 4];
                source.push_str(&regex::escape(ch.encode_utf8(&mut buf)));
            }
        }
    }
    source.push('$');
    Regex::new(&source)
}
