//! Data type representations for stored values.
//!
//! Each variant maps to one of the five supported data types. The
//! command surface only creates strings and lists, but hashes, sets,
//! and sorted sets are full citizens of the value model: they carry
//! typed accessors, report their tag through TYPE, and round-trip
//! through snapshots.

use std::collections::VecDeque;

use ahash::{AHashMap, AHashSet};
use bytes::Bytes;

use crate::keyspace::WrongType;

/// A stored value.
///
/// Strings and list elements are binary-safe `Bytes`; hash fields, set
/// members, and sorted-set members are string keys.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Binary-safe string data. `Bytes` gives cheap cloning for reads
    /// and snapshots.
    String(Bytes),

    /// Ordered list of binary-safe elements. `VecDeque` gives O(1)
    /// push/pop at both ends.
    List(VecDeque<Bytes>),

    /// Mapping from field name to binary-safe value.
    Hash(AHashMap<String, Bytes>),

    /// Unordered set of unique string members.
    Set(AHashSet<String>),

    /// Mapping from member name to a 64-bit float score.
    ZSet(AHashMap<String, f64>),
}

impl Value {
    /// Returns the string payload, or `WrongType` for any other variant.
    pub fn as_string(&self) -> Result<&Bytes, WrongType> {
        match self {
            Value::String(data) => Ok(data),
            _ => Err(WrongType),
        }
    }

    /// Returns the list payload, or `WrongType` for any other variant.
    pub fn as_list(&self) -> Result<&VecDeque<Bytes>, WrongType> {
        match self {
            Value::List(items) => Ok(items),
            _ => Err(WrongType),
        }
    }

    /// Returns the hash payload, or `WrongType` for any other variant.
    pub fn as_hash(&self) -> Result<&AHashMap<String, Bytes>, WrongType> {
        match self {
            Value::Hash(map) => Ok(map),
            _ => Err(WrongType),
        }
    }

    /// Returns the set payload, or `WrongType` for any other variant.
    pub fn as_set(&self) -> Result<&AHashSet<String>, WrongType> {
        match self {
            Value::Set(members) => Ok(members),
            _ => Err(WrongType),
        }
    }

    /// Returns the sorted-set payload, or `WrongType` for any other variant.
    pub fn as_zset(&self) -> Result<&AHashMap<String, f64>, WrongType> {
        match self {
            Value::ZSet(members) => Ok(members),
            _ => Err(WrongType),
        }
    }
}

/// Returns the type name for a value, matching the TYPE command output.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "string",
        Value::List(_) => "list",
        Value::Hash(_) => "hash",
        Value::Set(_) => "set",
        Value::ZSet(_) => "zset",
    }
}

/// Converts range indices (supporting negative values) to a clamped
/// `(start, stop)` pair.
///
/// Negative indices count back from `len` (-1 = last element). After
/// translation, start is floored at 0 and stop is capped at `len - 1`.
/// Callers see `start > stop` for empty ranges, including the
/// `len == 0` case.
pub fn normalize_range(start: i64, stop: i64, len: i64) -> (i64, i64) {
    if len == 0 {
        return (0, -1);
    }

    let s = if start < 0 {
        (len + start).max(0)
    } else {
        start
    };

    // a hugely-negative stop floors at -1 so the caller sees an empty range
    let e = if stop < 0 {
        (len + stop).max(-1)
    } else {
        stop.min(len - 1)
    };

    (s, e)
}
