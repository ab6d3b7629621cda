//! Point-in-time snapshot of all sixteen databases.
//!
//! The writer consumes an owned deep copy produced by
//! `Store::snapshot` and never touches live state. Writes go to a
//! `.tmp` file first and are atomically renamed on completion, so a
//! crashed snapshot can never corrupt the existing file.
//!
//! File layout:
//! ```text
//! [CSNP magic: 4B][version: 1B][db_count: 2B]
//! per database: [entry_count: 4B][entries...]
//! [footer_crc32: 4B]
//! ```
//!
//! Each entry:
//! ```text
//! [key][type_tag: 1B][type-specific payload][expire_ms: 8B]
//! ```
//!
//! Type tags: 0=string, 1=list, 2=hash, 3=set, 4=zset. `expire_ms` is
//! the remaining TTL in milliseconds, or -1 for no expiry. The footer
//! CRC covers all entry bytes.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use ahash::{AHashMap, AHashSet};
use bytes::Bytes;
use cinder_core::{SnapshotEntry, Value};

use crate::format::{self, FormatError};

/// File name of the snapshot inside the data directory.
pub const SNAPSHOT_FILE: &str = "dump.rdb";

/// Type tags for snapshot entries.
const TYPE_STRING: u8 = 0;
const TYPE_LIST: u8 = 1;
const TYPE_HASH: u8 = 2;
const TYPE_SET: u8 = 3;
const TYPE_ZSET: u8 = 4;

/// Returns the snapshot path inside a data directory.
pub fn snapshot_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SNAPSHOT_FILE)
}

/// Encodes a full store snapshot to `path` via a temp file and an
/// atomic rename.
pub fn save(path: &Path, dbs: &[Vec<SnapshotEntry>]) -> Result<(), FormatError> {
    let mut writer = SnapshotWriter::create(path, dbs.len() as u16)?;
    for entries in dbs {
        writer.write_db(entries)?;
    }
    writer.finish()
}

/// Decodes a snapshot file into per-database entry vectors, verifying
/// the footer checksum.
pub fn load(path: &Path) -> Result<Vec<Vec<SnapshotEntry>>, FormatError> {
    let mut reader = SnapshotReader::open(path)?;
    let mut dbs = Vec::with_capacity(reader.db_count as usize);
    while let Some(entries) = reader.read_db()? {
        dbs.push(entries);
    }
    reader.verify_footer()?;
    Ok(dbs)
}

/// Writes a snapshot file. The file won't appear at the final path
/// until [`SnapshotWriter::finish`] succeeds.
pub struct SnapshotWriter {
    final_path: PathBuf,
    tmp_path: PathBuf,
    writer: BufWriter<File>,
    /// Running CRC over all entry bytes for the footer checksum.
    hasher: crc32fast::Hasher,
    finished: bool,
}

impl SnapshotWriter {
    /// Creates the temp file and writes the header.
    pub fn create(path: impl Into<PathBuf>, db_count: u16) -> Result<Self, FormatError> {
        let final_path = path.into();
        let tmp_path = final_path.with_extension("rdb.tmp");
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut writer = BufWriter::new(file);

        format::write_header(&mut writer, format::SNAP_MAGIC)?;
        format::write_u16(&mut writer, db_count)?;

        Ok(Self {
            final_path,
            tmp_path,
            writer,
            hasher: crc32fast::Hasher::new(),
            finished: false,
        })
    }

    /// Writes one database: entry count followed by the entries.
    pub fn write_db(&mut self, entries: &[SnapshotEntry]) -> Result<(), FormatError> {
        format::write_u32(&mut self.writer, entries.len() as u32)?;
        for entry in entries {
            let buf = encode_entry(entry)?;
            self.hasher.update(&buf);
            self.writer.write_all(&buf)?;
        }
        Ok(())
    }

    /// Writes the footer CRC, fsyncs, and atomically renames the temp
    /// file into place.
    pub fn finish(mut self) -> Result<(), FormatError> {
        let checksum = self.hasher.clone().finalize();
        format::write_u32(&mut self.writer, checksum)?;
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;

        fs::rename(&self.tmp_path, &self.final_path)?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        if !self.finished {
            // best-effort cleanup of an incomplete temp file
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

/// Encodes one entry into a buffer for hashing and writing.
fn encode_entry(entry: &SnapshotEntry) -> Result<Vec<u8>, FormatError> {
    let mut buf = Vec::new();
    format::write_bytes(&mut buf, entry.key.as_bytes())?;
    match &entry.value {
        Value::String(data) => {
            format::write_u8(&mut buf, TYPE_STRING)?;
            format::write_bytes(&mut buf, data)?;
        }
        Value::List(items) => {
            format::write_u8(&mut buf, TYPE_LIST)?;
            format::write_u32(&mut buf, items.len() as u32)?;
            for item in items {
                format::write_bytes(&mut buf, item)?;
            }
        }
        Value::Hash(map) => {
            format::write_u8(&mut buf, TYPE_HASH)?;
            format::write_u32(&mut buf, map.len() as u32)?;
            for (field, value) in map {
                format::write_bytes(&mut buf, field.as_bytes())?;
                format::write_bytes(&mut buf, value)?;
            }
        }
        Value::Set(members) => {
            format::write_u8(&mut buf, TYPE_SET)?;
            format::write_u32(&mut buf, members.len() as u32)?;
            for member in members {
                format::write_bytes(&mut buf, member.as_bytes())?;
            }
        }
        Value::ZSet(members) => {
            format::write_u8(&mut buf, TYPE_ZSET)?;
            format::write_u32(&mut buf, members.len() as u32)?;
            for (member, score) in members {
                format::write_bytes(&mut buf, member.as_bytes())?;
                format::write_f64(&mut buf, *score)?;
            }
        }
    }
    format::write_i64(&mut buf, entry.expire_ms)?;
    Ok(buf)
}

/// Reads a snapshot file database by database.
pub struct SnapshotReader {
    reader: BufReader<File>,
    pub db_count: u16,
    read_so_far: u16,
    hasher: crc32fast::Hasher,
}

impl SnapshotReader {
    /// Opens a snapshot file and validates the header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FormatError> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);

        format::read_header(&mut reader, format::SNAP_MAGIC)?;
        let db_count = format::read_u16(&mut reader)?;

        Ok(Self {
            reader,
            db_count,
            read_so_far: 0,
            hasher: crc32fast::Hasher::new(),
        })
    }

    /// Reads the next database. Returns `None` after the last one.
    pub fn read_db(&mut self) -> Result<Option<Vec<SnapshotEntry>>, FormatError> {
        if self.read_so_far >= self.db_count {
            return Ok(None);
        }

        let count = format::read_u32(&mut self.reader)?;
        format::validate_collection_count(count, "entry")?;
        let mut entries = Vec::with_capacity(format::capped_capacity(count));
        for _ in 0..count {
            entries.push(self.read_entry()?);
        }

        self.read_so_far += 1;
        Ok(Some(entries))
    }

    fn read_entry(&mut self) -> Result<SnapshotEntry, FormatError> {
        // re-encode as we read so the footer CRC can be verified
        let mut buf = Vec::new();

        let key_bytes = format::read_bytes(&mut self.reader)?;
        format::write_bytes(&mut buf, &key_bytes)?;
        let key = String::from_utf8(key_bytes)
            .map_err(|_| FormatError::InvalidData("key is not valid utf-8".into()))?;

        let tag = format::read_u8(&mut self.reader)?;
        format::write_u8(&mut buf, tag)?;

        let value = match tag {
            TYPE_STRING => {
                let data = format::read_bytes(&mut self.reader)?;
                format::write_bytes(&mut buf, &data)?;
                Value::String(Bytes::from(data))
            }
            TYPE_LIST => {
                let count = format::read_u32(&mut self.reader)?;
                format::validate_collection_count(count, "list")?;
                format::write_u32(&mut buf, count)?;
                let mut items = VecDeque::with_capacity(format::capped_capacity(count));
                for _ in 0..count {
                    let item = format::read_bytes(&mut self.reader)?;
                    format::write_bytes(&mut buf, &item)?;
                    items.push_back(Bytes::from(item));
                }
                Value::List(items)
            }
            TYPE_HASH => {
                let count = format::read_u32(&mut self.reader)?;
                format::validate_collection_count(count, "hash")?;
                format::write_u32(&mut buf, count)?;
                let mut map = AHashMap::with_capacity(format::capped_capacity(count));
                for _ in 0..count {
                    let field_bytes = format::read_bytes(&mut self.reader)?;
                    format::write_bytes(&mut buf, &field_bytes)?;
                    let field = String::from_utf8(field_bytes).map_err(|_| {
                        FormatError::InvalidData("hash field is not valid utf-8".into())
                    })?;
                    let value = format::read_bytes(&mut self.reader)?;
                    format::write_bytes(&mut buf, &value)?;
                    map.insert(field, Bytes::from(value));
                }
                Value::Hash(map)
            }
            TYPE_SET => {
                let count = format::read_u32(&mut self.reader)?;
                format::validate_collection_count(count, "set")?;
                format::write_u32(&mut buf, count)?;
                let mut members = AHashSet::with_capacity(format::capped_capacity(count));
                for _ in 0..count {
                    let member_bytes = format::read_bytes(&mut self.reader)?;
                    format::write_bytes(&mut buf, &member_bytes)?;
                    let member = String::from_utf8(member_bytes).map_err(|_| {
                        FormatError::InvalidData("set member is not valid utf-8".into())
                    })?;
                    members.insert(member);
                }
                Value::Set(members)
            }
            TYPE_ZSET => {
                let count = format::read_u32(&mut self.reader)?;
                format::validate_collection_count(count, "zset")?;
                format::write_u32(&mut buf, count)?;
                let mut members = AHashMap::with_capacity(format::capped_capacity(count));
                for _ in 0..count {
                    let member_bytes = format::read_bytes(&mut self.reader)?;
                    format::write_bytes(&mut buf, &member_bytes)?;
                    let member = String::from_utf8(member_bytes).map_err(|_| {
                        FormatError::InvalidData("zset member is not valid utf-8".into())
                    })?;
                    let score = format::read_f64(&mut self.reader)?;
                    format::write_f64(&mut buf, score)?;
                    members.insert(member, score);
                }
                Value::ZSet(members)
            }
            other => return Err(FormatError::UnknownTag(other)),
        };

        let expire_ms = format::read_i64(&mut self.reader)?;
        format::write_i64(&mut buf, expire_ms)?;

        self.hasher.update(&buf);
        Ok(SnapshotEntry {
            key,
            value,
            expire_ms,
        })
    }

    /// Verifies the footer CRC. Must be called after reading all
    /// databases.
    pub fn verify_footer(mut self) -> Result<(), FormatError> {
        let expected = self.hasher.finalize();
        let stored = format::read_u32(&mut self.reader)?;
        format::verify_crc32_values(expected, stored)
    }
}
