//! cinder-persistence: durability layer.
//!
//! Handles the append-only command log, point-in-time snapshots, and
//! startup recovery.

pub mod aof;
pub mod format;
pub mod recovery;
pub mod snapshot;
