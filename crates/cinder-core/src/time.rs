//! Compact monotonic time utilities.
//!
//! Expiration deadlines are u64 milliseconds on a process-local
//! monotonic clock, which keeps keyspace entries small (8 bytes vs
//! 16 for `Option<Instant>`).

use std::sync::OnceLock;
use std::time::Instant;

/// Sentinel value meaning "no expiry".
pub const NO_EXPIRY: u64 = 0;

/// Returns current monotonic time in milliseconds since process start.
#[inline]
pub fn now_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    // the clock starts at 1 so a live deadline can never collide with
    // the NO_EXPIRY sentinel
    start.elapsed().as_millis() as u64 + 1
}

/// Returns true if the given expiry timestamp has passed.
#[inline]
pub fn is_expired(expires_at_ms: u64) -> bool {
    expires_at_ms != NO_EXPIRY && now_ms() >= expires_at_ms
}

/// Converts a relative TTL to an absolute expiry timestamp.
#[inline]
pub fn expiry_from_duration(ttl: Option<std::time::Duration>) -> u64 {
    ttl.map(|d| now_ms().saturating_add(d.as_millis() as u64))
        .unwrap_or(NO_EXPIRY)
}

/// Returns remaining TTL in whole seconds, or None if no expiry.
#[inline]
pub fn remaining_secs(expires_at_ms: u64) -> Option<u64> {
    remaining_ms(expires_at_ms).map(|ms| ms / 1000)
}

/// Returns remaining TTL in milliseconds, or None if no expiry.
#[inline]
pub fn remaining_ms(expires_at_ms: u64) -> Option<u64> {
    if expires_at_ms == NO_EXPIRY {
        None
    } else {
        Some(expires_at_ms.saturating_sub(now_ms()))
    }
}
