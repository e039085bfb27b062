//! Short hash-based identifiers for plans and runs.
//!
//! Ids are `{prefix}-{hash}` with an 8-character base36 hash of the content
//! plus a nanosecond timestamp, so repeated calls with the same content
//! still produce distinct ids.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

const BASE36_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LENGTH: usize = 8;

// Process-local sequence folded into the hash so ids generated within the
// same timestamp tick still differ.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generate a `{prefix}-{hash}` identifier from the given content.
#[must_use]
pub fn generate(prefix: &str, content: &str) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(seq.to_le_bytes());
    let digest = hasher.finalize();

    format!("{prefix}-{}", base36_encode(&digest, ID_LENGTH))
}

fn base36_encode(bytes: &[u8], length: usize) -> String {
    let mut value = bytes
        .iter()
        .take(16)
        .fold(0u128, |acc, b| (acc << 8) | u128::from(*b));

    let mut out = String::with_capacity(length);
    for _ in 0..length {
        out.push(char::from(BASE36_CHARS[(value % 36) as usize]));
        value /= 36;
    }
    out.chars().rev().collect()
}
