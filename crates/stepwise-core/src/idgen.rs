//! SHA256 + base36 identifier generation.
//!
//! Every id mixes a process-wide sequence number into its hash input, so an
//! identifier handed out once is never produced again while the process
//! lives, even after the entity it named has been removed.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use num_traits::Zero;
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};

/// Base36 alphabet (0-9, a-z).
const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the hash part of generated ids.
pub const DEFAULT_ID_LENGTH: usize = 12;

/// How many nonces [`unique_id`] tries before giving up.
const MAX_ATTEMPTS: i32 = 10;

/// Process-wide counter mixed into every generated id.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Id prefixes for each entity kind.
pub mod prefixes {
    pub const AGENT: &str = "ag";
    pub const BLOCK: &str = "blk";
    pub const VARIABLE: &str = "var";
    pub const TEMPLATE: &str = "tpl";
}

/// Converts a byte slice to a base36 string of the specified length.
pub fn encode_base36(data: &[u8], length: usize) -> String {
    let mut num = BigUint::from_bytes_be(data);
    let base = BigUint::from(36u32);
    let zero = BigUint::zero();

    let mut chars: Vec<u8> = Vec::with_capacity(length);
    while num > zero {
        let rem = &num % &base;
        num /= &base;
        let idx = rem.to_u32_digits();
        let i = if idx.is_empty() { 0 } else { idx[0] as usize };
        chars.push(BASE36_ALPHABET[i]);
    }
    chars.reverse();

    // Only ASCII bytes from the alphabet were pushed.
    let mut s: String = chars.into_iter().map(char::from).collect();

    if s.len() < length {
        s = "0".repeat(length - s.len()) + &s;
    }
    // Keep the least significant digits.
    if s.len() > length {
        s = s[s.len() - length..].to_owned();
    }
    s
}

/// Builds a deterministic hash id from its inputs.
///
/// `seed` is any content that describes the entity (a name, a title),
/// `sequence` disambiguates ids created in the same instant.
pub fn generate_hash_id(
    prefix: &str,
    seed: &str,
    timestamp: DateTime<Utc>,
    sequence: u64,
    nonce: i32,
) -> String {
    let content = format!(
        "{}|{}|{}|{}|{}|{}",
        prefix,
        seed,
        timestamp.timestamp_nanos_opt().unwrap_or(0),
        std::process::id(),
        sequence,
        nonce
    );
    let hash = Sha256::digest(content.as_bytes());
    // 8 bytes = 64 bits ~ 12.4 base36 chars
    let short_hash = encode_base36(&hash[..8], DEFAULT_ID_LENGTH);
    format!("{}-{}", prefix, short_hash)
}

/// Returns a fresh id that has never been issued by this process.
pub fn fresh_id(prefix: &str, seed: &str) -> String {
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    generate_hash_id(prefix, seed, Utc::now(), sequence, 0)
}

/// Returns a fresh id for which `is_taken` is false.
///
/// Retries with a bumped nonce, the same way hash ids are disambiguated on
/// collision elsewhere.
pub fn unique_id(
    prefix: &'static str,
    seed: &str,
    is_taken: impl Fn(&str) -> bool,
) -> Result<String> {
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let now = Utc::now();
    for nonce in 0..MAX_ATTEMPTS {
        let candidate = generate_hash_id(prefix, seed, now, sequence, nonce);
        if !is_taken(&candidate) {
            return Ok(candidate);
        }
    }
    Err(CoreError::IdExhausted(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn encode_base36_zero_pads() {
        assert_eq!(encode_base36(&[], 4), "0000");
    }

    #[test]
    fn encode_base36_truncates() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(encode_base36(&data, 3).len(), 3);
    }

    #[test]
    fn hash_id_format() {
        let id = generate_hash_id("var", "x", Utc::now(), 0, 0);
        assert!(id.starts_with("var-"));
        assert_eq!(id.len(), "var-".len() + DEFAULT_ID_LENGTH);
    }

    #[test]
    fn hash_id_deterministic() {
        let ts = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let a = generate_hash_id("blk", "seed", ts, 7, 0);
        let b = generate_hash_id("blk", "seed", ts, 7, 0);
        assert_eq!(a, b);
        assert_ne!(a, generate_hash_id("blk", "seed", ts, 8, 0));
        assert_ne!(a, generate_hash_id("blk", "seed", ts, 7, 1));
    }

    #[test]
    fn fresh_ids_never_repeat() {
        let ids: HashSet<String> = (0..500).map(|_| fresh_id("var", "same")).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn unique_id_skips_taken_candidates() {
        let first = unique_id(prefixes::BLOCK, "b", |_| false).unwrap();
        assert!(first.starts_with("blk-"));

        let err = unique_id(prefixes::BLOCK, "b", |_| true).unwrap_err();
        assert_eq!(err, CoreError::IdExhausted("blk"));
    }
}
