//! Stateless anti-forgery state tokens.
//!
//! Instead of an in-memory store, the OAuth `state` parameter itself is a
//! self-verifying value: two chained salted hashes over the signing secret and
//! the mint time, followed by that time in hex. On `/callback` the broker
//! re-derives the token from the embedded timestamp and compares. Fully
//! stateless — no HashMap, no sweeper task, no concerns about multi-instance
//! deployments.
//!
//! Format:  hash(secret ++ t) || hash(h1 ++ secret ++ t) || hex(t)
//!
//! The timestamp is plaintext; unforgeability rests on the attacker being
//! unable to compute either hash without the secret, and on the TTL window.

use std::time::{SystemTime, UNIX_EPOCH};

/// Default acceptance window for a minted token: five minutes.
pub const DEFAULT_TTL_MS: u64 = 5 * 60 * 1000;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Quick 32-bit FNV-1a variant, rendered as 8 lowercase hex digits.
///
/// Not a cryptographic hash — it provides tamper-evidence only in combination
/// with the secret salt. The exact shift set (1, 4, 7, 8, 24) and seed are
/// load-bearing: any deviation silently breaks compatibility with previously
/// minted tokens.
pub fn quick_hash(input: &str) -> String {
    let mut hval: u32 = 0x811c9dc5;
    for c in input.chars() {
        hval ^= c as u32;
        hval = hval.wrapping_add(
            (hval << 1)
                .wrapping_add(hval << 4)
                .wrapping_add(hval << 7)
                .wrapping_add(hval << 8)
                .wrapping_add(hval << 24),
        );
    }
    format!("{hval:08x}")
}

/// Mint a state token bound to `secret` and `now_ms`.
///
/// The first 16 characters are the two 8-char hashes; everything after is the
/// mint time in lowercase hex.
pub fn mint(secret: &str, now_ms: u64) -> String {
    let h1 = quick_hash(&format!("{secret}{now_ms}"));
    let h2 = quick_hash(&format!("{h1}{secret}{now_ms}"));
    format!("{h1}{h2}{now_ms:x}")
}

/// Verify a state token against `secret` at time `now_ms`.
///
/// Fails closed: an absent, malformed, or non-ASCII token is rejected. Accepts
/// iff the token re-mints identically from its embedded timestamp AND that
/// timestamp is not in the future AND is strictly younger than `ttl_ms`.
/// The future-timestamp rejection guards against clock-skew forgery and
/// malformed timestamps that parse as larger-than-now values.
pub fn verify(token: Option<&str>, secret: &str, ttl_ms: u64, now_ms: u64) -> bool {
    let Some(token) = token else {
        return false;
    };
    if !token.is_ascii() || token.len() <= 16 {
        return false;
    }
    let Ok(minted_at) = u64::from_str_radix(&token[16..], 16) else {
        return false;
    };
    if mint(secret, minted_at) != token {
        return false;
    }
    match now_ms.checked_sub(minted_at) {
        Some(delta) => delta < ttl_ms,
        None => false,
    }
}
