//! Client fingerprint generation.
//!
//! The gatekeeper endpoint expects a per-session fingerprint id in the shape
//! produced by the site's own JavaScript:
//! `'fp_' + Math.random().toString(36).substr(2, 9) + '_' + Date.now()`.
//! The format is an external contract, so a validator is exposed alongside
//! the generator.

use std::fmt;

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::Serialize;

const FINGERPRINT_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const RANDOM_SEGMENT_LEN: usize = 9;

static FINGERPRINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^fp_[a-z0-9]{9}_[0-9]+$").expect("invalid fingerprint regex"));

/// Opaque per-run client identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` when the value matches the fingerprint wire format.
    pub fn is_well_formed(value: &str) -> bool {
        FINGERPRINT_RE.is_match(value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates fingerprint ids from the process randomness and clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct FingerprintGenerator;

impl FingerprintGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Produce a fresh fingerprint. Never fails; two calls at least one
    /// millisecond apart are guaranteed distinct by the timestamp segment.
    pub fn generate(&self) -> Fingerprint {
        let mut rng = rand::thread_rng();
        let random: String = (0..RANDOM_SEGMENT_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..FINGERPRINT_CHARSET.len());
                FINGERPRINT_CHARSET[idx] as char
            })
            .collect();

        let timestamp = chrono::Utc::now().timestamp_millis();
        Fingerprint(format!("fp_{random}_{timestamp}"))
    }
}
