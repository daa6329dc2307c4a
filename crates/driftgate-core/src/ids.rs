//! Identifier generation.
//!
//! Records carry opaque 16-byte identifiers. Two strategies are
//! provided: [`GeneratedIds`] derives ids from the current time and a
//! hash mix, [`SequentialIds`] combines a timestamp prefix with a
//! process-wide counter so ids sort in creation order.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

/// An opaque 16-byte record identifier.
pub type RecordId = [u8; 16];

/// Produces identifiers for stored records.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> RecordId;
}

/// Microseconds since the Unix epoch, saturating at zero.
pub(crate) fn unix_micros() -> u64 {
    Utc::now().timestamp_micros().max(0) as u64
}

/// Hash-mixed identifiers.
///
/// The low half mixes the timestamp with a large odd multiplier so two
/// ids generated in the same microsecond still differ per generator.
#[derive(Debug)]
pub struct GeneratedIds {
    salt: AtomicU64,
}

impl Default for GeneratedIds {
    fn default() -> Self {
        Self {
            salt: AtomicU64::new(0x9e37_79b9_7f4a_7c15),
        }
    }
}

impl GeneratedIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for GeneratedIds {
    fn next_id(&self) -> RecordId {
        let micros = unix_micros();
        let salt = self
            .salt
            .fetch_add(0x2545_f491_4f6c_dd1d, Ordering::Relaxed);
        let mixed = micros.wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ salt;

        let mut id = [0u8; 16];
        id[..8].copy_from_slice(&micros.to_be_bytes());
        id[8..].copy_from_slice(&mixed.to_be_bytes());
        id
    }
}

/// Monotonic identifiers: timestamp prefix plus a per-generator counter.
#[derive(Debug, Default)]
pub struct SequentialIds {
    counter: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> RecordId {
        let micros = unix_micros();
        let seq = self.counter.fetch_add(1, Ordering::SeqCst);

        let mut id = [0u8; 16];
        id[..8].copy_from_slice(&micros.to_be_bytes());
        id[8..].copy_from_slice(&seq.to_be_bytes());
        id
    }
}
