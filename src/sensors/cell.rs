//! Lock-free cell holding one smoothed value.
//!
//! The acquisition thread is the only writer; the publication thread and
//! the fan controller read concurrently.  Storing the `f32` bit pattern in
//! an `AtomicU32` means a reader sees either the previous or the new mean,
//! never a torn mix of both.

use core::sync::atomic::{AtomicU32, Ordering};

/// Bit pattern reserved for "no samples yet".  Non-finite values are never
/// stored as real readings, so a NaN is free to act as the marker.
const UNSET: u32 = 0x7FC0_0000;

/// Atomic `Option<f32>`.
#[derive(Debug)]
pub struct AtomicValue(AtomicU32);

impl AtomicValue {
    pub const fn unset() -> Self {
        Self(AtomicU32::new(UNSET))
    }

    pub fn load(&self) -> Option<f32> {
        let value = f32::from_bits(self.0.load(Ordering::Acquire));
        (!value.is_nan()).then_some(value)
    }

    /// Publish a new value.  `None` and NaN both read back as unset.
    pub fn store(&self, value: Option<f32>) {
        let bits = value.filter(|v| !v.is_nan()).map_or(UNSET, f32::to_bits);
        self.0.store(bits, Ordering::Release);
    }
}

impl Default for AtomicValue {
    fn default() -> Self {
        Self::unset()
    }
}
