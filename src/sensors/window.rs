//! Rolling-window smoothing.
//!
//! Each quantity a sensor produces keeps its last `N` raw samples in a
//! fixed-capacity ring (no heap).  The smoothed value is the arithmetic
//! mean of exactly the samples currently held; an empty window has no
//! value at all rather than a fake zero.

use heapless::Deque;

use crate::error::SensorError;

/// Default number of samples averaged per quantity.
pub const WINDOW_CAPACITY: usize = 10;

/// Fixed-capacity FIFO of raw samples with an on-demand mean.
#[derive(Debug, Clone)]
pub struct SmoothingWindow<const N: usize = WINDOW_CAPACITY> {
    samples: Deque<f32, N>,
}

impl<const N: usize> SmoothingWindow<N> {
    pub fn new() -> Self {
        const { assert!(N > 0, "smoothing window capacity must be non-zero") };
        Self {
            samples: Deque::new(),
        }
    }

    /// Append a sample, evicting the oldest one when the window is full.
    ///
    /// NaN and infinities are rejected and leave the window untouched.
    pub fn push(&mut self, sample: f32) -> Result<(), SensorError> {
        if !sample.is_finite() {
            return Err(SensorError::NotFinite);
        }
        if self.samples.is_full() {
            let _ = self.samples.pop_front();
        }
        // Room was made above, so this cannot fail.
        let _ = self.samples.push_back(sample);
        Ok(())
    }

    /// Mean of the samples currently held, or `None` before the first sample.
    pub fn current(&self) -> Option<f32> {
        if self.samples.is_empty() {
            return None;
        }
        // Accumulate in f64 so N identical samples average back to exactly
        // the same f32.
        let sum: f64 = self.samples.iter().map(|&s| f64::from(s)).sum();
        Some((sum / self.samples.len() as f64) as f32)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Drop every sample; the window reads as unset afterwards.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl<const N: usize> Default for SmoothingWindow<N> {
    fn default() -> Self {
        Self::new()
    }
}
