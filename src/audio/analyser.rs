//! Time-domain analysis tap for waveform visualization
//!
//! An `Analyser` keeps a sliding window of the most recent samples that
//! passed through one side of the audio pipeline. The capture backend and
//! the speaker sink write into it; the visualizer only ever reads.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Window size in samples. Matches an analysis node with a 256-point FFT
/// (half the FFT size is rendered).
pub const DEFAULT_WINDOW: usize = 128;

pub struct Analyser {
    window: Mutex<VecDeque<f32>>,
    capacity: usize,
}

impl Analyser {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    pub fn with_window(capacity: usize) -> Self {
        Self {
            window: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append samples, evicting the oldest beyond the window.
    ///
    /// Called from audio callbacks; must stay cheap.
    pub fn push(&self, samples: &[f32]) {
        let mut window = match self.window.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for &sample in samples {
            if window.len() == self.capacity {
                window.pop_front();
            }
            window.push_back(sample);
        }
    }

    /// Snapshot of the current window, front-padded with silence so the
    /// result is always exactly the window length.
    pub fn time_domain(&self) -> Vec<f32> {
        let window = match self.window.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut samples = vec![0.0; self.capacity - window.len()];
        samples.extend(window.iter().copied());
        samples
    }

    pub fn window_len(&self) -> usize {
        self.capacity
    }
}

impl Default for Analyser {
    fn default() -> Self {
        Self::new()
    }
}
