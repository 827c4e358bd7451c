//! Terminal waveform rendering
//!
//! Paints a time-domain trace from an [`Analyser`] tap into a grid of
//! text rows, one glyph column per sample bucket, with sample value zero
//! on the midline. Inactive (or tap-less) visualizers render a flat
//! idle line. Rendering is read-only against the analyser.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::audio::Analyser;

const IDLE_GLYPH: char = '─';
const TRACE_GLYPH: char = '•';

/// Render one waveform frame.
pub fn render_waveform(
    analyser: Option<&Analyser>,
    active: bool,
    width: usize,
    height: usize,
) -> Vec<String> {
    let width = width.max(1);
    let height = height.max(1);
    let midline = (height - 1) / 2;

    let samples = match analyser {
        Some(analyser) if active => analyser.time_domain(),
        _ => {
            let mut rows = vec![" ".repeat(width); height];
            rows[midline] = IDLE_GLYPH.to_string().repeat(width);
            return rows;
        }
    };

    let mut grid = vec![vec![' '; width]; height];
    for x in 0..width {
        let index = x * samples.len() / width;
        let value = samples.get(index).copied().unwrap_or(0.0).clamp(-1.0, 1.0);
        // +1 maps to the top row, 0 to the midline, -1 to the bottom.
        let row = ((1.0 - value) / 2.0 * (height - 1) as f32).round() as usize;
        grid[row.min(height - 1)][x] = TRACE_GLYPH;
    }

    grid.into_iter().map(|row| row.into_iter().collect()).collect()
}

/// Inputs the render loop re-reads every frame, so swapping the
/// analyser or flipping the active flag takes effect immediately.
#[derive(Clone)]
pub struct VisualizerInputs {
    pub analyser: Option<Arc<Analyser>>,
    pub active: bool,
}

/// Per-frame render loop over a [`watch`]ed input.
pub struct Visualizer {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Visualizer {
    pub fn spawn<F>(
        inputs: watch::Receiver<VisualizerInputs>,
        width: usize,
        height: usize,
        fps: u32,
        mut on_frame: F,
    ) -> Self
    where
        F: FnMut(Vec<String>) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_millis(1000 / fps.max(1) as u64));
            while flag.load(Ordering::SeqCst) {
                ticker.tick().await;
                let current = inputs.borrow().clone();
                let frame =
                    render_waveform(current.analyser.as_deref(), current.active, width, height);
                on_frame(frame);
            }
        });

        Self { running, handle }
    }

    /// Cancel the render loop; no further frames are produced.
    pub fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        self.handle.abort();
    }
}
