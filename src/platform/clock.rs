//! Frame clock
//!
//! Turns variable frame deltas into a whole number of fixed simulation ticks.

use crate::consts::{MAX_FRAME_DT, MAX_SUBSTEPS, SIM_DT};

#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    accumulator: f32,
    /// Timestamp of the previous frame (ms)
    last_ms: Option<f64>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a frame delta in seconds; returns how many ticks to run.
    ///
    /// Long frames (tab switch, debugger) are clamped, and at most
    /// `MAX_SUBSTEPS` ticks run per frame to prevent a spiral of death.
    pub fn advance(&mut self, dt: f32) -> u32 {
        let dt = if dt.is_finite() { dt.clamp(0.0, MAX_FRAME_DT) } else { 0.0 };
        self.accumulator += dt;

        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            self.accumulator -= SIM_DT;
            substeps += 1;
        }
        // Drop whatever the cap left behind
        if substeps == MAX_SUBSTEPS {
            self.accumulator = self.accumulator.min(SIM_DT);
        }
        substeps
    }

    /// Feed an absolute timestamp in ms (e.g. `requestAnimationFrame` time)
    pub fn advance_to(&mut self, now_ms: f64) -> u32 {
        let dt = match self.last_ms {
            Some(last) => ((now_ms - last) / 1000.0) as f32,
            None => 0.0,
        };
        self.last_ms = Some(now_ms);
        self.advance(dt)
    }

    /// Fraction of a tick left over, for render interpolation
    pub fn alpha(&self) -> f32 {
        self.accumulator / SIM_DT
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
