//! Combo and scoring
//!
//! Every merge inside the rolling window extends the streak. The multiplier
//! grows by 0.5 every two merges, up to the configured cap, and resets when
//! the window lapses with no merge.

use crate::config::GameConfig;
use crate::consts::POINTS_PER_LEVEL;
use crate::ms_to_ticks;

/// Score produced by one merge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreDelta {
    pub points: u64,
    pub multiplier: f32,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComboState {
    Idle,
    Active {
        count: u32,
        multiplier: f32,
        expiry_tick: u64,
    },
}

#[derive(Debug, Clone)]
pub struct ComboTracker {
    state: ComboState,
    window_ticks: u64,
    max_multiplier: f32,
}

/// `min(max, 1 + floor(count / 2) * 0.5)`
pub fn multiplier_for(count: u32, max_multiplier: f32) -> f32 {
    (1.0 + (count / 2) as f32 * 0.5).min(max_multiplier)
}

/// `floor(level * 10 * multiplier)`
pub fn points_for(level: u8, multiplier: f32) -> u64 {
    (level as f64 * POINTS_PER_LEVEL as f64 * multiplier as f64).floor() as u64
}

impl ComboTracker {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            state: ComboState::Idle,
            window_ticks: ms_to_ticks(config.combo_window_ms),
            max_multiplier: config.max_combo_multiplier,
        }
    }

    pub fn state(&self) -> ComboState {
        self.state
    }

    pub fn count(&self) -> u32 {
        match self.state {
            ComboState::Idle => 0,
            ComboState::Active { count, .. } => count,
        }
    }

    pub fn multiplier(&self) -> f32 {
        match self.state {
            ComboState::Idle => 1.0,
            ComboState::Active { multiplier, .. } => multiplier,
        }
    }

    /// Register a merge of two level `level` balls at tick `now`
    pub fn on_merge(&mut self, level: u8, now: u64) -> ScoreDelta {
        let count = match self.state {
            ComboState::Active {
                count, expiry_tick, ..
            } if now < expiry_tick => count + 1,
            _ => 1,
        };
        let multiplier = multiplier_for(count, self.max_multiplier);
        // Replaces any pending expiry
        self.state = ComboState::Active {
            count,
            multiplier,
            expiry_tick: now + self.window_ticks,
        };
        ScoreDelta {
            points: points_for(level, multiplier),
            multiplier,
            count,
        }
    }

    /// Lapse the combo if its window ran out. Returns true on the transition.
    pub fn advance(&mut self, now: u64) -> bool {
        match self.state {
            ComboState::Active { expiry_tick, .. } if now >= expiry_tick => {
                self.state = ComboState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Back to baseline (session start)
    pub fn reset(&mut self) {
        self.state = ComboState::Idle;
    }
}
