//! Drop input plumbing
//!
//! The simulation accepts a drop on any tick; rate limiting and holding
//! drops until the game is playing live here.

use crate::config::GameConfig;
use crate::ms_to_ticks;
use crate::sim::{DropKind, DropRequest, GamePhase, TickInput};

/// Minimum delay between drops, counted in simulation ticks
#[derive(Debug, Clone)]
pub struct DropThrottle {
    cooldown_ticks: u64,
    last_drop: Option<u64>,
}

impl DropThrottle {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            cooldown_ticks: ms_to_ticks(config.drop_cooldown_ms),
            last_drop: None,
        }
    }

    pub fn ready(&self, now: u64) -> bool {
        self.last_drop
            .is_none_or(|last| now >= last + self.cooldown_ticks)
    }

    /// Claim a drop at tick `now`; false if still cooling down
    pub fn try_drop(&mut self, now: u64) -> bool {
        if !self.ready(now) {
            return false;
        }
        self.last_drop = Some(now);
        true
    }

    pub fn reset(&mut self) {
        self.last_drop = None;
    }
}

/// Drop and pause requests collected between animation frames
#[derive(Debug, Clone)]
pub struct DropQueue {
    throttle: DropThrottle,
    drop: Option<DropRequest>,
    pause: bool,
}

impl DropQueue {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            throttle: DropThrottle::new(config),
            drop: None,
            pause: false,
        }
    }

    /// Accept a drop only while playing with nothing queued and the throttle ready
    pub fn push_drop(&mut self, x: f32, kind: DropKind, phase: GamePhase, now: u64) -> bool {
        if phase != GamePhase::Playing || self.drop.is_some() {
            return false;
        }
        if !self.throttle.try_drop(now) {
            return false;
        }
        self.drop = Some(DropRequest { x, kind });
        true
    }

    pub fn push_pause(&mut self) {
        self.pause = true;
    }

    pub fn has_drop(&self) -> bool {
        self.drop.is_some()
    }

    /// Input for the next tick. A queued drop stays queued until a tick that
    /// ends up playing.
    pub fn next_input(&mut self, phase: GamePhase) -> TickInput {
        let pause = std::mem::take(&mut self.pause);
        let playing = match phase {
            GamePhase::Playing => !pause,
            GamePhase::Paused => pause,
            GamePhase::GameOver => false,
        };
        if phase == GamePhase::GameOver {
            self.drop = None;
        }
        TickInput {
            drop: if playing { self.drop.take() } else { None },
            pause,
        }
    }

    pub fn reset(&mut self) {
        self.throttle.reset();
        self.drop = None;
        self.pause = false;
    }
}

/// Pointer x in presentation pixels (origin at the container's left edge) to world x
pub fn pixel_to_world_x(x_px: f32, config: &GameConfig) -> f32 {
    x_px / config.pixels_per_unit - config.container_width / 2.0
}
