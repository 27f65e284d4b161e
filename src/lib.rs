//! Orb Merge - A drop-and-merge physics puzzle engine
//!
//! Core modules:
//! - `sim`: Deterministic simulation (physics, merges, combo, danger zone)
//! - `config`: Session configuration and tuning
//! - `platform`: Browser/native frame loop and input plumbing
//! - `scoreboard`: Score sink with a local leaderboard

pub mod config;
pub mod error;
pub mod platform;
pub mod scoreboard;
pub mod sim;

pub use config::GameConfig;
pub use error::{ConfigError, PhysicsError, SimError};
pub use scoreboard::ScoreBoard;

/// Game configuration constants
pub mod consts {
    /// Simulation rate (ticks per second)
    pub const SIM_HZ: u32 = 120;
    /// Fixed simulation timestep (120 Hz for stable stacking)
    pub const SIM_DT: f32 = 1.0 / SIM_HZ as f32;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Longest frame delta fed to the accumulator (seconds)
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Highest ball level; terminal balls never merge further
    pub const MAX_LEVEL: u8 = 12;
    /// Points per level before the combo multiplier
    pub const POINTS_PER_LEVEL: u64 = 10;
}

/// Convert a millisecond duration to a whole number of simulation ticks (rounded up)
#[inline]
pub fn ms_to_ticks(ms: u32) -> u64 {
    (ms as u64 * consts::SIM_HZ as u64).div_ceil(1000)
}

/// Convert a tick count back to milliseconds (rounded down)
#[inline]
pub fn ticks_to_ms(ticks: u64) -> u64 {
    ticks * 1000 / consts::SIM_HZ as u64
}
