//! Error types for the simulation core

use thiserror::Error;

use crate::sim::physics::BodyHandle;
use crate::sim::registry::BallId;

/// Failures reported by the physics world adapter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    #[error("body {0:?} not found (already removed or never created)")]
    BodyNotFound(BodyHandle),

    #[error("invalid body: {reason}")]
    InvalidBody { reason: &'static str },

    #[error("invalid timestep: {dt}")]
    InvalidTimestep { dt: f32 },

    #[error("body {0:?} diverged to a non-finite state")]
    Diverged(BodyHandle),
}

/// Failures inside the gameplay simulation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("ball {0} not found")]
    BallNotFound(BallId),

    #[error("level {level} is outside 1..={max}")]
    LevelOutOfRange { level: u8, max: u8 },

    #[error("game is over")]
    GameOver,

    #[error(transparent)]
    Physics(#[from] PhysicsError),
}

impl SimError {
    /// True for lookups that missed because the entity was already consumed.
    ///
    /// These are a normal consequence of several contacts naming the same ball
    /// within one step and are only worth a debug trace.
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            SimError::BallNotFound(_) | SimError::Physics(PhysicsError::BodyNotFound(_))
        )
    }
}

/// Invalid configuration values
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_classification() {
        assert!(SimError::BallNotFound(BallId(3)).is_stale());
        assert!(!SimError::GameOver.is_stale());
        assert!(
            !SimError::LevelOutOfRange { level: 13, max: 12 }.is_stale()
        );
        let invalid = SimError::from(PhysicsError::InvalidTimestep { dt: 0.0 });
        assert!(!invalid.is_stale());
    }
}
