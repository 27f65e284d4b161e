//! Special-ball rules
//!
//! Special balls never merge. On touching a normal ball they apply their
//! effect; on touching the floor they vanish without side effects. Contacts
//! are de-duplicated with the same pair table discipline as merges.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::pair::{PairKey, PairTable};
use super::pending::{PendingOps, RemovalCause};
use super::physics::{BodyHandle, Boundary, PhysicsWorld};
use super::registry::{BallId, BallRegistry};
use crate::config::GameConfig;
use crate::consts::POINTS_PER_LEVEL;
use crate::error::SimError;
use crate::ms_to_ticks;

/// Power ball types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialKind {
    /// Smashes every normal ball it touches, scoring for each, and keeps going
    Bull,
    /// Destroys itself together with the first normal ball it touches
    Bomb,
}

impl SpecialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialKind::Bull => "bull",
            SpecialKind::Bomb => "bomb",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bull" => Some(SpecialKind::Bull),
            "bomb" => Some(SpecialKind::Bomb),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpecialOutcome {
    /// Not a special interaction (normal-normal, special-special, walls)
    Ignored,
    /// A ball was already consumed
    Stale,
    /// Same contact already handled
    Duplicate,
    /// Special touched the floor and was removed
    Grounded { special: BallId, position: Vec2 },
    /// Bull destroyed a normal ball
    Smashed {
        special: BallId,
        target: BallId,
        points: u64,
        position: Vec2,
    },
    /// Bomb destroyed itself and a normal ball
    Detonated {
        special: BallId,
        target: BallId,
        position: Vec2,
    },
}

#[derive(Debug, Clone)]
pub struct SpecialRules {
    pairs: PairTable,
    cooldown_ticks: u64,
}

impl SpecialRules {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            pairs: PairTable::new(),
            cooldown_ticks: ms_to_ticks(config.merge_cooldown_ms),
        }
    }

    pub fn advance(&mut self, now: u64) {
        self.pairs.advance(now);
    }

    /// True if either body belongs to a special ball
    pub fn involves_special(registry: &BallRegistry, a: BodyHandle, b: BodyHandle) -> bool {
        [a, b]
            .iter()
            .any(|&h| registry.by_body(h).is_some_and(|ball| ball.is_special()))
    }

    /// Ball-ball contact where at least one side may be special
    pub fn resolve_pair(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        registry: &mut BallRegistry,
        world: &PhysicsWorld,
        pending: &mut PendingOps,
        now: u64,
    ) -> Result<SpecialOutcome, SimError> {
        let (Some(a), Some(b)) = (registry.by_body(body_a), registry.by_body(body_b)) else {
            log::debug!("stale special contact {:?} / {:?}", body_a, body_b);
            return Ok(SpecialOutcome::Stale);
        };
        let (special, target, kind) = match (a.special, b.special) {
            (Some(kind), None) => (a.clone(), b.clone(), kind),
            (None, Some(kind)) => (b.clone(), a.clone(), kind),
            _ => return Ok(SpecialOutcome::Ignored),
        };

        let key = PairKey::new(special.id, target.id);
        if !self.pairs.is_idle(key) {
            return Ok(SpecialOutcome::Duplicate);
        }
        let position = world.body(target.body)?.position;
        self.pairs.claim(key);

        let cause = match kind {
            SpecialKind::Bull => RemovalCause::Smashed,
            SpecialKind::Bomb => RemovalCause::Detonated,
        };
        registry.remove(target.id);
        pending.queue_removal(target.id, target.body, cause);
        let outcome = match kind {
            SpecialKind::Bull => SpecialOutcome::Smashed {
                special: special.id,
                target: target.id,
                points: target.level as u64 * POINTS_PER_LEVEL,
                position,
            },
            SpecialKind::Bomb => {
                registry.remove(special.id);
                pending.queue_removal(special.id, special.body, cause);
                SpecialOutcome::Detonated {
                    special: special.id,
                    target: target.id,
                    position,
                }
            }
        };
        // Nothing is spawned, so the claim resolves immediately
        self.pairs.release(key, now, self.cooldown_ticks);
        log::debug!("{} {} hit {}", kind.as_str(), special.id, target.id);
        Ok(outcome)
    }

    /// Ball-boundary contact; only specials on the floor react
    pub fn resolve_boundary(
        &mut self,
        body: BodyHandle,
        boundary: Boundary,
        registry: &mut BallRegistry,
        world: &PhysicsWorld,
        pending: &mut PendingOps,
    ) -> Result<SpecialOutcome, SimError> {
        let Some(ball) = registry.by_body(body) else {
            return Ok(SpecialOutcome::Stale);
        };
        if !ball.is_special() || boundary != Boundary::Floor {
            return Ok(SpecialOutcome::Ignored);
        }
        let ball = ball.clone();
        let position = world.body(ball.body)?.position;

        registry.remove(ball.id);
        pending.queue_removal(ball.id, ball.body, RemovalCause::Grounded);
        Ok(SpecialOutcome::Grounded {
            special: ball.id,
            position,
        })
    }
}
