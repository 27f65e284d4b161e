//! Ball registry
//!
//! The single source of truth for which balls exist. Maps each ball id to its
//! physics body, level, special tag and creation tick, and back from body to id.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::physics::BodyHandle;
use super::special::SpecialKind;
use crate::error::SimError;

/// Opaque ball identifier, unique for the lifetime of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BallId(pub u32);

impl fmt::Display for BallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A live ball entity
#[derive(Debug, Clone, PartialEq)]
pub struct Ball {
    pub id: BallId,
    pub body: BodyHandle,
    pub level: u8,
    pub special: Option<SpecialKind>,
    /// Tick the ball was created on (drop or merge)
    pub created_tick: u64,
}

impl Ball {
    pub fn is_special(&self) -> bool {
        self.special.is_some()
    }

    /// Still inside the post-spawn immunity window
    pub fn in_grace(&self, now: u64, grace_ticks: u64) -> bool {
        now < self.created_tick + grace_ticks
    }
}

/// Everything needed to register a ball except its id
#[derive(Debug, Clone, Copy)]
pub struct NewBall {
    pub body: BodyHandle,
    pub level: u8,
    pub special: Option<SpecialKind>,
    pub created_tick: u64,
}

/// Result of a removal request
#[derive(Debug, Clone, PartialEq)]
pub enum Removal {
    Removed(Ball),
    AlreadyRemoved,
}

#[derive(Debug, Clone)]
pub struct BallRegistry {
    balls: BTreeMap<BallId, Ball>,
    by_body: HashMap<BodyHandle, BallId>,
    next_id: u32,
}

impl Default for BallRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BallRegistry {
    pub fn new() -> Self {
        Self {
            balls: BTreeMap::new(),
            by_body: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn register(&mut self, ball: NewBall) -> BallId {
        let id = BallId(self.next_id);
        self.next_id += 1;
        self.by_body.insert(ball.body, id);
        self.balls.insert(
            id,
            Ball {
                id,
                body: ball.body,
                level: ball.level,
                special: ball.special,
                created_tick: ball.created_tick,
            },
        );
        id
    }

    pub fn get(&self, id: BallId) -> Result<&Ball, SimError> {
        self.balls.get(&id).ok_or(SimError::BallNotFound(id))
    }

    /// Resolve a physics body to the ball that owns it
    pub fn by_body(&self, body: BodyHandle) -> Option<&Ball> {
        self.by_body.get(&body).and_then(|id| self.balls.get(id))
    }

    /// Remove a ball; removing it again is a harmless `AlreadyRemoved`
    pub fn remove(&mut self, id: BallId) -> Removal {
        match self.balls.remove(&id) {
            Some(ball) => {
                self.by_body.remove(&ball.body);
                Removal::Removed(ball)
            }
            None => Removal::AlreadyRemoved,
        }
    }

    /// Snapshot of all balls ordered by id; safe to hold across mutation
    pub fn all(&self) -> Vec<Ball> {
        self.balls.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.balls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balls.is_empty()
    }

    pub fn contains(&self, id: BallId) -> bool {
        self.balls.contains_key(&id)
    }
}
