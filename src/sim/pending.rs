//! Deferred world mutations
//!
//! Contact handling never touches the body list directly. Removals queued while
//! contacts are resolved are applied right after the contact batch; merge
//! results are created at the start of the following tick.

use glam::Vec2;
use serde::Serialize;

use super::pair::PairKey;
use super::physics::BodyHandle;
use super::registry::BallId;

/// What consumed a ball
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalCause {
    Merged,
    /// Destroyed by a bull
    Smashed,
    /// Destroyed by a bomb, or the bomb itself
    Detonated,
    /// A special ball that reached the floor
    Grounded,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingRemoval {
    pub ball: BallId,
    pub body: BodyHandle,
    pub cause: RemovalCause,
}

/// A merge result waiting to be instantiated
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingSpawn {
    pub key: PairKey,
    pub position: Vec2,
    pub level: u8,
    pub due_tick: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PendingOps {
    removals: Vec<PendingRemoval>,
    spawns: Vec<PendingSpawn>,
}

impl PendingOps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_removal(&mut self, ball: BallId, body: BodyHandle, cause: RemovalCause) {
        self.removals.push(PendingRemoval { ball, body, cause });
    }

    pub fn queue_spawn(&mut self, spawn: PendingSpawn) {
        self.spawns.push(spawn);
    }

    /// All queued removals, in queue order
    pub fn take_removals(&mut self) -> Vec<PendingRemoval> {
        std::mem::take(&mut self.removals)
    }

    /// Spawns due at or before `now`, in queue order; later ones stay queued
    pub fn take_due_spawns(&mut self, now: u64) -> Vec<PendingSpawn> {
        let (due, later): (Vec<_>, Vec<_>) =
            self.spawns.drain(..).partition(|s| s.due_tick <= now);
        self.spawns = later;
        due
    }

    pub fn pending_spawns(&self) -> usize {
        self.spawns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.spawns.is_empty()
    }

    pub fn clear(&mut self) {
        self.removals.clear();
        self.spawns.clear();
    }
}
