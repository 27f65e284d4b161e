//! Per-pair de-duplication
//!
//! A contact between two balls is keyed by the sorted id pair. The key moves
//! through `Claimed -> Resolving -> Cooldown -> Idle`, advanced on ticks, so
//! duplicate notifications for one physical contact resolve exactly once.

use std::collections::BTreeMap;

use super::registry::BallId;

/// Order-independent identity of a contact between two balls
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey(BallId, BallId);

impl PairKey {
    pub fn new(a: BallId, b: BallId) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    pub fn ids(&self) -> (BallId, BallId) {
        (self.0, self.1)
    }
}

/// Lifecycle of a pair key. `Idle` keys are not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    Idle,
    /// Accepted this tick; source balls already left the registry
    Claimed,
    /// Source bodies removed, result not yet in the world
    Resolving,
    /// Resolved; duplicates are ignored until `until_tick`
    Cooldown { until_tick: u64 },
}

#[derive(Debug, Clone, Default)]
pub struct PairTable {
    states: BTreeMap<PairKey, PairState>,
}

impl PairTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, key: PairKey) -> PairState {
        self.states.get(&key).copied().unwrap_or(PairState::Idle)
    }

    pub fn is_idle(&self, key: PairKey) -> bool {
        self.state(key) == PairState::Idle
    }

    /// Claim an idle key. Returns false if the key is busy.
    pub fn claim(&mut self, key: PairKey) -> bool {
        if !self.is_idle(key) {
            return false;
        }
        self.states.insert(key, PairState::Claimed);
        true
    }

    pub fn mark_resolving(&mut self, key: PairKey) {
        if let Some(state) = self.states.get_mut(&key)
            && *state == PairState::Claimed
        {
            *state = PairState::Resolving;
        }
    }

    /// Finish a claim: enter cooldown, or go straight to idle with no cooldown
    pub fn release(&mut self, key: PairKey, now: u64, cooldown_ticks: u64) {
        if cooldown_ticks == 0 {
            self.states.remove(&key);
        } else {
            self.states.insert(
                key,
                PairState::Cooldown {
                    until_tick: now + cooldown_ticks,
                },
            );
        }
    }

    /// Drop expired cooldowns back to idle
    pub fn advance(&mut self, now: u64) {
        self.states.retain(|_, state| match *state {
            PairState::Cooldown { until_tick } => now < until_tick,
            _ => true,
        });
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
