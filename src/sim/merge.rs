//! Merge arbiter
//!
//! Decides, for every ball-ball contact, whether it becomes a merge, and makes
//! sure each ball is consumed by at most one merge.
//!
//! Acceptance removes both balls from the registry on the spot. Any later
//! contact in the same batch naming either ball misses the registry lookup and
//! is dropped as stale; that ordering is what prevents double merges. Body
//! removal and creation of the result are deferred through [`PendingOps`].

use std::collections::BTreeMap;

use glam::Vec2;

use super::pair::{PairKey, PairState, PairTable};
use super::pending::{PendingOps, PendingSpawn, RemovalCause};
use super::physics::{BodyHandle, Collider, PhysicsWorld};
use super::registry::{Ball, BallId, BallRegistry};
use crate::config::GameConfig;
use crate::error::SimError;
use crate::ms_to_ticks;

/// An accepted merge that has not been finalized yet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeRecord {
    pub a: BallId,
    pub b: BallId,
    pub level: u8,
    pub result_level: u8,
    pub midpoint: Vec2,
}

/// Why a contact did not merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// A ball was already consumed or its body is gone
    Stale,
    LevelMismatch,
    /// Both balls are at the level ceiling
    MaxLevel,
    /// A ball is still inside its post-spawn grace period; retried later
    Grace,
    /// The pair key is claimed or cooling down
    Busy,
    /// Special balls follow their own rules
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MergeDecision {
    Merged(MergeRecord),
    Rejected(Rejection),
}

#[derive(Debug, Clone)]
pub struct MergeArbiter {
    pairs: PairTable,
    /// Contacts rejected only for grace, waiting to be re-examined
    parked: BTreeMap<PairKey, (BodyHandle, BodyHandle)>,
    max_level: u8,
    grace_ticks: u64,
    cooldown_ticks: u64,
}

impl MergeArbiter {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            pairs: PairTable::new(),
            parked: BTreeMap::new(),
            max_level: config.max_level,
            grace_ticks: ms_to_ticks(config.spawn_grace_ms),
            cooldown_ticks: ms_to_ticks(config.merge_cooldown_ms),
        }
    }

    pub fn grace_ticks(&self) -> u64 {
        self.grace_ticks
    }

    pub fn pair_state(&self, a: BallId, b: BallId) -> PairState {
        self.pairs.state(PairKey::new(a, b))
    }

    /// Expire cooldowns
    pub fn advance(&mut self, now: u64) {
        self.pairs.advance(now);
    }

    /// Classify one ball-ball contact and, if valid, claim it
    pub fn resolve(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        registry: &mut BallRegistry,
        world: &PhysicsWorld,
        pending: &mut PendingOps,
        now: u64,
    ) -> Result<MergeDecision, SimError> {
        let (Some(a), Some(b)) = (registry.by_body(body_a), registry.by_body(body_b)) else {
            log::debug!("stale contact {:?} / {:?}", body_a, body_b);
            return Ok(MergeDecision::Rejected(Rejection::Stale));
        };
        let (a, b): (Ball, Ball) = (a.clone(), b.clone());

        if a.is_special() || b.is_special() {
            return Ok(MergeDecision::Rejected(Rejection::Special));
        }
        if a.level != b.level {
            return Ok(MergeDecision::Rejected(Rejection::LevelMismatch));
        }
        if a.level >= self.max_level {
            return Ok(MergeDecision::Rejected(Rejection::MaxLevel));
        }

        let key = PairKey::new(a.id, b.id);
        if a.in_grace(now, self.grace_ticks) || b.in_grace(now, self.grace_ticks) {
            self.parked.insert(key, (body_a, body_b));
            return Ok(MergeDecision::Rejected(Rejection::Grace));
        }
        if !self.pairs.is_idle(key) {
            return Ok(MergeDecision::Rejected(Rejection::Busy));
        }

        let pos_a = world.body(a.body)?.position;
        let pos_b = world.body(b.body)?.position;

        self.pairs.claim(key);
        self.parked.remove(&key);
        registry.remove(a.id);
        registry.remove(b.id);
        pending.queue_removal(a.id, a.body, RemovalCause::Merged);
        pending.queue_removal(b.id, b.body, RemovalCause::Merged);

        let record = MergeRecord {
            a: a.id,
            b: b.id,
            level: a.level,
            result_level: a.level + 1,
            midpoint: (pos_a + pos_b) * 0.5,
        };
        pending.queue_spawn(PendingSpawn {
            key,
            position: record.midpoint,
            level: record.result_level,
            due_tick: now + 1,
        });
        log::debug!(
            "merge {} + {} -> level {} at {:?}",
            a.id,
            b.id,
            record.result_level,
            record.midpoint
        );
        Ok(MergeDecision::Merged(record))
    }

    /// Source bodies are out of the world
    pub fn on_bodies_removed(&mut self, key: PairKey) {
        self.pairs.mark_resolving(key);
    }

    /// The replacement ball exists (or failed to); start the cooldown
    pub fn on_result_spawned(&mut self, key: PairKey, now: u64) {
        self.pairs.release(key, now, self.cooldown_ticks);
    }

    /// Parked contacts whose grace has run out and that are still touching.
    /// Parked pairs that lost a ball or separated are forgotten; separation
    /// means a future touch reports a fresh contact.
    pub fn take_due_retries(
        &mut self,
        registry: &BallRegistry,
        world: &PhysicsWorld,
        now: u64,
    ) -> Vec<(BodyHandle, BodyHandle)> {
        let grace = self.grace_ticks;
        let mut due = Vec::new();
        self.parked.retain(|_, &mut (body_a, body_b)| {
            let (Some(a), Some(b)) = (registry.by_body(body_a), registry.by_body(body_b)) else {
                return false;
            };
            if !world.is_touching(Collider::Body(body_a), Collider::Body(body_b)) {
                return false;
            }
            if a.in_grace(now, grace) || b.in_grace(now, grace) {
                return true;
            }
            due.push((body_a, body_b));
            false
        });
        due
    }

    pub fn parked_len(&self) -> usize {
        self.parked.len()
    }

    pub fn clear(&mut self) {
        self.pairs = PairTable::new();
        self.parked.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::sim::physics::WorldParams;
    use crate::sim::spawner::Spawner;

    struct Fixture {
        config: GameConfig,
        world: PhysicsWorld,
        registry: BallRegistry,
        spawner: Spawner,
        pending: PendingOps,
        arbiter: MergeArbiter,
    }

    impl Fixture {
        fn new(config: GameConfig) -> Self {
            Self {
                world: PhysicsWorld::new(WorldParams::from_config(&config)),
                registry: BallRegistry::new(),
                spawner: Spawner::new(1, &config),
                pending: PendingOps::new(),
                arbiter: MergeArbiter::new(&config),
                config,
            }
        }

        fn no_grace() -> Self {
            Self::new(GameConfig {
                spawn_grace_ms: 0,
                ..Default::default()
            })
        }

        fn place(&mut self, x: f32, level: u8, now: u64) -> BodyHandle {
            let id = self
                .spawner
                .place(&mut self.world, &mut self.registry, Vec2::new(x, 1.0), level, now)
                .unwrap();
            self.registry.get(id).unwrap().body
        }

        fn resolve(&mut self, a: BodyHandle, b: BodyHandle, now: u64) -> MergeDecision {
            self.arbiter
                .resolve(a, b, &mut self.registry, &self.world, &mut self.pending, now)
                .unwrap()
        }
    }

    #[test]
    fn test_equal_levels_merge() {
        let mut f = Fixture::no_grace();
        let a = f.place(-0.2, 3, 0);
        let b = f.place(0.2, 3, 0);

        let MergeDecision::Merged(record) = f.resolve(a, b, 5) else {
            panic!("expected merge");
        };
        assert_eq!(record.level, 3);
        assert_eq!(record.result_level, 4);
        assert!(record.midpoint.x.abs() < 1e-5);
        assert!(f.registry.is_empty());

        let removals = f.pending.take_removals();
        assert_eq!(removals.len(), 2);
        let spawns = f.pending.take_due_spawns(6);
        assert_eq!(spawns.len(), 1);
        assert_eq!(spawns[0].level, 4);
        assert_eq!(f.arbiter.pair_state(record.a, record.b), PairState::Claimed);
    }

    #[test]
    fn test_duplicate_contact_merges_once() {
        let mut f = Fixture::no_grace();
        let a = f.place(-0.2, 1, 0);
        let b = f.place(0.2, 1, 0);

        assert!(matches!(f.resolve(a, b, 1), MergeDecision::Merged(_)));
        assert_eq!(f.resolve(b, a, 1), MergeDecision::Rejected(Rejection::Stale));
        assert_eq!(f.pending.take_due_spawns(2).len(), 1);
    }

    #[test]
    fn test_shared_ball_first_contact_wins() {
        let mut f = Fixture::no_grace();
        let a = f.place(-0.5, 2, 0);
        let b = f.place(0.0, 2, 0);
        let c = f.place(0.5, 2, 0);

        assert!(matches!(f.resolve(a, b, 1), MergeDecision::Merged(_)));
        assert_eq!(f.resolve(b, c, 1), MergeDecision::Rejected(Rejection::Stale));
        assert_eq!(f.registry.len(), 1);
        assert_eq!(f.registry.by_body(c).map(|ball| ball.level), Some(2));
    }

    #[test]
    fn test_level_mismatch_rejected() {
        let mut f = Fixture::no_grace();
        let a = f.place(-0.2, 1, 0);
        let b = f.place(0.2, 2, 0);
        assert_eq!(
            f.resolve(a, b, 1),
            MergeDecision::Rejected(Rejection::LevelMismatch)
        );
        assert_eq!(f.registry.len(), 2);
        assert!(f.pending.is_empty());
    }

    #[test]
    fn test_max_level_never_merges() {
        let mut f = Fixture::no_grace();
        let max = f.config.max_level;
        let a = f.place(-1.5, max, 0);
        let b = f.place(1.5, max, 0);
        assert_eq!(f.resolve(a, b, 1), MergeDecision::Rejected(Rejection::MaxLevel));
        assert_eq!(f.registry.len(), 2);
        assert!(f.pending.is_empty());
    }

    #[test]
    fn test_grace_parks_and_retries() {
        let mut f = Fixture::new(GameConfig::default());
        let grace = f.arbiter.grace_ticks();
        assert!(grace > 0);

        // Overlapping, resting on the floor
        let a = f
            .spawner
            .place(&mut f.world, &mut f.registry, Vec2::new(-0.24, 0.25), 1, 0)
            .unwrap();
        let b = f
            .spawner
            .place(&mut f.world, &mut f.registry, Vec2::new(0.24, 0.25), 1, 0)
            .unwrap();
        let (a, b) = (
            f.registry.get(a).unwrap().body,
            f.registry.get(b).unwrap().body,
        );
        f.world.step(SIM_DT).unwrap();

        assert_eq!(f.resolve(a, b, 1), MergeDecision::Rejected(Rejection::Grace));
        assert_eq!(f.arbiter.parked_len(), 1);

        // Still in grace: nothing due yet
        assert!(f.arbiter.take_due_retries(&f.registry, &f.world, 2).is_empty());
        assert_eq!(f.arbiter.parked_len(), 1);

        for _ in 0..grace {
            f.world.step(SIM_DT).unwrap();
        }
        let due = f.arbiter.take_due_retries(&f.registry, &f.world, grace + 1);
        assert_eq!(due, vec![(a, b)]);
        assert!(matches!(f.resolve(a, b, grace + 1), MergeDecision::Merged(_)));
    }

    #[test]
    fn test_parked_pair_forgotten_after_ball_consumed() {
        let mut f = Fixture::new(GameConfig::default());
        let a = f.place(-0.2, 1, 0);
        let b = f.place(0.2, 1, 0);
        assert_eq!(f.resolve(a, b, 0), MergeDecision::Rejected(Rejection::Grace));

        let id = f.registry.by_body(a).unwrap().id;
        f.registry.remove(id);
        assert!(f.arbiter.take_due_retries(&f.registry, &f.world, 100).is_empty());
        assert_eq!(f.arbiter.parked_len(), 0);
    }

    #[test]
    fn test_release_enters_cooldown() {
        let mut f = Fixture::no_grace();
        let a = f.place(-0.2, 1, 0);
        let b = f.place(0.2, 1, 0);
        let MergeDecision::Merged(record) = f.resolve(a, b, 1) else {
            panic!("expected merge");
        };
        let key = PairKey::new(record.a, record.b);

        f.arbiter.on_bodies_removed(key);
        assert_eq!(f.arbiter.pair_state(record.a, record.b), PairState::Resolving);

        f.arbiter.on_result_spawned(key, 2);
        let cooldown = ms_to_ticks(f.config.merge_cooldown_ms);
        assert_eq!(
            f.arbiter.pair_state(record.a, record.b),
            PairState::Cooldown {
                until_tick: 2 + cooldown
            }
        );
        f.arbiter.advance(2 + cooldown);
        assert_eq!(f.arbiter.pair_state(record.a, record.b), PairState::Idle);
    }
}
