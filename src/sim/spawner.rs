//! Ball spawner
//!
//! Picks the level of each droppable ball from a fixed difficulty curve and
//! instantiates dropped, merged and special balls in the world and registry.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::physics::PhysicsWorld;
use super::registry::{BallId, BallRegistry, NewBall};
use super::special::SpecialKind;
use crate::config::GameConfig;
use crate::error::SimError;

/// Cumulative upper bounds of the drop distribution: 65% / 20% / 10% / 5%
const LEVEL_1_BOUND: f32 = 0.65;
const LEVEL_2_BOUND: f32 = 0.85;
const LEVEL_3_BOUND: f32 = 0.95;
/// Lowest level of the rare top bucket
const RARE_MIN_LEVEL: u8 = 4;

/// Map a uniform roll in `[0, 1)` to a level. The rare bucket is resolved by
/// `pick_rare`, which receives the inclusive range to choose from.
pub fn level_for_roll(roll: f32, max_level: u8, pick_rare: impl FnOnce(u8, u8) -> u8) -> u8 {
    let level = if roll < LEVEL_1_BOUND {
        1
    } else if roll < LEVEL_2_BOUND {
        2
    } else if roll < LEVEL_3_BOUND {
        3
    } else if max_level >= RARE_MIN_LEVEL {
        pick_rare(RARE_MIN_LEVEL, max_level)
    } else {
        max_level
    };
    level.clamp(1, max_level.max(1))
}

/// The ball in hand and the one shown as "next"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preview {
    pub current: u8,
    pub next: u8,
}

#[derive(Debug, Clone)]
pub struct Spawner {
    rng: Pcg32,
    config: GameConfig,
    preview: Preview,
}

impl Spawner {
    pub fn new(seed: u64, config: &GameConfig) -> Self {
        let mut spawner = Self {
            rng: Pcg32::seed_from_u64(seed),
            config: config.clone(),
            preview: Preview { current: 1, next: 1 },
        };
        spawner.preview = Preview {
            current: spawner.generate_next_ball_level(),
            next: spawner.generate_next_ball_level(),
        };
        spawner
    }

    /// Draw one level from the drop distribution
    pub fn generate_next_ball_level(&mut self) -> u8 {
        let roll: f32 = self.rng.random();
        let rng = &mut self.rng;
        level_for_roll(roll, self.config.max_random_spawn_level, |lo, hi| {
            rng.random_range(lo..=hi)
        })
    }

    pub fn preview(&self) -> Preview {
        self.preview
    }

    /// Hand out the current level and advance the preview queue
    pub fn take_current(&mut self) -> u8 {
        let level = self.preview.current;
        self.preview = Preview {
            current: self.preview.next,
            next: self.generate_next_ball_level(),
        };
        level
    }

    pub fn radius(&self, level: u8) -> f32 {
        self.config.radius_for_level(level)
    }

    /// Keep a ball of `radius` fully between the walls
    pub fn clamp_x(&self, x: f32, radius: f32) -> f32 {
        let half = self.config.container_width / 2.0;
        if x.is_finite() {
            x.clamp(-half + radius, half - radius)
        } else {
            0.0
        }
    }

    /// Drop a normal ball at the top of the container
    pub fn spawn_drop(
        &self,
        world: &mut PhysicsWorld,
        registry: &mut BallRegistry,
        x: f32,
        level: u8,
        now: u64,
    ) -> Result<BallId, SimError> {
        self.check_level(level)?;
        let radius = self.radius(level);
        let position = Vec2::new(self.clamp_x(x, radius), self.config.drop_y(radius));
        self.insert(world, registry, position, level, None, now)
    }

    /// Drop a special ball at the top of the container
    pub fn spawn_special(
        &self,
        world: &mut PhysicsWorld,
        registry: &mut BallRegistry,
        x: f32,
        kind: SpecialKind,
        now: u64,
    ) -> Result<BallId, SimError> {
        let level = self.config.special_level;
        let radius = self.radius(level);
        let position = Vec2::new(self.clamp_x(x, radius), self.config.drop_y(radius));
        self.insert(world, registry, position, level, Some(kind), now)
    }

    /// Instantiate a merge result. Levels above the ceiling are rejected.
    pub fn create_merged_ball(
        &self,
        world: &mut PhysicsWorld,
        registry: &mut BallRegistry,
        position: Vec2,
        level: u8,
        now: u64,
    ) -> Result<BallId, SimError> {
        self.check_level(level)?;
        let radius = self.radius(level);
        let position = Vec2::new(self.clamp_x(position.x, radius), position.y.max(radius));
        self.insert(world, registry, position, level, None, now)
    }

    /// Place a ball anywhere (scripted setups and tests)
    pub fn place(
        &self,
        world: &mut PhysicsWorld,
        registry: &mut BallRegistry,
        position: Vec2,
        level: u8,
        now: u64,
    ) -> Result<BallId, SimError> {
        self.check_level(level)?;
        self.insert(world, registry, position, level, None, now)
    }

    fn check_level(&self, level: u8) -> Result<(), SimError> {
        if level == 0 || level > self.config.max_level {
            return Err(SimError::LevelOutOfRange {
                level,
                max: self.config.max_level,
            });
        }
        Ok(())
    }

    fn insert(
        &self,
        world: &mut PhysicsWorld,
        registry: &mut BallRegistry,
        position: Vec2,
        level: u8,
        special: Option<SpecialKind>,
        now: u64,
    ) -> Result<BallId, SimError> {
        let body = world.create_ball(position, self.radius(level))?;
        Ok(registry.register(NewBall {
            body,
            level,
            special,
            created_tick: now,
        }))
    }
}
