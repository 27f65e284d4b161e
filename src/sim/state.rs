//! Game session state
//!
//! One `GameState` is one independent session: it owns the physics world and
//! every state machine. Nothing here is global, so tests can run as many
//! sessions side by side as they like.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::combo::ComboTracker;
use super::danger::{BallSample, DangerZone};
use super::events::{GameEvent, RenderSink, ScoreSink, dispatch_all};
use super::merge::MergeArbiter;
use super::pending::PendingOps;
use super::physics::{PhysicsWorld, WorldParams};
use super::registry::{BallId, BallRegistry};
use super::spawner::{Preview, Spawner};
use super::special::SpecialRules;
use crate::config::GameConfig;
use crate::error::{ConfigError, SimError};

/// Current phase of gameplay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Active gameplay
    Playing,
    /// Game is paused
    Paused,
    /// Run ended (terminal)
    GameOver,
}

/// Complete session state
#[derive(Debug, Clone)]
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    pub config: GameConfig,
    pub world: PhysicsWorld,
    pub registry: BallRegistry,
    pub spawner: Spawner,
    pub arbiter: MergeArbiter,
    pub specials: SpecialRules,
    pub combo: ComboTracker,
    pub danger: DangerZone,
    pub pending: PendingOps,
    pub phase: GamePhase,
    pub score: u64,
    /// Score at the instant the game ended
    pub final_score: Option<u64>,
    /// Simulation tick counter
    pub time_ticks: u64,
    events: Vec<GameEvent>,
}

impl GameState {
    /// Create a new session with the given seed and configuration
    pub fn new(seed: u64, config: GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        log::info!("new session (seed {})", seed);
        Ok(Self::build(seed, config))
    }

    fn build(seed: u64, config: GameConfig) -> Self {
        Self {
            seed,
            world: PhysicsWorld::new(WorldParams::from_config(&config)),
            registry: BallRegistry::new(),
            spawner: Spawner::new(seed, &config),
            arbiter: MergeArbiter::new(&config),
            specials: SpecialRules::new(&config),
            combo: ComboTracker::new(&config),
            danger: DangerZone::new(&config),
            pending: PendingOps::new(),
            phase: GamePhase::Playing,
            score: 0,
            final_score: None,
            time_ticks: 0,
            events: Vec::new(),
            config,
        }
    }

    /// Fresh session with the same seed and config
    pub fn restart(&mut self) {
        log::info!("restarting session (seed {})", self.seed);
        let config = self.config.clone();
        *self = Self::build(self.seed, config);
    }

    pub fn is_over(&self) -> bool {
        self.phase == GamePhase::GameOver
    }

    /// Levels of the ball in hand and the next one
    pub fn preview(&self) -> Preview {
        self.spawner.preview()
    }

    /// Visible countdown of the most advanced danger timer
    pub fn danger_remaining_ms(&self) -> Option<u64> {
        self.danger.remaining_ms(self.time_ticks)
    }

    /// Place a normal ball directly, bypassing the drop queue
    pub fn place_ball(&mut self, position: Vec2, level: u8) -> Result<BallId, SimError> {
        if self.is_over() {
            return Err(SimError::GameOver);
        }
        let id = self.spawner.place(
            &mut self.world,
            &mut self.registry,
            position,
            level,
            self.time_ticks,
        )?;
        self.announce_spawn(id)?;
        Ok(id)
    }

    /// Queue a `BallSpawned` event for a ball that just entered the world
    pub(crate) fn announce_spawn(&mut self, id: BallId) -> Result<(), SimError> {
        let ball = self.registry.get(id)?;
        let (level, special) = (ball.level, ball.special);
        let position = self.world.to_presentation(self.world.body(ball.body)?.position);
        self.push_event(GameEvent::BallSpawned {
            id,
            level,
            special,
            position,
        });
        Ok(())
    }

    pub(crate) fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Events produced since the last drain
    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Enter `GameOver`, freezing the score. Repeated calls do nothing.
    pub(crate) fn trigger_game_over(&mut self, now: u64) {
        if !self.danger.trigger_over(self.score, now) {
            return;
        }
        self.phase = GamePhase::GameOver;
        self.final_score = Some(self.score);
        self.pending.clear();
        self.push_event(GameEvent::GameOver {
            final_score: self.score,
        });
        log::info!("game over at tick {} with score {}", now, self.score);
    }

    /// Per-ball snapshot for the danger zone, ordered by id
    pub fn samples(&self) -> Vec<BallSample> {
        let grace = self.arbiter.grace_ticks();
        self.registry
            .all()
            .into_iter()
            .filter_map(|ball| match self.world.body(ball.body) {
                Ok(body) => Some(BallSample {
                    id: ball.id,
                    top_y: body.position.y + body.radius,
                    speed: body.speed(),
                    in_grace: ball.in_grace(self.time_ticks, grace),
                }),
                Err(err) => {
                    log::debug!("no body for {}: {}", ball.id, err);
                    None
                }
            })
            .collect()
    }

    /// Drain pending events into the sinks, then sync every live ball's visual
    pub fn flush<R: RenderSink, S: ScoreSink>(&mut self, render: &mut R, score: &mut S) {
        let events = self.drain_events();
        dispatch_all(&events, render, score);
        self.sync_visuals(render);
    }

    /// `update_visual` for every live ball, in id order
    pub fn sync_visuals<R: RenderSink + ?Sized>(&self, render: &mut R) {
        for ball in self.registry.all() {
            if let Ok(body) = self.world.body(ball.body) {
                render.update_visual(
                    ball.id,
                    self.world.to_presentation(body.position),
                    body.rotation,
                );
            }
        }
    }
}
