//! Browser binding
//!
//! The JS shell owns the canvas and the animation loop. It forwards pointer
//! input to [`WebGame`], calls [`WebGame::frame`] once per animation frame and
//! renders from the returned event stream and [`WebGame::balls`].

use serde::Serialize;
use wasm_bindgen::prelude::*;

use super::{DropQueue, FrameClock, pixel_to_world_x};
use crate::config::GameConfig;
use crate::consts::SIM_DT;
use crate::scoreboard::ScoreBoard;
use crate::sim::{
    BallId, DropKind, GamePhase, GameState, NullSink, RenderSink, SpecialKind, dispatch_all,
    tick,
};

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
    log::info!("Orb Merge starting...");
}

/// Per-ball render data
#[derive(Serialize)]
struct BallView {
    id: BallId,
    level: u8,
    x: f32,
    y: f32,
    rotation: f32,
}

/// Collects `update_visual` calls into a snapshot
#[derive(Default)]
struct Snapshot {
    balls: Vec<BallView>,
    levels: Vec<(BallId, u8)>,
}

impl RenderSink for Snapshot {
    fn update_visual(&mut self, id: BallId, position: glam::Vec2, rotation: f32) {
        let level = self
            .levels
            .iter()
            .find(|(ball, _)| *ball == id)
            .map_or(0, |(_, level)| *level);
        self.balls.push(BallView {
            id,
            level,
            x: position.x,
            y: position.y,
            rotation,
        });
    }
    fn spawn_visual(&mut self, _id: BallId, _level: u8, _position: glam::Vec2) {}
    fn destroy_visual(&mut self, _id: BallId) {}
    fn emit_effect(&mut self, _kind: crate::sim::EffectKind, _position: glam::Vec2) {}
}

#[wasm_bindgen]
pub struct WebGame {
    state: GameState,
    clock: FrameClock,
    queue: DropQueue,
    board: ScoreBoard,
}

impl WebGame {
    fn queue_drop(&mut self, x_px: f32, kind: DropKind) -> bool {
        let x = pixel_to_world_x(x_px, &self.state.config);
        self.queue.push_drop(x, kind, self.state.phase, self.state.time_ticks)
    }
}

#[wasm_bindgen]
impl WebGame {
    /// `seed` defaults to the current time; `config_json` overrides stored tuning
    #[wasm_bindgen(constructor)]
    pub fn new(seed: Option<f64>, config_json: Option<String>) -> Result<WebGame, JsError> {
        let config = match config_json {
            Some(json) => GameConfig::from_json(&json)?,
            None => GameConfig::load(),
        };
        let seed = seed.unwrap_or_else(js_sys::Date::now) as u64;
        let mut board = ScoreBoard::load();
        board.begin(seed);
        Ok(Self {
            queue: DropQueue::new(&config),
            state: GameState::new(seed, config)?,
            clock: FrameClock::new(),
            board,
        })
    }

    /// Queue a drop of the ball in hand; false while paused, over or cooling down
    pub fn drop_ball(&mut self, x_px: f32) -> bool {
        self.queue_drop(x_px, DropKind::Next)
    }

    /// Queue a special drop (`"bull"` or `"bomb"`)
    pub fn drop_special(&mut self, kind: &str, x_px: f32) -> Result<bool, JsError> {
        let kind = SpecialKind::from_name(kind)
            .ok_or_else(|| JsError::new(&format!("unknown special kind: {kind}")))?;
        Ok(self.queue_drop(x_px, DropKind::Special(kind)))
    }

    pub fn toggle_pause(&mut self) {
        self.queue.push_pause();
    }

    /// Run the ticks owed for this animation frame and return the events as JSON
    pub fn frame(&mut self, now_ms: f64) -> Result<String, JsError> {
        let ticks = self.clock.advance_to(now_ms);
        for _ in 0..ticks {
            let input = self.queue.next_input(self.state.phase);
            tick(&mut self.state, &input, SIM_DT)?;
        }
        let events = self.state.drain_events();
        dispatch_all(&events, &mut NullSink, &mut self.board);
        Ok(serde_json::to_string(&events)?)
    }

    /// Every live ball in presentation pixels, as JSON
    pub fn balls(&self) -> Result<String, JsError> {
        let mut snapshot = Snapshot {
            levels: self
                .state
                .registry
                .all()
                .iter()
                .map(|ball| (ball.id, ball.level))
                .collect(),
            ..Default::default()
        };
        self.state.sync_visuals(&mut snapshot);
        Ok(serde_json::to_string(&snapshot.balls)?)
    }

    pub fn score(&self) -> f64 {
        self.state.score as f64
    }

    pub fn best_score(&self) -> f64 {
        self.board.best().unwrap_or(0) as f64
    }

    pub fn is_over(&self) -> bool {
        self.state.is_over()
    }

    pub fn is_paused(&self) -> bool {
        self.state.phase == GamePhase::Paused
    }

    /// `[current, next]`
    pub fn next_levels(&self) -> Vec<u8> {
        let preview = self.state.preview();
        vec![preview.current, preview.next]
    }

    pub fn danger_remaining_ms(&self) -> Option<f64> {
        self.state.danger_remaining_ms().map(|ms| ms as f64)
    }

    pub fn restart(&mut self) {
        self.state.restart();
        self.clock.reset();
        self.queue.reset();
        self.board.begin(self.state.seed);
    }
}
