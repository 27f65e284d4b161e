//! Outbound events and the sinks that consume them
//!
//! The simulation never calls into rendering or scoring code directly. Each
//! tick appends [`GameEvent`]s to the session; the host drains them into a
//! [`RenderSink`] and a [`ScoreSink`] (or ships them as JSON to a web shell).
//! Positions carried by events are presentation pixels.

use glam::Vec2;
use serde::Serialize;

use super::pending::RemovalCause;
use super::registry::BallId;
use super::special::SpecialKind;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    BallSpawned {
        id: BallId,
        level: u8,
        special: Option<SpecialKind>,
        position: Vec2,
    },
    BallRemoved {
        id: BallId,
        position: Vec2,
        cause: RemovalCause,
    },
    /// Two balls of `level - 1` merged; the result appears next tick
    Merged {
        a: BallId,
        b: BallId,
        level: u8,
        position: Vec2,
    },
    ScoreDelta { points: u64, total: u64 },
    ComboUpdate { multiplier: f32, count: u32 },
    DangerStarted { id: BallId },
    DangerCleared { id: BallId },
    GameOver { final_score: u64 },
}

/// Visual effect requests
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectKind {
    Merge { level: u8 },
    Destroy,
    GameOver,
    ComboUpdate { multiplier: f32, count: u32 },
}

/// Presentation side. Visuals are keyed by ball id.
pub trait RenderSink {
    fn update_visual(&mut self, id: BallId, position: Vec2, rotation: f32);
    fn spawn_visual(&mut self, id: BallId, level: u8, position: Vec2);
    fn destroy_visual(&mut self, id: BallId);
    /// Screen-anchored effects (game over, combo) carry `Vec2::ZERO`
    fn emit_effect(&mut self, kind: EffectKind, position: Vec2);
}

/// Score and progress side; persistence is up to the implementor
pub trait ScoreSink {
    fn on_score_delta(&mut self, points: u64);
    fn on_game_over(&mut self, final_score: u64);
}

/// Sinks that ignore everything (headless runs)
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn update_visual(&mut self, _id: BallId, _position: Vec2, _rotation: f32) {}
    fn spawn_visual(&mut self, _id: BallId, _level: u8, _position: Vec2) {}
    fn destroy_visual(&mut self, _id: BallId) {}
    fn emit_effect(&mut self, _kind: EffectKind, _position: Vec2) {}
}

impl ScoreSink for NullSink {
    fn on_score_delta(&mut self, _points: u64) {}
    fn on_game_over(&mut self, _final_score: u64) {}
}

/// Translate one event into sink calls
pub fn dispatch<R, S>(event: &GameEvent, render: &mut R, score: &mut S)
where
    R: RenderSink + ?Sized,
    S: ScoreSink + ?Sized,
{
    match *event {
        GameEvent::BallSpawned {
            id,
            level,
            position,
            ..
        } => render.spawn_visual(id, level, position),
        GameEvent::BallRemoved {
            id,
            position,
            cause,
        } => {
            render.destroy_visual(id);
            if matches!(cause, RemovalCause::Smashed | RemovalCause::Detonated) {
                render.emit_effect(EffectKind::Destroy, position);
            }
        }
        GameEvent::Merged {
            level, position, ..
        } => render.emit_effect(EffectKind::Merge { level }, position),
        GameEvent::ScoreDelta { points, .. } => score.on_score_delta(points),
        GameEvent::ComboUpdate { multiplier, count } => {
            render.emit_effect(EffectKind::ComboUpdate { multiplier, count }, Vec2::ZERO)
        }
        // Shown by the host from the event stream; no sink call
        GameEvent::DangerStarted { .. } | GameEvent::DangerCleared { .. } => {}
        GameEvent::GameOver { final_score } => {
            render.emit_effect(EffectKind::GameOver, Vec2::ZERO);
            score.on_game_over(final_score);
        }
    }
}

/// Translate a batch of events, in order
pub fn dispatch_all<R, S>(events: &[GameEvent], render: &mut R, score: &mut S)
where
    R: RenderSink + ?Sized,
    S: ScoreSink + ?Sized,
{
    for event in events {
        dispatch(event, render, score);
    }
}
