//! Fixed timestep simulation tick
//!
//! Core game loop that advances a session deterministically. Order within a
//! tick:
//!
//! 1. pause toggle, then bail out if paused or over
//! 2. timers: combo expiry, pair cooldowns
//! 3. merge results queued last tick enter the world
//! 4. the player's drop, if any
//! 5. physics step, collecting contact-begin events
//! 6. grace retries, then contacts in emission order
//! 7. queued body removals
//! 8. danger zone sampling over the settled registry

use super::events::GameEvent;
use super::merge::MergeDecision;
use super::pair::PairKey;
use super::physics::{BodyHandle, Boundary, ContactEvent};
use super::special::{SpecialKind, SpecialOutcome, SpecialRules};
use super::state::{GamePhase, GameState};
use crate::error::SimError;

/// What the player asked for this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DropKind {
    /// The ball in hand (preview `current`)
    Next,
    Special(SpecialKind),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropRequest {
    /// World x; clamped to the container
    pub x: f32,
    pub kind: DropKind,
}

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Drop a ball. Callers enforce the delay between drops.
    pub drop: Option<DropRequest>,
    /// Pause toggle
    pub pause: bool,
}

impl TickInput {
    pub fn drop_next(x: f32) -> Self {
        Self {
            drop: Some(DropRequest {
                x,
                kind: DropKind::Next,
            }),
            pause: false,
        }
    }

    pub fn drop_special(x: f32, kind: SpecialKind) -> Self {
        Self {
            drop: Some(DropRequest {
                x,
                kind: DropKind::Special(kind),
            }),
            pause: false,
        }
    }
}

/// Advance the game state by one fixed timestep.
///
/// Per-contact and per-drop failures are logged and skipped. Only a failing
/// physics step is returned, since the world can't be trusted afterwards.
pub fn tick(state: &mut GameState, input: &TickInput, dt: f32) -> Result<(), SimError> {
    // Handle pause toggle
    if input.pause {
        match state.phase {
            GamePhase::Playing => {
                state.phase = GamePhase::Paused;
                log::info!("paused at tick {}", state.time_ticks);
                return Ok(());
            }
            GamePhase::Paused => {
                state.phase = GamePhase::Playing;
                log::info!("resumed at tick {}", state.time_ticks);
            }
            GamePhase::GameOver => {}
        }
    }

    // Don't tick if paused or game over
    if state.phase != GamePhase::Playing {
        return Ok(());
    }

    state.time_ticks += 1;
    let now = state.time_ticks;

    if state.combo.advance(now) {
        state.push_event(GameEvent::ComboUpdate {
            multiplier: 1.0,
            count: 0,
        });
    }
    state.arbiter.advance(now);
    state.specials.advance(now);

    apply_due_spawns(state, now);

    if let Some(request) = input.drop
        && let Err(err) = drop_ball(state, request, now)
    {
        log::warn!("drop at x={} failed: {}", request.x, err);
    }

    let mut contacts: Vec<ContactEvent> = Vec::new();
    state.world.step_with(dt, &mut contacts)?;

    let mut merged = Vec::new();
    let retries = state
        .arbiter
        .take_due_retries(&state.registry, &state.world, now);
    for (a, b) in retries {
        report(resolve_bodies(state, a, b, now, &mut merged));
    }
    for contact in contacts {
        let result = if let Some((a, b)) = contact.bodies() {
            resolve_bodies(state, a, b, now, &mut merged)
        } else if let Some((body, boundary)) = contact.boundary() {
            resolve_boundary(state, body, boundary)
        } else {
            Ok(())
        };
        report(result);
    }

    apply_removals(state);
    for key in merged {
        state.arbiter.on_bodies_removed(key);
    }

    sample_danger(state, now);
    Ok(())
}

/// Per-contact errors never abort the batch
fn report(result: Result<(), SimError>) {
    if let Err(err) = result {
        if err.is_stale() {
            log::debug!("stale contact: {}", err);
        } else {
            log::warn!("contact skipped: {}", err);
        }
    }
}

fn drop_ball(state: &mut GameState, request: DropRequest, now: u64) -> Result<(), SimError> {
    let id = match request.kind {
        DropKind::Next => {
            let level = state.spawner.take_current();
            state
                .spawner
                .spawn_drop(&mut state.world, &mut state.registry, request.x, level, now)?
        }
        DropKind::Special(kind) => {
            state
                .spawner
                .spawn_special(&mut state.world, &mut state.registry, request.x, kind, now)?
        }
    };
    state.announce_spawn(id)
}

fn apply_due_spawns(state: &mut GameState, now: u64) {
    for spawn in state.pending.take_due_spawns(now) {
        let created = state.spawner.create_merged_ball(
            &mut state.world,
            &mut state.registry,
            spawn.position,
            spawn.level,
            now,
        );
        if let Err(err) = created.and_then(|id| state.announce_spawn(id)) {
            log::warn!("merge result (level {}) not created: {}", spawn.level, err);
        }
        state.arbiter.on_result_spawned(spawn.key, now);
    }
}

fn resolve_bodies(
    state: &mut GameState,
    a: BodyHandle,
    b: BodyHandle,
    now: u64,
    merged: &mut Vec<PairKey>,
) -> Result<(), SimError> {
    if SpecialRules::involves_special(&state.registry, a, b) {
        let outcome = state.specials.resolve_pair(
            a,
            b,
            &mut state.registry,
            &state.world,
            &mut state.pending,
            now,
        )?;
        apply_special(state, outcome);
        return Ok(());
    }

    let decision = state.arbiter.resolve(
        a,
        b,
        &mut state.registry,
        &state.world,
        &mut state.pending,
        now,
    )?;
    if let MergeDecision::Merged(record) = decision {
        merged.push(PairKey::new(record.a, record.b));
        let delta = state.combo.on_merge(record.level, now);
        state.score += delta.points;

        let position = state.world.to_presentation(record.midpoint);
        state.push_event(GameEvent::Merged {
            a: record.a,
            b: record.b,
            level: record.result_level,
            position,
        });
        state.push_event(GameEvent::ScoreDelta {
            points: delta.points,
            total: state.score,
        });
        state.push_event(GameEvent::ComboUpdate {
            multiplier: delta.multiplier,
            count: delta.count,
        });
    }
    Ok(())
}

fn resolve_boundary(
    state: &mut GameState,
    body: BodyHandle,
    boundary: Boundary,
) -> Result<(), SimError> {
    let outcome = state.specials.resolve_boundary(
        body,
        boundary,
        &mut state.registry,
        &state.world,
        &mut state.pending,
    )?;
    apply_special(state, outcome);
    Ok(())
}

fn apply_special(state: &mut GameState, outcome: SpecialOutcome) {
    if let SpecialOutcome::Smashed { points, .. } = outcome {
        state.score += points;
        state.push_event(GameEvent::ScoreDelta {
            points,
            total: state.score,
        });
    }
}

fn apply_removals(state: &mut GameState) {
    for removal in state.pending.take_removals() {
        match state.world.remove_body(removal.body) {
            Ok(body) => {
                let position = state.world.to_presentation(body.position);
                state.push_event(GameEvent::BallRemoved {
                    id: removal.ball,
                    position,
                    cause: removal.cause,
                });
            }
            Err(err) => log::debug!("body of {} already gone: {}", removal.ball, err),
        }
    }
}

fn sample_danger(state: &mut GameState, now: u64) {
    let samples = state.samples();
    let report = state.danger.sample(&samples, now);
    for id in report.started {
        log::debug!("{} entered the danger zone", id);
        state.push_event(GameEvent::DangerStarted { id });
    }
    for id in report.cleared {
        state.push_event(GameEvent::DangerCleared { id });
    }
    if let Some(id) = report.expired {
        log::info!("{} stayed in the danger zone too long", id);
        state.trigger_game_over(now);
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::config::GameConfig;
    use crate::consts::{SIM_DT, SIM_HZ};
    use crate::sim::events::tests::Recorder;

    fn no_grace() -> GameConfig {
        GameConfig {
            spawn_grace_ms: 0,
            ..Default::default()
        }
    }

    fn run(state: &mut GameState, ticks: u64) {
        let input = TickInput::default();
        for _ in 0..ticks {
            tick(state, &input, SIM_DT).unwrap();
        }
    }

    /// Two overlapping balls of `level` resting on the floor
    fn place_pair(state: &mut GameState, level: u8) {
        let r = state.config.radius_for_level(level);
        state.place_ball(Vec2::new(-r + 0.01, r), level).unwrap();
        state.place_ball(Vec2::new(r - 0.01, r), level).unwrap();
    }

    #[test]
    fn test_basic_merge() {
        let mut state = GameState::new(1, no_grace()).unwrap();
        place_pair(&mut state, 1);
        state.drain_events();

        run(&mut state, 3);
        let balls = state.registry.all();
        assert_eq!(balls.len(), 1);
        assert_eq!(balls[0].level, 2);
        assert_eq!(state.score, 10);
        assert_eq!(state.world.len(), 1);

        let mut render = Recorder::default();
        let mut score = Recorder::default();
        state.flush(&mut render, &mut score);
        assert_eq!(score.deltas, vec![10]);
        assert_eq!(render.destroyed.len(), 2);
        assert_eq!(render.spawned, vec![(balls[0].id, 2)]);
        assert!(render.effects.contains(&crate::sim::EffectKind::Merge { level: 2 }));
    }

    #[test]
    fn test_merge_waits_for_grace() {
        let mut state = GameState::new(1, GameConfig::default()).unwrap();
        place_pair(&mut state, 3);

        run(&mut state, 2);
        assert_eq!(state.registry.len(), 2, "no merge inside grace");
        run(&mut state, SIM_HZ as u64 / 2);
        let balls = state.registry.all();
        assert_eq!(balls.len(), 1);
        assert_eq!(balls[0].level, 4);
        assert_eq!(state.score, 30);
    }

    #[test]
    fn test_max_level_pair_stays() {
        let mut state = GameState::new(1, no_grace()).unwrap();
        place_pair(&mut state, 12);
        run(&mut state, 30);
        assert_eq!(state.registry.len(), 2);
        assert_eq!(state.score, 0);
        assert!(state.registry.all().iter().all(|b| b.level == 12));
    }

    #[test]
    fn test_drop_uses_preview() {
        let mut state = GameState::new(5, GameConfig::default()).unwrap();
        let before = state.preview();
        tick(&mut state, &TickInput::drop_next(0.0), SIM_DT).unwrap();

        assert!(matches!(
            state.events(),
            [GameEvent::BallSpawned { level, special: None, .. }] if *level == before.current
        ));
        assert_eq!(state.preview().current, before.next);
    }

    #[test]
    fn test_bull_smashes_and_grounds() {
        let mut state = GameState::new(1, GameConfig::default()).unwrap();
        let r = state.config.radius_for_level(2);
        state.place_ball(Vec2::new(0.0, r), 2).unwrap();
        tick(
            &mut state,
            &TickInput::drop_special(0.0, SpecialKind::Bull),
            SIM_DT,
        )
        .unwrap();
        run(&mut state, 3 * SIM_HZ as u64);

        assert!(state.registry.is_empty());
        assert!(state.world.is_empty());
        assert_eq!(state.score, 20);
        assert_eq!(state.combo.count(), 0);
    }

    #[test]
    fn test_bomb_scores_nothing() {
        let mut state = GameState::new(1, GameConfig::default()).unwrap();
        let r = state.config.radius_for_level(5);
        state.place_ball(Vec2::new(0.0, r), 5).unwrap();
        tick(
            &mut state,
            &TickInput::drop_special(0.0, SpecialKind::Bomb),
            SIM_DT,
        )
        .unwrap();
        run(&mut state, 3 * SIM_HZ as u64);

        assert!(state.registry.is_empty());
        assert_eq!(state.score, 0);
    }

    #[test]
    fn test_pause_freezes() {
        let mut state = GameState::new(1, GameConfig::default()).unwrap();
        let pause = TickInput {
            pause: true,
            ..Default::default()
        };
        tick(&mut state, &pause, SIM_DT).unwrap();
        assert_eq!(state.phase, GamePhase::Paused);

        tick(&mut state, &TickInput::drop_next(0.0), SIM_DT).unwrap();
        assert_eq!(state.time_ticks, 0);
        assert!(state.registry.is_empty());

        tick(&mut state, &pause, SIM_DT).unwrap();
        assert_eq!(state.phase, GamePhase::Playing);
        assert_eq!(state.time_ticks, 1);
    }

    #[test]
    fn test_game_over_is_terminal() {
        // Danger line just above the floor so a resting ball trips it
        let config = GameConfig {
            spawn_grace_ms: 0,
            danger_zone_height: 8.9,
            danger_duration_ms: 1000,
            ..Default::default()
        };
        let mut state = GameState::new(1, config).unwrap();
        place_pair(&mut state, 1);

        let mut ticks = 0;
        while !state.is_over() && ticks < 10 * SIM_HZ {
            tick(&mut state, &TickInput::default(), SIM_DT).unwrap();
            ticks += 1;
        }
        assert_eq!(state.phase, GamePhase::GameOver);
        assert_eq!(state.final_score, Some(10));

        let mut render = Recorder::default();
        let mut score = Recorder::default();
        state.flush(&mut render, &mut score);
        assert_eq!(score.game_overs, vec![10]);

        // Nothing moves any more
        let time = state.time_ticks;
        let balls = state.registry.all();
        for _ in 0..SIM_HZ {
            tick(&mut state, &TickInput::drop_next(0.0), SIM_DT).unwrap();
        }
        assert_eq!(state.time_ticks, time);
        assert_eq!(state.registry.all(), balls);
        assert!(state.events().is_empty());

        state.flush(&mut render, &mut score);
        assert_eq!(score.game_overs, vec![10]);
    }

    #[test]
    fn test_invalid_dt_propagates() {
        let mut state = GameState::new(1, GameConfig::default()).unwrap();
        let result = tick(&mut state, &TickInput::default(), 0.0);
        assert!(matches!(result, Err(SimError::Physics(_))));
    }

    #[test]
    fn test_determinism() {
        fn play(seed: u64) -> (u64, Vec<(u8, Vec2)>) {
            let mut state = GameState::new(seed, GameConfig::default()).unwrap();
            let xs = [-2.0, 1.5, 0.0, 0.3, -0.7, 2.2, -1.1, 0.9];
            for i in 0..(20 * SIM_HZ as usize) {
                let input = if i % 60 == 0 {
                    TickInput::drop_next(xs[(i / 60) % xs.len()])
                } else {
                    TickInput::default()
                };
                tick(&mut state, &input, SIM_DT).unwrap();
            }
            let balls = state
                .registry
                .all()
                .into_iter()
                .map(|b| (b.level, state.world.body(b.body).unwrap().position))
                .collect();
            (state.score, balls)
        }

        assert_eq!(play(77), play(77));
    }
}
