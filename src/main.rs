//! Orb Merge entry point
//!
//! The browser build is driven from JS through `platform::web::WebGame`.
//! Natively this runs a headless autoplay session and logs the result.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use orb_merge::consts::{SIM_DT, SIM_HZ};
    use orb_merge::platform::DropThrottle;
    use orb_merge::sim::{GameState, NullSink, TickInput, tick};
    use orb_merge::{GameConfig, ScoreBoard};
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    env_logger::init();
    log::info!("Orb Merge (native) starting...");

    let seed = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(42);
    let config = GameConfig::default();
    let mut state = match GameState::new(seed, config.clone()) {
        Ok(state) => state,
        Err(e) => {
            log::error!("bad config: {}", e);
            std::process::exit(1);
        }
    };
    let mut throttle = DropThrottle::new(&config);
    let mut board = ScoreBoard::load();
    board.begin(seed);
    let mut aim = Pcg32::seed_from_u64(seed ^ 0x5eed);
    let half = config.container_width / 2.0;

    // Ten simulated minutes at most
    let max_ticks = 10 * 60 * SIM_HZ as u64;
    while !state.is_over() && state.time_ticks < max_ticks {
        let input = if throttle.try_drop(state.time_ticks) {
            // Aim at a ball of the level in hand, otherwise anywhere
            let level = state.preview().current;
            let target = state
                .registry
                .all()
                .into_iter()
                .filter(|ball| ball.level == level && !ball.is_special())
                .find_map(|ball| state.world.body(ball.body).ok())
                .map(|body| body.position.x);
            TickInput::drop_next(target.unwrap_or_else(|| aim.random_range(-half..half)))
        } else {
            TickInput::default()
        };

        if let Err(e) = tick(&mut state, &input, SIM_DT) {
            log::error!("simulation stopped: {}", e);
            break;
        }
        state.flush(&mut NullSink, &mut board);
    }

    log::info!(
        "seed {}: score {} after {:.1}s, {} balls on the board{}",
        seed,
        state.score,
        state.time_ticks as f32 * SIM_DT,
        state.registry.len(),
        if state.is_over() { " (game over)" } else { "" }
    );
    if let Some(rank) = board.last_rank() {
        log::info!("rank {} on the local board", rank);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is platform::web::start, this is just to satisfy the compiler
}
