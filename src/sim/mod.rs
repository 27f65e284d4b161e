//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by ball id, then body handle)
//! - No rendering or platform dependencies

pub mod combo;
pub mod danger;
pub mod events;
pub mod merge;
pub mod pair;
pub mod pending;
pub mod physics;
pub mod registry;
pub mod spawner;
pub mod special;
pub mod state;
pub mod tick;

pub use combo::{ComboState, ComboTracker, ScoreDelta};
pub use danger::{DangerState, DangerZone};
pub use events::{EffectKind, GameEvent, NullSink, RenderSink, ScoreSink, dispatch, dispatch_all};
pub use merge::{MergeArbiter, MergeDecision, Rejection};
pub use pending::RemovalCause;
pub use physics::{BodyHandle, BodyState, Boundary, PhysicsWorld, WorldParams};
pub use registry::{Ball, BallId, BallRegistry};
pub use spawner::{Preview, Spawner};
pub use special::SpecialKind;
pub use state::{GamePhase, GameState};
pub use tick::{DropKind, DropRequest, TickInput, tick};
