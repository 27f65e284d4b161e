//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Frame time to fixed ticks
//! - Drop input (rate limit, pixel mapping)
//! - The wasm binding the JS shell talks to

pub mod clock;
pub mod input;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use clock::FrameClock;
pub use input::{DropQueue, DropThrottle, pixel_to_world_x};
