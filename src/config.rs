//! Session configuration
//!
//! Consumed once at session start. Millisecond values are converted to ticks
//! by the components that own them. Persisted in LocalStorage on web so the
//! host page can override tuning without a rebuild.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::MAX_LEVEL;
use crate::error::ConfigError;

/// Game configuration and tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    // === Levels ===
    /// Highest reachable level (never above the engine ceiling of 12)
    pub max_level: u8,
    /// Radius of a level 1 ball (world units)
    pub base_radius: f32,
    /// Radius added per level (world units)
    pub radius_step: f32,
    /// Highest level the random drop distribution can produce
    pub max_random_spawn_level: u8,
    /// Level whose radius special balls use
    pub special_level: u8,

    // === Combo ===
    pub combo_window_ms: u32,
    pub max_combo_multiplier: f32,

    // === Danger zone ===
    /// Height of the band at the top of the container
    pub danger_zone_height: f32,
    /// Time a ball may rest in the band before the game ends
    pub danger_duration_ms: u32,
    /// Balls faster than this are passing through, not resting
    pub danger_speed_epsilon: f32,

    // === Contact arbitration ===
    /// Post-spawn window during which a ball ignores merges and specials
    pub spawn_grace_ms: u32,
    /// No-reprocess window for a pair key after its merge resolves
    pub merge_cooldown_ms: u32,
    /// Minimum delay between drops, enforced by the platform layer
    pub drop_cooldown_ms: u32,

    // === Container ===
    pub container_width: f32,
    pub container_height: f32,
    /// Presentation pixels per world unit
    pub pixels_per_unit: f32,

    // === Physics ===
    pub gravity: Vec2,
    pub restitution: f32,
    pub friction: f32,
    pub density: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub max_speed: f32,
    pub solver_iterations: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_level: MAX_LEVEL,
            base_radius: 0.25,
            radius_step: 0.12,
            max_random_spawn_level: 6,
            special_level: 3,

            combo_window_ms: 2000,
            max_combo_multiplier: 8.0,

            danger_zone_height: 1.2,
            danger_duration_ms: 3000,
            danger_speed_epsilon: 0.3,

            spawn_grace_ms: 100,
            merge_cooldown_ms: 150,
            drop_cooldown_ms: 500,

            container_width: 6.0,
            container_height: 9.0,
            pixels_per_unit: 60.0,

            // Heavier than real gravity so drops feel snappy
            gravity: Vec2::new(0.0, -20.0),
            restitution: 0.2,
            friction: 0.4,
            density: 1.0,
            linear_damping: 0.3,
            angular_damping: 0.8,
            max_speed: 25.0,
            solver_iterations: 8,
        }
    }
}

impl GameConfig {
    /// Radius for a ball of the given level (strictly increasing in level)
    pub fn radius_for_level(&self, level: u8) -> f32 {
        self.base_radius + (level.max(1) - 1) as f32 * self.radius_step
    }

    /// Y coordinate of the danger line (world units, floor at 0)
    pub fn danger_line_y(&self) -> f32 {
        self.container_height - self.danger_zone_height
    }

    /// Y coordinate where dropped balls appear, given their radius
    pub fn drop_y(&self, radius: f32) -> f32 {
        self.container_height - radius
    }

    /// Parse a config from JSON; missing fields fall back to defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: &'static str) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid { field, reason })
        }

        if self.max_level < 2 || self.max_level > MAX_LEVEL {
            return invalid("max_level", "must be in 2..=12");
        }
        if self.max_random_spawn_level == 0 || self.max_random_spawn_level > self.max_level {
            return invalid("max_random_spawn_level", "must be in 1..=max_level");
        }
        if self.special_level == 0 || self.special_level > self.max_level {
            return invalid("special_level", "must be in 1..=max_level");
        }
        if !(self.base_radius.is_finite() && self.base_radius > 0.0) {
            return invalid("base_radius", "must be positive");
        }
        if !(self.radius_step.is_finite() && self.radius_step > 0.0) {
            return invalid("radius_step", "must be positive so radius grows with level");
        }
        if !(self.max_combo_multiplier.is_finite() && self.max_combo_multiplier >= 1.0) {
            return invalid("max_combo_multiplier", "must be at least 1.0");
        }
        if self.combo_window_ms == 0 {
            return invalid("combo_window_ms", "must be positive");
        }
        if self.danger_duration_ms == 0 {
            return invalid("danger_duration_ms", "must be positive");
        }
        if !(self.danger_zone_height > 0.0 && self.danger_zone_height < self.container_height) {
            return invalid("danger_zone_height", "must lie inside the container");
        }
        if !(self.danger_speed_epsilon.is_finite() && self.danger_speed_epsilon >= 0.0) {
            return invalid("danger_speed_epsilon", "must be non-negative");
        }
        if self.radius_for_level(self.max_level) * 2.0 >= self.container_width {
            return invalid("container_width", "the largest ball must fit between the walls");
        }
        if !(self.pixels_per_unit.is_finite() && self.pixels_per_unit > 0.0) {
            return invalid("pixels_per_unit", "must be positive");
        }
        if !self.gravity.is_finite() {
            return invalid("gravity", "must be finite");
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return invalid("restitution", "must be in 0..=1");
        }
        if !(self.friction.is_finite() && self.friction >= 0.0) {
            return invalid("friction", "must be non-negative");
        }
        if !(self.density.is_finite() && self.density > 0.0) {
            return invalid("density", "must be positive");
        }
        // Zero damping lets settled piles jitter forever
        if !(self.linear_damping > 0.0 && self.angular_damping > 0.0) {
            return invalid("linear_damping", "damping must be non-zero");
        }
        if !(self.max_speed.is_finite() && self.max_speed > 0.0) {
            return invalid("max_speed", "must be positive");
        }
        if self.solver_iterations == 0 {
            return invalid("solver_iterations", "must be at least 1");
        }
        Ok(())
    }

    /// LocalStorage key
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "orb_merge_config";

    /// Load config from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage
            && let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY)
        {
            match Self::from_json(&json) {
                Ok(config) => {
                    log::info!("Loaded config from LocalStorage");
                    return config;
                }
                Err(e) => log::warn!("Ignoring stored config: {}", e),
            }
        }

        log::info!("Using default config");
        Self::default()
    }

    /// Save config to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage
            && let Ok(json) = serde_json::to_string(self)
        {
            let _ = storage.set_item(Self::STORAGE_KEY, &json);
            log::info!("Config saved");
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}
