//! Physics world adapter
//!
//! A fixed-timestep circle solver in an open-topped box. Owns every body's
//! simulation state; nothing else mutates positions or velocities.
//!
//! Contacts are reported only when a pair *begins* touching. A sustained
//! contact is not re-reported until the pair separates and touches again.
//! Contacts are handed to a [`ContactListener`] after the step has finished,
//! so listeners can never mutate the body list mid-step.

use std::collections::BTreeSet;
use std::f32::consts::TAU;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::error::PhysicsError;

/// Extra gap under which two shapes still count as touching
pub const CONTACT_SLOP: f32 = 0.01;
/// Fraction of penetration removed per solver pass
const POSITION_CORRECTION: f32 = 0.8;
/// Penetration left alone so resting contacts stay touching
const PENETRATION_ALLOWANCE: f32 = 0.005;
/// Approach speeds below this bounce with zero restitution
const RESTING_SPEED: f32 = 0.5;

/// Generational handle to a body in the world
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BodyHandle {
    index: u32,
    generation: u32,
}

/// Static container edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Boundary {
    Floor,
    LeftWall,
    RightWall,
}

/// One side of a contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Collider {
    Body(BodyHandle),
    Boundary(Boundary),
}

/// A pair that started touching during the last step.
///
/// `a` is always a body; `b` is a body (ordered after `a`) or a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEvent {
    pub a: Collider,
    pub b: Collider,
}

impl ContactEvent {
    pub fn between_bodies(a: BodyHandle, b: BodyHandle) -> Self {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        Self {
            a: Collider::Body(a),
            b: Collider::Body(b),
        }
    }

    pub fn with_boundary(body: BodyHandle, boundary: Boundary) -> Self {
        Self {
            a: Collider::Body(body),
            b: Collider::Boundary(boundary),
        }
    }

    /// Both handles if this is a body-body contact
    pub fn bodies(&self) -> Option<(BodyHandle, BodyHandle)> {
        match (self.a, self.b) {
            (Collider::Body(a), Collider::Body(b)) => Some((a, b)),
            _ => None,
        }
    }

    /// The body and the boundary if this is a body-boundary contact
    pub fn boundary(&self) -> Option<(BodyHandle, Boundary)> {
        match (self.a, self.b) {
            (Collider::Body(a), Collider::Boundary(edge)) => Some((a, edge)),
            _ => None,
        }
    }
}

/// Receives contact-begin notifications after each step
pub trait ContactListener {
    fn on_contact_begin(&mut self, contact: ContactEvent);
}

impl ContactListener for Vec<ContactEvent> {
    fn on_contact_begin(&mut self, contact: ContactEvent) {
        self.push(contact);
    }
}

/// Snapshot of one body's simulation state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: Vec2,
    pub velocity: Vec2,
    pub rotation: f32,
    pub angular_velocity: f32,
    pub radius: f32,
}

impl BodyState {
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }
}

#[derive(Debug, Clone)]
struct Body {
    state: BodyState,
    inv_mass: f32,
    inv_inertia: f32,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    body: Option<Body>,
}

/// Tuning the solver runs with, derived from [`GameConfig`]
#[derive(Debug, Clone)]
pub struct WorldParams {
    pub gravity: Vec2,
    pub half_width: f32,
    pub height: f32,
    pub pixels_per_unit: f32,
    pub restitution: f32,
    pub friction: f32,
    pub density: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub max_speed: f32,
    pub iterations: u32,
}

impl WorldParams {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            gravity: config.gravity,
            half_width: config.container_width / 2.0,
            height: config.container_height,
            pixels_per_unit: config.pixels_per_unit,
            restitution: config.restitution,
            friction: config.friction,
            density: config.density,
            linear_damping: config.linear_damping,
            angular_damping: config.angular_damping,
            max_speed: config.max_speed,
            iterations: config.solver_iterations.max(1),
        }
    }
}

/// The simulated world: bodies, container and contact tracking
#[derive(Debug, Clone)]
pub struct PhysicsWorld {
    params: WorldParams,
    slots: Vec<Slot>,
    free: Vec<u32>,
    touching: BTreeSet<(Collider, Collider)>,
    live: usize,
}

impl PhysicsWorld {
    pub fn new(params: WorldParams) -> Self {
        Self {
            params,
            slots: Vec::new(),
            free: Vec::new(),
            touching: BTreeSet::new(),
            live: 0,
        }
    }

    pub fn params(&self) -> &WorldParams {
        &self.params
    }

    /// Number of simulating bodies
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Create a dynamic circular body at rest
    pub fn create_ball(&mut self, position: Vec2, radius: f32) -> Result<BodyHandle, PhysicsError> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(PhysicsError::InvalidBody {
                reason: "radius must be positive and finite",
            });
        }
        if !position.is_finite() {
            return Err(PhysicsError::InvalidBody {
                reason: "position must be finite",
            });
        }

        let mass = self.params.density * std::f32::consts::PI * radius * radius;
        let inertia = 0.5 * mass * radius * radius;
        let body = Body {
            state: BodyState {
                position,
                velocity: Vec2::ZERO,
                rotation: 0.0,
                angular_velocity: 0.0,
                radius,
            },
            inv_mass: 1.0 / mass,
            inv_inertia: 1.0 / inertia,
        };

        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.body = Some(body);
                BodyHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    body: Some(body),
                });
                BodyHandle {
                    index,
                    generation: 0,
                }
            }
        };
        self.live += 1;
        Ok(handle)
    }

    /// Destroy a body. A second call with the same handle reports `BodyNotFound`.
    pub fn remove_body(&mut self, handle: BodyHandle) -> Result<BodyState, PhysicsError> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .ok_or(PhysicsError::BodyNotFound(handle))?;
        let body = slot.body.take().ok_or(PhysicsError::BodyNotFound(handle))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;

        let gone = Collider::Body(handle);
        self.touching.retain(|&(a, b)| a != gone && b != gone);
        Ok(body.state)
    }

    /// Current state of a body
    pub fn body(&self, handle: BodyHandle) -> Result<BodyState, PhysicsError> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.body.as_ref())
            .map(|body| body.state)
            .ok_or(PhysicsError::BodyNotFound(handle))
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.body(handle).is_ok()
    }

    /// Whether the pair was touching at the end of the last step
    pub fn is_touching(&self, a: Collider, b: Collider) -> bool {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.touching.contains(&key)
    }

    /// Advance the world and discard contact notifications
    pub fn step(&mut self, dt: f32) -> Result<(), PhysicsError> {
        let mut ignored = Vec::new();
        self.step_with(dt, &mut ignored)
    }

    /// Advance the world by one fixed timestep, then report new contacts
    pub fn step_with<L: ContactListener>(
        &mut self,
        dt: f32,
        listener: &mut L,
    ) -> Result<(), PhysicsError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(PhysicsError::InvalidTimestep { dt });
        }

        self.integrate(dt);
        let live = self.live_indices();
        for _ in 0..self.params.iterations {
            self.solve_pairs(&live);
            self.solve_boundaries(&live);
        }
        self.check_finite(&live)?;

        let now_touching = self.collect_touching(&live);
        for &(a, b) in now_touching.difference(&self.touching) {
            listener.on_contact_begin(ContactEvent { a, b });
        }
        self.touching = now_touching;
        Ok(())
    }

    /// World position to presentation pixels (origin top-left, y down)
    pub fn to_presentation(&self, position: Vec2) -> Vec2 {
        Vec2::new(
            (position.x + self.params.half_width) * self.params.pixels_per_unit,
            (self.params.height - position.y) * self.params.pixels_per_unit,
        )
    }

    /// Presentation x (pixels) to world x
    pub fn presentation_x_to_world(&self, x: f32) -> f32 {
        x / self.params.pixels_per_unit - self.params.half_width
    }

    fn live_indices(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.body.is_some())
            .map(|(i, _)| i)
            .collect()
    }

    fn handle_at(&self, index: usize) -> BodyHandle {
        BodyHandle {
            index: index as u32,
            generation: self.slots[index].generation,
        }
    }

    fn integrate(&mut self, dt: f32) {
        let p = &self.params;
        let linear_decay = 1.0 / (1.0 + dt * p.linear_damping);
        let angular_decay = 1.0 / (1.0 + dt * p.angular_damping);

        for body in self.slots.iter_mut().filter_map(|s| s.body.as_mut()) {
            let s = &mut body.state;
            s.velocity += p.gravity * dt;
            s.velocity *= linear_decay;
            s.angular_velocity *= angular_decay;

            let speed = s.velocity.length();
            if speed > p.max_speed {
                s.velocity *= p.max_speed / speed;
            }

            s.position += s.velocity * dt;
            s.rotation = (s.rotation + s.angular_velocity * dt).rem_euclid(TAU);
        }
    }

    fn solve_pairs(&mut self, live: &[usize]) {
        let (restitution, friction) = (self.params.restitution, self.params.friction);
        for (n, &i) in live.iter().enumerate() {
            for &j in &live[n + 1..] {
                let (lo, hi) = self.slots.split_at_mut(j);
                let (Some(a), Some(b)) = (lo[i].body.as_mut(), hi[0].body.as_mut()) else {
                    continue;
                };
                resolve_pair(a, b, restitution, friction);
            }
        }
    }

    fn solve_boundaries(&mut self, live: &[usize]) {
        let (restitution, friction) = (self.params.restitution, self.params.friction);
        let half_width = self.params.half_width;
        for &i in live {
            let Some(body) = self.slots[i].body.as_mut() else {
                continue;
            };
            for edge in [Boundary::Floor, Boundary::LeftWall, Boundary::RightWall] {
                let (normal, penetration) = boundary_overlap(&body.state, edge, half_width);
                if penetration <= 0.0 {
                    continue;
                }
                body.state.position -=
                    normal * (penetration - PENETRATION_ALLOWANCE).max(0.0);
                apply_contact_impulse(body, None, normal, restitution, friction);
            }
        }
    }

    fn check_finite(&self, live: &[usize]) -> Result<(), PhysicsError> {
        for &i in live {
            if let Some(body) = &self.slots[i].body {
                let s = &body.state;
                if !(s.position.is_finite()
                    && s.velocity.is_finite()
                    && s.angular_velocity.is_finite())
                {
                    return Err(PhysicsError::Diverged(self.handle_at(i)));
                }
            }
        }
        Ok(())
    }

    fn collect_touching(&self, live: &[usize]) -> BTreeSet<(Collider, Collider)> {
        let mut touching = BTreeSet::new();
        for (n, &i) in live.iter().enumerate() {
            let Some(a) = &self.slots[i].body else {
                continue;
            };
            let ha = self.handle_at(i);

            for &j in &live[n + 1..] {
                let Some(b) = &self.slots[j].body else {
                    continue;
                };
                let reach = a.state.radius + b.state.radius + CONTACT_SLOP;
                if a.state.position.distance_squared(b.state.position) <= reach * reach {
                    touching.insert((Collider::Body(ha), Collider::Body(self.handle_at(j))));
                }
            }

            for edge in [Boundary::Floor, Boundary::LeftWall, Boundary::RightWall] {
                let (_, penetration) = boundary_overlap(&a.state, edge, self.params.half_width);
                if penetration >= -CONTACT_SLOP {
                    touching.insert((Collider::Body(ha), Collider::Boundary(edge)));
                }
            }
        }
        touching
    }
}

/// Outward normal (body toward edge) and penetration depth against a boundary
fn boundary_overlap(state: &BodyState, edge: Boundary, half_width: f32) -> (Vec2, f32) {
    let Vec2 { x, y } = state.position;
    let r = state.radius;
    match edge {
        Boundary::Floor => (Vec2::NEG_Y, r - y),
        Boundary::LeftWall => (Vec2::NEG_X, r - (x + half_width)),
        Boundary::RightWall => (Vec2::X, x + r - half_width),
    }
}

fn resolve_pair(a: &mut Body, b: &mut Body, restitution: f32, friction: f32) {
    let delta = b.state.position - a.state.position;
    let reach = a.state.radius + b.state.radius;
    let dist_sq = delta.length_squared();
    if dist_sq >= reach * reach {
        return;
    }

    let dist = dist_sq.sqrt();
    // Coincident centers: push apart vertically
    let normal = if dist > 1e-6 { delta / dist } else { Vec2::Y };
    let penetration = reach - dist;

    let inv_sum = a.inv_mass + b.inv_mass;
    let correction =
        normal * ((penetration - PENETRATION_ALLOWANCE).max(0.0) / inv_sum * POSITION_CORRECTION);
    a.state.position -= correction * a.inv_mass;
    b.state.position += correction * b.inv_mass;

    apply_contact_impulse(a, Some(b), normal, restitution, friction);
}

/// Normal + friction impulse along `normal` (pointing from `a` to `b`).
/// A missing `b` is an immovable boundary.
fn apply_contact_impulse(
    a: &mut Body,
    mut b: Option<&mut Body>,
    normal: Vec2,
    restitution: f32,
    friction: f32,
) {
    let ra = normal * a.state.radius;
    let (vb, wb, inv_mb, inv_ib, rb) = match b.as_deref() {
        Some(b) => (
            b.state.velocity,
            b.state.angular_velocity,
            b.inv_mass,
            b.inv_inertia,
            -normal * b.state.radius,
        ),
        None => (Vec2::ZERO, 0.0, 0.0, 0.0, Vec2::ZERO),
    };

    let va_contact = a.state.velocity + ra.perp() * a.state.angular_velocity;
    let vb_contact = vb + rb.perp() * wb;
    let relative = vb_contact - va_contact;
    let vn = relative.dot(normal);
    if vn >= 0.0 {
        return;
    }

    let e = if -vn < RESTING_SPEED { 0.0 } else { restitution };
    let inv_sum = a.inv_mass + inv_mb;
    let jn = -(1.0 + e) * vn / inv_sum;
    let mut impulse = normal * jn;

    let tangent = (relative - normal * vn).normalize_or_zero();
    if tangent != Vec2::ZERO {
        let k = inv_sum
            + ra.perp_dot(tangent).powi(2) * a.inv_inertia
            + rb.perp_dot(tangent).powi(2) * inv_ib;
        let jt = (-relative.dot(tangent) / k).clamp(-friction * jn, friction * jn);
        impulse += tangent * jt;
    }

    a.state.velocity -= impulse * a.inv_mass;
    a.state.angular_velocity -= ra.perp_dot(impulse) * a.inv_inertia;
    if let Some(b) = b.as_deref_mut() {
        b.state.velocity += impulse * b.inv_mass;
        b.state.angular_velocity += rb.perp_dot(impulse) * b.inv_inertia;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(WorldParams::from_config(&GameConfig::default()))
    }

    fn run(world: &mut PhysicsWorld, seconds: f32) -> Vec<ContactEvent> {
        let mut contacts = Vec::new();
        let ticks = (seconds / SIM_DT) as u32;
        for _ in 0..ticks {
            world.step_with(SIM_DT, &mut contacts).unwrap();
        }
        contacts
    }

    #[test]
    fn test_remove_twice_is_not_found() {
        let mut world = world();
        let h = world.create_ball(Vec2::new(0.0, 2.0), 0.3).unwrap();
        assert_eq!(world.len(), 1);
        assert!(world.remove_body(h).is_ok());
        assert_eq!(world.remove_body(h), Err(PhysicsError::BodyNotFound(h)));
        assert!(world.is_empty());
    }

    #[test]
    fn test_stale_handle_after_slot_reuse() {
        let mut world = world();
        let old = world.create_ball(Vec2::new(0.0, 2.0), 0.3).unwrap();
        world.remove_body(old).unwrap();
        let new = world.create_ball(Vec2::new(1.0, 2.0), 0.3).unwrap();

        assert_ne!(old, new);
        assert!(world.body(old).is_err());
        assert_eq!(world.body(new).unwrap().position, Vec2::new(1.0, 2.0));
    }

    #[test]
    fn test_invalid_body_rejected() {
        let mut world = world();
        assert!(matches!(
            world.create_ball(Vec2::ZERO, 0.0),
            Err(PhysicsError::InvalidBody { .. })
        ));
        assert!(matches!(
            world.create_ball(Vec2::new(f32::NAN, 1.0), 0.3),
            Err(PhysicsError::InvalidBody { .. })
        ));
        assert!(world.is_empty());
    }

    #[test]
    fn test_invalid_timestep() {
        let mut world = world();
        assert!(matches!(
            world.step(0.0),
            Err(PhysicsError::InvalidTimestep { .. })
        ));
        assert!(world.step(f32::NAN).is_err());
    }

    #[test]
    fn test_ball_settles_on_floor() {
        let mut world = world();
        let h = world.create_ball(Vec2::new(0.0, 4.0), 0.3).unwrap();
        let contacts = run(&mut world, 5.0);

        let state = world.body(h).unwrap();
        assert!((state.position.y - 0.3).abs() < 0.02, "y = {}", state.position.y);
        assert!(state.speed() < 0.3, "speed = {}", state.speed());
        assert!(contacts.contains(&ContactEvent::with_boundary(h, Boundary::Floor)));
    }

    fn teleport(world: &mut PhysicsWorld, handle: BodyHandle, position: Vec2) {
        let body = world.slots[handle.index as usize].body.as_mut().unwrap();
        body.state.position = position;
        body.state.velocity = Vec2::ZERO;
    }

    #[test]
    fn test_contact_begin_fires_again_after_separation() {
        let mut world = world();
        let a = world.create_ball(Vec2::new(-0.24, 0.25), 0.25).unwrap();
        let b = world.create_ball(Vec2::new(0.24, 0.25), 0.25).unwrap();
        let pair = ContactEvent::between_bodies(a, b);

        let mut contacts = Vec::new();
        world.step_with(SIM_DT, &mut contacts).unwrap();
        assert!(contacts.contains(&pair));

        teleport(&mut world, b, Vec2::new(2.0, 0.25));
        contacts.clear();
        world.step_with(SIM_DT, &mut contacts).unwrap();
        assert!(!world.is_touching(Collider::Body(a), Collider::Body(b)));
        assert!(!contacts.contains(&pair));

        let near_a = world.body(a).unwrap().position + Vec2::new(0.45, 0.0);
        teleport(&mut world, b, near_a);
        contacts.clear();
        world.step_with(SIM_DT, &mut contacts).unwrap();
        assert_eq!(contacts.iter().filter(|c| **c == pair).count(), 1);
    }

    #[test]
    fn test_contact_begin_fires_once_while_sustained() {
        let mut world = world();
        let a = world.create_ball(Vec2::new(-0.24, 0.25), 0.25).unwrap();
        let b = world.create_ball(Vec2::new(0.24, 0.25), 0.25).unwrap();

        let contacts = run(&mut world, 1.0);
        let pair = ContactEvent::between_bodies(b, a);
        assert_eq!(contacts.iter().filter(|c| **c == pair).count(), 1);
        assert!(world.is_touching(Collider::Body(a), Collider::Body(b)));
    }

    #[test]
    fn test_removal_purges_touching_pairs() {
        let mut world = world();
        let a = world.create_ball(Vec2::new(-0.24, 0.25), 0.25).unwrap();
        let b = world.create_ball(Vec2::new(0.24, 0.25), 0.25).unwrap();
        world.step(SIM_DT).unwrap();
        assert!(world.is_touching(Collider::Body(a), Collider::Body(b)));

        world.remove_body(b).unwrap();
        assert!(!world.is_touching(Collider::Body(a), Collider::Body(b)));
    }

    #[test]
    fn test_walls_contain_balls() {
        let mut world = world();
        let half = world.params().half_width;
        let h = world.create_ball(Vec2::new(half - 0.1, 3.0), 0.3).unwrap();
        run(&mut world, 2.0);
        let state = world.body(h).unwrap();
        assert!(state.position.x + state.radius <= half + 0.02);
    }

    #[test]
    fn test_stacked_balls_do_not_jitter() {
        let mut world = world();
        let handles: Vec<_> = (0..6)
            .map(|i| {
                let x = -1.5 + (i % 3) as f32 * 0.7;
                let y = 0.5 + (i / 3) as f32 * 0.8;
                world.create_ball(Vec2::new(x, y), 0.3).unwrap()
            })
            .collect();
        run(&mut world, 6.0);
        for h in handles {
            assert!(world.body(h).unwrap().speed() < 0.3);
        }
    }

    #[test]
    fn test_presentation_mapping() {
        let world = world();
        let p = world.params().clone();
        // Bottom-left corner of the container maps to (0, height_px)
        let corner = world.to_presentation(Vec2::new(-p.half_width, 0.0));
        assert!(corner.x.abs() < 1e-4);
        assert!((corner.y - p.height * p.pixels_per_unit).abs() < 1e-3);
        let x = world.presentation_x_to_world(p.half_width * p.pixels_per_unit);
        assert!(x.abs() < 1e-5);
    }

    #[test]
    fn test_determinism() {
        let mut w1 = world();
        let mut w2 = world();
        for w in [&mut w1, &mut w2] {
            for i in 0..5 {
                w.create_ball(Vec2::new(-1.0 + i as f32 * 0.45, 2.0 + i as f32), 0.3)
                    .unwrap();
            }
        }
        let c1 = run(&mut w1, 2.0);
        let c2 = run(&mut w2, 2.0);
        assert_eq!(c1, c2);
        for index in 0..5 {
            let h = w1.handle_at(index);
            assert_eq!(w1.body(h).unwrap(), w2.body(h).unwrap());
        }
    }
}
