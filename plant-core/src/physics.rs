//! Physics boundary used by the growth engine, plus a small reference world.
//!
//! The engine only asks for bodies and constraints to be created, removed,
//! stiffened or frozen, and reads body positions back. [`SpringWorld`] is a
//! minimal position-based implementation: Verlet integration with gravity and
//! air friction, and distance constraints relaxed a few times per step.

use crate::color::Rgb;
use crate::types::{BodyHandle, ConstraintHandle};
use glam::Vec2;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Circle { radius: f32 },
    Rectangle { width: f32, height: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodySpec {
    pub shape: Shape,
    pub position: Vec2,
    pub fill: Rgb,
    /// Fraction of velocity lost per step.
    pub air_friction: f32,
    pub is_static: bool,
}

/// One end of a constraint: a point on a body (offset from its centre) or a
/// fixed world point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Anchor {
    Body { body: BodyHandle, offset: Vec2 },
    World(Vec2),
}

impl Anchor {
    pub fn body(body: BodyHandle) -> Self {
        Anchor::Body {
            body,
            offset: Vec2::ZERO,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstraintSpec {
    pub a: Anchor,
    pub b: Anchor,
    pub stiffness: f32,
    pub damping: f32,
    pub visible: bool,
}

/// Operations the growth engine needs from a physics engine.
///
/// Operations on unknown handles are ignored; positions of unknown bodies
/// read as `None`.
pub trait PhysicsAdapter {
    fn create_body(&mut self, spec: BodySpec) -> BodyHandle;
    fn create_constraint(&mut self, spec: ConstraintSpec) -> ConstraintHandle;
    fn remove_constraint(&mut self, handle: ConstraintHandle);
    fn set_constraint_stiffness(&mut self, handle: ConstraintHandle, stiffness: f32);
    /// Makes a body immovable for the rest of its life.
    fn set_static(&mut self, handle: BodyHandle);
    fn remove_body(&mut self, handle: BodyHandle);
    fn position(&self, handle: BodyHandle) -> Option<Vec2>;
}

#[derive(Clone, Debug)]
pub struct Body {
    pub shape: Shape,
    pub pos: Vec2,
    prev_pos: Vec2,
    pub fill: Rgb,
    pub air_friction: f32,
    pub is_static: bool,
}

#[derive(Clone, Debug)]
pub struct Constraint {
    pub spec: ConstraintSpec,
    /// Rest length captured when the constraint was created.
    pub length: f32,
}

/// A tiny 2-D world with y pointing down.
#[derive(Debug)]
pub struct SpringWorld {
    bodies: BTreeMap<BodyHandle, Body>,
    constraints: BTreeMap<ConstraintHandle, Constraint>,
    next_body: u32,
    next_constraint: u32,
    /// Acceleration in units per second squared.
    pub gravity: Vec2,
    /// Constraint relaxation passes per step.
    pub iterations: usize,
}

/// Fixed integration step in seconds.
pub const STEP_SECONDS: f32 = 1.0 / 60.0;

impl Default for SpringWorld {
    fn default() -> Self {
        Self::new(Vec2::new(0.0, 60.0))
    }
}

impl SpringWorld {
    pub fn new(gravity: Vec2) -> Self {
        Self {
            bodies: BTreeMap::new(),
            constraints: BTreeMap::new(),
            next_body: 0,
            next_constraint: 0,
            gravity,
            iterations: 4,
        }
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(&handle)
    }

    pub fn constraint(&self, handle: ConstraintHandle) -> Option<&Constraint> {
        self.constraints.get(&handle)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &Body)> {
        self.bodies.iter().map(|(h, b)| (*h, b))
    }

    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintHandle, &Constraint)> {
        self.constraints.iter().map(|(h, c)| (*h, c))
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// World-space position of a constraint end, if its body still exists.
    pub fn anchor_point(&self, anchor: &Anchor) -> Option<Vec2> {
        match *anchor {
            Anchor::World(p) => Some(p),
            Anchor::Body { body, offset } => self.bodies.get(&body).map(|b| b.pos + offset),
        }
    }

    /// Advances the world by one fixed step of [`STEP_SECONDS`].
    pub fn step(&mut self) {
        let dt2 = STEP_SECONDS * STEP_SECONDS;
        for body in self.bodies.values_mut().filter(|b| !b.is_static) {
            let velocity = (body.pos - body.prev_pos) * (1.0 - body.air_friction);
            body.prev_pos = body.pos;
            body.pos += velocity + self.gravity * dt2;
        }

        for _ in 0..self.iterations {
            self.relax_constraints();
        }
    }

    /// Runs as many fixed steps as fit in `seconds`, returning the leftover.
    pub fn advance(&mut self, seconds: f32) -> f32 {
        let mut remaining = seconds;
        while remaining >= STEP_SECONDS {
            self.step();
            remaining -= STEP_SECONDS;
        }
        remaining
    }

    fn relax_constraints(&mut self) {
        // Constraints and bodies live in separate maps, so corrections are
        // collected first and applied afterwards.
        let mut corrections: Vec<(BodyHandle, Vec2, f32)> = Vec::new();

        for c in self.constraints.values() {
            let (Some(pa), Some(pb)) = (self.anchor_point(&c.spec.a), self.anchor_point(&c.spec.b))
            else {
                continue;
            };
            let delta = pb - pa;
            let dist = delta.length();
            if dist <= f32::EPSILON {
                continue;
            }
            let diff = (dist - c.length) / dist;
            let push = delta * diff * c.spec.stiffness;

            let movable = |anchor: &Anchor| match anchor {
                Anchor::Body { body, .. } => self
                    .bodies
                    .get(body)
                    .filter(|b| !b.is_static)
                    .map(|_| *body),
                Anchor::World(_) => None,
            };
            match (movable(&c.spec.a), movable(&c.spec.b)) {
                (Some(a), Some(b)) => {
                    corrections.push((a, push * 0.5, c.spec.damping));
                    corrections.push((b, -push * 0.5, c.spec.damping));
                }
                (Some(a), None) => corrections.push((a, push, c.spec.damping)),
                (None, Some(b)) => corrections.push((b, -push, c.spec.damping)),
                (None, None) => {}
            }
        }

        for (handle, correction, damping) in corrections {
            if let Some(body) = self.bodies.get_mut(&handle) {
                body.pos += correction;
                // Damping bleeds off part of the velocity the correction adds.
                body.prev_pos += correction * damping;
            }
        }
    }
}

impl PhysicsAdapter for SpringWorld {
    fn create_body(&mut self, spec: BodySpec) -> BodyHandle {
        let handle = BodyHandle(self.next_body);
        self.next_body += 1;
        self.bodies.insert(
            handle,
            Body {
                shape: spec.shape,
                pos: spec.position,
                prev_pos: spec.position,
                fill: spec.fill,
                air_friction: spec.air_friction.clamp(0.0, 1.0),
                is_static: spec.is_static,
            },
        );
        handle
    }

    fn create_constraint(&mut self, spec: ConstraintSpec) -> ConstraintHandle {
        let handle = ConstraintHandle(self.next_constraint);
        self.next_constraint += 1;
        let length = match (self.anchor_point(&spec.a), self.anchor_point(&spec.b)) {
            (Some(a), Some(b)) => a.distance(b),
            _ => 0.0,
        };
        self.constraints.insert(handle, Constraint { spec, length });
        handle
    }

    fn remove_constraint(&mut self, handle: ConstraintHandle) {
        self.constraints.remove(&handle);
    }

    fn set_constraint_stiffness(&mut self, handle: ConstraintHandle, stiffness: f32) {
        if let Some(c) = self.constraints.get_mut(&handle) {
            c.spec.stiffness = stiffness;
        }
    }

    fn set_static(&mut self, handle: BodyHandle) {
        if let Some(b) = self.bodies.get_mut(&handle) {
            b.is_static = true;
            b.prev_pos = b.pos;
        }
    }

    fn remove_body(&mut self, handle: BodyHandle) {
        self.bodies.remove(&handle);
    }

    fn position(&self, handle: BodyHandle) -> Option<Vec2> {
        self.bodies.get(&handle).map(|b| b.pos)
    }
}
