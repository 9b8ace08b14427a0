//! The growth engine: seeds a plant and drives its cells through the event
//! queue.
//!
//! The typical driver loop is:
//! 1. [`Plant::begin_growth`]: create the seed anchor and the first stem.
//! 2. [`Plant::advance_to`]: run every event that has come due, each of
//!    which may grow a cell, spawn children or drop a leaf.
//! 3. [`Plant::stem_views`] / [`Plant::leaf_views`]: read the registries
//!    back for drawing.

use crate::arena::CellArena;
use crate::cell::{
    growth_direction, leaf_growth_interval, redirect_steep, reproduction_delay,
    sample_branch_offset, stem_growth_interval, Cell, CellKind, Leaf, LeafPhase,
    LeafTick, Stem, StemPhase, StemTick, ANCHOR_DRIFT_TOLERANCE, LEAF_REMOVE_DELAY, LEAF_START_COLOR,
    SEGMENT_LENGTH_THRESHOLD,
};
use crate::color::{Rgb, Rgba};
use crate::config::ConfigView;
use crate::physics::{Anchor, BodySpec, ConstraintSpec, PhysicsAdapter, Shape};
use crate::schedule::{EventQueue, GrowthEvent};
use crate::template::{passes_gate, GrowthTemplate};
use crate::types::{BodyHandle, CellId, ConstraintHandle, Millis};
use glam::Vec2;
use rand::Rng;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GrowthError {
    #[error("growth has already started")]
    AlreadyStarted,
    #[error("no live cell with id {0}")]
    UnknownCell(CellId),
    #[error("stem limit of {0} reached")]
    StemLimit(usize),
}

/// Seed anchor dimensions.
const SEED_SIZE: Vec2 = Vec2::new(40.0, 8.0);

const STEM_AIR_FRICTION: f32 = 0.5;
const LEAF_AIR_FRICTION: f32 = 0.1;
const PIN_STIFFNESS: f32 = 1.0;
const PIN_DAMPING: f32 = 0.3;
const ANCHOR_DAMPING: f32 = 0.2;
const LEAF_ANCHOR_STIFFNESS: f32 = 0.8;

/// Everything needed to construct a stem.
#[derive(Clone, Debug)]
pub struct StemSpawn {
    pub width: f32,
    pub parent: Option<CellId>,
    pub pin_body: Option<BodyHandle>,
    pub growth_angle: f32,
    pub branch_depth: u32,
    pub generation: u32,
    pub segment_length: u32,
}

/// Read-only drawing data for one stem.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StemView {
    pub id: CellId,
    pub position: Vec2,
    /// Where the stem hangs from: its parent stem or the seed anchor.
    pub parent_position: Option<Vec2>,
    pub color: Rgb,
    pub width: f32,
    pub phase: StemPhase,
}

/// Read-only drawing data for one leaf.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeafView {
    pub id: CellId,
    pub position: Vec2,
    pub color: Rgba,
    pub petal_size: Vec2,
    pub mature: bool,
    pub fallen: bool,
}

/// A single plant: its cells, registries and pending events.
#[derive(Debug)]
pub struct Plant {
    arena: CellArena,
    queue: EventQueue,
    template: Option<Rc<GrowthTemplate>>,
    seed_anchor: Option<BodyHandle>,
    origin: Vec2,
}

impl Plant {
    /// Creates an empty plant that will be seeded at `origin`.
    pub fn new(origin: Vec2) -> Self {
        Self {
            arena: CellArena::new(),
            queue: EventQueue::new(),
            template: None,
            seed_anchor: None,
            origin,
        }
    }

    pub fn arena(&self) -> &CellArena {
        &self.arena
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.arena.get(id)
    }

    pub fn template(&self) -> Option<&GrowthTemplate> {
        self.template.as_deref()
    }

    pub fn seed_anchor(&self) -> Option<BodyHandle> {
        self.seed_anchor
    }

    pub fn is_started(&self) -> bool {
        self.template.is_some()
    }

    pub fn now(&self) -> Millis {
        self.queue.now()
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// True once seeded and nothing is left to happen.
    pub fn is_dormant(&self) -> bool {
        self.is_started() && self.queue.is_empty()
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Seeds the plant with the template selected in `cfg`.
    pub fn begin_growth(
        &mut self,
        cfg: &impl ConfigView,
        physics: &mut impl PhysicsAdapter,
    ) -> Result<CellId, GrowthError> {
        self.begin_growth_with(cfg.plant_template().build(), cfg, physics)
    }

    /// Seeds the plant with an explicit template.
    ///
    /// Creates the static seed anchor and the first stem hanging from it.
    /// Only the first call per plant succeeds.
    pub fn begin_growth_with(
        &mut self,
        template: GrowthTemplate,
        cfg: &impl ConfigView,
        physics: &mut impl PhysicsAdapter,
    ) -> Result<CellId, GrowthError> {
        if self.is_started() {
            return Err(GrowthError::AlreadyStarted);
        }
        log::info!(
            "Beginning growth with template {:?} at {:?}",
            template.name,
            self.origin
        );
        let start_color = template.transition_colors.start;
        self.template = Some(Rc::new(template));

        let seed = physics.create_body(BodySpec {
            shape: Shape::Rectangle {
                width: SEED_SIZE.x,
                height: SEED_SIZE.y,
            },
            position: self.origin,
            fill: start_color,
            air_friction: 0.0,
            is_static: true,
        });
        self.seed_anchor = Some(seed);

        let spawn = StemSpawn {
            width: cfg.cell_size(),
            parent: None,
            pin_body: Some(seed),
            growth_angle: 0.0,
            branch_depth: 0,
            generation: 0,
            segment_length: 0,
        };
        self.spawn_stem(spawn, cfg, physics)
            .ok_or(GrowthError::StemLimit(cfg.max_stems()))
    }

    /// Runs every event due at or before `t`, then moves the clock to `t`.
    ///
    /// Returns the number of events handled.
    pub fn advance_to(
        &mut self,
        t: Millis,
        cfg: &impl ConfigView,
        physics: &mut impl PhysicsAdapter,
        rng: &mut impl Rng,
    ) -> usize {
        let mut handled = 0;
        while let Some(next) = self.queue.pop_due(t) {
            self.handle(next.event, cfg, physics, rng);
            handled += 1;
        }
        self.queue.set_now(t);
        handled
    }

    /// Advances the clock by `dt` milliseconds.
    pub fn advance_by(
        &mut self,
        dt: Millis,
        cfg: &impl ConfigView,
        physics: &mut impl PhysicsAdapter,
        rng: &mut impl Rng,
    ) -> usize {
        self.advance_to(self.now() + dt.max(0.0), cfg, physics, rng)
    }

    fn handle(
        &mut self,
        event: GrowthEvent,
        cfg: &impl ConfigView,
        physics: &mut impl PhysicsAdapter,
        rng: &mut impl Rng,
    ) {
        match event {
            GrowthEvent::GrowTick { cell, interval } => {
                self.on_grow_tick(cell, interval, cfg, physics)
            }
            GrowthEvent::Reproduce { cell } => self.on_reproduce(cell, cfg, physics, rng),
            GrowthEvent::LeafTick { cell, interval } => {
                self.on_leaf_tick(cell, interval, cfg, physics, rng)
            }
            GrowthEvent::RemoveLeaf { cell } => self.on_remove_leaf(cell, physics),
        }
    }

    /// Creates a stem, its body and supports, and schedules its growth ticks
    /// and single reproduction.
    ///
    /// Returns `None` when the stem registry is full.
    pub fn spawn_stem(
        &mut self,
        spawn: StemSpawn,
        cfg: &impl ConfigView,
        physics: &mut impl PhysicsAdapter,
    ) -> Option<CellId> {
        let template = Rc::clone(self.template.as_ref()?);
        if self.arena.stem_count() >= cfg.max_stems() {
            log::debug!("Stem limit {} reached, not spawning", cfg.max_stems());
            return None;
        }
        debug_assert!(spawn.branch_depth <= template.max_depth);

        let pin_pos = spawn
            .pin_body
            .and_then(|b| physics.position(b))
            .unwrap_or(self.origin);
        let position = pin_pos + growth_direction(spawn.growth_angle) * cfg.cell_spacing();

        let body = physics.create_body(BodySpec {
            shape: Shape::Circle {
                radius: spawn.width,
            },
            position,
            fill: template.transition_colors.start,
            air_friction: STEM_AIR_FRICTION,
            is_static: false,
        });

        let mut constraints = Vec::with_capacity(3);
        if let Some(pin) = spawn.pin_body {
            let visible = cfg.constrain_visibility();
            constraints.push(physics.create_constraint(ConstraintSpec {
                a: Anchor::body(pin),
                b: Anchor::body(body),
                stiffness: PIN_STIFFNESS,
                damping: PIN_DAMPING,
                visible,
            }));
            constraints.extend(stem_anchors(
                physics,
                body,
                position,
                spawn.width,
                template.stiffness_range.start,
                visible,
            ));
        }

        let id = self.arena.next_id();
        let cell = Cell {
            id,
            parent: spawn.parent,
            age: 0,
            generation: spawn.generation,
            branch_depth: spawn.branch_depth,
            growth_angle: spawn.growth_angle,
            template: Rc::clone(&template),
            body,
            constraints,
            kind: CellKind::Stem(Stem {
                width: spawn.width,
                segment_length: spawn.segment_length,
                phase: StemPhase::Growing,
                color: template.transition_colors.start,
                pin_body: spawn.pin_body,
                anchored_at: position,
            }),
        };
        self.arena.insert(cell);

        let tc = cfg.time_control();
        let interval = stem_growth_interval(spawn.branch_depth, tc);
        self.queue
            .schedule_in(interval, GrowthEvent::GrowTick { cell: id, interval });
        self.queue.schedule_in(
            reproduction_delay(spawn.generation, spawn.branch_depth, tc),
            GrowthEvent::Reproduce { cell: id },
        );

        log::debug!(
            "Spawned stem {} (parent {:?}, generation {}, depth {}, segment {})",
            id,
            spawn.parent,
            spawn.generation,
            spawn.branch_depth,
            spawn.segment_length
        );
        Some(id)
    }

    /// Creates a leaf hanging from stem `parent` and schedules its ticks.
    pub fn spawn_leaf(
        &mut self,
        parent: CellId,
        cfg: &impl ConfigView,
        physics: &mut impl PhysicsAdapter,
    ) -> Option<CellId> {
        let p = self.arena.get(parent).filter(|c| c.is_stem())?;
        let (parent_body, angle, generation, depth) =
            (p.body, p.growth_angle, p.generation, p.branch_depth);
        let template = Rc::clone(&p.template);

        let leaf = Leaf::default();
        let parent_pos = physics.position(parent_body).unwrap_or(self.origin);
        let position = parent_pos + growth_direction(angle) * cfg.cell_spacing();
        let start = LEAF_START_COLOR.rgb;
        let body = physics.create_body(BodySpec {
            shape: Shape::Circle {
                radius: leaf.radius,
            },
            position,
            fill: start,
            air_friction: LEAF_AIR_FRICTION,
            is_static: false,
        });

        let mut constraints = vec![physics.create_constraint(ConstraintSpec {
            a: Anchor::body(parent_body),
            b: Anchor::body(body),
            stiffness: PIN_STIFFNESS,
            damping: PIN_DAMPING,
            visible: false,
        })];
        constraints.extend(leaf_anchors(physics, body, position, leaf.radius));

        let id = self.arena.next_id();
        self.arena.insert(Cell {
            id,
            parent: Some(parent),
            age: 0,
            generation: generation + 1,
            branch_depth: depth,
            growth_angle: angle,
            template,
            body,
            constraints,
            kind: CellKind::Leaf(leaf),
        });

        let interval = leaf_growth_interval(generation, cfg.time_control());
        self.queue
            .schedule_in(interval, GrowthEvent::LeafTick { cell: id, interval });
        log::debug!("Spawned leaf {} on stem {}", id, parent);
        Some(id)
    }

    fn on_grow_tick(
        &mut self,
        id: CellId,
        interval: Millis,
        cfg: &impl ConfigView,
        physics: &mut impl PhysicsAdapter,
    ) {
        let Some(cell) = self.arena.get_mut(id) else {
            return;
        };
        let cap = cell.iteration_cap(cfg.max_iterations());
        let Cell {
            age,
            template,
            body,
            constraints,
            kind,
            ..
        } = cell;
        let CellKind::Stem(stem) = kind else {
            return;
        };
        if !stem.is_growing() {
            return;
        }

        match stem.tick(age, cap, cfg.grow_increment(), template) {
            StemTick::Grew { ratio } => {
                let stiffness = template.stiffness_range.at(ratio);
                log::trace!("Stem {} grew to age {} (ratio {:.3})", id, age, ratio);

                // Lateral anchors are fixed world points, so they are laid
                // again once the body has wandered away from them.
                if constraints.len() == 3
                    && let Some(pos) = physics.position(*body)
                    && pos.distance(stem.anchored_at) > ANCHOR_DRIFT_TOLERANCE
                {
                    for c in constraints.drain(1..) {
                        physics.remove_constraint(c);
                    }
                    let fresh = stem_anchors(
                        physics,
                        *body,
                        pos,
                        stem.width,
                        stiffness,
                        cfg.constrain_visibility(),
                    );
                    constraints.extend(fresh);
                    stem.anchored_at = pos;
                }
                for &c in constraints.iter() {
                    physics.set_constraint_stiffness(c, stiffness);
                }
                self.queue
                    .schedule_in(interval, GrowthEvent::GrowTick { cell: id, interval });
            }
            StemTick::Matured => self.finalize_stem(id, physics),
        }
    }

    /// Freezes a stem in place and releases all of its supports.
    pub fn finalize_stem(&mut self, id: CellId, physics: &mut impl PhysicsAdapter) {
        let Some(cell) = self.arena.get_mut(id) else {
            return;
        };
        let CellKind::Stem(stem) = &mut cell.kind else {
            return;
        };
        if stem.phase == StemPhase::Finalized {
            return;
        }
        stem.phase = StemPhase::Finalized;
        physics.set_static(cell.body);
        for c in cell.constraints.drain(..) {
            physics.remove_constraint(c);
        }
        log::debug!("Stem {} finalized at age {}", id, cell.age);
    }

    /// A stem's single reproduction: an optional side branch, then either a
    /// continuation stem or, at the end of a segment, a leaf.
    ///
    /// Runs even if the stem has already been finalized or its iteration
    /// budget is spent.
    fn on_reproduce(
        &mut self,
        id: CellId,
        cfg: &impl ConfigView,
        physics: &mut impl PhysicsAdapter,
        rng: &mut impl Rng,
    ) {
        let Some(cell) = self.arena.get(id) else {
            return;
        };
        let Some(stem) = cell.as_stem() else {
            return;
        };
        let segment_length = stem.segment_length;

        self.try_branch(id, cfg, physics, rng);

        if segment_length == SEGMENT_LENGTH_THRESHOLD {
            self.spawn_leaf(id, cfg, physics);
        } else {
            self.spawn_continuation(id, segment_length + 1, cfg, physics);
        }
    }

    /// What a mature leaf asks of its parent stem: an optional side branch
    /// and a continuation that opens a new segment.
    pub fn grow_new_segment(
        &mut self,
        id: CellId,
        cfg: &impl ConfigView,
        physics: &mut impl PhysicsAdapter,
        rng: &mut impl Rng,
    ) -> Result<(), GrowthError> {
        if !self.arena.get(id).is_some_and(Cell::is_stem) {
            return Err(GrowthError::UnknownCell(id));
        }
        self.try_branch(id, cfg, physics, rng);
        self.spawn_continuation(id, 0, cfg, physics);
        Ok(())
    }

    /// Spawns a side branch from `id` if the depth limit and the template's
    /// probability allow it.
    fn try_branch(
        &mut self,
        id: CellId,
        cfg: &impl ConfigView,
        physics: &mut impl PhysicsAdapter,
        rng: &mut impl Rng,
    ) -> Option<CellId> {
        let cell = self.arena.get(id)?;
        let (depth, generation, angle, body) =
            (cell.branch_depth, cell.generation, cell.growth_angle, cell.body);
        let template = &cell.template;

        if depth >= template.max_depth {
            return None;
        }
        let p = template.branch_probability(generation);
        if !passes_gate(rng.random::<f32>(), p) {
            return None;
        }

        let branch_angle = redirect_steep(angle + sample_branch_offset(rng));
        self.spawn_stem(
            StemSpawn {
                width: cfg.cell_size(),
                parent: Some(id),
                pin_body: Some(body),
                growth_angle: branch_angle,
                branch_depth: depth + 1,
                generation: generation + 1,
                segment_length: 0,
            },
            cfg,
            physics,
        )
    }

    fn spawn_continuation(
        &mut self,
        id: CellId,
        segment_length: u32,
        cfg: &impl ConfigView,
        physics: &mut impl PhysicsAdapter,
    ) -> Option<CellId> {
        let cell = self.arena.get(id)?;
        let spawn = StemSpawn {
            width: cfg.cell_size(),
            parent: Some(id),
            pin_body: Some(cell.body),
            growth_angle: cell.growth_angle,
            branch_depth: cell.branch_depth,
            generation: cell.generation + 1,
            segment_length,
        };
        self.spawn_stem(spawn, cfg, physics)
    }

    fn on_leaf_tick(
        &mut self,
        id: CellId,
        interval: Millis,
        cfg: &impl ConfigView,
        physics: &mut impl PhysicsAdapter,
        rng: &mut impl Rng,
    ) {
        let Some(cell) = self.arena.get_mut(id) else {
            return;
        };
        let parent = cell.parent;
        let CellKind::Leaf(leaf) = &mut cell.kind else {
            return;
        };
        match leaf.tick(&mut cell.age) {
            LeafTick::Aged => {}
            LeafTick::Flower => {
                if let Some(parent) = parent {
                    log::debug!("Leaf {} matured, stem {} grows a new segment", id, parent);
                    // The parent is a stem for as long as the leaf exists.
                    let _ = self.grow_new_segment(parent, cfg, physics, rng);
                }
            }
            LeafTick::Detach => {
                self.detach_leaf(id, physics);
                return;
            }
        }
        self.queue
            .schedule_in(interval, GrowthEvent::LeafTick { cell: id, interval });
    }

    /// Releases a leaf's supports and schedules its removal.
    ///
    /// Only the first call has any effect; it returns `true`.
    pub fn detach_leaf(&mut self, id: CellId, physics: &mut impl PhysicsAdapter) -> bool {
        let Some(cell) = self.arena.get_mut(id) else {
            return false;
        };
        let CellKind::Leaf(leaf) = &mut cell.kind else {
            return false;
        };
        if leaf.phase == LeafPhase::Detached {
            return false;
        }
        leaf.phase = LeafPhase::Detached;
        for c in cell.constraints.drain(..) {
            physics.remove_constraint(c);
        }
        self.queue
            .schedule_in(LEAF_REMOVE_DELAY, GrowthEvent::RemoveLeaf { cell: id });
        log::debug!("Leaf {} detached at age {}", id, cell.age);
        true
    }

    fn on_remove_leaf(&mut self, id: CellId, physics: &mut impl PhysicsAdapter) {
        if let Some(cell) = self.arena.remove_leaf(id) {
            physics.remove_body(cell.body);
            log::debug!("Leaf {} removed", id);
        }
    }

    /// Drawing data for every stem, in creation order.
    pub fn stem_views<'a>(
        &'a self,
        physics: &'a impl PhysicsAdapter,
    ) -> impl Iterator<Item = StemView> + 'a {
        self.arena.stems().filter_map(move |cell| {
            let stem = cell.as_stem()?;
            Some(StemView {
                id: cell.id,
                position: physics.position(cell.body)?,
                parent_position: stem.pin_body.and_then(|b| physics.position(b)),
                color: stem.color,
                width: stem.width,
                phase: stem.phase,
            })
        })
    }

    /// Drawing data for every live leaf, in creation order.
    pub fn leaf_views<'a>(
        &'a self,
        physics: &'a impl PhysicsAdapter,
    ) -> impl Iterator<Item = LeafView> + 'a {
        self.arena.leaves().filter_map(move |cell| {
            let leaf = cell.as_leaf()?;
            Some(LeafView {
                id: cell.id,
                position: physics.position(cell.body)?,
                color: leaf.color(cell.age),
                petal_size: leaf.petal_size(cell.age),
                mature: leaf.is_mature(cell.age),
                fallen: leaf.phase == LeafPhase::Detached,
            })
        })
    }
}

/// Lateral props: two fixed world points below and to either side of the
/// body, attached at the body's left and right edges.
fn stem_anchors(
    physics: &mut impl PhysicsAdapter,
    body: BodyHandle,
    pos: Vec2,
    width: f32,
    stiffness: f32,
    visible: bool,
) -> [ConstraintHandle; 2] {
    let spread = 20.0 + width * 5.0;
    [(-1.0, Vec2::new(pos.x - spread, pos.y + 40.0)), (1.0, Vec2::new(pos.x + spread, pos.y + 40.0))]
        .map(|(side, point)| {
            physics.create_constraint(ConstraintSpec {
                a: Anchor::World(point),
                b: Anchor::Body {
                    body,
                    offset: Vec2::new(side * width, 0.0),
                },
                stiffness,
                damping: ANCHOR_DAMPING,
                visible,
            })
        })
}

fn leaf_anchors(
    physics: &mut impl PhysicsAdapter,
    body: BodyHandle,
    pos: Vec2,
    radius: f32,
) -> [ConstraintHandle; 2] {
    let spread = 20.0 + radius * 5.0;
    [(-1.0, Vec2::new(pos.x - spread, pos.y + 4.0)), (1.0, Vec2::new(pos.x + spread, pos.y + 4.0))]
        .map(|(side, point)| {
            physics.create_constraint(ConstraintSpec {
                a: Anchor::World(point),
                b: Anchor::Body {
                    body,
                    offset: Vec2::new(side * radius * 3.0, 0.0),
                },
                stiffness: LEAF_ANCHOR_STIFFNESS,
                damping: ANCHOR_DAMPING,
                visible: false,
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorRange;
    use crate::config::Config;
    use crate::physics::SpringWorld;
    use crate::template::{BranchCurve, StiffnessRange};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap;

    fn template(max_depth: u32, p: f32) -> GrowthTemplate {
        GrowthTemplate {
            name: "test".to_owned(),
            max_depth,
            branch_probability: BranchCurve::Constant(p),
            transition_colors: ColorRange {
                start: Rgb::new(102, 186, 91),
                end: Rgb::new(76, 79, 70),
            },
            stiffness_range: StiffnessRange {
                start: 0.2,
                end: 0.8,
            },
        }
    }

    struct Rig {
        plant: Plant,
        world: SpringWorld,
        cfg: Config,
        rng: StdRng,
    }

    impl Rig {
        fn new(template: GrowthTemplate) -> Self {
            Self::with_config(template, Config::default())
        }

        fn with_config(template: GrowthTemplate, cfg: Config) -> Self {
            let mut rig = Self {
                plant: Plant::new(Vec2::ZERO),
                world: SpringWorld::default(),
                cfg,
                rng: StdRng::seed_from_u64(42),
            };
            rig.plant
                .begin_growth_with(template, &rig.cfg, &mut rig.world)
                .unwrap();
            rig
        }

        fn advance_to(&mut self, t: Millis) {
            self.plant
                .advance_to(t, &self.cfg, &mut self.world, &mut self.rng);
        }

        fn stem(&self, id: CellId) -> (&Cell, &Stem) {
            let cell = self.plant.cell(id).unwrap();
            (cell, cell.as_stem().unwrap())
        }

        fn children(&self, id: CellId) -> Vec<&Cell> {
            self.plant.arena().children_of(id).collect()
        }
    }

    fn attrs(cell: &Cell) -> (u32, u32, u32) {
        let seg = cell.as_stem().map_or(u32::MAX, |s| s.segment_length);
        (cell.generation, cell.branch_depth, seg)
    }

    #[test]
    fn begin_growth_only_once() {
        let mut rig = Rig::new(template(4, 0.0));
        assert_eq!(rig.plant.arena().stem_count(), 1);
        assert!(rig.plant.seed_anchor().is_some());

        let again = rig.plant.begin_growth(&rig.cfg, &mut rig.world);
        assert_eq!(again, Err(GrowthError::AlreadyStarted));
        assert_eq!(rig.plant.arena().stem_count(), 1);
    }

    #[test]
    fn seed_stem_hangs_above_the_anchor() {
        let rig = Rig::new(template(4, 0.0));
        let (cell, stem) = rig.stem(0);
        assert_eq!(attrs(cell), (0, 0, 0));
        assert_eq!(cell.parent, None);
        assert_eq!(cell.constraints.len(), 3);
        assert_eq!(stem.width, rig.cfg.cell_size);
        assert_eq!(rig.world.position(cell.body), Some(Vec2::new(0.0, -10.0)));
    }

    #[test]
    fn two_reproduction_rounds_follow_the_branching_rules() {
        let mut rig = Rig::new(template(1, 1.0));

        // Seed reproduces at 250 ms; its two children at 510 and 511 ms.
        rig.advance_to(520.0);

        let seed_children = rig.children(0);
        let mut got: Vec<_> = seed_children.iter().map(|c| attrs(c)).collect();
        got.sort();
        assert_eq!(got, vec![(1, 0, 1), (1, 1, 0)]);

        let b = seed_children.iter().find(|c| c.branch_depth == 1).unwrap().id;
        let c = seed_children.iter().find(|c| c.branch_depth == 0).unwrap().id;

        let b_children: Vec<_> = rig.children(b).iter().map(|c| attrs(c)).collect();
        assert_eq!(b_children, vec![(2, 1, 1)]);

        let mut c_children: Vec<_> = rig.children(c).iter().map(|c| attrs(c)).collect();
        c_children.sort();
        assert_eq!(c_children, vec![(2, 0, 2), (2, 1, 0)]);

        assert_eq!(rig.plant.arena().stem_count(), 6);
        assert_eq!(rig.plant.arena().leaf_count(), 0);
    }

    #[test]
    fn segment_threshold_yields_exactly_one_leaf_and_no_continuation() {
        let mut rig = Rig::new(template(1, 1.0));
        rig.advance_to(520.0);
        let f = rig
            .plant
            .arena()
            .stems()
            .find(|c| attrs(c) == (2, 0, SEGMENT_LENGTH_THRESHOLD))
            .unwrap()
            .id;

        // F reproduces at 780 ms.
        rig.advance_to(790.0);

        let children = rig.children(f);
        let leaves: Vec<_> = children.iter().filter(|c| !c.is_stem()).collect();
        let stems: Vec<_> = children.iter().filter(|c| c.is_stem()).collect();
        assert_eq!(leaves.len(), 1);
        // Only the side branch, never a same-depth continuation.
        assert_eq!(stems.len(), 1);
        assert_eq!(stems[0].branch_depth, 1);
        assert_eq!(rig.plant.arena().leaf_count(), 1);
    }

    #[test]
    fn width_grows_monotonically_then_freezes() {
        let mut cfg = Config::default();
        cfg.max_iterations = 3.0;
        let mut rig = Rig::with_config(template(0, 0.0), cfg);
        let body = rig.stem(0).0.body;

        let mut widths = Vec::new();
        for k in 1..=6 {
            rig.advance_to(5000.0 * k as f64 + 1.0);
            widths.push(rig.stem(0).1.width);
        }

        assert!(widths.windows(2).all(|w| w[1] >= w[0]), "{widths:?}");
        assert_eq!(widths[0], 1.5);
        assert_eq!(widths[2], 2.5);
        // Fourth tick finds the cap reached and finalizes.
        assert_eq!(widths[3], widths[2]);
        assert_eq!(widths[5], widths[2]);

        let (cell, stem) = rig.stem(0);
        assert_eq!(stem.phase, StemPhase::Finalized);
        assert_eq!(cell.age, 3);
        assert!(cell.constraints.is_empty());
        assert!(rig.world.body(body).unwrap().is_static);
        assert_eq!(stem.color, cell.template.transition_colors.end);
    }

    #[test]
    fn growth_tick_applies_interpolated_stiffness() {
        let mut cfg = Config::default();
        cfg.max_iterations = 4.0;
        let mut rig = Rig::with_config(template(0, 0.0), cfg);

        rig.advance_to(10_001.0);

        let (cell, _) = rig.stem(0);
        assert_eq!(cell.age, 2);
        for &c in &cell.constraints {
            let s = rig.world.constraint(c).unwrap().spec.stiffness;
            assert!((s - 0.5).abs() < 1e-6, "stiffness {s}");
        }
    }

    #[test]
    fn reproduction_still_fires_after_finalize() {
        let mut rig = Rig::new(template(0, 0.0));
        rig.plant.finalize_stem(0, &mut rig.world);
        assert_eq!(rig.stem(0).1.phase, StemPhase::Finalized);

        rig.advance_to(260.0);

        assert_eq!(rig.children(0).len(), 1);
        assert_eq!(rig.plant.arena().stem_count(), 2);
    }

    #[test]
    fn scheduled_delays_ignore_later_config_changes() {
        let mut rig = Rig::new(template(0, 0.0));
        // Slowing time after the seed is scheduled does not move its
        // reproduction from 250 ms.
        rig.cfg.time_control = 1.0;
        rig.advance_to(251.0);
        assert_eq!(rig.plant.arena().stem_count(), 2);

        // The new stem was scheduled under the slower clock.
        rig.advance_to(251.0 + 2600.0 - 2.0);
        assert_eq!(rig.plant.arena().stem_count(), 2);
        rig.advance_to(251.0 + 2600.0);
        assert_eq!(rig.plant.arena().stem_count(), 3);
    }

    fn grow_first_leaf(rig: &mut Rig) -> CellId {
        // seg 0 -> 1 -> 2 -> leaf at 780 ms.
        rig.advance_to(800.0);
        rig.plant.arena().leaf_ids()[0]
    }

    #[test]
    fn detach_releases_constraints_once() {
        let mut rig = Rig::new(template(0, 0.0));
        let leaf = grow_first_leaf(&mut rig);
        assert_eq!(rig.plant.cell(leaf).unwrap().constraints.len(), 3);

        let before = rig.world.constraint_count();
        assert!(rig.plant.detach_leaf(leaf, &mut rig.world));
        assert_eq!(rig.world.constraint_count(), before - 3);

        assert!(!rig.plant.detach_leaf(leaf, &mut rig.world));
        assert_eq!(rig.world.constraint_count(), before - 3);

        let removals = rig
            .plant
            .queue()
            .iter()
            .filter(|s| matches!(s.event, GrowthEvent::RemoveLeaf { .. }))
            .count();
        assert_eq!(removals, 1);

        let body = rig.plant.cell(leaf).unwrap().body;
        rig.advance_to(800.0 + LEAF_REMOVE_DELAY + 1.0);
        assert!(rig.plant.cell(leaf).is_none());
        assert_eq!(rig.plant.arena().leaf_count(), 0);
        assert!(rig.world.body(body).is_none());
    }

    #[test]
    fn leaf_side_anchors_mirror_each_other() {
        let mut rig = Rig::new(template(0, 0.0));
        let leaf = grow_first_leaf(&mut rig);
        let cell = rig.plant.cell(leaf).unwrap();
        let r = cell.as_leaf().unwrap().radius;

        let offsets: Vec<Vec2> = cell.constraints[1..]
            .iter()
            .map(|&c| match rig.world.constraint(c).unwrap().spec.b {
                Anchor::Body { offset, .. } => offset,
                Anchor::World(_) => panic!("leaf end must be on the body"),
            })
            .collect();
        assert_eq!(offsets, vec![Vec2::new(-3.0 * r, 0.0), Vec2::new(3.0 * r, 0.0)]);
    }

    #[test]
    fn mature_leaf_makes_parent_grow_one_new_segment() {
        let mut rig = Rig::new(template(0, 0.0));
        let leaf = grow_first_leaf(&mut rig);
        let parent = rig.plant.cell(leaf).unwrap().parent.unwrap();
        assert!(rig.children(parent).iter().all(|c| !c.is_stem()));

        // Leaf ticks every 420 ms; the 17th tick sees age 16.
        rig.advance_to(780.0 + 420.0 * 17.0 + 1.0);
        let grown: Vec<_> = rig
            .children(parent)
            .iter()
            .filter(|c| c.is_stem())
            .map(|c| attrs(c))
            .collect();
        assert_eq!(grown, vec![(3, 0, 0)]);

        // Ageing on to detachment does not flower again.
        rig.advance_to(780.0 + 420.0 * 82.0);
        let leaf_cell = rig.plant.cell(leaf).unwrap();
        assert_eq!(leaf_cell.as_leaf().unwrap().phase, LeafPhase::Detached);
        assert_eq!(
            rig.children(parent).iter().filter(|c| c.is_stem()).count(),
            1
        );
    }

    #[test]
    fn long_run_respects_depth_and_lineage_rules() {
        let mut cfg = Config::default();
        cfg.max_stems = 400;
        let mut rig = Rig::with_config(template(3, 0.9), cfg);

        let mut widths: HashMap<CellId, f32> = HashMap::new();
        for k in 1..=60 {
            rig.advance_to(1000.0 * k as f64);
            for cell in rig.plant.arena().stems() {
                let w = cell.as_stem().unwrap().width;
                if let Some(prev) = widths.insert(cell.id, w) {
                    assert!(w >= prev);
                }
            }
        }

        let arena = rig.plant.arena();
        assert!(arena.stem_count() <= 400);
        assert!(arena.stem_count() > 10);
        for cell in arena.stems() {
            assert!(cell.branch_depth <= 3);
            let Some(parent) = cell.parent.and_then(|p| arena.get(p)) else {
                continue;
            };
            let seg = cell.as_stem().unwrap().segment_length;
            let parent_seg = parent.as_stem().unwrap().segment_length;
            if cell.branch_depth == parent.branch_depth + 1 {
                assert_eq!(seg, 0, "branches restart their segment");
            } else {
                assert_eq!(cell.branch_depth, parent.branch_depth);
                // Continuation, or a new segment opened by a mature leaf.
                assert!(seg == parent_seg + 1 || seg == 0);
            }
            assert!(seg <= SEGMENT_LENGTH_THRESHOLD);
            assert_eq!(cell.generation, parent.generation + 1);
        }
    }

    #[test]
    fn stem_limit_stops_spawning() {
        let mut cfg = Config::default();
        cfg.max_stems = 3;
        let mut rig = Rig::with_config(template(4, 1.0), cfg);
        rig.advance_to(5_000.0);
        assert_eq!(rig.plant.arena().stem_count(), 3);
    }

    #[test]
    fn spent_iteration_budget_still_continues() {
        let mut cfg = Config::default();
        cfg.max_iterations = 0.5;
        let mut rig = Rig::with_config(template(0, 0.0), cfg);

        // Seed at 250 ms, then its generation-1 child (cap -0.1) at 510 ms.
        rig.advance_to(600.0);

        let child = rig.children(0)[0].id;
        assert!(rig.plant.cell(child).unwrap().iteration_cap(0.5) <= 0.0);
        let grandchildren: Vec<_> = rig.children(child).iter().map(|c| attrs(c)).collect();
        assert_eq!(grandchildren, vec![(2, 0, 2)]);
        assert_eq!(rig.plant.arena().stem_count(), 3);
    }

    #[test]
    fn drifting_stem_lays_fresh_side_anchors() {
        let mut rig = Rig::new(template(0, 0.0));
        rig.world.gravity = Vec2::new(20_000.0, 0.0);
        let (cell, stem) = rig.stem(0);
        let body = cell.body;
        let before = cell.constraints.clone();
        let laid_at = stem.anchored_at;

        for _ in 0..300 {
            rig.world.step();
        }
        let moved_to = rig.world.position(body).unwrap();
        assert!(moved_to.distance(laid_at) > ANCHOR_DRIFT_TOLERANCE);

        // First growth tick at 5000 ms.
        rig.advance_to(5_001.0);

        let (cell, stem) = rig.stem(0);
        let after = &cell.constraints;
        assert_eq!(after.len(), 3);
        assert_eq!(after[0], before[0]);
        for old in &before[1..] {
            assert!(!after.contains(old));
            assert!(rig.world.constraint(*old).is_none());
        }
        for new in &after[1..] {
            assert!(rig.world.constraint(*new).is_some());
        }
        assert_eq!(stem.anchored_at, moved_to);
    }

    #[test]
    fn plant_goes_dormant_once_the_queue_drains() {
        assert!(!Plant::new(Vec2::ZERO).is_dormant());

        let mut cfg = Config::default();
        cfg.max_stems = 3;
        let mut rig = Rig::with_config(template(0, 0.0), cfg);
        assert_eq!(rig.plant.template().map(|t| t.name.as_str()), Some("test"));

        // Leaf falls and is removed; every stem reaches its cap and freezes.
        rig.advance_to(100_000.0);
        assert!(!rig.plant.is_dormant());
        rig.advance_to(500_000.0);

        assert!(rig.plant.is_dormant());
        assert_eq!(rig.plant.arena().leaf_count(), 0);
        assert!(
            rig.plant
                .arena()
                .stems()
                .all(|c| c.as_stem().unwrap().phase == StemPhase::Finalized)
        );
    }

    #[test]
    fn views_expose_registry_contents() {
        let mut rig = Rig::new(template(0, 0.0));
        grow_first_leaf(&mut rig);

        let stems: Vec<_> = rig.plant.stem_views(&rig.world).collect();
        assert_eq!(stems.len(), 3);
        assert_eq!(stems[0].parent_position, Some(Vec2::ZERO));
        assert_eq!(stems[1].parent_position, Some(stems[0].position));
        assert!(stems.iter().all(|s| s.phase == StemPhase::Growing));

        let leaves: Vec<_> = rig.plant.leaf_views(&rig.world).collect();
        assert_eq!(leaves.len(), 1);
        assert!(!leaves[0].mature);
        assert!(!leaves[0].fallen);
        assert_eq!(leaves[0].color, LEAF_START_COLOR);
    }

    #[test]
    fn grow_new_segment_rejects_unknown_cells() {
        let mut rig = Rig::new(template(0, 0.0));
        let err = rig
            .plant
            .grow_new_segment(99, &rig.cfg, &mut rig.world, &mut rig.rng);
        assert_eq!(err, Err(GrowthError::UnknownCell(99)));
    }
}
