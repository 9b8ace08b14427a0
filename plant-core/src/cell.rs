//! Growth cells (stems and leaves) and the formulas that time their lives.
//!
//! A [`Cell`] carries the fields every cell shares; [`CellKind`] holds the
//! per-variant state. Variant ticks are pure state transitions that report
//! what happened, and [`crate::plant::Plant`] turns the reports into physics
//! calls and new events.

use crate::color::{clamp_unit, Rgb, Rgba};
use crate::template::GrowthTemplate;
use crate::types::{BodyHandle, CellId, ConstraintHandle, Millis};
use glam::Vec2;
use rand::Rng;
use std::f32::consts::{FRAC_PI_3, FRAC_PI_4, FRAC_PI_6, PI};
use std::rc::Rc;

/// Continuations along one stem lineage before it ends in a leaf.
pub const SEGMENT_LENGTH_THRESHOLD: u32 = 2;

pub const MIN_BRANCH_ANGLE: f32 = FRAC_PI_6;
pub const MAX_BRANCH_ANGLE: f32 = FRAC_PI_3;
/// Branches pointing further down than this are redirected to ±45°.
pub const MAX_DOWNWARD_ANGLE: f32 = PI - 0.5;

pub const STEM_BASE_INTERVAL: Millis = 5000.0;
pub const STEM_DEPTH_INTERVAL: Millis = 50.0;
pub const REPRODUCTION_BASE_DELAY: Millis = 2500.0;
pub const REPRODUCTION_GENERATION_DELAY: Millis = 100.0;
pub const REPRODUCTION_DEPTH_GENERATION_DELAY: Millis = 10.0;

/// Iteration budget lost per generation.
pub const GENERATION_ITERATION_COST: f32 = 0.6;
/// Iteration budget lost per branch level.
pub const DEPTH_ITERATION_COST: f32 = 5.0;

/// Distance a stem may drift before its lateral anchors are laid again.
pub const ANCHOR_DRIFT_TOLERANCE: f32 = 4.0;

pub const LEAF_MAX_AGE: u32 = 80;
pub const LEAF_MATURE_AGE: u32 = LEAF_MAX_AGE / 5;
pub const LEAF_RADIUS: f32 = 2.0;
pub const LEAF_BASE_INTERVAL: Millis = 4000.0;
pub const LEAF_GENERATION_INTERVAL: Millis = 100.0;
pub const LEAF_GENERATION_INTERVAL_CAP: Millis = 3000.0;
/// Time a fallen leaf stays in the world, not scaled by time control.
pub const LEAF_REMOVE_DELAY: Millis = 20_000.0;
pub const LEAF_START_COLOR: Rgba = Rgba {
    rgb: Rgb::new(102, 186, 91),
    a: 0.8,
};
pub const LEAF_END_COLOR: Rgba = Rgba {
    rgb: Rgb::new(181, 91, 29),
    a: 0.9,
};

/// Growth ticks a cell may take before it matures.
///
/// Later generations and deeper branches mature sooner. The result may be
/// zero or negative, in which case the cell matures on its first tick.
pub fn iteration_cap(max_iterations: f32, generation: u32, branch_depth: u32) -> f32 {
    max_iterations
        - generation as f32 * GENERATION_ITERATION_COST
        - branch_depth as f32 * DEPTH_ITERATION_COST
}

/// Progress through the growth transition, always within `[0, 1]`.
///
/// A non-positive cap means the cell has nothing left to grow, so it reads
/// as fully transitioned.
pub fn transition_ratio(age: u32, cap: f32) -> f32 {
    if cap <= 0.0 {
        return 1.0;
    }
    clamp_unit(age as f32 / cap)
}

/// Period of a stem's growth tick.
pub fn stem_growth_interval(branch_depth: u32, time_control: f32) -> Millis {
    STEM_BASE_INTERVAL + branch_depth as Millis * STEM_DEPTH_INTERVAL / time_control as Millis
}

/// Delay between a stem's creation and its single reproduction.
pub fn reproduction_delay(generation: u32, branch_depth: u32, time_control: f32) -> Millis {
    let (g, d) = (generation as Millis, branch_depth as Millis);
    (REPRODUCTION_BASE_DELAY
        + g * REPRODUCTION_GENERATION_DELAY
        + d * g * REPRODUCTION_DEPTH_GENERATION_DELAY)
        / time_control as Millis
}

/// Period of a leaf's growth tick; slower on later generations, up to a cap.
pub fn leaf_growth_interval(parent_generation: u32, time_control: f32) -> Millis {
    let slowdown =
        (parent_generation as Millis * LEAF_GENERATION_INTERVAL).min(LEAF_GENERATION_INTERVAL_CAP);
    (LEAF_BASE_INTERVAL + slowdown) / time_control as Millis
}

/// Unit direction for a growth angle measured from vertical; up is `-y`.
pub fn growth_direction(angle: f32) -> Vec2 {
    Vec2::new(angle.sin(), -angle.cos())
}

/// Random branch offset in `±[MIN_BRANCH_ANGLE, MAX_BRANCH_ANGLE]`.
pub fn sample_branch_offset(rng: &mut impl Rng) -> f32 {
    let offset = rng.random_range(MIN_BRANCH_ANGLE..=MAX_BRANCH_ANGLE);
    if rng.random_bool(0.5) { -offset } else { offset }
}

/// Keeps branches from growing steeply downward.
pub fn redirect_steep(angle: f32) -> f32 {
    if angle > MAX_DOWNWARD_ANGLE {
        FRAC_PI_4
    } else if angle < -MAX_DOWNWARD_ANGLE {
        -FRAC_PI_4
    } else {
        angle
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StemPhase {
    Growing,
    /// Reached its iteration cap; finalization follows in the same tick.
    Mature,
    /// Frozen static with its supports released.
    Finalized,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeafPhase {
    Growing,
    Detached,
}

#[derive(Clone, Debug)]
pub struct Stem {
    pub width: f32,
    pub segment_length: u32,
    pub phase: StemPhase,
    pub color: Rgb,
    /// Body the main pin attaches to: the parent stem or the seed anchor.
    pub pin_body: Option<BodyHandle>,
    /// Body position when the lateral anchors were last laid.
    pub anchored_at: Vec2,
}

/// Result of one stem growth tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StemTick {
    Grew { ratio: f32 },
    Matured,
}

impl Stem {
    /// Advances one tick. Ages and widens the stem while it is below `cap`,
    /// otherwise marks it mature.
    pub fn tick(
        &mut self,
        age: &mut u32,
        cap: f32,
        grow_increment: f32,
        template: &GrowthTemplate,
    ) -> StemTick {
        if self.phase != StemPhase::Growing {
            return StemTick::Matured;
        }
        if *age as f32 >= cap {
            self.phase = StemPhase::Mature;
            return StemTick::Matured;
        }
        *age += 1;
        self.width += grow_increment;
        let ratio = transition_ratio(*age, cap);
        self.color = template.transition_colors.at(ratio);
        StemTick::Grew { ratio }
    }

    pub fn is_growing(&self) -> bool {
        self.phase == StemPhase::Growing
    }
}

#[derive(Clone, Debug)]
pub struct Leaf {
    pub phase: LeafPhase,
    /// Set once the leaf has made its parent grow a new segment.
    pub flowered: bool,
    pub max_age: u32,
    pub mature_age: u32,
    pub radius: f32,
}

/// Result of one leaf growth tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeafTick {
    Aged,
    /// Reached maturity: the parent stem grows a new segment.
    Flower,
    /// Reached `max_age`: supports must be released.
    Detach,
}

impl Default for Leaf {
    fn default() -> Self {
        Self {
            phase: LeafPhase::Growing,
            flowered: false,
            max_age: LEAF_MAX_AGE,
            mature_age: LEAF_MATURE_AGE,
            radius: LEAF_RADIUS,
        }
    }
}

impl Leaf {
    pub fn tick(&mut self, age: &mut u32) -> LeafTick {
        if self.phase != LeafPhase::Growing {
            return LeafTick::Detach;
        }
        if *age >= self.max_age {
            return LeafTick::Detach;
        }
        let outcome = if *age == self.mature_age && !self.flowered {
            self.flowered = true;
            LeafTick::Flower
        } else {
            LeafTick::Aged
        };
        *age += 1;
        outcome
    }

    /// Colour fades from green towards brown once past maturity.
    pub fn color(&self, age: u32) -> Rgba {
        let ratio = if age > self.mature_age {
            (age - self.mature_age) as f32 / self.max_age as f32
        } else {
            0.0
        };
        LEAF_START_COLOR.lerp(LEAF_END_COLOR, ratio)
    }

    /// Petal size `(width, height)`; leaves stretch more in height and stop
    /// growing at maturity.
    pub fn petal_size(&self, age: u32) -> Vec2 {
        const BASE: f32 = 4.0;
        let grown = age.min(self.mature_age) as f32;
        Vec2::new(BASE * grown * 0.2, BASE * grown * 0.3)
    }

    pub fn is_mature(&self, age: u32) -> bool {
        age >= self.mature_age
    }
}

#[derive(Clone, Debug)]
pub enum CellKind {
    Stem(Stem),
    Leaf(Leaf),
}

/// A cell of the plant.
#[derive(Clone, Debug)]
pub struct Cell {
    pub id: CellId,
    /// Set at construction and never changed; the parent may already be
    /// finalized.
    pub parent: Option<CellId>,
    pub age: u32,
    pub generation: u32,
    pub branch_depth: u32,
    pub growth_angle: f32,
    pub template: Rc<GrowthTemplate>,
    pub body: BodyHandle,
    pub constraints: Vec<ConstraintHandle>,
    pub kind: CellKind,
}

impl Cell {
    pub fn as_stem(&self) -> Option<&Stem> {
        match &self.kind {
            CellKind::Stem(s) => Some(s),
            CellKind::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match &self.kind {
            CellKind::Leaf(l) => Some(l),
            CellKind::Stem(_) => None,
        }
    }

    pub fn is_stem(&self) -> bool {
        matches!(self.kind, CellKind::Stem(_))
    }

    pub fn iteration_cap(&self, max_iterations: f32) -> f32 {
        iteration_cap(max_iterations, self.generation, self.branch_depth)
    }
}
