//! Species templates: the immutable rule set shared by every cell of a plant.

use crate::color::{ColorRange, Rgb};
use serde::{Deserialize, Serialize};

/// Branch probability as a function of a cell's generation.
///
/// Curves are free to leave `[0, 1]`; see [`passes_gate`] for how such
/// values are interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum BranchCurve {
    /// The same probability for every generation.
    Constant(f32),
    /// `base - scale / (x + 1)`: strongly negative for the first generations,
    /// approaching `base` later on.
    Reciprocal { base: f32, scale: f32 },
    /// `base + slope * x`.
    Linear { base: f32, slope: f32 },
}

impl BranchCurve {
    pub fn eval(&self, x: u32) -> f32 {
        let x = x as f32;
        match *self {
            BranchCurve::Constant(p) => p,
            BranchCurve::Reciprocal { base, scale } => base - scale / (x + 1.0),
            BranchCurve::Linear { base, slope } => base + slope * x,
        }
    }
}

/// A start/end pair of constraint stiffness values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StiffnessRange {
    pub start: f32,
    pub end: f32,
}

impl StiffnessRange {
    /// `t` is expected to be clamped by the caller. Exact at both endpoints.
    pub fn at(&self, t: f32) -> f32 {
        self.start * (1.0 - t) + self.end * t
    }
}

/// Immutable species-level rule set.
///
/// Cells share one template through an `Rc`; nothing mutates it after
/// construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrowthTemplate {
    pub name: String,
    /// Highest `branch_depth` any cell may have.
    pub max_depth: u32,
    pub branch_probability: BranchCurve,
    pub transition_colors: ColorRange,
    pub stiffness_range: StiffnessRange,
}

/// Selects one of the built-in templates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateKind {
    #[default]
    Tree,
    Custom,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 2] = [TemplateKind::Tree, TemplateKind::Custom];

    pub fn label(self) -> &'static str {
        match self {
            TemplateKind::Tree => "Tree",
            TemplateKind::Custom => "Custom",
        }
    }

    pub fn build(self) -> GrowthTemplate {
        match self {
            TemplateKind::Tree => GrowthTemplate::tree(),
            TemplateKind::Custom => GrowthTemplate::custom(),
        }
    }
}

impl GrowthTemplate {
    /// Sparse early branching that picks up after ~10 generations.
    pub fn tree() -> Self {
        Self {
            name: "tree".to_owned(),
            max_depth: 4,
            branch_probability: BranchCurve::Reciprocal {
                base: 0.5,
                scale: 5.0,
            },
            transition_colors: ColorRange {
                start: Rgb::new(0x66, 0xba, 0x5b),
                end: Rgb::new(0x4c, 0x4f, 0x46),
            },
            stiffness_range: StiffnessRange {
                start: 0.2,
                end: 0.8,
            },
        }
    }

    pub fn custom() -> Self {
        Self {
            name: "custom".to_owned(),
            max_depth: 4,
            branch_probability: BranchCurve::Linear {
                base: 0.2,
                slope: -0.05,
            },
            transition_colors: ColorRange {
                start: Rgb::new(0x6b, 0x8e, 0x23),
                end: Rgb::new(0x6b, 0x33, 0x23),
            },
            stiffness_range: StiffnessRange {
                start: 0.6,
                end: 0.8,
            },
        }
    }

    pub fn branch_probability(&self, generation: u32) -> f32 {
        self.branch_probability.eval(generation)
    }
}

/// Probability gate for a uniform `roll` in `[0, 1)`.
///
/// Probabilities are not clamped: `p <= 0` never passes and `p >= 1`
/// always passes, which is how the species curves are meant to saturate.
pub fn passes_gate(roll: f32, p: f32) -> bool {
    roll < p
}
