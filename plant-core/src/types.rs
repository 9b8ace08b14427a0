/// Identifier for a cell owned by a [`crate::arena::CellArena`].
///
/// Ids are handed out in creation order and never reused, so a stale id
/// (e.g. one pointing at a removed leaf) simply resolves to `None`.
pub type CellId = usize;

/// Simulation time in milliseconds.
pub type Millis = f64;

/// Opaque handle to a body living in a physics world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u32);

/// Opaque handle to a constraint living in a physics world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintHandle(pub u32);
