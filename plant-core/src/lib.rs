//! Core stochastic plant growth library.
//!
//! Main components:
//! - [`plant`]: the growth engine that seeds a plant and runs its events.
//! - [`cell`]: stem and leaf cells and their timing formulas.
//! - [`arena`]: cell storage and the stem/leaf registries.
//! - [`schedule`]: the time-ordered event queue.
//! - [`template`]: growth templates and branching curves.
//! - [`physics`]: the physics boundary and a small spring world.
//! - [`config`]: configuration values and RON persistence.
//! - [`settings`]: validated, observable edits to the configuration.
//! - [`color`]: colours and colour interpolation.
//! - [`types`]: shared type aliases and handles.

pub mod arena;
pub mod cell;
pub mod color;
pub mod config;
pub mod physics;
pub mod plant;
pub mod schedule;
pub mod settings;
pub mod template;
pub mod types;
