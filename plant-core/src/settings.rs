//! A small settings store with validation, pre-growth locking and change
//! notification.
//!
//! Front ends edit the configuration through [`SettingsStore::apply`]; the
//! growth engine only ever reads the resulting [`Config`] through
//! [`crate::config::ConfigView`].

use crate::config::Config;
use crate::template::TemplateKind;
use std::ops::RangeInclusive;
use thiserror::Error;

/// A single edit to one configuration field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Setting {
    TimeControl(f32),
    CellSpacing(f32),
    GrowIncrement(f32),
    MaxIterations(f32),
    CellSize(f32),
    PlantTemplate(TemplateKind),
    MaxStems(usize),
    ConstrainVisibility(bool),
    RenderSkin(bool),
}

/// Whether a field may still change once growth is under way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingCategory {
    PreGrowth,
    Runtime,
}

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("{0} cannot change after growth has started")]
    Locked(&'static str),
    #[error("{name} must be within {min}..={max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Notification sent to observers after an accepted edit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SettingChange {
    pub setting: Setting,
    pub category: SettingCategory,
}

type Observer = Box<dyn FnMut(&SettingChange)>;

pub const TIME_CONTROL_RANGE: RangeInclusive<f32> = 1.0..=100.0;
pub const CELL_SPACING_RANGE: RangeInclusive<f32> = 1.0..=50.0;
pub const GROW_INCREMENT_RANGE: RangeInclusive<f32> = 0.1..=5.0;
pub const MAX_ITERATIONS_RANGE: RangeInclusive<f32> = 10.0..=200.0;
pub const CELL_SIZE_RANGE: RangeInclusive<f32> = 0.5..=20.0;
pub const MAX_STEMS_RANGE: RangeInclusive<usize> = 1..=100_000;

impl Setting {
    pub fn name(&self) -> &'static str {
        match self {
            Setting::TimeControl(_) => "time_control",
            Setting::CellSpacing(_) => "cell_spacing",
            Setting::GrowIncrement(_) => "grow_increment",
            Setting::MaxIterations(_) => "max_iterations",
            Setting::CellSize(_) => "cell_size",
            Setting::PlantTemplate(_) => "plant_template",
            Setting::MaxStems(_) => "max_stems",
            Setting::ConstrainVisibility(_) => "constrain_visibility",
            Setting::RenderSkin(_) => "render_skin",
        }
    }

    pub fn category(&self) -> SettingCategory {
        match self {
            Setting::ConstrainVisibility(_) | Setting::RenderSkin(_) => SettingCategory::Runtime,
            _ => SettingCategory::PreGrowth,
        }
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let check = |value: f32, range: RangeInclusive<f32>| {
            if range.contains(&value) {
                Ok(())
            } else {
                Err(SettingsError::OutOfRange {
                    name: self.name(),
                    value: value as f64,
                    min: *range.start() as f64,
                    max: *range.end() as f64,
                })
            }
        };
        match *self {
            Setting::TimeControl(v) => check(v, TIME_CONTROL_RANGE),
            Setting::CellSpacing(v) => check(v, CELL_SPACING_RANGE),
            Setting::GrowIncrement(v) => check(v, GROW_INCREMENT_RANGE),
            Setting::MaxIterations(v) => check(v, MAX_ITERATIONS_RANGE),
            Setting::CellSize(v) => check(v, CELL_SIZE_RANGE),
            Setting::MaxStems(v) if !MAX_STEMS_RANGE.contains(&v) => {
                Err(SettingsError::OutOfRange {
                    name: self.name(),
                    value: v as f64,
                    min: *MAX_STEMS_RANGE.start() as f64,
                    max: *MAX_STEMS_RANGE.end() as f64,
                })
            }
            _ => Ok(()),
        }
    }

    fn write_to(&self, cfg: &mut Config) {
        match *self {
            Setting::TimeControl(v) => cfg.time_control = v,
            Setting::CellSpacing(v) => cfg.cell_spacing = v,
            Setting::GrowIncrement(v) => cfg.grow_increment = v,
            Setting::MaxIterations(v) => cfg.max_iterations = v,
            Setting::CellSize(v) => cfg.cell_size = v,
            Setting::PlantTemplate(v) => cfg.plant_template = v,
            Setting::MaxStems(v) => cfg.max_stems = v,
            Setting::ConstrainVisibility(v) => cfg.constrain_visibility = v,
            Setting::RenderSkin(v) => cfg.render_skin = v,
        }
    }
}

/// Owns the live [`Config`] and mediates every edit to it.
pub struct SettingsStore {
    config: Config,
    pre_growth_locked: bool,
    observers: Vec<Observer>,
}

impl SettingsStore {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            pre_growth_locked: false,
            observers: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_pre_growth_locked(&self) -> bool {
        self.pre_growth_locked
    }

    pub fn set_pre_growth_locked(&mut self, locked: bool) {
        self.pre_growth_locked = locked;
    }

    /// Freezes the pre-growth fields; called once the plant is seeded.
    pub fn lock_pre_growth(&mut self) {
        if !self.pre_growth_locked {
            log::info!("Pre-growth settings locked");
        }
        self.pre_growth_locked = true;
    }

    pub fn add_observer(&mut self, observer: impl FnMut(&SettingChange) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Validates and applies one edit, then notifies observers.
    ///
    /// Writing a value equal to the current one still notifies.
    pub fn apply(&mut self, setting: Setting) -> Result<(), SettingsError> {
        let category = setting.category();
        if self.pre_growth_locked && category == SettingCategory::PreGrowth {
            return Err(SettingsError::Locked(setting.name()));
        }
        setting.validate()?;
        setting.write_to(&mut self.config);

        log::debug!("Setting {} updated: {:?}", setting.name(), setting);
        let change = SettingChange { setting, category };
        for observer in &mut self.observers {
            observer(&change);
        }
        Ok(())
    }

    /// Replaces every runtime field with the defaults, and the pre-growth
    /// fields too unless they are locked.
    pub fn reset_to_default(&mut self) {
        let defaults = Config::default();
        let mut edits = vec![
            Setting::ConstrainVisibility(defaults.constrain_visibility),
            Setting::RenderSkin(defaults.render_skin),
        ];
        if !self.pre_growth_locked {
            edits.extend([
                Setting::TimeControl(defaults.time_control),
                Setting::CellSpacing(defaults.cell_spacing),
                Setting::GrowIncrement(defaults.grow_increment),
                Setting::MaxIterations(defaults.max_iterations),
                Setting::CellSize(defaults.cell_size),
                Setting::PlantTemplate(defaults.plant_template),
                Setting::MaxStems(defaults.max_stems),
            ]);
        }
        for edit in edits {
            // Defaults are always in range and the lock was checked above.
            let _ = self.apply(edit);
        }
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
