//! Live tunables read by the growth engine.

use crate::template::TemplateKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Read-only view of the tunables the engine pulls while growing.
///
/// The engine never writes through this trait; whoever owns the backing
/// store may change values between events.
pub trait ConfigView {
    /// Global speed-up factor; every delay is divided by it.
    fn time_control(&self) -> f32;
    /// Distance between a cell and its parent at spawn time.
    fn cell_spacing(&self) -> f32;
    /// Width added to a stem on every growth tick.
    fn grow_increment(&self) -> f32;
    fn max_iterations(&self) -> f32;
    /// Width given to newly spawned stems.
    fn cell_size(&self) -> f32;
    fn plant_template(&self) -> TemplateKind;
    fn constrain_visibility(&self) -> bool;
    /// Spawning stops once the stem registry reaches this size.
    fn max_stems(&self) -> usize;
}

/// Growth configuration.
///
/// The first group of fields only matters before growth starts (and is
/// locked afterwards by [`crate::settings::SettingsStore`]); the rest can be
/// changed at runtime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub time_control: f32,
    pub cell_spacing: f32,
    pub grow_increment: f32,
    pub max_iterations: f32,
    pub cell_size: f32,
    pub plant_template: TemplateKind,
    pub max_stems: usize,

    pub constrain_visibility: bool,
    pub render_skin: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_control: 10.0,
            cell_spacing: 10.0,
            grow_increment: 0.5,
            max_iterations: 80.0,
            cell_size: 1.0,
            plant_template: TemplateKind::Tree,
            max_stems: 5000,
            constrain_visibility: false,
            render_skin: true,
        }
    }
}

impl ConfigView for Config {
    fn time_control(&self) -> f32 {
        // Every delay divides by this.
        self.time_control.max(1.0)
    }

    fn cell_spacing(&self) -> f32 {
        self.cell_spacing
    }

    fn grow_increment(&self) -> f32 {
        self.grow_increment
    }

    fn max_iterations(&self) -> f32 {
        self.max_iterations
    }

    fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn plant_template(&self) -> TemplateKind {
        self.plant_template
    }

    fn constrain_visibility(&self) -> bool {
        self.constrain_visibility
    }

    fn max_stems(&self) -> usize {
        self.max_stems
    }
}

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("RON serialize error: {0}")]
    Serialize(#[from] ron::Error),
}

impl Config {
    /// Reads a configuration from a RON file. Missing fields take their
    /// default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron(&contents)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigFileError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    pub fn from_ron(contents: &str) -> Result<Self, ConfigFileError> {
        Ok(ron::from_str(contents)?)
    }

    pub fn to_ron(&self) -> Result<String, ConfigFileError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Loads `path`, falling back to defaults when it is missing or broken.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No saved settings at {:?}, using defaults", path);
            return Self::default();
        }
        match Self::load(path) {
            Ok(cfg) => {
                log::info!("Loaded settings from {:?}", path);
                cfg
            }
            Err(e) => {
                log::warn!("Failed to load settings from {:?}: {}. Using defaults.", path, e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.time_control, 10.0);
        assert_eq!(cfg.cell_spacing, 10.0);
        assert_eq!(cfg.grow_increment, 0.5);
        assert_eq!(cfg.max_iterations, 80.0);
        assert_eq!(cfg.cell_size, 1.0);
        assert_eq!(cfg.plant_template, TemplateKind::Tree);
        assert!(!cfg.constrain_visibility);
        assert!(cfg.render_skin);
    }

    #[test]
    fn time_control_never_reads_below_one() {
        let mut cfg = Config::default();
        cfg.time_control = 0.0;
        assert_eq!(ConfigView::time_control(&cfg), 1.0);
    }

    #[test]
    fn partial_ron_fills_missing_fields_with_defaults() {
        let cfg = Config::from_ron("(time_control: 25.0, plant_template: Custom)").unwrap();
        assert_eq!(cfg.time_control, 25.0);
        assert_eq!(cfg.plant_template, TemplateKind::Custom);
        assert_eq!(cfg.cell_spacing, Config::default().cell_spacing);
    }

    #[test]
    fn ron_text_reads_back_identically() {
        let mut cfg = Config::default();
        cfg.max_iterations = 120.0;
        cfg.constrain_visibility = true;

        let text = cfg.to_ron().unwrap();
        assert_eq!(Config::from_ron(&text).unwrap(), cfg);
    }

    #[test]
    fn broken_ron_is_a_parse_error() {
        assert!(matches!(
            Config::from_ron("(time_control: )"),
            Err(ConfigFileError::Parse(_))
        ));
    }

    #[test]
    fn load_or_default_tolerates_missing_file() {
        let cfg = Config::load_or_default("definitely/not/here/plant_settings.ron");
        assert_eq!(cfg, Config::default());
    }
}
