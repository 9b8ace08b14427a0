//! Application entry point for the plant growth viewer.
//!
//! This binary sets up logging and eframe/egui and delegates all interactive
//! logic and rendering to [`Viewer`] from the `viewer` module.

mod viewer;

use viewer::Viewer;

/// Starts the native eframe application.
///
/// Log verbosity is controlled through `RUST_LOG`, e.g.
/// `RUST_LOG=plant_core=debug`.
fn main() -> eframe::Result<()> {
    env_logger::init();

    let options = eframe::NativeOptions::default();

    eframe::run_native(
        "Plant Growth",
        options,
        Box::new(|_cc| Ok(Box::new(Viewer::new()))),
    )
}
