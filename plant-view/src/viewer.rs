//! Interactive plant growth viewer built with eframe/egui.
//!
//! This module defines [`Viewer`], which owns the simulation state (plant,
//! physics world, settings) and implements [`eframe::App`] to render and
//! control the growth through an egui UI.

use eframe::App;
use egui::epaint::CubicBezierShape;
use glam::Vec2;
use plant_core::{
    color::{Rgb, Rgba},
    config::Config,
    physics::{Shape, SpringWorld},
    plant::{LeafView, Plant, StemView},
    settings::{self, Setting, SettingsStore},
    template::TemplateKind,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

/// Settings file read at start-up and written after every accepted edit.
const SETTINGS_PATH: &str = "plant_settings.ron";

/// Longest frame the simulation will catch up on at once, in seconds.
const MAX_FRAME_SECONDS: f32 = 0.25;

/// Main application state for the interactive viewer.
///
/// [`Viewer`] glues together:
/// - The simulation core: [`Plant`], [`SpringWorld`] and the [`SettingsStore`]
///   the plant reads its configuration from.
/// - UI state (pan/zoom, run/pause, simulation speed).
/// - eframe/egui callbacks for drawing and user interaction.
///
/// The typical per-frame update is:
/// 1. Handle UI interactions / input.
/// 2. If `running` is `true`, advance physics and growth by the frame time.
/// 3. Render stems, leaves and, when asked for, raw bodies and constraints.
pub struct Viewer {
    settings: SettingsStore,
    settings_path: Option<PathBuf>,
    /// Set by the settings observer; cleared once the file is written.
    settings_dirty: Rc<Cell<bool>>,

    world: SpringWorld,
    plant: Plant,
    rng: StdRng,

    running: bool,
    /// Simulation seconds per real second.
    speed: f32,
    physics_leftover: f32,

    zoom: f32,
    pan: egui::Vec2,
}

impl Viewer {
    /// Creates a viewer with settings loaded from [`SETTINGS_PATH`].
    pub fn new() -> Self {
        let config = Config::load_or_default(SETTINGS_PATH);
        Self::with_config(config, Some(PathBuf::from(SETTINGS_PATH)))
    }

    /// Creates a viewer around `config`. With no `settings_path`, edits are
    /// kept in memory only.
    pub fn with_config(config: Config, settings_path: Option<PathBuf>) -> Self {
        let mut settings = SettingsStore::new(config);
        let settings_dirty = Rc::new(Cell::new(false));
        let flag = Rc::clone(&settings_dirty);
        settings.add_observer(move |_| flag.set(true));

        Self {
            settings,
            settings_path,
            settings_dirty,
            world: SpringWorld::default(),
            plant: Plant::new(Vec2::ZERO),
            rng: StdRng::from_os_rng(),
            running: false,
            speed: 1.0,
            physics_leftover: 0.0,
            zoom: 2.0,
            pan: egui::vec2(0.0, 200.0),
        }
    }

    /// Seeds the plant and locks the pre-growth settings.
    fn begin_growth(&mut self) {
        match self.plant.begin_growth(self.settings.config(), &mut self.world) {
            Ok(_) => {
                self.settings.lock_pre_growth();
                self.running = true;
            }
            Err(e) => log::warn!("Could not begin growth: {}", e),
        }
    }

    /// Throws the plant away and unlocks the pre-growth settings.
    fn replant(&mut self) {
        self.world = SpringWorld::default();
        self.plant = Plant::new(Vec2::ZERO);
        self.settings.set_pre_growth_locked(false);
        self.physics_leftover = 0.0;
        self.running = false;
        log::info!("Plant cleared");
    }

    /// Advances physics and growth by `dt` real seconds.
    fn step(&mut self, dt: f32) {
        let sim_dt = dt.clamp(0.0, MAX_FRAME_SECONDS) * self.speed;
        self.physics_leftover = self.world.advance(self.physics_leftover + sim_dt);
        self.plant.advance_by(
            sim_dt as f64 * 1000.0,
            self.settings.config(),
            &mut self.world,
            &mut self.rng,
        );
    }

    fn save_settings_if_dirty(&mut self) {
        if !self.settings_dirty.replace(false) {
            return;
        }
        let Some(path) = &self.settings_path else {
            return;
        };
        if let Err(e) = self.settings.config().save(path) {
            log::warn!("Failed to save settings to {:?}: {}", path, e);
        }
    }

    fn apply(&mut self, setting: Setting) {
        if let Err(e) = self.settings.apply(setting) {
            log::warn!("{}", e);
        }
    }

    /// Converts a world-space position to screen-space.
    ///
    /// World coordinates are scaled by `zoom`, offset by `pan`, and then
    /// centered inside the given `rect`. The world's y axis already points
    /// down, like the screen's, so nothing is flipped.
    fn world_to_screen(&self, p: Vec2, rect: egui::Rect) -> egui::Pos2 {
        let center = rect.center();
        egui::pos2(
            center.x + p.x * self.zoom + self.pan.x,
            center.y + p.y * self.zoom + self.pan.y,
        )
    }

    /// Inverse of [`Viewer::world_to_screen`].
    fn screen_to_world(&self, p: egui::Pos2, rect: egui::Rect) -> Vec2 {
        let center = rect.center();
        Vec2::new(
            (p.x - center.x - self.pan.x) / self.zoom,
            (p.y - center.y - self.pan.y) / self.zoom,
        )
    }

    /// Helper to draw a labeled `f32` [`egui::DragValue`]. Returns the new
    /// value if the user changed it.
    fn labeled_drag_f32(
        ui: &mut egui::Ui,
        label: &str,
        value: f32,
        range: std::ops::RangeInclusive<f32>,
        speed: f64,
    ) -> Option<f32> {
        let mut v = value;
        let changed = ui
            .horizontal(|ui| {
                ui.label(label);
                ui.add(egui::DragValue::new(&mut v).range(range).speed(speed))
                    .changed()
            })
            .inner;
        changed.then_some(v)
    }

    /// Builds the top panel UI (growth and run controls, speed, zoom).
    fn ui_top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(!self.plant.is_started(), egui::Button::new("🌱 Begin growth"))
                    .clicked()
                {
                    self.begin_growth();
                }

                if ui
                    .add_enabled(
                        self.plant.is_started(),
                        egui::Button::new(if self.running { "⏸ Pause" } else { "▶ Run" }),
                    )
                    .clicked()
                {
                    self.running = !self.running;
                }

                if ui.button("Replant").clicked() {
                    self.replant();
                }

                ui.separator();
                ui.add(egui::Slider::new(&mut self.speed, 0.1..=10.0).text("Speed"));
                ui.add(egui::Slider::new(&mut self.zoom, 0.1..=10.0).text("Zoom"));
                if ui.button("Reset view").clicked() {
                    self.zoom = 2.0;
                    self.pan = egui::vec2(0.0, 200.0);
                }
            });
        });
    }

    /// Builds the bottom status bar (sim time, registry sizes, queue length).
    fn ui_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format!("t = {:.1} s", self.plant.now() / 1000.0));
                ui.separator();
                ui.label(format!("stems = {}", self.plant.arena().stem_count()));
                ui.label(format!("leaves = {}", self.plant.arena().leaf_count()));
                ui.label(format!("pending events = {}", self.plant.pending_events()));
                ui.label(format!("bodies = {}", self.world.body_count()));
                if let Some(template) = self.plant.template() {
                    ui.separator();
                    ui.label(format!("template = {}", template.name));
                }
                if self.plant.is_dormant() {
                    ui.label("dormant");
                }
            });
        });
    }

    /// Builds the right-hand configuration panel.
    ///
    /// Pre-growth fields are disabled once the plant is seeded; runtime
    /// toggles stay live.
    fn ui_config_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("config_panel")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| {
                ui.heading("Config");
                let cfg = self.settings.config().clone();
                let mut edits = Vec::new();

                ui.separator();
                ui.label("Before growth");
                ui.add_enabled_ui(!self.settings.is_pre_growth_locked(), |ui| {
                    let mut template = cfg.plant_template;
                    egui::ComboBox::from_label("template")
                        .selected_text(template.label())
                        .show_ui(ui, |ui| {
                            for kind in TemplateKind::ALL {
                                ui.selectable_value(&mut template, kind, kind.label());
                            }
                        });
                    if template != cfg.plant_template {
                        edits.push(Setting::PlantTemplate(template));
                    }

                    let fields: [(&str, f32, _, f64, fn(f32) -> Setting); 5] = [
                        (
                            "time_control:",
                            cfg.time_control,
                            settings::TIME_CONTROL_RANGE,
                            0.5,
                            Setting::TimeControl,
                        ),
                        (
                            "cell_spacing:",
                            cfg.cell_spacing,
                            settings::CELL_SPACING_RANGE,
                            0.2,
                            Setting::CellSpacing,
                        ),
                        (
                            "grow_increment:",
                            cfg.grow_increment,
                            settings::GROW_INCREMENT_RANGE,
                            0.05,
                            Setting::GrowIncrement,
                        ),
                        (
                            "max_iterations:",
                            cfg.max_iterations,
                            settings::MAX_ITERATIONS_RANGE,
                            1.0,
                            Setting::MaxIterations,
                        ),
                        (
                            "cell_size:",
                            cfg.cell_size,
                            settings::CELL_SIZE_RANGE,
                            0.1,
                            Setting::CellSize,
                        ),
                    ];
                    for (label, value, range, speed, make) in fields {
                        if let Some(v) = Self::labeled_drag_f32(ui, label, value, range, speed) {
                            edits.push(make(v));
                        }
                    }

                    let mut max_stems = cfg.max_stems;
                    ui.horizontal(|ui| {
                        ui.label("max_stems:");
                        ui.add(
                            egui::DragValue::new(&mut max_stems)
                                .range(settings::MAX_STEMS_RANGE)
                                .speed(10.0),
                        );
                    });
                    if max_stems != cfg.max_stems {
                        edits.push(Setting::MaxStems(max_stems));
                    }
                });

                ui.separator();
                ui.label("Rendering");
                let mut skin = cfg.render_skin;
                if ui.checkbox(&mut skin, "render skin").changed() {
                    edits.push(Setting::RenderSkin(skin));
                }
                let mut visible = cfg.constrain_visibility;
                if ui.checkbox(&mut visible, "show constraints").changed() {
                    edits.push(Setting::ConstrainVisibility(visible));
                }

                ui.separator();
                if ui.button("Reset cfg to default").clicked() {
                    self.settings.reset_to_default();
                }

                for edit in edits {
                    self.apply(edit);
                }
            });
    }

    /// Builds the central panel where the plant is drawn.
    fn ui_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let response = ui.allocate_response(ui.available_size(), egui::Sense::drag());
            let rect = response.rect;
            let painter = ui.painter_at(rect);

            if response.dragged() {
                self.pan += response.drag_delta();
            }

            // Zoom around the mouse cursor.
            let scroll = ui.ctx().input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 {
                let pointer_screen = response.hover_pos().unwrap_or(rect.center());
                let world_before = self.screen_to_world(pointer_screen, rect);

                let factor = (1.0 + scroll * 0.001).clamp(0.5, 2.0);
                self.zoom = (self.zoom * factor).clamp(0.1, 10.0);

                let screen_after = self.world_to_screen(world_before, rect);
                self.pan += pointer_screen - screen_after;
            }

            let cfg = self.settings.config();
            if cfg.render_skin {
                self.draw_seed(&painter, rect);
                for stem in self.plant.stem_views(&self.world) {
                    self.draw_stem(&painter, rect, &stem);
                }
                for leaf in self.plant.leaf_views(&self.world) {
                    self.draw_leaf(&painter, rect, &leaf);
                }
            } else {
                self.draw_bodies(&painter, rect);
            }
            if cfg.constrain_visibility {
                self.draw_constraints(&painter, rect);
            }

            if self.running {
                let dt = ctx.input(|i| i.stable_dt);
                self.step(dt);
                ctx.request_repaint();
            }
        });
    }

    fn draw_seed(&self, painter: &egui::Painter, rect: egui::Rect) {
        let Some(seed) = self.plant.seed_anchor() else {
            return;
        };
        let Some(body) = self.world.body(seed) else {
            return;
        };
        if let Shape::Rectangle { width, height } = body.shape {
            let points = rect_corners(body.pos, width, height)
                .map(|p| self.world_to_screen(p, rect))
                .to_vec();
            painter.add(egui::Shape::convex_polygon(
                points,
                color32(body.fill),
                egui::Stroke::NONE,
            ));
        }
    }

    /// A stem is a cubic curve from its pin to its body, with control points
    /// at a quarter and three quarters of the way.
    fn draw_stem(&self, painter: &egui::Painter, rect: egui::Rect, stem: &StemView) {
        let Some(from) = stem.parent_position else {
            return;
        };
        let to = stem.position;
        let points = [from, from.lerp(to, 0.25), from.lerp(to, 0.75), to]
            .map(|p| self.world_to_screen(p, rect));
        let stroke = egui::Stroke::new((stem.width * self.zoom).max(1.0), color32(stem.color));
        painter.add(CubicBezierShape::from_points_stroke(
            points,
            false,
            egui::Color32::TRANSPARENT,
            stroke,
        ));
    }

    /// Two ellipse petals tilted either side of vertical.
    fn draw_leaf(&self, painter: &egui::Painter, rect: egui::Rect, leaf: &LeafView) {
        const TILT: f32 = 0.6;
        const SEGMENTS: usize = 16;
        let half = leaf.petal_size * 0.5;
        if half.x <= 0.0 || half.y <= 0.0 {
            return;
        }
        let fill = color32a(leaf.color);
        for side in [-1.0_f32, 1.0] {
            let rot = Vec2::from_angle(side * TILT);
            let center = leaf.position + rot.rotate(Vec2::new(0.0, -half.y));
            let points = (0..SEGMENTS)
                .map(|i| {
                    let t = i as f32 / SEGMENTS as f32 * std::f32::consts::TAU;
                    let local = Vec2::new(t.cos() * half.x, t.sin() * half.y);
                    self.world_to_screen(center + rot.rotate(local), rect)
                })
                .collect();
            painter.add(egui::Shape::convex_polygon(points, fill, egui::Stroke::NONE));
        }
    }

    /// Raw physics bodies, used when skin rendering is off.
    fn draw_bodies(&self, painter: &egui::Painter, rect: egui::Rect) {
        for (_, body) in self.world.bodies() {
            let stroke = egui::Stroke::new(1.0, color32(body.fill));
            match body.shape {
                Shape::Circle { radius } => {
                    let p = self.world_to_screen(body.pos, rect);
                    painter.circle_stroke(p, (radius * self.zoom).max(1.0), stroke);
                }
                Shape::Rectangle { width, height } => {
                    let points = rect_corners(body.pos, width, height)
                        .map(|p| self.world_to_screen(p, rect))
                        .to_vec();
                    painter.add(egui::Shape::closed_line(points, stroke));
                }
            }
        }
    }

    fn draw_constraints(&self, painter: &egui::Painter, rect: egui::Rect) {
        let stroke = egui::Stroke::new(1.0, egui::Color32::from_gray(160));
        for (_, c) in self.world.constraints().filter(|(_, c)| c.spec.visible) {
            let (Some(a), Some(b)) = (
                self.world.anchor_point(&c.spec.a),
                self.world.anchor_point(&c.spec.b),
            ) else {
                continue;
            };
            painter.line_segment(
                [self.world_to_screen(a, rect), self.world_to_screen(b, rect)],
                stroke,
            );
        }
    }
}

fn rect_corners(center: Vec2, width: f32, height: f32) -> [Vec2; 4] {
    let h = Vec2::new(width, height) * 0.5;
    [
        center + Vec2::new(-h.x, -h.y),
        center + Vec2::new(h.x, -h.y),
        center + Vec2::new(h.x, h.y),
        center + Vec2::new(-h.x, h.y),
    ]
}

fn color32(c: Rgb) -> egui::Color32 {
    egui::Color32::from_rgb(c.r, c.g, c.b)
}

fn color32a(c: Rgba) -> egui::Color32 {
    let a = (c.a.clamp(0.0, 1.0) * 255.0).round() as u8;
    egui::Color32::from_rgba_unmultiplied(c.rgb.r, c.rgb.g, c.rgb.b, a)
}

impl App for Viewer {
    /// eframe callback that builds all UI panels for each frame.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ui_top_panel(ctx);
        self.ui_status_bar(ctx);
        self.ui_config_panel(ctx);
        self.ui_central_panel(ctx);
        self.save_settings_if_dirty();
    }
}
