use eframe::egui::{self, Key, Response, Ui};
use linkchart::LayoutMode;
use linkchart::selection::{Containment, SelectionTool};

use super::super::Workspace;

const SLIDER_KEY_BASE_RATE: f32 = 10.0;
const SLIDER_KEY_ACCEL_PER_SEC: f32 = 9.0;
const SLIDER_KEY_ACCEL_MAX: f32 = 40.0;

#[derive(Clone, Copy, Default)]
struct SliderKeyHoldState {
    positive_secs: f32,
    negative_secs: f32,
}

fn slider_key_accel_multiplier(hold_secs: f32) -> f32 {
    let ramp = hold_secs * SLIDER_KEY_ACCEL_PER_SEC;
    (1.0 + ramp + ramp * ramp * 0.15).min(SLIDER_KEY_ACCEL_MAX)
}

/// Arrow keys nudge a focused slider, speeding up the longer they are held.
fn apply_slider_arrow_acceleration(
    ui: &Ui,
    response: &Response,
    value: &mut f32,
    min: f32,
    max: f32,
) -> bool {
    let state_id = response.id.with("arrow_key_hold_state");
    let mut hold_state = ui.ctx().data(|data| {
        data.get_temp::<SliderKeyHoldState>(state_id)
            .unwrap_or_default()
    });

    if !response.has_focus() {
        ui.ctx()
            .data_mut(|data| data.insert_temp(state_id, SliderKeyHoldState::default()));
        return false;
    }

    let (delta_time, increase_down, decrease_down) = ui.input(|input| {
        (
            input.stable_dt.min(0.1),
            input.key_down(Key::ArrowRight) || input.key_down(Key::ArrowUp),
            input.key_down(Key::ArrowLeft) || input.key_down(Key::ArrowDown),
        )
    });

    hold_state.positive_secs = if increase_down {
        hold_state.positive_secs + delta_time
    } else {
        0.0
    };
    hold_state.negative_secs = if decrease_down {
        hold_state.negative_secs + delta_time
    } else {
        0.0
    };
    ui.ctx()
        .data_mut(|data| data.insert_temp(state_id, hold_state));

    let direction = (increase_down as i8) - (decrease_down as i8);
    if direction == 0 {
        return false;
    }

    let hold_secs = if direction > 0 {
        hold_state.positive_secs
    } else {
        hold_state.negative_secs
    };
    let step = ((max - min) / 200.0).max(0.0005);
    let speed = SLIDER_KEY_BASE_RATE * slider_key_accel_multiplier(hold_secs);
    let old_value = *value;
    *value = (*value + direction as f32 * step * speed * delta_time).clamp(min, max);
    ui.ctx().request_repaint();
    (*value - old_value).abs() > f32::EPSILON
}

fn tuning_slider(ui: &mut Ui, value: &mut f32, min: f32, max: f32, text: &str, hint: &str) -> bool {
    let response = ui
        .add(
            egui::Slider::new(value, min..=max)
                .text(text)
                .clamping(egui::SliderClamping::Always),
        )
        .on_hover_text(hint);
    if response.hovered() {
        response.request_focus();
    }
    let mut changed = response.changed();
    changed |= apply_slider_arrow_acceleration(ui, &response, value, min, max);
    changed
}

impl Workspace {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui, now: f64) {
        ui.heading("Graph Controls");
        ui.separator();
        ui.add_space(4.0);

        ui.label("Search (label or id)")
            .on_hover_text("Fuzzy-highlight matching nodes.");
        if ui.text_edit_singleline(&mut self.search).changed() {
            self.search_matches = self.view.set_search(&self.search);
        }
        if !self.search.trim().is_empty() {
            ui.small(format!("{} match(es)", self.search_matches));
        }

        ui.separator();
        ui.label("Camera");
        ui.horizontal_wrapped(|ui| {
            if ui.button("Zoom in").clicked() {
                self.view.zoom_in();
            }
            if ui.button("Zoom out").clicked() {
                self.view.zoom_out();
            }
            if ui.button("Fit").clicked() {
                self.view.zoom_to_fit();
            }
            let has_selection = !self.view.highlight().selected().is_empty();
            if ui
                .add_enabled(has_selection, egui::Button::new("Fit selection"))
                .clicked()
            {
                self.view.zoom_to_selection();
            }
        });

        ui.separator();
        ui.label("Layout");
        let mut mode = self.view.layout_mode();
        ui.horizontal_wrapped(|ui| {
            for candidate in LayoutMode::ALL {
                ui.selectable_value(&mut mode, candidate, candidate.label());
            }
        });
        let regenerate = ui
            .add_enabled(
                !self.view.is_layout_running(),
                egui::Button::new("Regenerate layout"),
            )
            .on_hover_text("Clear pins and lay the whole graph out again.")
            .clicked();
        let outcome = if mode != self.view.layout_mode() {
            Some(self.view.set_layout_mode(mode))
        } else if regenerate {
            Some(self.view.regenerate_layout())
        } else {
            None
        };
        if let Some(Err(error)) = outcome {
            log::warn!("regenerate layout: {error}");
            self.push_toast("Layout failed, try again".to_owned(), now);
        }
        if let Some(progress) = self.view.layout_progress() {
            ui.add(egui::ProgressBar::new(progress).show_percentage());
        }

        ui.separator();
        ui.label("Selection");
        let mut tool = self.view.selection_tool();
        ui.horizontal(|ui| {
            ui.selectable_value(&mut tool, None, "Pointer");
            for candidate in [SelectionTool::Lasso, SelectionTool::Rectangle] {
                ui.selectable_value(&mut tool, Some(candidate), candidate.label());
            }
        });
        if tool != self.view.selection_tool() {
            self.view.set_selection_tool(tool);
        }
        let mut containment = self.view.containment();
        ui.horizontal(|ui| {
            for candidate in [Containment::Partial, Containment::Full] {
                ui.radio_value(&mut containment, candidate, candidate.label())
                    .on_hover_text("How much of a node must fall inside the marquee.");
            }
        });
        if containment != self.view.containment() {
            self.view.set_containment(containment);
        }
        ui.small("Shift-drag on the background also draws a marquee.");

        ui.separator();
        let mut show_icons = self.view.config().show_icons;
        if ui.checkbox(&mut show_icons, "Show icons").changed() {
            self.view.set_show_icons(show_icons);
        }
        let mut show_labels = self.view.config().show_labels;
        if ui.checkbox(&mut show_labels, "Show labels").changed() {
            self.view.set_show_labels(show_labels);
        }
        ui.checkbox(&mut self.show_fps_bar, "FPS display")
            .on_hover_text("Show a live FPS readout in the header.");

        let mut config = self.view.config().clone();
        let mut tuned = false;
        ui.collapsing("Force tuning", |ui| {
            tuned |= tuning_slider(
                ui,
                &mut config.force.charge_strength,
                -400.0,
                -5.0,
                "Charge",
                "Repulsion between nodes; more negative pushes harder.",
            );
            tuned |= tuning_slider(
                ui,
                &mut config.force.link_distance,
                10.0,
                300.0,
                "Link distance",
                "Rest length of edge springs.",
            );
            tuned |= tuning_slider(
                ui,
                &mut config.force.link_strength,
                0.0,
                2.0,
                "Link strength",
                "Stiffness of edge springs.",
            );
            tuned |= tuning_slider(
                ui,
                &mut config.force.collision_radius,
                0.0,
                80.0,
                "Collision radius",
                "Minimum spacing kept between node centres.",
            );
        });
        ui.collapsing("Size tuning", |ui| {
            tuned |= tuning_slider(
                ui,
                &mut config.lod.node_size_pct,
                10.0,
                300.0,
                "Node size %",
                "Scale node circles.",
            );
            tuned |= tuning_slider(
                ui,
                &mut config.labels.font_size_pct,
                50.0,
                250.0,
                "Label font %",
                "Scale node label text.",
            );
            tuned |= tuning_slider(
                ui,
                &mut config.labels.edge_font_size_pct,
                50.0,
                250.0,
                "Edge label font %",
                "Scale edge label text.",
            );
        });
        if tuned {
            self.view.set_config(config);
        }

        if self.view.is_halted() {
            ui.separator();
            ui.colored_label(egui::Color32::LIGHT_RED, "Animation stopped after a frame error.");
            if ui.button("Resume").clicked() {
                self.view.resume();
            }
        }
    }
}
