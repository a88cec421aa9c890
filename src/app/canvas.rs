use std::time::Duration;

use eframe::egui::{self, Align2, Color32, FontId, PointerButton as EguiButton, Sense, Ui, vec2};
use linkchart::interaction::{PointerButton, PointerInput};

use super::Workspace;

impl Workspace {
    pub(super) fn draw_canvas(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let now = ui.input(|input| input.time);
        let over_canvas = response.contains_pointer() || response.dragged();

        let pointer = ui.input(|input| {
            let button_event = |pressed: bool| {
                [
                    (EguiButton::Primary, PointerButton::Primary),
                    (EguiButton::Secondary, PointerButton::Secondary),
                ]
                .into_iter()
                .find(|&(button, _)| {
                    if pressed {
                        input.pointer.button_pressed(button)
                    } else {
                        input.pointer.button_released(button)
                    }
                })
                .map(|(_, ours)| ours)
            };
            PointerInput {
                hover: over_canvas
                    .then(|| input.pointer.latest_pos())
                    .flatten(),
                pressed: if response.contains_pointer() {
                    button_event(true)
                } else {
                    None
                },
                released: button_event(false),
                primary_down: input.pointer.primary_down(),
                scroll: if response.contains_pointer() {
                    input.smooth_scroll_delta.y
                } else {
                    0.0
                },
                zoom_factor: if response.contains_pointer() {
                    input.zoom_delta()
                } else {
                    1.0
                },
                modifiers: input.modifiers,
            }
        });

        self.view.handle_input(&pointer, now);
        match self.view.update(rect, now) {
            Ok(stats) => {
                if stats.animating || response.dragged() {
                    ui.ctx().request_repaint();
                } else if let Some(delay) = stats.repaint_after {
                    ui.ctx()
                        .request_repaint_after(Duration::from_secs_f64(delay.max(0.0)));
                }
                self.stats = Some(stats);
            }
            Err(error) => self.push_toast(format!("Rendering paused: {error}"), now),
        }

        let painter = ui.painter_at(rect);
        self.view.paint(&painter);

        if self.view.graph().is_empty() {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "No nodes to display",
                FontId::proportional(15.0),
                Color32::from_gray(170),
            );
            return;
        }

        if let Some(hover) = self.view.hover_info() {
            ui.output_mut(|output| {
                output.cursor_icon = egui::CursorIcon::PointingHand;
            });
            let panel_text = format!(
                "{}  |  {}  |  {} connections",
                hover.label, hover.node_type, hover.degree
            );
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                panel_text,
                FontId::proportional(13.0),
                Color32::from_gray(240),
            );
        }
    }
}
