use eframe::egui::{self, RichText, Ui};
use linkchart::render::type_color;

use super::super::Workspace;

impl Workspace {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Selection Details");
        ui.add_space(6.0);

        let selected = self.view.selected_ids();
        let Some(focused) = self.view.focused_node().map(str::to_owned) else {
            if selected.is_empty() {
                ui.label("Select a node by clicking it or drawing a marquee.");
            } else {
                self.draw_selection_list(ui, &selected);
            }
            return;
        };

        let graph = self.view.graph();
        let Some(index) = graph.index_of(&focused) else {
            ui.label("Selected node no longer exists in the graph.");
            return;
        };
        let Some(node) = graph.node(index) else {
            return;
        };

        ui.label(RichText::new(node.label.as_str()).strong());
        ui.small(node.id.as_str());
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            ui.label("Type:");
            ui.colored_label(type_color(&node.node_type), node.node_type.as_str());
        });
        ui.label(format!("Connections: {}", graph.degree(index)));
        if let Some(position) = graph.position(index) {
            let pinned = graph.bodies()[index].fixed.is_some();
            ui.label(format!(
                "Position: ({:.0}, {:.0}){}",
                position.x,
                position.y,
                if pinned { " pinned" } else { "" }
            ));
        }

        let neighbors = graph
            .neighbors(index)
            .iter()
            .filter_map(|&neighbor| graph.node(neighbor))
            .map(|neighbor| (neighbor.id.clone(), neighbor.label.clone()))
            .collect::<Vec<_>>();

        ui.separator();
        ui.label(RichText::new("Neighbors").strong());
        if neighbors.is_empty() {
            ui.label("No connected nodes.");
            return;
        }

        let row_count = neighbors.len().min(self.neighbor_rows_visible);
        let mut should_load_more = false;
        let mut clicked = None;
        egui::ScrollArea::vertical()
            .id_salt("neighbor_scroll")
            .max_height(360.0)
            .auto_shrink([false, false])
            .show_rows(ui, 22.0, row_count, |ui, row_range| {
                if row_range.end + 4 >= row_count {
                    should_load_more = true;
                }
                for (id, label) in &neighbors[row_range] {
                    if ui.link(label.as_str()).on_hover_text(id.as_str()).clicked() {
                        clicked = Some(id.clone());
                    }
                }
            });

        if should_load_more && row_count < neighbors.len() {
            self.neighbor_rows_visible = (row_count + Self::NEIGHBOR_PAGE_ROWS).min(neighbors.len());
        }
        if let Some(id) = clicked {
            self.view.set_selection([id.clone()]);
            self.view.center_on_node(&id);
        }
    }

    fn draw_selection_list(&mut self, ui: &mut Ui, selected: &[String]) {
        ui.label(format!("{} nodes selected", selected.len()));
        if ui.button("Fit selection").clicked() {
            self.view.zoom_to_selection();
        }
        if ui.button("Clear selection").clicked() {
            self.view.clear_selection();
        }
        ui.separator();

        let mut clicked = None;
        egui::ScrollArea::vertical()
            .id_salt("selection_scroll")
            .max_height(420.0)
            .auto_shrink([false, false])
            .show_rows(ui, 22.0, selected.len(), |ui, row_range| {
                for id in &selected[row_range] {
                    let graph = self.view.graph();
                    let label = graph
                        .index_of(id)
                        .and_then(|index| graph.node(index))
                        .map_or(id.as_str(), |node| node.label.as_str());
                    if ui.link(label).on_hover_text(id.as_str()).clicked() {
                        clicked = Some(id.clone());
                    }
                }
            });
        if let Some(id) = clicked {
            self.view.center_on_node(&id);
        }
    }
}
