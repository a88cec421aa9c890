use linkchart::interaction::{ClickTarget, GraphEvent, PointerButton};

use super::Workspace;

/// Host-side name of the callback an event stands for.
fn callback_name(target: &ClickTarget, button: PointerButton) -> &'static str {
    match (target, button) {
        (ClickTarget::Node { .. }, PointerButton::Primary) => "node click",
        (ClickTarget::Node { .. }, PointerButton::Secondary) => "node right-click",
        (ClickTarget::Edge { .. }, PointerButton::Primary) => "edge click",
        (ClickTarget::Edge { .. }, PointerButton::Secondary) => "edge right-click",
        (ClickTarget::Background, PointerButton::Primary) => "background click",
        (ClickTarget::Background, PointerButton::Secondary) => "background right-click",
    }
}

pub(in crate::app) fn describe(event: &GraphEvent) -> Option<String> {
    match event {
        GraphEvent::Click { target, pointer } => {
            let name = callback_name(target, pointer.button);
            let subject = match target {
                ClickTarget::Node { id } => format!(" on {id}"),
                ClickTarget::Edge { source, target, .. } => format!(" on {source} -> {target}"),
                ClickTarget::Background => String::new(),
            };
            Some(format!(
                "{name}{subject} at ({:.0}, {:.0})",
                pointer.world.x, pointer.world.y
            ))
        }
        GraphEvent::SelectionChanged { ids, focused } => Some(match focused {
            Some(id) => format!("selected {id}"),
            None => format!("selected {} node(s)", ids.len()),
        }),
        GraphEvent::DragEnd { node, pointer } => Some(format!(
            "moved {node} to ({:.0}, {:.0})",
            pointer.world.x, pointer.world.y
        )),
        GraphEvent::Hover { .. } | GraphEvent::DragStart { .. } | GraphEvent::DragMove { .. } => {
            None
        }
    }
}

impl Workspace {
    pub(in crate::app) fn drain_events(&mut self) {
        for event in self.events.try_iter().collect::<Vec<_>>() {
            if event.is_context_request() {
                // Context menus belong to the embedding application.
                log::info!("context menu requested: {event:?}");
            }
            if matches!(event, GraphEvent::SelectionChanged { .. }) {
                self.neighbor_rows_visible = Self::INITIAL_NEIGHBOR_ROWS;
            }
            if let Some(text) = describe(&event) {
                log::debug!("{text}");
                self.last_event = Some(text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::{Modifiers, Vec2, pos2, vec2};
    use linkchart::interaction::PointerInfo;

    fn pointer(button: PointerButton, world: Vec2) -> PointerInfo {
        PointerInfo {
            screen: pos2(0.0, 0.0),
            world,
            button,
            modifiers: Modifiers::default(),
        }
    }

    #[test]
    fn clicks_map_to_six_callbacks() {
        let targets = [
            ClickTarget::Node { id: "a".to_owned() },
            ClickTarget::Edge {
                index: 0,
                source: "a".to_owned(),
                target: "b".to_owned(),
            },
            ClickTarget::Background,
        ];
        let mut names = Vec::new();
        for target in &targets {
            for button in [PointerButton::Primary, PointerButton::Secondary] {
                names.push(callback_name(target, button));
            }
        }
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 6);
    }

    #[test]
    fn describes_edge_clicks_with_endpoints() {
        let event = GraphEvent::Click {
            target: ClickTarget::Edge {
                index: 2,
                source: "a".to_owned(),
                target: "b".to_owned(),
            },
            pointer: pointer(PointerButton::Primary, vec2(10.4, -3.0)),
        };
        assert_eq!(
            describe(&event).as_deref(),
            Some("edge click on a -> b at (10, -3)")
        );
        assert_eq!(describe(&GraphEvent::Hover { node: None }), None);
    }
}
