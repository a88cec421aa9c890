use std::collections::{BTreeSet, HashSet};

use super::GraphModel;

/// Explicit selection plus the transient neighbourhood highlight derived from hover,
/// selection and search.
#[derive(Clone, Debug, Default)]
pub struct HighlightState {
    selected: BTreeSet<String>,
    focused: Option<String>,
    hovered: Option<usize>,
    search_matches: HashSet<usize>,
    highlighted_nodes: HashSet<usize>,
    highlighted_edges: HashSet<usize>,
}

impl HighlightState {
    pub fn selected(&self) -> &BTreeSet<String> {
        &self.selected
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub fn highlighted_nodes(&self) -> &HashSet<usize> {
        &self.highlighted_nodes
    }

    pub fn highlighted_edges(&self) -> &HashSet<usize> {
        &self.highlighted_edges
    }

    pub fn is_node_highlighted(&self, index: usize) -> bool {
        self.highlighted_nodes.contains(&index)
    }

    pub fn is_edge_highlighted(&self, index: usize) -> bool {
        self.highlighted_edges.contains(&index)
    }

    /// True while anything is highlighted; only then do unrelated items dim.
    pub fn is_active(&self) -> bool {
        !self.highlighted_nodes.is_empty()
    }

    /// Replaces the selection. Returns false when the set is unchanged.
    pub fn set_selected(&mut self, graph: &GraphModel, ids: impl IntoIterator<Item = String>) -> bool {
        let next = ids
            .into_iter()
            .filter(|id| graph.index_of(id).is_some())
            .collect::<BTreeSet<_>>();
        if next == self.selected {
            return false;
        }
        self.selected = next;
        self.recompute(graph);
        true
    }

    pub fn toggle_selected(&mut self, graph: &GraphModel, id: &str) -> bool {
        if graph.index_of(id).is_none() {
            return false;
        }
        if !self.selected.remove(id) {
            self.selected.insert(id.to_owned());
        }
        self.recompute(graph);
        true
    }

    pub fn set_focused(&mut self, id: Option<String>) {
        self.focused = id;
    }

    /// Returns true when the hovered node changed.
    pub fn set_hovered(&mut self, graph: &GraphModel, hovered: Option<usize>) -> bool {
        if self.hovered == hovered {
            return false;
        }
        self.hovered = hovered;
        self.recompute(graph);
        true
    }

    pub fn set_search_matches(&mut self, graph: &GraphModel, matches: HashSet<usize>) {
        if self.search_matches == matches {
            return;
        }
        self.search_matches = matches;
        self.recompute(graph);
    }

    /// Drops selection entries and indices that no longer exist after a data change.
    pub fn prune(&mut self, graph: &GraphModel) {
        self.selected.retain(|id| graph.index_of(id).is_some());
        if self
            .focused
            .as_deref()
            .is_some_and(|id| graph.index_of(id).is_none())
        {
            self.focused = None;
        }
        self.hovered = None;
        self.search_matches.clear();
        self.recompute(graph);
    }

    pub fn recompute(&mut self, graph: &GraphModel) {
        self.highlighted_nodes.clear();
        self.highlighted_edges.clear();

        let sources = self
            .hovered
            .into_iter()
            .chain(self.selected.iter().filter_map(|id| graph.index_of(id)))
            .collect::<Vec<_>>();
        for source in sources {
            collect_neighborhood(
                graph,
                source,
                &mut self.highlighted_nodes,
                &mut self.highlighted_edges,
            );
        }

        self.highlighted_nodes.extend(
            self.search_matches
                .iter()
                .copied()
                .filter(|&index| index < graph.node_count()),
        );
    }
}

fn collect_neighborhood(
    graph: &GraphModel,
    index: usize,
    nodes: &mut HashSet<usize>,
    edges: &mut HashSet<usize>,
) {
    if index >= graph.node_count() {
        return;
    }

    nodes.insert(index);
    nodes.extend(graph.neighbors(index).iter().copied());
    edges.extend(graph.links(index).iter().copied());
}
