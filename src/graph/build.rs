use std::collections::HashMap;

use super::GraphEdge;

pub(super) fn adjacency(node_count: usize, edges: &[GraphEdge]) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
    let mut neighbors = vec![Vec::new(); node_count];
    let mut links = vec![Vec::new(); node_count];

    for (edge_index, edge) in edges.iter().enumerate() {
        if edge.source >= node_count || edge.target >= node_count {
            continue;
        }

        links[edge.source].push(edge_index);
        if edge.is_self_loop() {
            continue;
        }
        links[edge.target].push(edge_index);
        neighbors[edge.source].push(edge.target);
        neighbors[edge.target].push(edge.source);
    }

    for list in &mut neighbors {
        list.sort_unstable();
        list.dedup();
    }

    (neighbors, links)
}

/// Fans out edges that share an endpoint pair: the i-th of n parallel edges gets
/// `(i - (n - 1) / 2) * step`. Curvature is expressed relative to the pair's canonical
/// direction so reversed edges bend to the same side as their index dictates.
pub fn assign_curvature(edges: &mut [GraphEdge], step: f32) {
    let mut groups: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for (index, edge) in edges.iter().enumerate() {
        let key = (edge.source.min(edge.target), edge.source.max(edge.target));
        groups.entry(key).or_default().push(index);
    }

    for ((low, _high), members) in groups {
        let size = members.len();
        for (group_index, edge_index) in members.into_iter().enumerate() {
            let edge = &mut edges[edge_index];
            if size == 1 || edge.is_self_loop() {
                edge.curvature = if edge.is_self_loop() {
                    group_index as f32 * step
                } else {
                    0.0
                };
                continue;
            }

            let offset = (group_index as f32 - (size as f32 - 1.0) / 2.0) * step;
            edge.curvature = if edge.source == low { offset } else { -offset };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(source: usize, target: usize) -> GraphEdge {
        GraphEdge {
            source,
            target,
            label: None,
            curvature: 0.0,
        }
    }

    #[test]
    fn three_parallel_edges_are_symmetric() {
        let mut edges = vec![edge(0, 1), edge(0, 1), edge(0, 1)];
        assign_curvature(&mut edges, 0.25);

        let curvatures = edges.iter().map(|edge| edge.curvature).collect::<Vec<_>>();
        assert_eq!(curvatures, vec![-0.25, 0.0, 0.25]);
        assert!((curvatures.iter().sum::<f32>()).abs() < f32::EPSILON);
    }

    #[test]
    fn single_edge_is_straight() {
        let mut edges = vec![edge(0, 1), edge(1, 2)];
        assign_curvature(&mut edges, 0.25);
        assert!(edges.iter().all(|edge| edge.curvature == 0.0));
    }

    #[test]
    fn reversed_pair_fans_out_instead_of_overlapping() {
        let mut edges = vec![edge(0, 1), edge(1, 0)];
        assign_curvature(&mut edges, 0.5);
        // Seen from the canonical direction 0 -> 1 the two bends must differ.
        let canonical = [edges[0].curvature, -edges[1].curvature];
        assert_eq!(canonical, [-0.25, 0.25]);
    }

    #[test]
    fn adjacency_skips_self_loops_for_neighbors() {
        let edges = vec![edge(0, 0), edge(0, 1)];
        let (neighbors, links) = adjacency(2, &edges);
        assert_eq!(neighbors[0], vec![1]);
        assert_eq!(links[0], vec![0, 1]);
        assert_eq!(links[1], vec![1]);
    }
}
