//! Layered layout for directed graphs: break cycles, rank by longest path from the
//! sources, order each rank by barycenter, then spread ranks over the viewport.

use std::collections::VecDeque;

use eframe::egui::{Vec2, vec2};

const MIN_RANK_GAP: f32 = 60.0;
const MAX_RANK_GAP: f32 = 160.0;
const MIN_NODE_GAP: f32 = 36.0;

pub struct Layering {
    pub ranks: Vec<usize>,
    pub layers: Vec<Vec<usize>>,
}

/// Drops the back edges found by a depth-first search so the rest forms a DAG.
fn acyclic_edges(node_count: usize, edges: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut outgoing = vec![Vec::new(); node_count];
    for &(source, target) in edges {
        if source < node_count && target < node_count && source != target {
            outgoing[source].push(target);
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnStack,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; node_count];
    let mut kept = Vec::with_capacity(edges.len());
    for root in 0..node_count {
        if marks[root] != Mark::Unvisited {
            continue;
        }

        let mut stack = vec![(root, 0usize)];
        marks[root] = Mark::OnStack;
        while let Some(&mut (node, ref mut cursor)) = stack.last_mut() {
            if let Some(&next) = outgoing[node].get(*cursor) {
                *cursor += 1;
                match marks[next] {
                    Mark::OnStack => {}
                    Mark::Done => kept.push((node, next)),
                    Mark::Unvisited => {
                        kept.push((node, next));
                        marks[next] = Mark::OnStack;
                        stack.push((next, 0));
                    }
                }
            } else {
                marks[node] = Mark::Done;
                stack.pop();
            }
        }
    }
    kept.sort_unstable();
    kept.dedup();
    kept
}

/// Longest-path ranking over a DAG using Kahn's topological order.
fn rank_nodes(node_count: usize, dag: &[(usize, usize)]) -> Vec<usize> {
    let mut outgoing = vec![Vec::new(); node_count];
    let mut indegree = vec![0usize; node_count];
    for &(source, target) in dag {
        outgoing[source].push(target);
        indegree[target] += 1;
    }

    let mut ranks = vec![0usize; node_count];
    let mut queue = (0..node_count)
        .filter(|&node| indegree[node] == 0)
        .collect::<VecDeque<_>>();
    while let Some(node) = queue.pop_front() {
        for &next in &outgoing[node] {
            ranks[next] = ranks[next].max(ranks[node] + 1);
            indegree[next] -= 1;
            if indegree[next] == 0 {
                queue.push_back(next);
            }
        }
    }
    ranks
}

/// Crossings between two adjacent layers for the edges spanning exactly one rank.
pub fn count_crossings(
    upper: &[usize],
    lower: &[usize],
    order_of: &[usize],
    dag: &[(usize, usize)],
    ranks: &[usize],
) -> usize {
    let Some(&first) = upper.first() else {
        return 0;
    };
    let upper_rank = ranks[first];
    let mut segments = dag
        .iter()
        .filter(|&&(source, target)| {
            ranks[source] == upper_rank && ranks[target] == upper_rank + 1
        })
        .map(|&(source, target)| (order_of[source], order_of[target]))
        .collect::<Vec<_>>();
    if lower.is_empty() || segments.len() < 2 {
        return 0;
    }
    segments.sort_unstable();

    let mut crossings = 0;
    for i in 0..segments.len() {
        for j in (i + 1)..segments.len() {
            if segments[i].0 != segments[j].0 && segments[i].1 > segments[j].1 {
                crossings += 1;
            }
        }
    }
    crossings
}

fn total_crossings(layers: &[Vec<usize>], order_of: &[usize], dag: &[(usize, usize)], ranks: &[usize]) -> usize {
    layers
        .windows(2)
        .map(|pair| count_crossings(&pair[0], &pair[1], order_of, dag, ranks))
        .sum()
}

fn refresh_order(layers: &[Vec<usize>], order_of: &mut [usize]) {
    for layer in layers {
        for (position, &node) in layer.iter().enumerate() {
            order_of[node] = position;
        }
    }
}

/// Reorders `layer` by the mean position of each node's neighbours in the fixed layer.
fn sort_by_barycenter(layer: &mut [usize], neighbours: &[Vec<usize>], order_of: &[usize]) {
    let mut keyed = layer
        .iter()
        .map(|&node| {
            let adjacent = &neighbours[node];
            let barycenter = if adjacent.is_empty() {
                order_of[node] as f32
            } else {
                adjacent.iter().map(|&other| order_of[other] as f32).sum::<f32>()
                    / adjacent.len() as f32
            };
            (barycenter, order_of[node], node)
        })
        .collect::<Vec<_>>();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    for (slot, (_, _, node)) in layer.iter_mut().zip(keyed) {
        *slot = node;
    }
}

pub fn layer(node_count: usize, edges: &[(usize, usize)]) -> Layering {
    let dag = acyclic_edges(node_count, edges);
    let ranks = rank_nodes(node_count, &dag);

    let rank_count = ranks.iter().copied().max().map_or(0, |max| max + 1);
    let mut layers = vec![Vec::new(); rank_count];
    for (node, &rank) in ranks.iter().enumerate() {
        layers[rank].push(node);
    }

    let mut predecessors = vec![Vec::new(); node_count];
    let mut successors = vec![Vec::new(); node_count];
    for &(source, target) in &dag {
        predecessors[target].push(source);
        successors[source].push(target);
    }

    let mut order_of = vec![0usize; node_count];
    refresh_order(&layers, &mut order_of);
    let mut best_layers = layers.clone();
    let mut best_crossings = total_crossings(&layers, &order_of, &dag, &ranks);

    // One downward and one upward sweep; keep whichever ordering crosses least.
    for rank in 1..layers.len() {
        sort_by_barycenter(&mut layers[rank], &predecessors, &order_of);
        refresh_order(&layers, &mut order_of);
    }
    let down = total_crossings(&layers, &order_of, &dag, &ranks);
    if down < best_crossings {
        best_crossings = down;
        best_layers = layers.clone();
    }

    for rank in (0..layers.len().saturating_sub(1)).rev() {
        sort_by_barycenter(&mut layers[rank], &successors, &order_of);
        refresh_order(&layers, &mut order_of);
    }
    let up = total_crossings(&layers, &order_of, &dag, &ranks);
    if up < best_crossings {
        best_layers = layers;
    }

    Layering {
        ranks,
        layers: best_layers,
    }
}

/// Positions for every node, ranks top to bottom, centred in `size`.
pub fn hierarchy_positions(node_count: usize, edges: &[(usize, usize)], size: Vec2) -> Vec<Vec2> {
    if node_count == 0 {
        return Vec::new();
    }

    let layering = layer(node_count, edges);
    let rank_count = layering.layers.len().max(1);
    let rank_gap = (size.y / (rank_count as f32 + 1.0)).clamp(MIN_RANK_GAP, MAX_RANK_GAP);
    let center = size * 0.5;
    let top = center.y - rank_gap * (rank_count as f32 - 1.0) * 0.5;

    let mut positions = vec![Vec2::ZERO; node_count];
    for (rank, nodes) in layering.layers.iter().enumerate() {
        let gap = (size.x / (nodes.len() as f32 + 1.0)).max(MIN_NODE_GAP);
        let left = center.x - gap * (nodes.len() as f32 - 1.0) * 0.5;
        for (slot, &node) in nodes.iter().enumerate() {
            positions[node] = vec2(left + gap * slot as f32, top + rank_gap * rank as f32);
        }
    }
    positions
}
