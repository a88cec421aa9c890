use eframe::egui::{Vec2, vec2};

use super::quadtree::{Quadtree, ROOT};

/// Squared distance below which charge is clamped, so coincident bodies do not explode.
const MIN_CHARGE_DISTANCE_SQ: f32 = 1.0;

#[derive(Clone, Copy)]
pub(super) struct ChargeParams {
    /// Charge strength already scaled by alpha; negative repels.
    pub(super) strength: f32,
    pub(super) theta: f32,
}

#[derive(Clone, Copy)]
pub(super) struct CollisionParams {
    pub(super) strength: f32,
    pub(super) max_distance_sq: f32,
}

/// Direction used when two bodies sit on the same spot.
pub(super) fn jiggle(from: usize, to: usize) -> Vec2 {
    let angle = ((from as f32) * 0.618_034 + (to as f32) * 0.414_214) * std::f32::consts::TAU;
    vec2(angle.cos(), angle.sin()) * 1e-3
}

fn charge_between(point: Vec2, other: Vec2, mass: f32, strength: f32, jitter: Vec2) -> Vec2 {
    let mut delta = other - point;
    if delta.length_sq() <= f32::EPSILON {
        delta = jitter;
    }
    let distance_sq = delta.length_sq().max(MIN_CHARGE_DISTANCE_SQ);
    delta * (strength * mass / distance_sq)
}

/// Barnes-Hut charge on body `index`: a cell far enough away relative to its side acts
/// as one mass at its center.
pub(super) fn accumulate_charge(
    tree: &Quadtree,
    cell: usize,
    index: usize,
    positions: &[Vec2],
    params: ChargeParams,
    velocity: &mut Vec2,
) {
    let node = tree.cell(cell);
    if node.mass <= 0.0 {
        return;
    }

    let point = positions[index];
    if tree.is_leaf(cell) {
        for &other in tree.bodies(cell) {
            if other != index {
                *velocity += charge_between(
                    point,
                    positions[other],
                    1.0,
                    params.strength,
                    jiggle(index, other),
                );
            }
        }
        return;
    }

    let distance = (node.mass_center - point).length().max(1e-4);
    if node.mass > 1.0
        && !node.square.contains(point)
        && node.square.side() / distance < params.theta
    {
        *velocity += charge_between(point, node.mass_center, node.mass, params.strength, Vec2::ZERO);
        return;
    }

    for child in tree.children(cell) {
        accumulate_charge(tree, child, index, positions, params, velocity);
    }
}

fn resolve_overlap(
    from: usize,
    to: usize,
    positions: &[Vec2],
    radii: &[f32],
    params: CollisionParams,
    velocities: &mut [Vec2],
) {
    let delta = positions[from] - positions[to];
    let distance = delta.length();
    let min_distance = radii[from] + radii[to];
    if distance >= min_distance {
        return;
    }
    let direction = if distance > 1e-4 {
        delta / distance
    } else {
        jiggle(from, to) * 1e3
    };
    let push = (min_distance - distance) * params.strength * 0.5;
    velocities[from] += direction * push;
    velocities[to] -= direction * push;
}

/// Separates overlapping bodies. Each pair is resolved once, from its lower index,
/// skipping cells farther than `max_distance_sq` from the body.
pub(super) fn apply_collisions(
    tree: &Quadtree,
    positions: &[Vec2],
    radii: &[f32],
    params: CollisionParams,
    velocities: &mut [Vec2],
) {
    let mut stack = Vec::new();
    for index in 0..positions.len() {
        let point = positions[index];
        stack.clear();
        stack.push(ROOT);
        while let Some(cell) = stack.pop() {
            if tree.cell(cell).square.gap_sq(point) > params.max_distance_sq {
                continue;
            }
            if !tree.is_leaf(cell) {
                stack.extend(tree.children(cell));
                continue;
            }
            for &other in tree.bodies(cell) {
                if other > index {
                    resolve_overlap(index, other, positions, radii, params, velocities);
                }
            }
        }
    }
}

/// Spring toward `distance` along each link, split between the endpoints in
/// proportion to the other endpoint's degree.
pub(super) fn apply_links(
    links: &[(usize, usize)],
    degrees: &[usize],
    positions: &[Vec2],
    velocities: &mut [Vec2],
    distance: f32,
    strength: f32,
) {
    let node_count = positions.len();
    for &(source, target) in links {
        if source >= node_count || target >= node_count || source == target {
            continue;
        }

        let mut delta = (positions[target] + velocities[target]) - (positions[source] + velocities[source]);
        if delta.length_sq() <= f32::EPSILON {
            delta = jiggle(source, target);
        }
        let length = delta.length();
        let stretch = (length - distance) / length * strength;
        let correction = delta * stretch;

        let source_degree = degrees[source].max(1) as f32;
        let target_degree = degrees[target].max(1) as f32;
        let bias = source_degree / (source_degree + target_degree);

        velocities[target] -= correction * bias;
        velocities[source] += correction * (1.0 - bias);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_overlapping_pairs_are_pushed_apart() {
        let positions = vec![vec2(0.0, 0.0), vec2(4.0, 0.0), vec2(100.0, 0.0)];
        let radii = vec![5.0; 3];
        let tree = Quadtree::build(&positions).expect("finite positions");
        let mut velocities = vec![Vec2::ZERO; 3];
        apply_collisions(
            &tree,
            &positions,
            &radii,
            CollisionParams {
                strength: 1.0,
                max_distance_sq: 100.0,
            },
            &mut velocities,
        );

        assert!(velocities[0].x < 0.0);
        assert!(velocities[1].x > 0.0);
        assert_eq!(velocities[0], -velocities[1]);
        assert_eq!(velocities[2], Vec2::ZERO);
    }

    #[test]
    fn distant_cells_are_approximated() {
        let mut positions = (0..30)
            .map(|index| vec2(500.0 + (index % 6) as f32, 500.0 + (index / 6) as f32))
            .collect::<Vec<_>>();
        positions.push(vec2(0.0, 0.0));
        let lone = positions.len() - 1;
        let tree = Quadtree::build(&positions).expect("finite positions");

        let mut exact = Vec2::ZERO;
        accumulate_charge(
            &tree,
            ROOT,
            lone,
            &positions,
            ChargeParams {
                strength: -30.0,
                theta: 0.0,
            },
            &mut exact,
        );
        let mut approximate = Vec2::ZERO;
        accumulate_charge(
            &tree,
            ROOT,
            lone,
            &positions,
            ChargeParams {
                strength: -30.0,
                theta: 0.9,
            },
            &mut approximate,
        );

        assert!(exact.x < 0.0 && exact.y < 0.0);
        assert!((exact - approximate).length() < exact.length() * 0.05);
    }
}
