//! Arena quadtree over body indices. Cells live in one `Vec`; a split cell's four
//! children are stored next to each other, and every cell covers a contiguous run of
//! the reordered body index list.

use std::ops::Range;

use eframe::egui::{Vec2, vec2};

const LEAF_CAPACITY: usize = 12;
const MAX_DEPTH: u32 = 10;

pub(super) const ROOT: usize = 0;

/// Axis-aligned square given by its center and half side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct Square {
    pub(super) center: Vec2,
    pub(super) half: f32,
}

impl Square {
    fn enclosing(points: &[Vec2]) -> Option<Self> {
        let (min, max) = points.iter().fold(
            (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
            |(min, max), &point| (min.min(point), max.max(point)),
        );
        if !min.is_finite() || !max.is_finite() {
            return None;
        }
        Some(Self {
            center: (min + max) * 0.5,
            half: (max - min).max_elem().max(1.0) * 0.5 + 1.0,
        })
    }

    pub(super) fn contains(self, point: Vec2) -> bool {
        (point.x - self.center.x).abs() <= self.half && (point.y - self.center.y).abs() <= self.half
    }

    pub(super) fn side(self) -> f32 {
        self.half * 2.0
    }

    /// Squared gap between the square and `point`; zero inside.
    pub(super) fn gap_sq(self, point: Vec2) -> f32 {
        let dx = ((point.x - self.center.x).abs() - self.half).max(0.0);
        let dy = ((point.y - self.center.y).abs() - self.half).max(0.0);
        dx * dx + dy * dy
    }

    /// Bit 0 is east, bit 1 is south.
    fn quadrant_of(self, point: Vec2) -> usize {
        usize::from(point.x >= self.center.x) | usize::from(point.y >= self.center.y) << 1
    }

    fn quarter(self, quadrant: usize) -> Self {
        let half = self.half * 0.5;
        let dx = if quadrant & 1 == 0 { -half } else { half };
        let dy = if quadrant & 2 == 0 { -half } else { half };
        Self {
            center: self.center + vec2(dx, dy),
            half,
        }
    }
}

#[derive(Debug)]
pub(super) struct Cell {
    pub(super) square: Square,
    pub(super) mass_center: Vec2,
    /// Body count under the cell.
    pub(super) mass: f32,
    bodies: Range<usize>,
    first_child: Option<usize>,
}

pub(super) struct Quadtree {
    cells: Vec<Cell>,
    order: Vec<usize>,
}

impl Quadtree {
    /// `None` when any position is non-finite or there are none.
    pub(super) fn build(positions: &[Vec2]) -> Option<Self> {
        let square = Square::enclosing(positions)?;
        let mut tree = Self {
            cells: Vec::with_capacity(positions.len() / 2 + 1),
            order: (0..positions.len()).collect(),
        };
        tree.push_cell(square, 0..positions.len(), positions);
        tree.subdivide(ROOT, positions, 0);
        Some(tree)
    }

    fn push_cell(&mut self, square: Square, bodies: Range<usize>, positions: &[Vec2]) -> usize {
        let members = &self.order[bodies.clone()];
        let mass = members.len() as f32;
        let mass_center = if members.is_empty() {
            square.center
        } else {
            members.iter().fold(Vec2::ZERO, |sum, &index| sum + positions[index]) / mass
        };
        self.cells.push(Cell {
            square,
            mass_center,
            mass,
            bodies,
            first_child: None,
        });
        self.cells.len() - 1
    }

    fn subdivide(&mut self, cell: usize, positions: &[Vec2], depth: u32) {
        let Cell { square, bodies, .. } = &self.cells[cell];
        let (square, bodies) = (*square, bodies.clone());
        if depth >= MAX_DEPTH || bodies.len() <= LEAF_CAPACITY {
            return;
        }

        let mut counts = [0usize; 4];
        for &index in &self.order[bodies.clone()] {
            counts[square.quadrant_of(positions[index])] += 1;
        }
        // Coincident bodies cannot be told apart by splitting.
        if counts.iter().filter(|&&count| count > 0).count() <= 1 {
            return;
        }
        self.order[bodies.clone()].sort_by_key(|&index| square.quadrant_of(positions[index]));

        let mut start = bodies.start;
        let mut first_child = None;
        for (quadrant, count) in counts.into_iter().enumerate() {
            let child = self.push_cell(square.quarter(quadrant), start..start + count, positions);
            first_child.get_or_insert(child);
            start += count;
        }
        self.cells[cell].first_child = first_child;

        if let Some(first) = first_child {
            for child in first..first + 4 {
                self.subdivide(child, positions, depth + 1);
            }
        }
    }

    pub(super) fn cell(&self, cell: usize) -> &Cell {
        &self.cells[cell]
    }

    /// Child cell ids; empty for a leaf.
    pub(super) fn children(&self, cell: usize) -> Range<usize> {
        self.cells[cell]
            .first_child
            .map_or(0..0, |first| first..first + 4)
    }

    pub(super) fn is_leaf(&self, cell: usize) -> bool {
        self.cells[cell].first_child.is_none()
    }

    /// Body indices under `cell`.
    pub(super) fn bodies(&self, cell: usize) -> &[usize] {
        &self.order[self.cells[cell].bodies.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_bodies(tree: &Quadtree, cell: usize, out: &mut Vec<usize>) {
        if tree.is_leaf(cell) {
            out.extend_from_slice(tree.bodies(cell));
            return;
        }
        for child in tree.children(cell) {
            leaf_bodies(tree, child, out);
        }
    }

    #[test]
    fn every_body_lands_in_exactly_one_leaf() {
        let positions = (0..200)
            .map(|index| vec2((index % 20) as f32 * 13.0, (index / 20) as f32 * 7.0))
            .collect::<Vec<_>>();
        let tree = Quadtree::build(&positions).expect("finite positions");

        let mut seen = Vec::new();
        leaf_bodies(&tree, ROOT, &mut seen);
        seen.sort_unstable();
        assert_eq!(seen, (0..200).collect::<Vec<_>>());
        assert_eq!(tree.cell(ROOT).mass, 200.0);
    }

    #[test]
    fn children_cover_their_bodies() {
        let positions = (0..64)
            .map(|index| vec2((index * 37 % 101) as f32, (index * 53 % 89) as f32))
            .collect::<Vec<_>>();
        let tree = Quadtree::build(&positions).expect("finite positions");
        assert!(!tree.is_leaf(ROOT));

        for child in tree.children(ROOT) {
            let square = tree.cell(child).square;
            for &index in tree.bodies(child) {
                assert!(square.contains(positions[index]), "body {index} outside its cell");
            }
        }
    }

    #[test]
    fn coincident_bodies_stay_in_one_leaf() {
        let positions = vec![vec2(5.0, 5.0); 40];
        let tree = Quadtree::build(&positions).expect("finite positions");
        assert!(tree.is_leaf(ROOT));
        assert_eq!(tree.cell(ROOT).mass_center, vec2(5.0, 5.0));
    }

    #[test]
    fn non_finite_positions_build_nothing() {
        assert!(Quadtree::build(&[vec2(0.0, 0.0), vec2(f32::NAN, 1.0)]).is_none());
        assert!(Quadtree::build(&[]).is_none());
    }
}
