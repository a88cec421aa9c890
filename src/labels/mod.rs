//! Label decluttering: choose a non-overlapping subset of node labels, most important
//! first.

use std::collections::{HashMap, HashSet};

use eframe::egui::{Pos2, Rect, Vec2, pos2, vec2};

use crate::config::LabelConfig;
use crate::spatial::rects_overlap;

mod schedule;

pub use schedule::LabelScheduler;

const DEGREE_WEIGHT: f32 = 0.7;
const CENTER_WEIGHT: f32 = 0.3;
/// Average glyph advance as a fraction of the font size.
const GLYPH_WIDTH: f32 = 0.6;
const LINE_HEIGHT: f32 = 1.3;

/// A label that could be shown. `anchor` is the top-center of the text box on screen.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelCandidate {
    pub index: usize,
    pub anchor: Pos2,
    pub size: Vec2,
    pub degree: usize,
    /// Selected or highlighted: shown regardless of collisions.
    pub forced: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabelBox {
    pub index: usize,
    pub center_x: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub priority: f32,
}

impl LabelBox {
    pub fn rect(&self) -> Rect {
        Rect::from_min_size(
            pos2(self.center_x - self.width * 0.5, self.top),
            vec2(self.width, self.height),
        )
    }

    fn padded(&self, margin: f32) -> Rect {
        self.rect().expand(margin.max(0.0))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclutterMode {
    /// Pairwise tests against every placed label.
    Exact,
    /// Grid cells; a placed label blocks its cell and the eight around it.
    Hashed,
}

#[derive(Clone, Debug)]
pub struct LabelPlacement {
    pub mode: DeclutterMode,
    pub placed: Vec<LabelBox>,
    pub rejected: usize,
}

impl LabelPlacement {
    pub fn contains(&self, index: usize) -> bool {
        self.placed.iter().any(|placed| placed.index == index)
    }
}

/// Approximate on-screen size of `text` without a font system.
pub fn estimate_size(text: &str, config: &LabelConfig) -> Vec2 {
    let font = config.font_size() * config.label_size_pct.max(10.0) / 100.0;
    let chars = text.chars().count().max(1) as f32;
    vec2(chars * font * GLYPH_WIDTH, font * LINE_HEIGHT)
}

/// `0.7 * degree / max_degree + 0.3 * normalized(1 / (1 + distance to center))`.
pub fn priorities(candidates: &[LabelCandidate], center: Pos2) -> Vec<f32> {
    let max_degree = candidates
        .iter()
        .map(|candidate| candidate.degree)
        .max()
        .unwrap_or(0);
    let closeness = candidates
        .iter()
        .map(|candidate| 1.0 / (1.0 + candidate.anchor.distance(center)))
        .collect::<Vec<_>>();
    let (min_close, max_close) = closeness
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &value| {
            (lo.min(value), hi.max(value))
        });
    let close_span = max_close - min_close;

    candidates
        .iter()
        .zip(closeness)
        .map(|(candidate, close)| {
            let degree = if max_degree == 0 {
                0.0
            } else {
                candidate.degree as f32 / max_degree as f32
            };
            let close = if close_span > f32::EPSILON {
                (close - min_close) / close_span
            } else {
                1.0
            };
            DEGREE_WEIGHT * degree + CENTER_WEIGHT * close
        })
        .collect()
}

type Cell = (i32, i32);

struct CellGrid {
    size: f32,
    occupied: HashSet<Cell>,
    boxes: HashMap<Cell, Vec<Rect>>,
}

impl CellGrid {
    fn new(size: f32) -> Self {
        Self {
            size: size.max(4.0),
            occupied: HashSet::new(),
            boxes: HashMap::new(),
        }
    }

    fn cell_of(&self, point: Pos2) -> Cell {
        (
            (point.x / self.size).floor() as i32,
            (point.y / self.size).floor() as i32,
        )
    }

    fn cells_spanned(&self, rect: Rect) -> impl Iterator<Item = Cell> + use<> {
        let (x0, y0) = self.cell_of(rect.min);
        let (x1, y1) = self.cell_of(rect.max);
        (x0..=x1).flat_map(move |x| (y0..=y1).map(move |y| (x, y)))
    }

    fn collides(&self, rect: Rect) -> bool {
        self.cells_spanned(rect).any(|cell| {
            self.boxes
                .get(&cell)
                .is_some_and(|rects| rects.iter().any(|other| rects_overlap(rect, *other)))
        })
    }

    fn insert(&mut self, rect: Rect) {
        let (cx, cy) = self.cell_of(rect.center());
        for dx in -1..=1 {
            for dy in -1..=1 {
                self.occupied.insert((cx + dx, cy + dy));
            }
        }
        for cell in self.cells_spanned(rect) {
            self.boxes.entry(cell).or_default().push(rect);
        }
    }
}

/// Places forced labels unconditionally, then the rest by descending priority as long
/// as their padded box overlaps nothing already placed and the label cap allows.
pub fn select_labels(
    candidates: &[LabelCandidate],
    center: Pos2,
    config: &LabelConfig,
) -> LabelPlacement {
    let mode = if candidates.len() < config.exact_threshold {
        DeclutterMode::Exact
    } else {
        DeclutterMode::Hashed
    };

    let scores = priorities(candidates, center);
    let boxes = candidates
        .iter()
        .zip(&scores)
        .map(|(candidate, &priority)| LabelBox {
            index: candidate.index,
            center_x: candidate.anchor.x,
            top: candidate.anchor.y,
            width: candidate.size.x,
            height: candidate.size.y,
            priority,
        })
        .collect::<Vec<_>>();

    let mut order = (0..boxes.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| {
        candidates[b]
            .forced
            .cmp(&candidates[a].forced)
            .then(boxes[b].priority.total_cmp(&boxes[a].priority))
            .then(boxes[a].index.cmp(&boxes[b].index))
    });

    let forced_count = candidates.iter().filter(|candidate| candidate.forced).count();
    let mut budget = config.max_labels.saturating_sub(forced_count);
    let margin = config.margin;

    let mut placed = Vec::new();
    let mut placed_rects = Vec::new();
    let mut grid = CellGrid::new(config.cell_size);
    let mut rejected = 0;

    for slot in order {
        let label = boxes[slot];
        let rect = label.padded(margin);

        if !candidates[slot].forced {
            if budget == 0 {
                rejected += 1;
                continue;
            }
            let blocked = match mode {
                DeclutterMode::Exact => placed_rects
                    .iter()
                    .any(|other: &Rect| rects_overlap(rect, *other)),
                DeclutterMode::Hashed => {
                    grid.occupied.contains(&grid.cell_of(rect.center())) || grid.collides(rect)
                }
            };
            if blocked {
                rejected += 1;
                continue;
            }
            budget -= 1;
        }

        match mode {
            DeclutterMode::Exact => placed_rects.push(rect),
            DeclutterMode::Hashed => grid.insert(rect),
        }
        placed.push(label);
    }

    LabelPlacement {
        mode,
        placed,
        rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::stable_pair;

    fn scattered(count: usize, config: &LabelConfig) -> Vec<LabelCandidate> {
        (0..count)
            .map(|index| {
                let (x, y) = stable_pair(&format!("node-{index}"));
                LabelCandidate {
                    index,
                    anchor: pos2(800.0 + x * 780.0, 600.0 + y * 580.0),
                    size: estimate_size(&format!("Entity {index}"), config),
                    degree: index % 7,
                    forced: false,
                }
            })
            .collect()
    }

    /// Placed labels keep at least `margin` of clearance on every side.
    fn assert_no_overlap(placement: &LabelPlacement, margin: f32) {
        for (i, a) in placement.placed.iter().enumerate() {
            for b in &placement.placed[i + 1..] {
                assert!(
                    !rects_overlap(a.padded(margin), b.padded(margin)),
                    "labels {} and {} overlap",
                    a.index,
                    b.index
                );
            }
        }
    }

    #[test]
    fn labels_never_overlap_at_any_scale() {
        let config = LabelConfig::default();
        for (count, mode) in [
            (10, DeclutterMode::Exact),
            (500, DeclutterMode::Hashed),
            (5000, DeclutterMode::Hashed),
        ] {
            let candidates = scattered(count, &config);
            let placement = select_labels(&candidates, pos2(800.0, 600.0), &config);
            assert_eq!(placement.mode, mode);
            assert!(!placement.placed.is_empty());
            assert!(placement.placed.len() <= config.max_labels);
            assert_eq!(placement.placed.len() + placement.rejected, count);
            assert_no_overlap(&placement, config.margin);
        }
    }

    #[test]
    fn forced_labels_are_always_shown() {
        let config = LabelConfig {
            max_labels: 2,
            ..LabelConfig::default()
        };
        let mut candidates = (0..6)
            .map(|index| LabelCandidate {
                index,
                anchor: pos2(100.0, 100.0),
                size: vec2(60.0, 14.0),
                degree: 10 - index,
                forced: index >= 3,
            })
            .collect::<Vec<_>>();
        candidates.extend(scattered(600, &config).into_iter().map(|mut candidate| {
            candidate.index += 100;
            candidate
        }));

        for threshold in [10_000, 1] {
            let config = LabelConfig {
                exact_threshold: threshold,
                ..config
            };
            let placement = select_labels(&candidates, pos2(100.0, 100.0), &config);
            for forced in 3..6 {
                assert!(placement.contains(forced), "forced label {forced} missing");
            }
            assert!(!placement.contains(0));
        }
    }

    #[test]
    fn higher_priority_wins_a_collision() {
        let config = LabelConfig::default();
        let candidates = vec![
            LabelCandidate {
                index: 0,
                anchor: pos2(100.0, 100.0),
                size: vec2(80.0, 16.0),
                degree: 1,
                forced: false,
            },
            LabelCandidate {
                index: 1,
                anchor: pos2(110.0, 104.0),
                size: vec2(80.0, 16.0),
                degree: 9,
                forced: false,
            },
        ];
        let placement = select_labels(&candidates, pos2(0.0, 0.0), &config);
        assert!(placement.contains(1));
        assert!(!placement.contains(0));
    }

    #[test]
    fn priority_mixes_degree_and_centrality() {
        let candidates = vec![
            LabelCandidate {
                index: 0,
                anchor: pos2(0.0, 0.0),
                size: Vec2::ZERO,
                degree: 4,
                forced: false,
            },
            LabelCandidate {
                index: 1,
                anchor: pos2(300.0, 0.0),
                size: Vec2::ZERO,
                degree: 2,
                forced: false,
            },
        ];
        let scores = priorities(&candidates, pos2(0.0, 0.0));
        assert!((scores[0] - 1.0).abs() < 1e-6);
        assert!((scores[1] - 0.35).abs() < 1e-6);
    }
}
