//! Point-in-path and bounding-box tests shared by selection, hit-testing and label
//! collision.

use eframe::egui::{Pos2, Rect, Vec2, pos2, vec2};

pub fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    !(position.x + radius < rect.left()
        || position.x - radius > rect.right()
        || position.y + radius < rect.top()
        || position.y - radius > rect.bottom())
}

pub fn edge_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    let min_x = start.x.min(end.x) - padding;
    let max_x = start.x.max(end.x) + padding;
    let min_y = start.y.min(end.y) - padding;
    let max_y = start.y.max(end.y) + padding;

    if max_x < rect.left() || min_x > rect.right() || max_y < rect.top() || min_y > rect.bottom() {
        return false;
    }

    if rect.contains(start) || rect.contains(end) {
        return true;
    }

    let top_left = rect.left_top();
    let top_right = rect.right_top();
    let bottom_left = rect.left_bottom();
    let bottom_right = rect.right_bottom();

    segments_intersect(start, end, top_left, top_right)
        || segments_intersect(start, end, top_right, bottom_right)
        || segments_intersect(start, end, bottom_right, bottom_left)
        || segments_intersect(start, end, bottom_left, top_left)
}

pub fn segments_intersect(a1: Pos2, a2: Pos2, b1: Pos2, b2: Pos2) -> bool {
    fn cross(o: Pos2, a: Pos2, b: Pos2) -> f32 {
        let oa = a - o;
        let ob = b - o;
        (oa.x * ob.y) - (oa.y * ob.x)
    }

    let a_min_x = a1.x.min(a2.x);
    let a_max_x = a1.x.max(a2.x);
    let a_min_y = a1.y.min(a2.y);
    let a_max_y = a1.y.max(a2.y);
    let b_min_x = b1.x.min(b2.x);
    let b_max_x = b1.x.max(b2.x);
    let b_min_y = b1.y.min(b2.y);
    let b_max_y = b1.y.max(b2.y);

    if a_max_x < b_min_x || b_max_x < a_min_x || a_max_y < b_min_y || b_max_y < a_min_y {
        return false;
    }

    let c1 = cross(a1, a2, b1);
    let c2 = cross(a1, a2, b2);
    let c3 = cross(b1, b2, a1);
    let c4 = cross(b1, b2, a2);

    (c1 <= 0.0 && c2 >= 0.0 || c1 >= 0.0 && c2 <= 0.0)
        && (c3 <= 0.0 && c4 >= 0.0 || c3 >= 0.0 && c4 <= 0.0)
}

/// Even-odd ray casting. The polygon is treated as implicitly closed.
pub fn point_in_polygon(point: Pos2, polygon: &[Pos2]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut previous = polygon[polygon.len() - 1];
    for &current in polygon {
        let crosses = (current.y > point.y) != (previous.y > point.y);
        if crosses {
            let t = (point.y - current.y) / (previous.y - current.y);
            let x_at = current.x + t * (previous.x - current.x);
            if point.x < x_at {
                inside = !inside;
            }
        }
        previous = current;
    }
    inside
}

fn cross(o: Pos2, a: Pos2, b: Pos2) -> f32 {
    let oa = a - o;
    let ob = b - o;
    oa.x * ob.y - oa.y * ob.x
}

fn twice_signed_area(polygon: &[Pos2]) -> f32 {
    let mut previous = polygon[polygon.len() - 1];
    let mut sum = 0.0;
    for &current in polygon {
        sum += previous.x * current.y - current.x * previous.y;
        previous = current;
    }
    sum
}

fn in_triangle(point: Pos2, a: Pos2, b: Pos2, c: Pos2) -> bool {
    cross(a, b, point) >= 0.0 && cross(b, c, point) >= 0.0 && cross(c, a, point) >= 0.0
}

/// Ear-clipping triangulation of a polygon outline, as index triples into `polygon`.
/// A self-intersecting outline yields the triangles found before clipping stalls.
pub fn triangulate(polygon: &[Pos2]) -> Vec<[usize; 3]> {
    if polygon.len() < 3 {
        return Vec::new();
    }

    let mut remaining = (0..polygon.len()).collect::<Vec<_>>();
    if twice_signed_area(polygon) < 0.0 {
        remaining.reverse();
    }

    let mut triangles = Vec::with_capacity(polygon.len() - 2);
    let mut cursor = 0;
    let mut misses = 0;
    while remaining.len() > 3 && misses < remaining.len() {
        let len = remaining.len();
        let prev = remaining[(cursor + len - 1) % len];
        let current = remaining[cursor];
        let next = remaining[(cursor + 1) % len];
        let (a, b, c) = (polygon[prev], polygon[current], polygon[next]);

        let is_ear = cross(a, b, c) > 0.0
            && !remaining
                .iter()
                .filter(|&&index| index != prev && index != current && index != next)
                .any(|&index| in_triangle(polygon[index], a, b, c));
        if is_ear {
            triangles.push([prev, current, next]);
            remaining.remove(cursor);
            misses = 0;
        } else {
            cursor += 1;
            misses += 1;
        }
        cursor %= remaining.len();
    }

    if let [a, b, c] = remaining[..]
        && cross(polygon[a], polygon[b], polygon[c]) > 0.0
    {
        triangles.push([a, b, c]);
    }
    triangles
}

/// Corners of the axis-aligned square of half side `half` centred on `center`.
pub fn square_corners(center: Pos2, half: f32) -> [Pos2; 4] {
    [
        pos2(center.x - half, center.y - half),
        pos2(center.x + half, center.y - half),
        pos2(center.x + half, center.y + half),
        pos2(center.x - half, center.y + half),
    ]
}

/// Strict overlap: rectangles that only touch along an edge do not overlap.
pub fn rects_overlap(a: Rect, b: Rect) -> bool {
    a.min.x < b.max.x && b.min.x < a.max.x && a.min.y < b.max.y && b.min.y < a.max.y
}

pub fn point_segment_distance(point: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let length_sq = ab.length_sq();
    if length_sq <= f32::EPSILON {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / length_sq).clamp(0.0, 1.0);
    point.distance(a + ab * t)
}

pub fn quadratic_point(start: Pos2, control: Pos2, end: Pos2, t: f32) -> Pos2 {
    let inverse = 1.0 - t;
    let x = inverse * inverse * start.x + 2.0 * inverse * t * control.x + t * t * end.x;
    let y = inverse * inverse * start.y + 2.0 * inverse * t * control.y + t * t * end.y;
    pos2(x, y)
}

/// Distance from `point` to a quadratic curve, approximated by `segments` chords.
pub fn point_curve_distance(
    point: Pos2,
    start: Pos2,
    control: Pos2,
    end: Pos2,
    segments: usize,
) -> f32 {
    let segments = segments.max(1);
    let mut best = f32::INFINITY;
    let mut previous = start;
    for step in 1..=segments {
        let next = quadratic_point(start, control, end, step as f32 / segments as f32);
        best = best.min(point_segment_distance(point, previous, next));
        previous = next;
    }
    best
}

/// Control point that bends the segment `start -> end` sideways by `curvature * length`.
pub fn curve_control(start: Pos2, end: Pos2, curvature: f32) -> Pos2 {
    let delta = end - start;
    let mid = start + delta * 0.5;
    let normal = vec2(-delta.y, delta.x);
    mid + normal * curvature
}

pub fn bounds_of(points: impl IntoIterator<Item = Vec2>) -> Option<Rect> {
    let mut min = vec2(f32::INFINITY, f32::INFINITY);
    let mut max = vec2(f32::NEG_INFINITY, f32::NEG_INFINITY);

    for point in points {
        if !point.x.is_finite() || !point.y.is_finite() {
            continue;
        }
        min.x = min.x.min(point.x);
        min.y = min.y.min(point.y);
        max.x = max.x.max(point.x);
        max.y = max.y.max(point.y);
    }

    if !min.x.is_finite() || !min.y.is_finite() {
        return None;
    }

    Some(Rect::from_min_max(min.to_pos2(), max.to_pos2()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f32) -> Vec<Pos2> {
        vec![
            pos2(0.0, 0.0),
            pos2(size, 0.0),
            pos2(size, size),
            pos2(0.0, size),
        ]
    }

    #[test]
    fn point_in_polygon_square() {
        let polygon = square(10.0);
        assert!(point_in_polygon(pos2(5.0, 5.0), &polygon));
        assert!(!point_in_polygon(pos2(15.0, 5.0), &polygon));
        assert!(!point_in_polygon(pos2(-1.0, -1.0), &polygon));
    }

    #[test]
    fn point_in_polygon_concave_notch() {
        // U shape opening upwards; the notch is outside.
        let polygon = vec![
            pos2(0.0, 0.0),
            pos2(3.0, 0.0),
            pos2(3.0, 8.0),
            pos2(7.0, 8.0),
            pos2(7.0, 0.0),
            pos2(10.0, 0.0),
            pos2(10.0, 10.0),
            pos2(0.0, 10.0),
        ];
        assert!(!point_in_polygon(pos2(5.0, 4.0), &polygon));
        assert!(point_in_polygon(pos2(1.5, 4.0), &polygon));
        assert!(point_in_polygon(pos2(5.0, 9.0), &polygon));
    }

    fn triangle_area(polygon: &[Pos2], [a, b, c]: [usize; 3]) -> f32 {
        cross(polygon[a], polygon[b], polygon[c]).abs() * 0.5
    }

    #[test]
    fn triangulation_covers_a_concave_outline() {
        // U shape, drawn clockwise on screen.
        let outline = vec![
            pos2(0.0, 0.0),
            pos2(10.0, 0.0),
            pos2(10.0, 30.0),
            pos2(20.0, 30.0),
            pos2(20.0, 0.0),
            pos2(30.0, 0.0),
            pos2(30.0, 40.0),
            pos2(0.0, 40.0),
        ];
        let triangles = triangulate(&outline);
        assert_eq!(triangles.len(), outline.len() - 2);

        let area = triangles
            .iter()
            .map(|&triangle| triangle_area(&outline, triangle))
            .sum::<f32>();
        assert!((area - (30.0 * 40.0 - 10.0 * 30.0)).abs() < 1e-3);

        // Nothing is filled inside the notch.
        let notch = pos2(15.0, 10.0);
        assert!(!triangles.iter().any(|&[a, b, c]| {
            let (a, b, c) = (outline[a], outline[b], outline[c]);
            let sign = cross(a, b, c).signum();
            cross(a, b, notch) * sign > 0.0
                && cross(b, c, notch) * sign > 0.0
                && cross(c, a, notch) * sign > 0.0
        }));
    }

    #[test]
    fn short_outlines_have_no_triangles() {
        assert!(triangulate(&[pos2(0.0, 0.0), pos2(1.0, 1.0)]).is_empty());
    }

    #[test]
    fn degenerate_polygon_contains_nothing() {
        assert!(!point_in_polygon(pos2(0.0, 0.0), &[pos2(0.0, 0.0), pos2(1.0, 1.0)]));
    }

    #[test]
    fn touching_rects_do_not_overlap() {
        let a = Rect::from_min_max(pos2(0.0, 0.0), pos2(10.0, 10.0));
        let b = Rect::from_min_max(pos2(10.0, 0.0), pos2(20.0, 10.0));
        let c = Rect::from_min_max(pos2(9.0, 9.0), pos2(20.0, 20.0));
        assert!(!rects_overlap(a, b));
        assert!(rects_overlap(a, c));
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let distance = point_segment_distance(pos2(-3.0, 4.0), pos2(0.0, 0.0), pos2(10.0, 0.0));
        assert!((distance - 5.0).abs() < 1e-4);
    }

    #[test]
    fn straight_curve_matches_segment() {
        let start = pos2(0.0, 0.0);
        let end = pos2(10.0, 0.0);
        let control = curve_control(start, end, 0.0);
        let distance = point_curve_distance(pos2(5.0, 2.0), start, control, end, 8);
        assert!((distance - 2.0).abs() < 1e-4);
    }

    #[test]
    fn bounds_skip_non_finite_points() {
        let bounds = bounds_of([vec2(1.0, 2.0), vec2(f32::NAN, 0.0), vec2(-3.0, 5.0)])
            .expect("finite points present");
        assert_eq!(bounds.min, pos2(-3.0, 2.0));
        assert_eq!(bounds.max, pos2(1.0, 5.0));
        assert!(bounds_of(std::iter::empty()).is_none());
    }

    #[test]
    fn offscreen_edge_is_culled() {
        let rect = Rect::from_min_max(pos2(0.0, 0.0), pos2(100.0, 100.0));
        assert!(!edge_visible(rect, pos2(200.0, 0.0), pos2(300.0, 50.0), 2.0));
        assert!(edge_visible(rect, pos2(-50.0, 50.0), pos2(150.0, 50.0), 2.0));
    }
}
