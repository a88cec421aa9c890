use eframe::egui::{Vec2, vec2};

/// Places `count` nodes on a `ceil(sqrt(count))`-column grid filling `size`, row by
/// row in input order.
pub fn grid_positions(count: usize, size: Vec2) -> Vec<Vec2> {
    if count == 0 {
        return Vec::new();
    }

    let columns = (count as f32).sqrt().ceil().max(1.0) as usize;
    let rows = count.div_ceil(columns);
    let cell_width = size.x.max(1.0) / columns as f32;
    let cell_height = size.y.max(1.0) / rows as f32;

    (0..count)
        .map(|index| {
            let column = index % columns;
            let row = index / columns;
            vec2(
                (column as f32 + 0.5) * cell_width,
                (row as f32 + 0.5) * cell_height,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_is_idempotent() {
        let size = vec2(1024.0, 768.0);
        assert_eq!(grid_positions(37, size), grid_positions(37, size));
    }

    #[test]
    fn grid_fills_viewport_with_square_columns() {
        let positions = grid_positions(10, vec2(400.0, 400.0));
        // ceil(sqrt(10)) = 4 columns, 3 rows.
        assert_eq!(positions[0], vec2(50.0, 400.0 / 6.0));
        assert_eq!(positions[3].x, 350.0);
        assert_eq!(positions[4].x, 50.0);
        assert!(positions.iter().all(|pos| pos.x > 0.0 && pos.x < 400.0));
        assert!(positions.iter().all(|pos| pos.y > 0.0 && pos.y < 400.0));
    }

    #[test]
    fn empty_grid() {
        assert!(grid_positions(0, vec2(100.0, 100.0)).is_empty());
    }
}
