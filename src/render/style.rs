use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke};

use crate::util::stable_hash;
use crate::viewport::Transform;

pub const BACKGROUND: Color32 = Color32::from_rgb(19, 23, 29);
pub const SELECTED: Color32 = Color32::from_rgb(245, 206, 93);
pub const HIGHLIGHT: Color32 = Color32::from_rgb(246, 137, 92);
pub const ACTIVE_RING: Color32 = Color32::from_rgb(255, 164, 101);
pub const OUTLINE: Color32 = Color32::from_rgba_premultiplied(15, 15, 15, 190);
pub const LABEL_TEXT: Color32 = Color32::from_gray(238);
pub const EDGE_LABEL_TEXT: Color32 = Color32::from_gray(190);
pub const EDGE_DEFAULT: Color32 = Color32::from_rgba_premultiplied(96, 104, 116, 200);
pub const EDGE_DIMMED: Color32 = Color32::from_rgba_premultiplied(40, 45, 52, 110);
pub const EDGE_HIGHLIGHT: Color32 = Color32::from_rgb(241, 146, 94);
pub const SELECTION_FILL: Color32 = Color32::from_rgba_premultiplied(40, 80, 120, 60);
pub const SELECTION_STROKE: Color32 = Color32::from_rgb(106, 198, 255);

const PALETTE: [Color32; 8] = [
    Color32::from_rgb(55, 150, 215),
    Color32::from_rgb(120, 190, 110),
    Color32::from_rgb(200, 120, 200),
    Color32::from_rgb(230, 170, 70),
    Color32::from_rgb(90, 200, 190),
    Color32::from_rgb(215, 95, 95),
    Color32::from_rgb(150, 150, 230),
    Color32::from_rgb(170, 170, 150),
];

/// Fill color for a node type. Common entity types have fixed colors; anything else
/// hashes into the palette.
pub fn type_color(node_type: &str) -> Color32 {
    match node_type {
        "person" => PALETTE[0],
        "device" => PALETTE[1],
        "account" => PALETTE[2],
        "location" => PALETTE[3],
        "organization" => PALETTE[4],
        "phone" => PALETTE[5],
        "email" => PALETTE[6],
        other => PALETTE[(stable_hash(other) % PALETTE.len() as u64) as usize],
    }
}

pub fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

pub fn dim_color(color: Color32, factor: f32) -> Color32 {
    let factor = factor.clamp(0.0, 1.0);
    Color32::from_rgba_unmultiplied(
        (color.r() as f32 * factor) as u8,
        (color.g() as f32 * factor) as u8,
        (color.b() as f32 * factor) as u8,
        (color.a() as f32 * (0.45 + (factor * 0.55))) as u8,
    )
}

/// Background fill plus a grid that pans and scales with the transform.
pub fn draw_background(painter: &Painter, rect: Rect, transform: Transform) {
    painter.rect_filled(rect, 0.0, BACKGROUND);

    let step = (56.0 * transform.k.clamp(0.6, 1.8)).max(20.0);
    let origin = rect.min + transform.translation();
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70));

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_colors_are_stable() {
        assert_eq!(type_color("person"), type_color("person"));
        assert_eq!(type_color("vehicle"), type_color("vehicle"));
        assert_ne!(type_color("person"), type_color("device"));
    }

    #[test]
    fn dimming_darkens() {
        let base = Color32::from_rgb(200, 100, 50);
        let dimmed = dim_color(base, 0.5);
        assert!(dimmed.r() < base.r() && dimmed.g() < base.g() && dimmed.a() < base.a());
        assert_eq!(blend_color(base, SELECTED, 0.0), base);
    }
}
