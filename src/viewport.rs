//! Camera for one graph instance: a `{k, x, y}` transform mapping world space onto the
//! canvas, animated transitions, and change notifications.

use std::sync::mpsc::{self, Receiver, Sender};

use eframe::egui::{Pos2, Rect, Vec2, vec2};

pub const MIN_ZOOM: f32 = 0.05;
pub const MAX_ZOOM: f32 = 12.0;
/// Fitting a tiny graph never zooms in further than this.
pub const MAX_FIT_ZOOM: f32 = 3.0;
pub const ZOOM_STEP: f32 = 1.4;
pub const FIT_PADDING: f32 = 48.0;
pub const ANIMATION_SECS: f64 = 0.35;

/// `screen = canvas.min + (x, y) + world * k`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub k: f32,
    pub x: f32,
    pub y: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            k: 1.0,
            x: 0.0,
            y: 0.0,
        }
    }
}

impl Transform {
    pub fn translation(&self) -> Vec2 {
        vec2(self.x, self.y)
    }

    fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            k: self.k + (other.k - self.k) * t,
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Rescales to `k` keeping the world point under `anchor` (canvas-local) fixed.
    fn zoomed_at(self, k: f32, anchor: Vec2) -> Self {
        let world = (anchor - self.translation()) / self.k;
        let translation = anchor - world * k;
        Self {
            k,
            x: translation.x,
            y: translation.y,
        }
    }
}

pub fn clamp_zoom(k: f32) -> f32 {
    if k.is_finite() {
        k.clamp(MIN_ZOOM, MAX_ZOOM)
    } else {
        1.0
    }
}

fn ease_in_out_cubic(t: f32) -> f32 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

struct Animation {
    from: Transform,
    to: Transform,
    /// Set on the first tick so callers need no clock when requesting a transition.
    started_at: Option<f64>,
}

pub struct Viewport {
    canvas: Option<Rect>,
    transform: Transform,
    animation: Option<Animation>,
    pending_fit: Option<Rect>,
    drag_locked: bool,
    revision: u64,
    subscribers: Vec<Sender<Transform>>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new()
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self {
            canvas: None,
            transform: Transform::default(),
            animation: None,
            pending_fit: None,
            drag_locked: false,
            revision: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn canvas(&self) -> Option<Rect> {
        self.canvas
    }

    /// Records the canvas rect. A fit requested before the size was known runs now.
    pub fn set_canvas(&mut self, canvas: Rect) {
        if !canvas.is_finite() || canvas.width() <= 0.0 || canvas.height() <= 0.0 {
            return;
        }
        if self.canvas == Some(canvas) {
            return;
        }
        self.canvas = Some(canvas);

        if let Some(bounds) = self.pending_fit.take() {
            self.transform = fit_transform(bounds, canvas.size());
            self.animation = None;
        }
        self.notify();
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn zoom(&self) -> f32 {
        self.transform.k
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn has_pending_fit(&self) -> bool {
        self.pending_fit.is_some()
    }

    pub fn subscribe(&mut self) -> Receiver<Transform> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn origin(&self) -> Pos2 {
        self.canvas.map_or(Pos2::ZERO, |canvas| canvas.min)
    }

    pub fn world_to_screen(&self, world: Vec2) -> Pos2 {
        self.origin() + self.transform.translation() + world * self.transform.k
    }

    pub fn screen_to_world(&self, screen: Pos2) -> Vec2 {
        (screen - self.origin() - self.transform.translation()) / self.transform.k
    }

    /// World point at the middle of the canvas.
    pub fn center_world(&self) -> Option<Vec2> {
        self.canvas.map(|canvas| self.screen_to_world(canvas.center()))
    }

    /// Freezes the transform while a node is dragged. Unlocking leaves it unchanged.
    pub fn set_drag_lock(&mut self, locked: bool) {
        self.drag_locked = locked;
        if locked {
            self.animation = None;
        }
    }

    pub fn is_drag_locked(&self) -> bool {
        self.drag_locked
    }

    pub fn zoom_in(&mut self) -> bool {
        self.step_zoom(ZOOM_STEP)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.step_zoom(1.0 / ZOOM_STEP)
    }

    fn step_zoom(&mut self, factor: f32) -> bool {
        if self.drag_locked {
            return false;
        }
        let Some(canvas) = self.canvas else {
            return false;
        };

        let base = self.animation.as_ref().map_or(self.transform, |animation| animation.to);
        let k = clamp_zoom(base.k * factor);
        if (k - base.k).abs() <= f32::EPSILON {
            return false;
        }
        let target = base.zoomed_at(k, canvas.size() * 0.5);
        self.animate_to(target)
    }

    /// Immediate zoom about `anchor` in screen space; used for wheel and pinch input.
    pub fn zoom_by(&mut self, factor: f32, anchor: Pos2) -> bool {
        if self.drag_locked || !factor.is_finite() || factor <= 0.0 {
            return false;
        }
        let k = clamp_zoom(self.transform.k * factor);
        if (k - self.transform.k).abs() <= f32::EPSILON {
            return false;
        }
        let anchor = anchor - self.origin();
        let next = self.transform.zoomed_at(k, anchor);
        self.set_transform(next)
    }

    pub fn pan_by(&mut self, delta: Vec2) -> bool {
        if self.drag_locked || delta == Vec2::ZERO || !delta.is_finite() {
            return false;
        }
        let mut next = self.transform;
        next.x += delta.x;
        next.y += delta.y;
        self.set_transform(next)
    }

    /// Jumps to `transform`, cancelling any running animation.
    pub fn set_transform(&mut self, transform: Transform) -> bool {
        if self.drag_locked {
            return false;
        }
        let transform = Transform {
            k: clamp_zoom(transform.k),
            ..transform
        };
        if !transform.x.is_finite() || !transform.y.is_finite() {
            return false;
        }
        self.animation = None;
        if transform == self.transform {
            return false;
        }
        self.transform = transform;
        self.notify();
        true
    }

    /// Animates so that `bounds` (world space) fills the canvas minus padding. Without a
    /// known canvas size the fit is deferred until `set_canvas`.
    pub fn zoom_to_fit(&mut self, bounds: Option<Rect>) -> bool {
        let Some(bounds) = bounds.filter(|bounds| bounds.is_finite()) else {
            return false;
        };
        if self.drag_locked {
            return false;
        }
        match self.canvas {
            Some(canvas) => self.animate_to(fit_transform(bounds, canvas.size())),
            None => {
                self.pending_fit = Some(bounds);
                false
            }
        }
    }

    /// Animates the world point `world` to the canvas center, keeping the zoom.
    pub fn center_on(&mut self, world: Vec2) -> bool {
        if self.drag_locked || !world.is_finite() {
            return false;
        }
        let Some(canvas) = self.canvas else {
            return false;
        };
        let base = self.animation.as_ref().map_or(self.transform, |animation| animation.to);
        let translation = canvas.size() * 0.5 - world * base.k;
        self.animate_to(Transform {
            k: base.k,
            x: translation.x,
            y: translation.y,
        })
    }

    fn animate_to(&mut self, target: Transform) -> bool {
        if target == self.transform {
            self.animation = None;
            return false;
        }
        self.animation = Some(Animation {
            from: self.transform,
            to: target,
            started_at: None,
        });
        true
    }

    /// Advances the running animation to `now` (seconds). Returns true while animating.
    pub fn tick(&mut self, now: f64) -> bool {
        let Some(animation) = self.animation.as_mut() else {
            return false;
        };
        let started_at = *animation.started_at.get_or_insert(now);
        let t = ((now - started_at) / ANIMATION_SECS).clamp(0.0, 1.0) as f32;
        let next = animation.from.lerp(animation.to, ease_in_out_cubic(t));
        let done = t >= 1.0;
        if done {
            self.transform = animation.to;
            self.animation = None;
        } else {
            self.transform = next;
        }
        self.notify();
        !done
    }

    fn notify(&mut self) {
        self.revision = self.revision.wrapping_add(1);
        let transform = self.transform;
        self.subscribers.retain(|tx| tx.send(transform).is_ok());
    }
}

pub fn fit_transform(bounds: Rect, canvas_size: Vec2) -> Transform {
    let available = (canvas_size - Vec2::splat(FIT_PADDING * 2.0)).max(Vec2::splat(1.0));
    let width = bounds.width().max(1.0);
    let height = bounds.height().max(1.0);
    let k = (available.x / width)
        .min(available.y / height)
        .clamp(MIN_ZOOM, MAX_FIT_ZOOM.min(MAX_ZOOM));
    let translation = canvas_size * 0.5 - bounds.center().to_vec2() * k;
    Transform {
        k,
        x: translation.x,
        y: translation.y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::pos2;

    fn viewport() -> Viewport {
        let mut viewport = Viewport::new();
        viewport.set_canvas(Rect::from_min_size(pos2(10.0, 20.0), vec2(800.0, 600.0)));
        viewport
    }

    fn finish(viewport: &mut Viewport) {
        viewport.tick(0.0);
        viewport.tick(ANIMATION_SECS + 0.01);
    }

    #[test]
    fn screen_world_round_trip() {
        let mut viewport = viewport();
        viewport.set_transform(Transform {
            k: 2.0,
            x: 30.0,
            y: -15.0,
        });
        let world = vec2(12.5, -40.0);
        let screen = viewport.world_to_screen(world);
        assert_eq!(screen, pos2(10.0 + 30.0 + 25.0, 20.0 - 15.0 - 80.0));
        let back = viewport.screen_to_world(screen);
        assert!((back - world).length() < 1e-4);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut viewport = viewport();
        for _ in 0..40 {
            viewport.zoom_in();
            finish(&mut viewport);
        }
        assert_eq!(viewport.zoom(), MAX_ZOOM);
        assert!(!viewport.zoom_in());

        for _ in 0..40 {
            viewport.zoom_by(0.5, pos2(100.0, 100.0));
        }
        assert_eq!(viewport.zoom(), MIN_ZOOM);
        viewport.set_transform(Transform {
            k: 1000.0,
            x: 0.0,
            y: 0.0,
        });
        assert_eq!(viewport.zoom(), MAX_ZOOM);
    }

    #[test]
    fn wheel_zoom_keeps_anchor_fixed() {
        let mut viewport = viewport();
        let anchor = pos2(300.0, 220.0);
        let before = viewport.screen_to_world(anchor);
        viewport.zoom_by(1.7, anchor);
        let after = viewport.screen_to_world(anchor);
        assert!((before - after).length() < 1e-3);
    }

    #[test]
    fn fit_centers_bounds() {
        let mut viewport = viewport();
        let bounds = Rect::from_min_max(pos2(-100.0, -50.0), pos2(300.0, 150.0));
        assert!(viewport.zoom_to_fit(Some(bounds)));
        finish(&mut viewport);

        let canvas = viewport.canvas().expect("canvas set");
        let center = viewport.world_to_screen(bounds.center().to_vec2());
        assert!((center - canvas.center()).length() < 1e-3);
        // (800 - 96) / 400 = 1.76 and (600 - 96) / 200 = 2.52
        assert!((viewport.zoom() - 1.76).abs() < 1e-4);
    }

    #[test]
    fn fit_waits_for_canvas_size() {
        let mut viewport = Viewport::new();
        let bounds = Rect::from_min_max(pos2(0.0, 0.0), pos2(100.0, 100.0));
        assert!(!viewport.zoom_to_fit(Some(bounds)));
        assert!(viewport.has_pending_fit());

        viewport.set_canvas(Rect::from_min_size(Pos2::ZERO, vec2(400.0, 400.0)));
        assert!(!viewport.has_pending_fit());
        let center = viewport.world_to_screen(vec2(50.0, 50.0));
        assert!((center - pos2(200.0, 200.0)).length() < 1e-3);
    }

    #[test]
    fn explicit_change_cancels_animation() {
        let mut viewport = viewport();
        viewport.zoom_in();
        assert!(viewport.is_animating());
        viewport.pan_by(vec2(5.0, 0.0));
        assert!(!viewport.is_animating());
    }

    #[test]
    fn drag_lock_freezes_transform() {
        let mut viewport = viewport();
        let before = viewport.transform();
        viewport.set_drag_lock(true);
        assert!(!viewport.pan_by(vec2(10.0, 10.0)));
        assert!(!viewport.zoom_by(2.0, pos2(0.0, 0.0)));
        assert!(!viewport.zoom_in());
        assert_eq!(viewport.transform(), before);
        viewport.set_drag_lock(false);
        assert!(viewport.pan_by(vec2(10.0, 10.0)));
    }

    #[test]
    fn every_change_is_published() {
        let mut viewport = viewport();
        let rx = viewport.subscribe();
        viewport.pan_by(vec2(4.0, 0.0));
        viewport.zoom_by(2.0, pos2(50.0, 50.0));
        let received = rx.try_iter().collect::<Vec<_>>();
        assert_eq!(received.len(), 2);
        assert_eq!(received[1], viewport.transform());
    }

    #[test]
    fn center_on_moves_point_to_middle() {
        let mut viewport = viewport();
        viewport.center_on(vec2(500.0, -200.0));
        finish(&mut viewport);
        let center = viewport.center_world().expect("canvas set");
        assert!((center - vec2(500.0, -200.0)).length() < 1e-3);
    }
}
