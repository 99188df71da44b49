use glam::DVec2;

use crate::geometry::Rect;

pub const DEFAULT_MIN_SCALE: f64 = 0.1;
pub const DEFAULT_MAX_SCALE: f64 = 10.0;

/// Pan and scale at one instant. Cheap to copy into a render target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub pan: DVec2,
    pub scale: f64,
}

impl ViewTransform {
    pub const IDENTITY: Self = Self {
        pan: DVec2::ZERO,
        scale: 1.0,
    };
}

/// Screen ↔ world mapping. `screen = world * scale + pan`.
///
/// Ephemeral: never persisted, re-centred whenever the map bounds change.
#[derive(Clone, Debug)]
pub struct Viewport {
    pub pan: DVec2,
    pub scale: f64,
    min_scale: f64,
    max_scale: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new()
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MIN_SCALE, DEFAULT_MAX_SCALE)
    }

    /// Scale limits are sanitised so `min_scale` is positive and not above `max_scale`.
    pub fn with_limits(min_scale: f64, max_scale: f64) -> Self {
        let min_scale = if min_scale.is_finite() && min_scale > 0.0 {
            min_scale
        } else {
            DEFAULT_MIN_SCALE
        };
        let max_scale = if max_scale.is_finite() { max_scale.max(min_scale) } else { DEFAULT_MAX_SCALE.max(min_scale) };
        Self {
            pan: DVec2::ZERO,
            scale: 1.0_f64.clamp(min_scale, max_scale),
            min_scale,
            max_scale,
        }
    }

    pub fn scale_limits(&self) -> (f64, f64) {
        (self.min_scale, self.max_scale)
    }

    pub fn transform(&self) -> ViewTransform {
        ViewTransform {
            pan: self.pan,
            scale: self.scale,
        }
    }

    pub fn screen_to_world(&self, screen: DVec2) -> DVec2 {
        (screen - self.pan) / self.scale
    }

    pub fn world_to_screen(&self, world: DVec2) -> DVec2 {
        world * self.scale + self.pan
    }

    fn clamp_scale(&self, scale: f64) -> f64 {
        if scale.is_nan() {
            return self.scale;
        }
        scale.clamp(self.min_scale, self.max_scale)
    }

    pub fn pan_by(&mut self, delta: DVec2) {
        self.pan += delta;
    }

    /// Change scale while keeping the world point under `screen` fixed.
    pub fn zoom_at(&mut self, screen: DVec2, new_scale: f64) {
        let anchor = self.screen_to_world(screen);
        self.scale = self.clamp_scale(new_scale);
        self.pan = screen - anchor * self.scale;
    }

    /// Wheel zoom: each notch multiplies or divides the scale by `step`.
    /// Positive `notches` (wheel pulled toward the user) zoom out.
    pub fn zoom_by(&mut self, screen: DVec2, notches: f64, step: f64) {
        let factor = step.powf(-notches);
        self.zoom_at(screen, self.scale * factor);
    }

    /// Fit `bounds` into a screen of `screen_size`, leaving `padding` pixels
    /// on every side, and centre it.
    pub fn center_on(&mut self, bounds: Rect, screen_size: DVec2, padding: f64) {
        let avail = (screen_size - DVec2::splat(2.0 * padding)).max(DVec2::ONE);
        let size = bounds.size();
        let fit = if size.x > 0.0 && size.y > 0.0 {
            (avail.x / size.x).min(avail.y / size.y)
        } else {
            1.0
        };
        self.scale = self.clamp_scale(fit);
        self.pan = screen_size * 0.5 - bounds.center() * self.scale;
    }
}

/// Coalesces transform updates to at most one per animation frame.
///
/// Intermediate values pushed between frames are dropped; the latest one is
/// always delivered on the next frame.
#[derive(Debug, Default)]
pub struct FrameGate {
    pending: Option<ViewTransform>,
    applied: Option<ViewTransform>,
}

impl FrameGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, transform: ViewTransform) {
        if self.applied == Some(transform) {
            self.pending = None;
            return;
        }
        self.pending = Some(transform);
    }

    /// Called once per animation frame. Returns the transform to apply, if any.
    pub fn on_frame(&mut self) -> Option<ViewTransform> {
        let next = self.pending.take()?;
        self.applied = Some(next);
        Some(next)
    }

    pub fn applied(&self) -> Option<ViewTransform> {
        self.applied
    }
}
