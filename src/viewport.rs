// ============================================================================
// VIEWPORT — zoom/pan state, screen ↔ image mapping, text hit-testing
// ============================================================================
//
// Pure coordinate math for a preview widget that shows either the whole
// image scaled down ("fit") or a zoomed crop starting at an integer pan
// offset. Nothing here touches pixels.
// ============================================================================

use crate::ops::PixelRect;
use crate::ops::text::TextStyle;

pub const MIN_ZOOM: f64 = 0.05;
pub const MAX_ZOOM: f64 = 2.0;
const FIT_EPSILON: f64 = 1e-6;
const ZOOM_FLOOR: f64 = 1e-6;

pub const WHEEL_SCALE_STEP: f32 = 1.1;
pub const MIN_TEXT_SCALE: f32 = 0.1;
pub const MAX_TEXT_SCALE: f32 = 5.0;
pub const WHEEL_ROTATE_STEP: f32 = 5.0;

/// Largest zoom ≤ 1 that shows all of `content` inside `viewport`.
pub fn fit_zoom(content: (u32, u32), viewport: (u32, u32)) -> f64 {
    let (cw, ch) = content;
    if cw == 0 || ch == 0 {
        return 1.0;
    }
    let zx = viewport.0 as f64 / cw as f64;
    let zy = viewport.1 as f64 / ch as f64;
    zx.min(zy).min(1.0)
}

/// Image pixels covered by the viewport at `zoom`, per axis.
pub fn visible_extent(viewport: (u32, u32), zoom: f64) -> (u32, u32) {
    let z = zoom.max(ZOOM_FLOOR);
    let ext = |v: u32| ((v as f64 / z).round() as u32).max(1);
    (ext(viewport.0), ext(viewport.1))
}

/// Keep the visible window inside the content on each axis.
pub fn clamp_pan(pan: (i32, i32), content: (u32, u32), viewport: (u32, u32), zoom: f64) -> (i32, i32) {
    let (vw, vh) = visible_extent(viewport, zoom);
    let max_x = (content.0 as i64 - vw as i64).max(0) as i32;
    let max_y = (content.1 as i64 - vh as i64).max(0) as i32;
    (pan.0.clamp(0, max_x), pan.1.clamp(0, max_y))
}

/// Map a widget-space point to image pixel coordinates. `pad` is the offset
/// of the displayed image inside the widget. `None` outside the content.
pub fn screen_to_image(
    screen: (i32, i32),
    pad: (i32, i32),
    pan: (i32, i32),
    zoom: f64,
    content: (u32, u32),
) -> Option<(i32, i32)> {
    let xi = screen.0 - pad.0;
    let yi = screen.1 - pad.1;
    if xi < 0 || yi < 0 {
        return None;
    }
    let z = zoom.max(ZOOM_FLOOR);
    let xf = (pan.0 as f64 + xi as f64 / z).round() as i64;
    let yf = (pan.1 as f64 + yi as f64 / z).round() as i64;
    if xf < 0 || yf < 0 || xf >= content.0 as i64 || yf >= content.1 as i64 {
        return None;
    }
    Some((xf as i32, yf as i32))
}

/// Image-space rectangle → displayed rectangle (for selection outlines).
pub fn image_rect_to_screen(rect: PixelRect, pan: (i32, i32), zoom: f64) -> PixelRect {
    let z = zoom.max(ZOOM_FLOOR);
    let map = |v: i32, p: i32| ((v - p) as f64 * z).round() as i32;
    PixelRect::new(map(rect.x0, pan.0), map(rect.y0, pan.1), map(rect.x1, pan.0), map(rect.y1, pan.1))
}

/// Which text layer a click landed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitTarget {
    Child,
    Parent,
    None,
}

/// Child wins where the two layers overlap.
pub fn hit_test(point: (i32, i32), child: Option<PixelRect>, parent: Option<PixelRect>) -> HitTarget {
    if child.is_some_and(|r| r.contains(point.0, point.1)) {
        return HitTarget::Child;
    }
    if parent.is_some_and(|r| r.contains(point.0, point.1)) {
        return HitTarget::Parent;
    }
    HitTarget::None
}

// ============================================================================
// VIEW STATE
// ============================================================================

/// Zoom and pan of one preview widget.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    pub zoom: f64,
    pub pan: (i32, i32),
    /// Preview area in widget pixels.
    pub viewport: (u32, u32),
}

impl ViewState {
    pub fn new(viewport: (u32, u32)) -> Self {
        Self { zoom: 1.0, pan: (0, 0), viewport }
    }

    pub fn fit_zoom(&self, content: (u32, u32)) -> f64 {
        fit_zoom(content, self.viewport)
    }

    /// Whole image visible; pan is meaningless and held at the origin.
    pub fn is_fit(&self, content: (u32, u32)) -> bool {
        self.zoom <= self.fit_zoom(content) + FIT_EPSILON
    }

    pub fn set_zoom(&mut self, zoom: f64, content: (u32, u32)) {
        self.zoom = if zoom.is_finite() { zoom.clamp(MIN_ZOOM, MAX_ZOOM) } else { 1.0 };
        self.settle(content);
    }

    pub fn zoom_by(&mut self, factor: f64, content: (u32, u32)) {
        self.set_zoom(self.zoom * factor, content);
    }

    /// Zoom out until the whole image fits.
    pub fn fit(&mut self, content: (u32, u32)) {
        let z = self.fit_zoom(content);
        self.set_zoom(z, content);
    }

    fn settle(&mut self, content: (u32, u32)) {
        self.pan = if self.is_fit(content) {
            (0, 0)
        } else {
            clamp_pan(self.pan, content, self.viewport, self.zoom)
        };
    }

    /// Size of the displayed bitmap: the scaled image when fit, otherwise
    /// the full viewport.
    pub fn display_size(&self, content: (u32, u32)) -> (u32, u32) {
        if self.is_fit(content) {
            let s = |v: u32| ((v as f64 * self.zoom) as u32).max(1);
            (s(content.0), s(content.1))
        } else {
            self.viewport
        }
    }

    /// Region of the image currently on screen.
    pub fn visible_rect(&self, content: (u32, u32)) -> PixelRect {
        if self.is_fit(content) {
            return PixelRect::from_origin_size(0, 0, content.0, content.1);
        }
        let (vw, vh) = visible_extent(self.viewport, self.zoom);
        PixelRect::from_origin_size(self.pan.0, self.pan.1, vw, vh)
    }

    /// Pan so the image follows the pointer from `start_screen` to
    /// `current_screen`, starting from `start_pan`.
    pub fn pan_drag(
        &mut self,
        start_pan: (i32, i32),
        start_screen: (i32, i32),
        current_screen: (i32, i32),
        content: (u32, u32),
    ) {
        let z = self.zoom.max(ZOOM_FLOOR);
        let dx = ((current_screen.0 - start_screen.0) as f64 / z).round() as i32;
        let dy = ((current_screen.1 - start_screen.1) as f64 / z).round() as i32;
        self.pan = (start_pan.0 - dx, start_pan.1 - dy);
        self.settle(content);
    }

    /// Widget point → image pixel, rejecting points off the displayed bitmap.
    pub fn screen_to_image(&self, screen: (i32, i32), pad: (i32, i32), content: (u32, u32)) -> Option<(i32, i32)> {
        let (dw, dh) = self.display_size(content);
        let (xi, yi) = (screen.0 - pad.0, screen.1 - pad.1);
        if xi >= dw as i32 || yi >= dh as i32 {
            return None;
        }
        screen_to_image(screen, pad, self.pan, self.zoom, content)
    }

    pub fn image_rect_to_screen(&self, rect: PixelRect) -> PixelRect {
        image_rect_to_screen(rect, self.pan, self.zoom)
    }
}

// ============================================================================
// TEXT GESTURES
// ============================================================================

/// An in-progress drag of one text layer. Holds the normalized distance
/// between the grab point and the layer anchor so the layer doesn't jump.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextDrag {
    pub target: HitTarget,
    pub offset: (f32, f32),
}

fn normalized(point: (i32, i32), content: (u32, u32)) -> (f32, f32) {
    let w = content.0.max(1) as f32;
    let h = content.1.max(1) as f32;
    (point.0 as f32 / w, point.1 as f32 / h)
}

impl TextDrag {
    /// Start dragging `hit` from image point `point`. `None` for a miss.
    pub fn begin(hit: HitTarget, point: (i32, i32), content: (u32, u32), style: &TextStyle) -> Option<Self> {
        let anchor = match hit {
            HitTarget::Parent => style.pos,
            HitTarget::Child => style.child_pos,
            HitTarget::None => return None,
        };
        let (nx, ny) = normalized(point, content);
        Some(Self { target: hit, offset: (nx - anchor.0, ny - anchor.1) })
    }

    /// Move the grabbed layer's anchor under `point`, clamped to the image.
    pub fn update(&self, point: (i32, i32), content: (u32, u32), style: &mut TextStyle) {
        let (nx, ny) = normalized(point, content);
        let pos = (
            (nx - self.offset.0).clamp(0.0, 1.0),
            (ny - self.offset.1).clamp(0.0, 1.0),
        );
        match self.target {
            HitTarget::Child => style.child_pos = pos,
            HitTarget::Parent => style.pos = pos,
            HitTarget::None => {}
        }
    }
}

/// Wheel step on the text: grow (`up`) or shrink by one notch.
pub fn wheel_scale(style: &mut TextStyle, up: bool) {
    let factor = if up { WHEEL_SCALE_STEP } else { 1.0 / WHEEL_SCALE_STEP };
    style.scale = (style.scale * factor).clamp(MIN_TEXT_SCALE, MAX_TEXT_SCALE);
}

/// Shift+wheel step: rotate by ±5°, wrapped into [0, 360).
pub fn wheel_rotate(style: &mut TextStyle, up: bool) {
    let delta = if up { WHEEL_ROTATE_STEP } else { -WHEEL_ROTATE_STEP };
    style.rotation_deg = crate::ops::transform::normalize_degrees(style.rotation_deg + delta);
}
