// ============================================================================
// TEXT OVERLAY — fill + ring masks, parent/child layers, placement, blending
// ============================================================================

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

use super::PixelRect;
use super::color::hex_serde;
use super::glyphs::{GlyphMasks, GlyphSource, rasterize};
use super::transform::{self, LayerTransform, normalize_degrees};

/// Largest rasterization size in pixels.
pub const MAX_RASTER_PX: u32 = 4096;
/// Largest stroke width or gap in pixels.
pub const MAX_STROKE_PX: u32 = 512;

/// Text overlay parameters for one asset. Positions are normalized to the
/// image size (0..1), centered on the layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub enabled: bool,
    pub text: String,
    #[serde(rename = "family")]
    pub font_family: String,
    #[serde(rename = "style")]
    pub font_style: String,
    #[serde(rename = "size_px")]
    pub font_size_px: f32,
    pub scale: f32,
    #[serde(rename = "rotation")]
    pub rotation_deg: f32,
    #[serde(rename = "fill", with = "hex_serde")]
    pub fill_color: [u8; 3],
    #[serde(rename = "stroke", with = "hex_serde")]
    pub stroke_color: [u8; 3],
    pub stroke_width: f32,
    pub stroke_gap: f32,
    /// Stroke layer displacement in image pixels.
    pub stroke_offset: (i32, i32),
    pub parent_mirror_h: bool,
    pub child_enabled: bool,
    pub child_mirror_h: bool,
    pub pos: (f32, f32),
    pub child_pos: (f32, f32),
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            enabled: false,
            text: "Sample Text".to_string(),
            font_family: String::new(),
            font_style: "Regular".to_string(),
            font_size_px: 72.0,
            scale: 1.0,
            rotation_deg: 0.0,
            fill_color: [255, 255, 255],
            stroke_color: [0, 0, 0],
            stroke_width: 0.0,
            stroke_gap: 0.0,
            stroke_offset: (0, 0),
            parent_mirror_h: false,
            child_enabled: false,
            child_mirror_h: false,
            pos: (0.5, 0.5),
            child_pos: (0.5, 0.5),
        }
    }
}

impl TextStyle {
    /// Put both layers back in the middle, unrotated and unscaled.
    pub fn reset_placement(&mut self) {
        self.pos = (0.5, 0.5);
        self.child_pos = (0.5, 0.5);
        self.rotation_deg = 0.0;
        self.scale = 1.0;
    }

    /// Enabled and has something to draw.
    pub fn is_visible(&self) -> bool {
        self.enabled && !self.text.trim().is_empty()
    }

    /// Rasterization size: `round(font_size_px * scale)` within
    /// `1..=MAX_RASTER_PX`.
    pub fn raster_px(&self) -> u32 {
        let px = (self.font_size_px * self.scale).round();
        if px.is_finite() && px >= 1.0 { (px as u32).min(MAX_RASTER_PX) } else { 1 }
    }

    pub fn stroke_px(&self) -> u32 {
        round_non_negative(self.stroke_width).min(MAX_STROKE_PX)
    }

    pub fn gap_px(&self) -> u32 {
        round_non_negative(self.stroke_gap).min(MAX_STROKE_PX)
    }

    // Scale is already baked into the raster size.
    pub fn parent_transform(&self) -> LayerTransform {
        LayerTransform { mirror_h: self.parent_mirror_h, scale: 1.0, rotation_deg: self.rotation_deg }
    }

    pub fn child_transform(&self) -> LayerTransform {
        LayerTransform {
            mirror_h: self.child_mirror_h,
            scale: 1.0,
            rotation_deg: child_rotation(self.rotation_deg),
        }
    }
}

fn round_non_negative(v: f32) -> u32 {
    let r = v.round();
    if r.is_finite() && r > 0.0 { r as u32 } else { 0 }
}

/// Child layers face the parent: `(180 - parent) mod 360`.
pub fn child_rotation(parent_deg: f32) -> f32 {
    normalize_degrees(180.0 - parent_deg)
}

/// Composited image plus where each text layer landed.
#[derive(Clone, Debug)]
pub struct TextComposite {
    pub image: RgbImage,
    pub parent: Option<PixelRect>,
    pub child: Option<PixelRect>,
}

/// Draw the text overlay described by `style` onto a copy of `base`.
///
/// Masks are rasterized once and shared by both layers. Each layer is
/// transformed as a mask, then colorized and blended: stroke first (shifted
/// by `stroke_offset`), fill on top. The returned boxes are the placed fill
/// layer extents, possibly reaching outside the image.
pub fn compose(base: &RgbImage, style: &TextStyle, font: &dyn GlyphSource) -> TextComposite {
    let untouched = || TextComposite { image: base.clone(), parent: None, child: None };
    if !style.is_visible() {
        return untouched();
    }

    let masks = rasterize(&style.text, font, style.raster_px() as f32, style.stroke_px(), style.gap_px());
    if masks.is_empty() {
        return untouched();
    }

    let mut image = base.clone();
    let parent = place_layer(&mut image, &masks, style, &style.parent_transform(), style.pos);
    let child = style
        .child_enabled
        .then(|| place_layer(&mut image, &masks, style, &style.child_transform(), style.child_pos));

    TextComposite { image, parent: Some(parent), child }
}

fn place_layer(
    image: &mut RgbImage,
    masks: &GlyphMasks,
    style: &TextStyle,
    t: &LayerTransform,
    pos: (f32, f32),
) -> PixelRect {
    let fill = transform::apply(&masks.fill, t);
    let (lw, lh) = fill.dimensions();
    let (x0, y0) = layer_origin(pos, image.dimensions(), (lw, lh));

    if style.stroke_px() > 0 {
        let ring = transform::apply(&masks.ring, t);
        let (dx, dy) = style.stroke_offset;
        blend_mask(image, &ring, style.stroke_color, x0.saturating_add(dx), y0.saturating_add(dy));
    }
    blend_mask(image, &fill, style.fill_color, x0, y0);

    PixelRect::from_origin_size(x0, y0, lw, lh)
}

/// Top-left corner of a `layer`-sized box centered on the normalized `pos`.
/// Both steps truncate toward zero. `pos` is clamped to [0, 1]; NaN centers.
pub fn layer_origin(pos: (f32, f32), image: (u32, u32), layer: (u32, u32)) -> (i32, i32) {
    let cx = (clamp_unit(pos.0) * image.0 as f64).trunc();
    let cy = (clamp_unit(pos.1) * image.1 as f64).trunc();
    let x0 = (cx - layer.0 as f64 / 2.0).trunc();
    let y0 = (cy - layer.1 as f64 / 2.0).trunc();
    (x0 as i32, y0 as i32)
}

fn clamp_unit(v: f32) -> f64 {
    if v.is_nan() { 0.5 } else { v.clamp(0.0, 1.0) as f64 }
}

/// Source-over blend of a solid `color` through `mask` coverage, with the
/// mask's top-left at (`x0`, `y0`). Parts outside the image are clipped.
pub fn blend_mask(image: &mut RgbImage, mask: &GrayImage, color: [u8; 3], x0: i32, y0: i32) {
    let (iw, ih) = (image.width() as i64, image.height() as i64);
    let (mw, mh) = (mask.width() as i64, mask.height() as i64);
    let (ox, oy) = (x0 as i64, y0 as i64);

    let sx0 = (-ox).max(0);
    let sy0 = (-oy).max(0);
    let sx1 = mw.min(iw - ox);
    let sy1 = mh.min(ih - oy);
    if sx0 >= sx1 || sy0 >= sy1 {
        return;
    }

    for my in sy0..sy1 {
        for mx in sx0..sx1 {
            let a = mask.get_pixel(mx as u32, my as u32)[0] as u32;
            if a == 0 {
                continue;
            }
            let p = image.get_pixel_mut((mx + ox) as u32, (my + oy) as u32);
            if a == 255 {
                p.0 = color;
                continue;
            }
            for c in 0..3 {
                let s = color[c] as u32;
                let d = p[c] as u32;
                p[c] = ((s * a + d * (255 - a) + 127) / 255) as u8;
            }
        }
    }
}
