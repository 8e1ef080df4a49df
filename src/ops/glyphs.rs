// ============================================================================
// GLYPH RASTERIZER — fill coverage + outline ring masks for a text run
// ============================================================================
//
// Masks are built once per text/size/stroke combination and shared by the
// parent and child overlay layers. Colors are applied later, after the
// masks have been transformed, so rotation never smears colored fringes.
// ============================================================================

use image::GrayImage;

use super::PixelRect;
use super::mask;

/// Font handle seam: anything that can measure a string and draw its
/// coverage into a mask.
///
/// Coordinates are in pixels relative to the pen origin of the first glyph
/// on the baseline (y grows downward, so glyph bodies sit at negative y).
pub trait GlyphSource {
    /// Tight bounding box of the inked pixels of `text` at `px` pixel size.
    /// `None` when nothing would be drawn.
    fn measure(&self, text: &str, px: f32) -> Option<PixelRect>;

    /// Draw `text` with its pen origin at `origin` (mask pixel coordinates).
    /// Coverage is max-combined with what is already in `mask`.
    fn draw(&self, text: &str, px: f32, origin: (i32, i32), mask: &mut GrayImage);
}

/// Fill and ring coverage for one text run on a shared canvas.
#[derive(Clone, Debug)]
pub struct GlyphMasks {
    /// Anti-aliased glyph coverage.
    pub fill: GrayImage,
    /// Outline ring outside the glyphs (all zero when stroke width is 0).
    pub ring: GrayImage,
    /// The glyphs' tight bounding box within the canvas.
    pub tight: PixelRect,
    /// Padding on every side of `tight` reserved for the ring.
    pub margin: u32,
}

impl GlyphMasks {
    pub fn empty() -> Self {
        Self {
            fill: GrayImage::new(0, 0),
            ring: GrayImage::new(0, 0),
            tight: PixelRect::default(),
            margin: 0,
        }
    }

    /// Nothing to draw (blank text or no outlines).
    pub fn is_empty(&self) -> bool {
        self.fill.width() == 0 || self.fill.height() == 0
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.fill.dimensions()
    }
}

/// Rasterize `text` and build its outline ring.
///
/// The ring is `dilate(fill, gap + stroke_width) - dilate(fill, gap)`, so it
/// starts `gap` pixels outside the glyph edge and is `stroke_width` thick.
/// With a stroke the canvas is the tight text box padded by `gap + stroke_width`
/// on every side; without one it is exactly the tight box.
pub fn rasterize(text: &str, font: &dyn GlyphSource, px: f32, stroke_width: u32, gap: u32) -> GlyphMasks {
    if text.trim().is_empty() || !(px > 0.0) {
        return GlyphMasks::empty();
    }
    let bbox = match font.measure(text, px) {
        Some(b) if !b.is_empty() => b,
        _ => return GlyphMasks::empty(),
    };

    let margin = if stroke_width > 0 { stroke_width + gap } else { 0 };
    let m = margin as i32;
    let w = bbox.width() + 2 * margin;
    let h = bbox.height() + 2 * margin;

    let mut fill = GrayImage::new(w, h);
    font.draw(text, px, (m - bbox.x0, m - bbox.y0), &mut fill);

    let ring = mask::ring(&fill, stroke_width, gap);
    GlyphMasks {
        fill,
        ring,
        tight: PixelRect::from_origin_size(m, m, bbox.width(), bbox.height()),
        margin,
    }
}

// ============================================================================
// BLOCK FONT — fixed-metric glyph source needing no font files
// ============================================================================

/// Every non-space character is a solid `px/2 × px` box sitting on the
/// baseline, advancing `3px/4` (`px` rounded, at least 1). Layout with it is
/// exact and platform independent, so it stands in for real fonts in
/// headless runs and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockFont;

impl BlockFont {
    /// Box of each inked character, relative to the pen origin.
    pub fn boxes(text: &str, px: f32) -> Vec<PixelRect> {
        let s = px.round().max(1.0) as i32;
        let adv = (s.saturating_mul(3) / 4).max(1);
        let bw = (s / 2).max(1);
        text.chars()
            .enumerate()
            .filter(|(_, c)| !c.is_whitespace())
            .map(|(i, _)| {
                let x = (i as i32).saturating_mul(adv);
                PixelRect::new(x, -s, x.saturating_add(bw), 0)
            })
            .collect()
    }
}

impl GlyphSource for BlockFont {
    fn measure(&self, text: &str, px: f32) -> Option<PixelRect> {
        let boxes = Self::boxes(text, px);
        let first = *boxes.first()?;
        Some(boxes.iter().fold(first, |acc, b| acc.union(b)))
    }

    fn draw(&self, text: &str, px: f32, origin: (i32, i32), mask: &mut GrayImage) {
        for b in Self::boxes(text, px) {
            let b = b.translate(origin.0, origin.1);
            for y in b.y0.max(0)..b.y1.min(mask.height() as i32) {
                for x in b.x0.max(0)..b.x1.min(mask.width() as i32) {
                    mask.put_pixel(x as u32, y as u32, image::Luma([255]));
                }
            }
        }
    }
}
