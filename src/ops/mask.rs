// ============================================================================
// MASK MORPHOLOGY — dilation and ring construction on 8-bit coverage masks
// ============================================================================

use image::GrayImage;
use rayon::prelude::*;

/// Grow the "on" region of `mask` by `radius` pixels using a disk-shaped
/// max filter (`dx² + dy² <= r²`). Coverage values are preserved, so
/// anti-aliased edges stay soft. `radius == 0` returns the mask unchanged.
///
/// Samples outside the mask count as empty; callers pad the canvas when the
/// grown region must not be clipped.
pub fn dilate(mask: &GrayImage, radius: u32) -> GrayImage {
    let w = mask.width() as usize;
    let h = mask.height() as usize;
    if radius == 0 || w == 0 || h == 0 {
        return mask.clone();
    }

    let r = radius as i32;
    let offsets: Vec<(i32, i32)> = (-r..=r)
        .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
        .filter(|&(dx, dy)| dx * dx + dy * dy <= r * r)
        .collect();

    let src = mask.as_raw();
    let mut dst = vec![0u8; w * h];

    dst.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, out) in row.iter_mut().enumerate() {
            let mut max_v = 0u8;
            for &(dx, dy) in &offsets {
                let sx = x as i32 + dx;
                let sy = y as i32 + dy;
                if sx < 0 || sy < 0 || sx >= w as i32 || sy >= h as i32 {
                    continue;
                }
                let v = src[sy as usize * w + sx as usize];
                if v > max_v {
                    max_v = v;
                    if max_v == 255 {
                        break;
                    }
                }
            }
            *out = max_v;
        }
    });

    GrayImage::from_raw(w as u32, h as u32, dst).unwrap_or_else(|| mask.clone())
}

/// Per-pixel `a - b`, clamped at zero. Sizes must match; a mismatched `b`
/// is treated as empty where it does not overlap.
pub fn subtract(a: &GrayImage, b: &GrayImage) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        let bv = if x < b.width() && y < b.height() { b.get_pixel(x, y)[0] } else { 0 };
        image::Luma([a.get_pixel(x, y)[0].saturating_sub(bv)])
    })
}

/// Outline ring `dilate(fill, gap + width) - dilate(fill, gap)`.
/// A zero `width` yields an all-zero ring whatever the gap.
pub fn ring(fill: &GrayImage, width: u32, gap: u32) -> GrayImage {
    if width == 0 {
        return GrayImage::new(fill.width(), fill.height());
    }
    let outer = dilate(fill, gap + width);
    let inner = dilate(fill, gap);
    subtract(&outer, &inner)
}

/// True if no pixel has non-zero coverage.
pub fn is_blank(mask: &GrayImage) -> bool {
    mask.as_raw().iter().all(|&v| v == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn square(size: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if x >= x0 && x < x1 && y >= y0 && y < y1 { Luma([255]) } else { Luma([0]) }
        })
    }

    #[test]
    fn dilate_zero_is_identity() {
        let m = square(10, 3, 3, 6, 6);
        assert_eq!(dilate(&m, 0), m);
    }

    #[test]
    fn dilate_grows_by_radius() {
        let m = square(20, 9, 9, 10, 10);
        let d = dilate(&m, 3);
        assert_eq!(d.get_pixel(12, 9)[0], 255);
        assert_eq!(d.get_pixel(13, 9)[0], 0);
        assert_eq!(d.get_pixel(9, 6)[0], 255);
        // Disk, not square: the corner at (3,3) is outside radius 3
        assert_eq!(d.get_pixel(12, 12)[0], 0);
    }

    #[test]
    fn ring_is_empty_without_width() {
        let m = square(16, 5, 5, 10, 10);
        for gap in [0, 1, 4] {
            assert!(is_blank(&ring(&m, 0, gap)));
        }
    }

    #[test]
    fn ring_never_overlaps_fill() {
        let m = square(30, 10, 10, 20, 20);
        for gap in [0, 2] {
            let r = ring(&m, 4, gap);
            for (x, y, p) in m.enumerate_pixels() {
                if p[0] > 0 {
                    assert_eq!(r.get_pixel(x, y)[0], 0, "ring inside fill at ({x},{y}), gap {gap}");
                }
            }
        }
    }

    #[test]
    fn zero_gap_ring_touches_fill() {
        let m = square(30, 10, 10, 20, 20);
        let r = ring(&m, 5, 0);
        assert_eq!(r.get_pixel(9, 15)[0], 255);
        assert_eq!(r.get_pixel(20, 15)[0], 255);
        assert_eq!(r.get_pixel(15, 9)[0], 255);
    }

    #[test]
    fn gap_leaves_clear_band() {
        let m = square(30, 10, 10, 20, 20);
        let r = ring(&m, 3, 2);
        assert_eq!(r.get_pixel(9, 15)[0], 0);
        assert_eq!(r.get_pixel(8, 15)[0], 0);
        assert_eq!(r.get_pixel(7, 15)[0], 255);
        assert_eq!(r.get_pixel(5, 15)[0], 255);
        assert_eq!(r.get_pixel(4, 15)[0], 0);
    }
}
