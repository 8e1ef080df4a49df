// ============================================================================
// TRANSFORM OPERATIONS — mirror, scale, rotate for overlay layers and masks
// ============================================================================

use image::{ImageBuffer, Pixel, imageops};
use rayon::prelude::*;

/// Interpolation method for resize operations.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
    Bicubic,
    Lanczos3,
}

impl Interpolation {
    pub fn to_filter(&self) -> imageops::FilterType {
        match self {
            Interpolation::Nearest  => imageops::FilterType::Nearest,
            Interpolation::Bilinear => imageops::FilterType::Triangle,
            Interpolation::Bicubic  => imageops::FilterType::CatmullRom,
            Interpolation::Lanczos3 => imageops::FilterType::Lanczos3,
        }
    }
}

/// 8-bit layer of any pixel layout (`GrayImage`, `RgbaImage`, ...).
pub type Layer<P> = ImageBuffer<P, Vec<u8>>;

const SCALE_EPSILON: f32 = 1e-6;
const ANGLE_EPSILON: f32 = 1e-2;

/// Per-layer geometric transform, applied mirror → scale → rotate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerTransform {
    pub mirror_h: bool,
    /// Uniform scale factor (1.0 = unchanged).
    pub scale: f32,
    /// Counter-clockwise rotation in degrees.
    pub rotation_deg: f32,
}

impl Default for LayerTransform {
    fn default() -> Self {
        Self { mirror_h: false, scale: 1.0, rotation_deg: 0.0 }
    }
}

impl LayerTransform {
    pub fn is_identity(&self) -> bool {
        !self.mirror_h && !needs_scale(self.scale) && !needs_rotation(self.rotation_deg)
    }
}

fn needs_scale(scale: f32) -> bool {
    scale.is_finite() && scale > 0.0 && (scale - 1.0).abs() >= SCALE_EPSILON
}

/// Angle normalized into [0, 360).
pub fn normalize_degrees(deg: f32) -> f32 {
    if !deg.is_finite() {
        return 0.0;
    }
    let a = deg.rem_euclid(360.0);
    if a >= 360.0 { 0.0 } else { a }
}

fn needs_rotation(deg: f32) -> bool {
    let a = normalize_degrees(deg);
    a > ANGLE_EPSILON && a < 360.0 - ANGLE_EPSILON
}

/// Apply `t` to `layer`. The input is never modified.
pub fn apply<P>(layer: &Layer<P>, t: &LayerTransform) -> Layer<P>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let mut out = if t.mirror_h { mirror_horizontal(layer) } else { layer.clone() };
    if needs_scale(t.scale) {
        out = scale_layer(&out, t.scale, Interpolation::Lanczos3);
    }
    if needs_rotation(t.rotation_deg) {
        out = rotate_expanded(&out, t.rotation_deg);
    }
    out
}

/// Mirror left↔right.
pub fn mirror_horizontal<P>(layer: &Layer<P>) -> Layer<P>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    imageops::flip_horizontal(layer)
}

/// Uniformly resize to `max(1, round(dim * scale))` on each axis.
pub fn scale_layer<P>(layer: &Layer<P>, scale: f32, interp: Interpolation) -> Layer<P>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (w, h) = layer.dimensions();
    if w == 0 || h == 0 || !needs_scale(scale) {
        return layer.clone();
    }
    let nw = ((w as f32 * scale).round() as u32).max(1);
    let nh = ((h as f32 * scale).round() as u32).max(1);
    imageops::resize(layer, nw, nh, interp.to_filter())
}

/// Rotate counter-clockwise by `deg` about the layer center, growing the
/// canvas so nothing is cropped. Uncovered pixels are fully transparent
/// (all channels zero). Quarter turns are exact.
pub fn rotate_expanded<P>(layer: &Layer<P>, deg: f32) -> Layer<P>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let a = normalize_degrees(deg);
    let (w, h) = layer.dimensions();
    if w == 0 || h == 0 || !needs_rotation(a) {
        return layer.clone();
    }
    if (a - 90.0).abs() <= ANGLE_EPSILON {
        return imageops::rotate270(layer);
    }
    if (a - 180.0).abs() <= ANGLE_EPSILON {
        return imageops::rotate180(layer);
    }
    if (a - 270.0).abs() <= ANGLE_EPSILON {
        return imageops::rotate90(layer);
    }

    let (sin, cos) = (a as f64).to_radians().sin_cos();
    let (wf, hf) = (w as f64, h as f64);
    let nw = ((wf * cos.abs() + hf * sin.abs()) - 1e-4).ceil().max(1.0) as u32;
    let nh = ((wf * sin.abs() + hf * cos.abs()) - 1e-4).ceil().max(1.0) as u32;

    let ch = P::CHANNEL_COUNT as usize;
    let src = layer.as_raw();
    let src_w = w as i32;
    let src_h = h as i32;
    let src_stride = w as usize * ch;
    let (scx, scy) = (wf * 0.5, hf * 0.5);
    let (dcx, dcy) = (nw as f64 * 0.5, nh as f64 * 0.5);

    let row_bytes = nw as usize * ch;
    let mut dst = vec![0u8; row_bytes * nh as usize];

    dst.par_chunks_mut(row_bytes).enumerate().for_each(|(dy, row)| {
        let yr = dy as f64 + 0.5 - dcy;
        let mut acc = vec![0.0f64; ch];
        for dx in 0..nw as usize {
            let xr = dx as f64 + 0.5 - dcx;
            // Inverse of a visual CCW turn in y-down coordinates
            let sx = xr * cos - yr * sin + scx - 0.5;
            let sy = xr * sin + yr * cos + scy - 0.5;
            if sx < -0.5 || sy < -0.5 || sx > wf - 0.5 || sy > hf - 0.5 {
                continue;
            }

            let x0 = sx.floor() as i32;
            let y0 = sy.floor() as i32;
            let wx = catmull_rom_weights((sx - x0 as f64) as f32);
            let wy = catmull_rom_weights((sy - y0 as f64) as f32);

            acc.iter_mut().for_each(|v| *v = 0.0);
            for (j, &wyj) in wy.iter().enumerate() {
                let py = y0 - 1 + j as i32;
                if py < 0 || py >= src_h {
                    continue;
                }
                for (i, &wxi) in wx.iter().enumerate() {
                    let px = x0 - 1 + i as i32;
                    if px < 0 || px >= src_w {
                        continue;
                    }
                    let wgt = (wxi * wyj) as f64;
                    let idx = py as usize * src_stride + px as usize * ch;
                    for (c, v) in acc.iter_mut().enumerate() {
                        *v += src[idx + c] as f64 * wgt;
                    }
                }
            }

            let out = dx * ch;
            for (c, v) in acc.iter().enumerate() {
                row[out + c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    });

    ImageBuffer::from_raw(nw, nh, dst).unwrap_or_else(|| ImageBuffer::new(nw, nh))
}

/// Catmull-Rom basis functions (cardinal spline, tau = 0.5).
/// Returns weights for P_{i-1}, P_i, P_{i+1}, P_{i+2} given parameter t in [0,1].
#[inline]
fn catmull_rom_weights(t: f32) -> [f32; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        -0.5 * t3 + t2 - 0.5 * t,
         1.5 * t3 - 2.5 * t2 + 1.0,
        -1.5 * t3 + 2.0 * t2 + 0.5 * t,
         0.5 * t3 - 0.5 * t2,
    ]
}
