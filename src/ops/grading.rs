// ============================================================================
// MASKED GRADING — weighted HSV adjustments driven by mask channels
// ============================================================================
//
// Each R/G/B channel of a mask image is an independent weight map. Every map
// carries its own hue/saturation/value deltas; at each pixel the deltas are
// averaged by local weight (not summed), so two full-strength masks with
// opposite hue shifts cancel out instead of doubling.
//
// Rows are processed in parallel via rayon.
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use image::{ImageBuffer, Luma, RgbImage, imageops};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ops::color::{hsv_to_rgb, rgb_to_hsv, to_u8};

/// Total weight at or below this is treated as "no mask here".
pub const WEIGHT_EPSILON: f32 = 1e-6;

// ============================================================================
// CHANNEL KEYS
// ============================================================================

/// Which auxiliary mask image a weight map came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MaskSlot {
    One,
    Two,
}

/// Color channel of a mask image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MaskChannel {
    Red,
    Green,
    Blue,
}

impl MaskChannel {
    pub fn all() -> [MaskChannel; 3] {
        [MaskChannel::Red, MaskChannel::Green, MaskChannel::Blue]
    }

    fn index(self) -> usize {
        match self {
            MaskChannel::Red => 0,
            MaskChannel::Green => 1,
            MaskChannel::Blue => 2,
        }
    }
}

/// Identifies one weight map, e.g. `M1_R` (mask 1, red channel).
///
/// Serialized as its textual form so it can key JSON objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ChannelKey {
    pub mask: MaskSlot,
    pub channel: MaskChannel,
}

impl ChannelKey {
    pub const fn new(mask: MaskSlot, channel: MaskChannel) -> Self {
        Self { mask, channel }
    }

    /// All six keys in display order (M1_R .. M2_B).
    pub fn all() -> [ChannelKey; 6] {
        use MaskChannel::*;
        use MaskSlot::*;
        [
            ChannelKey::new(One, Red),
            ChannelKey::new(One, Green),
            ChannelKey::new(One, Blue),
            ChannelKey::new(Two, Red),
            ChannelKey::new(Two, Green),
            ChannelKey::new(Two, Blue),
        ]
    }

    /// Human-readable tab label, e.g. "Mask2 - Green".
    pub fn label(&self) -> String {
        let m = match self.mask {
            MaskSlot::One => 1,
            MaskSlot::Two => 2,
        };
        let c = match self.channel {
            MaskChannel::Red => "Red",
            MaskChannel::Green => "Green",
            MaskChannel::Blue => "Blue",
        };
        format!("Mask{} - {}", m, c)
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = match self.mask {
            MaskSlot::One => '1',
            MaskSlot::Two => '2',
        };
        let c = match self.channel {
            MaskChannel::Red => 'R',
            MaskChannel::Green => 'G',
            MaskChannel::Blue => 'B',
        };
        write!(f, "M{}_{}", m, c)
    }
}

impl std::str::FromStr for ChannelKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let up = s.trim().to_ascii_uppercase();
        let bytes = up.as_bytes();
        if bytes.len() != 4 || bytes[0] != b'M' || bytes[2] != b'_' {
            return Err(format!("invalid channel key '{}' (expected M1_R .. M2_B)", s));
        }
        let mask = match bytes[1] {
            b'1' => MaskSlot::One,
            b'2' => MaskSlot::Two,
            _ => return Err(format!("invalid mask slot in '{}'", s)),
        };
        let channel = match bytes[3] {
            b'R' => MaskChannel::Red,
            b'G' => MaskChannel::Green,
            b'B' => MaskChannel::Blue,
            _ => return Err(format!("invalid channel in '{}'", s)),
        };
        Ok(ChannelKey { mask, channel })
    }
}

impl From<ChannelKey> for String {
    fn from(k: ChannelKey) -> Self {
        k.to_string()
    }
}

impl TryFrom<String> for ChannelKey {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ============================================================================
// ADJUSTMENTS
// ============================================================================

/// Per-channel grading parameters.
/// `hue_deg`: -180..180, `saturation_pct` / `value_pct`: -100..100 (0 = no change).
/// `invert` grades with `1 - weight` instead of the stored weight.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelAdjustment {
    pub hue_deg: f32,
    pub saturation_pct: f32,
    pub value_pct: f32,
    pub invert: bool,
}

impl ChannelAdjustment {
    pub fn new(hue_deg: f32, saturation_pct: f32, value_pct: f32, invert: bool) -> Self {
        Self { hue_deg, saturation_pct, value_pct, invert }.clamped()
    }

    /// Clamp every field into its valid domain. NaN collapses to 0.
    pub fn clamped(self) -> Self {
        let c = |v: f32, lim: f32| if v.is_nan() { 0.0 } else { v.clamp(-lim, lim) };
        Self {
            hue_deg: c(self.hue_deg, 180.0),
            saturation_pct: c(self.saturation_pct, 100.0),
            value_pct: c(self.value_pct, 100.0),
            invert: self.invert,
        }
    }

    #[inline]
    fn effective_weight(&self, stored: f32) -> f32 {
        if self.invert { 1.0 - stored } else { stored }
    }
}

/// Adjustment set keyed by weight map. Missing keys grade as a no-op.
pub type Adjustments = BTreeMap<ChannelKey, ChannelAdjustment>;

// ============================================================================
// WEIGHT MAPS
// ============================================================================

/// Single-channel weight grid, values in 0..1.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightMap {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl WeightMap {
    /// Build from raw values (row-major). Values are clamped to 0..1.
    /// Returns `None` if `data` does not match the dimensions.
    pub fn from_raw(width: u32, height: u32, mut data: Vec<f32>) -> Option<Self> {
        if data.len() != width as usize * height as usize {
            return None;
        }
        for v in &mut data {
            *v = if v.is_nan() { 0.0 } else { (*v).clamp(0.0, 1.0) };
        }
        Some(Self { width, height, data })
    }

    /// Constant-valued map.
    pub fn uniform(width: u32, height: u32, value: f32) -> Self {
        let v = value.clamp(0.0, 1.0);
        Self { width, height, data: vec![v; width as usize * height as usize] }
    }

    /// Extract one channel of an RGB mask as weights (`value / 255`).
    pub fn from_mask_channel(mask: &RgbImage, channel: MaskChannel) -> Self {
        let ci = channel.index();
        let data = mask.pixels().map(|p| p[ci] as f32 / 255.0).collect();
        Self { width: mask.width(), height: mask.height(), data }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Bilinear resample to a new size. Same-size requests return a clone.
    pub fn resized(&self, width: u32, height: u32) -> Self {
        if (width, height) == (self.width, self.height) {
            return self.clone();
        }
        if self.width == 0 || self.height == 0 || width == 0 || height == 0 {
            return Self::uniform(width, height, 0.0);
        }
        let src: ImageBuffer<Luma<f32>, Vec<f32>> =
            match ImageBuffer::from_raw(self.width, self.height, self.data.clone()) {
                Some(b) => b,
                None => return Self::uniform(width, height, 0.0),
            };
        let out = imageops::resize(&src, width, height, imageops::FilterType::Triangle);
        let data = out.into_raw().into_iter().map(|v| v.clamp(0.0, 1.0)).collect();
        Self { width, height, data }
    }
}

/// Report which channels of a mask carry any non-zero value.
pub fn channel_has_info(mask: &RgbImage) -> [bool; 3] {
    let mut found = [false; 3];
    for p in mask.pixels() {
        for c in 0..3 {
            found[c] |= p[c] != 0;
        }
        if found == [true; 3] {
            break;
        }
    }
    found
}

/// A set of weight maps that all share the grading target's dimensions.
#[derive(Clone, Debug)]
pub struct WeightSet {
    width: u32,
    height: u32,
    maps: BTreeMap<ChannelKey, WeightMap>,
}

impl WeightSet {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, maps: BTreeMap::new() }
    }

    /// Insert a map, bilinearly resampling it if its size differs from the set's.
    pub fn insert(&mut self, key: ChannelKey, map: WeightMap) {
        let map = if map.dimensions() != (self.width, self.height) {
            log_info!(
                "Resampling weight map {} from {}x{} to {}x{}",
                key, map.width, map.height, self.width, self.height
            );
            map.resized(self.width, self.height)
        } else {
            map
        };
        self.maps.insert(key, map);
    }

    /// Build weight maps for up to two RGB mask images (three maps each).
    pub fn from_masks(width: u32, height: u32, mask1: Option<&RgbImage>, mask2: Option<&RgbImage>) -> Self {
        let mut set = Self::new(width, height);
        for (slot, mask) in [(MaskSlot::One, mask1), (MaskSlot::Two, mask2)] {
            let Some(mask) = mask else { continue };
            let resized;
            let mask = if mask.dimensions() != (width, height) {
                resized = imageops::resize(mask, width, height, imageops::FilterType::Triangle);
                &resized
            } else {
                mask
            };
            for channel in MaskChannel::all() {
                set.maps.insert(ChannelKey::new(slot, channel), WeightMap::from_mask_channel(mask, channel));
            }
        }
        set
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ChannelKey> {
        self.maps.keys()
    }

    pub fn get(&self, key: &ChannelKey) -> Option<&WeightMap> {
        self.maps.get(key)
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum GradeError {
    /// The weight set was built for a different image size.
    DimensionMismatch { image: (u32, u32), weights: (u32, u32) },
}

impl fmt::Display for GradeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeError::DimensionMismatch { image, weights } => write!(
                f,
                "weight maps are {}x{} but the image is {}x{}",
                weights.0, weights.1, image.0, image.1
            ),
        }
    }
}

impl std::error::Error for GradeError {}

// ============================================================================
// GRADING
// ============================================================================

/// Apply weighted HSV adjustments to `base`.
///
/// Per pixel the effective weights (after invert) are summed; if the total is
/// at most [`WEIGHT_EPSILON`] the pixel is copied unchanged. Otherwise the
/// hue/saturation/value deltas are averaged by weight and applied:
/// hue rotates, saturation and value scale by `1 + pct/100` and clamp.
pub fn grade(base: &RgbImage, weights: &WeightSet, adjustments: &Adjustments) -> Result<RgbImage, GradeError> {
    if weights.is_empty() {
        return Ok(base.clone());
    }
    if weights.dimensions() != base.dimensions() {
        return Err(GradeError::DimensionMismatch {
            image: base.dimensions(),
            weights: weights.dimensions(),
        });
    }

    let w = base.width() as usize;
    let h = base.height() as usize;
    if w == 0 || h == 0 {
        return Ok(base.clone());
    }

    let layers: Vec<(&[f32], ChannelAdjustment)> = weights
        .maps
        .iter()
        .map(|(key, map)| {
            let adj = adjustments.get(key).copied().unwrap_or_default().clamped();
            (map.as_slice(), adj)
        })
        .collect();

    let stride = w * 3;
    let mut dst_raw = base.as_raw().clone();

    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let idx = y * w + x;
            let mut total = 0.0f32;
            let mut dh = 0.0f32;
            let mut ds = 0.0f32;
            let mut dv = 0.0f32;
            for (data, adj) in &layers {
                let wt = adj.effective_weight(data[idx]);
                total += wt;
                dh += wt * adj.hue_deg;
                ds += wt * adj.saturation_pct;
                dv += wt * adj.value_pct;
            }
            if total <= WEIGHT_EPSILON {
                continue;
            }
            let dh = dh / total;
            let ds = ds / total;
            let dv = dv / total;
            if dh == 0.0 && ds == 0.0 && dv == 0.0 {
                continue;
            }

            let pi = x * 3;
            let r = row[pi] as f32 / 255.0;
            let g = row[pi + 1] as f32 / 255.0;
            let b = row[pi + 2] as f32 / 255.0;
            let (hh, s, v) = rgb_to_hsv(r, g, b);
            let nh = (hh + dh / 360.0).rem_euclid(1.0);
            let ns = (s * (1.0 + ds / 100.0)).clamp(0.0, 1.0);
            let nv = (v * (1.0 + dv / 100.0)).clamp(0.0, 1.0);
            let (nr, ng, nb) = hsv_to_rgb(nh, ns, nv);
            row[pi] = to_u8(nr);
            row[pi + 1] = to_u8(ng);
            row[pi + 2] = to_u8(nb);
        }
    });

    Ok(RgbImage::from_raw(w as u32, h as u32, dst_raw).unwrap_or_else(|| base.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn key(s: &str) -> ChannelKey {
        s.parse().unwrap()
    }

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x * 37 % 256) as u8, (y * 53 % 256) as u8, ((x + y) * 11 % 256) as u8]))
    }

    #[test]
    fn full_weight_zero_delta_is_identity() {
        let img = gradient(16, 12);
        let mut set = WeightSet::new(16, 12);
        set.insert(key("M1_R"), WeightMap::uniform(16, 12, 1.0));
        let mut adj = Adjustments::new();
        adj.insert(key("M1_R"), ChannelAdjustment::default());
        let out = grade(&img, &set, &adj).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn red_plus_180_becomes_cyan() {
        let img = RgbImage::from_pixel(100, 100, Rgb([255, 0, 0]));
        let mut set = WeightSet::new(100, 100);
        set.insert(key("M1_G"), WeightMap::uniform(100, 100, 1.0));
        let mut adj = Adjustments::new();
        adj.insert(key("M1_G"), ChannelAdjustment::new(180.0, 0.0, 0.0, false));
        let out = grade(&img, &set, &adj).unwrap();
        assert!(out.pixels().all(|p| *p == Rgb([0, 255, 255])));
    }

    #[test]
    fn invert_matches_complemented_map() {
        let img = gradient(9, 7);
        let raw: Vec<f32> = (0..63).map(|i| (i as f32 * 0.37).fract()).collect();
        let complement: Vec<f32> = raw.iter().map(|v| 1.0 - v).collect();

        let mut a = WeightSet::new(9, 7);
        a.insert(key("M2_B"), WeightMap::from_raw(9, 7, raw).unwrap());
        let mut adj_a = Adjustments::new();
        adj_a.insert(key("M2_B"), ChannelAdjustment::new(45.0, -20.0, 10.0, true));

        let mut b = WeightSet::new(9, 7);
        b.insert(key("M2_B"), WeightMap::from_raw(9, 7, complement).unwrap());
        let mut adj_b = Adjustments::new();
        adj_b.insert(key("M2_B"), ChannelAdjustment::new(45.0, -20.0, 10.0, false));

        assert_eq!(grade(&img, &a, &adj_a).unwrap(), grade(&img, &b, &adj_b).unwrap());
    }

    #[test]
    fn opposite_hue_shifts_average_out() {
        let img = RgbImage::from_pixel(4, 4, Rgb([200, 60, 30]));
        let mut set = WeightSet::new(4, 4);
        set.insert(key("M1_R"), WeightMap::uniform(4, 4, 1.0));
        set.insert(key("M1_G"), WeightMap::uniform(4, 4, 1.0));
        let mut adj = Adjustments::new();
        adj.insert(key("M1_R"), ChannelAdjustment::new(30.0, 0.0, 0.0, false));
        adj.insert(key("M1_G"), ChannelAdjustment::new(-30.0, 0.0, 0.0, false));
        assert_eq!(grade(&img, &set, &adj).unwrap(), img);
    }

    #[test]
    fn half_weights_take_the_midpoint() {
        // Two maps at 0.5 with +60 and 0 should rotate by 30, same as one map at 1.0 with +30.
        let img = RgbImage::from_pixel(3, 3, Rgb([255, 0, 0]));
        let mut two = WeightSet::new(3, 3);
        two.insert(key("M1_R"), WeightMap::uniform(3, 3, 0.5));
        two.insert(key("M2_R"), WeightMap::uniform(3, 3, 0.5));
        let mut adj_two = Adjustments::new();
        adj_two.insert(key("M1_R"), ChannelAdjustment::new(60.0, 0.0, 0.0, false));

        let mut one = WeightSet::new(3, 3);
        one.insert(key("M1_R"), WeightMap::uniform(3, 3, 1.0));
        let mut adj_one = Adjustments::new();
        adj_one.insert(key("M1_R"), ChannelAdjustment::new(30.0, 0.0, 0.0, false));

        assert_eq!(grade(&img, &two, &adj_two).unwrap(), grade(&img, &one, &adj_one).unwrap());
    }

    #[test]
    fn zero_weight_pixels_pass_through() {
        let img = gradient(5, 5);
        let mut data = vec![0.0f32; 25];
        data[12] = 1.0;
        let mut set = WeightSet::new(5, 5);
        set.insert(key("M1_B"), WeightMap::from_raw(5, 5, data).unwrap());
        let mut adj = Adjustments::new();
        adj.insert(key("M1_B"), ChannelAdjustment::new(0.0, 0.0, -100.0, false));
        let out = grade(&img, &set, &adj).unwrap();
        for (i, (a, b)) in img.pixels().zip(out.pixels()).enumerate() {
            if i == 12 {
                assert_eq!(*b, Rgb([0, 0, 0]));
            } else {
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn saturation_and_value_clamp() {
        let img = RgbImage::from_pixel(2, 2, Rgb([200, 100, 100]));
        let mut set = WeightSet::new(2, 2);
        set.insert(key("M1_R"), WeightMap::uniform(2, 2, 1.0));
        let mut adj = Adjustments::new();
        adj.insert(key("M1_R"), ChannelAdjustment::new(0.0, -100.0, 100.0, false));
        let out = grade(&img, &set, &adj).unwrap();
        // Fully desaturated, value doubled and clamped to 1.0
        assert_eq!(*out.get_pixel(0, 0), Rgb([255, 255, 255]));
    }

    #[test]
    fn unknown_adjustment_keys_are_ignored() {
        let img = gradient(4, 4);
        let mut set = WeightSet::new(4, 4);
        set.insert(key("M1_R"), WeightMap::uniform(4, 4, 1.0));
        let mut adj = Adjustments::new();
        adj.insert(key("M2_G"), ChannelAdjustment::new(90.0, 50.0, 50.0, false));
        assert_eq!(grade(&img, &set, &adj).unwrap(), img);
    }

    #[test]
    fn mismatched_set_is_rejected() {
        let img = gradient(4, 4);
        let mut set = WeightSet::new(8, 8);
        set.insert(key("M1_R"), WeightMap::uniform(8, 8, 1.0));
        let err = grade(&img, &set, &Adjustments::new()).unwrap_err();
        assert_eq!(err, GradeError::DimensionMismatch { image: (4, 4), weights: (8, 8) });
    }

    #[test]
    fn inserted_maps_are_resampled() {
        let mut set = WeightSet::new(10, 6);
        set.insert(key("M1_R"), WeightMap::uniform(3, 2, 0.75));
        let map = set.get(&key("M1_R")).unwrap();
        assert_eq!(map.dimensions(), (10, 6));
        assert!(map.as_slice().iter().all(|v| (v - 0.75).abs() < 1e-4));
    }

    #[test]
    fn from_masks_splits_and_resizes_channels() {
        let m1 = RgbImage::from_pixel(4, 4, Rgb([255, 0, 51]));
        let set = WeightSet::from_masks(8, 8, Some(&m1), None);
        assert_eq!(set.len(), 3);
        assert!((set.get(&key("M1_R")).unwrap().get(3, 3) - 1.0).abs() < 1e-6);
        assert_eq!(set.get(&key("M1_G")).unwrap().get(0, 0), 0.0);
        assert!((set.get(&key("M1_B")).unwrap().get(7, 7) - 0.2).abs() < 1e-6);
        assert!(set.get(&key("M2_R")).is_none());
        assert_eq!(channel_has_info(&m1), [true, false, true]);
    }

    #[test]
    fn channel_keys_parse_and_display() {
        for k in ChannelKey::all() {
            assert_eq!(k.to_string().parse::<ChannelKey>().unwrap(), k);
        }
        assert_eq!(key("m2_g"), ChannelKey::new(MaskSlot::Two, MaskChannel::Green));
        assert!("M3_R".parse::<ChannelKey>().is_err());
        assert!("M1-R".parse::<ChannelKey>().is_err());
        assert_eq!(key("M2_B").label(), "Mask2 - Blue");
    }

    #[test]
    fn adjustments_clamp_to_domain() {
        let a = ChannelAdjustment::new(400.0, -250.0, f32::NAN, false);
        assert_eq!(a.hue_deg, 180.0);
        assert_eq!(a.saturation_pct, -100.0);
        assert_eq!(a.value_pct, 0.0);
    }
}
