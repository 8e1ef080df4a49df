// ============================================================================
// COLOR SPACE — RGB <-> HSV conversion shared by the grading engine
// ============================================================================
//
// All channels are normalized floats. Hue is a fraction of a full turn
// (0..1), not degrees.
// ============================================================================

/// RGB (0..1) → HSV (H: 0..1, S: 0..1, V: 0..1)
///
/// Achromatic input (max == min) yields hue 0 and saturation 0.
pub fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let v = max;
    let d = max - min;

    if d <= 0.0 {
        return (0.0, 0.0, v);
    }

    let s = if max > 0.0 { d / max } else { 0.0 };

    let h = if max == r {
        let mut h = (g - b) / d;
        if h < 0.0 { h += 6.0; }
        h / 6.0
    } else if max == g {
        ((b - r) / d + 2.0) / 6.0
    } else {
        ((r - g) / d + 4.0) / 6.0
    };

    // (g - b) / d can land exactly on 6.0 after the wrap above
    let h = if h >= 1.0 { h - 1.0 } else { h };
    (h, s, v)
}

/// HSV (H: 0..1, S: 0..1, V: 0..1) → RGB (0..1)
///
/// Hue outside 0..1 is wrapped. The result is clamped to absorb float overshoot.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let h6 = h.rem_euclid(1.0) * 6.0;
    let sector = h6.floor();
    let f = h6 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    let (r, g, b) = match sector as i32 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    (r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0))
}

/// Quantize a normalized channel to 8 bits (round half up).
#[inline]
pub fn to_u8(c: f32) -> u8 {
    (c * 255.0 + 0.5).clamp(0.0, 255.0) as u8
}

/// Parse `#rrggbb` / `rrggbb` / `#rgb` into an RGB triple.
pub fn parse_hex(s: &str) -> Option<[u8; 3]> {
    let hex = s.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some([r, g, b])
        }
        3 => {
            let mut out = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let n = c.to_digit(16)? as u8;
                out[i] = n * 17;
            }
            Some(out)
        }
        _ => None,
    }
}

/// Format an RGB triple as lowercase `#rrggbb`.
pub fn to_hex(c: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", c[0], c[1], c[2])
}

/// Serde adapter storing an RGB triple as a `#rrggbb` string.
pub mod hex_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(c: &[u8; 3], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::to_hex(*c))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 3], D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_hex(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid color '{}', expected #rrggbb", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_every_8bit_color_within_one_unit() {
        use rayon::prelude::*;

        (0..=255u32).into_par_iter().for_each(|r| {
            for g in 0..=255u32 {
                for b in 0..=255u32 {
                    let (h, s, v) = rgb_to_hsv(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
                    let (nr, ng, nb) = hsv_to_rgb(h, s, v);
                    let back = [to_u8(nr), to_u8(ng), to_u8(nb)];
                    for (orig, got) in [r, g, b].iter().zip(back.iter()) {
                        assert!(
                            (*orig as i32 - *got as i32).abs() <= 1,
                            "({r},{g},{b}) came back as {back:?}"
                        );
                    }
                }
            }
        });
    }

    #[test]
    fn achromatic_has_zero_hue_and_saturation() {
        for v in [0.0, 0.25, 0.5, 1.0] {
            let (h, s, vv) = rgb_to_hsv(v, v, v);
            assert_eq!(h, 0.0);
            assert_eq!(s, 0.0);
            assert_eq!(vv, v);
        }
    }

    #[test]
    fn primaries_land_on_expected_hues() {
        let (h, s, v) = rgb_to_hsv(1.0, 0.0, 0.0);
        assert_eq!((h, s, v), (0.0, 1.0, 1.0));
        let (h, _, _) = rgb_to_hsv(0.0, 1.0, 0.0);
        assert!((h - 1.0 / 3.0).abs() < 1e-6);
        let (h, _, _) = rgb_to_hsv(0.0, 0.0, 1.0);
        assert!((h - 2.0 / 3.0).abs() < 1e-6);
        // Slightly-below-red magenta wraps instead of reaching 1.0
        let (h, _, _) = rgb_to_hsv(1.0, 0.0, 1e-7);
        assert!(h < 1.0);
    }

    #[test]
    fn hsv_to_rgb_wraps_hue() {
        let a = hsv_to_rgb(0.5, 1.0, 1.0);
        let b = hsv_to_rgb(1.5, 1.0, 1.0);
        let c = hsv_to_rgb(-0.5, 1.0, 1.0);
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!([to_u8(a.0), to_u8(a.1), to_u8(a.2)], [0, 255, 255]);
    }

    #[test]
    fn hex_parsing() {
        assert_eq!(parse_hex("#ff8000"), Some([255, 128, 0]));
        assert_eq!(parse_hex("00FF00"), Some([0, 255, 0]));
        assert_eq!(parse_hex("#fff"), Some([255, 255, 255]));
        assert_eq!(parse_hex("#12345"), None);
        assert_eq!(parse_hex("#gg0000"), None);
        assert_eq!(parse_hex("#ééé"), None);
        assert_eq!(to_hex([255, 128, 0]), "#ff8000");
    }
}
