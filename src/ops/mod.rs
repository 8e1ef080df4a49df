pub mod color;
pub mod fonts;
pub mod glyphs;
pub mod grading;
pub mod mask;
pub mod text;
pub mod transform;

use serde::{Deserialize, Serialize};

/// Integer pixel rectangle `[x0, x1) × [y0, y1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl PixelRect {
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Box of `w × h` at (`x`, `y`). The far edges saturate at `i32::MAX`.
    pub fn from_origin_size(x: i32, y: i32, w: u32, h: u32) -> Self {
        let w = i32::try_from(w).unwrap_or(i32::MAX);
        let h = i32::try_from(h).unwrap_or(i32::MAX);
        Self { x0: x, y0: y, x1: x.saturating_add(w), y1: y.saturating_add(h) }
    }

    pub fn width(&self) -> u32 {
        (self.x1 as i64 - self.x0 as i64).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y1 as i64 - self.y0 as i64).max(0) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    /// Smallest rectangle covering both. An empty side is ignored.
    pub fn union(&self, other: &PixelRect) -> PixelRect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        PixelRect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn translate(&self, dx: i32, dy: i32) -> PixelRect {
        PixelRect {
            x0: self.x0.saturating_add(dx),
            y0: self.y0.saturating_add(dy),
            x1: self.x1.saturating_add(dx),
            y1: self.y1.saturating_add(dy),
        }
    }
}
