/// An axis-aligned face rectangle in floating-point image coordinates.
///
/// Corners are stored as `(x1, y1)` top-left and `(x2, y2)` bottom-right.
/// Which coordinate space (crop or frame) a region lives in is a property
/// of the pipeline stage that produced it; see [`AffineTransform`] for
/// moving between them.
///
/// [`AffineTransform`]: crate::shared::transform::AffineTransform
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Integer pixel bounds of a region after rounding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelBounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelBounds {
    /// True when the bounds are non-empty and lie fully inside a
    /// `frame_w` × `frame_h` image.
    pub fn fits_within(&self, frame_w: u32, frame_h: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x >= 0
            && self.y >= 0
            && self.x as i64 + self.width as i64 <= frame_w as i64
            && self.y as i64 + self.height as i64 <= frame_h as i64
    }
}

impl Region {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    pub fn iou(&self, other: &Region) -> f64 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }

        inter / (self.area() + other.area() - inter)
    }

    /// Rounds each edge to the nearest pixel. Edges beyond the `i32`
    /// range saturate, so far-off regions stay representable and simply
    /// fail `fits_within`.
    pub fn round(&self) -> PixelBounds {
        let x = self.x1.round() as i32;
        let y = self.y1.round() as i32;
        let span = |from: i32, to: f64| -> i32 {
            (to.round() as i64 - from as i64).clamp(i32::MIN as i64, i32::MAX as i64) as i32
        };
        PixelBounds {
            x,
            y,
            width: span(x, self.x2),
            height: span(y, self.y2),
        }
    }

    /// Intersects the region with `[0, frame_w] × [0, frame_h]`.
    pub fn clamp(&self, frame_w: u32, frame_h: u32) -> Region {
        let w = frame_w as f64;
        let h = frame_h as f64;
        Region {
            x1: self.x1.clamp(0.0, w),
            y1: self.y1.clamp(0.0, h),
            x2: self.x2.clamp(0.0, w),
            y2: self.y2.clamp(0.0, h),
        }
    }

    /// Componentwise `alpha * self + (1 - alpha) * previous`.
    pub fn blend(&self, previous: &Region, alpha: f64) -> Region {
        let mix = |cur: f64, prev: f64| alpha * cur + (1.0 - alpha) * prev;
        Region {
            x1: mix(self.x1, previous.x1),
            y1: mix(self.y1, previous.y1),
            x2: mix(self.x2, previous.x2),
            y2: mix(self.y2, previous.y2),
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Region({:.1}, {:.1} - {:.1}, {:.1})",
            self.x1, self.y1, self.x2, self.y2
        )
    }
}
