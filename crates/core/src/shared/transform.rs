//! 2D affine transforms between frame space and crop space.
//!
//! The detector runs on a fixed-size, possibly rotated crop of the camera
//! frame. Regions it reports must be mapped back into frame coordinates
//! before they reach the tracker; this module owns both directions.

use crate::shared::region::Region;

const SINGULAR_EPSILON: f64 = 1e-12;

/// Row-major 2x3 affine matrix:
///
/// ```text
/// | a  b  tx |
/// | c  d  ty |
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineTransform {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    tx: f64,
    ty: f64,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform {
    pub fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            tx: 0.0,
            ty: 0.0,
        }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            tx,
            ty,
            ..Self::identity()
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::identity()
        }
    }

    /// Clockwise rotation in image coordinates (y axis pointing down).
    ///
    /// Quarter turns are computed exactly so that repeated composition
    /// does not accumulate `sin`/`cos` noise.
    pub fn rotation_degrees(degrees: i32) -> Self {
        let (cos, sin) = match degrees.rem_euclid(360) {
            0 => (1.0, 0.0),
            90 => (0.0, 1.0),
            180 => (-1.0, 0.0),
            270 => (0.0, -1.0),
            other => {
                let rad = (other as f64).to_radians();
                (rad.cos(), rad.sin())
            }
        };
        Self {
            a: cos,
            b: -sin,
            c: sin,
            d: cos,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// Transform that applies `self` first, then `next`.
    pub fn then(&self, next: &AffineTransform) -> AffineTransform {
        AffineTransform {
            a: next.a * self.a + next.b * self.c,
            b: next.a * self.b + next.b * self.d,
            c: next.c * self.a + next.d * self.c,
            d: next.c * self.b + next.d * self.d,
            tx: next.a * self.tx + next.b * self.ty + next.tx,
            ty: next.c * self.tx + next.d * self.ty + next.ty,
        }
    }

    /// Returns `None` for singular (non-invertible) transforms.
    pub fn inverse(&self) -> Option<AffineTransform> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < SINGULAR_EPSILON {
            return None;
        }
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Some(AffineTransform {
            a,
            b,
            c,
            d,
            tx: -(a * self.tx + b * self.ty),
            ty: -(c * self.tx + d * self.ty),
        })
    }

    pub fn map_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.b * y + self.tx,
            self.c * x + self.d * y + self.ty,
        )
    }

    /// Maps all four corners and returns their axis-aligned bounding box.
    pub fn map_region(&self, region: &Region) -> Region {
        let corners = [
            self.map_point(region.x1, region.y1),
            self.map_point(region.x2, region.y1),
            self.map_point(region.x1, region.y2),
            self.map_point(region.x2, region.y2),
        ];
        let mut out = Region::new(f64::MAX, f64::MAX, f64::MIN, f64::MIN);
        for (x, y) in corners {
            out.x1 = out.x1.min(x);
            out.y1 = out.y1.min(y);
            out.x2 = out.x2.max(x);
            out.y2 = out.y2.max(y);
        }
        out
    }

    /// Frame → crop transform for a `src_w` × `src_h` frame rendered into a
    /// `dst_w` × `dst_h` crop after a clockwise `rotation` (multiple of 90).
    ///
    /// With `maintain_aspect` the larger of the two scale factors is used
    /// on both axes, so the crop is filled and the overflow is cut off.
    pub fn frame_to_crop(
        src_w: u32,
        src_h: u32,
        dst_w: u32,
        dst_h: u32,
        rotation: i32,
        maintain_aspect: bool,
    ) -> AffineTransform {
        let mut m = AffineTransform::identity();

        if rotation != 0 {
            m = m
                .then(&Self::translation(-(src_w as f64) / 2.0, -(src_h as f64) / 2.0))
                .then(&Self::rotation_degrees(rotation));
        }

        let transpose = (rotation.abs() + 90) % 180 == 0;
        let (in_w, in_h) = if transpose {
            (src_h, src_w)
        } else {
            (src_w, src_h)
        };

        if in_w != dst_w || in_h != dst_h {
            let sx = dst_w as f64 / in_w as f64;
            let sy = dst_h as f64 / in_h as f64;
            m = if maintain_aspect {
                let s = sx.max(sy);
                m.then(&Self::scale(s, s))
            } else {
                m.then(&Self::scale(sx, sy))
            };
        }

        if rotation != 0 {
            m = m.then(&Self::translation(dst_w as f64 / 2.0, dst_h as f64 / 2.0));
        }

        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn assert_point_eq(actual: (f64, f64), expected: (f64, f64)) {
        assert_relative_eq!(actual.0, expected.0, epsilon = 1e-9);
        assert_relative_eq!(actual.1, expected.1, epsilon = 1e-9);
    }

    #[test]
    fn test_identity_maps_point_unchanged() {
        assert_point_eq(AffineTransform::identity().map_point(3.0, 4.0), (3.0, 4.0));
    }

    #[test]
    fn test_then_applies_in_order() {
        // scale by 2, then translate by (10, 0)
        let m = AffineTransform::scale(2.0, 2.0).then(&AffineTransform::translation(10.0, 0.0));
        assert_point_eq(m.map_point(1.0, 1.0), (12.0, 2.0));

        // translate, then scale
        let n = AffineTransform::translation(10.0, 0.0).then(&AffineTransform::scale(2.0, 2.0));
        assert_point_eq(n.map_point(1.0, 1.0), (22.0, 2.0));
    }

    #[test]
    fn test_rotation_90_is_clockwise() {
        let m = AffineTransform::rotation_degrees(90);
        // +x axis rotates onto +y (downwards on screen)
        assert_point_eq(m.map_point(1.0, 0.0), (0.0, 1.0));
    }

    #[test]
    fn test_inverse_round_trips() {
        let m = AffineTransform::frame_to_crop(640, 480, 300, 300, 90, false);
        let inv = m.inverse().unwrap();
        let p = m.map_point(123.0, 45.0);
        assert_point_eq(inv.map_point(p.0, p.1), (123.0, 45.0));
        assert_point_eq(m.then(&inv).map_point(7.0, 9.0), (7.0, 9.0));
    }

    #[test]
    fn test_singular_has_no_inverse() {
        assert!(AffineTransform::scale(0.0, 1.0).inverse().is_none());
    }

    #[test]
    fn test_frame_to_crop_without_rotation_scales_corners() {
        let m = AffineTransform::frame_to_crop(600, 300, 300, 300, 0, false);
        assert_point_eq(m.map_point(0.0, 0.0), (0.0, 0.0));
        assert_point_eq(m.map_point(600.0, 300.0), (300.0, 300.0));
    }

    #[test]
    fn test_frame_to_crop_maintain_aspect_uses_larger_scale() {
        let m = AffineTransform::frame_to_crop(600, 300, 300, 300, 0, true);
        // scale = max(0.5, 1.0) = 1.0
        assert_point_eq(m.map_point(600.0, 300.0), (600.0, 300.0));
    }

    #[rstest]
    #[case(90)]
    #[case(180)]
    #[case(270)]
    fn test_frame_to_crop_rotated_frame_fills_crop(#[case] rotation: i32) {
        let m = AffineTransform::frame_to_crop(640, 480, 300, 300, rotation, false);
        let full = m.map_region(&Region::new(0.0, 0.0, 640.0, 480.0));
        assert_relative_eq!(full.x1, 0.0, epsilon = 1e-9);
        assert_relative_eq!(full.y1, 0.0, epsilon = 1e-9);
        assert_relative_eq!(full.x2, 300.0, epsilon = 1e-9);
        assert_relative_eq!(full.y2, 300.0, epsilon = 1e-9);
    }

    #[test]
    fn test_map_region_back_to_frame() {
        let frame_to_crop = AffineTransform::frame_to_crop(640, 480, 300, 300, 0, false);
        let crop_to_frame = frame_to_crop.inverse().unwrap();
        let in_crop = Region::new(0.0, 0.0, 150.0, 150.0);
        let in_frame = crop_to_frame.map_region(&in_crop);
        assert_relative_eq!(in_frame.x2, 320.0, epsilon = 1e-9);
        assert_relative_eq!(in_frame.y2, 240.0, epsilon = 1e-9);
    }
}
