/// Size and sensor orientation of the frames the capture source delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    /// Clockwise rotation in degrees, a multiple of 90.
    pub rotation: i32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32, rotation: i32) -> Self {
        Self {
            width,
            height,
            rotation,
        }
    }

    /// Whether the frame is displayed with width and height swapped.
    pub fn is_transposed(&self) -> bool {
        self.rotation.rem_euclid(180) == 90
    }

    /// Width and height as displayed, after rotation.
    pub fn display_size(&self) -> (u32, u32) {
        if self.is_transposed() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, (640, 480))]
    #[case(90, (480, 640))]
    #[case(180, (640, 480))]
    #[case(270, (480, 640))]
    #[case(-90, (480, 640))]
    fn test_display_size(#[case] rotation: i32, #[case] expected: (u32, u32)) {
        assert_eq!(FrameGeometry::new(640, 480, rotation).display_size(), expected);
    }
}
