use ndarray::ArrayView3;

use crate::shared::region::PixelBounds;
use crate::shared::transform::AffineTransform;

/// A single camera frame or still image: contiguous RGB bytes in row-major
/// order. Immutable once captured; derived images (crops, warps) are new
/// frames.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn from_rgb_image(image: image::RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels inside `bounds`. Returns `None` unless the bounds
    /// are non-empty and lie fully inside the frame.
    pub fn crop(&self, bounds: &PixelBounds) -> Option<Frame> {
        if !bounds.fits_within(self.width, self.height) {
            return None;
        }
        let channels = self.channels as usize;
        let row_len = bounds.width as usize * channels;
        let mut data = Vec::with_capacity(row_len * bounds.height as usize);
        for row in bounds.y as usize..(bounds.y + bounds.height) as usize {
            let start = (row * self.width as usize + bounds.x as usize) * channels;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }
        Some(Frame::new(
            data,
            bounds.width as u32,
            bounds.height as u32,
            self.channels,
            self.index,
        ))
    }

    /// Renders the frame through `transform` into a new `out_w` × `out_h`
    /// image with nearest-neighbour sampling. Pixels that map outside the
    /// source stay black.
    pub fn warp(&self, transform: &AffineTransform, out_w: u32, out_h: u32) -> Frame {
        let channels = self.channels as usize;
        let mut data = vec![0u8; out_w as usize * out_h as usize * channels];

        let Some(inverse) = transform.inverse() else {
            return Frame::new(data, out_w, out_h, self.channels, self.index);
        };

        let src_w = self.width as i64;
        let src_h = self.height as i64;
        for y in 0..out_h as usize {
            for x in 0..out_w as usize {
                let (sx, sy) = inverse.map_point(x as f64 + 0.5, y as f64 + 0.5);
                let (sx, sy) = (sx.floor() as i64, sy.floor() as i64);
                if sx < 0 || sy < 0 || sx >= src_w || sy >= src_h {
                    continue;
                }
                let src = (sy as usize * self.width as usize + sx as usize) * channels;
                let dst = (y * out_w as usize + x) * channels;
                data[dst..dst + channels].copy_from_slice(&self.data[src..src + channels]);
            }
        }

        Frame::new(data, out_w, out_h, self.channels, self.index)
    }

    /// Y plane (BT.601 luma), one byte per pixel.
    pub fn luminance(&self) -> Vec<u8> {
        if self.channels < 3 {
            return self
                .data
                .iter()
                .step_by(self.channels.max(1) as usize)
                .copied()
                .collect();
        }
        self.data
            .chunks_exact(self.channels as usize)
            .map(|px| {
                let y = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
                y.round().clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
