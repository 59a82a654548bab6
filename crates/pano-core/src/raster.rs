//! Owned raster buffers and alpha masks.
//!
//! Pixel data is stored as `f32` regardless of the source encoding; the
//! [`PixelType`] tag records the encoding so algorithms can reason about the
//! numeric range and quantization step. Conversion to and from encoded
//! buffers happens at the load/store boundary, outside this crate.

use crate::math::Real;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric encoding of a decoded image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelType {
    UInt8,
    UInt16,
    Int16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl PixelType {
    /// Largest representable intensity of the encoding.
    pub fn max_value(self) -> Real {
        match self {
            PixelType::UInt8 => 255.0,
            PixelType::UInt16 => 65_535.0,
            PixelType::Int16 => 32_767.0,
            PixelType::Int32 => 2_147_483_647.0,
            PixelType::UInt32 => 4_294_967_295.0,
            PixelType::Float32 | PixelType::Float64 => 1.0,
        }
    }

    /// Smallest meaningful intensity quantum of the encoding.
    pub fn step_size(self) -> Real {
        match self {
            PixelType::Float32 | PixelType::Float64 => 1.0 / 255.0,
            other => 1.0 / other.max_value(),
        }
    }

    /// Next smaller encoding for graceful degradation when a save target
    /// cannot hold this depth, ending at `UInt8`.
    pub fn degrade(self) -> Option<PixelType> {
        match self {
            PixelType::UInt8 => None,
            PixelType::UInt16 | PixelType::Int16 => Some(PixelType::UInt8),
            _ => Some(PixelType::UInt16),
        }
    }
}

/// Errors raised by raster operations.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("channel count must be 1 or 3, got {0}")]
    Channels(usize),
    #[error("buffer length {len} does not match {w}x{h}x{c}")]
    Size {
        len: usize,
        w: usize,
        h: usize,
        c: usize,
    },
}

/// Owned interleaved raster in row-major layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: usize,
    height: usize,
    channels: usize,
    pixel_type: PixelType,
    data: Vec<f32>,
}

impl Raster {
    /// Zero-filled raster with 1 or 3 channels.
    pub fn new(width: usize, height: usize, channels: usize, pixel_type: PixelType) -> Self {
        debug_assert!(channels == 1 || channels == 3);
        Self {
            width,
            height,
            channels,
            pixel_type,
            data: vec![0.0; width * height * channels],
        }
    }

    /// Wrap an existing buffer; the length must match the dimensions.
    pub fn from_vec(
        width: usize,
        height: usize,
        channels: usize,
        pixel_type: PixelType,
        data: Vec<f32>,
    ) -> Result<Self, RasterError> {
        if channels != 1 && channels != 3 {
            return Err(RasterError::Channels(channels));
        }
        if data.len() != width * height * channels {
            return Err(RasterError::Size {
                len: data.len(),
                w: width,
                h: height,
                c: channels,
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            pixel_type,
            data,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    fn idx(&self, x: usize, y: usize) -> usize {
        (y * self.width + x) * self.channels
    }

    /// Channel value at (x, y).
    #[inline]
    pub fn get(&self, x: usize, y: usize, c: usize) -> f32 {
        self.data[self.idx(x, y) + c]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, c: usize, v: f32) {
        let i = self.idx(x, y) + c;
        self.data[i] = v;
    }

    /// Pixel as RGB; grayscale rasters replicate their single channel.
    #[inline]
    pub fn rgb(&self, x: usize, y: usize) -> [f32; 3] {
        let i = self.idx(x, y);
        if self.channels == 3 {
            [self.data[i], self.data[i + 1], self.data[i + 2]]
        } else {
            let v = self.data[i];
            [v, v, v]
        }
    }

    #[inline]
    pub fn set_rgb(&mut self, x: usize, y: usize, rgb: [f32; 3]) {
        let i = self.idx(x, y);
        if self.channels == 3 {
            self.data[i..i + 3].copy_from_slice(&rgb);
        } else {
            self.data[i] = rgb[0];
        }
    }

    /// Copy the whole pixel at (sx, sy) of `src` to (dx, dy); channel counts
    /// must match.
    #[inline]
    pub fn copy_pixel(&mut self, dx: usize, dy: usize, src: &Raster, sx: usize, sy: usize) {
        let di = self.idx(dx, dy);
        let si = src.idx(sx, sy);
        let c = self.channels;
        self.data[di..di + c].copy_from_slice(&src.data[si..si + c]);
    }

    /// Bilinear RGB sample at a fractional position, clamped to the frame.
    pub fn bilinear(&self, x: Real, y: Real) -> [f32; 3] {
        let x = x.clamp(0.0, (self.width - 1) as Real);
        let y = y.clamp(0.0, (self.height - 1) as Real);
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = (x - x0 as Real) as f32;
        let fy = (y - y0 as Real) as f32;
        let mut out = [0.0f32; 3];
        let (a, b, c, d) = (
            self.rgb(x0, y0),
            self.rgb(x1, y0),
            self.rgb(x0, y1),
            self.rgb(x1, y1),
        );
        for ch in 0..3 {
            let top = a[ch] * (1.0 - fx) + b[ch] * fx;
            let bot = c[ch] * (1.0 - fx) + d[ch] * fx;
            out[ch] = top * (1.0 - fy) + bot * fy;
        }
        out
    }

    /// Grow to `(width, height)`, keeping existing content at
    /// `(offset_x, offset_y)` in the new buffer.
    pub fn grow(&mut self, width: usize, height: usize, offset_x: usize, offset_y: usize) {
        let mut out = Raster::new(width, height, self.channels, self.pixel_type);
        for y in 0..self.height {
            let src = self.idx(0, y);
            let dst = out.idx(offset_x, offset_y + y);
            out.data[dst..dst + self.width * self.channels]
                .copy_from_slice(&self.data[src..src + self.width * self.channels]);
        }
        *self = out;
    }
}

/// Per-pixel validity mask; 0 means no data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Mask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// Fully valid mask.
    pub fn full(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![255; width * height],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: u8) {
        self.data[y * self.width + x] = v;
    }

    #[inline]
    pub fn is_set(&self, x: usize, y: usize) -> bool {
        self.get(x, y) != 0
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether every pixel is zero.
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|v| *v == 0)
    }

    /// Grow as [`Raster::grow`], new area unset.
    pub fn grow(&mut self, width: usize, height: usize, offset_x: usize, offset_y: usize) {
        let mut out = Mask::new(width, height);
        for y in 0..self.height {
            let src = y * self.width;
            let dst = (offset_y + y) * width + offset_x;
            out.data[dst..dst + self.width].copy_from_slice(&self.data[src..src + self.width]);
        }
        *self = out;
    }

    /// OR `other` into self at the given offset, clipped to bounds.
    pub fn or_at(&mut self, other: &Mask, offset_x: i64, offset_y: i64) {
        for y in 0..other.height {
            let dy = y as i64 + offset_y;
            if dy < 0 || dy >= self.height as i64 {
                continue;
            }
            for x in 0..other.width {
                let dx = x as i64 + offset_x;
                if dx < 0 || dx >= self.width as i64 {
                    continue;
                }
                if other.is_set(x, y) {
                    self.set(dx as usize, dy as usize, 255);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_type_degradation_chain_ends_at_u8() {
        let mut ty = PixelType::Float64;
        let mut steps = 0;
        while let Some(next) = ty.degrade() {
            ty = next;
            steps += 1;
            assert!(steps < 10);
        }
        assert_eq!(ty, PixelType::UInt8);
    }

    #[test]
    fn raster_grow_preserves_content() {
        let mut r = Raster::new(2, 2, 3, PixelType::UInt8);
        r.set_rgb(1, 1, [1.0, 2.0, 3.0]);
        r.grow(4, 3, 1, 1);
        assert_eq!(r.width(), 4);
        assert_eq!(r.height(), 3);
        assert_eq!(r.rgb(2, 2), [1.0, 2.0, 3.0]);
        assert_eq!(r.rgb(0, 0), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn mask_or_at_clips() {
        let mut m = Mask::new(4, 4);
        let patch = Mask::full(3, 3);
        m.or_at(&patch, 2, 2);
        assert!(m.is_set(2, 2));
        assert!(m.is_set(3, 3));
        assert!(!m.is_set(1, 1));
    }

    #[test]
    fn from_vec_rejects_bad_sizes() {
        assert!(Raster::from_vec(2, 2, 3, PixelType::UInt8, vec![0.0; 11]).is_err());
        assert!(Raster::from_vec(2, 2, 2, PixelType::UInt8, vec![0.0; 8]).is_err());
    }
}
