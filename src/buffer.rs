//! Bit-packed pixel canvas: one buffer type behind five storage depths.
//!
//! Pixels are packed row-major with no per-row padding; for the 1 bpp depth
//! consecutive pixels share bytes MSB-first, so a canvas is exactly
//! `ceil(bpp · w · h / 8)` bytes. Writes reduce a full [`Color`] to the
//! canvas depth, reads reconstruct it at native precision, and both silently
//! ignore coordinates outside the canvas.

use alloc::vec::Vec;

use crate::color::Color;

/// Storage depth of a pixel canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageType {
    /// 1 bpp, MSB-first; a set bit is "on" (luma >= 128 at write time).
    Binary,
    /// 8 bpp BT.601 luma.
    Grayscale,
    /// 16 bpp, 5-6-5, most significant byte first.
    Rgb565,
    /// 24 bpp RGB.
    Rgb,
    /// 32 bpp RGBA.
    Rgba,
}

impl ImageType {
    pub const fn bits_per_pixel(self) -> usize {
        match self {
            ImageType::Binary => 1,
            ImageType::Grayscale => 8,
            ImageType::Rgb565 => 16,
            ImageType::Rgb => 24,
            ImageType::Rgba => 32,
        }
    }
}

/// Packed pixel canvas. Starts empty (0x0, no allocation) and only ever
/// holds one allocation at a time; [`resize`](Self::resize) releases the old
/// canvas before reserving the new one.
pub struct PixelBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    image_type: ImageType,
}

impl PixelBuffer {
    /// New empty canvas of the given storage depth.
    pub const fn new(image_type: ImageType) -> Self {
        Self {
            data: Vec::new(),
            width: 0,
            height: 0,
            image_type,
        }
    }

    /// Bytes needed for a `width`×`height` canvas at this depth:
    /// `ceil(bpp · w · h / 8)`, rows bit-continuous.
    pub const fn required_size(image_type: ImageType, width: u32, height: u32) -> usize {
        (image_type.bits_per_pixel() * width as usize * height as usize).div_ceil(8)
    }

    /// Byte offset holding (the first bits of) the pixel at `(x, y)`:
    /// `((x + y · width) · bpp) / 8`, truncating. For the 1 bpp depth the
    /// bit lane inside that byte is MSB-first.
    pub fn position(&self, x: u32, y: u32) -> usize {
        (x as usize + y as usize * self.width as usize) * self.image_type.bits_per_pixel() / 8
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    pub const fn image_type(&self) -> ImageType {
        self.image_type
    }

    /// The raw packed bytes, ready to hand to a display driver.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reallocate for `width`×`height`, zero-filled. The old canvas is
    /// dropped first so the peak working set stays at one canvas. On failure
    /// the buffer is left in the empty state.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), &'static str> {
        let bits = self
            .image_type
            .bits_per_pixel()
            .checked_mul(width as usize)
            .and_then(|b| b.checked_mul(height as usize))
            .ok_or("buffer: canvas dimensions overflow")?;
        let size = bits.div_ceil(8);

        self.release();

        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| "buffer: OOM for pixel canvas")?;
        data.resize(size, 0);

        self.data = data;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Drop the allocation and return to the empty 0x0 state.
    pub fn release(&mut self) {
        self.data = Vec::new();
        self.width = 0;
        self.height = 0;
    }

    /// Store `color` at `(x, y)` in the canvas's packed form. Writes outside
    /// the canvas are ignored, so decoder overdraw at image edges is safe.
    pub fn write(&mut self, x: u32, y: u32, color: Color) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = x as usize + y as usize * self.width as usize;
        let pos = idx * self.image_type.bits_per_pixel() / 8;
        match self.image_type {
            ImageType::Binary => {
                // read-modify-write keeps the other seven pixels in the byte
                let mask = 0x80 >> (idx % 8);
                if color.is_on() {
                    self.data[pos] |= mask;
                } else {
                    self.data[pos] &= !mask;
                }
            }
            ImageType::Grayscale => {
                self.data[pos] = color.luminance();
            }
            ImageType::Rgb565 => {
                let raw = color.to_rgb565();
                self.data[pos] = (raw >> 8) as u8;
                self.data[pos + 1] = raw as u8;
            }
            ImageType::Rgb => {
                self.data[pos] = color.r;
                self.data[pos + 1] = color.g;
                self.data[pos + 2] = color.b;
            }
            ImageType::Rgba => {
                self.data[pos] = color.r;
                self.data[pos + 1] = color.g;
                self.data[pos + 2] = color.b;
                self.data[pos + 3] = color.a;
            }
        }
    }

    /// Reconstruct the pixel at `(x, y)` at the canvas's native precision.
    /// Out-of-bounds reads return [`Color::TRANSPARENT`].
    pub fn read(&self, x: u32, y: u32) -> Color {
        if x >= self.width || y >= self.height {
            return Color::TRANSPARENT;
        }
        let idx = x as usize + y as usize * self.width as usize;
        let pos = idx * self.image_type.bits_per_pixel() / 8;
        match self.image_type {
            ImageType::Binary => {
                if self.data[pos] & (0x80 >> (idx % 8)) != 0 {
                    Color::WHITE
                } else {
                    Color::BLACK
                }
            }
            ImageType::Grayscale => {
                let y = self.data[pos];
                Color::rgb(y, y, y)
            }
            ImageType::Rgb565 => {
                let raw = (self.data[pos] as u16) << 8 | self.data[pos + 1] as u16;
                Color::from_rgb565(raw)
            }
            ImageType::Rgb => Color::rgb(self.data[pos], self.data[pos + 1], self.data[pos + 2]),
            ImageType::Rgba => Color::new(
                self.data[pos],
                self.data[pos + 1],
                self.data[pos + 2],
                self.data[pos + 3],
            ),
        }
    }

    /// Solid fill of a rectangle, clipped to the canvas. Zero-sized rects
    /// and rects entirely outside are no-ops.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: Color) {
        let x1 = x.saturating_add(width).min(self.width);
        let y1 = y.saturating_add(height).min(self.height);
        if x >= x1 || y >= y1 {
            return;
        }
        for yy in y..y1 {
            for xx in x..x1 {
                self.write(xx, yy, color);
            }
        }
    }
}
