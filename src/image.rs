//! The online image entity: canvas sizing policy, the fetch-decode update
//! cycle, and the pixel read facade a rendering surface draws from.
//!
//! [`OnlineImage`] owns one [`PixelBuffer`] and implements [`DecodeSink`], so
//! a format driver can paint straight into it. Transport stays outside: the
//! caller's fetch glue establishes the stream and hands [`update`]
//! (Self::update) a [`ByteSource`] for the response body. Between updates the
//! image is a plain read-only pixel rectangle.
//!
//! A cycle that cannot size its canvas (allocation failure, implausible
//! dimensions) leaves the image empty, and reads from an empty canvas answer
//! transparent black. A stream that dies mid-image keeps whatever rows were
//! painted; callers that would rather show nothing than a torn frame call
//! [`release`](OnlineImage::release) on error.

use alloc::string::String;
use embedded_graphics_core::geometry::{OriginDimensions, Size};
use embedded_graphics_core::pixelcolor::{Gray8, Rgb565};
use log::{info, warn};

use crate::buffer::{ImageType, PixelBuffer};
use crate::color::Color;
use crate::decode::{ByteSource, DecodeError, DecodeSink, ImageFormat, MAX_PIXELS};

const DEFAULT_DOWNLOAD_BUFFER: usize = 2048;

/// A raster image fetched from a URL and kept as a bit-packed canvas.
pub struct OnlineImage {
    url: String,
    format: ImageFormat,
    buffer: PixelBuffer,
    fixed_width: u32,
    fixed_height: u32,
    download_buffer_size: usize,
    dims_reported: bool,
    cycle_failure: Option<DecodeError>,
}

impl OnlineImage {
    /// New auto-sizing image for `url`, stored at the given depth. Nothing
    /// is fetched or allocated until the first [`update`](Self::update).
    pub fn new(url: &str, format: ImageFormat, image_type: ImageType) -> Self {
        Self {
            url: String::from(url),
            format,
            buffer: PixelBuffer::new(image_type),
            fixed_width: 0,
            fixed_height: 0,
            download_buffer_size: DEFAULT_DOWNLOAD_BUFFER,
            dims_reported: false,
            cycle_failure: None,
        }
    }

    /// Pin the canvas to `width`×`height` regardless of what is decoded;
    /// content outside is clipped. Passing 0 for either keeps auto-sizing.
    pub fn with_fixed_size(mut self, width: u32, height: u32) -> Self {
        self.fixed_width = width;
        self.fixed_height = height;
        self
    }

    /// Advisory chunk size for the caller's fetch glue. Stored and exposed
    /// only; decoding itself reads whatever the source hands over.
    pub fn with_download_buffer_size(mut self, size: usize) -> Self {
        self.download_buffer_size = size;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Point at a new source URL. No fetch happens here; the caller's
    /// scheduler decides when to run [`update`](Self::update) again.
    pub fn set_url(&mut self, url: &str) {
        self.url.clear();
        self.url.push_str(url);
    }

    pub const fn format(&self) -> ImageFormat {
        self.format
    }

    pub const fn image_type(&self) -> ImageType {
        self.buffer.image_type()
    }

    pub const fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub const fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub const fn download_buffer_size(&self) -> usize {
        self.download_buffer_size
    }

    /// The backing canvas, for display glue that blits raw packed bytes.
    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    /// Free the canvas and return to the empty state. The next dimension
    /// report is honored again, so a later cycle can allocate afresh.
    pub fn release(&mut self) {
        self.buffer.release();
        self.dims_reported = false;
    }

    /// Arm the sink for a fresh decode cycle: the next
    /// [`report_dimensions`](DecodeSink::report_dimensions) may resize the
    /// canvas again. [`update`](Self::update) does this itself; callers
    /// running an external driver against the [`DecodeSink`] impl call it
    /// once before each cycle.
    pub fn begin_cycle(&mut self) {
        self.dims_reported = false;
        self.cycle_failure = None;
    }

    /// Run one decode cycle against `source`, an already-established stream
    /// of the image bitstream (the response body, not the headers).
    ///
    /// With [`ImageFormat::Auto`] the first eight bytes are sniffed and then
    /// replayed to the driver, so the source needs no rewind support.
    /// Failures before the driver reports dimensions leave any previous
    /// canvas untouched; a sizing failure empties it.
    pub fn update<S: ByteSource>(&mut self, source: &mut S) -> Result<(), DecodeError> {
        self.begin_cycle();

        match self.format {
            ImageFormat::Auto => {
                let mut head = [0u8; 8];
                source.read_exact(&mut head).map_err(DecodeError::Source)?;
                let format = ImageFormat::sniff(&head)
                    .ok_or(DecodeError::UnsupportedFormat(ImageFormat::Auto))?;
                let mut replay = Replay {
                    head,
                    pos: 0,
                    inner: source,
                };
                self.decode_as(format, &mut replay)
            }
            format => self.decode_as(format, source),
        }
    }

    fn decode_as<S: ByteSource>(
        &mut self,
        format: ImageFormat,
        source: &mut S,
    ) -> Result<(), DecodeError> {
        let result = self.run_driver(format, source);
        // a latched sink failure is the root cause; it outranks whatever the
        // driver stumbled over afterwards
        if let Some(failure) = self.cycle_failure.take() {
            warn!("image: update of '{}' failed: {}", self.url, failure);
            return Err(failure);
        }
        result
    }

    #[cfg(feature = "png")]
    fn run_driver<S: ByteSource>(
        &mut self,
        format: ImageFormat,
        source: &mut S,
    ) -> Result<(), DecodeError> {
        match format {
            ImageFormat::Png => crate::png::decode(source, self),
            other => Err(DecodeError::UnsupportedFormat(other)),
        }
    }

    #[cfg(not(feature = "png"))]
    fn run_driver<S: ByteSource>(
        &mut self,
        format: ImageFormat,
        _source: &mut S,
    ) -> Result<(), DecodeError> {
        Err(DecodeError::UnsupportedFormat(format))
    }

    /// Binary truth value of the pixel: luma of the read-back at or above
    /// the 128 midpoint. Out-of-bounds is `false`.
    pub fn get_pixel(&self, x: i32, y: i32) -> bool {
        self.read_checked(x, y).is_on()
    }

    /// Full RGBA reconstruction of the stored pixel.
    pub fn get_rgba_pixel(&self, x: i32, y: i32) -> Color {
        self.read_checked(x, y)
    }

    /// Native-depth reconstruction. Reads already reconstruct at the
    /// canvas's own precision, so this coincides with
    /// [`get_rgba_pixel`](Self::get_rgba_pixel).
    pub fn get_color_pixel(&self, x: i32, y: i32) -> Color {
        self.read_checked(x, y)
    }

    pub fn get_rgb565_pixel(&self, x: i32, y: i32) -> Rgb565 {
        self.read_checked(x, y).into()
    }

    pub fn get_grayscale_pixel(&self, x: i32, y: i32) -> Gray8 {
        self.read_checked(x, y).into()
    }

    fn read_checked(&self, x: i32, y: i32) -> Color {
        if x < 0 || y < 0 {
            return Color::TRANSPARENT;
        }
        self.buffer.read(x as u32, y as u32)
    }

    fn auto_resize(&self) -> bool {
        self.fixed_width == 0 || self.fixed_height == 0
    }

    fn reject_dimensions(&mut self, width: u32, height: u32) {
        warn!("image: rejecting implausible {}x{} canvas", width, height);
        self.buffer.release();
        self.cycle_failure = Some(DecodeError::BadDimensions { width, height });
    }
}

impl DecodeSink for OnlineImage {
    fn report_dimensions(&mut self, width: u32, height: u32) {
        if self.dims_reported {
            return;
        }
        self.dims_reported = true;

        if !plausible(width, height) {
            self.reject_dimensions(width, height);
            return;
        }
        let (w, h) = if self.auto_resize() {
            (width, height)
        } else {
            (self.fixed_width, self.fixed_height)
        };
        if !plausible(w, h) {
            // fixed dimensions can be configured absurd too
            self.reject_dimensions(w, h);
            return;
        }

        if w == self.buffer.width() && h == self.buffer.height() && !self.buffer.is_empty() {
            // live canvas already fits; content is overpainted in place
            return;
        }
        match self.buffer.resize(w, h) {
            Ok(()) => info!(
                "image: canvas {}x{} ({} bytes)",
                w,
                h,
                self.buffer.data().len()
            ),
            Err(msg) => {
                warn!("image: {}", msg);
                self.cycle_failure = Some(DecodeError::OutOfMemory);
            }
        }
    }

    fn paint_region(&mut self, x: u32, y: u32, width: u32, height: u32, color: Color) {
        // clipping lives in the buffer; after a failed report the canvas is
        // empty and every paint clips to nothing
        self.buffer.fill_rect(x, y, width, height, color);
    }
}

impl OriginDimensions for OnlineImage {
    fn size(&self) -> Size {
        Size::new(self.buffer.width(), self.buffer.height())
    }
}

fn plausible(width: u32, height: u32) -> bool {
    width != 0 && height != 0 && width.saturating_mul(height) <= MAX_PIXELS
}

// replays the sniffed header bytes ahead of the live stream
struct Replay<'a, S> {
    head: [u8; 8],
    pos: usize,
    inner: &'a mut S,
}

impl<S: ByteSource> ByteSource for Replay<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, &'static str> {
        if self.pos < self.head.len() {
            let n = (self.head.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.head[self.pos..self.pos + n]);
            self.pos += n;
            return Ok(n);
        }
        self.inner.read(buf)
    }
}
