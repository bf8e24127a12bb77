//! Decode-cycle contracts: the sink a driver paints into, the byte source it
//! pulls from, format negotiation, and the cycle error taxonomy.
//!
//! A format driver touches the rest of the system through exactly two seams.
//! It pulls compressed bytes from a [`ByteSource`] (a socket body, a file, a
//! slice) and pushes decoded pixels into a [`DecodeSink`]. Neither seam knows
//! about transports or pixel packing, which is what keeps drivers reusable
//! over any storage behind the sink.

use core::fmt;

use crate::color::Color;

/// Upper bound on decoder-reported pixel counts. Reports beyond it are
/// treated like allocation failure rather than attempted.
pub const MAX_PIXELS: u32 = 2048 * 2048;

// \x89PNG\r\n\x1a\n
pub(crate) const PNG_SIG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Bitstream format of a remote image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    /// Resolve from the first bytes of the stream at decode time.
    Auto,
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Map an HTTP `Content-Type` value to a concrete format. Parameters
    /// after `;` are ignored. `None` means the type names no known format.
    pub fn from_content_type(content_type: &str) -> Option<ImageFormat> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or(content_type)
            .trim();
        if mime.eq_ignore_ascii_case("image/png") {
            Some(ImageFormat::Png)
        } else if mime.eq_ignore_ascii_case("image/jpeg") || mime.eq_ignore_ascii_case("image/jpg")
        {
            Some(ImageFormat::Jpeg)
        } else {
            None
        }
    }

    /// Recognize a concrete format from the first bytes of a stream.
    /// Needs at most 8 bytes; shorter slices match nothing.
    pub fn sniff(header: &[u8]) -> Option<ImageFormat> {
        if header.len() >= PNG_SIG.len() && header[..PNG_SIG.len()] == PNG_SIG {
            Some(ImageFormat::Png)
        } else if header.len() >= 2 && header[0] == 0xFF && header[1] == 0xD8 {
            Some(ImageFormat::Jpeg)
        } else {
            None
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageFormat::Auto => "auto",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Png => "PNG",
        })
    }
}

/// Why a decode cycle failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The pixel canvas or decoder working memory could not be allocated.
    OutOfMemory,
    /// The driver reported zero-sized or implausibly large dimensions.
    BadDimensions { width: u32, height: u32 },
    /// No driver available for the negotiated format.
    UnsupportedFormat(ImageFormat),
    /// The byte source failed mid-stream.
    Source(&'static str),
    /// The bitstream violated its container format.
    Malformed(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::OutOfMemory => f.write_str("pixel canvas allocation failed"),
            DecodeError::BadDimensions { width, height } => {
                write!(f, "implausible image dimensions {}x{}", width, height)
            }
            DecodeError::UnsupportedFormat(format) => {
                write!(f, "no decoder for {} images", format)
            }
            DecodeError::Source(msg) | DecodeError::Malformed(msg) => f.write_str(msg),
        }
    }
}

impl core::error::Error for DecodeError {}

/// Receiving side of a streaming decode.
///
/// A driver makes exactly two kinds of call, in this order:
///
/// 1. [`report_dimensions`](Self::report_dimensions) once, before any paint,
///    with the intrinsic size of the image being decoded. Repeated reports
///    within one cycle are ignored.
/// 2. [`paint_region`](Self::paint_region) any number of times, in any
///    spatial order, at coordinates relative to the image origin. The sink
///    clips; drivers never need to.
///
/// Both return `()`. A sink that cannot honor a report (out of memory,
/// absurd dimensions) records the failure internally and lets the rest of
/// the cycle run against nothing, so drivers carry no abort plumbing.
pub trait DecodeSink {
    fn report_dimensions(&mut self, width: u32, height: u32);
    fn paint_region(&mut self, x: u32, y: u32, width: u32, height: u32, color: Color);
}

/// Sequential byte source a driver pulls from.
///
/// Implemented for `&[u8]` and for `FnMut(&mut [u8]) -> Result<usize,
/// &'static str>` closures, which is usually all a transport glue layer
/// needs to adapt a socket body.
pub trait ByteSource {
    /// Read up to `buf.len()` bytes, returning how many were read.
    /// `Ok(0)` means the stream has ended.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, &'static str>;

    /// Fill `buf` completely or fail.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), &'static str> {
        let mut done = 0;
        while done < buf.len() {
            match self.read(&mut buf[done..])? {
                0 => return Err("source: unexpected end of stream"),
                n => done += n,
            }
        }
        Ok(())
    }

    /// Discard the next `n` bytes.
    fn skip(&mut self, mut n: usize) -> Result<(), &'static str> {
        let mut scratch = [0u8; 64];
        while n > 0 {
            let chunk = n.min(scratch.len());
            self.read_exact(&mut scratch[..chunk])?;
            n -= chunk;
        }
        Ok(())
    }
}

impl ByteSource for &[u8] {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, &'static str> {
        let n = self.len().min(buf.len());
        buf[..n].copy_from_slice(&self[..n]);
        *self = &self[n..];
        Ok(n)
    }
}

impl<F> ByteSource for F
where
    F: FnMut(&mut [u8]) -> Result<usize, &'static str>,
{
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, &'static str> {
        self(buf)
    }
}
