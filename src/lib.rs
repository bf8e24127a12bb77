// online-image: remote raster images as bit-packed canvases for embedded displays.
// color:  RGBA color value + projections to packed display depths
// buffer: bit-packed pixel canvas (1/8/16/24/32 bpp behind one type)
// decode: decode-sink and byte-source seams, format negotiation, errors
// image:  the online image entity: sizing policy, update cycle, pixel facade
// png:    streaming PNG driver feeding the sink (inflate via miniz_oxide)

#![no_std]

extern crate alloc;

pub mod buffer;
pub mod color;
pub mod decode;
pub mod image;

#[cfg(feature = "png")]
pub mod png;

pub use buffer::{ImageType, PixelBuffer};
pub use color::Color;
pub use decode::{ByteSource, DecodeError, DecodeSink, ImageFormat};
pub use image::OnlineImage;
