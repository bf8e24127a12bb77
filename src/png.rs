// Streaming PNG driver for the decode sink.
// Walks chunks sequentially (signature, IHDR, PLTE, IDAT) pulling from a
// ByteSource in 4KB slabs; IDAT inflates through a 32KB ring dictionary and
// each row is unfiltered and painted the moment it completes, so neither the
// compressed stream nor the decoded image is ever resident here.
// Colour types: 0=greyscale, 2=RGB, 3=palette, 4=grey+alpha, 6=RGBA;
// bit depths 1/2/4/8/16 (16-bit samples keep the high byte).
// Interlaced (Adam7) rejected. Chunk CRCs are not validated.

extern crate alloc;

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use crate::color::Color;
use crate::decode::{ByteSource, DecodeError, DecodeSink, MAX_PIXELS, PNG_SIG};

const CHUNK_IHDR: [u8; 4] = *b"IHDR";
const CHUNK_PLTE: [u8; 4] = *b"PLTE";
const CHUNK_IDAT: [u8; 4] = *b"IDAT";
const CHUNK_IEND: [u8; 4] = *b"IEND";

const COLOR_GREYSCALE: u8 = 0;
const COLOR_RGB: u8 = 2;
const COLOR_PALETTE: u8 = 3;
const COLOR_GREY_ALPHA: u8 = 4;
const COLOR_RGBA: u8 = 6;

const FILTER_NONE: u8 = 0;
const FILTER_SUB: u8 = 1;
const FILTER_UP: u8 = 2;
const FILTER_AVERAGE: u8 = 3;
const FILTER_PAETH: u8 = 4;

// miniz_oxide LZ dictionary size; must be a power of two >= 32768
const DICT_SIZE: usize = 32_768;

// chunk size for streaming source reads
const READ_BUF: usize = 4096;

/// Decode one PNG stream from `src`, painting into `sink`.
///
/// Dimensions are reported once, after header validation and before any
/// paint. Rows are painted top-to-bottom as solid runs of equal colour, one
/// [`paint_region`](DecodeSink::paint_region) call per run. Returns when the
/// zlib stream ends; trailing chunks (IEND) are left unread in the source.
pub fn decode<R: ByteSource, S: DecodeSink>(src: &mut R, sink: &mut S) -> Result<(), DecodeError> {
    // PNG signature
    let mut sig = [0u8; 8];
    src.read_exact(&mut sig).map_err(DecodeError::Source)?;
    if sig != PNG_SIG {
        return Err(DecodeError::Malformed("png: invalid signature"));
    }

    // IHDR (must be first chunk)
    let mut chunk_hdr = [0u8; 8]; // 4-byte length + 4-byte type
    src.read_exact(&mut chunk_hdr).map_err(DecodeError::Source)?;
    let ihdr_len = be_u32(&chunk_hdr, 0) as usize;
    if [chunk_hdr[4], chunk_hdr[5], chunk_hdr[6], chunk_hdr[7]] != CHUNK_IHDR || ihdr_len < 13 {
        return Err(DecodeError::Malformed("png: missing or invalid IHDR"));
    }
    let mut ihdr_raw = [0u8; 13];
    src.read_exact(&mut ihdr_raw).map_err(DecodeError::Source)?;
    if ihdr_len > 13 {
        src.skip(ihdr_len - 13).map_err(DecodeError::Source)?;
    }
    src.skip(4).map_err(DecodeError::Source)?; // skip CRC

    let header = PngHeader {
        width: be_u32(&ihdr_raw, 0),
        height: be_u32(&ihdr_raw, 4),
        bit_depth: ihdr_raw[8],
        color_type: ihdr_raw[9],
    };
    if header.width == 0 || header.height == 0 {
        return Err(DecodeError::Malformed("png: zero dimensions"));
    }
    if ihdr_raw[12] != 0 {
        return Err(DecodeError::Malformed("png: interlaced PNGs not supported"));
    }
    match (header.color_type, header.bit_depth) {
        (COLOR_GREYSCALE, 1 | 2 | 4 | 8 | 16) => {}
        (COLOR_RGB, 8 | 16) => {}
        (COLOR_PALETTE, 1 | 2 | 4 | 8) => {}
        (COLOR_GREY_ALPHA, 8 | 16) => {}
        (COLOR_RGBA, 8 | 16) => {}
        _ => return Err(DecodeError::Malformed("png: unsupported colour type / bit depth")),
    }
    if header.width.saturating_mul(header.height) > MAX_PIXELS {
        return Err(DecodeError::Malformed("png: image exceeds pixel limit"));
    }

    log::info!(
        "png: streaming {}x{} (colour type {}, depth {})",
        header.width,
        header.height,
        header.color_type,
        header.bit_depth
    );
    sink.report_dimensions(header.width, header.height);

    // scan for PLTE, skip to first IDAT
    let mut plte: Option<Vec<u8>> = None;
    let first_idat_len: usize;
    loop {
        src.read_exact(&mut chunk_hdr).map_err(DecodeError::Source)?;
        let clen = be_u32(&chunk_hdr, 0) as usize;
        let ctype = [chunk_hdr[4], chunk_hdr[5], chunk_hdr[6], chunk_hdr[7]];
        if ctype == CHUNK_IDAT {
            first_idat_len = clen;
            break;
        } else if ctype == CHUNK_IEND {
            return Err(DecodeError::Malformed("png: no IDAT data"));
        } else if ctype == CHUNK_PLTE && clen <= 768 && clen % 3 == 0 {
            let mut p = Vec::new();
            p.try_reserve_exact(clen)
                .map_err(|_| DecodeError::OutOfMemory)?;
            p.resize(clen, 0);
            src.read_exact(&mut p).map_err(DecodeError::Source)?;
            src.skip(4).map_err(DecodeError::Source)?; // CRC
            plte = Some(p);
        } else {
            // clen is stream-controlled; on 32-bit targets clen + 4 can wrap
            let skip = clen
                .checked_add(4)
                .ok_or(DecodeError::Malformed("png: chunk length overflow"))?;
            src.skip(skip).map_err(DecodeError::Source)?; // data + CRC
        }
    }

    if header.color_type == COLOR_PALETTE && plte.is_none() {
        return Err(DecodeError::Malformed("png: palette image without PLTE"));
    }
    let palette = plte.unwrap_or_default();

    let scanline_bytes = header.scanline_bytes();
    let bpp = header.bytes_per_pixel();

    // scanline accumulator: 1 filter byte + scanline_bytes
    let mut prev_row = vec![0u8; scanline_bytes];
    let mut curr_row = vec![0u8; scanline_bytes];
    let row_total = 1 + scanline_bytes;
    let mut row_buf = vec![0u8; row_total];
    let mut row_pos: usize = 0;

    // streaming zlib decompressor for IDAT data (~11KB, kept off the stack)
    let decomp_layout = core::alloc::Layout::new::<miniz_oxide::inflate::core::DecompressorOxide>();
    let decomp_ptr = unsafe { alloc::alloc::alloc_zeroed(decomp_layout) };
    if decomp_ptr.is_null() {
        return Err(DecodeError::OutOfMemory);
    }
    let mut decomp =
        unsafe { Box::from_raw(decomp_ptr as *mut miniz_oxide::inflate::core::DecompressorOxide) };
    let mut dict = vec![0u8; DICT_SIZE];
    let mut dict_pos: usize = 0;
    let mut src_y: usize = 0;

    // feed IDAT chunks into zlib row-by-row
    let mut idat_buf = [0u8; READ_BUF];
    let mut in_avail: usize = 0;
    let mut idat_chunk_left = first_idat_len;
    let mut more_idat = true;

    loop {
        // top up input buffer from the IDAT stream
        while in_avail < READ_BUF {
            if idat_chunk_left > 0 {
                let space = READ_BUF - in_avail;
                let want = idat_chunk_left.min(space);
                src.read_exact(&mut idat_buf[in_avail..in_avail + want])
                    .map_err(DecodeError::Source)?;
                in_avail += want;
                idat_chunk_left -= want;
            } else if more_idat {
                src.skip(4).map_err(DecodeError::Source)?; // CRC
                src.read_exact(&mut chunk_hdr).map_err(DecodeError::Source)?;
                let clen = be_u32(&chunk_hdr, 0) as usize;
                let ctype = [chunk_hdr[4], chunk_hdr[5], chunk_hdr[6], chunk_hdr[7]];
                if ctype == CHUNK_IDAT {
                    idat_chunk_left = clen;
                } else {
                    more_idat = false;
                    break;
                }
            } else {
                break;
            }
        }

        let has_more = idat_chunk_left > 0 || more_idat;
        let flags = miniz_oxide::inflate::core::inflate_flags::TINFL_FLAG_PARSE_ZLIB_HEADER
            | if has_more {
                miniz_oxide::inflate::core::inflate_flags::TINFL_FLAG_HAS_MORE_INPUT
            } else {
                0
            };

        let write_pos = dict_pos & (DICT_SIZE - 1);
        let (status, consumed, produced) = miniz_oxide::inflate::core::decompress(
            &mut *decomp,
            &idat_buf[..in_avail],
            &mut dict,
            write_pos,
            flags,
        );

        if consumed > 0 && consumed < in_avail {
            idat_buf.copy_within(consumed..in_avail, 0);
        }
        in_avail -= consumed;

        // feed decompressed bytes into the scanline accumulator
        for i in 0..produced {
            row_buf[row_pos] = dict[(write_pos + i) & (DICT_SIZE - 1)];
            row_pos += 1;

            if row_pos == row_total {
                let filter = row_buf[0];
                curr_row.copy_from_slice(&row_buf[1..]);

                unfilter_row(filter, &mut curr_row, &prev_row, bpp);

                if src_y < header.height as usize {
                    paint_row(sink, &curr_row, src_y as u32, &header, &palette);
                }

                core::mem::swap(&mut prev_row, &mut curr_row);
                row_pos = 0;
                src_y += 1;
            }
        }

        dict_pos += produced;

        match status {
            miniz_oxide::inflate::TINFLStatus::Done => break,
            miniz_oxide::inflate::TINFLStatus::NeedsMoreInput => {
                // only reachable while more IDAT data is coming
                if consumed == 0 && produced == 0 && in_avail >= READ_BUF {
                    return Err(DecodeError::Malformed("png: IDAT decompression stuck"));
                }
            }
            miniz_oxide::inflate::TINFLStatus::HasMoreOutput => {
                // dictionary full; ring buffer recycles automatically
                if produced == 0 && consumed == 0 {
                    return Err(DecodeError::Malformed("png: decompression stalled (output)"));
                }
            }
            // the zlib stream wants bytes past the final IDAT chunk
            miniz_oxide::inflate::TINFLStatus::FailedCannotMakeProgress => {
                return Err(DecodeError::Malformed("png: truncated IDAT stream"));
            }
            _ => return Err(DecodeError::Malformed("png: IDAT decompression error")),
        }
    }

    if src_y < header.height as usize {
        log::warn!("png: expected {} rows, got {}", header.height, src_y);
    }

    Ok(())
}

struct PngHeader {
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: u8,
}

impl PngHeader {
    // bytes per complete pixel; filter stride for Sub/Paeth; 1 for sub-byte depths
    fn bytes_per_pixel(&self) -> usize {
        let channels: usize = match self.color_type {
            COLOR_GREYSCALE => 1,
            COLOR_RGB => 3,
            COLOR_PALETTE => 1,
            COLOR_GREY_ALPHA => 2,
            COLOR_RGBA => 4,
            _ => 1,
        };
        if self.bit_depth >= 8 {
            channels * (self.bit_depth as usize / 8)
        } else {
            1 // sub-byte packed
        }
    }

    // byte length of one unfiltered row (without the leading filter byte)
    fn scanline_bytes(&self) -> usize {
        let bits_per_pixel: usize = match self.color_type {
            COLOR_GREYSCALE => self.bit_depth as usize,
            COLOR_RGB => 3 * self.bit_depth as usize,
            COLOR_PALETTE => self.bit_depth as usize,
            COLOR_GREY_ALPHA => 2 * self.bit_depth as usize,
            COLOR_RGBA => 4 * self.bit_depth as usize,
            _ => self.bit_depth as usize,
        };
        (self.width as usize * bits_per_pixel).div_ceil(8)
    }
}

// big-endian u32 (PNG uses network byte order)
#[inline]
fn be_u32(d: &[u8], o: usize) -> u32 {
    u32::from_be_bytes([d[o], d[o + 1], d[o + 2], d[o + 3]])
}

// emit one unfiltered scanline as coalesced solid runs
fn paint_row<S: DecodeSink>(sink: &mut S, row: &[u8], y: u32, hdr: &PngHeader, palette: &[u8]) {
    let mut run_x = 0u32;
    let mut run_color = pixel_color(row, 0, hdr, palette);
    for x in 1..hdr.width {
        let color = pixel_color(row, x as usize, hdr, palette);
        if color != run_color {
            sink.paint_region(run_x, y, x - run_x, 1, run_color);
            run_x = x;
            run_color = color;
        }
    }
    sink.paint_region(run_x, y, hdr.width - run_x, 1, run_color);
}

// sample one pixel from an unfiltered scanline as a full RGBA colour.
// alpha rides along untouched; the sink's storage decides what to keep.
#[inline]
fn pixel_color(row: &[u8], x: usize, hdr: &PngHeader, palette: &[u8]) -> Color {
    match (hdr.color_type, hdr.bit_depth) {
        // greyscale
        (COLOR_GREYSCALE, 8) => grey(row[x]),
        (COLOR_GREYSCALE, 16) => grey(row[x * 2]), // high byte only
        (COLOR_GREYSCALE, bd) => grey(unpack_sub_byte(row, x, bd)),

        // RGB
        (COLOR_RGB, 8) => Color::rgb(row[x * 3], row[x * 3 + 1], row[x * 3 + 2]),
        (COLOR_RGB, 16) => Color::rgb(row[x * 6], row[x * 6 + 2], row[x * 6 + 4]),

        // palette
        (COLOR_PALETTE, 8) => palette_color(palette, row[x] as usize),
        (COLOR_PALETTE, bd) => {
            palette_color(palette, unpack_sub_byte_raw(row, x, bd) as usize)
        }

        // greyscale + alpha
        (COLOR_GREY_ALPHA, 8) => {
            let g = row[x * 2];
            Color::new(g, g, g, row[x * 2 + 1])
        }
        (COLOR_GREY_ALPHA, 16) => {
            let g = row[x * 4];
            Color::new(g, g, g, row[x * 4 + 2])
        }

        // RGBA
        (COLOR_RGBA, 8) => Color::new(
            row[x * 4],
            row[x * 4 + 1],
            row[x * 4 + 2],
            row[x * 4 + 3],
        ),
        (COLOR_RGBA, 16) => Color::new(
            row[x * 8],
            row[x * 8 + 2],
            row[x * 8 + 4],
            row[x * 8 + 6],
        ),

        _ => Color::TRANSPARENT, // unreachable for validated header
    }
}

#[inline]
fn grey(g: u8) -> Color {
    Color::rgb(g, g, g)
}

// out-of-range palette indices read as black, same as a zeroed LUT entry
#[inline]
fn palette_color(palette: &[u8], idx: usize) -> Color {
    let i = idx * 3;
    if i + 3 <= palette.len() {
        Color::rgb(palette[i], palette[i + 1], palette[i + 2])
    } else {
        Color::BLACK
    }
}

// unpack a sub-byte greyscale sample (1/2/4 bit) and scale to 0-255
#[inline]
fn unpack_sub_byte(row: &[u8], x: usize, bit_depth: u8) -> u8 {
    let raw = unpack_sub_byte_raw(row, x, bit_depth);
    let max = (1u16 << bit_depth) - 1;
    (raw as u16 * 255 / max) as u8
}

// unpack a sub-byte sample without rescaling (for palette index)
#[inline]
fn unpack_sub_byte_raw(row: &[u8], x: usize, bit_depth: u8) -> u8 {
    let bpp = bit_depth as usize;
    let ppb = 8 / bpp; // pixels per byte
    let byte_idx = x / ppb;
    let bit_offset = (ppb - 1 - x % ppb) * bpp;
    let mask = (1u8 << bpp) - 1;
    (row[byte_idx] >> bit_offset) & mask
}

// reconstruct one scanline in-place given the previous unfiltered row; bpp = byte stride
fn unfilter_row(filter: u8, row: &mut [u8], prev: &[u8], bpp: usize) {
    let len = row.len();
    match filter {
        FILTER_NONE => {}
        FILTER_SUB => {
            for i in bpp..len {
                row[i] = row[i].wrapping_add(row[i - bpp]);
            }
        }
        FILTER_UP => {
            for i in 0..len {
                row[i] = row[i].wrapping_add(prev[i]);
            }
        }
        FILTER_AVERAGE => {
            for i in 0..len {
                let a = if i >= bpp { row[i - bpp] as u16 } else { 0 };
                let b = prev[i] as u16;
                row[i] = row[i].wrapping_add(((a + b) / 2) as u8);
            }
        }
        FILTER_PAETH => {
            for i in 0..len {
                let a = if i >= bpp { row[i - bpp] } else { 0 };
                let b = prev[i];
                let c = if i >= bpp { prev[i - bpp] } else { 0 };
                row[i] = row[i].wrapping_add(paeth(a, b, c));
            }
        }
        _ => {} // unknown filter; treat as None (best-effort)
    }
}

#[inline]
fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let a = a as i16;
    let b = b as i16;
    let c = c as i16;
    let p = a + b - c;
    let pa = (p - a).unsigned_abs();
    let pb = (p - b).unsigned_abs();
    let pc = (p - c).unsigned_abs();
    if pa <= pb && pa <= pc {
        a as u8
    } else if pb <= pc {
        b as u8
    } else {
        c as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        dims: Option<(u32, u32)>,
        paints: Vec<(u32, u32, u32, u32, Color)>,
    }

    impl DecodeSink for RecordingSink {
        fn report_dimensions(&mut self, width: u32, height: u32) {
            self.dims = Some((width, height));
        }
        fn paint_region(&mut self, x: u32, y: u32, width: u32, height: u32, color: Color) {
            self.paints.push((x, y, width, height, color));
        }
    }

    fn chunk(out: &mut Vec<u8>, ctype: &[u8; 4], data: &[u8]) {
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(ctype);
        out.extend_from_slice(data);
        out.extend_from_slice(&[0; 4]); // CRC, not validated
    }

    // minimal single-IDAT PNG; filter bytes included in raw_rows
    fn png_bytes(
        width: u32,
        height: u32,
        bit_depth: u8,
        color_type: u8,
        palette: Option<&[u8]>,
        raw_rows: &[u8],
    ) -> Vec<u8> {
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&width.to_be_bytes());
        ihdr.extend_from_slice(&height.to_be_bytes());
        ihdr.extend_from_slice(&[bit_depth, color_type, 0, 0, 0]);

        let mut png = PNG_SIG.to_vec();
        chunk(&mut png, b"IHDR", &ihdr);
        if let Some(p) = palette {
            chunk(&mut png, b"PLTE", p);
        }
        let idat = miniz_oxide::deflate::compress_to_vec_zlib(raw_rows, 6);
        chunk(&mut png, b"IDAT", &idat);
        chunk(&mut png, b"IEND", &[]);
        png
    }

    fn run(png: &[u8]) -> (RecordingSink, Result<(), DecodeError>) {
        let mut sink = RecordingSink::default();
        let mut src = png;
        let result = decode(&mut src, &mut sink);
        (sink, result)
    }

    #[test]
    fn rgba8_pixels_arrive_row_major() {
        let raw = [
            0, 255, 0, 0, 255, 0, 255, 0, 128, // row 0: red, half-green
            0, 0, 0, 255, 255, 255, 255, 255, 0, // row 1: blue, clear white
        ];
        let png = png_bytes(2, 2, 8, COLOR_RGBA, None, &raw);
        let (sink, result) = run(&png);
        result.unwrap();
        assert_eq!(sink.dims, Some((2, 2)));
        assert_eq!(
            sink.paints,
            vec![
                (0, 0, 1, 1, Color::new(255, 0, 0, 255)),
                (1, 0, 1, 1, Color::new(0, 255, 0, 128)),
                (0, 1, 1, 1, Color::new(0, 0, 255, 255)),
                (1, 1, 1, 1, Color::new(255, 255, 255, 0)),
            ]
        );
    }

    #[test]
    fn one_bit_rows_coalesce_into_runs() {
        let png = png_bytes(8, 1, 1, COLOR_GREYSCALE, None, &[0, 0b1011_0001]);
        let (sink, result) = run(&png);
        result.unwrap();
        assert_eq!(sink.dims, Some((8, 1)));
        let w = Color::WHITE;
        let b = Color::BLACK;
        assert_eq!(
            sink.paints,
            vec![
                (0, 0, 1, 1, w),
                (1, 0, 1, 1, b),
                (2, 0, 2, 1, w),
                (4, 0, 3, 1, b),
                (7, 0, 1, 1, w),
            ]
        );
    }

    #[test]
    fn palette_indices_resolve_to_rgb() {
        let plte = [255, 0, 0, 0, 255, 0, 0, 0, 255];
        // 2-bit indices 0,1,2,0 packed MSB-first
        let png = png_bytes(4, 1, 2, COLOR_PALETTE, Some(&plte), &[0, 0b00_01_10_00]);
        let (sink, result) = run(&png);
        result.unwrap();
        assert_eq!(
            sink.paints,
            vec![
                (0, 0, 1, 1, Color::rgb(255, 0, 0)),
                (1, 0, 1, 1, Color::rgb(0, 255, 0)),
                (2, 0, 1, 1, Color::rgb(0, 0, 255)),
                (3, 0, 1, 1, Color::rgb(255, 0, 0)),
            ]
        );
    }

    #[test]
    fn sub_and_up_filters_reconstruct() {
        let raw = [
            FILTER_SUB, 10, 10, 10, 10, // 10, 20, 30, 40
            FILTER_UP, 5, 5, 5, 5, // 15, 25, 35, 45
        ];
        let png = png_bytes(4, 2, 8, COLOR_GREYSCALE, None, &raw);
        let (sink, result) = run(&png);
        result.unwrap();
        let greys: Vec<u8> = sink.paints.iter().map(|p| p.4.r).collect();
        assert_eq!(greys, vec![10, 20, 30, 40, 15, 25, 35, 45]);
        assert!(sink.paints.iter().all(|p| (p.2, p.3) == (1, 1)));
    }

    #[test]
    fn grey_alpha_keeps_alpha_channel() {
        let png = png_bytes(2, 1, 8, COLOR_GREY_ALPHA, None, &[0, 200, 255, 77, 0]);
        let (sink, result) = run(&png);
        result.unwrap();
        assert_eq!(
            sink.paints,
            vec![
                (0, 0, 1, 1, Color::new(200, 200, 200, 255)),
                (1, 0, 1, 1, Color::new(77, 77, 77, 0)),
            ]
        );
    }

    #[test]
    fn sixteen_bit_samples_keep_high_byte() {
        let png = png_bytes(1, 1, 16, COLOR_GREYSCALE, None, &[0, 0xAB, 0xCD]);
        let (sink, result) = run(&png);
        result.unwrap();
        assert_eq!(sink.paints, vec![(0, 0, 1, 1, Color::rgb(0xAB, 0xAB, 0xAB))]);
    }

    #[test]
    fn idat_may_span_multiple_chunks() {
        let raw = [
            0u8, 255, 0, 0, 255, 0, 255, 0, 128, 0, 0, 0, 255, 255, 255, 255, 255, 0,
        ];
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&2u32.to_be_bytes());
        ihdr.extend_from_slice(&2u32.to_be_bytes());
        ihdr.extend_from_slice(&[8, COLOR_RGBA, 0, 0, 0]);

        let idat = miniz_oxide::deflate::compress_to_vec_zlib(&raw, 6);
        let split = idat.len() / 2;

        let mut png = PNG_SIG.to_vec();
        chunk(&mut png, b"IHDR", &ihdr);
        chunk(&mut png, b"IDAT", &idat[..split]);
        chunk(&mut png, b"IDAT", &idat[split..]);
        chunk(&mut png, b"IEND", &[]);

        let (sink, result) = run(&png);
        result.unwrap();
        assert_eq!(sink.dims, Some((2, 2)));
        assert_eq!(sink.paints.len(), 4);
        assert_eq!(sink.paints[3], (1, 1, 1, 1, Color::new(255, 255, 255, 0)));
    }

    #[test]
    fn ancillary_chunks_are_skipped() {
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&1u32.to_be_bytes());
        ihdr.extend_from_slice(&1u32.to_be_bytes());
        ihdr.extend_from_slice(&[8, COLOR_GREYSCALE, 0, 0, 0]);

        let mut png = PNG_SIG.to_vec();
        chunk(&mut png, b"IHDR", &ihdr);
        chunk(&mut png, b"tEXt", b"Comment\0synthetic");
        chunk(
            &mut png,
            b"IDAT",
            &miniz_oxide::deflate::compress_to_vec_zlib(&[0, 42], 6),
        );
        chunk(&mut png, b"IEND", &[]);

        let (sink, result) = run(&png);
        result.unwrap();
        assert_eq!(sink.paints, vec![(0, 0, 1, 1, Color::rgb(42, 42, 42))]);
    }

    #[test]
    fn bad_streams_fail_before_any_sink_call() {
        let mut garbage = png_bytes(1, 1, 8, COLOR_GREYSCALE, None, &[0, 0]);
        garbage[0] = 0x88;
        let (sink, result) = run(&garbage);
        assert_eq!(result, Err(DecodeError::Malformed("png: invalid signature")));
        assert!(sink.dims.is_none() && sink.paints.is_empty());

        // interlace flag lives at byte 12 of the IHDR payload
        let mut interlaced = png_bytes(1, 1, 8, COLOR_GREYSCALE, None, &[0, 0]);
        interlaced[8 + 8 + 12] = 1;
        let (sink, result) = run(&interlaced);
        assert_eq!(
            result,
            Err(DecodeError::Malformed("png: interlaced PNGs not supported"))
        );
        assert!(sink.dims.is_none());

        let zero = png_bytes(0, 1, 8, COLOR_GREYSCALE, None, &[]);
        let (sink, result) = run(&zero);
        assert_eq!(result, Err(DecodeError::Malformed("png: zero dimensions")));
        assert!(sink.dims.is_none());

        let huge = png_bytes(3000, 3000, 8, COLOR_GREYSCALE, None, &[]);
        let (sink, result) = run(&huge);
        assert_eq!(
            result,
            Err(DecodeError::Malformed("png: image exceeds pixel limit"))
        );
        assert!(sink.dims.is_none());

        let odd = png_bytes(1, 1, 8, 7, None, &[0, 0]);
        let (sink, result) = run(&odd);
        assert_eq!(
            result,
            Err(DecodeError::Malformed("png: unsupported colour type / bit depth"))
        );
        assert!(sink.dims.is_none());
    }

    #[test]
    fn truncated_zlib_stream_is_malformed() {
        let raw = [0u8, 1, 2, 3, 4, 5, 6, 7, 8, 0, 9, 10, 11, 12, 13, 14, 15, 16];
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&8u32.to_be_bytes());
        ihdr.extend_from_slice(&2u32.to_be_bytes());
        ihdr.extend_from_slice(&[8, COLOR_GREYSCALE, 0, 0, 0]);

        let idat = miniz_oxide::deflate::compress_to_vec_zlib(&raw, 6);
        let mut png = PNG_SIG.to_vec();
        chunk(&mut png, b"IHDR", &ihdr);
        chunk(&mut png, b"IDAT", &idat[..idat.len() / 2]);
        chunk(&mut png, b"IEND", &[]);

        let (sink, result) = run(&png);
        assert_eq!(
            result,
            Err(DecodeError::Malformed("png: truncated IDAT stream"))
        );
        // dimensions were already reported before the stream died
        assert_eq!(sink.dims, Some((8, 2)));
    }

    #[test]
    fn missing_palette_is_malformed() {
        let png = png_bytes(2, 1, 8, COLOR_PALETTE, None, &[0, 0, 1]);
        let (_, result) = run(&png);
        assert_eq!(
            result,
            Err(DecodeError::Malformed("png: palette image without PLTE"))
        );
    }

    #[test]
    fn source_eof_is_a_source_error() {
        let png = png_bytes(1, 1, 8, COLOR_GREYSCALE, None, &[0, 7]);
        let (_, result) = run(&png[..20]);
        assert!(matches!(result, Err(DecodeError::Source(_))));
    }

    #[test]
    fn absurd_chunk_length_fails_without_wrapping() {
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&1u32.to_be_bytes());
        ihdr.extend_from_slice(&1u32.to_be_bytes());
        ihdr.extend_from_slice(&[8, COLOR_GREYSCALE, 0, 0, 0]);

        let mut png = PNG_SIG.to_vec();
        chunk(&mut png, b"IHDR", &ihdr);
        // ancillary chunk claiming u32::MAX bytes with nothing behind it
        png.extend_from_slice(&u32::MAX.to_be_bytes());
        png.extend_from_slice(b"tEXt");

        let (sink, result) = run(&png);
        assert!(result.is_err());
        assert!(sink.paints.is_empty());
    }

    #[test]
    fn unfilter_average_and_paeth_vectors() {
        let mut row = [10u8, 20, 30, 40];
        let prev = [8u8, 16, 24, 32];
        unfilter_row(FILTER_AVERAGE, &mut row, &prev, 1);
        // x0: 10 + (0+8)/2 = 14; x1: 20 + (14+16)/2 = 35;
        // x2: 30 + (35+24)/2 = 59; x3: 40 + (59+32)/2 = 85
        assert_eq!(row, [14, 35, 59, 85]);

        let mut row = [1u8, 1, 1, 1];
        let prev = [5u8, 3, 8, 2];
        unfilter_row(FILTER_PAETH, &mut row, &prev, 1);
        // x0: paeth(0,5,0)=5 -> 6; x1: paeth(6,3,5)=3 -> 4;
        // x2: paeth(4,8,3)=8 -> 9; x3: paeth(9,2,8)=2 -> 3
        assert_eq!(row, [6, 4, 9, 3]);

        assert_eq!(paeth(100, 50, 25), 100);
        assert_eq!(paeth(1, 2, 3), 1);
        assert_eq!(paeth(0, 0, 0), 0);
    }

    #[test]
    fn sub_byte_samples_scale_to_full_range() {
        assert_eq!(unpack_sub_byte(&[0b0100_0000], 0, 2), 85);
        assert_eq!(unpack_sub_byte(&[0b0100_0000], 1, 2), 0);
        assert_eq!(unpack_sub_byte(&[0b1111_0000], 0, 4), 255);
        assert_eq!(unpack_sub_byte(&[0b1000_0000], 0, 1), 255);
        assert_eq!(unpack_sub_byte_raw(&[0b0001_0010], 1, 2), 0b01);
        assert_eq!(unpack_sub_byte_raw(&[0b0001_0010], 3, 2), 0b10);
    }
}
