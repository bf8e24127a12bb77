//! RGBA color value and its projections to packed display depths.
//!
//! [`Color`] always carries all four channels; lossy reduction happens only
//! when a pixel is stored into a lower-depth buffer. The reduction rules are
//! fixed and stable:
//!
//! - grayscale: ITU-R BT.601 integer luma `(77·R + 150·G + 29·B) >> 8`
//! - binary: luma at or above the 128 midpoint is "on"
//! - RGB565: channel truncation (`r >> 3`, `g >> 2`, `b >> 3`), no dithering;
//!   expansion back left-shifts only, so a 565 round trip comes back with the
//!   low-order bits cleared

use embedded_graphics_core::pixelcolor::{
    BinaryColor, Gray8, GrayColor, Rgb565, Rgb888, RgbColor,
};

/// A four-channel RGBA color, 8 bits per channel.
///
/// The `u8` channels make clamping structural: out-of-range values are
/// unrepresentable, so every projection below is total and infallible.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Fully transparent black, the defined result of an out-of-bounds read.
    pub const TRANSPARENT: Color = Color::new(0, 0, 0, 0);
    /// Opaque black.
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from three channels.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// BT.601 integer luma: `(77·R + 150·G + 29·B) >> 8`.
    ///
    /// The weights sum to 256, so a pure gray maps to itself.
    #[inline]
    pub const fn luminance(self) -> u8 {
        ((self.r as u16 * 77 + self.g as u16 * 150 + self.b as u16 * 29) >> 8) as u8
    }

    /// Binary projection: luma at or above the 128 midpoint.
    #[inline]
    pub const fn is_on(self) -> bool {
        self.luminance() >= 128
    }

    /// Pack into RGB565 (5-6-5 truncation, no dithering).
    #[inline]
    pub const fn to_rgb565(self) -> u16 {
        ((self.r as u16 & 0xF8) << 8) | ((self.g as u16 & 0xFC) << 3) | (self.b as u16 >> 3)
    }

    /// Expand a packed RGB565 value. Channels are shifted left only; the
    /// low-order bits 565 cannot store come back as zero.
    #[inline]
    pub const fn from_rgb565(raw: u16) -> Self {
        Self::rgb(
            (((raw >> 11) & 0x1F) as u8) << 3,
            (((raw >> 5) & 0x3F) as u8) << 2,
            ((raw & 0x1F) as u8) << 3,
        )
    }
}

impl From<Color> for Rgb888 {
    fn from(c: Color) -> Self {
        Rgb888::new(c.r, c.g, c.b)
    }
}

impl From<Rgb888> for Color {
    fn from(c: Rgb888) -> Self {
        Color::rgb(c.r(), c.g(), c.b())
    }
}

impl From<Color> for Rgb565 {
    fn from(c: Color) -> Self {
        Rgb565::new(c.r >> 3, c.g >> 2, c.b >> 3)
    }
}

impl From<Rgb565> for Color {
    fn from(c: Rgb565) -> Self {
        Color::rgb(c.r() << 3, c.g() << 2, c.b() << 3)
    }
}

impl From<Color> for Gray8 {
    fn from(c: Color) -> Self {
        Gray8::new(c.luminance())
    }
}

impl From<Gray8> for Color {
    fn from(c: Gray8) -> Self {
        let y = c.luma();
        Color::rgb(y, y, y)
    }
}

impl From<Color> for BinaryColor {
    fn from(c: Color) -> Self {
        if c.is_on() {
            BinaryColor::On
        } else {
            BinaryColor::Off
        }
    }
}

impl From<BinaryColor> for Color {
    fn from(c: BinaryColor) -> Self {
        match c {
            BinaryColor::On => Color::WHITE,
            BinaryColor::Off => Color::BLACK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_weights_sum_to_identity_on_gray() {
        assert_eq!(Color::BLACK.luminance(), 0);
        assert_eq!(Color::WHITE.luminance(), 255);
        for g in [1u8, 77, 127, 128, 200, 254] {
            assert_eq!(Color::rgb(g, g, g).luminance(), g);
        }
    }

    #[test]
    fn luma_channel_weights() {
        // 77/256, 150/256, 29/256 of full scale
        assert_eq!(Color::rgb(255, 0, 0).luminance(), 76);
        assert_eq!(Color::rgb(0, 255, 0).luminance(), 149);
        assert_eq!(Color::rgb(0, 0, 255).luminance(), 28);
    }

    #[test]
    fn binary_threshold_is_midpoint() {
        assert!(!Color::rgb(127, 127, 127).is_on());
        assert!(Color::rgb(128, 128, 128).is_on());
        assert!(Color::WHITE.is_on());
        assert!(!Color::TRANSPARENT.is_on());
    }

    #[test]
    fn rgb565_pack_known_values() {
        assert_eq!(Color::WHITE.to_rgb565(), 0xFFFF);
        assert_eq!(Color::BLACK.to_rgb565(), 0x0000);
        assert_eq!(Color::rgb(0xF8, 0x00, 0x00).to_rgb565(), 0xF800);
        assert_eq!(Color::rgb(0x00, 0xFC, 0x00).to_rgb565(), 0x07E0);
        assert_eq!(Color::rgb(0x00, 0x00, 0xF8).to_rgb565(), 0x001F);
        assert_eq!(Color::rgb(0x08, 0x08, 0x08).to_rgb565(), 0x0841);
    }

    #[test]
    fn rgb565_round_trip_clears_low_bits() {
        let c = Color::rgb(201, 101, 50);
        let back = Color::from_rgb565(c.to_rgb565());
        assert_eq!(back, Color::rgb(200, 100, 48));
        // a second trip is the identity
        assert_eq!(Color::from_rgb565(back.to_rgb565()), back);
    }

    #[test]
    fn embedded_graphics_conversions() {
        let c = Color::rgb(200, 100, 48);
        assert_eq!(Rgb888::from(c), Rgb888::new(200, 100, 48));
        assert_eq!(Color::from(Rgb888::new(200, 100, 48)), c);
        assert_eq!(Rgb565::from(c), Rgb565::new(25, 25, 6));
        assert_eq!(Color::from(Rgb565::from(c)), c);
        assert_eq!(Gray8::from(Color::WHITE), Gray8::new(255));
        assert_eq!(BinaryColor::from(Color::WHITE), BinaryColor::On);
        assert_eq!(BinaryColor::from(Color::BLACK), BinaryColor::Off);
        assert_eq!(Color::from(BinaryColor::On), Color::WHITE);
    }
}
