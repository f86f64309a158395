// ABOUTME: Perceptual color math for chrome palettes: hex, sRGB and OKLCH conversions.
// ABOUTME: Blend, lighten and saturate never fail; they degrade to sRGB or return the input.

use crate::error::{Result, RiverShadeError};
use serde::{Deserialize, Serialize};

/// Chroma below this is treated as gray; its hue carries no information.
const ACHROMATIC_CHROMA: f64 = 1e-4;

/// Lightness step used for the light/dark perceptual variants (0-1 scale).
pub const LIGHTNESS_STEP: f64 = 0.08;

const SATURATE_FACTOR: f64 = 1.15;
const DESATURATE_FACTOR: f64 = 0.75;

/// An sRGB color with channels in 0-255.
///
/// Channels are `f64` so that out-of-gamut intermediates survive until
/// [`rgb_to_hex`] clamps them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }
}

/// OKLCH coordinates. `l` is always on the 0-1 scale, `h` is in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Oklch {
    pub l: f64,
    pub c: f64,
    pub h: f64,
}

impl Oklch {
    pub fn new(l: f64, c: f64, h: f64) -> Self {
        Self { l, c, h }
    }

    fn is_achromatic(&self) -> bool {
        self.c < ACHROMATIC_CHROMA
    }

    fn is_finite(&self) -> bool {
        self.l.is_finite() && self.c.is_finite() && self.h.is_finite()
    }
}

/// Parse `#rrggbb` (leading `#` and surrounding whitespace optional).
pub fn hex_to_rgb(hex: &str) -> Result<Rgb> {
    let trimmed = hex.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed).trim();
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RiverShadeError::InvalidColorFormat(hex.to_string()));
    }

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16)
            .map(f64::from)
            .map_err(|_| RiverShadeError::InvalidColorFormat(hex.to_string()))
    };

    Ok(Rgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Format as lowercase `#rrggbb`, clamping and rounding each channel.
pub fn rgb_to_hex(rgb: Rgb) -> String {
    let to_byte = |v: f64| -> u8 {
        if v.is_nan() {
            0
        } else {
            v.round().clamp(0.0, 255.0) as u8
        }
    };
    format!(
        "#{:02x}{:02x}{:02x}",
        to_byte(rgb.r),
        to_byte(rgb.g),
        to_byte(rgb.b)
    )
}

/// Convert a hex color to OKLCH.
pub fn to_oklch(hex: &str) -> Result<Oklch> {
    let rgb = hex_to_rgb(hex)?;
    let (l, a, b) = linear_srgb_to_oklab(
        srgb_to_linear(rgb.r / 255.0),
        srgb_to_linear(rgb.g / 255.0),
        srgb_to_linear(rgb.b / 255.0),
    );
    Ok(oklab_to_oklch(l, a, b))
}

/// Convert OKLCH back to a hex color. Out-of-gamut values are clamped.
pub fn from_oklch(color: Oklch) -> String {
    rgb_to_hex(oklch_to_rgb(color))
}

fn oklch_to_rgb(color: Oklch) -> Rgb {
    let hue = color.h.to_radians();
    let (a, b) = (color.c * hue.cos(), color.c * hue.sin());
    let (lr, lg, lb) = oklab_to_linear_srgb(color.l, a, b);
    Rgb::new(
        linear_to_srgb(lr) * 255.0,
        linear_to_srgb(lg) * 255.0,
        linear_to_srgb(lb) * 255.0,
    )
}

/// Blend `a` toward `b` by `t` in OKLCH.
///
/// Lightness and chroma interpolate linearly, hue takes the shortest arc.
/// When a side is gray its hue is ignored. Falls back to linear sRGB when
/// the perceptual path yields non-finite values and returns `a` unchanged
/// when neither path can parse the inputs.
pub fn blend(a: &str, b: &str, t: f64) -> String {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

    match blend_oklch(a, b, t) {
        Some(mixed) => mixed,
        None => blend_srgb(a, b, t).unwrap_or_else(|| a.to_string()),
    }
}

fn blend_oklch(a: &str, b: &str, t: f64) -> Option<String> {
    let ca = to_oklch(a).ok()?;
    let cb = to_oklch(b).ok()?;

    let h = if ca.is_achromatic() {
        cb.h
    } else if cb.is_achromatic() {
        ca.h
    } else {
        let dh = (cb.h - ca.h + 180.0).rem_euclid(360.0) - 180.0;
        ca.h + dh * t
    };

    let mixed = Oklch::new(
        ca.l * (1.0 - t) + cb.l * t,
        ca.c * (1.0 - t) + cb.c * t,
        h,
    );
    if !mixed.is_finite() {
        return None;
    }

    let rgb = oklch_to_rgb(mixed);
    if !(rgb.r.is_finite() && rgb.g.is_finite() && rgb.b.is_finite()) {
        return None;
    }
    Some(rgb_to_hex(rgb))
}

fn blend_srgb(a: &str, b: &str, t: f64) -> Option<String> {
    let ra = hex_to_rgb(a).ok()?;
    let rb = hex_to_rgb(b).ok()?;
    let lerp = |x: f64, y: f64| x * (1.0 - t) + y * t;
    Some(rgb_to_hex(Rgb::new(
        lerp(ra.r, rb.r),
        lerp(ra.g, rb.g),
        lerp(ra.b, rb.b),
    )))
}

/// Shift OKLCH lightness by `delta` (0-1 scale), clamped to the valid range.
/// Returns the input unchanged when it cannot be converted.
pub fn lighten(hex: &str, delta: f64) -> String {
    adjust_lightness(hex, delta)
}

/// Same as [`lighten`]; negative deltas darken.
pub fn adjust_lightness(hex: &str, delta: f64) -> String {
    match to_oklch(hex) {
        Ok(color) if delta.is_finite() => from_oklch(Oklch::new(
            (color.l + delta).clamp(0.0, 1.0),
            color.c,
            color.h,
        )),
        _ => hex.to_string(),
    }
}

/// Multiply OKLCH chroma by `factor` (negative factors are treated as 0).
/// Returns the input unchanged when it cannot be converted.
pub fn saturate(hex: &str, factor: f64) -> String {
    match to_oklch(hex) {
        Ok(color) if factor.is_finite() => {
            from_oklch(Oklch::new(color.l, color.c * factor.max(0.0), color.h))
        }
        _ => hex.to_string(),
    }
}

/// A small perceptual palette derived from one base color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerceptualVariants {
    pub base: String,
    pub light: String,
    pub lighter: String,
    pub dark: String,
    pub darker: String,
    pub saturated: String,
    pub desaturated: String,
}

impl PerceptualVariants {
    /// Two lightness steps each way plus a saturated/desaturated pair.
    pub fn from_base(hex: &str) -> Result<Self> {
        let base = rgb_to_hex(hex_to_rgb(hex)?);
        Ok(Self {
            light: adjust_lightness(&base, LIGHTNESS_STEP),
            lighter: adjust_lightness(&base, LIGHTNESS_STEP * 2.0),
            dark: adjust_lightness(&base, -LIGHTNESS_STEP),
            darker: adjust_lightness(&base, -LIGHTNESS_STEP * 2.0),
            saturated: saturate(&base, SATURATE_FACTOR),
            desaturated: saturate(&base, DESATURATE_FACTOR),
            base,
        })
    }
}

// OKLab matrices from https://bottosson.github.io/posts/oklab/

fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f64) -> f64 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn linear_srgb_to_oklab(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let l = 0.412_221_470_8 * r + 0.536_332_536_3 * g + 0.051_445_992_9 * b;
    let m = 0.211_903_498_2 * r + 0.680_699_545_1 * g + 0.107_396_956_6 * b;
    let s = 0.088_302_461_9 * r + 0.281_718_837_6 * g + 0.629_978_700_5 * b;

    let (l_, m_, s_) = (l.cbrt(), m.cbrt(), s.cbrt());

    (
        0.210_454_255_3 * l_ + 0.793_617_785_0 * m_ - 0.004_072_046_8 * s_,
        1.977_998_495_1 * l_ - 2.428_592_205_0 * m_ + 0.450_593_709_9 * s_,
        0.025_904_037_1 * l_ + 0.782_771_766_2 * m_ - 0.808_675_766_0 * s_,
    )
}

fn oklab_to_linear_srgb(l: f64, a: f64, b: f64) -> (f64, f64, f64) {
    let l_ = l + 0.396_337_777_4 * a + 0.215_803_757_3 * b;
    let m_ = l - 0.105_561_345_8 * a - 0.063_854_172_8 * b;
    let s_ = l - 0.089_484_177_5 * a - 1.291_485_548_0 * b;

    let (l3, m3, s3) = (l_ * l_ * l_, m_ * m_ * m_, s_ * s_ * s_);

    (
        4.076_741_662_1 * l3 - 3.307_711_591_3 * m3 + 0.230_969_929_2 * s3,
        -1.268_438_004_6 * l3 + 2.609_757_401_1 * m3 - 0.341_319_396_5 * s3,
        -0.004_196_086_3 * l3 - 0.703_418_614_7 * m3 + 1.707_614_701_0 * s3,
    )
}

fn oklab_to_oklch(l: f64, a: f64, b: f64) -> Oklch {
    let c = (a * a + b * b).sqrt();
    let h = b.atan2(a).to_degrees().rem_euclid(360.0);
    Oklch::new(l, c, h)
}
