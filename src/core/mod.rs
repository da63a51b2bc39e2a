pub mod base83;
pub mod missing;
pub mod pyramid;
pub mod sht;
pub mod tiles;

use std::fmt;
use std::str::FromStr;

use fast_image_resize as fir;
use image::{RgbImage, RgbaImage};

use crate::error::ConfigError;

/// One of the six cube faces, in remapper output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Face {
    Front,
    Back,
    Up,
    Down,
    Left,
    Right,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::Front,
        Face::Back,
        Face::Up,
        Face::Down,
        Face::Left,
        Face::Right,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Single-letter name used in tile paths and omission markers.
    pub fn letter(self) -> char {
        match self {
            Face::Front => 'f',
            Face::Back => 'b',
            Face::Up => 'u',
            Face::Down => 'd',
            Face::Left => 'l',
            Face::Right => 'r',
        }
    }

    /// (pitch, yaw) of this face's rectilinear projection, in degrees.
    pub fn orientation(self) -> (i32, i32) {
        match self {
            Face::Front => (0, 0),
            Face::Back => (0, 180),
            Face::Up => (-90, 0),
            Face::Down => (90, 0),
            Face::Left => (0, 90),
            Face::Right => (0, -90),
        }
    }
}

/// Output encoding for tile and fallback images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileFormat {
    Jpeg,
    Png,
}

impl TileFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TileFormat::Jpeg => "jpg",
            TileFormat::Png => "png",
        }
    }
}

/// Background color shown past the edges of a partial panorama, as an
/// `[r, g, b]` triple of values in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundColor(pub [f64; 3]);

impl BackgroundColor {
    pub fn to_rgb8(self) -> [u8; 3] {
        [
            (self.0[0] * 255.0) as u8,
            (self.0[1] * 255.0) as u8,
            (self.0[2] * 255.0) as u8,
        ]
    }

    pub fn is_black(self) -> bool {
        self.to_rgb8() == [0, 0, 0]
    }
}

impl Default for BackgroundColor {
    fn default() -> Self {
        BackgroundColor([0.0, 0.0, 0.0])
    }
}

impl FromStr for BackgroundColor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .trim()
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| ConfigError::BackgroundColor(s.to_string()))?;
        let components: Vec<f64> = inner
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| ConfigError::BackgroundColor(s.to_string()))?;
        if components.len() != 3 {
            return Err(ConfigError::BackgroundColor(s.to_string()));
        }
        for &c in &components {
            if !(0.0..=1.0).contains(&c) {
                return Err(ConfigError::BackgroundRange(c));
            }
        }
        Ok(BackgroundColor([components[0], components[1], components[2]]))
    }
}

impl fmt::Display for BackgroundColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.0[0], self.0[1], self.0[2])
    }
}

/// Resampling filter for downscale operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleFilter {
    Bilinear,
    Bicubic,
    Lanczos3,
}

impl ResampleFilter {
    fn to_fir_alg(self) -> fir::ResizeAlg {
        match self {
            ResampleFilter::Bilinear => fir::ResizeAlg::Convolution(fir::FilterType::Bilinear),
            ResampleFilter::Bicubic => fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom),
            ResampleFilter::Lanczos3 => fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3),
        }
    }
}

impl fmt::Display for ResampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResampleFilter::Bilinear => write!(f, "bilinear"),
            ResampleFilter::Bicubic => write!(f, "bicubic"),
            ResampleFilter::Lanczos3 => write!(f, "lanczos3"),
        }
    }
}

impl FromStr for ResampleFilter {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bilinear" | "triangle" => Ok(ResampleFilter::Bilinear),
            "bicubic" | "catmullrom" | "catmull-rom" => Ok(ResampleFilter::Bicubic),
            "lanczos3" | "lanczos" => Ok(ResampleFilter::Lanczos3),
            _ => Err(format!(
                "unknown resample filter '{}'. Available: bilinear, bicubic, lanczos3",
                s
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// SIMD-accelerated resize helpers (via fast_image_resize)
// ---------------------------------------------------------------------------

fn fir_resize(
    data: Vec<u8>,
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
    pixel_type: fir::pixels::PixelType,
    filter: ResampleFilter,
) -> Vec<u8> {
    let src = fir::images::Image::from_vec_u8(src_w, src_h, data, pixel_type)
        .expect("failed to create fir source image");
    let mut dst = fir::images::Image::new(dst_w, dst_h, pixel_type);
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(
            &src,
            &mut dst,
            &fir::ResizeOptions::new().resize_alg(filter.to_fir_alg()),
        )
        .unwrap();
    dst.into_vec()
}

/// Resize an interleaved RGB image.
pub fn resize_rgb(img: &RgbImage, dst_w: u32, dst_h: u32, filter: ResampleFilter) -> RgbImage {
    let out = fir_resize(
        img.as_raw().clone(),
        img.width(),
        img.height(),
        dst_w,
        dst_h,
        fir::pixels::PixelType::U8x3,
        filter,
    );
    RgbImage::from_raw(dst_w, dst_h, out).expect("resize output size mismatch")
}

/// Resize an interleaved RGBA image.
pub fn resize_rgba(img: &RgbaImage, dst_w: u32, dst_h: u32, filter: ResampleFilter) -> RgbaImage {
    let out = fir_resize(
        img.as_raw().clone(),
        img.width(),
        img.height(),
        dst_w,
        dst_h,
        fir::pixels::PixelType::U8x4,
        filter,
    );
    RgbaImage::from_raw(dst_w, dst_h, out).expect("resize output size mismatch")
}
