//! Image - camera / generator output
//!
//! 像素数据零拷贝共享 (Bytes)。

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Pixel layout of [`Image::data`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 16-bit grayscale, native endian
    Mono16,
    /// Interleaved 8-bit RGB
    Rgb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Mono16 => 2,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// Image frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Raw pixel bytes, row-major
    pub data: Bytes,
}

impl Image {
    /// 16-bit grayscale image from pixel values
    pub fn mono16(width: u32, height: u32, pixels: &[u16]) -> Self {
        debug_assert_eq!(pixels.len(), (width * height) as usize);
        Self {
            width,
            height,
            format: PixelFormat::Mono16,
            data: Bytes::copy_from_slice(bytemuck::cast_slice(pixels)),
        }
    }

    /// RGB image from interleaved bytes
    pub fn rgb8(width: u32, height: u32, rgb: Vec<u8>) -> Self {
        debug_assert_eq!(rgb.len(), (width * height) as usize * 3);
        Self {
            width,
            height,
            format: PixelFormat::Rgb8,
            data: Bytes::from(rgb),
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Decode Mono16 pixel values; None for other formats
    pub fn mono16_pixels(&self) -> Option<Vec<u16>> {
        if self.format != PixelFormat::Mono16 {
            return None;
        }
        Some(
            self.data
                .chunks_exact(2)
                .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
                .collect(),
        )
    }

    /// Mean intensity over all samples
    pub fn mean(&self) -> f64 {
        match self.format {
            PixelFormat::Mono16 => {
                let pixels = self.mono16_pixels().unwrap_or_default();
                if pixels.is_empty() {
                    return 0.0;
                }
                pixels.iter().map(|&p| p as f64).sum::<f64>() / pixels.len() as f64
            }
            PixelFormat::Rgb8 => {
                if self.data.is_empty() {
                    return 0.0;
                }
                self.data.iter().map(|&b| b as f64).sum::<f64>() / self.data.len() as f64
            }
        }
    }
}

/// Stage (x, y) handed to an image generator
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StagePoint {
    pub x: f64,
    pub y: f64,
}

impl StagePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for StagePoint {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Per-snap parameters for grayscale generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapParams {
    /// Channel index
    pub channel: usize,
    /// Focus position
    pub z: f64,
    /// Exposure (ms)
    pub exposure_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono16_roundtrip_pixels() {
        let image = Image::mono16(2, 2, &[0, 1, 500, u16::MAX]);
        assert_eq!(image.data.len(), 8);
        assert_eq!(image.pixel_count(), 4);
        assert_eq!(image.mono16_pixels(), Some(vec![0, 1, 500, u16::MAX]));
    }

    #[test]
    fn test_rgb_has_no_mono_pixels() {
        let image = Image::rgb8(1, 2, vec![10, 20, 30, 40, 50, 60]);
        assert_eq!(image.format.bytes_per_pixel(), 3);
        assert!(image.mono16_pixels().is_none());
        assert_eq!(image.mean(), 35.0);
    }
}
