// lumen/src/processors/format.rs
use crate::core::{LoaderError, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuPixelFormat {
    R8Unorm,
    R8G8Unorm,
    R8G8B8A8Unorm,
    R8G8B8A8UnormSrgb,
    B8G8R8A8Unorm,
    R10G10B10A2Unorm,
    R16Unorm,
    R16G16Unorm,
    R16G16B16A16Unorm,
    R16G16B16A16Float,
    R32G32B32Float,
    R32G32B32A32Float,
    R9G9B9E5SharedExp,
    Bc1Unorm,
    Bc7Unorm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecPixelFormat {
    Gray8,
    GrayAlpha8,
    Rgb8,
    Rgba8,
    Bgra8,
    Rgba1010102,
    Gray16,
    GrayAlpha16,
    Rgb16,
    Rgba16,
    Rgba16Half,
    Rgb32Float,
    Rgba32Float,
    Cmyk8,
}

// Every decoded image is normalized to this layout before it reaches the device.
pub const CANONICAL_FORMAT: GpuPixelFormat = GpuPixelFormat::R16G16B16A16Float;

// First match wins, so R8G8B8A8UnormSrgb reads as Rgba8 but Rgba8 maps back to R8G8B8A8Unorm.
const FORMAT_TABLE: &[(GpuPixelFormat, CodecPixelFormat)] = &[
    (GpuPixelFormat::R8Unorm, CodecPixelFormat::Gray8),
    (GpuPixelFormat::R8G8Unorm, CodecPixelFormat::GrayAlpha8),
    (GpuPixelFormat::R8G8B8A8Unorm, CodecPixelFormat::Rgba8),
    (GpuPixelFormat::R8G8B8A8UnormSrgb, CodecPixelFormat::Rgba8),
    (GpuPixelFormat::B8G8R8A8Unorm, CodecPixelFormat::Bgra8),
    (GpuPixelFormat::R10G10B10A2Unorm, CodecPixelFormat::Rgba1010102),
    (GpuPixelFormat::R16Unorm, CodecPixelFormat::Gray16),
    (GpuPixelFormat::R16G16Unorm, CodecPixelFormat::GrayAlpha16),
    (GpuPixelFormat::R16G16B16A16Unorm, CodecPixelFormat::Rgba16),
    (GpuPixelFormat::R16G16B16A16Float, CodecPixelFormat::Rgba16Half),
    (GpuPixelFormat::R32G32B32Float, CodecPixelFormat::Rgb32Float),
    (GpuPixelFormat::R32G32B32A32Float, CodecPixelFormat::Rgba32Float),
];

impl CodecPixelFormat {
    pub fn channels(self) -> u32 {
        match self {
            Self::Gray8 | Self::Gray16 => 1,
            Self::GrayAlpha8 | Self::GrayAlpha16 => 2,
            Self::Rgb8 | Self::Rgb16 | Self::Rgb32Float => 3,
            Self::Rgba8
            | Self::Bgra8
            | Self::Rgba1010102
            | Self::Rgba16
            | Self::Rgba16Half
            | Self::Rgba32Float
            | Self::Cmyk8 => 4,
        }
    }

    /// Bits of the widest color channel.
    pub fn bits_per_channel(self) -> u32 {
        match self {
            Self::Gray8 | Self::GrayAlpha8 | Self::Rgb8 | Self::Rgba8 | Self::Bgra8 | Self::Cmyk8 => 8,
            Self::Rgba1010102 => 10,
            Self::Gray16 | Self::GrayAlpha16 | Self::Rgb16 | Self::Rgba16 | Self::Rgba16Half => 16,
            Self::Rgb32Float | Self::Rgba32Float => 32,
        }
    }

    pub fn bits_per_pixel(self) -> u32 {
        match self {
            Self::Rgba1010102 => 32,
            other => other.channels() * other.bits_per_channel(),
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        (self.bits_per_pixel() / 8) as usize
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Rgba16Half | Self::Rgb32Float | Self::Rgba32Float)
    }

    pub fn has_alpha(self) -> bool {
        matches!(
            self,
            Self::GrayAlpha8
                | Self::Rgba8
                | Self::Bgra8
                | Self::Rgba1010102
                | Self::GrayAlpha16
                | Self::Rgba16
                | Self::Rgba16Half
                | Self::Rgba32Float
        )
    }
}

impl fmt::Display for CodecPixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({} bpp)", self, self.bits_per_pixel())
    }
}

impl fmt::Display for GpuPixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FormatTranslator;

impl FormatTranslator {
    pub fn new() -> Self {
        Self
    }

    pub fn to_codec(&self, format: GpuPixelFormat) -> Result<CodecPixelFormat> {
        FORMAT_TABLE
            .iter()
            .find(|(gpu, _)| *gpu == format)
            .map(|(_, codec)| *codec)
            .ok_or_else(|| {
                LoaderError::UnsupportedFormat(format!("no codec equivalent for {}", format))
            })
    }

    pub fn to_gpu(&self, format: CodecPixelFormat) -> Result<GpuPixelFormat> {
        FORMAT_TABLE
            .iter()
            .find(|(_, codec)| *codec == format)
            .map(|(gpu, _)| *gpu)
            .ok_or_else(|| {
                LoaderError::UnsupportedFormat(format!("no device equivalent for {}", format))
            })
    }
}
