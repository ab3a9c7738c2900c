// lumen/src/core/mod.rs
mod loader;
mod state;

pub use loader::ImageLoader;
pub use state::{AllowedStates, LoaderState};

use crate::processors::{CodecPixelFormat, DeviceError};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorProfileKind {
    StandardRgb,
    WideGamut,
    CustomIcc,
    /// Console HDR capture; the pixels are BT.2100 regardless of any embedded profile.
    VendorHdrScreenshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdvancedColorKind {
    StandardDynamicRange,
    WideColorGamut,
    HighDynamicRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlphaMode {
    Opaque,
    Straight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    #[default]
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90,
    Transverse,
    Rotate270,
}

impl Orientation {
    pub fn from_exif(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Normal),
            2 => Some(Self::FlipHorizontal),
            3 => Some(Self::Rotate180),
            4 => Some(Self::FlipVertical),
            5 => Some(Self::Transpose),
            6 => Some(Self::Rotate90),
            7 => Some(Self::Transverse),
            8 => Some(Self::Rotate270),
            _ => None,
        }
    }

    pub fn swaps_axes(self) -> bool {
        matches!(
            self,
            Self::Transpose | Self::Rotate90 | Self::Transverse | Self::Rotate270
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
    pub bits_per_channel: u32,
    pub is_float: bool,
    pub pixel_format: CodecPixelFormat,
    pub alpha_mode: AlphaMode,
    pub color_profile: ColorProfileKind,
    pub num_profiles: u32,
    pub advanced_color: AdvancedColorKind,
    pub force_bt2100_color_space: bool,
    pub frame_count: u32,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColorContext {
    ExifColorSpace(u16),
    IccProfile(Vec<u8>),
}

impl ColorContext {
    pub fn srgb() -> Self {
        Self::ExifColorSpace(1)
    }
}

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub max_dimensions: Option<(u32, u32)>,
    pub max_file_size: Option<u64>,
    pub detect_hdr_screenshots: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_dimensions: Some((100_000, 100_000)),
            max_file_size: None,
            detect_hdr_screenshots: true,
        }
    }
}

impl LoaderConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some((width, height)) = self.max_dimensions {
            if width == 0 || height == 0 {
                return Err(LoaderError::InvalidArgument(
                    "Maximum dimensions must be non-zero".to_string(),
                ));
            }
            if width > 100_000 || height > 100_000 {
                return Err(LoaderError::InvalidArgument(
                    "Dimensions too large (max 100,000 pixels)".to_string(),
                ));
            }
        }

        if self.max_file_size == Some(0) {
            return Err(LoaderError::InvalidArgument(
                "Maximum file size must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Wrong state: `{operation}` is not valid while {state}")]
    WrongState {
        operation: &'static str,
        state: LoaderState,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Codec failure: {0}")]
    CodecFailure(String),

    #[error("Device resource failure: {0}")]
    DeviceResourceFailure(#[from] DeviceError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Memory limit exceeded: {0}")]
    MemoryLimitExceeded(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    WrongState,
    UnsupportedFormat,
    CodecFailure,
    DeviceResourceFailure,
    InvalidArgument,
    Io,
    MemoryLimitExceeded,
}

impl LoaderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WrongState { .. } => ErrorKind::WrongState,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::CodecFailure(_) => ErrorKind::CodecFailure,
            Self::DeviceResourceFailure(_) => ErrorKind::DeviceResourceFailure,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Io(_) => ErrorKind::Io,
            Self::MemoryLimitExceeded(_) => ErrorKind::MemoryLimitExceeded,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DeviceResourceFailure(_))
    }
}

pub type Result<T> = std::result::Result<T, LoaderError>;

pub fn validate_config(config: &LoaderConfig) -> Result<()> {
    config.validate()
}
