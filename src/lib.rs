mod cli;
mod core;
mod processors;
mod utils;

pub use crate::cli::{Cli, Commands};
pub use crate::core::{
    validate_config, AdvancedColorKind, AllowedStates, AlphaMode, ColorContext, ColorProfileKind,
    ErrorKind, ImageInfo, ImageLoader, LoaderConfig, LoaderError, LoaderState, Orientation, Result,
};
pub use crate::processors::{
    BatchScanner, BitmapSource, Codec, CodecPixelFormat, Device, DeviceColorSpace,
    DeviceDependentArtifacts, DeviceError, DeviceIndependentArtifacts, FormatTranslator,
    GpuColorContext, GpuImageSource, GpuPixelFormat, ImageAnalyzer, ImageCodec, ImageStream,
    ResourceId, ScanEntry, ScanReport, SoftwareDevice, TextureSource, TransformedImage,
    CANONICAL_FORMAT,
};
pub use crate::utils::{
    format_file_size, get_file_extension, is_supported_format, is_texture_extension,
    load_image_path,
};

pub mod prelude {
    pub use crate::{
        BatchScanner, Codec, Device, ImageAnalyzer, ImageCodec, ImageInfo, ImageLoader,
        LoaderConfig, LoaderState, SoftwareDevice,
    };
}
