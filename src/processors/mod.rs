// lumen/src/processors/mod.rs
mod analyzer;
mod batch;
mod codec;
mod device;
mod format;
mod resources;

pub use analyzer::ImageAnalyzer;
pub use batch::{BatchScanner, ScanEntry, ScanReport};
pub use codec::{BitmapSource, Codec, ImageCodec, ImageStream, TextureSource};
pub use device::{
    Device, DeviceColorSpace, DeviceError, GpuColorContext, GpuImageSource, ResourceId,
    SoftwareDevice, TransformedImage,
};
pub use format::{CodecPixelFormat, FormatTranslator, GpuPixelFormat, CANONICAL_FORMAT};
pub use resources::{DeviceDependentArtifacts, DeviceIndependentArtifacts};

