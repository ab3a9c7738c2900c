// lumen/src/processors/resources.rs
use super::codec::BitmapSource;
use super::device::{Device, GpuColorContext, GpuImageSource};
use super::format::GpuPixelFormat;
use crate::core::{ColorContext, Result};

#[derive(Debug)]
pub struct DeviceIndependentArtifacts {
    bitmap: BitmapSource,
    gpu_format: GpuPixelFormat,
    color_context: ColorContext,
}

impl DeviceIndependentArtifacts {
    pub fn new(bitmap: BitmapSource, gpu_format: GpuPixelFormat, color_context: ColorContext) -> Self {
        Self {
            bitmap,
            gpu_format,
            color_context,
        }
    }

    pub fn bitmap(&self) -> &BitmapSource {
        &self.bitmap
    }

    pub fn gpu_format(&self) -> GpuPixelFormat {
        self.gpu_format
    }

    pub fn color_context(&self) -> &ColorContext {
        &self.color_context
    }
}

#[derive(Debug)]
pub struct DeviceDependentArtifacts {
    image_source: GpuImageSource,
    color_context: GpuColorContext,
}

impl DeviceDependentArtifacts {
    pub fn create(device: &dyn Device, independent: &DeviceIndependentArtifacts) -> Result<Self> {
        let image_source =
            device.create_image_source(&independent.bitmap, independent.gpu_format)?;

        let color_context = match device.create_color_context(&independent.color_context) {
            Ok(context) => context,
            Err(e) => {
                device.release_image_source(image_source);
                return Err(e.into());
            }
        };

        Ok(Self {
            image_source,
            color_context,
        })
    }

    pub fn image_source(&self) -> &GpuImageSource {
        &self.image_source
    }

    pub fn color_context(&self) -> &GpuColorContext {
        &self.color_context
    }

    pub fn release(self, device: &dyn Device) {
        device.release_color_context(self.color_context);
        device.release_image_source(self.image_source);
    }
}
