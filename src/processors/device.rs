// lumen/src/processors/device.rs
use super::codec::BitmapSource;
use super::format::GpuPixelFormat;
use crate::core::ColorContext;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("device was removed")]
    DeviceRemoved,

    #[error("out of device memory: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: usize, available: usize },

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(pub u64);

#[derive(Debug, PartialEq, Eq)]
pub struct GpuImageSource {
    id: ResourceId,
    width: u32,
    height: u32,
    format: GpuPixelFormat,
}

impl GpuImageSource {
    pub fn new(id: ResourceId, width: u32, height: u32, format: GpuPixelFormat) -> Self {
        Self {
            id,
            width,
            height,
            format,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> GpuPixelFormat {
        self.format
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceColorSpace {
    Srgb,
    AdobeRgb,
    Custom { profile_size: usize },
}

#[derive(Debug, PartialEq, Eq)]
pub struct GpuColorContext {
    id: ResourceId,
    space: DeviceColorSpace,
}

impl GpuColorContext {
    pub fn new(id: ResourceId, space: DeviceColorSpace) -> Self {
        Self { id, space }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn space(&self) -> DeviceColorSpace {
        self.space
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TransformedImage<'a> {
    source: &'a GpuImageSource,
    scale: f32,
}

impl<'a> TransformedImage<'a> {
    pub(crate) fn new(source: &'a GpuImageSource, scale: f32) -> Self {
        Self { source, scale }
    }

    pub fn source(&self) -> &'a GpuImageSource {
        self.source
    }

    pub fn width(&self) -> f32 {
        self.source.width as f32 * self.scale
    }

    pub fn height(&self) -> f32 {
        self.source.height as f32 * self.scale
    }
}

pub trait Device {
    fn create_image_source(
        &self,
        bitmap: &BitmapSource,
        format: GpuPixelFormat,
    ) -> Result<GpuImageSource, DeviceError>;

    fn create_color_context(&self, context: &ColorContext) -> Result<GpuColorContext, DeviceError>;

    fn release_image_source(&self, source: GpuImageSource);

    fn release_color_context(&self, context: GpuColorContext);
}

#[derive(Debug, Default)]
pub struct SoftwareDevice {
    next_id: Cell<u64>,
    lost: Cell<bool>,
    memory_budget: Option<usize>,
    allocations: RefCell<HashMap<ResourceId, usize>>,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.memory_budget = Some(bytes);
        self
    }

    pub fn set_lost(&self, lost: bool) {
        if lost && !self.lost.get() {
            log::debug!(
                "Software device lost with {} live allocations",
                self.allocations.borrow().len()
            );
            self.allocations.borrow_mut().clear();
        }
        self.lost.set(lost);
    }

    pub fn live_allocations(&self) -> usize {
        self.allocations.borrow().len()
    }

    pub fn allocated_bytes(&self) -> usize {
        self.allocations.borrow().values().sum()
    }

    fn allocate(&self, bytes: usize) -> Result<ResourceId, DeviceError> {
        if self.lost.get() {
            return Err(DeviceError::DeviceRemoved);
        }

        if let Some(budget) = self.memory_budget {
            let available = budget.saturating_sub(self.allocated_bytes());
            if bytes > available {
                return Err(DeviceError::OutOfMemory {
                    requested: bytes,
                    available,
                });
            }
        }

        let id = ResourceId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.allocations.borrow_mut().insert(id, bytes);
        Ok(id)
    }

    fn free(&self, id: ResourceId) {
        // Allocations vanish with the device, so a late release is harmless.
        self.allocations.borrow_mut().remove(&id);
    }
}

impl Device for SoftwareDevice {
    fn create_image_source(
        &self,
        bitmap: &BitmapSource,
        format: GpuPixelFormat,
    ) -> Result<GpuImageSource, DeviceError> {
        let id = self.allocate(bitmap.byte_size())?;
        Ok(GpuImageSource::new(id, bitmap.width, bitmap.height, format))
    }

    fn create_color_context(&self, context: &ColorContext) -> Result<GpuColorContext, DeviceError> {
        let space = match context {
            ColorContext::ExifColorSpace(2) => DeviceColorSpace::AdobeRgb,
            ColorContext::ExifColorSpace(_) => DeviceColorSpace::Srgb,
            ColorContext::IccProfile(bytes) => DeviceColorSpace::Custom {
                profile_size: bytes.len(),
            },
        };
        let bytes = match space {
            DeviceColorSpace::Custom { profile_size } => profile_size,
            _ => 0,
        };
        let id = self.allocate(bytes)?;
        Ok(GpuColorContext::new(id, space))
    }

    fn release_image_source(&self, source: GpuImageSource) {
        self.free(source.id);
    }

    fn release_color_context(&self, context: GpuColorContext) {
        self.free(context.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::CodecPixelFormat;

    fn bitmap() -> BitmapSource {
        BitmapSource::new(4, 4, CodecPixelFormat::Rgba16Half, vec![0; 4 * 4 * 8])
    }

    #[test]
    fn test_allocate_and_release() {
        let device = SoftwareDevice::new();
        let source = device
            .create_image_source(&bitmap(), GpuPixelFormat::R16G16B16A16Float)
            .unwrap();
        let context = device.create_color_context(&ColorContext::srgb()).unwrap();

        assert_eq!(device.live_allocations(), 2);
        assert_eq!(device.allocated_bytes(), 128);
        assert_ne!(source.id(), context.id());
        assert_eq!(context.space(), DeviceColorSpace::Srgb);

        device.release_image_source(source);
        device.release_color_context(context);
        assert_eq!(device.live_allocations(), 0);
    }

    #[test]
    fn test_lost_device_refuses_and_drops_allocations() {
        let device = SoftwareDevice::new();
        let source = device
            .create_image_source(&bitmap(), GpuPixelFormat::R16G16B16A16Float)
            .unwrap();

        device.set_lost(true);
        assert_eq!(device.live_allocations(), 0);
        assert_eq!(
            device.create_color_context(&ColorContext::srgb()).unwrap_err(),
            DeviceError::DeviceRemoved
        );

        device.release_image_source(source);
        device.set_lost(false);
        assert!(device.create_color_context(&ColorContext::srgb()).is_ok());
    }

    #[test]
    fn test_memory_budget() {
        let device = SoftwareDevice::new().with_memory_budget(100);
        let err = device
            .create_image_source(&bitmap(), GpuPixelFormat::R16G16B16A16Float)
            .unwrap_err();
        assert_eq!(
            err,
            DeviceError::OutOfMemory {
                requested: 128,
                available: 100
            }
        );
    }

    #[test]
    fn test_transformed_image_scales_dimensions() {
        let source = GpuImageSource::new(ResourceId(7), 100, 50, GpuPixelFormat::R16G16B16A16Float);
        let view = TransformedImage::new(&source, 0.5);
        assert_eq!(view.width(), 50.0);
        assert_eq!(view.height(), 25.0);
        assert_eq!(view.source().id(), ResourceId(7));
    }
}
