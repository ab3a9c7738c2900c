// lumen/src/core/loader.rs
use super::state::{DEVICE_RESOURCES, GPU_ACCESS, IMAGE_ACCESS, LOAD};
use super::{ColorContext, ImageInfo, LoaderConfig, LoaderError, LoaderState, Result};
use crate::processors::{
    BitmapSource, Codec, DeviceDependentArtifacts, DeviceIndependentArtifacts, Device,
    FormatTranslator, GpuColorContext, ImageAnalyzer, ImageCodec, TransformedImage,
    CANONICAL_FORMAT,
};
use std::io::{BufRead, Seek};
use std::path::Path;
use std::rc::Rc;

pub struct ImageLoader {
    // Loss and recovery are reported by the caller, never observed
    device: Rc<dyn Device>,
    codec: Box<dyn Codec>,
    translator: FormatTranslator,
    analyzer: ImageAnalyzer,
    config: LoaderConfig,
    state: LoaderState,

    // Device-independent
    image_info: Option<ImageInfo>,
    independent: Option<DeviceIndependentArtifacts>,

    // Device-dependent
    dependent: Option<DeviceDependentArtifacts>,
}

impl ImageLoader {
    pub fn new(device: Rc<dyn Device>) -> Self {
        Self {
            device,
            codec: Box::new(ImageCodec::new()),
            translator: FormatTranslator::new(),
            analyzer: ImageAnalyzer::new(),
            config: LoaderConfig::default(),
            state: LoaderState::NotInitialized,
            image_info: None,
            independent: None,
            dependent: None,
        }
    }

    pub fn with_config(device: Rc<dyn Device>, config: LoaderConfig) -> Result<Self> {
        config.validate()?;

        let mut loader = Self::new(device);
        loader.analyzer = ImageAnalyzer::new().with_hdr_screenshot_detection(config.detect_hdr_screenshots);
        loader.config = config;
        Ok(loader)
    }

    pub fn with_codec(mut self, codec: impl Codec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn load_from_stream<R: BufRead + Seek>(&mut self, stream: &mut R) -> Result<ImageInfo> {
        LOAD.enforce(self.state, "load_from_stream")?;
        log::debug!("Loading image from stream");

        let result = self
            .codec
            .decode_stream(stream)
            .and_then(|source| self.finish_load(source));
        self.settle(result)
    }

    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P, extension: &str) -> Result<ImageInfo> {
        LOAD.enforce(self.state, "load_from_file")?;
        let path = path.as_ref();
        log::debug!("Loading texture from: {}", path.display());

        let result = self
            .decode_texture(path, extension)
            .and_then(|source| self.finish_load(source));
        self.settle(result)
    }

    pub fn image_info(&self) -> Result<ImageInfo> {
        IMAGE_ACCESS.enforce(self.state, "image_info")?;
        self.image_info.ok_or(LoaderError::WrongState {
            operation: "image_info",
            state: self.state,
        })
    }

    pub fn color_context(&self) -> Result<&ColorContext> {
        IMAGE_ACCESS.enforce(self.state, "color_context")?;
        self.independent
            .as_ref()
            .map(DeviceIndependentArtifacts::color_context)
            .ok_or(LoaderError::WrongState {
                operation: "color_context",
                state: self.state,
            })
    }

    pub fn device_color_context(&self) -> Result<&GpuColorContext> {
        GPU_ACCESS.enforce(self.state, "device_color_context")?;
        Ok(self.dependent_artifacts("device_color_context")?.color_context())
    }

    pub fn loaded_image(&self, zoom: f32) -> Result<TransformedImage<'_>> {
        GPU_ACCESS.enforce(self.state, "loaded_image")?;
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(LoaderError::InvalidArgument(format!(
                "zoom must be positive and finite, got {}",
                zoom
            )));
        }

        let dependent = self.dependent_artifacts("loaded_image")?;
        Ok(TransformedImage::new(dependent.image_source(), zoom))
    }

    pub fn create_device_resources(&mut self) -> Result<()> {
        DEVICE_RESOURCES.enforce(self.state, "create_device_resources")?;
        if self.dependent.is_some() {
            return Ok(());
        }

        let independent = self.independent.as_ref().ok_or(LoaderError::WrongState {
            operation: "create_device_resources",
            state: self.state,
        })?;

        match DeviceDependentArtifacts::create(self.device.as_ref(), independent) {
            Ok(dependent) => {
                self.dependent = Some(dependent);
                self.transition(LoaderState::LoadingSucceeded);
                log::info!("Device resources restored");
                Ok(())
            }
            Err(e) => {
                log::warn!("Device resources unavailable: {}", e);
                self.transition(LoaderState::NeedDeviceResources);
                Err(e)
            }
        }
    }

    pub fn release_device_resources(&mut self) -> Result<()> {
        DEVICE_RESOURCES.enforce(self.state, "release_device_resources")?;

        if let Some(dependent) = self.dependent.take() {
            dependent.release(self.device.as_ref());
            log::debug!("Device resources released");
        }
        self.transition(LoaderState::NeedDeviceResources);
        Ok(())
    }

    fn decode_texture(&self, path: &Path, extension: &str) -> Result<BitmapSource> {
        if let Some(max_size) = self.config.max_file_size {
            let size = std::fs::metadata(path)?.len();
            if size > max_size {
                return Err(LoaderError::MemoryLimitExceeded(format!(
                    "File size {} exceeds limit {}",
                    size, max_size
                )));
            }
        }

        let texture = self.codec.decode_texture(path, extension)?;
        let format = self.translator.to_codec(texture.format)?;
        Ok(BitmapSource::new(texture.width, texture.height, format, texture.pixels))
    }

    fn finish_load(&mut self, source: BitmapSource) -> Result<ImageInfo> {
        self.validate_source(&source)?;

        let info = self.analyzer.populate_metadata(&source);
        let color_context = self.analyzer.color_context(&source)?;

        // Normalize to the canonical layout
        let canonical = self.translator.to_codec(CANONICAL_FORMAT)?;
        let bitmap = if source.format == canonical {
            source
        } else {
            self.codec.convert(&source, canonical)?
        };

        // Materialize device resources once
        let independent = DeviceIndependentArtifacts::new(bitmap, CANONICAL_FORMAT, color_context);
        let dependent = DeviceDependentArtifacts::create(self.device.as_ref(), &independent)?;

        self.image_info = Some(info);
        self.independent = Some(independent);
        self.dependent = Some(dependent);
        Ok(info)
    }

    fn validate_source(&self, source: &BitmapSource) -> Result<()> {
        if source.width == 0 || source.height == 0 {
            return Err(LoaderError::CodecFailure(format!(
                "Decoded image has no pixels ({}x{})",
                source.width, source.height
            )));
        }

        if let Some((max_w, max_h)) = self.config.max_dimensions {
            if source.width > max_w || source.height > max_h {
                return Err(LoaderError::MemoryLimitExceeded(format!(
                    "Image dimensions {}x{} exceed maximum {}x{}",
                    source.width, source.height, max_w, max_h
                )));
            }
        }

        if source.pixels.len() != source.expected_len() {
            return Err(LoaderError::CodecFailure(format!(
                "Decoded buffer holds {} bytes, expected {}",
                source.pixels.len(),
                source.expected_len()
            )));
        }

        Ok(())
    }

    fn settle(&mut self, result: Result<ImageInfo>) -> Result<ImageInfo> {
        match result {
            Ok(info) => {
                self.transition(LoaderState::LoadingSucceeded);
                log::info!(
                    "Loaded image: {}x{} pixels, format: {}, profile: {:?}",
                    info.width,
                    info.height,
                    info.pixel_format,
                    info.color_profile
                );
                Ok(info)
            }
            Err(e) => {
                if let Some(dependent) = self.dependent.take() {
                    dependent.release(self.device.as_ref());
                }
                self.independent = None;
                self.image_info = None;
                self.transition(LoaderState::LoadingFailed);
                log::debug!("Image load failed: {}", e);
                Err(e)
            }
        }
    }

    fn transition(&mut self, next: LoaderState) {
        if self.state == next {
            return;
        }

        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        log::debug!("Loader state {} -> {}", self.state, next);
        self.state = next;
    }

    fn dependent_artifacts(&self, operation: &'static str) -> Result<&DeviceDependentArtifacts> {
        self.dependent.as_ref().ok_or(LoaderError::WrongState {
            operation,
            state: self.state,
        })
    }
}

impl Drop for ImageLoader {
    fn drop(&mut self) {
        if let Some(dependent) = self.dependent.take() {
            dependent.release(self.device.as_ref());
        }
    }
}
