#[cfg(test)]
mod tests {
    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use exif::experimental::Writer;
    use exif::{Field, In, Tag, Value};
    use image::{DynamicImage, ImageFormat, RgbaImage};
    use lumen::{
        BitmapSource, Codec, CodecPixelFormat, ColorContext, ColorProfileKind, Device, ErrorKind,
        ImageCodec, ImageInfo, ImageLoader, ImageStream, LoaderError, LoaderState, SoftwareDevice,
        TextureSource,
    };
    use std::cell::Cell;
    use std::io::Cursor;
    use std::path::Path;
    use std::rc::Rc;

    /// Wraps the real codec and counts every decode.
    struct CountingCodec {
        decodes: Rc<Cell<usize>>,
    }

    impl Codec for CountingCodec {
        fn decode_stream(&self, stream: &mut dyn ImageStream) -> lumen::Result<BitmapSource> {
            self.decodes.set(self.decodes.get() + 1);
            ImageCodec::new().decode_stream(stream)
        }

        fn decode_texture(&self, path: &Path, extension: &str) -> lumen::Result<TextureSource> {
            self.decodes.set(self.decodes.get() + 1);
            ImageCodec::new().decode_texture(path, extension)
        }

        fn convert(
            &self,
            source: &BitmapSource,
            target: CodecPixelFormat,
        ) -> lumen::Result<BitmapSource> {
            ImageCodec::new().convert(source, target)
        }
    }

    /// Always hands back the same bitmap.
    struct StubCodec {
        source: BitmapSource,
    }

    impl Codec for StubCodec {
        fn decode_stream(&self, _stream: &mut dyn ImageStream) -> lumen::Result<BitmapSource> {
            Ok(self.source.clone())
        }

        fn decode_texture(&self, _path: &Path, _extension: &str) -> lumen::Result<TextureSource> {
            Err(LoaderError::UnsupportedFormat("stub has no textures".to_string()))
        }

        fn convert(
            &self,
            source: &BitmapSource,
            target: CodecPixelFormat,
        ) -> lumen::Result<BitmapSource> {
            ImageCodec::new().convert(source, target)
        }
    }

    fn png_stream(width: u32, height: u32) -> Cursor<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(RgbaImage::new(width, height))
            .write_to(&mut cursor, ImageFormat::Png)
            .unwrap();
        cursor.set_position(0);
        cursor
    }

    fn counting_loader(device: &Rc<SoftwareDevice>) -> (ImageLoader, Rc<Cell<usize>>) {
        let decodes = Rc::new(Cell::new(0));
        let codec = CountingCodec {
            decodes: Rc::clone(&decodes),
        };
        let loader = ImageLoader::new(Rc::clone(device) as Rc<dyn Device>).with_codec(codec);
        (loader, decodes)
    }

    fn loaded(device: &Rc<SoftwareDevice>) -> (ImageLoader, ImageInfo, Rc<Cell<usize>>) {
        let (mut loader, decodes) = counting_loader(device);
        let info = loader.load_from_stream(&mut png_stream(100, 50)).unwrap();
        (loader, info, decodes)
    }

    #[test]
    fn test_construction_state() {
        let loader = ImageLoader::new(Rc::new(SoftwareDevice::new()));
        assert_eq!(loader.state(), LoaderState::NotInitialized);
    }

    #[test]
    fn test_load_standard_rgb_stream() {
        let device = Rc::new(SoftwareDevice::new());
        let (loader, info, decodes) = loaded(&device);

        assert_eq!(loader.state(), LoaderState::LoadingSucceeded);
        assert_eq!(decodes.get(), 1);
        assert_eq!(info.width, 100);
        assert_eq!(info.height, 50);
        assert_eq!(info.bits_per_pixel, 32);
        assert_eq!(info.pixel_format, CodecPixelFormat::Rgba8);
        assert_eq!(info.color_profile, ColorProfileKind::StandardRgb);
        assert_eq!(loader.image_info().unwrap(), info);

        for zoom in [0.01, 0.5, 1.0, 3.0, 64.0] {
            let view = loader.loaded_image(zoom).unwrap();
            assert_eq!(view.width(), 100.0 * zoom);
        }
    }

    #[test]
    fn test_animated_gif_reports_frame_count() {
        use image::codecs::gif::GifEncoder;
        use image::{Frame, Rgba};

        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            for shade in [10u8, 90, 170] {
                let frame = RgbaImage::from_pixel(4, 4, Rgba([shade, shade, 0, 255]));
                encoder.encode_frame(Frame::new(frame)).unwrap();
            }
        }

        let device = Rc::new(SoftwareDevice::new());
        let (mut loader, decodes) = counting_loader(&device);
        let info = loader.load_from_stream(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(info.frame_count, 3);
        assert_eq!((info.width, info.height), (4, 4));

        loader.release_device_resources().unwrap();
        loader.create_device_resources().unwrap();
        assert_eq!(loader.image_info().unwrap().frame_count, 3);
        assert_eq!(decodes.get(), 1);
    }

    #[test]
    fn test_device_loss_keeps_metadata() {
        let device = Rc::new(SoftwareDevice::new());
        let (mut loader, info, _) = loaded(&device);

        device.set_lost(true);
        loader.release_device_resources().unwrap();

        assert_eq!(loader.state(), LoaderState::NeedDeviceResources);
        assert_eq!(loader.image_info().unwrap(), info);
        assert_eq!(loader.color_context().unwrap(), &ColorContext::srgb());
        assert_eq!(loader.loaded_image(1.0).unwrap_err().kind(), ErrorKind::WrongState);
    }

    #[test]
    fn test_restore_on_unavailable_device_is_recoverable() {
        let device = Rc::new(SoftwareDevice::new());
        let (mut loader, info, decodes) = loaded(&device);

        device.set_lost(true);
        loader.release_device_resources().unwrap();

        let err = loader.create_device_resources().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceResourceFailure);
        assert!(err.is_recoverable());
        assert_eq!(loader.state(), LoaderState::NeedDeviceResources);
        assert_eq!(device.live_allocations(), 0);

        device.set_lost(false);
        loader.create_device_resources().unwrap();
        assert_eq!(loader.state(), LoaderState::LoadingSucceeded);
        assert_eq!(loader.image_info().unwrap(), info);
        assert!(loader.loaded_image(1.0).is_ok());
        assert_eq!(decodes.get(), 1);
    }

    #[test]
    fn test_repeated_cycles_never_decode_again() {
        let device = Rc::new(SoftwareDevice::new());
        let (mut loader, info, decodes) = loaded(&device);

        for _ in 0..5 {
            loader.release_device_resources().unwrap();
            assert_eq!(device.live_allocations(), 0);
            loader.create_device_resources().unwrap();
            assert_eq!(device.live_allocations(), 2);
            assert_eq!(loader.image_info().unwrap(), info);
        }
        assert_eq!(decodes.get(), 1);
    }

    #[test]
    fn test_out_of_device_memory_on_restore() {
        // Enough for the first materialization, not for a second copy.
        let bytes = 100 * 50 * 8;
        let device = Rc::new(SoftwareDevice::new().with_memory_budget(bytes + bytes / 2));
        let (mut loader, _, _) = loaded(&device);
        loader.release_device_resources().unwrap();

        let hog = BitmapSource::new(100, 50, CodecPixelFormat::Rgba16Half, vec![0; bytes]);
        let held = device
            .create_image_source(&hog, lumen::CANONICAL_FORMAT)
            .unwrap();

        let err = loader.create_device_resources().unwrap_err();
        assert!(matches!(
            err,
            LoaderError::DeviceResourceFailure(lumen::DeviceError::OutOfMemory { .. })
        ));
        assert_eq!(loader.state(), LoaderState::NeedDeviceResources);

        device.release_image_source(held);
        loader.create_device_resources().unwrap();
        assert_eq!(loader.state(), LoaderState::LoadingSucceeded);
    }

    #[test]
    fn test_decode_failure_is_permanent() {
        let device = Rc::new(SoftwareDevice::new());
        let (mut loader, decodes) = counting_loader(&device);

        let err = loader
            .load_from_stream(&mut Cursor::new(b"definitely not an image".to_vec()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
        assert_eq!(loader.state(), LoaderState::LoadingFailed);

        let err = loader.load_from_stream(&mut png_stream(4, 4)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongState);
        assert_eq!(loader.image_info().unwrap_err().kind(), ErrorKind::WrongState);
        assert_eq!(
            loader.create_device_resources().unwrap_err().kind(),
            ErrorKind::WrongState
        );
        assert_eq!(
            loader.release_device_resources().unwrap_err().kind(),
            ErrorKind::WrongState
        );
        assert_eq!(loader.state(), LoaderState::LoadingFailed);
        assert_eq!(decodes.get(), 1);
        assert_eq!(device.live_allocations(), 0);
    }

    #[test]
    fn test_guard_failures_have_no_side_effects() {
        let device = Rc::new(SoftwareDevice::new());
        let (mut loader, decodes) = counting_loader(&device);

        assert_eq!(loader.image_info().unwrap_err().kind(), ErrorKind::WrongState);
        assert_eq!(loader.color_context().unwrap_err().kind(), ErrorKind::WrongState);
        assert_eq!(
            loader.device_color_context().unwrap_err().kind(),
            ErrorKind::WrongState
        );
        assert_eq!(loader.loaded_image(1.0).unwrap_err().kind(), ErrorKind::WrongState);
        assert_eq!(
            loader.create_device_resources().unwrap_err().kind(),
            ErrorKind::WrongState
        );
        assert_eq!(
            loader.release_device_resources().unwrap_err().kind(),
            ErrorKind::WrongState
        );

        assert_eq!(loader.state(), LoaderState::NotInitialized);
        assert_eq!(decodes.get(), 0);
        assert_eq!(device.live_allocations(), 0);

        // Still loadable afterwards.
        loader.load_from_stream(&mut png_stream(2, 2)).unwrap();
    }

    #[test]
    fn test_non_positive_zoom() {
        let device = Rc::new(SoftwareDevice::new());
        let (loader, _, _) = loaded(&device);

        assert_eq!(loader.loaded_image(0.0).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(loader.loaded_image(-1.0).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(loader.state(), LoaderState::LoadingSucceeded);
        assert_eq!(device.live_allocations(), 2);
    }

    #[test]
    fn test_hdr_screenshot_beats_embedded_profile() {
        let make = Field {
            tag: Tag::Make,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![b"Microsoft".to_vec()]),
        };
        let model = Field {
            tag: Tag::Model,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![b"Xbox One X".to_vec()]),
        };
        let mut writer = Writer::new();
        writer.push_field(&make);
        writer.push_field(&model);
        let mut exif = Cursor::new(Vec::new());
        writer.write(&mut exif, true).unwrap();

        let srgb = lcms2::Profile::new_srgb().icc().unwrap();
        let source = BitmapSource::new(4, 2, CodecPixelFormat::Rgba16, vec![0; 4 * 2 * 8])
            .with_icc_profile(srgb.clone())
            .with_exif(exif.into_inner());

        let device = Rc::new(SoftwareDevice::new());
        let mut loader =
            ImageLoader::new(Rc::clone(&device) as Rc<dyn Device>).with_codec(StubCodec { source });
        let info = loader.load_from_stream(&mut Cursor::new(Vec::new())).unwrap();

        assert_eq!(info.color_profile, ColorProfileKind::VendorHdrScreenshot);
        assert!(info.force_bt2100_color_space);
        assert_eq!(info.num_profiles, 1);
        assert_eq!(loader.color_context().unwrap(), &ColorContext::IccProfile(srgb));
    }

    #[test]
    fn test_load_texture_file() {
        let temp_dir = TempDir::new().unwrap();
        let texture = temp_dir.child("albedo.tga");
        DynamicImage::new_rgb8(16, 8).save(texture.path()).unwrap();

        let device = Rc::new(SoftwareDevice::new());
        let (mut loader, decodes) = counting_loader(&device);
        let info = loader.load_from_file(texture.path(), ".tga").unwrap();

        assert_eq!(loader.state(), LoaderState::LoadingSucceeded);
        assert_eq!((info.width, info.height), (16, 8));
        assert_eq!(info.pixel_format, CodecPixelFormat::Rgba8);
        assert_eq!(decodes.get(), 1);

        loader.release_device_resources().unwrap();
        loader.create_device_resources().unwrap();
        assert_eq!(loader.image_info().unwrap(), info);
        assert_eq!(decodes.get(), 1);
    }

    #[test]
    fn test_missing_texture_file_fails_load() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = ImageLoader::new(Rc::new(SoftwareDevice::new()));

        let err = loader
            .load_from_file(temp_dir.child("missing.exr").path(), "exr")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(loader.state(), LoaderState::LoadingFailed);
    }

    #[test]
    fn test_load_image_path_routes_by_extension() {
        let temp_dir = TempDir::new().unwrap();
        let photo = temp_dir.child("photo.png");
        RgbaImage::new(5, 7).save(photo.path()).unwrap();

        let mut loader = ImageLoader::new(Rc::new(SoftwareDevice::new()));
        let info = lumen::load_image_path(&mut loader, photo.path(), None).unwrap();
        assert_eq!((info.width, info.height), (5, 7));

        let mut loader = ImageLoader::new(Rc::new(SoftwareDevice::new()));
        let err = lumen::load_image_path(&mut loader, photo.path(), Some("exr")).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::CodecFailure | ErrorKind::UnsupportedFormat
        ));
        assert_eq!(loader.state(), LoaderState::LoadingFailed);
    }
}
