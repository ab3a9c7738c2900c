// lumen/src/processors/codec.rs
use super::format::{CodecPixelFormat, GpuPixelFormat};
use crate::core::{LoaderError, Result};
use half::f16;
use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{
    AnimationDecoder, DynamicImage, ImageBuffer, ImageDecoder, ImageError, ImageFormat, ImageReader,
};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

pub trait ImageStream: BufRead + Seek {}

impl<T: BufRead + Seek + ?Sized> ImageStream for T {}

#[derive(Debug, Clone, PartialEq)]
pub struct BitmapSource {
    pub width: u32,
    pub height: u32,
    pub format: CodecPixelFormat,
    pub pixels: Vec<u8>,
    pub icc_profile: Option<Vec<u8>>,
    /// Raw TIFF-structured EXIF payload.
    pub exif: Option<Vec<u8>>,
    pub frame_count: u32,
}

impl BitmapSource {
    pub fn new(width: u32, height: u32, format: CodecPixelFormat, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            pixels,
            icc_profile: None,
            exif: None,
            frame_count: 1,
        }
    }

    pub fn with_icc_profile(mut self, profile: Vec<u8>) -> Self {
        self.icc_profile = Some(profile);
        self
    }

    pub fn with_exif(mut self, exif: Vec<u8>) -> Self {
        self.exif = Some(exif);
        self
    }

    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    pub fn expected_len(&self) -> usize {
        self.stride() * self.height as usize
    }

    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureSource {
    pub width: u32,
    pub height: u32,
    pub format: GpuPixelFormat,
    pub pixels: Vec<u8>,
}

pub trait Codec {
    fn decode_stream(&self, stream: &mut dyn ImageStream) -> Result<BitmapSource>;

    fn decode_texture(&self, path: &Path, extension: &str) -> Result<TextureSource>;

    fn convert(&self, source: &BitmapSource, target: CodecPixelFormat) -> Result<BitmapSource>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl ImageCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for ImageCodec {
    fn decode_stream(&self, stream: &mut dyn ImageStream) -> Result<BitmapSource> {
        let start = stream.stream_position()?;
        let reader = ImageReader::new(&mut *stream).with_guessed_format()?;
        let container = reader.format().ok_or_else(|| {
            LoaderError::UnsupportedFormat("unrecognized image container".to_string())
        })?;
        log::debug!("Decoding {:?} stream", container);

        let mut decoder = reader.into_decoder().map_err(codec_error)?;
        let icc_profile = decoder.icc_profile().map_err(codec_error)?;
        let exif = decoder.exif_metadata().map_err(codec_error)?;
        let image = DynamicImage::from_decoder(decoder).map_err(codec_error)?;

        let (width, height) = (image.width(), image.height());
        let format = codec_format(&image)?;
        let mut source = BitmapSource::new(width, height, format, image.into_bytes());
        source.icc_profile = icc_profile;
        source.exif = exif;

        // Count frames on a second pass over the same bytes
        stream.seek(SeekFrom::Start(start))?;
        source.frame_count = count_frames(stream, container)?;
        Ok(source)
    }

    fn decode_texture(&self, path: &Path, extension: &str) -> Result<TextureSource> {
        let extension = extension.trim_start_matches('.').to_lowercase();
        let container = ImageFormat::from_extension(&extension).ok_or_else(|| {
            LoaderError::UnsupportedFormat(format!("unknown texture container: .{}", extension))
        })?;
        log::debug!("Decoding {:?} texture from {}", container, path.display());

        let file = File::open(path)?;
        let image = ImageReader::with_format(BufReader::new(file), container)
            .decode()
            .map_err(codec_error)?;

        // Textures have no three-channel device layouts except 32-bit float.
        let image = match image {
            DynamicImage::ImageRgb8(_) => DynamicImage::ImageRgba8(image.into_rgba8()),
            DynamicImage::ImageRgb16(_) => DynamicImage::ImageRgba16(image.into_rgba16()),
            other => other,
        };
        let format = match codec_format(&image)? {
            CodecPixelFormat::Gray8 => GpuPixelFormat::R8Unorm,
            CodecPixelFormat::GrayAlpha8 => GpuPixelFormat::R8G8Unorm,
            CodecPixelFormat::Rgba8 => GpuPixelFormat::R8G8B8A8Unorm,
            CodecPixelFormat::Gray16 => GpuPixelFormat::R16Unorm,
            CodecPixelFormat::GrayAlpha16 => GpuPixelFormat::R16G16Unorm,
            CodecPixelFormat::Rgba16 => GpuPixelFormat::R16G16B16A16Unorm,
            CodecPixelFormat::Rgb32Float => GpuPixelFormat::R32G32B32Float,
            CodecPixelFormat::Rgba32Float => GpuPixelFormat::R32G32B32A32Float,
            other => {
                return Err(LoaderError::UnsupportedFormat(format!(
                    "texture layout {} has no device format",
                    other
                )))
            }
        };

        Ok(TextureSource {
            width: image.width(),
            height: image.height(),
            format,
            pixels: image.into_bytes(),
        })
    }

    fn convert(&self, source: &BitmapSource, target: CodecPixelFormat) -> Result<BitmapSource> {
        if source.pixels.len() != source.expected_len() {
            return Err(LoaderError::CodecFailure(format!(
                "pixel buffer holds {} bytes, expected {}",
                source.pixels.len(),
                source.expected_len()
            )));
        }

        let rgba = unpack_rgba_f32(source)?;
        let pixels = match target {
            CodecPixelFormat::Rgba32Float => bytemuck::cast_slice::<f32, u8>(&rgba).to_vec(),
            CodecPixelFormat::Rgba16Half => {
                let halves: Vec<f16> = rgba.par_iter().map(|v| f16::from_f32(*v)).collect();
                bytemuck::cast_slice::<f16, u8>(&halves).to_vec()
            }
            other => {
                return Err(LoaderError::UnsupportedFormat(format!(
                    "cannot convert to {}",
                    other
                )))
            }
        };

        Ok(BitmapSource {
            format: target,
            pixels,
            ..source.clone()
        })
    }
}

fn codec_error(err: ImageError) -> LoaderError {
    match err {
        ImageError::Unsupported(e) => LoaderError::UnsupportedFormat(e.to_string()),
        ImageError::Limits(e) => LoaderError::MemoryLimitExceeded(e.to_string()),
        other => LoaderError::CodecFailure(other.to_string()),
    }
}

fn count_frames(stream: &mut dyn ImageStream, container: ImageFormat) -> Result<u32> {
    let frames = match container {
        ImageFormat::Gif => GifDecoder::new(stream).map_err(codec_error)?.into_frames(),
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(stream).map_err(codec_error)?;
            if !decoder.has_animation() {
                return Ok(1);
            }
            decoder.into_frames()
        }
        ImageFormat::Png => {
            let decoder = PngDecoder::new(stream).map_err(codec_error)?;
            if !decoder.is_apng().map_err(codec_error)? {
                return Ok(1);
            }
            decoder.apng().map_err(codec_error)?.into_frames()
        }
        _ => return Ok(1),
    };

    let mut count = 0u32;
    for frame in frames {
        frame.map_err(codec_error)?;
        count += 1;
    }
    Ok(count.max(1))
}

fn codec_format(image: &DynamicImage) -> Result<CodecPixelFormat> {
    use image::ColorType;

    match image.color() {
        ColorType::L8 => Ok(CodecPixelFormat::Gray8),
        ColorType::La8 => Ok(CodecPixelFormat::GrayAlpha8),
        ColorType::Rgb8 => Ok(CodecPixelFormat::Rgb8),
        ColorType::Rgba8 => Ok(CodecPixelFormat::Rgba8),
        ColorType::L16 => Ok(CodecPixelFormat::Gray16),
        ColorType::La16 => Ok(CodecPixelFormat::GrayAlpha16),
        ColorType::Rgb16 => Ok(CodecPixelFormat::Rgb16),
        ColorType::Rgba16 => Ok(CodecPixelFormat::Rgba16),
        ColorType::Rgb32F => Ok(CodecPixelFormat::Rgb32Float),
        ColorType::Rgba32F => Ok(CodecPixelFormat::Rgba32Float),
        other => Err(LoaderError::UnsupportedFormat(format!(
            "decoded color type {:?}",
            other
        ))),
    }
}

fn unpack_rgba_f32(source: &BitmapSource) -> Result<Vec<f32>> {
    let (width, height) = (source.width, source.height);
    let malformed = || LoaderError::CodecFailure("pixel buffer does not match dimensions".to_string());

    let image = match source.format {
        CodecPixelFormat::Gray8 => DynamicImage::ImageLuma8(
            ImageBuffer::from_raw(width, height, source.pixels.clone()).ok_or_else(malformed)?,
        ),
        CodecPixelFormat::GrayAlpha8 => DynamicImage::ImageLumaA8(
            ImageBuffer::from_raw(width, height, source.pixels.clone()).ok_or_else(malformed)?,
        ),
        CodecPixelFormat::Rgb8 => DynamicImage::ImageRgb8(
            ImageBuffer::from_raw(width, height, source.pixels.clone()).ok_or_else(malformed)?,
        ),
        CodecPixelFormat::Rgba8 => DynamicImage::ImageRgba8(
            ImageBuffer::from_raw(width, height, source.pixels.clone()).ok_or_else(malformed)?,
        ),
        CodecPixelFormat::Bgra8 => {
            let mut rgba = source.pixels.clone();
            for chunk in rgba.chunks_exact_mut(4) {
                chunk.swap(0, 2);
            }
            DynamicImage::ImageRgba8(ImageBuffer::from_raw(width, height, rgba).ok_or_else(malformed)?)
        }
        CodecPixelFormat::Gray16 => DynamicImage::ImageLuma16(
            ImageBuffer::from_raw(width, height, widen::<u16>(&source.pixels)).ok_or_else(malformed)?,
        ),
        CodecPixelFormat::GrayAlpha16 => DynamicImage::ImageLumaA16(
            ImageBuffer::from_raw(width, height, widen::<u16>(&source.pixels)).ok_or_else(malformed)?,
        ),
        CodecPixelFormat::Rgb16 => DynamicImage::ImageRgb16(
            ImageBuffer::from_raw(width, height, widen::<u16>(&source.pixels)).ok_or_else(malformed)?,
        ),
        CodecPixelFormat::Rgba16 => DynamicImage::ImageRgba16(
            ImageBuffer::from_raw(width, height, widen::<u16>(&source.pixels)).ok_or_else(malformed)?,
        ),
        CodecPixelFormat::Rgb32Float => DynamicImage::ImageRgb32F(
            ImageBuffer::from_raw(width, height, widen::<f32>(&source.pixels)).ok_or_else(malformed)?,
        ),
        CodecPixelFormat::Rgba32Float => return Ok(widen::<f32>(&source.pixels)),
        CodecPixelFormat::Rgba16Half => {
            return Ok(widen::<f16>(&source.pixels)
                .par_iter()
                .map(|v| v.to_f32())
                .collect())
        }
        CodecPixelFormat::Rgba1010102 => {
            return Ok(widen::<u32>(&source.pixels)
                .par_iter()
                .flat_map_iter(|packed| {
                    let channel = |shift: u32, mask: u32, max: f32| ((packed >> shift) & mask) as f32 / max;
                    [
                        channel(0, 0x3ff, 1023.0),
                        channel(10, 0x3ff, 1023.0),
                        channel(20, 0x3ff, 1023.0),
                        channel(30, 0x3, 3.0),
                    ]
                })
                .collect())
        }
        CodecPixelFormat::Cmyk8 => {
            return Err(LoaderError::UnsupportedFormat(
                "CMYK sources cannot be converted".to_string(),
            ))
        }
    };

    Ok(image.to_rgba32f().into_raw())
}

// Reinterprets native-endian bytes as wider samples without assuming alignment.
fn widen<T: bytemuck::Pod>(bytes: &[u8]) -> Vec<T> {
    bytemuck::pod_collect_to_vec(bytes)
}
