// lumen/src/processors/analyzer.rs
use super::codec::BitmapSource;
use crate::core::{
    AdvancedColorKind, AlphaMode, ColorContext, ColorProfileKind, ImageInfo, LoaderError,
    Orientation, Result,
};
use exif::{Exif, In, Reader, Tag, Value};
use lcms2::{ColorSpaceSignature, Profile, TagSignature};

const EXIF_COLOR_SPACE_SRGB: u32 = 1;
const EXIF_COLOR_SPACE_ADOBE_RGB: u32 = 2;

// Chromaticity distance under which two sets of primaries are considered equal.
const PRIMARY_TOLERANCE: f64 = 0.005;
// Gamut area, relative to sRGB, above which a profile counts as wide gamut.
const WIDE_GAMUT_RATIO: f64 = 1.05;

#[derive(Debug, Clone)]
pub struct ImageAnalyzer {
    detect_hdr_screenshots: bool,
}

impl ImageAnalyzer {
    pub fn new() -> Self {
        Self {
            detect_hdr_screenshots: true,
        }
    }

    pub fn with_hdr_screenshot_detection(mut self, enabled: bool) -> Self {
        self.detect_hdr_screenshots = enabled;
        self
    }

    pub fn populate_metadata(&self, source: &BitmapSource) -> ImageInfo {
        let exif = read_exif(source);
        let format = source.format;

        let mut color_profile = self.classify_color_profile(source);
        let mut force_bt2100_color_space = false;
        if self.detect_vendor_hdr_screenshot(source) {
            // The capture signature wins over whatever profile the file declares.
            color_profile = ColorProfileKind::VendorHdrScreenshot;
            force_bt2100_color_space = true;
        }

        let advanced_color = if format.is_float() || force_bt2100_color_space {
            AdvancedColorKind::HighDynamicRange
        } else if format.bits_per_channel() > 8 || color_profile == ColorProfileKind::WideGamut {
            AdvancedColorKind::WideColorGamut
        } else {
            AdvancedColorKind::StandardDynamicRange
        };

        let num_profiles = if source.icc_profile.is_some()
            || exif.as_ref().and_then(exif_color_space).is_some()
        {
            1
        } else {
            0
        };

        let orientation = exif
            .as_ref()
            .and_then(|exif| exif.get_field(Tag::Orientation, In::PRIMARY))
            .and_then(|field| field.value.get_uint(0))
            .and_then(Orientation::from_exif)
            .unwrap_or_default();

        ImageInfo {
            width: source.width,
            height: source.height,
            bits_per_pixel: format.bits_per_pixel(),
            bits_per_channel: format.bits_per_channel(),
            is_float: format.is_float(),
            pixel_format: format,
            alpha_mode: if format.has_alpha() {
                AlphaMode::Straight
            } else {
                AlphaMode::Opaque
            },
            color_profile,
            num_profiles,
            advanced_color,
            force_bt2100_color_space,
            frame_count: source.frame_count.max(1),
            orientation,
        }
    }

    pub fn classify_color_profile(&self, source: &BitmapSource) -> ColorProfileKind {
        if let Some(icc) = &source.icc_profile {
            return classify_icc(icc);
        }

        match read_exif(source).as_ref().and_then(exif_color_space) {
            Some(EXIF_COLOR_SPACE_ADOBE_RGB) => ColorProfileKind::WideGamut,
            _ => ColorProfileKind::StandardRgb,
        }
    }

    pub fn detect_vendor_hdr_screenshot(&self, source: &BitmapSource) -> bool {
        if !self.detect_hdr_screenshots || source.format.bits_per_channel() <= 8 {
            return false;
        }

        let Some(exif) = read_exif(source) else {
            return false;
        };
        let make = ascii_field(&exif, Tag::Make).unwrap_or_default();
        let model = ascii_field(&exif, Tag::Model).unwrap_or_default();

        make.starts_with("Microsoft") && model.contains("Xbox")
    }

    pub fn color_context(&self, source: &BitmapSource) -> Result<ColorContext> {
        if let Some(icc) = &source.icc_profile {
            Profile::new_icc(icc).map_err(|e| {
                LoaderError::CodecFailure(format!("embedded ICC profile is malformed: {}", e))
            })?;
            return Ok(ColorContext::IccProfile(icc.clone()));
        }

        match read_exif(source).as_ref().and_then(exif_color_space) {
            Some(EXIF_COLOR_SPACE_ADOBE_RGB) => {
                Ok(ColorContext::ExifColorSpace(EXIF_COLOR_SPACE_ADOBE_RGB as u16))
            }
            _ => Ok(ColorContext::srgb()),
        }
    }
}

impl Default for ImageAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn read_exif(source: &BitmapSource) -> Option<Exif> {
    let raw = source.exif.as_deref()?;
    let tiff = raw.strip_prefix(b"Exif\0\0").unwrap_or(raw);

    match Reader::new().read_raw(tiff.to_vec()) {
        Ok(exif) => Some(exif),
        Err(e) => {
            log::debug!("Ignoring unreadable EXIF block: {}", e);
            None
        }
    }
}

fn exif_color_space(exif: &Exif) -> Option<u32> {
    exif.get_field(Tag::ColorSpace, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .filter(|value| matches!(*value, EXIF_COLOR_SPACE_SRGB | EXIF_COLOR_SPACE_ADOBE_RGB))
}

fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(values) => values.first().map(|bytes| {
            String::from_utf8_lossy(bytes)
                .trim_end_matches('\0')
                .trim()
                .to_string()
        }),
        _ => None,
    }
}

fn classify_icc(data: &[u8]) -> ColorProfileKind {
    let profile = match Profile::new_icc(data) {
        Ok(profile) => profile,
        Err(e) => {
            log::debug!("Unparseable ICC profile treated as custom: {}", e);
            return ColorProfileKind::CustomIcc;
        }
    };

    if !matches!(profile.color_space(), ColorSpaceSignature::RgbData) {
        return ColorProfileKind::CustomIcc;
    }
    let (Some(primaries), Some(srgb)) = (
        colorant_chromaticities(&profile),
        colorant_chromaticities(&Profile::new_srgb()),
    ) else {
        return ColorProfileKind::CustomIcc;
    };

    let matches_srgb = primaries.iter().zip(srgb.iter()).all(|(a, b)| {
        (a.0 - b.0).abs() < PRIMARY_TOLERANCE && (a.1 - b.1).abs() < PRIMARY_TOLERANCE
    });

    if matches_srgb {
        ColorProfileKind::StandardRgb
    } else if gamut_area(&primaries) > gamut_area(&srgb) * WIDE_GAMUT_RATIO {
        ColorProfileKind::WideGamut
    } else {
        ColorProfileKind::CustomIcc
    }
}

fn colorant_chromaticities(profile: &Profile) -> Option<[(f64, f64); 3]> {
    let mut primaries = [(0.0, 0.0); 3];
    let tags = [
        TagSignature::RedColorantTag,
        TagSignature::GreenColorantTag,
        TagSignature::BlueColorantTag,
    ];

    for (slot, tag) in primaries.iter_mut().zip(tags) {
        match profile.read_tag(tag) {
            lcms2::Tag::CIEXYZ(xyz) => {
                let sum = xyz.X + xyz.Y + xyz.Z;
                if sum <= f64::EPSILON {
                    return None;
                }
                *slot = (xyz.X / sum, xyz.Y / sum);
            }
            _ => return None,
        }
    }

    Some(primaries)
}

fn gamut_area(primaries: &[(f64, f64); 3]) -> f64 {
    let [(rx, ry), (gx, gy), (bx, by)] = *primaries;
    ((gx - rx) * (by - ry) - (bx - rx) * (gy - ry)).abs() / 2.0
}
