// lumen/src/utils/mod.rs
use crate::core::{ImageInfo, ImageLoader, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const STREAM_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp"];

// Containers that go through the texture path instead of content sniffing.
const TEXTURE_EXTENSIONS: [&str; 4] = ["dds", "tga", "hdr", "exr"];

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let base = 1024_f64;
    let bytes_f64 = bytes as f64;
    let exponent = ((bytes_f64.log10() / base.log10()).floor() as usize).min(UNITS.len() - 1);
    let size = bytes_f64 / base.powi(exponent as i32);

    format!("{:.2} {}", size, UNITS[exponent])
}

pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
}

pub fn is_texture_extension(extension: &str) -> bool {
    let extension = extension.trim_start_matches('.').to_lowercase();
    TEXTURE_EXTENSIONS.contains(&extension.as_str())
}

pub fn is_supported_format(path: &Path) -> bool {
    get_file_extension(path)
        .map(|ext| STREAM_EXTENSIONS.contains(&ext.as_str()) || is_texture_extension(&ext))
        .unwrap_or(false)
}

pub fn load_image_path(
    loader: &mut ImageLoader,
    path: &Path,
    extension: Option<&str>,
) -> Result<ImageInfo> {
    let extension = extension
        .map(|ext| ext.trim_start_matches('.').to_lowercase())
        .or_else(|| get_file_extension(path));

    match extension.as_deref() {
        Some(ext) if is_texture_extension(ext) => loader.load_from_file(path, ext),
        _ => {
            let mut reader = BufReader::new(File::open(path)?);
            loader.load_from_stream(&mut reader)
        }
    }
}
