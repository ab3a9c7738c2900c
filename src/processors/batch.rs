// lumen/src/processors/batch.rs
use super::device::{Device, SoftwareDevice};
use crate::core::{ImageInfo, ImageLoader, LoaderConfig, LoaderError, Result};
use crate::utils::{is_supported_format, load_image_path};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ScanEntry {
    pub path: PathBuf,
    pub file_size: u64,
    pub info: ImageInfo,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub entries: Vec<ScanEntry>,
    pub errors: Vec<(PathBuf, String)>,
}

pub struct BatchScanner {
    config: LoaderConfig,
    thread_pool: Option<rayon::ThreadPool>,
}

impl BatchScanner {
    pub fn new(config: LoaderConfig, max_threads: usize) -> Result<Self> {
        config.validate()?;

        let thread_pool = if max_threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(max_threads)
                .build()
                .map_err(|e| {
                    LoaderError::InvalidArgument(format!("Failed to create thread pool: {}", e))
                })?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            config,
            thread_pool,
        })
    }

    pub fn scan_directory(&self, input_dir: &Path, recursive: bool) -> Result<ScanReport> {
        self.validate_dir(input_dir)?;

        let image_paths = self.collect_image_paths(input_dir, recursive);
        if image_paths.is_empty() {
            log::warn!("No image files found in {}", input_dir.display());
            return Ok(ScanReport::default());
        }

        log::info!(
            "Scanning {} images from {}",
            image_paths.len(),
            input_dir.display()
        );

        let pb = self.create_progress_bar(image_paths.len());
        let scan = || -> Vec<(PathBuf, Result<ScanEntry>)> {
            image_paths
                .par_iter()
                .progress_with(pb.clone())
                .map(|path| (path.clone(), self.scan_single(path)))
                .collect()
        };
        let results = match &self.thread_pool {
            Some(pool) => pool.install(scan),
            None => scan(),
        };

        let mut report = ScanReport::default();
        for (path, result) in results {
            match result {
                Ok(entry) => report.entries.push(entry),
                Err(e) => report.errors.push((path, e.to_string())),
            }
        }
        report.entries.sort_by(|a, b| a.path.cmp(&b.path));

        pb.finish_with_message(format!(
            "Loaded {} images, {} failed",
            report.entries.len(),
            report.errors.len()
        ));

        Ok(report)
    }

    fn scan_single(&self, path: &Path) -> Result<ScanEntry> {
        let device: Rc<dyn Device> = Rc::new(SoftwareDevice::new());
        let mut loader = ImageLoader::with_config(device, self.config.clone())?;
        let info = load_image_path(&mut loader, path, None)?;

        Ok(ScanEntry {
            path: path.to_path_buf(),
            file_size: std::fs::metadata(path)?.len(),
            info,
        })
    }

    pub fn collect_image_paths(&self, input_dir: &Path, recursive: bool) -> Vec<PathBuf> {
        let walker = if recursive {
            WalkDir::new(input_dir)
        } else {
            WalkDir::new(input_dir).max_depth(1)
        };

        let mut paths: Vec<PathBuf> = walker
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| is_supported_format(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        paths.sort();
        paths
    }

    fn create_progress_bar(&self, total: usize) -> ProgressBar {
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }

    fn validate_dir(&self, input_dir: &Path) -> Result<()> {
        if !input_dir.exists() {
            return Err(LoaderError::InvalidArgument(format!(
                "Input directory does not exist: {}",
                input_dir.display()
            )));
        }

        if !input_dir.is_dir() {
            return Err(LoaderError::InvalidArgument(format!(
                "Input path is not a directory: {}",
                input_dir.display()
            )));
        }

        Ok(())
    }
}
