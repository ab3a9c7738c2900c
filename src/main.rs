use anyhow::{bail, Context};
use clap::Parser;
use log::LevelFilter;
use lumen::{
    format_file_size, load_image_path, BatchScanner, Cli, Commands, Device, ImageInfo,
    ImageLoader, LoaderConfig, SoftwareDevice,
};
use std::path::{Path, PathBuf};
use std::rc::Rc;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init();

    match cli.command {
        Commands::Info {
            input,
            ext,
            no_hdr_detection,
        } => process_info(input, ext, no_hdr_detection)?,
        Commands::Cycle {
            input,
            count,
            failed_restores,
        } => process_cycle(input, count, failed_restores)?,
        Commands::Scan {
            input,
            recursive,
            threads,
        } => process_scan(input, recursive, threads)?,
    }

    Ok(())
}

fn process_info(input: PathBuf, ext: Option<String>, no_hdr_detection: bool) -> anyhow::Result<()> {
    if !input.exists() {
        bail!("File does not exist: {}", input.display());
    }

    let config = LoaderConfig {
        detect_hdr_screenshots: !no_hdr_detection,
        ..Default::default()
    };
    let device: Rc<dyn Device> = Rc::new(SoftwareDevice::new());
    let mut loader = ImageLoader::with_config(device, config)?;
    let info = load_image_path(&mut loader, &input, ext.as_deref())
        .with_context(|| format!("Failed to load {}", input.display()))?;
    let file_size = std::fs::metadata(&input)?.len();

    println!("=== Image Information ===");
    println!("File: {}", input.display());
    println!("Size: {}", format_file_size(file_size));
    print_info(&info);
    println!("Color context: {:?}", loader.color_context()?);

    Ok(())
}

fn process_cycle(input: PathBuf, count: usize, failed_restores: usize) -> anyhow::Result<()> {
    let device = Rc::new(SoftwareDevice::new());
    let mut loader = ImageLoader::new(Rc::clone(&device) as Rc<dyn Device>);
    let info = load_image_path(&mut loader, &input, None)
        .with_context(|| format!("Failed to load {}", input.display()))?;

    for cycle in 1..=count {
        device.set_lost(true);
        loader.release_device_resources()?;

        for attempt in 1..=failed_restores {
            let err = match loader.create_device_resources() {
                Ok(()) => bail!("restore succeeded on a lost device"),
                Err(e) => e,
            };
            println!("cycle {}: restore attempt {} failed: {}", cycle, attempt, err);
        }

        device.set_lost(false);
        loader.create_device_resources()?;

        if loader.image_info()? != info {
            bail!("metadata changed across device loss in cycle {}", cycle);
        }
        let view = loader.loaded_image(1.0)?;
        println!(
            "cycle {}: restored {}x{} as resource {:?} ({} live allocations)",
            cycle,
            view.width(),
            view.height(),
            view.source().id(),
            device.live_allocations()
        );
    }

    println!("State after {} cycles: {}", count, loader.state());
    Ok(())
}

fn process_scan(input: PathBuf, recursive: bool, threads: usize) -> anyhow::Result<()> {
    let scanner = BatchScanner::new(LoaderConfig::default(), threads)?;
    let report = scanner.scan_directory(&input, recursive)?;

    for entry in &report.entries {
        println!(
            "{}  {}x{}  {}  {:?}  {}",
            relative(&entry.path, &input).display(),
            entry.info.width,
            entry.info.height,
            entry.info.pixel_format,
            entry.info.color_profile,
            format_file_size(entry.file_size)
        );
    }
    for (path, error) in &report.errors {
        println!("{}  FAILED: {}", relative(path, &input).display(), error);
    }

    println!(
        "Scan complete. {} loaded, {} failed",
        report.entries.len(),
        report.errors.len()
    );
    Ok(())
}

fn print_info(info: &ImageInfo) {
    println!("Dimensions: {} x {} pixels", info.width, info.height);
    println!("Pixel format: {}", info.pixel_format);
    println!(
        "Bit depth: {} bpp, {} per channel{}",
        info.bits_per_pixel,
        info.bits_per_channel,
        if info.is_float { " (float)" } else { "" }
    );
    println!("Alpha: {:?}", info.alpha_mode);
    println!("Color profile: {:?} ({} embedded)", info.color_profile, info.num_profiles);
    println!("Advanced color: {:?}", info.advanced_color);
    if info.force_bt2100_color_space {
        println!("Forced BT.2100 color space");
    }
    println!("Frames: {}", info.frame_count);
    println!("Orientation: {:?}", info.orientation);
    if info.orientation.swaps_axes() {
        println!("Displayed as: {} x {} pixels", info.height, info.width);
    }
}

fn relative<'a>(path: &'a Path, base: &Path) -> &'a Path {
    path.strip_prefix(base).unwrap_or(path)
}
