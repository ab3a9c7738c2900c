// lumen/src/cli.rs
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lumen", version, about = "Load images once, keep them across device loss")]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load an image and print its metadata
    Info {
        input: PathBuf,

        /// Container extension to use instead of the file's own
        #[arg(long)]
        ext: Option<String>,

        /// Skip the console HDR screenshot heuristic
        #[arg(long)]
        no_hdr_detection: bool,
    },

    /// Load an image, then drop and restore its device resources repeatedly
    Cycle {
        input: PathBuf,

        #[arg(short = 'n', long, default_value_t = 3)]
        count: usize,

        /// Keep the device lost for this many restore attempts per cycle
        #[arg(long, default_value_t = 0)]
        failed_restores: usize,
    },

    /// Load every image in a directory and list the results
    Scan {
        input: PathBuf,

        #[arg(short, long)]
        recursive: bool,

        /// Worker threads (0 uses the global pool)
        #[arg(short, long, default_value_t = 0)]
        threads: usize,
    },
}
