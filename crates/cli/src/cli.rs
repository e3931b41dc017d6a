//! CLI definitions and command dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use woffpress_font_ops::Fixture;
use woffpress_font_woff2::Options;

use crate::{
    commands::{batch, encode, inspect},
    io::read_file,
};

#[derive(Parser)]
#[command(name = "woffpress")]
#[command(about = "Encode fonts and font collections as WOFF2, including invalid test fixtures")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Encoder settings shared by `encode` and `batch`.
#[derive(Debug, Clone, clap::Args)]
pub struct EncodeArgs {
    /// Store glyf, loca and hmtx untransformed
    #[arg(long)]
    pub no_transform: bool,
    /// Brotli quality (0-11)
    #[arg(short, long, default_value_t = 11)]
    pub quality: u32,
    /// Extended metadata XML to embed
    #[arg(long)]
    pub metadata: Option<PathBuf>,
    /// Private data block to embed
    #[arg(long)]
    pub private: Option<PathBuf>,
    /// Produce a named test fixture instead of a conformant file
    #[arg(long)]
    pub fixture: Option<Fixture>,
}

impl EncodeArgs {
    pub fn options(&self) -> Result<Options> {
        let mut options = Options::new().transforms(!self.no_transform).quality(self.quality);
        if let Some(path) = &self.metadata {
            options = options.metadata(read_file(path).context("Failed to read metadata")?);
        }
        if let Some(path) = &self.private {
            options = options.private_data(read_file(path).context("Failed to read private data")?);
        }
        if let Some(fixture) = self.fixture {
            options = fixture.options(options);
        }
        Ok(options)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encode one font, one collection, or several fonts as a collection
    Encode {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
        /// Suffix the names of collection fonts so they stay distinct
        #[arg(long)]
        unique_names: bool,
        #[command(flatten)]
        args: EncodeArgs,
    },
    /// Encode every font matching a glob pattern in parallel
    Batch {
        /// Pattern relative to --dir, e.g. "*.ttf"
        pattern: String,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        #[arg(long, default_value = "woff2")]
        out_dir: PathBuf,
        #[command(flatten)]
        args: EncodeArgs,
    },
    /// Print the header, table directory and collection directory of a WOFF2 file
    Inspect { file: PathBuf },
}

impl Commands {
    pub fn run(self) -> Result<()> {
        match self {
            Commands::Encode { inputs, output, unique_names, args } => {
                encode(&inputs, &output, unique_names, &args.options()?)?;
            }
            Commands::Batch { pattern, dir, out_dir, args } => {
                batch(&dir, &pattern, &out_dir, &args.options()?)?;
            }
            Commands::Inspect { file } => {
                inspect(&file)?;
            }
        }
        Ok(())
    }
}
