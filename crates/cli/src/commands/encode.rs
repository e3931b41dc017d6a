//! `encode` and `batch`: font files in, WOFF2 files out.

use std::{path::Path, time::Instant};

use anyhow::{Context, Result};
use log::info;
use woffpress_font_ops::unique_names;
use woffpress_font_woff2::{ChecksumCache, Encoder, Options, SourceFont};

use crate::{
    io::{glob_fonts, read_file, woff2_path, write_file},
    parallel::run_parallel,
};

/// Encode `inputs` into one WOFF2 file.
///
/// A single input is encoded as it is, whether a font or a collection. Several
/// inputs are packed into one collection.
pub fn encode(inputs: &[impl AsRef<Path>], output: &Path, rename: bool, options: &Options) -> Result<()> {
    let start = Instant::now();
    let mut fonts = inputs.iter().map(|p| read_file(p.as_ref())).collect::<Result<Vec<_>>>()?;
    let encoder = Encoder::new(options.clone());

    let woff2 = if fonts.len() == 1 && !rename {
        encoder.encode(&fonts[0]).context("Failed to encode font")?
    } else {
        if rename {
            let refs: Vec<&[u8]> = fonts.iter().map(Vec::as_slice).collect();
            fonts = unique_names(&refs, false)?;
        }
        let sources = fonts
            .iter()
            .zip(inputs)
            .map(|(data, path)| {
                SourceFont::parse(data)
                    .with_context(|| format!("Failed to parse {}", AsRef::<Path>::as_ref(path).display()))
            })
            .collect::<Result<Vec<_>>>()?;
        encoder
            .encode_collection(&sources, &mut ChecksumCache::new())
            .context("Failed to encode collection")?
    };

    write_file(output, &woff2)?;
    info!("Wrote {} ({} bytes) in {:.2?}", output.display(), woff2.len(), start.elapsed());
    Ok(())
}

/// Encode every file matching `pattern` under `dir` into `out_dir`.
pub fn batch(dir: &Path, pattern: &str, out_dir: &Path, options: &Options) -> Result<()> {
    let files = glob_fonts(dir, pattern)?;
    info!("Encoding {} files from {}", files.len(), dir.display());
    let encoder = Encoder::new(options.clone());

    let result = run_parallel("Encode", &files, |path| {
        let data = read_file(path)?;
        let woff2 = encoder.encode(&data)?;
        write_file(&woff2_path(out_dir, path)?, woff2)
    })?;
    result.ok_or_bail("Encode")
}
