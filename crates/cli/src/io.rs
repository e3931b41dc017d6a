//! Shared file I/O utilities.

use std::{
    fs::{create_dir_all, read, write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use glob::glob;

pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    read(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Write `data`, creating the parent directory if needed.
pub fn write_file(path: &Path, data: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    write(path, data).with_context(|| format!("Failed to write {}", path.display()))
}

/// Find files matching a glob pattern in a directory.
pub fn glob_fonts(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern = dir.join(pattern);
    let pattern_str = pattern.to_str().context("Invalid pattern path")?;
    Ok(glob(pattern_str)
        .with_context(|| format!("Failed to glob pattern: {pattern_str}"))?
        .filter_map(Result::ok)
        .collect())
}

/// `out_dir/<stem>.woff2` for an input font.
pub fn woff2_path(out_dir: &Path, input: &Path) -> Result<PathBuf> {
    let stem = input.file_stem().with_context(|| format!("No file name in {}", input.display()))?;
    Ok(out_dir.join(stem).with_extension("woff2"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_woff2_path() {
        let path = woff2_path(Path::new("out"), Path::new("fonts/Sample-Regular.ttf")).unwrap();
        assert_eq!(path, Path::new("out/Sample-Regular.woff2"));
        assert!(woff2_path(Path::new("out"), Path::new("/")).is_err());
    }
}
