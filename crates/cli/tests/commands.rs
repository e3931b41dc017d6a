use std::{
    fs,
    path::{Path, PathBuf},
};

use woffpress_cli::commands::{batch, describe, encode};
use woffpress_font_woff2::{Options, read_woff2};

/// A scratch directory unique to one test.
fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("woffpress-cli-{}-{name}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_sample(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, font_test_data::VAZIRMATN_VAR).unwrap();
    path
}

#[test]
fn test_encode_single_font() {
    let dir = scratch("single");
    let input = write_sample(&dir, "Sample.ttf");
    let output = dir.join("out/Sample.woff2");
    encode(&[&input], &output, false, &Options::new().quality(5)).unwrap();

    let data = fs::read(&output).unwrap();
    let info = read_woff2(&data).unwrap();
    assert!(info.collection.is_none());
    assert!(describe(&info).contains("numTables"));
}

#[test]
fn test_encode_collection_with_unique_names() {
    let dir = scratch("collection");
    let first = write_sample(&dir, "A.ttf");
    let second = write_sample(&dir, "B.ttf");
    let output = dir.join("AB.woff2");
    encode(&[first, second], &output, true, &Options::new().quality(5)).unwrap();

    let data = fs::read(&output).unwrap();
    let info = read_woff2(&data).unwrap();
    let collection = info.collection.as_ref().unwrap();
    assert_eq!(collection.fonts.len(), 2);
    assert_ne!(collection.fonts[0], collection.fonts[1]);
    assert!(describe(&info).contains("font 1"));
}

#[test]
fn test_batch() {
    let dir = scratch("batch");
    write_sample(&dir, "A.ttf");
    write_sample(&dir, "B.ttf");
    fs::write(dir.join("notes.txt"), "not a font").unwrap();
    let out_dir = dir.join("woff2");
    batch(&dir, "*.ttf", &out_dir, &Options::new().quality(5)).unwrap();

    assert!(out_dir.join("A.woff2").exists());
    assert!(out_dir.join("B.woff2").exists());
}

#[test]
fn test_batch_reports_failures() {
    let dir = scratch("batch-fail");
    fs::write(dir.join("broken.ttf"), "not a font").unwrap();
    assert!(batch(&dir, "*.ttf", &dir.join("woff2"), &Options::new()).is_err());
}
