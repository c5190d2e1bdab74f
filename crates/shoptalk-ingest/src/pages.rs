//! Pre-extracted manual pages on disk.
//!
//! A manual directory holds one `NNN.txt` per page plus optional
//! `NNN-<name>.png` figures. PDF decoding happens upstream; this loader
//! only assembles pages and reads figure dimensions from the PNG IHDR
//! header so the pipeline can drop icons without decoding pixels.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::warn;

use shoptalk_core::types::{ManualPage, PageImage};

pub fn load_pages(dir: &Path) -> anyhow::Result<Vec<ManualPage>> {
    let mut pages: BTreeMap<u32, ManualPage> = BTreeMap::new();

    let entries = fs::read_dir(dir)
        .with_context(|| format!("cannot read manual directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() {
            continue;
        }
        let (Some(stem), Some(ext)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.extension().and_then(|s| s.to_str()),
        ) else {
            continue;
        };

        match ext {
            "txt" => {
                let Ok(number) = stem.parse::<u32>() else {
                    warn!(file = %path.display(), "page file name is not a page number, skipping");
                    continue;
                };
                let text = fs::read_to_string(&path)
                    .with_context(|| format!("cannot read {}", path.display()))?;
                pages.entry(number).or_insert_with(|| empty_page(number)).text = text;
            }
            "png" => {
                let Some(number) = stem.split('-').next().and_then(|p| p.parse::<u32>().ok())
                else {
                    warn!(file = %path.display(), "figure file name has no page number, skipping");
                    continue;
                };
                let bytes = fs::read(&path)
                    .with_context(|| format!("cannot read {}", path.display()))?;
                let Some((width, height)) = png_dimensions(&bytes) else {
                    warn!(file = %path.display(), "not a valid PNG, skipping figure");
                    continue;
                };
                pages
                    .entry(number)
                    .or_insert_with(|| empty_page(number))
                    .images
                    .push(PageImage { width, height, bytes });
            }
            _ => {}
        }
    }

    Ok(pages.into_values().collect())
}

fn empty_page(number: u32) -> ManualPage {
    ManualPage { number, text: String::new(), images: Vec::new() }
}

/// Width and height from a PNG's IHDR header, without decoding the image.
pub fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    if bytes.len() < 24 || bytes[..8] != SIGNATURE || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    Some((width, height))
}
