//! Classical mask-based inpainting.
//!
//! Masked pixels are filled from the hole boundary inwards, one ring at a
//! time. Each pixel of a ring takes the inverse-square-distance weighted mean
//! of the already known pixels inside a small square window, so colours flow
//! smoothly from the surroundings into the hole.

use crate::{sorted_entries, ToolError};
use image::imageops::{self, FilterType};
use image::{GrayImage, Rgb, RgbImage};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Window half-size used by the CLI.
pub const DEFAULT_RADIUS: u32 = 3;

/// Mask luma above this marks a pixel for removal.
const MASK_THRESHOLD: u8 = 127;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Fill the pixels of `image` selected by `mask`. A mask of a different size
/// is scaled to the image with nearest-neighbour sampling. Unmasked pixels
/// are returned untouched.
pub fn inpaint(image: &RgbImage, mask: &GrayImage, radius: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let mask = if mask.dimensions() == (w, h) {
        mask.clone()
    } else {
        imageops::resize(mask, w, h, FilterType::Nearest)
    };

    let mut out = image.clone();
    let mut known: Vec<bool> = mask.pixels().map(|p| p.0[0] <= MASK_THRESHOLD).collect();
    if known.iter().all(|k| *k) || !known.iter().any(|k| *k) {
        return out;
    }

    let index = |x: u32, y: u32| (y as usize) * (w as usize) + x as usize;
    let mut queued = vec![false; known.len()];
    let mut ring = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let i = index(x, y);
            if !known[i] && neighbours(x, y, w, h).any(|(nx, ny)| known[index(nx, ny)]) {
                queued[i] = true;
                ring.push((x, y));
            }
        }
    }

    let radius = radius.max(1) as i64;
    while !ring.is_empty() {
        let filled: Vec<((u32, u32), Rgb<u8>)> = ring
            .iter()
            .filter_map(|&(x, y)| {
                weighted_mean(&out, &known, x, y, radius).map(|colour| ((x, y), colour))
            })
            .collect();

        let mut next = Vec::new();
        for &((x, y), colour) in &filled {
            out.put_pixel(x, y, colour);
            known[index(x, y)] = true;
        }
        for &((x, y), _) in &filled {
            for (nx, ny) in neighbours(x, y, w, h) {
                let i = index(nx, ny);
                if !known[i] && !queued[i] {
                    queued[i] = true;
                    next.push((nx, ny));
                }
            }
        }
        ring = next;
    }
    out
}

fn neighbours(x: u32, y: u32, w: u32, h: u32) -> impl Iterator<Item = (u32, u32)> {
    let (x, y) = (x as i64, y as i64);
    [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
        .into_iter()
        .filter(move |&(nx, ny)| nx >= 0 && ny >= 0 && nx < w as i64 && ny < h as i64)
        .map(|(nx, ny)| (nx as u32, ny as u32))
}

fn weighted_mean(img: &RgbImage, known: &[bool], x: u32, y: u32, radius: i64) -> Option<Rgb<u8>> {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let (cx, cy) = (x as i64, y as i64);
    let mut sum = [0f64; 3];
    let mut total = 0f64;

    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let (nx, ny) = (cx + dx, cy + dy);
            if nx < 0 || ny < 0 || nx >= w || ny >= h {
                continue;
            }
            let d2 = dx * dx + dy * dy;
            if d2 == 0 || d2 > radius * radius || !known[(ny * w + nx) as usize] {
                continue;
            }
            let weight = 1.0 / d2 as f64;
            let px = img.get_pixel(nx as u32, ny as u32);
            for (acc, channel) in sum.iter_mut().zip(px.0) {
                *acc += weight * channel as f64;
            }
            total += weight;
        }
    }

    (total > 0.0).then(|| Rgb(sum.map(|s| (s / total).round().clamp(0.0, 255.0) as u8)))
}

/// Load an image and its mask from disk and inpaint with [`DEFAULT_RADIUS`].
pub fn inpaint_file(image_path: &Path, mask_path: &Path) -> Result<RgbImage, ToolError> {
    let image = image::open(image_path)
        .map_err(|e| ToolError::image(image_path, e))?
        .to_rgb8();
    let mask = image::open(mask_path)
        .map_err(|e| ToolError::image(mask_path, e))?
        .to_luma8();
    Ok(inpaint(&image, &mask, DEFAULT_RADIUS))
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InpaintReport {
    pub written: Vec<PathBuf>,
    pub skipped_existing: usize,
    pub missing_mask: usize,
    pub unreadable: usize,
}

/// Inpaint `images/<category>/<name>` with `masks/<category>/<stem>.png` into
/// `output/<category>/<name>`. Existing outputs are never overwritten.
pub fn inpaint_dir(images: &Path, masks: &Path, output: &Path) -> Result<InpaintReport, ToolError> {
    let mut report = InpaintReport::default();

    for category in sorted_entries(images, true)? {
        let image_dir = images.join(&category);
        for name in sorted_entries(&image_dir, false)? {
            let source = image_dir.join(&name);
            if !has_image_extension(&source) {
                continue;
            }
            let target = output.join(&category).join(&name);
            if target.exists() {
                report.skipped_existing += 1;
                debug!(target: "tools.inpaint", path = %target.display(), "output exists; skipping");
                continue;
            }
            let stem = source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mask = masks.join(&category).join(format!("{stem}.png"));
            if !mask.is_file() {
                report.missing_mask += 1;
                warn!(target: "tools.inpaint", image = %source.display(), mask = %mask.display(), "no mask");
                continue;
            }

            let filled = match inpaint_file(&source, &mask) {
                Ok(filled) => filled,
                Err(err) => {
                    report.unreadable += 1;
                    warn!(target: "tools.inpaint", error = %err, "skipping unreadable pair");
                    continue;
                }
            };

            let dir = output.join(&category);
            std::fs::create_dir_all(&dir).map_err(|e| ToolError::io(&dir, e))?;
            filled.save(&target).map_err(|e| ToolError::image(&target, e))?;
            debug!(target: "tools.inpaint", path = %target.display(), "written");
            report.written.push(target);
        }
    }

    info!(
        target: "tools.inpaint",
        written = report.written.len(),
        skipped_existing = report.skipped_existing,
        missing_mask = report.missing_mask,
        unreadable = report.unreadable,
        "inpaint finished"
    );
    Ok(report)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|k| e.eq_ignore_ascii_case(k)))
}
