use std::io::Write as _;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::Context as _;
use tracing::{debug, warn};

use crate::{
    assets::{PreparedImage, decode},
    error::{ReelError, ReelResult},
};

/// Optional background-removal capability backed by the `rembg` CLI.
///
/// Modeled as a capability check: absence degrades to pass-through, it never
/// fails a run.
#[derive(Clone, Copy, Debug)]
pub struct BackgroundRemoval {
    available: bool,
}

impl BackgroundRemoval {
    /// Probe for `rembg` on PATH. With `enabled == false` the capability is
    /// off regardless of what is installed.
    pub fn detect(enabled: bool) -> Self {
        let available = enabled && is_rembg_on_path();
        if enabled && !available {
            warn!("remove_bg requested but 'rembg' was not found on PATH; images pass through");
        }
        Self { available }
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        Self { available: false }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Run the image bytes through `rembg`, returning the alpha-matted PNG.
    /// Any failure degrades to `None` with a warning.
    pub fn apply(&self, image_bytes: &[u8]) -> Option<Vec<u8>> {
        if !self.available {
            return None;
        }

        let run = || -> std::io::Result<std::process::Output> {
            let mut child = Command::new("rembg")
                .arg("i")
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()?;
            if let Some(stdin) = child.stdin.as_mut() {
                stdin.write_all(image_bytes)?;
            }
            drop(child.stdin.take());
            child.wait_with_output()
        };

        match run() {
            Ok(out) if out.status.success() && !out.stdout.is_empty() => Some(out.stdout),
            Ok(out) => {
                warn!(
                    status = %out.status,
                    stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                    "rembg failed, keeping original image"
                );
                None
            }
            Err(e) => {
                warn!(error = %e, "rembg invocation failed, keeping original image");
                None
            }
        }
    }
}

pub fn is_rembg_on_path() -> bool {
    Command::new("rembg")
        .arg("--help")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Load, optionally background-remove, and size one product image into a
/// buffer of exactly `target_w x target_h` (alpha preserved, premultiplied).
///
/// Images smaller than the target box are upscaled (Lanczos3); larger images
/// are downscaled to fit. The content is aspect-fit and centered over
/// transparent padding.
pub fn prepare_image(
    path: &Path,
    target_w: u32,
    target_h: u32,
    removal: &BackgroundRemoval,
) -> ReelResult<PreparedImage> {
    if target_w == 0 || target_h == 0 {
        return Err(ReelError::render("image target size must be non-zero"));
    }

    let bytes =
        std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
    let bytes = match removal.apply(&bytes) {
        Some(matted) => {
            debug!(path = %path.display(), "background removed");
            matted
        }
        None => bytes,
    };

    let img = image::load_from_memory(&bytes)
        .with_context(|| format!("decode image '{}'", path.display()))?
        .to_rgba8();

    Ok(decode::from_rgba_image(fit_to_box(img, target_w, target_h)))
}

/// Aspect-preserving fit of `img` into a `target_w x target_h` canvas with
/// transparent padding. Scaling up is allowed (small sources look pixelated
/// otherwise); the scaled content always touches the box on one axis.
pub fn fit_to_box(img: image::RgbaImage, target_w: u32, target_h: u32) -> image::RgbaImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return image::RgbaImage::new(target_w, target_h);
    }

    let scale = (f64::from(target_w) / f64::from(w)).min(f64::from(target_h) / f64::from(h));
    let new_w = ((f64::from(w) * scale).round() as u32).clamp(1, target_w);
    let new_h = ((f64::from(h) * scale).round() as u32).clamp(1, target_h);

    let resized = if (new_w, new_h) == (w, h) {
        img
    } else {
        image::imageops::resize(&img, new_w, new_h, image::imageops::FilterType::Lanczos3)
    };

    let mut canvas = image::RgbaImage::new(target_w, target_h);
    let x = i64::from((target_w - new_w) / 2);
    let y = i64::from((target_h - new_h) / 2);
    image::imageops::overlay(&mut canvas, &resized, x, y);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> image::RgbaImage {
        image::RgbaImage::from_pixel(w, h, image::Rgba(px))
    }

    #[test]
    fn small_image_is_upscaled_to_target_box() {
        let out = fit_to_box(solid(10, 10, [255, 0, 0, 255]), 100, 200);
        assert_eq!(out.dimensions(), (100, 200));
        // 10x10 scales by 10 -> 100x100 centered vertically; the middle is red,
        // the top padding transparent.
        assert_eq!(out.get_pixel(50, 100).0[3], 255);
        assert_eq!(out.get_pixel(50, 10).0[3], 0);
    }

    #[test]
    fn large_image_is_downscaled_never_cropped_out() {
        let out = fit_to_box(solid(4000, 1000, [0, 255, 0, 255]), 800, 800);
        assert_eq!(out.dimensions(), (800, 800));
        // 4:1 source fills full width at 800x200, centered.
        assert_eq!(out.get_pixel(0, 400).0[3], 255);
        assert_eq!(out.get_pixel(400, 50).0[3], 0);
    }

    #[test]
    fn exact_size_passes_through() {
        let out = fit_to_box(solid(64, 64, [1, 2, 3, 255]), 64, 64);
        assert_eq!(out.dimensions(), (64, 64));
        assert_eq!(out.get_pixel(0, 0).0, [1, 2, 3, 255]);
    }

    #[test]
    fn alpha_is_preserved_through_fit() {
        let out = fit_to_box(solid(10, 10, [255, 0, 0, 128]), 20, 20);
        let px = out.get_pixel(10, 10).0;
        assert!(px[3] > 100 && px[3] < 160);
    }

    #[test]
    fn disabled_removal_is_passthrough() {
        let removal = BackgroundRemoval::disabled();
        assert!(!removal.is_available());
        assert!(removal.apply(b"anything").is_none());
    }

    #[test]
    fn prepare_missing_file_is_an_error() {
        let removal = BackgroundRemoval::disabled();
        let err = prepare_image(Path::new("/no/such/image.png"), 10, 10, &removal);
        assert!(err.is_err());
    }
}
