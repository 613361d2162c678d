//! End-to-end batch run: spreadsheet rows in, finished MP4 out.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    anim::{Ease, SlideFrames, frame_count},
    assets::{fonts::Fonts, load_image_file},
    audio,
    compose::{self, SlideLayers},
    config::{Config, parse_hex_rgb},
    encode::{EncodeConfig, FfmpegEncoder},
    error::{ReelError, ReelResult},
    prepare::{BackgroundRemoval, prepare_image},
    rows::{RowFilter, load_slide_records},
};

/// What a completed run produced.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub slides: usize,
    pub total_frames: u64,
    pub duration_seconds: f64,
    pub output_path: PathBuf,
}

/// Render the whole slideshow described by `cfg`.
///
/// Row problems (skip flags, missing or undecodable images) drop the affected
/// slide with a warning; missing soft capabilities (logo, fonts, music,
/// rembg) degrade the output. Everything else is fatal, and a failure after
/// encoding starts leaves no partial output file behind.
pub fn run(cfg: &Config) -> ReelResult<RunReport> {
    cfg.validate()?;

    let fonts = Fonts::load(
        cfg.font_title_path.as_deref(),
        cfg.font_body_path.as_deref(),
    );

    let logo = match &cfg.logo_path {
        Some(path) => match load_image_file(path) {
            Ok(img) => Some(img),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "logo unusable, rendering without it");
                None
            }
        },
        None => None,
    };

    let filter = RowFilter::from_config(cfg);
    let records = load_slide_records(&cfg.spreadsheet_path, &filter)?;
    info!(rows = records.len(), "slide records loaded");

    let removal = BackgroundRemoval::detect(cfg.remove_bg);
    let (col_w, col_h) = compose::image_column_size(cfg);

    let mut slides: Vec<Arc<SlideLayers>> = Vec::with_capacity(records.len());
    for record in &records {
        let image_path = cfg.images_dir.join(&record.image_filename);
        let prepared = match prepare_image(&image_path, col_w, col_h, &removal) {
            Ok(img) => img,
            Err(e) => {
                warn!(
                    image = %image_path.display(),
                    error = %e,
                    "image unusable, skipping slide"
                );
                continue;
            }
        };
        let layers = compose::compose_slide(record, &prepared, cfg, &fonts, logo.as_ref())?;
        slides.push(Arc::new(layers));
    }

    if slides.is_empty() {
        return Err(ReelError::validation(
            "no usable slides: every spreadsheet row was skipped or had an unusable image",
        ));
    }

    let frames_per_slide = frame_count(cfg.slide_duration_seconds, cfg.fps);
    let total_frames = frames_per_slide * slides.len() as u64;
    let duration_seconds = total_frames as f64 / f64::from(cfg.fps);

    let music_scratch = cfg.output_path.with_extension("music.f32le");
    let _scratch_guard = ScratchGuard::new(cfg.music_path.is_some().then(|| music_scratch.clone()));
    let audio_input = match &cfg.music_path {
        Some(path) => {
            crate::encode::ensure_parent_dir(&music_scratch)?;
            audio::prepare_music(path, duration_seconds, cfg.music_volume, &music_scratch)?
        }
        None => None,
    };

    let bg = parse_hex_rgb(&cfg.background_color)?;
    let enc_cfg = EncodeConfig {
        width: cfg.frame_width,
        height: cfg.frame_height,
        fps: cfg.fps,
        bitrate: cfg.target_bitrate.clone(),
        out_path: cfg.output_path.clone(),
        overwrite: cfg.overwrite,
    };
    let encoder = FfmpegEncoder::new(enc_cfg, [bg[0], bg[1], bg[2], 255], audio_input.as_ref())?;

    if let Err(e) = encode_slides(encoder, &slides, cfg) {
        // Never leave a truncated MP4 behind. Only reached once encoding has
        // started, so a pre-existing output is never deleted.
        let _ = std::fs::remove_file(&cfg.output_path);
        return Err(e);
    }

    info!(
        slides = slides.len(),
        frames = total_frames,
        seconds = duration_seconds,
        output = %cfg.output_path.display(),
        "render complete"
    );
    Ok(RunReport {
        slides: slides.len(),
        total_frames,
        duration_seconds,
        output_path: cfg.output_path.clone(),
    })
}

/// Removes a staged scratch file when dropped, so every return path out of
/// [`run`] cleans it up.
struct ScratchGuard(Option<PathBuf>);

impl ScratchGuard {
    fn new(path: Option<PathBuf>) -> Self {
        Self(path)
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn encode_slides(
    mut encoder: FfmpegEncoder,
    slides: &[Arc<SlideLayers>],
    cfg: &Config,
) -> ReelResult<()> {
    for (idx, layers) in slides.iter().enumerate() {
        let frames = SlideFrames::new(
            Arc::clone(layers),
            cfg.slide_duration_seconds,
            cfg.fps,
            cfg.entrance_seconds,
            Ease::OutCubic,
        );
        info!(slide = idx + 1, frames = frames.total_frames(), "encoding slide");
        for frame in frames {
            encoder.encode_frame(&frame?)?;
        }
    }
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_with(spreadsheet: &str, images: &str, output: &str) -> Config {
        serde_json::from_str(&format!(
            r#"{{
                "spreadsheet_path": "{spreadsheet}",
                "images_dir": "{images}",
                "output_path": "{output}",
                "frame_width": 64,
                "frame_height": 32
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn missing_spreadsheet_is_fatal() {
        let cfg = cfg_with(
            "/no/such/slides.xlsx",
            "/no/such/images",
            "target/test-pipeline/out.mp4",
        );
        let err = run(&cfg).unwrap_err();
        assert!(matches!(
            err,
            ReelError::Validation(_) | ReelError::Other(_)
        ));
    }

    #[test]
    fn scratch_guard_removes_file_on_any_exit() {
        let dir = PathBuf::from("target/test-pipeline");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("guarded.music.f32le");
        std::fs::write(&path, b"pcm").unwrap();

        drop(ScratchGuard::new(Some(path.clone())));
        assert!(!path.exists());

        // Already-removed file and no-scratch runs are no-ops.
        drop(ScratchGuard::new(Some(path)));
        drop(ScratchGuard::new(None));
    }

    #[test]
    fn failed_run_leaves_no_output() {
        let out = "target/test-pipeline/never-written.mp4";
        let cfg = cfg_with("/no/such/slides.xlsx", "/no/such/images", out);
        assert!(run(&cfg).is_err());
        assert!(!std::path::Path::new(out).exists());
    }
}
