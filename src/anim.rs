//! Per-slide frame timing and entrance easing.

use std::sync::Arc;

use crate::{
    compose::{FrameRgba, SlideLayers},
    error::ReelResult,
};

#[derive(Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize)]
pub enum Ease {
    Linear,
    InQuad,
    OutQuad,
    InOutQuad,
    InCubic,
    #[default]
    OutCubic,
    InOutCubic,
}

impl Ease {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::InQuad => t * t,
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::InCubic => t * t * t,
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
                }
            }
        }
    }
}

/// Frames in a slide of `duration_seconds` at `fps`, never less than one.
pub fn frame_count(duration_seconds: f64, fps: u32) -> u64 {
    ((duration_seconds * f64::from(fps)).round() as u64).max(1)
}

/// Finite, restartable frame sequence for one slide.
///
/// Frames 0..entrance carry the eased entrance offsets; every later frame is
/// the identical resting composite. A slide too short for the full entrance
/// window clamps the window so the final frame is always at rest.
pub struct SlideFrames {
    layers: Arc<SlideLayers>,
    ease: Ease,
    total: u64,
    entrance: u64,
    next: u64,
}

impl SlideFrames {
    pub fn new(
        layers: Arc<SlideLayers>,
        duration_seconds: f64,
        fps: u32,
        entrance_seconds: f64,
        ease: Ease,
    ) -> Self {
        let total = frame_count(duration_seconds, fps);
        let entrance = ((entrance_seconds * f64::from(fps)).round() as u64)
            .min(total.saturating_sub(1));
        Self {
            layers,
            ease,
            total,
            entrance,
            next: 0,
        }
    }

    pub fn total_frames(&self) -> u64 {
        self.total
    }

    pub fn entrance_frames(&self) -> u64 {
        self.entrance
    }

    pub fn restart(&mut self) {
        self.next = 0;
    }

    /// Eased progress at frame `i`: 0.0 at the first frame, 1.0 from the end
    /// of the entrance window onward.
    pub fn progress_at(&self, i: u64) -> f64 {
        if self.entrance == 0 || i >= self.entrance {
            return 1.0;
        }
        self.ease.apply(i as f64 / self.entrance as f64)
    }

    pub fn frame_at(&self, i: u64) -> ReelResult<FrameRgba> {
        self.layers.render_at(self.progress_at(i))
    }
}

impl Iterator for SlideFrames {
    type Item = ReelResult<FrameRgba>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let frame = self.frame_at(self.next);
        self.next += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.total - self.next) as usize;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_stable() {
        for ease in [
            Ease::Linear,
            Ease::InQuad,
            Ease::OutQuad,
            Ease::InOutQuad,
            Ease::InCubic,
            Ease::OutCubic,
            Ease::InOutCubic,
        ] {
            assert_eq!(ease.apply(0.0), 0.0);
            assert_eq!(ease.apply(1.0), 1.0);
        }
    }

    #[test]
    fn monotonic_spot_check() {
        for ease in [
            Ease::Linear,
            Ease::InQuad,
            Ease::OutQuad,
            Ease::InOutQuad,
            Ease::InCubic,
            Ease::OutCubic,
            Ease::InOutCubic,
        ] {
            let a = ease.apply(0.25);
            let b = ease.apply(0.5);
            let c = ease.apply(0.75);
            assert!(a < b);
            assert!(b < c);
        }
    }

    #[test]
    fn frame_count_rounds_and_floors_at_one() {
        assert_eq!(frame_count(5.0, 30), 150);
        assert_eq!(frame_count(0.016, 30), 1);
        assert_eq!(frame_count(0.0, 30), 1);
        assert_eq!(frame_count(1.01, 24), 24);
    }

    fn frames(duration: f64, fps: u32, entrance: f64) -> SlideFrames {
        // Progress math does not depend on the layers; a trivial slide works.
        let layers = Arc::new(test_layers());
        SlideFrames::new(layers, duration, fps, entrance, Ease::OutCubic)
    }

    fn test_layers() -> crate::compose::SlideLayers {
        use crate::{assets::PreparedImage, compose, config::Config, rows::SlideRecord};
        use std::sync::Arc;

        let cfg: Config = serde_json::from_str(
            r#"{
                "spreadsheet_path": "s.xlsx",
                "images_dir": "i",
                "frame_width": 64,
                "frame_height": 32,
                "safe_margin_px": 4,
                "edge_padding_px": 4
            }"#,
        )
        .unwrap();
        let record = SlideRecord {
            image_filename: "a.png".into(),
            title: String::new(),
            bullets: vec![],
            dimensions_text: String::new(),
            capacity_text: String::new(),
        };
        let (w, h) = compose::image_column_size(&cfg);
        let image = PreparedImage {
            width: w,
            height: h,
            rgba8_premul: Arc::new(vec![255u8; w as usize * h as usize * 4]),
        };
        compose::compose_slide(&record, &image, &cfg, &Default::default(), None).unwrap()
    }

    #[test]
    fn entrance_progress_starts_at_zero_and_rests_at_one() {
        let s = frames(5.0, 30, 0.6);
        assert_eq!(s.total_frames(), 150);
        assert_eq!(s.entrance_frames(), 18);
        assert_eq!(s.progress_at(0), 0.0);
        assert!(s.progress_at(9) > 0.0 && s.progress_at(9) < 1.0);
        assert_eq!(s.progress_at(18), 1.0);
        assert_eq!(s.progress_at(149), 1.0);
    }

    #[test]
    fn entrance_window_clamps_to_slide_length() {
        let s = frames(0.1, 30, 5.0);
        assert_eq!(s.total_frames(), 3);
        assert_eq!(s.entrance_frames(), 2);
        assert_eq!(s.progress_at(2), 1.0);
    }

    #[test]
    fn single_frame_slide_is_the_resting_composite() {
        let s = frames(0.0, 30, 0.6);
        assert_eq!(s.total_frames(), 1);
        assert_eq!(s.entrance_frames(), 0);
        assert_eq!(s.progress_at(0), 1.0);
    }

    #[test]
    fn iterator_is_finite_and_restartable() {
        let mut s = frames(0.2, 30, 0.1);
        assert_eq!(s.total_frames(), 6);
        let first: Vec<_> = s.by_ref().collect();
        assert_eq!(first.len(), 6);
        assert!(s.next().is_none());

        s.restart();
        assert_eq!(s.count(), 6);
    }
}
