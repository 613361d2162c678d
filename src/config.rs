use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::error::{ReelError, ReelResult};

/// Process-wide, read-only run configuration.
///
/// Loaded once from a JSON file at startup and passed by reference to every
/// component. Every field has a default so a minimal config (spreadsheet,
/// images dir, output path) is enough for a render.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    // Inputs / outputs.
    pub spreadsheet_path: PathBuf,
    pub images_dir: PathBuf,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    #[serde(default)]
    pub logo_path: Option<PathBuf>,
    #[serde(default)]
    pub music_path: Option<PathBuf>,
    #[serde(default)]
    pub font_title_path: Option<PathBuf>,
    #[serde(default)]
    pub font_body_path: Option<PathBuf>,

    // Frame and timing.
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_slide_duration")]
    pub slide_duration_seconds: f64,
    #[serde(default = "default_entrance_seconds")]
    pub entrance_seconds: f64,
    #[serde(default = "default_max_slides")]
    pub max_slides: usize,

    // Encoding.
    #[serde(default = "default_bitrate")]
    pub target_bitrate: String,
    #[serde(default = "default_true")]
    pub overwrite: bool,
    #[serde(default = "default_music_volume")]
    pub music_volume: f32,

    // Layout.
    #[serde(default = "default_left_panel_ratio")]
    pub left_panel_ratio: f64,
    #[serde(default = "default_edge_padding")]
    pub edge_padding_px: u32,
    #[serde(default = "default_safe_margin")]
    pub safe_margin_px: u32,
    #[serde(default = "default_logo_margin")]
    pub logo_margin_px: u32,
    #[serde(default = "default_logo_max_width_frac")]
    pub logo_max_width_frac: f64,
    #[serde(default = "default_title_font_size")]
    pub title_font_size_px: f32,
    #[serde(default = "default_body_font_size")]
    pub body_font_size_px: f32,
    #[serde(default = "default_line_spacing")]
    pub text_line_spacing_px: u32,
    #[serde(default = "default_max_words_per_bullet")]
    pub max_words_per_bullet: usize,

    // Colors (hex strings, "#RRGGBB").
    #[serde(default = "default_background_color")]
    pub background_color: String,
    #[serde(default = "default_bullet_color")]
    pub bullet_color: String,
    #[serde(default = "default_text_color")]
    pub title_text_color: String,
    #[serde(default = "default_text_color")]
    pub body_text_color: String,
    #[serde(default = "default_ribbon_text_color")]
    pub ribbon_text_color: String,

    // Row filtering.
    #[serde(default = "default_skip_patterns")]
    pub skip_patterns: Vec<String>,

    // Soft capabilities.
    #[serde(default = "default_true")]
    pub remove_bg: bool,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("outputs/final_video.mp4")
}
fn default_frame_width() -> u32 {
    1920
}
fn default_frame_height() -> u32 {
    960
}
fn default_fps() -> u32 {
    30
}
fn default_slide_duration() -> f64 {
    5.0
}
fn default_entrance_seconds() -> f64 {
    0.6
}
fn default_max_slides() -> usize {
    5
}
fn default_bitrate() -> String {
    "4M".to_string()
}
fn default_music_volume() -> f32 {
    0.9
}
fn default_left_panel_ratio() -> f64 {
    0.5
}
fn default_edge_padding() -> u32 {
    48
}
fn default_safe_margin() -> u32 {
    48
}
fn default_logo_margin() -> u32 {
    28
}
fn default_logo_max_width_frac() -> f64 {
    0.18
}
fn default_title_font_size() -> f32 {
    55.0
}
fn default_body_font_size() -> f32 {
    50.0
}
fn default_line_spacing() -> u32 {
    10
}
fn default_max_words_per_bullet() -> usize {
    4
}
fn default_background_color() -> String {
    "#FFFFFF".to_string()
}
fn default_bullet_color() -> String {
    "#78185A".to_string()
}
fn default_text_color() -> String {
    "#000000".to_string()
}
fn default_ribbon_text_color() -> String {
    "#FFFFFF".to_string()
}
fn default_skip_patterns() -> Vec<String> {
    vec![
        "barcode".to_string(),
        "qr".to_string(),
        "code128".to_string(),
    ]
}
fn default_true() -> bool {
    true
}

impl Config {
    pub fn load(path: &Path) -> ReelResult<Self> {
        let f = std::fs::File::open(path)
            .with_context(|| format!("open config '{}'", path.display()))?;
        let cfg: Config = serde_json::from_reader(std::io::BufReader::new(f))
            .map_err(|e| ReelError::config(format!("parse config '{}': {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> ReelResult<()> {
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(ReelError::config("frame width/height must be non-zero"));
        }
        if !self.frame_width.is_multiple_of(2) || !self.frame_height.is_multiple_of(2) {
            return Err(ReelError::config(
                "frame width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if self.fps == 0 {
            return Err(ReelError::config("fps must be non-zero"));
        }
        if !self.slide_duration_seconds.is_finite() || self.slide_duration_seconds < 0.0 {
            return Err(ReelError::config(
                "slide_duration_seconds must be finite and >= 0",
            ));
        }
        if !self.entrance_seconds.is_finite() || self.entrance_seconds < 0.0 {
            return Err(ReelError::config("entrance_seconds must be finite and >= 0"));
        }
        if self.max_slides == 0 {
            return Err(ReelError::config("max_slides must be at least 1"));
        }
        if !(self.left_panel_ratio > 0.0 && self.left_panel_ratio < 1.0) {
            return Err(ReelError::config(
                "left_panel_ratio must be strictly between 0 and 1",
            ));
        }
        if !(self.logo_max_width_frac > 0.0 && self.logo_max_width_frac <= 1.0) {
            return Err(ReelError::config(
                "logo_max_width_frac must be in (0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.music_volume) {
            return Err(ReelError::config("music_volume must be within 0..=1"));
        }
        parse_bitrate(&self.target_bitrate)?;
        parse_hex_rgb(&self.background_color)?;
        parse_hex_rgb(&self.bullet_color)?;
        parse_hex_rgb(&self.title_text_color)?;
        parse_hex_rgb(&self.body_text_color)?;
        parse_hex_rgb(&self.ribbon_text_color)?;
        Ok(())
    }

    pub fn panel_width(&self) -> u32 {
        (f64::from(self.frame_width) * self.left_panel_ratio).round() as u32
    }

    pub fn background_rgb(&self) -> [u8; 3] {
        // Validated at load time.
        parse_hex_rgb(&self.background_color).unwrap_or([255, 255, 255])
    }
}

/// Parse a "#RRGGBB" (or "RRGGBB") hex color.
pub fn parse_hex_rgb(s: &str) -> ReelResult<[u8; 3]> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ReelError::config(format!(
            "invalid hex color '{s}' (expected #RRGGBB)"
        )));
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
    Ok([
        byte(0).map_err(|e| ReelError::config(format!("invalid hex color '{s}': {e}")))?,
        byte(2).map_err(|e| ReelError::config(format!("invalid hex color '{s}': {e}")))?,
        byte(4).map_err(|e| ReelError::config(format!("invalid hex color '{s}': {e}")))?,
    ])
}

/// Validate an ffmpeg bitrate string: digits with an optional k/K/m/M suffix.
///
/// Returns the rate in bits per second. The value is only passed through to
/// ffmpeg as `-b:v`; reelkit never does its own rate control.
pub fn parse_bitrate(s: &str) -> ReelResult<u64> {
    let s = s.trim();
    let (digits, mult) = match s.char_indices().last() {
        Some((i, 'k')) | Some((i, 'K')) => (&s[..i], 1_000u64),
        Some((i, 'm')) | Some((i, 'M')) => (&s[..i], 1_000_000u64),
        Some(_) => (s, 1u64),
        None => {
            return Err(ReelError::config("target_bitrate must be non-empty"));
        }
    };
    let n: u64 = digits
        .parse()
        .map_err(|_| ReelError::config(format!("invalid target_bitrate '{s}' (expected e.g. \"4M\", \"2500k\")")))?;
    if n == 0 {
        return Err(ReelError::config("target_bitrate must be non-zero"));
    }
    Ok(n * mult)
}
