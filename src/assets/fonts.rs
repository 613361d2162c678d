use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

/// A font resolved to raw bytes, ready for both parley shaping and vello_cpu
/// glyph rasterization.
#[derive(Clone)]
pub struct LoadedFont {
    pub bytes: Arc<Vec<u8>>,
    pub font: vello_cpu::peniko::FontData,
}

impl LoadedFont {
    fn from_bytes(bytes: Vec<u8>) -> Self {
        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(bytes.clone()),
            0,
        );
        Self {
            bytes: Arc::new(bytes),
            font,
        }
    }
}

/// The two font roles of the slide layout. Either may be absent: text for a
/// missing role is skipped with a warning, never a fatal error.
#[derive(Clone, Default)]
pub struct Fonts {
    pub title: Option<LoadedFont>,
    pub body: Option<LoadedFont>,
}

impl Fonts {
    pub fn load(title_path: Option<&Path>, body_path: Option<&Path>) -> Self {
        Self {
            title: load_font(title_path, true),
            body: load_font(body_path, false),
        }
    }
}

/// Load the configured font file, falling back to a well-known system font at
/// the same point size when the path is missing or unreadable.
pub fn load_font(configured: Option<&Path>, prefer_bold: bool) -> Option<LoadedFont> {
    if let Some(path) = configured {
        match std::fs::read(path) {
            Ok(bytes) if !bytes.is_empty() => {
                debug!(path = %path.display(), "loaded configured font");
                return Some(LoadedFont::from_bytes(bytes));
            }
            Ok(_) => warn!(path = %path.display(), "configured font file is empty, falling back"),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "configured font unreadable, falling back")
            }
        }
    }

    for candidate in fallback_candidates(prefer_bold) {
        if let Ok(bytes) = std::fs::read(&candidate)
            && !bytes.is_empty()
        {
            debug!(path = %candidate.display(), "using fallback font");
            return Some(LoadedFont::from_bytes(bytes));
        }
    }

    warn!("no usable font found (configured or fallback); text will be omitted");
    None
}

fn fallback_candidates(prefer_bold: bool) -> Vec<PathBuf> {
    let regular = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
        "/System/Library/Fonts/Helvetica.ttc",
        "C:\\Windows\\Fonts\\arial.ttf",
    ];
    let bold = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
        "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
        "/usr/share/fonts/liberation/LiberationSans-Bold.ttf",
    ];

    let mut out = Vec::new();
    if prefer_bold {
        out.extend(bold.iter().map(PathBuf::from));
    }
    out.extend(regular.iter().map(PathBuf::from));
    if !prefer_bold {
        out.extend(bold.iter().map(PathBuf::from));
    }
    out
}
