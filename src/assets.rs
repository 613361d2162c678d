pub mod decode;
pub mod fonts;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;

use crate::error::ReelResult;

/// Prepared raster image in premultiplied RGBA8 form.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Arc<Vec<u8>>,
}

/// Decode an image file into premultiplied RGBA8.
pub fn load_image_file(path: &Path) -> ReelResult<PreparedImage> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
    decode::decode_image(&bytes)
}
