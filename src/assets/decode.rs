use std::sync::Arc;

use anyhow::Context as _;

use crate::{assets::PreparedImage, error::ReelResult};

pub fn decode_image(bytes: &[u8]) -> ReelResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

/// Convert a straight-alpha `image` buffer into a premultiplied [`PreparedImage`].
pub fn from_rgba_image(img: image::RgbaImage) -> PreparedImage {
    let (width, height) = img.dimensions();
    let mut rgba8_premul = img.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);
    PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    }
}

/// Back to a straight-alpha `image` buffer (for resizing with the image crate).
pub fn to_rgba_image(prepared: &PreparedImage) -> ReelResult<image::RgbaImage> {
    let mut data = prepared.rgba8_premul.as_ref().clone();
    unpremultiply_rgba8_in_place(&mut data);
    image::RgbaImage::from_raw(prepared.width, prepared.height, data)
        .ok_or_else(|| crate::error::ReelError::render("prepared image byte length mismatch"))
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 || a == 255 {
            continue;
        }
        px[0] = ((px[0] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[1] = ((px[1] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[2] = ((px[2] as u16 * 255 + a / 2) / a).min(255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn decode_image_png_dimensions_and_premul() {
        let src_rgba = vec![100u8, 50u8, 200u8, 128u8];
        let img = image::RgbaImage::from_raw(1, 1, src_rgba).unwrap();

        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();

        let prepared = decode_image(&buf).unwrap();
        assert_eq!(prepared.width, 1);
        assert_eq!(prepared.height, 1);
        assert_eq!(
            prepared.rgba8_premul.as_slice(),
            &[
                ((100u16 * 128 + 127) / 255) as u8,
                ((50u16 * 128 + 127) / 255) as u8,
                ((200u16 * 128 + 127) / 255) as u8,
                128u8
            ]
        );
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_image(b"not an image").is_err());
    }

    #[test]
    fn premul_unpremul_roundtrip_is_close() {
        let img = image::RgbaImage::from_raw(1, 1, vec![200, 100, 40, 128]).unwrap();
        let prepared = from_rgba_image(img);
        let back = to_rgba_image(&prepared).unwrap();
        let px = back.get_pixel(0, 0).0;
        assert!(px[0].abs_diff(200) <= 1);
        assert!(px[1].abs_diff(100) <= 1);
        assert!(px[2].abs_diff(40) <= 1);
        assert_eq!(px[3], 128);
    }
}
