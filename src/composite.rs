//! Premultiplied-alpha pixel helpers used when assembling animated frames.

use crate::error::{ReelError, ReelResult};

pub type PremulRgba8 = [u8; 4];

/// Source-over for premultiplied RGBA8 pixels.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    let sa = src[3];
    if sa == 0 {
        return dst;
    }
    if sa == 255 {
        return src;
    }

    let inv = 255u16 - u16::from(sa);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = src[i].saturating_add(mul_div255(u16::from(dst[i]), inv));
    }
    out
}

/// Fill an entire premultiplied RGBA8 buffer with one pixel value.
pub fn fill(dst: &mut [u8], px: PremulRgba8) {
    for d in dst.chunks_exact_mut(4) {
        d.copy_from_slice(&px);
    }
}

/// Composite `src` over `dst` at an offset, clipping to the destination bounds.
///
/// Offsets may be negative or beyond the destination (entrance animation moves
/// layers through off-canvas positions); out-of-bounds rows and columns are
/// simply skipped.
pub fn blit_over(
    dst: &mut [u8],
    dst_w: u32,
    dst_h: u32,
    src: &[u8],
    src_w: u32,
    src_h: u32,
    x: i64,
    y: i64,
) -> ReelResult<()> {
    if dst.len() != dst_w as usize * dst_h as usize * 4 {
        return Err(ReelError::render("blit_over: dst length mismatch"));
    }
    if src.len() != src_w as usize * src_h as usize * 4 {
        return Err(ReelError::render("blit_over: src length mismatch"));
    }

    for sy in 0..i64::from(src_h) {
        let dy = y + sy;
        if dy < 0 || dy >= i64::from(dst_h) {
            continue;
        }
        let sx0 = (-x).clamp(0, i64::from(src_w));
        let sx1 = (i64::from(dst_w) - x).clamp(0, i64::from(src_w));
        if sx0 >= sx1 {
            continue;
        }

        let src_row = (sy * i64::from(src_w)) as usize * 4;
        let dst_row = (dy * i64::from(dst_w)) as usize * 4;
        for sx in sx0..sx1 {
            let si = src_row + sx as usize * 4;
            let di = dst_row + (x + sx) as usize * 4;
            let s = [src[si], src[si + 1], src[si + 2], src[si + 3]];
            if s[3] == 0 {
                continue;
            }
            let d = [dst[di], dst[di + 1], dst[di + 2], dst[di + 3]];
            dst[di..di + 4].copy_from_slice(&over(d, s));
        }
    }
    Ok(())
}

pub fn premul_rgba8(r: u8, g: u8, b: u8, a: u8) -> PremulRgba8 {
    [
        mul_div255(u16::from(r), u16::from(a)),
        mul_div255(u16::from(g), u16::from(a)),
        mul_div255(u16::from(b), u16::from(a)),
        a,
    ]
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}
