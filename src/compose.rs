//! Slide composition: one `SlideRecord` plus its prepared product image
//! becomes a set of layers ready for entrance animation.
//!
//! Layers are kept separate rather than flattened so the animator can place
//! the text panel and product image at per-frame offsets without re-running
//! text layout or rasterization.

use tracing::warn;

use crate::{
    assets::{PreparedImage, decode, fonts::Fonts},
    composite,
    config::{Config, parse_hex_rgb},
    error::{ReelError, ReelResult},
    rows::SlideRecord,
};

/// One fully assembled raster frame.
#[derive(Clone, Debug)]
pub struct FrameRgba {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8.
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

/// A premultiplied RGBA8 layer with its own dimensions.
#[derive(Clone, Debug)]
struct Layer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// The composed base state of one slide.
///
/// `render_at(1.0)` is the resting composite; the animator calls `render_at`
/// with eased progress values during the entrance window. Backdrop
/// (background + logo) and the ribbon overlay never move.
pub struct SlideLayers {
    width: u32,
    height: u32,
    backdrop: Layer,
    panel: Option<Layer>,
    image: Layer,
    image_rest_x: i64,
    image_rest_y: i64,
    overlay: Option<(Layer, i64, i64)>,
}

impl SlideLayers {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn has_ribbon(&self) -> bool {
        self.overlay.is_some()
    }

    /// Assemble a frame for entrance progress `k` in `0.0..=1.0` (1.0 = at
    /// rest). The text panel travels in from off-canvas left, the product
    /// image from off-canvas right.
    pub fn render_at(&self, k: f64) -> ReelResult<FrameRgba> {
        let k = k.clamp(0.0, 1.0);
        let mut data = self.backdrop.data.clone();

        if let Some(panel) = &self.panel {
            let x = ((k - 1.0) * f64::from(panel.width)).round() as i64;
            composite::blit_over(
                &mut data,
                self.width,
                self.height,
                &panel.data,
                panel.width,
                panel.height,
                x,
                0,
            )?;
        }

        let start_x = f64::from(self.width);
        let rest_x = self.image_rest_x as f64;
        let x = (start_x + k * (rest_x - start_x)).round() as i64;
        composite::blit_over(
            &mut data,
            self.width,
            self.height,
            &self.image.data,
            self.image.width,
            self.image.height,
            x,
            self.image_rest_y,
        )?;

        if let Some((overlay, ox, oy)) = &self.overlay {
            composite::blit_over(
                &mut data,
                self.width,
                self.height,
                &overlay.data,
                overlay.width,
                overlay.height,
                *ox,
                *oy,
            )?;
        }

        Ok(FrameRgba {
            width: self.width,
            height: self.height,
            data,
            premultiplied: true,
        })
    }
}

/// Target size of the right image column for the configured frame.
pub fn image_column_size(cfg: &Config) -> (u32, u32) {
    let panel_w = cfg.panel_width();
    let margin = cfg.safe_margin_px;
    let w = cfg.frame_width.saturating_sub(panel_w + 2 * margin).max(1);
    let h = cfg.frame_height.saturating_sub(2 * margin).max(1);
    (w, h)
}

/// Lay out one slide: background, left text column, right product image,
/// top-right logo, optional bottom-left ribbon.
pub fn compose_slide(
    record: &SlideRecord,
    image: &PreparedImage,
    cfg: &Config,
    fonts: &Fonts,
    logo: Option<&PreparedImage>,
) -> ReelResult<SlideLayers> {
    let (col_w, col_h) = image_column_size(cfg);
    if image.width != col_w || image.height != col_h {
        return Err(ReelError::render(format!(
            "prepared image is {}x{}, expected column size {col_w}x{col_h}",
            image.width, image.height
        )));
    }

    let width = cfg.frame_width;
    let height = cfg.frame_height;

    let mut backdrop = Layer {
        width,
        height,
        data: vec![0u8; width as usize * height as usize * 4],
    };
    let [bg_r, bg_g, bg_b] = cfg.background_rgb();
    composite::fill(
        &mut backdrop.data,
        composite::premul_rgba8(bg_r, bg_g, bg_b, 255),
    );

    if let Some(logo) = logo {
        paste_logo(&mut backdrop, logo, cfg)?;
    }

    let panel = render_text_panel(record, cfg, fonts)?;

    let image_layer = Layer {
        width: image.width,
        height: image.height,
        data: image.rgba8_premul.as_ref().clone(),
    };
    let image_rest_x = i64::from(cfg.panel_width() + cfg.safe_margin_px);
    let image_rest_y = i64::from(cfg.safe_margin_px);

    let overlay = match record.ribbon_text() {
        Some(text) => Some(render_ribbon(&text, cfg, fonts)?),
        None => None,
    };

    Ok(SlideLayers {
        width,
        height,
        backdrop,
        panel,
        image: image_layer,
        image_rest_x,
        image_rest_y,
        overlay,
    })
}

/// Scale the logo to at most `logo_max_width_frac` of the frame width and
/// paste it top-right, inset by the logo margin.
fn paste_logo(backdrop: &mut Layer, logo: &PreparedImage, cfg: &Config) -> ReelResult<()> {
    let cap = (f64::from(cfg.frame_width) * cfg.logo_max_width_frac).floor() as u32;
    let cap = cap.max(1);

    let scaled;
    let (lw, lh, bytes) = if logo.width > cap {
        let scale = f64::from(cap) / f64::from(logo.width);
        let new_h = ((f64::from(logo.height) * scale).round() as u32).max(1);
        let straight = decode::to_rgba_image(logo)?;
        let resized = image::imageops::resize(
            &straight,
            cap,
            new_h,
            image::imageops::FilterType::Lanczos3,
        );
        scaled = decode::from_rgba_image(resized);
        (scaled.width, scaled.height, scaled.rgba8_premul.as_slice())
    } else {
        (logo.width, logo.height, logo.rgba8_premul.as_slice())
    };

    let margin = i64::from(cfg.logo_margin_px);
    let x = i64::from(backdrop.width) - i64::from(lw) - margin;
    composite::blit_over(
        &mut backdrop.data,
        backdrop.width,
        backdrop.height,
        bytes,
        lw,
        lh,
        x.max(0),
        margin,
    )
}

/// Render the left column (title + arrow bullets) into a transparent
/// panel-sized layer. Returns `None` when there is nothing to draw (no text,
/// or no usable fonts).
fn render_text_panel(
    record: &SlideRecord,
    cfg: &Config,
    fonts: &Fonts,
) -> ReelResult<Option<Layer>> {
    let panel_w = cfg.panel_width();
    let panel_h = cfg.frame_height;
    let pad = f64::from(cfg.edge_padding_px);
    let line_gap = f64::from(cfg.text_line_spacing_px);
    let max_text_w = (f64::from(panel_w) - 2.0 * pad).max(1.0) as f32;

    let title = record.title.trim();
    let has_text = !title.is_empty() || !record.bullets.is_empty();
    if !has_text {
        return Ok(None);
    }
    if fonts.title.is_none() && fonts.body.is_none() {
        warn!("no fonts available; slide text omitted");
        return Ok(None);
    }

    let mut engine = TextLayoutEngine::new();
    let mut ctx = vello_cpu::RenderContext::new(dim_u16(panel_w)?, dim_u16(panel_h)?);
    let mut y = pad;

    if !title.is_empty() {
        if let Some(font) = fonts.title.as_ref().or(fonts.body.as_ref()) {
            let brush = brush_from_hex(&cfg.title_text_color)?;
            match engine.layout_plain(
                title,
                &font.bytes,
                cfg.title_font_size_px,
                brush,
                Some(max_text_w),
            ) {
                Ok(layout) => {
                    draw_layout(&mut ctx, &layout, &font.font, pad, y);
                    y += f64::from(layout.height()) + line_gap;
                }
                Err(e) => warn!(error = %e, "title layout failed, omitting title"),
            }
        }
        y += line_gap;
    }

    let bullet_rgb = parse_hex_rgb(&cfg.bullet_color)?;
    let arrow = arrow_extent(cfg.body_font_size_px);
    for bullet in record.bullets.iter().take(3) {
        let text = clamp_words(bullet, cfg.max_words_per_bullet);
        if text.is_empty() {
            continue;
        }
        let Some(font) = fonts.body.as_ref().or(fonts.title.as_ref()) else {
            break;
        };

        let text_x = pad + arrow.0 + ARROW_TEXT_GAP;
        let bullet_max_w = (f64::from(panel_w) - text_x - pad).max(1.0) as f32;
        let brush = brush_from_hex(&cfg.body_text_color)?;
        let layout = match engine.layout_plain(
            &text,
            &font.bytes,
            cfg.body_font_size_px,
            brush,
            Some(bullet_max_w),
        ) {
            Ok(layout) => layout,
            Err(e) => {
                warn!(error = %e, bullet = %text, "bullet layout failed, omitting");
                continue;
            }
        };

        // Arrow glyph: a filled arrow-head path in the bullet color, centered
        // against the first text line.
        let first_line_h = f64::from(layout.height()).min(f64::from(cfg.body_font_size_px) * 1.3);
        draw_arrow(&mut ctx, pad, y + (first_line_h - arrow.1) / 2.0, arrow, bullet_rgb);
        draw_layout(&mut ctx, &layout, &font.font, text_x, y);

        y += f64::from(layout.height()).max(arrow.1) + line_gap;
        if y >= f64::from(panel_h) {
            break;
        }
    }

    Ok(Some(layer_from_context(&mut ctx, panel_w, panel_h)))
}

/// Semi-transparent bottom-left ribbon with the capacity/dimensions text.
fn render_ribbon(text: &str, cfg: &Config, fonts: &Fonts) -> ReelResult<(Layer, i64, i64)> {
    let box_w = ((f64::from(cfg.frame_width) * RIBBON_WIDTH_FRAC).round() as u32).max(1);
    let box_h = RIBBON_HEIGHT_PX;

    let mut ctx = vello_cpu::RenderContext::new(dim_u16(box_w)?, dim_u16(box_h)?);
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(0, 0, 0, RIBBON_ALPHA));
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
        0.0,
        0.0,
        f64::from(box_w),
        f64::from(box_h),
    ));

    if let Some(font) = fonts.body.as_ref().or(fonts.title.as_ref()) {
        let mut engine = TextLayoutEngine::new();
        let brush = brush_from_hex(&cfg.ribbon_text_color)?;
        match engine.layout_plain(
            text,
            &font.bytes,
            RIBBON_FONT_SIZE_PX,
            brush,
            Some((f64::from(box_w) - 2.0 * RIBBON_PAD) as f32),
        ) {
            Ok(layout) => draw_layout(&mut ctx, &layout, &font.font, RIBBON_PAD, RIBBON_PAD),
            Err(e) => warn!(error = %e, "ribbon text layout failed, drawing box only"),
        }
    } else {
        warn!("no fonts available; ribbon rendered without text");
    }

    let layer = layer_from_context(&mut ctx, box_w, box_h);
    let x = i64::from(cfg.safe_margin_px);
    let y = i64::from(cfg.frame_height) - i64::from(box_h) - i64::from(cfg.safe_margin_px);
    Ok((layer, x, y.max(0)))
}

const RIBBON_WIDTH_FRAC: f64 = 0.28;
const RIBBON_HEIGHT_PX: u32 = 64;
const RIBBON_ALPHA: u8 = 122;
const RIBBON_FONT_SIZE_PX: f32 = 36.0;
const RIBBON_PAD: f64 = 12.0;
const ARROW_TEXT_GAP: f64 = 18.0;

fn arrow_extent(body_font_size: f32) -> (f64, f64) {
    let s = f64::from(body_font_size) * 0.55;
    (s, s)
}

fn draw_arrow(
    ctx: &mut vello_cpu::RenderContext,
    x: f64,
    y: f64,
    (w, h): (f64, f64),
    rgb: [u8; 3],
) {
    use vello_cpu::kurbo::{Affine, BezPath, Point};

    let mut path = BezPath::new();
    path.move_to(Point::new(0.0, 0.0));
    path.line_to(Point::new(w, h / 2.0));
    path.line_to(Point::new(0.0, h));
    path.close_path();

    ctx.set_transform(Affine::translate((x, y)));
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
        rgb[0], rgb[1], rgb[2], 255,
    ));
    ctx.fill_path(&path);
}

fn draw_layout(
    ctx: &mut vello_cpu::RenderContext,
    layout: &parley::Layout<TextBrushRgba8>,
    font: &vello_cpu::peniko::FontData,
    x: f64,
    y: f64,
) {
    ctx.set_transform(vello_cpu::kurbo::Affine::translate((x, y)));
    for line in layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };

            let brush = run.style().brush;
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                brush.r, brush.g, brush.b, brush.a,
            ));

            let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            ctx.glyph_run(font)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
}

fn layer_from_context(ctx: &mut vello_cpu::RenderContext, width: u32, height: u32) -> Layer {
    let mut pixmap = vello_cpu::Pixmap::new(width as u16, height as u16);
    ctx.flush();
    ctx.render_to_pixmap(&mut pixmap);
    Layer {
        width,
        height,
        data: pixmap.data_as_u8_slice().to_vec(),
    }
}

fn dim_u16(v: u32) -> ReelResult<u16> {
    v.try_into()
        .map_err(|_| ReelError::render("layer dimension exceeds u16"))
}

fn brush_from_hex(hex: &str) -> ReelResult<TextBrushRgba8> {
    let [r, g, b] = parse_hex_rgb(hex)?;
    Ok(TextBrushRgba8 { r, g, b, a: 255 })
}

/// Keep at most `max_words` whitespace-separated words.
pub fn clamp_words(s: &str, max_words: usize) -> String {
    s.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// RGBA8 brush color carried through parley text layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Stateful helper for building parley text layouts from raw font bytes.
struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
}

impl TextLayoutEngine {
    fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    /// Shape and lay out plain text using provided font bytes and styling.
    fn layout_plain(
        &mut self,
        text: &str,
        font_bytes: &[u8],
        size_px: f32,
        brush: TextBrushRgba8,
        max_width_px: Option<f32>,
    ) -> ReelResult<parley::Layout<TextBrushRgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(ReelError::render("text size_px must be finite and > 0"));
        }

        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.to_vec()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            ReelError::render("no font families registered from font bytes")
        })?;

        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| ReelError::render("registered font family has no name"))?
            .to_string();

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        if let Some(w) = max_width_px {
            layout.break_all_lines(Some(w));
            layout.align(
                Some(w),
                parley::Alignment::Start,
                parley::AlignmentOptions::default(),
            );
        } else {
            layout.break_all_lines(None);
        }

        Ok(layout)
    }
}
