use std::path::PathBuf;
use std::sync::Arc;

use reelkit::{
    Config, Ease, SlideFrames, SlideRecord,
    compose::{self, FrameRgba},
    prepare::{BackgroundRemoval, prepare_image},
};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("slide_render").join(name);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn small_config() -> Config {
    serde_json::from_str(
        r#"{
            "spreadsheet_path": "unused.xlsx",
            "images_dir": "unused",
            "frame_width": 320,
            "frame_height": 160,
            "fps": 10,
            "slide_duration_seconds": 1.0,
            "entrance_seconds": 0.5,
            "safe_margin_px": 10,
            "edge_padding_px": 8,
            "logo_margin_px": 6
        }"#,
    )
    .unwrap()
}

fn record() -> SlideRecord {
    SlideRecord {
        image_filename: "product.png".into(),
        title: "Storage Box".into(),
        bullets: vec!["stackable and sturdy design".into()],
        dimensions_text: "40x30x25 cm".into(),
        capacity_text: "25L".into(),
    }
}

fn write_png(dir: &PathBuf, name: &str, w: u32, h: u32, rgba: [u8; 4]) -> PathBuf {
    let path = dir.join(name);
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(rgba));
    img.save(&path).unwrap();
    path
}

fn pixel(frame: &FrameRgba, x: u32, y: u32) -> [u8; 4] {
    let i = (y * frame.width + x) as usize * 4;
    [
        frame.data[i],
        frame.data[i + 1],
        frame.data[i + 2],
        frame.data[i + 3],
    ]
}

#[test]
fn slide_animates_from_off_canvas_to_rest() {
    let dir = scratch_dir("animates");
    let cfg = small_config();
    let (col_w, col_h) = compose::image_column_size(&cfg);

    let img_path = write_png(&dir, "product.png", 40, 40, [0, 200, 0, 255]);
    let prepared = prepare_image(&img_path, col_w, col_h, &BackgroundRemoval::detect(false)).unwrap();

    let layers = compose::compose_slide(
        &record(),
        &prepared,
        &cfg,
        &Default::default(),
        None,
    )
    .unwrap();
    let mut frames = SlideFrames::new(Arc::new(layers), 1.0, 10, 0.5, Ease::OutCubic);

    assert_eq!(frames.total_frames(), 10);
    assert_eq!(frames.entrance_frames(), 5);

    let all: Vec<FrameRgba> = frames.by_ref().map(|f| f.unwrap()).collect();
    assert_eq!(all.len(), 10);

    // Image column center: 160 (panel) + 10 (margin) + 70.
    let cx = 160 + 10 + 70;
    let cy = 80;

    // First frame: the product image has not entered yet, background shows.
    assert_eq!(pixel(&all[0], cx, cy), [255, 255, 255, 255]);

    // Resting frames: product green at the column center.
    assert_eq!(pixel(&all[5], cx, cy), [0, 200, 0, 255]);
    assert_eq!(pixel(&all[9], cx, cy), [0, 200, 0, 255]);
    // Post-entrance frames are identical.
    assert_eq!(all[5].data, all[9].data);

    // Restart replays the same sequence.
    frames.restart();
    let replay: Vec<FrameRgba> = frames.map(|f| f.unwrap()).collect();
    assert_eq!(replay.len(), 10);
    assert_eq!(replay[0].data, all[0].data);
}

#[test]
fn ribbon_darkens_bottom_left_only_when_text_exists() {
    let dir = scratch_dir("ribbon");
    let cfg = small_config();
    let (col_w, col_h) = compose::image_column_size(&cfg);

    let img_path = write_png(&dir, "product.png", 40, 40, [0, 0, 255, 255]);
    let prepared = prepare_image(&img_path, col_w, col_h, &BackgroundRemoval::detect(false)).unwrap();

    let with_ribbon = compose::compose_slide(&record(), &prepared, &cfg, &Default::default(), None)
        .unwrap();
    assert!(with_ribbon.has_ribbon());

    let mut bare = record();
    bare.capacity_text = String::new();
    bare.dimensions_text = String::new();
    let without = compose::compose_slide(&bare, &prepared, &cfg, &Default::default(), None).unwrap();
    assert!(!without.has_ribbon());

    // Ribbon box starts at (safe_margin, H - 64 - safe_margin) = (10, 86).
    let frame = with_ribbon.render_at(1.0).unwrap();
    let px = pixel(&frame, 12, 96);
    assert!(px[0] < 255, "ribbon should darken the background");

    let frame = without.render_at(1.0).unwrap();
    assert_eq!(pixel(&frame, 12, 96), [255, 255, 255, 255]);
}

#[test]
fn logo_is_scaled_down_to_width_cap() {
    let dir = scratch_dir("logo");
    let cfg = small_config();
    let (col_w, col_h) = compose::image_column_size(&cfg);

    let img_path = write_png(&dir, "product.png", 40, 40, [255, 0, 0, 255]);
    let prepared = prepare_image(&img_path, col_w, col_h, &BackgroundRemoval::detect(false)).unwrap();

    // 300px logo against a 320px frame; the cap is 0.18 * 320 = 57px.
    let logo_path = write_png(&dir, "logo.png", 300, 100, [10, 10, 10, 255]);
    let logo = reelkit::assets::load_image_file(&logo_path).unwrap();

    let layers =
        compose::compose_slide(&record(), &prepared, &cfg, &Default::default(), Some(&logo))
            .unwrap();
    let frame = layers.render_at(1.0).unwrap();

    // Inside the capped logo box (top-right, 6px margin, <=57px wide).
    let inside = pixel(&frame, 320 - 6 - 20, 6 + 5);
    assert_eq!(inside, [10, 10, 10, 255]);

    // Left of where an uncapped 300px logo would have reached.
    let outside = pixel(&frame, 320 - 6 - 100, 6 + 5);
    assert_eq!(outside, [255, 255, 255, 255]);
}

#[test]
fn degraded_run_without_fonts_logo_or_rembg_still_renders() {
    let dir = scratch_dir("degraded");
    let cfg = small_config();
    let (col_w, col_h) = compose::image_column_size(&cfg);

    let img_path = write_png(&dir, "product.png", 500, 500, [0, 128, 255, 255]);
    let prepared = prepare_image(&img_path, col_w, col_h, &BackgroundRemoval::detect(false)).unwrap();

    // No fonts, no logo: composition must still succeed.
    let layers = compose::compose_slide(
        &record(),
        &prepared,
        &cfg,
        &reelkit::assets::fonts::Fonts::default(),
        None,
    )
    .unwrap();

    let frame = layers.render_at(1.0).unwrap();
    assert_eq!(frame.width, 320);
    assert_eq!(frame.height, 160);
    assert_eq!(pixel(&frame, 160 + 10 + 70, 80), [0, 128, 255, 255]);
}
