//! Film-camera style date stamp built from seven-segment glyphs.

use chrono::{DateTime, Local};
use kurbo::{Affine, BezPath, Rect, RoundedRect, Shape, Vec2};
use tiny_skia::{BlendMode, Pixmap, PixmapPaint, Transform};

use crate::error::Result;
use crate::model::Rgba;
use crate::render::raster;

const GOLD: Rgba = Rgba::rgb(255, 186, 40);
const RED: Rgba = Rgba::rgb(255, 60, 20);
const ROTATION_DEGREES: f64 = -2.0;

pub fn stamp_text(now: DateTime<Local>) -> String {
    now.format("'%y %m %d").to_string()
}

/// Segments `a..g` lit for a character; `None` for characters without a glyph.
fn segments(c: char) -> Option<[bool; 7]> {
    let bits: u8 = match c {
        '0' => 0b0111111,
        '1' => 0b0000110,
        '2' => 0b1011011,
        '3' => 0b1001111,
        '4' => 0b1100110,
        '5' => 0b1101101,
        '6' => 0b1111101,
        '7' => 0b0000111,
        '8' => 0b1111111,
        '9' => 0b1101111,
        '-' => 0b1000000,
        ' ' | '\'' => 0,
        _ => return None,
    };
    Some(std::array::from_fn(|i| bits & (1 << i) != 0))
}

/// Outline of one glyph cell of `height`, origin at its top-left.
fn glyph_path(c: char, height: f64) -> BezPath {
    let mut path = BezPath::new();
    let w = height * 0.55;
    let t = height * 0.12;
    let half = height / 2.0;
    if c == '\'' {
        let tick = RoundedRect::from_rect(Rect::new(w * 0.4, 0.0, w * 0.4 + t, height * 0.3), t / 2.0);
        path.extend(tick.path_elements(0.1));
        return path;
    }
    let Some(lit) = segments(c) else {
        return path;
    };
    let horizontal = |y: f64| Rect::new(t, y - t / 2.0, w - t, y + t / 2.0);
    let vertical = |x: f64, y0: f64, y1: f64| Rect::new(x - t / 2.0, y0 + t / 2.0, x + t / 2.0, y1 - t / 2.0);
    let bars = [
        horizontal(t / 2.0),
        vertical(w - t / 2.0, 0.0, half),
        vertical(w - t / 2.0, half, height),
        horizontal(height - t / 2.0),
        vertical(t / 2.0, half, height),
        vertical(t / 2.0, 0.0, half),
        horizontal(half),
    ];
    for (bar, on) in bars.iter().zip(lit) {
        if on {
            path.extend(RoundedRect::from_rect(*bar, t / 2.0).path_elements(0.1));
        }
    }
    path
}

pub fn text_path(text: &str, height: f64) -> (BezPath, f64) {
    let advance = height * 0.75;
    let mut path = BezPath::new();
    let mut x = 0.0;
    for c in text.chars() {
        let glyph = Affine::translate(Vec2::new(x, 0.0)) * glyph_path(c, height);
        path.extend(glyph.elements().iter().copied());
        x += if c == '\'' { advance * 0.6 } else { advance };
    }
    (path, x)
}

/// Renders the two blurred layers composited with HardLight.
pub fn render_stamp(text: &str, height: f64) -> Result<Pixmap> {
    let margin = height * 0.6;
    let (path, width) = text_path(text, height);
    let w = (width + 2.0 * margin).ceil() as u32;
    let h = (height + 2.0 * margin).ceil() as u32;
    let place = Affine::translate((margin, margin));

    let mut base = raster::new_pixmap(w, h)?;
    raster::fill_path(&mut base, &path, GOLD, place, true);
    let base = raster::image_to_pixmap(&raster::gaussian_blur(&raster::pixmap_to_image(&base), height * 0.12))?;

    let mut top = raster::new_pixmap(w, h)?;
    raster::fill_path(&mut top, &path, RED, place, true);
    let top = raster::image_to_pixmap(&raster::gaussian_blur(&raster::pixmap_to_image(&top), height * 0.03))?;

    let mut out = raster::new_pixmap(w, h)?;
    out.draw_pixmap(0, 0, base.as_ref(), &PixmapPaint::default(), Transform::identity(), None);
    let hard_light = PixmapPaint {
        blend_mode: BlendMode::HardLight,
        ..PixmapPaint::default()
    };
    out.draw_pixmap(0, 0, top.as_ref(), &hard_light, Transform::identity(), None);
    Ok(out)
}

/// Places a stamp of `size` near the bottom-right corner of `capture`, slightly rotated.
pub fn placement(capture: Rect, size: (f64, f64)) -> Affine {
    let (w, h) = size;
    let inset = capture.height().min(capture.width()) * 0.04;
    Affine::translate((capture.x1 - inset, capture.y1 - inset))
        * Affine::rotate(ROTATION_DEGREES.to_radians())
        * Affine::translate((-w, -h))
}

pub fn stamp_height(capture: Rect) -> f64 {
    (capture.height().min(capture.width()) * 0.05).clamp(12.0, 80.0)
}
