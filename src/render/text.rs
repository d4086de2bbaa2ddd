//! Text element rasterisation onto the monospace grid.

use std::sync::OnceLock;

use ab_glyph::FontArc;
use image::{Rgba as Pixel, RgbaImage};
use imageproc::drawing::draw_text_mut;
use tiny_skia::Pixmap;

use crate::error::Result;
use crate::model::Element;
use crate::render::raster;
use crate::text_document::GridMetrics;

static FONT: OnceLock<Option<FontArc>> = OnceLock::new();

fn load_system_font() -> Option<FontArc> {
    let candidates = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
        "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
        "/usr/share/fonts/dejavu-sans-mono-fonts/DejaVuSansMono.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
        "/usr/share/fonts/liberation-mono/LiberationMono-Regular.ttf",
        "/System/Library/Fonts/Supplemental/Courier New.ttf",
        "/Library/Fonts/Courier New.ttf",
        "C:\\Windows\\Fonts\\consola.ttf",
        "C:\\Windows\\Fonts\\cour.ttf",
    ];

    for path in candidates {
        if let Ok(bytes) = std::fs::read(path) {
            if let Ok(font) = FontArc::try_from_vec(bytes) {
                log::debug!("text font: {path}");
                return Some(font);
            }
        }
    }

    log::warn!("no monospace system font found, text renders without glyphs");
    None
}

pub fn monospace_font() -> Option<&'static FontArc> {
    FONT.get_or_init(load_system_font).as_ref()
}

/// Rasterises a text element at its unscaled size: the plate in
/// `secondary_color`, then one glyph per grid cell in `color`.
pub fn render_text(element: &Element) -> Result<Pixmap> {
    let width = element.width.ceil().max(1.0) as u32;
    let height = element.height.ceil().max(1.0) as u32;
    let plate = element.secondary_color;
    // an invisible plate still carries the text colour so glyph edges blend cleanly
    let fill = if plate.a == 0 {
        Pixel([element.color.r, element.color.g, element.color.b, 0])
    } else {
        Pixel([plate.r, plate.g, plate.b, plate.a])
    };
    let mut image = RgbaImage::from_pixel(width, height, fill);

    if let (Some(font), Some(doc)) = (monospace_font(), element.text_doc.as_ref()) {
        let font_size = element.font_size();
        let m = GridMetrics::for_font_size(font_size);
        let color = Pixel([element.color.r, element.color.g, element.color.b, element.color.a]);
        let baseline_offset = (m.line_height - font_size) / 2.0;
        for (line, col, grapheme) in doc.cells() {
            if grapheme.trim().is_empty() {
                continue;
            }
            let origin = m.cell_origin(line, col);
            draw_text_mut(
                &mut image,
                color,
                origin.x.round() as i32,
                (origin.y + baseline_offset).round() as i32,
                font_size as f32,
                font,
                grapheme,
            );
        }
    }

    raster::image_to_pixmap(&image)
}
