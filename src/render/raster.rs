//! tiny-skia plumbing: conversions from kurbo, pixmap helpers and filters.

use image::RgbaImage;
use kurbo::{Affine, BezPath, PathEl, Rect};
use tiny_skia::{
    Color, ColorU8, FillRule, FilterQuality, IntSize, Paint, PathBuilder, Pixmap, PixmapPaint, Transform,
};

use crate::error::{EditorError, Result};
use crate::model::Rgba;

pub fn to_transform(affine: Affine) -> Transform {
    let [a, b, c, d, e, f] = affine.as_coeffs().map(|v| v as f32);
    Transform::from_row(a, b, c, d, e, f)
}

pub fn to_skia_path(path: &BezPath) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => pb.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => pb.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(c, p) => pb.quad_to(c.x as f32, c.y as f32, p.x as f32, p.y as f32),
            PathEl::CurveTo(c1, c2, p) => pb.cubic_to(
                c1.x as f32,
                c1.y as f32,
                c2.x as f32,
                c2.y as f32,
                p.x as f32,
                p.y as f32,
            ),
            PathEl::ClosePath => pb.close(),
        }
    }
    pb.finish()
}

pub fn to_skia_rect(rect: Rect) -> Option<tiny_skia::Rect> {
    tiny_skia::Rect::from_ltrb(rect.x0 as f32, rect.y0 as f32, rect.x1 as f32, rect.y1 as f32)
}

pub fn new_pixmap(width: u32, height: u32) -> Result<Pixmap> {
    Pixmap::new(width.max(1), height.max(1)).ok_or(EditorError::PixmapAllocation { width, height })
}

pub fn solid_paint(color: Rgba, anti_alias: bool) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = anti_alias;
    paint
}

pub fn fill_path(pixmap: &mut Pixmap, path: &BezPath, color: Rgba, transform: Affine, anti_alias: bool) {
    if let Some(path) = to_skia_path(path) {
        pixmap.fill_path(
            &path,
            &solid_paint(color, anti_alias),
            FillRule::Winding,
            to_transform(transform),
            None,
        );
    }
}

pub fn stroke_path(
    pixmap: &mut Pixmap,
    path: &BezPath,
    color: Rgba,
    stroke: &tiny_skia::Stroke,
    transform: Affine,
    anti_alias: bool,
) {
    if let Some(path) = to_skia_path(path) {
        pixmap.stroke_path(
            &path,
            &solid_paint(color, anti_alias),
            stroke,
            to_transform(transform),
            None,
        );
    }
}

pub fn quality(smooth: bool) -> FilterQuality {
    if smooth {
        FilterQuality::Bilinear
    } else {
        FilterQuality::Nearest
    }
}

/// Draws `source` with its top-left at the origin of `transform`.
pub fn draw_pixmap(target: &mut Pixmap, source: &Pixmap, transform: Affine, opacity: f64, smooth: bool) {
    let paint = PixmapPaint {
        opacity: opacity.clamp(0.0, 1.0) as f32,
        quality: quality(smooth),
        ..PixmapPaint::default()
    };
    target.draw_pixmap(0, 0, source.as_ref(), &paint, to_transform(transform), None);
}

pub fn image_to_pixmap(image: &RgbaImage) -> Result<Pixmap> {
    let (width, height) = image.dimensions();
    let size = IntSize::from_wh(width, height).ok_or(EditorError::PixmapAllocation { width, height })?;
    let mut data = Vec::with_capacity(image.as_raw().len());
    for px in image.pixels() {
        let c = ColorU8::from_rgba(px[0], px[1], px[2], px[3]).premultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    Pixmap::from_vec(data, size).ok_or(EditorError::PixmapAllocation { width, height })
}

pub fn pixmap_to_image(pixmap: &Pixmap) -> RgbaImage {
    let mut data = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    RgbaImage::from_raw(pixmap.width(), pixmap.height(), data)
        .unwrap_or_else(|| RgbaImage::new(pixmap.width(), pixmap.height()))
}

pub fn decode_png_bytes(bytes: &[u8]) -> Result<Pixmap> {
    let image = image::load_from_memory(bytes)?.to_rgba8();
    image_to_pixmap(&image)
}

pub fn encode_png_bytes(pixmap: &Pixmap) -> Result<Vec<u8>> {
    Ok(pixmap.encode_png()?)
}

/// Straight (non-premultiplied) colour of one pixel.
pub fn pixel_at(pixmap: &Pixmap, x: i64, y: i64) -> Option<Rgba> {
    if x < 0 || y < 0 {
        return None;
    }
    let px = pixmap.pixel(x as u32, y as u32)?.demultiply();
    Some(Rgba {
        r: px.red(),
        g: px.green(),
        b: px.blue(),
        a: px.alpha(),
    })
}

/// Light placeholder with a red X, drawn for pictures that failed to load.
pub fn pixmap_broken(width: u32, height: u32) -> Result<Pixmap> {
    let (w, h) = (width.clamp(8, 4096), height.clamp(8, 4096));
    let mut pixmap = new_pixmap(w, h)?;
    pixmap.fill(Color::from_rgba8(235, 235, 235, 255));
    let mut cross = BezPath::new();
    cross.move_to((0.0, 0.0));
    cross.line_to((w as f64, h as f64));
    cross.move_to((w as f64, 0.0));
    cross.line_to((0.0, h as f64));
    let stroke = tiny_skia::Stroke {
        width: (w.min(h) as f32 / 16.0).max(2.0),
        ..Default::default()
    };
    stroke_path(&mut pixmap, &cross, Rgba::RED, &stroke, Affine::IDENTITY, true);
    Ok(pixmap)
}

pub fn checkerboard(pixmap: &mut Pixmap, cell: u32) {
    let cell = cell.max(1);
    let light = ColorU8::from_rgba(204, 204, 204, 255).premultiply();
    let dark = ColorU8::from_rgba(153, 153, 153, 255).premultiply();
    let width = pixmap.width();
    for (i, px) in pixmap.pixels_mut().iter_mut().enumerate() {
        let (x, y) = (i as u32 % width, i as u32 / width);
        *px = if (x / cell + y / cell) % 2 == 0 { light } else { dark };
    }
}

/// Nearest-neighbour pixelation: shrink by `factor` and blow back up.
pub fn pixelate(image: &RgbaImage, factor: f64) -> RgbaImage {
    use image::imageops::{FilterType, resize};
    let (w, h) = image.dimensions();
    let factor = factor.max(1.0);
    let small_w = ((w as f64 / factor).round() as u32).max(1);
    let small_h = ((h as f64 / factor).round() as u32).max(1);
    let small = resize(image, small_w, small_h, FilterType::Triangle);
    resize(&small, w, h, FilterType::Nearest)
}

/// Gaussian blur cascade driven by `size` in 0..1.
pub fn blur_cascade(image: &RgbaImage, size: f64) -> RgbaImage {
    let radius = 5.0 + 45.0 * size;
    let mut out = image.clone();
    for sigma in [radius / 4.0, radius / 2.0, radius] {
        out = imageproc::filter::gaussian_blur_f32(&out, sigma as f32);
    }
    out
}

pub fn gaussian_blur(image: &RgbaImage, sigma: f64) -> RgbaImage {
    imageproc::filter::gaussian_blur_f32(image, sigma.max(0.1) as f32)
}
