//! Composition of the visible elements into a pixmap.
//!
//! The same pass serves the interactive view (with the uncaptured zone
//! overlays) and the export (capture rect only). Elements never fail the
//! frame: a picture without pixels draws the broken placeholder instead.

pub mod arrow;
pub mod pairs;
pub mod raster;
pub mod stamp;
pub mod text;

use kurbo::{Affine, BezPath, Circle, Ellipse, Line, Point, Rect, Shape, Vec2};
use tiny_skia::{BlendMode, FillRule, Mask, Pixmap, Stroke};

use crate::editor::{UncaptureMode, Viewport};
use crate::geometry;
use crate::model::{Element, ElementKind, Rgba};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskShape {
    Circle,
    Hexagon,
}

/// Everything one composition pass needs besides the target.
pub struct Scene<'a> {
    /// Visible elements, any order.
    pub elements: Vec<&'a Element>,
    pub capture: Option<Rect>,
    pub uncapture_mode: UncaptureMode,
    pub show_background: bool,
    pub dark_pictures: bool,
    pub mask: Option<MaskShape>,
    pub antialias: bool,
    pub date_stamp: Option<String>,
    pub checkerboard: bool,
    /// Export look: no uncaptured-zone treatment, background toggle honoured.
    pub final_output: bool,
}

pub const CHECKER_CELL: u32 = 8;

/// Canvas transform of an element's local frame.
pub fn element_affine(e: &Element) -> Affine {
    e.get_transform(&Viewport::default(), true, true, false)
}

/// Maps a pixmap's pixel grid onto the element's local rect.
pub fn picture_affine(e: &Element, pixmap: &Pixmap) -> Affine {
    let (pw, ph) = (pixmap.width().max(1) as f64, pixmap.height().max(1) as f64);
    element_affine(e)
        * Affine::translate((-e.width / 2.0, -e.height / 2.0))
        * Affine::scale_non_uniform(e.width / pw, e.height / ph)
}

fn local_box(e: &Element) -> Rect {
    geometry::rect_from_points(e.local_start_point, e.local_end_point)
}

fn shape_path(shape: &impl Shape) -> BezPath {
    shape.path_elements(0.1).collect()
}

fn polygon_path(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    for (i, p) in points.iter().enumerate() {
        if i == 0 {
            path.move_to(*p);
        } else {
            path.line_to(*p);
        }
    }
    path.close_path();
    path
}

pub fn mask_path(shape: MaskShape, rect: Rect) -> BezPath {
    let center = rect.center();
    let r = rect.width().min(rect.height()) / 2.0;
    match shape {
        MaskShape::Circle => shape_path(&Circle::new(center, r)),
        MaskShape::Hexagon => {
            let points: Vec<Point> = (0..6)
                .map(|i| center + geometry::rotate_vec2(Vec2::new(r, 0.0), 60.0 * i as f64 + 30.0))
                .collect();
            polygon_path(&points)
        }
    }
}

fn stroke(width: f64, square: bool) -> Stroke {
    Stroke {
        width: width as f32,
        line_cap: if square {
            tiny_skia::LineCap::Square
        } else {
            tiny_skia::LineCap::Round
        },
        line_join: tiny_skia::LineJoin::Round,
        ..Stroke::default()
    }
}

fn with_opacity(color: Rgba, opacity: f64) -> Rgba {
    color.with_alpha((color.a as f64 * opacity.clamp(0.0, 1.0)).round() as u8)
}

/// Coverage mask of `path` (or its complement with `invert`) in target space.
fn coverage(target: &Pixmap, path: &BezPath, transform: Affine, invert: bool, aa: bool) -> Option<Mask> {
    let mut mask = Mask::new(target.width(), target.height())?;
    if let Some(p) = raster::to_skia_path(path) {
        mask.fill_path(&p, FillRule::Winding, aa, raster::to_transform(transform));
    }
    if invert {
        for v in mask.data_mut() {
            *v = 255 - *v;
        }
    }
    Some(mask)
}

fn fill_masked(target: &mut Pixmap, path: &BezPath, color: Rgba, transform: Affine, mask: Option<&Mask>, blend: BlendMode) {
    let Some(p) = raster::to_skia_path(path) else {
        return;
    };
    let mut paint = raster::solid_paint(color, true);
    paint.blend_mode = blend;
    target.fill_path(&p, &paint, FillRule::Winding, raster::to_transform(transform), mask);
}

fn draw_picture(target: &mut Pixmap, e: &Element, to_target: Affine, opacity: f64, smooth: bool) {
    match e.pixmap.as_deref() {
        Some(pixmap) => raster::draw_pixmap(target, pixmap, to_target * picture_affine(e, pixmap), opacity, smooth),
        None => {
            if let Ok(broken) = raster::pixmap_broken(e.width.ceil() as u32, e.height.ceil() as u32) {
                raster::draw_pixmap(target, &broken, to_target * picture_affine(e, &broken), opacity, smooth);
            }
        }
    }
}

fn draw_background_layer(target: &mut Pixmap, scene: &Scene, to_target: Affine, opacity: f64, clip: Option<&Mask>) {
    for e in sorted(scene, |e| e.background_image) {
        match clip {
            None => draw_picture(target, e, to_target, opacity, scene.antialias),
            Some(mask) => {
                let Some(pixmap) = e.pixmap.as_deref() else {
                    continue;
                };
                let paint = tiny_skia::PixmapPaint {
                    opacity: opacity as f32,
                    quality: raster::quality(scene.antialias),
                    ..Default::default()
                };
                target.draw_pixmap(
                    0,
                    0,
                    pixmap.as_ref(),
                    &paint,
                    raster::to_transform(to_target * picture_affine(e, pixmap)),
                    Some(mask),
                );
            }
        }
    }
}

fn sorted<'a>(scene: &Scene<'a>, keep: impl Fn(&Element) -> bool) -> Vec<&'a Element> {
    let mut elements: Vec<&'a Element> = scene.elements.iter().copied().filter(|e| keep(e)).collect();
    elements.sort_by_key(|e| e.unique_index);
    elements
}

/// Dims the capture area except under every darkening element.
///
/// Each hole is cut out of the coverage on its own, so overlapping or mirrored
/// holes never cancel. The strongest darkening size sets the dim level.
fn draw_darkening(target: &mut Pixmap, scene: &Scene, to_target: Affine) {
    let darkening = sorted(scene, |e| e.kind == ElementKind::Darkening);
    if darkening.is_empty() {
        return;
    }
    let Some(area) = scene.capture.or_else(|| background_bounds(scene)) else {
        return;
    };
    let Some(mut outside_holes) = Mask::new(target.width(), target.height()) else {
        return;
    };
    outside_holes.data_mut().fill(255);
    for e in &darkening {
        let Some(hole) = coverage(target, &polygon_path(&e.canvas_polygon()), to_target, true, scene.antialias) else {
            continue;
        };
        for (o, h) in outside_holes.data_mut().iter_mut().zip(hole.data()) {
            *o = (*o).min(*h);
        }
    }
    let size = darkening.iter().map(|e| e.size.clamp(0.0, 1.0)).fold(0.0, f64::max);
    let alpha = ((0.1 + 0.9 * size) * 255.0).round() as u8;
    fill_masked(
        target,
        &shape_path(&area),
        Rgba::BLACK.with_alpha(alpha),
        to_target,
        Some(&outside_holes),
        BlendMode::SourceOver,
    );
}

fn background_bounds(scene: &Scene) -> Option<Rect> {
    let points: Vec<Point> = scene
        .elements
        .iter()
        .filter(|e| e.background_image)
        .flat_map(|e| e.canvas_polygon())
        .collect();
    geometry::aabb_of_points(&points)
}

fn draw_linear(target: &mut Pixmap, e: &Element, tf: Affine, aa: bool) {
    let marker = e.kind == ElementKind::Marker;
    let color = if marker {
        with_opacity(e.color, 0.5 * e.opacity)
    } else {
        with_opacity(e.color, e.opacity)
    };
    if e.kind == ElementKind::Arrow {
        let path = arrow::arrow_path(e.local_start_point, e.local_end_point, e.size, !e.toolbool);
        raster::fill_path(target, &path, color, tf, aa);
        return;
    }
    let line = shape_path(&Line::new(e.local_start_point, e.local_end_point));
    raster::stroke_path(target, &line, color, &stroke(e.pen_width(), marker), tf, aa);
}

fn draw_freehand(target: &mut Pixmap, e: &Element, tf: Affine, aa: bool) {
    let Some(path) = &e.path else {
        return;
    };
    let marker = e.kind == ElementKind::Marker;
    let opacity = if marker { 0.5 * e.opacity } else { e.opacity };
    raster::stroke_path(
        target,
        path,
        with_opacity(e.color, opacity),
        &stroke(e.pen_width(), marker),
        tf,
        aa,
    );
}

fn draw_box(target: &mut Pixmap, e: &Element, tf: Affine, aa: bool) {
    let rect = local_box(e);
    let color = with_opacity(e.color, e.opacity);
    let outline = match e.kind {
        ElementKind::Oval => shape_path(&Ellipse::from_rect(rect)),
        _ => shape_path(&rect),
    };
    if e.filled {
        raster::fill_path(target, &outline, color, tf, aa);
    } else {
        raster::stroke_path(target, &outline, color, &stroke(e.pen_width(), false), tf, aa);
    }
}

fn contrast_color(color: Rgba) -> Rgba {
    let luma = 0.299 * color.r as f64 + 0.587 * color.g as f64 + 0.114 * color.b as f64;
    if luma > 150.0 { Rgba::BLACK } else { Rgba::WHITE }
}

fn draw_numbering(target: &mut Pixmap, e: &Element, number: usize, tf: Affine, aa: bool) {
    let rect = local_box(e);
    let circle = shape_path(&Ellipse::from_rect(rect));
    let color = with_opacity(e.color, e.opacity);
    raster::fill_path(target, &circle, color, tf, aa);
    let label = number.to_string();
    let h = rect.height().min(rect.width()) * 0.45;
    let (glyphs, w) = stamp::text_path(&label, h);
    let place = Affine::translate(rect.center().to_vec2() - Vec2::new(w / 2.0 - h * 0.1, h / 2.0));
    raster::fill_path(target, &glyphs, contrast_color(color), tf * place, aa);
}

fn draw_text(target: &mut Pixmap, e: &Element, tf: Affine, smooth: bool) {
    let fresh;
    let pixmap = match e.proxy_pixmap.as_deref() {
        Some(p) => p,
        None => match text::render_text(e) {
            Ok(p) => {
                fresh = p;
                &fresh
            }
            Err(err) => {
                log::warn!("text element {}: {err}", e.unique_index);
                return;
            }
        },
    };
    let place = Affine::translate((-e.width / 2.0, -e.height / 2.0));
    raster::draw_pixmap(target, pixmap, tf * place, e.opacity, smooth);
}

fn circle_clip(target: &Pixmap, e: &Element, to_target: Affine, aa: bool) -> Option<Mask> {
    let r = pairs::mask_radius(e);
    coverage(target, &shape_path(&Circle::new(e.position, r)), to_target, false, aa)
}

fn draw_snapshot(target: &mut Pixmap, dest: &Element, snapshot: &Pixmap, to_target: Affine, aa: bool) {
    let transform = raster::to_transform(to_target * picture_affine(dest, snapshot));
    let paint = tiny_skia::PixmapPaint {
        quality: raster::quality(aa),
        ..Default::default()
    };
    let clip = if dest.toolbool { circle_clip(target, dest, to_target, aa) } else { None };
    target.draw_pixmap(0, 0, snapshot.as_ref(), &paint, transform, clip.as_ref());
}

fn draw_frame(target: &mut Pixmap, e: &Element, to_target: Affine, aa: bool) {
    let color = with_opacity(e.color, e.opacity);
    let path = if e.toolbool {
        shape_path(&Circle::new(e.position, pairs::mask_radius(e)))
    } else {
        polygon_path(&e.canvas_polygon())
    };
    let width = (e.pen_width() / 2.0).max(1.0);
    raster::stroke_path(target, &path, color, &stroke(width, false), to_target, aa);
}

fn draw_pair(target: &mut Pixmap, e: &Element, scene: &Scene, to_target: Affine) {
    let aa = scene.antialias;
    if e.is_pair_first() {
        if e.kind == ElementKind::ZoomInRegion {
            draw_frame(target, e, to_target, aa);
        }
        return;
    }
    let first = scene
        .elements
        .iter()
        .find(|f| f.kind == e.kind && !f.second && e.group_id == Some(f.unique_index));
    let Some(first) = first else {
        return;
    };
    if let Some(snapshot) = first.pixmap.as_deref() {
        draw_snapshot(target, e, snapshot, to_target, aa);
    }
    if e.kind == ElementKind::ZoomInRegion {
        draw_frame(target, e, to_target, aa);
        let color = with_opacity(e.color, e.opacity);
        let width = (e.pen_width() / 2.0).max(1.0);
        for (p, q) in pairs::connector_segments(first, e, e.toolbool) {
            let line = shape_path(&Line::new(p, q));
            raster::stroke_path(target, &line, color, &stroke(width, false), to_target, aa);
        }
    }
}

fn draw_blur(target: &mut Pixmap, e: &Element, to_target: Affine, aa: bool) {
    match (e.finished, e.pixmap.as_deref()) {
        (true, Some(pixmap)) => raster::draw_pixmap(target, pixmap, to_target * picture_affine(e, pixmap), 1.0, aa),
        _ => {
            let path = polygon_path(&e.canvas_polygon());
            raster::fill_path(target, &path, Rgba::rgb(128, 128, 128).with_alpha(96), to_target, aa);
        }
    }
}

fn draw_annotation(target: &mut Pixmap, e: &Element, scene: &Scene, number: usize, to_target: Affine) {
    let aa = scene.antialias;
    // linear and box elements keep their stroke width under scaling
    let mut fixed = e.clone();
    fixed.fix_size_distortion();
    let tf = to_target * element_affine(&fixed);
    match e.kind {
        ElementKind::Pen | ElementKind::Marker if !e.straight => draw_freehand(target, e, to_target * element_affine(e), aa),
        ElementKind::Pen | ElementKind::Marker | ElementKind::Line | ElementKind::Arrow => {
            draw_linear(target, &fixed, tf, aa)
        }
        ElementKind::Rect | ElementKind::Oval | ElementKind::MultiFraming => draw_box(target, &fixed, tf, aa),
        ElementKind::Numbering => draw_numbering(target, &fixed, number, tf, aa),
        ElementKind::Text => draw_text(target, e, to_target * element_affine(e), aa),
        ElementKind::Blurring => draw_blur(target, e, to_target, aa),
        ElementKind::ZoomInRegion | ElementKind::CopyPaste => draw_pair(target, e, scene, to_target),
        ElementKind::Darkening
        | ElementKind::Removing
        | ElementKind::ArrowsTree
        | ElementKind::Picture
        | ElementKind::BackgroundPicture => {}
    }
}

fn draw_arrows_trees(target: &mut Pixmap, scene: &Scene, to_target: Affine) {
    let nodes = sorted(scene, |e| e.kind == ElementKind::ArrowsTree);
    let aa = scene.antialias;
    for node in &nodes {
        let Some(parent) = node
            .tree_parent
            .and_then(|p| nodes.iter().find(|n| n.pass2_unique_index == p))
        else {
            continue;
        };
        let (from, to) = (parent.position, node.position);
        let d = to - from;
        let len = d.hypot();
        let (r_from, r_to) = (parent.width * parent.scale_x.abs() / 2.0, node.width * node.scale_x.abs() / 2.0);
        if len <= r_from + r_to {
            continue;
        }
        let dir = d / len;
        let path = arrow::arrow_path(from + dir * r_from, to - dir * r_to, node.size, true);
        raster::fill_path(target, &path, with_opacity(node.color, node.opacity), to_target, aa);
    }
    for node in &nodes {
        let r = node.width * node.scale_x.abs() / 2.0;
        let circle = shape_path(&Circle::new(node.position, r));
        let color = with_opacity(node.color, node.opacity);
        if node.tree_root {
            raster::fill_path(target, &circle, color, to_target, aa);
        } else {
            raster::stroke_path(target, &circle, color, &stroke((r / 3.0).max(1.0), false), to_target, aa);
        }
    }
}

fn draw_date_stamp(target: &mut Pixmap, text: &str, capture: Rect, to_target: Affine) {
    match stamp::render_stamp(text, stamp::stamp_height(capture)) {
        Ok(pixmap) => {
            let place = stamp::placement(capture, (pixmap.width() as f64, pixmap.height() as f64));
            raster::draw_pixmap(target, &pixmap, to_target * place, 1.0, true);
        }
        Err(err) => log::warn!("date stamp: {err}"),
    }
}

/// Composes `scene` into `target`; `to_target` maps canvas space to target pixels.
pub fn compose(target: &mut Pixmap, scene: &Scene, to_target: Affine) {
    let aa = scene.antialias;
    let target_rect = Rect::new(0.0, 0.0, target.width() as f64, target.height() as f64);
    let interactive = !scene.final_output;

    if scene.checkerboard {
        raster::checkerboard(target, CHECKER_CELL);
    }

    if interactive && scene.capture.is_some() {
        match scene.uncapture_mode {
            UncaptureMode::FullTransparent => draw_background_layer(target, scene, to_target, 0.5, None),
            UncaptureMode::Opaque => draw_background_layer(target, scene, to_target, 1.0, None),
            UncaptureMode::HalfTransparent => {}
        }
    }

    // pictures, the background clipped to the capture rect
    let capture_clip = scene
        .capture
        .and_then(|rect| coverage(target, &shape_path(&rect), to_target, false, aa));
    let pictures = sorted(scene, |e| e.kind.is_picture());
    for e in &pictures {
        if e.background_image {
            if scene.final_output && !scene.show_background {
                continue;
            }
            match (&capture_clip, e.pixmap.as_deref()) {
                (Some(clip), Some(pixmap)) => {
                    let paint = tiny_skia::PixmapPaint {
                        opacity: e.opacity as f32,
                        quality: raster::quality(aa),
                        ..Default::default()
                    };
                    let transform = raster::to_transform(to_target * picture_affine(e, pixmap));
                    target.draw_pixmap(0, 0, pixmap.as_ref(), &paint, transform, Some(clip));
                }
                _ => draw_picture(target, e, to_target, e.opacity, aa),
            }
        } else {
            draw_picture(target, e, to_target, e.opacity, aa);
        }
    }

    if !scene.dark_pictures {
        draw_darkening(target, scene, to_target);
    }

    let mut numbering = 0;
    for e in sorted(scene, |e| !e.kind.is_picture() && e.kind != ElementKind::ArrowsTree) {
        if e.kind == ElementKind::Numbering {
            numbering += 1;
        }
        draw_annotation(target, e, scene, numbering, to_target);
    }
    draw_arrows_trees(target, scene, to_target);

    if scene.dark_pictures {
        draw_darkening(target, scene, to_target);
    }

    if let (Some(shape), Some(capture)) = (scene.mask, scene.capture) {
        if let Some(outside) = coverage(target, &mask_path(shape, capture), to_target, true, aa) {
            fill_masked(target, &shape_path(&capture), Rgba::BLACK, to_target, Some(&outside), BlendMode::Clear);
        }
    }

    if interactive {
        if let Some(capture) = scene.capture {
            let outside_mask = coverage(target, &shape_path(&capture), to_target, true, aa);
            match scene.uncapture_mode {
                UncaptureMode::FullTransparent => {}
                // The 0.6 ghost is the background beyond the capture rect,
                // dimmed by the 0.4 black fill; inside stays untouched.
                UncaptureMode::HalfTransparent => {
                    draw_background_layer(target, scene, to_target, 0.6, outside_mask.as_ref());
                    fill_masked(
                        target,
                        &shape_path(&target_rect),
                        Rgba::BLACK.with_alpha(102),
                        Affine::IDENTITY,
                        outside_mask.as_ref(),
                        BlendMode::SourceOver,
                    );
                }
                UncaptureMode::Opaque => fill_masked(
                    target,
                    &shape_path(&target_rect),
                    Rgba::BLACK,
                    Affine::IDENTITY,
                    outside_mask.as_ref(),
                    BlendMode::SourceOver,
                ),
            }
        }
    }

    if let (Some(text), Some(capture)) = (&scene.date_stamp, scene.capture) {
        draw_date_stamp(target, text, capture, to_target);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::editor::Editor;

    fn solid(w: u32, h: u32, color: Rgba) -> Pixmap {
        let mut p = Pixmap::new(w, h).unwrap();
        p.fill(color.to_skia());
        p
    }

    fn scene<'a>(elements: Vec<&'a Element>, capture: Rect) -> Scene<'a> {
        Scene {
            elements,
            capture: Some(capture),
            uncapture_mode: UncaptureMode::Opaque,
            show_background: true,
            dark_pictures: false,
            mask: None,
            antialias: false,
            date_stamp: None,
            checkerboard: false,
            final_output: true,
        }
    }

    fn background(w: u32, h: u32, color: Rgba) -> Element {
        Editor::background_element(
            Arc::new(solid(w, h, color)),
            Rect::new(0.0, 0.0, w as f64, h as f64),
        )
    }

    fn boxed(kind: ElementKind, start: Point, end: Point) -> Element {
        let mut e = Element::new(kind);
        e.start_point = start;
        e.end_point = end;
        e.finalize_rectangular();
        e
    }

    #[test]
    fn background_then_filled_rect() {
        let bg = background(100, 100, Rgba::WHITE);
        let mut rect = boxed(ElementKind::Rect, Point::new(10.0, 10.0), Point::new(50.0, 50.0));
        rect.filled = true;
        rect.color = Rgba::RED;
        let mut target = Pixmap::new(100, 100).unwrap();
        compose(&mut target, &scene(vec![&rect, &bg], Rect::new(0.0, 0.0, 100.0, 100.0)), Affine::IDENTITY);
        assert_eq!(raster::pixel_at(&target, 30, 30), Some(Rgba::RED));
        assert_eq!(raster::pixel_at(&target, 80, 80), Some(Rgba::WHITE));
    }

    #[test]
    fn darkening_leaves_hole_and_dims_the_rest() {
        let bg = background(100, 100, Rgba::WHITE);
        let mut dark = boxed(ElementKind::Darkening, Point::new(10.0, 10.0), Point::new(50.0, 50.0));
        dark.size = 0.5;
        let mut target = Pixmap::new(100, 100).unwrap();
        compose(&mut target, &scene(vec![&bg, &dark], Rect::new(0.0, 0.0, 100.0, 100.0)), Affine::IDENTITY);
        assert_eq!(raster::pixel_at(&target, 30, 30), Some(Rgba::WHITE));
        let dimmed = raster::pixel_at(&target, 80, 80).unwrap();
        assert!(dimmed.r < 140 && dimmed.r > 100, "{dimmed:?}");
    }

    #[test]
    fn mirrored_darkening_holes_do_not_cancel() {
        let bg = background(100, 100, Rgba::WHITE);
        let mut left = boxed(ElementKind::Darkening, Point::new(10.0, 10.0), Point::new(60.0, 60.0));
        left.size = 0.8;
        let mut mirrored = boxed(ElementKind::Darkening, Point::new(40.0, 10.0), Point::new(90.0, 60.0));
        mirrored.scale_x = -1.0;
        mirrored.size = 0.2;
        let mut target = Pixmap::new(100, 100).unwrap();
        compose(
            &mut target,
            &scene(vec![&bg, &left, &mirrored], Rect::new(0.0, 0.0, 100.0, 100.0)),
            Affine::IDENTITY,
        );
        // the overlap of both holes stays clear
        assert_eq!(raster::pixel_at(&target, 50, 30), Some(Rgba::WHITE));
        assert_eq!(raster::pixel_at(&target, 20, 30), Some(Rgba::WHITE));
        assert_eq!(raster::pixel_at(&target, 80, 30), Some(Rgba::WHITE));
        // the strongest size sets the dim level: 0.1 + 0.9 * 0.8
        let dimmed = raster::pixel_at(&target, 50, 85).unwrap();
        assert!(dimmed.r > 30 && dimmed.r < 60, "{dimmed:?}");
    }

    #[test]
    fn circle_mask_clears_corners() {
        let bg = background(100, 100, Rgba::WHITE);
        let mut s = scene(vec![&bg], Rect::new(0.0, 0.0, 100.0, 100.0));
        s.mask = Some(MaskShape::Circle);
        let mut target = Pixmap::new(100, 100).unwrap();
        compose(&mut target, &s, Affine::IDENTITY);
        assert_eq!(raster::pixel_at(&target, 1, 1).map(|c| c.a), Some(0));
        assert_eq!(raster::pixel_at(&target, 50, 50), Some(Rgba::WHITE));
    }

    #[test]
    fn hidden_background_is_skipped_in_output() {
        let bg = background(50, 50, Rgba::WHITE);
        let mut s = scene(vec![&bg], Rect::new(0.0, 0.0, 50.0, 50.0));
        s.show_background = false;
        let mut target = Pixmap::new(50, 50).unwrap();
        compose(&mut target, &s, Affine::IDENTITY);
        assert_eq!(raster::pixel_at(&target, 25, 25).map(|c| c.a), Some(0));
    }

    #[test]
    fn opaque_uncapture_blacks_out_outside() {
        let bg = background(100, 100, Rgba::WHITE);
        let mut s = scene(vec![&bg], Rect::new(20.0, 20.0, 80.0, 80.0));
        s.final_output = false;
        let mut target = Pixmap::new(100, 100).unwrap();
        compose(&mut target, &s, Affine::IDENTITY);
        assert_eq!(raster::pixel_at(&target, 5, 5), Some(Rgba::BLACK));
        assert_eq!(raster::pixel_at(&target, 50, 50), Some(Rgba::WHITE));
    }

    #[test]
    fn half_transparent_uncapture_dims_a_ghost_outside() {
        let bg = background(100, 100, Rgba::WHITE);
        let mut s = scene(vec![&bg], Rect::new(20.0, 20.0, 80.0, 80.0));
        s.final_output = false;
        s.uncapture_mode = UncaptureMode::HalfTransparent;
        let mut target = Pixmap::new(100, 100).unwrap();
        compose(&mut target, &s, Affine::IDENTITY);
        assert_eq!(raster::pixel_at(&target, 50, 50), Some(Rgba::WHITE));
        // white at 0.6 under black at 0.4: partly opaque grey
        let ghost = raster::pixel_at(&target, 5, 5).unwrap();
        assert!(ghost.a > 170 && ghost.a < 220, "{ghost:?}");
        assert!(ghost.r > 100 && ghost.r < 145, "{ghost:?}");
    }

    #[test]
    fn missing_pixmap_draws_placeholder() {
        let mut picture = Element::new(ElementKind::Picture);
        picture.position = Point::new(20.0, 20.0);
        picture.width = 40.0;
        picture.height = 40.0;
        let mut target = Pixmap::new(40, 40).unwrap();
        compose(&mut target, &scene(vec![&picture], Rect::new(0.0, 0.0, 40.0, 40.0)), Affine::IDENTITY);
        assert!(target.pixels().iter().all(|p| p.alpha() == 255));
    }

    #[test]
    fn hexagon_mask_is_inscribed() {
        let rect = Rect::new(0.0, 0.0, 100.0, 60.0);
        let bbox = mask_path(MaskShape::Hexagon, rect).bounding_box();
        assert!(bbox.height() <= 60.0 + 1e-9);
        assert!((bbox.center() - rect.center()).hypot() < 1e-9);
    }
}
