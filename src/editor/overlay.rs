//! Interactive decorations drawn over the composed frame, and the two frame
//! entry points: the viewport view and the export.

use chrono::Local;
use kurbo::{Affine, BezPath, Circle, Line, Point, Rect, Shape, Vec2};
use tiny_skia::{Pixmap, Stroke, StrokeDash};

use super::transform::{HANDLE_RADIUS, Handle};
use super::{Editor, Tool};
use crate::error::Result;
use crate::geometry;
use crate::model::{Element, ElementKind, Rgba};
use crate::render::{self, MaskShape, Scene, raster, stamp};
use crate::text_document::GridMetrics;

const ACCENT: Rgba = Rgba::rgb(40, 140, 255);
const CAPTURE_HANDLE: f64 = 6.0;
const MAGNIFIER_CELL: f64 = 8.0;
const MAGNIFIER_OFFSET: f64 = 24.0;

fn polygon(points: &[Point]) -> BezPath {
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

fn thin(width: f64) -> Stroke {
    Stroke {
        width: width as f32,
        ..Stroke::default()
    }
}

fn dotted(width: f64) -> Stroke {
    Stroke {
        width: width as f32,
        dash: StrokeDash::new(vec![3.0, 3.0], 0.0),
        ..Stroke::default()
    }
}

impl Editor {
    fn scene(&self, final_output: bool) -> Scene<'_> {
        let final_look = final_output || self.preview_mode;
        Scene {
            elements: self.visible_elements(),
            capture: self.capture.rect,
            uncapture_mode: self.uncapture_mode,
            show_background: self.show_background,
            dark_pictures: self.dark_pictures,
            mask: self.masked.then_some(if self.hex_mask { MaskShape::Hexagon } else { MaskShape::Circle }),
            antialias: self.config.antialiasing_and_smooth_pixmaps,
            date_stamp: self.draw_datetime_stamp.then(|| stamp::stamp_text(Local::now())),
            checkerboard: !final_output,
            final_output: final_look,
        }
    }

    /// The frame shown in the window: composition plus editing decorations.
    pub fn render_view(&self) -> Result<Pixmap> {
        let (w, h) = (self.viewport_size.x.max(1.0) as u32, self.viewport_size.y.max(1.0) as u32);
        let mut target = raster::new_pixmap(w, h)?;
        let to_view = self.viewport.canvas_to_viewport();
        render::compose(&mut target, &self.scene(false), to_view);
        if !self.preview_mode {
            self.draw_overlays(&mut target);
        }
        Ok(target)
    }

    /// The capture rect rendered at canvas resolution, or `None` without one.
    pub fn render_export(&mut self) -> Result<Option<Pixmap>> {
        self.finish_text_editing();
        self.refresh_derived();
        let Some(capture) = self.capture.rect else {
            return Ok(None);
        };
        let (w, h) = (capture.width().round().max(1.0) as u32, capture.height().round().max(1.0) as u32);
        let mut target = raster::new_pixmap(w, h)?;
        render::compose(&mut target, &self.scene(true), Affine::translate(-capture.origin().to_vec2()));
        Ok(Some(target))
    }

    fn draw_overlays(&self, target: &mut Pixmap) {
        if self.tool == Tool::Transform {
            self.draw_selection_widget(target);
        }
        self.draw_capture_frame(target);
        if let Some(rect) = self.marquee_rect() {
            let path = rect.to_path(0.1);
            raster::fill_path(target, &path, ACCENT.with_alpha(40), Affine::IDENTITY, false);
            raster::stroke_path(target, &path, ACCENT, &thin(1.0), Affine::IDENTITY, false);
        }
        self.draw_text_editing(target);
        if self.magnifier_visible() {
            self.draw_magnifier(target);
        }
    }

    fn draw_selection_widget(&self, target: &mut Pixmap) {
        let selected: Vec<&Element> = self
            .selected_indexes()
            .into_iter()
            .filter_map(|i| self.element(i))
            .collect();
        for e in &selected {
            let outline = polygon(&e.viewport_polygon(&self.viewport));
            raster::stroke_path(target, &outline, Rgba::BLACK, &thin(1.0), Affine::IDENTITY, false);
            raster::stroke_path(target, &outline, Rgba::WHITE, &dotted(1.0), Affine::IDENTITY, false);
        }
        let Some(poly) = self.selection_polygon() else {
            return;
        };
        let vp = poly.map(|p| self.viewport.map_to_viewport(p));
        raster::stroke_path(target, &polygon(&vp), ACCENT, &thin(1.5), Affine::IDENTITY, true);
        for handle in Handle::ALL {
            let disk = Circle::new(handle.point(&vp), HANDLE_RADIUS / 2.0).to_path(0.1);
            raster::fill_path(target, &disk, Rgba::WHITE, Affine::IDENTITY, true);
            raster::stroke_path(target, &disk, ACCENT, &thin(1.5), Affine::IDENTITY, true);
        }
    }

    fn draw_capture_frame(&self, target: &mut Pixmap) {
        let Some(rect) = self.capture_rect_viewport() else {
            return;
        };
        let frame = rect.to_path(0.1);
        raster::stroke_path(target, &frame, Rgba::WHITE, &dotted(1.0), Affine::IDENTITY, false);
        if !self.capture.widget_enabled {
            return;
        }
        let corners = geometry::rect_corners(rect);
        let points: Vec<Point> = (0..4)
            .flat_map(|i| [corners[i], corners[i].midpoint(corners[(i + 1) % 4])])
            .collect();
        for p in points {
            let square = Rect::from_center_size(p, (CAPTURE_HANDLE, CAPTURE_HANDLE)).to_path(0.1);
            raster::fill_path(target, &square, Rgba::WHITE, Affine::IDENTITY, false);
            raster::stroke_path(target, &square, Rgba::BLACK, &thin(1.0), Affine::IDENTITY, false);
        }
    }

    /// Caret and selection cells of the text being edited, plus its colour buttons.
    fn draw_text_editing(&self, target: &mut Pixmap) {
        let Some(e) = self.editing_text.and_then(|i| self.element(i)) else {
            return;
        };
        let Some(doc) = e.text_doc.as_ref() else {
            return;
        };
        let m = GridMetrics::for_font_size(e.font_size());
        let to_view = self.viewport.canvas_to_viewport()
            * render::element_affine(e)
            * Affine::translate((-e.width / 2.0, -e.height / 2.0));

        let mut cells = BezPath::new();
        for index in doc.selection() {
            let (line, col) = doc.line_col(index);
            let cell = Rect::from_origin_size(m.cell_origin(line, col), (m.advance, m.line_height));
            cells.extend(cell.path_elements(0.1));
        }
        if !cells.elements().is_empty() {
            raster::fill_path(target, &cells, ACCENT.with_alpha(90), to_view, true);
        }
        if self.caret_visible {
            let (line, col) = doc.line_col(doc.caret());
            let top = m.cell_origin(line, col);
            let caret = Line::new(top, top + Vec2::new(0.0, m.line_height)).to_path(0.1);
            raster::stroke_path(target, &caret, contrast(e.secondary_color), &thin(2.0), to_view, true);
        }

        if let Some(buttons) = self.color_buttons() {
            let [(_, text_button), (_, plate_button)] = buttons;
            for (rect, color) in [(text_button, e.color), (plate_button, e.secondary_color)] {
                let path = rect.to_path(0.1);
                raster::fill_path(target, &path, color, Affine::IDENTITY, false);
                raster::stroke_path(target, &path, Rgba::WHITE, &thin(1.0), Affine::IDENTITY, false);
            }
        }
    }

    /// Enlarged pixels around the cursor with the sampled cell framed.
    fn draw_magnifier(&self, target: &mut Pixmap) {
        let cells = self.magnifier.cells.max(1) | 1;
        let half = (cells / 2) as i64;
        let side = cells as f64 * MAGNIFIER_CELL;
        let view = Rect::from_origin_size(Point::ZERO, (target.width() as f64, target.height() as f64));
        let mut origin = self.cursor + Vec2::new(MAGNIFIER_OFFSET, MAGNIFIER_OFFSET);
        if origin.x + side > view.x1 {
            origin.x = self.cursor.x - MAGNIFIER_OFFSET - side;
        }
        if origin.y + side > view.y1 {
            origin.y = self.cursor.y - MAGNIFIER_OFFSET - side;
        }
        let center = self.canvas_cursor();
        for dy in -half..=half {
            for dx in -half..=half {
                let sample = center + Vec2::new(dx as f64, dy as f64);
                let color = self.color_at(sample).unwrap_or(Rgba::BLACK);
                let cell = Rect::from_origin_size(
                    origin + Vec2::new((dx + half) as f64, (dy + half) as f64) * MAGNIFIER_CELL,
                    (MAGNIFIER_CELL, MAGNIFIER_CELL),
                );
                raster::fill_path(target, &cell.to_path(0.1), color.with_alpha(255), Affine::IDENTITY, false);
            }
        }
        let frame = Rect::from_origin_size(origin, (side, side)).to_path(0.1);
        raster::stroke_path(target, &frame, Rgba::WHITE, &thin(2.0), Affine::IDENTITY, false);
        let mid = Rect::from_origin_size(
            origin + Vec2::new(half as f64, half as f64) * MAGNIFIER_CELL,
            (MAGNIFIER_CELL, MAGNIFIER_CELL),
        );
        let sampled = self.color_under_cursor().unwrap_or(Rgba::BLACK);
        raster::stroke_path(target, &mid.to_path(0.1), contrast(sampled), &thin(1.0), Affine::IDENTITY, false);
    }

    /// Status line text.
    pub fn visible_summary(&self) -> String {
        let content = self
            .visible_elements()
            .into_iter()
            .filter(|e| e.is_content() && e.kind != ElementKind::Removing)
            .count();
        format!("{} · {} elements", self.tool.label(), content)
    }
}

fn contrast(color: Rgba) -> Rgba {
    let luma = 0.299 * color.r as f64 + 0.587 * color.g as f64 + 0.114 * color.b as f64;
    if color.a < 128 || luma > 128.0 { Rgba::BLACK } else { Rgba::WHITE }
}
