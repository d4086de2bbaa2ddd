use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use kurbo::{Affine, BezPath, Point, Rect, Shape, Vec2};
use serde::{Deserialize, Serialize};

use crate::editor::viewport::Viewport;
use crate::geometry;
use crate::render::arrow;
use crate::text_document::TextDocument;

pub type ElementIndex = u64;
pub type SharedPixmap = Arc<tiny_skia::Pixmap>;

static NEXT_UNIQUE_INDEX: AtomicU64 = AtomicU64::new(1);

/// Hands out a process-wide unique element index.
pub fn allocate_unique_index() -> ElementIndex {
    NEXT_UNIQUE_INDEX.fetch_add(1, Ordering::Relaxed)
}

/// Makes sure indices handed out from now on are strictly above `index`.
pub fn reserve_unique_indexes_above(index: ElementIndex) {
    NEXT_UNIQUE_INDEX.fetch_max(index + 1, Ordering::Relaxed);
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const TRANSPARENT: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    pub fn to_floats(self) -> [f64; 4] {
        [self.r, self.g, self.b, self.a].map(|c| c as f64 / 255.0)
    }

    pub fn from_floats(c: [f64; 4]) -> Self {
        let [r, g, b, a] = c.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8);
        Self { r, g, b, a }
    }

    pub fn to_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Arrow,
    Pen,
    Marker,
    Line,
    Oval,
    Rect,
    Numbering,
    Text,
    Blurring,
    Darkening,
    Picture,
    BackgroundPicture,
    ZoomInRegion,
    CopyPaste,
    MultiFraming,
    ArrowsTree,
    Removing,
}

impl ElementKind {
    pub const ALL: [ElementKind; 17] = [
        Self::Arrow,
        Self::Pen,
        Self::Marker,
        Self::Line,
        Self::Oval,
        Self::Rect,
        Self::Numbering,
        Self::Text,
        Self::Blurring,
        Self::Darkening,
        Self::Picture,
        Self::BackgroundPicture,
        Self::ZoomInRegion,
        Self::CopyPaste,
        Self::MultiFraming,
        Self::ArrowsTree,
        Self::Removing,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Self::Arrow => "arrow",
            Self::Pen => "pen",
            Self::Marker => "marker",
            Self::Line => "line",
            Self::Oval => "oval",
            Self::Rect => "rect",
            Self::Numbering => "numbering",
            Self::Text => "text",
            Self::Blurring => "blurring",
            Self::Darkening => "darkening",
            Self::Picture => "picture",
            Self::BackgroundPicture => "background_picture",
            Self::ZoomInRegion => "zoom_in_region",
            Self::CopyPaste => "copypaste",
            Self::MultiFraming => "multiframing",
            Self::ArrowsTree => "arrowstree",
            Self::Removing => "removing",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }

    pub fn is_picture(self) -> bool {
        matches!(self, Self::Picture | Self::BackgroundPicture)
    }

    pub fn is_paired(self) -> bool {
        matches!(self, Self::ZoomInRegion | Self::CopyPaste)
    }

    /// Elements whose shape is defined by the two local anchor points as a box.
    pub fn is_rectangular(self) -> bool {
        matches!(
            self,
            Self::Oval
                | Self::Rect
                | Self::Numbering
                | Self::Blurring
                | Self::Darkening
                | Self::ZoomInRegion
                | Self::CopyPaste
                | Self::MultiFraming
        )
    }
}

/// Per-gesture snapshot used to cancel a transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformInit {
    pub position: Point,
    pub rotation: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

#[derive(Clone, Debug)]
pub struct Element {
    pub kind: ElementKind,
    pub unique_index: ElementIndex,
    pub pass2_unique_index: ElementIndex,

    pub position: Point,
    pub rotation: f64,
    pub prerotation: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub width: f64,
    pub height: f64,
    pub start_point: Point,
    pub end_point: Point,
    pub local_start_point: Point,
    pub local_end_point: Point,

    pub color: Rgba,
    pub secondary_color: Rgba,
    pub size: f64,
    pub opacity: f64,
    pub toolbool: bool,
    pub straight: bool,
    pub filled: bool,
    pub equilateral: bool,

    pub pixmap: Option<SharedPixmap>,
    pub proxy_pixmap: Option<SharedPixmap>,
    pub path: Option<BezPath>,
    pub plain_text: String,
    pub text_doc: Option<TextDocument>,
    pub selection_path: Option<BezPath>,

    pub group_id: Option<ElementIndex>,
    pub second: bool,
    pub source_indexes: Vec<ElementIndex>,
    pub allowed_indexes: Vec<ElementIndex>,
    pub pass_through_filter_only_if_allowed: bool,
    pub tree_parent: Option<ElementIndex>,
    pub tree_root: bool,

    pub background_image: bool,
    pub finished: bool,
    pub preview: bool,
    pub selected: bool,
    pub modification_stamp: Option<u64>,
    pub init: Option<TransformInit>,
}

impl Element {
    pub fn new(kind: ElementKind) -> Self {
        let unique_index = allocate_unique_index();
        Self {
            kind,
            unique_index,
            pass2_unique_index: unique_index,
            position: Point::ZERO,
            rotation: 0.0,
            prerotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            width: 0.0,
            height: 0.0,
            start_point: Point::ZERO,
            end_point: Point::ZERO,
            local_start_point: Point::ZERO,
            local_end_point: Point::ZERO,
            color: Rgba::RED,
            secondary_color: Rgba::TRANSPARENT,
            size: 0.2,
            opacity: 1.0,
            toolbool: false,
            straight: false,
            filled: false,
            equilateral: false,
            pixmap: None,
            proxy_pixmap: None,
            path: None,
            plain_text: String::new(),
            text_doc: None,
            selection_path: None,
            group_id: None,
            second: false,
            source_indexes: Vec::new(),
            allowed_indexes: Vec::new(),
            pass_through_filter_only_if_allowed: false,
            tree_parent: None,
            tree_root: false,
            background_image: false,
            finished: false,
            preview: false,
            selected: false,
            modification_stamp: None,
            init: None,
        }
    }

    /// Copy-on-write clone: a fresh index that replaces `self`.
    pub fn derive_version(&self, stamp: u64) -> Self {
        let mut copy = self.clone();
        copy.unique_index = allocate_unique_index();
        copy.source_indexes = vec![self.unique_index];
        copy.modification_stamp = Some(stamp);
        copy
    }

    pub fn is_linear(&self) -> bool {
        match self.kind {
            ElementKind::Arrow | ElementKind::Line => true,
            ElementKind::Pen | ElementKind::Marker => self.straight,
            _ => false,
        }
    }

    pub fn is_freehand(&self) -> bool {
        matches!(self.kind, ElementKind::Pen | ElementKind::Marker) && !self.straight
    }

    pub fn is_pair_first(&self) -> bool {
        self.kind.is_paired() && !self.second
    }

    pub fn is_pair_second(&self) -> bool {
        self.kind.is_paired() && self.second
    }

    pub fn is_content(&self) -> bool {
        !self.background_image && self.kind != ElementKind::BackgroundPicture
    }

    /// Stroke width in canvas units, driven by `size` and never by scale.
    pub fn pen_width(&self) -> f64 {
        match self.kind {
            ElementKind::Marker => (80.0 * self.size).max(1.0),
            ElementKind::MultiFraming => (40.0 * self.size).max(2.0),
            _ => (25.0 * self.size).max(1.0),
        }
    }

    /// Width of the band around a freehand stroke that still counts as a hit.
    fn freehand_hit_width(&self) -> f64 {
        self.pen_width() + 8.0
    }

    fn linear_thickness(&self) -> f64 {
        match self.kind {
            ElementKind::Arrow => {
                let len = self.local_start_point.distance(self.local_end_point);
                arrow::head_width(len, self.size).max(self.pen_width())
            }
            _ => self.pen_width().max(6.0),
        }
    }

    pub fn font_size(&self) -> f64 {
        20.0 + 10.0 * self.size
    }

    pub fn get_size_rect(&self, scaled: bool) -> Rect {
        if scaled {
            Rect::new(0.0, 0.0, self.width * self.scale_x, self.height * self.scale_y)
        } else {
            Rect::new(0.0, 0.0, self.width, self.height)
        }
    }

    /// `localScale · rotation · globalScale · translation`, any factor can be dropped.
    pub fn get_transform(
        &self,
        viewport: &Viewport,
        apply_local_scale: bool,
        apply_translation: bool,
        apply_global_scale: bool,
    ) -> Affine {
        let mut t = Affine::rotate(self.rotation.to_radians());
        if apply_local_scale {
            t = t * Affine::scale_non_uniform(self.scale_x, self.scale_y);
        }
        if apply_global_scale {
            t = viewport.global_scale() * t;
        }
        if apply_translation {
            let target = if apply_global_scale {
                viewport.map_to_viewport(self.position)
            } else {
                self.position
            };
            t = Affine::translate(target.to_vec2()) * t;
        }
        t
    }

    pub fn get_selection_area(
        &self,
        viewport: &Viewport,
        center_at_origin: bool,
        apply_global_scale: bool,
        apply_translation: bool,
    ) -> [Point; 4] {
        let mut rect = self.get_size_rect(false);
        if center_at_origin {
            rect = rect - rect.center().to_vec2();
        }
        let t = self.get_transform(viewport, true, apply_translation, apply_global_scale);
        geometry::rect_corners(rect).map(|p| t * p)
    }

    /// Oriented rect in canvas space.
    pub fn canvas_polygon(&self) -> [Point; 4] {
        self.get_selection_area(&Viewport::default(), true, false, true)
    }

    pub fn viewport_polygon(&self, viewport: &Viewport) -> [Point; 4] {
        self.get_selection_area(viewport, true, true, true)
    }

    pub fn canvas_aabb(&self) -> Rect {
        geometry::aabb_of_points(&self.canvas_polygon()).unwrap_or(Rect::ZERO)
    }

    pub fn canvas_area(&self) -> f64 {
        (self.width * self.scale_x * self.height * self.scale_y).abs()
    }

    /// Maps a viewport position into the element's unscaled local frame.
    pub fn map_to_local(&self, viewport: &Viewport, pos: Point) -> Point {
        self.get_transform(viewport, true, true, true).inverse() * pos
    }

    pub fn map_local_to_canvas(&self, local: Point) -> Point {
        self.get_transform(&Viewport::default(), true, true, false) * local
    }

    pub fn is_selection_contains_pos(&self, viewport: &Viewport, pos: Point) -> bool {
        if let Some(path) = &self.selection_path {
            let t = self.get_transform(viewport, true, true, true);
            if t.determinant().abs() < geometry::EPSILON {
                return false;
            }
            return path.contains(t.inverse() * pos);
        }
        geometry::point_in_polygon(pos, &self.viewport_polygon(viewport))
    }

    pub fn selection_intersects_rect(&self, viewport: &Viewport, rect: Rect) -> bool {
        if let Some(path) = &self.selection_path {
            let t = self.get_transform(viewport, true, true, true);
            return geometry::path_intersects_rect(&(t * path.clone()), rect);
        }
        geometry::polygon_intersects_rect(&self.viewport_polygon(viewport), rect)
    }

    pub fn canvas_start_point(&self) -> Point {
        self.map_local_to_canvas(self.local_start_point)
    }

    pub fn canvas_end_point(&self) -> Point {
        self.map_local_to_canvas(self.local_end_point)
    }

    /// Normalises a two-point linear element into its local frame.
    pub fn finalize_linear(&mut self) {
        let (start, end) = (self.start_point, self.end_point);
        let d = end - start;
        let len = d.hypot();
        self.position = start.midpoint(end);
        self.rotation = geometry::angle_degrees(d);
        self.prerotation = self.rotation;
        self.scale_x = 1.0;
        self.scale_y = 1.0;
        self.local_start_point = Point::new(-len / 2.0, 0.0);
        self.local_end_point = Point::new(len / 2.0, 0.0);
        self.width = len;
        self.height = self.linear_thickness();
        self.rebuild_selection_path();
    }

    /// Normalises a box element (rect, oval, blur, ...) into its local frame.
    pub fn finalize_rectangular(&mut self) {
        let rect = geometry::rect_from_points(self.start_point, self.end_point);
        let center = rect.center();
        self.position = center;
        self.rotation = 0.0;
        self.prerotation = 0.0;
        self.scale_x = 1.0;
        self.scale_y = 1.0;
        self.width = rect.width();
        self.height = rect.height();
        self.local_start_point = self.start_point - center.to_vec2();
        self.local_end_point = self.end_point - center.to_vec2();
        self.selection_path = None;
    }

    /// Re-centres a freehand canvas-space path into the local frame.
    pub fn finalize_freehand(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        let bbox = path.bounding_box();
        let center = bbox.center();
        let local = Affine::translate(-center.to_vec2()) * path;
        // the box must enclose the fat selection stroke
        let pad = self.freehand_hit_width();
        self.position = center;
        self.rotation = 0.0;
        self.prerotation = 0.0;
        self.scale_x = 1.0;
        self.scale_y = 1.0;
        self.width = bbox.width() + pad;
        self.height = bbox.height() + pad;
        self.path = Some(local);
        self.rebuild_selection_path();
    }

    pub fn rebuild_selection_path(&mut self) {
        self.selection_path = match self.kind {
            ElementKind::Arrow => Some(arrow::arrow_path(
                self.local_start_point,
                self.local_end_point,
                self.size,
                !self.toolbool,
            )),
            ElementKind::Pen | ElementKind::Marker if !self.straight => {
                self.path.as_ref().map(|path| {
                    let style = kurbo::Stroke::new(self.freehand_hit_width())
                        .with_caps(kurbo::Cap::Round)
                        .with_join(kurbo::Join::Round);
                    kurbo::stroke(
                        path.elements().iter().copied(),
                        &style,
                        &kurbo::StrokeOpts::default(),
                        0.25,
                    )
                })
            }
            _ => None,
        };
    }

    /// Bakes `scale_x/y` into the local geometry and resets them to one.
    ///
    /// Linear and box elements take their pen width from `size`, so scaling them
    /// must move the anchors instead of stretching the stroke.
    pub fn fix_size_distortion(&mut self) -> Option<(f64, f64)> {
        if self.kind == ElementKind::Text || !(self.is_linear() || self.kind.is_rectangular()) {
            return None;
        }
        let scales = (self.scale_x, self.scale_y);
        let s = Vec2::new(self.scale_x, self.scale_y);
        let bake = |p: Point| Point::new(p.x * s.x, p.y * s.y);
        self.local_start_point = bake(self.local_start_point);
        self.local_end_point = bake(self.local_end_point);
        self.scale_x = 1.0;
        self.scale_y = 1.0;
        if self.is_linear() {
            self.width = self.local_start_point.distance(self.local_end_point);
            self.height = self.linear_thickness();
            self.rebuild_selection_path();
        } else {
            self.width = (self.width * s.x).abs();
            self.height = (self.height * s.y).abs();
        }
        Some(scales)
    }

    /// Undoes [`Self::fix_size_distortion`].
    pub fn restore_size_distortion(&mut self, scales: (f64, f64)) {
        let (sx, sy) = scales;
        if sx.abs() < geometry::EPSILON || sy.abs() < geometry::EPSILON {
            return;
        }
        let unbake = |p: Point| Point::new(p.x / sx, p.y / sy);
        self.local_start_point = unbake(self.local_start_point);
        self.local_end_point = unbake(self.local_end_point);
        self.scale_x = sx;
        self.scale_y = sy;
        if self.is_linear() {
            self.width = self.local_start_point.distance(self.local_end_point);
            self.height = self.linear_thickness();
            self.rebuild_selection_path();
        } else {
            self.width = (self.width / sx).abs();
            self.height = (self.height / sy).abs();
        }
    }

    pub fn store_init(&mut self) {
        self.init = Some(TransformInit {
            position: self.position,
            rotation: self.rotation,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
        });
    }

    pub fn restore_init(&mut self) {
        if let Some(init) = self.init {
            self.position = init.position;
            self.rotation = init.rotation;
            self.scale_x = init.scale_x;
            self.scale_y = init.scale_y;
        }
    }

    /// Keeps `width/height` in step with the laid-out text document.
    pub fn sync_text_size(&mut self) {
        if let Some(doc) = &self.text_doc {
            let (w, h) = doc.layout_size(self.font_size());
            self.width = w;
            self.height = h;
            self.plain_text = doc.text().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_element(start: Point, end: Point) -> Element {
        let mut e = Element::new(ElementKind::Rect);
        e.start_point = start;
        e.end_point = end;
        e.finalize_rectangular();
        e
    }

    #[test]
    fn indices_are_unique_and_increasing() {
        let a = Element::new(ElementKind::Pen);
        let b = Element::new(ElementKind::Pen);
        assert!(b.unique_index > a.unique_index);
        assert_eq!(a.pass2_unique_index, a.unique_index);
        let c = a.derive_version(7);
        assert_ne!(c.unique_index, a.unique_index);
        assert_eq!(c.source_indexes, vec![a.unique_index]);
        assert_eq!(c.pass2_unique_index, a.pass2_unique_index);
    }

    #[test]
    fn kind_tags_round_trip() {
        for kind in ElementKind::ALL {
            assert_eq!(ElementKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ElementKind::from_tag("nonsense"), None);
    }

    #[test]
    fn rect_finalizes_around_center() {
        let e = rect_element(Point::new(10.0, 10.0), Point::new(100.0, 80.0));
        assert_eq!(e.position, Point::new(55.0, 45.0));
        assert_eq!((e.width, e.height), (90.0, 70.0));
        let poly = e.canvas_polygon();
        assert!(poly[0].distance(Point::new(10.0, 10.0)) < 1e-9);
        assert!(poly[2].distance(Point::new(100.0, 80.0)) < 1e-9);
    }

    #[test]
    fn hit_test_respects_transform() {
        let mut e = rect_element(Point::new(0.0, 0.0), Point::new(100.0, 20.0));
        e.rotation = 90.0;
        let mut vp = Viewport::default();
        vp.origin = Vec2::new(30.0, 40.0);
        vp.scale_x = 2.0;
        vp.scale_y = 2.0;
        let center = vp.map_to_viewport(e.position);
        assert!(e.is_selection_contains_pos(&vp, center));
        // Rotated by 90°, the long axis is vertical in viewport space.
        assert!(e.is_selection_contains_pos(&vp, center + Vec2::new(0.0, 90.0)));
        assert!(!e.is_selection_contains_pos(&vp, center + Vec2::new(90.0, 0.0)));
    }

    #[test]
    fn linear_finalize_records_prerotation() {
        let mut e = Element::new(ElementKind::Line);
        e.start_point = Point::new(0.0, 0.0);
        e.end_point = Point::new(0.0, 50.0);
        e.finalize_linear();
        assert!((e.rotation - 90.0).abs() < 1e-9);
        assert_eq!(e.prerotation, e.rotation);
        assert!(e.canvas_start_point().distance(Point::new(0.0, 0.0)) < 1e-9);
        assert!(e.canvas_end_point().distance(Point::new(0.0, 50.0)) < 1e-9);
    }

    #[test]
    fn distortion_fixer_is_reversible() {
        let mut e = rect_element(Point::new(0.0, 0.0), Point::new(40.0, 20.0));
        e.scale_x = 2.0;
        e.scale_y = 0.5;
        let before = e.canvas_polygon();
        let scales = e.fix_size_distortion().unwrap();
        assert_eq!((e.scale_x, e.scale_y), (1.0, 1.0));
        let baked = e.canvas_polygon();
        for (a, b) in before.iter().zip(baked.iter()) {
            assert!(a.distance(*b) < 1e-9);
        }
        e.restore_size_distortion(scales);
        assert_eq!((e.scale_x, e.scale_y), (2.0, 0.5));
        assert!((e.width - 40.0).abs() < 1e-9);
    }

    #[test]
    fn freehand_path_gets_fat_selection_shape() {
        let mut e = Element::new(ElementKind::Pen);
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((100.0, 0.0));
        e.path = Some(path);
        e.finalize_freehand();
        let vp = Viewport::default();
        assert!(e.selection_path.is_some());
        assert!(e.is_selection_contains_pos(&vp, Point::new(50.0, 1.0)));
        assert!(!e.is_selection_contains_pos(&vp, Point::new(50.0, 30.0)));
    }

    #[test]
    fn freehand_hit_band_stays_inside_its_box() {
        let mut e = Element::new(ElementKind::Pen);
        e.size = 0.2;
        let mut path = BezPath::new();
        path.move_to((100.0, 100.0));
        path.line_to((150.0, 100.0));
        path.line_to((200.0, 100.0));
        e.path = Some(path);
        e.finalize_freehand();
        let vp = Viewport::default();
        let band = e.pen_width() + 8.0;
        assert!((e.height - band).abs() < 1e-9);
        let poly = e.viewport_polygon(&vp);
        let near = Point::new(150.0, 106.0);
        assert!(geometry::point_in_polygon(near, &poly));
        assert!(e.is_selection_contains_pos(&vp, near));
        for dy in [band / 2.0 + 2.0, -(band / 2.0 + 2.0)] {
            assert!(!e.is_selection_contains_pos(&vp, Point::new(150.0, 100.0 + dy)));
        }
    }

    fn finalized_shapes() -> Vec<Element> {
        let mut shapes = Vec::new();
        for kind in ElementKind::ALL {
            let mut e = Element::new(kind);
            e.size = 0.3;
            match kind {
                ElementKind::Arrow | ElementKind::Line => {
                    e.start_point = Point::new(20.0, 30.0);
                    e.end_point = Point::new(140.0, 90.0);
                    e.finalize_linear();
                }
                ElementKind::Pen | ElementKind::Marker => {
                    let mut straight = Element::new(kind);
                    straight.straight = true;
                    straight.start_point = Point::new(20.0, 30.0);
                    straight.end_point = Point::new(140.0, 90.0);
                    straight.finalize_linear();
                    shapes.push(straight);

                    let mut path = BezPath::new();
                    path.move_to((20.0, 20.0));
                    path.line_to((80.0, 70.0));
                    path.line_to((140.0, 25.0));
                    e.path = Some(path);
                    e.finalize_freehand();
                }
                ElementKind::Text => {
                    e.text_doc = Some(TextDocument::new("hello\nworld"));
                    e.position = Point::new(80.0, 60.0);
                    e.sync_text_size();
                }
                ElementKind::Picture | ElementKind::BackgroundPicture | ElementKind::ArrowsTree => {
                    e.position = Point::new(80.0, 60.0);
                    e.width = 90.0;
                    e.height = 50.0;
                }
                ElementKind::Removing => {}
                _ => {
                    e.start_point = Point::new(30.0, 20.0);
                    e.end_point = Point::new(150.0, 100.0);
                    e.finalize_rectangular();
                }
            }
            shapes.push(e);
        }
        for e in &mut shapes {
            e.rotation += 30.0;
            e.scale_x = 1.5;
            e.scale_y = 0.75;
        }
        shapes
    }

    /// Points that lie on what the element draws.
    fn interior_samples(e: &Element, vp: &Viewport) -> Vec<Point> {
        let t = e.get_transform(vp, true, true, true);
        match (&e.selection_path, &e.path) {
            (Some(_), Some(path)) if e.is_freehand() => {
                let pts: Vec<Point> = path.elements().iter().filter_map(|el| el.end_point()).collect();
                pts.windows(2).map(|w| t * w[0].midpoint(w[1])).collect()
            }
            (Some(_), _) => (1..=9)
                .map(|i| t * e.local_start_point.lerp(e.local_end_point, i as f64 / 10.0))
                .collect(),
            (None, _) if e.canvas_area() < 1e-9 => Vec::new(),
            (None, _) => {
                let p = e.viewport_polygon(vp);
                let mut out = Vec::new();
                for i in 1..10 {
                    for j in 1..10 {
                        let (u, v) = (i as f64 / 10.0, j as f64 / 10.0);
                        out.push(p[0].lerp(p[1], u).lerp(p[3].lerp(p[2], u), v));
                    }
                }
                out
            }
        }
    }

    /// Points pushed 2.5px outward from every edge of the viewport polygon.
    fn exterior_samples(e: &Element, vp: &Viewport) -> Vec<Point> {
        let p = e.viewport_polygon(vp);
        let center = geometry::polygon_center(&p);
        let mut out = Vec::new();
        for i in 0..4 {
            let (a, b) = (p[i], p[(i + 1) % 4]);
            let d = b - a;
            if d.hypot() < 1e-6 {
                continue;
            }
            let mut n = Vec2::new(-d.y, d.x) / d.hypot();
            if n.dot(a.midpoint(b) - center) < 0.0 {
                n = -n;
            }
            for k in [0.0, 0.25, 0.5, 0.75, 1.0] {
                out.push(a.lerp(b, k) + n * 2.5);
            }
        }
        if e.canvas_area() < 1e-9 {
            out.extend([Vec2::new(2.5, 0.0), Vec2::new(0.0, 2.5), Vec2::new(-2.5, -2.5)].map(|d| center + d));
        }
        out
    }

    #[test]
    fn hit_test_matches_polygon_for_every_kind() {
        let mut vp = Viewport::default();
        vp.origin = Vec2::new(40.0, -25.0);
        vp.scale_x = 2.0;
        vp.scale_y = 1.5;
        for e in finalized_shapes() {
            let poly = e.viewport_polygon(&vp);
            for p in interior_samples(&e, &vp) {
                assert!(geometry::point_in_polygon(p, &poly), "{:?} sample {p:?} off its polygon", e.kind);
                assert!(e.is_selection_contains_pos(&vp, p), "{:?} misses {p:?}", e.kind);
            }
            for p in exterior_samples(&e, &vp) {
                assert!(!e.is_selection_contains_pos(&vp, p), "{:?} hit outside at {p:?}", e.kind);
            }
        }
    }
}
