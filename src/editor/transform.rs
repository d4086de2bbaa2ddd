//! Transform widget: translate, rotate and scale the selection.
//!
//! A press only records what was grabbed. The first real movement opens an
//! "arranging" slot and takes working copies of the selected elements; every
//! later move recomputes their geometry from the `init` snapshots taken then.
//! Releasing without movement therefore leaves no history entry, and Esc drops
//! the slot so the originals come back untouched.

use kurbo::{Point, Vec2};

use super::{CursorShape, Editor, Gesture, Modifiers};
use crate::geometry::{self, EPSILON};
use crate::model::{ElementIndex, ElementKind, TransformInit};

pub(crate) const HANDLE_RADIUS: f64 = 8.0;
const HALO_RADIUS: f64 = 26.0;
const MIN_SCALE_FACTOR: f64 = 0.01;

/// Grab points on the selection polygon: corners and edge midpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handle {
    Corner(usize),
    Edge(usize),
}

impl Handle {
    pub const ALL: [Handle; 8] = [
        Handle::Corner(0),
        Handle::Edge(0),
        Handle::Corner(1),
        Handle::Edge(1),
        Handle::Corner(2),
        Handle::Edge(2),
        Handle::Corner(3),
        Handle::Edge(3),
    ];

    pub fn point(self, poly: &[Point; 4]) -> Point {
        match self {
            Self::Corner(i) => poly[i % 4],
            Self::Edge(i) => poly[i % 4].midpoint(poly[(i + 1) % 4]),
        }
    }

    /// The fixed point when scaling from this handle.
    pub fn opposite(self, poly: &[Point; 4]) -> Point {
        match self {
            Self::Corner(i) => poly[(i + 2) % 4],
            Self::Edge(i) => Self::Edge(i + 2).point(poly),
        }
    }

    pub fn cursor_shape(self) -> CursorShape {
        match self {
            Self::Corner(0 | 2) => CursorShape::SizeFDiagonal,
            Self::Corner(_) => CursorShape::SizeBDiagonal,
            Self::Edge(0 | 2) => CursorShape::SizeVertical,
            Self::Edge(_) => CursorShape::SizeHorizontal,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformMode {
    Translating,
    Rotating { corner: usize },
    Scaling(Handle),
}

#[derive(Debug)]
pub(crate) struct TransformGesture {
    pub mode: TransformMode,
    pub start_cursor: Point,
    pub polygon: [Point; 4],
    pub originals: Vec<ElementIndex>,
    pub working: Vec<ElementIndex>,
}

impl TransformGesture {
    pub fn cursor_shape(&self) -> CursorShape {
        match self.mode {
            TransformMode::Translating => CursorShape::Move,
            TransformMode::Rotating { .. } => CursorShape::Rotate,
            TransformMode::Scaling(handle) => handle.cursor_shape(),
        }
    }
}

fn clamp_factor(f: f64) -> f64 {
    if f.abs() < MIN_SCALE_FACTOR {
        MIN_SCALE_FACTOR.copysign(if f == 0.0 { 1.0 } else { f })
    } else {
        f
    }
}

fn axis_or(v: Vec2, fallback: Vec2) -> Vec2 {
    let len = v.hypot();
    if len < EPSILON { fallback } else { v / len }
}

/// Snaps an absolute rotation to 45° steps relative to `prerotation`.
pub fn snap_rotation(rotation: f64, prerotation: f64) -> f64 {
    let r = rotation - prerotation;
    (r / 45.0 - 0.5).floor() * 45.0 + 45.0 + prerotation
}

/// Scale factors along the polygon's width/height axes for a handle drag.
pub fn scale_factors(
    polygon: &[Point; 4],
    handle: Handle,
    pivot: Point,
    cursor_delta: Vec2,
    proportional: bool,
) -> (f64, f64) {
    let grab = handle.point(polygon);
    let v0 = grab - pivot;
    let v = v0 + cursor_delta;
    let ux = axis_or(polygon[1] - polygon[0], Vec2::new(1.0, 0.0));
    let uy = axis_or(polygon[3] - polygon[0], Vec2::new(0.0, 1.0));
    let Some((a0, b0)) = geometry::decompose(v0, ux, uy) else {
        return (1.0, 1.0);
    };
    if proportional {
        // diagonal of the selection box, pointing the way the handle faces
        let width = polygon[0].distance(polygon[1]);
        let height = polygon[0].distance(polygon[3]);
        let aspect = if width < EPSILON { 1.0 } else { height / width };
        let sign = |c: f64| if c < 0.0 { -1.0 } else { 1.0 };
        let diagonal = ux * sign(a0) + uy * (sign(b0) * aspect);
        let reach = v0.dot(diagonal);
        if reach.abs() < EPSILON {
            return (1.0, 1.0);
        }
        let k = clamp_factor(v.dot(diagonal) / reach);
        return (k, k);
    }
    let (a, b) = geometry::decompose(v, ux, uy).unwrap_or((a0, b0));
    let fx = if a0.abs() < EPSILON { 1.0 } else { clamp_factor(a / a0) };
    let fy = if b0.abs() < EPSILON { 1.0 } else { clamp_factor(b / b0) };
    (fx, fy)
}

impl Editor {
    fn selection_polygon_viewport(&self) -> Option<([Point; 4], [Point; 4])> {
        let poly = self.selection_polygon()?;
        Some((poly, poly.map(|p| self.viewport.map_to_viewport(p))))
    }

    fn widget_mode_at(&self, pos: Point) -> Option<TransformMode> {
        let (_, vp) = self.selection_polygon_viewport()?;
        for handle in Handle::ALL {
            if handle.point(&vp).distance(pos) <= HANDLE_RADIUS {
                return Some(TransformMode::Scaling(handle));
            }
        }
        let inside = geometry::point_in_polygon(pos, &vp);
        if !inside {
            for corner in 0..4 {
                if vp[corner].distance(pos) <= HALO_RADIUS {
                    return Some(TransformMode::Rotating { corner });
                }
            }
            return None;
        }
        Some(TransformMode::Translating)
    }

    pub(crate) fn transform_hover_shape(&self, pos: Point) -> Option<CursorShape> {
        match self.widget_mode_at(pos) {
            Some(TransformMode::Translating) => Some(CursorShape::Move),
            Some(TransformMode::Rotating { .. }) => Some(CursorShape::Rotate),
            Some(TransformMode::Scaling(h)) => Some(h.cursor_shape()),
            None => self.pick_element(pos, false).map(|_| CursorShape::Move),
        }
    }

    /// Returns `false` when the press hit neither the widget nor an element.
    pub(crate) fn transform_press(&mut self, pos: Point, mods: Modifiers) -> bool {
        let mode = match self.widget_mode_at(pos) {
            Some(mode) if !(mode == TransformMode::Translating && (mods.shift || mods.ctrl)) => mode,
            _ => {
                let Some(index) = self.pick_element(pos, mods.ctrl) else {
                    return false;
                };
                let already = self.element(index).is_some_and(|e| e.selected);
                if mods.shift {
                    if let Some(e) = self.element_mut(index) {
                        e.selected = !already;
                    }
                } else if !already || mods.ctrl {
                    self.select_only(&[index]);
                }
                TransformMode::Translating
            }
        };
        let Some(polygon) = self.selection_polygon() else {
            return true;
        };
        let originals: Vec<ElementIndex> = self
            .selected_indexes()
            .into_iter()
            .filter(|i| self.element(*i).is_some_and(|e| e.kind != ElementKind::BackgroundPicture))
            .collect();
        self.gesture = Gesture::Transform(TransformGesture {
            mode,
            start_cursor: self.viewport.map_to_canvas(pos),
            polygon,
            originals,
            working: Vec::new(),
        });
        true
    }

    fn take_working_copies(&mut self, originals: &[ElementIndex]) -> Vec<ElementIndex> {
        if !self.history.start_modification("arranging") {
            return Vec::new();
        }
        let mut working = Vec::with_capacity(originals.len());
        for index in originals {
            if let Some(copy) = self.history.prepare_element_for_modification(*index) {
                if let Some(e) = self.history.element_mut(copy) {
                    e.store_init();
                    e.selected = true;
                }
                working.push(copy);
            }
        }
        working
    }

    pub(crate) fn transform_move(&mut self, pos: Point, mods: Modifiers) {
        let cursor = self.viewport.map_to_canvas(pos);
        let Gesture::Transform(t) = &self.gesture else {
            return;
        };
        if t.working.is_empty() {
            if t.originals.is_empty() || cursor.distance(t.start_cursor) < EPSILON {
                return;
            }
            let originals = t.originals.clone();
            let working = self.take_working_copies(&originals);
            if let Gesture::Transform(t) = &mut self.gesture {
                t.working = working;
            }
        }
        let Gesture::Transform(t) = &self.gesture else {
            return;
        };
        let (mode, start, polygon, working) = (t.mode, t.start_cursor, t.polygon, t.working.clone());
        match mode {
            TransformMode::Translating => self.apply_translation(&working, cursor - start),
            TransformMode::Rotating { corner } => {
                let pivot = if mods.alt {
                    polygon[(corner + 2) % 4]
                } else {
                    geometry::polygon_center(&polygon)
                };
                let mut delta = geometry::angle_degrees(cursor - pivot) - geometry::angle_degrees(start - pivot);
                let snap_single = mods.ctrl && working.len() == 1;
                if mods.ctrl && working.len() > 1 {
                    delta = (delta / 45.0).round() * 45.0;
                }
                self.apply_rotation(&working, pivot, delta, snap_single);
            }
            TransformMode::Scaling(handle) => {
                let pivot = if mods.alt {
                    geometry::polygon_center(&polygon)
                } else {
                    handle.opposite(&polygon)
                };
                let circle_pair = working
                    .iter()
                    .filter_map(|i| self.element(*i))
                    .any(|e| e.kind == ElementKind::ZoomInRegion && e.toolbool);
                let proportional = mods.shift || working.len() > 1 || circle_pair;
                let (fx, fy) = scale_factors(&polygon, handle, pivot, cursor - start, proportional);
                self.apply_scale(&working, &polygon, pivot, fx, fy);
            }
        }
    }

    fn apply_translation(&mut self, working: &[ElementIndex], delta: Vec2) {
        for index in working {
            if let Some(e) = self.history.element_mut(*index) {
                if let Some(init) = e.init {
                    e.position = init.position + delta;
                }
            }
        }
    }

    fn apply_rotation(&mut self, working: &[ElementIndex], pivot: Point, delta: f64, snap_single: bool) {
        for index in working {
            let Some(e) = self.history.element_mut(*index) else {
                continue;
            };
            let Some(init) = e.init else {
                continue;
            };
            let rotation = if snap_single {
                snap_rotation(init.rotation + delta, e.prerotation)
            } else {
                init.rotation + delta
            };
            e.rotation = rotation;
            e.position = geometry::rotate_point_around(init.position, pivot, rotation - init.rotation);
        }
    }

    fn apply_scale(&mut self, working: &[ElementIndex], polygon: &[Point; 4], pivot: Point, fx: f64, fy: f64) {
        let ux = axis_or(polygon[1] - polygon[0], Vec2::new(1.0, 0.0));
        let uy = axis_or(polygon[3] - polygon[0], Vec2::new(0.0, 1.0));
        for index in working {
            let Some(e) = self.history.element_mut(*index) else {
                continue;
            };
            let Some(TransformInit {
                position,
                scale_x,
                scale_y,
                ..
            }) = e.init
            else {
                continue;
            };
            let rel = position - pivot;
            let (s, t) = geometry::decompose(rel, ux, uy).unwrap_or((rel.x, rel.y));
            e.position = pivot + ux * (s * fx) + uy * (t * fy);
            e.scale_x = scale_x * fx;
            e.scale_y = scale_y * fy;
        }
    }

    pub(crate) fn transform_release(&mut self, t: TransformGesture) {
        if t.working.is_empty() {
            return;
        }
        let scaled = matches!(t.mode, TransformMode::Scaling(_));
        let mut touched_background = false;
        for index in &t.working {
            if let Some(e) = self.history.element_mut(*index) {
                e.init = None;
                touched_background |= e.background_image;
                // linear and box elements keep their pen: the scale moves into the anchors
                if scaled {
                    e.fix_size_distortion();
                }
            }
        }
        self.history.stop_modification();
        if touched_background {
            self.derived.invalidate_all();
        }
    }

    /// Esc: restore snapshots, drop the gesture's slot and reselect the originals.
    pub(crate) fn transform_cancel(&mut self, t: TransformGesture) {
        if t.working.is_empty() {
            return;
        }
        for index in &t.working {
            if let Some(e) = self.history.element_mut(*index) {
                e.restore_init();
                e.init = None;
            }
        }
        self.history.cancel_modification();
        self.select_only(&t.originals);
    }

    /// Re-seeds an active transform after the viewport changed so the
    /// selection keeps following the cursor.
    pub(crate) fn reseed_gesture(&mut self) {
        let cursor = self.canvas_cursor();
        let polygon = self.selection_polygon();
        let Gesture::Transform(t) = &mut self.gesture else {
            return;
        };
        t.start_cursor = cursor;
        if let Some(polygon) = polygon {
            t.polygon = polygon;
        }
        let working = t.working.clone();
        for index in working {
            if let Some(e) = self.history.element_mut(index) {
                e.store_init();
            }
        }
    }

    /// Rotates the selection as one stamped operation.
    pub fn rotate_selected(&mut self, degrees: f64, pivot: Option<Point>) {
        let Some(polygon) = self.selection_polygon() else {
            return;
        };
        let pivot = pivot.unwrap_or_else(|| geometry::polygon_center(&polygon));
        let originals: Vec<ElementIndex> = self
            .selected_indexes()
            .into_iter()
            .filter(|i| self.element(*i).is_some_and(|e| e.kind != ElementKind::BackgroundPicture))
            .collect();
        let working = self.take_working_copies(&originals);
        if working.is_empty() {
            self.history.stop_modification();
            return;
        }
        self.apply_rotation(&working, pivot, degrees, false);
        self.settle_working(&working);
    }

    /// Arrow-key nudge of the selection in canvas units. Returns `false` when
    /// nothing movable is selected.
    pub fn move_selected(&mut self, delta: Vec2) -> bool {
        let originals: Vec<ElementIndex> = self
            .selected_indexes()
            .into_iter()
            .filter(|i| self.element(*i).is_some_and(|e| e.kind != ElementKind::BackgroundPicture))
            .collect();
        if originals.is_empty() {
            return false;
        }
        let working = self.take_working_copies(&originals);
        if working.is_empty() {
            self.history.stop_modification();
            return false;
        }
        self.apply_translation(&working, delta);
        self.settle_working(&working);
        true
    }

    fn settle_working(&mut self, working: &[ElementIndex]) {
        for index in working {
            if let Some(e) = self.history.element_mut(*index) {
                e.init = None;
            }
        }
        self.history.stop_modification();
    }
}
