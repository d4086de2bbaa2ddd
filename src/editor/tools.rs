//! Press/move/release pipelines for the drawing tools.

use kurbo::{BezPath, Point, Shape, Vec2};

use super::{Editor, Gesture, Modifiers, Tool};
use crate::geometry::{self, EPSILON};
use crate::model::{Element, ElementIndex, ElementKind, Rgba};
use crate::text_document::TextDocument;

/// Companion arrows shorter than this are dropped when the text is placed.
pub const TEXT_ARROW_MIN_LENGTH: f64 = 100.0;
const TEXT_ARROW_SIZE: f64 = 0.5;

pub fn numbering_diameter(size: f64) -> f64 {
    24.0 + 40.0 * size
}

pub fn tree_node_diameter(size: f64) -> f64 {
    12.0 + 30.0 * size
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct DrawGesture {
    pub tool: Tool,
    pub index: ElementIndex,
    /// Text: the arrow that points at the press position.
    pub companion: Option<ElementIndex>,
    pub press: Point,
    pub pair_second: bool,
}

impl Editor {
    fn styled_element(&self, kind: ElementKind, tool: Tool) -> Element {
        let style = self.style(tool);
        let mut e = Element::new(kind);
        e.color = style.color;
        e.secondary_color = style.secondary_color;
        e.size = style.size;
        e.opacity = style.opacity;
        e.toolbool = style.toolbool;
        e.preview = true;
        e
    }

    /// The first half of a zoom/copy-paste pair still waiting for its second press.
    pub(crate) fn pending_pair_first(&self, kind: ElementKind) -> Option<ElementIndex> {
        if self.history.is_modifying() || self.history.cursor() != self.history.slots().len() {
            return None;
        }
        let slot = self.history.slots().last()?;
        let first = slot
            .elements
            .iter()
            .find(|e| e.kind == kind && e.is_pair_first() && e.finished)?;
        let paired = slot
            .elements
            .iter()
            .any(|e| e.second && e.group_id == Some(first.unique_index));
        (!paired).then_some(first.unique_index)
    }

    fn last_line_end(&self) -> Option<Point> {
        self.visible_elements()
            .into_iter()
            .filter(|e| e.kind == ElementKind::Line)
            .max_by_key(|e| e.unique_index)
            .map(|e| e.canvas_end_point())
    }

    fn nearest_tree_node(&self, pos: Point) -> Option<&Element> {
        self.visible_elements()
            .into_iter()
            .filter(|e| e.kind == ElementKind::ArrowsTree)
            .min_by(|a, b| a.position.distance(pos).total_cmp(&b.position.distance(pos)))
    }

    pub(crate) fn tool_press(&mut self, pos: Point, mods: Modifiers) {
        let canvas = self.viewport.map_to_canvas(pos);
        let tool = self.tool;
        let Some(kind) = tool.element_kind() else {
            return;
        };

        if kind.is_paired() {
            if let Some(first) = self.pending_pair_first(kind) {
                self.press_pair_second(tool, first, canvas);
                return;
            }
        }
        if kind == ElementKind::Picture && self.magazine.is_empty() {
            log::debug!("picture tool without a picture in the magazine");
            return;
        }

        if !self.history.start_modification(if kind == ElementKind::Text {
            "text with arrow"
        } else {
            kind.tag()
        }) {
            return;
        }

        let mut companion = None;
        let mut e = self.styled_element(kind, tool);
        e.start_point = canvas;
        e.end_point = canvas;
        e.position = canvas;
        match kind {
            ElementKind::Pen | ElementKind::Marker => {
                if mods.shift {
                    e.straight = true;
                    e.finalize_linear();
                } else {
                    let mut path = BezPath::new();
                    path.move_to(canvas);
                    e.path = Some(path);
                }
            }
            ElementKind::Line => {
                if mods.ctrl {
                    if let Some(end) = self.last_line_end() {
                        e.start_point = end;
                    }
                }
                e.finalize_linear();
            }
            ElementKind::Arrow => e.finalize_linear(),
            ElementKind::Text => {
                e.text_doc = Some(TextDocument::new(""));
                e.group_id = Some(e.unique_index);
                e.sync_text_size();
                let mut arrow = Element::new(ElementKind::Arrow);
                arrow.color = Rgba::RED;
                arrow.size = TEXT_ARROW_SIZE;
                arrow.start_point = canvas;
                arrow.end_point = canvas;
                arrow.group_id = e.group_id;
                arrow.preview = true;
                arrow.finalize_linear();
                companion = Some(arrow);
            }
            ElementKind::Picture => {
                if let Some(pixmap) = self.magazine.front() {
                    e.width = pixmap.width() as f64;
                    e.height = pixmap.height() as f64;
                    e.pixmap = Some(pixmap.clone());
                }
                e.rotation = self.picture_rotation;
            }
            ElementKind::ArrowsTree => {
                let d = tree_node_diameter(e.size);
                e.width = d;
                e.height = d;
                match self.nearest_tree_node(canvas) {
                    Some(parent) if !mods.ctrl => e.tree_parent = Some(parent.pass2_unique_index),
                    _ => e.tree_root = true,
                }
            }
            _ => {
                e.filled = mods.ctrl;
                e.equilateral = mods.shift;
                if kind.is_paired() {
                    e.group_id = Some(e.unique_index);
                }
                e.finalize_rectangular();
            }
        }

        let Some(index) = self.history.add_element(e) else {
            return;
        };
        let companion = companion.and_then(|arrow| self.history.add_element(arrow));
        self.gesture = Gesture::Drawing(DrawGesture {
            tool,
            index,
            companion,
            press: canvas,
            pair_second: false,
        });
    }

    fn press_pair_second(&mut self, tool: Tool, first: ElementIndex, canvas: Point) {
        let Some(first_e) = self.element(first) else {
            return;
        };
        let factor = if first_e.kind == ElementKind::ZoomInRegion { 2.0 } else { 1.0 };
        let mut second = self.styled_element(first_e.kind, tool);
        second.toolbool = first_e.toolbool;
        second.color = first_e.color;
        second.size = first_e.size;
        second.width = first_e.width * first_e.scale_x.abs() * factor;
        second.height = first_e.height * first_e.scale_y.abs() * factor;
        second.local_start_point = Point::new(-second.width / 2.0, -second.height / 2.0);
        second.local_end_point = Point::new(second.width / 2.0, second.height / 2.0);
        second.position = canvas;
        second.second = true;
        second.group_id = Some(first);
        if !self.history.reopen_last_slot() {
            return;
        }
        let Some(index) = self.history.add_element(second) else {
            self.history.stop_modification();
            return;
        };
        self.gesture = Gesture::Drawing(DrawGesture {
            tool,
            index,
            companion: None,
            press: canvas,
            pair_second: true,
        });
    }

    pub(crate) fn tool_move(&mut self, pos: Point, mods: Modifiers) {
        let Gesture::Drawing(draw) = self.gesture else {
            return;
        };
        let canvas = self.viewport.map_to_canvas(pos);
        self.update_drawn(draw, canvas, mods);
    }

    fn update_drawn(&mut self, draw: DrawGesture, canvas: Point, mods: Modifiers) {
        let picture_rotation = self.picture_rotation;
        let parent_position = self.element(draw.index).and_then(|e| e.tree_parent).and_then(|p| {
            self.visible_elements()
                .into_iter()
                .find(|n| n.kind == ElementKind::ArrowsTree && n.pass2_unique_index == p)
                .map(|n| n.position)
        });
        let Some(e) = self.history.element_mut(draw.index) else {
            return;
        };
        if draw.pair_second {
            e.position = canvas;
            return;
        }
        match e.kind {
            ElementKind::Pen | ElementKind::Marker if e.straight => {
                e.end_point = canvas;
                e.finalize_linear();
            }
            ElementKind::Pen | ElementKind::Marker => {
                if let Some(path) = e.path.as_mut() {
                    let last = path.elements().last().and_then(|el| el.end_point());
                    if last.is_none_or(|p| p.distance(canvas) > EPSILON) {
                        path.line_to(canvas);
                    }
                }
            }
            ElementKind::Line | ElementKind::Arrow => {
                e.end_point = if mods.shift {
                    geometry::snap_to_45(e.start_point, canvas)
                } else {
                    canvas
                };
                e.finalize_linear();
            }
            ElementKind::Text => {
                e.position = canvas;
                if let Some(arrow) = draw.companion.and_then(|i| self.history.element_mut(i)) {
                    arrow.start_point = canvas;
                    arrow.finalize_linear();
                }
            }
            ElementKind::Picture => {
                e.position = canvas;
                e.rotation = picture_rotation;
            }
            ElementKind::ArrowsTree => {
                e.position = canvas;
                if let Some(parent) = parent_position {
                    if parent.distance(canvas) > EPSILON {
                        e.rotation = geometry::angle_degrees(canvas - parent);
                    }
                }
            }
            _ => {
                e.end_point = if e.equilateral {
                    geometry::constrain_equilateral(e.start_point, canvas)
                } else {
                    canvas
                };
                e.finished = false;
                e.finalize_rectangular();
            }
        }
    }

    pub(crate) fn tool_release(&mut self, draw: DrawGesture, pos: Point, mods: Modifiers) {
        let canvas = self.viewport.map_to_canvas(pos);
        self.update_drawn(draw, canvas, mods);
        let keep = self.finish_drawn(draw);
        if !keep {
            log::debug!("discarding degenerate {}", draw.tool.tag());
            self.history.discard_from_open_slot(draw.index);
            if let Some(arrow) = draw.companion {
                self.history.discard_from_open_slot(arrow);
            }
        }
        self.history.stop_modification();
        if keep && draw.tool == Tool::Text {
            self.editing_text = Some(draw.index);
        }
    }

    /// Finalises the drawn element; `false` means it should be discarded.
    fn finish_drawn(&mut self, draw: DrawGesture) -> bool {
        if draw.pair_second {
            if let Some(e) = self.history.element_mut(draw.index) {
                e.preview = false;
                e.finished = true;
            }
            return true;
        }
        let Some(kind) = self.element(draw.index).map(|e| e.kind) else {
            return false;
        };
        if kind == ElementKind::Text {
            self.finish_text_arrow(draw);
        }
        if kind == ElementKind::Picture && self.magazine.len() > 1 {
            self.magazine.pop_front();
        }
        let Some(e) = self.history.element_mut(draw.index) else {
            return false;
        };
        e.preview = false;
        match kind {
            ElementKind::Pen | ElementKind::Marker if !e.straight => {
                let degenerate = e.path.as_ref().is_none_or(|p| {
                    let bbox = p.bounding_box();
                    bbox.width() < EPSILON && bbox.height() < EPSILON
                });
                if degenerate {
                    return false;
                }
                e.finalize_freehand();
            }
            ElementKind::Pen | ElementKind::Marker | ElementKind::Line | ElementKind::Arrow => {
                if e.start_point.distance(e.end_point) < EPSILON {
                    return false;
                }
                e.finalize_linear();
            }
            ElementKind::Text | ElementKind::Picture | ElementKind::ArrowsTree => {}
            _ => {
                let extent = e.end_point - e.start_point;
                if extent.x.abs() < 1.0 || extent.y.abs() < 1.0 {
                    if kind != ElementKind::Numbering {
                        return false;
                    }
                    let r = numbering_diameter(e.size) / 2.0;
                    e.start_point = draw.press - Vec2::new(r, r);
                    e.end_point = draw.press + Vec2::new(r, r);
                }
                e.finalize_rectangular();
                e.finished = matches!(
                    kind,
                    ElementKind::Blurring | ElementKind::ZoomInRegion | ElementKind::CopyPaste
                );
            }
        }
        true
    }

    fn finish_text_arrow(&mut self, draw: DrawGesture) {
        let Some(arrow_index) = draw.companion else {
            return;
        };
        let polygon = self.element(draw.index).map(|t| t.canvas_polygon());
        let Some(arrow) = self.history.element_mut(arrow_index) else {
            return;
        };
        if arrow.start_point.distance(arrow.end_point) < TEXT_ARROW_MIN_LENGTH {
            self.history.discard_from_open_slot(arrow_index);
            return;
        }
        if let Some(start) = polygon.and_then(|p| geometry::nearest_point_on_polygon(arrow.start_point, &p)) {
            arrow.start_point = start;
        }
        arrow.preview = false;
        arrow.finalize_linear();
    }
}
