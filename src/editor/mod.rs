use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

use crate::config::EditorConfig;
use crate::history::History;
use crate::model::{Element, ElementIndex, ElementKind, Rgba, SharedPixmap};

pub mod actions;
pub mod capture;
pub mod derived;
pub mod overlay;
pub mod selection;
pub mod text_edit;
pub mod tools;
pub mod transform;
pub mod viewport;

pub use viewport::Viewport;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
    };
    pub const SHIFT: Self = Self {
        shift: true,
        ctrl: false,
        alt: false,
    };
    pub const CTRL: Self = Self {
        shift: false,
        ctrl: true,
        alt: false,
    };
    pub const ALT: Self = Self {
        shift: false,
        ctrl: false,
        alt: true,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    Space,
    Delete,
    Backspace,
    Escape,
    Enter,
    Tab,
    F1,
    F5,
    F6,
    Char(char),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Transform,
    Pen,
    Marker,
    Line,
    Arrow,
    Text,
    Rect,
    Oval,
    Numbering,
    Blurring,
    Darkening,
    Picture,
    ZoomInRegion,
    CopyPaste,
    MultiFraming,
    ArrowsTree,
}

impl Tool {
    pub const ALL: [Tool; 16] = [
        Self::Transform,
        Self::Pen,
        Self::Marker,
        Self::Line,
        Self::Arrow,
        Self::Text,
        Self::Rect,
        Self::Oval,
        Self::Numbering,
        Self::Blurring,
        Self::Darkening,
        Self::Picture,
        Self::ZoomInRegion,
        Self::CopyPaste,
        Self::MultiFraming,
        Self::ArrowsTree,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Self::Transform => "transform",
            other => other.element_kind().map(ElementKind::tag).unwrap_or("transform"),
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    pub fn element_kind(self) -> Option<ElementKind> {
        Some(match self {
            Self::Transform => return None,
            Self::Pen => ElementKind::Pen,
            Self::Marker => ElementKind::Marker,
            Self::Line => ElementKind::Line,
            Self::Arrow => ElementKind::Arrow,
            Self::Text => ElementKind::Text,
            Self::Rect => ElementKind::Rect,
            Self::Oval => ElementKind::Oval,
            Self::Numbering => ElementKind::Numbering,
            Self::Blurring => ElementKind::Blurring,
            Self::Darkening => ElementKind::Darkening,
            Self::Picture => ElementKind::Picture,
            Self::ZoomInRegion => ElementKind::ZoomInRegion,
            Self::CopyPaste => ElementKind::CopyPaste,
            Self::MultiFraming => ElementKind::MultiFraming,
            Self::ArrowsTree => ElementKind::ArrowsTree,
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Transform => "Transform",
            Self::Pen => "Pen",
            Self::Marker => "Marker",
            Self::Line => "Line",
            Self::Arrow => "Arrow",
            Self::Text => "Text",
            Self::Rect => "Rect",
            Self::Oval => "Oval",
            Self::Numbering => "Numbering",
            Self::Blurring => "Blur",
            Self::Darkening => "Darkening",
            Self::Picture => "Picture",
            Self::ZoomInRegion => "Zoom region",
            Self::CopyPaste => "Copy-paste",
            Self::MultiFraming => "Multiframing",
            Self::ArrowsTree => "Arrows tree",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UncaptureMode {
    #[default]
    FullTransparent,
    HalfTransparent,
    Opaque,
}

impl UncaptureMode {
    pub fn next(self) -> Self {
        match self {
            Self::FullTransparent => Self::HalfTransparent,
            Self::HalfTransparent => Self::Opaque,
            Self::Opaque => Self::FullTransparent,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            Self::FullTransparent => Self::Opaque,
            Self::HalfTransparent => Self::FullTransparent,
            Self::Opaque => Self::HalfTransparent,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionFilter {
    #[default]
    All,
    ContentOnly,
    BackgroundOnly,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CursorShape {
    Arrow,
    #[default]
    Crosshair,
    Move,
    SizeHorizontal,
    SizeVertical,
    SizeFDiagonal,
    SizeBDiagonal,
    Rotate,
    Text,
    Grab,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToolStyle {
    pub color: Rgba,
    pub secondary_color: Rgba,
    pub size: f64,
    pub opacity: f64,
    pub toolbool: bool,
}

impl Default for ToolStyle {
    fn default() -> Self {
        Self {
            color: Rgba::RED,
            secondary_color: Rgba::TRANSPARENT,
            size: 0.2,
            opacity: 1.0,
            toolbool: false,
        }
    }
}

/// Which colour an inline text button edits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorTarget {
    Text,
    Plate,
}

/// Work the engine hands back to the window shell.
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    OpenQuitDialog,
    Commit,
    CopyText(String),
    PasteImage,
    PickColor(ColorTarget),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Magnifier {
    pub enabled: bool,
    /// Odd cell count per side.
    pub cells: u32,
}

impl Default for Magnifier {
    fn default() -> Self {
        Self {
            enabled: false,
            cells: 15,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) enum Gesture {
    #[default]
    Idle,
    Drawing(tools::DrawGesture),
    Transform(transform::TransformGesture),
    Marquee {
        start: Point,
        current: Point,
        additive: bool,
        previous: Vec<ElementIndex>,
    },
    Capture(capture::CaptureDrag),
    TextDrag(text_edit::TextDrag),
    Panning {
        last: Point,
    },
}

pub struct Editor {
    pub config: EditorConfig,
    pub history: History,
    pub viewport: Viewport,
    pub viewport_size: Vec2,
    pub capture: capture::CaptureRegion,
    pub tool: Tool,
    pub styles: HashMap<Tool, ToolStyle>,
    pub uncapture_mode: UncaptureMode,
    pub selection_filter: SelectionFilter,
    pub masked: bool,
    pub hex_mask: bool,
    pub dark_pictures: bool,
    pub show_background: bool,
    pub preview_mode: bool,
    pub show_help: bool,
    pub draw_datetime_stamp: bool,
    pub save_to_memory_mode: bool,
    pub close_editor_on_done: bool,
    pub metadata: (String, String),
    pub magazine: VecDeque<SharedPixmap>,
    pub picture_rotation: f64,
    pub magnifier: Magnifier,
    pub editing_text: Option<ElementIndex>,
    pub in_memory: Vec<SharedPixmap>,
    pub(crate) gesture: Gesture,
    pub(crate) cursor: Point,
    pub(crate) modifiers: Modifiers,
    pub(crate) derived: derived::DerivedCache,
    pub(crate) caret_visible: bool,
    pub(crate) requests: Vec<Request>,
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        let tool = Tool::from_tag(&config.default_tool).unwrap_or(Tool::Arrow);
        Self {
            history: History::new(),
            viewport: Viewport::default(),
            viewport_size: Vec2::new(1280.0, 800.0),
            capture: capture::CaptureRegion::default(),
            tool,
            styles: HashMap::new(),
            uncapture_mode: UncaptureMode::default(),
            selection_filter: SelectionFilter::default(),
            masked: false,
            hex_mask: false,
            dark_pictures: config.dark_pictures,
            show_background: config.show_background,
            preview_mode: false,
            show_help: false,
            draw_datetime_stamp: config.draw_datetime_stamp,
            save_to_memory_mode: config.save_to_memory_mode,
            close_editor_on_done: config.close_editor_on_done,
            metadata: (String::new(), String::new()),
            magazine: VecDeque::new(),
            picture_rotation: 0.0,
            magnifier: Magnifier::default(),
            editing_text: None,
            in_memory: Vec::new(),
            gesture: Gesture::Idle,
            cursor: Point::ZERO,
            modifiers: Modifiers::NONE,
            derived: derived::DerivedCache::default(),
            caret_visible: true,
            requests: Vec::new(),
            config,
        }
    }

    /// Editor over a captured bitmap. With `define_capture` the whole bitmap
    /// becomes the capture rect; otherwise the user drags one out.
    pub fn with_background(config: EditorConfig, pixmap: tiny_skia::Pixmap, define_capture: bool) -> Self {
        let mut editor = Self::new(config);
        let bounds = Rect::new(0.0, 0.0, pixmap.width() as f64, pixmap.height() as f64);
        let pixmap = Arc::new(pixmap);
        editor.history.start_modification("background_picture");
        editor.history.add_element(Self::background_element(pixmap, bounds));
        editor.history.stop_modification();
        if define_capture {
            editor.capture.rect = Some(bounds);
        }
        editor
    }

    pub(crate) fn background_element(pixmap: SharedPixmap, bounds: Rect) -> Element {
        let mut bg = Element::new(ElementKind::BackgroundPicture);
        bg.background_image = true;
        bg.position = bounds.center();
        bg.width = bounds.width();
        bg.height = bounds.height();
        bg.pixmap = Some(pixmap);
        bg
    }

    pub fn style(&self, tool: Tool) -> ToolStyle {
        self.styles.get(&tool).copied().unwrap_or_else(|| match tool {
            Tool::Marker => ToolStyle {
                color: Rgba::rgb(255, 230, 0),
                ..ToolStyle::default()
            },
            Tool::Darkening => ToolStyle {
                size: 0.5,
                ..ToolStyle::default()
            },
            _ => ToolStyle::default(),
        })
    }

    pub fn style_mut(&mut self, tool: Tool) -> &mut ToolStyle {
        let current = self.style(tool);
        self.styles.entry(tool).or_insert(current)
    }

    pub fn set_tool(&mut self, tool: Tool) {
        if self.tool == tool {
            return;
        }
        self.finish_text_editing();
        self.tool = tool;
        log::debug!("tool: {}", tool.tag());
    }

    pub fn visible_elements(&self) -> Vec<&Element> {
        self.history.visible_elements()
    }

    pub fn element(&self, index: ElementIndex) -> Option<&Element> {
        self.history.element(index)
    }

    pub fn element_mut(&mut self, index: ElementIndex) -> Option<&mut Element> {
        self.history.element_mut(index)
    }

    pub fn canvas_cursor(&self) -> Point {
        self.viewport.map_to_canvas(self.cursor)
    }

    pub fn viewport_rect(&self) -> Rect {
        Rect::from_origin_size(Point::ZERO, self.viewport_size.to_size())
    }

    /// The visible background element, if the editor has one.
    pub fn background(&self) -> Option<&Element> {
        self.visible_elements()
            .into_iter()
            .rev()
            .find(|e| e.kind == ElementKind::BackgroundPicture)
    }

    pub fn source_pixels(&self) -> Option<SharedPixmap> {
        self.background().and_then(|e| e.pixmap.clone())
    }

    /// Drains work queued for the shell by mouse input.
    pub fn take_requests(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.requests)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.gesture, Gesture::Idle)
    }

    pub fn tick(&mut self, seconds: f64) {
        self.caret_visible = ((seconds * 1000.0 / 600.0) as u64) % 2 == 0;
    }

    pub fn mouse_press(&mut self, pos: Point, button: MouseButton, mods: Modifiers) {
        self.cursor = pos;
        self.modifiers = mods;
        match button {
            MouseButton::Middle => {
                self.gesture = Gesture::Panning { last: pos };
                return;
            }
            MouseButton::Right => return,
            MouseButton::Left => {}
        }
        if !self.is_idle() || self.preview_mode {
            return;
        }
        if self.editing_text.is_some() {
            if self.text_press(pos, mods) {
                return;
            }
            self.finish_text_editing();
        }
        if self.capture.rect.is_none() {
            self.capture_press(pos);
            return;
        }
        if self.tool == Tool::Transform {
            if self.transform_press(pos, mods) {
                return;
            }
            if self.capture_region_at(pos) != capture::Region::Inside && self.capture_press(pos) {
                return;
            }
            self.marquee_press(pos, mods);
            return;
        }
        if self.capture.widget_enabled
            && self.capture_region_at(pos) != capture::Region::Inside
            && self.capture_press(pos)
        {
            return;
        }
        self.tool_press(pos, mods);
    }

    pub fn mouse_move(&mut self, pos: Point, mods: Modifiers) {
        self.cursor = pos;
        self.modifiers = mods;
        if let Gesture::Panning { last } = &mut self.gesture {
            let delta = pos - std::mem::replace(last, pos);
            self.viewport.pan(delta);
            self.reseed_gesture();
            return;
        }
        if let Gesture::Marquee { current, .. } = &mut self.gesture {
            *current = pos;
            return;
        }
        match self.gesture {
            Gesture::Drawing(_) => self.tool_move(pos, mods),
            Gesture::Transform(_) => self.transform_move(pos, mods),
            Gesture::Capture(_) => self.capture_move(pos),
            _ => {}
        }
    }

    pub fn mouse_release(&mut self, pos: Point, button: MouseButton, mods: Modifiers) {
        self.cursor = pos;
        self.modifiers = mods;
        match std::mem::take(&mut self.gesture) {
            Gesture::Idle => {}
            Gesture::Panning { .. } => {}
            Gesture::Drawing(draw) if button == MouseButton::Left => self.tool_release(draw, pos, mods),
            Gesture::Transform(t) if button == MouseButton::Left => self.transform_release(t),
            Gesture::Marquee {
                start,
                additive,
                previous,
                ..
            } => self.marquee_release(start, pos, additive, previous),
            Gesture::Capture(drag) => self.capture_release(drag),
            Gesture::TextDrag(drag) => self.text_drop(drag, pos, mods),
            other => self.gesture = other,
        }
    }

    /// Mouse wheel in notches; positive is away from the user.
    pub fn wheel(&mut self, pos: Point, notches: f64, mods: Modifiers) {
        self.cursor = pos;
        if notches == 0.0 {
            return;
        }
        if self.tool == Tool::Picture && mods.ctrl {
            let step = if mods.shift { 10.0 } else { 1.0 };
            self.picture_rotation += step * notches.signum();
            return;
        }
        if mods.ctrl && self.magnifier_visible() {
            let cells = self.magnifier.cells as i64 + 2 * notches.signum() as i64;
            self.magnifier.cells = cells.clamp(5, 41) as u32;
            return;
        }
        let factor = if notches > 0.0 {
            viewport::ZOOM_IN_FACTOR
        } else {
            viewport::ZOOM_OUT_FACTOR
        };
        let axes = if mods.ctrl {
            viewport::ZoomAxes::XOnly
        } else if mods.shift {
            viewport::ZoomAxes::YOnly
        } else {
            viewport::ZoomAxes::Both
        };
        self.viewport.zoom_about(pos, factor, axes);
        self.reseed_gesture();
    }

    /// Keyboard zoom around the viewport centre.
    pub fn zoom_step(&mut self, zoom_in: bool) {
        let factor = if zoom_in {
            viewport::ZOOM_IN_FACTOR
        } else {
            viewport::ZOOM_OUT_FACTOR
        };
        let center = self.viewport_rect().center();
        self.viewport.zoom_about(center, factor, viewport::ZoomAxes::Both);
        self.reseed_gesture();
    }

    pub fn text_input(&mut self, text: &str) {
        if self.editing_text.is_some() {
            self.text_insert(text);
        }
    }

    pub fn magnifier_visible(&self) -> bool {
        self.magnifier.enabled || self.capture.rect.is_none()
    }

    pub fn cursor_shape(&self) -> CursorShape {
        match &self.gesture {
            Gesture::Panning { .. } => return CursorShape::Grab,
            Gesture::Transform(t) => return t.cursor_shape(),
            Gesture::Capture(drag) => return drag.region.cursor_shape(),
            _ => {}
        }
        if self.capture.rect.is_none() {
            return CursorShape::Crosshair;
        }
        if self.editing_text.is_some() && self.text_hit(self.cursor).is_some() {
            return CursorShape::Text;
        }
        if self.tool == Tool::Transform {
            if let Some(shape) = self.transform_hover_shape(self.cursor) {
                return shape;
            }
        }
        let region = self.capture_region_at(self.cursor);
        if self.capture.widget_enabled && region != capture::Region::Inside {
            return region.cursor_shape();
        }
        CursorShape::Crosshair
    }

    /// Replaces the working selection after a gesture copied elements.
    pub(crate) fn select_only(&mut self, indexes: &[ElementIndex]) {
        self.deselect_all();
        for index in indexes {
            if let Some(e) = self.history.element_mut(*index) {
                e.selected = true;
            }
        }
    }

    pub fn deselect_all(&mut self) {
        for e in self.history.all_elements_mut() {
            e.selected = false;
        }
    }

    pub fn selected_indexes(&self) -> Vec<ElementIndex> {
        self.visible_elements()
            .into_iter()
            .filter(|e| e.selected && self.passes_filter(e))
            .map(|e| e.unique_index)
            .collect()
    }

    pub fn notify_history_moved(&mut self) {
        self.cancel_gesture();
        self.deselect_all();
        self.editing_text = None;
        self.derived.invalidate_all();
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn background_is_created_in_its_own_slot() {
        let editor = blank_editor(200, 100);
        assert_eq!(editor.history.slots().len(), 1);
        let bg = editor.background().unwrap();
        assert_eq!(bg.position, Point::new(100.0, 50.0));
        assert!(bg.background_image);
        assert_eq!(editor.capture.rect, Some(Rect::new(0.0, 0.0, 200.0, 100.0)));
    }

    #[test]
    fn tool_tags_round_trip() {
        for tool in Tool::ALL {
            assert_eq!(Tool::from_tag(tool.tag()), Some(tool));
        }
    }

    #[test]
    fn wheel_zoom_axes_follow_modifiers() {
        let mut editor = blank_editor(200, 100);
        editor.wheel(Point::new(50.0, 50.0), 1.0, Modifiers::CTRL);
        assert!(editor.viewport.scale_x > 1.0);
        assert_eq!(editor.viewport.scale_y, 1.0);
        editor.wheel(Point::new(50.0, 50.0), -1.0, Modifiers::SHIFT);
        assert!(editor.viewport.scale_y < 1.0);
    }

    #[test]
    fn picture_wheel_rotates_stamp() {
        let mut editor = blank_editor(200, 100);
        editor.set_tool(Tool::Picture);
        editor.wheel(Point::ZERO, 1.0, Modifiers::CTRL);
        editor.wheel(Point::ZERO, 1.0, Modifiers { shift: true, ctrl: true, alt: false });
        assert_eq!(editor.picture_rotation, 11.0);
        assert_eq!(editor.viewport, Viewport::default());
    }

    #[test]
    fn uncapture_mode_cycles_both_ways() {
        let mode = UncaptureMode::FullTransparent;
        assert_eq!(mode.next().next().next(), mode);
        assert_eq!(mode.previous(), UncaptureMode::Opaque);
    }
}
