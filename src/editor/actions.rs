//! Keyboard surface and the whole-document operations behind it.

use std::sync::Arc;

use kurbo::{Affine, Point, Rect, Vec2};
use tiny_skia::Pixmap;

use super::{Editor, Gesture, Key, Modifiers, Request, Tool, capture};
use crate::error::Result;
use crate::geometry;
use crate::model::{Element, ElementIndex, ElementKind, Rgba};
use crate::render::{self, Scene, raster};

const FIT_MARGIN: f64 = 20.0;

impl Editor {
    /// Handles one key press and returns whatever the shell has to do next.
    pub fn key_press(&mut self, key: Key, mods: Modifiers) -> Vec<Request> {
        self.modifiers = mods;
        if !self.text_key(key, mods) {
            self.global_key(key, mods);
        }
        self.take_requests()
    }

    fn global_key(&mut self, key: Key, mods: Modifiers) {
        match key {
            Key::Escape => {
                if self.is_idle() {
                    self.requests.push(Request::OpenQuitDialog);
                } else {
                    self.cancel_gesture();
                }
            }
            Key::Left | Key::Right | Key::Up | Key::Down => self.nudge(key, mods),
            Key::Space => self.set_tool(Tool::Transform),
            Key::Delete => {
                self.delete_selection();
            }
            Key::Tab => {
                self.uncapture_mode = if mods.shift {
                    self.uncapture_mode.previous()
                } else {
                    self.uncapture_mode.next()
                };
            }
            Key::F1 => self.show_help = !self.show_help,
            Key::F5 => self.rotate_selected_texts(-10.0),
            Key::F6 => self.rotate_selected_texts(10.0),
            Key::Enter => self.requests.push(Request::Commit),
            Key::Char('z') if mods.ctrl && mods.shift => {
                self.history_forwards();
            }
            Key::Char('z') if mods.ctrl => {
                self.history_backwards();
            }
            Key::Char('a') if mods.ctrl => self.toggle_select_all(),
            Key::Char('c') if mods.ctrl => {
                if let Some(color) = self.color_under_cursor() {
                    self.requests.push(Request::CopyText(color.to_hex()));
                }
            }
            Key::Char('v') if mods.ctrl => self.requests.push(Request::PasteImage),
            Key::Char('f') if mods.ctrl => self.fit_capture(),
            Key::Char('f') => self.fit_selection(),
            Key::Char('h') => self.hex_mask = !self.hex_mask,
            Key::Char('p') => {
                self.preview_mode = !self.preview_mode;
                if self.preview_mode {
                    self.cancel_gesture();
                }
            }
            _ => {}
        }
    }

    fn nudge(&mut self, key: Key, mods: Modifiers) {
        let mut step = if mods.shift { 10.0 } else { 1.0 };
        if mods.ctrl {
            step *= 5.0;
        }
        let delta = match key {
            Key::Left => Vec2::new(-step, 0.0),
            Key::Right => Vec2::new(step, 0.0),
            Key::Up => Vec2::new(0.0, -step),
            _ => Vec2::new(0.0, step),
        };
        if !self.is_idle() {
            return;
        }
        if !self.move_selected(delta) {
            self.move_capture_rect(delta);
        }
    }

    fn rotate_selected_texts(&mut self, degrees: f64) {
        let texts: Vec<ElementIndex> = self
            .selected_indexes()
            .into_iter()
            .filter(|i| self.element(*i).is_some_and(|e| e.kind == ElementKind::Text))
            .collect();
        if texts.is_empty() {
            return;
        }
        self.select_only(&texts);
        self.rotate_selected(degrees, None);
    }

    /// Aborts whatever the mouse is doing without leaving a trace in history.
    pub(crate) fn cancel_gesture(&mut self) {
        match std::mem::take(&mut self.gesture) {
            Gesture::Transform(t) => self.transform_cancel(t),
            Gesture::Drawing(draw) if draw.pair_second => {
                self.history.discard_from_open_slot(draw.index);
                self.history.stop_modification();
            }
            Gesture::Drawing(_) => self.history.cancel_modification(),
            Gesture::Capture(drag) => self.capture.rect = drag.start_rect,
            Gesture::Marquee { previous, .. } => self.select_only(&previous),
            Gesture::Idle | Gesture::TextDrag(_) | Gesture::Panning { .. } => {}
        }
    }

    pub fn history_backwards(&mut self) -> bool {
        if !self.is_idle() {
            return false;
        }
        self.finish_text_editing();
        let moved = self.history.backwards();
        if moved {
            self.notify_history_moved();
        }
        moved
    }

    pub fn history_forwards(&mut self) -> bool {
        if !self.is_idle() {
            return false;
        }
        self.finish_text_editing();
        let moved = self.history.forwards();
        if moved {
            self.notify_history_moved();
        }
        moved
    }

    /// Hides the selection behind a `removing` element. Zoom and copy-paste
    /// pairs go as a whole.
    pub fn delete_selection(&mut self) -> bool {
        if !self.is_idle() {
            return false;
        }
        self.finish_text_editing();
        let mut doomed = self.selected_indexes();
        let groups: Vec<ElementIndex> = doomed
            .iter()
            .filter_map(|i| self.element(*i))
            .filter(|e| e.kind.is_paired())
            .filter_map(|e| e.group_id)
            .collect();
        for e in self.visible_elements() {
            if e.group_id.is_some_and(|g| groups.contains(&g)) && !doomed.contains(&e.unique_index) {
                doomed.push(e.unique_index);
            }
        }
        if doomed.is_empty() || !self.history.start_modification("removing") {
            return false;
        }
        let mut removing = Element::new(ElementKind::Removing);
        removing.source_indexes = doomed;
        self.history.add_element(removing);
        self.history.stop_modification();
        self.deselect_all();
        true
    }

    /// Places a pasted picture centred on the cursor.
    pub fn paste_image(&mut self, pixmap: Pixmap) -> Option<ElementIndex> {
        if !self.is_idle() {
            return None;
        }
        self.finish_text_editing();
        let mut picture = Element::new(ElementKind::Picture);
        picture.width = pixmap.width() as f64;
        picture.height = pixmap.height() as f64;
        picture.position = self.canvas_cursor();
        picture.pixmap = Some(Arc::new(pixmap));
        picture.finished = true;
        if !self.history.start_modification("picture") {
            return None;
        }
        let index = self.history.add_element(picture);
        self.history.stop_modification();
        index
    }

    /// Puts a freshly shot `pixmap` under the existing annotations.
    pub fn reshoot(&mut self, pixmap: Pixmap) -> bool {
        let bounds = match self.background() {
            Some(bg) => Rect::from_center_size(bg.position, (pixmap.width() as f64, pixmap.height() as f64)),
            None => Rect::new(0.0, 0.0, pixmap.width() as f64, pixmap.height() as f64),
        };
        let replaced: Vec<ElementIndex> = self
            .visible_elements()
            .into_iter()
            .filter(|e| e.kind == ElementKind::BackgroundPicture)
            .map(|e| e.unique_index)
            .collect();
        let done = self.replace_background("reshoot", Arc::new(pixmap), bounds, replaced);
        if done {
            log::info!("reshoot: background replaced");
        }
        done
    }

    /// Flattens every visible element into a new background.
    pub fn content_to_background(&mut self) -> Result<bool> {
        let Some(bounds) = self.background().map(Element::canvas_aabb) else {
            return Ok(false);
        };
        let mut pixmap = raster::new_pixmap(bounds.width().ceil() as u32, bounds.height().ceil() as u32)?;
        let scene = Scene {
            elements: self.visible_elements(),
            capture: None,
            uncapture_mode: self.uncapture_mode,
            show_background: true,
            dark_pictures: self.dark_pictures,
            mask: None,
            antialias: self.config.antialiasing_and_smooth_pixmaps,
            date_stamp: None,
            checkerboard: false,
            final_output: true,
        };
        render::compose(&mut pixmap, &scene, Affine::translate(-bounds.origin().to_vec2()));
        let replaced: Vec<ElementIndex> = self
            .visible_elements()
            .into_iter()
            .filter(|e| e.kind != ElementKind::Removing)
            .map(|e| e.unique_index)
            .collect();
        Ok(self.replace_background("content to background", Arc::new(pixmap), bounds, replaced))
    }

    fn replace_background(
        &mut self,
        content_type: &str,
        pixmap: crate::model::SharedPixmap,
        bounds: Rect,
        replaced: Vec<ElementIndex>,
    ) -> bool {
        if !self.is_idle() {
            return false;
        }
        self.finish_text_editing();
        if !self.history.start_modification(content_type) {
            return false;
        }
        let mut bg = Self::background_element(pixmap, bounds);
        bg.pass_through_filter_only_if_allowed = true;
        let mut removing = Element::new(ElementKind::Removing);
        removing.source_indexes = replaced;
        removing.allowed_indexes = vec![bg.pass2_unique_index];
        self.history.add_element(bg);
        self.history.add_element(removing);
        self.history.stop_modification();
        self.deselect_all();
        self.derived.invalidate_all();
        true
    }

    /// Cuts the background into `rows × cols` movable pictures.
    pub fn slice_background(&mut self, rows: u32, cols: u32) -> Result<bool> {
        if rows == 0 || cols == 0 || (rows == 1 && cols == 1) || !self.is_idle() {
            return Ok(false);
        }
        let Some(bg) = self.background() else {
            return Ok(false);
        };
        let Some(source) = bg.pixmap.clone() else {
            return Ok(false);
        };
        let bg_index = bg.unique_index;
        let frame = render::picture_affine(bg, &source);
        let (w, h) = (source.width(), source.height());

        let mut tiles = Vec::with_capacity((rows * cols) as usize);
        for row in 0..rows {
            for col in 0..cols {
                let (x0, x1) = (col * w / cols, (col + 1) * w / cols);
                let (y0, y1) = (row * h / rows, (row + 1) * h / rows);
                if x1 <= x0 || y1 <= y0 {
                    continue;
                }
                let mut tile = raster::new_pixmap(x1 - x0, y1 - y0)?;
                raster::draw_pixmap(
                    &mut tile,
                    &source,
                    Affine::translate((-(x0 as f64), -(y0 as f64))),
                    1.0,
                    false,
                );
                let cell = Rect::new(x0 as f64, y0 as f64, x1 as f64, y1 as f64);
                let corners = geometry::rect_corners(cell).map(|p| frame * p);
                let mut piece = Element::new(ElementKind::Picture);
                piece.position = geometry::polygon_center(&corners);
                piece.width = corners[0].distance(corners[1]);
                piece.height = corners[0].distance(corners[3]);
                piece.rotation = geometry::angle_degrees(corners[1] - corners[0]);
                piece.pixmap = Some(Arc::new(tile));
                piece.finished = true;
                piece.pass_through_filter_only_if_allowed = true;
                tiles.push(piece);
            }
        }

        self.finish_text_editing();
        if !self.history.start_modification("slice background") {
            return Ok(false);
        }
        let mut removing = Element::new(ElementKind::Removing);
        removing.source_indexes = vec![bg_index];
        removing.allowed_indexes = tiles.iter().map(|t| t.pass2_unique_index).collect();
        for tile in tiles {
            self.history.add_element(tile);
        }
        self.history.add_element(removing);
        self.history.stop_modification();
        self.derived.invalidate_all();
        log::debug!("background sliced into {rows}x{cols}");
        Ok(true)
    }

    fn fit_canvas_rect(&mut self, content: Rect) {
        if content.width() <= 0.0 && content.height() <= 0.0 {
            return;
        }
        let (scale, offset) = geometry::fit_rect(content, self.viewport_rect(), FIT_MARGIN);
        self.viewport.scale_x = scale;
        self.viewport.scale_y = scale;
        self.viewport.origin = offset;
        self.reseed_gesture();
    }

    pub fn fit_selection(&mut self) {
        if let Some(rect) = self.selection_polygon().and_then(|p| geometry::aabb_of_points(&p)) {
            self.fit_canvas_rect(rect);
        }
    }

    pub fn fit_capture(&mut self) {
        if let Some(rect) = self.capture.rect {
            self.fit_canvas_rect(rect);
        }
    }

    /// Background pixel under the cursor, as the magnifier shows it.
    pub fn color_under_cursor(&self) -> Option<Rgba> {
        self.color_at(self.canvas_cursor())
    }

    pub fn color_at(&self, canvas: Point) -> Option<Rgba> {
        let bg = self.background()?;
        let pixmap = bg.pixmap.as_deref()?;
        let p = render::picture_affine(bg, pixmap).inverse() * canvas;
        raster::pixel_at(pixmap, p.x.floor() as i64, p.y.floor() as i64)
    }

    /// The capture rect in viewport space, for the shell's widgets.
    pub fn capture_rect_viewport(&self) -> Option<Rect> {
        self.capture.rect.map(|r| self.viewport.map_rect_to_viewport(r))
    }

    pub fn capture_hover_region(&self) -> capture::Region {
        self.capture_region_at(self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{MouseButton, SelectionFilter};
    use super::*;

    fn content_count(editor: &Editor) -> usize {
        editor
            .visible_elements()
            .iter()
            .filter(|e| e.kind != ElementKind::Removing)
            .count()
    }

    #[test]
    fn reshoot_keeps_annotations_over_new_background() {
        let mut editor = blank_editor(200, 100);
        let arrow = draw(&mut editor, Tool::Arrow, Point::new(20.0, 20.0), Point::new(120.0, 60.0), Modifiers::NONE);
        let old_bg = editor.background().unwrap().unique_index;
        let before = editor.visible_elements().len();

        let mut shot = Pixmap::new(200, 100).unwrap();
        shot.fill(Rgba::WHITE.to_skia());
        assert!(editor.reshoot(shot));

        let visible = editor.visible_elements();
        assert_eq!(visible.len(), before + 1);
        assert!(visible.iter().any(|e| e.unique_index == arrow));
        assert!(visible.iter().all(|e| e.unique_index != old_bg));
        let bg = editor.background().unwrap();
        assert!(bg.pass_through_filter_only_if_allowed);
        assert_eq!(editor.color_at(Point::new(5.0, 5.0)), Some(Rgba::WHITE));

        assert!(editor.history_backwards());
        assert_eq!(editor.background().unwrap().unique_index, old_bg);
    }

    #[test]
    fn delete_hides_selection_until_undone() {
        let mut editor = blank_editor(200, 100);
        let rect = draw(&mut editor, Tool::Rect, Point::new(10.0, 10.0), Point::new(50.0, 50.0), Modifiers::NONE);
        editor.select_only(&[rect]);
        assert!(editor.delete_selection());
        assert!(editor.element(rect).is_some());
        assert!(editor.visible_elements().iter().all(|e| e.unique_index != rect));
        editor.key_press(Key::Char('z'), Modifiers::CTRL);
        assert!(editor.visible_elements().iter().any(|e| e.unique_index == rect));
        editor.key_press(Key::Char('z'), Modifiers { shift: true, ctrl: true, alt: false });
        assert!(editor.visible_elements().iter().all(|e| e.unique_index != rect));
    }

    #[test]
    fn deleting_half_a_zoom_pair_removes_both() {
        let mut editor = blank_editor(300, 300);
        let first = draw(&mut editor, Tool::ZoomInRegion, Point::new(20.0, 20.0), Point::new(60.0, 60.0), Modifiers::NONE);
        drag(&mut editor, Point::new(200.0, 200.0), Point::new(200.0, 200.0), Modifiers::NONE);
        assert_eq!(content_count(&editor), 3);
        editor.select_only(&[first]);
        editor.delete_selection();
        assert_eq!(visible_kinds(&editor), vec![ElementKind::BackgroundPicture, ElementKind::Removing]);
    }

    #[test]
    fn slicing_replaces_background_with_tiles() {
        let mut editor = blank_editor(200, 100);
        assert!(editor.slice_background(2, 3).unwrap());
        let tiles: Vec<&Element> = editor
            .visible_elements()
            .into_iter()
            .filter(|e| e.kind == ElementKind::Picture)
            .collect();
        assert_eq!(tiles.len(), 6);
        assert!(editor.background().is_none());
        let first = tiles.iter().min_by_key(|e| e.unique_index).unwrap();
        assert_eq!((first.width, first.height), (66.0, 50.0));
        assert!(first.position.distance(Point::new(33.0, 25.0)) < 1e-9);
        // tiles are content and can be picked on their own
        editor.set_selection_filter(SelectionFilter::ContentOnly);
        editor.toggle_select_all();
        assert_eq!(editor.selected_indexes().len(), 6);
    }

    #[test]
    fn content_to_background_flattens_annotations() {
        let mut editor = blank_editor(200, 100);
        editor.style_mut(Tool::Rect).size = 0.5;
        let rect = draw(&mut editor, Tool::Rect, Point::new(20.0, 20.0), Point::new(80.0, 80.0), Modifiers::CTRL);
        assert!(editor.content_to_background().unwrap());
        assert!(editor.visible_elements().iter().all(|e| e.unique_index != rect));
        assert_eq!(content_count(&editor), 1);
        assert_eq!(editor.color_at(Point::new(50.0, 50.0)), Some(Rgba::RED));
    }

    #[test]
    fn arrow_keys_move_selection_or_capture_rect() {
        let mut editor = blank_editor(200, 100);
        let rect = draw(&mut editor, Tool::Rect, Point::new(10.0, 10.0), Point::new(50.0, 50.0), Modifiers::NONE);
        let start = editor.element(rect).unwrap().position;
        let slots = editor.history.slots().len();

        editor.key_press(Key::Right, Modifiers::NONE);
        assert_eq!(editor.capture.rect, Some(Rect::new(1.0, 0.0, 201.0, 100.0)));

        editor.select_only(&[rect]);
        editor.key_press(Key::Down, Modifiers::SHIFT);
        editor.key_press(Key::Left, Modifiers::CTRL);
        let moved = editor.selected_indexes();
        assert_eq!(moved.len(), 1);
        let e = editor.element(moved[0]).unwrap();
        assert_eq!(e.position, start + Vec2::new(-5.0, 10.0));
        assert_eq!(editor.history.slots().len(), slots + 2);
    }

    #[test]
    fn escape_cancels_gesture_or_asks_to_quit() {
        let mut editor = blank_editor(200, 100);
        editor.set_tool(Tool::Rect);
        editor.mouse_press(Point::new(10.0, 10.0), MouseButton::Left, Modifiers::NONE);
        editor.mouse_move(Point::new(60.0, 60.0), Modifiers::NONE);
        assert!(editor.key_press(Key::Escape, Modifiers::NONE).is_empty());
        assert!(editor.is_idle());
        assert_eq!(editor.history.slots().len(), 1);
        editor.mouse_release(Point::new(60.0, 60.0), MouseButton::Left, Modifiers::NONE);
        assert_eq!(editor.history.slots().len(), 1);

        assert_eq!(editor.key_press(Key::Escape, Modifiers::NONE), vec![Request::OpenQuitDialog]);
    }

    #[test]
    fn undo_is_refused_mid_gesture() {
        let mut editor = blank_editor(200, 100);
        draw(&mut editor, Tool::Rect, Point::new(10.0, 10.0), Point::new(50.0, 50.0), Modifiers::NONE);
        editor.mouse_press(Point::new(100.0, 10.0), MouseButton::Left, Modifiers::NONE);
        assert!(!editor.history_backwards());
        editor.mouse_release(Point::new(150.0, 60.0), MouseButton::Left, Modifiers::NONE);
        assert!(editor.history_backwards());
    }

    #[test]
    fn shortcuts_toggle_view_state() {
        let mut editor = blank_editor(200, 100);
        editor.key_press(Key::Char('h'), Modifiers::NONE);
        editor.key_press(Key::Tab, Modifiers::SHIFT);
        editor.key_press(Key::Space, Modifiers::NONE);
        editor.key_press(Key::F1, Modifiers::NONE);
        assert!(editor.hex_mask);
        assert_eq!(editor.uncapture_mode, super::super::UncaptureMode::Opaque);
        assert_eq!(editor.tool, Tool::Transform);
        assert!(editor.show_help);
        assert_eq!(editor.key_press(Key::Enter, Modifiers::NONE), vec![Request::Commit]);
        assert_eq!(editor.key_press(Key::Char('v'), Modifiers::CTRL), vec![Request::PasteImage]);
    }

    #[test]
    fn ctrl_c_copies_the_sampled_colour() {
        let mut editor = blank_editor(200, 100);
        editor.mouse_move(Point::new(30.0, 30.0), Modifiers::NONE);
        let requests = editor.key_press(Key::Char('c'), Modifiers::CTRL);
        assert_eq!(requests, vec![Request::CopyText("#285aa0".to_string())]);
    }

    #[test]
    fn fit_capture_centres_it_in_the_viewport() {
        let mut editor = blank_editor(200, 100);
        editor.viewport_size = Vec2::new(800.0, 600.0);
        editor.key_press(Key::Char('f'), Modifiers::CTRL);
        assert_eq!(editor.viewport.scale_x, editor.viewport.scale_y);
        let center = editor.viewport.map_to_viewport(Point::new(100.0, 50.0));
        assert!(center.distance(Point::new(400.0, 300.0)) < 1e-9);
        assert!((editor.viewport.scale_x - 3.8).abs() < 1e-9);
    }

    #[test]
    fn pasted_picture_lands_at_cursor() {
        let mut editor = blank_editor(200, 100);
        editor.mouse_move(Point::new(70.0, 40.0), Modifiers::NONE);
        let index = editor.paste_image(Pixmap::new(20, 10).unwrap()).unwrap();
        let e = editor.element(index).unwrap();
        assert_eq!(e.position, Point::new(70.0, 40.0));
        assert_eq!((e.width, e.height), (20.0, 10.0));
    }

    #[test]
    fn f6_rotates_only_texts() {
        let mut editor = blank_editor(300, 200);
        editor.set_tool(Tool::Text);
        drag(&mut editor, Point::new(100.0, 100.0), Point::new(100.0, 100.0), Modifiers::NONE);
        editor.text_input("note");
        let text = editor.editing_text.unwrap();
        let rect = draw(&mut editor, Tool::Rect, Point::new(200.0, 20.0), Point::new(250.0, 60.0), Modifiers::NONE);
        editor.select_only(&[text, rect]);
        editor.key_press(Key::F6, Modifiers::NONE);
        let rotated = editor.selected_indexes();
        assert_eq!(rotated.len(), 1);
        assert_eq!(editor.element(rotated[0]).unwrap().rotation, 10.0);
        assert_eq!(editor.element(rect).unwrap().rotation, 0.0);
    }
}
