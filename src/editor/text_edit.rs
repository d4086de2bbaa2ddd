//! Editing a placed text element: caret, typing, drag-and-drop of the
//! selected text and the two inline colour buttons.

use std::ops::Range;

use kurbo::{Point, Rect, Vec2};

use super::{ColorTarget, Editor, Gesture, Key, Modifiers, Request};
use crate::geometry;
use crate::model::{Element, ElementIndex, ElementKind, Rgba};
use crate::text_document::{CaretMotion, TextDocument};

pub const COLOR_BUTTON_SIZE: f64 = 25.0;
const COLOR_BUTTON_GAP: f64 = 3.0;

#[derive(Debug)]
pub(crate) struct TextDrag {
    pub element: ElementIndex,
    pub source: Range<usize>,
}

impl Editor {
    /// Document-space position of a viewport point inside text element `index`.
    fn text_doc_point(&self, index: ElementIndex, pos: Point) -> Option<Point> {
        let e = self.element(index)?;
        if e.kind != ElementKind::Text {
            return None;
        }
        let local = e.map_to_local(&self.viewport, pos);
        Some(local + Vec2::new(e.width / 2.0, e.height / 2.0))
    }

    pub(crate) fn text_hit(&self, pos: Point) -> Option<ElementIndex> {
        let index = self.editing_text?;
        let e = self.element(index)?;
        e.is_selection_contains_pos(&self.viewport, pos).then_some(index)
    }

    /// Viewport rects of the text-colour and plate-colour buttons.
    pub fn color_buttons(&self) -> Option<[(ColorTarget, Rect); 2]> {
        let e = self.element(self.editing_text?)?;
        let poly = e.viewport_polygon(&self.viewport);
        let aabb = geometry::aabb_of_points(&poly)?;
        let s = COLOR_BUTTON_SIZE;
        let y0 = aabb.y0 - s - COLOR_BUTTON_GAP;
        let x1 = aabb.x0 - COLOR_BUTTON_GAP;
        Some([
            (ColorTarget::Text, Rect::new(x1 - 2.0 * s - COLOR_BUTTON_GAP, y0, x1 - s - COLOR_BUTTON_GAP, y0 + s)),
            (ColorTarget::Plate, Rect::new(x1 - s, y0, x1, y0 + s)),
        ])
    }

    /// Handles a press while a text element is being edited; `false` lets the
    /// press fall through to the active tool.
    pub(crate) fn text_press(&mut self, pos: Point, mods: Modifiers) -> bool {
        if let Some(buttons) = self.color_buttons() {
            if let Some((target, _)) = buttons.iter().find(|(_, r)| r.contains(pos)) {
                self.requests.push(Request::PickColor(*target));
                return true;
            }
        }
        let Some(index) = self.text_hit(pos) else {
            return false;
        };
        let Some(doc_pos) = self.text_doc_point(index, pos) else {
            return false;
        };
        let Some(e) = self.history.element_mut(index) else {
            return false;
        };
        let font_size = e.font_size();
        let Some(doc) = e.text_doc.as_mut() else {
            return false;
        };
        let hit = doc.hit_test(doc_pos, font_size);
        let selection = doc.selection();
        if !selection.is_empty() && selection.start < hit && hit < selection.end {
            self.gesture = Gesture::TextDrag(TextDrag {
                element: index,
                source: selection,
            });
        } else {
            doc.set_caret(hit, mods.shift);
        }
        true
    }

    /// Releases a text drag: Ctrl copies, otherwise moves. Dropping inside the
    /// dragged selection changes nothing.
    pub(crate) fn text_drop(&mut self, drag: TextDrag, pos: Point, mods: Modifiers) {
        let Some(doc_pos) = self.text_doc_point(drag.element, pos) else {
            return;
        };
        let target = self
            .element(drag.element)
            .and_then(|e| e.text_doc.as_ref().map(|d| d.hit_test(doc_pos, e.font_size())));
        let Some(target) = target else {
            return;
        };
        if (drag.source.start..=drag.source.end).contains(&target) {
            if let Some(doc) = self.history.element_mut(drag.element).and_then(|e| e.text_doc.as_mut()) {
                doc.set_caret(target, false);
            }
            return;
        }
        self.edit_text(|doc| doc.move_selection_to(target, mods.ctrl));
    }

    /// Opens a modification over the text element edits should land on and
    /// returns its index; the caller stops it. An element created or copied
    /// during this editing session lives in the last slot, which is reopened;
    /// otherwise a working copy is taken in a new "text edit" slot.
    fn open_text_for_edit(&mut self) -> Option<ElementIndex> {
        let index = self.editing_text?;
        let at_end = self.history.cursor() == self.history.slots().len();
        let in_last_slot = self
            .history
            .slots()
            .last()
            .is_some_and(|s| s.elements.iter().any(|e| e.unique_index == index));
        if at_end && in_last_slot {
            return self.history.reopen_last_slot().then_some(index);
        }
        if !self.history.start_modification("text edit") {
            return None;
        }
        let copy = self.history.prepare_element_for_modification(index);
        if copy.is_none() {
            self.history.stop_modification();
            return None;
        }
        self.editing_text = copy;
        copy
    }

    /// Runs `modify` on the editing element inside a history modification.
    fn modify_editing_text(&mut self, modify: impl FnOnce(&mut Element) -> bool) -> bool {
        let Some(index) = self.open_text_for_edit() else {
            return false;
        };
        let changed = self.history.open_slot_element_mut(index).is_some_and(modify);
        self.history.stop_modification();
        changed
    }

    /// Applies `edit` to the editing document and keeps the element's size
    /// in step, anchoring its top-left corner.
    pub(crate) fn edit_text(&mut self, edit: impl FnOnce(&mut TextDocument) -> bool) -> bool {
        self.modify_editing_text(|e| {
            let (old_w, old_h) = (e.width, e.height);
            let changed = e.text_doc.as_mut().is_some_and(edit);
            if changed {
                e.sync_text_size();
                let grow = Vec2::new((e.width - old_w) / 2.0 * e.scale_x, (e.height - old_h) / 2.0 * e.scale_y);
                e.position += geometry::rotate_vec2(grow, e.rotation);
                e.proxy_pixmap = None;
            }
            changed
        })
    }

    pub(crate) fn text_insert(&mut self, text: &str) {
        let text = text.replace("\r\n", "\n");
        if text.is_empty() {
            return;
        }
        self.edit_text(|doc| {
            doc.insert_text(&text);
            true
        });
    }

    fn move_text_caret(&mut self, motion: CaretMotion, extend: bool) {
        let Some(index) = self.editing_text else {
            return;
        };
        if let Some(doc) = self.history.element_mut(index).and_then(|e| e.text_doc.as_mut()) {
            doc.move_caret(motion, extend);
        }
    }

    /// Keyboard while editing text. Returns `false` for keys the text editor
    /// leaves to the global shortcuts.
    pub(crate) fn text_key(&mut self, key: Key, mods: Modifiers) -> bool {
        if self.editing_text.is_none() {
            return false;
        }
        let extend = mods.shift;
        let motion = match key {
            Key::Left if mods.ctrl => Some(CaretMotion::WordLeft),
            Key::Right if mods.ctrl => Some(CaretMotion::WordRight),
            Key::Left => Some(CaretMotion::Left),
            Key::Right => Some(CaretMotion::Right),
            Key::Up => Some(CaretMotion::Up),
            Key::Down => Some(CaretMotion::Down),
            Key::Home if mods.ctrl => Some(CaretMotion::DocumentStart),
            Key::End if mods.ctrl => Some(CaretMotion::DocumentEnd),
            Key::Home => Some(CaretMotion::LineStart),
            Key::End => Some(CaretMotion::LineEnd),
            _ => None,
        };
        if let Some(motion) = motion {
            self.move_text_caret(motion, extend);
            return true;
        }
        match key {
            Key::Backspace => {
                self.edit_text(|doc| {
                    let before = doc.len();
                    doc.backspace();
                    doc.len() != before
                });
            }
            Key::Delete => {
                self.edit_text(|doc| {
                    let before = doc.len();
                    doc.delete_forward();
                    doc.len() != before
                });
            }
            Key::Enter if !mods.ctrl => self.text_insert("\n"),
            // typed spaces arrive through text input
            Key::Space => {}
            Key::Escape => self.finish_text_editing(),
            Key::Char('z') if mods.ctrl && mods.shift => {
                self.edit_text(TextDocument::redo);
            }
            Key::Char('z') if mods.ctrl => {
                self.edit_text(TextDocument::undo);
            }
            Key::Char('y') if mods.ctrl => {
                self.edit_text(TextDocument::redo);
            }
            Key::Char('a') if mods.ctrl => {
                if let Some(doc) = self
                    .editing_text
                    .and_then(|i| self.history.element_mut(i))
                    .and_then(|e| e.text_doc.as_mut())
                {
                    doc.select_all();
                }
            }
            Key::Char('c') if mods.ctrl => {
                let selected = self
                    .editing_text
                    .and_then(|i| self.element(i))
                    .and_then(|e| e.text_doc.as_ref())
                    .map(|d| d.selected_text().to_string())
                    .filter(|s| !s.is_empty());
                if let Some(text) = selected {
                    self.requests.push(Request::CopyText(text));
                }
            }
            Key::Char('x') if mods.ctrl => {
                self.text_key(Key::Char('c'), mods);
                self.edit_text(|doc| {
                    let cut = doc.has_selection();
                    if cut {
                        doc.insert_text("");
                    }
                    cut
                });
            }
            // typed characters arrive through text input
            Key::Char(_) if !mods.ctrl => {}
            _ => return false,
        }
        true
    }

    /// Leaves edit mode. A text left empty is dropped when it was created in
    /// the last slot.
    pub(crate) fn finish_text_editing(&mut self) {
        let Some(index) = self.editing_text.take() else {
            return;
        };
        if let Gesture::TextDrag(_) = self.gesture {
            self.gesture = Gesture::Idle;
        }
        let empty = self
            .element(index)
            .is_some_and(|e| e.text_doc.as_ref().is_none_or(TextDocument::is_empty));
        if !empty {
            return;
        }
        let at_end = self.history.cursor() == self.history.slots().len();
        let in_last_slot = self
            .history
            .slots()
            .last()
            .is_some_and(|s| s.elements.iter().any(|e| e.unique_index == index));
        if at_end && in_last_slot && self.history.reopen_last_slot() {
            let group = self.element(index).and_then(|e| e.group_id);
            let companions: Vec<ElementIndex> = self
                .history
                .open_slot_elements()
                .iter()
                .filter(|e| e.unique_index != index && group.is_some() && e.group_id == group)
                .map(|e| e.unique_index)
                .collect();
            self.history.discard_from_open_slot(index);
            for companion in companions {
                self.history.discard_from_open_slot(companion);
            }
            self.history.stop_modification();
            log::debug!("dropped empty text element {index}");
        }
    }

    /// Applies a colour picked for one of the inline buttons.
    pub fn set_text_color(&mut self, target: ColorTarget, color: Rgba) {
        self.modify_editing_text(|e| {
            match target {
                ColorTarget::Text => e.color = color,
                ColorTarget::Plate => e.secondary_color = color,
            }
            e.proxy_pixmap = None;
            true
        });
    }

    /// Enters edit mode on a text element, e.g. after a double click.
    pub fn begin_text_editing(&mut self, index: ElementIndex) {
        if self.element(index).is_some_and(|e| e.kind == ElementKind::Text) {
            self.finish_text_editing();
            self.editing_text = Some(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{MouseButton, Tool};
    use super::*;

    fn typed(editor: &mut Editor, at: Point, text: &str) -> ElementIndex {
        editor.set_tool(Tool::Text);
        editor.mouse_press(at, MouseButton::Left, Modifiers::NONE);
        editor.mouse_release(at, MouseButton::Left, Modifiers::NONE);
        editor.text_input(text);
        editor.editing_text.unwrap()
    }

    fn text_of(editor: &Editor, index: ElementIndex) -> String {
        editor.element(index).unwrap().plain_text.clone()
    }

    #[test]
    fn typing_in_fresh_text_grows_it_without_new_slots() {
        let mut editor = blank_editor(400, 300);
        let index = typed(&mut editor, Point::new(100.0, 100.0), "hi");
        let slots = editor.history.slots().len();
        let before = editor.element(index).unwrap().canvas_polygon()[0];
        editor.text_input(" there");
        assert_eq!(editor.history.slots().len(), slots);
        let e = editor.element(index).unwrap();
        assert_eq!(e.plain_text, "hi there");
        assert!(e.canvas_polygon()[0].distance(before) < 1e-9);
        let (w, _) = e.text_doc.as_ref().unwrap().layout_size(e.font_size());
        assert_eq!(e.width, w);
    }

    #[test]
    fn keys_edit_and_document_undo_is_separate() {
        let mut editor = blank_editor(400, 300);
        let index = typed(&mut editor, Point::new(100.0, 100.0), "abc");
        editor.text_key(Key::Backspace, Modifiers::NONE);
        assert_eq!(text_of(&editor, index), "ab");
        editor.text_key(Key::Char('z'), Modifiers::CTRL);
        assert_eq!(text_of(&editor, index), "abc");
        editor.text_key(Key::Left, Modifiers::SHIFT);
        editor.text_key(Key::Char('c'), Modifiers::CTRL);
        assert_eq!(editor.take_requests(), vec![Request::CopyText("c".into())]);
    }

    #[test]
    fn editing_old_text_copies_it_into_a_new_slot() {
        let mut editor = blank_editor(400, 300);
        let index = typed(&mut editor, Point::new(100.0, 100.0), "old");
        editor.finish_text_editing();
        draw(&mut editor, Tool::Rect, Point::new(200.0, 200.0), Point::new(250.0, 250.0), Modifiers::NONE);
        let slots = editor.history.slots().len();

        editor.begin_text_editing(index);
        editor.text_input("!");
        assert_eq!(editor.history.slots().len(), slots + 1);
        let copy = editor.editing_text.unwrap();
        assert_ne!(copy, index);
        assert_eq!(text_of(&editor, copy), "old!");
        assert_eq!(editor.element(copy).unwrap().source_indexes, vec![index]);

        editor.finish_text_editing();
        editor.history_backwards();
        let visible: Vec<ElementIndex> = editor.visible_elements().iter().map(|e| e.unique_index).collect();
        assert!(visible.contains(&index));
    }

    #[test]
    fn edits_of_committed_text_run_under_a_fresh_stamp() {
        let mut editor = blank_editor(400, 300);
        let index = typed(&mut editor, Point::new(100.0, 100.0), "a");
        assert!(!editor.history.is_modifying());
        let first = editor.element(index).unwrap().modification_stamp;
        assert!(first.is_some());

        editor.text_input("b");
        assert!(!editor.history.is_modifying());
        let second = editor.element(index).unwrap().modification_stamp;
        assert!(second.is_some() && second != first);

        editor.set_text_color(ColorTarget::Text, Rgba::WHITE);
        assert!(!editor.history.is_modifying());
        let e = editor.element(index).unwrap();
        assert_eq!(e.color, Rgba::WHITE);
        assert_ne!(e.modification_stamp, second);
        assert_eq!(editor.editing_text, Some(index));
    }

    #[test]
    fn empty_text_is_dropped_on_finish() {
        let mut editor = blank_editor(400, 300);
        let slots = editor.history.slots().len();
        typed(&mut editor, Point::new(100.0, 100.0), "");
        editor.finish_text_editing();
        assert_eq!(editor.history.slots().len(), slots);
    }

    #[test]
    fn drag_and_drop_moves_or_copies_selection() {
        let mut editor = blank_editor(600, 300);
        let index = typed(&mut editor, Point::new(200.0, 100.0), "abcdef");
        // select "ab"
        editor.text_key(Key::Home, Modifiers::NONE);
        editor.text_key(Key::Right, Modifiers::SHIFT);
        editor.text_key(Key::Right, Modifiers::SHIFT);

        let e = editor.element(index).unwrap();
        let m = crate::text_document::GridMetrics::for_font_size(e.font_size());
        let to_viewport = |doc: Point| {
            let local = doc - Vec2::new(e.width / 2.0, e.height / 2.0);
            editor.viewport.map_to_viewport(e.map_local_to_canvas(local))
        };
        let inside_selection = to_viewport(m.cell_origin(0, 1) + Vec2::new(0.0, m.line_height / 2.0));
        let at_end = to_viewport(m.cell_origin(0, 6) + Vec2::new(0.0, m.line_height / 2.0));

        editor.mouse_press(inside_selection, MouseButton::Left, Modifiers::NONE);
        assert!(matches!(editor.gesture, Gesture::TextDrag(_)));
        editor.mouse_release(at_end, MouseButton::Left, Modifiers::NONE);
        assert_eq!(text_of(&editor, index), "cdefab");

        // the moved text stays selected
        let e = editor.element(index).unwrap();
        let doc = e.text_doc.as_ref().unwrap();
        assert_eq!(doc.selected_text(), "ab");
    }

    #[test]
    fn color_buttons_sit_above_left_of_text() {
        let mut editor = blank_editor(400, 300);
        typed(&mut editor, Point::new(200.0, 150.0), "x");
        let [(first, a), (second, b)] = editor.color_buttons().unwrap();
        assert_eq!((first, second), (ColorTarget::Text, ColorTarget::Plate));
        assert_eq!(a.width(), COLOR_BUTTON_SIZE);
        assert!(a.x1 < b.x0);
        editor.mouse_press(b.center(), MouseButton::Left, Modifiers::NONE);
        assert_eq!(editor.take_requests(), vec![Request::PickColor(ColorTarget::Plate)]);
        editor.set_text_color(ColorTarget::Plate, Rgba::WHITE);
        let index = editor.editing_text.unwrap();
        assert_eq!(editor.element(index).unwrap().secondary_color, Rgba::WHITE);
    }

    #[test]
    fn letters_while_editing_do_not_trigger_shortcuts() {
        let mut editor = blank_editor(400, 300);
        let index = typed(&mut editor, Point::new(100.0, 100.0), "hex");
        let requests = editor.key_press(Key::Char('h'), Modifiers::NONE);
        assert!(requests.is_empty());
        assert!(!editor.hex_mask);
        assert_eq!(editor.editing_text, Some(index));

        editor.text_key(Key::Char('a'), Modifiers::CTRL);
        editor.text_key(Key::Char('x'), Modifiers::CTRL);
        assert_eq!(text_of(&editor, index), "");
        assert_eq!(editor.take_requests(), vec![Request::CopyText("hex".into())]);
    }
}
