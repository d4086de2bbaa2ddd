use eframe::egui;
use kurbo::Point;

use crate::editor::{CursorShape, Key, Modifiers, MouseButton, Request};

use super::OxxxyApp;

/// Wheel distance egui reports for one notch.
const POINTS_PER_NOTCH: f32 = 50.0;

fn modifiers(m: egui::Modifiers) -> Modifiers {
    Modifiers {
        shift: m.shift,
        ctrl: m.ctrl || m.command,
        alt: m.alt,
    }
}

fn button(b: egui::PointerButton) -> Option<MouseButton> {
    match b {
        egui::PointerButton::Primary => Some(MouseButton::Left),
        egui::PointerButton::Secondary => Some(MouseButton::Right),
        egui::PointerButton::Middle => Some(MouseButton::Middle),
        _ => None,
    }
}

fn key(k: egui::Key) -> Option<Key> {
    Some(match k {
        egui::Key::ArrowLeft => Key::Left,
        egui::Key::ArrowRight => Key::Right,
        egui::Key::ArrowUp => Key::Up,
        egui::Key::ArrowDown => Key::Down,
        egui::Key::Home => Key::Home,
        egui::Key::End => Key::End,
        egui::Key::Space => Key::Space,
        egui::Key::Delete => Key::Delete,
        egui::Key::Backspace => Key::Backspace,
        egui::Key::Escape => Key::Escape,
        egui::Key::Enter => Key::Enter,
        egui::Key::Tab => Key::Tab,
        egui::Key::F1 => Key::F1,
        egui::Key::F5 => Key::F5,
        egui::Key::F6 => Key::F6,
        other => {
            let mut chars = other.name().chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Char(c.to_ascii_lowercase()),
                _ => return None,
            }
        }
    })
}

pub(super) fn cursor_icon(shape: CursorShape) -> egui::CursorIcon {
    match shape {
        CursorShape::Arrow => egui::CursorIcon::Default,
        CursorShape::Crosshair => egui::CursorIcon::Crosshair,
        CursorShape::Move => egui::CursorIcon::Move,
        CursorShape::SizeHorizontal => egui::CursorIcon::ResizeHorizontal,
        CursorShape::SizeVertical => egui::CursorIcon::ResizeVertical,
        CursorShape::SizeFDiagonal => egui::CursorIcon::ResizeNwSe,
        CursorShape::SizeBDiagonal => egui::CursorIcon::ResizeNeSw,
        CursorShape::Rotate => egui::CursorIcon::AllScroll,
        CursorShape::Text => egui::CursorIcon::Text,
        CursorShape::Grab => egui::CursorIcon::Grabbing,
    }
}

impl OxxxyApp {
    /// Feeds this frame's egui events to the editor. Positions are made
    /// relative to the canvas rect. Returns the requests the editor raised.
    pub(super) fn forward_input(&mut self, ctx: &egui::Context, canvas: egui::Rect, hovered: bool) -> Vec<Request> {
        let to_view = |p: egui::Pos2| Point::new((p.x - canvas.min.x) as f64, (p.y - canvas.min.y) as f64);
        let (events, scroll, current_mods, time) =
            ctx.input(|i| (i.events.clone(), i.raw_scroll_delta, i.modifiers, i.time));
        let blocked = self.quit_dialog || self.color_pick.is_some() || self.notification.is_some();
        let wants_keyboard = ctx.wants_keyboard_input();
        let mut requests = Vec::new();
        self.editor.tick(time);
        if blocked {
            return requests;
        }

        for event in events {
            match event {
                egui::Event::PointerMoved(pos) => {
                    self.pointer_inside = canvas.contains(pos);
                    self.editor.mouse_move(to_view(pos), modifiers(current_mods));
                }
                egui::Event::PointerButton {
                    pos,
                    button: b,
                    pressed,
                    modifiers: m,
                    ..
                } => {
                    let Some(b) = button(b) else { continue };
                    if pressed && !(hovered && canvas.contains(pos)) {
                        continue;
                    }
                    if pressed {
                        self.editor.mouse_press(to_view(pos), b, modifiers(m));
                    } else {
                        self.editor.mouse_release(to_view(pos), b, modifiers(m));
                    }
                }
                egui::Event::Text(_) | egui::Event::Copy | egui::Event::Cut | egui::Event::Paste(_) | egui::Event::Key { .. }
                    if wants_keyboard => {}
                egui::Event::Text(text) => self.editor.text_input(&text),
                egui::Event::Copy => requests.extend(self.editor.key_press(Key::Char('c'), Modifiers::CTRL)),
                egui::Event::Cut => requests.extend(self.editor.key_press(Key::Char('x'), Modifiers::CTRL)),
                egui::Event::Paste(text) => {
                    if self.editor.editing_text.is_some() {
                        self.editor.text_input(&text);
                    } else {
                        requests.extend(self.editor.key_press(Key::Char('v'), Modifiers::CTRL));
                    }
                }
                egui::Event::Key {
                    key: k,
                    pressed: true,
                    modifiers: m,
                    ..
                } => {
                    let Some(k) = key(k) else { continue };
                    let mods = modifiers(m);
                    // clipboard shortcuts arrive as Copy/Cut/Paste events
                    if mods.ctrl && matches!(k, Key::Char('c' | 'x' | 'v')) {
                        continue;
                    }
                    requests.extend(self.editor.key_press(k, mods));
                }
                _ => {}
            }
        }

        if hovered && scroll.y.abs() > 0.0 {
            if let Some(pos) = ctx.input(|i| i.pointer.hover_pos()) {
                self.editor
                    .wheel(to_view(pos), (scroll.y / POINTS_PER_NOTCH) as f64, modifiers(current_mods));
            }
        }
        requests.extend(self.editor.take_requests());
        requests
    }
}
