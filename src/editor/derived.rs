//! Element pixmaps computed from the background: blur crops, zoom/copy-paste
//! snapshots and text proxies.
//!
//! Each derived pixmap is keyed by a hash of what it depends on. A key
//! mismatch, or a bumped generation after a background change, triggers a
//! recompute on the next refresh.

use std::collections::{HashMap, HashSet};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use kurbo::Affine;
use tiny_skia::Pixmap;

use super::Editor;
use crate::error::Result;
use crate::model::{Element, ElementIndex, ElementKind};
use crate::render::{self, raster, text};

#[derive(Debug, Default)]
pub(crate) struct DerivedCache {
    keys: HashMap<ElementIndex, u64>,
    generation: u64,
    recomputed: usize,
}

impl DerivedCache {
    /// Forgets every snapshot; background edits call this.
    pub fn invalidate_all(&mut self) {
        self.generation += 1;
        self.keys.clear();
    }

    fn is_fresh(&self, index: ElementIndex, key: u64) -> bool {
        self.keys.get(&index) == Some(&key)
    }

    pub fn recomputed(&self) -> usize {
        self.recomputed
    }

    /// Number of elements whose derived pixmap is currently tracked.
    pub fn tracked(&self) -> usize {
        self.keys.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Derivation {
    Blur,
    Snapshot,
    TextProxy,
}

fn derivation(e: &Element) -> Option<Derivation> {
    match e.kind {
        ElementKind::Blurring if e.finished => Some(Derivation::Blur),
        ElementKind::ZoomInRegion | ElementKind::CopyPaste if e.is_pair_first() && e.finished => {
            Some(Derivation::Snapshot)
        }
        ElementKind::Text => Some(Derivation::TextProxy),
        _ => None,
    }
}

fn dependency_key(e: &Element, what: Derivation, generation: u64) -> u64 {
    let mut h = DefaultHasher::new();
    generation.hash(&mut h);
    match what {
        Derivation::Blur | Derivation::Snapshot => {
            for v in [e.position.x, e.position.y, e.rotation, e.scale_x, e.scale_y, e.width, e.height, e.size] {
                v.to_bits().hash(&mut h);
            }
            e.toolbool.hash(&mut h);
        }
        Derivation::TextProxy => {
            e.plain_text.hash(&mut h);
            e.size.to_bits().hash(&mut h);
            e.color.hash(&mut h);
            e.secondary_color.hash(&mut h);
            e.proxy_pixmap.is_some().hash(&mut h);
        }
    }
    h.finish()
}

impl Editor {
    /// Renders the background layer under `e`'s oriented rect, unrotated,
    /// at canvas resolution.
    pub(crate) fn crop_background(&self, e: &Element) -> Result<Pixmap> {
        let w = (e.width * e.scale_x).abs().ceil().max(1.0);
        let h = (e.height * e.scale_y).abs().ceil().max(1.0);
        let mut pixmap = raster::new_pixmap(w as u32, h as u32)?;
        let frame = Affine::translate(e.position.to_vec2()) * Affine::rotate(e.rotation.to_radians());
        let to_crop = Affine::translate((w / 2.0, h / 2.0)) * frame.inverse();
        let smooth = self.config.antialiasing_and_smooth_pixmaps;
        let mut layer: Vec<&Element> = self
            .visible_elements()
            .into_iter()
            .filter(|b| b.background_image)
            .collect();
        layer.sort_by_key(|b| b.unique_index);
        for b in layer {
            if let Some(source) = b.pixmap.as_deref() {
                raster::draw_pixmap(&mut pixmap, source, to_crop * render::picture_affine(b, source), 1.0, smooth);
            }
        }
        Ok(pixmap)
    }

    fn derive(&self, e: &Element, what: Derivation) -> Result<Pixmap> {
        match what {
            Derivation::Snapshot => self.crop_background(e),
            Derivation::Blur => {
                let crop = raster::pixmap_to_image(&self.crop_background(e)?);
                let blurred = if e.toolbool {
                    raster::pixelate(&crop, 1.0 + 60.0 * e.size)
                } else {
                    raster::blur_cascade(&crop, e.size)
                };
                raster::image_to_pixmap(&blurred)
            }
            Derivation::TextProxy => text::render_text(e),
        }
    }

    /// Brings every visible derived pixmap up to date. Returns how many were
    /// recomputed.
    pub fn refresh_derived(&mut self) -> usize {
        let generation = self.derived.generation;
        let derived: Vec<(ElementIndex, Derivation, u64)> = self
            .visible_elements()
            .into_iter()
            .filter_map(|e| {
                let what = derivation(e)?;
                Some((e.unique_index, what, dependency_key(e, what, generation)))
            })
            .collect();
        // superseded or hidden elements drop out of the cache
        let live: HashSet<ElementIndex> = derived.iter().map(|(index, ..)| *index).collect();
        self.derived.keys.retain(|index, _| live.contains(index));
        let stale: Vec<(ElementIndex, Derivation, u64)> = derived
            .into_iter()
            .filter(|(index, _, key)| !self.derived.is_fresh(*index, *key))
            .collect();

        let mut count = 0;
        for (index, what, _) in stale {
            let Some(e) = self.element(index) else {
                continue;
            };
            let result = self.derive(e, what);
            let Some(e) = self.history.element_mut(index) else {
                continue;
            };
            match result {
                Ok(pixmap) => {
                    let pixmap = Arc::new(pixmap);
                    match what {
                        Derivation::TextProxy => e.proxy_pixmap = Some(pixmap),
                        Derivation::Blur | Derivation::Snapshot => e.pixmap = Some(pixmap),
                    }
                }
                Err(err) => log::warn!("derived pixmap for {index}: {err}"),
            }
            // keyed after the update, so a text proxy counts as present
            let key = dependency_key(e, what, generation);
            self.derived.keys.insert(index, key);
            count += 1;
        }
        if count > 0 {
            log::debug!("recomputed {count} derived pixmaps");
        }
        self.derived.recomputed += count;
        count
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Point;

    use super::super::test_support::*;
    use super::super::{Modifiers, Tool};
    use super::*;
    use crate::model::Rgba;

    fn two_tone_editor() -> Editor {
        let mut pixmap = Pixmap::new(200, 100).unwrap();
        pixmap.fill(Rgba::WHITE.to_skia());
        let mut paint = tiny_skia::Paint::default();
        paint.set_color(Rgba::BLACK.to_skia());
        pixmap.fill_rect(
            tiny_skia::Rect::from_xywh(100.0, 0.0, 100.0, 100.0).unwrap(),
            &paint,
            tiny_skia::Transform::identity(),
            None,
        );
        let mut editor = Editor::with_background(Default::default(), pixmap, true);
        editor.viewport_size = kurbo::Vec2::new(200.0, 100.0);
        editor
    }

    #[test]
    fn snapshot_copies_background_under_the_frame() {
        let mut editor = two_tone_editor();
        let first = draw(&mut editor, Tool::CopyPaste, Point::new(110.0, 10.0), Point::new(150.0, 50.0), Modifiers::NONE);
        assert_eq!(editor.refresh_derived(), 1);
        let snapshot = editor.element(first).unwrap().pixmap.clone().unwrap();
        assert_eq!((snapshot.width(), snapshot.height()), (40, 40));
        assert_eq!(raster::pixel_at(&snapshot, 20, 20), Some(Rgba::BLACK));
        // nothing changed, nothing recomputed
        assert_eq!(editor.refresh_derived(), 0);
    }

    #[test]
    fn blur_is_recomputed_after_move_and_background_change() {
        let mut editor = blank_editor(200, 100);
        let blur = draw(&mut editor, Tool::Blurring, Point::new(10.0, 10.0), Point::new(60.0, 60.0), Modifiers::NONE);
        assert!(editor.element(blur).unwrap().finished);
        assert_eq!(editor.refresh_derived(), 1);
        assert!(editor.element(blur).unwrap().pixmap.is_some());

        editor.derived.invalidate_all();
        assert_eq!(editor.refresh_derived(), 1);

        editor.set_tool(Tool::Transform);
        editor.select_only(&[blur]);
        editor.rotate_selected(30.0, None);
        assert_eq!(editor.refresh_derived(), 1);
    }

    #[test]
    fn cache_tracks_only_visible_elements() {
        let mut editor = blank_editor(200, 100);
        let blur = draw(&mut editor, Tool::Blurring, Point::new(10.0, 10.0), Point::new(60.0, 60.0), Modifiers::NONE);
        editor.refresh_derived();
        assert_eq!(editor.derived.tracked(), 1);

        editor.set_tool(Tool::Transform);
        editor.select_only(&[blur]);
        editor.rotate_selected(15.0, None);
        assert_eq!(editor.refresh_derived(), 1);
        assert_eq!(editor.derived.tracked(), 1);

        assert!(editor.history_backwards());
        assert_eq!(editor.refresh_derived(), 1);
        assert_eq!(editor.derived.tracked(), 1);

        assert!(editor.history_backwards());
        assert_eq!(editor.refresh_derived(), 0);
        assert_eq!(editor.derived.tracked(), 0);
    }

    #[test]
    fn pixelate_mode_produces_flat_blocks() {
        let mut editor = two_tone_editor();
        editor.style_mut(Tool::Blurring).toolbool = true;
        editor.style_mut(Tool::Blurring).size = 0.5;
        let blur = draw(&mut editor, Tool::Blurring, Point::new(0.0, 0.0), Point::new(62.0, 62.0), Modifiers::NONE);
        editor.refresh_derived();
        let pixmap = editor.element(blur).unwrap().pixmap.clone().unwrap();
        assert_eq!(raster::pixel_at(&pixmap, 0, 0), raster::pixel_at(&pixmap, 29, 29));
    }

    #[test]
    fn text_proxy_follows_edits() {
        let mut editor = blank_editor(300, 200);
        editor.set_tool(Tool::Text);
        drag(&mut editor, Point::new(100.0, 100.0), Point::new(100.0, 100.0), Modifiers::NONE);
        editor.text_input("abc");
        editor.refresh_derived();
        let index = editor.editing_text.unwrap();
        let first = editor.element(index).unwrap().proxy_pixmap.clone().unwrap();
        editor.text_input("def");
        assert_eq!(editor.refresh_derived(), 1);
        let second = editor.element(index).unwrap().proxy_pixmap.clone().unwrap();
        assert!(second.width() > first.width());
    }
}
