use kurbo::{Point, Rect};

use super::{Editor, Gesture, Modifiers, SelectionFilter};
use crate::geometry;
use crate::model::{Element, ElementIndex, ElementKind};

impl Editor {
    pub(crate) fn passes_filter(&self, element: &Element) -> bool {
        if element.kind == ElementKind::Removing {
            return false;
        }
        match self.selection_filter {
            SelectionFilter::All => true,
            SelectionFilter::ContentOnly => element.is_content(),
            SelectionFilter::BackgroundOnly => !element.is_content(),
        }
    }

    pub fn set_selection_filter(&mut self, filter: SelectionFilter) {
        if self.selection_filter != filter {
            self.selection_filter = filter;
            self.deselect_all();
        }
    }

    /// Candidates under `pos` (viewport space) in z-order.
    pub(crate) fn elements_at(&self, pos: Point) -> Vec<ElementIndex> {
        let mut hits: Vec<&Element> = self
            .visible_elements()
            .into_iter()
            .filter(|e| self.passes_filter(e))
            .filter(|e| e.is_selection_contains_pos(&self.viewport, pos))
            .collect();
        hits.sort_by_key(|e| e.unique_index);
        hits.into_iter().map(|e| e.unique_index).collect()
    }

    /// Element a click at `pos` selects: the smallest one under the cursor, or
    /// with `cycle` the next one in z-order after the current selection.
    pub(crate) fn pick_element(&self, pos: Point, cycle: bool) -> Option<ElementIndex> {
        let hits = self.elements_at(pos);
        if hits.is_empty() {
            return None;
        }
        if cycle && hits.len() > 1 {
            let selected = self.selected_indexes();
            let current = hits.iter().rposition(|i| selected.contains(i));
            return Some(match current {
                Some(at) => hits[(at + 1) % hits.len()],
                None => hits[0],
            });
        }
        hits.into_iter()
            .filter_map(|i| self.element(i))
            .min_by(|a, b| a.canvas_area().total_cmp(&b.canvas_area()))
            .map(|e| e.unique_index)
    }

    /// Bounding polygon of the selection in canvas space: the oriented rect of a
    /// single element or the AABB of several.
    pub fn selection_polygon(&self) -> Option<[Point; 4]> {
        let selected = self.selected_indexes();
        match selected.as_slice() {
            [] => None,
            [single] => self.element(*single).map(|e| e.canvas_polygon()),
            many => {
                let points: Vec<Point> = many
                    .iter()
                    .filter_map(|i| self.element(*i))
                    .flat_map(|e| e.canvas_polygon())
                    .collect();
                geometry::aabb_of_points(&points).map(geometry::rect_corners)
            }
        }
    }

    pub(crate) fn marquee_press(&mut self, pos: Point, mods: Modifiers) {
        let previous = if mods.shift { self.selected_indexes() } else { Vec::new() };
        if !mods.shift {
            self.deselect_all();
        }
        self.gesture = Gesture::Marquee {
            start: pos,
            current: pos,
            additive: mods.shift,
            previous,
        };
    }

    pub(crate) fn marquee_release(&mut self, start: Point, end: Point, additive: bool, previous: Vec<ElementIndex>) {
        let rect = Rect::from_points(start, end);
        let mut picked: Vec<ElementIndex> = if rect.width() < 1.0 && rect.height() < 1.0 {
            Vec::new()
        } else {
            self.visible_elements()
                .into_iter()
                .filter(|e| self.passes_filter(e))
                .filter(|e| e.selection_intersects_rect(&self.viewport, rect))
                .map(|e| e.unique_index)
                .collect()
        };
        if additive {
            for index in previous {
                if !picked.contains(&index) {
                    picked.push(index);
                }
            }
        }
        self.select_only(&picked);
    }

    pub fn marquee_rect(&self) -> Option<Rect> {
        match &self.gesture {
            Gesture::Marquee { start, current, .. } => Some(Rect::from_points(*start, *current)),
            _ => None,
        }
    }

    /// Ctrl+A: select everything the filter admits, or clear when all are selected.
    pub fn toggle_select_all(&mut self) {
        let candidates: Vec<ElementIndex> = self
            .visible_elements()
            .into_iter()
            .filter(|e| self.passes_filter(e))
            .map(|e| e.unique_index)
            .collect();
        let selected = self.selected_indexes();
        if !candidates.is_empty() && selected.len() == candidates.len() {
            self.deselect_all();
        } else {
            self.select_only(&candidates);
        }
    }
}
