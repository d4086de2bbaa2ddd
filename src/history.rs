//! Versioned edit log.
//!
//! Every user action appends a [`ModificationSlot`] holding the element versions
//! it produced. Undo and redo only move a cursor; the visible element set is
//! recomputed from the slots below the cursor by [`History::visible_indexes`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::{Element, ElementIndex, ElementKind};

static NEXT_STAMP: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Debug, Default)]
pub struct ModificationSlot {
    pub content_type: String,
    pub elements: Vec<Element>,
}

impl ModificationSlot {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            elements: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct History {
    slots: Vec<ModificationSlot>,
    cursor: usize,
    stamp: Option<u64>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a history from loaded slots. `cursor` is clamped to the slot count.
    pub fn from_slots(slots: Vec<ModificationSlot>, cursor: usize) -> Self {
        let cursor = cursor.min(slots.len());
        Self {
            slots,
            cursor,
            stamp: None,
        }
    }

    pub fn slots(&self) -> &[ModificationSlot] {
        &self.slots
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_stamp(&self) -> Option<u64> {
        self.stamp
    }

    pub fn is_modifying(&self) -> bool {
        self.stamp.is_some()
    }

    /// Opens a new slot for one user gesture.
    ///
    /// Returns `false` (and does nothing) when a gesture is already open.
    pub fn start_modification(&mut self, content_type: &str) -> bool {
        if self.stamp.is_some() {
            log::debug!("start_modification({content_type}) ignored: stamp already held");
            return false;
        }
        self.slots.truncate(self.cursor);
        self.slots.push(ModificationSlot::new(content_type));
        self.cursor = self.slots.len();
        self.stamp = Some(NEXT_STAMP.fetch_add(1, Ordering::Relaxed));
        log::debug!("modification started: {content_type}");
        true
    }

    /// Re-acquires a stamp for the last slot instead of opening a new one.
    ///
    /// Only possible when the cursor sits at the end of the log.
    pub fn reopen_last_slot(&mut self) -> bool {
        if self.stamp.is_some() || self.slots.is_empty() || self.cursor != self.slots.len() {
            return false;
        }
        self.stamp = Some(NEXT_STAMP.fetch_add(1, Ordering::Relaxed));
        log::debug!("modification reopened: {}", self.slots[self.cursor - 1].content_type);
        true
    }

    /// Releases the stamp; an empty slot is discarded.
    pub fn stop_modification(&mut self) {
        if self.stamp.take().is_none() {
            return;
        }
        if let Some(slot) = self.slots.last() {
            log::debug!(
                "modification stopped: {} ({} elements)",
                slot.content_type,
                slot.elements.len()
            );
            if slot.elements.is_empty() {
                self.slots.pop();
                self.cursor = self.cursor.saturating_sub(1);
            }
        }
    }

    /// Drops the open slot entirely, as if the gesture never happened.
    pub fn cancel_modification(&mut self) {
        if self.stamp.take().is_none() {
            return;
        }
        if let Some(slot) = self.slots.pop() {
            log::debug!("modification cancelled: {}", slot.content_type);
        }
        self.cursor = self.slots.len();
    }

    fn open_slot_mut(&mut self) -> Option<&mut ModificationSlot> {
        self.stamp?;
        self.slots.last_mut()
    }

    /// Appends a freshly created element to the open slot.
    pub fn add_element(&mut self, mut element: Element) -> Option<ElementIndex> {
        let Some(stamp) = self.stamp else {
            log::debug!("add_element({}) outside a gesture ignored", element.kind.tag());
            return None;
        };
        if element.kind == ElementKind::Removing {
            self.note_forward_references(&element);
        }
        element.modification_stamp = Some(stamp);
        let index = element.unique_index;
        self.open_slot_mut()?.elements.push(element);
        Some(index)
    }

    fn note_forward_references(&self, removing: &Element) {
        let earlier: HashSet<ElementIndex> = self.slots[..self.cursor.saturating_sub(1)]
            .iter()
            .flat_map(|s| s.elements.iter().map(|e| e.unique_index))
            .collect();
        for index in &removing.source_indexes {
            if !earlier.contains(index) {
                log::debug!("removing element references {index} outside earlier slots");
            }
        }
    }

    /// Returns the working copy of `index` for the current gesture.
    ///
    /// The first call per gesture clones the element with a fresh index that
    /// replaces the original; later calls return that same copy.
    pub fn prepare_element_for_modification(&mut self, index: ElementIndex) -> Option<ElementIndex> {
        let Some(stamp) = self.stamp else {
            log::debug!("prepare_element_for_modification({index}) outside a gesture ignored");
            return None;
        };
        let element = self.element(index)?;
        if element.modification_stamp == Some(stamp) {
            return Some(index);
        }
        let copy = element.derive_version(stamp);
        let copy_index = copy.unique_index;
        self.open_slot_mut()?.elements.push(copy);
        Some(copy_index)
    }

    /// Removes an element created in the open slot (used by auto-delete).
    pub fn discard_from_open_slot(&mut self, index: ElementIndex) -> Option<Element> {
        let slot = self.open_slot_mut()?;
        let pos = slot.elements.iter().position(|e| e.unique_index == index)?;
        Some(slot.elements.remove(pos))
    }

    pub fn open_slot_elements(&self) -> &[Element] {
        match (self.stamp, self.slots.last()) {
            (Some(_), Some(slot)) => &slot.elements,
            _ => &[],
        }
    }

    /// Mutable access to an element of the open slot; it takes the current stamp.
    pub fn open_slot_element_mut(&mut self, index: ElementIndex) -> Option<&mut Element> {
        let stamp = self.stamp?;
        let element = self.slots.last_mut()?.elements.iter_mut().find(|e| e.unique_index == index)?;
        element.modification_stamp = Some(stamp);
        Some(element)
    }

    pub fn element(&self, index: ElementIndex) -> Option<&Element> {
        self.all_elements().find(|e| e.unique_index == index)
    }

    pub fn element_mut(&mut self, index: ElementIndex) -> Option<&mut Element> {
        self.slots
            .iter_mut()
            .rev()
            .flat_map(|s| s.elements.iter_mut())
            .find(|e| e.unique_index == index)
    }

    pub fn all_elements(&self) -> impl Iterator<Item = &Element> {
        self.slots.iter().flat_map(|s| s.elements.iter())
    }

    pub fn all_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.slots.iter_mut().flat_map(|s| s.elements.iter_mut())
    }

    /// Indexes of the elements the user currently sees, in slot order.
    pub fn visible_indexes(&self) -> Vec<ElementIndex> {
        self.filter(self.cursor)
    }

    pub fn visible_elements(&self) -> Vec<&Element> {
        let visible: HashSet<ElementIndex> = self.visible_indexes().into_iter().collect();
        self.slots[..self.cursor]
            .iter()
            .flat_map(|s| s.elements.iter())
            .filter(|e| visible.contains(&e.unique_index))
            .collect()
    }

    /// The three-pass visibility filter over `slots[..upto]`.
    pub fn filter(&self, upto: usize) -> Vec<ElementIndex> {
        let upto = upto.min(self.slots.len());
        // pass 0
        let candidates: Vec<&Element> = self.slots[..upto]
            .iter()
            .flat_map(|s| s.elements.iter())
            .collect();
        // pass 1
        let replaced: HashSet<ElementIndex> = candidates
            .iter()
            .flat_map(|e| e.source_indexes.iter().copied())
            .collect();
        let survivors: Vec<&Element> = candidates
            .into_iter()
            .filter(|e| !replaced.contains(&e.unique_index))
            .collect();
        // pass 2
        let allowed: HashSet<ElementIndex> = survivors
            .iter()
            .flat_map(|e| e.allowed_indexes.iter().copied())
            .collect();
        survivors
            .into_iter()
            .filter(|e| !e.pass_through_filter_only_if_allowed || allowed.contains(&e.pass2_unique_index))
            .map(|e| e.unique_index)
            .collect()
    }

    pub fn can_go_backwards(&self) -> bool {
        self.stamp.is_none() && self.cursor > 0
    }

    pub fn can_go_forwards(&self) -> bool {
        self.stamp.is_none() && self.cursor < self.slots.len()
    }

    pub fn backwards(&mut self) -> bool {
        if !self.can_go_backwards() {
            return false;
        }
        self.cursor -= 1;
        log::debug!("history backwards to {}/{}", self.cursor, self.slots.len());
        true
    }

    pub fn forwards(&mut self) -> bool {
        if !self.can_go_forwards() {
            return false;
        }
        self.cursor += 1;
        log::debug!("history forwards to {}/{}", self.cursor, self.slots.len());
        true
    }

    pub fn max_unique_index(&self) -> ElementIndex {
        self.all_elements().map(|e| e.unique_index).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashMap;

    fn add(history: &mut History, kind: ElementKind) -> ElementIndex {
        history.start_modification("test");
        let index = history.add_element(Element::new(kind)).unwrap();
        history.stop_modification();
        index
    }

    fn visible_set(history: &History) -> HashSet<ElementIndex> {
        history.visible_indexes().into_iter().collect()
    }

    #[test]
    fn nested_start_is_a_noop() {
        let mut h = History::new();
        assert!(h.start_modification("outer"));
        let stamp = h.current_stamp();
        assert!(!h.start_modification("inner"));
        assert_eq!(h.current_stamp(), stamp);
        assert_eq!(h.slots().len(), 1);
        h.add_element(Element::new(ElementKind::Rect));
        h.stop_modification();
        assert!(!h.is_modifying());
        assert_eq!(h.cursor(), 1);
    }

    #[test]
    fn empty_slot_is_discarded() {
        let mut h = History::new();
        add(&mut h, ElementKind::Rect);
        h.start_modification("nothing");
        h.stop_modification();
        assert_eq!(h.slots().len(), 1);
        assert_eq!(h.cursor(), 1);
    }

    #[test]
    fn mutation_outside_gesture_is_ignored() {
        let mut h = History::new();
        let index = add(&mut h, ElementKind::Oval);
        assert_eq!(h.add_element(Element::new(ElementKind::Rect)), None);
        assert_eq!(h.prepare_element_for_modification(index), None);
        assert_eq!(h.slots().len(), 1);
    }

    #[test]
    fn prepare_clones_once_per_gesture() {
        let mut h = History::new();
        let original = add(&mut h, ElementKind::Rect);
        h.start_modification("move");
        let copy = h.prepare_element_for_modification(original).unwrap();
        assert_ne!(copy, original);
        assert_eq!(h.prepare_element_for_modification(copy), Some(copy));
        h.element_mut(copy).unwrap().position = Point::new(5.0, 5.0);
        h.stop_modification();
        assert_eq!(h.visible_indexes(), vec![copy]);
        h.backwards();
        assert_eq!(h.visible_indexes(), vec![original]);
        assert_eq!(h.element(original).unwrap().position, Point::ZERO);
    }

    #[test]
    fn new_slot_truncates_redo_tail() {
        let mut h = History::new();
        add(&mut h, ElementKind::Rect);
        add(&mut h, ElementKind::Oval);
        h.backwards();
        let third = add(&mut h, ElementKind::Line);
        assert_eq!(h.slots().len(), 2);
        assert!(!h.can_go_forwards());
        assert!(visible_set(&h).contains(&third));
    }

    #[test]
    fn removing_element_hides_its_sources() {
        let mut h = History::new();
        let a = add(&mut h, ElementKind::Rect);
        let b = add(&mut h, ElementKind::Oval);
        h.start_modification("delete");
        let mut removing = Element::new(ElementKind::Removing);
        removing.source_indexes = vec![a];
        let r = h.add_element(removing).unwrap();
        h.stop_modification();
        assert_eq!(visible_set(&h), HashSet::from([b, r]));
    }

    #[test]
    fn flagged_elements_need_a_sanction() {
        let mut h = History::new();
        h.start_modification("background");
        let mut bg = Element::new(ElementKind::BackgroundPicture);
        bg.pass_through_filter_only_if_allowed = true;
        let bg_pass2 = bg.pass2_unique_index;
        let bg_index = h.add_element(bg).unwrap();
        h.stop_modification();
        assert!(h.visible_indexes().is_empty());

        h.start_modification("sanction");
        let mut removing = Element::new(ElementKind::Removing);
        removing.allowed_indexes = vec![bg_pass2];
        h.add_element(removing);
        h.stop_modification();
        assert!(visible_set(&h).contains(&bg_index));
    }

    #[test]
    fn cancel_drops_the_gesture() {
        let mut h = History::new();
        let a = add(&mut h, ElementKind::Rect);
        h.start_modification("move");
        h.prepare_element_for_modification(a);
        h.cancel_modification();
        assert_eq!(h.slots().len(), 1);
        assert_eq!(h.cursor(), 1);
        assert_eq!(h.visible_indexes(), vec![a]);
    }

    #[test]
    fn reopened_slot_collects_the_second_element() {
        let mut h = History::new();
        let first = add(&mut h, ElementKind::ZoomInRegion);
        assert!(h.reopen_last_slot());
        let second = h.add_element(Element::new(ElementKind::ZoomInRegion)).unwrap();
        h.stop_modification();
        assert_eq!(h.slots().len(), 1);
        assert_eq!(visible_set(&h), HashSet::from([first, second]));
        h.backwards();
        assert!(h.visible_indexes().is_empty());
    }

    /// Runs a seeded random sequence of creates, edits, deletes and navigation.
    fn random_history(seed: u64, steps: usize) -> History {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut h = History::new();
        for _ in 0..steps {
            let visible = h.visible_indexes();
            match rng.random_range(0..6) {
                0 | 1 => {
                    add(&mut h, ElementKind::Rect);
                }
                2 if !visible.is_empty() => {
                    let target = visible[rng.random_range(0..visible.len())];
                    h.start_modification("edit");
                    let copy = h.prepare_element_for_modification(target).unwrap();
                    h.element_mut(copy).unwrap().rotation += 15.0;
                    h.stop_modification();
                }
                3 if !visible.is_empty() => {
                    let target = visible[rng.random_range(0..visible.len())];
                    h.start_modification("delete");
                    let mut removing = Element::new(ElementKind::Removing);
                    removing.source_indexes = vec![target];
                    h.add_element(removing);
                    h.stop_modification();
                }
                4 => {
                    h.backwards();
                }
                _ => {
                    h.forwards();
                }
            }
        }
        h
    }

    #[test]
    fn indices_stay_unique() {
        for seed in 0..8 {
            let h = random_history(seed, 120);
            let mut seen = HashSet::new();
            for e in h.all_elements() {
                assert!(seen.insert(e.unique_index));
            }
        }
    }

    #[test]
    fn copies_reference_earlier_slots() {
        for seed in 0..8 {
            let h = random_history(seed, 120);
            let mut owner: HashMap<ElementIndex, usize> = HashMap::new();
            for (slot_no, slot) in h.slots().iter().enumerate() {
                for e in &slot.elements {
                    owner.insert(e.unique_index, slot_no);
                }
            }
            for (slot_no, slot) in h.slots().iter().enumerate() {
                for e in &slot.elements {
                    for source in &e.source_indexes {
                        assert!(owner[source] < slot_no);
                    }
                }
            }
        }
    }

    #[test]
    fn filter_changes_only_by_the_added_slot() {
        for seed in 0..8 {
            let h = random_history(seed, 120);
            for k in 0..h.slots().len() {
                let before: HashSet<_> = h.filter(k).into_iter().collect();
                let after: HashSet<_> = h.filter(k + 1).into_iter().collect();
                let slot = &h.slots()[k];
                let introduced: HashSet<_> = slot.elements.iter().map(|e| e.unique_index).collect();
                let suppressed: HashSet<_> = slot
                    .elements
                    .iter()
                    .flat_map(|e| e.source_indexes.iter().copied())
                    .collect();
                for gone in before.difference(&after) {
                    assert!(suppressed.contains(gone));
                }
                for new in after.difference(&before) {
                    assert!(introduced.contains(new));
                }
            }
        }
    }

    #[test]
    fn backwards_then_forwards_round_trips() {
        for seed in 0..8 {
            let mut h = random_history(seed, 120);
            let expected = visible_set(&h);
            let k = h.cursor();
            for _ in 0..k {
                assert!(h.backwards());
            }
            for _ in 0..k {
                assert!(h.forwards());
            }
            assert_eq!(visible_set(&h), expected);
        }
    }
}
