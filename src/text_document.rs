//! Plain-text document behind a text element.
//!
//! Caret and anchor are grapheme indices, never byte offsets. The document
//! keeps its own undo/redo stack, independent of the slot history. Layout is
//! a monospace grid so hit testing and selection rects need no font metrics.

use std::ops::Range;

use kurbo::{Point, Rect};
use unicode_segmentation::UnicodeSegmentation;

pub const ADVANCE_RATIO: f64 = 0.6;
pub const LINE_HEIGHT_RATIO: f64 = 1.2;
pub const PADDING_RATIO: f64 = 0.25;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaretMotion {
    Left,
    Right,
    WordLeft,
    WordRight,
    Up,
    Down,
    LineStart,
    LineEnd,
    DocumentStart,
    DocumentEnd,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct DocState {
    text: String,
    caret: usize,
    anchor: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextDocument {
    text: String,
    caret: usize,
    anchor: usize,
    undo_stack: Vec<DocState>,
    redo_stack: Vec<DocState>,
}

/// Grid metrics for one font size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridMetrics {
    pub advance: f64,
    pub line_height: f64,
    pub padding: f64,
}

impl GridMetrics {
    pub fn for_font_size(font_size: f64) -> Self {
        Self {
            advance: ADVANCE_RATIO * font_size,
            line_height: LINE_HEIGHT_RATIO * font_size,
            padding: PADDING_RATIO * font_size,
        }
    }

    pub fn cell_origin(&self, line: usize, col: usize) -> Point {
        Point::new(
            self.padding + col as f64 * self.advance,
            self.padding + line as f64 * self.line_height,
        )
    }
}

impl TextDocument {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let end = text.graphemes(true).count();
        Self {
            text,
            caret: end,
            anchor: end,
            ..Default::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.graphemes(true).count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn anchor(&self) -> usize {
        self.anchor
    }

    pub fn selection(&self) -> Range<usize> {
        self.caret.min(self.anchor)..self.caret.max(self.anchor)
    }

    pub fn has_selection(&self) -> bool {
        self.caret != self.anchor
    }

    pub fn selected_text(&self) -> &str {
        let range = self.selection();
        &self.text[self.byte_offset(range.start)..self.byte_offset(range.end)]
    }

    fn byte_offset(&self, grapheme: usize) -> usize {
        self.text
            .grapheme_indices(true)
            .nth(grapheme)
            .map(|(offset, _)| offset)
            .unwrap_or(self.text.len())
    }

    fn lines(&self) -> Vec<Vec<&str>> {
        self.text
            .split('\n')
            .map(|line| line.graphemes(true).collect())
            .collect()
    }

    /// `(line, column)` of a grapheme index.
    pub fn line_col(&self, index: usize) -> (usize, usize) {
        let mut remaining = index;
        let lines = self.lines();
        let last = lines.len() - 1;
        for (line_no, line) in lines.iter().enumerate() {
            if remaining <= line.len() || line_no == last {
                return (line_no, remaining.min(line.len()));
            }
            // the newline itself is one grapheme
            remaining -= line.len() + 1;
        }
        (last, 0)
    }

    pub fn index_of(&self, line: usize, col: usize) -> usize {
        let lines = self.lines();
        let line = line.min(lines.len() - 1);
        let before: usize = lines[..line].iter().map(|l| l.len() + 1).sum();
        before + col.min(lines[line].len())
    }

    fn snapshot(&self) -> DocState {
        DocState {
            text: self.text.clone(),
            caret: self.caret,
            anchor: self.anchor,
        }
    }

    fn restore(&mut self, state: DocState) {
        self.text = state.text;
        self.caret = state.caret;
        self.anchor = state.anchor;
    }

    fn record_undo(&mut self) {
        let state = self.snapshot();
        self.undo_stack.push(state);
        self.redo_stack.clear();
    }

    fn replace_range(&mut self, range: Range<usize>, with: &str) -> usize {
        let start = self.byte_offset(range.start);
        let end = self.byte_offset(range.end);
        self.text.replace_range(start..end, with);
        range.start + with.graphemes(true).count()
    }

    /// Replaces the selection (if any) with `text`.
    pub fn insert_text(&mut self, text: &str) {
        if text.is_empty() && !self.has_selection() {
            return;
        }
        self.record_undo();
        let caret = self.replace_range(self.selection(), text);
        self.caret = caret;
        self.anchor = caret;
    }

    pub fn backspace(&mut self) {
        if self.has_selection() {
            self.insert_text("");
            return;
        }
        if self.caret == 0 {
            return;
        }
        self.record_undo();
        let caret = self.replace_range(self.caret - 1..self.caret, "");
        self.caret = caret;
        self.anchor = caret;
    }

    pub fn delete_forward(&mut self) {
        if self.has_selection() {
            self.insert_text("");
            return;
        }
        if self.caret >= self.len() {
            return;
        }
        self.record_undo();
        self.replace_range(self.caret..self.caret + 1, "");
    }

    pub fn select_all(&mut self) {
        self.anchor = 0;
        self.caret = self.len();
    }

    pub fn set_caret(&mut self, index: usize, extend: bool) {
        self.caret = index.min(self.len());
        if !extend {
            self.anchor = self.caret;
        }
    }

    pub fn move_caret(&mut self, motion: CaretMotion, extend: bool) {
        let target = self.motion_target(motion);
        self.set_caret(target, extend);
    }

    fn motion_target(&self, motion: CaretMotion) -> usize {
        let len = self.len();
        let (line, col) = self.line_col(self.caret);
        match motion {
            CaretMotion::Left => self.caret.saturating_sub(1),
            CaretMotion::Right => (self.caret + 1).min(len),
            CaretMotion::WordLeft => self.previous_word_start(),
            CaretMotion::WordRight => self.next_word_end(),
            CaretMotion::Up if line == 0 => 0,
            CaretMotion::Up => self.index_of(line - 1, col),
            CaretMotion::Down if line + 1 >= self.lines().len() => len,
            CaretMotion::Down => self.index_of(line + 1, col),
            CaretMotion::LineStart => self.index_of(line, 0),
            CaretMotion::LineEnd => self.index_of(line, usize::MAX),
            CaretMotion::DocumentStart => 0,
            CaretMotion::DocumentEnd => len,
        }
    }

    /// Word segments as grapheme ranges, skipping pure whitespace.
    fn word_ranges(&self) -> Vec<Range<usize>> {
        let mut ranges = Vec::new();
        let mut grapheme = 0;
        for word in self.text.split_word_bounds() {
            let count = word.graphemes(true).count();
            if !word.trim().is_empty() {
                ranges.push(grapheme..grapheme + count);
            }
            grapheme += count;
        }
        ranges
    }

    fn previous_word_start(&self) -> usize {
        self.word_ranges()
            .into_iter()
            .rev()
            .find(|r| r.start < self.caret)
            .map(|r| r.start)
            .unwrap_or(0)
    }

    fn next_word_end(&self) -> usize {
        self.word_ranges()
            .into_iter()
            .find(|r| r.end > self.caret)
            .map(|r| r.end)
            .unwrap_or_else(|| self.len())
    }

    pub fn undo(&mut self) -> bool {
        let Some(state) = self.undo_stack.pop() else {
            return false;
        };
        let current = self.snapshot();
        self.redo_stack.push(current);
        self.restore(state);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(state) = self.redo_stack.pop() else {
            return false;
        };
        let current = self.snapshot();
        self.undo_stack.push(current);
        self.restore(state);
        true
    }

    /// Drops the selected text at `target`.
    ///
    /// Returns `false` without touching the document when there is nothing
    /// selected or `target` lies inside the selection.
    pub fn move_selection_to(&mut self, target: usize, copy: bool) -> bool {
        let selection = self.selection();
        if selection.is_empty() || (selection.start..=selection.end).contains(&target) {
            return false;
        }
        let moved = self.selected_text().to_string();
        let moved_len = selection.len();
        self.record_undo();
        let mut insert_at = target.min(self.len());
        if !copy {
            self.replace_range(selection.clone(), "");
            if insert_at > selection.end {
                insert_at -= moved_len;
            }
        }
        let end = self.replace_range(insert_at..insert_at, &moved);
        self.anchor = insert_at;
        self.caret = end;
        true
    }

    /// Size of the laid-out document including padding.
    pub fn layout_size(&self, font_size: f64) -> (f64, f64) {
        let m = GridMetrics::for_font_size(font_size);
        let lines = self.lines();
        let cols = lines.iter().map(|l| l.len()).max().unwrap_or(0).max(1);
        (
            cols as f64 * m.advance + 2.0 * m.padding,
            lines.len() as f64 * m.line_height + 2.0 * m.padding,
        )
    }

    /// Glyph cells as `(line, column, grapheme)`.
    pub fn cells(&self) -> Vec<(usize, usize, &str)> {
        self.lines()
            .into_iter()
            .enumerate()
            .flat_map(|(line_no, line)| {
                line.into_iter()
                    .enumerate()
                    .map(move |(col, g)| (line_no, col, g))
            })
            .collect()
    }

    pub fn caret_rect(&self, font_size: f64) -> Rect {
        let m = GridMetrics::for_font_size(font_size);
        let (line, col) = self.line_col(self.caret);
        let origin = m.cell_origin(line, col);
        Rect::new(origin.x - 1.0, origin.y, origin.x + 1.0, origin.y + m.line_height)
    }

    /// One rect per line touched by the selection, in document space.
    pub fn selection_rects(&self, font_size: f64) -> Vec<Rect> {
        if !self.has_selection() {
            return Vec::new();
        }
        let m = GridMetrics::for_font_size(font_size);
        let range = self.selection();
        let (l0, c0) = self.line_col(range.start);
        let (l1, c1) = self.line_col(range.end);
        let lines = self.lines();
        (l0..=l1)
            .map(|line| {
                let from = if line == l0 { c0 } else { 0 };
                // selections running past a line end cover one extra cell for the newline
                let to = if line == l1 { c1 } else { lines[line].len() + 1 };
                let a = m.cell_origin(line, from);
                let b = m.cell_origin(line, to);
                Rect::new(a.x, a.y, b.x, b.y + m.line_height)
            })
            .filter(|r| r.width() > 0.0)
            .collect()
    }

    /// Nearest caret index for a point in document space.
    pub fn hit_test(&self, pos: Point, font_size: f64) -> usize {
        let m = GridMetrics::for_font_size(font_size);
        let line_count = self.lines().len();
        let line = ((pos.y - m.padding) / m.line_height).floor().max(0.0) as usize;
        let col = ((pos.x - m.padding) / m.advance).round().max(0.0) as usize;
        self.index_of(line.min(line_count - 1), col)
    }
}
