//! Capture-region widget: the rect that bounds the export.

use kurbo::{Point, Rect, Vec2};

use super::{CursorShape, Editor, Gesture};
use crate::geometry;

/// 3×3 partition of the viewport around the capture rect, numbered 1..=9 row by row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Region {
    TopLeft,
    Top,
    TopRight,
    Left,
    Inside,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl Region {
    const GRID: [Region; 9] = [
        Self::TopLeft,
        Self::Top,
        Self::TopRight,
        Self::Left,
        Self::Inside,
        Self::Right,
        Self::BottomLeft,
        Self::Bottom,
        Self::BottomRight,
    ];

    pub fn number(self) -> u8 {
        Self::GRID.iter().position(|r| *r == self).unwrap_or(4) as u8 + 1
    }

    pub fn locate(rect: Rect, pos: Point) -> Self {
        let band = |v: f64, lo: f64, hi: f64| {
            if v < lo {
                0
            } else if v > hi {
                2
            } else {
                1
            }
        };
        let col = band(pos.x, rect.x0, rect.x1);
        let row = band(pos.y, rect.y0, rect.y1);
        Self::GRID[row * 3 + col]
    }

    /// Moves the sides this region owns to `cursor`; the result may be inverted.
    pub fn apply(self, rect: Rect, cursor: Point) -> Rect {
        let mut r = rect;
        match self {
            Self::TopLeft => {
                r.x0 = cursor.x;
                r.y0 = cursor.y;
            }
            Self::Top => r.y0 = cursor.y,
            Self::TopRight => {
                r.x1 = cursor.x;
                r.y0 = cursor.y;
            }
            Self::Left => r.x0 = cursor.x,
            Self::Inside => {}
            Self::Right => r.x1 = cursor.x,
            Self::BottomLeft => {
                r.x0 = cursor.x;
                r.y1 = cursor.y;
            }
            Self::Bottom => r.y1 = cursor.y,
            Self::BottomRight => {
                r.x1 = cursor.x;
                r.y1 = cursor.y;
            }
        }
        r
    }

    pub fn cursor_shape(self) -> CursorShape {
        match self {
            Self::TopLeft | Self::BottomRight => CursorShape::SizeFDiagonal,
            Self::TopRight | Self::BottomLeft => CursorShape::SizeBDiagonal,
            Self::Top | Self::Bottom => CursorShape::SizeVertical,
            Self::Left | Self::Right => CursorShape::SizeHorizontal,
            Self::Inside => CursorShape::Crosshair,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureRegion {
    pub rect: Option<Rect>,
    pub widget_enabled: bool,
}

impl Default for CaptureRegion {
    fn default() -> Self {
        Self {
            rect: None,
            widget_enabled: true,
        }
    }
}

#[derive(Debug)]
pub(crate) struct CaptureDrag {
    pub region: Region,
    pub start_canvas: Point,
    pub start_rect: Option<Rect>,
}

impl Editor {
    pub(crate) fn capture_region_at(&self, pos: Point) -> Region {
        match self.capture.rect {
            Some(rect) => Region::locate(self.viewport.map_rect_to_viewport(rect), pos),
            None => Region::Inside,
        }
    }

    /// Starts defining a new rect, or resizing from an outer region.
    pub(crate) fn capture_press(&mut self, pos: Point) -> bool {
        let canvas = self.viewport.map_to_canvas(pos);
        let region = match self.capture.rect {
            None => Region::BottomRight,
            Some(_) if !self.capture.widget_enabled => return false,
            Some(_) => match self.capture_region_at(pos) {
                Region::Inside => return false,
                region => region,
            },
        };
        let start_rect = self.capture.rect;
        if start_rect.is_none() {
            self.capture.rect = Some(Rect::from_points(canvas, canvas));
        }
        self.gesture = Gesture::Capture(CaptureDrag {
            region,
            start_canvas: canvas,
            start_rect,
        });
        true
    }

    pub(crate) fn capture_move(&mut self, pos: Point) {
        let canvas = self.viewport.map_to_canvas(pos);
        let Gesture::Capture(drag) = &self.gesture else {
            return;
        };
        let rect = match drag.start_rect {
            None => Rect::from_points(drag.start_canvas, canvas),
            Some(rect) => drag.region.apply(rect, canvas),
        };
        self.capture.rect = Some(rect);
    }

    pub(crate) fn capture_release(&mut self, drag: CaptureDrag) {
        let Some(rect) = self.capture.rect.map(|r| geometry::rect_from_points(r.origin(), Point::new(r.x1, r.y1))) else {
            return;
        };
        if rect.width() < 1.0 || rect.height() < 1.0 {
            self.capture.rect = drag.start_rect;
            return;
        }
        log::debug!("capture rect: {rect:?}");
        self.capture.rect = Some(rect);
    }

    /// Arrow-key nudge of the capture rect in canvas units.
    pub fn move_capture_rect(&mut self, delta: Vec2) {
        if let Some(rect) = self.capture.rect.as_mut() {
            *rect = *rect + delta;
        }
    }
}
