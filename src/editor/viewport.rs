use kurbo::{Affine, Point, Rect, Vec2};

use crate::geometry;

pub const ZOOM_IN_FACTOR: f64 = 10.0 / 9.0;
pub const ZOOM_OUT_FACTOR: f64 = 9.0 / 10.0;

/// Which axes a zoom step affects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoomAxes {
    Both,
    XOnly,
    YOnly,
}

/// Canvas pan/zoom: `viewport = origin + canvas · scale`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub origin: Vec2,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            origin: Vec2::ZERO,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }
}

impl Viewport {
    pub fn global_scale(&self) -> Affine {
        Affine::scale_non_uniform(self.scale_x, self.scale_y)
    }

    pub fn canvas_to_viewport(&self) -> Affine {
        Affine::translate(self.origin) * self.global_scale()
    }

    pub fn map_to_viewport(&self, canvas: Point) -> Point {
        Point::new(
            self.origin.x + canvas.x * self.scale_x,
            self.origin.y + canvas.y * self.scale_y,
        )
    }

    pub fn map_to_canvas(&self, viewport: Point) -> Point {
        Point::new(
            (viewport.x - self.origin.x) / self.scale_x,
            (viewport.y - self.origin.y) / self.scale_y,
        )
    }

    pub fn map_rect_to_viewport(&self, rect: Rect) -> Rect {
        Rect::from_points(self.map_to_viewport(rect.origin()), self.map_to_viewport(Point::new(rect.x1, rect.y1)))
    }

    pub fn map_rect_to_canvas(&self, rect: Rect) -> Rect {
        Rect::from_points(self.map_to_canvas(rect.origin()), self.map_to_canvas(Point::new(rect.x1, rect.y1)))
    }

    /// Scales the canvas by `factor` keeping `pivot` (viewport space) fixed.
    pub fn zoom_about(&mut self, pivot: Point, factor: f64, axes: ZoomAxes) {
        let pivot = pivot.to_vec2();
        let (fx, fy) = match axes {
            ZoomAxes::Both => (factor, factor),
            ZoomAxes::XOnly => (factor, 1.0),
            ZoomAxes::YOnly => (1.0, factor),
        };
        let new_sx = (self.scale_x * fx).clamp(0.01, 100.0);
        let new_sy = (self.scale_y * fy).clamp(0.01, 100.0);
        let fx = new_sx / self.scale_x;
        let fy = new_sy / self.scale_y;
        let rel = self.origin - pivot;
        self.origin = Vec2::new(rel.x * fx, rel.y * fy) + pivot;
        self.scale_x = new_sx;
        self.scale_y = new_sy;
    }

    pub fn pan(&mut self, delta: Vec2) {
        self.origin += delta;
    }

    /// Fits `content` (canvas space) into `frame` (viewport space) with equal axis scales.
    pub fn fit(&mut self, content: Rect, frame: Rect, margin: f64) {
        if content.width() < geometry::EPSILON || content.height() < geometry::EPSILON {
            return;
        }
        let (scale, offset) = geometry::fit_rect(content, frame, margin);
        self.scale_x = scale;
        self.scale_y = scale;
        self.origin = offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn mapping_round_trips_after_pan_and_zoom() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut vp = Viewport::default();
        for _ in 0..200 {
            match rng.random_range(0..4) {
                0 => vp.pan(Vec2::new(rng.random_range(-50.0..50.0), rng.random_range(-50.0..50.0))),
                1 => vp.zoom_about(Point::new(rng.random_range(0.0..800.0), rng.random_range(0.0..600.0)), ZOOM_IN_FACTOR, ZoomAxes::Both),
                2 => vp.zoom_about(Point::new(rng.random_range(0.0..800.0), rng.random_range(0.0..600.0)), ZOOM_OUT_FACTOR, ZoomAxes::XOnly),
                _ => vp.zoom_about(Point::new(rng.random_range(0.0..800.0), rng.random_range(0.0..600.0)), ZOOM_IN_FACTOR, ZoomAxes::YOnly),
            }
            let p = Point::new(rng.random_range(-1000.0..1000.0), rng.random_range(-1000.0..1000.0));
            let back = vp.map_to_viewport(vp.map_to_canvas(p));
            assert!(back.distance(p) < 1e-6, "{p:?} -> {back:?}");
        }
    }

    #[test]
    fn zoom_keeps_pivot_fixed() {
        let mut vp = Viewport {
            origin: Vec2::new(12.0, -7.0),
            scale_x: 1.5,
            scale_y: 0.75,
        };
        let pivot = Point::new(300.0, 200.0);
        let under = vp.map_to_canvas(pivot);
        vp.zoom_about(pivot, ZOOM_IN_FACTOR, ZoomAxes::Both);
        assert!(vp.map_to_viewport(under).distance(pivot) < 1e-9);
    }

    #[test]
    fn axis_zoom_only_touches_one_axis() {
        let mut vp = Viewport::default();
        vp.zoom_about(Point::ZERO, ZOOM_IN_FACTOR, ZoomAxes::XOnly);
        assert!((vp.scale_x - ZOOM_IN_FACTOR).abs() < 1e-12);
        assert_eq!(vp.scale_y, 1.0);
        vp.zoom_about(Point::ZERO, ZOOM_OUT_FACTOR, ZoomAxes::YOnly);
        assert!((vp.scale_y - ZOOM_OUT_FACTOR).abs() < 1e-12);
    }
}
