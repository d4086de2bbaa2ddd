//! Arrow outlines.

use kurbo::{Affine, BezPath, Point};

/// Growth factor of the head with arrow length and thickness.
pub fn scale_factor(length: f64, size: f64) -> f64 {
    ((length + 5.0) / 50.0).clamp(0.0, 1.5) * (0.5 + size)
}

pub fn head_width(length: f64, size: f64) -> f64 {
    30.0 * scale_factor(length, size)
}

/// Filled outline of an arrow from `start` to `tip`.
///
/// `sharp` gives the classic filleted head over a needle spine; otherwise a
/// rounded banner arrow with quadratic fillets.
pub fn arrow_path(start: Point, tip: Point, size: f64, sharp: bool) -> BezPath {
    let d = tip - start;
    let length = d.hypot();
    let local = if sharp {
        sharp_arrow(length, size)
    } else {
        banner_arrow(length, size)
    };
    Affine::translate(start.midpoint(tip).to_vec2()) * Affine::rotate(d.y.atan2(d.x)) * local
}

struct Head {
    tip: Point,
    wing: Point,
    notch: Point,
    inner: Point,
}

/// Head points of the upper half; the lower half mirrors them across the spine.
fn head(length: f64, size: f64) -> Head {
    let t = scale_factor(length, size);
    let half = length / 2.0;
    let head_len = (40.0 * t).min(length);
    let tip = Point::new(half, 0.0);
    let mid = Point::new(half - head_len / 2.0, 0.0);
    Head {
        tip,
        wing: Point::new(half - head_len, 15.0 * t),
        notch: Point::new(half - 0.8 * head_len, 5.0 * t),
        inner: mid.lerp(tip, 0.25),
    }
}

fn mirror(p: Point) -> Point {
    Point::new(p.x, -p.y)
}

fn sharp_arrow(length: f64, size: f64) -> BezPath {
    let h = head(length, size);
    let tail = Point::new(-length / 2.0, 0.0);
    let mut path = BezPath::new();
    path.move_to(tail);
    path.line_to(h.notch);
    path.line_to(h.wing);
    path.curve_to(h.wing.lerp(h.inner, 0.5), h.inner.lerp(h.tip, 0.5), h.tip);
    let (wing, inner) = (mirror(h.wing), mirror(h.inner));
    path.curve_to(inner.lerp(h.tip, 0.5), wing.lerp(inner, 0.5), wing);
    path.line_to(mirror(h.notch));
    path.close_path();
    path
}

fn banner_arrow(length: f64, size: f64) -> BezPath {
    let h = head(length, size);
    let t = scale_factor(length, size);
    let shaft = (4.0 * t).max(1.0);
    let tail_x = -length / 2.0;
    let neck_x = h.wing.x;
    let fillet = |a: Point, b: Point| a.lerp(b, 0.5);

    let mut path = BezPath::new();
    path.move_to((neck_x, shaft));
    path.line_to((tail_x + shaft, shaft));
    path.quad_to((tail_x, shaft), (tail_x, 0.0));
    path.quad_to((tail_x, -shaft), (tail_x + shaft, -shaft));
    path.line_to((neck_x, -shaft));
    let wing = mirror(h.wing);
    path.quad_to(Point::new(neck_x, wing.y), wing);
    path.quad_to(fillet(wing, h.tip), h.tip);
    path.quad_to(fillet(h.wing, h.tip), h.wing);
    path.quad_to(Point::new(neck_x, h.wing.y), Point::new(neck_x, shaft));
    path.close_path();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Shape;

    #[test]
    fn scale_factor_saturates() {
        assert!((scale_factor(45.0, 0.5) - 1.0).abs() < 1e-12);
        assert!((scale_factor(10_000.0, 0.5) - 1.5).abs() < 1e-12);
        assert_eq!(scale_factor(-5.0, 0.5), 0.0);
    }

    #[test]
    fn arrow_spans_start_to_tip() {
        let start = Point::new(10.0, 20.0);
        let tip = Point::new(110.0, 20.0);
        for sharp in [true, false] {
            let bbox = arrow_path(start, tip, 0.3, sharp).bounding_box();
            assert!((bbox.x0 - 10.0).abs() < 1e-6);
            assert!((bbox.x1 - 110.0).abs() < 1e-6);
            assert!(bbox.contains(Point::new(100.0, 20.0)));
        }
    }

    #[test]
    fn arrow_follows_direction() {
        let path = arrow_path(Point::new(0.0, 0.0), Point::new(0.0, 100.0), 0.5, true);
        let bbox = path.bounding_box();
        assert!(bbox.height() > bbox.width());
        assert!(path.contains(Point::new(0.0, 90.0)));
    }
}
