use kurbo::{BezPath, PathEl, Point, Rect, Vec2};

pub const EPSILON: f64 = 1e-9;

pub fn rotate_vec2(v: Vec2, degrees: f64) -> Vec2 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

pub fn rotate_point_around(p: Point, pivot: Point, degrees: f64) -> Point {
    pivot + rotate_vec2(p - pivot, degrees)
}

pub fn angle_degrees(v: Vec2) -> f64 {
    v.y.atan2(v.x).to_degrees()
}

/// Normalised rect spanned by two corners.
pub fn rect_from_points(a: Point, b: Point) -> Rect {
    Rect::from_points(a, b).abs()
}

pub fn aabb_of_points(points: &[Point]) -> Option<Rect> {
    let (first, rest) = points.split_first()?;
    let mut rect = Rect::from_points(*first, *first);
    for p in rest {
        rect = rect.union_pt(*p);
    }
    Some(rect)
}

pub fn rect_corners(rect: Rect) -> [Point; 4] {
    [
        Point::new(rect.x0, rect.y0),
        Point::new(rect.x1, rect.y0),
        Point::new(rect.x1, rect.y1),
        Point::new(rect.x0, rect.y1),
    ]
}

pub fn polygon_center(poly: &[Point]) -> Point {
    aabb_of_points(poly).map(|r| r.center()).unwrap_or(Point::ZERO)
}

/// Moves `end` so the box spanned with `start` is a square, keeping the drag direction.
pub fn constrain_equilateral(start: Point, end: Point) -> Point {
    let d = end - start;
    let side = d.x.abs().max(d.y.abs());
    let sx = if d.x < 0.0 { -1.0 } else { 1.0 };
    let sy = if d.y < 0.0 { -1.0 } else { 1.0 };
    start + Vec2::new(side * sx, side * sy)
}

/// Snaps `end` onto the nearest 45° ray from `start`, keeping the projected length.
pub fn snap_to_45(start: Point, end: Point) -> Point {
    let d = end - start;
    let len = d.hypot();
    if len < EPSILON {
        return end;
    }
    let step = std::f64::consts::FRAC_PI_4;
    let angle = (d.y.atan2(d.x) / step).round() * step;
    let dir = Vec2::from_angle(angle);
    start + dir * d.dot(dir)
}

pub fn lerp_point(a: Point, b: Point, t: f64) -> Point {
    a.lerp(b, t)
}

pub fn nearest_point_on_segment(p: Point, a: Point, b: Point) -> Point {
    let ab = b - a;
    let len2 = ab.dot(ab);
    if len2 <= EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    a + ab * t
}

pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    p.distance(nearest_point_on_segment(p, a, b))
}

/// Nearest point on the outline of a closed polygon (an oriented rect, usually).
pub fn nearest_point_on_polygon(p: Point, poly: &[Point]) -> Option<Point> {
    let n = poly.len();
    if n == 0 {
        return None;
    }
    (0..n)
        .map(|i| nearest_point_on_segment(p, poly[i], poly[(i + 1) % n]))
        .min_by(|a, b| p.distance(*a).total_cmp(&p.distance(*b)))
}

pub fn point_in_polygon(p: Point, poly: &[Point]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (poly[i], poly[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

pub fn polygon_area(poly: &[Point]) -> f64 {
    let n = poly.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let (a, b) = (poly[i], poly[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum();
    (twice * 0.5).abs()
}

fn project_polygon(poly: &[Point], axis: Vec2) -> (f64, f64) {
    poly.iter()
        .map(|p| p.to_vec2().dot(axis))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
}

/// Separating-axis test between two convex polygons.
pub fn convex_polygons_intersect(a: &[Point], b: &[Point]) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    for poly in [a, b] {
        let n = poly.len();
        for i in 0..n {
            let edge = poly[(i + 1) % n] - poly[i];
            let axis = Vec2::new(-edge.y, edge.x);
            if axis.hypot() < EPSILON {
                continue;
            }
            let (a_lo, a_hi) = project_polygon(a, axis);
            let (b_lo, b_hi) = project_polygon(b, axis);
            if a_hi < b_lo || b_hi < a_lo {
                return false;
            }
        }
    }
    true
}

pub fn polygon_intersects_rect(poly: &[Point], rect: Rect) -> bool {
    convex_polygons_intersect(poly, &rect_corners(rect))
}

fn segments_intersect(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    let d1 = (p2 - p1).cross(q1 - p1);
    let d2 = (p2 - p1).cross(q2 - p1);
    let d3 = (q2 - q1).cross(p1 - q1);
    let d4 = (q2 - q1).cross(p2 - q1);
    ((d1 > 0.0) != (d2 > 0.0)) && ((d3 > 0.0) != (d4 > 0.0))
}

pub fn segment_intersects_rect(a: Point, b: Point, rect: Rect) -> bool {
    if rect.contains(a) || rect.contains(b) {
        return true;
    }
    let c = rect_corners(rect);
    (0..4).any(|i| segments_intersect(a, b, c[i], c[(i + 1) % 4]))
}

pub fn flatten_path(path: &BezPath, tolerance: f64) -> Vec<Vec<Point>> {
    let mut polylines: Vec<Vec<Point>> = Vec::new();
    kurbo::flatten(path.elements().iter().copied(), tolerance, |el| match el {
        PathEl::MoveTo(p) => polylines.push(vec![p]),
        PathEl::LineTo(p) => {
            if let Some(last) = polylines.last_mut() {
                last.push(p);
            } else {
                polylines.push(vec![p]);
            }
        }
        PathEl::ClosePath => {
            if let Some(last) = polylines.last_mut() {
                if let Some(first) = last.first().copied() {
                    last.push(first);
                }
            }
        }
        _ => {}
    });
    polylines
}

/// True when the filled path overlaps the rect: an outline segment crosses it,
/// or the rect sits entirely inside the fill.
pub fn path_intersects_rect(path: &BezPath, rect: Rect) -> bool {
    use kurbo::Shape;
    for polyline in flatten_path(path, 0.5) {
        if polyline.len() == 1 && rect.contains(polyline[0]) {
            return true;
        }
        if polyline
            .windows(2)
            .any(|w| segment_intersects_rect(w[0], w[1], rect))
        {
            return true;
        }
    }
    path.contains(rect.center())
}

/// Andrew's monotone chain; counter-clockwise in y-down coordinates is not guaranteed,
/// only that consecutive points form the hull outline.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts: Vec<Point> = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup_by(|a, b| (a.x - b.x).abs() < EPSILON && (a.y - b.y).abs() < EPSILON);
    if pts.len() < 3 {
        return pts;
    }
    let cross = |o: Point, a: Point, b: Point| (a - o).cross(b - o);
    let mut lower: Vec<Point> = Vec::new();
    for p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], *p) <= 0.0
        {
            lower.pop();
        }
        lower.push(*p);
    }
    let mut upper: Vec<Point> = Vec::new();
    for p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], *p) <= 0.0
        {
            upper.pop();
        }
        upper.push(*p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// The two outer tangent segments between circles `(c1, r1)` and `(c2, r2)`.
///
/// Uses `alpha = asin((r_max - r_min) / |c1 - c2|)` against the angle of the
/// centre-to-centre vector. Returns `None` when one circle contains the other.
pub fn outer_tangent_lines(c1: Point, r1: f64, c2: Point, r2: f64) -> Option<[(Point, Point); 2]> {
    let d = c2 - c1;
    let dist = d.hypot();
    let (r_max, r_min) = if r1 >= r2 { (r1, r2) } else { (r2, r1) };
    if dist <= EPSILON || dist <= r_max - r_min {
        return None;
    }
    let alpha = ((r_max - r_min) / dist).asin();
    let theta = d.y.atan2(d.x);
    // Normal direction of the tangent, measured from the larger circle's side.
    let half_pi = std::f64::consts::FRAC_PI_2;
    let offset = if r1 >= r2 {
        half_pi - alpha
    } else {
        half_pi + alpha
    };
    let side = |phi: f64| {
        let n = Vec2::from_angle(phi);
        (c1 + n * r1, c2 + n * r2)
    };
    Some([side(theta + offset), side(theta - offset)])
}

/// Solves `v = s * a + t * b` for `(s, t)`.
pub fn decompose(v: Vec2, a: Vec2, b: Vec2) -> Option<(f64, f64)> {
    let det = a.cross(b);
    if det.abs() < EPSILON {
        return None;
    }
    Some((v.cross(b) / det, a.cross(v) / det))
}

pub fn project_onto(v: Vec2, dir: Vec2) -> Vec2 {
    let len2 = dir.dot(dir);
    if len2 < EPSILON {
        return Vec2::ZERO;
    }
    dir * (v.dot(dir) / len2)
}

/// Fits `content` into `frame` keeping its aspect ratio; returns (scale, offset).
pub fn fit_rect(content: Rect, frame: Rect, margin: f64) -> (f64, Vec2) {
    let avail_w = (frame.width() - 2.0 * margin).max(1.0);
    let avail_h = (frame.height() - 2.0 * margin).max(1.0);
    let w = content.width().max(EPSILON);
    let h = content.height().max(EPSILON);
    let scale = (avail_w / w).min(avail_h / h);
    let offset = frame.center().to_vec2() - content.center().to_vec2() * scale;
    (scale, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        a.distance(b) < 1e-9
    }

    #[test]
    fn equilateral_keeps_drag_direction() {
        let start = Point::new(10.0, 10.0);
        assert!(close(
            constrain_equilateral(start, Point::new(40.0, 20.0)),
            Point::new(40.0, 40.0)
        ));
        assert!(close(
            constrain_equilateral(start, Point::new(-5.0, 30.0)),
            Point::new(-10.0, 30.0)
        ));
    }

    #[test]
    fn snap_to_45_rounds_direction() {
        let snapped = snap_to_45(Point::ZERO, Point::new(100.0, 10.0));
        assert!((snapped.y).abs() < 1e-9);
        assert!((snapped.x - 100.0).abs() < 1e-9);
        let diag = snap_to_45(Point::ZERO, Point::new(50.0, 45.0));
        assert!((diag.x - diag.y).abs() < 1e-9);
    }

    #[test]
    fn hull_of_square_with_inner_point() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(5.0, 5.0),
        ];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&Point::new(5.0, 5.0)));
    }

    #[test]
    fn nearest_point_on_square_outline() {
        let square = rect_corners(Rect::new(0.0, 0.0, 10.0, 10.0));
        let p = nearest_point_on_polygon(Point::new(5.0, -7.0), &square).unwrap();
        assert!(close(p, Point::new(5.0, 0.0)));
        let inner = nearest_point_on_polygon(Point::new(8.0, 5.0), &square).unwrap();
        assert!(close(inner, Point::new(10.0, 5.0)));
    }

    #[test]
    fn point_in_rotated_polygon() {
        let diamond = [
            Point::new(0.0, -10.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(-10.0, 0.0),
        ];
        assert!(point_in_polygon(Point::ZERO, &diamond));
        assert!(!point_in_polygon(Point::new(8.0, 8.0), &diamond));
        assert!((polygon_area(&diamond) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn tangent_lines_touch_both_circles() {
        let c1 = Point::new(0.0, 0.0);
        let c2 = Point::new(100.0, 0.0);
        let lines = outer_tangent_lines(c1, 20.0, c2, 40.0).unwrap();
        for (a, b) in lines {
            assert!((a.distance(c1) - 20.0).abs() < 1e-9);
            assert!((b.distance(c2) - 40.0).abs() < 1e-9);
            // The segment is perpendicular to both radii.
            let dir = b - a;
            assert!(dir.dot(a - c1).abs() < 1e-6);
            assert!(dir.dot(b - c2).abs() < 1e-6);
        }
        assert!(outer_tangent_lines(c1, 50.0, Point::new(10.0, 0.0), 5.0).is_none());
    }

    #[test]
    fn decompose_recovers_coefficients() {
        let a = Vec2::new(2.0, 1.0);
        let b = Vec2::new(-1.0, 3.0);
        let v = a * 1.5 + b * -0.25;
        let (s, t) = decompose(v, a, b).unwrap();
        assert!((s - 1.5).abs() < 1e-12);
        assert!((t + 0.25).abs() < 1e-12);
    }

    #[test]
    fn sat_detects_separation() {
        let tri = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
        ];
        assert!(polygon_intersects_rect(&tri, Rect::new(1.0, 1.0, 3.0, 3.0)));
        assert!(!polygon_intersects_rect(&tri, Rect::new(8.0, 8.0, 12.0, 12.0)));
    }
}
