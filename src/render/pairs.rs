//! Connective lines between the source and destination of a zoom pair.

use kurbo::Point;

use crate::geometry;
use crate::model::Element;

/// Radius of the circle a pair member is masked to.
pub fn mask_radius(element: &Element) -> f64 {
    (element.width * element.scale_x).abs().min((element.height * element.scale_y).abs()) / 2.0
}

/// Canvas-space segments joining `source` (first of pair) and `dest` (second).
///
/// With a circle mask these are the two outer tangents. Otherwise they are the
/// edges of the convex hull of both oriented rects that run from one rect to
/// the other.
pub fn connector_segments(source: &Element, dest: &Element, circular: bool) -> Vec<(Point, Point)> {
    if circular {
        return geometry::outer_tangent_lines(
            source.position,
            mask_radius(source),
            dest.position,
            mask_radius(dest),
        )
        .map(|lines| lines.to_vec())
        .unwrap_or_default();
    }
    let a = source.canvas_polygon();
    let b = dest.canvas_polygon();
    // Hull in the destination's local frame, so a rotated destination still
    // yields the outline a viewer expects from its own orientation.
    let frame = dest.get_transform(&Default::default(), false, true, false);
    let to_local = frame.inverse();
    let local: Vec<(Point, bool)> = a
        .iter()
        .map(|p| (to_local * *p, true))
        .chain(b.iter().map(|p| (to_local * *p, false)))
        .collect();
    let hull = geometry::convex_hull(&local.iter().map(|(p, _)| *p).collect::<Vec<_>>());
    let from_source = |p: Point| {
        local
            .iter()
            .find(|(q, _)| q.distance(p) < 1e-6)
            .map(|(_, s)| *s)
            .unwrap_or(false)
    };
    let n = hull.len();
    (0..n)
        .filter_map(|i| {
            let (p, q) = (hull[i], hull[(i + 1) % n]);
            (n > 1 && from_source(p) != from_source(q)).then(|| (frame * p, frame * q))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementKind;

    fn framed(start: Point, end: Point) -> Element {
        let mut e = Element::new(ElementKind::ZoomInRegion);
        e.start_point = start;
        e.end_point = end;
        e.finalize_rectangular();
        e
    }

    #[test]
    fn rect_pair_gets_two_bridging_hull_edges() {
        let a = framed(Point::new(0.0, 0.0), Point::new(20.0, 20.0));
        let b = framed(Point::new(100.0, 50.0), Point::new(140.0, 90.0));
        let segments = connector_segments(&a, &b, false);
        assert_eq!(segments.len(), 2);
        for (p, q) in segments {
            let near_a = |x: Point| x.x <= 20.0 + 1e-6;
            assert_ne!(near_a(p), near_a(q));
        }
    }

    #[test]
    fn circle_pair_uses_tangents() {
        let a = framed(Point::new(0.0, 0.0), Point::new(20.0, 20.0));
        let b = framed(Point::new(100.0, 0.0), Point::new(140.0, 40.0));
        let segments = connector_segments(&a, &b, true);
        assert_eq!(segments.len(), 2);
        for (p, q) in segments {
            assert!((p.distance(a.position) - 10.0).abs() < 1e-6);
            assert!((q.distance(b.position) - 20.0).abs() < 1e-6);
        }
    }
}
