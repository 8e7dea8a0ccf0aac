//! Pairwise overlap, containment, and adjacency predicates.
//!
//! All queries thread a `clearance` (or `dist_error`) tolerance: overlap
//! tests shrink the shapes by the clearance, adjacency tests accept faces
//! within `dist_error` of each other. This tolerance is the sole defense
//! against double-counting molecules on coincident faces, so every caller
//! that participates in adjacency resolution must pass it through.
//!
//! Shape pairs without a defined predicate fail with
//! `UnsupportedShapePair` rather than silently returning false.

use plume_core::{PlumeError, Result};

use crate::shape::{point_distance, sq, Axis, Boundary, CardinalDir, Shape};

fn pair_name(a: &Boundary, b: &Boundary) -> String {
    format!("{}/{}", a.shape.name(), b.shape.name())
}

/// Squared distance from a point to the nearest point of an axis-aligned
/// box given by extents, accumulated per axis.
fn box_point_dist_sq(coor: &[f64; 6], p: &[f64; 3]) -> f64 {
    let mut d = 0.0;
    for i in 0..3 {
        if p[i] < coor[2 * i] {
            d += sq(coor[2 * i] - p[i]);
        } else if p[i] > coor[2 * i + 1] {
            d += sq(p[i] - coor[2 * i + 1]);
        }
    }
    d
}

/// Do two boundaries share any point after shrinking by `clearance`,
/// with neither surrounding the other?
pub fn intersects(a: &Boundary, b: &Boundary, clearance: f64) -> Result<bool> {
    match (a.shape, b.shape) {
        (Shape::Rectangle, Shape::Rectangle) => {
            // Coplanar rectangles only.
            let (pa, pb) = match (a.degenerate_axis(), b.degenerate_axis()) {
                (Some(pa), Some(pb)) => (pa, pb),
                _ => return Err(PlumeError::shape_pair("intersects", pair_name(a, b))),
            };
            if pa != pb {
                return Ok(false);
            }
            let i = pa.index();
            if (a.coor[2 * i] - b.coor[2 * i]).abs() > clearance {
                return Ok(false);
            }
            let (j, k) = pa.cross();
            Ok(a.coor[2 * j] < b.coor[2 * j + 1]
                && a.coor[2 * j + 1] > b.coor[2 * j]
                && a.coor[2 * k] < b.coor[2 * k + 1]
                && a.coor[2 * k + 1] > b.coor[2 * k])
        }
        (Shape::RectangularBox, Shape::RectangularBox) => Ok(a.coor[0] < b.coor[1]
            && a.coor[1] > b.coor[0]
            && a.coor[2] < b.coor[3]
            && a.coor[3] > b.coor[2]
            && a.coor[4] < b.coor[5]
            && a.coor[5] > b.coor[4]),
        (Shape::RectangularBox, Shape::Sphere) => {
            let d = box_point_dist_sq(&a.coor, &b.center());
            Ok(d < sq(b.radius() + clearance)
                && !surrounds(a, b, 0.0)?
                && !surrounds(b, a, 0.0)?)
        }
        (Shape::Sphere, Shape::RectangularBox) => intersects(b, a, clearance),
        (Shape::Sphere, Shape::Sphere) => {
            let d = point_distance(&a.center(), &b.center());
            Ok(d < a.radius() + b.radius() + clearance && d > (a.radius() - b.radius()).abs())
        }
        (Shape::Cylinder(axis), Shape::RectangularBox) => {
            let i = axis.index();
            // Axial extents must overlap.
            if a.coor[i] >= b.coor[2 * i + 1] || a.coor[i] + a.length() <= b.coor[2 * i] {
                return Ok(false);
            }
            if !circle_rect_overlap(a, b, axis, clearance) {
                return Ok(false);
            }
            Ok(!surrounds(a, b, 0.0)? && !surrounds(b, a, 0.0)?)
        }
        (Shape::RectangularBox, Shape::Cylinder(_)) => intersects(b, a, clearance),
        (Shape::Cylinder(axis_a), Shape::Cylinder(axis_b)) => {
            if axis_a != axis_b {
                return Err(PlumeError::shape_pair("intersects", pair_name(a, b)));
            }
            let i = axis_a.index();
            if a.coor[i] >= b.coor[i] + b.length() || a.coor[i] + a.length() <= b.coor[i] {
                return Ok(false);
            }
            let (j, k) = axis_a.cross();
            let d = (sq(a.coor[j] - b.coor[j]) + sq(a.coor[k] - b.coor[k])).sqrt();
            Ok(d < a.radius() + b.radius() + clearance && d > (a.radius() - b.radius()).abs())
        }
        _ => Err(PlumeError::shape_pair("intersects", pair_name(a, b))),
    }
}

/// Cross-section overlap between a cylinder's disk and a box's in-plane
/// rectangle. The three overlap modes are: a rectangle corner inside the
/// circle, the circle center inside the rectangle, or the circle crossing
/// a rectangle edge.
fn circle_rect_overlap(cyl: &Boundary, boxb: &Boundary, axis: Axis, clearance: f64) -> bool {
    let (j, k) = axis.cross();
    let cj = cyl.coor[j];
    let ck = cyl.coor[k];
    let r_sq = sq(cyl.radius() + clearance);

    // The four rectangle corners, each tested against the circle.
    let corner_ll = sq(boxb.coor[2 * j] - cj) + sq(boxb.coor[2 * k] - ck);
    let corner_lh = sq(boxb.coor[2 * j] - cj) + sq(boxb.coor[2 * k + 1] - ck);
    let corner_hl = sq(boxb.coor[2 * j + 1] - cj) + sq(boxb.coor[2 * k] - ck);
    let corner_hh = sq(boxb.coor[2 * j + 1] - cj) + sq(boxb.coor[2 * k + 1] - ck);
    if corner_ll < r_sq || corner_lh < r_sq || corner_hl < r_sq || corner_hh < r_sq {
        return true;
    }

    // Circle center inside the rectangle.
    if cj >= boxb.coor[2 * j]
        && cj <= boxb.coor[2 * j + 1]
        && ck >= boxb.coor[2 * k]
        && ck <= boxb.coor[2 * k + 1]
    {
        return true;
    }

    // Circle crossing an edge: clamp the center to the rectangle.
    let mut d = 0.0;
    if cj < boxb.coor[2 * j] {
        d += sq(boxb.coor[2 * j] - cj);
    } else if cj > boxb.coor[2 * j + 1] {
        d += sq(cj - boxb.coor[2 * j + 1]);
    }
    if ck < boxb.coor[2 * k] {
        d += sq(boxb.coor[2 * k] - ck);
    } else if ck > boxb.coor[2 * k + 1] {
        d += sq(ck - boxb.coor[2 * k + 1]);
    }
    d < r_sq
}

/// Is `inner` entirely inside `outer`, with at least `clearance` between
/// their surfaces?
pub fn surrounds(outer: &Boundary, inner: &Boundary, clearance: f64) -> Result<bool> {
    match (outer.shape, inner.shape) {
        (Shape::Rectangle, Shape::Rectangle) | (Shape::RectangularBox, Shape::RectangularBox) => {
            Ok(inner.coor[0] >= outer.coor[0] + clearance
                && inner.coor[1] <= outer.coor[1] - clearance
                && inner.coor[2] >= outer.coor[2] + clearance
                && inner.coor[3] <= outer.coor[3] - clearance
                && inner.coor[4] >= outer.coor[4] + clearance
                && inner.coor[5] <= outer.coor[5] - clearance)
        }
        (Shape::RectangularBox, Shape::Rectangle) => {
            // A rectangle is inside a box when its extents are, except that
            // clearance does not apply along the degenerate axis.
            let plane = inner
                .degenerate_axis()
                .ok_or_else(|| PlumeError::shape_pair("surrounds", pair_name(outer, inner)))?;
            for i in 0..3 {
                let c = if i == plane.index() { 0.0 } else { clearance };
                if inner.coor[2 * i] < outer.coor[2 * i] + c
                    || inner.coor[2 * i + 1] > outer.coor[2 * i + 1] - c
                {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Shape::Sphere, Shape::RectangularBox) => {
            // All eight box corners must be inside the shrunk sphere.
            let c = inner.coor;
            for &x in &[c[0], c[1]] {
                for &y in &[c[2], c[3]] {
                    for &z in &[c[4], c[5]] {
                        if outer.radius() < point_distance(&[x, y, z], &outer.center()) + clearance
                        {
                            return Ok(false);
                        }
                    }
                }
            }
            Ok(true)
        }
        (Shape::RectangularBox, Shape::Sphere) => {
            let c = inner.center();
            let r = inner.radius();
            Ok(r <= c[0] - outer.coor[0] - clearance
                && r <= outer.coor[1] - c[0] - clearance
                && r <= c[1] - outer.coor[2] - clearance
                && r <= outer.coor[3] - c[1] - clearance
                && r <= c[2] - outer.coor[4] - clearance
                && r <= outer.coor[5] - c[2] - clearance)
        }
        (Shape::Sphere, Shape::Sphere) => Ok(outer.radius()
            >= inner.radius() + point_distance(&outer.center(), &inner.center()) + clearance),
        (Shape::Cylinder(axis), Shape::RectangularBox) => {
            let i = axis.index();
            if inner.coor[2 * i] < outer.coor[i] + clearance
                || inner.coor[2 * i + 1] > outer.coor[i] + outer.length() - clearance
            {
                return Ok(false);
            }
            // Each in-plane box corner must be radially inside.
            let (j, k) = axis.cross();
            let r = outer.radius() - clearance;
            if r <= 0.0 {
                return Ok(false);
            }
            let r_sq = sq(r);
            for &u in &[inner.coor[2 * j], inner.coor[2 * j + 1]] {
                for &v in &[inner.coor[2 * k], inner.coor[2 * k + 1]] {
                    if sq(u - outer.coor[j]) + sq(v - outer.coor[k]) > r_sq {
                        return Ok(false);
                    }
                }
            }
            Ok(true)
        }
        (Shape::RectangularBox, Shape::Cylinder(axis)) => {
            let i = axis.index();
            if inner.coor[i] < outer.coor[2 * i] + clearance
                || inner.coor[i] + inner.length() > outer.coor[2 * i + 1] - clearance
            {
                return Ok(false);
            }
            let (j, k) = axis.cross();
            let r = inner.radius();
            Ok(inner.coor[j] - r >= outer.coor[2 * j] + clearance
                && inner.coor[j] + r <= outer.coor[2 * j + 1] - clearance
                && inner.coor[k] - r >= outer.coor[2 * k] + clearance
                && inner.coor[k] + r <= outer.coor[2 * k + 1] - clearance)
        }
        (Shape::Cylinder(axis_a), Shape::Cylinder(axis_b)) => {
            if axis_a != axis_b {
                return Err(PlumeError::shape_pair("surrounds", pair_name(outer, inner)));
            }
            let i = axis_a.index();
            if inner.coor[i] < outer.coor[i] + clearance
                || inner.coor[i] + inner.length() > outer.coor[i] + outer.length() - clearance
            {
                return Ok(false);
            }
            let (j, k) = axis_a.cross();
            let d = (sq(inner.coor[j] - outer.coor[j]) + sq(inner.coor[k] - outer.coor[k])).sqrt();
            Ok(d <= outer.radius() - inner.radius() - clearance)
        }
        _ => Err(PlumeError::shape_pair("surrounds", pair_name(outer, inner))),
    }
}

/// Are two boundaries adjacent (sharing a face without intersecting)?
///
/// Returns the direction of the face of `a` that is shared with `b`.
/// Defined for box/box, coplanar rectangle/rectangle, and same-axis
/// cylinder/cylinder; other pairs are simply not adjacent.
pub fn adjacent(a: &Boundary, b: &Boundary, dist_error: f64) -> Result<Option<CardinalDir>> {
    match (a.shape, b.shape) {
        (Shape::Rectangle, Shape::Rectangle) => {
            let (pa, pb) = match (a.degenerate_axis(), b.degenerate_axis()) {
                (Some(pa), Some(pb)) => (pa, pb),
                _ => return Ok(None),
            };
            if pa != pb || (a.coor[2 * pa.index()] - b.coor[2 * pa.index()]).abs() > dist_error {
                return Ok(None);
            }
            let (j, k) = pa.cross();
            // Share an edge along one in-plane axis while overlapping the other.
            if overlap_along(a, b, k, dist_error) {
                if let Some(dir) = face_coincide(a, b, j, dist_error) {
                    return Ok(Some(dir));
                }
            }
            if overlap_along(a, b, j, dist_error) {
                if let Some(dir) = face_coincide(a, b, k, dist_error) {
                    return Ok(Some(dir));
                }
            }
            Ok(None)
        }
        (Shape::RectangularBox, Shape::RectangularBox) => {
            // Share a face normal to one axis while overlapping the other two.
            for axis in 0..3 {
                let (j, k) = Axis::from_index(axis).cross();
                if overlap_along(a, b, j, dist_error) && overlap_along(a, b, k, dist_error) {
                    if let Some(dir) = face_coincide(a, b, axis, dist_error) {
                        return Ok(Some(dir));
                    }
                }
            }
            Ok(None)
        }
        (Shape::Cylinder(axis_a), Shape::Cylinder(axis_b)) => {
            if axis_a != axis_b {
                return Ok(None);
            }
            let i = axis_a.index();
            let (j, k) = axis_a.cross();
            // Cross-sections must overlap for the caps to share area.
            let d = (sq(a.coor[j] - b.coor[j]) + sq(a.coor[k] - b.coor[k])).sqrt();
            if d >= a.radius() + b.radius() {
                return Ok(None);
            }
            let (lo, hi) = CardinalDir::along(axis_a);
            if (a.coor[i] - (b.coor[i] + b.length())).abs() < dist_error {
                return Ok(Some(lo));
            }
            if (b.coor[i] - (a.coor[i] + a.length())).abs() < dist_error {
                return Ok(Some(hi));
            }
            Ok(None)
        }
        _ => Ok(None),
    }
}

/// Do the extents of `a` and `b` overlap by more than `dist_error` along
/// the given axis?
fn overlap_along(a: &Boundary, b: &Boundary, axis: usize, dist_error: f64) -> bool {
    a.coor[2 * axis + 1] > b.coor[2 * axis] + dist_error
        && b.coor[2 * axis + 1] > a.coor[2 * axis] + dist_error
}

/// Do `a` and `b` have coincident faces normal to the given axis? Returns
/// the direction of the face of `a` that touches `b`.
fn face_coincide(a: &Boundary, b: &Boundary, axis: usize, dist_error: f64) -> Option<CardinalDir> {
    let (lo, hi) = CardinalDir::along(Axis::from_index(axis));
    if (a.coor[2 * axis] - b.coor[2 * axis + 1]).abs() < dist_error {
        return Some(lo);
    }
    if (b.coor[2 * axis] - a.coor[2 * axis + 1]).abs() < dist_error {
        return Some(hi);
    }
    None
}

/// Intersection of two boundaries as a new boundary.
///
/// Box/box is the per-axis min/max box (possibly empty). When one shape
/// fully surrounds the other, the inner boundary is returned; disjoint
/// round pairs return an empty box; partially-overlapping round pairs are
/// unsupported.
pub fn intersect_boundary(a: &Boundary, b: &Boundary) -> Result<Boundary> {
    let empty = Boundary::rectangular_box([0.0; 6]);
    match (a.shape, b.shape) {
        (Shape::Rectangle, Shape::Rectangle)
        | (Shape::RectangularBox, Shape::RectangularBox)
        | (Shape::Rectangle, Shape::RectangularBox)
        | (Shape::RectangularBox, Shape::Rectangle) => {
            let coor = [
                a.coor[0].max(b.coor[0]),
                a.coor[1].min(b.coor[1]),
                a.coor[2].max(b.coor[2]),
                a.coor[3].min(b.coor[3]),
                a.coor[4].max(b.coor[4]),
                a.coor[5].min(b.coor[5]),
            ];
            let shape = if a.shape == Shape::Rectangle || b.shape == Shape::Rectangle {
                Shape::Rectangle
            } else {
                Shape::RectangularBox
            };
            Ok(Boundary { shape, coor })
        }
        (Shape::Cylinder(axis_a), Shape::Cylinder(axis_b)) if axis_a == axis_b => {
            let i = axis_a.index();
            let lo = a.coor[i].max(b.coor[i]);
            let hi = (a.coor[i] + a.length()).min(b.coor[i] + b.length());
            if hi <= lo {
                return Ok(empty);
            }
            let (j, k) = axis_a.cross();
            let d = (sq(a.coor[j] - b.coor[j]) + sq(a.coor[k] - b.coor[k])).sqrt();
            let (inner, outer) = if a.radius() <= b.radius() { (a, b) } else { (b, a) };
            if d + inner.radius() <= outer.radius() {
                let mut anchor = inner.center();
                anchor[i] = lo;
                Ok(Boundary::cylinder(axis_a, anchor, inner.radius(), hi - lo))
            } else if d >= a.radius() + b.radius() {
                Ok(empty)
            } else {
                Err(PlumeError::shape_pair("intersect_boundary", pair_name(a, b)))
            }
        }
        (Shape::Cylinder(axis), Shape::RectangularBox) => intersect_cyl_box(a, b, axis),
        (Shape::RectangularBox, Shape::Cylinder(axis)) => intersect_cyl_box(b, a, axis),
        _ if a.shape == Shape::Sphere || b.shape == Shape::Sphere => {
            if surrounds(b, a, 0.0).unwrap_or(false) {
                Ok(*a)
            } else if surrounds(a, b, 0.0).unwrap_or(false) {
                Ok(*b)
            } else if !intersects(a, b, 0.0)? {
                Ok(empty)
            } else {
                Err(PlumeError::shape_pair("intersect_boundary", pair_name(a, b)))
            }
        }
        _ => Err(PlumeError::shape_pair("intersect_boundary", pair_name(a, b))),
    }
}

fn intersect_cyl_box(cyl: &Boundary, boxb: &Boundary, axis: Axis) -> Result<Boundary> {
    let empty = Boundary::rectangular_box([0.0; 6]);
    let i = axis.index();
    let lo = cyl.coor[i].max(boxb.coor[2 * i]);
    let hi = (cyl.coor[i] + cyl.length()).min(boxb.coor[2 * i + 1]);
    if hi <= lo {
        return Ok(empty);
    }
    let (j, k) = axis.cross();
    // Box cross-section entirely inside the disk?
    let r_sq = cyl.radius_sq();
    let corners_inside = [
        (boxb.coor[2 * j], boxb.coor[2 * k]),
        (boxb.coor[2 * j], boxb.coor[2 * k + 1]),
        (boxb.coor[2 * j + 1], boxb.coor[2 * k]),
        (boxb.coor[2 * j + 1], boxb.coor[2 * k + 1]),
    ]
    .iter()
    .all(|&(u, v)| sq(u - cyl.coor[j]) + sq(v - cyl.coor[k]) <= r_sq);
    if corners_inside {
        let mut coor = boxb.coor;
        coor[2 * i] = lo;
        coor[2 * i + 1] = hi;
        return Ok(Boundary::rectangular_box(coor));
    }
    // Disk entirely inside the box cross-section?
    let r = cyl.radius();
    if cyl.coor[j] - r >= boxb.coor[2 * j]
        && cyl.coor[j] + r <= boxb.coor[2 * j + 1]
        && cyl.coor[k] - r >= boxb.coor[2 * k]
        && cyl.coor[k] + r <= boxb.coor[2 * k + 1]
    {
        let mut anchor = cyl.center();
        anchor[i] = lo;
        return Ok(Boundary::cylinder(axis, anchor, r, hi - lo));
    }
    if !circle_rect_overlap(cyl, boxb, axis, 0.0) {
        return Ok(empty);
    }
    Err(PlumeError::shape_pair(
        "intersect_boundary",
        pair_name(cyl, boxb),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{Axis, Boundary, CardinalDir};

    fn boxb(coor: [f64; 6]) -> Boundary {
        Boundary::rectangular_box(coor)
    }

    #[test]
    fn test_box_box_overlap_and_touching() {
        let a = boxb([0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        let b = boxb([0.5, 1.5, 0.0, 1.0, 0.0, 1.0]);
        let c = boxb([1.0, 2.0, 0.0, 1.0, 0.0, 1.0]);
        assert!(intersects(&a, &b, 0.0).unwrap());
        // Touching faces do not intersect; they are adjacent.
        assert!(!intersects(&a, &c, 0.0).unwrap());
        assert_eq!(
            adjacent(&a, &c, 1e-9).unwrap(),
            Some(CardinalDir::Right)
        );
        assert_eq!(adjacent(&c, &a, 1e-9).unwrap(), Some(CardinalDir::Left));
    }

    #[test]
    fn test_box_adjacency_all_directions() {
        let a = boxb([0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        let below = boxb([0.0, 1.0, -1.0, 0.0, 0.0, 1.0]);
        let above = boxb([0.0, 1.0, 1.0, 2.0, 0.0, 1.0]);
        let front = boxb([0.0, 1.0, 0.0, 1.0, -1.0, 0.0]);
        let behind = boxb([0.0, 1.0, 0.0, 1.0, 1.0, 2.0]);
        assert_eq!(adjacent(&a, &below, 1e-9).unwrap(), Some(CardinalDir::Down));
        assert_eq!(adjacent(&a, &above, 1e-9).unwrap(), Some(CardinalDir::Up));
        assert_eq!(adjacent(&a, &front, 1e-9).unwrap(), Some(CardinalDir::In));
        assert_eq!(adjacent(&a, &behind, 1e-9).unwrap(), Some(CardinalDir::Out));
        // Diagonal contact is not adjacency.
        let corner = boxb([1.0, 2.0, 1.0, 2.0, 0.0, 1.0]);
        assert_eq!(adjacent(&a, &corner, 1e-9).unwrap(), None);
    }

    #[test]
    fn test_sphere_box_intersect() {
        let b = boxb([0.0, 2.0, 0.0, 2.0, 0.0, 2.0]);
        let s = Boundary::sphere([3.0, 1.0, 1.0], 1.5);
        assert!(intersects(&b, &s, 0.0).unwrap());
        let far = Boundary::sphere([10.0, 1.0, 1.0], 1.5);
        assert!(!intersects(&b, &far, 0.0).unwrap());
        // A sphere fully inside the box does not "intersect" it.
        let inside = Boundary::sphere([1.0, 1.0, 1.0], 0.5);
        assert!(!intersects(&b, &inside, 0.0).unwrap());
        assert!(surrounds(&b, &inside, 0.0).unwrap());
        assert!(surrounds(&b, &inside, 0.4).unwrap());
        assert!(!surrounds(&b, &inside, 0.6).unwrap());
    }

    #[test]
    fn test_sphere_surround_box_checks_corners() {
        let s = Boundary::sphere([0.0, 0.0, 0.0], 2.0);
        let inside = boxb([-1.0, 1.0, -0.5, 0.5, -0.5, 0.5]);
        assert!(surrounds(&s, &inside, 0.0).unwrap());
        // Fits in extent per axis but a corner pokes out of the ball.
        let corner_out = boxb([-1.5, 1.5, -1.5, 1.5, -1.5, 1.5]);
        assert!(!surrounds(&s, &corner_out, 0.0).unwrap());
    }

    #[test]
    fn test_cylinder_box_overlap() {
        let c = Boundary::cylinder(Axis::Z, [0.0, 0.0, 0.0], 1.0, 4.0);
        let through = boxb([-0.5, 0.5, -0.5, 0.5, 1.0, 2.0]);
        // Box inside the cylinder is surrounded, not intersecting.
        assert!(surrounds(&c, &through, 0.0).unwrap());
        assert!(!intersects(&c, &through, 0.0).unwrap());
        let poking = boxb([0.5, 2.0, -0.5, 0.5, 1.0, 2.0]);
        assert!(intersects(&c, &poking, 0.0).unwrap());
        let outside = boxb([5.0, 6.0, 5.0, 6.0, 1.0, 2.0]);
        assert!(!intersects(&c, &outside, 0.0).unwrap());
        // No axial overlap.
        let past_cap = boxb([-0.5, 0.5, -0.5, 0.5, 4.0, 5.0]);
        assert!(!intersects(&c, &past_cap, 0.0).unwrap());
    }

    #[test]
    fn test_cylinder_cylinder_adjacency_and_surround() {
        let a = Boundary::cylinder(Axis::X, [0.0, 0.0, 0.0], 1.0, 2.0);
        let b = Boundary::cylinder(Axis::X, [2.0, 0.0, 0.0], 1.0, 3.0);
        assert_eq!(adjacent(&a, &b, 1e-9).unwrap(), Some(CardinalDir::Right));
        assert_eq!(adjacent(&b, &a, 1e-9).unwrap(), Some(CardinalDir::Left));
        let inner = Boundary::cylinder(Axis::X, [0.5, 0.0, 0.0], 0.4, 1.0);
        assert!(surrounds(&a, &inner, 0.0).unwrap());
        assert!(!surrounds(&a, &inner, 0.7).unwrap());
        // Mixed orientations are unsupported for overlap queries.
        let other = Boundary::cylinder(Axis::Y, [0.0, 0.0, 0.0], 1.0, 2.0);
        assert!(intersects(&a, &other, 0.0).is_err());
    }

    #[test]
    fn test_intersect_boundary_box_box() {
        let a = boxb([0.0, 2.0, 0.0, 2.0, 0.0, 2.0]);
        let b = boxb([1.0, 3.0, 1.0, 3.0, -1.0, 1.0]);
        let i = intersect_boundary(&a, &b).unwrap();
        assert_eq!(i.coor, [1.0, 2.0, 1.0, 2.0, 0.0, 1.0]);
        assert!((i.volume() - 1.0).abs() < 1e-12);
        // Disjoint boxes produce an empty intersection.
        let far = boxb([10.0, 11.0, 0.0, 1.0, 0.0, 1.0]);
        assert_eq!(intersect_boundary(&a, &far).unwrap().volume(), 0.0);
    }

    #[test]
    fn test_intersect_boundary_sphere_inside_box() {
        let b = boxb([0.0, 4.0, 0.0, 4.0, 0.0, 4.0]);
        let s = Boundary::sphere([2.0, 2.0, 2.0], 1.0);
        let i = intersect_boundary(&b, &s).unwrap();
        assert_eq!(i.shape, Shape::Sphere);
        assert_eq!(i.radius(), 1.0);
    }

    #[test]
    fn test_intersect_boundary_cylinder_box() {
        let c = Boundary::cylinder(Axis::Z, [2.0, 2.0, 0.0], 1.0, 10.0);
        let b = boxb([0.0, 4.0, 0.0, 4.0, 2.0, 5.0]);
        // Disk inside box cross-section: result is the clipped cylinder.
        let i = intersect_boundary(&c, &b).unwrap();
        assert_eq!(i.shape, Shape::Cylinder(Axis::Z));
        assert_eq!(i.coor[2], 2.0);
        assert_eq!(i.length(), 3.0);
        // Box cross-section inside disk: result is the clipped box.
        let small = boxb([1.8, 2.2, 1.8, 2.2, -1.0, 4.0]);
        let i2 = intersect_boundary(&c, &small).unwrap();
        assert_eq!(i2.shape, Shape::RectangularBox);
        assert_eq!(i2.coor[4], 0.0);
        assert_eq!(i2.coor[5], 4.0);
    }

    #[test]
    fn test_disjoint_shapes_empty_intersection() {
        let s1 = Boundary::sphere([0.0, 0.0, 0.0], 1.0);
        let s2 = Boundary::sphere([5.0, 0.0, 0.0], 1.0);
        assert!(!intersects(&s1, &s2, 0.0).unwrap());
        assert_eq!(intersect_boundary(&s1, &s2).unwrap().volume(), 0.0);
    }
}
