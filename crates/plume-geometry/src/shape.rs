//! Shape primitives and their boundary representation.
//!
//! A [`Boundary`] couples a [`Shape`] tag with a 6-slot parameter vector:
//!
//! - `Rectangle` / `RectangularBox`: `[x_lo, x_hi, y_lo, y_hi, z_lo, z_hi]`
//!   (a rectangle has exactly one degenerate axis pair)
//! - `Sphere`: `[cx, cy, cz, r, r^2, 0]`
//! - `Cylinder(axis)`: `[cx, cy, cz, r, r^2, length]` where `(cx, cy, cz)`
//!   is the center of the base circle and the body extends `length` along
//!   the orientation axis.

use rand::Rng;

/// A 3D point or vector.
pub type Point = [f64; 3];

/// Coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Index of this axis into a [`Point`].
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// The two axes orthogonal to this one, in ascending index order.
    #[inline]
    pub fn cross(self) -> (usize, usize) {
        match self {
            Axis::X => (1, 2),
            Axis::Y => (0, 2),
            Axis::Z => (0, 1),
        }
    }

    /// Axis from a point index.
    #[inline]
    pub fn from_index(i: usize) -> Axis {
        match i {
            0 => Axis::X,
            1 => Axis::Y,
            _ => Axis::Z,
        }
    }
}

/// The four supported shape primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Rectangle,
    RectangularBox,
    Sphere,
    Cylinder(Axis),
}

impl Shape {
    /// Short name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Shape::Rectangle => "Rectangle",
            Shape::RectangularBox => "Rectangular Box",
            Shape::Sphere => "Sphere",
            Shape::Cylinder(_) => "Cylinder",
        }
    }

    /// Whether the shape is round (sphere or cylinder).
    pub fn is_round(self) -> bool {
        matches!(self, Shape::Sphere | Shape::Cylinder(_))
    }
}

/// Identifier of one face of a boundary, used by ray hits and reflections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    XLo,
    XHi,
    YLo,
    YHi,
    ZLo,
    ZHi,
    /// The single surface of a sphere.
    Surface,
    /// Cylinder cap at the anchor plane.
    CapLo,
    /// Cylinder cap at anchor + length.
    CapHi,
    /// Curved cylinder surface.
    Mantle,
}

impl Face {
    /// The six planar faces of a rectangular box, in parameter order.
    pub const BOX_FACES: [Face; 6] = [
        Face::XLo,
        Face::XHi,
        Face::YLo,
        Face::YHi,
        Face::ZLo,
        Face::ZHi,
    ];

    /// Parameter-vector index of a planar box face.
    #[inline]
    pub fn plane_index(self) -> Option<usize> {
        match self {
            Face::XLo => Some(0),
            Face::XHi => Some(1),
            Face::YLo => Some(2),
            Face::YHi => Some(3),
            Face::ZLo => Some(4),
            Face::ZHi => Some(5),
            _ => None,
        }
    }

    /// Axis normal to a planar box face.
    #[inline]
    pub fn normal_axis(self) -> Option<Axis> {
        match self {
            Face::XLo | Face::XHi => Some(Axis::X),
            Face::YLo | Face::YHi => Some(Axis::Y),
            Face::ZLo | Face::ZHi => Some(Axis::Z),
            _ => None,
        }
    }
}

/// Direction from one boundary to an adjacent one.
///
/// Left/Right are along x, Down/Up along y, In/Out along z; the direction
/// names the face of the *first* boundary that is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardinalDir {
    Left,
    Right,
    Down,
    Up,
    In,
    Out,
}

impl CardinalDir {
    /// The box face of the first boundary shared in this direction.
    #[inline]
    pub fn face(self) -> Face {
        match self {
            CardinalDir::Left => Face::XLo,
            CardinalDir::Right => Face::XHi,
            CardinalDir::Down => Face::YLo,
            CardinalDir::Up => Face::YHi,
            CardinalDir::In => Face::ZLo,
            CardinalDir::Out => Face::ZHi,
        }
    }

    /// Axis along which this direction points.
    #[inline]
    pub fn axis(self) -> Axis {
        match self {
            CardinalDir::Left | CardinalDir::Right => Axis::X,
            CardinalDir::Down | CardinalDir::Up => Axis::Y,
            CardinalDir::In | CardinalDir::Out => Axis::Z,
        }
    }

    /// Whether the direction points toward increasing coordinates.
    #[inline]
    pub fn is_upper(self) -> bool {
        matches!(self, CardinalDir::Right | CardinalDir::Up | CardinalDir::Out)
    }

    /// The lower/upper pair of directions along one axis.
    #[inline]
    pub fn along(axis: Axis) -> (CardinalDir, CardinalDir) {
        match axis {
            Axis::X => (CardinalDir::Left, CardinalDir::Right),
            Axis::Y => (CardinalDir::Down, CardinalDir::Up),
            Axis::Z => (CardinalDir::In, CardinalDir::Out),
        }
    }
}

#[inline]
pub(crate) fn sq(v: f64) -> f64 {
    v * v
}

/// Euclidean distance between two points.
#[inline]
pub fn point_distance(a: &Point, b: &Point) -> f64 {
    (sq(b[0] - a[0]) + sq(b[1] - a[1]) + sq(b[2] - a[2])).sqrt()
}

/// A shape instance: tag plus parameter vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    pub shape: Shape,
    pub coor: [f64; 6],
}

impl Boundary {
    /// Rectangular box from lower/upper extents per axis.
    pub fn rectangular_box(coor: [f64; 6]) -> Self {
        Boundary {
            shape: Shape::RectangularBox,
            coor,
        }
    }

    /// Rectangle from extents; exactly one axis pair must be degenerate.
    pub fn rectangle(coor: [f64; 6]) -> Self {
        Boundary {
            shape: Shape::Rectangle,
            coor,
        }
    }

    /// Sphere from center and radius.
    pub fn sphere(center: Point, radius: f64) -> Self {
        Boundary {
            shape: Shape::Sphere,
            coor: [center[0], center[1], center[2], radius, radius * radius, 0.0],
        }
    }

    /// Cylinder from orientation axis, base-circle center, radius, length.
    pub fn cylinder(axis: Axis, anchor: Point, radius: f64, length: f64) -> Self {
        Boundary {
            shape: Shape::Cylinder(axis),
            coor: [
                anchor[0],
                anchor[1],
                anchor[2],
                radius,
                radius * radius,
                length,
            ],
        }
    }

    /// Sphere or cylinder center coordinates.
    #[inline]
    pub fn center(&self) -> Point {
        [self.coor[0], self.coor[1], self.coor[2]]
    }

    /// Radius of a round shape.
    #[inline]
    pub fn radius(&self) -> f64 {
        self.coor[3]
    }

    /// Squared radius of a round shape.
    #[inline]
    pub fn radius_sq(&self) -> f64 {
        self.coor[4]
    }

    /// Length of a cylinder along its orientation axis.
    #[inline]
    pub fn length(&self) -> f64 {
        self.coor[5]
    }

    /// The degenerate axis of a rectangle, if the shape is a rectangle.
    pub fn degenerate_axis(&self) -> Option<Axis> {
        if self.shape != Shape::Rectangle {
            return None;
        }
        for i in 0..3 {
            if self.coor[2 * i] == self.coor[2 * i + 1] {
                return Some(Axis::from_index(i));
            }
        }
        None
    }

    /// Squared distance from a point to a cylinder's axis line.
    #[inline]
    pub fn radial_dist_sq(&self, p: &Point, axis: Axis) -> f64 {
        let (j, k) = axis.cross();
        sq(p[j] - self.coor[j]) + sq(p[k] - self.coor[k])
    }

    /// Closed-set membership test.
    pub fn contains(&self, p: &Point) -> bool {
        match self.shape {
            Shape::Rectangle | Shape::RectangularBox => {
                p[0] >= self.coor[0]
                    && p[0] <= self.coor[1]
                    && p[1] >= self.coor[2]
                    && p[1] <= self.coor[3]
                    && p[2] >= self.coor[4]
                    && p[2] <= self.coor[5]
            }
            Shape::Sphere => {
                sq(p[0] - self.coor[0]) + sq(p[1] - self.coor[1]) + sq(p[2] - self.coor[2])
                    <= self.radius_sq()
            }
            Shape::Cylinder(axis) => {
                let i = axis.index();
                p[i] >= self.coor[i]
                    && p[i] <= self.coor[i] + self.length()
                    && self.radial_dist_sq(p, axis) <= self.radius_sq()
            }
        }
    }

    /// Dimension-appropriate measure of the boundary: volume for 3D
    /// shapes, area for rectangles. Invalid extents yield zero.
    pub fn volume(&self) -> f64 {
        match self.shape {
            Shape::Rectangle => {
                let mut area = 1.0;
                for i in 0..3 {
                    let ext = self.coor[2 * i + 1] - self.coor[2 * i];
                    if ext < 0.0 {
                        return 0.0;
                    }
                    if ext > 0.0 {
                        area *= ext;
                    }
                }
                area
            }
            Shape::RectangularBox => {
                let dx = self.coor[1] - self.coor[0];
                let dy = self.coor[3] - self.coor[2];
                let dz = self.coor[5] - self.coor[4];
                if dx < 0.0 || dy < 0.0 || dz < 0.0 {
                    0.0
                } else {
                    dx * dy * dz
                }
            }
            Shape::Sphere => 4.0 / 3.0 * std::f64::consts::PI * self.radius().powi(3),
            Shape::Cylinder(_) => std::f64::consts::PI * self.radius_sq() * self.length(),
        }
    }

    /// Outer surface area of the boundary.
    pub fn surface_area(&self) -> f64 {
        match self.shape {
            Shape::Rectangle => {
                // Perimeter of the in-plane rectangle.
                let mut perim = 0.0;
                for i in 0..3 {
                    let ext = self.coor[2 * i + 1] - self.coor[2 * i];
                    if ext > 0.0 {
                        perim += 2.0 * ext;
                    }
                }
                perim
            }
            Shape::RectangularBox => {
                let dx = self.coor[1] - self.coor[0];
                let dy = self.coor[3] - self.coor[2];
                let dz = self.coor[5] - self.coor[4];
                2.0 * (dx * dy + dy * dz + dz * dx)
            }
            Shape::Sphere => 4.0 * std::f64::consts::PI * self.radius_sq(),
            Shape::Cylinder(_) => {
                2.0 * std::f64::consts::PI * self.radius()
                    * (self.length() + self.radius())
            }
        }
    }

    /// Records the specified face as a (possibly degenerate) boundary.
    ///
    /// Box faces become degenerate boxes, a sphere face is the sphere
    /// itself, cylinder caps become zero-length cylinders, and the mantle
    /// is the full cylinder.
    pub fn face(&self, face: Face) -> Boundary {
        match (self.shape, face) {
            (Shape::Rectangle | Shape::RectangularBox, f) if f.plane_index().is_some() => {
                let idx = f.plane_index().unwrap();
                let mut coor = self.coor;
                // Collapse the normal axis onto the face plane.
                let axis = f.normal_axis().unwrap().index();
                coor[2 * axis] = self.coor[idx];
                coor[2 * axis + 1] = self.coor[idx];
                Boundary {
                    shape: Shape::Rectangle,
                    coor,
                }
            }
            (Shape::Sphere, _) => *self,
            (Shape::Cylinder(axis), Face::CapLo) => {
                Boundary::cylinder(axis, self.center(), self.radius(), 0.0)
            }
            (Shape::Cylinder(axis), Face::CapHi) => {
                let mut anchor = self.center();
                anchor[axis.index()] += self.length();
                Boundary::cylinder(axis, anchor, self.radius(), 0.0)
            }
            (Shape::Cylinder(_), _) => *self,
            _ => *self,
        }
    }

    /// Uniform sample of the shape interior.
    ///
    /// Spheres and cylinder cross-sections use rejection sampling in the
    /// bounding cube/square.
    pub fn uniform_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Point {
        match self.shape {
            Shape::Rectangle | Shape::RectangularBox => [
                rng.gen_range(self.coor[0]..=self.coor[1]),
                rng.gen_range(self.coor[2]..=self.coor[3]),
                rng.gen_range(self.coor[4]..=self.coor[5]),
            ],
            Shape::Sphere => loop {
                let p = [
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                ];
                if sq(p[0]) + sq(p[1]) + sq(p[2]) < 1.0 {
                    break [
                        self.coor[0] + p[0] * self.radius(),
                        self.coor[1] + p[1] * self.radius(),
                        self.coor[2] + p[2] * self.radius(),
                    ];
                }
            },
            Shape::Cylinder(axis) => {
                let i = axis.index();
                let (j, k) = axis.cross();
                let mut p = [0.0; 3];
                p[i] = self.coor[i] + rng.gen::<f64>() * self.length();
                loop {
                    let a = rng.gen_range(-1.0..1.0);
                    let b = rng.gen_range(-1.0..1.0);
                    if sq(a) + sq(b) < 1.0 {
                        p[j] = self.coor[j] + a * self.radius();
                        p[k] = self.coor[k] + b * self.radius();
                        break;
                    }
                }
                p
            }
        }
    }

    /// Uniform sample on the sphere surface (rejection then projection).
    pub fn uniform_point_on_sphere<R: Rng + ?Sized>(&self, rng: &mut R) -> Point {
        loop {
            let p = [
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ];
            let norm_sq = sq(p[0]) + sq(p[1]) + sq(p[2]);
            if norm_sq > 1e-12 && norm_sq < 1.0 {
                let scale = self.radius() / norm_sq.sqrt();
                return [
                    self.coor[0] + p[0] * scale,
                    self.coor[1] + p[1] * scale,
                    self.coor[2] + p[2] * scale,
                ];
            }
        }
    }

    /// Uniform sample on one planar face of a rectangular box.
    pub fn uniform_point_on_face<R: Rng + ?Sized>(&self, face: Face, rng: &mut R) -> Point {
        self.face(face).uniform_point(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_box_contains() {
        let b = Boundary::rectangular_box([0.0, 1.0, 0.0, 2.0, 0.0, 3.0]);
        assert!(b.contains(&[0.5, 1.0, 2.9]));
        assert!(b.contains(&[0.0, 0.0, 0.0])); // closed set
        assert!(!b.contains(&[1.1, 1.0, 1.0]));
    }

    #[test]
    fn test_sphere_contains_and_volume() {
        let s = Boundary::sphere([1.0, 1.0, 1.0], 2.0);
        assert!(s.contains(&[1.0, 1.0, 2.9]));
        assert!(s.contains(&[3.0, 1.0, 1.0])); // on the surface
        assert!(!s.contains(&[3.1, 1.0, 1.0]));
        let expected = 4.0 / 3.0 * std::f64::consts::PI * 8.0;
        assert!((s.volume() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_cylinder_contains() {
        let c = Boundary::cylinder(Axis::Z, [0.0, 0.0, 0.0], 1.0, 5.0);
        assert!(c.contains(&[0.5, 0.0, 2.5]));
        assert!(c.contains(&[1.0, 0.0, 0.0])); // mantle + cap edge
        assert!(!c.contains(&[0.0, 0.0, 5.1])); // past the far cap
        assert!(!c.contains(&[1.1, 0.0, 2.5])); // outside radially
        assert!((c.volume() - std::f64::consts::PI * 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_rectangle_degenerate_axis() {
        let r = Boundary::rectangle([0.0, 1.0, 0.0, 1.0, 2.0, 2.0]);
        assert_eq!(r.degenerate_axis(), Some(Axis::Z));
        assert!((r.volume() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_box_face_is_degenerate() {
        let b = Boundary::rectangular_box([0.0, 1.0, 0.0, 2.0, 0.0, 3.0]);
        let f = b.face(Face::XHi);
        assert_eq!(f.shape, Shape::Rectangle);
        assert_eq!(f.coor[0], 1.0);
        assert_eq!(f.coor[1], 1.0);
        assert_eq!(f.coor[3], 2.0);
    }

    #[test]
    fn test_uniform_point_stays_inside() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let shapes = [
            Boundary::rectangular_box([0.0, 1.0, -1.0, 1.0, 2.0, 4.0]),
            Boundary::sphere([0.0, 0.0, 0.0], 2.0),
            Boundary::cylinder(Axis::X, [1.0, 1.0, 1.0], 0.5, 3.0),
        ];
        for shape in &shapes {
            for _ in 0..500 {
                let p = shape.uniform_point(&mut rng);
                assert!(shape.contains(&p), "{:?} escaped {:?}", p, shape.shape);
            }
        }
    }

    #[test]
    fn test_uniform_point_on_sphere_surface() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let s = Boundary::sphere([1.0, -1.0, 0.5], 2.0);
        for _ in 0..200 {
            let p = s.uniform_point_on_sphere(&mut rng);
            let d = point_distance(&p, &s.center());
            assert!((d - 2.0).abs() < 1e-9);
        }
    }
}
