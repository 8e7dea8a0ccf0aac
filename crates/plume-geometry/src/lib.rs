//! # plume-geometry
//!
//! Geometry kernel for the PLUME simulator.
//!
//! Supports the four shape primitives used to compose simulation
//! environments (rectangles, rectangular boxes, spheres, and axis-aligned
//! cylinders) and the queries the engine needs:
//! - containment, uniform point sampling, volumes and areas
//! - pairwise overlap, containment, and adjacency with explicit
//!   clearance tolerances
//! - ray-versus-surface hits and reflections for molecule trajectories
//!
//! All shapes are axis-aligned; boundaries are a shape tag plus a 6-slot
//! parameter vector (see [`shape::Boundary`]).

pub mod overlap;
pub mod ray;
pub mod shape;

pub use overlap::{adjacent, intersect_boundary, intersects, surrounds};
pub use ray::{
    define_line, distance_to_boundary, line_hit_boundary, line_hit_plane, point_on_face,
    push_point, reflect_point, RayHit, Reflection,
};
pub use shape::{point_distance, Axis, Boundary, CardinalDir, Face, Point, Shape};
