//! Region realization: from configuration records to placed boundaries
//! with resolved nesting and adjacency.
//!
//! A region's outer boundary is computed from its anchor and subvolume
//! grid (rectangular shapes) or its radius (round shapes). Parent/child
//! nesting is validated geometrically before any subvolumes exist, so the
//! subvolume builder can rely on children being properly aligned and
//! surrounded.

use plume_core::config::{FlowSpec, RegionKind, RegionSpec, ShapeName, SurfaceKind};
use plume_core::{PlumeError, Result, SUB_ADJ_RESOLUTION};
use plume_geometry::{adjacent, surrounds, Axis, Boundary, CardinalDir, Face, Shape};

/// Relation of one region to another, from the perspective of the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborRelation {
    None,
    /// Other region shares a face of this region in the given direction.
    Adjacent(CardinalDir),
    /// Other region is this region's parent.
    Parent,
    /// Other region is nested directly inside this region.
    Child,
}

/// Hit-test geometry used when a molecule may cross from one region
/// toward a specific neighbor.
#[derive(Debug, Clone)]
pub enum NeighborGeom {
    /// Test the whole boundary (parent/child transitions). `inside` is
    /// true when the ray starts inside the tested boundary.
    Whole { boundary: Boundary, inside: bool },
    /// Test a single shared planar face (adjacent regions).
    Plane { face_boundary: Boundary, face: Face },
}

/// A fully realized region.
#[derive(Debug, Clone)]
pub struct Region {
    pub spec: RegionSpec,
    pub index: usize,
    pub boundary: Boundary,
    /// Edge length of this region's subvolumes (radius for round shapes).
    pub actual_sub_size: f64,
    /// Tolerance for face coincidence tests around this region.
    pub sub_resolution: f64,
    /// Region measure excluding children (volume, or area for 2D shapes).
    pub volume: f64,
    /// Exponent of the subvolume size in dimension-adjusted rates:
    /// 3 for normal 3D regions, 2 for 2D regions and 3D surfaces, 1 else.
    pub dim_exponent: u32,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Grid ranges `[x0, x1, y0, y1, z0, z1]` occupied by each box child
    /// inside this (box) region; `None` for round children.
    pub children_coor: Vec<Option<[u32; 6]>>,
    /// Effective subvolume grid extents (round shapes have `[1, 1, 1]`).
    pub grid: [u32; 3],
    pub first_sub: usize,
    pub num_sub: usize,
    pub relation: Vec<NeighborRelation>,
    /// Per neighbor region: hit-test geometry, `None` if not a neighbor.
    pub neigh_geom: Vec<Option<NeighborGeom>>,
    pub flow: Option<FlowSpec>,
}

impl Region {
    pub fn is_micro(&self) -> bool {
        self.spec.is_microscopic
    }

    pub fn is_surface(&self) -> bool {
        self.spec.kind != RegionKind::Normal
    }

    pub fn is_membrane(&self) -> bool {
        self.is_surface() && self.spec.surface_kind == Some(SurfaceKind::Membrane)
    }

    pub fn label(&self) -> &str {
        &self.spec.label
    }

    /// Orientation axis of a cylindrical region.
    pub fn cylinder_axis(&self) -> Option<Axis> {
        match self.boundary.shape {
            Shape::Cylinder(axis) => Some(axis),
            _ => None,
        }
    }
}

/// Computes the outer boundary for a region spec.
fn realize_boundary(spec: &RegionSpec, base_size: f64) -> Result<(Boundary, f64, [u32; 3])> {
    match spec.shape {
        ShapeName::Rectangle | ShapeName::RectangularBox => {
            let sub = spec.size_rect as f64 * base_size;
            let zeros = spec.num.iter().filter(|&&n| n == 0).count();
            if spec.shape == ShapeName::Rectangle {
                if zeros != 1 {
                    return Err(PlumeError::geometry(
                        &spec.label,
                        "a rectangle must have exactly one zero subvolume count",
                    ));
                }
            } else if zeros != 0 {
                return Err(PlumeError::geometry(
                    &spec.label,
                    "a rectangular box needs nonzero subvolume counts on every axis",
                ));
            }
            let coor = [
                spec.anchor[0],
                spec.anchor[0] + sub * spec.num[0] as f64,
                spec.anchor[1],
                spec.anchor[1] + sub * spec.num[1] as f64,
                spec.anchor[2],
                spec.anchor[2] + sub * spec.num[2] as f64,
            ];
            let shape = if spec.shape == ShapeName::Rectangle {
                Boundary::rectangle(coor)
            } else {
                Boundary::rectangular_box(coor)
            };
            let grid = [spec.num[0].max(1), spec.num[1].max(1), spec.num[2].max(1)];
            Ok((shape, sub, grid))
        }
        ShapeName::Sphere => Ok((
            Boundary::sphere(spec.anchor, spec.radius),
            spec.radius,
            [1, 1, 1],
        )),
        ShapeName::Cylinder => {
            let nonzero: Vec<usize> = (0..3).filter(|&i| spec.num[i] != 0).collect();
            if nonzero.len() != 1 {
                return Err(PlumeError::geometry(
                    &spec.label,
                    "a cylinder must have exactly one nonzero subvolume count (its axis)",
                ));
            }
            let axis = Axis::from_index(nonzero[0]);
            let length = spec.num[nonzero[0]] as f64 * spec.size_rect as f64 * base_size;
            Ok((
                Boundary::cylinder(axis, spec.anchor, spec.radius, length),
                spec.radius,
                [1, 1, 1],
            ))
        }
    }
}

/// Builds the region array: boundaries, nesting, volumes, subvolume
/// counts, and region-level adjacency.
pub fn build_regions(specs: &[RegionSpec], base_size: f64) -> Result<Vec<Region>> {
    let adj_error = base_size * SUB_ADJ_RESOLUTION;
    let mut regions: Vec<Region> = Vec::with_capacity(specs.len());

    for (index, spec) in specs.iter().enumerate() {
        let (boundary, actual_sub_size, grid) = realize_boundary(spec, base_size)?;
        regions.push(Region {
            spec: spec.clone(),
            index,
            boundary,
            actual_sub_size,
            sub_resolution: adj_error,
            volume: 0.0,
            dim_exponent: 0,
            parent: None,
            children: Vec::new(),
            children_coor: Vec::new(),
            grid,
            first_sub: 0,
            num_sub: 0,
            relation: vec![NeighborRelation::None; specs.len()],
            neigh_geom: vec![None; specs.len()],
            flow: spec.flow,
        });
    }

    resolve_nesting(&mut regions, adj_error)?;
    validate_overlaps(&regions)?;

    // Region measures and subvolume counts.
    let mut first_sub = 0;
    for i in 0..regions.len() {
        let volume = region_volume(&regions, i);
        let num_sub = count_region_subvolumes(&regions, i)?;
        let region = &mut regions[i];
        region.volume = volume;
        region.dim_exponent = match (region.boundary.shape, region.spec.kind) {
            (Shape::Rectangle, RegionKind::Normal) => 2,
            (_, RegionKind::Normal) => 3,
            (_, RegionKind::Surface3D) => 2,
            _ => 1,
        };
        region.first_sub = first_sub;
        region.num_sub = num_sub;
        first_sub += num_sub;
    }

    find_region_touch(&mut regions, adj_error)?;
    Ok(regions)
}

/// Resolves parent labels, records children, and validates nesting.
fn resolve_nesting(regions: &mut [Region], adj_error: f64) -> Result<()> {
    for i in 0..regions.len() {
        if regions[i].spec.parent_label.is_empty() {
            continue;
        }
        let parent = regions
            .iter()
            .position(|r| r.index != i && r.spec.label == regions[i].spec.parent_label)
            .ok_or_else(|| {
                PlumeError::geometry(
                    regions[i].label(),
                    format!(
                        "parent region \"{}\" not found",
                        regions[i].spec.parent_label
                    ),
                )
            })?;
        regions[i].parent = Some(parent);
        regions[parent].children.push(i);
    }

    for i in 0..regions.len() {
        for c in 0..regions[i].children.len() {
            let j = regions[i].children[c];
            let (parent_b, child_b) = (regions[i].boundary, regions[j].boundary);
            let coor = match (parent_b.shape, child_b.shape) {
                (Shape::RectangularBox, Shape::RectangularBox) => {
                    // Child faces must be flush with the parent's grid.
                    let h = regions[i].actual_sub_size;
                    for k in 0..6 {
                        let offset = (child_b.coor[k] - parent_b.coor[2 * (k / 2)]) / h;
                        if (offset - offset.round()).abs() > adj_error {
                            return Err(PlumeError::geometry(
                                regions[j].label(),
                                format!(
                                    "nested region is not flush with the subvolume grid of parent \"{}\"",
                                    regions[i].label()
                                ),
                            ));
                        }
                    }
                    if !surrounds(&parent_b, &child_b, -adj_error)? {
                        return Err(PlumeError::geometry(
                            regions[j].label(),
                            format!("not surrounded by parent region \"{}\"", regions[i].label()),
                        ));
                    }
                    let mut coor = [0u32; 6];
                    for axis in 0..3 {
                        let lo =
                            (child_b.coor[2 * axis] - parent_b.coor[2 * axis]) / h;
                        let hi =
                            (child_b.coor[2 * axis + 1] - parent_b.coor[2 * axis]) / h;
                        coor[2 * axis] = lo.round() as u32;
                        coor[2 * axis + 1] = (hi.round() as u32).saturating_sub(1);
                    }
                    Some(coor)
                }
                (Shape::Sphere, Shape::RectangularBox) => {
                    if !surrounds(&parent_b, &child_b, regions[j].actual_sub_size)? {
                        return Err(PlumeError::geometry(
                            regions[j].label(),
                            format!(
                                "not surrounded by spherical parent \"{}\" with one subvolume of clearance",
                                regions[i].label()
                            ),
                        ));
                    }
                    None
                }
                (Shape::RectangularBox, Shape::Sphere | Shape::Cylinder(_)) => {
                    if !regions[i].is_micro() {
                        return Err(PlumeError::geometry(
                            regions[i].label(),
                            "a mesoscopic region cannot have a round child region",
                        ));
                    }
                    if !surrounds(&parent_b, &child_b, regions[i].actual_sub_size)? {
                        return Err(PlumeError::geometry(
                            regions[j].label(),
                            format!(
                                "not surrounded by parent \"{}\" with one subvolume of clearance",
                                regions[i].label()
                            ),
                        ));
                    }
                    None
                }
                (Shape::Sphere, Shape::Sphere)
                | (Shape::Cylinder(_), Shape::Cylinder(_))
                | (Shape::Cylinder(_), Shape::RectangularBox)
                | (Shape::Cylinder(_), Shape::Sphere)
                | (Shape::Sphere, Shape::Cylinder(_))
                | (Shape::RectangularBox, Shape::Rectangle) => {
                    if !surrounds(&parent_b, &child_b, 0.0)? {
                        return Err(PlumeError::geometry(
                            regions[j].label(),
                            format!("not surrounded by parent region \"{}\"", regions[i].label()),
                        ));
                    }
                    None
                }
                _ => {
                    return Err(PlumeError::geometry(
                        regions[j].label(),
                        format!(
                            "invalid parent/child shape combination with \"{}\"",
                            regions[i].label()
                        ),
                    ))
                }
            };
            regions[i].children_coor.push(coor);
        }
    }
    Ok(())
}

/// Two normal regions that are not nested must not overlap in volume.
fn validate_overlaps(regions: &[Region]) -> Result<()> {
    for i in 0..regions.len() {
        for j in (i + 1)..regions.len() {
            if regions[i].parent == Some(j)
                || regions[j].parent == Some(i)
                || regions[i].is_surface()
                || regions[j].is_surface()
            {
                continue;
            }
            let overlap = plume_geometry::intersects(
                &regions[i].boundary,
                &regions[j].boundary,
                0.0,
            )
            .unwrap_or(false);
            if overlap {
                return Err(PlumeError::geometry(
                    regions[i].label(),
                    format!("overlaps region \"{}\" in volume", regions[j].label()),
                ));
            }
        }
    }
    Ok(())
}

/// Region measure excluding the outer measure of its children.
fn region_volume(regions: &[Region], i: usize) -> f64 {
    let mut volume = regions[i].boundary.volume();
    for &c in &regions[i].children {
        volume -= regions[c].boundary.volume();
    }
    volume
}

/// Number of subvolumes in a region: the grid product minus cells lost to
/// children. Round regions always have exactly one subvolume.
fn count_region_subvolumes(regions: &[Region], i: usize) -> Result<usize> {
    let region = &regions[i];
    if region.boundary.shape.is_round() {
        return Ok(1);
    }
    let mut count = (region.grid[0] as usize) * (region.grid[1] as usize).max(1)
        * (region.grid[2] as usize).max(1);
    for (c, coor) in region.children.iter().zip(&region.children_coor) {
        match coor {
            Some(range) => {
                count -= ((range[1] - range[0] + 1) as usize)
                    * ((range[3] - range[2] + 1) as usize)
                    * ((range[5] - range[4] + 1) as usize);
            }
            None => {
                // Round child: count the grid cells it fully swallows.
                let child_b = regions[*c].boundary;
                for iz in 0..region.grid[2] {
                    for iy in 0..region.grid[1] {
                        for ix in 0..region.grid[0] {
                            let cell = subvol_bounds(region, [ix, iy, iz]);
                            if surrounds(&child_b, &cell, 0.0).unwrap_or(false) {
                                count -= 1;
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(count)
}

/// Cartesian bounds of one grid cell of a rectangular region. For a
/// rectangle, the cell is degenerate along the region's plane axis.
pub fn subvol_bounds(region: &Region, coor_ind: [u32; 3]) -> Boundary {
    let h = region.actual_sub_size;
    let b = &region.boundary;
    let mut coor = [0.0; 6];
    for axis in 0..3 {
        let lo = b.coor[2 * axis] + h * coor_ind[axis] as f64;
        coor[2 * axis] = lo;
        coor[2 * axis + 1] = (lo + h).min(b.coor[2 * axis + 1]).max(lo);
    }
    Boundary::rectangular_box(coor)
}

/// Determines which regions touch, with what relation, and precomputes
/// the hit-test geometry used when molecules cross between them.
fn find_region_touch(regions: &mut [Region], adj_error: f64) -> Result<()> {
    for i in 0..regions.len() {
        for j in 0..regions.len() {
            if i == j {
                continue;
            }
            if regions[i].parent == Some(j) {
                regions[i].relation[j] = NeighborRelation::Parent;
                continue;
            }
            if regions[j].parent == Some(i) {
                regions[i].relation[j] = NeighborRelation::Child;
                continue;
            }
            if regions[i].boundary.shape == Shape::Sphere
                || regions[j].boundary.shape == Shape::Sphere
            {
                // Spheres only touch their parent/child regions.
                continue;
            }
            if let Some(dir) = adjacent(&regions[i].boundary, &regions[j].boundary, adj_error)? {
                regions[i].relation[j] = NeighborRelation::Adjacent(dir);
            }
        }
    }

    // Hit-test geometry for microscopic regions.
    for i in 0..regions.len() {
        if !regions[i].is_micro() {
            continue;
        }
        for j in 0..regions.len() {
            let geom = match regions[i].relation[j] {
                NeighborRelation::None => None,
                NeighborRelation::Parent => Some(NeighborGeom::Whole {
                    boundary: regions[i].boundary,
                    inside: true,
                }),
                NeighborRelation::Child => Some(NeighborGeom::Whole {
                    boundary: regions[j].boundary,
                    inside: false,
                }),
                NeighborRelation::Adjacent(dir) => {
                    let face_boundary = plume_geometry::intersect_boundary(
                        &regions[i].boundary,
                        &regions[j].boundary,
                    )?;
                    Some(NeighborGeom::Plane {
                        face_boundary,
                        face: dir.face(),
                    })
                }
            };
            regions[i].neigh_geom[j] = geom;
        }
    }
    Ok(())
}

/// Is a box face of `region` coincident with the same face of its parent?
/// Crossing such a face leaves both regions, so it is not a transfer into
/// the parent.
pub fn shared_with_parent(regions: &[Region], region: usize, parent: usize, face: Face) -> bool {
    let (rb, pb) = (&regions[region].boundary, &regions[parent].boundary);
    if rb.shape != pb.shape {
        return false;
    }
    match face.plane_index() {
        Some(idx) => (rb.coor[idx] - pb.coor[idx]).abs() < regions[region].sub_resolution,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_core::config::RegionSpec;

    fn box_spec(label: &str, anchor: [f64; 3], n: [u32; 3], micro: bool) -> RegionSpec {
        RegionSpec {
            label: label.to_string(),
            parent_label: String::new(),
            shape: ShapeName::RectangularBox,
            kind: RegionKind::Normal,
            surface_kind: None,
            anchor,
            size_rect: 1,
            radius: 0.0,
            num: n,
            is_microscopic: micro,
            flow: None,
            dt: 1e-3,
        }
    }

    #[test]
    fn test_two_abutting_boxes_are_adjacent() {
        let specs = vec![
            box_spec("left", [0.0, 0.0, 0.0], [2, 2, 2], true),
            box_spec("right", [2.0, 0.0, 0.0], [2, 2, 2], false),
        ];
        let regions = build_regions(&specs, 1.0).unwrap();
        assert_eq!(
            regions[0].relation[1],
            NeighborRelation::Adjacent(CardinalDir::Right)
        );
        assert_eq!(
            regions[1].relation[0],
            NeighborRelation::Adjacent(CardinalDir::Left)
        );
        assert_eq!(regions[0].num_sub, 8);
        assert_eq!(regions[1].first_sub, 8);
        assert!((regions[0].volume - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_nested_child_subtracts_subvolumes() {
        let mut parent = box_spec("outer", [0.0, 0.0, 0.0], [4, 4, 4], false);
        parent.size_rect = 1;
        let mut child = box_spec("inner", [1.0, 1.0, 1.0], [2, 2, 2], false);
        child.parent_label = "outer".to_string();
        let regions = build_regions(&[parent, child], 1.0).unwrap();
        assert_eq!(regions[0].children, vec![1]);
        assert_eq!(regions[1].parent, Some(0));
        assert_eq!(regions[0].num_sub, 64 - 8);
        assert_eq!(regions[1].num_sub, 8);
        assert!((regions[0].volume - (64.0 - 8.0)).abs() < 1e-12);
        assert_eq!(regions[0].relation[1], NeighborRelation::Child);
        assert_eq!(regions[1].relation[0], NeighborRelation::Parent);
    }

    #[test]
    fn test_misaligned_child_fails() {
        let parent = box_spec("outer", [0.0, 0.0, 0.0], [4, 4, 4], false);
        let mut child = box_spec("inner", [1.5, 1.0, 1.0], [2, 2, 2], false);
        child.parent_label = "outer".to_string();
        assert!(build_regions(&[parent, child], 1.0).is_err());
    }

    #[test]
    fn test_overlapping_normal_regions_fail() {
        let specs = vec![
            box_spec("a", [0.0, 0.0, 0.0], [2, 2, 2], false),
            box_spec("b", [1.0, 0.0, 0.0], [2, 2, 2], false),
        ];
        assert!(build_regions(&specs, 1.0).is_err());
    }

    #[test]
    fn test_cylinder_axis_from_grid() {
        let spec = RegionSpec {
            label: "pipe".to_string(),
            parent_label: String::new(),
            shape: ShapeName::Cylinder,
            kind: RegionKind::Normal,
            surface_kind: None,
            anchor: [0.0, 0.0, 0.0],
            size_rect: 1,
            radius: 2.0,
            num: [0, 0, 10],
            is_microscopic: true,
            flow: None,
            dt: 1e-3,
        };
        let regions = build_regions(&[spec], 1.0).unwrap();
        assert_eq!(regions[0].cylinder_axis(), Some(Axis::Z));
        assert_eq!(regions[0].boundary.length(), 10.0);
        assert_eq!(regions[0].num_sub, 1);
    }

    #[test]
    fn test_missing_parent_label_fails() {
        let mut spec = box_spec("a", [0.0, 0.0, 0.0], [1, 1, 1], true);
        spec.parent_label = "nope".to_string();
        assert!(build_regions(&[spec], 1.0).is_err());
    }
}
