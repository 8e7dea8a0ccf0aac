//! Subvolume graph builder.
//!
//! Partitions every region into subvolumes, resolves face neighbors both
//! inside regions and across region boundaries, and precomputes the
//! mesoscopic diffusion transition rates. The subvolume storage is a
//! single flat arena; all cross references are by id.

use log::debug;
use plume_core::{PlumeError, Result, SUB_ADJ_RESOLUTION};
use plume_geometry::{
    adjacent, intersect_boundary, intersects, point_distance, surrounds, Boundary, CardinalDir,
    Point, Shape,
};

use crate::region::{subvol_bounds, NeighborRelation, Region};

/// One subvolume of the environment.
///
/// Mesoscopic subvolumes carry a `meso_id` into the compact mesoscopic
/// arrays; microscopic subvolumes exist only to resolve geometry and
/// transfers.
#[derive(Debug, Clone)]
pub struct Subvolume {
    pub region: usize,
    pub meso_id: Option<usize>,
    pub coor_ind: [u32; 3],
    pub is_boundary: bool,
    /// Neighbor subvolume ids. A neighbor may appear more than once when
    /// the pair shares more than one face (box subvolume against a round
    /// region); each occurrence is a separate diffusion channel.
    pub neighbors: Vec<usize>,
    /// Outbound diffusion rate per molecule type and neighbor, for
    /// mesoscopic boundary subvolumes (`[type][neighbor]`). Interior
    /// subvolumes use the region-uniform rate instead.
    pub diff_rate_neigh: Vec<Vec<f64>>,
}

/// Per-region lookup from grid coordinates to subvolume ids.
#[derive(Debug, Clone, Default)]
pub struct SubGrid {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    cells: Vec<Option<usize>>,
}

impl SubGrid {
    fn new(nx: usize, ny: usize, nz: usize) -> Self {
        SubGrid {
            nx,
            ny,
            nz,
            cells: vec![None; nx * ny * nz],
        }
    }

    #[inline]
    fn idx(&self, ix: usize, iy: usize, iz: usize) -> usize {
        ix + self.nx * (iy + self.ny * iz)
    }

    /// Subvolume id at the given grid cell, if the cell is not swallowed
    /// by a child region.
    #[inline]
    pub fn get(&self, ix: u32, iy: u32, iz: u32) -> Option<usize> {
        if (ix as usize) < self.nx && (iy as usize) < self.ny && (iz as usize) < self.nz {
            self.cells[self.idx(ix as usize, iy as usize, iz as usize)]
        } else {
            None
        }
    }

    fn set(&mut self, ix: u32, iy: u32, iz: u32, id: usize) {
        let i = self.idx(ix as usize, iy as usize, iz as usize);
        self.cells[i] = Some(id);
    }
}

/// One mesoscopic boundary subvolume facing a microscopic region.
#[derive(Debug, Clone)]
pub struct BoundarySubEntry {
    pub sub_id: usize,
    /// Center of the subvolume, for nearest-subvolume searches.
    pub center: Point,
    /// Anchor of the virtual cell across each face shared with the
    /// microscopic region; molecules diffusing out materialize there.
    pub virtual_cells: Vec<(CardinalDir, Point)>,
}

/// The immutable per-realization environment: regions, subvolumes, and
/// all precomputed adjacency.
#[derive(Debug)]
pub struct Environment {
    pub regions: Vec<Region>,
    pub subs: Vec<Subvolume>,
    pub grids: Vec<SubGrid>,
    /// Subvolume id per mesoscopic id.
    pub meso_subs: Vec<usize>,
    pub base_size: f64,
    pub num_mol_types: usize,
    /// Diffusion coefficient per molecule type.
    pub diff_coef: Vec<f64>,
    /// For each (mesoscopic region, microscopic neighbor region) pair:
    /// the ordered boundary subvolume list used for micro-to-meso
    /// transfers. Indexed `[region][neighbor region]`.
    pub bound_subs: Vec<Vec<Vec<BoundarySubEntry>>>,
    /// Uniform in-region mesoscopic diffusion rate `D / h^2`, indexed
    /// `[region][type]`.
    pub region_diff_rate: Vec<Vec<f64>>,
    pub adj_error: f64,
}

impl Environment {
    /// Is the point inside the region itself, excluding its children?
    pub fn point_in_region_not_child(&self, region: usize, p: &Point) -> bool {
        if !self.regions[region].boundary.contains(p) {
            return false;
        }
        !self.regions[region]
            .children
            .iter()
            .any(|&c| self.regions[c].boundary.contains(p))
    }

    /// Which of `region` or its nested descendants contains the point?
    pub fn point_in_region_or_child(&self, region: usize, p: &Point) -> Option<usize> {
        if !self.regions[region].boundary.contains(p) {
            return None;
        }
        for &c in &self.regions[region].children {
            if let Some(r) = self.point_in_region_or_child(c, p) {
                return Some(r);
            }
        }
        Some(region)
    }

    /// Which region contains the point, excluding children?
    pub fn find_region_not_child(&self, p: &Point) -> Option<usize> {
        (0..self.regions.len()).find(|&r| self.point_in_region_not_child(r, p))
    }

    /// Bounds of one subvolume.
    pub fn sub_bounds(&self, sub_id: usize) -> Boundary {
        let sub = &self.subs[sub_id];
        let region = &self.regions[sub.region];
        if region.boundary.shape.is_round() {
            region.boundary
        } else {
            subvol_bounds(region, sub.coor_ind)
        }
    }

    /// Nearest boundary subvolume of `meso_region` along its interface
    /// with `micro_region`, by squared distance with per-axis pruning.
    pub fn nearest_bound_sub(
        &self,
        meso_region: usize,
        micro_region: usize,
        p: &Point,
    ) -> Option<usize> {
        let list = &self.bound_subs[meso_region][micro_region];
        let mut best = None;
        let mut best_dist = f64::INFINITY;
        for entry in list {
            let mut d = (p[0] - entry.center[0]) * (p[0] - entry.center[0]);
            if d > best_dist {
                continue;
            }
            d += (p[1] - entry.center[1]) * (p[1] - entry.center[1]);
            if d > best_dist {
                continue;
            }
            d += (p[2] - entry.center[2]) * (p[2] - entry.center[2]);
            if d < best_dist {
                best_dist = d;
                best = Some(entry.sub_id);
            }
        }
        best
    }

    /// The boundary-entry record for a specific meso subvolume facing a
    /// micro region, if any.
    pub fn bound_entry(&self, sub_id: usize, micro_region: usize) -> Option<&BoundarySubEntry> {
        let region = self.subs[sub_id].region;
        self.bound_subs[region]
            .get(micro_region)?
            .iter()
            .find(|e| e.sub_id == sub_id)
    }
}

/// Builds the complete environment from realized regions.
pub fn build_environment(
    regions: Vec<Region>,
    base_size: f64,
    num_mol_types: usize,
    diff_coef: Vec<f64>,
) -> Result<Environment> {
    let adj_error = base_size * SUB_ADJ_RESOLUTION;
    let num_regions = regions.len();
    let total_subs: usize = regions.iter().map(|r| r.num_sub).sum();

    let mut subs: Vec<Subvolume> = Vec::with_capacity(total_subs);
    let mut grids: Vec<SubGrid> = Vec::with_capacity(num_regions);

    // Enumerate subvolumes region by region, skipping cells inside
    // children, and record grid lookups.
    for region in &regions {
        if region.boundary.shape.is_round() {
            let mut grid = SubGrid::new(1, 1, 1);
            grid.set(0, 0, 0, subs.len());
            grids.push(grid);
            subs.push(Subvolume {
                region: region.index,
                meso_id: None,
                coor_ind: [0, 0, 0],
                is_boundary: true,
                neighbors: Vec::new(),
                diff_rate_neigh: Vec::new(),
            });
            continue;
        }
        let [nx, ny, nz] = region.grid;
        let mut grid = SubGrid::new(nx as usize, ny as usize, nz as usize);
        for iz in 0..nz {
            for iy in 0..ny {
                for ix in 0..nx {
                    if cell_in_child(&regions, region, [ix, iy, iz]) {
                        continue;
                    }
                    grid.set(ix, iy, iz, subs.len());
                    subs.push(Subvolume {
                        region: region.index,
                        meso_id: None,
                        coor_ind: [ix, iy, iz],
                        is_boundary: false,
                        neighbors: Vec::new(),
                        diff_rate_neigh: Vec::new(),
                    });
                }
            }
        }
        grids.push(grid);
    }
    if subs.len() != total_subs {
        return Err(PlumeError::internal(format!(
            "subvolume count mismatch: expected {total_subs}, built {}",
            subs.len()
        )));
    }

    // Boundary flags: grid edges and cells that border a child region.
    for sub_id in 0..subs.len() {
        let region = &regions[subs[sub_id].region];
        if region.boundary.shape.is_round() {
            continue;
        }
        let [ix, iy, iz] = subs[sub_id].coor_ind;
        let [nx, ny, nz] = region.grid;
        let grid = &grids[region.index];
        let mut boundary = ix == 0
            || iy == 0
            || iz == 0
            || ix == nx - 1
            || iy == ny - 1
            || iz == nz - 1;
        if !boundary {
            // Any missing face neighbor means a child cell is adjacent.
            boundary = grid.get(ix - 1, iy, iz).is_none()
                || grid.get(ix + 1, iy, iz).is_none()
                || grid.get(ix, iy - 1, iz).is_none()
                || grid.get(ix, iy + 1, iz).is_none()
                || grid.get(ix, iy, iz - 1).is_none()
                || grid.get(ix, iy, iz + 1).is_none();
        }
        if !boundary {
            // Round children intersecting this cell also make it a
            // boundary subvolume.
            let cell = subvol_bounds(region, [ix, iy, iz]);
            for (&c, coor) in region.children.iter().zip(&region.children_coor) {
                if coor.is_none()
                    && intersects(&regions[c].boundary, &cell, region.actual_sub_size)
                        .unwrap_or(false)
                {
                    boundary = true;
                    break;
                }
            }
        }
        subs[sub_id].is_boundary = boundary;
    }

    // Internal face neighbors.
    for sub_id in 0..subs.len() {
        let region_id = subs[sub_id].region;
        if regions[region_id].boundary.shape.is_round() {
            continue;
        }
        let [ix, iy, iz] = subs[sub_id].coor_ind;
        let grid = &grids[region_id];
        let mut neighbors = Vec::new();
        if ix > 0 {
            if let Some(n) = grid.get(ix - 1, iy, iz) {
                neighbors.push(n);
            }
        }
        if let Some(n) = grid.get(ix + 1, iy, iz) {
            neighbors.push(n);
        }
        if iy > 0 {
            if let Some(n) = grid.get(ix, iy - 1, iz) {
                neighbors.push(n);
            }
        }
        if let Some(n) = grid.get(ix, iy + 1, iz) {
            neighbors.push(n);
        }
        if iz > 0 {
            if let Some(n) = grid.get(ix, iy, iz - 1) {
                neighbors.push(n);
            }
        }
        if let Some(n) = grid.get(ix, iy, iz + 1) {
            neighbors.push(n);
        }
        subs[sub_id].neighbors = neighbors;
    }

    // Cross-region neighbors between boundary subvolumes.
    debug!("resolving cross-region subvolume neighbors");
    for a in 0..subs.len() {
        if !subs[a].is_boundary {
            continue;
        }
        let ra = subs[a].region;
        for b in (a + 1)..subs.len() {
            if !subs[b].is_boundary {
                continue;
            }
            let rb = subs[b].region;
            if ra == rb || regions[ra].relation[rb] == NeighborRelation::None {
                continue;
            }
            let faces = subvol_neigh_faces(&regions, &subs, adj_error, a, b)?;
            if faces == 0 {
                continue;
            }
            // A round subvolume records one channel; a box subvolume
            // records one channel per shared face when mesoscopic.
            let (a_round, b_round) = (
                regions[ra].boundary.shape.is_round(),
                regions[rb].boundary.shape.is_round(),
            );
            let a_channels = if a_round || regions[ra].is_micro() { 1 } else { faces };
            let b_channels = if b_round || regions[rb].is_micro() { 1 } else { faces };
            for _ in 0..a_channels {
                subs[a].neighbors.push(b);
            }
            for _ in 0..b_channels {
                subs[b].neighbors.push(a);
            }
        }
    }

    // Mesoscopic ids and per-region uniform diffusion rates.
    let mut meso_subs = Vec::new();
    for (sub_id, sub) in subs.iter_mut().enumerate() {
        if !regions[sub.region].is_micro() {
            sub.meso_id = Some(meso_subs.len());
            meso_subs.push(sub_id);
        }
    }
    let region_diff_rate: Vec<Vec<f64>> = regions
        .iter()
        .map(|r| {
            let h = r.actual_sub_size;
            diff_coef.iter().map(|&d| d / h / h).collect()
        })
        .collect();

    // Outbound diffusion rates for mesoscopic boundary subvolumes.
    for sub_id in 0..subs.len() {
        let region_id = subs[sub_id].region;
        if regions[region_id].is_micro() || !subs[sub_id].is_boundary {
            continue;
        }
        let h_i = regions[region_id].actual_sub_size;
        let own_bounds = subvol_bounds(&regions[region_id], subs[sub_id].coor_ind);
        let mut rates = vec![vec![0.0; subs[sub_id].neighbors.len()]; num_mol_types];
        for (ni, &neigh) in subs[sub_id].neighbors.iter().enumerate() {
            let neigh_region = subs[neigh].region;
            if neigh_region == region_id {
                for (ty, row) in rates.iter_mut().enumerate() {
                    row[ni] = diff_coef[ty] / h_i / h_i;
                }
                continue;
            }
            let h_j = if regions[neigh_region].is_micro() {
                h_i
            } else {
                regions[neigh_region].actual_sub_size
            };
            // Fraction of the face actually shared with the neighbor.
            let mut scale = 1.0;
            if regions[neigh_region].boundary.shape == Shape::RectangularBox {
                let neigh_bounds =
                    subvol_bounds(&regions[neigh_region], subs[neigh].coor_ind);
                let overlap = intersect_boundary(&own_bounds, &neigh_bounds)?;
                for axis in 0..3 {
                    let ext = overlap.coor[2 * axis + 1] - overlap.coor[2 * axis];
                    if ext.abs() > adj_error {
                        scale *= ext / h_i;
                    }
                }
            }
            for (ty, row) in rates.iter_mut().enumerate() {
                row[ni] = 2.0 * diff_coef[ty] / h_i / (h_i + h_j) * scale;
            }
        }
        subs[sub_id].diff_rate_neigh = rates;
    }

    // Boundary bookkeeping for meso regions facing micro regions.
    let mut bound_subs: Vec<Vec<Vec<BoundarySubEntry>>> =
        vec![vec![Vec::new(); num_regions]; num_regions];
    for i in 0..num_regions {
        if regions[i].is_micro() {
            continue;
        }
        for j in 0..num_regions {
            if i == j
                || regions[i].relation[j] == NeighborRelation::None
                || !regions[j].is_micro()
            {
                continue;
            }
            let mut entries = Vec::new();
            for sub_id in regions[i].first_sub..(regions[i].first_sub + regions[i].num_sub) {
                if !subs[sub_id].is_boundary {
                    continue;
                }
                let bounds = subvol_bounds(&regions[i], subs[sub_id].coor_ind);
                let dirs = sub_faces_toward_region(
                    &regions,
                    &subs,
                    &grids,
                    j,
                    &bounds,
                    adj_error,
                );
                if dirs.is_empty() {
                    continue;
                }
                let h = regions[i].actual_sub_size;
                let center = [
                    (bounds.coor[0] + bounds.coor[1]) / 2.0,
                    (bounds.coor[2] + bounds.coor[3]) / 2.0,
                    (bounds.coor[4] + bounds.coor[5]) / 2.0,
                ];
                let virtual_cells = dirs
                    .iter()
                    .map(|&dir| {
                        let mut anchor =
                            [bounds.coor[0], bounds.coor[2], bounds.coor[4]];
                        let axis = dir.axis().index();
                        if dir.is_upper() {
                            anchor[axis] += h;
                        } else {
                            anchor[axis] -= h;
                        }
                        (dir, anchor)
                    })
                    .collect();
                entries.push(BoundarySubEntry {
                    sub_id,
                    center,
                    virtual_cells,
                });
            }
            bound_subs[i][j] = entries;
        }
    }

    // A mesoscopic region facing a membrane surface has no defined
    // transition semantics.
    for i in 0..num_regions {
        if regions[i].is_micro() {
            continue;
        }
        for j in 0..num_regions {
            if regions[i].relation[j] != NeighborRelation::None && regions[j].is_membrane() {
                return Err(PlumeError::geometry(
                    regions[i].label(),
                    format!(
                        "mesoscopic region borders membrane surface \"{}\"",
                        regions[j].label()
                    ),
                ));
            }
        }
    }

    debug!(
        "environment built: {} regions, {} subvolumes ({} mesoscopic)",
        num_regions,
        subs.len(),
        meso_subs.len()
    );

    Ok(Environment {
        regions,
        subs,
        grids,
        meso_subs,
        base_size,
        num_mol_types,
        diff_coef,
        bound_subs,
        region_diff_rate,
        adj_error,
    })
}

/// Is a grid cell of `region` lost to one of its children?
fn cell_in_child(regions: &[Region], region: &Region, ind: [u32; 3]) -> bool {
    for (&c, coor) in region.children.iter().zip(&region.children_coor) {
        match coor {
            Some(range) => {
                if ind[0] >= range[0]
                    && ind[0] <= range[1]
                    && ind[1] >= range[2]
                    && ind[1] <= range[3]
                    && ind[2] >= range[4]
                    && ind[2] <= range[5]
                {
                    return true;
                }
            }
            None => {
                let cell = subvol_bounds(region, ind);
                if surrounds(&regions[c].boundary, &cell, 0.0).unwrap_or(false) {
                    return true;
                }
            }
        }
    }
    false
}

/// Number of faces two boundary subvolumes of touching regions share
/// (zero when they are not neighbors).
fn subvol_neigh_faces(
    regions: &[Region],
    subs: &[Subvolume],
    adj_error: f64,
    a: usize,
    b: usize,
) -> Result<usize> {
    let (ra, rb) = (subs[a].region, subs[b].region);
    let (sa, sb) = (regions[ra].boundary.shape, regions[rb].boundary.shape);
    match (sa.is_round(), sb.is_round()) {
        (false, false) => {
            let ba = subvol_bounds(&regions[ra], subs[a].coor_ind);
            let bb = subvol_bounds(&regions[rb], subs[b].coor_ind);
            Ok(adjacent(&ba, &bb, adj_error)?.map_or(0, |_| 1))
        }
        (true, true) => {
            // Touching round regions have touching single subvolumes.
            Ok(1)
        }
        _ => {
            // One subvolume is a grid cell, the other a whole round region.
            let (rect_sub, rect_region, round_region) = if sa.is_round() {
                (b, rb, ra)
            } else {
                (a, ra, rb)
            };
            let bounds = subvol_bounds(&regions[rect_region], subs[rect_sub].coor_ind);
            if regions[rect_region].parent == Some(round_region) {
                // Box nested in the round region: count outward faces.
                let dirs = faces_toward_round_parent(
                    regions,
                    rect_region,
                    round_region,
                    &bounds,
                    adj_error,
                );
                Ok(dirs.len())
            } else if regions[round_region].parent == Some(rect_region) {
                // Round region nested in the box: adjacency by intersection
                // with one subvolume of clearance.
                Ok(
                    if intersects(
                        &bounds,
                        &regions[round_region].boundary,
                        regions[rect_region].actual_sub_size,
                    )? {
                        1
                    } else {
                        0
                    },
                )
            } else {
                Err(PlumeError::geometry(
                    regions[rect_region].label(),
                    format!(
                        "round region \"{}\" touches without a parent/child relation",
                        regions[round_region].label()
                    ),
                ))
            }
        }
    }
}

/// Directions in which a box subvolume on the outer boundary of `region`
/// faces its round parent.
fn faces_toward_round_parent(
    regions: &[Region],
    region: usize,
    parent: usize,
    bounds: &Boundary,
    adj_error: f64,
) -> Vec<CardinalDir> {
    let mut dirs = Vec::new();
    let region_b = &regions[region].boundary;
    let parent_b = &regions[parent].boundary;
    for axis in 0..3 {
        let (lo, hi) = CardinalDir::along(plume_geometry::Axis::from_index(axis));
        // A face on the region's own outer wall faces the parent.
        if (bounds.coor[2 * axis] - region_b.coor[2 * axis]).abs() < adj_error {
            let mut probe = center_of(bounds);
            probe[axis] = bounds.coor[2 * axis] - adj_error;
            if parent_b.contains(&probe) {
                dirs.push(lo);
            }
        }
        if (bounds.coor[2 * axis + 1] - region_b.coor[2 * axis + 1]).abs() < adj_error {
            let mut probe = center_of(bounds);
            probe[axis] = bounds.coor[2 * axis + 1] + adj_error;
            if parent_b.contains(&probe) {
                dirs.push(hi);
            }
        }
    }
    dirs
}

fn center_of(b: &Boundary) -> Point {
    [
        (b.coor[0] + b.coor[1]) / 2.0,
        (b.coor[2] + b.coor[3]) / 2.0,
        (b.coor[4] + b.coor[5]) / 2.0,
    ]
}

/// Directions in which a boundary subvolume (given by its bounds) faces
/// the target region: a point nudged just past each face must land inside
/// the target region and not inside one of its children.
fn sub_faces_toward_region(
    regions: &[Region],
    _subs: &[Subvolume],
    _grids: &[SubGrid],
    target: usize,
    bounds: &Boundary,
    adj_error: f64,
) -> Vec<CardinalDir> {
    let mut dirs = Vec::new();
    let center = center_of(bounds);
    for axis in 0..3 {
        let (lo, hi) = CardinalDir::along(plume_geometry::Axis::from_index(axis));
        let mut probe = center;
        probe[axis] = bounds.coor[2 * axis] - adj_error;
        if point_in_not_child(regions, target, &probe) {
            dirs.push(lo);
        }
        let mut probe = center;
        probe[axis] = bounds.coor[2 * axis + 1] + adj_error;
        if point_in_not_child(regions, target, &probe) {
            dirs.push(hi);
        }
    }
    dirs
}

fn point_in_not_child(regions: &[Region], region: usize, p: &Point) -> bool {
    regions[region].boundary.contains(p)
        && !regions[region]
            .children
            .iter()
            .any(|&c| regions[c].boundary.contains(p))
}

/// Distance between the centers of two subvolumes (test helper and
/// diagnostics).
pub fn sub_center_distance(env: &Environment, a: usize, b: usize) -> f64 {
    let ca = center_of(&env.sub_bounds(a));
    let cb = center_of(&env.sub_bounds(b));
    point_distance(&ca, &cb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::build_regions;
    use plume_core::config::{RegionKind, RegionSpec, ShapeName};

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

    fn build(specs: Vec<RegionSpec>, types: usize, d: f64) -> Environment {
        let regions = build_regions(&specs, 1.0).unwrap();
        build_environment(regions, 1.0, types, vec![d; types]).unwrap()
    }

    #[test]
    fn test_single_box_neighbors() {
        let env = build(vec![box_spec("box", [0.0, 0.0, 0.0], [3, 3, 3], false)], 1, 1.0);
        assert_eq!(env.subs.len(), 27);
        assert_eq!(env.meso_subs.len(), 27);
        // Center subvolume has all six neighbors and is not a boundary.
        let center = env.grids[0].get(1, 1, 1).unwrap();
        assert_eq!(env.subs[center].neighbors.len(), 6);
        assert!(!env.subs[center].is_boundary);
        // Corner subvolume has three neighbors and is a boundary.
        let corner = env.grids[0].get(0, 0, 0).unwrap();
        assert_eq!(env.subs[corner].neighbors.len(), 3);
        assert!(env.subs[corner].is_boundary);
    }

    #[test]
    fn test_cross_region_neighbors_and_rates() {
        let d = 2.0;
        let env = build(
            vec![
                box_spec("left", [0.0, 0.0, 0.0], [2, 2, 2], false),
                box_spec("right", [2.0, 0.0, 0.0], [2, 2, 2], false),
            ],
            1,
            d,
        );
        // Each face subvolume of "left" at x-high borders one "right"
        // subvolume at x-low.
        let a = env.grids[0].get(1, 0, 0).unwrap();
        let b = env.grids[1].get(0, 0, 0).unwrap();
        assert!(env.subs[a].neighbors.contains(&b));
        assert!(env.subs[b].neighbors.contains(&a));
        // All subvolumes are boundary subvolumes in a 2x2x2 grid; rates
        // toward same-region neighbors are D/h^2, and across the region
        // interface 2D/(h(h+h)) = D/h^2 as well for equal subvolume sizes.
        let ni = env.subs[a].neighbors.iter().position(|&n| n == b).unwrap();
        let rate = env.subs[a].diff_rate_neigh[0][ni];
        assert!((rate - d).abs() < 1e-12);
    }

    #[test]
    fn test_meso_micro_boundary_bookkeeping() {
        let env = build(
            vec![
                box_spec("meso", [0.0, 0.0, 0.0], [2, 2, 2], false),
                box_spec("micro", [2.0, 0.0, 0.0], [2, 2, 2], true),
            ],
            1,
            1.0,
        );
        // No meso ids on the micro side.
        assert_eq!(env.meso_subs.len(), 8);
        // The meso region records four boundary subvolumes facing the
        // micro region, each with one virtual cell to the right.
        let entries = &env.bound_subs[0][1];
        assert_eq!(entries.len(), 4);
        for entry in entries {
            assert_eq!(entry.virtual_cells.len(), 1);
            let (dir, anchor) = entry.virtual_cells[0];
            assert_eq!(dir, CardinalDir::Right);
            assert!((anchor[0] - 2.0).abs() < 1e-12);
        }
        // Nearest-subvolume search picks the subvolume closest in y/z.
        let nearest = env
            .nearest_bound_sub(0, 1, &[2.1, 0.4, 0.4])
            .unwrap();
        assert_eq!(nearest, env.grids[0].get(1, 0, 0).unwrap());
    }

    #[test]
    fn test_nested_child_makes_parent_boundary_cells() {
        let mut child = box_spec("inner", [1.0, 1.0, 1.0], [2, 2, 2], false);
        child.parent_label = "outer".to_string();
        let env = build(
            vec![box_spec("outer", [0.0, 0.0, 0.0], [4, 4, 4], false), child],
            1,
            1.0,
        );
        assert_eq!(env.subs.len(), 64 - 8 + 8);
        // A parent cell face-adjacent to the child hole is flagged as
        // boundary and neighbors a child subvolume.
        let beside_hole = env.grids[0].get(0, 1, 1).unwrap();
        assert!(env.subs[beside_hole].is_boundary);
        let child_sub = env.grids[1].get(0, 0, 0).unwrap();
        assert!(env.subs[beside_hole].neighbors.contains(&child_sub));
        // The hole itself has no subvolume.
        assert!(env.grids[0].get(1, 1, 1).is_none());
    }
}
