//! Microscopic molecule engine.
//!
//! Every microscopic region keeps two stores per molecule type: the
//! *steady* list of molecules that completed at least one full step at
//! their position, and the *recent* list of molecules created mid-step,
//! which carry the fraction of the step remaining until the next micro
//! barrier. One call to [`micro_tick`] advances every microscopic region
//! by one global time step: zeroth- and first-order reactions fire, every
//! molecule takes its Brownian jump (plus flow advection in cylinders),
//! and each trajectory is validated against region boundaries.

use std::mem;

use log::warn;
use plume_core::config::{FlowFunction, FlowProfile, FlowSpec};
use plume_core::{Result, SimRng, MAX_PATH_DEPTH, SUB_ADJ_RESOLUTION};
use plume_geometry::{
    define_line, line_hit_boundary, line_hit_plane, point_on_face, push_point, reflect_point,
    Boundary, Face, Point, RayHit, Reflection, Shape,
};

use crate::chem::RegionChem;
use crate::graph::Environment;
use crate::meso::MesoState;
use crate::region::{shared_with_parent, NeighborGeom, NeighborRelation};

/// A molecule in the steady store.
#[derive(Debug, Clone, Copy)]
pub struct MicroMol {
    pub pos: Point,
    /// Set at the start of a region tick; cleared once the molecule has
    /// moved, so arrivals from other regions are not moved twice.
    pub needs_update: bool,
}

/// A molecule created mid-step, carrying its remaining step fraction.
#[derive(Debug, Clone, Copy)]
pub struct RecentMol {
    pub pos: Point,
    pub dt_partial: f64,
}

/// Steady and recent molecule stores for all microscopic regions,
/// indexed `[region][molecule type]`.
#[derive(Debug)]
pub struct MicroState {
    pub steady: Vec<Vec<Vec<MicroMol>>>,
    pub recent: Vec<Vec<Vec<RecentMol>>>,
}

impl MicroState {
    pub fn new(env: &Environment) -> Self {
        let empty_steady = vec![Vec::new(); env.num_mol_types];
        let empty_recent = vec![Vec::new(); env.num_mol_types];
        MicroState {
            steady: vec![empty_steady; env.regions.len()],
            recent: vec![empty_recent; env.regions.len()],
        }
    }

    /// Inserts a newly created molecule (actor release or meso arrival).
    pub fn add_recent(&mut self, region: usize, ty: usize, pos: Point, dt_partial: f64) {
        self.recent[region][ty].push(RecentMol {
            pos,
            dt_partial: dt_partial.max(0.0),
        });
    }

    /// Number of molecules of one type in one region matching a filter.
    pub fn count_matching<F: Fn(&Point) -> bool>(&self, region: usize, ty: usize, pred: F) -> u64 {
        let steady = self.steady[region][ty].iter().filter(|m| pred(&m.pos)).count();
        let recent = self.recent[region][ty].iter().filter(|m| pred(&m.pos)).count();
        (steady + recent) as u64
    }

    /// Positions of molecules of one type in one region matching a filter.
    pub fn collect_matching<F: Fn(&Point) -> bool>(
        &self,
        region: usize,
        ty: usize,
        pred: F,
    ) -> Vec<Point> {
        let mut out: Vec<Point> = self.steady[region][ty]
            .iter()
            .filter(|m| pred(&m.pos))
            .map(|m| m.pos)
            .collect();
        out.extend(
            self.recent[region][ty]
                .iter()
                .filter(|m| pred(&m.pos))
                .map(|m| m.pos),
        );
        out
    }

    /// Total molecule count across all stores (conservation checks).
    pub fn total_count(&self) -> u64 {
        let steady: usize = self
            .steady
            .iter()
            .flat_map(|r| r.iter().map(|l| l.len()))
            .sum();
        let recent: usize = self
            .recent
            .iter()
            .flat_map(|r| r.iter().map(|l| l.len()))
            .sum();
        (steady + recent) as u64
    }
}

/// Where a validated trajectory ended up.
#[derive(Debug, Clone, Copy)]
pub enum PathOutcome {
    /// Final position inside a microscopic region (possibly the start
    /// region, possibly after reflections).
    Micro { region: usize, point: Point },
    /// The trajectory crossed into a mesoscopic region; `from` is the
    /// microscopic region it came from.
    Meso {
        region: usize,
        from: usize,
        point: Point,
    },
    /// Absorbed at a surface.
    Absorbed,
}

/// Instantaneous centerline flow velocity.
pub fn flow_velocity(flow: &FlowSpec, t: f64) -> f64 {
    match flow.function {
        FlowFunction::Linear => flow.velocity + flow.acceleration * t,
        FlowFunction::Sinus => {
            flow.velocity
                + flow.amplitude * (2.0 * std::f64::consts::PI * flow.frequency * t).sin()
        }
    }
}

/// Axial flow displacement for a molecule at `pos` over `dt_step`,
/// `None` when the region carries no flow.
fn flow_displacement(
    env: &Environment,
    region: usize,
    pos: &Point,
    t: f64,
    dt_step: f64,
) -> Option<(usize, f64)> {
    let r = &env.regions[region];
    let flow = r.flow.as_ref()?;
    let axis = r.cylinder_axis()?;
    let v = flow_velocity(flow, t);
    let v_local = match flow.profile {
        FlowProfile::Uniform => v,
        FlowProfile::Laminar => {
            let r_sq = r.boundary.radial_dist_sq(pos, axis);
            2.0 * v * (1.0 - r_sq / r.boundary.radius_sq())
        }
    };
    Some((axis.index(), v_local * dt_step))
}

/// Advances every microscopic region by one global time step starting at
/// `t_now`.
///
/// Processing is phase-major across regions in declared order: all
/// reactions fire before any molecule moves, so a molecule that crosses
/// into a region later in the order is not moved twice within the same
/// barrier (its update flag is cleared on arrival).
pub fn micro_tick(
    env: &Environment,
    chem: &[RegionChem],
    t_now: f64,
    dt: f64,
    micro: &mut MicroState,
    meso: &mut MesoState,
    rng: &mut SimRng,
) -> Result<()> {
    let micro_regions: Vec<usize> = (0..env.regions.len())
        .filter(|&r| env.regions[r].is_micro())
        .collect();

    for &region in &micro_regions {
        for list in &mut micro.steady[region] {
            for mol in list.iter_mut() {
                mol.needs_update = true;
            }
        }
    }
    for &region in &micro_regions {
        zeroth_order(env, chem, region, dt, micro, rng);
        first_order_steady(env, chem, region, dt, micro, rng);
        first_order_recent(env, chem, region, micro, rng);
    }
    for &region in &micro_regions {
        diffuse_steady(env, chem, region, t_now, dt, micro, meso, rng);
    }
    for &region in &micro_regions {
        settle_recent(env, chem, region, t_now, micro, meso, rng);
    }
    for &region in &micro_regions {
        for list in &mut micro.steady[region] {
            for mol in list.iter_mut() {
                mol.needs_update = false;
            }
        }
    }
    Ok(())
}

/// Zeroth-order production: Poisson number of events over the step, each
/// at a uniform position and a uniform creation instant.
fn zeroth_order(
    env: &Environment,
    chem: &[RegionChem],
    region: usize,
    dt: f64,
    micro: &mut MicroState,
    rng: &mut SimRng,
) {
    for z in 0..chem[region].zeroth.len() {
        let local = chem[region].zeroth[z];
        let mean = chem[region].rxns[local].micro_zeroth_rate * dt;
        let count = rng.poisson(mean);
        for _ in 0..count {
            let pos = generate_point_in_region(env, region, rng);
            let dt_partial = rng.uniform() * dt;
            for pi in 0..chem[region].rxns[local].products.len() {
                let product = chem[region].rxns[local].products[pi];
                micro.add_recent(region, product, pos, dt_partial);
            }
        }
    }
}

/// First-order reactions for steady molecules, with exact conditional
/// reaction times for the spawned products.
fn first_order_steady(
    env: &Environment,
    chem: &[RegionChem],
    region: usize,
    dt: f64,
    micro: &mut MicroState,
    rng: &mut SimRng,
) {
    for ty in 0..env.num_mol_types {
        let table = &chem[region].first_order[ty];
        if table.rxns.is_empty() {
            continue;
        }
        let list = mem::take(&mut micro.steady[region][ty]);
        let mut kept = Vec::with_capacity(list.len());
        for mol in list {
            let u = rng.uniform();
            let fired = table
                .rxns
                .iter()
                .enumerate()
                .find(|&(k, _)| u < table.cum_prob[k])
                .map(|(_, &local)| local);
            match fired {
                None => kept.push(mol),
                Some(local) => {
                    let products = chem[region].rxns[local].products.clone();
                    if !products.is_empty() {
                        // Conditional reaction time within the step.
                        let m = table.min_rxn_time_rv;
                        let tau = -((1.0 - m) * rng.uniform() + m).ln() / table.sum_rate;
                        let dt_partial = dt - tau;
                        for product in products {
                            micro.add_recent(region, product, mol.pos, dt_partial);
                        }
                    }
                }
            }
        }
        micro.steady[region][ty] = kept;
    }
}

/// First-order reactions for recent molecules. Products of a reaction
/// are themselves recent molecules with a shorter remaining step, so the
/// check repeats until no new molecules appear (bounded).
fn first_order_recent(
    env: &Environment,
    chem: &[RegionChem],
    region: usize,
    micro: &mut MicroState,
    rng: &mut SimRng,
) {
    let num_types = env.num_mol_types;
    let mut unprocessed: Vec<Vec<RecentMol>> = (0..num_types)
        .map(|ty| mem::take(&mut micro.recent[region][ty]))
        .collect();
    let mut done: Vec<Vec<RecentMol>> = vec![Vec::new(); num_types];

    let mut rounds = 0;
    while unprocessed.iter().any(|l| !l.is_empty()) {
        rounds += 1;
        if rounds > MAX_PATH_DEPTH {
            warn!(
                "recent-reaction cascade depth exceeded in region \"{}\"",
                env.regions[region].label()
            );
            for (ty, list) in unprocessed.iter_mut().enumerate() {
                done[ty].append(list);
            }
            break;
        }
        for ty in 0..num_types {
            let batch = mem::take(&mut unprocessed[ty]);
            if batch.is_empty() {
                continue;
            }
            let table = &chem[region].first_order[ty];
            if table.rxns.is_empty() {
                done[ty].extend(batch);
                continue;
            }
            for mol in batch {
                let u = rng.uniform();
                let decay = 1.0 - (-mol.dt_partial * table.sum_rate).exp();
                let mut cum = 0.0;
                let mut fired = None;
                for (k, &local) in table.rxns.iter().enumerate() {
                    cum += table.relative_rate[k] * decay;
                    if u < cum {
                        fired = Some(local);
                        break;
                    }
                }
                match fired {
                    None => done[ty].push(mol),
                    Some(local) => {
                        let products = &chem[region].rxns[local].products;
                        if !products.is_empty() {
                            let m = (-mol.dt_partial * table.sum_rate).exp();
                            let tau =
                                -((1.0 - m) * rng.uniform() + m).ln() / table.sum_rate;
                            let dt_partial = (mol.dt_partial - tau).max(0.0);
                            for &product in products {
                                unprocessed[product].push(RecentMol {
                                    pos: mol.pos,
                                    dt_partial,
                                });
                            }
                        }
                    }
                }
            }
        }
    }
    for (ty, list) in done.iter_mut().enumerate() {
        micro.recent[region][ty] = mem::take(list);
    }
}

/// Brownian jump plus flow for every flagged steady molecule, with path
/// validation.
#[allow(clippy::too_many_arguments)]
fn diffuse_steady(
    env: &Environment,
    chem: &[RegionChem],
    region: usize,
    t_now: f64,
    dt: f64,
    micro: &mut MicroState,
    meso: &mut MesoState,
    rng: &mut SimRng,
) {
    for ty in 0..env.num_mol_types {
        let sigma = (2.0 * env.diff_coef[ty] * dt).sqrt();
        let list = mem::take(&mut micro.steady[region][ty]);
        let mut kept = Vec::with_capacity(list.len());
        for mol in list {
            if !mol.needs_update {
                kept.push(mol);
                continue;
            }
            let old = mol.pos;
            let mut new = [
                rng.normal(old[0], sigma),
                rng.normal(old[1], sigma),
                rng.normal(old[2], sigma),
            ];
            if let Some((axis, shift)) = flow_displacement(env, region, &old, t_now, dt) {
                new[axis] += shift;
            }
            match validate_path(env, chem, ty, region, &old, &new, rng) {
                PathOutcome::Micro {
                    region: dest,
                    point,
                } => {
                    let landed = MicroMol {
                        pos: point,
                        needs_update: false,
                    };
                    if dest == region {
                        kept.push(landed);
                    } else {
                        micro.steady[dest][ty].push(landed);
                    }
                }
                PathOutcome::Meso {
                    region: dest,
                    from,
                    point,
                } => {
                    deliver_to_meso(env, meso, dest, from, ty, &point, &mut kept, &old);
                }
                PathOutcome::Absorbed => {}
            }
        }
        micro.steady[region][ty] = kept;
    }
}

/// Diffuses every recent molecule over its remaining step fraction and
/// promotes it to the steady store of wherever it lands.
fn settle_recent(
    env: &Environment,
    chem: &[RegionChem],
    region: usize,
    t_now: f64,
    micro: &mut MicroState,
    meso: &mut MesoState,
    rng: &mut SimRng,
) {
    for ty in 0..env.num_mol_types {
        let list = mem::take(&mut micro.recent[region][ty]);
        for mol in list {
            let sigma = (2.0 * env.diff_coef[ty] * mol.dt_partial).sqrt();
            let old = mol.pos;
            let mut new = [
                rng.normal(old[0], sigma),
                rng.normal(old[1], sigma),
                rng.normal(old[2], sigma),
            ];
            if let Some((axis, shift)) =
                flow_displacement(env, region, &old, t_now, mol.dt_partial)
            {
                new[axis] += shift;
            }
            match validate_path(env, chem, ty, region, &old, &new, rng) {
                PathOutcome::Micro {
                    region: dest,
                    point,
                } => {
                    micro.steady[dest][ty].push(MicroMol {
                        pos: point,
                        needs_update: false,
                    });
                }
                PathOutcome::Meso {
                    region: dest,
                    from,
                    point,
                } => {
                    let mut sink = Vec::new();
                    deliver_to_meso(env, meso, dest, from, ty, &point, &mut sink, &old);
                    for m in sink {
                        micro.steady[region][ty].push(m);
                    }
                }
                PathOutcome::Absorbed => {}
            }
        }
    }
}

/// Adds a molecule to the nearest boundary subvolume of a mesoscopic
/// region. When the bookkeeping has no entry (should not happen for a
/// validated transfer), the molecule is kept at its old position.
#[allow(clippy::too_many_arguments)]
fn deliver_to_meso(
    env: &Environment,
    meso: &mut MesoState,
    dest: usize,
    from: usize,
    ty: usize,
    point: &Point,
    fallback: &mut Vec<MicroMol>,
    old: &Point,
) {
    match env.nearest_bound_sub(dest, from, point) {
        Some(sub_id) => meso.add_from_micro(env, sub_id, ty),
        None => {
            warn!(
                "no boundary subvolume of region \"{}\" faces region \"{}\"; keeping molecule",
                env.regions[dest].label(),
                env.regions[from].label()
            );
            fallback.push(MicroMol {
                pos: *old,
                needs_update: false,
            });
        }
    }
}

/// Uniform random point inside a region, excluding its children.
pub fn generate_point_in_region(env: &Environment, region: usize, rng: &mut SimRng) -> Point {
    for _ in 0..10_000 {
        let p = env.regions[region].boundary.uniform_point(rng);
        if env.point_in_region_not_child(region, &p) {
            return p;
        }
    }
    warn!(
        "rejection sampling failed in region \"{}\"",
        env.regions[region].label()
    );
    env.regions[region].boundary.uniform_point(rng)
}

/// Validates the step from `old` to `new` for a molecule in
/// `start_region`.
pub fn validate_path(
    env: &Environment,
    chem: &[RegionChem],
    ty: usize,
    start_region: usize,
    old: &Point,
    new: &Point,
    rng: &mut SimRng,
) -> PathOutcome {
    if env.regions[start_region].children.is_empty()
        && env.point_in_region_not_child(start_region, new)
    {
        return PathOutcome::Micro {
            region: start_region,
            point: *new,
        };
    }
    let (line, len) = define_line(old, new);
    if len == 0.0 {
        return PathOutcome::Micro {
            region: start_region,
            point: *new,
        };
    }
    follow(env, chem, ty, *old, *new, line, len, start_region, 0, rng)
}

/// Recursively follows a trajectory through region boundaries from its
/// start point until it reaches its endpoint, reflects, is absorbed, or
/// enters a mesoscopic region.
#[allow(clippy::too_many_arguments)]
fn follow(
    env: &Environment,
    chem: &[RegionChem],
    ty: usize,
    start: Point,
    end: Point,
    line: Point,
    len: f64,
    cur_region: usize,
    depth: u32,
    rng: &mut SimRng,
) -> PathOutcome {
    if depth > MAX_PATH_DEPTH {
        warn!(
            "path validation depth exceeded in region \"{}\"; pinning molecule",
            env.regions[cur_region].label()
        );
        return PathOutcome::Micro {
            region: cur_region,
            point: start,
        };
    }
    let region = &env.regions[cur_region];

    // Closest neighbor boundary crossed by the segment, if any.
    let mut best: Option<(usize, RayHit)> = None;
    for (other, geom) in region.neigh_geom.iter().enumerate() {
        let Some(geom) = geom else { continue };
        let hit = match geom {
            NeighborGeom::Whole { boundary, inside } => {
                match line_hit_boundary(&start, &line, len, boundary, *inside) {
                    Some(h)
                        if region.relation[other] == NeighborRelation::Parent
                            && shared_with_parent(&env.regions, cur_region, other, h.face) =>
                    {
                        None
                    }
                    h => h,
                }
            }
            NeighborGeom::Plane {
                face_boundary,
                face,
            } => line_hit_plane(&start, &line, len, face_boundary, *face, false)
                .filter(|(_, p)| point_on_face(p, face_boundary, *face))
                .map(|(dist, point)| RayHit {
                    face: *face,
                    dist,
                    point,
                }),
        };
        if let Some(h) = hit {
            if best.as_ref().map_or(true, |(_, b)| h.dist < b.dist) {
                best = Some((other, h));
            }
        }
    }

    if let Some((other, hit)) = best {
        if env.regions[other].is_surface() {
            return surface_hit(
                env, chem, ty, start, end, line, len, cur_region, other, hit, depth, rng,
            );
        }
        let mut ip = hit.point;
        let lock_region = if region.relation[other] == NeighborRelation::Child {
            other
        } else {
            cur_region
        };
        lock_to_boundary(&mut ip, &env.regions[lock_region].boundary, hit.face);
        let remaining = len - hit.dist;
        let landed = push_into(env, other, &ip, &line, remaining);
        let actual = env.point_in_region_or_child(other, &landed).unwrap_or(other);
        if !env.regions[actual].is_micro() {
            return PathOutcome::Meso {
                region: actual,
                from: cur_region,
                point: landed,
            };
        }
        return follow(
            env,
            chem,
            ty,
            landed,
            end,
            line,
            remaining,
            actual,
            depth + 1,
            rng,
        );
    }

    if env.point_in_region_not_child(cur_region, &end) {
        return PathOutcome::Micro {
            region: cur_region,
            point: end,
        };
    }

    // The endpoint escaped the region without crossing a neighbor face:
    // reflect off the region's own boundary.
    match reflect_point(&start, &line, len, &end, &region.boundary, true) {
        Reflection::Pinned { point } => PathOutcome::Micro {
            region: cur_region,
            point,
        },
        Reflection::Reflected {
            point: new_end,
            hit,
        } => {
            let mut ip = hit.point;
            lock_to_boundary(&mut ip, &region.boundary, hit.face);
            let (l2, len2) = define_line(&ip, &new_end);
            if len2 == 0.0 {
                return PathOutcome::Micro {
                    region: cur_region,
                    point: ip,
                };
            }
            follow(
                env,
                chem,
                ty,
                ip,
                new_end,
                l2,
                len2,
                cur_region,
                depth + 1,
                rng,
            )
        }
    }
}

/// Handles a trajectory hitting a surface region: membrane pass-through,
/// absorption, or reflection.
#[allow(clippy::too_many_arguments)]
fn surface_hit(
    env: &Environment,
    chem: &[RegionChem],
    ty: usize,
    start: Point,
    end: Point,
    line: Point,
    len: f64,
    cur_region: usize,
    surf_region: usize,
    hit: RayHit,
    depth: u32,
    rng: &mut SimRng,
) -> PathOutcome {
    let surf_chem = &chem[surf_region];
    if let Some(p_cross) = surf_chem.membrane_prob(ty) {
        if rng.uniform() < p_cross {
            // Pass through: continue on the far side of the surface.
            let remaining = len - hit.dist;
            let nudge = (remaining.max(env.regions[cur_region].sub_resolution))
                * SUB_ADJ_RESOLUTION;
            let landed = push_point(&hit.point, &line, nudge);
            let next = env
                .find_region_not_child(&landed)
                .unwrap_or(cur_region);
            if !env.regions[next].is_micro() {
                return PathOutcome::Meso {
                    region: next,
                    from: cur_region,
                    point: landed,
                };
            }
            return follow(
                env,
                chem,
                ty,
                landed,
                end,
                line,
                remaining,
                next,
                depth + 1,
                rng,
            );
        }
    } else if let Some(p_abs) = surf_chem.absorbing_prob(ty) {
        if rng.uniform() < p_abs.min(1.0) {
            return PathOutcome::Absorbed;
        }
    }

    // Not crossed, not absorbed: the surface reflects.
    let surf_boundary = &env.regions[surf_region].boundary;
    let inside = surf_boundary.contains(&start);
    match reflect_point(&start, &line, len, &end, surf_boundary, inside) {
        Reflection::Pinned { point } => PathOutcome::Micro {
            region: cur_region,
            point,
        },
        Reflection::Reflected {
            point: new_end,
            hit: surf_hit,
        } => {
            let mut ip = surf_hit.point;
            lock_to_boundary(&mut ip, surf_boundary, surf_hit.face);
            let (l2, len2) = define_line(&ip, &new_end);
            if len2 == 0.0 {
                return PathOutcome::Micro {
                    region: cur_region,
                    point: ip,
                };
            }
            follow(
                env,
                chem,
                ty,
                ip,
                new_end,
                l2,
                len2,
                cur_region,
                depth + 1,
                rng,
            )
        }
    }
}

/// Locks a computed intersection point exactly onto a boundary face,
/// eliminating drift from the ray arithmetic.
fn lock_to_boundary(p: &mut Point, b: &Boundary, face: Face) {
    match (b.shape, face) {
        (Shape::Rectangle | Shape::RectangularBox, f) => {
            if let (Some(idx), Some(axis)) = (f.plane_index(), f.normal_axis()) {
                p[axis.index()] = b.coor[idx];
            }
        }
        (Shape::Sphere, _) => {
            // Adjust the x coordinate to put the point on the surface.
            let dy_sq = (p[1] - b.coor[1]) * (p[1] - b.coor[1]);
            let dz_sq = (p[2] - b.coor[2]) * (p[2] - b.coor[2]);
            let rem = b.radius_sq() - dy_sq - dz_sq;
            if rem >= 0.0 {
                let root = rem.sqrt();
                p[0] = if p[0] > b.coor[0] {
                    b.coor[0] + root
                } else {
                    b.coor[0] - root
                };
            }
        }
        (Shape::Cylinder(axis), Face::CapLo) => {
            p[axis.index()] = b.coor[axis.index()];
        }
        (Shape::Cylinder(axis), Face::CapHi) => {
            p[axis.index()] = b.coor[axis.index()] + b.length();
        }
        (Shape::Cylinder(axis), _) => {
            let (j, k) = axis.cross();
            let dist = b.radial_dist_sq(p, axis).sqrt();
            if dist > 0.0 {
                let scale = b.radius() / dist;
                p[j] = b.coor[j] + (p[j] - b.coor[j]) * scale;
                p[k] = b.coor[k] + (p[k] - b.coor[k]) * scale;
            }
        }
    }
}

/// Pushes a locked boundary point slightly into the destination region,
/// shrinking the push until the point is inside.
fn push_into(env: &Environment, region: usize, ip: &Point, line: &Point, remaining: f64) -> Point {
    let step = if remaining > 0.0 {
        remaining
    } else {
        env.regions[region].sub_resolution
    };
    let mut frac = SUB_ADJ_RESOLUTION;
    for _ in 0..12 {
        let p = push_point(ip, line, step * frac);
        if env.regions[region].boundary.contains(&p) {
            return p;
        }
        frac *= 0.1;
    }
    *ip
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::compile_reactions;
    use crate::graph::build_environment;
    use crate::meso::MesoState;
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

    fn single_box_env(d: f64) -> (Environment, Vec<RegionChem>) {
        let regions =
            build_regions(&[box_spec("box", [0.0, 0.0, 0.0], [4, 4, 4], true)], 1.0).unwrap();
        let env = build_environment(regions, 1.0, 1, vec![d]).unwrap();
        let chem = compile_reactions(&env.regions, &[], &env.diff_coef, 1, 1e-3).unwrap();
        (env, chem)
    }

    #[test]
    fn test_molecules_stay_in_reflecting_box() {
        let (env, chem) = single_box_env(50.0);
        let mut micro = MicroState::new(&env);
        let mut meso = MesoState::new(&env, &chem);
        let mut rng = SimRng::new(7, 0);
        for _ in 0..50 {
            micro.steady[0][0].push(MicroMol {
                pos: generate_point_in_region(&env, 0, &mut rng),
                needs_update: false,
            });
        }
        // Large sigma forces many boundary interactions.
        for step in 0..20 {
            micro_tick(&env, &chem, step as f64 * 1e-3, 1e-3, &mut micro, &mut meso, &mut rng)
                .unwrap();
        }
        assert_eq!(micro.total_count(), 50);
        for mol in &micro.steady[0][0] {
            assert!(
                env.regions[0].boundary.contains(&mol.pos),
                "escaped to {:?}",
                mol.pos
            );
        }
    }

    #[test]
    fn test_first_order_decay_removes_molecules() {
        let regions =
            build_regions(&[box_spec("box", [0.0, 0.0, 0.0], [4, 4, 4], true)], 1.0).unwrap();
        let env = build_environment(regions, 1.0, 1, vec![0.0]).unwrap();
        // Decay fast enough that everything reacts within a few steps.
        let decay = plume_core::config::ReactionSpec {
            reactants: vec![1],
            products: vec![0],
            k: 1e5,
            is_surface: false,
            surface_kind: plume_core::config::SurfaceRxnKind::Normal,
            everywhere: true,
            exception_regions: Vec::new(),
        };
        let chem = compile_reactions(&env.regions, &[decay], &env.diff_coef, 1, 1e-3).unwrap();
        let mut micro = MicroState::new(&env);
        let mut meso = MesoState::new(&env, &chem);
        let mut rng = SimRng::new(3, 0);
        for _ in 0..100 {
            micro.steady[0][0].push(MicroMol {
                pos: [2.0, 2.0, 2.0],
                needs_update: false,
            });
        }
        for step in 0..10 {
            micro_tick(&env, &chem, step as f64 * 1e-3, 1e-3, &mut micro, &mut meso, &mut rng)
                .unwrap();
        }
        assert_eq!(micro.total_count(), 0);
    }

    #[test]
    fn test_conversion_conserves_total_count() {
        let regions =
            build_regions(&[box_spec("box", [0.0, 0.0, 0.0], [4, 4, 4], true)], 1.0).unwrap();
        let env = build_environment(regions, 1.0, 2, vec![0.0, 0.0]).unwrap();
        let convert = plume_core::config::ReactionSpec {
            reactants: vec![1, 0],
            products: vec![0, 1],
            k: 1e4,
            is_surface: false,
            surface_kind: plume_core::config::SurfaceRxnKind::Normal,
            everywhere: true,
            exception_regions: Vec::new(),
        };
        let chem = compile_reactions(&env.regions, &[convert], &env.diff_coef, 2, 1e-3).unwrap();
        let mut micro = MicroState::new(&env);
        let mut meso = MesoState::new(&env, &chem);
        let mut rng = SimRng::new(11, 0);
        for _ in 0..200 {
            micro.steady[0][0].push(MicroMol {
                pos: [2.0, 2.0, 2.0],
                needs_update: false,
            });
        }
        for step in 0..5 {
            micro_tick(&env, &chem, step as f64 * 1e-3, 1e-3, &mut micro, &mut meso, &mut rng)
                .unwrap();
        }
        // A -> B conversion must not create or destroy molecules.
        assert_eq!(micro.total_count(), 200);
        assert!(micro.steady[0][1].len() > 0, "no molecules converted");
    }

    #[test]
    fn test_transfer_between_micro_regions() {
        let regions = build_regions(
            &[
                box_spec("left", [0.0, 0.0, 0.0], [2, 2, 2], true),
                box_spec("right", [2.0, 0.0, 0.0], [2, 2, 2], true),
            ],
            1.0,
        )
        .unwrap();
        let env = build_environment(regions, 1.0, 1, vec![20.0]).unwrap();
        let chem = compile_reactions(&env.regions, &[], &env.diff_coef, 1, 1e-3).unwrap();
        let mut micro = MicroState::new(&env);
        let mut meso = MesoState::new(&env, &chem);
        let mut rng = SimRng::new(5, 0);
        for _ in 0..100 {
            micro.steady[0][0].push(MicroMol {
                pos: [1.9, 1.0, 1.0],
                needs_update: false,
            });
        }
        for step in 0..10 {
            micro_tick(&env, &chem, step as f64 * 1e-3, 1e-3, &mut micro, &mut meso, &mut rng)
                .unwrap();
        }
        assert_eq!(micro.total_count(), 100);
        let right_count = micro.steady[1][0].len();
        assert!(right_count > 0, "no molecules crossed the interface");
        // Everyone is inside the union of the two regions.
        for region in 0..2 {
            for mol in &micro.steady[region][0] {
                assert!(env.regions[region].boundary.contains(&mol.pos));
            }
        }
    }

    #[test]
    fn test_flow_advects_along_cylinder() {
        let spec = RegionSpec {
            label: "pipe".to_string(),
            parent_label: String::new(),
            shape: ShapeName::Cylinder,
            kind: RegionKind::Normal,
            surface_kind: None,
            anchor: [0.0, 0.0, 0.0],
            size_rect: 1,
            radius: 5.0,
            num: [100, 0, 0],
            is_microscopic: true,
            flow: Some(FlowSpec {
                velocity: 10.0,
                acceleration: 0.0,
                function: FlowFunction::Linear,
                frequency: 0.0,
                amplitude: 0.0,
                profile: FlowProfile::Uniform,
            }),
            dt: 1e-2,
        };
        let regions = build_regions(&[spec], 1.0).unwrap();
        let env = build_environment(regions, 1.0, 1, vec![1e-4]).unwrap();
        let chem = compile_reactions(&env.regions, &[], &env.diff_coef, 1, 1e-2).unwrap();
        let mut micro = MicroState::new(&env);
        let mut meso = MesoState::new(&env, &chem);
        let mut rng = SimRng::new(9, 0);
        for _ in 0..50 {
            micro.steady[0][0].push(MicroMol {
                pos: [10.0, 0.0, 0.0],
                needs_update: false,
            });
        }
        for step in 0..10 {
            micro_tick(&env, &chem, step as f64 * 1e-2, 1e-2, &mut micro, &mut meso, &mut rng)
                .unwrap();
        }
        // Uniform flow of 10 over 0.1 s moves the plug by ~1.
        let mean_x: f64 = micro.steady[0][0].iter().map(|m| m.pos[0]).sum::<f64>()
            / micro.steady[0][0].len() as f64;
        assert!((mean_x - 11.0).abs() < 0.2, "mean axial position {mean_x}");
    }
}
