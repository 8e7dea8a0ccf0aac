//! Actor engine: active molecule sources and passive observers.
//!
//! Actors are placed over the environment by an explicit shape or by a
//! list of region labels. At build time every actor precomputes its
//! intersection with each region (boundary, volume excluding children,
//! cumulative volume fractions, contained mesoscopic subvolumes), so
//! placement and observation never search the full environment.
//!
//! Active actors encode data with concentration shift keying: each
//! action generates `mod_bits` random bits, and the symbol value scales
//! the number of molecules released over the release interval. Passive
//! actors snapshot molecule counts (and optionally positions) inside
//! their footprint.

use log::warn;
use plume_core::config::{ActorLocation, ActorSpec, ModScheme, ShapeName};
use plume_core::{PlumeError, Result, SimRng, SUB_ADJ_RESOLUTION};
use plume_geometry::{intersect_boundary, intersects, Axis, Boundary, Point};

use crate::graph::Environment;
use crate::meso::MesoState;
use crate::micro::MicroState;
use crate::region::subvol_bounds;

/// Resolved actor footprint.
#[derive(Debug, Clone)]
pub enum Footprint {
    Shape(Boundary),
    Regions(Vec<usize>),
}

/// One mesoscopic subvolume inside an actor footprint.
#[derive(Debug, Clone)]
pub struct ActorSub {
    pub sub_id: usize,
    /// Cumulative placement fraction within the region intersection.
    pub cum_frac: f64,
    /// Fraction of the subvolume volume covered by the footprint.
    pub overlap_frac: f64,
}

/// Intersection of an actor with one region.
#[derive(Debug, Clone)]
pub struct ActorRegion {
    pub region: usize,
    pub inter_boundary: Boundary,
    /// Intersection measure excluding the region's children.
    pub inter_volume: f64,
    /// Cumulative fraction of the actor volume up to and including this
    /// region, for placement sampling.
    pub cum_frac: f64,
    pub fully_inside: bool,
    pub meso_subs: Vec<ActorSub>,
}

/// A fully built actor.
#[derive(Debug, Clone)]
pub struct Actor {
    pub spec: ActorSpec,
    pub index: usize,
    pub footprint: Footprint,
    pub volume: f64,
    pub regions: Vec<ActorRegion>,
}

impl Actor {
    /// Does the actor footprint contain the point?
    pub fn contains(&self, env: &Environment, p: &Point) -> bool {
        match &self.footprint {
            Footprint::Shape(b) => b.contains(p),
            Footprint::Regions(list) => list
                .iter()
                .any(|&r| env.point_in_region_not_child(r, p)),
        }
    }
}

/// Maps an actor shape record onto a geometric boundary.
///
/// Boxes and rectangles use the six extents directly; spheres use
/// `[cx, cy, cz, r]`; cylinders use `[cx, cy, cz, r, length, axis]` with
/// the axis encoded as 0, 1, or 2.
fn actor_boundary(index: usize, shape: ShapeName, coor: [f64; 6]) -> Result<Boundary> {
    match shape {
        ShapeName::Rectangle => Ok(Boundary::rectangle(coor)),
        ShapeName::RectangularBox => Ok(Boundary::rectangular_box(coor)),
        ShapeName::Sphere => Ok(Boundary::sphere([coor[0], coor[1], coor[2]], coor[3])),
        ShapeName::Cylinder => {
            let axis = match coor[5] as u32 {
                0 => Axis::X,
                1 => Axis::Y,
                2 => Axis::Z,
                _ => {
                    return Err(PlumeError::actor(
                        index,
                        "cylinder axis must be 0, 1, or 2",
                    ))
                }
            };
            Ok(Boundary::cylinder(
                axis,
                [coor[0], coor[1], coor[2]],
                coor[3],
                coor[4],
            ))
        }
    }
}

/// Intersection measure of a boundary with a region, excluding the
/// region's children.
fn intersect_region_volume(env: &Environment, region: usize, b: &Boundary) -> Result<f64> {
    let inter = intersect_boundary(&env.regions[region].boundary, b)?;
    let mut volume = inter.volume();
    if volume <= 0.0 {
        return Ok(0.0);
    }
    for &c in &env.regions[region].children {
        if let Ok(child_inter) = intersect_boundary(&env.regions[c].boundary, b) {
            let child_volume = child_inter.volume();
            if child_volume > 0.0 {
                volume -= child_volume;
            }
        }
    }
    Ok(volume.max(0.0))
}

/// Builds every actor's intersection tables.
pub fn build_actors(env: &Environment, specs: &[ActorSpec]) -> Result<Vec<Actor>> {
    let mut actors = Vec::with_capacity(specs.len());
    for (index, spec) in specs.iter().enumerate() {
        actors.push(build_actor(env, index, spec)?);
    }
    Ok(actors)
}

fn build_actor(env: &Environment, index: usize, spec: &ActorSpec) -> Result<Actor> {
    let min_volume = env.adj_error * env.adj_error * env.adj_error;
    let (footprint, candidate_regions) = match &spec.location {
        ActorLocation::Shape { shape, boundary } => {
            let b = actor_boundary(index, *shape, *boundary)?;
            (Footprint::Shape(b), None)
        }
        ActorLocation::Regions(labels) => {
            let mut ids = Vec::with_capacity(labels.len());
            for label in labels {
                let id = env
                    .regions
                    .iter()
                    .position(|r| r.spec.label == *label)
                    .ok_or_else(|| {
                        PlumeError::actor(index, format!("unknown footprint region \"{label}\""))
                    })?;
                ids.push(id);
            }
            (Footprint::Regions(ids.clone()), Some(ids))
        }
    };

    let mut regions = Vec::new();
    let mut total_volume = 0.0;
    match (&footprint, candidate_regions) {
        (Footprint::Regions(_), Some(ids)) => {
            for region in ids {
                let inter_volume = env.regions[region].volume;
                total_volume += inter_volume;
                regions.push(ActorRegion {
                    region,
                    inter_boundary: env.regions[region].boundary,
                    inter_volume,
                    cum_frac: 0.0,
                    fully_inside: true,
                    meso_subs: Vec::new(),
                });
            }
        }
        (Footprint::Shape(b), _) => {
            for region in 0..env.regions.len() {
                let inter_volume = intersect_region_volume(env, region, b).map_err(|e| {
                    PlumeError::actor(index, format!("invalid region intersection: {e}"))
                })?;
                if inter_volume <= min_volume {
                    continue;
                }
                if b.shape.is_round() && !env.regions[region].is_micro() {
                    let fully = (inter_volume - env.regions[region].volume).abs() < min_volume;
                    if !fully {
                        return Err(PlumeError::actor(
                            index,
                            format!(
                                "round actor partially overlaps mesoscopic region \"{}\"",
                                env.regions[region].label()
                            ),
                        ));
                    }
                }
                let inter_boundary =
                    intersect_boundary(&env.regions[region].boundary, b).map_err(|e| {
                        PlumeError::actor(index, format!("invalid region intersection: {e}"))
                    })?;
                total_volume += inter_volume;
                regions.push(ActorRegion {
                    region,
                    inter_boundary,
                    inter_volume,
                    cum_frac: 0.0,
                    fully_inside: (inter_volume - env.regions[region].volume).abs()
                        < env.base_size.powi(3) * SUB_ADJ_RESOLUTION,
                    meso_subs: Vec::new(),
                });
            }
        }
        _ => unreachable!(),
    }
    if regions.is_empty() {
        return Err(PlumeError::actor(
            index,
            "placement is completely outside the simulation space",
        ));
    }

    // Cumulative placement fractions over regions.
    let mut cum = 0.0;
    for ar in &mut regions {
        cum += ar.inter_volume / total_volume;
        ar.cum_frac = cum;
    }

    // Mesoscopic subvolume tables.
    for ar in &mut regions {
        if env.regions[ar.region].is_micro() {
            continue;
        }
        let region = &env.regions[ar.region];
        let mut subs = Vec::new();
        if ar.fully_inside {
            for sub_id in region.first_sub..(region.first_sub + region.num_sub) {
                subs.push(ActorSub {
                    sub_id,
                    cum_frac: 0.0,
                    overlap_frac: 1.0,
                });
            }
        } else {
            // Partial overlap: the intersection boundary is rectangular
            // here, so scan the grid cells it may cover.
            let h = region.actual_sub_size;
            let ib = &ar.inter_boundary;
            let first = |lo: f64, anchor: f64| ((lo - anchor) / h).floor().max(0.0) as u32;
            let fx = first(ib.coor[0], region.boundary.coor[0]);
            let fy = first(ib.coor[2], region.boundary.coor[2]);
            let fz = first(ib.coor[4], region.boundary.coor[4]);
            let last = |hi: f64, anchor: f64, n: u32| {
                (((hi - anchor) / h).ceil() as i64 - 1).clamp(0, n as i64 - 1) as u32
            };
            let lx = last(ib.coor[1], region.boundary.coor[0], region.grid[0]);
            let ly = last(ib.coor[3], region.boundary.coor[2], region.grid[1]);
            let lz = last(ib.coor[5], region.boundary.coor[4], region.grid[2]);
            let footprint_b = ar.inter_boundary;
            for iz in fz..=lz {
                for iy in fy..=ly {
                    for ix in fx..=lx {
                        let Some(sub_id) = env.grids[ar.region].get(ix, iy, iz) else {
                            continue;
                        };
                        let cell = subvol_bounds(region, [ix, iy, iz]);
                        if !intersects(&footprint_b, &cell, 0.0).unwrap_or(false)
                            && !plume_geometry::surrounds(&footprint_b, &cell, 0.0)
                                .unwrap_or(false)
                        {
                            continue;
                        }
                        let overlap = intersect_boundary(&footprint_b, &cell)
                            .map(|b| b.volume())
                            .unwrap_or(0.0);
                        if overlap <= 0.0 {
                            continue;
                        }
                        subs.push(ActorSub {
                            sub_id,
                            cum_frac: 0.0,
                            overlap_frac: (overlap / cell.volume()).min(1.0),
                        });
                    }
                }
            }
        }
        // Cumulative fractions weighted by overlap volume.
        let total: f64 = subs
            .iter()
            .map(|s| s.overlap_frac * env.sub_bounds(s.sub_id).volume())
            .sum();
        if total > 0.0 {
            let mut cum = 0.0;
            for s in &mut subs {
                cum += s.overlap_frac * env.sub_bounds(s.sub_id).volume() / total;
                s.cum_frac = cum;
            }
        }
        ar.meso_subs = subs;
    }

    Ok(Actor {
        spec: spec.clone(),
        index,
        footprint,
        volume: total_volume,
        regions,
    })
}

/// One live release of an active actor.
#[derive(Debug, Clone)]
pub struct Release {
    pub strength: f64,
    pub mol_type: usize,
    pub next_time: f64,
    pub end_time: f64,
}

/// Mutable per-realization state of an active actor.
#[derive(Debug, Clone)]
pub struct ActiveState {
    pub actor: usize,
    /// The single molecule type released under CSK.
    pub mol_type: usize,
    /// Symbol alphabet size, `2^mod_bits`.
    pub alphabet: u32,
    /// Every bit generated so far, in emission order.
    pub bits: Vec<bool>,
    pub releases: Vec<Release>,
    pub next_action: f64,
    pub actions_done: u64,
    pub next_emission: f64,
}

impl ActiveState {
    pub fn new(actor: &Actor) -> Result<Self> {
        let spec = actor
            .spec
            .active
            .as_ref()
            .ok_or_else(|| PlumeError::actor(actor.index, "active actor without active block"))?;
        let mol_type = spec
            .is_released
            .iter()
            .position(|&r| r)
            .ok_or_else(|| PlumeError::actor(actor.index, "active actor releases no type"))?;
        Ok(ActiveState {
            actor: actor.index,
            mol_type,
            alphabet: 1u32 << spec.mod_bits.min(31),
            bits: Vec::new(),
            releases: Vec::new(),
            next_action: actor.spec.start_time,
            actions_done: 0,
            next_emission: f64::INFINITY,
        })
    }

    /// Earliest pending event of this actor.
    pub fn next_event_time(&self) -> f64 {
        self.next_action.min(self.next_emission)
    }

    fn refresh_next_emission(&mut self) {
        self.next_emission = self
            .releases
            .iter()
            .map(|r| r.next_time)
            .fold(f64::INFINITY, f64::min);
    }

    /// Starts a new release at an action instant: generates the symbol
    /// bits and, for a nonzero symbol, queues the release.
    pub fn new_release(&mut self, actor: &Actor, t: f64, rng: &mut SimRng) {
        let spec = actor.spec.active.as_ref().expect("active block checked at build");
        let mut symbol = 0u64;
        for _ in 0..spec.mod_bits {
            let bit = if spec.random_bits {
                rng.uniform() < spec.prob_one
            } else {
                true
            };
            self.bits.push(bit);
            symbol = (symbol << 1) | bit as u64;
        }
        match spec.mod_scheme {
            ModScheme::Csk => {
                let strength = symbol as f64 * spec.mod_strength;
                if strength > 0.0 {
                    let start = if spec.random_release_times {
                        -rng.uniform().max(f64::MIN_POSITIVE).ln() / strength
                    } else {
                        0.0
                    };
                    self.releases.push(Release {
                        strength,
                        mol_type: self.mol_type,
                        next_time: t + start,
                        end_time: t + spec.release_interval,
                    });
                }
            }
        }
        self.refresh_next_emission();
    }

    /// Fires the earliest pending emission.
    #[allow(clippy::too_many_arguments)]
    pub fn fire_emission(
        &mut self,
        env: &Environment,
        actor: &Actor,
        micro: &mut MicroState,
        meso: &mut MesoState,
        t_barrier: f64,
        rng: &mut SimRng,
    ) {
        let spec = actor.spec.active.as_ref().expect("active block checked at build");
        let Some(idx) = self
            .releases
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.next_time.total_cmp(&b.1.next_time))
            .map(|(i, _)| i)
        else {
            return;
        };
        let t = self.releases[idx].next_time;
        let mut remove = false;
        if spec.random_release_times {
            place_molecules(
                env,
                actor,
                micro,
                meso,
                1,
                self.releases[idx].mol_type,
                t,
                t_barrier,
                rng,
            );
            self.releases[idx].next_time +=
                -rng.uniform().max(f64::MIN_POSITIVE).ln() / self.releases[idx].strength;
        } else {
            let count = if spec.random_mol_count {
                rng.poisson(self.releases[idx].strength)
            } else {
                self.releases[idx].strength.round() as u64
            };
            place_molecules(
                env,
                actor,
                micro,
                meso,
                count,
                self.releases[idx].mol_type,
                t,
                t_barrier,
                rng,
            );
            if spec.slot_interval > 0.0 {
                self.releases[idx].next_time += spec.slot_interval;
            } else {
                remove = true;
            }
        }
        if remove || self.releases[idx].next_time > self.releases[idx].end_time {
            self.releases.remove(idx);
        }
        self.refresh_next_emission();
    }
}

/// Places molecules uniformly over the actor footprint, one region draw
/// per molecule when the actor spans several regions.
#[allow(clippy::too_many_arguments)]
pub fn place_molecules(
    env: &Environment,
    actor: &Actor,
    micro: &mut MicroState,
    meso: &mut MesoState,
    count: u64,
    ty: usize,
    t: f64,
    t_barrier: f64,
    rng: &mut SimRng,
) {
    for _ in 0..count {
        let target = rng.uniform();
        let Some(ar) = actor
            .regions
            .iter()
            .find(|ar| target < ar.cum_frac)
            .or_else(|| actor.regions.last())
        else {
            continue;
        };
        if env.regions[ar.region].is_micro() {
            let mut placed = false;
            for _ in 0..10_000 {
                let p = ar.inter_boundary.uniform_point(rng);
                if env.point_in_region_not_child(ar.region, &p) {
                    micro.add_recent(ar.region, ty, p, t_barrier - t);
                    placed = true;
                    break;
                }
            }
            if !placed {
                warn!(
                    "failed to place molecule in region \"{}\" for actor {}",
                    env.regions[ar.region].label(),
                    actor.index
                );
            }
        } else if !ar.meso_subs.is_empty() {
            let u = rng.uniform();
            let sub = ar
                .meso_subs
                .iter()
                .find(|s| u < s.cum_frac)
                .unwrap_or_else(|| ar.meso_subs.last().expect("nonempty checked"));
            meso.add_molecules(env, sub.sub_id, ty, 1);
        } else {
            warn!(
                "actor {} has no placement subvolume in region \"{}\"; molecule dropped",
                actor.index,
                env.regions[ar.region].label()
            );
        }
    }
}

/// One passive observation snapshot.
#[derive(Debug, Clone)]
pub struct ObservationRecord {
    pub time: Option<f64>,
    /// Counts per observed molecule type, in type order.
    pub counts: Vec<u64>,
    /// Positions per observed type, when position recording is on.
    pub positions: Option<Vec<Vec<Point>>>,
}

/// Takes one observation snapshot for a passive actor.
pub fn observe(
    env: &Environment,
    actor: &Actor,
    micro: &MicroState,
    meso: &MesoState,
    t: f64,
    rng: &mut SimRng,
) -> ObservationRecord {
    let passive = actor
        .spec
        .passive
        .as_ref()
        .expect("passive actor without passive block");
    let observed: Vec<usize> = passive
        .is_observed
        .iter()
        .enumerate()
        .filter(|(_, &o)| o)
        .map(|(ty, _)| ty)
        .collect();
    let any_pos = observed.iter().any(|&ty| passive.record_pos[ty]);

    let mut counts = Vec::with_capacity(observed.len());
    let mut positions: Vec<Vec<Point>> = vec![Vec::new(); observed.len()];
    for (oi, &ty) in observed.iter().enumerate() {
        let record_pos = passive.record_pos[ty];
        let mut total = 0u64;
        for ar in &actor.regions {
            if env.regions[ar.region].is_micro() {
                let pred = |p: &Point| actor.contains(env, p);
                total += micro.count_matching(ar.region, ty, pred);
                if record_pos {
                    positions[oi].extend(micro.collect_matching(ar.region, ty, pred));
                }
            } else {
                for sub in &ar.meso_subs {
                    let n = meso.count(env, sub.sub_id, ty);
                    let kept = if sub.overlap_frac >= 1.0 {
                        n
                    } else {
                        // Partial overlap: include each molecule with
                        // probability equal to the covered fraction.
                        (0..n).filter(|_| rng.uniform() < sub.overlap_frac).count() as u64
                    };
                    total += kept;
                    if record_pos && kept > 0 {
                        let bounds = env.sub_bounds(sub.sub_id);
                        for _ in 0..kept {
                            // Mesoscopic molecules have no coordinates;
                            // sample a position within the covered part.
                            let mut p = bounds.uniform_point(rng);
                            for _ in 0..100 {
                                if actor.contains(env, &p) {
                                    break;
                                }
                                p = bounds.uniform_point(rng);
                            }
                            positions[oi].push(p);
                        }
                    }
                }
            }
        }
        counts.push(total);
    }

    ObservationRecord {
        time: actor.spec.record_time.then_some(t),
        counts,
        positions: any_pos.then_some(positions),
    }
}
