//! Mesoscopic engine: next-subvolume-method simulation of integer
//! molecule counts.
//!
//! Every mesoscopic subvolume carries one propensity per compiled
//! reaction plus one per (neighbor, molecule type) diffusion channel.
//! The subvolume's putative next event time is exponential in the total
//! propensity; the scheduler pops the global minimum. On any count
//! change the affected subvolume's total propensity is recomputed from
//! scratch and its putative time redrawn directly; no delta accounting
//! or time-rescaling is used, trading CPU for robustness against drift.

use log::warn;
use plume_core::{Result, SimRng};

use crate::chem::RegionChem;
use crate::graph::Environment;
use crate::micro::MicroState;

/// Mutable mesoscopic state for one realization.
#[derive(Debug)]
pub struct MesoState {
    /// Molecule counts per mesoscopic subvolume and type.
    pub counts: Vec<Vec<u64>>,
    /// Total propensity per mesoscopic subvolume.
    pub total_prop: Vec<f64>,
    /// Putative next event time per mesoscopic subvolume.
    pub next_time: Vec<f64>,
    /// Bumped on every redraw; stale queue entries are skipped.
    pub generation: Vec<u64>,
    /// Subvolumes whose counts changed outside the meso engine
    /// (micro-to-meso transfers, actor placements).
    dirty: Vec<usize>,
}

impl MesoState {
    pub fn new(env: &Environment, chem: &[RegionChem]) -> Self {
        let n = env.meso_subs.len();
        let counts = vec![vec![0u64; env.num_mol_types]; n];
        let mut state = MesoState {
            counts,
            total_prop: vec![0.0; n],
            next_time: vec![f64::INFINITY; n],
            generation: vec![0; n],
            dirty: Vec::new(),
        };
        for meso_id in 0..n {
            state.total_prop[meso_id] = state.total_propensity(env, chem, meso_id);
        }
        state
    }

    /// Draws the initial putative event time of every subvolume.
    pub fn initialize_times(
        &mut self,
        env: &Environment,
        chem: &[RegionChem],
        t0: f64,
        rng: &mut SimRng,
    ) {
        for meso_id in 0..env.meso_subs.len() {
            self.total_prop[meso_id] = self.total_propensity(env, chem, meso_id);
            self.next_time[meso_id] = putative_time(t0, self.total_prop[meso_id], rng);
            self.generation[meso_id] += 1;
        }
    }

    /// Count of one molecule type in one (mesoscopic) subvolume.
    pub fn count(&self, env: &Environment, sub_id: usize, ty: usize) -> u64 {
        match env.subs[sub_id].meso_id {
            Some(meso_id) => self.counts[meso_id][ty],
            None => 0,
        }
    }

    /// Total molecule count over all mesoscopic subvolumes.
    pub fn total_count(&self) -> u64 {
        self.counts.iter().flat_map(|c| c.iter()).sum()
    }

    /// Registers one molecule arriving from a microscopic region.
    pub fn add_from_micro(&mut self, env: &Environment, sub_id: usize, ty: usize) {
        self.add_molecules(env, sub_id, ty, 1);
    }

    /// Adds molecules to a subvolume and marks it for a propensity
    /// refresh.
    pub fn add_molecules(&mut self, env: &Environment, sub_id: usize, ty: usize, n: u64) {
        let Some(meso_id) = env.subs[sub_id].meso_id else {
            warn!("attempted to add molecules to non-mesoscopic subvolume {sub_id}");
            return;
        };
        self.counts[meso_id][ty] += n;
        if !self.dirty.contains(&meso_id) {
            self.dirty.push(meso_id);
        }
    }

    /// Recomputes propensities and redraws putative times for every
    /// subvolume whose counts changed outside the meso engine. Returns
    /// the subvolumes to reschedule.
    pub fn refresh_dirty(
        &mut self,
        env: &Environment,
        chem: &[RegionChem],
        t_now: f64,
        rng: &mut SimRng,
    ) -> Vec<usize> {
        let dirty = std::mem::take(&mut self.dirty);
        for &meso_id in &dirty {
            self.redraw(env, chem, meso_id, t_now, rng);
        }
        dirty
    }

    fn redraw(
        &mut self,
        env: &Environment,
        chem: &[RegionChem],
        meso_id: usize,
        t_now: f64,
        rng: &mut SimRng,
    ) {
        self.total_prop[meso_id] = self.total_propensity(env, chem, meso_id);
        self.next_time[meso_id] = putative_time(t_now, self.total_prop[meso_id], rng);
        self.generation[meso_id] += 1;
    }

    /// Total propensity of one subvolume, recomputed from scratch.
    pub fn total_propensity(&self, env: &Environment, chem: &[RegionChem], meso_id: usize) -> f64 {
        let sub_id = env.meso_subs[meso_id];
        let sub = &env.subs[sub_id];
        let region = sub.region;
        let counts = &self.counts[meso_id];
        let mut total = 0.0;
        for rxn in &chem[region].rxns {
            total += rxn_propensity(rxn, counts);
        }
        for ni in 0..sub.neighbors.len() {
            for ty in 0..env.num_mol_types {
                total += self.diff_rate(env, sub_id, ni, ty) * counts[ty] as f64;
            }
        }
        total
    }

    /// Outbound diffusion rate through one neighbor channel.
    #[inline]
    fn diff_rate(&self, env: &Environment, sub_id: usize, ni: usize, ty: usize) -> f64 {
        let sub = &env.subs[sub_id];
        if !sub.diff_rate_neigh.is_empty() {
            sub.diff_rate_neigh[ty][ni]
        } else {
            env.region_diff_rate[sub.region][ty]
        }
    }

    /// Executes the pending event of one subvolume at `t_now` and redraws
    /// putative times. `t_barrier` is the next microscopic barrier, used
    /// for the remaining step of molecules delivered to micro regions.
    /// Returns the subvolumes to reschedule.
    #[allow(clippy::too_many_arguments)]
    pub fn execute_event(
        &mut self,
        env: &Environment,
        chem: &[RegionChem],
        micro: &mut MicroState,
        meso_id: usize,
        t_now: f64,
        t_barrier: f64,
        rng: &mut SimRng,
    ) -> Result<Vec<usize>> {
        let sub_id = env.meso_subs[meso_id];
        let region = env.subs[sub_id].region;
        let a0 = self.total_propensity(env, chem, meso_id);
        let mut changed = vec![meso_id];
        if a0 <= 0.0 {
            self.redraw(env, chem, meso_id, t_now, rng);
            return Ok(changed);
        }
        let target = rng.uniform() * a0;
        let mut acc = 0.0;

        // Chemical reactions first, in compiled order.
        for r in 0..chem[region].rxns.len() {
            let prop = rxn_propensity(&chem[region].rxns[r], &self.counts[meso_id]);
            acc += prop;
            if target < acc {
                let rxn = &chem[region].rxns[r];
                for ty in 0..env.num_mol_types {
                    let delta = rxn.mol_change[ty];
                    if delta < 0 {
                        self.counts[meso_id][ty] =
                            self.counts[meso_id][ty].saturating_sub((-delta) as u64);
                    } else {
                        self.counts[meso_id][ty] += delta as u64;
                    }
                }
                self.redraw(env, chem, meso_id, t_now, rng);
                return Ok(changed);
            }
        }

        // Diffusion channels, neighbor-major then type.
        let neighbors = env.subs[sub_id].neighbors.clone();
        for (ni, &dest) in neighbors.iter().enumerate() {
            for ty in 0..env.num_mol_types {
                let prop = self.diff_rate(env, sub_id, ni, ty) * self.counts[meso_id][ty] as f64;
                acc += prop;
                if target < acc {
                    self.counts[meso_id][ty] = self.counts[meso_id][ty].saturating_sub(1);
                    let dest_region = env.subs[dest].region;
                    if env.regions[dest_region].is_micro() {
                        let pos = self.micro_arrival_point(env, sub_id, dest, rng);
                        micro.add_recent(dest_region, ty, pos, t_barrier - t_now);
                    } else {
                        let dest_meso = env.subs[dest]
                            .meso_id
                            .expect("mesoscopic destination must have a meso id");
                        self.counts[dest_meso][ty] += 1;
                        self.redraw(env, chem, dest_meso, t_now, rng);
                        changed.push(dest_meso);
                    }
                    self.redraw(env, chem, meso_id, t_now, rng);
                    return Ok(changed);
                }
            }
        }

        // Numerical slack: no channel selected. Redraw and move on.
        self.redraw(env, chem, meso_id, t_now, rng);
        Ok(changed)
    }

    /// Arrival position for a molecule diffusing into a microscopic
    /// subvolume: uniform within the destination grid cell, or within
    /// the virtual cell across the shared face for round destinations.
    fn micro_arrival_point(
        &self,
        env: &Environment,
        src_sub: usize,
        dest_sub: usize,
        rng: &mut SimRng,
    ) -> [f64; 3] {
        let dest_region = env.subs[dest_sub].region;
        if !env.regions[dest_region].boundary.shape.is_round() {
            let bounds = env.sub_bounds(dest_sub);
            for _ in 0..100 {
                let p = bounds.uniform_point(rng);
                if env.point_in_region_not_child(dest_region, &p) {
                    return p;
                }
            }
            return crate::micro::generate_point_in_region(env, dest_region, rng);
        }
        // Round destination: sample inside the virtual cell clipped to
        // the destination region.
        if let Some(entry) = env.bound_entry(src_sub, dest_region) {
            let h = env.regions[env.subs[src_sub].region].actual_sub_size;
            for &(_, anchor) in &entry.virtual_cells {
                let cell = plume_geometry::Boundary::rectangular_box([
                    anchor[0],
                    anchor[0] + h,
                    anchor[1],
                    anchor[1] + h,
                    anchor[2],
                    anchor[2] + h,
                ]);
                for _ in 0..100 {
                    let p = cell.uniform_point(rng);
                    if env.point_in_region_not_child(dest_region, &p) {
                        return p;
                    }
                }
            }
        }
        crate::micro::generate_point_in_region(env, dest_region, rng)
    }
}

/// Propensity of one compiled reaction given the subvolume counts.
fn rxn_propensity(rxn: &crate::chem::CompiledRxn, counts: &[u64]) -> f64 {
    match rxn.order {
        0 => rxn.rate,
        1 => rxn.rate * counts[rxn.uni_reactant] as f64,
        _ => {
            let [a, b] = rxn.bi_reactants;
            if a == b {
                let n = counts[a] as f64;
                rxn.rate * n * (n - 1.0)
            } else {
                rxn.rate * counts[a] as f64 * counts[b] as f64
            }
        }
    }
}

/// Next putative event time for a subvolume with total propensity `a0`.
fn putative_time(t_now: f64, a0: f64, rng: &mut SimRng) -> f64 {
    if a0 <= 0.0 {
        f64::INFINITY
    } else {
        t_now - rng.uniform().max(f64::MIN_POSITIVE).ln() / a0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::compile_reactions;
    use crate::graph::build_environment;
    use crate::region::build_regions;
    use plume_core::config::{ReactionSpec, RegionKind, RegionSpec, ShapeName, SurfaceRxnKind};

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
    fn test_diffusion_propensity_matches_channels() {
        let regions =
            build_regions(&[box_spec("box", [0.0, 0.0, 0.0], [3, 3, 3], false)], 1.0).unwrap();
        let d = 2.0;
        let env = build_environment(regions, 1.0, 1, vec![d]).unwrap();
        let chem = compile_reactions(&env.regions, &[], &env.diff_coef, 1, 1e-3).unwrap();
        let mut meso = MesoState::new(&env, &chem);
        // Put 10 molecules in the center subvolume (6 neighbors).
        let center = env.grids[0].get(1, 1, 1).unwrap();
        meso.add_molecules(&env, center, 0, 10);
        let meso_id = env.subs[center].meso_id.unwrap();
        let a0 = meso.total_propensity(&env, &chem, meso_id);
        // 6 channels, each D/h^2 * n = 2 * 10.
        assert!((a0 - 6.0 * d * 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_event_moves_one_molecule() {
        let regions =
            build_regions(&[box_spec("box", [0.0, 0.0, 0.0], [2, 1, 1], false)], 1.0).unwrap();
        let env = build_environment(regions, 1.0, 1, vec![1.0]).unwrap();
        let chem = compile_reactions(&env.regions, &[], &env.diff_coef, 1, 1e-3).unwrap();
        let mut meso = MesoState::new(&env, &chem);
        let mut micro = crate::micro::MicroState::new(&env);
        let mut rng = SimRng::new(1, 0);
        let left = env.grids[0].get(0, 0, 0).unwrap();
        let right = env.grids[0].get(1, 0, 0).unwrap();
        meso.add_molecules(&env, left, 0, 5);
        meso.refresh_dirty(&env, &chem, 0.0, &mut rng);
        let left_id = env.subs[left].meso_id.unwrap();
        let right_id = env.subs[right].meso_id.unwrap();
        let changed = meso
            .execute_event(&env, &chem, &mut micro, left_id, 0.1, 1.0, &mut rng)
            .unwrap();
        assert_eq!(meso.counts[left_id][0], 4);
        assert_eq!(meso.counts[right_id][0], 1);
        assert!(changed.contains(&left_id));
        assert!(changed.contains(&right_id));
        assert_eq!(meso.total_count(), 5);
    }

    #[test]
    fn test_meso_to_micro_delivery() {
        let regions = build_regions(
            &[
                box_spec("meso", [0.0, 0.0, 0.0], [1, 1, 1], false),
                box_spec("micro", [1.0, 0.0, 0.0], [1, 1, 1], true),
            ],
            1.0,
        )
        .unwrap();
        let env = build_environment(regions, 1.0, 1, vec![1.0]).unwrap();
        let chem = compile_reactions(&env.regions, &[], &env.diff_coef, 1, 1e-3).unwrap();
        let mut meso = MesoState::new(&env, &chem);
        let mut micro = crate::micro::MicroState::new(&env);
        let mut rng = SimRng::new(2, 0);
        let meso_sub = env.regions[0].first_sub;
        meso.add_molecules(&env, meso_sub, 0, 1);
        meso.refresh_dirty(&env, &chem, 0.0, &mut rng);
        let meso_id = env.subs[meso_sub].meso_id.unwrap();
        meso.execute_event(&env, &chem, &mut micro, meso_id, 0.5, 0.6, &mut rng)
            .unwrap();
        assert_eq!(meso.total_count(), 0);
        assert_eq!(micro.recent[1][0].len(), 1);
        let arrival = micro.recent[1][0][0];
        assert!(env.regions[1].boundary.contains(&arrival.pos));
        assert!((arrival.dt_partial - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_reaction_event_changes_counts() {
        let regions =
            build_regions(&[box_spec("box", [0.0, 0.0, 0.0], [1, 1, 1], false)], 1.0).unwrap();
        let env = build_environment(regions, 1.0, 2, vec![0.0, 0.0]).unwrap();
        let convert = ReactionSpec {
            reactants: vec![1, 0],
            products: vec![0, 1],
            k: 10.0,
            is_surface: false,
            surface_kind: SurfaceRxnKind::Normal,
            everywhere: true,
            exception_regions: Vec::new(),
        };
        let chem = compile_reactions(&env.regions, &[convert], &env.diff_coef, 2, 1e-3).unwrap();
        let mut meso = MesoState::new(&env, &chem);
        let mut micro = crate::micro::MicroState::new(&env);
        let mut rng = SimRng::new(3, 0);
        let sub = 0;
        meso.add_molecules(&env, sub, 0, 3);
        meso.refresh_dirty(&env, &chem, 0.0, &mut rng);
        // D = 0, so the only event is the conversion reaction.
        meso.execute_event(&env, &chem, &mut micro, 0, 0.1, 1.0, &mut rng)
            .unwrap();
        assert_eq!(meso.counts[0][0], 2);
        assert_eq!(meso.counts[0][1], 1);
    }

    #[test]
    fn test_putative_time_redraw_monotone() {
        let regions =
            build_regions(&[box_spec("box", [0.0, 0.0, 0.0], [2, 1, 1], false)], 1.0).unwrap();
        let env = build_environment(regions, 1.0, 1, vec![1.0]).unwrap();
        let chem = compile_reactions(&env.regions, &[], &env.diff_coef, 1, 1e-3).unwrap();
        let mut meso = MesoState::new(&env, &chem);
        let mut rng = SimRng::new(4, 0);
        meso.add_molecules(&env, 0, 0, 100);
        meso.refresh_dirty(&env, &chem, 5.0, &mut rng);
        // Putative times are strictly after the redraw instant.
        assert!(meso.next_time[0] > 5.0);
        // Empty subvolume stays unscheduled.
        assert_eq!(meso.next_time[1], f64::INFINITY);
    }
}
