//! Chemical reaction compiler.
//!
//! For every region, filters the global reaction list down to the
//! reactions admitted there, classifies them by order, and precomputes
//! the rates used by the mesoscopic engine and the per-step cumulative
//! probability tables used by the microscopic engine.

use plume_core::config::{ReactionSpec, RegionKind, SurfaceKind, SurfaceRxnKind};
use plume_core::{PlumeError, Result};

use crate::region::Region;

/// One reaction compiled for one region.
#[derive(Debug, Clone)]
pub struct CompiledRxn {
    /// Index into the global reaction list.
    pub spec_index: usize,
    pub order: u32,
    /// Mesoscopic rate, adjusted by the subvolume measure for orders 0
    /// and 2, and by the absorbing-flux correction for absorbing
    /// first-order reactions.
    pub rate: f64,
    /// Microscopic zeroth-order rate `k * region volume`.
    pub micro_zeroth_rate: f64,
    pub reactants: Vec<u32>,
    /// Product molecule types, one entry per product molecule.
    pub products: Vec<usize>,
    /// Net count change per molecule type.
    pub mol_change: Vec<i64>,
    /// The single reactant type of a first-order reaction.
    pub uni_reactant: usize,
    /// The reactant types of a second-order reaction (equal entries for a
    /// same-species reaction).
    pub bi_reactants: [usize; 2],
    pub surf_kind: SurfaceRxnKind,
}

/// First-order reaction lookup for one molecule type in one region.
#[derive(Debug, Clone, Default)]
pub struct FirstOrderTable {
    /// Local indices (into `RegionChem::rxns`) of the first-order
    /// reactions consuming this molecule type.
    pub rxns: Vec<usize>,
    /// Sum of the first-order rates.
    pub sum_rate: f64,
    /// Cumulative probability of each reaction firing within one full
    /// micro step.
    pub cum_prob: Vec<f64>,
    /// Rate of each reaction relative to `sum_rate`, used to rebuild the
    /// table for partial steps.
    pub relative_rate: Vec<f64>,
    /// Probability that no reaction fires within one full step:
    /// `exp(-dt * sum_rate)`.
    pub min_rxn_time_rv: f64,
}

impl FirstOrderTable {
    /// Probability that some reaction fires within one full step.
    #[inline]
    pub fn total_prob(&self) -> f64 {
        1.0 - self.min_rxn_time_rv
    }
}

/// All reactions compiled for one region.
#[derive(Debug, Clone, Default)]
pub struct RegionChem {
    pub rxns: Vec<CompiledRxn>,
    /// Local indices of zeroth-order reactions.
    pub zeroth: Vec<usize>,
    /// Per molecule type: the first-order lookup table.
    pub first_order: Vec<FirstOrderTable>,
}

impl RegionChem {
    /// Does this region absorb the given molecule type at its surface?
    pub fn absorbing_prob(&self, mol_type: usize) -> Option<f64> {
        let table = &self.first_order[mol_type];
        let &local = table.rxns.first()?;
        if self.rxns[local].surf_kind == SurfaceRxnKind::Absorbing {
            Some(table.cum_prob[0])
        } else {
            None
        }
    }

    /// Probability that the given molecule type crosses a membrane on one
    /// collision, if this region is a membrane with a matching reaction.
    pub fn membrane_prob(&self, mol_type: usize) -> Option<f64> {
        let table = &self.first_order[mol_type];
        let &local = table.rxns.first()?;
        if self.rxns[local].surf_kind == SurfaceRxnKind::Membrane {
            Some(*table.cum_prob.last().unwrap_or(&0.0))
        } else {
            None
        }
    }
}

/// Is the reaction admitted in the region, by the default-everywhere flag
/// inverted by exception labels?
fn admitted(rxn: &ReactionSpec, region: &Region) -> bool {
    let type_compatible = (rxn.is_surface && region.spec.kind != RegionKind::Normal)
        || (!rxn.is_surface && region.spec.kind == RegionKind::Normal);
    let mut in_region = rxn.everywhere && type_compatible;
    if !region.spec.label.is_empty() {
        for exception in &rxn.exception_regions {
            if exception == &region.spec.label {
                in_region = !in_region;
            }
        }
    }
    in_region && type_compatible
}

/// Compiles the global reaction list for every region.
pub fn compile_reactions(
    regions: &[Region],
    reactions: &[ReactionSpec],
    diff_coef: &[f64],
    num_mol_types: usize,
    dt: f64,
) -> Result<Vec<RegionChem>> {
    let mut compiled = Vec::with_capacity(regions.len());
    for region in regions {
        compiled.push(compile_region(region, reactions, diff_coef, num_mol_types, dt)?);
    }
    Ok(compiled)
}

fn compile_region(
    region: &Region,
    reactions: &[ReactionSpec],
    diff_coef: &[f64],
    num_mol_types: usize,
    dt: f64,
) -> Result<RegionChem> {
    let mut chem = RegionChem {
        rxns: Vec::new(),
        zeroth: Vec::new(),
        first_order: vec![FirstOrderTable::default(); num_mol_types],
    };
    let h = region.actual_sub_size;
    let sub_measure = h.powi(region.dim_exponent as i32);

    for (spec_index, rxn) in reactions.iter().enumerate() {
        if !admitted(rxn, region) {
            continue;
        }
        // Membrane reactions only belong in membrane regions, and
        // membrane regions accept nothing else.
        let is_membrane_region = region.spec.surface_kind == Some(SurfaceKind::Membrane);
        if rxn.surface_kind == SurfaceRxnKind::Membrane && !is_membrane_region {
            return Err(PlumeError::reaction(
                spec_index,
                format!(
                    "membrane reaction placed in non-membrane region \"{}\"",
                    region.label()
                ),
            ));
        }
        if rxn.surface_kind != SurfaceRxnKind::Membrane && is_membrane_region {
            return Err(PlumeError::reaction(
                spec_index,
                format!(
                    "non-membrane reaction placed in membrane region \"{}\"",
                    region.label()
                ),
            ));
        }

        let order: u32 = rxn.reactants.iter().sum();
        let mut uni_reactant = 0;
        let mut bi_reactants = [0usize; 2];
        let mut found_first = false;
        let mut products = Vec::new();
        let mut mol_change = vec![0i64; num_mol_types];
        for ty in 0..num_mol_types {
            match rxn.reactants[ty] {
                0 => {}
                1 => {
                    uni_reactant = ty;
                    if found_first {
                        bi_reactants[1] = ty;
                    } else {
                        bi_reactants[0] = ty;
                        bi_reactants[1] = ty;
                    }
                    found_first = true;
                }
                2 => {
                    bi_reactants = [ty, ty];
                    found_first = true;
                }
                _ => {
                    return Err(PlumeError::reaction(
                        spec_index,
                        format!("molecule type {ty} has multiplicity above 2"),
                    ))
                }
            }
            mol_change[ty] = rxn.products[ty] as i64 - rxn.reactants[ty] as i64;
            for _ in 0..rxn.products[ty] {
                products.push(ty);
            }
        }

        let (rate, micro_zeroth_rate) = match order {
            0 => {
                if rxn.is_surface && rxn.surface_kind != SurfaceRxnKind::Normal {
                    return Err(PlumeError::reaction(
                        spec_index,
                        "zeroth-order reactions must be normal surface reactions",
                    ));
                }
                (rxn.k * sub_measure, rxn.k * region.volume)
            }
            1 => {
                let rate = match rxn.surface_kind {
                    SurfaceRxnKind::Normal
                    | SurfaceRxnKind::Receptor
                    | SurfaceRxnKind::Membrane => rxn.k,
                    SurfaceRxnKind::Absorbing => {
                        let d = diff_coef[uni_reactant];
                        if d <= 0.0 {
                            return Err(PlumeError::reaction(
                                spec_index,
                                "absorbing reaction requires a diffusing reactant",
                            ));
                        }
                        rxn.k * (std::f64::consts::PI * dt / d).sqrt()
                    }
                };
                (rate, 0.0)
            }
            2 => {
                if rxn.is_surface && rxn.surface_kind != SurfaceRxnKind::Normal {
                    return Err(PlumeError::reaction(
                        spec_index,
                        "second-order reactions must be normal surface reactions",
                    ));
                }
                (rxn.k / sub_measure, 0.0)
            }
            _ => {
                return Err(PlumeError::reaction(
                    spec_index,
                    format!("order {order} reactions are not supported"),
                ))
            }
        };

        let local = chem.rxns.len();
        if order == 0 {
            chem.zeroth.push(local);
        }
        chem.rxns.push(CompiledRxn {
            spec_index,
            order,
            rate,
            micro_zeroth_rate,
            reactants: rxn.reactants.clone(),
            products,
            mol_change,
            uni_reactant,
            bi_reactants,
            surf_kind: rxn.surface_kind,
        });
    }

    // First-order lookup tables, one per molecule type.
    for ty in 0..num_mol_types {
        let mut table = FirstOrderTable::default();
        let mut num_inf = 0usize;
        let mut has_exclusive = false;
        for (local, rxn) in chem.rxns.iter().enumerate() {
            if rxn.order == 1 && rxn.reactants[ty] > 0 {
                table.rxns.push(local);
                table.sum_rate += rxn.rate;
                if rxn.rate.is_infinite() {
                    num_inf += 1;
                }
                if rxn.surf_kind != SurfaceRxnKind::Normal {
                    has_exclusive = true;
                }
            }
        }
        if has_exclusive && table.rxns.len() > 1 {
            let spec_index = chem.rxns[table.rxns[0]].spec_index;
            return Err(PlumeError::reaction(
                spec_index,
                format!(
                    "molecule type {ty} in region \"{}\" participates in {} first-order reactions, but at least one is exclusive",
                    region.label(),
                    table.rxns.len()
                ),
            ));
        }

        for k in 0..table.rxns.len() {
            let local = table.rxns[k];
            let prev = if k > 0 { table.cum_prob[k - 1] } else { 0.0 };
            let (relative, cum) = match chem.rxns[local].surf_kind {
                SurfaceRxnKind::Absorbing => {
                    // The adjusted absorbing rate is already the collision
                    // probability.
                    (chem.rxns[local].rate, chem.rxns[local].rate)
                }
                _ => {
                    if chem.rxns[local].rate.is_infinite() {
                        let share = 1.0 / num_inf as f64;
                        (share, prev + share)
                    } else if table.sum_rate.is_infinite() {
                        // Finite-rate reactions get no mass next to an
                        // infinite one.
                        (0.0, prev)
                    } else {
                        let rel = chem.rxns[local].rate / table.sum_rate;
                        (rel, prev + rel * (1.0 - (-dt * table.sum_rate).exp()))
                    }
                }
            };
            table.relative_rate.push(relative);
            table.cum_prob.push(cum);
        }
        table.min_rxn_time_rv = if table.sum_rate.is_infinite() {
            0.0
        } else {
            (-dt * table.sum_rate).exp()
        };
        chem.first_order[ty] = table;
    }

    Ok(chem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::build_regions;
    use plume_core::config::{RegionSpec, ShapeName};

    fn region() -> Region {
        let spec = RegionSpec {
            label: "box".to_string(),
            parent_label: String::new(),
            shape: ShapeName::RectangularBox,
            kind: RegionKind::Normal,
            surface_kind: None,
            anchor: [0.0; 3],
            size_rect: 1,
            radius: 0.0,
            num: [2, 2, 2],
            is_microscopic: false,
            flow: None,
            dt: 1e-3,
        };
        build_regions(&[spec], 1.0).unwrap().remove(0)
    }

    fn rxn(reactants: Vec<u32>, products: Vec<u32>, k: f64) -> ReactionSpec {
        ReactionSpec {
            reactants,
            products,
            k,
            is_surface: false,
            surface_kind: SurfaceRxnKind::Normal,
            everywhere: true,
            exception_regions: Vec::new(),
        }
    }

    #[test]
    fn test_order_classification_and_rates() {
        let region = region();
        let reactions = vec![
            rxn(vec![0, 0], vec![1, 0], 5.0),       // zeroth: A production
            rxn(vec![1, 0], vec![0, 1], 2.0),       // first: A -> B
            rxn(vec![1, 1], vec![0, 0], 3.0),       // second: A + B -> 0
        ];
        let chem = compile_reactions(
            &[region],
            &reactions,
            &[1e-9, 1e-9],
            2,
            1e-3,
        )
        .unwrap()
        .remove(0);
        assert_eq!(chem.rxns.len(), 3);
        assert_eq!(chem.zeroth, vec![0]);
        // Zeroth-order meso rate scales with subvolume volume (h = 1).
        assert!((chem.rxns[0].rate - 5.0).abs() < 1e-12);
        // Micro zeroth rate scales with the region volume (8).
        assert!((chem.rxns[0].micro_zeroth_rate - 40.0).abs() < 1e-12);
        assert_eq!(chem.rxns[1].order, 1);
        assert_eq!(chem.rxns[1].uni_reactant, 0);
        assert_eq!(chem.rxns[1].products, vec![1]);
        assert_eq!(chem.rxns[2].order, 2);
        assert_eq!(chem.rxns[2].bi_reactants, [0, 1]);
        // Second-order meso rate divides by the subvolume volume.
        assert!((chem.rxns[2].rate - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_first_order_table() {
        let region = region();
        let dt = 1e-3;
        let reactions = vec![
            rxn(vec![1, 0], vec![0, 1], 100.0),
            rxn(vec![1, 0], vec![0, 0], 300.0),
        ];
        let chem =
            compile_reactions(&[region], &reactions, &[1e-9, 1e-9], 2, dt)
                .unwrap()
                .remove(0);
        let table = &chem.first_order[0];
        assert_eq!(table.rxns.len(), 2);
        assert!((table.sum_rate - 400.0).abs() < 1e-12);
        let total = 1.0 - (-dt * 400.0_f64).exp();
        assert!((table.cum_prob[0] - 0.25 * total).abs() < 1e-12);
        assert!((table.cum_prob[1] - total).abs() < 1e-12);
        assert!((table.min_rxn_time_rv - (-dt * 400.0_f64).exp()).abs() < 1e-15);
        // Molecule type 1 undergoes no first-order reaction.
        assert_eq!(chem.first_order[1].rxns.len(), 0);
        assert_eq!(chem.first_order[1].min_rxn_time_rv, 1.0);
    }

    #[test]
    fn test_exclusive_reaction_conflict_is_fatal() {
        let region = region();
        let mut absorbing = rxn(vec![1], vec![0], 10.0);
        absorbing.is_surface = false;
        absorbing.surface_kind = SurfaceRxnKind::Absorbing;
        let normal = rxn(vec![1], vec![0], 5.0);
        let result = compile_reactions(
            &[region],
            &[absorbing, normal],
            &[1e-9],
            1,
            1e-3,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_exception_region_excludes_reaction() {
        let region = region();
        let mut r = rxn(vec![1], vec![0], 5.0);
        r.exception_regions.push("box".to_string());
        let chem = compile_reactions(&[region], &[r], &[1e-9], 1, 1e-3)
            .unwrap()
            .remove(0);
        assert!(chem.rxns.is_empty());
    }
}
