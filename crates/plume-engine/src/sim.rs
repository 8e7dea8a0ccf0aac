//! The realization driver.
//!
//! [`Simulation::build`] turns a resolved configuration into the
//! immutable per-run aggregate (regions, subvolume graph, compiled
//! reactions, actor tables). [`Simulation::run_realization`] then owns
//! all mutable state for one seed: molecule stores, mesoscopic counts
//! and putative times, actor states, observations, the RNG stream, and
//! the event queue. Realizations are independent, so repeats can run in
//! parallel without sharing anything.

use log::{debug, info};
use plume_core::config::SimulationSpec;
use plume_core::{Result, SimRng};

use crate::actor::{build_actors, observe, ActiveState, Actor, ObservationRecord};
use crate::chem::{compile_reactions, RegionChem};
use crate::graph::{build_environment, Environment};
use crate::meso::MesoState;
use crate::micro::{micro_tick, MicroState};
use crate::region::build_regions;
use crate::scheduler::{Event, EventKind, EventQueue};

/// Tolerance used when deciding which of an actor's pending sub-events
/// (new action vs. emission) matches the popped event time.
const TIME_TOL: f64 = 1e-12;

/// Immutable simulation aggregate, built once per configuration and
/// shared by all realizations.
#[derive(Debug)]
pub struct Simulation {
    pub spec: SimulationSpec,
    pub env: Environment,
    pub chem: Vec<RegionChem>,
    pub actors: Vec<Actor>,
}

/// Everything one realization produced.
#[derive(Debug, Clone)]
pub struct RealizationOutput {
    pub realization: u64,
    /// Bit sequences of recorded active actors, by actor index.
    pub bit_sequences: Vec<(usize, Vec<bool>)>,
    /// Observation lists of recorded passive actors, by actor index.
    pub observations: Vec<(usize, Vec<ObservationRecord>)>,
}

impl Simulation {
    /// Builds the static aggregate: regions, subvolume graph, reaction
    /// tables, and actor intersection tables.
    pub fn build(spec: SimulationSpec) -> Result<Self> {
        let regions = build_regions(
            &spec.environment.regions,
            spec.environment.subvol_base_size,
        )?;
        let env = build_environment(
            regions,
            spec.environment.subvol_base_size,
            spec.chemistry.num_mol_types,
            spec.chemistry.diff_coef.clone(),
        )?;
        let chem = compile_reactions(
            &env.regions,
            &spec.chemistry.reactions,
            &env.diff_coef,
            spec.chemistry.num_mol_types,
            spec.control.dt_micro,
        )?;
        let actors = build_actors(&env, &spec.environment.actors)?;
        debug!(
            "simulation built: {} regions, {} subvolumes, {} actors",
            env.regions.len(),
            env.subs.len(),
            actors.len()
        );
        Ok(Simulation {
            spec,
            env,
            chem,
            actors,
        })
    }

    /// Runs one realization to completion.
    pub fn run_realization(&self, realization: u64) -> Result<RealizationOutput> {
        let dt = self.spec.control.dt_micro;
        let final_time = self.spec.control.final_time;
        let mut rng = SimRng::new(self.spec.control.seed, realization);
        let mut micro = MicroState::new(&self.env);
        let mut meso = MesoState::new(&self.env, &self.chem);
        meso.initialize_times(&self.env, &self.chem, 0.0, &mut rng);

        let mut queue = EventQueue::new();
        let mut next_micro_barrier = dt;
        let has_micro = self.env.regions.iter().any(|r| r.is_micro());
        if has_micro {
            queue.push(Event {
                time: dt,
                kind: EventKind::Micro,
                generation: 0,
            });
        }
        for meso_id in 0..self.env.meso_subs.len() {
            queue.push(Event {
                time: meso.next_time[meso_id],
                kind: EventKind::Meso(meso_id),
                generation: meso.generation[meso_id],
            });
        }

        // Actor state.
        let mut actives: Vec<Option<ActiveState>> = Vec::with_capacity(self.actors.len());
        for actor in &self.actors {
            actives.push(if actor.spec.is_active {
                Some(ActiveState::new(actor)?)
            } else {
                None
            });
        }
        let mut passive_next: Vec<f64> = self.actors.iter().map(|a| a.spec.start_time).collect();
        let mut actions_done: Vec<u64> = vec![0; self.actors.len()];
        let mut actor_gen: Vec<u64> = vec![0; self.actors.len()];
        let mut observations: Vec<Vec<ObservationRecord>> =
            vec![Vec::new(); self.actors.len()];
        let mut live_actors = self.actors.len();
        for (i, actor) in self.actors.iter().enumerate() {
            queue.push(Event {
                time: actor.spec.start_time,
                kind: EventKind::Actor(i),
                generation: 0,
            });
        }

        let progress_interval = if self.spec.control.max_progress_updates > 0 {
            final_time / self.spec.control.max_progress_updates as f64
        } else {
            0.0
        };
        if progress_interval > 0.0 {
            queue.push(Event {
                time: progress_interval,
                kind: EventKind::Progress,
                generation: 0,
            });
        }

        while let Some(event) = queue.pop() {
            if event.time > final_time {
                break;
            }
            match event.kind {
                EventKind::Micro => {
                    let barrier = event.time;
                    micro_tick(
                        &self.env,
                        &self.chem,
                        barrier - dt,
                        dt,
                        &mut micro,
                        &mut meso,
                        &mut rng,
                    )?;
                    for meso_id in meso.refresh_dirty(&self.env, &self.chem, barrier, &mut rng)
                    {
                        queue.push(Event {
                            time: meso.next_time[meso_id],
                            kind: EventKind::Meso(meso_id),
                            generation: meso.generation[meso_id],
                        });
                    }
                    next_micro_barrier = barrier + dt;
                    queue.push(Event {
                        time: next_micro_barrier,
                        kind: EventKind::Micro,
                        generation: 0,
                    });
                }
                EventKind::Meso(meso_id) => {
                    if event.generation != meso.generation[meso_id] {
                        continue; // Stale putative time.
                    }
                    let changed = meso.execute_event(
                        &self.env,
                        &self.chem,
                        &mut micro,
                        meso_id,
                        event.time,
                        next_micro_barrier,
                        &mut rng,
                    )?;
                    for id in changed {
                        queue.push(Event {
                            time: meso.next_time[id],
                            kind: EventKind::Meso(id),
                            generation: meso.generation[id],
                        });
                    }
                }
                EventKind::Actor(i) => {
                    if event.generation != actor_gen[i] {
                        continue;
                    }
                    let t = event.time;
                    let actor = &self.actors[i];
                    let next = if let Some(active) = actives[i].as_mut() {
                        if active.next_action <= active.next_emission
                            && (active.next_action - t).abs() <= TIME_TOL
                        {
                            active.new_release(actor, t, &mut rng);
                            actions_done[i] += 1;
                            let exhausted = actor
                                .spec
                                .max_actions
                                .map_or(false, |m| actions_done[i] >= m)
                                || actor.spec.action_interval <= 0.0;
                            active.next_action = if exhausted {
                                f64::INFINITY
                            } else {
                                t + actor.spec.action_interval
                            };
                        } else {
                            active.fire_emission(
                                &self.env,
                                actor,
                                &mut micro,
                                &mut meso,
                                next_micro_barrier,
                                &mut rng,
                            );
                        }
                        active.next_event_time()
                    } else {
                        let record = observe(&self.env, actor, &micro, &meso, t, &mut rng);
                        if actor.spec.is_recorded {
                            observations[i].push(record);
                        }
                        actions_done[i] += 1;
                        let exhausted = actor
                            .spec
                            .max_actions
                            .map_or(false, |m| actions_done[i] >= m)
                            || actor.spec.action_interval <= 0.0;
                        passive_next[i] = if exhausted {
                            f64::INFINITY
                        } else {
                            t + actor.spec.action_interval
                        };
                        passive_next[i]
                    };
                    for meso_id in meso.refresh_dirty(&self.env, &self.chem, t, &mut rng) {
                        queue.push(Event {
                            time: meso.next_time[meso_id],
                            kind: EventKind::Meso(meso_id),
                            generation: meso.generation[meso_id],
                        });
                    }
                    actor_gen[i] += 1;
                    if next.is_finite() {
                        queue.push(Event {
                            time: next,
                            kind: EventKind::Actor(i),
                            generation: actor_gen[i],
                        });
                    } else {
                        live_actors -= 1;
                        if live_actors == 0 && !self.actors.is_empty() {
                            debug!("all actors exhausted; ending realization early");
                            break;
                        }
                    }
                }
                EventKind::Progress => {
                    info!(
                        "realization {}: {:.0}% of simulated time",
                        realization,
                        100.0 * event.time / final_time
                    );
                    queue.push(Event {
                        time: event.time + progress_interval,
                        kind: EventKind::Progress,
                        generation: 0,
                    });
                }
            }
        }

        let bit_sequences = self
            .actors
            .iter()
            .enumerate()
            .filter(|(_, a)| a.spec.is_active && a.spec.is_recorded)
            .map(|(i, _)| {
                let bits = actives[i]
                    .as_ref()
                    .map(|s| s.bits.clone())
                    .unwrap_or_default();
                (i, bits)
            })
            .collect();
        let recorded_observations = self
            .actors
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.spec.is_active && a.spec.is_recorded)
            .map(|(i, _)| (i, std::mem::take(&mut observations[i])))
            .collect();

        Ok(RealizationOutput {
            realization,
            bit_sequences,
            observations: recorded_observations,
        })
    }

    /// Runs all configured repeats sequentially.
    pub fn run_all(&self) -> Result<Vec<RealizationOutput>> {
        (0..self.spec.control.num_repeat as u64)
            .map(|r| self.run_realization(r))
            .collect()
    }
}

/// Convenience: build and run a full simulation from a resolved spec.
pub fn run(spec: SimulationSpec) -> Result<Vec<RealizationOutput>> {
    let sim = Simulation::build(spec)?;
    sim.run_all()
}

impl RealizationOutput {
    /// The maximum bit count over recorded active actors.
    pub fn max_bits(&self) -> usize {
        self.bit_sequences
            .iter()
            .map(|(_, b)| b.len())
            .max()
            .unwrap_or(0)
    }

    /// The maximum observation count over recorded passive actors.
    pub fn max_observations(&self) -> usize {
        self.observations
            .iter()
            .map(|(_, o)| o.len())
            .max()
            .unwrap_or(0)
    }
}

