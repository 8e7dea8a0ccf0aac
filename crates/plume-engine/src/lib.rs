//! # plume-engine
//!
//! Hybrid microscopic/mesoscopic reaction–diffusion engine for PLUME.
//!
//! The engine simulates discrete molecules across a heterogeneous 3D
//! environment partitioned into regions. Microscopic regions track every
//! molecule as a coordinate and advance them by Brownian jumps at a
//! global time step; mesoscopic regions track integer counts per
//! subvolume and evolve by the next-subvolume method. The two regimes
//! exchange molecules across shared faces.
//!
//! Module map:
//! - [`region`]: region realization and nesting
//! - [`graph`]: subvolume arena, adjacency, diffusion rates
//! - [`chem`]: per-region reaction compilation
//! - [`micro`]: the per-step microscopic engine
//! - [`meso`]: the next-subvolume-method engine
//! - [`actor`]: active (release) and passive (observe) actors
//! - [`scheduler`]: the heterogeneous event queue
//! - [`sim`]: the realization driver tying everything together

pub mod actor;
pub mod chem;
pub mod graph;
pub mod meso;
pub mod micro;
pub mod region;
pub mod scheduler;
pub mod sim;

pub use actor::{build_actors, observe, ActiveState, Actor, ObservationRecord};
pub use chem::{compile_reactions, RegionChem};
pub use graph::{build_environment, Environment, Subvolume};
pub use meso::MesoState;
pub use micro::{micro_tick, MicroState};
pub use region::{build_regions, Region};
pub use scheduler::{Event, EventKind, EventQueue};
pub use sim::{run, RealizationOutput, Simulation};
