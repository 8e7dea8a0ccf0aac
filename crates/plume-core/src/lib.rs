//! # plume-core
//!
//! Core types, configuration records, and errors for PLUME, a stochastic
//! reaction–diffusion simulator for molecular communication studies.
//!
//! This crate defines the abstractions shared by the geometry kernel, the
//! simulation engine, and the CLI:
//! - **Errors**: unified error handling with [`PlumeError`]
//! - **Config**: serde records for the four configuration sections, with
//!   default-filling and warning collection
//! - **RNG**: the per-realization seeded random stream [`SimRng`]

pub mod config;
pub mod errors;
pub mod rng;

pub use config::{
    ActiveSpec, ActorLocation, ActorSpec, ChemistrySpec, ConfigWarning, ControlSpec,
    EnvironmentSpec, FlowFunction, FlowProfile, FlowSpec, ModScheme, PassiveSpec, RawSimulationSpec,
    ReactionSpec, RegionKind, RegionSpec, ShapeName, SimulationSpec, SurfaceKind, SurfaceRxnKind,
};
pub use errors::{PlumeError, Result};
pub use rng::SimRng;

/// Fraction of the subvolume base size used as the adjacency resolution:
/// two faces closer than this fraction of the base size are treated as
/// coincident.
pub const SUB_ADJ_RESOLUTION: f64 = 0.01;

/// Maximum recursion depth when following a molecule trajectory through
/// reflections and region transitions within one time step.
pub const MAX_PATH_DEPTH: u32 = 16;
