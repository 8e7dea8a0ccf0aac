//! Configuration records for a PLUME simulation.
//!
//! The on-disk format is a JSON document with four top-level sections:
//! `Simulation Control`, `Chemical Properties`, `Environment`, and a
//! free-form `Notes`. Parsing goes through raw records whose fields are
//! all optional; [`RawSimulationSpec::resolve`] fills documented defaults,
//! collects a warning for every defaulted field, and rejects structurally
//! invalid input. The engine only ever sees the resolved records.

use serde::{Deserialize, Serialize};

use crate::errors::{PlumeError, Result};

/// Shape of a region or actor boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeName {
    #[serde(rename = "Rectangle")]
    Rectangle,
    #[serde(rename = "Rectangular Box")]
    RectangularBox,
    #[serde(rename = "Sphere")]
    Sphere,
    #[serde(rename = "Cylinder")]
    Cylinder,
}

/// Region type. Normal regions occupy their full volume; surface regions
/// are hollow and control transitions across their boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionKind {
    #[serde(rename = "Normal")]
    Normal,
    #[serde(rename = "3D Surface")]
    Surface3D,
    #[serde(rename = "2D Surface")]
    Surface2D,
}

/// Sub-type of a surface region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceKind {
    #[serde(rename = "Membrane")]
    Membrane,
    #[serde(rename = "Inner")]
    Inner,
    #[serde(rename = "Outer")]
    Outer,
}

/// Sub-type of a surface reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceRxnKind {
    #[serde(rename = "Normal")]
    Normal,
    #[serde(rename = "Absorbing")]
    Absorbing,
    #[serde(rename = "Receptor Binding")]
    Receptor,
    #[serde(rename = "Membrane")]
    Membrane,
}

/// Time law of the centerline flow velocity in a cylinder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowFunction {
    #[serde(rename = "Linear")]
    Linear,
    #[serde(rename = "Sinus")]
    Sinus,
}

/// Radial profile of the flow velocity in a cylinder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowProfile {
    #[serde(rename = "Uniform")]
    Uniform,
    #[serde(rename = "Laminar")]
    Laminar,
}

/// Modulation scheme for active actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModScheme {
    #[serde(rename = "CSK")]
    Csk,
}

/// Resolved simulation control section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlSpec {
    pub num_repeat: u32,
    pub final_time: f64,
    /// Global microscopic time step. Every region inherits this step.
    pub dt_micro: f64,
    pub seed: u64,
    pub max_progress_updates: u32,
}

/// Resolved chemical properties section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChemistrySpec {
    pub num_mol_types: usize,
    /// Diffusion coefficient per molecule type, m^2/s.
    pub diff_coef: Vec<f64>,
    pub reactions: Vec<ReactionSpec>,
}

/// One chemical reaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionSpec {
    /// Reactant multiplicity per molecule type.
    pub reactants: Vec<u32>,
    /// Product multiplicity per molecule type.
    pub products: Vec<u32>,
    /// Base rate constant. Units depend on reaction order.
    pub k: f64,
    pub is_surface: bool,
    pub surface_kind: SurfaceRxnKind,
    /// Whether the reaction occurs in every (type-compatible) region by
    /// default. Exception labels invert the default for listed regions.
    pub everywhere: bool,
    pub exception_regions: Vec<String>,
}

/// Flow block for cylindrical regions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FlowSpec {
    pub velocity: f64,
    pub acceleration: f64,
    pub function: FlowFunction,
    pub frequency: f64,
    pub amplitude: f64,
    pub profile: FlowProfile,
}

/// One region of the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSpec {
    pub label: String,
    /// Empty string means no parent.
    pub parent_label: String,
    pub shape: ShapeName,
    pub kind: RegionKind,
    pub surface_kind: Option<SurfaceKind>,
    /// Lower corner for rectangular shapes; center (sphere) or center of
    /// the base circle (cylinder) for round shapes.
    pub anchor: [f64; 3],
    /// Subvolume edge length as a multiple of the base size. Rectangular
    /// shapes only.
    pub size_rect: u32,
    /// Radius of round shapes.
    pub radius: f64,
    /// Subvolume counts along each axis. A rectangle has exactly one zero
    /// entry, a cylinder exactly two (the nonzero entry fixes its axis and
    /// length), and a sphere ignores them.
    pub num: [u32; 3],
    pub is_microscopic: bool,
    pub flow: Option<FlowSpec>,
    /// Micro time step; inherited from the global step.
    pub dt: f64,
}

/// Footprint of an actor: an explicit shape or a union of regions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ActorLocation {
    Shape { shape: ShapeName, boundary: [f64; 6] },
    Regions(Vec<String>),
}

/// Modulation block of an active actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSpec {
    pub random_bits: bool,
    pub prob_one: f64,
    pub mod_scheme: ModScheme,
    pub mod_bits: u32,
    pub mod_strength: f64,
    /// Per molecule type: whether this actor releases it.
    pub is_released: Vec<bool>,
    pub release_interval: f64,
    pub slot_interval: f64,
    pub random_release_times: bool,
    pub random_mol_count: bool,
}

/// Observation block of a passive actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassiveSpec {
    /// Per molecule type: whether counts are observed.
    pub is_observed: Vec<bool>,
    /// Per molecule type: whether positions are recorded.
    pub record_pos: Vec<bool>,
}

/// One actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorSpec {
    pub location: ActorLocation,
    pub is_active: bool,
    pub start_time: f64,
    pub action_interval: f64,
    pub max_actions: Option<u64>,
    /// Whether this actor's activity is written to the output stream.
    pub is_recorded: bool,
    /// Whether observation times accompany recorded activity.
    pub record_time: bool,
    pub active: Option<ActiveSpec>,
    pub passive: Option<PassiveSpec>,
}

/// Resolved environment section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    pub num_dim: u32,
    pub subvol_base_size: f64,
    pub regions: Vec<RegionSpec>,
    pub actors: Vec<ActorSpec>,
}

/// Fully resolved simulation specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSpec {
    pub output_filename: String,
    pub control: ControlSpec,
    pub chemistry: ChemistrySpec,
    pub environment: EnvironmentSpec,
    pub notes: String,
}

// ---------------------------------------------------------------------------
// Raw (on-disk) records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSimulationSpec {
    #[serde(rename = "Output Filename")]
    pub output_filename: Option<String>,
    #[serde(rename = "Simulation Control", default)]
    pub control: RawControl,
    #[serde(rename = "Chemical Properties", default)]
    pub chemistry: RawChemistry,
    #[serde(rename = "Environment", default)]
    pub environment: RawEnvironment,
    #[serde(rename = "Notes")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawControl {
    #[serde(rename = "Number of Repeats")]
    pub num_repeat: Option<u32>,
    #[serde(rename = "Final Simulation Time")]
    pub final_time: Option<f64>,
    #[serde(rename = "Global Microscopic Time Step")]
    pub dt_micro: Option<f64>,
    #[serde(rename = "Random Number Seed")]
    pub seed: Option<u64>,
    #[serde(rename = "Max Number of Progress Updates")]
    pub max_progress_updates: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawChemistry {
    #[serde(rename = "Number of Molecule Types")]
    pub num_mol_types: Option<usize>,
    #[serde(rename = "Diffusion Coefficients")]
    pub diff_coef: Option<Vec<f64>>,
    #[serde(rename = "Chemical Reaction Specification", default)]
    pub reactions: Vec<RawReaction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReaction {
    #[serde(rename = "Reactants")]
    pub reactants: Option<Vec<u32>>,
    #[serde(rename = "Products")]
    pub products: Option<Vec<u32>>,
    #[serde(rename = "Reaction Rate")]
    pub k: Option<f64>,
    #[serde(rename = "Surface Reaction?")]
    pub is_surface: Option<bool>,
    #[serde(rename = "Surface Reaction Type")]
    pub surface_kind: Option<SurfaceRxnKind>,
    #[serde(rename = "Default Everywhere?")]
    pub everywhere: Option<bool>,
    #[serde(rename = "Exception Regions", default)]
    pub exception_regions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEnvironment {
    #[serde(rename = "Number of Dimensions")]
    pub num_dim: Option<u32>,
    #[serde(rename = "Subvolume Base Size")]
    pub subvol_base_size: Option<f64>,
    #[serde(rename = "Region Specification", default)]
    pub regions: Vec<RawRegion>,
    #[serde(rename = "Actor Specification", default)]
    pub actors: Vec<RawActor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRegion {
    #[serde(rename = "Label")]
    pub label: Option<String>,
    #[serde(rename = "Parent Label")]
    pub parent_label: Option<String>,
    #[serde(rename = "Shape")]
    pub shape: Option<ShapeName>,
    #[serde(rename = "Type")]
    pub kind: Option<RegionKind>,
    #[serde(rename = "Surface Type")]
    pub surface_kind: Option<SurfaceKind>,
    #[serde(rename = "Anchor X Coordinate")]
    pub x_anch: Option<f64>,
    #[serde(rename = "Anchor Y Coordinate")]
    pub y_anch: Option<f64>,
    #[serde(rename = "Anchor Z Coordinate")]
    pub z_anch: Option<f64>,
    #[serde(rename = "Integer Subvolume Size")]
    pub size_rect: Option<u32>,
    #[serde(rename = "Radius")]
    pub radius: Option<f64>,
    #[serde(rename = "Number of Subvolumes Along X")]
    pub num_x: Option<u32>,
    #[serde(rename = "Number of Subvolumes Along Y")]
    pub num_y: Option<u32>,
    #[serde(rename = "Number of Subvolumes Along Z")]
    pub num_z: Option<u32>,
    #[serde(rename = "Is Region Microscopic?")]
    pub is_microscopic: Option<bool>,
    #[serde(rename = "Flow Velocity")]
    pub flow_velocity: Option<f64>,
    #[serde(rename = "Flow Acceleration")]
    pub flow_acceleration: Option<f64>,
    #[serde(rename = "Flow Function Type")]
    pub flow_function: Option<FlowFunction>,
    #[serde(rename = "Flow Function Frequency")]
    pub flow_frequency: Option<f64>,
    #[serde(rename = "Flow Function Amplitude")]
    pub flow_amplitude: Option<f64>,
    #[serde(rename = "Flow Profile")]
    pub flow_profile: Option<FlowProfile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawActor {
    #[serde(rename = "Is Actor Location Defined by Regions?")]
    pub location_by_regions: Option<bool>,
    #[serde(rename = "List of Regions Defining Location", default)]
    pub region_labels: Vec<String>,
    #[serde(rename = "Shape")]
    pub shape: Option<ShapeName>,
    #[serde(rename = "Outer Boundary")]
    pub boundary: Option<[f64; 6]>,
    #[serde(rename = "Is Actor Active?")]
    pub is_active: Option<bool>,
    #[serde(rename = "Start Time")]
    pub start_time: Option<f64>,
    #[serde(rename = "Action Interval")]
    pub action_interval: Option<f64>,
    #[serde(rename = "Is There Max Number of Actions?")]
    pub has_max_actions: Option<bool>,
    #[serde(rename = "Max Number of Actions")]
    pub max_actions: Option<u64>,
    #[serde(rename = "Is Actor Activity Recorded?")]
    pub is_recorded: Option<bool>,
    #[serde(rename = "Is Time Recorded with Activity?")]
    pub record_time: Option<bool>,
    #[serde(rename = "Bits Random?")]
    pub random_bits: Option<bool>,
    #[serde(rename = "Probability of Bit 1")]
    pub prob_one: Option<f64>,
    #[serde(rename = "Modulation Scheme")]
    pub mod_scheme: Option<ModScheme>,
    #[serde(rename = "Modulation Bits")]
    pub mod_bits: Option<u32>,
    #[serde(rename = "Modulation Strength")]
    pub mod_strength: Option<f64>,
    #[serde(rename = "Is Molecule Type Released?", default)]
    pub is_released: Vec<bool>,
    #[serde(rename = "Release Interval")]
    pub release_interval: Option<f64>,
    #[serde(rename = "Slot Interval")]
    pub slot_interval: Option<f64>,
    #[serde(rename = "Random Molecule Release Times?")]
    pub random_release_times: Option<bool>,
    #[serde(rename = "Random Number of Molecules?")]
    pub random_mol_count: Option<bool>,
    #[serde(rename = "Is Molecule Type Observed?", default)]
    pub is_observed: Vec<bool>,
    #[serde(rename = "Is Molecule Position Observed?", default)]
    pub record_pos: Vec<bool>,
}

/// A defaulted-field warning collected while resolving a raw spec.
pub type ConfigWarning = String;

fn default_field<T: Clone>(
    value: &Option<T>,
    default: T,
    name: &str,
    warnings: &mut Vec<ConfigWarning>,
) -> T {
    match value {
        Some(v) => v.clone(),
        None => {
            warnings.push(format!("\"{name}\" missing; using default"));
            default
        }
    }
}

impl RawSimulationSpec {
    /// Parses a raw spec from a JSON string.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Fills defaults and validates structure, collecting one warning per
    /// defaulted field. Structural problems (no regions, mismatched
    /// per-type vector lengths) are fatal.
    pub fn resolve(&self) -> Result<(SimulationSpec, Vec<ConfigWarning>)> {
        let mut warnings = Vec::new();

        let control = ControlSpec {
            num_repeat: default_field(&self.control.num_repeat, 1, "Number of Repeats", &mut warnings),
            final_time: default_field(
                &self.control.final_time,
                0.0,
                "Final Simulation Time",
                &mut warnings,
            ),
            dt_micro: default_field(
                &self.control.dt_micro,
                0.0,
                "Global Microscopic Time Step",
                &mut warnings,
            ),
            seed: default_field(&self.control.seed, 1, "Random Number Seed", &mut warnings),
            max_progress_updates: default_field(
                &self.control.max_progress_updates,
                10,
                "Max Number of Progress Updates",
                &mut warnings,
            ),
        };
        if control.final_time <= 0.0 {
            return Err(PlumeError::config("final simulation time must be positive"));
        }
        if control.dt_micro <= 0.0 {
            return Err(PlumeError::config(
                "global microscopic time step must be positive",
            ));
        }

        let num_mol_types = default_field(
            &self.chemistry.num_mol_types,
            1,
            "Number of Molecule Types",
            &mut warnings,
        );
        if num_mol_types == 0 {
            return Err(PlumeError::config("at least one molecule type is required"));
        }
        let diff_coef = match &self.chemistry.diff_coef {
            Some(v) if v.len() == num_mol_types => v.clone(),
            Some(v) => {
                return Err(PlumeError::config(format!(
                    "expected {} diffusion coefficients, found {}",
                    num_mol_types,
                    v.len()
                )))
            }
            None => {
                warnings.push("\"Diffusion Coefficients\" missing; using zeros".to_string());
                vec![0.0; num_mol_types]
            }
        };

        let mut reactions = Vec::with_capacity(self.chemistry.reactions.len());
        for (i, raw) in self.chemistry.reactions.iter().enumerate() {
            reactions.push(raw.resolve(i, num_mol_types, &mut warnings)?);
        }
        let chemistry = ChemistrySpec {
            num_mol_types,
            diff_coef,
            reactions,
        };

        let num_dim = default_field(
            &self.environment.num_dim,
            3,
            "Number of Dimensions",
            &mut warnings,
        );
        let subvol_base_size = self
            .environment
            .subvol_base_size
            .ok_or_else(|| PlumeError::config("subvolume base size is required"))?;
        if subvol_base_size <= 0.0 {
            return Err(PlumeError::config("subvolume base size must be positive"));
        }
        if self.environment.regions.is_empty() {
            return Err(PlumeError::config("at least one region is required"));
        }

        let mut regions = Vec::with_capacity(self.environment.regions.len());
        for (i, raw) in self.environment.regions.iter().enumerate() {
            regions.push(raw.resolve(i, control.dt_micro, &mut warnings)?);
        }
        let mut actors = Vec::with_capacity(self.environment.actors.len());
        for (i, raw) in self.environment.actors.iter().enumerate() {
            actors.push(raw.resolve(i, num_mol_types, &mut warnings)?);
        }

        let spec = SimulationSpec {
            output_filename: default_field(
                &self.output_filename,
                "plume_out".to_string(),
                "Output Filename",
                &mut warnings,
            ),
            control,
            chemistry,
            environment: EnvironmentSpec {
                num_dim,
                subvol_base_size,
                regions,
                actors,
            },
            notes: self.notes.clone().unwrap_or_default(),
        };
        Ok((spec, warnings))
    }
}

impl RawReaction {
    fn resolve(
        &self,
        index: usize,
        num_mol_types: usize,
        warnings: &mut Vec<ConfigWarning>,
    ) -> Result<ReactionSpec> {
        let reactants = self.reactants.clone().unwrap_or_else(|| {
            warnings.push(format!("reaction {index}: \"Reactants\" missing; using zeros"));
            vec![0; num_mol_types]
        });
        let products = self.products.clone().unwrap_or_else(|| {
            warnings.push(format!("reaction {index}: \"Products\" missing; using zeros"));
            vec![0; num_mol_types]
        });
        if reactants.len() != num_mol_types || products.len() != num_mol_types {
            return Err(PlumeError::reaction(
                index,
                format!(
                    "reactant/product vectors must have {} entries",
                    num_mol_types
                ),
            ));
        }
        let is_surface = default_field(
            &self.is_surface,
            false,
            &format!("reaction {index}: Surface Reaction?"),
            warnings,
        );
        let surface_kind = if is_surface {
            default_field(
                &self.surface_kind,
                SurfaceRxnKind::Normal,
                &format!("reaction {index}: Surface Reaction Type"),
                warnings,
            )
        } else {
            SurfaceRxnKind::Normal
        };
        Ok(ReactionSpec {
            reactants,
            products,
            k: default_field(&self.k, 0.0, &format!("reaction {index}: Reaction Rate"), warnings),
            is_surface,
            surface_kind,
            everywhere: default_field(
                &self.everywhere,
                true,
                &format!("reaction {index}: Default Everywhere?"),
                warnings,
            ),
            exception_regions: self.exception_regions.clone(),
        })
    }
}

impl RawRegion {
    fn resolve(
        &self,
        index: usize,
        dt_micro: f64,
        warnings: &mut Vec<ConfigWarning>,
    ) -> Result<RegionSpec> {
        let label = default_field(
            &self.label,
            format!("region {index}"),
            &format!("region {index}: Label"),
            warnings,
        );
        let shape = self
            .shape
            .ok_or_else(|| PlumeError::geometry(&label, "region shape is required"))?;
        let kind = default_field(
            &self.kind,
            RegionKind::Normal,
            &format!("region {index}: Type"),
            warnings,
        );
        let round = matches!(shape, ShapeName::Sphere | ShapeName::Cylinder);
        // Round regions are always tracked microscopically.
        let is_microscopic = if round {
            true
        } else {
            default_field(
                &self.is_microscopic,
                false,
                &format!("region {index}: Is Region Microscopic?"),
                warnings,
            )
        };
        let num = [
            self.num_x.unwrap_or(0),
            self.num_y.unwrap_or(0),
            self.num_z.unwrap_or(0),
        ];
        let radius = if round {
            let r = self
                .radius
                .ok_or_else(|| PlumeError::geometry(&label, "round region requires a radius"))?;
            if r <= 0.0 {
                return Err(PlumeError::geometry(&label, "radius must be positive"));
            }
            r
        } else {
            0.0
        };
        let flow = if shape == ShapeName::Cylinder {
            Some(FlowSpec {
                velocity: default_field(
                    &self.flow_velocity,
                    0.0,
                    &format!("region {index}: Flow Velocity"),
                    warnings,
                ),
                acceleration: self.flow_acceleration.unwrap_or(0.0),
                function: self.flow_function.unwrap_or(FlowFunction::Linear),
                frequency: self.flow_frequency.unwrap_or(0.0),
                amplitude: self.flow_amplitude.unwrap_or(0.0),
                profile: default_field(
                    &self.flow_profile,
                    FlowProfile::Uniform,
                    &format!("region {index}: Flow Profile"),
                    warnings,
                ),
            })
        } else {
            None
        };
        Ok(RegionSpec {
            label,
            parent_label: self.parent_label.clone().unwrap_or_default(),
            shape,
            kind,
            surface_kind: self.surface_kind,
            anchor: [
                self.x_anch.unwrap_or(0.0),
                self.y_anch.unwrap_or(0.0),
                self.z_anch.unwrap_or(0.0),
            ],
            size_rect: default_field(
                &self.size_rect,
                1,
                &format!("region {index}: Integer Subvolume Size"),
                warnings,
            ),
            radius,
            num,
            is_microscopic,
            flow,
            dt: dt_micro,
        })
    }
}

impl RawActor {
    fn resolve(
        &self,
        index: usize,
        num_mol_types: usize,
        warnings: &mut Vec<ConfigWarning>,
    ) -> Result<ActorSpec> {
        let by_regions = default_field(
            &self.location_by_regions,
            false,
            &format!("actor {index}: Is Actor Location Defined by Regions?"),
            warnings,
        );
        let location = if by_regions {
            if self.region_labels.is_empty() {
                return Err(PlumeError::actor(index, "location region list is empty"));
            }
            ActorLocation::Regions(self.region_labels.clone())
        } else {
            let shape = self
                .shape
                .ok_or_else(|| PlumeError::actor(index, "actor shape is required"))?;
            let boundary = self
                .boundary
                .ok_or_else(|| PlumeError::actor(index, "actor outer boundary is required"))?;
            ActorLocation::Shape { shape, boundary }
        };
        let is_active = default_field(
            &self.is_active,
            false,
            &format!("actor {index}: Is Actor Active?"),
            warnings,
        );
        let has_max = self.has_max_actions.unwrap_or(self.max_actions.is_some());
        let max_actions = if has_max {
            Some(
                self.max_actions
                    .ok_or_else(|| PlumeError::actor(index, "max number of actions is required"))?,
            )
        } else {
            None
        };

        fn per_type(
            v: &[bool],
            name: &str,
            index: usize,
            num_mol_types: usize,
            warnings: &mut Vec<ConfigWarning>,
        ) -> Result<Vec<bool>> {
            if v.is_empty() {
                warnings.push(format!("actor {index}: \"{name}\" missing; using all-false"));
                Ok(vec![false; num_mol_types])
            } else if v.len() != num_mol_types {
                Err(PlumeError::actor(
                    index,
                    format!("\"{name}\" must have {num_mol_types} entries"),
                ))
            } else {
                Ok(v.to_vec())
            }
        }

        let active = if is_active {
            Some(ActiveSpec {
                random_bits: default_field(
                    &self.random_bits,
                    true,
                    &format!("actor {index}: Bits Random?"),
                    warnings,
                ),
                prob_one: default_field(
                    &self.prob_one,
                    0.5,
                    &format!("actor {index}: Probability of Bit 1"),
                    warnings,
                ),
                mod_scheme: default_field(
                    &self.mod_scheme,
                    ModScheme::Csk,
                    &format!("actor {index}: Modulation Scheme"),
                    warnings,
                ),
                mod_bits: default_field(
                    &self.mod_bits,
                    1,
                    &format!("actor {index}: Modulation Bits"),
                    warnings,
                ),
                mod_strength: default_field(
                    &self.mod_strength,
                    0.0,
                    &format!("actor {index}: Modulation Strength"),
                    warnings,
                ),
                is_released: per_type(
                    &self.is_released,
                    "Is Molecule Type Released?",
                    index,
                    num_mol_types,
                    warnings,
                )?,
                release_interval: default_field(
                    &self.release_interval,
                    0.0,
                    &format!("actor {index}: Release Interval"),
                    warnings,
                ),
                slot_interval: default_field(
                    &self.slot_interval,
                    0.0,
                    &format!("actor {index}: Slot Interval"),
                    warnings,
                ),
                random_release_times: self.random_release_times.unwrap_or(false),
                random_mol_count: self.random_mol_count.unwrap_or(false),
            })
        } else {
            None
        };
        let passive = if is_active {
            None
        } else {
            Some(PassiveSpec {
                is_observed: per_type(
                    &self.is_observed,
                    "Is Molecule Type Observed?",
                    index,
                    num_mol_types,
                    warnings,
                )?,
                record_pos: per_type(
                    &self.record_pos,
                    "Is Molecule Position Observed?",
                    index,
                    num_mol_types,
                    warnings,
                )?,
            })
        };

        Ok(ActorSpec {
            location,
            is_active,
            start_time: default_field(
                &self.start_time,
                0.0,
                &format!("actor {index}: Start Time"),
                warnings,
            ),
            action_interval: default_field(
                &self.action_interval,
                0.0,
                &format!("actor {index}: Action Interval"),
                warnings,
            ),
            max_actions,
            is_recorded: default_field(
                &self.is_recorded,
                true,
                &format!("actor {index}: Is Actor Activity Recorded?"),
                warnings,
            ),
            record_time: self.record_time.unwrap_or(false),
            active,
            passive,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "Simulation Control": {
            "Final Simulation Time": 0.1,
            "Global Microscopic Time Step": 1e-4,
            "Random Number Seed": 1
        },
        "Chemical Properties": {
            "Number of Molecule Types": 1,
            "Diffusion Coefficients": [1e-9]
        },
        "Environment": {
            "Subvolume Base Size": 1e-6,
            "Region Specification": [{
                "Label": "box",
                "Shape": "Rectangular Box",
                "Is Region Microscopic?": true,
                "Integer Subvolume Size": 10,
                "Number of Subvolumes Along X": 1,
                "Number of Subvolumes Along Y": 1,
                "Number of Subvolumes Along Z": 1
            }]
        }
    }"#;

    #[test]
    fn test_minimal_config_resolves_with_warnings() {
        let raw = RawSimulationSpec::from_json(MINIMAL).unwrap();
        let (spec, warnings) = raw.resolve().unwrap();
        assert_eq!(spec.control.num_repeat, 1);
        assert_eq!(spec.control.seed, 1);
        assert_eq!(spec.chemistry.num_mol_types, 1);
        assert_eq!(spec.environment.regions.len(), 1);
        assert_eq!(spec.environment.regions[0].dt, 1e-4);
        // Defaulted fields (repeats, output filename, ...) must warn.
        assert!(warnings.iter().any(|w| w.contains("Number of Repeats")));
        assert!(warnings.iter().any(|w| w.contains("Output Filename")));
    }

    #[test]
    fn test_missing_base_size_is_fatal() {
        let raw = RawSimulationSpec::from_json(
            r#"{
            "Simulation Control": {
                "Final Simulation Time": 1.0,
                "Global Microscopic Time Step": 1e-3
            },
            "Environment": { "Region Specification": [{"Shape": "Sphere", "Radius": 1e-6}] }
        }"#,
        )
        .unwrap();
        assert!(raw.resolve().is_err());
    }

    #[test]
    fn test_round_region_forces_microscopic() {
        let raw = RawSimulationSpec::from_json(
            r#"{
            "Simulation Control": {
                "Final Simulation Time": 1.0,
                "Global Microscopic Time Step": 1e-3,
                "Random Number Seed": 0
            },
            "Chemical Properties": { "Number of Molecule Types": 1, "Diffusion Coefficients": [0.0] },
            "Environment": {
                "Subvolume Base Size": 1e-6,
                "Region Specification": [{
                    "Label": "ball",
                    "Shape": "Sphere",
                    "Radius": 5e-6,
                    "Is Region Microscopic?": false
                }]
            }
        }"#,
        )
        .unwrap();
        let (spec, _) = raw.resolve().unwrap();
        assert!(spec.environment.regions[0].is_microscopic);
    }
}
