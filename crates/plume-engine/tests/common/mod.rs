//! Shared builders for integration tests.

use plume_core::config::*;

pub fn control(final_time: f64, dt: f64, seed: u64) -> ControlSpec {
    ControlSpec {
        num_repeat: 1,
        final_time,
        dt_micro: dt,
        seed,
        max_progress_updates: 0,
    }
}

pub fn box_region(
    label: &str,
    anchor: [f64; 3],
    size_rect: u32,
    num: [u32; 3],
    micro: bool,
    dt: f64,
) -> RegionSpec {
    RegionSpec {
        label: label.to_string(),
        parent_label: String::new(),
        shape: ShapeName::RectangularBox,
        kind: RegionKind::Normal,
        surface_kind: None,
        anchor,
        size_rect,
        radius: 0.0,
        num,
        is_microscopic: micro,
        flow: None,
        dt,
    }
}

pub fn releaser(boundary: [f64; 6], strength: f64, interval: f64, max_actions: u64) -> ActorSpec {
    ActorSpec {
        location: ActorLocation::Shape {
            shape: ShapeName::RectangularBox,
            boundary,
        },
        is_active: true,
        start_time: 0.0,
        action_interval: interval,
        max_actions: Some(max_actions),
        is_recorded: true,
        record_time: false,
        active: Some(ActiveSpec {
            random_bits: true,
            prob_one: 1.0,
            mod_scheme: ModScheme::Csk,
            mod_bits: 1,
            mod_strength: strength,
            is_released: vec![true],
            release_interval: 0.0,
            slot_interval: 0.0,
            random_release_times: false,
            random_mol_count: false,
        }),
        passive: None,
    }
}

pub fn observer(
    boundary: [f64; 6],
    start_time: f64,
    interval: f64,
    max_actions: Option<u64>,
    record_pos: bool,
) -> ActorSpec {
    ActorSpec {
        location: ActorLocation::Shape {
            shape: ShapeName::RectangularBox,
            boundary,
        },
        is_active: false,
        start_time,
        action_interval: interval,
        max_actions,
        is_recorded: true,
        record_time: true,
        active: None,
        passive: Some(PassiveSpec {
            is_observed: vec![true],
            record_pos: vec![record_pos],
        }),
    }
}

pub fn spec(
    ctrl: ControlSpec,
    base_size: f64,
    diff: Vec<f64>,
    reactions: Vec<ReactionSpec>,
    regions: Vec<RegionSpec>,
    actors: Vec<ActorSpec>,
) -> SimulationSpec {
    SimulationSpec {
        output_filename: "test".to_string(),
        control: ctrl,
        chemistry: ChemistrySpec {
            num_mol_types: diff.len(),
            diff_coef: diff,
            reactions,
        },
        environment: EnvironmentSpec {
            num_dim: 3,
            subvol_base_size: base_size,
            regions,
            actors,
        },
        notes: String::new(),
    }
}
