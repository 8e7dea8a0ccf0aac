//! End-to-end molecular communication scenario: a CSK transmitter and a
//! counting receiver in one reflective volume.

mod common;

use common::*;
use plume_engine::Simulation;

#[test]
fn test_csk_transmission_counts_track_bits() {
    let dt = 1e-3;
    let t_final = 0.5;
    let strength = 40.0;
    // 20 um reflective box.
    let tank = box_region("tank", [0.0; 3], 20, [1, 1, 1], true, dt);
    // Transmitter: one random bit every 0.1 s, five symbols total.
    let mut tx = releaser([1e-6, 3e-6, 9e-6, 11e-6, 9e-6, 11e-6], strength, 0.1, 5);
    tx.active.as_mut().unwrap().prob_one = 0.5;
    // Receiver: snapshots the whole volume between symbol instants.
    let rx = observer([0.0, 2e-5, 0.0, 2e-5, 0.0, 2e-5], 0.05, 0.1, Some(5), false);
    let sim = Simulation::build(spec(
        control(t_final, dt, 1),
        1e-6,
        vec![1e-9],
        vec![],
        vec![tank],
        vec![tx, rx],
    ))
    .unwrap();
    let out = sim.run_realization(0).unwrap();

    let (_, bits) = &out.bit_sequences[0];
    assert_eq!(bits.len(), 5);
    let (_, records) = &out.observations[0];
    assert_eq!(records.len(), 5);

    // The box reflects everything, so the k-th snapshot counts exactly
    // the molecules of every 1-bit emitted so far.
    let mut ones = 0u64;
    for (k, record) in records.iter().enumerate() {
        if bits[k] {
            ones += 1;
        }
        assert_eq!(
            record.counts[0],
            ones * strength as u64,
            "snapshot {k} does not match emitted symbols {bits:?}"
        );
    }
}

#[test]
fn test_observation_times_are_recorded() {
    let dt = 1e-3;
    let tank = box_region("tank", [0.0; 3], 10, [1, 1, 1], true, dt);
    let rx = observer([0.0, 1e-5, 0.0, 1e-5, 0.0, 1e-5], 0.0, 1e-2, Some(3), false);
    let sim = Simulation::build(spec(
        control(0.1, dt, 2),
        1e-6,
        vec![1e-9],
        vec![],
        vec![tank],
        vec![rx],
    ))
    .unwrap();
    let out = sim.run_realization(0).unwrap();
    let (_, records) = &out.observations[0];
    assert_eq!(records.len(), 3);
    let times: Vec<f64> = records.iter().map(|r| r.time.unwrap()).collect();
    assert_eq!(times, vec![0.0, 1e-2, 2e-2]);
}
