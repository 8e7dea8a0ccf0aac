//! Output writers for realization data and the run summary.
//!
//! Each run produces two text streams: `<stem>.txt` with the
//! per-realization data (active actor bit sequences, passive actor
//! observation rows) and `<stem>_summary.txt` with the run metadata used
//! by downstream tooling to size its arrays.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use plume_engine::RealizationOutput;

/// Buffered writer for the two output streams of one run.
pub struct OutputWriter {
    data: BufWriter<File>,
    summary: BufWriter<File>,
    max_bits: usize,
    max_observations: usize,
}

impl OutputWriter {
    /// Creates `<stem>.txt` and `<stem>_summary.txt` inside `dir`.
    pub fn new(dir: &Path, stem: &str) -> Result<Self> {
        let data_path = dir.join(format!("{stem}.txt"));
        let summary_path = dir.join(format!("{stem}_summary.txt"));
        let data = BufWriter::new(
            File::create(&data_path)
                .with_context(|| format!("creating {}", data_path.display()))?,
        );
        let summary = BufWriter::new(
            File::create(&summary_path)
                .with_context(|| format!("creating {}", summary_path.display()))?,
        );
        Ok(OutputWriter {
            data,
            summary,
            max_bits: 0,
            max_observations: 0,
        })
    }

    /// Appends one realization to the data stream.
    pub fn write_realization(&mut self, out: &RealizationOutput) -> Result<()> {
        writeln!(self.data, "Realization {}:", out.realization)?;
        for (actor, bits) in &out.bit_sequences {
            write!(self.data, "\tActiveActor {actor} bits:")?;
            for &bit in bits {
                write!(self.data, " {}", bit as u8)?;
            }
            writeln!(self.data)?;
            self.max_bits = self.max_bits.max(bits.len());
        }
        for (actor, records) in &out.observations {
            writeln!(self.data, "\tPassiveActor {actor}:")?;
            for record in records {
                write!(self.data, "\t\t")?;
                if let Some(t) = record.time {
                    write!(self.data, "t={t:.9e} ")?;
                }
                for count in &record.counts {
                    write!(self.data, "{count} ")?;
                }
                if let Some(positions) = &record.positions {
                    for per_type in positions {
                        write!(self.data, "(")?;
                        for p in per_type {
                            write!(self.data, "({:.9e},{:.9e},{:.9e}) ", p[0], p[1], p[2])?;
                        }
                        write!(self.data, ")")?;
                    }
                }
                writeln!(self.data)?;
            }
            self.max_observations = self.max_observations.max(records.len());
        }
        Ok(())
    }

    /// Writes the summary stream and flushes both files.
    pub fn finish(
        mut self,
        config_name: &str,
        seed: u64,
        num_repeat: u32,
        started: DateTime<Local>,
        ended: DateTime<Local>,
    ) -> Result<()> {
        writeln!(self.summary, "ConfigFile: {config_name}")?;
        writeln!(self.summary, "Seed: {seed}")?;
        writeln!(self.summary, "NumRepeat: {num_repeat}")?;
        writeln!(self.summary, "StartTime: {}", started.to_rfc3339())?;
        writeln!(self.summary, "EndTime: {}", ended.to_rfc3339())?;
        writeln!(self.summary, "MaxBitLength: {}", self.max_bits)?;
        writeln!(self.summary, "MaxCountLength: {}", self.max_observations)?;
        self.data.flush()?;
        self.summary.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_engine::ObservationRecord;
    use tempfile::TempDir;

    #[test]
    fn test_writer_produces_both_streams() {
        let dir = TempDir::new().unwrap();
        let mut writer = OutputWriter::new(dir.path(), "out").unwrap();
        let realization = RealizationOutput {
            realization: 0,
            bit_sequences: vec![(0, vec![true, false, true])],
            observations: vec![(
                1,
                vec![ObservationRecord {
                    time: Some(0.5),
                    counts: vec![2],
                    positions: Some(vec![vec![[1.0, 2.0, 3.0]]]),
                }],
            )],
        };
        writer.write_realization(&realization).unwrap();
        let now = Local::now();
        writer.finish("config.json", 1, 1, now, now).unwrap();

        let data = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert!(data.contains("Realization 0:"));
        assert!(data.contains("ActiveActor 0 bits: 1 0 1"));
        assert!(data.contains("t=5.000000000e-1"));
        let summary = std::fs::read_to_string(dir.path().join("out_summary.txt")).unwrap();
        assert!(summary.contains("MaxBitLength: 3"));
        assert!(summary.contains("MaxCountLength: 1"));
        assert!(summary.contains("Seed: 1"));
    }
}
