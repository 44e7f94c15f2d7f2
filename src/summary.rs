use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use needletail::{parser::FastqReader, FastxReader};
use serde::Serialize;

use crate::mixture::Channel;
use crate::reads::ReadCountParams;

/// What happened to a single sequin during a run.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SequinOutcome {
    Generated { reads: u64 },
    LowAbundance { reads: i64 },
    NotInMixture,
    Failed { reason: String },
}

#[derive(Serialize, Clone, Debug)]
pub struct SequinReport {
    pub id: String,
    #[serde(flatten)]
    pub outcome: SequinOutcome,
}

/// Summary of one simulation run over a working root.
#[derive(Serialize, Debug)]
pub struct RunReport {
    pub sequinsim_version: String,
    pub run_date: String,
    pub mixture: PathBuf,
    pub root: PathBuf,
    pub channel: Channel,
    pub params: ReadCountParams,
    pub elapsed: f64,
    pub generated: usize,
    pub low_abundance: usize,
    pub not_in_mixture: usize,
    pub failed: usize,
    /// Read pairs requested from the simulator over all generated sequins
    pub requested_pairs: u64,
    /// Read pairs in `simulated_1.fastq`, if a merge took place
    pub merged_pairs: Option<usize>,
    pub sequins: Vec<SequinReport>,
}

impl RunReport {
    pub fn new(
        mixture: &Path,
        root: &Path,
        channel: Channel,
        params: ReadCountParams,
        sequins: Vec<SequinReport>,
    ) -> Self {
        let mut report = RunReport {
            sequinsim_version: crate::cli::VERSION.to_string(),
            run_date: format!("{:?}", chrono::offset::Local::now()),
            mixture: mixture.to_path_buf(),
            root: root.to_path_buf(),
            channel,
            params,
            elapsed: 0.0,
            generated: 0,
            low_abundance: 0,
            not_in_mixture: 0,
            failed: 0,
            requested_pairs: 0,
            merged_pairs: None,
            sequins: Vec::new(),
        };

        for s in sequins.iter() {
            match s.outcome {
                SequinOutcome::Generated { reads } => {
                    report.generated += 1;
                    report.requested_pairs += reads;
                }
                SequinOutcome::LowAbundance { .. } => report.low_abundance += 1,
                SequinOutcome::NotInMixture => report.not_in_mixture += 1,
                SequinOutcome::Failed { .. } => report.failed += 1,
            }
        }
        report.sequins = sequins;

        report
    }

    /// Identifiers of the sequins which ended with a failed simulation.
    pub fn failures(&self) -> impl Iterator<Item = &SequinReport> {
        self.sequins
            .iter()
            .filter(|s| matches!(s.outcome, SequinOutcome::Failed { .. }))
    }

    pub fn log_totals(&self) {
        info!(
            "Stats: {} generated, {} low abundance, {} not in mixture, {} failed, \
            {} read pairs requested, {:.1}s runtime",
            self.generated,
            self.low_abundance,
            self.not_in_mixture,
            self.failed,
            self.requested_pairs,
            self.elapsed,
        );

        if let Some(merged) = self.merged_pairs {
            info!("Merged sample holds {merged} read pairs");
        }

        for s in self.failures() {
            if let SequinOutcome::Failed { reason } = &s.outcome {
                warn!("  {} failed: {}", s.id, reason);
            }
        }
    }

    /// Writes the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Unable to create report {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .context("Could not serialize report")?;

        info!("Wrote report to {}", path.display());
        Ok(())
    }
}

/// Counts the records of a FASTQ file. An empty file holds no records.
pub fn count_fastq_records(path: &Path) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("Unable to open {}", path.display()))?;
    if file.metadata()?.len() == 0 {
        return Ok(0);
    }

    let mut reader = FastqReader::new(file);
    let mut count = 0;

    while let Some(rec) = reader.next() {
        rec.with_context(|| format!("Invalid record in {}", path.display()))?;
        count += 1;
    }

    Ok(count)
}
