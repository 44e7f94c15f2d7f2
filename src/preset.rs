use std::path::{Path, PathBuf};

use crate::mixture::Channel;
use crate::reads::ReadCountParams;

/// Enum representing the sequin collections that can be simulated.
#[derive(clap::ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// transcriptome sequins: three replicates each of mixtures A and B
    #[value(name = "RNA")]
    Rna,

    /// metagenome sequins: one sample each of mixtures A and B, capped at 1 read per kb
    #[value(name = "META")]
    Meta,
}

/// A single simulated sample: where the sequins come from and where the sample is built.
#[derive(Clone, Debug, PartialEq)]
pub struct Plan {
    pub sequins: PathBuf,
    pub mixture: PathBuf,
    pub root: PathBuf,
    pub channel: Channel,
    pub reads: ReadCountParams,
}

const RNA_REPLICATES: usize = 3;

impl Mode {
    pub fn default_sequins(&self) -> &'static str {
        match self {
            Mode::Rna => "ATR003.v032.fa",
            Mode::Meta => "../data/meta/META.v1.tab.fa",
        }
    }

    pub fn default_mixture(&self) -> &'static str {
        match self {
            Mode::Rna => "../data/trans/MTR004.v013.csv",
            Mode::Meta => "../data/meta/META.v6.mix.csv",
        }
    }

    /// Returns the samples to build for this mode, in the order they should be built.
    ///
    /// # Arguments
    ///
    /// * `sequins` - the sequin FASTA split into every sample
    /// * `mixture` - the mixture table giving the abundances
    /// * `out_dir` - the directory in which each sample directory is created
    pub fn plans(&self, sequins: &Path, mixture: &Path, out_dir: &Path) -> Vec<Plan> {
        let plan = |name: String, channel: Channel, reads: ReadCountParams| Plan {
            sequins: sequins.to_path_buf(),
            mixture: mixture.to_path_buf(),
            root: out_dir.join(name),
            channel,
            reads,
        };

        match self {
            Mode::Rna => [Channel::A, Channel::B]
                .into_iter()
                .flat_map(|channel| {
                    (1..=RNA_REPLICATES).map(move |i| (channel, i))
                })
                .map(|(channel, i)| {
                    plan(format!("RNA_{channel}{i}"), channel, ReadCountParams::default())
                })
                .collect(),
            Mode::Meta => {
                // capped at one read pair per kb to keep the run short
                let reads = ReadCountParams {
                    floor: 0.0,
                    ceiling: Some(1.0),
                    ..Default::default()
                };

                vec![
                    plan("META_A".to_string(), Channel::A, reads),
                    plan("META_B".to_string(), Channel::B, reads),
                ]
            }
        }
    }
}
