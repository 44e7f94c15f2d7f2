use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use rayon::prelude::*;

use crate::io::{self, Mate};
use crate::mixture::{Channel, MixtureTable};
use crate::reads::{should_generate, ReadCountParams};
use crate::simulator::{ReadSimulator, SimulationJob};
use crate::summary::{count_fastq_records, RunReport, SequinOutcome, SequinReport};

/// Settings for simulating one sample from a split working root.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    pub mixture: PathBuf,
    pub root: PathBuf,
    pub channel: Channel,
    pub reads: ReadCountParams,
    /// Number of sequins simulated at once
    pub threads: usize,
    /// Seed for the per-sequin simulator seeds. Drawn from entropy if absent.
    pub seed: Option<u64>,
}

/// Collects the sequin keys of a working root: the name of every directory up to its first
/// `.`, deduplicated and sorted.
pub fn sequin_keys(root: &Path) -> Result<Vec<String>> {
    let entries =
        fs::read_dir(root).with_context(|| format!("Unable to list {}", root.display()))?;

    let mut keys = BTreeSet::new();
    for entry in entries {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }

        let name = entry.file_name();
        let name = name.to_string_lossy();
        let key = name.split('.').next().unwrap_or_default();
        if !key.is_empty() {
            keys.insert(key.to_string());
        }
    }

    Ok(keys.into_iter().collect())
}

/// Simulates reads for every sequin directory in the working root and merges the results into
/// `simulated_1.fastq` and `simulated_2.fastq`.
///
/// Sequins missing from the mixture, with too low an abundance, or whose simulation fails are
/// reported and skipped; the run carries on with the rest.
///
/// # Errors
///
/// Returns an error if the mixture table cannot be parsed, the read count parameters are
/// invalid, or a file cannot be listed, copied or merged.
pub fn run(config: &SimulationConfig, simulator: &impl ReadSimulator) -> Result<RunReport> {
    let now = std::time::Instant::now();

    config.reads.validate()?;
    let table = MixtureTable::load(&config.mixture)?;
    if table.is_empty() {
        warn!("Mixture table {} holds no sequins", config.mixture.display());
    }
    let keys = sequin_keys(&config.root)?;

    info!(
        "Simulating mixture {} for {} sequins in {}",
        config.channel,
        keys.len(),
        config.root.display()
    );

    // seeds are drawn in key order so that a seeded run does not depend on the thread count
    let mut rng = match config.seed {
        Some(seed) => Xoshiro256StarStar::seed_from_u64(seed),
        None => Xoshiro256StarStar::from_entropy(),
    };
    let jobs: Vec<(String, u64)> = keys
        .into_iter()
        .map(|key| (key, rng.gen_range(1..=i32::MAX as u64)))
        .collect();

    let process = |(key, seed): &(String, u64)| -> Result<SequinReport> {
        let outcome = simulate_sequin(config, &table, simulator, key, *seed)?;
        Ok(SequinReport {
            id: key.clone(),
            outcome,
        })
    };

    let sequins = if config.threads <= 1 {
        jobs.iter().map(process).collect::<Result<Vec<_>>>()?
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()?;

        // collect keeps the order of `jobs`, whichever finishes first
        pool.install(|| jobs.par_iter().map(process).collect::<Result<Vec<_>>>())?
    };

    let mut report = RunReport::new(
        &config.mixture,
        &config.root,
        config.channel,
        config.reads,
        sequins,
    );

    if simulator.produces_paired_fastq() {
        info!("Merging the individual simulations...");
        let merged = io::merge_mate(&config.root, Mate::R1)?;
        io::merge_mate(&config.root, Mate::R2)?;
        // the merge is pass-through, so a file the counter cannot parse is not an error
        report.merged_pairs = match count_fastq_records(&merged) {
            Ok(n) => Some(n),
            Err(e) => {
                warn!("Could not count the merged read pairs: {e:#}");
                None
            }
        };
    }

    report.elapsed = now.elapsed().as_secs_f64();
    Ok(report)
}

fn simulate_sequin(
    config: &SimulationConfig,
    table: &MixtureTable,
    simulator: &impl ReadSimulator,
    key: &str,
    seed: u64,
) -> Result<SequinOutcome> {
    // whatever happens now, nothing from an earlier run may reach the merge
    io::clear_outputs(&config.root, key)?;

    let Some(record) = table.get(key) else {
        warn!("{key} not found in the mixture");
        return Ok(SequinOutcome::NotInMixture);
    };

    let abundance = record.abundance(config.channel);
    let reads = config.reads.reads_for(abundance, record.length);

    if !should_generate(reads) {
        warn!("{key} not generated: abundance {abundance} gives {reads} reads");
        return Ok(SequinOutcome::LowAbundance { reads });
    }

    info!("Generating {key}: {reads}");

    let job = SimulationJob::in_dir(&config.root, key, reads as u64, seed);
    if let Err(e) = simulator.simulate(&job) {
        warn!("Simulation failed for {key}: {e}");
        return Ok(SequinOutcome::Failed {
            reason: e.to_string(),
        });
    }

    io::copy_into(&job.out_r1, &config.root)?;
    io::copy_into(&job.out_r2, &config.root)?;

    Ok(SequinOutcome::Generated {
        reads: reads as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::SimulationErr;
    use std::sync::Mutex;

    /// Writes `reads` fake records per mate, and fails for the listed identifiers.
    #[derive(Default)]
    struct FakeSimulator {
        fail: Vec<String>,
        /// write FASTA records instead of FASTQ
        fasta: bool,
        calls: Mutex<Vec<(String, u64, u64)>>,
    }

    impl ReadSimulator for FakeSimulator {
        fn simulate(&self, job: &SimulationJob) -> Result<(), SimulationErr> {
            self.calls
                .lock()
                .unwrap()
                .push((job.id.clone(), job.reads, job.seed));

            if self.fail.contains(&job.id) {
                return Err(SimulationErr::MissingOutput(job.out_r1.clone()));
            }

            for (out, mate) in [(&job.out_r1, 1), (&job.out_r2, 2)] {
                let records: String = (0..job.reads)
                    .map(|i| match self.fasta {
                        true => format!(">{}_{i}/{mate}\nACGT\n", job.id),
                        false => format!("@{}_{i}/{mate}\nACGT\n+\nIIII\n", job.id),
                    })
                    .collect();
                fs::write(out, records)?;
            }
            Ok(())
        }
    }

    /// A working root with split sequins, plus a mixture table next to it.
    fn workspace(ids: &[&str], mixture: &str) -> (tempfile::TempDir, SimulationConfig) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("sample");

        for id in ids {
            fs::create_dir_all(root.join(id)).unwrap();
            fs::write(root.join(id).join(format!("{id}.fa")), format!(">{id}\nACGT\n")).unwrap();
        }

        let mixture_path = dir.path().join("mix.csv");
        fs::write(&mixture_path, mixture).unwrap();

        let config = SimulationConfig {
            mixture: mixture_path,
            root,
            channel: Channel::A,
            // small counts keep the fake outputs small
            reads: ReadCountParams {
                scale: 1.0,
                ..Default::default()
            },
            threads: 1,
            seed: Some(7),
        };

        (dir, config)
    }

    const MIX: &str = "id,length,A,B\nS1,1000,3,5\nS2,2000,2,0\nS3,1000,0,9\n";

    #[test]
    fn outcomes_per_sequin() {
        let (_dir, config) = workspace(&["S1", "S2", "S3", "S4"], MIX);
        let sim = FakeSimulator::default();

        let report = run(&config, &sim).unwrap();
        let outcomes: Vec<_> = report
            .sequins
            .iter()
            .map(|s| (s.id.as_str(), s.outcome.clone()))
            .collect();

        assert_eq!(
            outcomes,
            vec![
                ("S1", SequinOutcome::Generated { reads: 3 }),
                ("S2", SequinOutcome::Generated { reads: 4 }),
                ("S3", SequinOutcome::LowAbundance { reads: 0 }),
                ("S4", SequinOutcome::NotInMixture),
            ]
        );
        assert_eq!(report.merged_pairs, Some(7));
        assert_eq!(sim.calls.lock().unwrap().len(), 2);

        // nothing is produced for skipped sequins
        assert!(!config.root.join("S3.R1.fastq").exists());
        assert!(!config.root.join("S4.R1.fastq").exists());
        assert!(config.root.join("S1").join("S1.R2.fastq").exists());
        assert!(config.root.join("S1.R2.fastq").exists());
    }

    #[test]
    fn merge_is_sorted_by_identifier() {
        let (_dir, config) = workspace(&["S2", "S1"], MIX);
        run(&config, &FakeSimulator::default()).unwrap();

        let merged = fs::read_to_string(config.root.join("simulated_1.fastq")).unwrap();
        let headers: Vec<&str> = merged.lines().step_by(4).collect();
        assert_eq!(
            headers,
            vec!["@S1_0/1", "@S1_1/1", "@S1_2/1", "@S2_0/1", "@S2_1/1", "@S2_2/1", "@S2_3/1"]
        );

        let merged = fs::read_to_string(config.root.join("simulated_2.fastq")).unwrap();
        assert_eq!(merged.lines().count(), 7 * 4);
    }

    #[test]
    fn failure_does_not_stop_the_run() {
        let (_dir, config) = workspace(&["S1", "S2"], MIX);
        let sim = FakeSimulator {
            fail: vec!["S1".to_string()],
            ..Default::default()
        };

        let report = run(&config, &sim).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.generated, 1);
        assert_eq!(report.merged_pairs, Some(4));
        assert!(!config.root.join("S1.R1.fastq").exists());
    }

    #[test]
    fn unparseable_merge_is_passed_through() {
        let (_dir, config) = workspace(&["S1", "S2"], MIX);
        let sim = FakeSimulator {
            fasta: true,
            ..Default::default()
        };

        let report = run(&config, &sim).unwrap();
        assert_eq!(report.generated, 2);
        assert_eq!(report.merged_pairs, None);

        let merged = fs::read_to_string(config.root.join("simulated_1.fastq")).unwrap();
        assert_eq!(merged.lines().count(), (3 + 4) * 2);
        assert!(merged.starts_with(">S1_0/1\n"));
    }

    #[test]
    fn rerun_with_other_channel_drops_stale_outputs() {
        let (_dir, mut config) = workspace(&["S1", "S2", "S3"], MIX);
        run(&config, &FakeSimulator::default()).unwrap();
        assert!(config.root.join("S2.R1.fastq").exists());

        // S2 has no abundance in mixture B
        config.channel = Channel::B;
        let report = run(&config, &FakeSimulator::default()).unwrap();

        assert_eq!(report.sequins[1].outcome, SequinOutcome::LowAbundance { reads: 0 });
        assert_eq!(report.requested_pairs, 5 + 9);
        assert_eq!(report.merged_pairs, Some(5 + 9));
        assert!(!config.root.join("S2.R1.fastq").exists());
        assert!(!config.root.join("S2").join("S2.R2.fastq").exists());
    }

    #[test]
    fn rerun_after_failure_drops_stale_outputs() {
        let (_dir, config) = workspace(&["S1", "S2"], MIX);
        run(&config, &FakeSimulator::default()).unwrap();

        let sim = FakeSimulator {
            fail: vec!["S1".to_string()],
            ..Default::default()
        };
        let report = run(&config, &sim).unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.merged_pairs, Some(4));
        assert!(!config.root.join("S1.R1.fastq").exists());
    }

    #[cfg(unix)]
    #[test]
    fn silent_simulator_on_rerun_is_a_failure() {
        use crate::simulator::Wgsim;

        let (_dir, config) = workspace(&["S1"], MIX);
        run(&config, &FakeSimulator::default()).unwrap();

        // exits 0 and writes nothing, so the previous outputs must not count
        let sim = Wgsim {
            binary: PathBuf::from("true"),
            timeout: None,
        };
        let report = run(&config, &sim).unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.merged_pairs, Some(0));
    }

    #[test]
    fn duplicate_mixture_row_uses_last() {
        let mix = "id,length,A,B\nS1,1000,3,5\nS1,1000,6,5\n";
        let (_dir, config) = workspace(&["S1"], mix);

        let report = run(&config, &FakeSimulator::default()).unwrap();
        assert_eq!(report.sequins[0].outcome, SequinOutcome::Generated { reads: 6 });
    }

    #[test]
    fn channel_b() {
        let (_dir, mut config) = workspace(&["S1", "S3"], MIX);
        config.channel = Channel::B;

        let report = run(&config, &FakeSimulator::default()).unwrap();
        assert_eq!(report.generated, 2);
        assert_eq!(report.requested_pairs, 5 + 9);
    }

    #[test]
    fn parallel_matches_sequential() {
        let ids = ["S1", "S2", "S3", "S4"];

        let (_a, sequential) = workspace(&ids, MIX);
        let seq_sim = FakeSimulator::default();
        run(&sequential, &seq_sim).unwrap();

        let (_b, mut parallel) = workspace(&ids, MIX);
        parallel.threads = 4;
        let par_sim = FakeSimulator::default();
        run(&parallel, &par_sim).unwrap();

        let mut seq_calls = seq_sim.calls.into_inner().unwrap();
        let mut par_calls = par_sim.calls.into_inner().unwrap();
        seq_calls.sort();
        par_calls.sort();
        assert_eq!(seq_calls, par_calls);

        for name in ["simulated_1.fastq", "simulated_2.fastq"] {
            assert_eq!(
                fs::read(sequential.root.join(name)).unwrap(),
                fs::read(parallel.root.join(name)).unwrap()
            );
        }
    }

    #[test]
    fn keys_ignore_files_and_dot_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("S2")).unwrap();
        fs::create_dir(root.join("S1.v2")).unwrap();
        fs::create_dir(root.join("S1")).unwrap();
        fs::create_dir(root.join(".hidden")).unwrap();
        fs::write(root.join("S9.R1.fastq"), "").unwrap();

        assert_eq!(sequin_keys(root).unwrap(), vec!["S1", "S2"]);
    }

    #[test]
    fn malformed_mixture_aborts() {
        let (_dir, config) = workspace(&["S1"], "id,length,A,B\nS1,long,3,5\n");
        let sim = FakeSimulator::default();

        assert!(run(&config, &sim).is_err());
        assert!(sim.calls.lock().unwrap().is_empty());
    }
}
