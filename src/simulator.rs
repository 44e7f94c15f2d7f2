use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Read length of each mate.
pub const READ_LENGTH: u32 = 100;

/// Everything needed to simulate paired reads for one sequin.
#[derive(Clone, Debug)]
pub struct SimulationJob {
    pub id: String,
    pub input: PathBuf,
    pub out_r1: PathBuf,
    pub out_r2: PathBuf,
    /// Where the simulator's diagnostic output goes
    pub log: PathBuf,
    pub reads: u64,
    pub seed: u64,
}

impl SimulationJob {
    /// Lays out a job inside the sequin's own directory `<root>/<id>/`.
    pub fn in_dir(root: &Path, id: &str, reads: u64, seed: u64) -> Self {
        let dir = root.join(id);
        SimulationJob {
            id: id.to_string(),
            input: dir.join(format!("{id}.fa")),
            out_r1: dir.join(format!("{id}.R1.fastq")),
            out_r2: dir.join(format!("{id}.R2.fastq")),
            log: dir.join(format!("{id}.log")),
            reads,
            seed,
        }
    }
}

#[derive(Error, Debug)]
pub enum SimulationErr {
    #[error("could not run simulator `{binary}`: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },

    #[error("simulator exited with {status}{}", tail(.stderr))]
    Failed { status: ExitStatus, stderr: String },

    #[error("simulator did not finish within {0:?} and was killed")]
    TimedOut(Duration),

    #[error("simulator finished but did not produce {0}")]
    MissingOutput(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn tail(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(":\n{stderr}")
    }
}

/// An external tool which turns a sequence file into paired reads.
pub trait ReadSimulator: Sync {
    fn simulate(&self, job: &SimulationJob) -> Result<(), SimulationErr>;

    /// Whether the outputs are FASTQ files which can be concatenated into a single sample.
    fn produces_paired_fastq(&self) -> bool {
        true
    }
}

/// The `wgsim` short read simulator, or any binary accepting the same arguments.
pub struct Wgsim {
    pub binary: PathBuf,
    pub timeout: Option<Duration>,
}

impl Wgsim {
    /// Arguments for a job: no fragment size deviation, no outer distance, 100bp mates.
    pub fn args(&self, job: &SimulationJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-s".to_string(),
            "0".to_string(),
            "-d".to_string(),
            "0".to_string(),
            "-1".to_string(),
            READ_LENGTH.to_string(),
            "-2".to_string(),
            READ_LENGTH.to_string(),
            "-S".to_string(),
            job.seed.to_string(),
            "-N".to_string(),
            job.reads.to_string(),
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        args.push(job.input.clone().into_os_string());
        args.push(job.out_r1.clone().into_os_string());
        args.push(job.out_r2.clone().into_os_string());
        args
    }

    fn command_line(&self, job: &SimulationJob) -> String {
        std::iter::once(self.binary.as_os_str().to_owned())
            .chain(self.args(job))
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl ReadSimulator for Wgsim {
    fn simulate(&self, job: &SimulationJob) -> Result<(), SimulationErr> {
        info!("{}: {}", job.id, self.command_line(job));

        let log = File::create(&job.log)?;

        let mut child = Command::new(&self.binary)
            .args(self.args(job))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .spawn()
            .map_err(|source| SimulationErr::Spawn {
                binary: self.binary.display().to_string(),
                source,
            })?;

        let status = match self.timeout {
            None => child.wait()?,
            Some(limit) => match wait_timeout(&mut child, limit)? {
                Some(status) => status,
                None => return Err(SimulationErr::TimedOut(limit)),
            },
        };

        if !status.success() {
            return Err(SimulationErr::Failed {
                status,
                stderr: last_lines(&job.log, 5),
            });
        }

        for out in [&job.out_r1, &job.out_r2] {
            if !out.is_file() {
                return Err(SimulationErr::MissingOutput(out.clone()));
            }
        }

        Ok(())
    }
}

/// Waits for a child for at most `limit`, killing it if it runs over.
///
/// Returns `None` if the child was killed.
fn wait_timeout(child: &mut Child, limit: Duration) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }

        if start.elapsed() >= limit {
            // the child may exit between try_wait and kill
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }

        std::thread::sleep(Duration::from_millis(20));
    }
}

fn last_lines(path: &Path, n: usize) -> String {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return String::new();
    };

    let lines: Vec<&str> = contents.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
