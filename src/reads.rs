use anyhow::{ensure, Result};
use serde::Serialize;

/// Parameters turning an abundance into a number of read pairs.
///
/// Abundances are expressed per 1000 bases, so the clamped abundance is scaled by the sequin
/// length to keep coverage comparable between long and short sequins.
#[derive(Serialize, Copy, Clone, Debug, PartialEq)]
pub struct ReadCountParams {
    pub scale: f64,
    pub addend: f64,
    pub floor: f64,
    /// `None` is unbounded
    pub ceiling: Option<f64>,
}

impl Default for ReadCountParams {
    fn default() -> Self {
        ReadCountParams {
            scale: 50.0,
            addend: 0.0,
            floor: 0.0,
            ceiling: None,
        }
    }
}

impl ReadCountParams {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.scale.is_finite() && self.addend.is_finite() && self.floor.is_finite(),
            "read count scale, addend and floor must be finite numbers"
        );
        if let Some(ceiling) = self.ceiling {
            ensure!(
                ceiling >= self.floor,
                "read count ceiling {ceiling} is below the floor {}",
                self.floor
            );
        }
        Ok(())
    }

    pub fn reads_for(&self, abundance: f64, length: f64) -> i64 {
        compute_reads(
            abundance,
            length,
            self.scale,
            self.addend,
            self.floor,
            self.ceiling,
        )
    }
}

/// Computes the number of read pairs to simulate for a sequin.
///
/// `addend + scale * abundance` is clamped to `[floor, ceiling]`, multiplied by
/// `length / 1000` and truncated toward zero.
pub fn compute_reads(
    abundance: f64,
    length: f64,
    scale: f64,
    addend: f64,
    floor: f64,
    ceiling: Option<f64>,
) -> i64 {
    let raw = addend + scale * abundance;
    let clamped = floor.max(ceiling.map_or(raw, |c| c.min(raw)));
    let adjusted = clamped * (length / 1000.0);

    adjusted.trunc() as i64
}

/// Whether a read count is worth handing to the simulator.
pub fn should_generate(reads: i64) -> bool {
    reads > 1
}
