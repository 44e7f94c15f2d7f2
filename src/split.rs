use std::fs::{self, File};
use std::io::prelude::*;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Derives a sequin identifier from a FASTA header line, removing every `>` and `?` and the
/// line ending.
pub fn identifier_from_header(header: &str) -> String {
    header
        .trim_end_matches(['\n', '\r'])
        .chars()
        .filter(|c| *c != '>' && *c != '?')
        .collect()
}

/// Path of the split FASTA for `id` beneath `root`, i.e. `<root>/<id>/<id>.fa`.
pub fn sequin_fasta(root: &Path, id: &str) -> PathBuf {
    root.join(id).join(format!("{id}.fa"))
}

/// Splits a two-line-per-record FASTA file into one directory per record.
///
/// Each record is written verbatim to `<output_root>/<id>/<id>.fa`, overwriting any existing
/// file. An identifier line without a following sequence line is dropped.
///
/// # Returns
///
/// The identifiers written, in input order.
///
/// # Errors
///
/// Returns an error if the input cannot be read, or a directory or file cannot be created.
pub fn split_sequins(input: impl AsRef<Path>, output_root: impl AsRef<Path>) -> Result<Vec<String>> {
    let input = input.as_ref();
    let output_root = output_root.as_ref();

    let file = File::open(input)
        .with_context(|| format!("Unable to open sequin file {}", input.display()))?;
    let mut reader = BufReader::new(file);

    fs::create_dir_all(output_root)
        .with_context(|| format!("Unable to create directory {}", output_root.display()))?;

    let mut written = Vec::new();
    let mut header = String::new();
    let mut sequence = String::new();

    loop {
        header.clear();
        sequence.clear();

        reader
            .read_line(&mut header)
            .with_context(|| format!("Unable to read {}", input.display()))?;
        let n = reader
            .read_line(&mut sequence)
            .with_context(|| format!("Unable to read {}", input.display()))?;
        if n == 0 {
            break;
        }

        let id = identifier_from_header(&header);
        if id.is_empty() {
            warn!("Skipping record with an empty identifier: `{}`", header.trim_end());
            continue;
        }

        let dir = output_root.join(&id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Unable to create directory {}", dir.display()))?;

        let path = sequin_fasta(output_root, &id);
        let mut out = File::create(&path)
            .with_context(|| format!("Unable to create {}", path.display()))?;
        out.write_all(header.as_bytes())?;
        out.write_all(sequence.as_bytes())?;

        debug!("Wrote {}", path.display());
        written.push(id);
    }

    info!(
        "Split {} sequins from {} into {}",
        written.len(),
        input.display(),
        output_root.display()
    );

    Ok(written)
}
