use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use itertools::Itertools;

/// One side of a read pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mate {
    R1,
    R2,
}

impl Mate {
    /// Suffix of the per-sequin output files, e.g. `R1_1.R1.fastq`
    pub fn suffix(&self) -> &'static str {
        match self {
            Mate::R1 => ".R1.fastq",
            Mate::R2 => ".R2.fastq",
        }
    }

    /// Name of the merged sample file in the working root
    pub fn merged_name(&self) -> &'static str {
        match self {
            Mate::R1 => "simulated_1.fastq",
            Mate::R2 => "simulated_2.fastq",
        }
    }
}

/// Copies `file` into `dir` under the same file name, overwriting any existing copy.
pub fn copy_into(file: &Path, dir: &Path) -> Result<PathBuf> {
    let name = file
        .file_name()
        .with_context(|| format!("{} has no file name", file.display()))?;
    let dest = dir.join(name);

    fs::copy(file, &dest)
        .with_context(|| format!("Unable to copy {} to {}", file.display(), dest.display()))?;
    debug!("Copied {} to {}", file.display(), dest.display());

    Ok(dest)
}

/// Removes the outputs of an earlier run for sequin `id`: the copies in `root` and the
/// simulator's files in `<root>/<id>/`.
pub fn clear_outputs(root: &Path, id: &str) -> Result<()> {
    for mate in [Mate::R1, Mate::R2] {
        let name = format!("{id}{}", mate.suffix());
        for path in [root.join(&name), root.join(id).join(&name)] {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed stale {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("Unable to remove {}", path.display()))
                }
            }
        }
    }
    Ok(())
}

/// Lists the per-sequin outputs for `mate` directly inside `root`, sorted by file name.
pub fn paired_outputs(root: &Path, mate: Mate) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(root).with_context(|| format!("Unable to list {}", root.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(mate.suffix()));

        if matches && path.is_file() {
            paths.push(path);
        }
    }

    Ok(paths.into_iter().sorted().collect())
}

/// Writes the contents of every file in `sources`, in order, into `dest`.
///
/// # Returns
///
/// The number of bytes written.
pub fn concatenate(sources: &[PathBuf], dest: &Path) -> Result<u64> {
    let out = File::create(dest).with_context(|| format!("Unable to create {}", dest.display()))?;
    let mut writer = BufWriter::new(out);

    let mut total = 0;
    for source in sources {
        let mut file =
            File::open(source).with_context(|| format!("Unable to open {}", source.display()))?;
        total += std::io::copy(&mut file, &mut writer)
            .with_context(|| format!("Unable to append {}", source.display()))?;
    }

    writer.flush()?;
    Ok(total)
}

/// Merges all per-sequin outputs of `mate` in `root` into the sample file for that mate.
pub fn merge_mate(root: &Path, mate: Mate) -> Result<PathBuf> {
    let sources = paired_outputs(root, mate)?;
    let dest = root.join(mate.merged_name());

    let bytes = concatenate(&sources, &dest)?;
    info!(
        "Merged {} files into {} ({} bytes)",
        sources.len(),
        dest.display(),
        bytes
    );

    Ok(dest)
}
