use std::path::PathBuf;

use clap::builder::styling::AnsiColor;
use clap::builder::Styles;
use clap::Parser;

use crate::preset::Mode;

const fn extra_build_info() -> &'static str {
    match option_env!("CARGO_BUILD_DESC") {
        Some(e) => e,
        None => env!("CARGO_PKG_VERSION"),
    }
}
pub const VERSION: &str = extra_build_info();
const INFO_STRING: &str = "
🧬 sequinsim version ";
const AFTER_STRING: &str = "
   ──────────────────────────────────
   simulated paired-end reads for sequin mixtures";

// colouring of the help
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().bold())
    .usage(AnsiColor::BrightMagenta.on_default().bold())
    .literal(AnsiColor::BrightMagenta.on_default())
    .placeholder(AnsiColor::White.on_default());

#[derive(Parser)]
#[command(
    version = VERSION,
    about = format!("{}{}{}", INFO_STRING, VERSION, AFTER_STRING),
    arg_required_else_help = true,
    styles = STYLES
)]
pub struct Cli {
    /// which sequins to simulate
    #[arg(value_enum, ignore_case = true)]
    pub mode: Mode,

    /// the sequin .fa, two lines per record. defaults to the mode's standard sequins
    #[arg(long)]
    pub sequins: Option<PathBuf>,

    /// the mixture table (id, length, mixA, mixB). defaults to the mode's standard mixture
    #[arg(long)]
    pub mixture: Option<PathBuf>,

    /// directory in which the sample directories are created
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,

    /// the paired read simulator, called with wgsim's arguments
    #[arg(long, default_value = "wgsim")]
    pub simulator: PathBuf,

    /// the number of sequins to simulate at once
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub threads: u16,

    /// seed for the simulator seeds, for a reproducible run
    #[arg(long)]
    pub seed: Option<u64>,

    /// kill a simulator invocation which runs for longer than this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// write a report.json summarising each sample into its directory
    #[arg(long, action)]
    pub report: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["sequinsim", "RNA"]).unwrap();
        assert_eq!(cli.mode, Mode::Rna);
        assert_eq!(cli.threads, 1);
        assert_eq!(cli.simulator, PathBuf::from("wgsim"));
        assert_eq!(cli.out_dir, PathBuf::from("."));
        assert!(cli.seed.is_none() && cli.timeout.is_none() && !cli.report);
    }

    #[test]
    fn unknown_mode() {
        assert!(Cli::try_parse_from(["sequinsim", "DNA"]).is_err());
    }

    #[test]
    fn zero_threads_rejected() {
        assert!(Cli::try_parse_from(["sequinsim", "META", "-t", "0"]).is_err());
    }

    #[test]
    fn verify() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
