extern crate env_logger;
#[macro_use]
extern crate log;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

mod cli;
mod io;
mod mixture;
mod preset;
mod reads;
mod simulate;
mod simulator;
mod split;
mod summary;

use cli::Cli;
use simulate::SimulationConfig;
use simulator::Wgsim;

fn try_main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    let cli = Cli::parse();

    info!("sequinsim v{}", cli::VERSION);

    let sequins = cli
        .sequins
        .clone()
        .unwrap_or_else(|| PathBuf::from(cli.mode.default_sequins()));
    let mixture = cli
        .mixture
        .clone()
        .unwrap_or_else(|| PathBuf::from(cli.mode.default_mixture()));

    let simulator = Wgsim {
        binary: cli.simulator.clone(),
        timeout: cli.timeout.map(Duration::from_secs),
    };

    for (i, plan) in cli
        .mode
        .plans(&sequins, &mixture, &cli.out_dir)
        .into_iter()
        .enumerate()
    {
        info!("------------------ {} ------------------", plan.root.display());

        split::split_sequins(&plan.sequins, &plan.root)?;

        let config = SimulationConfig {
            mixture: plan.mixture,
            root: plan.root,
            channel: plan.channel,
            reads: plan.reads,
            threads: cli.threads as usize,
            // every replicate gets its own stream of simulator seeds
            seed: cli.seed.map(|s| s.wrapping_add(i as u64)),
        };

        let report = simulate::run(&config, &simulator)?;
        report.log_totals();

        if cli.report {
            report.write_json(&config.root.join("report.json"))?;
        }
    }

    info!("Completed successfully.");
    Ok(())
}

fn main() {
    if let Err(err) = try_main() {
        error!("{}", err);

        // report any errors that are produced
        err.chain()
            .skip(1)
            .for_each(|cause| error!("  because: {}", cause));

        std::process::exit(1);
    }
}
