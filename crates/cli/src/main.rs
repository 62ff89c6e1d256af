mod cli;
mod report;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use linesim_core::config::SimConfig;
use linesim_core::csvio;

use crate::cli::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Some(path) = &cli.write_template {
        std::fs::write(path, csvio::template_csv())
            .with_context(|| format!("writing template to {}", path.display()))?;
        println!("template written to {}", path.display());
        return Ok(());
    }

    let process_path = cli
        .process
        .as_ref()
        .context("--process <CSV> is required (or use --write-template to get started)")?;
    let raw = std::fs::read_to_string(process_path)
        .with_context(|| format!("reading {}", process_path.display()))?;
    let parsed = csvio::parse_process_csv(&raw)
        .with_context(|| format!("parsing {}", process_path.display()))?;
    for warning in &parsed.warnings {
        tracing::warn!("{warning}");
    }

    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<SimConfig>(&raw)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => SimConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.random_seed = Some(seed);
    }
    if cli.sequential {
        config.pipeline_mode = false;
    }
    if cli.station_constraints {
        config.station_constraint_mode = true;
    }
    for warning in config.warnings(&parsed.process) {
        tracing::warn!("{warning}");
    }

    report::print_graph_analysis(&parsed.process);

    let result = linesim_kernel::run(&config, &parsed.process)?;
    report::print_summary(&result);

    if cli.compare_no_rest {
        let baseline = linesim_kernel::run_no_rest(&config, &parsed.process)?;
        report::print_no_rest_delta(&result, &baseline);
    }

    if let Some(path) = &cli.events_out {
        let events = csvio::export_events_csv(&result.events, &result.time_mapping)?;
        std::fs::write(path, events)
            .with_context(|| format!("writing events to {}", path.display()))?;
        println!("events written to {}", path.display());
    }
    if let Some(path) = &cli.result_out {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing result to {}", path.display()))?;
        println!("result written to {}", path.display());
    }

    Ok(())
}
