use anyhow::{Context, Result};
use clap::Parser;

use input_demux::cli::Cli;
use input_demux::config::{self, CheckOptions, StrategyChoice};
use input_demux::demux::{
    mismatches, run_once, DemuxStrategy, DynamicDemuxer, RecordBuffer, StaticDemuxer,
};
use input_demux::layout::{mouse_layout, MouseLayout};
use input_demux::logging::init_logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let options = cli.merge_into_options(CheckOptions::default())?;
    init_logging(options.log_level).context("Failed to install logger")?;

    let (layout, table) = config::select_layout(&options)?;
    log::info!(
        "Layout '{}': {} fields, {}-byte records",
        layout.name,
        table.len(),
        table.record_bytes()
    );

    let count = options.records;
    let records = RecordBuffer::synthetic(&table, count, options.seed)
        .context("Failed to generate synthetic records")?;
    log::info!(
        "Generated {} records ({} bytes)",
        records.len(),
        records.as_bytes().len()
    );

    let static_mouse = if layout == mouse_layout() {
        Some(StaticDemuxer::<MouseLayout>::new().context("Built-in mouse layout is invalid")?)
    } else {
        None
    };
    let dynamic = DynamicDemuxer::new(&table);
    let dynamic: &dyn DemuxStrategy = &dynamic;

    let wants = |choice: StrategyChoice| {
        options.strategy == StrategyChoice::All || options.strategy == choice
    };
    let mut selected: Vec<(&dyn DemuxStrategy, usize)> = Vec::new();
    if wants(StrategyChoice::Static) {
        match &static_mouse {
            Some(demuxer) => selected.push((demuxer as &dyn DemuxStrategy, 1)),
            None if options.strategy == StrategyChoice::Static => {
                anyhow::bail!("No static implementation for layout '{}'", layout.name)
            }
            None => log::warn!("No static implementation for '{}', skipping", layout.name),
        }
    }
    if wants(StrategyChoice::Dynamic) {
        selected.push((dynamic, 1));
    }
    if wants(StrategyChoice::Parallel) {
        selected.push((dynamic, options.workers));
    }

    let mut runs = Vec::with_capacity(selected.len());
    for (strategy, workers) in selected {
        let run = run_once(strategy, records.as_bytes(), count, workers)
            .with_context(|| format!("{} demux failed", strategy.name()))?;
        println!("{:<12} {} records", run.label, count);
        runs.push(run);
    }

    let differing = mismatches(&runs);
    if !differing.is_empty() {
        anyhow::bail!(
            "{} output differs from {}",
            differing.join(", "),
            runs[0].label
        );
    }
    if let Some(reference) = runs.first() {
        println!("{}: all outputs identical to {}", layout.name, reference.label);
    }
    Ok(())
}
