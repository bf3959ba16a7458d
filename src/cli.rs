use std::path::PathBuf;

use crate::config::{parse_record_count, parse_strategy, parse_workers};
use crate::config::CheckOptions;
use crate::logging::LogLevel;
use anyhow::{Context, Result};
use clap::Parser;

/// Runs the static, table-driven and parallel strategies on one batch
#[derive(Parser, Debug, Default)]
#[command(name = "demux-check")]
#[command(version)]
#[command(about = "Check that record demultiplexing strategies agree", long_about = None)]
pub struct Cli {
    /// Records per batch (accepts k/M suffixes, e.g. 250k)
    #[arg(short, long, value_name = "COUNT")]
    pub records: Option<String>,

    /// Worker threads for the parallel run (number or "auto")
    #[arg(short, long, value_name = "N")]
    pub workers: Option<String>,

    /// Strategies to run (all, static, dynamic, parallel)
    #[arg(short, long, value_name = "STRATEGY")]
    pub strategy: Option<String>,

    /// Built-in layout (mouse, gamepad)
    #[arg(short, long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Layout file to check instead of a preset
    #[arg(short, long, value_name = "FILE")]
    pub layout: Option<PathBuf>,

    /// Seed for the synthetic records
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Log verbosity (0 = nothing ... 6 = everything)
    #[arg(short = 'v', long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<i32>,
}

impl Cli {
    /// Merge CLI arguments into the options struct
    pub fn merge_into_options(&self, mut opts: CheckOptions) -> Result<CheckOptions> {
        if let Some(ref records) = self.records {
            opts.records = parse_record_count(records).context("Invalid --records value")?;
        }

        if let Some(ref workers) = self.workers {
            opts.workers = parse_workers(workers)?;
        }

        if let Some(ref strategy) = self.strategy {
            opts.strategy = parse_strategy(strategy)?;
        }

        if let Some(ref preset) = self.preset {
            opts.preset = preset.to_lowercase();
        }

        if let Some(ref layout) = self.layout {
            opts.layout_file = Some(layout.clone());
        }

        if let Some(seed) = self.seed {
            opts.seed = seed;
        }

        if let Some(level) = self.log_level {
            opts.log_level = LogLevel::from_i32(level);
        }

        Ok(opts)
    }
}
