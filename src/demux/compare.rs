//! Cross-checking demux strategies on one batch

use super::engine::{run_parallel, run_with, DemuxStrategy};
use super::store::OutputStore;
use crate::error::ExtractionError;

/// One strategy's output for a batch
#[derive(Debug, Clone)]
pub struct StrategyRun {
    /// Strategy name, with `xN` appended for parallel runs
    pub label: String,
    pub store: OutputStore,
}

/// Label for `strategy` run on `workers` threads
pub fn strategy_label<S: DemuxStrategy + ?Sized>(strategy: &S, workers: usize) -> String {
    if workers > 1 {
        format!("{}x{}", strategy.name(), workers)
    } else {
        strategy.name().to_string()
    }
}

/// Demux `count` records once with `strategy` into a fresh store
///
/// With `workers` above one the batch is split with [`run_parallel`].
pub fn run_once<S: DemuxStrategy + ?Sized>(
    strategy: &S,
    records: &[u8],
    count: usize,
    workers: usize,
) -> Result<StrategyRun, ExtractionError> {
    let mut store = OutputStore::allocate(strategy.table(), count);
    if workers > 1 {
        run_parallel(strategy, records, count, &mut store, workers)?;
    } else {
        run_with(strategy, records, count, &mut store)?;
    }
    let label = strategy_label(strategy, workers);
    log::debug!("{}: demuxed {} records", label, count);
    Ok(StrategyRun { label, store })
}

/// Labels of the runs whose stores differ from the first run
pub fn mismatches(runs: &[StrategyRun]) -> Vec<&str> {
    let Some((reference, rest)) = runs.split_first() else {
        return Vec::new();
    };
    rest.iter()
        .filter(|run| !run.store.bit_identical(&reference.store))
        .map(|run| run.label.as_str())
        .collect()
}
