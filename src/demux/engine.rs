//! Demultiplexer engine
//!
//! A [`DemuxStrategy`] turns a run of raw records into column writes. Two
//! strategies are provided:
//!
//! - [`DynamicDemuxer`] interprets any [`FieldDescriptorTable`], calling the
//!   extraction function each descriptor resolved when the table was built.
//! - [`StaticDemuxer`] wraps a [`StaticLayout`], whose field reads are
//!   written out by hand and monomorphized with no per-field dispatch.
//!
//! [`run`], [`run_with`] and [`run_parallel`] check a batch against the
//! output store once, then hand the strategy disjoint column windows.

use std::marker::PhantomData;

use super::store::{split_columns, ColumnSliceMut, OutputStore, BITS_PER_WORD};
use super::table::FieldDescriptorTable;
use super::types::{FieldDescriptor, TableOptions};
use crate::error::{ConfigError, ExtractionError};

/// A way of demultiplexing records into column windows
pub trait DemuxStrategy: Sync {
    /// Short label used in logs and reports
    fn name(&self) -> &'static str;

    /// Table describing the record layout and the output columns
    fn table(&self) -> &FieldDescriptorTable;

    /// Demux every record in `records` into the same index of `columns`
    ///
    /// `records` holds whole records only; `columns` is indexed by slot and
    /// every window must be at least as long as the number of records.
    fn demux_chunk(
        &self,
        records: &[u8],
        columns: &mut [ColumnSliceMut<'_>],
    ) -> Result<(), ExtractionError>;
}

/// Check column windows against a table before writing `count` records
fn check_windows(
    table: &FieldDescriptorTable,
    columns: &[ColumnSliceMut<'_>],
    count: usize,
) -> Result<(), ExtractionError> {
    for plan in table.plans() {
        let slot = plan.slot();
        let column = columns
            .get(slot)
            .ok_or(ExtractionError::MissingColumn { slot })?;
        let expected = plan.descriptor.destination.column_kind();
        if column.kind() != expected {
            return Err(ExtractionError::ColumnKindMismatch {
                slot,
                expected,
                actual: column.kind(),
            });
        }
        if column.len() < count {
            return Err(ExtractionError::NotEnoughCapacity {
                slot,
                count,
                capacity: column.len(),
            });
        }
    }
    Ok(())
}

/// Table-driven strategy for layouts only known at runtime
#[derive(Debug, Clone, Copy)]
pub struct DynamicDemuxer<'t> {
    table: &'t FieldDescriptorTable,
}

impl<'t> DynamicDemuxer<'t> {
    pub fn new(table: &'t FieldDescriptorTable) -> Self {
        Self { table }
    }
}

impl<'t> From<&'t FieldDescriptorTable> for DynamicDemuxer<'t> {
    fn from(table: &'t FieldDescriptorTable) -> Self {
        Self::new(table)
    }
}

impl DemuxStrategy for DynamicDemuxer<'_> {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    fn table(&self) -> &FieldDescriptorTable {
        self.table
    }

    fn demux_chunk(
        &self,
        records: &[u8],
        columns: &mut [ColumnSliceMut<'_>],
    ) -> Result<(), ExtractionError> {
        let record_bytes = self.table.record_bytes();
        let count = records.len() / record_bytes;
        let _span = tracing::trace_span!("dynamic_demux", records = count).entered();

        check_windows(self.table, columns, count)?;

        let plans = self.table.plans();
        for (index, record) in records.chunks_exact(record_bytes).enumerate() {
            for plan in plans {
                plan.write(record, &mut columns[plan.slot()], index);
            }
        }
        Ok(())
    }
}

/// A record layout fixed at compile time
///
/// Implementations write out every field read directly in
/// [`StaticLayout::demux_chunk`]. [`StaticLayout::descriptors`] must describe
/// the same layout so the static and table-driven paths agree bit for bit.
pub trait StaticLayout: Send + Sync + 'static {
    /// Layout name, reported on column mismatches
    const NAME: &'static str;

    /// Record size in bits
    const RECORD_BITS: u32;

    /// The same layout as a descriptor list
    fn descriptors() -> Vec<FieldDescriptor>;

    fn options() -> TableOptions {
        TableOptions::default()
    }

    /// Demux whole records into `columns`, indexed by slot
    ///
    /// Windows have already been checked for kind and length.
    fn demux_chunk(
        records: &[u8],
        columns: &mut [ColumnSliceMut<'_>],
    ) -> Result<(), ExtractionError>;
}

/// Strategy wrapping a [`StaticLayout`]
#[derive(Debug)]
pub struct StaticDemuxer<L: StaticLayout> {
    table: FieldDescriptorTable,
    _layout: PhantomData<fn() -> L>,
}

impl<L: StaticLayout> StaticDemuxer<L> {
    /// Validate the layout's descriptors and bind them to the static reader
    pub fn new() -> Result<Self, ConfigError> {
        let table =
            FieldDescriptorTable::build_with(&L::descriptors(), L::RECORD_BITS, L::options())?;
        Ok(Self {
            table,
            _layout: PhantomData,
        })
    }
}

impl<L: StaticLayout> DemuxStrategy for StaticDemuxer<L> {
    fn name(&self) -> &'static str {
        "static"
    }

    fn table(&self) -> &FieldDescriptorTable {
        &self.table
    }

    fn demux_chunk(
        &self,
        records: &[u8],
        columns: &mut [ColumnSliceMut<'_>],
    ) -> Result<(), ExtractionError> {
        let record_bytes = self.table.record_bytes();
        let count = records.len() / record_bytes;
        let _span =
            tracing::trace_span!("static_demux", layout = L::NAME, records = count).entered();

        check_windows(&self.table, columns, count)?;
        L::demux_chunk(&records[..count * record_bytes], columns)
    }
}

/// Check a batch against the store; returns the byte length of `count` records
fn check_batch(
    table: &FieldDescriptorTable,
    records: &[u8],
    count: usize,
    out: &OutputStore,
) -> Result<usize, ExtractionError> {
    if out.is_disposed() {
        return Err(ExtractionError::StoreDisposed);
    }

    let record_bytes = table.record_bytes();
    let available = records.len() / record_bytes;
    if count > available {
        return Err(ExtractionError::NotEnoughRecords { count, available });
    }

    for plan in table.plans() {
        let slot = plan.slot();
        let actual = out
            .column_kind(slot)
            .ok_or(ExtractionError::MissingColumn { slot })?;
        let expected = plan.descriptor.destination.column_kind();
        if actual != expected {
            return Err(ExtractionError::ColumnKindMismatch {
                slot,
                expected,
                actual,
            });
        }
        let capacity = out.column_len(slot);
        if capacity < count {
            return Err(ExtractionError::NotEnoughCapacity {
                slot,
                count,
                capacity,
            });
        }
    }

    Ok(count * record_bytes)
}

/// Demux `count` records with the table-driven strategy
pub fn run(
    table: &FieldDescriptorTable,
    records: &[u8],
    count: usize,
    out: &mut OutputStore,
) -> Result<(), ExtractionError> {
    run_with(&DynamicDemuxer::new(table), records, count, out)
}

/// Demux `count` records with any strategy on the calling thread
pub fn run_with<S: DemuxStrategy + ?Sized>(
    strategy: &S,
    records: &[u8],
    count: usize,
    out: &mut OutputStore,
) -> Result<(), ExtractionError> {
    let bytes = check_batch(strategy.table(), records, count, out)?;
    let mut columns = out.slices_mut(count);
    strategy.demux_chunk(&records[..bytes], &mut columns)
}

/// Records per worker, rounded up so every chunk starts on a bit-column word
fn chunk_len(count: usize, workers: usize) -> usize {
    count
        .div_ceil(workers)
        .div_ceil(BITS_PER_WORD)
        .max(1)
        * BITS_PER_WORD
}

/// Demux `count` records split across up to `workers` scoped threads
///
/// Each worker owns a disjoint record range and the matching window of every
/// column. All workers are joined before this returns.
pub fn run_parallel<S: DemuxStrategy + ?Sized>(
    strategy: &S,
    records: &[u8],
    count: usize,
    out: &mut OutputStore,
    workers: usize,
) -> Result<(), ExtractionError> {
    if workers == 0 {
        return Err(ExtractionError::NoWorkers);
    }
    let bytes = check_batch(strategy.table(), records, count, out)?;
    let record_bytes = strategy.table().record_bytes();
    let chunk = chunk_len(count, workers);

    if workers == 1 || chunk >= count {
        let mut columns = out.slices_mut(count);
        return strategy.demux_chunk(&records[..bytes], &mut columns);
    }

    let mut jobs = Vec::with_capacity(count.div_ceil(chunk));
    let mut rest_records = &records[..bytes];
    let mut rest_columns = out.slices_mut(count);
    let mut remaining = count;
    while remaining > 0 {
        let n = chunk.min(remaining);
        let (head_records, tail_records) = rest_records.split_at(n * record_bytes);
        let (head_columns, tail_columns) = split_columns(rest_columns, n);
        jobs.push((head_records, head_columns));
        rest_records = tail_records;
        rest_columns = tail_columns;
        remaining -= n;
    }

    log::debug!(
        "Parallel {} demux: {} records in {} chunks of {}",
        strategy.name(),
        count,
        jobs.len(),
        chunk
    );

    let results = crossbeam::scope(|scope| {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|(chunk_records, mut chunk_columns)| {
                scope.spawn(move |_| strategy.demux_chunk(chunk_records, &mut chunk_columns))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(Err(ExtractionError::WorkerPanicked)))
            .collect::<Vec<_>>()
    })
    .map_err(|_| ExtractionError::WorkerPanicked)?;

    results.into_iter().collect()
}
