// mod.rs - Record demultiplexer

//! Fixed-layout binary record demultiplexer.
//!
//! Raw device records arrive as contiguous fixed-size byte blocks. A
//! [`FieldDescriptorTable`] says where each field lives and how it is
//! encoded; the engine reads every field of every record and scatters it
//! into one densely packed column per field of an [`OutputStore`].
//!
//! # Architecture
//!
//! - `types` - Descriptors, encodings and table options
//! - `bits` - Bit and byte slicing over raw records
//! - `extract` - Per-field extraction functions and the dispatch table
//! - `table` - Validated descriptor tables
//! - `store` - Structure-of-arrays output columns
//! - `engine` - Static and dynamic strategies, batch and parallel runs
//! - `delta` - Change-driven demuxing of a live record stream
//! - `records` - Record batches and a reference encoder
//! - `compare` - Running strategies side by side and checking they agree
//!
//! # Example
//!
//! ```rust
//! use input_demux::demux::{run, FieldDescriptor, FieldDescriptorTable, OutputStore};
//!
//! let table = FieldDescriptorTable::build(
//!     &[FieldDescriptor::float32(0, 0), FieldDescriptor::flag(32, 1)],
//!     40,
//! )
//! .unwrap();
//!
//! let mut records = vec![0u8; 5 * 2];
//! records[5..9].copy_from_slice(&2.5f32.to_ne_bytes());
//! records[9] = 1;
//!
//! let mut out = OutputStore::allocate(&table, 2);
//! run(&table, &records, 2, &mut out).unwrap();
//! assert_eq!(out.floats(0).unwrap()[1], 2.5);
//! assert_eq!(out.bools(1).unwrap().get(1), Some(true));
//! ```

pub mod bits;
pub mod compare;
pub mod delta;
pub mod engine;
pub mod extract;
pub mod records;
pub mod store;
pub mod table;
pub mod types;

pub use compare::{mismatches, run_once, strategy_label, StrategyRun};
pub use delta::{seconds_to_nanos, ChangeTracker, DeltaDemuxer, DemuxedValue};
pub use engine::{
    run, run_parallel, run_with, DemuxStrategy, DynamicDemuxer, StaticDemuxer, StaticLayout,
};
pub use extract::{FieldPlan, Sample};
pub use records::{RecordBuffer, RecordWriter};
pub use store::{BitColumn, BitsMut, Column, ColumnSliceMut, ColumnView, OutputStore};
pub use table::FieldDescriptorTable;
pub use types::{
    ByteOrder, ColumnKind, DestinationEncoding, FieldDescriptor, RangePolicy, SourceEncoding,
    TableOptions,
};
