//! Change-driven demultiplexing of a live record stream
//!
//! Batch demuxing writes every field of every record. A device that reports
//! its full state on each event mostly repeats itself, so the delta path
//! keeps the previous record, computes which bits changed, and emits a
//! [`DemuxedValue`] only for fields that touch a changed bit.

use super::table::FieldDescriptorTable;
use super::types::BITS_PER_BYTE;
use crate::error::{ExtractionError, RecordError};

/// Convert a timestamp in seconds to whole nanoseconds
///
/// Negative and NaN inputs give 0; values past `u64::MAX` nanoseconds
/// (about 584 years) saturate.
pub fn seconds_to_nanos(seconds: f64) -> u64 {
    (seconds * 1_000_000_000.0) as u64
}

/// Previous-state memory and changed-bit mask for one device
#[derive(Debug, Clone)]
pub struct ChangeTracker {
    previous: Vec<u8>,
    enabled: Vec<u8>,
    changed: Vec<u8>,
    primed: bool,
}

impl ChangeTracker {
    /// Tracker for records of `record_bytes` bytes, every bit enabled
    pub fn new(record_bytes: usize) -> Self {
        Self {
            previous: vec![0; record_bytes],
            enabled: vec![0xFF; record_bytes],
            changed: vec![0; record_bytes],
            primed: false,
        }
    }

    pub fn record_bytes(&self) -> usize {
        self.previous.len()
    }

    /// Whether a record has been observed since creation or [`reset`](Self::reset)
    pub fn is_primed(&self) -> bool {
        self.primed
    }

    /// Never report changes in bits `bit_offset..bit_offset + bit_size`
    pub fn disable_bits(&mut self, bit_offset: u32, bit_size: u32) -> Result<(), RecordError> {
        let record_bits = self.enabled.len() * BITS_PER_BYTE as usize;
        let bit_end = u64::from(bit_offset) + u64::from(bit_size);
        if bit_end > record_bits as u64 {
            return Err(RecordError::OutOfBounds {
                bit_offset,
                bit_end,
                record_bits,
            });
        }
        for bit in bit_offset as usize..bit_end as usize {
            let shift = bit % BITS_PER_BYTE as usize;
            self.enabled[bit / BITS_PER_BYTE as usize] &= !(1u8 << shift);
        }
        Ok(())
    }

    /// Re-enable every bit
    pub fn enable_all(&mut self) {
        self.enabled.fill(0xFF);
    }

    /// Forget the previous record; the next one reports every enabled bit
    pub fn reset(&mut self) {
        self.previous.fill(0);
        self.primed = false;
    }

    /// Store `record` as the current state and return the changed-bit mask
    ///
    /// Records shorter than the layout are zero padded. The first record
    /// after creation or reset marks every enabled bit as changed.
    pub fn observe(&mut self, record: &[u8]) -> Result<&[u8], ExtractionError> {
        if record.len() > self.previous.len() {
            return Err(ExtractionError::RecordTooLarge {
                expected: self.previous.len(),
                actual: record.len(),
            });
        }

        let padded = record.iter().copied().chain(std::iter::repeat(0));
        for (((changed, previous), enabled), current) in self
            .changed
            .iter_mut()
            .zip(self.previous.iter_mut())
            .zip(&self.enabled)
            .zip(padded)
        {
            *changed = if self.primed {
                (*previous ^ current) & enabled
            } else {
                *enabled
            };
            *previous = current;
        }
        self.primed = true;
        Ok(&self.changed)
    }

    /// Last observed record, zero padded
    pub fn current(&self) -> &[u8] {
        &self.previous
    }
}

/// One field value emitted because its bits changed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemuxedValue {
    /// Event time in nanoseconds
    pub timestamp: u64,
    /// Output slot of the field
    pub slot: u32,
    /// Field value converted to its destination and widened to `f32`
    pub value: f32,
}

/// Emits values for changed fields of a stream of records
#[derive(Debug, Clone)]
pub struct DeltaDemuxer<'t> {
    table: &'t FieldDescriptorTable,
    tracker: ChangeTracker,
    by_slot: Vec<usize>,
}

impl<'t> DeltaDemuxer<'t> {
    pub fn new(table: &'t FieldDescriptorTable) -> Self {
        let mut by_slot: Vec<usize> = (0..table.len()).collect();
        by_slot.sort_by_key(|&i| table.plans()[i].slot());
        Self {
            table,
            tracker: ChangeTracker::new(table.record_bytes()),
            by_slot,
        }
    }

    pub fn table(&self) -> &FieldDescriptorTable {
        self.table
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// Tracker access, for masking noisy bits
    pub fn tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }

    /// Observe one record and append a value per changed field, in slot order
    ///
    /// Returns the number of values appended.
    pub fn push_record(
        &mut self,
        time_seconds: f64,
        record: &[u8],
        out: &mut Vec<DemuxedValue>,
    ) -> Result<usize, ExtractionError> {
        let timestamp = seconds_to_nanos(time_seconds);
        self.tracker.observe(record)?;
        let changed = &self.tracker.changed;
        let state = &self.tracker.previous;
        let plans = self.table.plans();

        let before = out.len();
        for &field in &self.by_slot {
            let plan = &plans[field];
            if plan.touches(changed) {
                out.push(DemuxedValue {
                    timestamp,
                    slot: plan.descriptor.slot,
                    value: plan.decode(state).to_output_f32(plan.descriptor.destination),
                });
            }
        }
        Ok(out.len() - before)
    }
}
