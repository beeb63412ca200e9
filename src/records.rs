//! # Table Records
//!
//! A table's rows live in one object as an array of fixed-width records.
//! The record stride is fully determined by the column list:
//!
//! ```text
//! +---+------------+------------+----
//! | D |  column 0  |  column 1  | ...
//! +---+------------+------------+----
//!   ^    ^
//!   |    null presence byte (nullable columns only) + typed payload slot
//!   tombstone byte: 1 = deleted
//! ```
//!
//! Deleted records are reused as a free chain, so the stride is never below
//! five bytes: one tombstone byte plus a 32-bit chain link.
//!
//! [`Records`] is a cursor: [`seek`](Records::seek) loads one row into an
//! internal buffer, after which [`is_deleted`](Records::is_deleted) and the
//! typed [`get`](Records::get) read from that buffer without touching the
//! database. Seeking the row already loaded is free. Calling the accessors
//! before a successful seek is a programmer error, as is reading fields of a
//! deleted row.

use std::collections::HashMap;

use eyre::{ensure, eyre, Result};
use tracing::debug;

use crate::fields::{FieldKind, FieldParams};
use crate::object::Object;
use crate::pages::Pages;

/// Tombstone byte plus the free-chain link that reuses deleted records.
const MIN_RECORD_SIZE: usize = 1 + 4;

#[derive(Debug)]
struct FieldSlot {
    params: FieldParams,
    /// Byte offset of the slot from the start of the record.
    shift: usize,
    /// Slot width including the null presence byte, when any.
    size: usize,
}

/// Row cursor over one table's record object.
#[derive(Debug)]
pub struct Records {
    object: Object,
    fields: Vec<FieldSlot>,
    by_name: HashMap<String, u32>,
    record: Vec<u8>,
    count: u32,
    last: Option<u32>,
}

impl Records {
    /// Opens the record object at page `index` and lays `columns` over its
    /// stride. The object size must be a whole number of records.
    pub fn open(pages: &mut Pages, index: u32, columns: &[FieldParams]) -> Result<Self> {
        let (fields, by_name, stride) = layout_fields(columns)?;

        let object = Object::open(pages, index)?;
        let size = object.size();
        let count = size / stride as u64;

        ensure!(
            size % stride as u64 == 0 && count <= u64::from(u32::MAX),
            "record object {} has invalid size {} (stride {})",
            index,
            size,
            stride
        );

        debug!(object = index, records = count, stride, "opened table records");

        Ok(Self {
            object,
            fields,
            by_name,
            record: vec![0u8; stride],
            count: count as u32,
            last: None,
        })
    }

    /// Number of records, deleted ones included.
    pub fn size(&self) -> u32 {
        self.count
    }

    /// Loads record `index` into the cursor buffer. A failed read leaves the
    /// cursor unseeked; seeking the already-loaded record does nothing.
    pub fn seek(&mut self, pages: &mut Pages, index: u32) -> Result<()> {
        ensure!(
            index < self.count,
            "record {} out of range (records={})",
            index,
            self.count
        );

        if self.last == Some(index) {
            return Ok(());
        }

        // Invalidate first: if the read fails mid-way the buffer holds a torn
        // record and must not be readable.
        self.last = None;

        let stride = self.record.len() as u64;
        self.object
            .read(pages, &mut self.record, stride * u64::from(index))?;

        self.last = Some(index);

        Ok(())
    }

    /// Whether the loaded record is a tombstone. Requires a successful seek.
    pub fn is_deleted(&self) -> bool {
        assert!(
            self.last.is_some(),
            "record accessed before a successful seek"
        );

        self.record[0] == 1
    }

    /// Column index by name.
    pub fn field_index(&self, name: &str) -> Result<u32> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| eyre!("table field '{}' not found", name))
    }

    /// Typed read of column `index` from the loaded record. Returns `None`
    /// for NULL. Requires a successful seek of a non-deleted record; the
    /// marker type must match the column's declared type.
    pub fn get<K: FieldKind>(&self, index: u32) -> Result<Option<K::Value>> {
        assert!(!self.is_deleted(), "field access on a deleted record");

        let slot = self.fields.get(index as usize).ok_or_else(|| {
            eyre!(
                "field index {} out of range ({} fields)",
                index,
                self.fields.len()
            )
        })?;

        ensure!(
            slot.params.field_type == K::TYPE,
            "field '{}' is {:?}, requested as {:?}",
            slot.params.name,
            slot.params.field_type,
            K::TYPE
        );

        let mut buf = &self.record[slot.shift..slot.shift + slot.size];

        if slot.params.null_exists {
            if buf[0] == 0 {
                return Ok(None);
            }

            buf = &buf[1..];
        }

        K::decode(&slot.params, buf).map(Some)
    }
}

/// Computes per-column slots and the record stride for a column list.
fn layout_fields(
    columns: &[FieldParams],
) -> Result<(Vec<FieldSlot>, HashMap<String, u32>, usize)> {
    ensure!(
        columns.len() <= u32::MAX as usize,
        "too many table fields ({})",
        columns.len()
    );

    let mut fields = Vec::with_capacity(columns.len());
    let mut by_name = HashMap::with_capacity(columns.len());

    let mut shift = 1; // tombstone byte
    for (index, params) in columns.iter().enumerate() {
        let null_byte = usize::from(params.null_exists);
        let size = null_byte + params.field_type.slot_size(params.length);

        fields.push(FieldSlot {
            params: params.clone(),
            shift,
            size,
        });
        by_name.insert(params.name.clone(), index as u32);

        shift += size;
    }

    Ok((fields, by_name, shift.max(MIN_RECORD_SIZE)))
}
