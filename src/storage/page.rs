use std::{fmt, sync::Arc};

use bit_vec::BitVec;

use crate::{
    error::SmallError,
    io::{Serializeable, SmallReader, SmallWriter},
    storage::{schema::Schema, tuple::Tuple, PageID, RecordID},
    transaction::{Transaction, TransactionID},
    types::SmallResult,
    utils::{ceil_div, floor_div},
};

/// A slotted page of a heap file.
///
/// # Format
///
/// - header: `ceil(slot_count / 8)` bytes, one bit per slot, LSB-first
///   within each byte, 1 means the slot is used
/// - `slot_count` slots of `schema.get_size()` bytes each, the encoded
///   tuple if used or zeros otherwise
/// - zero padding to the page size
///
/// where `slot_count = floor(page_size * 8 / (tuple_size * 8 + 1))`.
pub struct HeapPage {
    pid: PageID,
    schema: Arc<Schema>,
    page_size: usize,

    slot_count: usize,
    header_size: usize,

    // Every bit of the header bytes, including the unused bits after the
    // last slot, so the header is written back verbatim.
    header: BitVec,

    // one entry per slot, None for empty slots
    tuples: Vec<Option<Tuple>>,

    // the transaction that last dirtied this page, None if the page is clean
    dirty_tx: Option<TransactionID>,

    // page content at the last load or flush, used to roll back
    before_image: Vec<u8>,
}

impl HeapPage {
    /// Decode a page from its on-disk bytes. The page size is the length
    /// of `bytes`.
    pub fn new(pid: &PageID, bytes: &[u8], schema: &Arc<Schema>) -> SmallResult<Self> {
        let page_size = bytes.len();
        let tuple_size = schema.get_size();
        let slot_count = Self::calculate_slots_count(schema, page_size);
        let header_size = Self::calculate_header_size(slot_count);

        let mut reader = SmallReader::new(bytes);
        let header_bytes = reader.read_exact(header_size)?;
        let header = BitVec::from_fn(header_size * 8, |i| (header_bytes[i / 8] >> (i % 8)) & 1 == 1);

        let mut tuples = Vec::with_capacity(slot_count);
        for slot_index in 0..slot_count {
            if !header[slot_index] {
                reader.skip(tuple_size)?;
                tuples.push(None);
                continue;
            }

            let mut tuple = Tuple::decode(&mut reader, schema)?;
            tuple.set_record_id(Some(RecordID::new(*pid, slot_index)));
            tuples.push(Some(tuple));
        }

        let mut page = Self {
            pid: *pid,
            schema: Arc::clone(schema),
            page_size,
            slot_count,
            header_size,
            header,
            tuples,
            dirty_tx: None,
            before_image: Vec::new(),
        };
        page.set_before_image()?;
        Ok(page)
    }

    /// Bytes of a page without any tuple, used to append new pages to a
    /// heap file.
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0; page_size]
    }

    /// Retrieve the maximum number of tuples a page can hold.
    pub fn calculate_slots_count(schema: &Schema, page_size: usize) -> usize {
        let bits_per_tuple_including_header = schema.get_size() * 8 + 1;
        floor_div(page_size * 8, bits_per_tuple_including_header)
    }

    /// Number of bytes of the header bitmap.
    pub fn calculate_header_size(slot_count: usize) -> usize {
        ceil_div(slot_count, 8)
    }
}

impl HeapPage {
    pub fn get_pid(&self) -> PageID {
        self.pid
    }

    pub fn get_schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn get_page_size(&self) -> usize {
        self.page_size
    }

    pub fn get_slots_count(&self) -> usize {
        self.slot_count
    }

    /// Returns true if associated slot on this page is filled.
    pub fn is_slot_used(&self, slot_index: usize) -> bool {
        slot_index < self.slot_count && self.header[slot_index]
    }

    fn mark_slot_status(&mut self, slot_index: usize, used: bool) {
        self.header.set(slot_index, used);
    }

    pub fn empty_slots_count(&self) -> usize {
        (0..self.slot_count)
            .filter(|i| !self.is_slot_used(*i))
            .count()
    }

    /// Returns the number of tuples currently stored on this page
    pub fn tuples_count(&self) -> usize {
        self.slot_count - self.empty_slots_count()
    }

    pub fn get_tuple(&self, slot_index: usize) -> Option<&Tuple> {
        self.tuples.get(slot_index).and_then(|t| t.as_ref())
    }

    /// Store the tuple in the lowest free slot and assign the record id of
    /// that slot to it.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> SmallResult {
        if **tuple.get_schema() != *self.schema {
            return Err(SmallError::SchemaMismatch(format!(
                "tuple schema {} differs from page schema {}",
                tuple.get_schema(),
                self.schema
            )));
        }

        let slot_index = (0..self.slot_count)
            .find(|i| !self.is_slot_used(*i))
            .ok_or(SmallError::PageFull(self.pid))?;

        tuple.set_record_id(Some(RecordID::new(self.pid, slot_index)));
        self.mark_slot_status(slot_index, true);
        self.tuples[slot_index] = Some(tuple.clone());
        Ok(())
    }

    /// Free the slot of the tuple. The caller keeps its copy, whose record
    /// id no longer points at a stored tuple.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> SmallResult {
        let rid = tuple.get_record_id().ok_or_else(|| {
            SmallError::TupleNotFound(format!("tuple {:?} has no record id", tuple))
        })?;

        if rid.pid != self.pid {
            return Err(SmallError::TupleNotFound(format!(
                "tuple {:?} is not on page {}",
                tuple, self.pid
            )));
        }

        if !self.is_slot_used(rid.slot_index) {
            return Err(SmallError::TupleNotFound(format!(
                "slot {} of page {} is empty",
                rid.slot_index, self.pid
            )));
        }

        self.mark_slot_status(rid.slot_index, false);
        self.tuples[rid.slot_index] = None;
        Ok(())
    }

    /// Record the transaction that dirtied this page.
    pub fn mark_dirty(&mut self, tx: &Transaction) {
        self.dirty_tx = Some(tx.get_id());
    }

    pub fn mark_clean(&mut self) {
        self.dirty_tx = None;
    }

    /// Returns the transaction that last dirtied this page, or None if the
    /// page is clean.
    pub fn is_dirty(&self) -> Option<TransactionID> {
        self.dirty_tx
    }

    /// Serialize the page, the result can be passed to `HeapPage::new` to
    /// get an identical page.
    pub fn get_page_data(&self) -> SmallResult<Vec<u8>> {
        let tuple_size = self.schema.get_size();
        let mut writer = SmallWriter::new_reserved(self.page_size);

        writer.write_bytes(&self.header_bytes());

        for slot_index in 0..self.slot_count {
            match (self.is_slot_used(slot_index), &self.tuples[slot_index]) {
                (true, Some(tuple)) => tuple.encode(&mut writer, &self.schema)?,
                _ => writer.write_zeros(tuple_size),
            }
        }

        writer.into_padded_bytes(self.page_size)
    }

    fn header_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.header_size];
        for (i, used) in self.header.iter().enumerate() {
            if used {
                bytes[i / 8] |= 1 << (i % 8);
            }
        }
        bytes
    }

    /// Capture the current content as the rollback image.
    pub fn set_before_image(&mut self) -> SmallResult {
        self.before_image = self.get_page_data()?;
        Ok(())
    }

    /// A new page built from the last captured image.
    pub fn get_before_image(&self) -> SmallResult<HeapPage> {
        HeapPage::new(&self.pid, &self.before_image, &self.schema)
    }

    /// Iterate over the used slots in increasing slot order. Call it again
    /// to restart.
    pub fn iter(&self) -> HeapPageIterator<'_> {
        HeapPageIterator::new(self)
    }
}

impl fmt::Debug for HeapPage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "HeapPage {{ pid: {}, slots: {}/{}, dirty: {:?}, header: {} }}",
            self.pid,
            self.tuples_count(),
            self.slot_count,
            self.dirty_tx,
            hex::encode(self.header_bytes()),
        )
    }
}

pub struct HeapPageIterator<'page> {
    page: &'page HeapPage,
    cursor: usize,
}

impl<'page> HeapPageIterator<'page> {
    pub fn new(page: &'page HeapPage) -> Self {
        Self { page, cursor: 0 }
    }
}

impl<'page> Iterator for HeapPageIterator<'page> {
    type Item = &'page Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.page.slot_count {
            let slot_index = self.cursor;
            self.cursor += 1;
            if self.page.is_slot_used(slot_index) {
                return self.page.get_tuple(slot_index);
            }
        }
        None
    }
}
