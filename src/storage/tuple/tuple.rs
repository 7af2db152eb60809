use std::{fmt, sync::Arc};

use itertools::Itertools;

use crate::{
    error::SmallError,
    io::{Serializeable, SmallReader, SmallWriter},
    storage::{schema::Schema, tuple::Cell, RecordID},
    types::SmallResult,
};

/// A row of cells conforming to a schema. A tuple read from a page
/// carries the record id of its slot, a transient one carries none.
#[derive(Clone)]
pub struct Tuple {
    schema: Arc<Schema>,
    cells: Vec<Cell>,
    rid: Option<RecordID>,
}

// constructors
impl Tuple {
    pub fn new(schema: &Arc<Schema>, cells: Vec<Cell>) -> SmallResult<Self> {
        if cells.len() != schema.fields_count() {
            return Err(SmallError::SchemaMismatch(format!(
                "expect {} cells, got {}",
                schema.fields_count(),
                cells.len()
            )));
        }

        for (i, cell) in cells.iter().enumerate() {
            if !cell.conforms_to(&schema.fields[i].t) {
                return Err(SmallError::SchemaMismatch(format!(
                    "cell {} ({:?}) doesn't conform to field {}",
                    i, cell, schema.fields[i]
                )));
            }
        }

        Ok(Self {
            schema: Arc::clone(schema),
            cells,
            rid: None,
        })
    }
}

impl Tuple {
    pub fn get_schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn get_cell(&self, i: usize) -> &Cell {
        &self.cells[i]
    }

    pub fn get_cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn set_cell(&mut self, i: usize, cell: Cell) -> SmallResult {
        match self.schema.get_field_type(i) {
            Some(t) if cell.conforms_to(&t) => {
                self.cells[i] = cell;
                Ok(())
            }
            _ => Err(SmallError::SchemaMismatch(format!(
                "cell {:?} doesn't fit field {} of {}",
                cell, i, self.schema
            ))),
        }
    }

    pub fn get_record_id(&self) -> Option<RecordID> {
        self.rid
    }

    pub(crate) fn set_record_id(&mut self, rid: Option<RecordID>) {
        self.rid = rid;
    }
}

impl Serializeable for Tuple {
    type Reference = Arc<Schema>;

    fn encode(&self, writer: &mut SmallWriter, schema: &Arc<Schema>) -> SmallResult {
        for (cell, field) in self.cells.iter().zip(schema.get_fields()) {
            cell.encode(writer, &field.t)?;
        }
        Ok(())
    }

    fn decode(reader: &mut SmallReader, schema: &Arc<Schema>) -> SmallResult<Self> {
        let mut cells: Vec<Cell> = Vec::with_capacity(schema.fields_count());
        for field in schema.get_fields() {
            cells.push(Cell::decode(reader, &field.t)?);
        }

        Ok(Self {
            schema: Arc::clone(schema),
            cells,
            rid: None,
        })
    }
}

/// Tuples are equal if their values are equal, the record id is not
/// considered.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.cells == other.cells
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.cells.iter().join("\t"))
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.rid {
            Some(rid) => write!(f, "{{{}}} @ {}#{}", self, rid.pid, rid.slot_index),
            None => write!(f, "{{{}}}", self),
        }
    }
}
