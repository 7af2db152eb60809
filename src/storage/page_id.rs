use std::fmt;

/// PageID identifies a unique page within one heap file.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct PageID {
    pub table_id: u32,

    /// page_index represents the position of the page in
    /// the table, start from 0
    pub page_index: u32,
}

impl PageID {
    pub fn new(table_id: u32, page_index: u32) -> Self {
        Self {
            table_id,
            page_index,
        }
    }

    pub fn get_table_id(&self) -> u32 {
        self.table_id
    }

    pub fn get_short_repr(&self) -> String {
        format!("page_{}", self.page_index)
    }
}

impl fmt::Display for PageID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}_{}", self.table_id, self.page_index)
    }
}

impl fmt::Debug for PageID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// Location of a stored tuple: the page and the slot inside it.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct RecordID {
    pub pid: PageID,
    pub slot_index: usize,
}

impl RecordID {
    pub fn new(pid: PageID, slot_index: usize) -> Self {
        Self { pid, slot_index }
    }
}
