use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
};

use crate::{error::SmallError, types::SmallResult};

pub struct SmallFile {
    file: File,
}

impl SmallFile {
    /// Open the file at the given path with read and write mode.
    ///
    /// If the file doesn't exist, it will be created. Existing content
    /// is kept.
    pub fn new<P: AsRef<Path>>(file_path: P) -> SmallResult<Self> {
        let file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .open(file_path)?;

        Ok(Self { file })
    }

    pub fn get_size(&self) -> SmallResult<u64> {
        let metadata = self.file.metadata()?;
        Ok(metadata.len())
    }

    /// Read `len` bytes starting at `offset`. Bytes past the end of the
    /// file are returned as zeros.
    pub fn read_at(&mut self, offset: u64, len: usize) -> SmallResult<Vec<u8>> {
        self.file.seek(SeekFrom::Start(offset))?;

        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = self.file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(buf)
    }

    /// Write the bytes at `offset` and sync them to the device before
    /// returning.
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> SmallResult {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        self.file.sync_data()?;
        Ok(())
    }
}

pub struct SmallWriter {
    buf: Vec<u8>,
}

impl SmallWriter {
    /// Create a new `SmallWriter` with an empty buffer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Create a new `SmallWriter` with a buffer of the given capacity.
    pub fn new_reserved(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_zeros(&mut self, count: usize) {
        self.buf.resize(self.buf.len() + count, 0);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Pad the buffer with zeros to the given size and hand it out.
    pub fn into_padded_bytes(mut self, size: usize) -> SmallResult<Vec<u8>> {
        if self.buf.len() > size {
            return Err(SmallError::Corrupted(format!(
                "buffer size is larger than the given size: {} > {}",
                self.buf.len(),
                size
            )));
        }

        self.buf.resize(size, 0);
        Ok(self.buf)
    }
}

pub struct SmallReader<'a> {
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> SmallReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, cursor: 0 }
    }

    pub fn read_exact(&mut self, bytes_count: usize) -> SmallResult<&'a [u8]> {
        let start = self.cursor;
        let end = self.cursor + bytes_count;

        // boundary check
        if end > self.buf.len() {
            return Err(SmallError::Corrupted(format!(
                "read out of boundary: {}..{} of {}",
                start,
                end,
                self.buf.len()
            )));
        }

        self.cursor = end;
        Ok(&self.buf[start..end])
    }

    pub fn skip(&mut self, bytes_count: usize) -> SmallResult {
        self.read_exact(bytes_count).map(|_| ())
    }

    pub fn position(&self) -> usize {
        self.cursor
    }
}

/// Fixed-width (de)serialization. `Reference` is whatever the decoder
/// needs to know about the layout, e.g. the field type of a cell.
pub trait Serializeable: Sized {
    type Reference: ?Sized;

    fn encode(&self, writer: &mut SmallWriter, reference: &Self::Reference) -> SmallResult;

    fn decode(reader: &mut SmallReader, reference: &Self::Reference) -> SmallResult<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_boundary() {
        let bytes = vec![1, 2, 3];
        let mut reader = SmallReader::new(&bytes);
        assert_eq!(reader.read_exact(2).unwrap(), &[1, 2]);
        assert!(reader.read_exact(2).is_err());
        reader.skip(1).unwrap();
        assert_eq!(reader.position(), 3);
    }

    #[test]
    fn test_padded_bytes() {
        let mut writer = SmallWriter::new_reserved(8);
        writer.write_bytes(&[7, 7]);
        writer.write_zeros(1);
        assert_eq!(writer.len(), 3);
        assert_eq!(writer.into_padded_bytes(5).unwrap(), vec![7, 7, 0, 0, 0]);

        let mut writer = SmallWriter::new();
        writer.write_bytes(&[1, 2, 3]);
        assert!(writer.into_padded_bytes(2).is_err());
    }

    #[test]
    fn test_file_read_past_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = SmallFile::new(dir.path().join("data")).unwrap();
        file.write_at(0, &[9, 9, 9]).unwrap();
        assert_eq!(file.get_size().unwrap(), 3);
        assert_eq!(file.read_at(1, 4).unwrap(), vec![9, 9, 0, 0]);
    }
}
