use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

/// Failures surfaced by the snapshot stream primitives.
///
/// Truncation is deliberately its own variant: a read that comes up short is
/// the one unrecoverable condition for a restore, while a zero-length prefix
/// is an ordinary empty field and never an error.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("snapshot stream ended mid-field")]
    Truncated,
    #[error("snapshot stream I/O failure: {0}")]
    Io(#[from] io::Error),
    #[error("field is {len} bytes, larger than its {limit}-byte length prefix allows")]
    FieldTooLong { len: usize, limit: usize },
}

fn map_read_err(err: io::Error) -> StreamError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        StreamError::Truncated
    } else {
        StreamError::Io(err)
    }
}

/// Big-endian reader over a snapshot byte source. Every record in the format
/// is positional, so the reader only ever moves forward.
#[derive(Debug)]
pub struct SnapshotReader<R> {
    inner: R,
}

impl<R: Read> SnapshotReader<R> {
    pub fn new(inner: R) -> Self {
        SnapshotReader { inner }
    }

    pub fn read_u8(&mut self) -> Result<u8, StreamError> {
        self.inner.read_u8().map_err(map_read_err)
    }

    pub fn read_u16(&mut self) -> Result<u16, StreamError> {
        self.inner.read_u16::<BigEndian>().map_err(map_read_err)
    }

    pub fn read_u32(&mut self) -> Result<u32, StreamError> {
        self.inner.read_u32::<BigEndian>().map_err(map_read_err)
    }

    /// Reads exactly `len` bytes; a short read is a truncated stream.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, StreamError> {
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf).map_err(map_read_err)?;
        Ok(buf)
    }

    /// Reads a u8 length prefix followed by that many bytes.
    pub fn read_blob8(&mut self) -> Result<Vec<u8>, StreamError> {
        let len = self.read_u8()? as usize;
        self.read_bytes(len)
    }

    /// Reads a u16 length prefix followed by that many bytes.
    pub fn read_blob16(&mut self) -> Result<Vec<u8>, StreamError> {
        let len = self.read_u16()? as usize;
        self.read_bytes(len)
    }

    pub fn read_string8(&mut self) -> Result<String, StreamError> {
        let bytes = self.read_blob8()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn read_string16(&mut self) -> Result<String, StreamError> {
        let bytes = self.read_blob16()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Consumes and discards `len` bytes. Used to drain records the live
    /// scene has no counterpart for; running out of bytes is still fatal.
    pub fn skip(&mut self, len: u64) -> Result<(), StreamError> {
        let copied = io::copy(&mut self.inner.by_ref().take(len), &mut io::sink())?;
        if copied < len {
            return Err(StreamError::Truncated);
        }
        Ok(())
    }
}

/// Big-endian writer producing the same positional layout the reader walks.
#[derive(Debug)]
pub struct SnapshotWriter<W> {
    inner: W,
}

impl<W: Write> SnapshotWriter<W> {
    pub fn new(inner: W) -> Self {
        SnapshotWriter { inner }
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), StreamError> {
        self.inner.write_u8(value)?;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), StreamError> {
        self.inner.write_u16::<BigEndian>(value)?;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), StreamError> {
        self.inner.write_u32::<BigEndian>(value)?;
        Ok(())
    }

    pub fn write_blob8(&mut self, bytes: &[u8]) -> Result<(), StreamError> {
        let len = u8::try_from(bytes.len()).map_err(|_| StreamError::FieldTooLong {
            len: bytes.len(),
            limit: u8::MAX as usize,
        })?;
        self.inner.write_u8(len)?;
        self.inner.write_all(bytes)?;
        Ok(())
    }

    pub fn write_blob16(&mut self, bytes: &[u8]) -> Result<(), StreamError> {
        let len = u16::try_from(bytes.len()).map_err(|_| StreamError::FieldTooLong {
            len: bytes.len(),
            limit: u16::MAX as usize,
        })?;
        self.inner.write_u16::<BigEndian>(len)?;
        self.inner.write_all(bytes)?;
        Ok(())
    }

    pub fn write_string8(&mut self, text: &str) -> Result<(), StreamError> {
        self.write_blob8(text.as_bytes())
    }

    pub fn write_string16(&mut self, text: &str) -> Result<(), StreamError> {
        self.write_blob16(text.as_bytes())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_big_endian_integers() {
        let data = vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut reader = SnapshotReader::new(Cursor::new(data));
        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u16().unwrap(), 0x0203);
        assert_eq!(reader.read_u32().unwrap(), 0x0405_0607);
    }

    #[test]
    fn truncated_integer_read_is_distinguishable() {
        let mut reader = SnapshotReader::new(Cursor::new(vec![0x01]));
        match reader.read_u16() {
            Err(StreamError::Truncated) => {}
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[test]
    fn zero_length_prefix_is_a_valid_empty_field() {
        let mut reader = SnapshotReader::new(Cursor::new(vec![0x00]));
        assert_eq!(reader.read_string8().unwrap(), "");
    }

    #[test]
    fn length_prefixed_read_fails_on_short_payload() {
        // Prefix promises 5 bytes, only 2 follow.
        let mut reader = SnapshotReader::new(Cursor::new(vec![0x05, b'h', b'i']));
        match reader.read_string8() {
            Err(StreamError::Truncated) => {}
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[test]
    fn skip_consumes_exactly_and_fails_short() {
        let mut reader = SnapshotReader::new(Cursor::new(vec![0xAA, 0xBB, 0xCC]));
        reader.skip(2).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 0xCC);
        match reader.skip(1) {
            Err(StreamError::Truncated) => {}
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[test]
    fn writer_round_trips_through_reader() {
        let mut writer = SnapshotWriter::new(Vec::new());
        writer.write_u16(0xBEEF).unwrap();
        writer.write_string8("room22").unwrap();
        writer.write_blob16(b"return 1").unwrap();
        let bytes = writer.into_inner();

        let mut reader = SnapshotReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_u16().unwrap(), 0xBEEF);
        assert_eq!(reader.read_string8().unwrap(), "room22");
        assert_eq!(reader.read_blob16().unwrap(), b"return 1");
    }

    #[test]
    fn oversized_field_is_rejected_at_write_time() {
        let mut writer = SnapshotWriter::new(Vec::new());
        let long = "x".repeat(256);
        match writer.write_string8(&long) {
            Err(StreamError::FieldTooLong { len: 256, limit: 255 }) => {}
            other => panic!("expected FieldTooLong, got {other:?}"),
        }
    }
}
