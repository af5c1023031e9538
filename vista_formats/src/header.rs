use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use crate::stream::{SnapshotReader, SnapshotWriter, StreamError};

/// Format revision stamped into every snapshot this crate writes.
pub const FORMAT_VERSION: &str = "1.0";

/// Fixed preamble of a snapshot: three u8-length-prefixed strings, in this
/// order, before any scene data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveHeader {
    pub version: String,
    pub preview: String,
    pub room: String,
}

pub fn read_header<R: Read>(reader: &mut SnapshotReader<R>) -> Result<SaveHeader, StreamError> {
    let version = reader.read_string8()?;
    let preview = reader.read_string8()?;
    let room = reader.read_string8()?;
    Ok(SaveHeader {
        version,
        preview,
        room,
    })
}

pub fn write_header<W: Write>(
    writer: &mut SnapshotWriter<W>,
    header: &SaveHeader,
) -> Result<(), StreamError> {
    writer.write_string8(&header.version)?;
    writer.write_string8(&header.preview)?;
    writer.write_string8(&header.room)?;
    Ok(())
}

/// Reads only the preamble of a snapshot file and returns its preview text,
/// for save-slot UIs that must not commit to a full restore. The whole header
/// goes through [`read_header`] so the preview is selected by field name, not
/// by stream position. The file handle is dropped before returning.
pub fn peek_preview<P: AsRef<Path>>(path: P) -> Result<String, StreamError> {
    let file = File::open(path.as_ref())?;
    let mut reader = SnapshotReader::new(BufReader::new(file));
    let header = read_header(&mut reader)?;
    Ok(header.preview)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::NamedTempFile;

    fn encode(header: &SaveHeader) -> Vec<u8> {
        let mut writer = SnapshotWriter::new(Vec::new());
        write_header(&mut writer, header).unwrap();
        writer.into_inner()
    }

    #[test]
    fn header_round_trips() {
        let header = SaveHeader {
            version: FORMAT_VERSION.to_string(),
            preview: "Atrium, day 3".to_string(),
            room: "atrium".to_string(),
        };
        let bytes = encode(&header);
        let mut reader = SnapshotReader::new(Cursor::new(bytes));
        assert_eq!(read_header(&mut reader).unwrap(), header);
    }

    #[test]
    fn empty_fields_round_trip() {
        let header = SaveHeader {
            version: String::new(),
            preview: String::new(),
            room: String::new(),
        };
        let bytes = encode(&header);
        assert_eq!(bytes, vec![0, 0, 0]);
        let mut reader = SnapshotReader::new(Cursor::new(bytes));
        assert_eq!(read_header(&mut reader).unwrap(), header);
    }

    #[test]
    fn maximum_length_fields_round_trip() {
        let header = SaveHeader {
            version: "v".repeat(255),
            preview: "p".repeat(255),
            room: "r".repeat(255),
        };
        let bytes = encode(&header);
        let mut reader = SnapshotReader::new(Cursor::new(bytes));
        assert_eq!(read_header(&mut reader).unwrap(), header);
    }

    #[test]
    fn truncated_header_is_fatal() {
        let header = SaveHeader {
            version: "1.0".to_string(),
            preview: "cut short".to_string(),
            room: "atrium".to_string(),
        };
        let mut bytes = encode(&header);
        bytes.truncate(6);
        let mut reader = SnapshotReader::new(Cursor::new(bytes));
        match read_header(&mut reader) {
            Err(StreamError::Truncated) => {}
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[test]
    fn peek_returns_preview_and_is_idempotent() {
        let header = SaveHeader {
            version: FORMAT_VERSION.to_string(),
            preview: "Lighthouse at dusk".to_string(),
            room: "lighthouse".to_string(),
        };
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), encode(&header)).unwrap();

        assert_eq!(peek_preview(file.path()).unwrap(), "Lighthouse at dusk");
        // A second peek over the unmodified file sees the same preview.
        assert_eq!(peek_preview(file.path()).unwrap(), "Lighthouse at dusk");
    }
}
