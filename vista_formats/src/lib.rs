pub mod header;
pub mod stream;

pub use header::{FORMAT_VERSION, SaveHeader, peek_preview, read_header, write_header};
pub use stream::{SnapshotReader, SnapshotWriter, StreamError};
