//! Intel HEX stream parsing
//!
//! The staged image is Intel HEX text. [`HexParser`] consumes it one
//! character at a time, decodes each record in isolation and forwards data
//! bytes to a [`DataSink`]. Nothing beyond one line is buffered.

mod record;
mod stream;

pub use record::{Record, RecordError, RecordType, MAX_LINE, MAX_PAYLOAD};
pub use stream::{apply_image, DataSink, HexParser, ParseStats, Step};
