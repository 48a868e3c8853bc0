//! Character-at-a-time record parser

use heapless::Vec;

use super::record::{Record, RecordError, RecordType, MAX_LINE};
use crate::config::READ_CHUNK;
use crate::error::{Result, UpdateError};
use crate::flash::BlockReader;
use crate::update::UpdateProgress;

/// Receiver of decoded data bytes
pub trait DataSink {
    /// Store one byte destined for absolute address `addr`
    fn write_byte(&mut self, addr: u32, value: u8) -> Result<()>;

    /// Commit anything still buffered
    fn flush(&mut self) -> Result<()>;
}

impl<S: DataSink + ?Sized> DataSink for &mut S {
    fn write_byte(&mut self, addr: u32, value: u8) -> Result<()> {
        (**self).write_byte(addr, value)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Counters collected while parsing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Records decoded, of any type
    pub records: u32,
    /// Data bytes forwarded to the sink
    pub data_bytes: u32,
    /// Data bytes dropped because they fell in the protected region
    pub discarded_bytes: u32,
}

/// Outcome of feeding one character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep feeding
    Continue,
    /// An EndOfFile record was processed and the sink flushed
    EndOfFile,
}

/// Streaming Intel HEX parser
///
/// Holds the line buffer and the extended linear address base. A parser is
/// meant for a single pass over one image.
#[derive(Debug)]
pub struct HexParser {
    line: Vec<u8, MAX_LINE>,
    in_record: bool,
    extended_base: u32,
    protected_start: u32,
    stats: ParseStats,
}

impl HexParser {
    /// Create a parser that discards data at or above `protected_start`
    pub fn new(protected_start: u32) -> Self {
        Self {
            line: Vec::new(),
            in_record: false,
            extended_base: 0,
            protected_start,
            stats: ParseStats::default(),
        }
    }

    /// Current upper address bits set by the last extended address record
    pub fn extended_base(&self) -> u32 {
        self.extended_base
    }

    /// Counters so far
    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    /// Feed one character
    ///
    /// Characters outside a record are skipped until the next `:`. A `\n`
    /// or `\r` ends the record, which is then decoded and dispatched.
    pub fn push<S: DataSink + ?Sized>(
        &mut self,
        c: u8,
        sink: &mut S,
    ) -> core::result::Result<Step, UpdateError> {
        if !self.in_record {
            if c == b':' {
                self.in_record = true;
                self.line.clear();
            }
            return Ok(Step::Continue);
        }

        if c == b'\n' || c == b'\r' {
            self.in_record = false;
            let record = Record::decode(&self.line)?;
            return self.dispatch(&record, sink);
        }

        self.line.push(c).map_err(|_| RecordError::LineOverflow)?;
        Ok(Step::Continue)
    }

    fn dispatch<S: DataSink + ?Sized>(
        &mut self,
        record: &Record,
        sink: &mut S,
    ) -> core::result::Result<Step, UpdateError> {
        self.stats.records += 1;
        log::trace!(
            "record {:?} offset 0x{:04X} len {}",
            record.kind,
            record.offset,
            record.byte_count()
        );

        match record.kind {
            RecordType::Data => {
                let base = self.extended_base.checked_add(u32::from(record.offset));
                for (k, &byte) in record.payload.iter().enumerate() {
                    match base.and_then(|b| b.checked_add(k as u32)) {
                        Some(addr) if addr < self.protected_start => {
                            sink.write_byte(addr, byte)?;
                            self.stats.data_bytes += 1;
                        }
                        _ => self.stats.discarded_bytes += 1,
                    }
                }
                Ok(Step::Continue)
            }
            RecordType::EndOfFile => {
                sink.flush()?;
                Ok(Step::EndOfFile)
            }
            RecordType::ExtendedLinearAddress => {
                self.extended_base = record.extended_base()?;
                log::debug!("extended base 0x{:08X}", self.extended_base);
                Ok(Step::Continue)
            }
            RecordType::Other(_) => Ok(Step::Continue),
        }
    }
}

/// Parse the first `size` bytes of the external flash into `sink`
///
/// Reads in [`READ_CHUNK`]-byte chunks from address 0 and stops at the
/// EndOfFile record; bytes after it are never read. If the range runs out
/// first, whatever is buffered is still flushed and the image is reported
/// as truncated.
pub fn apply_image<R, S, P>(
    reader: &mut R,
    size: u32,
    parser: &mut HexParser,
    sink: &mut S,
    progress: &mut P,
) -> core::result::Result<ParseStats, UpdateError>
where
    R: BlockReader + ?Sized,
    S: DataSink + ?Sized,
    P: UpdateProgress + ?Sized,
{
    let mut chunk = [0u8; READ_CHUNK];
    let mut addr = 0u32;

    while addr < size {
        let n = core::cmp::min(READ_CHUNK as u32, size - addr) as usize;
        reader.read(addr, &mut chunk[..n])?;
        for &c in &chunk[..n] {
            if parser.push(c, sink)? == Step::EndOfFile {
                return Ok(parser.stats());
            }
        }
        addr += n as u32;
        progress.program_progress(addr);
    }

    sink.flush()?;
    Err(UpdateError::TruncatedImage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::flash::SliceReader;
    use crate::update::NoProgress;

    /// Sink remembering every write and flush
    #[derive(Default)]
    struct Recorder {
        writes: heapless::Vec<(u32, u8), 256>,
        flushes: usize,
    }

    impl DataSink for Recorder {
        fn write_byte(&mut self, addr: u32, value: u8) -> Result<()> {
            self.writes.push((addr, value)).map_err(|_| Error::WriteError { addr })
        }

        fn flush(&mut self) -> Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    fn feed(text: &[u8], protected_start: u32) -> (core::result::Result<Step, UpdateError>, Recorder) {
        let mut parser = HexParser::new(protected_start);
        let mut sink = Recorder::default();
        for &c in text {
            match parser.push(c, &mut sink) {
                Ok(Step::Continue) => {}
                other => return (other, sink),
            }
        }
        (Ok(Step::Continue), sink)
    }

    #[test]
    fn test_data_then_eof() {
        let (result, sink) = feed(b":0410000001020304E2\n:00000001FF\n", 0x3F000);
        assert_eq!(result, Ok(Step::EndOfFile));
        assert_eq!(
            sink.writes.as_slice(),
            &[(0x1000, 1), (0x1001, 2), (0x1002, 3), (0x1003, 4)]
        );
        assert_eq!(sink.flushes, 1);
    }

    #[test]
    fn test_crlf_and_noise_between_records() {
        let (result, sink) = feed(b"junk\r\n:0410000001020304E2\r\n\r\n  :00000001FF\r\n", 0x3F000);
        assert_eq!(result, Ok(Step::EndOfFile));
        assert_eq!(sink.writes.len(), 4);
    }

    #[test]
    fn test_extended_linear_address() {
        let (result, sink) = feed(b":020000040001F9\n:01000400AA51\n:00000001FF\n", 0x3F000);
        assert_eq!(result, Ok(Step::EndOfFile));
        assert_eq!(sink.writes.as_slice(), &[(0x0001_0004, 0xAA)]);
    }

    #[test]
    fn test_protected_bytes_discarded() {
        let mut parser = HexParser::new(0x1002);
        let mut sink = Recorder::default();
        for &c in b":0410000001020304E2\n" {
            parser.push(c, &mut sink).unwrap();
        }
        assert_eq!(sink.writes.as_slice(), &[(0x1000, 1), (0x1001, 2)]);
        assert_eq!(
            parser.stats(),
            ParseStats {
                records: 1,
                data_bytes: 2,
                discarded_bytes: 2
            }
        );
    }

    #[test]
    fn test_address_overflow_discarded() {
        let (_, sink) = feed(b":02000004FFFFFC\n:02FFFF00AABB9B\n", u32::MAX);
        assert!(sink.writes.is_empty());
    }

    #[test]
    fn test_other_records_ignored() {
        let (result, sink) = feed(b":020000021000EC\n:00000001FF\n", 0x3F000);
        assert_eq!(result, Ok(Step::EndOfFile));
        assert!(sink.writes.is_empty());
    }

    #[test]
    fn test_bad_record_aborts() {
        let (result, sink) = feed(b":0410000001020305E2\n:00000001FF\n", 0x3F000);
        assert_eq!(
            result,
            Err(UpdateError::MalformedRecord(RecordError::ChecksumMismatch {
                sum: 0x01
            }))
        );
        assert!(sink.writes.is_empty());
        assert_eq!(sink.flushes, 0);
    }

    #[test]
    fn test_short_line_aborts() {
        let (result, _) = feed(b":0000\n", 0x3F000);
        assert!(matches!(
            result,
            Err(UpdateError::MalformedRecord(RecordError::TooShort { .. }))
        ));
    }

    #[test]
    fn test_bad_extended_length_aborts() {
        let (result, _) = feed(b":0100000400FB\n", 0x3F000);
        assert_eq!(
            result,
            Err(UpdateError::MalformedRecord(
                RecordError::ExtendedAddressLength { byte_count: 1 }
            ))
        );
    }

    #[test]
    fn test_line_overflow() {
        let mut text = [b'0'; MAX_LINE + 2];
        text[0] = b':';
        let (result, _) = feed(&text, 0x3F000);
        assert_eq!(
            result,
            Err(UpdateError::MalformedRecord(RecordError::LineOverflow))
        );
    }

    #[test]
    fn test_apply_image_stops_at_eof() {
        let text = b":0410000001020304E2\n:00000001FF\n:garbage";
        let mut reader = SliceReader::new(text);
        let mut parser = HexParser::new(0x3F000);
        let mut sink = Recorder::default();
        let stats = apply_image(
            &mut reader,
            text.len() as u32,
            &mut parser,
            &mut sink,
            &mut NoProgress,
        )
        .unwrap();
        assert_eq!(stats.records, 2);
        assert_eq!(stats.data_bytes, 4);
    }

    #[test]
    fn test_apply_image_truncated_flushes() {
        let text = b":0410000001020304E2\n:00000001FF\n";
        let mut reader = SliceReader::new(text);
        let mut parser = HexParser::new(0x3F000);
        let mut sink = Recorder::default();
        let result = apply_image(&mut reader, 20, &mut parser, &mut sink, &mut NoProgress);
        assert_eq!(result, Err(UpdateError::TruncatedImage));
        assert_eq!(sink.writes.len(), 4);
        assert_eq!(sink.flushes, 1);
    }
}
