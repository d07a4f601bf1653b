//! Delimited event file reader
//!
//! The first line of a file is its header. Every later line becomes a
//! [`RawRow`] mapping header name to raw field text, or a
//! [`ParsedRow::Malformed`] entry when the line cannot be mapped.
//!
//! A file with no header line, or whose header is not valid UTF-8, fails to
//! open with [`IngestError::InvalidHeader`].
//!
//! Blank lines are skipped by the CSV reader: they are neither rows nor
//! malformed rows, and line numbers still count them.

use crate::error::{IngestError, Result};
use crate::record::RawRow;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Why a data line could not be mapped onto the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// Field count differs from the header's
    FieldCount { expected: usize, found: usize },
    /// The line is not valid UTF-8
    Encoding,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::FieldCount { expected, found } => {
                write!(f, "expected {} fields, found {}", expected, found)
            },
            MalformedReason::Encoding => write!(f, "line is not valid UTF-8"),
        }
    }
}

/// One data line of an event file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRow {
    Row(RawRow),
    Malformed { line: u64, reason: MalformedReason },
}

/// Streaming reader over one event file
pub struct EventFileReader<R: Read> {
    path: PathBuf,
    reader: csv::Reader<R>,
    headers: Vec<String>,
    record: csv::StringRecord,
}

impl EventFileReader<File> {
    /// Open `path` and read its header line
    pub fn open(path: &Path, delimiter: u8) -> Result<Self> {
        let file = File::open(path).map_err(|e| IngestError::io(path, e))?;
        Self::from_reader(path, file, delimiter)
    }
}

impl<R: Read> EventFileReader<R> {
    /// Wrap any reader; `path` is only used in errors
    pub fn from_reader(path: impl Into<PathBuf>, source: R, delimiter: u8) -> Result<Self> {
        let path = path.into();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false) // Header is read as the first record
            .flexible(true) // Field counts are checked per row
            .trim(csv::Trim::None)
            .from_reader(source);

        let mut header = csv::StringRecord::new();
        let headers = match reader.read_record(&mut header) {
            Ok(true) => header.iter().map(str::to_string).collect(),
            Ok(false) => return Err(IngestError::invalid_header(path, "file has no header line")),
            Err(e) if matches!(e.kind(), csv::ErrorKind::Utf8 { .. }) => {
                return Err(IngestError::invalid_header(path, "header is not valid UTF-8"));
            },
            Err(e) => return Err(IngestError::csv(path, e)),
        };

        Ok(Self {
            path,
            reader,
            headers,
            record: csv::StringRecord::new(),
        })
    }

    /// Header names in column order
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Read the next data line; `None` at end of file
    ///
    /// Row-level problems come back as [`ParsedRow::Malformed`]. Only I/O and
    /// structural reader failures are errors.
    pub fn next_row(&mut self) -> Result<Option<ParsedRow>> {
        match self.reader.read_record(&mut self.record) {
            Ok(false) => Ok(None),
            Ok(true) => {
                let line = self.record.position().map_or(0, |pos| pos.line());
                if self.record.len() != self.headers.len() {
                    return Ok(Some(ParsedRow::Malformed {
                        line,
                        reason: MalformedReason::FieldCount {
                            expected: self.headers.len(),
                            found: self.record.len(),
                        },
                    }));
                }

                let fields = self
                    .headers
                    .iter()
                    .cloned()
                    .zip(self.record.iter().map(str::to_string))
                    .collect();
                Ok(Some(ParsedRow::Row(RawRow::new(line, fields))))
            },
            Err(e) => {
                if let csv::ErrorKind::Utf8 { pos, .. } = e.kind() {
                    return Ok(Some(ParsedRow::Malformed {
                        line: pos.as_ref().map_or(0, |pos| pos.line()),
                        reason: MalformedReason::Encoding,
                    }));
                }
                Err(IngestError::csv(&self.path, e))
            },
        }
    }
}

impl<R: Read> Iterator for EventFileReader<R> {
    type Item = Result<ParsedRow>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::validation::EventField;
    use std::io::Cursor;

    fn reader(content: &[u8]) -> EventFileReader<Cursor<Vec<u8>>> {
        EventFileReader::from_reader("test.csv", Cursor::new(content.to_vec()), b',').unwrap()
    }

    fn rows(content: &[u8]) -> Vec<ParsedRow> {
        reader(content).map(Result::unwrap).collect()
    }

    #[test]
    fn test_header_and_rows() {
        let content = b"eventDatetime,eventAction,callRef,eventValue,eventCurrencyCode\n\
2023-01-01 10:00:00,login,1001,,\n\
2023-01-01 10:05:00,purchase,1002,9.99,USD\n";
        let mut r = reader(content);
        assert_eq!(
            r.headers(),
            EventField::ALL.map(|f| f.name().to_string()).as_slice()
        );

        let Some(ParsedRow::Row(first)) = r.next_row().unwrap() else {
            panic!("expected a row");
        };
        assert_eq!(first.line(), 2);
        assert_eq!(first.get(EventField::EventAction), Some("login"));
        assert_eq!(first.get(EventField::EventValue), Some(""));

        let Some(ParsedRow::Row(second)) = r.next_row().unwrap() else {
            panic!("expected a row");
        };
        assert_eq!(second.line(), 3);
        assert_eq!(second.get(EventField::EventCurrencyCode), Some("USD"));

        assert!(r.next_row().unwrap().is_none());
    }

    #[test]
    fn test_short_row_is_malformed_and_reading_continues() {
        let content = b"eventDatetime,eventAction,callRef,eventValue,eventCurrencyCode\n\
2023-01-01 10:00:00,login,1001,\n\
2023-01-01 10:00:00,login,1001,,\n";
        let parsed = rows(content);
        assert_eq!(parsed.len(), 2);
        assert_eq!(
            parsed[0],
            ParsedRow::Malformed {
                line: 2,
                reason: MalformedReason::FieldCount {
                    expected: 5,
                    found: 4
                },
            }
        );
        assert!(matches!(parsed[1], ParsedRow::Row(_)));
    }

    #[test]
    fn test_long_row_is_malformed() {
        let parsed = rows(b"a,b\n1,2,3\n");
        assert!(matches!(
            parsed[0],
            ParsedRow::Malformed {
                reason: MalformedReason::FieldCount {
                    expected: 2,
                    found: 3
                },
                ..
            }
        ));
    }

    #[test]
    fn test_column_order_follows_header() {
        let parsed = rows(b"callRef,eventAction,eventDatetime\n7,logout,2023-01-01 00:00:00\n");
        let ParsedRow::Row(row) = &parsed[0] else {
            panic!("expected a row");
        };
        assert_eq!(row.get(EventField::CallRef), Some("7"));
        assert_eq!(row.get(EventField::EventDatetime), Some("2023-01-01 00:00:00"));
    }

    #[test]
    fn test_values_keep_surrounding_whitespace() {
        let parsed = rows(b"callRef,eventAction\n 7 ,login\n");
        let ParsedRow::Row(row) = &parsed[0] else {
            panic!("expected a row");
        };
        assert_eq!(row.get(EventField::CallRef), Some(" 7 "));
    }

    #[test]
    fn test_quoted_fields_may_contain_delimiter() {
        let parsed = rows(b"eventAction,callRef\n\"log,in\",1\n");
        let ParsedRow::Row(row) = &parsed[0] else {
            panic!("expected a row");
        };
        assert_eq!(row.get(EventField::EventAction), Some("log,in"));
    }

    #[test]
    fn test_invalid_utf8_row_is_malformed() {
        let parsed = rows(b"eventAction,callRef\nlog\xffin,1\nlogin,2\n");
        assert_eq!(parsed.len(), 2);
        assert!(matches!(
            parsed[0],
            ParsedRow::Malformed {
                reason: MalformedReason::Encoding,
                ..
            }
        ));
        assert!(matches!(parsed[1], ParsedRow::Row(_)));
    }

    #[test]
    fn test_custom_delimiter() {
        let content = b"callRef|eventAction\n1|login\n".to_vec();
        let mut r = EventFileReader::from_reader("t.psv", Cursor::new(content), b'|').unwrap();
        let Some(ParsedRow::Row(row)) = r.next_row().unwrap() else {
            panic!("expected a row");
        };
        assert_eq!(row.get(EventField::EventAction), Some("login"));
    }

    #[test]
    fn test_empty_file_is_an_invalid_header() {
        let err = EventFileReader::from_reader("t.csv", Cursor::new(Vec::new()), b',').err();
        assert!(matches!(err, Some(IngestError::InvalidHeader { .. })));

        let err = EventFileReader::from_reader("t.csv", Cursor::new(b"\n\n".to_vec()), b',').err();
        assert!(matches!(err, Some(IngestError::InvalidHeader { .. })));
    }

    #[test]
    fn test_undecodable_header_is_an_invalid_header() {
        let content = b"event\xffDatetime,eventAction\n2023-01-01 10:00:00,login\n".to_vec();
        let err = EventFileReader::from_reader("t.csv", Cursor::new(content), b',').err();
        let Some(IngestError::InvalidHeader { reason, .. }) = err else {
            panic!("expected an invalid header");
        };
        assert!(reason.contains("UTF-8"));
    }

    #[test]
    fn test_blank_lines_are_skipped_but_numbered() {
        let parsed = rows(b"callRef,eventAction\n1,login\n\n2,logout\n");
        assert_eq!(parsed.len(), 2);
        let ParsedRow::Row(second) = &parsed[1] else {
            panic!("expected a row");
        };
        assert_eq!(second.line(), 4);
    }

    /// Yields its data once, then fails every later read
    struct FailsAtEof(Cursor<Vec<u8>>);

    impl Read for FailsAtEof {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.0.read(buf)? {
                0 => Err(std::io::Error::other("device went away")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_read_failure_after_rows_is_an_error() {
        let source = FailsAtEof(Cursor::new(b"callRef,eventAction\n1,login\n".to_vec()));
        let mut r = EventFileReader::from_reader("t.csv", source, b',').unwrap();

        assert!(matches!(r.next_row().unwrap(), Some(ParsedRow::Row(_))));
        let err = r.next_row().unwrap_err();
        assert!(matches!(err, IngestError::Csv { .. }));
    }
}
