//! Text dump input
//!
//! One pair per line, `hex(key)<TAB>hex(value)`. Blank lines and lines
//! starting with `#` are skipped. Either side may be empty.

use std::io::{self, BufRead};
use thiserror::Error;

/// Errors raised while reading a dump
#[derive(Debug, Error)]
pub enum DumpError {
    /// Line has no tab separator
    #[error("line {line}: expected hex(key)<TAB>hex(value)")]
    MissingSeparator {
        /// 1-based line number
        line: usize,
    },

    /// A field is not valid hex
    #[error("line {line}: invalid hex in {field}: {source}")]
    InvalidHex {
        /// 1-based line number
        line: usize,
        /// `key` or `value`
        field: &'static str,
        /// Decoder error
        #[source]
        source: hex::FromHexError,
    },

    /// Read failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Decode one dump line, `None` for lines that carry no pair
pub fn parse_line(line: &str, line_no: usize) -> Result<Option<(Vec<u8>, Vec<u8>)>, DumpError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (key, value) = line
        .split_once('\t')
        .ok_or(DumpError::MissingSeparator { line: line_no })?;

    let decode = |text: &str, field| {
        hex::decode(text.trim()).map_err(|source| DumpError::InvalidHex {
            line: line_no,
            field,
            source,
        })
    };

    Ok(Some((decode(key, "key")?, decode(value, "value")?)))
}

/// Iterator over the pairs of a dump
#[derive(Debug)]
pub struct DumpReader<R> {
    reader: R,
    line_no: usize,
    buffer: String,
}

impl<R: BufRead> DumpReader<R> {
    /// Read pairs from `reader`
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buffer: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for DumpReader<R> {
    type Item = Result<(Vec<u8>, Vec<u8>), DumpError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buffer.clear();
            match self.reader.read_line(&mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            self.line_no += 1;

            match parse_line(&self.buffer, self.line_no) {
                Ok(None) => {}
                Ok(Some(pair)) => return Some(Ok(pair)),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_parse_line() {
        assert_eq!(
            parse_line("01ff\tabcd\n", 1).unwrap(),
            Some((vec![0x01, 0xff], vec![0xab, 0xcd]))
        );
        assert_eq!(
            parse_line("\t00\r\n", 2).unwrap(),
            Some((Vec::new(), vec![0x00]))
        );
        assert_eq!(parse_line("aa\t", 3).unwrap(), Some((vec![0xaa], Vec::new())));
        assert_eq!(parse_line("   \n", 4).unwrap(), None);
        assert_eq!(parse_line("# comment\ttab", 5).unwrap(), None);
    }

    #[test]
    fn test_parse_line_errors() {
        assert!(matches!(
            parse_line("0102", 7),
            Err(DumpError::MissingSeparator { line: 7 })
        ));
        assert!(matches!(
            parse_line("zz\t01", 8),
            Err(DumpError::InvalidHex { line: 8, field: "key", .. })
        ));
        assert!(matches!(
            parse_line("01\t012", 9),
            Err(DumpError::InvalidHex { line: 9, field: "value", .. })
        ));
    }

    #[test]
    fn test_reader_counts_skipped_lines() {
        let input = "# header\n01\t02\n\n0304\t\nbad\n";
        let items: Vec<_> = DumpReader::new(Cursor::new(input)).collect();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap(), &(vec![0x01], vec![0x02]));
        assert_eq!(items[1].as_ref().unwrap(), &(vec![0x03, 0x04], Vec::new()));
        assert!(matches!(items[2], Err(DumpError::MissingSeparator { line: 5 })));
    }
}
