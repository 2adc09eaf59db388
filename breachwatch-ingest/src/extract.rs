//! Identifier extraction from raw breach dumps.
//!
//! Two passes per line: a permissive unanchored scan finds candidates
//! embedded in arbitrary text (`user@host.tld:password`), then each candidate
//! is stripped of trailing `:`/`;` and whitespace and must pass the strict
//! anchored check in [`Identifier::parse`]. Lines that match nothing are
//! skipped silently.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use breachwatch_core::{Identifier, SourceError};
use once_cell::sync::Lazy;
use regex::Regex;

/// Unanchored pattern used to find candidates inside a line.
pub const CANDIDATE_PATTERN: &str = r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}";

static CANDIDATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(CANDIDATE_PATTERN).expect("Invalid candidate regex"));

fn sanitize(candidate: &str) -> &str {
    candidate.trim_end_matches([':', ';']).trim()
}

/// Valid identifiers in one line, in match order.
pub fn identifiers_in_line(line: &str) -> impl Iterator<Item = Identifier> + '_ {
    CANDIDATE
        .find_iter(line)
        .filter_map(|m| Identifier::parse(sanitize(m.as_str())).ok())
}

/// Lazy identifier stream over a line-oriented reader.
///
/// Yields identifiers in line-then-match order. A read error is yielded once
/// and ends the stream. Invalid UTF-8 is replaced rather than rejected, so
/// binary noise in a dump cannot abort extraction.
pub struct Extractor<R> {
    reader: R,
    source_name: String,
    buf: Vec<u8>,
    pending: VecDeque<Identifier>,
    done: bool,
}

impl<R: BufRead> Extractor<R> {
    pub fn new(reader: R, source_name: impl Into<String>) -> Self {
        Self {
            reader,
            source_name: source_name.into(),
            buf: Vec::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }
}

impl Extractor<BufReader<File>> {
    /// Open a file for extraction.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let file = File::open(path).map_err(|e| SourceError::read(&name, &e))?;
        Ok(Self::new(BufReader::new(file), name))
    }
}

impl<R: BufRead> Iterator for Extractor<R> {
    type Item = Result<Identifier, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(identifier) = self.pending.pop_front() {
                return Some(Ok(identifier));
            }
            if self.done {
                return None;
            }

            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.done = true;
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&self.buf);
                    let line = line.trim_end_matches(['\n', '\r']);
                    self.pending.extend(identifiers_in_line(line));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(SourceError::read(&self.source_name, &e)));
                }
            }
        }
    }
}

/// Extract every identifier from a reader, or nothing if reading fails.
pub fn extract_all<R: BufRead>(
    reader: R,
    source_name: impl Into<String>,
) -> Result<Vec<Identifier>, SourceError> {
    Extractor::new(reader, source_name).collect()
}

/// Extract every identifier from a file, or nothing if reading fails.
pub fn extract_file(path: impl AsRef<Path>) -> Result<Vec<Identifier>, SourceError> {
    Extractor::open(path)?.collect()
}
