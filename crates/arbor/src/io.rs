//! JSON-lines problem source and result sink.
//!
//! Input lines hold one problem each, e.g.
//! `{"id": "p0", "problem": "2+2=?", "answer": "4"}`; blank lines are
//! skipped. Output lines hold one serialized
//! [`ProblemRecord`](arbor_core::finalize::ProblemRecord) each.

use arbor_core::driver::ResultSink;
use arbor_core::error::Result;
use arbor_core::finalize::ProblemRecord;
use arbor_core::problem::Problem;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

/// Reads problems from JSON lines.
#[derive(Debug)]
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line: usize,
}

impl JsonLinesSource<BufReader<File>> {
    /// Open a JSON-lines file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> JsonLinesSource<R> {
    /// Read problems from any buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for JsonLinesSource<R> {
    type Item = Result<Problem>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => return Some(Err(err.into())),
            };
            self.line += 1;

            if line.trim().is_empty() {
                continue;
            }
            return Some(serde_json::from_str(&line).map_err(|err| {
                tracing::warn!(line = self.line, error = %err, "malformed problem line");
                err.into()
            }));
        }
    }
}

/// Writes records as JSON lines.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: usize,
}

impl JsonLinesSink<BufWriter<File>> {
    /// Create (or truncate) a JSON-lines file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> JsonLinesSink<W> {
    /// Write records to any writer.
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResultSink for JsonLinesSink<W> {
    fn write(&mut self, record: &ProblemRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
