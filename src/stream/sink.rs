use std::io::Write;

use serde::Serialize;

use crate::error::ExtractError;

/// Line-delimited JSON writer. Every append leaves the underlying file valid:
/// one complete object per line, flushed immediately, so a run that dies
/// mid-stream leaves exactly the records that finished.
pub struct NdjsonSink<W: Write> {
    out: W,
    records: usize,
}

impl<W: Write> NdjsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, records: 0 }
    }

    pub fn append<T: Serialize>(&mut self, record: &T) -> Result<(), ExtractError> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.records += 1;
        Ok(())
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
