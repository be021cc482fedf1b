//! Record output: one JSON document per record on stdout.

use std::io::{self, Write};

use linkpoll_core::{CoreError, Record, RecordSink};

/// Writes records to stdout as JSON lines, or pretty-printed JSON.
///
/// Each record is written under the stdout lock, so records emitted from
/// concurrent requests never interleave.
#[derive(Debug, Clone, Copy)]
pub struct StdoutSink {
    pretty: bool,
}

impl StdoutSink {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl RecordSink for StdoutSink {
    fn emit(&self, record: Record) -> Result<(), CoreError> {
        let mut out = io::stdout().lock();
        write_record(&mut out, &record, self.pretty).map_err(|e| CoreError::emit(e.to_string()))
    }
}

fn write_record(out: &mut impl Write, record: &Record, pretty: bool) -> io::Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *out, record)?;
    } else {
        serde_json::to_writer(&mut *out, record)?;
    }
    out.write_all(b"\n")?;
    out.flush()
}
