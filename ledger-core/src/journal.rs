//! JSON-lines journal of ledger events
//!
//! One event per line, in sequence order. The journal is the persisted
//! form of the ledger; [`crate::Ledger::replay`] turns it back into one.

use crate::{types::LedgerEvent, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Append events to the journal at `path`, creating it if missing
pub fn append_events<'a>(
    path: impl AsRef<Path>,
    events: impl IntoIterator<Item = &'a LedgerEvent>,
) -> Result<usize> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())?;
    let mut writer = BufWriter::new(file);

    let mut written = 0;
    for event in events {
        serde_json::to_writer(&mut writer, event)?;
        writer.write_all(b"\n")?;
        written += 1;
    }
    writer.flush()?;

    tracing::debug!(path = %path.as_ref().display(), written, "Journal appended");
    Ok(written)
}

/// Read every event from the journal at `path`
///
/// Blank lines are skipped.
pub fn read_events(path: impl AsRef<Path>) -> Result<Vec<LedgerEvent>> {
    let reader = BufReader::new(File::open(path.as_ref())?);

    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        events.push(serde_json::from_str(&line)?);
    }
    Ok(events)
}
