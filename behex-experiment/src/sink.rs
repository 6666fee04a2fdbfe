//! Where finished trial records go.

use behex_core::{Result, TrialRecord};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Append-only destination for trial records. Submission is best effort:
/// a failing sink must not stop the experiment.
pub trait LogSink {
    fn submit(&mut self, record: &TrialRecord);

    fn flush(&mut self) {}
}

/// One JSON object per line in `<dir>/s<subject>.txt`.
pub struct JsonlSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl JsonlSink {
    pub fn create(dir: &Path, subject_nr: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("s{subject_nr}.txt"));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for JsonlSink {
    fn submit(&mut self, record: &TrialRecord) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let line = match serde_json::to_string(&record.to_flat()) {
            Ok(line) => line,
            Err(e) => {
                warn!("dropping unserializable record: {e}");
                return;
            }
        };
        if let Err(e) = writeln!(writer, "{line}") {
            warn!("log sink {} unavailable, records are being dropped: {e}", self.path.display());
            self.writer = None;
        }
    }

    fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            if let Err(e) = w.flush() {
                warn!("flushing {} failed: {e}", self.path.display());
            }
        }
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Keeps every record; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<TrialRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TrialRecord> {
        match self.records.lock() {
            Ok(r) => r.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LogSink for MemorySink {
    fn submit(&mut self, record: &TrialRecord) {
        match self.records.lock() {
            Ok(mut r) => r.push(record.clone()),
            Err(poisoned) => poisoned.into_inner().push(record.clone()),
        }
    }
}

/// Fans one record out to several sinks.
impl LogSink for Vec<Box<dyn LogSink>> {
    fn submit(&mut self, record: &TrialRecord) {
        for sink in self.iter_mut() {
            sink.submit(record);
        }
    }

    fn flush(&mut self) {
        for sink in self.iter_mut() {
            sink.flush();
        }
    }
}
