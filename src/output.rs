//! JSON-lines writing of outcome records.

use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::resolve::OutcomeRecord;

/// Default number of records buffered between flushes.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Output failures.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Writing to the sink failed.
    #[error("failed to write outcome records: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be serialized.
    #[error("failed to serialize outcome record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Buffers records as JSON lines and flushes them in batches.
#[derive(Debug)]
pub struct RecordWriter<W> {
    sink: W,
    buffer: Vec<u8>,
    pending: usize,
    batch_size: usize,
    written: usize,
}

impl<W: AsyncWrite + Unpin> RecordWriter<W> {
    /// Creates a writer flushing every `batch_size` records (at least one).
    pub fn new(sink: W, batch_size: usize) -> Self {
        Self {
            sink,
            buffer: Vec::new(),
            pending: 0,
            batch_size: batch_size.max(1),
            written: 0,
        }
    }

    /// Records written so far, flushed or not.
    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }

    /// Appends one record, flushing when the batch is full.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError`] if serialization or the flush fails.
    pub async fn write(&mut self, record: &OutcomeRecord) -> Result<(), OutputError> {
        serde_json::to_writer(&mut self.buffer, record)?;
        self.buffer.push(b'\n');
        self.pending += 1;
        self.written += 1;
        if self.pending >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// Writes out everything buffered.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] if the sink fails.
    pub async fn flush(&mut self) -> Result<(), OutputError> {
        if self.pending > 0 {
            trace!(records = self.pending, "flushing outcome records");
            self.sink.write_all(&self.buffer).await?;
            self.buffer.clear();
            self.pending = 0;
        }
        self.sink.flush().await?;
        Ok(())
    }

    /// Flushes and returns the sink.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] if the final flush fails.
    pub async fn finish(mut self) -> Result<W, OutputError> {
        self.flush().await?;
        debug!(records = self.written, "outcome output complete");
        Ok(self.sink)
    }
}

/// Drains `records` into `writer` until every sender is dropped.
///
/// # Errors
///
/// Returns [`OutputError`] on the first write failure.
pub async fn drain_records<W: AsyncWrite + Unpin>(
    mut records: mpsc::Receiver<OutcomeRecord>,
    mut writer: RecordWriter<W>,
) -> Result<usize, OutputError> {
    while let Some(record) = records.recv().await {
        writer.write(&record).await?;
    }
    let written = writer.written();
    writer.finish().await?;
    Ok(written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(id: &str) -> OutcomeRecord {
        OutcomeRecord {
            id: Some(id.to_string()),
            source_url: "https://repo.org/record/1".into(),
            page_url: "https://repo.org/record/1".into(),
            final_url_or_status: "https://repo.org/files/1.pdf".into(),
            comment: String::new(),
            was_checked: true,
            was_valid: true,
            was_accessible: true,
            was_direct_link: false,
        }
    }

    // ==================== Writer Tests ====================

    #[tokio::test]
    async fn test_records_are_camel_case_json_lines() {
        let mut writer = RecordWriter::new(Vec::new(), 10);
        writer.write(&record("1")).await.unwrap();
        writer.write(&record("2")).await.unwrap();
        let out = String::from_utf8(writer.finish().await.unwrap()).unwrap();

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"finalUrlOrStatus\":\"https://repo.org/files/1.pdf\""));
        assert!(lines[0].contains("\"wasDirectLink\":false"));
        let parsed: OutcomeRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed, record("2"));
    }

    #[tokio::test]
    async fn test_batch_flushes_when_full() {
        let mut writer = RecordWriter::new(Vec::new(), 2);
        writer.write(&record("1")).await.unwrap();
        assert!(writer.sink.is_empty());
        writer.write(&record("2")).await.unwrap();
        assert_eq!(writer.sink.iter().filter(|b| **b == b'\n').count(), 2);
        assert!(writer.buffer.is_empty());
    }

    #[test]
    fn test_zero_batch_size_flushes_every_record() {
        let mut writer = RecordWriter::new(Vec::new(), 0);
        tokio_test::block_on(writer.write(&record("1"))).unwrap();
        assert!(!writer.sink.is_empty());
        assert_eq!(writer.written(), 1);
    }

    // ==================== Drain Tests ====================

    #[tokio::test]
    async fn test_drain_until_senders_dropped() {
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(drain_records(rx, RecordWriter::new(Vec::new(), 50)));
        for id in ["1", "2", "3"] {
            tx.send(record(id)).await.unwrap();
        }
        drop(tx);
        assert_eq!(task.await.unwrap().unwrap(), 3);
    }
}
