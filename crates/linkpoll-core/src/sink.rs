// ── Record sinks ──
//
// Where finished records go. Emission is synchronous and fallible; the
// handlers log and drop a record whose emission fails.

use tokio::sync::mpsc;

use crate::error::CoreError;
use crate::model::Record;

/// Downstream consumer of emitted records.
pub trait RecordSink: Send + Sync {
    fn emit(&self, record: Record) -> Result<(), CoreError>;
}

/// Forwards records into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Record>,
}

impl ChannelSink {
    /// Create a sink and the receiver that observes its records.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Record>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RecordSink for ChannelSink {
    fn emit(&self, record: Record) -> Result<(), CoreError> {
        self.tx
            .send(record)
            .map_err(|_| CoreError::emit("record channel closed"))
    }
}

/// Drain whatever is currently buffered in a sink receiver.
pub fn drain_records(rx: &mut mpsc::UnboundedReceiver<Record>) -> Vec<Record> {
    let mut records = Vec::new();
    while let Ok(record) = rx.try_recv() {
        records.push(record);
    }
    records
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn channel_sink_forwards_until_receiver_drops() {
        let (sink, mut rx) = ChannelSink::new();
        let mut record = Record::new();
        record.insert("value", json!(1));

        assert!(sink.emit(record.clone()).is_ok());
        assert_eq!(drain_records(&mut rx), vec![record.clone()]);

        drop(rx);
        assert!(matches!(sink.emit(record), Err(CoreError::Emit { .. })));
    }
}
