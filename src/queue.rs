use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};

/// Control messages travel in-band so every record submitted before a
/// shutdown request is still drained, in order, ahead of it.
pub(crate) enum Message {
    Record(String),
    Shutdown,
}

/// Producer half of the record queue. Submissions never block.
pub(crate) struct RecordQueue {
    sender: Sender<Message>,
}

/// Consumer half, owned by the writer thread.
pub(crate) struct RecordDrain {
    receiver: Receiver<Message>,
}

/// Creates a record queue. `capacity` of `None` gives the default,
/// effectively unbounded queue; `Some(n)` bounds it, in which case a full
/// queue drops submissions instead of blocking producers.
pub(crate) fn record_queue(capacity: Option<usize>) -> (RecordQueue, RecordDrain) {
    let (sender, receiver) = match capacity {
        Some(n) => bounded(n),
        None => unbounded(),
    };
    (RecordQueue { sender }, RecordDrain { receiver })
}

impl RecordQueue {
    /// Hands a record to the writer thread. Fire-and-forget: a full
    /// bounded queue drops the record with a warning, and a queue whose
    /// consumer is gone swallows it silently.
    pub(crate) fn submit(&self, record: String) {
        match self.sender.try_send(Message::Record(record)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::warn!("record queue is full, dropping record");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Asks the writer thread to stop once everything queued so far has
    /// been drained.
    pub(crate) fn close(&self) {
        let _ = self.sender.send(Message::Shutdown);
    }
}

impl RecordDrain {
    /// Blocks until the next record arrives. Returns `None` on shutdown,
    /// whether requested via [`RecordQueue::close`] or by every producer
    /// handle being dropped.
    pub(crate) fn take(&self) -> Option<String> {
        match self.receiver.recv() {
            Ok(Message::Record(record)) => Some(record),
            Ok(Message::Shutdown) | Err(_) => None,
        }
    }
}
