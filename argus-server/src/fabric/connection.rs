use argus_contracts::frames::Frame;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Frames buffered per observer before the fabric starts dropping.
pub const OBSERVER_BUFFER: usize = 100;

/// One connected observer. Delivery is lossy: a full buffer drops the
/// frame rather than blocking the producing request.
#[derive(Debug)]
pub struct Observer {
    /// Unique connection ID
    pub id: Uuid,
    /// Channel draining into this observer's socket
    sender: mpsc::Sender<Frame>,
}

impl Observer {
    pub fn new(sender: mpsc::Sender<Frame>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
        }
    }

    /// Enqueue a frame without blocking. Returns false when the observer
    /// is gone or lagging with a full buffer.
    pub fn push(&self, frame: Frame) -> bool {
        self.sender.try_send(frame).is_ok()
    }
}
