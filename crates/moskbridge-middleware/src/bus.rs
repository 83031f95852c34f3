//! Broadcast bus for user-visible status lines.
//!
//! Every session transition and every failure ends up here as a [`Status`].
//! The shell subscribes and prints them; headless runs can ignore the bus
//! entirely, publishing with no subscriber is not an error.

use moskbridge_types::{Status, StatusLevel};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Buffered status lines before slow subscribers start lagging.
const DEFAULT_CAPACITY: usize = 256;

/// Shared status bus.  Hold it as `Arc<StatusBus>`; subscribers get every
/// status published after they subscribed.
#[derive(Clone, Debug)]
pub struct StatusBus {
    sender: broadcast::Sender<Status>,
}

impl StatusBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Log `status` and hand it to every subscriber.
    ///
    /// Returns the number of subscribers reached, `0` when nobody listens.
    pub fn publish(&self, status: Status) -> usize {
        match status.level {
            StatusLevel::Error => error!(status = %status.message, "status"),
            StatusLevel::Success | StatusLevel::Info => info!(status = %status.message, "status"),
        }
        self.sender.send(status).unwrap_or(0)
    }

    pub fn success(&self, message: impl Into<String>) -> usize {
        self.publish(Status::success(message))
    }

    pub fn info(&self, message: impl Into<String>) -> usize {
        self.publish(Status::info(message))
    }

    pub fn error(&self, message: impl Into<String>) -> usize {
        self.publish(Status::error(message))
    }

    pub fn subscribe(&self) -> StatusReceiver {
        StatusReceiver {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Receiving end of the [`StatusBus`].
pub struct StatusReceiver {
    receiver: broadcast::Receiver<Status>,
}

impl StatusReceiver {
    /// Next status line, or `None` once the bus is gone.  Lagged lines are
    /// skipped with a warning.
    pub async fn recv(&mut self) -> Option<Status> {
        loop {
            match self.receiver.recv().await {
                Ok(status) => return Some(status),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "status subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`][Self::recv]; `None` when nothing is
    /// pending.
    pub fn try_recv(&mut self) -> Option<Status> {
        loop {
            match self.receiver.try_recv() {
                Ok(status) => return Some(status),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "status subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }

    /// Every status currently pending.
    pub fn drain(&mut self) -> Vec<Status> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
