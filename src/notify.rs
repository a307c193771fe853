//! Typed change-notification channel.
//!
//! The ledger only needs to *emit* "ledger changed" and *consume*
//! "external store changed for key K", so notification is a small typed
//! channel rather than a global event emitter. Observers subscribe for
//! an `mpsc` receiver; dead receivers are dropped on the next publish.

use std::sync::{Mutex, mpsc};

/// Event observed by ledger subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    /// This context persisted a ledger write.
    Changed,
    /// Another execution context modified the store under the given key;
    /// observers should refresh their in-memory view.
    External { key: String },
}

/// Fan-out hub for [`LedgerEvent`]s.
pub struct ChangeHub {
    subscribers: Mutex<Vec<mpsc::Sender<LedgerEvent>>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a new subscriber and return its receiving end.
    pub fn subscribe(&self) -> mpsc::Receiver<LedgerEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Deliver an event to every live subscriber.
    pub fn publish(&self, event: &LedgerEvent) {
        let mut subs = self.subscribers.lock().unwrap();
        subs.retain(|sender| sender.send(event.clone()).is_ok());
    }

    /// Number of live subscribers at the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}
