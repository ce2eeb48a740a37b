//! Events emitted to the embedding application
//!
//! Listeners are registered per event kind and invoked synchronously, in
//! registration order, on the task that dispatched the message. A listener
//! must not register further listeners from inside its callback.

use crate::error::DecodeError;
use crate::keychain::StreamIdentity;
use crate::DataRecord;
use parking_lot::RwLock;
use tokio::sync::mpsc;

type DataListener = Box<dyn Fn(&StreamIdentity, &DataRecord) + Send + Sync>;
type ClearListener = Box<dyn Fn(&StreamIdentity) + Send + Sync>;
type ErrorListener = Box<dyn Fn(&DecodeError) + Send + Sync>;

/// Owned form of an event, for queue consumers
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// A validated write
    Data {
        identity: StreamIdentity,
        record: DataRecord,
    },
    /// A clear request
    Clear { identity: StreamIdentity },
    /// A payload that could not be decoded
    Error(DecodeError),
}

/// Listener registry
#[derive(Default)]
pub struct EventListeners {
    data: RwLock<Vec<DataListener>>,
    clear: RwLock<Vec<ClearListener>>,
    error: RwLock<Vec<ErrorListener>>,
}

impl EventListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_data<F>(&self, listener: F)
    where
        F: Fn(&StreamIdentity, &DataRecord) + Send + Sync + 'static,
    {
        self.data.write().push(Box::new(listener));
    }

    pub fn on_clear<F>(&self, listener: F)
    where
        F: Fn(&StreamIdentity) + Send + Sync + 'static,
    {
        self.clear.write().push(Box::new(listener));
    }

    pub fn on_error<F>(&self, listener: F)
    where
        F: Fn(&DecodeError) + Send + Sync + 'static,
    {
        self.error.write().push(Box::new(listener));
    }

    /// Forward every event kind into an unbounded queue
    ///
    /// Events stop being forwarded once the receiver is dropped.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<InputEvent> {
        let (tx, rx) = mpsc::unbounded_channel();

        let data_tx = tx.clone();
        self.on_data(move |identity, record| {
            let _ = data_tx.send(InputEvent::Data {
                identity: identity.clone(),
                record: record.clone(),
            });
        });

        let clear_tx = tx.clone();
        self.on_clear(move |identity| {
            let _ = clear_tx.send(InputEvent::Clear {
                identity: identity.clone(),
            });
        });

        self.on_error(move |err| {
            let _ = tx.send(InputEvent::Error(err.clone()));
        });

        rx
    }

    pub(crate) fn emit_data(&self, identity: &StreamIdentity, record: DataRecord) {
        for listener in self.data.read().iter() {
            listener(identity, &record);
        }
    }

    pub(crate) fn emit_clear(&self, identity: &StreamIdentity) {
        for listener in self.clear.read().iter() {
            listener(identity);
        }
    }

    pub(crate) fn emit_error(&self, err: &DecodeError) {
        for listener in self.error.read().iter() {
            listener(err);
        }
    }
}
