use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Sender};
use parking_lot::Mutex;
use serde_json::Value;

use super::{KeyValueStore, SaveReceipt, StorageKey, StoreError};

enum WriteCommand {
    Set {
        key: StorageKey,
        value: Value,
        reply: Sender<Result<(), StoreError>>,
    },
    Flush(Sender<()>),
}

/// Single background thread that applies saves in the order they were
/// issued. Callers never wait on it unless they ask to.
pub(super) struct WriteBehind {
    tx: Mutex<Option<Sender<WriteCommand>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WriteBehind {
    pub(super) fn spawn(backend: Arc<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let (tx, rx) = unbounded::<WriteCommand>();
        let handle = thread::Builder::new()
            .name("store-writer".into())
            .spawn(move || {
                for command in rx {
                    match command {
                        WriteCommand::Set { key, value, reply } => {
                            let result = backend.set(key.area(), key.as_ref(), &value);
                            if let Err(err) = &result {
                                tracing::warn!(?err, key = key.as_ref(), "background save failed");
                            }
                            let _ = reply.send(result);
                        }
                        WriteCommand::Flush(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
                tracing::debug!("store writer drained");
            })?;
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub(super) fn enqueue(&self, key: StorageKey, value: Value) -> SaveReceipt {
        let (reply, receipt) = bounded(1);
        let sent = match self.tx.lock().as_ref() {
            Some(tx) => tx
                .send(WriteCommand::Set {
                    key,
                    value,
                    reply: reply.clone(),
                })
                .is_ok(),
            None => false,
        };
        if !sent {
            let _ = reply.send(Err(StoreError::WriterClosed));
        }
        SaveReceipt::new(receipt)
    }

    pub(super) fn flush(&self) {
        let (ack, done) = bounded(1);
        let queued = self
            .tx
            .lock()
            .as_ref()
            .map(|tx| tx.send(WriteCommand::Flush(ack)).is_ok())
            .unwrap_or(false);
        if queued {
            let _ = done.recv();
        }
    }
}

impl Drop for WriteBehind {
    fn drop(&mut self) {
        self.tx.lock().take();
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                tracing::error!("store writer thread panicked");
            }
        }
    }
}
