//! Data-changed fan-out for store observers.
//!
//! Callbacks run on a dedicated `store-notify` thread so that ingestion never
//! waits on UI code. Async consumers can watch a revision counter instead.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;

const NOTIFY_CHANNEL_SIZE: usize = 1;

pub type DataChangedCallback = Arc<dyn Fn() + Send + Sync>;

pub(crate) struct ChangeNotifier {
    observers: Arc<RwLock<Vec<DataChangedCallback>>>,
    sender: Option<SyncSender<()>>,
    revision: watch::Sender<u64>,
}

impl ChangeNotifier {
    pub(crate) fn new() -> Self {
        let observers: Arc<RwLock<Vec<DataChangedCallback>>> = Arc::new(RwLock::new(Vec::new()));
        let (sender, receiver) = sync_channel(NOTIFY_CHANNEL_SIZE);
        let observers_clone = observers.clone();
        let sender = match std::thread::Builder::new()
            .name("store-notify".to_string())
            .spawn(move || notify_loop(receiver, observers_clone))
        {
            Ok(_) => Some(sender),
            Err(err) => {
                tracing::warn!(error = %err, "store-notify thread unavailable, callbacks disabled");
                None
            }
        };
        let (revision, _) = watch::channel(0);

        Self {
            observers,
            sender,
            revision,
        }
    }

    pub(crate) fn add_observer(&self, callback: DataChangedCallback) {
        self.observers.write().push(callback);
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Fire-and-forget. A pending wake-up already covers this change, so a
    /// full channel is not an error.
    pub(crate) fn notify(&self) {
        self.revision.send_modify(|revision| *revision += 1);
        if let Some(sender) = &self.sender {
            match sender.try_send(()) {
                Ok(()) | Err(TrySendError::Full(())) => {}
                Err(TrySendError::Disconnected(())) => {
                    tracing::trace!("store-notify thread gone");
                }
            }
        }
    }
}

fn notify_loop(receiver: Receiver<()>, observers: Arc<RwLock<Vec<DataChangedCallback>>>) {
    while receiver.recv().is_ok() {
        let callbacks = observers.read().clone();
        for callback in callbacks {
            callback();
        }
    }
}
