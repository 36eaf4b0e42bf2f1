use std::sync::{Arc, RwLock};

use refd_types::{LibraryId, ObjectKey};
use tracing::warn;

use crate::error::{IndexError, IndexResult};

/// What the search index should do with an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexOp {
    /// (Re)index the object's current content.
    Index,
    /// Remove the object from the index.
    Delete,
}

/// A notification as it sits on the queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedNotification {
    pub library: LibraryId,
    pub key: ObjectKey,
    pub op: IndexOp,
}

/// Transport that carries notifications to the index workers.
pub trait IndexQueue: Send + Sync {
    fn enqueue(&self, notification: QueuedNotification) -> IndexResult<()>;
}

/// Fire-and-forget front door for index notifications.
///
/// `notify` never fails: an enqueue error means the index will lag until its
/// next rebuild, which reads are already required to tolerate.
pub struct IndexNotifier {
    queue: Arc<dyn IndexQueue>,
}

impl IndexNotifier {
    pub fn new(queue: Arc<dyn IndexQueue>) -> Self {
        Self { queue }
    }

    pub fn notify(&self, library: LibraryId, key: ObjectKey, op: IndexOp) {
        let notification = QueuedNotification { library, key, op };
        if let Err(err) = self.queue.enqueue(notification) {
            warn!(%library, %key, ?op, %err, "failed to enqueue index notification");
        }
    }
}

/// In-memory queue for tests and embedding.
pub struct MemoryIndexQueue {
    entries: RwLock<Vec<QueuedNotification>>,
    broken: RwLock<bool>,
}

impl MemoryIndexQueue {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            broken: RwLock::new(false),
        }
    }

    /// Make every subsequent enqueue fail, for testing the swallow path.
    pub fn set_broken(&self, broken: bool) {
        *self.broken.write().expect("lock poisoned") = broken;
    }

    /// Drain everything enqueued so far.
    pub fn drain(&self) -> Vec<QueuedNotification> {
        std::mem::take(&mut *self.entries.write().expect("lock poisoned"))
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryIndexQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexQueue for MemoryIndexQueue {
    fn enqueue(&self, notification: QueuedNotification) -> IndexResult<()> {
        if *self.broken.read().expect("lock poisoned") {
            return Err(IndexError::QueueUnavailable("queue offline".into()));
        }
        self.entries
            .write()
            .expect("lock poisoned")
            .push(notification);
        Ok(())
    }
}
