use std::collections::VecDeque;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::shared::SharedState;
use crate::signature::ConcurrencyModel;

/// A bounded FIFO queue whose operations block the calling thread.
///
/// A capacity of zero means unbounded. Cloning yields another handle to the
/// same queue.
pub struct SyncQueue<T> {
    inner: Arc<QueueInner<T>>,
}

struct QueueInner<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> SyncQueue<T> {
    /// Create a queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                items: Mutex::new(VecDeque::new()),
                capacity,
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
            }),
        }
    }

    /// Create a queue without a capacity limit.
    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// Append an item, waiting while the queue is full.
    pub fn put(&self, item: T) {
        let mut items = self.inner.items.lock();
        while self.is_full(&items) {
            self.inner.not_full.wait(&mut items);
        }
        items.push_back(item);
        self.inner.not_empty.notify_one();
    }

    /// Append an item if there is room, handing it back otherwise.
    pub fn try_put(&self, item: T) -> Result<(), T> {
        let mut items = self.inner.items.lock();
        if self.is_full(&items) {
            return Err(item);
        }
        items.push_back(item);
        self.inner.not_empty.notify_one();
        Ok(())
    }

    /// Remove the oldest item, waiting while the queue is empty.
    pub fn get(&self) -> T {
        let mut items = self.inner.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                self.inner.not_full.notify_one();
                return item;
            }
            self.inner.not_empty.wait(&mut items);
        }
    }

    /// Remove the oldest item if there is one.
    pub fn try_get(&self) -> Option<T> {
        let item = self.inner.items.lock().pop_front();
        if item.is_some() {
            self.inner.not_full.notify_one();
        }
        item
    }

    /// The number of queued items.
    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    /// Whether no items are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The capacity, zero if unbounded.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    fn is_full(&self, items: &VecDeque<T>) -> bool {
        self.inner.capacity > 0 && items.len() >= self.inner.capacity
    }
}

impl<T> Clone for SyncQueue<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> Debug for SyncQueue<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("SyncQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl<T: Send + 'static> SharedState for SyncQueue<T> {
    fn model(&self) -> Option<ConcurrencyModel> {
        Some(ConcurrencyModel::Preemptible)
    }

    fn type_name(&self) -> &'static str {
        "SyncQueue"
    }
}

/// A bounded FIFO queue whose operations suspend instead of blocking.
///
/// A capacity of zero means unbounded. The queue owns both ends of its
/// channel, so it never closes while a handle exists.
pub struct AsyncQueue<T> {
    sender: async_channel::Sender<T>,
    receiver: async_channel::Receiver<T>,
}

impl<T> AsyncQueue<T> {
    /// Create a queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = if capacity == 0 {
            async_channel::unbounded()
        } else {
            async_channel::bounded(capacity)
        };
        Self { sender, receiver }
    }

    /// Create a queue without a capacity limit.
    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// Append an item, suspending while the queue is full.
    pub async fn put(&self, item: T) {
        self.sender
            .send(item)
            .await
            .expect("queue holds a receiver, so the channel is open");
    }

    /// Append an item if there is room, handing it back otherwise.
    pub fn try_put(&self, item: T) -> Result<(), T> {
        self.sender.try_send(item).map_err(|err| err.into_inner())
    }

    /// Remove the oldest item, suspending while the queue is empty.
    pub async fn get(&self) -> T {
        self.receiver
            .recv()
            .await
            .expect("queue holds a sender, so the channel is open")
    }

    /// Remove the oldest item if there is one.
    pub fn try_get(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// The number of queued items.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether no items are queued.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// The capacity, zero if unbounded.
    pub fn capacity(&self) -> usize {
        self.sender.capacity().unwrap_or(0)
    }
}

impl<T> Clone for AsyncQueue<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
        }
    }
}

impl<T> Debug for AsyncQueue<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("AsyncQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl<T: Send + 'static> SharedState for AsyncQueue<T> {
    fn model(&self) -> Option<ConcurrencyModel> {
        Some(ConcurrencyModel::Cooperative)
    }

    fn type_name(&self) -> &'static str {
        "AsyncQueue"
    }
}
