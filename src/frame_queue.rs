use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::CancelToken;

/// Outcome of a blocking pull from the queue.
#[derive(Debug, PartialEq)]
pub enum Pull<T> {
    Item(T),
    Exhausted,
    Cancelled,
}

/// Producer half. Blocks on `push` while the queue is full.
pub struct QueueWriter<T> {
    tx: Sender<T>,
    done: Arc<AtomicBool>,
}

/// Consumer half. Tells a slow producer apart from a finished one.
pub struct QueueReader<T> {
    rx: Receiver<T>,
    done: Arc<AtomicBool>,
    poll: Duration,
}

impl<T> fmt::Debug for QueueReader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueReader")
            .field("len", &self.rx.len())
            .field("capacity", &self.rx.capacity())
            .field("done", &self.is_done())
            .finish()
    }
}

/// Bounded single-producer/single-consumer FIFO with a `done` flag.
pub fn bounded<T>(capacity: usize, poll: Duration) -> (QueueWriter<T>, QueueReader<T>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    let done = Arc::new(AtomicBool::new(false));

    (
        QueueWriter {
            tx,
            done: done.clone(),
        },
        QueueReader { rx, done, poll },
    )
}

impl<T> QueueWriter<T> {
    /// Returns `false` once the reader is gone.
    #[inline]
    pub fn push(&self, item: T) -> bool {
        self.tx.send(item).is_ok()
    }

    /// Publishes end-of-stream. Dropping the writer does the same.
    pub fn finish(self) {}
}

impl<T> Drop for QueueWriter<T> {
    fn drop(&mut self) {
        self.done.store(true, Ordering::Release);
    }
}

impl<T> QueueReader<T> {
    #[inline]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> Option<usize> {
        self.rx.capacity()
    }

    /// Empty and the producer has signalled end-of-stream.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.is_done() && self.rx.is_empty()
    }

    /// Waits for the next item. An empty queue whose producer is still
    /// running is waited on, never reported as the end.
    pub fn pull(&self, cancel: &CancelToken) -> Pull<T> {
        loop {
            if cancel.is_cancelled() {
                return Pull::Cancelled;
            }

            match self.rx.recv_timeout(self.poll) {
                Ok(item) => return Pull::Item(item),
                Err(RecvTimeoutError::Timeout) => {
                    if self.is_exhausted() {
                        return Pull::Exhausted;
                    }

                    tracing::trace!("frame queue empty, waiting for producer");
                }
                Err(RecvTimeoutError::Disconnected) => return Pull::Exhausted,
            }
        }
    }
}
