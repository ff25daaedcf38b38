//! # Handoff Module
//!
//! The two primitives that connect the producer thread to the rendering
//! context:
//!
//! - [`rendezvous`]: a one-shot startup handshake. The renderer signals once,
//!   the producer blocks until it does.
//! - [`column_queue`]: the steady-state FIFO that moves finished columns to
//!   the renderer without ever blocking the producer.
//!
//! Both are built on `crossbeam-channel`.

use crate::pixel_buffer::PixelBuffer;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering, fence};

/// A finished spectrum column, tagged with its submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub sequence: u64,
    pub pixels: PixelBuffer,
}

// --- Startup rendezvous ---

/// Render-side half of the startup handshake. Consumed by [`ReadySignal::signal`].
#[derive(Debug)]
pub struct ReadySignal<T> {
    tx: Sender<T>,
}

/// Producer-side half of the startup handshake. Consumed by [`ReadyWait::wait`].
#[derive(Debug)]
pub struct ReadyWait<T> {
    rx: Receiver<T>,
}

/// Creates a one-shot handshake carrying a value from the renderer to the producer.
pub fn rendezvous<T>() -> (ReadySignal<T>, ReadyWait<T>) {
    // Capacity 1 so the renderer never waits for the producer to show up.
    let (tx, rx) = crossbeam_channel::bounded(1);
    (ReadySignal { tx }, ReadyWait { rx })
}

impl<T> ReadySignal<T> {
    /// Hands `value` to the waiting producer. Returns `false` if the producer
    /// side no longer exists.
    pub fn signal(self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }
}

impl<T> ReadyWait<T> {
    /// Blocks until the renderer signals, with no timeout.
    ///
    /// Returns `None` if the render side was dropped without signalling.
    pub fn wait(self) -> Option<T> {
        self.rx.recv().ok()
    }
}

// --- Steady-state column queue ---

/// Capacity policy of the column queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum QueueBound {
    /// Columns queue up without limit while the renderer is behind.
    #[default]
    Unbounded,
    /// At most `capacity` queued columns; when full, the oldest queued column
    /// is dropped to make room for the new one.
    Bounded { capacity: usize },
}

/// What happened to a column handed to [`ColumnSender::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Queued,
    /// Queued after dropping this many older columns.
    QueuedAfterDrop(usize),
    /// The queue was already closed; the column was discarded.
    Disconnected,
    /// The queue closed while the column was going in. `reclaimed` columns,
    /// this one included if it was still queued, were pulled back out and
    /// discarded; `evicted` older ones were dropped on the way in.
    Reclaimed { evicted: usize, reclaimed: usize },
}

/// Producer end of the column queue.
#[derive(Debug)]
pub struct ColumnSender {
    tx: Sender<Column>,
    // Evicts the oldest column on overflow and reclaims columns that slipped
    // in after the queue was closed.
    rx: Receiver<Column>,
    closed: Arc<AtomicBool>,
}

/// Consumer end of the column queue.
///
/// Closing it, explicitly or by dropping it, turns every later send into a
/// no-op and releases whatever is still queued.
#[derive(Debug)]
pub struct ColumnReceiver {
    rx: Receiver<Column>,
    closed: Arc<AtomicBool>,
}

/// Creates the single-producer/single-consumer column queue.
pub fn column_queue(bound: QueueBound) -> (ColumnSender, ColumnReceiver) {
    let (tx, rx) = match bound {
        QueueBound::Unbounded => crossbeam_channel::unbounded(),
        QueueBound::Bounded { capacity } => crossbeam_channel::bounded(capacity.max(1)),
    };
    let closed = Arc::new(AtomicBool::new(false));
    let sender = ColumnSender {
        tx,
        rx: rx.clone(),
        closed: Arc::clone(&closed),
    };
    (sender, ColumnReceiver { rx, closed })
}

impl ColumnSender {
    /// Enqueues `column` without blocking.
    pub fn send(&self, column: Column) -> SendOutcome {
        if self.closed.load(Ordering::SeqCst) {
            return SendOutcome::Disconnected;
        }

        let mut pending = column;
        let mut evicted = 0;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => break,
                Err(TrySendError::Disconnected(_)) => return SendOutcome::Disconnected,
                Err(TrySendError::Full(column)) => {
                    pending = column;
                    // Only bounded queues fill up. An empty result means the
                    // renderer drained it in the meantime; just retry.
                    if self.rx.try_recv().is_ok() {
                        evicted += 1;
                    }
                }
            }
        }

        // Pairs with the fence in `ColumnReceiver::close`: either the closer's
        // drain sees this column, or this load sees the flag.
        fence(Ordering::SeqCst);
        if self.closed.load(Ordering::SeqCst) {
            let reclaimed = drain(&self.rx);
            return SendOutcome::Reclaimed { evicted, reclaimed };
        }
        match evicted {
            0 => SendOutcome::Queued,
            n => SendOutcome::QueuedAfterDrop(n),
        }
    }

    /// Columns currently waiting for the renderer.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ColumnReceiver {
    /// Next queued column, if any.
    pub fn try_recv(&self) -> Option<Column> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Closes the queue and discards everything in it.
    ///
    /// Returns how many columns were discarded here. Columns a concurrent
    /// sender gets in afterwards are reclaimed by that sender.
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        fence(Ordering::SeqCst);
        drain(&self.rx)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Underlying channel, for use in `crossbeam_channel::select!`.
    pub fn as_receiver(&self) -> &Receiver<Column> {
        &self.rx
    }
}

impl Drop for ColumnReceiver {
    fn drop(&mut self) {
        self.close();
    }
}

fn drain(rx: &Receiver<Column>) -> usize {
    let mut count = 0;
    while rx.try_recv().is_ok() {
        count += 1;
    }
    count
}
