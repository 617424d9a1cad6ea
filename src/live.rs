//! Live queries over the fact store
//!
//! A live query yields the full, ordered fact list: once when it opens and
//! again after every commit that changed at least one fact. Emissions are
//! read on the store worker right after the commit, so they never show a
//! partial transaction and always arrive in commit order. There is no
//! coalescing; each changing commit produces exactly one snapshot.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use serde::Serialize;

use crate::Result;
use crate::fact::Fact;
use crate::storage::worker::Command;

/// Point-in-time view of every fact in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Number of changing commits since the store was opened
    pub revision: u64,
    /// Facts in insertion order
    pub facts: Vec<Fact>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

struct HandleInner {
    id: u64,
    cancelled: AtomicBool,
    commands: Sender<Command>,
}

/// Cloneable handle that can cancel a live query from any thread.
#[derive(Clone)]
pub struct SubscriptionHandle {
    inner: Arc<HandleInner>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Stop emissions and release the subscription.
    ///
    /// Calling it again is a no-op.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        // A closed store has already dropped every subscriber
        let _ = self.inner.commands.send(Command::Unsubscribe { id: self.inner.id });
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }
}

/// A subscription to the store's fact list.
///
/// Returns `None` once cancelled, after an error has been delivered, or
/// when the store shuts down. Dropping it cancels the subscription.
pub struct LiveQuery {
    rx: Receiver<Result<Snapshot>>,
    handle: SubscriptionHandle,
    done: bool,
}

impl LiveQuery {
    pub(crate) fn new(id: u64, rx: Receiver<Result<Snapshot>>, commands: Sender<Command>) -> Self {
        Self {
            rx,
            handle: SubscriptionHandle {
                inner: Arc::new(HandleInner {
                    id,
                    cancelled: AtomicBool::new(false),
                    commands,
                }),
            },
            done: false,
        }
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Block until the next emission
    pub fn recv(&mut self) -> Option<Result<Snapshot>> {
        if self.is_closed() {
            return None;
        }
        let item = self.rx.recv().ok();
        self.accept(item)
    }

    /// Next emission if one is already queued
    pub fn try_recv(&mut self) -> Option<Result<Snapshot>> {
        if self.is_closed() {
            return None;
        }
        match self.rx.try_recv() {
            Ok(item) => self.accept(Some(item)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => self.accept(None),
        }
    }

    /// Wait up to `timeout` for the next emission
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<Result<Snapshot>> {
        if self.is_closed() {
            return None;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(item) => self.accept(Some(item)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => self.accept(None),
        }
    }

    fn is_closed(&self) -> bool {
        self.done || self.handle.is_cancelled()
    }

    fn accept(&mut self, item: Option<Result<Snapshot>>) -> Option<Result<Snapshot>> {
        // Cancellation may have raced with the receive
        if self.handle.is_cancelled() {
            self.done = true;
            return None;
        }
        match item {
            Some(Ok(snapshot)) => Some(Ok(snapshot)),
            Some(Err(e)) => {
                tracing::warn!("Live query {} terminated: {}", self.handle.id(), e);
                self.done = true;
                Some(Err(e))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

impl Iterator for LiveQuery {
    type Item = Result<Snapshot>;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

impl Drop for LiveQuery {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}
