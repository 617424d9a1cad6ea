//! Serialized store handle
//!
//! `Store` owns a dedicated worker thread which in turn owns the only
//! `SqliteStore`. Every mutation, read and subscription request is a command
//! on one FIFO channel, so mutations never race and are applied in
//! submission order. Callers never block on submission; they get a
//! [`Pending`] receipt they may await, wait on, or drop.

use std::future::{Future, IntoFuture};
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use tokio::sync::oneshot;

use super::sqlite::{DbStats, SqliteStore};
use crate::fact::{Fact, FactId};
use crate::live::{LiveQuery, Snapshot};
use crate::{Error, Result};

/// Outcome of a committed mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Commit {
    /// Store revision after this commit. Unchanged if nothing was affected.
    pub revision: u64,
    /// Number of facts inserted or removed
    pub affected: usize,
}

/// A mutation request
#[derive(Debug)]
pub(crate) enum Mutation {
    Append(Vec<Fact>),
    DeleteAll,
    DeleteOne(FactId),
    DeleteMany(Vec<FactId>),
}

impl Mutation {
    fn name(&self) -> &'static str {
        match self {
            Mutation::Append(_) => "append",
            Mutation::DeleteAll => "delete_all",
            Mutation::DeleteOne(_) => "delete_one",
            Mutation::DeleteMany(_) => "delete_many",
        }
    }
}

/// Message sent from store handles to the worker
pub(crate) enum Command {
    Mutate {
        mutation: Mutation,
        reply: oneshot::Sender<Result<Commit>>,
    },
    Snapshot {
        reply: oneshot::Sender<Result<Snapshot>>,
    },
    Stats {
        reply: oneshot::Sender<Result<DbStats>>,
    },
    Subscribe {
        id: u64,
        tx: Sender<Result<Snapshot>>,
    },
    Unsubscribe {
        id: u64,
    },
    Shutdown,
}

/// Receipt for a request submitted to the store worker.
///
/// Await it (`store.append(facts).await?`) from async code or call
/// [`Pending::wait`] from a plain thread. Dropping it does not cancel the
/// request.
#[must_use = "dropping a Pending ignores the outcome; the request still runs"]
pub struct Pending<T = Commit> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Pending<T> {
    /// Block the current thread until the worker has processed the request.
    ///
    /// Panics if called from within an async runtime; await the receipt there.
    pub fn wait(self) -> Result<T> {
        self.rx.blocking_recv().unwrap_or(Err(Error::StoreClosed))
    }
}

impl<T: Send + 'static> IntoFuture for Pending<T> {
    type Output = Result<T>;
    type IntoFuture = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.rx.await.unwrap_or(Err(Error::StoreClosed)) })
    }
}

/// Handle to the fact store.
///
/// Construct one per process and share it by reference or `Arc`. Dropping
/// the last handle drains queued commands, stops the worker and ends every
/// open [`LiveQuery`].
pub struct Store {
    commands: Sender<Command>,
    worker: Option<thread::JoinHandle<()>>,
    next_subscription: AtomicU64,
}

impl Store {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        tracing::debug!("Opening fact store at {}", path.display());
        Self::spawn(SqliteStore::open(path)?)
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::spawn(SqliteStore::open_in_memory()?)
    }

    /// Move an opened database onto a new worker thread
    pub fn spawn(db: SqliteStore) -> Result<Self> {
        let (tx, rx) = channel::unbounded::<Command>();
        let worker = Worker {
            db,
            revision: 0,
            subscribers: Vec::new(),
        };
        let handle = thread::Builder::new()
            .name("factsync-store".to_string())
            .spawn(move || worker.run(rx))?;

        Ok(Self {
            commands: tx,
            worker: Some(handle),
            next_subscription: AtomicU64::new(1),
        })
    }

    /// Insert facts as one transaction
    pub fn append(&self, facts: Vec<Fact>) -> Pending {
        self.mutate(Mutation::Append(facts))
    }

    /// Remove every fact
    pub fn delete_all(&self) -> Pending {
        self.mutate(Mutation::DeleteAll)
    }

    /// Remove the fact with this id; absent ids are a no-op
    pub fn delete_one(&self, id: FactId) -> Pending {
        self.mutate(Mutation::DeleteOne(id))
    }

    /// Remove every fact whose id is listed
    pub fn delete_many(&self, ids: Vec<FactId>) -> Pending {
        self.mutate(Mutation::DeleteMany(ids))
    }

    /// Read the current facts, ordered after every request already submitted
    pub fn snapshot(&self) -> Pending<Snapshot> {
        self.request(|reply| Command::Snapshot { reply })
    }

    pub fn stats(&self) -> Pending<DbStats> {
        self.request(|reply| Command::Stats { reply })
    }

    /// Open a live query over all facts.
    ///
    /// The first emission is the state after every request submitted before
    /// this call.
    pub fn subscribe(&self) -> Result<LiveQuery> {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = channel::unbounded();
        self.commands
            .send(Command::Subscribe { id, tx })
            .map_err(|_| Error::StoreClosed)?;
        Ok(LiveQuery::new(id, rx, self.commands.clone()))
    }

    fn mutate(&self, mutation: Mutation) -> Pending {
        self.request(|reply| Command::Mutate { mutation, reply })
    }

    fn request<T>(&self, build: impl FnOnce(oneshot::Sender<Result<T>>) -> Command) -> Pending<T> {
        let (reply, rx) = oneshot::channel();
        // On a closed store the command, and with it `reply`, is dropped here;
        // the receipt then resolves to `StoreClosed`.
        let _ = self.commands.send(build(reply));
        Pending { rx }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!("Store worker panicked");
            }
        }
    }
}

/// State owned by the worker thread
struct Worker {
    db: SqliteStore,
    revision: u64,
    subscribers: Vec<(u64, Sender<Result<Snapshot>>)>,
}

impl Worker {
    fn run(mut self, rx: Receiver<Command>) {
        tracing::debug!("Store worker started");
        for command in rx {
            match command {
                Command::Mutate { mutation, reply } => {
                    let result = self.apply(mutation);
                    let _ = reply.send(result);
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                Command::Stats { reply } => {
                    let _ = reply.send(self.db.stats());
                }
                Command::Subscribe { id, tx } => self.subscribe(id, tx),
                Command::Unsubscribe { id } => {
                    self.subscribers.retain(|(sub_id, _)| *sub_id != id);
                    tracing::debug!("Live query {} cancelled", id);
                }
                Command::Shutdown => break,
            }
        }
        tracing::debug!(
            "Store worker stopped ({} live queries closed)",
            self.subscribers.len()
        );
    }

    fn apply(&mut self, mutation: Mutation) -> Result<Commit> {
        let name = mutation.name();
        let result = match mutation {
            Mutation::Append(facts) => self.db.append(&facts),
            Mutation::DeleteAll => self.db.delete_all(),
            Mutation::DeleteOne(id) => self.db.delete_one(&id),
            Mutation::DeleteMany(ids) => self.db.delete_many(&ids),
        };

        let affected = match result {
            Ok(affected) => affected,
            Err(e) => {
                tracing::error!("Store {} failed, state unchanged: {}", name, e);
                return Err(e);
            }
        };

        if affected > 0 {
            self.revision += 1;
            tracing::info!("Committed {} ({} facts, revision {})", name, affected, self.revision);
            self.publish();
        } else {
            tracing::debug!("Committed {} with no changes", name);
        }

        Ok(Commit {
            revision: self.revision,
            affected,
        })
    }

    fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            revision: self.revision,
            facts: self.db.all_facts()?,
        })
    }

    fn subscribe(&mut self, id: u64, tx: Sender<Result<Snapshot>>) {
        match self.snapshot() {
            Ok(snapshot) => {
                if tx.send(Ok(snapshot)).is_ok() {
                    self.subscribers.push((id, tx));
                    tracing::debug!("Live query {} opened", id);
                }
            }
            Err(e) => {
                tracing::error!("Live query {} failed to read initial snapshot: {}", id, e);
                let _ = tx.send(Err(Error::Subscription(e.to_string())));
            }
        }
    }

    /// Push the post-commit state to every subscriber, dropping the ones that
    /// went away. A failed read terminates every stream.
    fn publish(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }

        match self.snapshot() {
            Ok(snapshot) => {
                self.subscribers
                    .retain(|(_, tx)| tx.send(Ok(snapshot.clone())).is_ok());
            }
            Err(e) => {
                tracing::error!("Failed to read snapshot after commit: {}", e);
                let message = e.to_string();
                for (_, tx) in self.subscribers.drain(..) {
                    let _ = tx.send(Err(Error::Subscription(message.clone())));
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Write a row whose id is not a UUID behind the worker's back, so the
    /// next full read fails
    pub(crate) fn insert_unreadable_row(path: &Path) {
        rusqlite::Connection::open(path)
            .unwrap()
            .execute("INSERT INTO facts (id, text) VALUES ('not-a-uuid', 'broken')", [])
            .unwrap();
    }

    fn texts(snapshot: &Snapshot) -> Vec<&str> {
        snapshot.facts.iter().map(|f| f.text.as_str()).collect()
    }

    #[test]
    fn test_append_then_snapshot() {
        let store = Store::open_in_memory().unwrap();

        let commit = store.append(vec![Fact::new("a"), Fact::new("b")]).wait().unwrap();
        assert_eq!(commit, Commit { revision: 1, affected: 2 });

        let snapshot = store.snapshot().wait().unwrap();
        assert_eq!(snapshot.revision, 1);
        assert_eq!(texts(&snapshot), vec!["a", "b"]);
    }

    #[test]
    fn test_mutations_apply_in_submission_order() {
        let store = Store::open_in_memory().unwrap();
        let a = Fact::new("a");

        // Fire-and-forget submissions, then one read queued behind them
        let _ = store.append(vec![a.clone()]);
        let _ = store.append(vec![Fact::new("b")]);
        let _ = store.delete_one(a.id);
        let _ = store.append(vec![Fact::new("c")]);

        let snapshot = store.snapshot().wait().unwrap();
        assert_eq!(texts(&snapshot), vec!["b", "c"]);
        assert_eq!(snapshot.revision, 4);
    }

    #[test]
    fn test_failed_append_reports_and_keeps_state() {
        let store = Store::open_in_memory().unwrap();
        let a = Fact::new("a");
        store.append(vec![a.clone()]).wait().unwrap();

        let err = store
            .append(vec![Fact::new("b"), a.clone()])
            .wait()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateFact(id) if id == a.id));

        let snapshot = store.snapshot().wait().unwrap();
        assert_eq!(texts(&snapshot), vec!["a"]);
        assert_eq!(snapshot.revision, 1);
    }

    #[test]
    fn test_delete_absent_is_not_an_error() {
        let store = Store::open_in_memory().unwrap();
        store.append(vec![Fact::new("a")]).wait().unwrap();

        let commit = store.delete_one(FactId::generate()).wait().unwrap();
        assert_eq!(commit, Commit { revision: 1, affected: 0 });
    }

    #[test]
    fn test_delete_many_removes_only_listed() {
        let store = Store::open_in_memory().unwrap();
        let facts: Vec<Fact> = ["a", "b", "c"].into_iter().map(Fact::new).collect();
        store.append(facts.clone()).wait().unwrap();

        let commit = store.delete_many(vec![facts[0].id, facts[2].id]).wait().unwrap();
        assert_eq!(commit.affected, 2);
        assert_eq!(texts(&store.snapshot().wait().unwrap()), vec!["b"]);
    }

    #[test]
    fn test_live_query_sees_commits_in_order() {
        let store = Store::open_in_memory().unwrap();
        let mut live = store.subscribe().unwrap();

        let initial = live.recv_timeout(TIMEOUT).unwrap().unwrap();
        assert!(initial.facts.is_empty());

        let a = Fact::new("a");
        let b = Fact::new("b");
        let _ = store.append(vec![a.clone()]);
        let _ = store.append(vec![b.clone()]);

        let first = live.recv_timeout(TIMEOUT).unwrap().unwrap();
        assert_eq!(first.facts, vec![a.clone()]);
        let second = live.recv_timeout(TIMEOUT).unwrap().unwrap();
        assert_eq!(second.facts, vec![a, b]);
        assert!(second.revision > first.revision);

        let _ = store.delete_all();
        let cleared = live.recv_timeout(TIMEOUT).unwrap().unwrap();
        assert!(cleared.facts.is_empty());
    }

    #[test]
    fn test_unchanged_commit_does_not_emit() {
        let store = Store::open_in_memory().unwrap();
        let mut live = store.subscribe().unwrap();
        live.recv_timeout(TIMEOUT).unwrap().unwrap();

        store.delete_all().wait().unwrap();
        store.delete_one(FactId::generate()).wait().unwrap();
        assert!(live.try_recv().is_none());

        store.append(vec![Fact::new("x")]).wait().unwrap();
        let next = live.recv_timeout(TIMEOUT).unwrap().unwrap();
        assert_eq!(texts(&next), vec!["x"]);
    }

    #[test]
    fn test_failed_commit_does_not_emit() {
        let store = Store::open_in_memory().unwrap();
        let a = Fact::new("a");
        store.append(vec![a.clone()]).wait().unwrap();

        let mut live = store.subscribe().unwrap();
        live.recv_timeout(TIMEOUT).unwrap().unwrap();

        assert!(store.append(vec![a]).wait().is_err());
        assert!(live.try_recv().is_none());
    }

    #[test]
    fn test_subscribe_sees_prior_submissions() {
        let store = Store::open_in_memory().unwrap();
        let _ = store.append(vec![Fact::new("queued")]);

        let mut live = store.subscribe().unwrap();
        let initial = live.recv_timeout(TIMEOUT).unwrap().unwrap();
        assert_eq!(texts(&initial), vec!["queued"]);
    }

    #[test]
    fn test_drop_store_ends_live_queries() {
        let store = Store::open_in_memory().unwrap();
        let mut live = store.subscribe().unwrap();
        live.recv_timeout(TIMEOUT).unwrap().unwrap();

        drop(store);
        assert!(live.recv().is_none());
    }

    #[tokio::test]
    async fn test_pending_can_be_awaited() {
        let store = Store::open_in_memory().unwrap();
        let commit = store.append(vec![Fact::new("async")]).await.unwrap();
        assert_eq!(commit.affected, 1);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.facts, 1);
    }

    #[test]
    fn test_failed_read_after_commit_ends_every_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.db");
        let store = Store::open(&path).unwrap();
        let mut first = store.subscribe().unwrap();
        let mut second = store.subscribe().unwrap();
        first.recv_timeout(TIMEOUT).unwrap().unwrap();
        second.recv_timeout(TIMEOUT).unwrap().unwrap();

        insert_unreadable_row(&path);
        let commit = store.append(vec![Fact::new("a")]).wait().unwrap();
        assert_eq!(commit.affected, 1);

        for live in [&mut first, &mut second] {
            assert!(matches!(
                live.recv_timeout(TIMEOUT),
                Some(Err(Error::Subscription(_)))
            ));
            assert!(live.recv_timeout(TIMEOUT).is_none());
        }

        // Streams are gone; later commits publish to nobody
        store.delete_all().wait().unwrap();
        assert!(first.try_recv().is_none());
    }
}
