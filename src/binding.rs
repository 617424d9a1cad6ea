//! Binding adapter between live queries and a display layer
//!
//! `BindingAdapter` turns the store's push emissions into a read-only
//! `ViewState` held in a `tokio::sync::watch` channel, which any renderer
//! (the CLI `watch` command, the HTTP server) can read or await.
//! `FactsViewModel` adds the two user actions on top.

use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::fact::Fact;
use crate::fetch::FactSource;
use crate::live::SubscriptionHandle;
use crate::storage::{Commit, Store};
use crate::{Error, Result};

/// What the display layer should show besides the list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum Status {
    #[default]
    Idle,
    Fetching,
    Error(String),
    /// The store went away; the list is frozen at its last value
    Disconnected,
}

/// Observable state for a display layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub facts: Vec<Fact>,
    pub revision: u64,
    pub status: Status,
    /// False once the live query has ended. The list no longer follows the
    /// store and the status stays where the stream left it.
    pub live: bool,
}

/// Republishes every live query emission as the current `ViewState`.
///
/// The subscription is opened on [`attach`](Self::attach), which returns
/// once the initial snapshot is in the state, and cancelled when the
/// adapter is dropped.
pub struct BindingAdapter {
    state: Arc<watch::Sender<ViewState>>,
    subscription: SubscriptionHandle,
}

impl BindingAdapter {
    pub fn attach(store: &Store) -> Result<Self> {
        let mut live = store.subscribe()?;
        let subscription = live.handle();
        let initial = live.recv().ok_or(Error::StoreClosed)??;
        let (tx, _) = watch::channel(ViewState {
            facts: initial.facts,
            revision: initial.revision,
            status: Status::Idle,
            live: true,
        });
        let state = Arc::new(tx);

        let forward = state.clone();
        let handle = subscription.clone();
        thread::Builder::new()
            .name(format!("factsync-binding-{}", subscription.id()))
            .spawn(move || {
                while let Some(emission) = live.recv() {
                    match emission {
                        Ok(snapshot) => forward.send_modify(|view| {
                            view.facts = snapshot.facts;
                            view.revision = snapshot.revision;
                        }),
                        Err(e) => forward.send_modify(|view| {
                            view.status = Status::Error(e.to_string());
                            view.live = false;
                        }),
                    }
                }
                if !handle.is_cancelled() {
                    forward.send_if_modified(|view| {
                        if !view.live {
                            return false;
                        }
                        view.status = Status::Disconnected;
                        view.live = false;
                        true
                    });
                }
            })?;

        Ok(Self { state, subscription })
    }

    /// Current facts, in insertion order
    pub fn facts(&self) -> Vec<Fact> {
        self.state.borrow().facts.clone()
    }

    pub fn state(&self) -> ViewState {
        self.state.borrow().clone()
    }

    /// A receiver that is notified on every change of the view state
    pub fn watch(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    /// Status from a user action. Ignored once the live query has ended,
    /// so a stale list is never reported as healthy.
    pub(crate) fn set_status(&self, status: Status) {
        self.state.send_if_modified(|view| {
            if !view.live || view.status == status {
                return false;
            }
            view.status = status;
            true
        });
    }
}

impl Drop for BindingAdapter {
    fn drop(&mut self) {
        self.subscription.cancel();
    }
}

/// The two user actions plus the bound fact list.
///
/// Errors from either action are returned to the caller and also shown as
/// `Status::Error` in the view state.
pub struct FactsViewModel {
    store: Arc<Store>,
    source: Arc<dyn FactSource>,
    adapter: BindingAdapter,
}

impl FactsViewModel {
    pub fn new(store: Arc<Store>, source: Arc<dyn FactSource>) -> Result<Self> {
        let adapter = BindingAdapter::attach(&store)?;
        Ok(Self { store, source, adapter })
    }

    /// Fetch a batch from the source and append it to the store
    pub async fn fetch_facts(&self) -> Result<Commit> {
        self.adapter.set_status(Status::Fetching);
        let result = async {
            let facts = self.source.fetch().await?;
            self.store.append(facts).await
        }
        .await;
        self.finish(result)
    }

    /// Delete every stored fact
    pub async fn delete_facts(&self) -> Result<Commit> {
        let result = self.store.delete_all().await;
        self.finish(result)
    }

    fn finish(&self, result: Result<Commit>) -> Result<Commit> {
        match &result {
            Ok(_) => self.adapter.set_status(Status::Idle),
            Err(e) => self.adapter.set_status(Status::Error(e.to_string())),
        }
        result
    }

    pub fn facts(&self) -> Vec<Fact> {
        self.adapter.facts()
    }

    pub fn state(&self) -> ViewState {
        self.adapter.state()
    }

    pub fn watch(&self) -> watch::Receiver<ViewState> {
        self.adapter.watch()
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::worker::tests::insert_unreadable_row;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::time::timeout;

    const TIMEOUT: Duration = Duration::from_secs(5);

    struct StaticSource(Vec<&'static str>);

    #[async_trait]
    impl FactSource for StaticSource {
        async fn fetch(&self) -> Result<Vec<Fact>> {
            Ok(self.0.iter().map(|text| Fact::new(*text)).collect())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl FactSource for FailingSource {
        async fn fetch(&self) -> Result<Vec<Fact>> {
            Err(Error::Status(500))
        }
    }

    async fn wait_until(rx: &mut watch::Receiver<ViewState>, f: impl FnMut(&ViewState) -> bool) -> ViewState {
        timeout(TIMEOUT, rx.wait_for(f))
            .await
            .expect("view state did not settle")
            .expect("binding closed")
            .clone()
    }

    #[tokio::test]
    async fn test_adapter_reflects_store() {
        let store = Store::open_in_memory().unwrap();
        let adapter = BindingAdapter::attach(&store).unwrap();
        let mut rx = adapter.watch();

        let a = Fact::new("a");
        let b = Fact::new("b");
        store.append(vec![a.clone()]).await.unwrap();
        store.append(vec![b.clone()]).await.unwrap();

        let view = wait_until(&mut rx, |v| v.revision == 2).await;
        assert_eq!(view.facts, vec![a, b]);
        assert_eq!(adapter.facts().len(), 2);

        store.delete_all().await.unwrap();
        let view = wait_until(&mut rx, |v| v.revision == 3).await;
        assert!(view.facts.is_empty());
    }

    #[tokio::test]
    async fn test_attach_loads_existing_facts() {
        let store = Store::open_in_memory().unwrap();
        let stored = Fact::new("already stored");
        store.append(vec![stored.clone()]).await.unwrap();

        let adapter = BindingAdapter::attach(&store).unwrap();
        assert_eq!(adapter.facts(), vec![stored.clone()]);

        // A receiver taken later still reads the current list without
        // waiting for a change
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut rx = adapter.watch();
        let view = rx.borrow_and_update().clone();
        assert_eq!(view.facts, vec![stored]);
        assert_eq!(view.revision, 1);
        assert!(view.live);
    }

    #[tokio::test]
    async fn test_drop_releases_subscription() {
        let store = Store::open_in_memory().unwrap();
        let adapter = BindingAdapter::attach(&store).unwrap();
        let mut rx = adapter.watch();
        drop(adapter);

        // The forwarding thread exits once the subscription is released,
        // which closes the channel.
        timeout(TIMEOUT, async {
            while rx.changed().await.is_ok() {}
        })
        .await
        .expect("binding thread still running");
        assert_eq!(rx.borrow().status, Status::Idle);
    }

    #[tokio::test]
    async fn test_store_shutdown_marks_disconnected() {
        let store = Store::open_in_memory().unwrap();
        let adapter = BindingAdapter::attach(&store).unwrap();
        let mut rx = adapter.watch();
        drop(store);

        let view = wait_until(&mut rx, |v| v.status == Status::Disconnected).await;
        assert!(view.facts.is_empty());
        assert!(!view.live);
    }

    #[tokio::test]
    async fn test_stream_error_survives_later_actions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.db");
        let store = Arc::new(Store::open(&path).unwrap());
        let vm = FactsViewModel::new(store, Arc::new(StaticSource(vec!["Dogs dream"]))).unwrap();
        let mut rx = vm.watch();

        insert_unreadable_row(&path);
        vm.fetch_facts().await.unwrap();
        let view = wait_until(&mut rx, |v| !v.live).await;
        assert!(matches!(view.status, Status::Error(_)));

        vm.delete_facts().await.unwrap();
        vm.fetch_facts().await.unwrap();

        let state = vm.state();
        assert!(!state.live);
        assert!(matches!(state.status, Status::Error(_)));
    }

    #[tokio::test]
    async fn test_view_model_fetch_and_delete() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let source = Arc::new(StaticSource(vec!["Dogs have wet noses", "Dogs dream"]));
        let vm = FactsViewModel::new(store, source).unwrap();
        let mut rx = vm.watch();

        let commit = vm.fetch_facts().await.unwrap();
        assert_eq!(commit.affected, 2);

        let view = wait_until(&mut rx, |v| v.facts.len() == 2).await;
        assert_eq!(view.facts[0].text, "Dogs have wet noses");
        assert_eq!(view.status, Status::Idle);

        vm.delete_facts().await.unwrap();
        let view = wait_until(&mut rx, |v| v.facts.is_empty()).await;
        assert_eq!(view.status, Status::Idle);
    }

    #[tokio::test]
    async fn test_view_model_surfaces_fetch_error() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let vm = FactsViewModel::new(store, Arc::new(FailingSource)).unwrap();

        let err = vm.fetch_facts().await.unwrap_err();
        assert!(matches!(err, Error::Status(500)));

        let state = vm.state();
        assert!(matches!(state.status, Status::Error(ref msg) if msg.contains("500")));
        assert!(state.facts.is_empty());
    }
}
