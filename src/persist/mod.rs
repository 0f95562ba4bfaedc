//! Best-effort persistence of the state tree.
//!
//! A [`Persister`] keeps one serialized copy of the tree. [`attach`] turns it into a
//! passive observer of a [`Store`]: after every transition the tree is serialized and
//! handed to a background writer. Failures are logged and dropped; they never reach
//! the request lifecycle.

use std::sync::Arc;

use derive_more::{Display, From};
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle};

use crate::store::Store;

#[cfg(feature = "fs")]
pub mod fs;
pub mod memory;

#[cfg(feature = "fs")]
pub use fs::FilePersister;
pub use memory::MemoryPersister;

#[derive(Error, Display, Debug, From)]
pub enum PersistError {
    StdIoError(std::io::Error),
    SerdeError(serde_json::Error),
}

/// Storage for one serialized copy of the state tree.
pub trait Persister: Send + Sync + 'static {
    /// `None` when nothing has been saved yet.
    fn load(&self) -> BoxFuture<'_, Result<Option<String>, PersistError>>;

    fn save(&self, serialized: String) -> BoxFuture<'_, Result<(), PersistError>>;

    fn clear(&self) -> BoxFuture<'_, Result<(), PersistError>>;
}

/// Save the tree after every transition of `store`.
///
/// Snapshots are coalesced: a slow `save` only ever writes the latest one. The
/// writer stops when the store is dropped. Must be called inside a tokio runtime.
pub fn attach(store: &Store, persister: Arc<dyn Persister>) -> JoinHandle<()> {
    let (tx, mut rx) = watch::channel(None::<String>);

    store.observe(move |state, _| match serde_json::to_string(state) {
        Ok(serialized) => {
            tx.send_replace(Some(serialized));
        }
        Err(e) => tracing::debug!("state not serializable, skipping save: {e}"),
    });

    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let Some(serialized) = rx.borrow_and_update().clone() else {
                continue;
            };

            if let Err(e) = persister.save(serialized).await {
                tracing::debug!("failed to persist state: {e}");
            }
        }
    })
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::{
        address::{LocalAddress, Method, RestAddress},
        state::Transition,
    };

    #[tokio::test]
    async fn attached_persister_follows_the_store() -> Result<(), anyhow::Error> {
        let store = Store::new();
        let persister = Arc::new(MemoryPersister::default());
        let _writer = attach(&store, persister.clone());

        let addr = RestAddress::new("orders", "list", Method::Get);
        store.dispatch(Transition::data(addr.clone(), json!([1, 2])));
        store.dispatch(Transition::local(LocalAddress::new("theme", true), json!("dark")));

        let mut saved = None;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            saved = persister.load().await?;
            if saved.as_deref().map_or(false, |s| s.contains("LOCAL-PERSIST")) {
                break;
            }
        }

        let restored = Store::new();
        restored.restore(persister.as_ref()).await?;
        assert_eq!(
            restored.entry(&addr).and_then(|e| e.data),
            Some(json!([1, 2]))
        );
        assert!(saved.is_some());
        Ok(())
    }
}
