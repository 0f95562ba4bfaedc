use std::sync::Arc;

use futures::{future::BoxFuture, FutureExt};
use tokio::sync::RwLock;

use super::{PersistError, Persister};

/// Keeps the serialized tree in a shared in-memory cell.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersister {
    value: Arc<RwLock<Option<String>>>,
}

impl MemoryPersister {
    pub fn new(value: Option<String>) -> Self {
        MemoryPersister {
            value: Arc::new(RwLock::new(value)),
        }
    }
}

impl Persister for MemoryPersister {
    fn load(&self) -> BoxFuture<'_, Result<Option<String>, PersistError>> {
        async move { Ok(self.value.read().await.clone()) }.boxed()
    }

    fn save(&self, serialized: String) -> BoxFuture<'_, Result<(), PersistError>> {
        async move {
            *self.value.write().await = Some(serialized);
            Ok(())
        }
        .boxed()
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), PersistError>> {
        async move {
            *self.value.write().await = None;
            Ok(())
        }
        .boxed()
    }
}
