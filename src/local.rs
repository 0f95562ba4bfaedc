use std::collections::BTreeMap;

use futures::{future, Stream, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio_stream::wrappers::WatchStream;

use crate::{
    address::LocalAddress,
    location::Location,
    state::RootState,
    store::Store,
};

/// A typed value in the `LOCAL` (or, when persisted, `LOCAL-PERSIST`) namespace.
///
/// Reads fall back to the slot's default while nothing (or nothing of type `T`)
/// is stored.
#[derive(Clone, Debug)]
pub struct LocalSlot<T> {
    location: Location<LocalAddress>,
    default: T,
}

impl<T> LocalSlot<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(store: &Store, key: &str, persist: bool, default: T) -> Self {
        LocalSlot {
            location: store.sub(LocalAddress::new(key, persist)),
            default,
        }
    }

    pub fn address(&self) -> &LocalAddress {
        &self.location.address
    }

    pub fn get(&self) -> T {
        self.location.store.select(self.selector())
    }

    pub fn set(&self, value: &T) -> Result<(), serde_json::Error> {
        self.location.set(serde_json::to_value(value)?);
        Ok(())
    }

    pub fn is_set(&self) -> bool {
        self.location.get().is_some()
    }

    /// Write the default unless something is stored already. Returns whether it wrote.
    pub fn ensure_default(&self) -> Result<bool, serde_json::Error> {
        if self.is_set() {
            return Ok(false);
        }

        self.set(&self.default)?;
        Ok(true)
    }

    /// Pure selector of the typed value, default included.
    pub fn selector(&self) -> impl Fn(&RootState) -> T + Clone + Send + Sync {
        let address = self.location.address.clone();
        let default = self.default.clone();

        move |state| {
            state
                .local(&address)
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_else(|| default.clone())
        }
    }

    /// Selector of the whole namespace this slot lives in.
    pub fn namespace_selector(&self) -> impl Fn(&RootState) -> BTreeMap<String, Value> + Clone {
        let persist = self.location.address.persist;
        move |state| state.local_namespace(persist).clone()
    }

    /// The current value first, then one per change of the stored value.
    pub fn watch(&self) -> impl Stream<Item = T> + Send + 'static {
        let location = self.location.clone();
        let selector = self.selector();
        let mut last: Option<Option<Value>> = None;

        WatchStream::new(location.store.subscribe()).filter_map(move |_| {
            let raw = location.get();
            let changed = last.as_ref() != Some(&raw);
            last = Some(raw);

            future::ready(changed.then(|| location.store.select(&selector)))
        })
    }
}
