use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;

use crate::{
    address::{Address, Addressable, LocalAddress, RestAddress},
    location::Location,
    persist::{PersistError, Persister},
    state::{reduce, Entry, RootState, Transition, WireError, WireTransition},
    util::time::unix_now,
};

/// Passive observer of the store, called after every transition with the new tree.
///
/// Observers run while the tree is read-locked. They may read, through the state they
/// are given or through the store, but must not dispatch.
pub type StateObserver = Arc<dyn Fn(&RootState, &Transition) + Send + Sync>;

/// The single shared state tree of an application.
///
/// Cloning is cheap and every clone refers to the same tree. The only way to change
/// the tree is [`Store::dispatch`]; everything else is a snapshot read.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: RwLock<RootState>,
    revision: watch::Sender<u64>,
    observers: RwLock<Vec<StateObserver>>,
}

impl Default for Store {
    fn default() -> Self {
        Store::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("revision", &*self.inner.revision.borrow())
            .finish_non_exhaustive()
    }
}

impl Store {
    pub fn new() -> Self {
        Store::with_state(RootState::default())
    }

    pub fn with_state(state: RootState) -> Self {
        let (revision, _) = watch::channel(0);

        Store {
            inner: Arc::new(StoreInner {
                state: RwLock::new(state),
                revision,
                observers: RwLock::new(vec![]),
            }),
        }
    }

    /// Apply a transition, then notify observers and subscribers.
    pub fn dispatch(&self, transition: Transition) {
        let now = unix_now();

        match &transition {
            Transition::Rest { address, change } => {
                tracing::debug!("{address}: {}", change.discriminator())
            }
            Transition::Local { address, .. } => tracing::debug!("{address}"),
            Transition::Logout => tracing::debug!("logout"),
        }

        let mut state = self.inner.state.write();
        reduce(&mut state, &transition, now);
        let state = parking_lot::RwLockWriteGuard::downgrade(state);

        let observers = self.inner.observers.read().clone();
        for observer in &observers {
            observer(&state, &transition);
        }
        drop(state);

        self.inner.revision.send_modify(|r| *r += 1);
    }

    /// Dispatch a transition given in its `{type, payload}` form.
    pub fn dispatch_wire(&self, wire: WireTransition) -> Result<(), WireError> {
        self.dispatch(Transition::try_from(wire)?);
        Ok(())
    }

    /// Run a selector against the current tree.
    ///
    /// The read lock is taken recursively so that observers can select while a
    /// dispatch from another thread waits for the write lock.
    pub fn select<T>(&self, selector: impl FnOnce(&RootState) -> T) -> T {
        selector(&self.inner.state.read_recursive())
    }

    /// A copy of the whole tree.
    pub fn snapshot(&self) -> RootState {
        self.select(RootState::clone)
    }

    /// The raw entry at `address`, if anything was ever written there.
    pub fn entry(&self, address: &RestAddress) -> Option<Entry> {
        self.select(|state| state.entry(address).cloned())
    }

    pub fn local(&self, address: &LocalAddress) -> Option<serde_json::Value> {
        self.select(|state| state.local(address).cloned())
    }

    /// Read through any address the tree understands.
    pub fn read<A: Address>(&self, address: &A) -> Option<<RootState as Addressable<A>>::Value>
    where
        RootState: Addressable<A>,
    {
        self.select(|state| <RootState as Addressable<A>>::read(state, address))
    }

    /// Revision counter, bumped after every transition.
    pub fn revision(&self) -> u64 {
        *self.inner.revision.borrow()
    }

    /// A receiver that changes after every transition.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Register a passive observer; see [`StateObserver`].
    pub fn observe(&self, observer: impl Fn(&RootState, &Transition) + Send + Sync + 'static) {
        self.inner.observers.write().push(Arc::new(observer));
    }

    /// Wipe the whole tree.
    pub fn logout(&self) {
        self.dispatch(Transition::Logout);
    }

    /// Replace the tree with a previously persisted one, rehydrated.
    ///
    /// Returns `false` (and leaves the tree alone) when nothing was persisted.
    pub async fn restore<P: Persister + ?Sized>(&self, persister: &P) -> Result<bool, PersistError> {
        let Some(serialized) = persister.load().await? else {
            return Ok(false);
        };

        let restored = serde_json::from_str::<RootState>(&serialized)?.rehydrate(unix_now());
        *self.inner.state.write() = restored;
        self.inner.revision.send_modify(|r| *r += 1);

        Ok(true)
    }

    /// A location in this store.
    pub fn sub<A: Address>(&self, address: A) -> Location<A>
    where
        RootState: Addressable<A>,
    {
        Location::new(address, self.clone())
    }
}
