use serde_json::Value;

use crate::{
    address::{Address, Addressable, LocalAddress, RestAddress},
    state::{Change, Entry, RootState, Transition},
    store::Store,
};

/// A pair of a store and an address. You can pass this object around,
/// read the slot it points to and dispatch transitions at it.
#[derive(Clone, Debug)]
pub struct Location<A: Address> {
    pub store: Store,
    pub address: A,
}

impl<A: Address> Location<A>
where
    RootState: Addressable<A>,
{
    /// Typically it's better to use `store.sub(address)`
    pub fn new(address: A, store: Store) -> Self {
        Location { store, address }
    }

    /// The raw value at this address. `None` means nothing was written there.
    pub fn get(&self) -> Option<<RootState as Addressable<A>>::Value> {
        self.store.read(&self.address)
    }
}

impl Location<RestAddress> {
    /// The same address, tracked under a separate instance id.
    pub fn sub(self, instance: impl Into<String>) -> Location<RestAddress> {
        Location::new(self.address.with_instance(instance), self.store)
    }

    /// Pure selector of this slot.
    pub fn selector(&self) -> impl Fn(&RootState) -> Option<Entry> + Clone + Send + Sync {
        let address = self.address.clone();
        move |state| state.entry(&address).cloned()
    }

    /// Normalized entry; see [`Entry::normalize`].
    pub fn entry(&self, lazy: bool) -> Entry {
        self.store
            .select(|state| Entry::normalize(state.entry(&self.address), lazy))
    }

    pub fn dispatch(&self, change: Change) {
        self.store.dispatch(Transition::Rest {
            address: self.address.clone(),
            change,
        });
    }

    /// Put the synthesized default entry back. In-flight calls are not affected.
    pub fn reset(&self) {
        self.dispatch(Change::Reset);
    }
}

impl Location<LocalAddress> {
    pub fn set(&self, value: Value) {
        self.store
            .dispatch(Transition::local(self.address.clone(), value));
    }
}
