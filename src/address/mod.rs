use std::fmt::Debug;

pub mod primitive;
pub mod resolve;
pub mod rest;

pub use primitive::{LocalAddress, Method};
pub use resolve::{resolve, AddressError, AddressOverride};
pub use rest::{PartialAddress, RestAddress};

/// Separator of address components in the serialized form (`domain|action|method|instance`).
pub const SEPARATOR: char = '|';

/// Something that names exactly one slot of the state tree.
///
/// Two addresses that compare equal always resolve to the same slot.
pub trait Address: Eq + Clone + Debug + Send + Sync + 'static {
    /// The innermost component (the key of the slot in its parent).
    fn own_name(&self) -> String;

    /// The whole path from the root of the tree.
    fn as_parts(&self) -> Vec<String>;
}

/// A container that knows how to read a value of `Self::Value` at an address `A`.
pub trait Addressable<A: Address> {
    type Value: Clone;

    fn read(&self, addr: &A) -> Option<Self::Value>;
}

/// Split on `/`, drop empty segments and rejoin with a single `/`.
///
/// `"/users/"`, `"users"` and `"//users"` all normalize to `"users"`.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
