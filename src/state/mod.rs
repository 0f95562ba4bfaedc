//! The keyed state tree and the transitions that mutate it.

pub mod entry;
pub mod reducer;
pub mod transition;
pub mod tree;

pub use entry::{Entry, DEFAULT_ERROR_MESSAGE};
pub use reducer::reduce;
pub use transition::{Change, Transition, WireError, WireTransition};
pub use tree::{ActionNode, DomainNode, MethodNode, RootState};
