//! # reststore
//!
//! `reststore` keeps the state of REST calls in one observable, keyed tree. Every call made
//! through it is stored at an address (`domain|action|method`, plus an optional instance id),
//! and anything reading that address sees the same entry: `data`, `loading`, `error`,
//! `executed`, `success` and the time it was last updated.
//!
//! It is meant for clients that display remote data and want one place to look for it:
//! fetch in one place, read (or watch) anywhere else, share results between calls, survive
//! restarts.
//!
//! Goals:
//!
//! * Failures are values. Executing a call never panics and never returns `Err`; the error
//!   ends up in the entry and in the returned `(error, data)` pair.
//! * Pure reads. Selectors are plain functions of the state tree.
//! * One canonical address per slot: `/users/` and `users` are the same action.
//! * Swappable edges: the network ([`transport::Transport`]) and the storage
//!   ([`persist::Persister`]) are traits with in-memory and real implementations.
//!
//! Non-goals:
//!
//! * Request deduplication. Two concurrent executes of the same call both hit the network,
//!   and the last one to finish wins.
//! * Cache eviction. Entries stay until reset or logout.
//!
//! # Quick example
//!
//! ```no_run
//! # use reststore::{config::ClientConfig, domain::Client};
//! # tokio_test::block_on(async {
//! let config = ClientConfig::from_toml_str(
//!     r#"
//!     [domains.api]
//!     base_url = "https://example.com/api"
//!     "#,
//! )?;
//! let client = Client::new(config)?;
//! let api = client.domain("api").expect("configured above");
//!
//! let users = api.get("users").param("page", 1).build()?;
//! let (error, data) = users.execute(None).await;
//!
//! assert_eq!(users.get_state().data, data);
//! # let _ = error;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```
//!
//! # Main concepts
//!
//! ## Address
//!
//! An [`address::Address`] names exactly one slot of the tree. REST entries live at
//! [`address::RestAddress`]es, computed by [`address::resolve`] from the call's defaults and
//! an optional relocation ([`address::AddressOverride`]). Local values live at
//! [`address::LocalAddress`]es, in the `LOCAL` or the persisted `LOCAL-PERSIST` namespace.
//!
//! ## Store and transitions
//!
//! The [`store::Store`] owns the [`state::RootState`] and changes it only through
//! [`state::Transition`]s, applied by the pure [`state::reduce`]. Transitions have a wire
//! form ([`state::WireTransition`]) for logging or replaying them.
//!
//! ## Location
//!
//! [`location::Location`] is a pair of an address and a store, the value you'd pass around.
//!
//! ## Calls
//!
//! A [`call::CallBuilder`] (usually obtained from a [`domain::Domain`]) describes a request;
//! [`call::Call::execute`] runs it: `loading`, request transform, request injections, the
//! `before_execute` hook, the network, response injections, response transform,
//! `on_success`, then `data` or `error`.
//!
//! [Injections][`inject`] write (transformed) request or response data into other entries,
//! so one call can seed another without a second round trip.
//!
//! ## Bindings
//!
//! [`call::Call::watch`] and [`local::LocalSlot::watch`] stream values as they change;
//! [`binding::Poller`] keeps an eager call fresh on an interval.
//!
//! ## Persistence
//!
//! [`persist::attach`] saves the tree after every transition;
//! [`domain::Client::persist`] restores it first. Entries caught mid-flight are restored
//! as if never executed.

pub mod store;

pub mod address;
pub mod binding;
pub mod call;
pub mod config;
pub mod domain;
pub mod inject;
pub mod local;
pub mod location;
pub mod persist;
pub mod state;
pub mod transport;
pub mod util;

pub use call::{Call, CallBuilder};
pub use domain::{Client, Domain};
pub use state::{Entry, RootState, Transition};
pub use store::Store;
