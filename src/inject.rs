//! Side-effect writes of one call's payloads into other addresses.
//!
//! Pre-call injections ([`InjectRequest`]) see the request data after
//! `transform_request`; post-call ones ([`InjectResponse`]) see the raw response
//! and the request data. Both also see the target's current entry. Targets resolve
//! against the originating call's *default* address, and a target that fails to
//! resolve is skipped with a warning.

use std::sync::Arc;

use serde_json::Value;

use crate::{
    address::{resolve, AddressOverride, PartialAddress},
    state::{Entry, Transition},
    store::Store,
};

pub type RequestTransformer = dyn Fn(&Value, &Entry) -> Value + Send + Sync;
pub type ResponseTransformer = dyn Fn(&Value, &Value, &Entry) -> Value + Send + Sync;

/// One injection: where to write, and how to compute the value.
///
/// Without a transformer the payload is written as is; without a location it goes to
/// the originating call's default address.
pub struct Injection<F: ?Sized> {
    pub location: Option<AddressOverride>,
    pub transformer: Option<Arc<F>>,
}

pub type InjectRequest = Injection<RequestTransformer>;
pub type InjectResponse = Injection<ResponseTransformer>;

impl<F: ?Sized> Clone for Injection<F> {
    fn clone(&self) -> Self {
        Injection {
            location: self.location.clone(),
            transformer: self.transformer.clone(),
        }
    }
}

impl<F: ?Sized> std::fmt::Debug for Injection<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injection")
            .field("location", &self.location)
            .field("transformer", &self.transformer.is_some())
            .finish()
    }
}

impl<F: ?Sized> Default for Injection<F> {
    fn default() -> Self {
        Injection {
            location: None,
            transformer: None,
        }
    }
}

impl<F: ?Sized> Injection<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(location: impl Into<AddressOverride>) -> Self {
        Injection {
            location: Some(location.into()),
            transformer: None,
        }
    }
}

impl InjectRequest {
    /// `transformer(request_data, target_entry)`
    pub fn transform(
        mut self,
        transformer: impl Fn(&Value, &Entry) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.transformer = Some(Arc::new(transformer));
        self
    }
}

impl InjectResponse {
    /// `transformer(response_data, request_data, target_entry)`
    pub fn transform(
        mut self,
        transformer: impl Fn(&Value, &Value, &Entry) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.transformer = Some(Arc::new(transformer));
        self
    }
}

fn perform<F: ?Sized>(
    store: &Store,
    default: &PartialAddress,
    injections: &[Injection<F>],
    compute: impl Fn(Option<&F>, &Entry) -> Value,
) {
    for injection in injections {
        if injection.location.is_none() && injection.transformer.is_none() {
            tracing::warn!("injection into {default} has neither a location nor a transformer");
        }

        let target = match resolve(default, injection.location.as_ref()) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!("skipping injection: {e}");
                continue;
            }
        };

        let current = Entry::normalize(store.entry(&target).as_ref(), true);
        let value = compute(injection.transformer.as_deref(), &current);

        store.dispatch(Transition::data(target, value));
    }
}

pub fn inject_request(
    store: &Store,
    default: &PartialAddress,
    injections: &[InjectRequest],
    request_data: &Value,
) {
    perform(store, default, injections, |transformer, current| {
        match transformer {
            Some(transformer) => transformer(request_data, current),
            None => request_data.clone(),
        }
    })
}

pub fn inject_response(
    store: &Store,
    default: &PartialAddress,
    injections: &[InjectResponse],
    response_data: &Value,
    request_data: &Value,
) {
    perform(store, default, injections, |transformer, current| {
        match transformer {
            Some(transformer) => transformer(response_data, request_data, current),
            None => response_data.clone(),
        }
    })
}
