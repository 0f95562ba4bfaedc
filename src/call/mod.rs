//! Call descriptors: where a call's state lives, how its request is built and what
//! happens around the transport.
//!
//! A [`CallBuilder`] is usually obtained from a [`Domain`](crate::domain::Domain).
//! [`CallBuilder::build`] resolves the address once; the resulting [`Call`] is cheap to
//! clone and can be executed any number of times.

use std::{future::Future, sync::Arc, time::Duration};

use futures::{future::BoxFuture, FutureExt};
use serde_json::Value;

use crate::{
    address::{resolve, AddressError, AddressOverride, Method, PartialAddress, RestAddress},
    inject::{InjectRequest, InjectResponse},
    location::Location,
    state::{Entry, RootState},
    store::Store,
    transport::{ErrorParser, RequestOptions, RequestPatch, Transport},
};

mod execute;
mod request;

pub use request::AuthToken;

pub type TransformRequest = Arc<dyn Fn(&Value, &RequestOptions) -> RequestPatch + Send + Sync>;
/// `(raw_response, request_options) -> payload`
pub type TransformResponse = Arc<dyn Fn(&Value, &RequestOptions) -> Value + Send + Sync>;
pub type BeforeExecute = Arc<dyn Fn(&RequestOptions) -> BoxFuture<'static, ()> + Send + Sync>;
/// `(payload, request_data)`
pub type OnSuccess = Arc<dyn Fn(Value, Value) -> BoxFuture<'static, ()> + Send + Sync>;

pub struct CallBuilder {
    store: Store,
    transport: Arc<dyn Transport>,
    parse_error: ErrorParser,
    auth_token: Option<AuthToken>,

    domain: String,
    options: RequestOptions,
    location: Option<AddressOverride>,
    multiple: bool,
    instance: Option<String>,
    lazy: bool,
    fake: Option<Duration>,

    transform_request: Option<TransformRequest>,
    transform_response: Option<TransformResponse>,
    inject_request: Vec<InjectRequest>,
    inject_response: Vec<InjectResponse>,
    before_execute: Option<BeforeExecute>,
    on_success: Option<OnSuccess>,
}

impl CallBuilder {
    /// A call of `method` on `action` of `domain`.
    ///
    /// `options.url` defaults to the action. `GET` calls are eager, everything else
    /// is lazy.
    pub fn new(
        store: Store,
        transport: Arc<dyn Transport>,
        parse_error: ErrorParser,
        domain: impl Into<String>,
        options: RequestOptions,
    ) -> Self {
        CallBuilder {
            store,
            transport,
            parse_error,
            auth_token: None,
            domain: domain.into(),
            lazy: options.method != Method::Get,
            options,
            location: None,
            multiple: false,
            instance: None,
            fake: None,
            transform_request: None,
            transform_response: None,
            inject_request: vec![],
            inject_response: vec![],
            before_execute: None,
            on_success: None,
        }
    }

    pub fn auth_token(mut self, auth_token: Option<AuthToken>) -> Self {
        self.auth_token = auth_token;
        self
    }

    /// Store this call's state somewhere other than its default address.
    pub fn location(mut self, location: impl Into<AddressOverride>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Track every built call under a fresh instance id.
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Track the call under this instance id. Takes precedence over [`multiple`](Self::multiple).
    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Sleep instead of calling the transport; the response payload is empty.
    pub fn fake(mut self, delay: Duration) -> Self {
        self.fake = Some(delay);
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.options.base_url = Some(base_url.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.options.url = url.into();
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.options.params.insert(name.into(), value.to_string());
        self
    }

    pub fn url_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.options.url_params.insert(name.into(), value.to_string());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.headers.insert(name.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn parse_error(
        mut self,
        parse_error: impl Fn(&crate::transport::TransportError) -> String + Send + Sync + 'static,
    ) -> Self {
        self.parse_error = Arc::new(parse_error);
        self
    }

    pub fn transform_request(
        mut self,
        transform: impl Fn(&Value, &RequestOptions) -> RequestPatch + Send + Sync + 'static,
    ) -> Self {
        self.transform_request = Some(Arc::new(transform));
        self
    }

    pub fn transform_response(
        mut self,
        transform: impl Fn(&Value, &RequestOptions) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.transform_response = Some(Arc::new(transform));
        self
    }

    pub fn inject_request(mut self, injection: InjectRequest) -> Self {
        self.inject_request.push(injection);
        self
    }

    pub fn inject_response(mut self, injection: InjectResponse) -> Self {
        self.inject_response.push(injection);
        self
    }

    /// Awaited after the request is built and pre-call injections ran, right before
    /// the transport.
    pub fn before_execute<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.before_execute = Some(Arc::new(move |options: &RequestOptions| {
            hook(options).boxed()
        }));
        self
    }

    /// Awaited with the final payload before the `data` transition is dispatched.
    pub fn on_success<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Value, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_success = Some(Arc::new(move |payload, request| {
            hook(payload, request).boxed()
        }));
        self
    }

    /// Resolve the address. A call that can't be placed in the store is a
    /// configuration error.
    pub fn build(self) -> Result<Call, AddressError> {
        let instance = self.instance.clone().or_else(|| {
            self.multiple
                .then(|| uuid::Uuid::new_v4().to_string())
        });

        let mut default = PartialAddress::default()
            .domain(self.domain.clone())
            .action(self.options.url.clone())
            .method(self.options.method);
        default.instance = instance;

        let address = resolve(&default, self.location.as_ref())?;

        Ok(Call {
            inner: Arc::new(CallInner {
                location: self.store.sub(address),
                default,
                transport: self.transport,
                parse_error: self.parse_error,
                auth_token: self.auth_token,
                options: self.options,
                lazy: self.lazy,
                fake: self.fake,
                transform_request: self.transform_request,
                transform_response: self.transform_response,
                inject_request: self.inject_request,
                inject_response: self.inject_response,
                before_execute: self.before_execute,
                on_success: self.on_success,
            }),
        })
    }
}

/// A resolved call: the four binding primitives (`selector`, `get_state`,
/// `execute`, `reset`) for one address.
#[derive(Clone)]
pub struct Call {
    inner: Arc<CallInner>,
}

struct CallInner {
    location: Location<RestAddress>,
    /// Address before the caller's relocation; injections resolve against it.
    default: PartialAddress,
    transport: Arc<dyn Transport>,
    parse_error: ErrorParser,
    auth_token: Option<AuthToken>,
    options: RequestOptions,
    lazy: bool,
    fake: Option<Duration>,
    transform_request: Option<TransformRequest>,
    transform_response: Option<TransformResponse>,
    inject_request: Vec<InjectRequest>,
    inject_response: Vec<InjectResponse>,
    before_execute: Option<BeforeExecute>,
    on_success: Option<OnSuccess>,
}

impl std::fmt::Debug for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("address", &self.inner.location.address)
            .field("lazy", &self.inner.lazy)
            .finish_non_exhaustive()
    }
}

impl Call {
    pub fn address(&self) -> &RestAddress {
        &self.inner.location.address
    }

    pub fn location(&self) -> &Location<RestAddress> {
        &self.inner.location
    }

    pub fn store(&self) -> &Store {
        &self.inner.location.store
    }

    pub fn is_lazy(&self) -> bool {
        self.inner.lazy
    }

    /// Pure selector of this call's raw entry.
    pub fn selector(&self) -> impl Fn(&RootState) -> Option<Entry> + Clone + Send + Sync {
        self.inner.location.selector()
    }

    /// Normalized snapshot of this call's entry.
    pub fn get_state(&self) -> Entry {
        self.inner.location.entry(self.inner.lazy)
    }

    /// Put this address back to its default. An in-flight execute still writes its
    /// terminal transition when it completes.
    pub fn reset(&self) {
        self.inner.location.reset();
    }
}
