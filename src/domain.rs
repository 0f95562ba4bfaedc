//! Domains (named groups of endpoints sharing request defaults) and the client that
//! owns them together with the store.

use std::{collections::BTreeMap, future::Future, sync::Arc};

use futures::{future::BoxFuture, FutureExt};
use serde::{de::DeserializeOwned, Serialize};
use tokio::task::JoinHandle;

use crate::{
    address::Method,
    call::{AuthToken, CallBuilder},
    config::{ClientConfig, DomainConfig},
    local::LocalSlot,
    persist::{self, Persister},
    state::{DomainNode, RootState},
    store::Store,
    transport::{default_parse_error, ErrorParser, RequestOptions, Transport, TransportError},
};

/// Name a single-domain client registers its domain under.
pub const DEFAULT_DOMAIN: &str = "default";

/// Async guard run before logging out; `false` cancels the logout.
pub type LogoutGuard = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// A named group of endpoints.
///
/// Every call built from a domain is stored under `domain|action|method` and
/// starts from the domain's base url, headers, timeout and bearer token.
#[derive(Clone)]
pub struct Domain {
    name: String,
    config: DomainConfig,
    store: Store,
    transport: Arc<dyn Transport>,
    parse_error: ErrorParser,
    auth_token: Option<AuthToken>,
}

impl std::fmt::Debug for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Domain")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Domain {
    pub fn new(
        name: impl Into<String>,
        config: DomainConfig,
        store: Store,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Domain {
            name: name.into(),
            config,
            store,
            transport,
            parse_error: Arc::new(default_parse_error),
            auth_token: None,
        }
    }

    /// Sends `authorization: Bearer <token>` whenever this returns a token.
    pub fn with_auth_token(
        mut self,
        auth_token: impl Fn(&RootState) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.auth_token = Some(Arc::new(auth_token));
        self
    }

    pub fn with_parse_error(
        mut self,
        parse_error: impl Fn(&TransportError) -> String + Send + Sync + 'static,
    ) -> Self {
        self.parse_error = Arc::new(parse_error);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &DomainConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// A call of `method` on `action`, carrying this domain's defaults.
    pub fn call(&self, method: Method, action: &str) -> CallBuilder {
        let mut options = RequestOptions::new(method, action);
        options.base_url = self.config.base_url.clone();
        options.headers = self.config.headers.clone();
        options.timeout = Some(self.config.timeout());

        let builder = CallBuilder::new(
            self.store.clone(),
            self.transport.clone(),
            self.parse_error.clone(),
            self.name.clone(),
            options,
        )
        .auth_token(self.auth_token.clone());

        match self.config.fake_delay() {
            Some(delay) => builder.fake(delay),
            None => builder,
        }
    }

    pub fn get(&self, action: &str) -> CallBuilder {
        self.call(Method::Get, action)
    }

    pub fn post(&self, action: &str) -> CallBuilder {
        self.call(Method::Post, action)
    }

    pub fn put(&self, action: &str) -> CallBuilder {
        self.call(Method::Put, action)
    }

    pub fn delete(&self, action: &str) -> CallBuilder {
        self.call(Method::Delete, action)
    }

    pub fn patch(&self, action: &str) -> CallBuilder {
        self.call(Method::Patch, action)
    }

    /// Selector of this domain's whole subtree.
    pub fn selector(&self) -> impl Fn(&RootState) -> Option<DomainNode> + Clone + Send + Sync {
        let name = self.name.clone();
        move |state| state.domain(&name).cloned()
    }

    pub fn state(&self) -> Option<DomainNode> {
        self.store.select(self.selector())
    }
}

/// Application root: one store, its domains and the logout flow.
#[derive(Clone)]
pub struct Client {
    store: Store,
    domains: BTreeMap<String, Domain>,
    persister: Option<Arc<dyn Persister>>,
    on_logout: Option<LogoutGuard>,
}

impl Client {
    /// Domains from `config`, each with a `reqwest` transport using its timeout.
    #[cfg(feature = "http")]
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        let store = Store::new();
        let mut domains = BTreeMap::new();

        for (name, domain) in config.domains {
            let transport = crate::transport::ReqwestTransport::new(domain.timeout())?;
            domains.insert(
                name.clone(),
                Domain::new(name, domain, store.clone(), Arc::new(transport)),
            );
        }

        Ok(Client::from_parts(store, domains))
    }

    /// Domains from `config`, all sharing `transport`.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let store = Store::new();
        let domains = config
            .domains
            .into_iter()
            .map(|(name, domain)| {
                let domain = Domain::new(name.clone(), domain, store.clone(), transport.clone());
                (name, domain)
            })
            .collect();

        Client::from_parts(store, domains)
    }

    /// A client with one domain, registered as [`DEFAULT_DOMAIN`].
    pub fn single(config: DomainConfig, transport: Arc<dyn Transport>) -> Self {
        let store = Store::new();
        let domain = Domain::new(DEFAULT_DOMAIN, config, store.clone(), transport);

        Client::from_parts(store, [(DEFAULT_DOMAIN.to_owned(), domain)].into())
    }

    fn from_parts(store: Store, domains: BTreeMap<String, Domain>) -> Self {
        Client {
            store,
            domains,
            persister: None,
            on_logout: None,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn domain(&self, name: &str) -> Option<&Domain> {
        self.domains.get(name)
    }

    pub fn default_domain(&self) -> Option<&Domain> {
        self.domain(DEFAULT_DOMAIN)
    }

    pub fn domains(&self) -> impl Iterator<Item = &Domain> {
        self.domains.values()
    }

    /// Replace a domain's hooks; see the `with_*` methods of [`Domain`].
    pub fn configure(&mut self, name: &str, configure: impl FnOnce(Domain) -> Domain) -> bool {
        match self.domains.remove(name) {
            Some(domain) => {
                self.domains.insert(name.to_owned(), configure(domain));
                true
            }
            None => false,
        }
    }

    pub fn on_logout<F, Fut>(mut self, guard: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.on_logout = Some(Arc::new(move || guard().boxed()));
        self
    }

    /// Restore the store from `persister` and keep saving into it.
    ///
    /// A persisted copy that can't be read is logged and ignored; the store keeps
    /// its current tree, which the writer saves over it with the next transition.
    /// Must be called inside a tokio runtime.
    pub async fn persist(&mut self, persister: Arc<dyn Persister>) -> JoinHandle<()> {
        if let Err(e) = self.store.restore(persister.as_ref()).await {
            tracing::warn!("failed to restore persisted state, starting fresh: {e}");
        }
        self.persister = Some(persister.clone());

        persist::attach(&self.store, persister)
    }

    pub fn local<T>(&self, key: &str, persist: bool, default: T) -> LocalSlot<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        LocalSlot::new(&self.store, key, persist, default)
    }

    /// Run the logout guard, drop the persisted copy and wipe the store.
    ///
    /// Returns `false` when the guard cancelled the logout.
    pub async fn logout(&self) -> bool {
        if let Some(guard) = &self.on_logout {
            if !guard().await {
                tracing::debug!("logout cancelled");
                return false;
            }
        }

        if let Some(persister) = &self.persister {
            if let Err(e) = persister.clear().await {
                tracing::debug!("failed to clear persisted state: {e}");
            }
        }

        self.store.logout();
        true
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        time::Duration,
    };

    use serde_json::json;

    use super::*;
    use crate::{
        address::{LocalAddress, RestAddress},
        persist::{MemoryPersister, PersistError},
        transport::{mock::MockTransport, transport_fn, ResolvedRequest, Response},
    };

    fn config() -> ClientConfig {
        ClientConfig {
            domains: [
                (
                    "api".to_owned(),
                    DomainConfig {
                        headers: [("accept".to_owned(), "application/json".to_owned())].into(),
                        ..DomainConfig::with_base_url("https://example.com/api")
                    },
                ),
                (
                    "demo".to_owned(),
                    DomainConfig {
                        fake_delay_ms: Some(1),
                        ..DomainConfig::with_base_url("https://demo.example.com")
                    },
                ),
            ]
            .into(),
        }
    }

    #[tokio::test]
    async fn domain_defaults_reach_the_transport() -> Result<(), anyhow::Error> {
        let transport = MockTransport::new();
        let mut client = Client::with_transport(config(), Arc::new(transport.clone()));
        client.configure("api", |d| {
            d.with_auth_token(|state| {
                state
                    .local(&LocalAddress::new("token", true))
                    .and_then(|t| t.as_str().map(str::to_owned))
            })
        });

        client
            .local("token", true, String::new())
            .set(&"t0k3n".to_owned())?;

        let api = client.domain("api").cloned().unwrap();
        let call = api.get("/users/").param("page", 2).build()?;
        call.execute(None).await;

        let sent = transport.recorded();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "https://example.com/api/users");
        assert_eq!(sent[0].headers["accept"], "application/json");
        assert_eq!(sent[0].headers["authorization"], "Bearer t0k3n");
        assert_eq!(sent[0].params["page"], "2");
        assert_eq!(call.address(), &RestAddress::new("api", "users", Method::Get));

        assert!(api.state().is_some());
        assert!(client.domain("demo").map(|d| d.state().is_none()).unwrap_or(false));
        Ok(())
    }

    #[tokio::test]
    async fn fake_domain_never_sends() -> Result<(), anyhow::Error> {
        let transport = MockTransport::new();
        let client = Client::with_transport(config(), Arc::new(transport.clone()));
        let demo = client.domain("demo").cloned().unwrap();

        let (error, _) = demo.post("things").build()?.execute(Some(json!(1))).await;
        assert_eq!(error, None);
        assert!(transport.recorded().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn single_domain_client() -> Result<(), anyhow::Error> {
        let transport = transport_fn(|_: ResolvedRequest| async { Ok(Response::ok(json!([{"id": 1}]))) });
        let client = Client::single(
            DomainConfig::with_base_url("https://example.com"),
            Arc::new(transport),
        );

        let orders = client.default_domain().cloned().unwrap();
        let call = orders.get("orders/list").build()?;
        call.execute(None).await;

        assert_eq!(call.get_state().data, Some(json!([{"id": 1}])));
        assert_eq!(client.domains().count(), 1);
        Ok(())
    }

    /// The persisted copy once `check` accepts it, or the last one seen.
    async fn saved_when(
        persister: &MemoryPersister,
        check: impl Fn(Option<&str>) -> bool,
    ) -> Result<Option<String>, PersistError> {
        let mut saved = persister.load().await?;
        for _ in 0..50 {
            if check(saved.as_deref()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            saved = persister.load().await?;
        }
        Ok(saved)
    }

    #[tokio::test]
    async fn logout_can_be_cancelled() -> Result<(), anyhow::Error> {
        let allow = Arc::new(AtomicBool::new(false));
        let mut client = Client::with_transport(config(), Arc::new(MockTransport::new()))
            .on_logout({
                let allow = allow.clone();
                move || {
                    let allow = allow.load(Ordering::SeqCst);
                    async move { allow }
                }
            });

        let persister = Arc::new(MemoryPersister::default());
        let _writer = client.persist(persister.clone()).await;

        client.local("theme", true, String::new()).set(&"dark".to_owned())?;
        let has_theme = |saved: Option<&str>| saved.map_or(false, |s| s.contains("dark"));
        assert!(has_theme(saved_when(&persister, has_theme).await?.as_deref()));

        assert!(!client.logout().await);
        assert!(!client.store().snapshot().is_empty());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(has_theme(persister.load().await?.as_deref()));

        allow.store(true, Ordering::SeqCst);
        assert!(client.logout().await);
        assert!(client.store().snapshot().is_empty());

        let wiped = |saved: Option<&str>| matches!(saved, None | Some("{}"));
        let saved = saved_when(&persister, |s| s == Some("{}")).await?;
        assert!(wiped(saved.as_deref()));
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_persisted_state_is_replaced() -> Result<(), anyhow::Error> {
        let persister = Arc::new(MemoryPersister::new(Some("not json".to_owned())));

        let mut client = Client::with_transport(config(), Arc::new(MockTransport::new()));
        let _writer = client.persist(persister.clone()).await;
        assert!(client.store().snapshot().is_empty());

        client.local("theme", true, String::new()).set(&"dark".to_owned())?;
        let saved = saved_when(&persister, |s| s != Some("not json")).await?;

        let restored = Store::new();
        assert!(restored.restore(persister.as_ref()).await?);
        assert_eq!(
            restored.local(&LocalAddress::new("theme", true)),
            Some(json!("dark"))
        );
        assert!(saved.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn persist_restores_previous_session() -> Result<(), anyhow::Error> {
        let persister = Arc::new(MemoryPersister::new(Some(
            json!({
                "LOCAL-PERSIST": {"theme": "dark"},
                "api": {"users": {"get": {"data": [1], "success": true, "executed": true}}}
            })
            .to_string(),
        )));

        let mut client = Client::with_transport(config(), Arc::new(MockTransport::new()));
        let _writer = client.persist(persister).await;

        assert_eq!(client.local("theme", true, String::new()).get(), "dark");
        let users = client
            .domain("api")
            .map(|d| d.get("users").build())
            .transpose()?
            .map(|c| c.get_state());
        assert_eq!(users.and_then(|e| e.data), Some(json!([1])));
        Ok(())
    }
}
