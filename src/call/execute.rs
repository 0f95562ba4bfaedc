use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::Call;
use crate::{
    inject::{inject_request, inject_response},
    state::Change,
    transport::TransportError,
};

impl Call {
    /// Run the call end to end.
    ///
    /// Dispatches `loading`, builds the request, runs pre-call injections and
    /// `before_execute`, calls the transport (or sleeps in fake mode), runs post-call
    /// injections, transforms the response, awaits `on_success` and finally dispatches
    /// `data`. Any failure on the way dispatches `error` instead.
    ///
    /// Never fails: returns `(error, payload)`.
    pub async fn execute(&self, request_data: Option<Value>) -> (Option<String>, Option<Value>) {
        let location = &self.inner.location;
        tracing::debug!("executing {}", location.address);

        location.dispatch(Change::Loading);

        match self.run(request_data).await {
            Ok(payload) => {
                tracing::debug!("{} succeeded", location.address);
                location.dispatch(Change::Data(payload.clone().unwrap_or(Value::Null)));
                (None, payload)
            }
            Err(e) => (Some(self.fail(&e)), None),
        }
    }

    /// [`execute`](Self::execute) with typed request and response.
    ///
    /// A response that doesn't deserialize into `Res` is reported as an error; the
    /// stored entry keeps the payload as it came.
    pub async fn execute_as<Req: Serialize, Res: DeserializeOwned>(
        &self,
        request: &Req,
    ) -> (Option<String>, Option<Res>) {
        let data = match serde_json::to_value(request) {
            Ok(data) => data,
            Err(e) => {
                self.inner.location.dispatch(Change::Loading);
                return (Some(self.fail(&e.into())), None);
            }
        };

        match self.execute(Some(data)).await {
            (Some(error), _) => (Some(error), None),
            (None, payload) => match payload.map(serde_json::from_value).transpose() {
                Ok(payload) => (None, payload),
                Err(e) => (Some((self.inner.parse_error)(&e.into())), None),
            },
        }
    }

    fn fail(&self, error: &TransportError) -> String {
        let message = (self.inner.parse_error)(error);
        tracing::warn!("{} failed: {message}", self.inner.location.address);
        self.inner
            .location
            .dispatch(Change::Error(Some(message.clone())));
        message
    }

    async fn run(&self, request_data: Option<Value>) -> Result<Option<Value>, TransportError> {
        let inner = &self.inner;
        let store = self.store();

        let (options, resolved) = self.build_request(request_data)?;
        let request_payload = resolved.data.clone().unwrap_or(Value::Null);

        inject_request(store, &inner.default, &inner.inject_request, &request_payload);

        if let Some(before_execute) = &inner.before_execute {
            before_execute(&options).await;
        }

        let raw = match inner.fake {
            Some(delay) => {
                tokio::time::sleep(delay).await;
                None
            }
            None => inner.transport.send(resolved).await?.data,
        };
        let raw_payload = raw.clone().unwrap_or(Value::Null);

        inject_response(
            store,
            &inner.default,
            &inner.inject_response,
            &raw_payload,
            &request_payload,
        );

        let payload = match &inner.transform_response {
            Some(transform) => Some(transform(&raw_payload, &options)),
            None => raw,
        };

        if let Some(on_success) = &inner.on_success {
            on_success(
                payload.clone().unwrap_or(Value::Null),
                request_payload.clone(),
            )
            .await;
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::{
            atomic::{AtomicI64, Ordering},
            Arc,
        },
        time::Duration,
    };

    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::{
        address::{AddressOverride, Method, PartialAddress, RestAddress},
        call::{test::builder, CallBuilder},
        inject::{InjectRequest, InjectResponse},
        state::DEFAULT_ERROR_MESSAGE,
        store::Store,
        transport::{
            default_parse_error, mock::MockTransport, transport_fn, RequestOptions, RequestPatch,
            ResolvedRequest, Response,
        },
    };

    fn with_transport(
        store: &Store,
        transport: impl crate::transport::Transport,
        method: Method,
        action: &str,
    ) -> CallBuilder {
        CallBuilder::new(
            store.clone(),
            Arc::new(transport),
            Arc::new(default_parse_error),
            "orders",
            RequestOptions::new(method, action),
        )
        .base_url("https://example.com")
    }

    #[tokio::test]
    async fn orders_list_end_to_end() -> Result<(), anyhow::Error> {
        let store = Store::new();
        let transport = transport_fn(|_: ResolvedRequest| async {
            Ok(Response::ok(json!([{"id": 1}])))
        });
        let call = with_transport(&store, transport, Method::Get, "list").build()?;

        assert_eq!(call.address(), &RestAddress::new("orders", "list", Method::Get));

        let (error, data) = call.execute(None).await;
        assert_eq!(error, None);
        assert_eq!(data, Some(json!([{"id": 1}])));

        let entry = call.get_state();
        assert_eq!(entry.data, Some(json!([{"id": 1}])));
        assert!(!entry.loading);
        assert_eq!(entry.success, Some(true));
        assert!(entry.executed);
        assert_eq!(entry.error, None);
        Ok(())
    }

    #[tokio::test]
    async fn loading_is_visible_while_in_flight() -> Result<(), anyhow::Error> {
        let store = Store::new();
        let transport = MockTransport::new().delayed(Duration::from_millis(30));
        let call = with_transport(&store, transport, Method::Post, "list").build()?;

        let running = tokio::spawn({
            let call = call.clone();
            async move { call.execute(Some(json!(5))).await }
        });

        let mut rx = store.subscribe();
        rx.changed().await?;
        assert!(call.get_state().loading);

        let (error, data) = running.await?;
        assert_eq!(error, None);
        assert_eq!(data, Some(json!(5)));
        assert!(!call.get_state().loading);
        Ok(())
    }

    #[tokio::test]
    async fn failures_are_values() -> Result<(), anyhow::Error> {
        let store = Store::new();
        let call = with_transport(&store, MockTransport::failing(500), Method::Get, "list")
            .build()?;

        let (error, data) = call.execute(None).await;
        assert_eq!(error.as_deref(), Some("Request failed with status code 500"));
        assert_eq!(data, None);

        let entry = call.get_state();
        assert_eq!(entry.success, Some(false));
        assert_eq!(entry.error, error);
        assert_eq!(entry.data, None);

        let custom = with_transport(&store, MockTransport::failing(404), Method::Get, "list")
            .parse_error(|e| format!("{e}!"))
            .build()?;
        let (error, _) = custom.execute(None).await;
        assert_eq!(error.as_deref(), Some("Request failed with status code 404!"));

        let silent = with_transport(&store, MockTransport::failing(404), Method::Get, "list")
            .parse_error(|_| String::new())
            .build()?;
        silent.execute(None).await;
        assert_eq!(silent.get_state().error.as_deref(), Some(""));
        assert_ne!(silent.get_state().error.as_deref(), Some(DEFAULT_ERROR_MESSAGE));
        Ok(())
    }

    #[tokio::test]
    async fn bad_url_fails_after_loading() -> Result<(), anyhow::Error> {
        let store = Store::new();
        let transport = MockTransport::new();
        let call = with_transport(&store, transport.clone(), Method::Get, "list")
            .transform_request(|_, _| RequestPatch {
                base_url: Some("::".to_owned()),
                ..Default::default()
            })
            .build()?;

        let (error, _) = call.execute(None).await;
        assert!(error.map_or(false, |e| e.starts_with("no url specified")));
        assert!(call.get_state().executed);
        assert!(transport.recorded().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn hooks_run_in_order() -> Result<(), anyhow::Error> {
        let store = Store::new();
        let counter = Arc::new(AtomicI64::new(1));
        let at_success = Arc::new(AtomicI64::new(0));

        let transport = transport_fn({
            let counter = counter.clone();
            move |_: ResolvedRequest| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(Response::ok(json!(null))) }
            }
        });

        let call = with_transport(&store, transport, Method::Post, "count")
            .before_execute({
                let counter = counter.clone();
                move |_| {
                    let counter = counter.clone();
                    async move {
                        let v = counter.load(Ordering::SeqCst);
                        counter.store(v * 2, Ordering::SeqCst);
                    }
                }
            })
            .on_success({
                let counter = counter.clone();
                let at_success = at_success.clone();
                move |_, _| {
                    let counter = counter.clone();
                    let at_success = at_success.clone();
                    async move {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        at_success.store(counter.load(Ordering::SeqCst), Ordering::SeqCst);
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
            .build()?;

        call.execute(None).await;

        assert_eq!(at_success.load(Ordering::SeqCst), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        Ok(())
    }

    #[tokio::test]
    async fn on_success_finishes_before_data_lands() -> Result<(), anyhow::Error> {
        let store = Store::new();
        let seen_loading = Arc::new(AtomicI64::new(0));

        let call = with_transport(&store, MockTransport::new(), Method::Post, "x").build()?;
        let call = {
            let observed = call.clone();
            let seen_loading = seen_loading.clone();
            with_transport(&store, MockTransport::new(), Method::Post, "x")
                .on_success(move |_, _| {
                    let loading = observed.get_state().loading;
                    let seen_loading = seen_loading.clone();
                    async move {
                        seen_loading.store(loading as i64, Ordering::SeqCst);
                    }
                })
                .build()?
        };

        call.execute(Some(json!(1))).await;
        assert_eq!(seen_loading.load(Ordering::SeqCst), 1);
        assert!(!call.get_state().loading);
        Ok(())
    }

    #[tokio::test]
    async fn fake_mode_skips_the_transport() -> Result<(), anyhow::Error> {
        let store = Store::new();
        let transport = MockTransport::new();
        let call = with_transport(&store, transport.clone(), Method::Get, "list")
            .fake(Duration::from_millis(5))
            .build()?;

        let (error, data) = call.execute(Some(json!(1))).await;
        assert_eq!(error, None);
        assert_eq!(data, None);
        assert!(transport.recorded().is_empty());

        let entry = call.get_state();
        assert_eq!(entry.success, Some(true));
        assert_eq!(entry.data, None);
        Ok(())
    }

    #[tokio::test]
    async fn multiple_instances_are_isolated() -> Result<(), anyhow::Error> {
        let store = Store::new();
        let slow = builder(&store, Method::Delete, "row").multiple().build()?;
        let failing = with_transport(&store, MockTransport::failing(500), Method::Delete, "row")
            .multiple()
            .build()?;

        let (ok, err) = tokio::join!(slow.execute(Some(json!(1))), failing.execute(None));
        assert_eq!(ok.1, Some(json!(1)));
        assert!(err.0.is_some());

        assert_ne!(slow.address(), failing.address());
        assert_eq!(slow.get_state().success, Some(true));
        assert_eq!(failing.get_state().success, Some(false));
        assert_eq!(store.entry(&slow.address().base()), None);
        Ok(())
    }

    #[tokio::test]
    async fn last_write_wins_and_reset_can_be_resurrected() -> Result<(), anyhow::Error> {
        let store = Store::new();
        let transport = transport_fn(|request: ResolvedRequest| async move {
            let delay = request.data.as_ref().and_then(Value::as_u64).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(Response {
                status: 200,
                data: request.data,
            })
        });
        let call = with_transport(&store, transport, Method::Get, "race").build()?;

        let slow = call.execute(Some(json!(40)));
        let fast = async {
            let result = call.execute(Some(json!(5))).await;
            call.reset();
            result
        };
        tokio::join!(slow, fast);

        assert_eq!(call.get_state().data, Some(json!(40)));
        Ok(())
    }

    #[tokio::test]
    async fn injection_failure_does_not_block_the_call() -> Result<(), anyhow::Error> {
        let store = Store::new();
        let call = builder(&store, Method::Post, "items")
            .inject_request(InjectRequest::at(AddressOverride::Merge(PartialAddress {
                method: Some("bogus".to_owned()),
                ..Default::default()
            })))
            .inject_response(InjectResponse::at(PartialAddress::default().method(Method::Get)))
            .build()?;

        let (error, data) = call.execute(Some(json!({"id": 9}))).await;
        assert_eq!(error, None);
        assert_eq!(data, Some(json!({"id": 9})));

        let list = RestAddress::new("orders", "items", Method::Get);
        assert_eq!(store.entry(&list).and_then(|e| e.data), Some(json!({"id": 9})));
        Ok(())
    }

    #[tokio::test]
    async fn relocated_call_with_injections() -> Result<(), anyhow::Error> {
        let store = Store::new();
        let transport = MockTransport::new();
        let pre_change = Arc::new(AtomicI64::new(10));
        let post_change = Arc::new(AtomicI64::new(20));

        let call = with_transport(&store, transport.clone(), Method::Get, "action/{id}")
            .param("name", "cj")
            .url_param("id", "1")
            .header("something", "some header")
            .location(
                PartialAddress::default()
                    .domain("otherdomain")
                    .action("otheraction")
                    .method(Method::Post)
                    .instance("1234"),
            )
            .transform_request(|data, options| RequestPatch {
                method: Some(Method::Put),
                url: Some("actionx/{id}".to_owned()),
                base_url: Some("https://examplex.com".to_owned()),
                params: Some([("name".to_owned(), format!("{}please", options.params["name"]))].into()),
                url_params: Some([("id".to_owned(), "4".to_owned())].into()),
                data: Some(json!(4 * data.as_i64().unwrap_or(0))),
                headers: Some([("something".to_owned(), "some header".to_owned())].into()),
            })
            .transform_response(|raw, options| {
                json!(options.headers.len() as i64 * raw.as_i64().unwrap_or(0) * 2)
            })
            .before_execute({
                let pre_change = pre_change.clone();
                move |options| {
                    pre_change.store(
                        options.data.as_ref().and_then(Value::as_i64).unwrap_or(0),
                        Ordering::SeqCst,
                    );
                    async {}
                }
            })
            .on_success({
                let pre_change = pre_change.clone();
                let post_change = post_change.clone();
                move |payload, _| {
                    post_change.store(
                        pre_change.load(Ordering::SeqCst) * payload.as_i64().unwrap_or(0),
                        Ordering::SeqCst,
                    );
                    async {}
                }
            })
            .inject_request(
                InjectRequest::at(
                    PartialAddress::default()
                        .domain("injectrequestdomain")
                        .action("injectrequestaction")
                        .method(Method::Delete)
                        .instance("4321"),
                )
                .transform(|request, _| request.clone()),
            )
            .inject_response(
                InjectResponse::at(
                    PartialAddress::default()
                        .domain("injectresponsedomain")
                        .action("injectresponseaction")
                        .method(Method::Delete)
                        .instance("0000"),
                )
                .transform(|response, request, _| {
                    json!(response.as_i64().unwrap_or(0) * 2 + request.as_i64().unwrap_or(0))
                }),
            )
            .multiple()
            .instance("4444")
            .build()?;

        let (error, data) = call.execute(Some(json!(2))).await;
        assert_eq!(error, None);
        assert_eq!(data, Some(json!(16)));

        let at = |d: &str, a: &str, m: Method, i: &str| {
            store
                .entry(&RestAddress::new(d, a, m).with_instance(i))
                .and_then(|e| e.data)
        };
        assert_eq!(at("injectrequestdomain", "injectrequestaction", Method::Delete, "4321"), Some(json!(8)));
        assert_eq!(at("injectresponsedomain", "injectresponseaction", Method::Delete, "0000"), Some(json!(24)));
        assert_eq!(at("otherdomain", "otheraction", Method::Post, "1234"), Some(json!(16)));
        assert_eq!(pre_change.load(Ordering::SeqCst), 8);
        assert_eq!(post_change.load(Ordering::SeqCst), 128);

        let sent = transport.recorded();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "https://examplex.com/actionx/4");
        assert_eq!(sent[0].method, Method::Put);
        assert_eq!(sent[0].params["name"], "cjplease");
        Ok(())
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Order {
        id: u32,
    }

    #[tokio::test]
    async fn typed_execute() -> Result<(), anyhow::Error> {
        let store = Store::new();
        let call = builder(&store, Method::Post, "orders").build()?;

        let (error, orders) = call.execute_as::<_, Vec<Order>>(&json!([{"id": 1}])).await;
        assert_eq!(error, None);
        assert_eq!(orders, Some(vec![Order { id: 1 }]));

        let (error, orders) = call.execute_as::<_, Vec<Order>>(&json!("nope")).await;
        assert!(error.is_some());
        assert_eq!(orders, None);
        assert_eq!(call.get_state().data, Some(json!("nope")));
        Ok(())
    }
}
