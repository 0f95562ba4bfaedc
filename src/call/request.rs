use std::sync::Arc;

use serde_json::Value;

use super::Call;
use crate::{
    state::RootState,
    transport::{RequestOptions, ResolvedRequest, TransportError},
};

/// Reads the current bearer token out of the state tree.
pub type AuthToken = Arc<dyn Fn(&RootState) -> Option<String> + Send + Sync>;

pub(crate) const AUTHORIZATION: &str = "authorization";

impl Call {
    /// The options `transform_request` sees: call defaults, the current bearer
    /// token and the request data.
    pub(super) fn request_options(&self, request_data: Option<Value>) -> RequestOptions {
        let mut options = self.inner.options.clone();

        if let Some(auth_token) = &self.inner.auth_token {
            if let Some(token) = self.store().select(|state| auth_token(state)) {
                options
                    .headers
                    .insert(AUTHORIZATION.to_owned(), format!("Bearer {token}"));
            }
        }

        options.data = request_data;
        options
    }

    /// Apply `transform_request` and resolve the url.
    pub(super) fn build_request(
        &self,
        request_data: Option<Value>,
    ) -> Result<(RequestOptions, ResolvedRequest), TransportError> {
        let data = request_data.clone().unwrap_or(Value::Null);
        let mut options = self.request_options(request_data);

        if let Some(transform) = &self.inner.transform_request {
            let patch = transform(&data, &options);
            options = options.apply(patch);
        }

        let resolved = options.resolve()?;
        Ok((options, resolved))
    }
}
