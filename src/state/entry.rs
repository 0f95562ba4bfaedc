use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::util::time::unix_now;

/// Message stored when an error transition carries no text.
pub const DEFAULT_ERROR_MESSAGE: &str = "An unknown error has occurred";

/// Field names of an entry in its serialized form.
pub(crate) const ENTRY_FIELDS: [&str; 6] = [
    "data",
    "loading",
    "error",
    "executed",
    "success",
    "lastUpdated",
];

/// State of one address: the last payload plus request lifecycle flags.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Last successful (or injected) payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// A call is in flight.
    #[serde(default)]
    pub loading: bool,
    /// Renderable error text of the last failed call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Anything other than a reset has touched this address.
    #[serde(default)]
    pub executed: bool,
    /// `None` before the first terminal transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Epoch seconds of the last transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<i64>,
}

impl Entry {
    /// The entry of an address that was never executed.
    pub fn synthesized(now: i64) -> Self {
        Entry {
            last_updated: Some(now),
            ..Default::default()
        }
    }

    /// Fill in a possibly missing raw entry.
    ///
    /// An eager (`lazy == false`) read of a missing entry reports a loading, executed
    /// entry so that a binding can render a spinner before its first dispatch lands.
    pub fn normalize(raw: Option<&Entry>, lazy: bool) -> Entry {
        match raw {
            Some(entry) => entry.clone(),
            None if lazy => Entry::default(),
            None => Entry {
                loading: true,
                executed: true,
                last_updated: Some(unix_now()),
                ..Default::default()
            },
        }
    }

    /// Deserialize the payload into `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> serde_json::Result<Option<T>> {
        self.data
            .as_ref()
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
    }

    pub fn is_failed(&self) -> bool {
        self.success == Some(false)
    }
}
