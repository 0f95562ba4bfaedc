use std::{fmt::Display, str::FromStr};

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{normalize_path, Address};

/// Top-level key of the non-persisted local namespace.
pub const LOCAL: &str = "LOCAL";
/// Top-level key of the persisted local namespace.
pub const LOCAL_PERSIST: &str = "LOCAL-PERSIST";
/// Transition type that wipes the whole store.
pub const LOGOUT: &str = "LOGOUT";

#[derive(From, Display, Debug, Error, PartialEq, Eq)]
pub struct MethodParseError(String);

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Put => "put",
            Method::Delete => "delete",
            Method::Patch => "patch",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = MethodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Method::Get),
            "post" => Ok(Method::Post),
            "put" => Ok(Method::Put),
            "delete" => Ok(Method::Delete),
            "patch" => Ok(Method::Patch),
            _ => Err(MethodParseError(format!("unknown method: {s:?}"))),
        }
    }
}

/// Address of a value in the local (non-network) namespace.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalAddress {
    pub persist: bool,
    pub key: String,
}

impl LocalAddress {
    pub fn new(key: &str, persist: bool) -> Self {
        LocalAddress {
            persist,
            key: normalize_path(key),
        }
    }

    pub fn namespace(&self) -> &'static str {
        if self.persist {
            LOCAL_PERSIST
        } else {
            LOCAL
        }
    }
}

impl Display for LocalAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.namespace(), super::SEPARATOR, self.key)
    }
}

impl Address for LocalAddress {
    fn own_name(&self) -> String {
        self.key.clone()
    }

    fn as_parts(&self) -> Vec<String> {
        vec![self.namespace().to_owned(), self.key.clone()]
    }
}
