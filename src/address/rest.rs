use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::{
    normalize_path,
    primitive::{LOCAL, LOCAL_PERSIST, LOGOUT},
    Address, AddressError, Method, SEPARATOR,
};
use crate::state::entry::ENTRY_FIELDS;

/// Canonical address of one REST call's entry: `[domain, action, method, instance?]`.
///
/// Build it through [`resolve`](super::resolve) or [`RestAddress::new`]; both keep
/// `action` normalized, so `/users/` and `users` land in the same slot.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RestAddress {
    pub domain: String,
    pub action: String,
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl RestAddress {
    pub fn new(domain: &str, action: &str, method: Method) -> Self {
        RestAddress {
            domain: domain.to_owned(),
            action: normalize_path(action),
            method,
            instance: None,
        }
    }

    /// The same address, tracked under a separate instance id.
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        let instance = instance.into();
        self.instance = (!instance.is_empty()).then_some(instance);
        self
    }

    /// Whether this address can hold an entry in the state tree.
    ///
    /// The local namespaces and `LOGOUT` are not domains, and an instance id can't
    /// share its name with an entry field.
    pub fn check(&self) -> Result<(), AddressError> {
        if [LOCAL, LOCAL_PERSIST, LOGOUT].contains(&self.domain.as_str()) {
            return Err(AddressError::ReservedDomain {
                domain: self.domain.clone(),
                location: self.to_string(),
            });
        }

        match &self.instance {
            Some(instance) if ENTRY_FIELDS.contains(&instance.as_str()) => {
                Err(AddressError::ReservedInstance {
                    instance: instance.clone(),
                    location: self.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// The address without its instance id.
    pub fn base(&self) -> RestAddress {
        RestAddress {
            instance: None,
            ..self.clone()
        }
    }
}

impl Display for RestAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.domain, self.action, self.method
        )?;

        if let Some(instance) = &self.instance {
            write!(f, "{SEPARATOR}{instance}")?;
        }

        Ok(())
    }
}

impl Address for RestAddress {
    fn own_name(&self) -> String {
        match &self.instance {
            Some(instance) => instance.clone(),
            None => self.method.to_string(),
        }
    }

    fn as_parts(&self) -> Vec<String> {
        let mut parts = vec![
            self.domain.clone(),
            self.action.clone(),
            self.method.to_string(),
        ];
        parts.extend(self.instance.clone());
        parts
    }
}

/// Field-wise address description; any field may be missing.
///
/// This is both the override layer callers pass around and the intermediate form
/// of resolution (before validation).
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl PartialAddress {
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method.to_string());
        self
    }

    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Parse `"domain|action|method|instance"`. Empty components are treated as missing.
    pub fn parse(serialized: &str) -> Self {
        let mut parts = serialized
            .split(SEPARATOR)
            .map(|p| (!p.is_empty()).then(|| p.to_owned()));

        PartialAddress {
            domain: parts.next().flatten(),
            action: parts.next().flatten(),
            method: parts.next().flatten(),
            instance: parts.next().flatten(),
        }
    }

    /// Overlay `other` on top of `self`: fields present in `other` win.
    pub fn merge(&self, other: &PartialAddress) -> PartialAddress {
        PartialAddress {
            domain: other.domain.clone().or_else(|| self.domain.clone()),
            action: other.action.clone().or_else(|| self.action.clone()),
            method: other.method.clone().or_else(|| self.method.clone()),
            instance: other.instance.clone().or_else(|| self.instance.clone()),
        }
    }
}

impl From<&RestAddress> for PartialAddress {
    fn from(addr: &RestAddress) -> Self {
        PartialAddress {
            domain: Some(addr.domain.clone()),
            action: Some(addr.action.clone()),
            method: Some(addr.method.to_string()),
            instance: addr.instance.clone(),
        }
    }
}

impl From<RestAddress> for PartialAddress {
    fn from(addr: RestAddress) -> Self {
        PartialAddress::from(&addr)
    }
}

impl Display for PartialAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let separator = SEPARATOR.to_string();
        let parts = [&self.domain, &self.action, &self.method, &self.instance]
            .map(|p| p.clone().unwrap_or_default());

        f.write_str(parts.join(separator.as_str()).trim_end_matches(SEPARATOR))
    }
}
