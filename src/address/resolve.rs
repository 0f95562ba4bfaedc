use derive_more::From;
use thiserror::Error;

use super::{normalize_path, Method, PartialAddress, RestAddress};

/// Configuration error: the call can't be placed in the store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("location not defined properly, missing {missing}: {location:?}")]
    Incomplete {
        missing: &'static str,
        location: String,
    },
    #[error("location has an unknown method {method:?}: {location:?}")]
    UnknownMethod { method: String, location: String },
    #[error("{domain:?} is reserved and can't be used as a domain: {location:?}")]
    ReservedDomain { domain: String, location: String },
    #[error("{instance:?} is an entry field and can't be used as an instance id: {location:?}")]
    ReservedInstance { instance: String, location: String },
}

/// How a caller relocates a call.
///
/// `Replace` swaps the default out entirely (no field-level merge), `Merge` overlays
/// field-by-field.
#[derive(Clone, Debug, PartialEq, Eq, From)]
pub enum AddressOverride {
    Replace(RestAddress),
    #[from(ignore)]
    ReplaceParsed(PartialAddress),
    Merge(PartialAddress),
}

impl From<&str> for AddressOverride {
    /// A serialized `"domain|action|method|instance"` string is an explicit relocation.
    fn from(serialized: &str) -> Self {
        AddressOverride::ReplaceParsed(PartialAddress::parse(serialized))
    }
}

impl From<String> for AddressOverride {
    fn from(serialized: String) -> Self {
        AddressOverride::from(serialized.as_str())
    }
}

/// Compute the canonical address for a call.
///
/// `default` is layered under `overwrite` according to [`AddressOverride`]; the result
/// is validated and its action normalized. Resolution is pure: the same inputs always
/// produce the same address.
pub fn resolve(
    default: &PartialAddress,
    overwrite: Option<&AddressOverride>,
) -> Result<RestAddress, AddressError> {
    let merged = match overwrite {
        None => default.clone(),
        Some(AddressOverride::Replace(addr)) => PartialAddress::from(addr),
        Some(AddressOverride::ReplaceParsed(partial)) => partial.clone(),
        Some(AddressOverride::Merge(partial)) => default.merge(partial),
    };

    validate(merged)
}

fn validate(partial: PartialAddress) -> Result<RestAddress, AddressError> {
    let incomplete = |missing| AddressError::Incomplete {
        missing,
        location: partial.to_string(),
    };

    let domain = partial
        .domain
        .clone()
        .filter(|d| !d.is_empty())
        .ok_or_else(|| incomplete("domain"))?;

    let action = partial
        .action
        .as_deref()
        .map(normalize_path)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| incomplete("action"))?;

    let method = partial
        .method
        .as_deref()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| incomplete("method"))?;
    let method: Method = method.parse().map_err(|_| AddressError::UnknownMethod {
        method: method.to_owned(),
        location: partial.to_string(),
    })?;

    let address = RestAddress {
        domain,
        action,
        method,
        instance: partial.instance.clone().filter(|i| !i.is_empty()),
    };
    address.check()?;

    Ok(address)
}
