use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::address::{
    primitive::{MethodParseError, LOCAL, LOCAL_PERSIST, LOGOUT},
    AddressError, LocalAddress, RestAddress, SEPARATOR,
};

/// What happens to a REST entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Change {
    Loading,
    /// A `null` payload stores no data.
    Data(Value),
    /// `None` stores the default message.
    Error(Option<String>),
    Reset,
}

impl Change {
    pub fn discriminator(&self) -> &'static str {
        match self {
            Change::Loading => "loading",
            Change::Data(_) => "data",
            Change::Error(_) => "error",
            Change::Reset => "",
        }
    }
}

/// The only way to mutate a [`Store`](crate::store::Store).
#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    Rest {
        address: RestAddress,
        change: Change,
    },
    Local {
        address: LocalAddress,
        value: Value,
    },
    Logout,
}

impl Transition {
    pub fn loading(address: RestAddress) -> Self {
        Transition::Rest {
            address,
            change: Change::Loading,
        }
    }

    pub fn data(address: RestAddress, payload: Value) -> Self {
        Transition::Rest {
            address,
            change: Change::Data(payload),
        }
    }

    pub fn error(address: RestAddress, message: Option<String>) -> Self {
        Transition::Rest {
            address,
            change: Change::Error(message),
        }
    }

    pub fn reset(address: RestAddress) -> Self {
        Transition::Rest {
            address,
            change: Change::Reset,
        }
    }

    pub fn local(address: LocalAddress, value: Value) -> Self {
        Transition::Local { address, value }
    }
}

#[derive(From, Display, Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[from(ignore)]
    Malformed(String),
    #[from(ignore)]
    UnknownDiscriminator(String),
    Method(MethodParseError),
    Address(AddressError),
}

/// The `{type, payload}` shape transitions take at the serialization boundary.
///
/// `type` is `domain|action|method[|instance]|discriminator`, `LOGOUT`, or
/// `LOCAL|key` / `LOCAL-PERSIST|key`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireTransition {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl From<&Transition> for WireTransition {
    fn from(transition: &Transition) -> Self {
        match transition {
            Transition::Logout => WireTransition {
                kind: LOGOUT.to_owned(),
                payload: None,
            },
            Transition::Local { address, value } => WireTransition {
                kind: address.to_string(),
                payload: Some(value.clone()),
            },
            Transition::Rest { address, change } => WireTransition {
                kind: format!("{address}{SEPARATOR}{}", change.discriminator()),
                payload: match change {
                    Change::Data(v) => Some(v.clone()),
                    Change::Error(e) => e.clone().map(Value::String),
                    Change::Loading | Change::Reset => None,
                },
            },
        }
    }
}

impl TryFrom<WireTransition> for Transition {
    type Error = WireError;

    fn try_from(wire: WireTransition) -> Result<Self, Self::Error> {
        let parts: Vec<&str> = wire.kind.split(SEPARATOR).collect();

        match parts[..] {
            [LOGOUT] => return Ok(Transition::Logout),
            [namespace @ (LOCAL | LOCAL_PERSIST), key] if !key.is_empty() => {
                return Ok(Transition::Local {
                    address: LocalAddress::new(key, namespace == LOCAL_PERSIST),
                    value: wire.payload.unwrap_or(Value::Null),
                })
            }
            _ => {}
        }

        let (domain, action, method, instance, discriminator) = match parts[..] {
            [d, a, m] => (d, a, m, None, ""),
            [d, a, m, disc] => (d, a, m, None, disc),
            [d, a, m, i, disc] => (d, a, m, Some(i), disc),
            _ => return Err(WireError::Malformed(wire.kind.clone())),
        };

        if domain.is_empty() || action.is_empty() {
            return Err(WireError::Malformed(wire.kind.clone()));
        }

        let mut address = RestAddress::new(domain, action, method.parse()?);
        if let Some(instance) = instance {
            address = address.with_instance(instance);
        }
        address.check()?;

        let change = match discriminator {
            "loading" => Change::Loading,
            "data" => Change::Data(wire.payload.unwrap_or(Value::Null)),
            "error" => Change::Error(wire.payload.map(|p| match p {
                Value::String(s) => s,
                other => other.to_string(),
            })),
            "" | "reset" => Change::Reset,
            other => return Err(WireError::UnknownDiscriminator(other.to_owned())),
        };

        Ok(Transition::Rest { address, change })
    }
}
