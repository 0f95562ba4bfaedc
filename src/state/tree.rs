use std::collections::BTreeMap;

use serde::{
    de::Error as _, ser::Error as _, ser::SerializeMap, Deserialize, Deserializer, Serialize,
    Serializer,
};
use serde_json::{Map, Value};

use crate::address::{Addressable, LocalAddress, Method, RestAddress};

use super::entry::{Entry, ENTRY_FIELDS};

/// Everything stored under one `domain/action/method`.
///
/// Serialized as one map: the plain entry's fields side by side with
/// `instance id -> entry` pairs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MethodNode {
    pub entry: Option<Entry>,
    pub instances: BTreeMap<String, Entry>,
}

pub type ActionNode = BTreeMap<Method, MethodNode>;
pub type DomainNode = BTreeMap<String, ActionNode>;

/// The whole keyed state tree.
///
/// `domain -> action -> method -> (entry | instance -> entry)`, plus the two local
/// namespaces.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RootState {
    #[serde(rename = "LOCAL", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub local: BTreeMap<String, Value>,

    #[serde(
        rename = "LOCAL-PERSIST",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub local_persist: BTreeMap<String, Value>,

    #[serde(flatten)]
    pub domains: BTreeMap<String, DomainNode>,
}

impl RootState {
    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.local_persist.is_empty() && self.domains.is_empty()
    }

    pub fn domain(&self, name: &str) -> Option<&DomainNode> {
        self.domains.get(name)
    }

    pub fn entry(&self, addr: &RestAddress) -> Option<&Entry> {
        let node = self
            .domains
            .get(&addr.domain)?
            .get(&addr.action)?
            .get(&addr.method)?;

        match &addr.instance {
            Some(instance) => node.instances.get(instance),
            None => node.entry.as_ref(),
        }
    }

    pub fn set_entry(&mut self, addr: &RestAddress, entry: Entry) {
        let node = self
            .domains
            .entry(addr.domain.clone())
            .or_default()
            .entry(addr.action.clone())
            .or_default()
            .entry(addr.method)
            .or_default();

        match &addr.instance {
            Some(instance) => {
                node.instances.insert(instance.clone(), entry);
            }
            None => node.entry = Some(entry),
        }
    }

    pub fn local(&self, addr: &LocalAddress) -> Option<&Value> {
        self.local_namespace(addr.persist).get(&addr.key)
    }

    pub fn set_local(&mut self, addr: &LocalAddress, value: Value) {
        let namespace = if addr.persist {
            &mut self.local_persist
        } else {
            &mut self.local
        };
        namespace.insert(addr.key.clone(), value);
    }

    pub fn local_namespace(&self, persist: bool) -> &BTreeMap<String, Value> {
        if persist {
            &self.local_persist
        } else {
            &self.local
        }
    }

    /// Prepare a tree loaded from a previous session.
    ///
    /// `LOCAL` is dropped, entries caught `loading` or in `error` go back to the
    /// default; data, success flags and `LOCAL-PERSIST` are kept as they are.
    pub fn rehydrate(mut self, now: i64) -> Self {
        self.local.clear();

        let stale = |entry: &mut Entry| {
            if entry.loading || entry.error.is_some() {
                *entry = Entry::synthesized(now);
            }
        };

        for node in self
            .domains
            .values_mut()
            .flat_map(|actions| actions.values_mut())
            .flat_map(|methods| methods.values_mut())
        {
            node.entry.iter_mut().for_each(stale);
            node.instances.values_mut().for_each(stale);
        }

        self
    }
}

impl Addressable<RestAddress> for RootState {
    type Value = Entry;

    fn read(&self, addr: &RestAddress) -> Option<Entry> {
        self.entry(addr).cloned()
    }
}

impl Addressable<LocalAddress> for RootState {
    type Value = Value;

    fn read(&self, addr: &LocalAddress) -> Option<Value> {
        self.local(addr).cloned()
    }
}

impl Serialize for MethodNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;

        if let Some(entry) = &self.entry {
            match serde_json::to_value(entry).map_err(S::Error::custom)? {
                Value::Object(fields) => {
                    for (key, value) in &fields {
                        map.serialize_entry(key, value)?;
                    }
                }
                other => return Err(S::Error::custom(format!("entry is not a map: {other}"))),
            }
        }

        for (instance, entry) in &self.instances {
            map.serialize_entry(instance, entry)?;
        }

        map.end()
    }
}

impl<'de> Deserialize<'de> for MethodNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Map::<String, Value>::deserialize(deserializer)?;

        let mut fields = Map::new();
        let mut instances = BTreeMap::new();

        for (key, value) in raw {
            if ENTRY_FIELDS.contains(&key.as_str()) {
                fields.insert(key, value);
            } else {
                instances.insert(key, serde_json::from_value(value).map_err(D::Error::custom)?);
            }
        }

        let entry = if fields.is_empty() {
            None
        } else {
            Some(serde_json::from_value(Value::Object(fields)).map_err(D::Error::custom)?)
        };

        Ok(MethodNode { entry, instances })
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn addr() -> RestAddress {
        RestAddress::new("domain", "action", Method::Get)
    }

    #[test]
    fn entries_and_instances_share_a_method_node() {
        let mut state = RootState::default();
        let plain = Entry {
            data: Some(json!(1)),
            ..Default::default()
        };
        let instance = Entry {
            data: Some(json!(2)),
            ..Default::default()
        };

        state.set_entry(&addr(), plain.clone());
        state.set_entry(&addr().with_instance("x"), instance.clone());

        assert_eq!(state.entry(&addr()), Some(&plain));
        assert_eq!(state.entry(&addr().with_instance("x")), Some(&instance));
        assert_eq!(state.entry(&addr().with_instance("y")), None);
    }

    #[test]
    fn persisted_layout() -> Result<(), anyhow::Error> {
        let mut state = RootState::default();
        state.set_entry(
            &addr(),
            Entry {
                data: Some(json!(1)),
                executed: true,
                ..Default::default()
            },
        );
        state.set_entry(
            &addr().with_instance("1234"),
            Entry {
                data: Some(json!(2)),
                ..Default::default()
            },
        );
        state.set_local(&LocalAddress::new("theme", true), json!("dark"));

        let value = serde_json::to_value(&state)?;
        assert_eq!(
            value,
            json!({
                "LOCAL-PERSIST": {"theme": "dark"},
                "domain": {"action": {"get": {
                    "data": 1, "loading": false, "executed": true,
                    "1234": {"data": 2, "loading": false, "executed": false}
                }}}
            })
        );

        let back: RootState = serde_json::from_value(value)?;
        assert_eq!(back, state);
        Ok(())
    }

    #[test]
    fn rehydrate_drops_transient_state() -> Result<(), anyhow::Error> {
        let state: RootState = serde_json::from_value(json!({
            "LOCAL": {"draft": "x"},
            "LOCAL-PERSIST": {"theme": "dark"},
            "domain": {"action": {
                "get": {"loading": true, "executed": true, "data": 3},
                "post": {"error": "boom", "success": false, "executed": true},
                "put": {"data": 5, "success": true, "executed": true,
                        "abc": {"loading": true, "executed": true}}
            }}
        }))?;

        let state = state.rehydrate(42);
        let get = RestAddress::new("domain", "action", Method::Get);
        let post = RestAddress::new("domain", "action", Method::Post);
        let put = RestAddress::new("domain", "action", Method::Put);

        assert!(state.local.is_empty());
        assert_eq!(state.local_persist.get("theme"), Some(&json!("dark")));
        assert_eq!(state.entry(&get), Some(&Entry::synthesized(42)));
        assert_eq!(state.entry(&post), Some(&Entry::synthesized(42)));
        assert_eq!(state.entry(&put).and_then(|e| e.data.clone()), Some(json!(5)));
        assert_eq!(
            state.entry(&put.with_instance("abc")),
            Some(&Entry::synthesized(42))
        );
        Ok(())
    }
}
