//! Serde helpers for the definition format.

use super::TransitionDefinition;
use serde::Deserialize;

/// `{ "k": v, ... }` as an insertion-ordered `Vec<(String, V)>`.
///
/// Duplicate keys are kept so that validation can report them.
pub mod ordered_map {
    use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
    use serde::ser::{Serialize, SerializeMap, Serializer};
    use std::fmt;
    use std::marker::PhantomData;

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S, V>(entries: &Vec<(String, V)>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = Vec<(String, V)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of named entries")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// A single string or a list of strings.
pub mod one_or_many {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S: Serializer>(items: &Vec<String>, serializer: S) -> Result<S::Ok, S::Error> {
        items.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        })
    }
}

/// Wire shapes accepted for a transition.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum TransitionRepr {
    Target(String),
    Full {
        #[serde(default)]
        target: Option<String>,
        #[serde(default, deserialize_with = "one_or_many::deserialize")]
        actions: Vec<String>,
        #[serde(default, alias = "cond")]
        guard: Option<String>,
        #[serde(default)]
        internal: bool,
    },
}

impl From<TransitionRepr> for TransitionDefinition {
    fn from(repr: TransitionRepr) -> Self {
        match repr {
            TransitionRepr::Target(target) => TransitionDefinition::from(target),
            TransitionRepr::Full {
                target,
                actions,
                guard,
                internal,
            } => TransitionDefinition {
                target,
                actions,
                guard,
                internal,
            },
        }
    }
}
