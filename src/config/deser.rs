//! Custom deserialization helpers for the configuration file.

use serde::{Deserialize, Deserializer, Serialize};

/// See [`one_or_many`] for details.
#[derive(Serialize, Deserialize, Debug)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// Helper for deserializing any type `T` into [`Vec<T>`]. This is useful for
/// configurations that allow omitting the array syntax, so this TOML:
///
/// ```toml
/// [[server]]
///
/// listen = "127.0.0.1:8100"
/// ```
///
/// Is deserialized as if an array was written instead:
///
/// ```toml
/// [[server]]
///
/// listen = ["127.0.0.1:8100"]
/// ```
///
/// An empty list is rejected because a server must listen somewhere.
pub(super) fn one_or_many<'de, T, D>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    let items: Vec<T> = OneOrMany::deserialize(deserializer)?.into();

    if items.is_empty() {
        return Err(serde::de::Error::invalid_length(0, &"at least one address"));
    }

    Ok(items)
}
