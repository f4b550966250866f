// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache key derivation from endpoint name and arguments.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The identity of a cached query result.
///
/// A key is derived from an endpoint name and the query's arguments, with
/// object keys serialized in sorted order so that structurally equal argument
/// values always produce the same key regardless of construction order.
///
/// # Examples
///
/// ```
/// use refetch_core::CacheKey;
/// use serde_json::json;
///
/// let a = CacheKey::derive("getPost", &json!({"id": 7, "full": true}));
/// let b = CacheKey::derive("getPost", &json!({"full": true, "id": 7}));
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), r#"getPost({"full":true,"id":7})"#);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for an endpoint and argument value.
    #[must_use]
    pub fn derive(endpoint: &str, args: &Value) -> Self {
        Self(format!("{endpoint}({})", stable_args(args)))
    }

    /// Wraps an already-derived key string.
    ///
    /// Used by custom key functions; most callers want [`CacheKey::derive`].
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key's string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serializes an argument value with object keys in sorted order.
///
/// `serde_json` preserves insertion order by default, so `{"a":1,"b":2}` and
/// `{"b":2,"a":1}` would otherwise serialize differently and split the cache.
#[must_use]
pub fn stable_args(args: &Value) -> String {
    let mut out = String::new();
    write_stable(args, &mut out);
    out
}

fn write_stable(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_stable(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_stable(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}
