//! Structural cache keys

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::Result;
use crate::fetch::QueryParams;

/// Cache key made of a resource kind and normalized parameters.
///
/// Equality and hashing use a canonical serialization: object keys sorted, null and
/// empty values dropped, arrays kept in order.
#[derive(Clone)]
pub struct QueryKey {
    kind: String,
    params: Value,
    canonical: String,
}

impl QueryKey {
    pub fn new(kind: &str, params: Value) -> Self {
        let params = normalize(params).unwrap_or(Value::Null);
        let mut canonical = String::new();
        write_canonical(&Value::String(kind.to_string()), &mut canonical);
        canonical.push(':');
        write_canonical(&params, &mut canonical);
        Self {
            kind: kind.to_string(),
            params,
            canonical,
        }
    }

    /// Key without parameters; as a filter it matches every key of the kind
    pub fn kind_only(kind: &str) -> Self {
        Self::new(kind, Value::Null)
    }

    /// Key from any serializable parameter record
    pub fn from_params<P: Serialize>(kind: &str, params: &P) -> Result<Self> {
        Ok(Self::new(kind, serde_json::to_value(params)?))
    }

    /// Key from request query parameters. List parameters and repeated names become
    /// arrays in request order, so a one-element list keys the same as `["value"]`.
    pub fn from_query(kind: &str, query: &QueryParams) -> Self {
        let mut map = Map::new();
        for (name, value) in query.pairs() {
            let value = Value::String(value.clone());
            match map.get_mut(name) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None if query.is_list(name) => {
                    map.insert(name.clone(), Value::Array(vec![value]));
                }
                None => {
                    map.insert(name.clone(), value);
                }
            }
        }
        Self::new(kind, Value::Object(map))
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Whether `filter` selects this key: same kind, and every parameter the filter
    /// sets is equal here
    pub fn matches(&self, filter: &QueryKey) -> bool {
        if self.kind != filter.kind {
            return false;
        }
        match (&filter.params, &self.params) {
            (Value::Null, _) => true,
            (Value::Object(wanted), Value::Object(have)) => {
                wanted.iter().all(|(k, v)| have.get(k) == Some(v))
            }
            (wanted, have) => wanted == have,
        }
    }
}

impl PartialEq for QueryKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for QueryKey {}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Debug for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryKey({})", self.canonical)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

// Returns None for values that carry no information
fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::Array(items) => {
            let items: Vec<Value> = items.into_iter().filter_map(normalize).collect();
            if items.is_empty() {
                None
            } else {
                Some(Value::Array(items))
            }
        }
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| normalize(v).map(|v| (k, v)))
                .collect();
            if map.is_empty() {
                None
            } else {
                Some(Value::Object(map))
            }
        }
        other => Some(other),
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}
