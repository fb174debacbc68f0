//! # Generic Domain Object
//!
//! [`ParaObject`] represents any server-side entity. The server stores
//! objects schemalessly, so the client models them as a property bag:
//! the core fields every object carries are typed struct members, and
//! everything else lands in an open-ended JSON map captured with
//! `#[serde(flatten)]`.
//!
//! Unknown keys in a server response are preserved in the property map
//! and round-trip unchanged on the next write.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

fn default_type() -> String {
    "sysprop".to_string()
}

fn default_name() -> String {
    "ParaObject".to_string()
}

fn default_true() -> bool {
    true
}

/// A generic server-side entity record, exchanged as JSON.
///
/// Core fields are typed; any other property set on the object (or
/// returned by the server) lives in the extension map and is accessed
/// through [`get_property`](Self::get_property) /
/// [`set_property`](Self::set_property).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParaObject {
    /// Unique identifier. Assigned by the server when absent on create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Creation timestamp in Unix milliseconds, set by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,

    /// Object type. Defaults to the `"sysprop"` sentinel type when unset.
    #[serde(rename = "type", default = "default_type")]
    pub type_: String,

    /// The application this object belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appid: Option<String>,

    /// Id of the parent object (one-to-many "child" relation).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parentid: Option<String>,

    /// Id of the user or object that created this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creatorid: Option<String>,

    /// Last-modified timestamp in Unix milliseconds, set by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<u64>,

    /// Display name.
    #[serde(default = "default_name")]
    pub name: String,

    /// Tags attached to this object.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Vote count.
    #[serde(default)]
    pub votes: i64,

    /// Whether the object is persisted to the data store.
    #[serde(default = "default_true")]
    pub stored: bool,

    /// Whether the object is indexed for search.
    #[serde(default = "default_true")]
    pub indexed: bool,

    /// Whether the object is cached.
    #[serde(default = "default_true")]
    pub cached: bool,

    /// Extension properties — every key not matching a typed field.
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl Default for ParaObject {
    fn default() -> Self {
        Self {
            id: None,
            timestamp: None,
            type_: default_type(),
            appid: None,
            parentid: None,
            creatorid: None,
            updated: None,
            name: default_name(),
            tags: Vec::new(),
            votes: 0,
            stored: true,
            indexed: true,
            cached: true,
            properties: Map::new(),
        }
    }
}

impl ParaObject {
    /// Create a new object of the default `"sysprop"` type.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new object with a known id and the default type.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Create a new object with a known id and type.
    pub fn with_id_and_type(id: impl Into<String>, type_: impl Into<String>) -> Self {
        let t = type_.into();
        Self {
            id: Some(id.into()),
            type_: if t.is_empty() { default_type() } else { t },
            ..Self::default()
        }
    }

    /// The plural form of the object's type, used in resource paths.
    ///
    /// `"cat"` → `"cats"`, `"address"` → `"addresses"`, `"city"` → `"cities"`.
    pub fn plural(&self) -> String {
        Self::plural_type(&self.type_)
    }

    /// The plural form of a bare type name.
    pub(crate) fn plural_type(type_: &str) -> String {
        match type_.chars().last() {
            Some('s') => format!("{type_}es"),
            Some('y') => format!("{}ies", &type_[..type_.len() - 1]),
            _ => format!("{type_}s"),
        }
    }

    /// The resource URI for this object, e.g. `/cats/123`.
    pub fn object_uri(&self) -> String {
        match &self.id {
            Some(id) => format!("/{}/{}", self.plural(), id),
            None => format!("/{}", self.plural()),
        }
    }

    /// Read an extension property by name.
    pub fn get_property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Set an extension property. Accepts anything convertible to a JSON value.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Remove an extension property, returning its previous value.
    pub fn remove_property(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    /// Decode an object from an arbitrary JSON value.
    ///
    /// Known field names populate the typed fields; all other keys are
    /// kept in the extension property map.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

impl fmt::Display for ParaObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => f.write_str("ParaObject"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_to_sysprop() {
        let obj = ParaObject::new();
        assert_eq!(obj.type_, "sysprop");
        assert_eq!(obj.name, "ParaObject");
        assert_eq!(obj.votes, 0);
        assert!(obj.stored && obj.indexed && obj.cached);
    }

    #[test]
    fn with_id_and_type_keeps_sentinel_for_empty_type() {
        let obj = ParaObject::with_id_and_type("1", "");
        assert_eq!(obj.type_, "sysprop");
        let obj = ParaObject::with_id_and_type("1", "tag");
        assert_eq!(obj.type_, "tag");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(ParaObject::with_id_and_type("1", "cat").plural(), "cats");
        assert_eq!(ParaObject::with_id_and_type("1", "address").plural(), "addresses");
        assert_eq!(ParaObject::with_id_and_type("1", "city").plural(), "cities");
    }

    #[test]
    fn object_uri_includes_id_when_present() {
        let obj = ParaObject::with_id_and_type("123", "cat");
        assert_eq!(obj.object_uri(), "/cats/123");

        let mut obj = ParaObject::new();
        obj.type_ = "cat".into();
        assert_eq!(obj.object_uri(), "/cats");
    }

    #[test]
    fn extension_properties_round_trip() {
        let mut obj = ParaObject::with_id_and_type("t1", "tag");
        obj.set_property("count", 3).set_property("tag", "test");
        assert_eq!(obj.get_property("count"), Some(&json!(3)));

        let json = serde_json::to_value(&obj).expect("serialize");
        assert_eq!(json["count"], json!(3));
        assert_eq!(json["tag"], json!("test"));
        assert_eq!(json["type"], json!("tag"));

        let back = ParaObject::from_value(json).expect("deserialize");
        assert_eq!(back.get_property("count"), Some(&json!(3)));
        assert_eq!(back.type_, "tag");
    }

    #[test]
    fn unknown_keys_land_in_property_map() {
        let obj = ParaObject::from_value(json!({
            "id": "x1",
            "type": "dog",
            "timestamp": 1234567890u64,
            "foo": "bark!",
            "nested": {"a": 1}
        }))
        .expect("decode");
        assert_eq!(obj.id.as_deref(), Some("x1"));
        assert_eq!(obj.timestamp, Some(1234567890));
        assert_eq!(obj.get_property("foo"), Some(&json!("bark!")));
        assert_eq!(obj.get_property("nested"), Some(&json!({"a": 1})));
        assert!(obj.get_property("id").is_none());
    }

    #[test]
    fn remove_property_returns_previous_value() {
        let mut obj = ParaObject::new();
        obj.set_property("k", "v");
        assert_eq!(obj.remove_property("k"), Some(json!("v")));
        assert_eq!(obj.remove_property("k"), None);
    }

    #[test]
    fn missing_type_decodes_to_sentinel() {
        let obj = ParaObject::from_value(json!({"id": "1"})).expect("decode");
        assert_eq!(obj.type_, "sysprop");
    }
}
