//! Core types for the remote configuration client

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Namespace consulted when callers don't name one.
pub const DEFAULT_NAMESPACE: &str = "application";

/// A leaf configuration value.
///
/// Raw namespaces only ever hold `String`; document namespaces (yml, yaml,
/// json) may hold any scalar or a sequence of them after flattening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Seq(Vec<ConfigValue>)
}

impl ConfigValue {
    /// Converts a JSON node into a leaf value.
    ///
    /// Objects are not leaves; callers that reach one here get its JSON
    /// text back so nothing is silently lost.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::String(String::new()),
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default())
            },
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(items) => Self::Seq(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(_) => Self::String(value.to_string())
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::String(s) => s.trim().parse().ok(),
            _ => None
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            Self::String(s) => s.trim().parse().ok(),
            _ => None
        }
    }

    /// Accepts native booleans and the usual textual spellings
    /// (`1`, `t`, `true`, `TRUE`, `0`, `f`, `false`, ...).
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::String(s) => parse_bool(s.trim()),
            _ => None
        }
    }

    pub fn as_seq(&self) -> Option<&[ConfigValue]> {
        match self {
            Self::Seq(items) => Some(items),
            _ => None
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
            Self::Seq(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(value: Vec<ConfigValue>) -> Self {
        Self::Seq(value)
    }
}

/// Flat key/value contents of one namespace.
pub type NamespaceEntries = HashMap<String, ConfigValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Add,
    Modify,
    Delete
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "ADD",
            Self::Modify => "MODIFY",
            Self::Delete => "DELETE"
        };
        f.write_str(s)
    }
}

/// One key's transition within a single sync cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "changeType", rename_all = "UPPERCASE")]
pub enum Change {
    Add { new_value: ConfigValue },
    Modify {
        old_value: ConfigValue,
        new_value: ConfigValue
    },
    Delete { old_value: ConfigValue }
}

impl Change {
    pub fn change_type(&self) -> ChangeType {
        match self {
            Self::Add { .. } => ChangeType::Add,
            Self::Modify { .. } => ChangeType::Modify,
            Self::Delete { .. } => ChangeType::Delete
        }
    }

    pub fn old_value(&self) -> Option<&ConfigValue> {
        match self {
            Self::Add { .. } => None,
            Self::Modify { old_value, .. } | Self::Delete { old_value } => Some(old_value)
        }
    }

    pub fn new_value(&self) -> Option<&ConfigValue> {
        match self {
            Self::Add { new_value } | Self::Modify { new_value, .. } => Some(new_value),
            Self::Delete { .. } => None
        }
    }
}

/// All key-level changes detected in one namespace during one sync cycle.
///
/// Never constructed with an empty `changes` map by the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub namespace: String,
    pub changes: HashMap<String, Change>
}

impl ChangeEvent {
    pub fn new(namespace: impl Into<String>, changes: HashMap<String, Change>) -> Self {
        Self {
            namespace: namespace.into(),
            changes
        }
    }

    pub fn get(&self, key: &str) -> Option<&Change> {
        self.changes.get(key)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Content format of a namespace, derived from its name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceFormat {
    Yml,
    Yaml,
    Json,
    Properties,
    Raw
}

impl NamespaceFormat {
    pub fn from_namespace(namespace: &str) -> Self {
        if namespace.ends_with(".yml") {
            Self::Yml
        } else if namespace.ends_with(".yaml") {
            Self::Yaml
        } else if namespace.ends_with(".json") {
            Self::Json
        } else if namespace.ends_with(".properties") {
            Self::Properties
        } else {
            Self::Raw
        }
    }

    /// Type tag used to select a decoder; empty for raw namespaces.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Yml => "yml",
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Properties => "properties",
            Self::Raw => ""
        }
    }

    /// Document formats carry their whole payload under a `content` entry.
    pub fn is_container(self) -> bool {
        matches!(self, Self::Yml | Self::Yaml | Self::Json)
    }

    /// Synthetic key holding the unparsed document, e.g. `jsoncontent`.
    pub fn content_key(self) -> String {
        format!("{}content", self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_value_from_json_scalars() {
        assert_eq!(ConfigValue::from_json(&json!("a")), ConfigValue::from("a"));
        assert_eq!(ConfigValue::from_json(&json!(7)), ConfigValue::Int(7));
        assert_eq!(ConfigValue::from_json(&json!(1.5)), ConfigValue::Float(1.5));
        assert_eq!(ConfigValue::from_json(&json!(true)), ConfigValue::Bool(true));
        assert_eq!(ConfigValue::from_json(&json!(null)), ConfigValue::from(""));
    }

    #[test]
    fn test_config_value_from_json_nested() {
        let seq = ConfigValue::from_json(&json!([1, "two"]));
        assert_eq!(
            seq,
            ConfigValue::Seq(vec![ConfigValue::Int(1), ConfigValue::from("two")])
        );

        let obj = ConfigValue::from_json(&json!({"a": 1}));
        assert_eq!(obj, ConfigValue::from(r#"{"a":1}"#));
    }

    #[test]
    fn test_config_value_typed_views() {
        assert_eq!(ConfigValue::from("42").as_i64(), Some(42));
        assert_eq!(ConfigValue::from(" 2.5 ").as_f64(), Some(2.5));
        assert_eq!(ConfigValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(ConfigValue::from("T").as_bool(), Some(true));
        assert_eq!(ConfigValue::from("0").as_bool(), Some(false));
        assert_eq!(ConfigValue::from("yes").as_bool(), None);
        assert_eq!(ConfigValue::Int(1).as_str(), None);
        assert_eq!(ConfigValue::Float(1.5).as_i64(), None);
    }

    #[test]
    fn test_config_value_structural_equality() {
        let a = ConfigValue::Seq(vec![ConfigValue::Int(1), ConfigValue::Seq(vec![])]);
        let b = ConfigValue::Seq(vec![ConfigValue::Int(1), ConfigValue::Seq(vec![])]);
        assert_eq!(a, b);
        assert_ne!(ConfigValue::Int(1), ConfigValue::from("1"));
    }

    #[test]
    fn test_config_value_untagged_serde() {
        let values = vec![
            ConfigValue::Bool(false),
            ConfigValue::Int(-4),
            ConfigValue::Float(0.25),
            ConfigValue::from("text"),
            ConfigValue::Seq(vec![ConfigValue::Int(1), ConfigValue::from("x")]),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[false,-4,0.25,"text",[1,"x"]]"#);
        let back: Vec<ConfigValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn test_config_value_display() {
        let seq = ConfigValue::Seq(vec![ConfigValue::Int(1), ConfigValue::from("b")]);
        assert_eq!(seq.to_string(), "[1, b]");
        assert_eq!(ConfigValue::from("plain").to_string(), "plain");
    }

    #[test]
    fn test_change_accessors() {
        let add = Change::Add {
            new_value: ConfigValue::from("v")
        };
        assert_eq!(add.change_type(), ChangeType::Add);
        assert!(add.old_value().is_none());
        assert_eq!(add.new_value(), Some(&ConfigValue::from("v")));

        let modify = Change::Modify {
            old_value: ConfigValue::from("a"),
            new_value: ConfigValue::from("b")
        };
        assert_eq!(modify.change_type(), ChangeType::Modify);
        assert_eq!(modify.old_value(), Some(&ConfigValue::from("a")));

        let delete = Change::Delete {
            old_value: ConfigValue::from("a")
        };
        assert_eq!(delete.change_type(), ChangeType::Delete);
        assert!(delete.new_value().is_none());
        assert_eq!(delete.change_type().to_string(), "DELETE");
    }

    #[test]
    fn test_namespace_format_from_suffix() {
        let cases = vec![
            ("config.yml", NamespaceFormat::Yml, "yml"),
            ("config.yaml", NamespaceFormat::Yaml, "yaml"),
            ("client.json", NamespaceFormat::Json, "json"),
            ("db.properties", NamespaceFormat::Properties, "properties"),
            ("application", NamespaceFormat::Raw, ""),
            ("json", NamespaceFormat::Raw, ""),
        ];

        for (namespace, format, tag) in cases {
            assert_eq!(NamespaceFormat::from_namespace(namespace), format);
            assert_eq!(format.tag(), tag);
        }
    }

    #[test]
    fn test_namespace_format_content_key() {
        assert_eq!(NamespaceFormat::Json.content_key(), "jsoncontent");
        assert!(NamespaceFormat::Yaml.is_container());
        assert!(!NamespaceFormat::Properties.is_container());
        assert!(!NamespaceFormat::Raw.is_container());
    }
}
