//! Typed read access to one namespace of the store.

use crate::decoder::DecoderRegistry;
use crate::error::Result;
use errors::DecodeError;
use rc_core::{ConfigValue, NamespaceFormat};
use serde::de::DeserializeOwned;
use storage::NamespaceStore;

/// Borrowed view over one namespace.
///
/// Every getter returns `None` when the namespace or key is absent, or when
/// the stored value cannot be read as the requested type. Strings are
/// parsed for numbers and booleans, so `"1"` reads as `1`, `1.0` and `true`.
#[derive(Clone, Copy)]
pub struct NamespaceView<'a> {
    store: &'a NamespaceStore,
    decoders: &'a DecoderRegistry,
    namespace: &'a str
}

impl<'a> NamespaceView<'a> {
    pub(crate) fn new(store: &'a NamespaceStore, decoders: &'a DecoderRegistry, namespace: &'a str) -> Self {
        Self {
            store,
            decoders,
            namespace
        }
    }

    pub fn name(&self) -> &str {
        self.namespace
    }

    pub fn get_value(&self, key: &str) -> Option<ConfigValue> {
        self.store.get(self.namespace, key)
    }

    /// Scalars are rendered as text; sequences are not strings.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.get_value(key)? {
            ConfigValue::String(s) => Some(s),
            ConfigValue::Seq(_) => None,
            scalar => Some(scalar.to_string())
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get_value(key)?.as_i64()
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get_value(key)?.as_f64()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_value(key)?.as_bool()
    }

    /// Only sequences whose elements are all strings qualify.
    pub fn get_string_slice(&self, key: &str) -> Option<Vec<String>> {
        self.get_value(key)?
            .as_seq()?
            .iter()
            .map(|item| item.as_str().map(String::from))
            .collect()
    }

    pub fn get_int_slice(&self, key: &str) -> Option<Vec<i64>> {
        self.get_value(key)?
            .as_seq()?
            .iter()
            .map(ConfigValue::as_i64)
            .collect()
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key)
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.get_int(key).unwrap_or(default)
    }

    pub fn get_float_or(&self, key: &str, default: f64) -> f64 {
        self.get_float(key).unwrap_or(default)
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    pub fn keys(&self) -> Vec<String> {
        self.store.keys(self.namespace)
    }

    pub fn release_key(&self) -> Option<String> {
        self.store.release_key(self.namespace)
    }

    /// Unparsed document of a yml, yaml or json namespace.
    pub fn content(&self) -> Option<String> {
        let key = NamespaceFormat::from_namespace(self.namespace).content_key();
        self.get_value(&key)?.as_str().map(String::from)
    }

    /// Deserializes the namespace's document into `T`.
    pub fn value<T: DeserializeOwned>(&self) -> Result<T> {
        let content = self.content().ok_or_else(|| DecodeError::MissingContent {
            namespace: self.namespace.to_string()
        })?;
        let document = self
            .decoders
            .for_namespace(self.namespace)
            .decode_document(&content)?;
        Ok(serde_json::from_value(document)?)
    }
}

impl std::fmt::Debug for NamespaceView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceView")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
