//! # Content Decoders
//!
//! Flattening of namespace payloads into key/value mappings, selected by the
//! namespace's suffix tag. Unknown tags fall back to a raw passthrough.

mod json;
mod passthrough;
mod yaml;

pub use json::JsonDecoder;
pub use passthrough::PassthroughDecoder;
pub use yaml::YamlDecoder;

use errors::DecodeError;
use rc_core::{ConfigValue, ContentDecoder, NamespaceEntries, NamespaceFormat};
use std::collections::HashMap;
use std::sync::Arc;

/// Key of the configuration entry holding a document namespace's payload.
pub const CONTENT_ENTRY: &str = "content";

/// Type tag to decoder lookup.
#[derive(Clone)]
pub struct DecoderRegistry {
    decoders: HashMap<String, Arc<dyn ContentDecoder>>,
    fallback: Arc<dyn ContentDecoder>
}

impl DecoderRegistry {
    /// A registry with no decoders; every tag resolves to the raw fallback.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
            fallback: Arc::new(PassthroughDecoder::raw())
        }
    }

    /// Replaces any decoder previously registered under the same tag.
    pub fn register(&mut self, decoder: Arc<dyn ContentDecoder>) {
        self.decoders
            .insert(decoder.type_tag().to_string(), decoder);
    }

    pub fn get(&self, tag: &str) -> Arc<dyn ContentDecoder> {
        self.decoders
            .get(tag)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    pub fn for_namespace(&self, namespace: &str) -> Arc<dyn ContentDecoder> {
        self.get(NamespaceFormat::from_namespace(namespace).tag())
    }

    /// Turns the `configurations` object of a fetch result into the flat
    /// mapping stored for `namespace`.
    ///
    /// Values the decoder recognises as documents are replaced by their
    /// flattened keys; everything else is kept under its own key. Document
    /// namespaces additionally keep the unparsed payload under the synthetic
    /// `<tag>content` key.
    pub fn flatten_configurations(
        &self,
        namespace: &str,
        configurations: &serde_json::Map<String, serde_json::Value>
    ) -> Result<NamespaceEntries, DecodeError> {
        let decoder = self.for_namespace(namespace);
        let mut entries = NamespaceEntries::with_capacity(configurations.len());

        for (key, raw) in configurations {
            match decoder.parse(raw)? {
                Some(flattened) => entries.extend(flattened),
                None => {
                    entries.insert(key.clone(), ConfigValue::from_json(raw));
                }
            }
        }

        let format = NamespaceFormat::from_namespace(namespace);
        if format.is_container() {
            if let Some(content) = configurations.get(CONTENT_ENTRY) {
                entries.insert(format.content_key(), ConfigValue::from_json(content));
            }
        }

        Ok(entries)
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(YamlDecoder::yml()));
        registry.register(Arc::new(YamlDecoder::yaml()));
        registry.register(Arc::new(JsonDecoder));
        registry.register(Arc::new(PassthroughDecoder::properties()));
        registry
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<&String> = self.decoders.keys().collect();
        tags.sort();
        f.debug_struct("DecoderRegistry")
            .field("tags", &tags)
            .finish_non_exhaustive()
    }
}

/// Flattens a decoded document tree, joining nested mapping keys with `.`.
pub(crate) fn flatten_document(document: &serde_json::Value) -> NamespaceEntries {
    let mut entries = NamespaceEntries::new();
    if let serde_json::Value::Object(map) = document {
        flatten_into(&mut entries, None, map);
    }
    entries
}

fn flatten_into(
    entries: &mut NamespaceEntries,
    prefix: Option<&str>,
    map: &serde_json::Map<String, serde_json::Value>
) {
    for (key, value) in map {
        let full_key = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone()
        };
        match value {
            serde_json::Value::Object(nested) if !nested.is_empty() => {
                flatten_into(entries, Some(&full_key), nested);
            }
            _ => {
                entries.insert(full_key, ConfigValue::from_json(value));
            }
        }
    }
}

/// Shared `parse` behaviour of document decoders: only non-empty strings
/// holding a mapping are documents.
pub(crate) fn parse_document_value<D>(
    decoder: &D,
    raw: &serde_json::Value
) -> Result<Option<NamespaceEntries>, DecodeError>
where
    D: ContentDecoder + ?Sized
{
    let content = match raw {
        serde_json::Value::String(s) if !s.trim().is_empty() => s,
        _ => return Ok(None)
    };

    match decoder.decode_document(content)? {
        document @ serde_json::Value::Object(_) => Ok(Some(flatten_document(&document))),
        _ => Ok(None)
    }
}
