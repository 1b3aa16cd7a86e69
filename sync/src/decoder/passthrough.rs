use errors::DecodeError;
use rc_core::{ContentDecoder, NamespaceEntries};

/// Decoder for key/value namespaces: values are stored exactly as returned.
#[derive(Debug, Clone, Copy)]
pub struct PassthroughDecoder {
    tag: &'static str
}

impl PassthroughDecoder {
    /// Fallback for namespaces without a recognised suffix.
    pub fn raw() -> Self {
        Self { tag: "" }
    }

    pub fn properties() -> Self {
        Self { tag: "properties" }
    }
}

impl ContentDecoder for PassthroughDecoder {
    fn type_tag(&self) -> &str {
        self.tag
    }

    fn parse(&self, _raw: &serde_json::Value) -> Result<Option<NamespaceEntries>, DecodeError> {
        Ok(None)
    }

    fn decode_document(&self, _content: &str) -> Result<serde_json::Value, DecodeError> {
        let format = if self.tag.is_empty() { "raw" } else { self.tag };
        Err(DecodeError::InvalidContent {
            format: format.to_string(),
            reason: "key/value namespaces have no document form".to_string()
        })
    }
}
