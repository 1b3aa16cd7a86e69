use super::parse_document_value;
use errors::DecodeError;
use rc_core::{ContentDecoder, NamespaceEntries};

/// Decoder for `.json` namespaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl ContentDecoder for JsonDecoder {
    fn type_tag(&self) -> &str {
        "json"
    }

    fn parse(&self, raw: &serde_json::Value) -> Result<Option<NamespaceEntries>, DecodeError> {
        // Plain strings that do not open an object or array are values, not documents.
        match raw.as_str().map(str::trim_start) {
            Some(s) if s.starts_with('{') || s.starts_with('[') => parse_document_value(self, raw),
            _ => Ok(None)
        }
    }

    fn decode_document(&self, content: &str) -> Result<serde_json::Value, DecodeError> {
        serde_json::from_str(content).map_err(|e| DecodeError::InvalidContent {
            format: "json".to_string(),
            reason: e.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rc_core::ConfigValue;
    use serde_json::json;

    #[test]
    fn test_parse_object_document() {
        let entries = JsonDecoder
            .parse(&json!(r#"{"feature": {"enabled": true, "ratio": 0.25}}"#))
            .unwrap()
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries["feature.enabled"], ConfigValue::Bool(true));
        assert_eq!(entries["feature.ratio"], ConfigValue::Float(0.25));
    }

    #[test]
    fn test_parse_non_documents() {
        assert!(JsonDecoder.parse(&json!(42)).unwrap().is_none());
        assert!(JsonDecoder.parse(&json!("")).unwrap().is_none());
        assert!(JsonDecoder.parse(&json!("hello")).unwrap().is_none());
        assert!(JsonDecoder.parse(&json!("[1, 2]")).unwrap().is_none());
    }

    #[test]
    fn test_parse_malformed_document() {
        let err = JsonDecoder.parse(&json!("{\"a\": [1,")).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidContent { ref format, .. } if format == "json"));
    }

    #[test]
    fn test_decode_document() {
        let document = JsonDecoder.decode_document(r#"{"name": "svc"}"#).unwrap();
        assert_eq!(document, json!({"name": "svc"}));
    }
}
