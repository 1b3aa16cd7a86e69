use super::parse_document_value;
use errors::DecodeError;
use rc_core::{ContentDecoder, NamespaceEntries};

/// Decoder for `.yml` and `.yaml` namespaces; the two differ only by tag.
#[derive(Debug, Clone, Copy)]
pub struct YamlDecoder {
    tag: &'static str
}

impl YamlDecoder {
    pub fn yml() -> Self {
        Self { tag: "yml" }
    }

    pub fn yaml() -> Self {
        Self { tag: "yaml" }
    }
}

impl ContentDecoder for YamlDecoder {
    fn type_tag(&self) -> &str {
        self.tag
    }

    fn parse(&self, raw: &serde_json::Value) -> Result<Option<NamespaceEntries>, DecodeError> {
        parse_document_value(self, raw)
    }

    fn decode_document(&self, content: &str) -> Result<serde_json::Value, DecodeError> {
        let invalid = |reason: String| DecodeError::InvalidContent {
            format: self.tag.to_string(),
            reason
        };

        let document: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| invalid(e.to_string()))?;
        serde_json::to_value(document).map_err(|e| invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rc_core::ConfigValue;
    use serde_json::json;

    #[test]
    fn test_parse_nested_mapping() {
        let content = "redis:\n  host: cache.local\n  ports:\n    - 6379\n    - 6380\nname: svc\n";
        let entries = YamlDecoder::yaml().parse(&json!(content)).unwrap().unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries["redis.host"], ConfigValue::from("cache.local"));
        assert_eq!(
            entries["redis.ports"],
            ConfigValue::Seq(vec![ConfigValue::Int(6379), ConfigValue::Int(6380)])
        );
        assert_eq!(entries["name"], ConfigValue::from("svc"));
    }

    #[test]
    fn test_parse_scalar_document_passes_through() {
        assert!(YamlDecoder::yml().parse(&json!("plain text")).unwrap().is_none());
        assert!(YamlDecoder::yml().parse(&json!("   ")).unwrap().is_none());
        assert!(YamlDecoder::yml().parse(&json!(true)).unwrap().is_none());
    }

    #[test]
    fn test_parse_malformed_document() {
        let err = YamlDecoder::yml().parse(&json!("a: [1, 2\nb: c")).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidContent { ref format, .. } if format == "yml"));
    }

    #[test]
    fn test_numeric_keys_become_strings() {
        let entries = YamlDecoder::yaml().parse(&json!("codes:\n  404: missing\n")).unwrap().unwrap();
        assert_eq!(entries["codes.404"], ConfigValue::from("missing"));
    }

    #[test]
    fn test_tags() {
        assert_eq!(YamlDecoder::yml().type_tag(), "yml");
        assert_eq!(YamlDecoder::yaml().type_tag(), "yaml");
    }
}
