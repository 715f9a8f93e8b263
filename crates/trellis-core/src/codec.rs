//! Custom-data encoding inside component identifiers.
//!
//! A UI component's platform identifier carries the registered component id
//! plus an ordered list of typed scalar values. Values are joined with a
//! private-use-area separator so they survive inside one opaque string;
//! non-text kinds are tagged with a private-use-area prefix character so
//! decode can tell them apart.
//!
//! Extensibility is an explicit capability map: the application builds one
//! [`CodecRegistry`] at startup (text and number are built in) and hands it
//! to the orchestrator. There are no global extension points.

use crate::error::{CodecError, CodecResult};

/// Separator between the id and each encoded value.
pub const SEPARATOR: char = '\u{E000}';

/// Tag prefix marking an encoded number.
pub const NUMBER_TAG: char = '\u{E001}';

/// One scalar carried inside a component identifier.
#[derive(Clone, Debug, PartialEq)]
pub enum DataValue {
    /// Plain text, stored untagged.
    Text(String),
    /// A number; integral values round-trip without a fractional suffix.
    Number(f64),
    /// A value owned by a registered extension kind.
    Tagged {
        /// Extension kind name, as registered.
        kind: &'static str,
        /// The raw payload the extension decoded from / encodes to.
        raw: String,
    },
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

/// Result of decoding a component identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedId {
    /// The registered component id.
    pub id: String,
    /// The decoded custom data, possibly empty.
    pub data: Vec<DataValue>,
}

/// One scalar kind the codec understands.
pub struct CodecEntry {
    /// Kind name, unique per registry.
    pub kind: &'static str,
    /// Tag character prepended on the wire, unique per registry.
    pub tag: char,
    /// Returns the wire payload (without the tag) if this entry owns the
    /// value, `None` to let other entries try.
    pub encode: fn(&DataValue) -> Option<String>,
    /// Turns a wire payload (without the tag) back into a value.
    pub decode: fn(&str) -> DataValue,
}

fn encode_number(value: &DataValue) -> Option<String> {
    let DataValue::Number(n) = value else {
        return None;
    };
    Some(format_number(*n))
}

fn decode_number(payload: &str) -> DataValue {
    match payload.parse::<f64>() {
        Ok(n) => DataValue::Number(n),
        // Tolerate garbage after the tag rather than dropping data.
        Err(_) => DataValue::Text(payload.to_string()),
    }
}

/// Formats a number the way it was written: integral values lose the
/// fractional suffix so `3.0` round-trips as `"3"`.
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Capability map of scalar kinds for component-identifier encoding.
pub struct CodecRegistry {
    entries: Vec<CodecEntry>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecRegistry {
    /// A registry with the built-in kinds (text, number).
    pub fn new() -> Self {
        Self {
            entries: vec![CodecEntry {
                kind: "number",
                tag: NUMBER_TAG,
                encode: encode_number,
                decode: decode_number,
            }],
        }
    }

    /// Registers an extension kind.
    ///
    /// Tag characters should come from the private use area so they cannot
    /// collide with user text. Duplicate tags or kind names are rejected.
    pub fn register(&mut self, entry: CodecEntry) -> CodecResult<()> {
        if let Some(existing) = self.entries.iter().find(|e| e.tag == entry.tag) {
            return Err(CodecError::DuplicateTag {
                tag: entry.tag,
                kind: existing.kind,
            });
        }
        if self.entries.iter().any(|e| e.kind == entry.kind) {
            return Err(CodecError::DuplicateKind { kind: entry.kind });
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Encodes a component id plus custom data into one identifier string.
    pub fn encode(&self, id: &str, data: &[DataValue]) -> String {
        let mut out = String::from(id);
        for value in data {
            out.push(SEPARATOR);
            match self.entries.iter().find_map(|e| {
                (e.encode)(value).map(|payload| (e.tag, payload))
            }) {
                Some((tag, payload)) => {
                    out.push(tag);
                    out.push_str(&payload);
                }
                None => {
                    // Untagged default: plain text.
                    if let DataValue::Text(text) = value {
                        out.push_str(text);
                    }
                }
            }
        }
        out
    }

    /// Decodes an identifier back into id and custom data.
    ///
    /// An identifier with no separator decodes to the whole string as id and
    /// empty data.
    pub fn decode(&self, raw: &str) -> DecodedId {
        let mut parts = raw.split(SEPARATOR);
        let id = parts.next().unwrap_or_default().to_string();
        let data = parts
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => match self.entries.iter().find(|e| e.tag == first) {
                        Some(entry) => (entry.decode)(chars.as_str()),
                        None => DataValue::Text(part.to_string()),
                    },
                    None => DataValue::Text(String::new()),
                }
            })
            .collect();
        DecodedId { id, data }
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<&str> = self.entries.iter().map(|e| e.kind).collect();
        f.debug_struct("CodecRegistry").field("kinds", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_text_and_number() {
        let codec = CodecRegistry::new();
        let encoded = codec.encode("vote", &["a".into(), 3i64.into()]);
        let decoded = codec.decode(&encoded);

        assert_eq!(decoded.id, "vote");
        assert_eq!(
            decoded.data,
            vec![DataValue::Text("a".to_string()), DataValue::Number(3.0)]
        );
    }

    #[test]
    fn test_no_separator_decodes_to_empty_data() {
        let codec = CodecRegistry::new();
        let decoded = codec.decode("plain-id");
        assert_eq!(decoded.id, "plain-id");
        assert!(decoded.data.is_empty());
    }

    #[test]
    fn test_fractional_numbers_round_trip() {
        let codec = CodecRegistry::new();
        let encoded = codec.encode("id", &[DataValue::Number(2.5)]);
        assert_eq!(codec.decode(&encoded).data, vec![DataValue::Number(2.5)]);
    }

    #[test]
    fn test_integral_number_has_no_fraction_on_wire() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-17.0), "-17");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn test_empty_text_value_round_trips() {
        let codec = CodecRegistry::new();
        let encoded = codec.encode("id", &[DataValue::Text(String::new())]);
        assert_eq!(
            codec.decode(&encoded).data,
            vec![DataValue::Text(String::new())]
        );
    }

    #[test]
    fn test_extension_kind() {
        fn encode_flag(value: &DataValue) -> Option<String> {
            match value {
                DataValue::Tagged { kind: "flag", raw } => Some(raw.clone()),
                _ => None,
            }
        }
        fn decode_flag(payload: &str) -> DataValue {
            DataValue::Tagged {
                kind: "flag",
                raw: payload.to_string(),
            }
        }

        let mut codec = CodecRegistry::new();
        codec
            .register(CodecEntry {
                kind: "flag",
                tag: '\u{E002}',
                encode: encode_flag,
                decode: decode_flag,
            })
            .unwrap();

        let value = DataValue::Tagged {
            kind: "flag",
            raw: "on".to_string(),
        };
        let encoded = codec.encode("id", &[value.clone()]);
        assert_eq!(codec.decode(&encoded).data, vec![value]);
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let mut codec = CodecRegistry::new();
        let err = codec
            .register(CodecEntry {
                kind: "other",
                tag: NUMBER_TAG,
                encode: |_| None,
                decode: |p| DataValue::Text(p.to_string()),
            })
            .unwrap_err();
        assert!(matches!(err, CodecError::DuplicateTag { .. }));
    }
}
