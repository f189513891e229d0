//! The canonical wire record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::context::expand_nested;
use crate::event::FieldValue;

/// One log record as shipped downstream, field names matching the udplog
/// wire format. `context` and the optional string fields disappear from the
/// serialized form entirely when empty; caller location is always present,
/// zero values included.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
    #[serde(rename = "appname")]
    pub app_name: String,
    #[serde(rename = "hostname")]
    pub host_name: String,
    #[serde(rename = "logLevel")]
    pub log_level: String,
    #[serde(rename = "filename")]
    pub file_name: String,
    #[serde(rename = "funcName")]
    pub func_name: String,
    #[serde(rename = "lineno")]
    pub line_no: u32,
    pub message: String,
    pub timestamp: Timestamp,
    pub pid: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tid: String,
    #[serde(rename = "excType", default, skip_serializing_if = "String::is_empty")]
    pub exc_type: String,
    #[serde(rename = "excText", default, skip_serializing_if = "String::is_empty")]
    pub exc_text: String,
    #[serde(rename = "excValue", default, skip_serializing_if = "String::is_empty")]
    pub exc_value: String,
}

impl LogRecord {
    /// Fold the event's fields into the record.
    ///
    /// Each key lands in exactly one place: either promoted onto a named
    /// record field (strict type match required) or expanded into `context`.
    /// An empty field set leaves `context` empty, which keeps it off the
    /// wire.
    pub fn apply_fields(&mut self, fields: Vec<(String, FieldValue)>) {
        for (key, value) in fields {
            // An error-kind field promotes its decomposed triple no matter
            // what the originating key was called.
            if let FieldValue::Error(info) = value {
                self.exc_type = info.exc_type;
                self.exc_value = info.exc_value;
                self.exc_text = info.exc_text;
                continue;
            }

            match key.as_str() {
                "tid" => {
                    if let FieldValue::Value(Value::String(v)) = value {
                        self.tid = v;
                        continue;
                    }
                }
                "excValue" => {
                    if let FieldValue::Value(Value::String(v)) = value {
                        self.exc_value = v;
                        continue;
                    }
                }
                "excType" => {
                    if let FieldValue::Value(Value::String(v)) = value {
                        self.exc_type = v;
                        continue;
                    }
                }
                "excText" => {
                    if let FieldValue::Value(Value::String(v)) = value {
                        self.exc_text = v;
                        continue;
                    }
                }
                "excFuncName" => {
                    if let FieldValue::Value(Value::String(v)) = value {
                        self.func_name = v;
                        continue;
                    }
                }
                "excFileName" => {
                    if let FieldValue::Value(Value::String(v)) = value {
                        self.file_name = v;
                        continue;
                    }
                }
                "excLineno" => {
                    if let Some(line) = as_line_number(&value) {
                        self.line_no = line;
                        continue;
                    }
                }
                "category" => {
                    if let FieldValue::Value(Value::String(v)) = value {
                        self.category = v;
                        continue;
                    }
                }
                _ => {}
            }

            expand_nested(&key, value.into_context_value(), &mut self.context);
        }
    }
}

fn as_line_number(value: &FieldValue) -> Option<u32> {
    match value {
        FieldValue::Value(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        _ => None,
    }
}

/// Seconds since the epoch, serialized as a fixed six-decimal JSON number
/// literal rather than the shortest float representation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timestamp(pub f64);

impl From<DateTime<Utc>> for Timestamp {
    fn from(when: DateTime<Utc>) -> Self {
        Timestamp(when.timestamp_micros() as f64 / 1_000_000.0)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let literal = format!("{:.6}", self.0);
        let number: serde_json::Number =
            serde_json::from_str(&literal).map_err(serde::ser::Error::custom)?;
        number.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ErrorInfo, RequestInfo};
    use serde_json::json;

    fn value(v: Value) -> FieldValue {
        FieldValue::Value(v)
    }

    #[test]
    fn plain_fields_land_in_context() {
        let mut record = LogRecord::default();
        record.apply_fields(vec![
            ("foo".into(), value(json!("bar"))),
            ("bar".into(), value(json!(1))),
            ("bean".into(), value(json!(true))),
        ]);
        assert_eq!(record.context["foo"], json!("bar"));
        assert_eq!(record.context["bar"], json!(1));
        assert_eq!(record.context["bean"], json!(true));
    }

    #[test]
    fn string_candidates_promote_to_named_fields() {
        let mut record = LogRecord::default();
        record.apply_fields(vec![
            ("tid".into(), value(json!("foo"))),
            ("excValue".into(), value(json!("foo"))),
            ("excType".into(), value(json!("foo"))),
            ("excFuncName".into(), value(json!("foo"))),
            ("excLineno".into(), value(json!(1))),
            ("excFileName".into(), value(json!("foo"))),
            ("category".into(), value(json!("foo-bar"))),
        ]);
        assert_eq!(record.tid, "foo");
        assert_eq!(record.exc_value, "foo");
        assert_eq!(record.exc_type, "foo");
        assert_eq!(record.func_name, "foo");
        assert_eq!(record.line_no, 1);
        assert_eq!(record.file_name, "foo");
        assert_eq!(record.category, "foo-bar");
        assert!(record.context.is_empty());
    }

    #[test]
    fn type_mismatches_fall_through_to_context_unchanged() {
        let mut record = LogRecord::default();
        record.apply_fields(vec![
            ("tid".into(), value(json!(10))),
            ("excValue".into(), value(json!(10))),
            ("excType".into(), value(json!(10))),
            ("excFuncName".into(), value(json!(10))),
            ("excLineno".into(), value(json!("1"))),
            ("excFileName".into(), value(json!(10))),
            ("category".into(), value(json!(10))),
        ]);
        assert_eq!(record.tid, "");
        assert_eq!(record.exc_value, "");
        assert_eq!(record.exc_type, "");
        assert_eq!(record.func_name, "");
        assert_eq!(record.line_no, 0);
        assert_eq!(record.file_name, "");
        assert_eq!(record.category, "");
        assert_eq!(record.context["tid"], json!(10));
        assert_eq!(record.context["excValue"], json!(10));
        assert_eq!(record.context["excLineno"], json!("1"));
    }

    #[test]
    fn error_fields_promote_under_any_key() {
        let mut record = LogRecord::default();
        record.apply_fields(vec![(
            "cause".into(),
            FieldValue::Error(ErrorInfo {
                exc_type: "io::Error".into(),
                exc_value: "bar: foo".into(),
                exc_text: "bar: foo: root".into(),
            }),
        )]);
        assert_eq!(record.exc_type, "io::Error");
        assert_eq!(record.exc_value, "bar: foo");
        assert_eq!(record.exc_text, "bar: foo: root");
        assert!(record.context.is_empty());
    }

    #[test]
    fn request_fields_expand_in_context() {
        let mut record = LogRecord::default();
        record.apply_fields(vec![(
            "http".into(),
            FieldValue::Request(RequestInfo {
                method: "GET".into(),
                url: "http://example.com".into(),
                ..RequestInfo::default()
            }),
        )]);
        let http = record.context["http"].as_object().unwrap();
        assert_eq!(http.len(), 7);
        assert_eq!(http["method"], "GET");
    }

    #[test]
    fn empty_fields_keep_context_off_the_wire() {
        let record = LogRecord {
            message: "hi".into(),
            ..LogRecord::default()
        };
        let encoded = serde_json::to_string(&record).unwrap();
        assert!(!encoded.contains("\"context\""));
        assert!(!encoded.contains("\"tid\""));
        assert!(!encoded.contains("\"excType\""));
        // Caller location stays, zero values included.
        assert!(encoded.contains("\"filename\":\"\""));
        assert!(encoded.contains("\"lineno\":0"));
    }

    #[test]
    fn timestamp_serializes_with_six_decimals() {
        let record = LogRecord {
            timestamp: Timestamp(1470589455.25),
            ..LogRecord::default()
        };
        let encoded = serde_json::to_string(&record).unwrap();
        assert!(
            encoded.contains("\"timestamp\":1470589455.250000"),
            "unexpected encoding: {encoded}"
        );
    }

    #[test]
    fn timestamp_round_trips() {
        let encoded = serde_json::to_string(&Timestamp(2.5)).unwrap();
        assert_eq!(encoded, "2.500000");
        let decoded: Timestamp = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, Timestamp(2.5));
    }
}
