//! Firestore REST document format and conversion to and from appointments.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number};

use crate::error::StoreError;
use crate::types::{
    format_date, is_reserved_key, parse_date, Appointment, END_DATE_FIELD, START_DATE_FIELD,
};

/// A Firestore typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    /// 64-bit integer, transported as decimal text
    IntegerValue(String),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(LatLng),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Value>,
}

/// A Firestore document as returned by the REST API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name, `projects/{p}/databases/{d}/documents/{collection}/{id}`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    #[serde(default, skip_serializing)]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing)]
    pub update_time: Option<String>,
}

impl Document {
    /// Last path segment of the resource name.
    pub fn id(&self) -> Option<&str> {
        self.name
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
    }
}

/// One element of a `documents:runQuery` response stream.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResponse {
    pub document: Option<Document>,
    pub read_time: Option<String>,
}

/// Error body returned by Google APIs.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::NullValue(()),
            serde_json::Value::Bool(b) => Value::BooleanValue(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::IntegerValue(i.to_string()),
                None => Value::DoubleValue(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::StringValue(s.clone()),
            serde_json::Value::Array(items) => Value::ArrayValue(ArrayValue {
                values: items.iter().map(Value::from).collect(),
            }),
            serde_json::Value::Object(map) => Value::MapValue(MapValue {
                fields: map.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect(),
            }),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::NullValue(()) => serde_json::Value::Null,
            Value::BooleanValue(b) => serde_json::Value::Bool(*b),
            Value::IntegerValue(text) => match text.parse::<i64>() {
                Ok(i) => serde_json::Value::Number(i.into()),
                Err(_) => serde_json::Value::String(text.clone()),
            },
            Value::DoubleValue(f) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::TimestampValue(s)
            | Value::StringValue(s)
            | Value::BytesValue(s)
            | Value::ReferenceValue(s) => serde_json::Value::String(s.clone()),
            Value::GeoPointValue(point) => serde_json::json!({
                "latitude": point.latitude,
                "longitude": point.longitude,
            }),
            Value::ArrayValue(array) => {
                serde_json::Value::Array(array.values.iter().map(serde_json::Value::from).collect())
            }
            Value::MapValue(map) => serde_json::Value::Object(
                map.fields
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Build the stored field set for an appointment.
///
/// Dates become ISO-8601 `stringValue`s; absent dates are omitted.
pub fn encode_fields(
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    fields: &Map<String, serde_json::Value>,
) -> BTreeMap<String, Value> {
    let mut encoded: BTreeMap<String, Value> = fields
        .iter()
        .filter(|(key, _)| !is_reserved_key(key))
        .map(|(key, value)| (key.clone(), Value::from(value)))
        .collect();

    if let Some(start) = start_date {
        encoded.insert(START_DATE_FIELD.to_string(), Value::StringValue(format_date(start)));
    }
    if let Some(end) = end_date {
        encoded.insert(END_DATE_FIELD.to_string(), Value::StringValue(format_date(end)));
    }

    encoded
}

/// Convert a stored document into an in-memory appointment.
///
/// # Errors
/// Returns `StoreError::InvalidDocument` if the document has no usable name.
pub fn decode_document(document: Document) -> Result<Appointment, StoreError> {
    let id = document
        .id()
        .ok_or_else(|| StoreError::InvalidDocument(format!("unnamed document: {:?}", document.name)))?
        .to_string();

    let mut fields = document.fields;
    let start_date = take_date(&mut fields, START_DATE_FIELD, &id);
    let end_date = take_date(&mut fields, END_DATE_FIELD, &id);

    let fields = fields
        .iter()
        .filter(|(key, _)| !is_reserved_key(key))
        .map(|(key, value)| (key.clone(), serde_json::Value::from(value)))
        .collect();

    Ok(Appointment {
        id,
        start_date,
        end_date,
        fields,
    })
}

fn take_date(
    fields: &mut BTreeMap<String, Value>,
    key: &str,
    id: &str,
) -> Option<DateTime<Utc>> {
    let parsed = match fields.remove(key)? {
        Value::StringValue(text) | Value::TimestampValue(text) => parse_date(&text),
        Value::NullValue(()) => return None,
        other => {
            tracing::warn!("Appointment {} has non-text {}: {:?}", id, key, other);
            return None;
        }
    };

    if parsed.is_none() {
        tracing::warn!("Appointment {} has unparseable {}", id, key);
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_value_wire_format() {
        let json = serde_json::to_value(Value::IntegerValue("42".into())).unwrap();
        assert_eq!(json, serde_json::json!({ "integerValue": "42" }));

        let json = serde_json::to_value(Value::NullValue(())).unwrap();
        assert_eq!(json, serde_json::json!({ "nullValue": null }));

        let parsed: Value = serde_json::from_value(serde_json::json!({
            "mapValue": { "fields": { "a": { "booleanValue": true } } }
        }))
        .unwrap();
        let mut fields = BTreeMap::new();
        fields.insert("a".to_string(), Value::BooleanValue(true));
        assert_eq!(parsed, Value::MapValue(MapValue { fields }));
    }

    #[test]
    fn test_decode_firestore_document() {
        let doc: Document = serde_json::from_value(serde_json::json!({
            "name": "projects/demo/databases/(default)/documents/appointments/A1",
            "fields": {
                "title": { "stringValue": "Meeting" },
                "startDate": { "stringValue": "2024-01-10T09:00:00.000Z" },
                "endDate": { "stringValue": "2024-01-10T10:00:00.000Z" },
                "allDay": { "booleanValue": false },
                "priority": { "integerValue": "2" },
                "exDate": { "nullValue": null },
                "tags": { "arrayValue": { "values": [ { "stringValue": "work" } ] } },
                "empty": { "arrayValue": {} }
            },
            "createTime": "2024-01-01T00:00:00Z",
            "updateTime": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        let appt = decode_document(doc).unwrap();

        assert_eq!(appt.id, "A1");
        assert_eq!(appt.title(), Some("Meeting"));
        assert_eq!(
            appt.start_date,
            Some(Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap())
        );
        assert_eq!(appt.fields["priority"], serde_json::json!(2));
        assert_eq!(appt.fields["exDate"], serde_json::Value::Null);
        assert_eq!(appt.fields["tags"], serde_json::json!(["work"]));
        assert_eq!(appt.fields["empty"], serde_json::json!([]));
        assert!(!appt.fields.contains_key("startDate"));
    }

    #[test]
    fn test_decode_tolerates_bad_dates() {
        let doc: Document = serde_json::from_value(serde_json::json!({
            "name": "projects/demo/databases/(default)/documents/appointments/B2",
            "fields": {
                "startDate": { "stringValue": "not a date" },
                "endDate": { "integerValue": "5" }
            }
        }))
        .unwrap();

        let appt = decode_document(doc).unwrap();
        assert_eq!(appt.start_date, None);
        assert_eq!(appt.end_date, None);
    }

    #[test]
    fn test_decode_rejects_unnamed_document() {
        let result = decode_document(Document::default());
        assert!(matches!(result, Err(StoreError::InvalidDocument(_))));
    }

    #[test]
    fn test_encode_fields_omits_missing_dates_and_id() {
        let mut fields = Map::new();
        fields.insert("id".into(), serde_json::json!("A1"));
        fields.insert("title".into(), serde_json::json!("Meeting"));
        fields.insert("weight".into(), serde_json::json!(1.5));
        fields.insert("meta".into(), serde_json::json!({ "room": 4 }));

        let start = Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap();
        let encoded = encode_fields(Some(start), None, &fields);

        assert!(!encoded.contains_key("id"));
        assert!(!encoded.contains_key("endDate"));
        assert_eq!(
            encoded["startDate"],
            Value::StringValue("2024-01-10T09:00:00.000Z".into())
        );
        assert_eq!(encoded["weight"], Value::DoubleValue(1.5));
        assert_eq!(
            serde_json::Value::from(&encoded["meta"]),
            serde_json::json!({ "room": 4 })
        );
    }
}
