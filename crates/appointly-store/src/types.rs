//! Appointment types and date handling.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Document field holding the start of an appointment.
pub const START_DATE_FIELD: &str = "startDate";
/// Document field holding the end of an appointment.
pub const END_DATE_FIELD: &str = "endDate";
/// Key the widget uses for the identifier; never stored as a field.
pub const ID_FIELD: &str = "id";

/// Keys that are managed by the typed fields and never pass through `fields`.
pub(crate) fn is_reserved_key(key: &str) -> bool {
    matches!(key, ID_FIELD | START_DATE_FIELD | END_DATE_FIELD)
}

/// An appointment held in the in-memory list.
///
/// Everything besides the id and the time range is free-form widget data
/// (title, notes, allDay, rRule, exDate, ...) kept verbatim in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    #[serde(
        rename = "startDate",
        default,
        with = "date_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(
        rename = "endDate",
        default,
        with = "date_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Appointment {
    pub fn title(&self) -> Option<&str> {
        self.fields.get("title").and_then(Value::as_str)
    }

    /// Apply a partial update, returning the merged record.
    ///
    /// Dates are replaced only when the patch carries one. Every other key in
    /// the patch overwrites the existing value; keys not in the patch stay.
    pub fn merged(&self, patch: &AppointmentPatch) -> Appointment {
        let mut merged = self.clone();

        if let Some(start) = patch.start_date {
            merged.start_date = Some(to_millis(start));
        }
        if let Some(end) = patch.end_date {
            merged.end_date = Some(to_millis(end));
        }

        for (key, value) in &patch.fields {
            if is_reserved_key(key) {
                continue;
            }
            merged.fields.insert(key.clone(), value.clone());
        }

        merged
    }

    /// True if the appointment intersects `[from, to)`.
    ///
    /// Appointments without a start date never match. A missing end date is
    /// treated as a zero-length appointment at the start.
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        let Some(start) = self.start_date else {
            return false;
        };
        let end = self.end_date.unwrap_or(start).max(start);

        if start == end {
            return start >= from && start < to;
        }
        start < to && end > from
    }
}

/// A record submitted from the add form, before the store assigns an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAppointment {
    #[serde(
        rename = "startDate",
        default,
        with = "date_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(
        rename = "endDate",
        default,
        with = "date_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl NewAppointment {
    pub fn new(title: impl Into<String>) -> Self {
        Self::default().with_field("title", Value::String(title.into()))
    }

    pub fn with_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_date = Some(to_millis(start));
        self.end_date = Some(to_millis(end));
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Attach the store-assigned id.
    pub fn into_appointment(self, id: impl Into<String>) -> Appointment {
        let mut fields = self.fields;
        fields.retain(|key, _| !is_reserved_key(key));

        Appointment {
            id: id.into(),
            start_date: self.start_date.map(to_millis),
            end_date: self.end_date.map(to_millis),
            fields,
        }
    }
}

/// Partial update for an existing appointment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppointmentPatch {
    #[serde(
        rename = "startDate",
        default,
        with = "date_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(
        rename = "endDate",
        default,
        with = "date_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl AppointmentPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self::default().with_field("title", Value::String(title.into()))
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn with_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_date = Some(to_millis(start));
        self.end_date = Some(to_millis(end));
        self
    }
}

/// Format an instant the way the store keeps it: `2024-01-10T09:00:00.000Z`.
pub fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Drop sub-millisecond precision, which the stored text can't carry.
pub(crate) fn to_millis(date: DateTime<Utc>) -> DateTime<Utc> {
    date.trunc_subsecs(3)
}

/// Parse date text coming from the store or the widget.
///
/// Accepts RFC 3339, then local date-times without an offset (read as UTC),
/// then a bare date (midnight UTC). Precision beyond milliseconds is dropped.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(to_millis(dt.with_timezone(&Utc)));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(to_millis(naive.and_utc()));
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

mod date_option {
    use super::{format_date, parse_date};
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer.serialize_str(&format_date(*dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(text) if text.trim().is_empty() => Ok(None),
            Some(text) => parse_date(&text)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid date: {}", text))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, h, m, 0).unwrap()
    }

    fn meeting() -> Appointment {
        NewAppointment::new("Meeting")
            .with_range(at(9, 0), at(10, 0))
            .with_field("notes", Value::String("Room 4".into()))
            .into_appointment("A1")
    }

    #[test]
    fn test_date_round_trip() {
        let instant = Utc.timestamp_millis_opt(1_704_877_200_123).unwrap();
        let text = format_date(instant);
        assert_eq!(text, "2024-01-10T09:00:00.123Z");
        assert_eq!(parse_date(&text), Some(instant));
    }

    #[test]
    fn test_parse_date_variants() {
        assert_eq!(parse_date("2024-01-10T09:00:00+01:00"), Some(at(8, 0)));
        assert_eq!(parse_date("2024-01-10T09:00"), Some(at(9, 0)));
        assert_eq!(parse_date("2024-01-10T09:00:00.000"), Some(at(9, 0)));
        assert_eq!(parse_date("2024-01-10"), Some(at(0, 0)));
        assert_eq!(parse_date("next tuesday"), None);
    }

    #[test]
    fn test_merge_changes_only_patched_fields() {
        let original = meeting();
        let merged = original.merged(&AppointmentPatch::title("Standup"));

        assert_eq!(merged.title(), Some("Standup"));
        assert_eq!(merged.start_date, original.start_date);
        assert_eq!(merged.end_date, original.end_date);
        assert_eq!(merged.fields.get("notes"), original.fields.get("notes"));
        assert_eq!(merged.id, "A1");
    }

    #[test]
    fn test_merge_ignores_id_and_keeps_dates_when_absent() {
        let patch = AppointmentPatch::default()
            .with_field("id", Value::String("hijack".into()))
            .with_field("allDay", Value::Bool(true));

        let merged = meeting().merged(&patch);

        assert_eq!(merged.id, "A1");
        assert!(!merged.fields.contains_key("id"));
        assert_eq!(merged.fields.get("allDay"), Some(&Value::Bool(true)));
        assert_eq!(merged.start_date, Some(at(9, 0)));
    }

    #[test]
    fn test_merge_moves_range() {
        let patch = AppointmentPatch::default().with_range(at(11, 0), at(12, 30));
        let merged = meeting().merged(&patch);
        assert_eq!(merged.start_date, Some(at(11, 0)));
        assert_eq!(merged.end_date, Some(at(12, 30)));
        assert_eq!(merged.title(), Some("Meeting"));
    }

    #[test]
    fn test_widget_json_shape() {
        let json = serde_json::to_value(meeting()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "A1",
                "title": "Meeting",
                "notes": "Room 4",
                "startDate": "2024-01-10T09:00:00.000Z",
                "endDate": "2024-01-10T10:00:00.000Z"
            })
        );
    }

    #[test]
    fn test_new_appointment_from_widget_json() {
        let added: NewAppointment = serde_json::from_value(serde_json::json!({
            "title": "Dentist",
            "startDate": "2024-01-10T09:00",
            "endDate": null,
            "rRule": "RRULE:FREQ=WEEKLY;COUNT=3"
        }))
        .unwrap();

        assert_eq!(added.start_date, Some(at(9, 0)));
        assert_eq!(added.end_date, None);
        assert_eq!(
            added.fields.get("rRule"),
            Some(&Value::String("RRULE:FREQ=WEEKLY;COUNT=3".into()))
        );
    }

    #[test]
    fn test_invalid_widget_date_is_rejected() {
        let result: Result<AppointmentPatch, _> =
            serde_json::from_value(serde_json::json!({ "startDate": "soon" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_overlaps() {
        let appt = meeting();
        assert!(appt.overlaps(at(0, 0), at(23, 59)));
        assert!(appt.overlaps(at(9, 30), at(9, 45)));
        assert!(!appt.overlaps(at(10, 0), at(11, 0)));

        let undated = NewAppointment::new("Someday").into_appointment("B1");
        assert!(!undated.overlaps(at(0, 0), at(23, 59)));
    }

    #[test]
    fn test_sub_millisecond_instants_match_stored_text() {
        let start = Utc.timestamp_nanos(1_704_877_200_123_456_789);
        let end = start + chrono::Duration::hours(1);
        let expected = Utc.timestamp_millis_opt(1_704_877_200_123).unwrap();

        let added = NewAppointment::new("Precise").with_range(start, end);
        assert_eq!(added.start_date, Some(expected));

        let stored = added.into_appointment("A1");
        let reread = parse_date(&format_date(start));
        assert_eq!(stored.start_date, reread);
        assert_eq!(parse_date("2024-01-10T09:00:00.123456789Z"), Some(expected));

        let moved = meeting().merged(&AppointmentPatch::default().with_range(start, end));
        assert_eq!(moved.start_date, Some(expected));
    }
}
