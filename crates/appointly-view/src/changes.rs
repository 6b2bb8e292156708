//! Edit events coming from the scheduler widget and the report of applying them.

use std::fmt;

use appointly_store::{AppointmentPatch, NewAppointment, StoreError};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// One commit from the widget: any combination of an added record, a set of
/// per-id partial updates and a deleted id.
///
/// Matches the widget's JSON: `{"added": {..}, "changed": {"<id>": {..}}, "deleted": "<id>"}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChangeSet {
    #[serde(default)]
    pub added: Option<NewAppointment>,
    /// Processed in the order the ids appear in the event.
    #[serde(default, deserialize_with = "changes_in_order")]
    pub changed: Vec<(String, AppointmentPatch)>,
    #[serde(default, deserialize_with = "id_or_number")]
    pub deleted: Option<String>,
}

impl ChangeSet {
    pub fn add(appointment: NewAppointment) -> Self {
        Self {
            added: Some(appointment),
            ..Self::default()
        }
    }

    pub fn change(id: impl Into<String>, patch: AppointmentPatch) -> Self {
        Self::default().and_change(id, patch)
    }

    pub fn delete(id: impl Into<String>) -> Self {
        Self {
            deleted: Some(id.into()),
            ..Self::default()
        }
    }

    /// Queue a patch. A second patch for the same id replaces the first in place.
    pub fn and_change(mut self, id: impl Into<String>, patch: AppointmentPatch) -> Self {
        insert_change(&mut self.changed, id.into(), patch);
        self
    }

    pub fn changed_ids(&self) -> impl Iterator<Item = &str> {
        self.changed.iter().map(|(id, _)| id.as_str())
    }

    pub fn and_delete(mut self, id: impl Into<String>) -> Self {
        self.deleted = Some(id.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_none() && self.changed.is_empty() && self.deleted.is_none()
    }
}

fn insert_change(changed: &mut Vec<(String, AppointmentPatch)>, id: String, patch: AppointmentPatch) {
    match changed.iter_mut().find(|(existing, _)| *existing == id) {
        Some(entry) => entry.1 = patch,
        None => changed.push((id, patch)),
    }
}

/// Reads the `changed` object keeping its keys in document order. `null` is
/// read as no changes.
fn changes_in_order<'de, D>(deserializer: D) -> Result<Vec<(String, AppointmentPatch)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ChangesVisitor;

    impl<'de> Visitor<'de> for ChangesVisitor {
        type Value = Vec<(String, AppointmentPatch)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of appointment id to changed fields, or null")
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
            deserializer.deserialize_any(self)
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut changed = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((id, patch)) = map.next_entry::<String, AppointmentPatch>()? {
                insert_change(&mut changed, id, patch);
            }
            Ok(changed)
        }
    }

    deserializer.deserialize_option(ChangesVisitor)
}

/// The widget sends ids as strings, but numeric ids show up for records
/// created client-side.
fn id_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    }))
}

/// How a commit reacts to a failed sub-operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitMode {
    /// Attempt every sub-operation and report each outcome.
    #[default]
    BestEffort,
    /// Skip everything after the first failure.
    StopOnFirstFailure,
}

/// A single sub-operation of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Add,
    Change(String),
    Delete(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The changed id isn't in the in-memory list.
    NotInList,
    /// A previous sub-operation failed in `StopOnFirstFailure` mode.
    EarlierFailure,
}

#[derive(Debug)]
pub enum Outcome {
    /// The remote write succeeded and the mirror reflects it.
    Applied { id: String },
    Skipped(SkipReason),
    Failed(StoreError),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

#[derive(Debug)]
pub struct OperationReport {
    pub operation: Operation,
    pub outcome: Outcome,
}

/// Per-sub-operation result of `commit_changes`, in processing order.
#[derive(Debug, Default)]
pub struct CommitReport {
    pub operations: Vec<OperationReport>,
    /// Whether a new list was published to subscribers.
    pub published: bool,
}

impl CommitReport {
    pub(crate) fn record(&mut self, operation: Operation, outcome: Outcome) {
        self.operations.push(OperationReport { operation, outcome });
    }

    /// True when no sub-operation failed. Skips don't count as failures.
    pub fn is_success(&self) -> bool {
        !self.operations.iter().any(|op| op.outcome.is_failed())
    }

    pub fn applied_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| op.outcome.is_applied())
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Operation, &StoreError)> {
        self.operations.iter().filter_map(|op| match &op.outcome {
            Outcome::Failed(e) => Some((&op.operation, e)),
            _ => None,
        })
    }

    /// Id the store assigned to the added record, if the add succeeded.
    pub fn added_id(&self) -> Option<&str> {
        self.operations.iter().find_map(|op| match (&op.operation, &op.outcome) {
            (Operation::Add, Outcome::Applied { id }) => Some(id.as_str()),
            _ => None,
        })
    }

    pub fn outcome_of(&self, operation: &Operation) -> Option<&Outcome> {
        self.operations
            .iter()
            .find(|op| &op.operation == operation)
            .map(|op| &op.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_widget_event() {
        let changes: ChangeSet = serde_json::from_str(
            r#"{
                "added": { "title": "Meeting", "startDate": "2024-01-10T09:00:00.000Z" },
                "changed": { "B2": { "title": "Standup" }, "A1": { "allDay": true } },
                "deleted": "C3"
            }"#,
        )
        .unwrap();

        assert!(changes.added.is_some());
        assert_eq!(changes.changed_ids().collect::<Vec<_>>(), vec!["B2", "A1"]);
        assert_eq!(changes.deleted.as_deref(), Some("C3"));
    }

    #[test]
    fn test_repeated_change_id_keeps_first_position() {
        let changes: ChangeSet = serde_json::from_str(
            r#"{"changed": {"Z9": {"title": "a"}, "A1": {"title": "b"}, "Z9": {"title": "c"}}}"#,
        )
        .unwrap();
        assert_eq!(changes.changed_ids().collect::<Vec<_>>(), vec!["Z9", "A1"]);
        assert_eq!(changes.changed[0].1, AppointmentPatch::title("c"));

        let built = ChangeSet::change("Z9", AppointmentPatch::title("a"))
            .and_change("A1", AppointmentPatch::title("b"))
            .and_change("Z9", AppointmentPatch::title("c"));
        assert_eq!(built, changes);
    }

    #[test]
    fn test_parse_sparse_event() {
        let changes: ChangeSet =
            serde_json::from_value(serde_json::json!({ "changed": null, "deleted": 7 })).unwrap();

        assert!(changes.added.is_none());
        assert!(changes.changed.is_empty());
        assert_eq!(changes.deleted.as_deref(), Some("7"));

        let empty: ChangeSet = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_report_queries() {
        let mut report = CommitReport::default();
        report.record(Operation::Add, Outcome::Applied { id: "A1".into() });
        report.record(
            Operation::Change("X".into()),
            Outcome::Skipped(SkipReason::NotInList),
        );
        assert!(report.is_success());
        assert_eq!(report.added_id(), Some("A1"));
        assert_eq!(report.applied_count(), 1);

        report.record(
            Operation::Delete("A1".into()),
            Outcome::Failed(StoreError::NotFound("A1".into())),
        );
        assert!(!report.is_success());
        assert_eq!(report.failures().count(), 1);
        assert!(matches!(
            report.outcome_of(&Operation::Change("X".into())),
            Some(Outcome::Skipped(SkipReason::NotInList))
        ));
    }
}
