//! In-process appointment store.
//!
//! Keeps documents in the same encoded form the remote store uses, so dates
//! go through the text round trip exactly as they would against Firestore.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use crate::backend::AppointmentBackend;
use crate::document::{decode_document, encode_fields, Document, Value};
use crate::error::{StoreError, StoreResult};
use crate::types::{Appointment, NewAppointment};

/// Operations counted and fault-injected by [`InMemoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    List,
    Create,
    Replace,
    Delete,
}

#[derive(Default)]
struct State {
    /// Documents in arrival order.
    documents: Vec<(String, BTreeMap<String, Value>)>,
    next_seq: u64,
    calls: HashMap<StoreOp, usize>,
    pending_failures: HashMap<StoreOp, usize>,
}

pub struct InMemoryStore {
    state: Mutex<State>,
    id_prefix: Option<String>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Store that assigns random ids.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            id_prefix: None,
        }
    }

    /// Store that assigns `{prefix}1`, `{prefix}2`, ...
    pub fn with_id_prefix(prefix: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            id_prefix: Some(prefix.into()),
        }
    }

    /// Seed a document directly, bypassing call counting.
    pub fn insert(&self, appointment: &Appointment) {
        let fields = encode_fields(
            appointment.start_date,
            appointment.end_date,
            &appointment.fields,
        );
        let mut state = self.state.lock();
        match state.documents.iter_mut().find(|(id, _)| *id == appointment.id) {
            Some((_, existing)) => *existing = fields,
            None => state.documents.push((appointment.id.clone(), fields)),
        }
    }

    /// Make the next `count` calls of `op` fail with a 503.
    pub fn fail_next(&self, op: StoreOp, count: usize) {
        *self.state.lock().pending_failures.entry(op).or_default() += count;
    }

    /// Number of calls made for `op`, including failed ones.
    pub fn call_count(&self, op: StoreOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Snapshot of the stored collection, decoded.
    pub fn snapshot(&self) -> Vec<Appointment> {
        let state = self.state.lock();
        state
            .documents
            .iter()
            .filter_map(|(id, fields)| decode_document(to_document(id, fields)).ok())
            .collect()
    }

    /// Count the call and consume a pending failure, if any.
    fn begin(&self, op: StoreOp) -> StoreResult<parking_lot::MutexGuard<'_, State>> {
        let mut state = self.state.lock();
        *state.calls.entry(op).or_default() += 1;

        if let Some(remaining) = state.pending_failures.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                tracing::debug!("Injected failure for {:?}", op);
                return Err(StoreError::Api {
                    status: 503,
                    message: format!("injected {:?} failure", op),
                });
            }
        }

        Ok(state)
    }

    fn next_id(&self, state: &mut State) -> String {
        state.next_seq += 1;
        match &self.id_prefix {
            Some(prefix) => format!("{}{}", prefix, state.next_seq),
            None => uuid::Uuid::new_v4().simple().to_string(),
        }
    }
}

fn to_document(id: &str, fields: &BTreeMap<String, Value>) -> Document {
    Document {
        name: format!("memory/appointments/{}", id),
        fields: fields.clone(),
        ..Document::default()
    }
}

impl AppointmentBackend for InMemoryStore {
    async fn list_all(&self) -> StoreResult<Vec<Appointment>> {
        let state = self.begin(StoreOp::List)?;
        state
            .documents
            .iter()
            .map(|(id, fields)| decode_document(to_document(id, fields)))
            .collect()
    }

    async fn create(&self, appointment: &NewAppointment) -> StoreResult<String> {
        let mut state = self.begin(StoreOp::Create)?;
        let id = self.next_id(&mut state);
        let fields = encode_fields(
            appointment.start_date,
            appointment.end_date,
            &appointment.fields,
        );
        state.documents.push((id.clone(), fields));
        Ok(id)
    }

    async fn replace(&self, appointment: &Appointment) -> StoreResult<()> {
        let mut state = self.begin(StoreOp::Replace)?;
        let slot = state
            .documents
            .iter_mut()
            .find(|(id, _)| *id == appointment.id)
            .ok_or_else(|| StoreError::NotFound(appointment.id.clone()))?;

        slot.1 = encode_fields(
            appointment.start_date,
            appointment.end_date,
            &appointment.fields,
        );
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut state = self.begin(StoreOp::Delete)?;
        state.documents.retain(|(doc_id, _)| doc_id != id);
        Ok(())
    }
}
