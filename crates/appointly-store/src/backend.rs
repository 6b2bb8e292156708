//! Appointment storage backend trait.
//!
//! Abstracts over the Firestore REST client and the in-memory store so the
//! view controller can be driven by either.

use std::future::Future;

use crate::error::StoreResult;
use crate::types::{Appointment, AppointmentPatch, NewAppointment};

/// Remote CRUD operations over the appointment collection.
///
/// Each call is a single round trip with no retry; failures come back to the
/// caller as `StoreError`.
pub trait AppointmentBackend: Send + Sync {
    /// Fetch the whole collection in store order.
    fn list_all(&self) -> impl Future<Output = StoreResult<Vec<Appointment>>> + Send;

    /// Write a new document and return the id the store assigned.
    fn create(&self, appointment: &NewAppointment) -> impl Future<Output = StoreResult<String>> + Send;

    /// Overwrite the document at `appointment.id` with the full record.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if no such document exists.
    fn replace(&self, appointment: &Appointment) -> impl Future<Output = StoreResult<()>> + Send;

    /// Remove the document. Removing a missing document is not an error.
    fn delete(&self, id: &str) -> impl Future<Output = StoreResult<()>> + Send;

    /// Merge `patch` into `current` and overwrite the stored document.
    ///
    /// Returns the merged record that was written.
    fn update(
        &self,
        current: &Appointment,
        patch: &AppointmentPatch,
    ) -> impl Future<Output = StoreResult<Appointment>> + Send {
        let merged = current.merged(patch);
        async move {
            self.replace(&merged).await?;
            Ok(merged)
        }
    }
}
