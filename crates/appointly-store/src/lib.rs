//! Appointment storage for Appointly.
//!
//! Provides the appointment data model, the Firestore document codec and
//! REST client, and an in-memory backend.

pub mod backend;
pub mod client;
pub mod document;
pub mod error;
pub mod memory;
pub mod types;

pub use backend::AppointmentBackend;
pub use client::FirestoreClient;
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryStore, StoreOp};
pub use types::{format_date, parse_date, Appointment, AppointmentPatch, NewAppointment};
