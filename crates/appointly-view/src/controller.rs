//! Appointment view controller.
//!
//! Holds the in-memory list the scheduler renders and the focused date, loads
//! the list on mount and applies widget edit events through the backend.

use std::sync::Arc;

use appointly_store::{Appointment, AppointmentBackend, StoreResult};
use chrono::NaiveDate;
use tokio::sync::watch;

use crate::changes::{ChangeSet, CommitMode, CommitReport, Operation, Outcome, SkipReason};
use crate::view_state::{Navigation, SchedulerView, ViewState};

/// Published snapshot of the appointment list.
pub type AppointmentList = Arc<Vec<Appointment>>;

pub struct AppointmentController<B> {
    backend: B,
    appointments: Vec<Appointment>,
    view: ViewState,
    mode: CommitMode,
    published: watch::Sender<AppointmentList>,
}

impl<B: AppointmentBackend> AppointmentController<B> {
    pub fn new(backend: B, view: ViewState) -> Self {
        let (published, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            backend,
            appointments: Vec::new(),
            view,
            mode: CommitMode::default(),
            published,
        }
    }

    pub fn with_commit_mode(mut self, mode: CommitMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn get(&self, id: &str) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == id)
    }

    /// Receive a new list every time the mirror is replaced.
    pub fn subscribe(&self) -> watch::Receiver<AppointmentList> {
        self.published.subscribe()
    }

    /// Load the full collection and replace the mirror with it.
    ///
    /// On failure the mirror is left unchanged and the error is returned.
    ///
    /// # Errors
    /// Returns the `StoreError` from the list call.
    pub async fn mount(&mut self) -> StoreResult<usize> {
        match self.backend.list_all().await {
            Ok(appointments) => {
                let count = appointments.len();
                tracing::info!("Loaded {} appointments", count);
                self.appointments = appointments;
                self.publish();
                Ok(count)
            }
            Err(e) => {
                tracing::error!("Failed to load appointments: {}", e);
                Err(e)
            }
        }
    }

    /// Apply one widget commit: added, then changed, then deleted.
    ///
    /// Each step works on the list produced by the previous one. Every remote
    /// write that succeeds is reflected in the mirror, and the mirror is
    /// published once at the end if anything was applied.
    pub async fn commit_changes(&mut self, changes: ChangeSet) -> CommitReport {
        let mut working = self.appointments.clone();
        let mut report = CommitReport::default();
        let mut halted = false;

        if let Some(added) = changes.added {
            let outcome = if halted {
                Outcome::Skipped(SkipReason::EarlierFailure)
            } else {
                match self.backend.create(&added).await {
                    Ok(id) => {
                        tracing::debug!("Added appointment {}", id);
                        working.push(added.into_appointment(id.clone()));
                        Outcome::Applied { id }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to add appointment: {}", e);
                        Outcome::Failed(e)
                    }
                }
            };
            halted |= self.halts_on(&outcome);
            report.record(Operation::Add, outcome);
        }

        for (id, patch) in changes.changed {
            let outcome = if halted {
                Outcome::Skipped(SkipReason::EarlierFailure)
            } else if let Some(index) = working.iter().position(|a| a.id == id) {
                match self.backend.update(&working[index], &patch).await {
                    Ok(merged) => {
                        working[index] = merged;
                        Outcome::Applied { id: id.clone() }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to update appointment {}: {}", id, e);
                        Outcome::Failed(e)
                    }
                }
            } else {
                tracing::debug!("Skipping change for unknown appointment {}", id);
                Outcome::Skipped(SkipReason::NotInList)
            };
            halted |= self.halts_on(&outcome);
            report.record(Operation::Change(id), outcome);
        }

        if let Some(id) = changes.deleted {
            let outcome = if halted {
                Outcome::Skipped(SkipReason::EarlierFailure)
            } else {
                match self.backend.delete(&id).await {
                    Ok(()) => {
                        working.retain(|a| a.id != id);
                        Outcome::Applied { id: id.clone() }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to delete appointment {}: {}", id, e);
                        Outcome::Failed(e)
                    }
                }
            };
            report.record(Operation::Delete(id), outcome);
        }

        if report.applied_count() > 0 {
            self.appointments = working;
            self.publish();
            report.published = true;
        }

        tracing::info!(
            "Commit finished: {} applied, {} failed",
            report.applied_count(),
            report.failures().count()
        );
        report
    }

    fn halts_on(&self, outcome: &Outcome) -> bool {
        self.mode == CommitMode::StopOnFirstFailure && outcome.is_failed()
    }

    fn publish(&self) {
        self.published
            .send_replace(Arc::new(self.appointments.clone()));
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn current_date(&self) -> NaiveDate {
        self.view.current_date
    }

    // Navigation only touches the view state, never the store.

    pub fn set_current_date(&mut self, date: NaiveDate) {
        self.view.current_date = date;
    }

    pub fn navigate(&mut self, direction: Navigation) {
        self.view.navigate(direction);
    }

    pub fn go_to_today(&mut self) {
        self.view.current_date = chrono::Utc::now().date_naive();
    }

    pub fn set_view(&mut self, view: SchedulerView) {
        self.view.view = view;
    }

    /// Appointments overlapping the current view's visible range, by start.
    pub fn appointments_in_view(&self) -> Vec<&Appointment> {
        let (from, to) = self.view.visible_range();
        let mut visible: Vec<&Appointment> = self
            .appointments
            .iter()
            .filter(|a| a.overlaps(from, to))
            .collect();
        visible.sort_by_key(|a| a.start_date);
        visible
    }
}
