use std::path::Path;

use anyhow::{Context, Result};
use appointly_core::{AppError, Config};
use appointly_store::{format_date, FirestoreClient};
use appointly_view::{AppointmentController, ChangeSet, CommitReport, ViewState};
use serde::Deserialize;

/// An edits file holds either one widget commit or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum EditsFile {
    Many(Vec<ChangeSet>),
    One(ChangeSet),
}

impl EditsFile {
    fn into_vec(self) -> Vec<ChangeSet> {
        match self {
            EditsFile::Many(all) => all,
            EditsFile::One(single) => vec![single],
        }
    }
}

/// Application state and lifecycle.
pub struct App {
    config: Config,
    controller: AppointmentController<FirestoreClient>,
}

impl App {
    /// Load config and wire the Firestore client into a controller.
    pub fn new() -> Result<Self> {
        let (config, _) = Config::load_validated()?;

        let client = FirestoreClient::from_config(&config.firebase)
            .context("Failed to create Firestore client")?;
        let view = ViewState::from_config(&config.scheduler)?;

        tracing::info!(
            "Using project {} collection {}",
            config.firebase.project_id,
            client.collection()
        );

        Ok(Self {
            config,
            controller: AppointmentController::new(client, view),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load the appointment list. A failure is logged and leaves it empty.
    pub async fn mount(&mut self) {
        if let Err(e) = self.controller.mount().await {
            let err = AppError::from(e);
            tracing::error!("Could not load appointments: {}", err.user_message());
        }
    }

    /// Apply the widget commits stored in `path`, in file order.
    pub async fn apply_edits(&mut self, path: &Path) -> Result<Vec<CommitReport>> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read edits file {}", path.display()))?;
        let edits: EditsFile = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse edits file {}", path.display()))?;

        let mut reports = Vec::new();
        for changes in edits.into_vec() {
            let report = self.controller.commit_changes(changes).await;
            for (operation, e) in report.failures() {
                tracing::error!("{:?} failed: {}", operation, e.user_message());
            }
            reports.push(report);
        }
        Ok(reports)
    }

    /// Print the appointments visible in the current view.
    pub fn print_agenda(&self) {
        let view = self.controller.view();
        let (from, to) = view.visible_range();
        println!(
            "{:?} view, {} to {} ({})",
            view.view,
            from.date_naive(),
            to.date_naive(),
            view.locale
        );

        let visible = self.controller.appointments_in_view();
        if visible.is_empty() {
            println!("  (no appointments)");
        }
        for appointment in visible {
            let start = appointment.start_date.map(format_date).unwrap_or_default();
            let end = appointment.end_date.map(format_date).unwrap_or_default();
            println!(
                "  {} - {}  {}  [{}]",
                start,
                end,
                appointment.title().unwrap_or("(untitled)"),
                appointment.id
            );
        }
    }

    pub fn shutdown(&mut self) -> Result<()> {
        tracing::info!(
            "Shutting down with {} appointments loaded",
            self.controller.appointments().len()
        );
        Ok(())
    }
}
