mod app;

use std::path::PathBuf;

use anyhow::Result;

use crate::app::App;

#[tokio::main]
async fn main() -> Result<()> {
    appointly_core::init()?;

    let mut app = App::new()?;
    tracing::info!("Appointly started");
    tracing::debug!("Config directory: {}", app.config().config_dir.display());

    app.mount().await;

    if let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) {
        let reports = app.apply_edits(&path).await?;
        let applied: usize = reports.iter().map(|r| r.applied_count()).sum();
        tracing::info!("Applied {} edits from {}", applied, path.display());
    }

    app.print_agenda();

    app.shutdown()?;

    Ok(())
}
