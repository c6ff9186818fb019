use crate::api::{self, Mode};
use crate::backup::{SheetSnapshot, SYNC_PRE};
use crate::commands::report::fetch_summary;
use crate::commands::Out;
use crate::config::Config;
use crate::error::{ErrorType, IntoResult};
use crate::model::{DateRange, SummaryTable};
use crate::reconcile::{Reconciliation, SheetReconciler};
use crate::Result;
use anyhow::Context;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

/// What a sync computed and, unless it was a dry run, wrote.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub summary: SummaryTable,
    pub reconciliation: Reconciliation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<PathBuf>,
    pub dry_run: bool,
}

/// Handles `taskstat sync`: fetches and aggregates the issues in `range`, then writes each day's
/// counts into the matching row of the configured tab. The tab is backed up before it is written.
/// With `dry_run` the updates are computed and returned, but nothing is backed up or written.
pub async fn sync(
    config: &Config,
    mode: Mode,
    range: DateRange,
    dry_run: bool,
) -> Result<Out<SyncReport>> {
    let summary = fetch_summary(config, mode, range).await?;

    let mut sheet = api::sheet(config, mode)
        .await
        .pub_result(ErrorType::Auth)?;
    let sheet_name = config.sheet_name();
    let rows = sheet
        .get(sheet_name)
        .await
        .with_context(|| format!("Unable to read the '{sheet_name}' tab"))
        .pub_result(ErrorType::Spreadsheet)?;
    debug!("Read {} rows from '{sheet_name}'", rows.len());

    let reconciler = SheetReconciler::new(sheet_name, config.date_header());
    let reconciliation = reconciler.reconcile(&rows, &summary)?;
    let updates = reconciliation.updates();

    let mut report = SyncReport {
        summary,
        reconciliation: reconciliation.clone(),
        backup: None,
        dry_run,
    };

    if updates.is_empty() {
        return Ok(Out::new(
            format!("Nothing to write to '{sheet_name}'"),
            report,
        ));
    }

    if dry_run {
        return Ok(Out::new(
            format!(
                "Dry run: {} rows of '{sheet_name}' would be updated",
                updates.len()
            ),
            report,
        ));
    }

    let snapshot = SheetSnapshot {
        spreadsheet_id: config.spreadsheet_id().to_string(),
        sheet_name: sheet_name.to_string(),
        rows,
    };
    let backup = config
        .backup()
        .save_json(SYNC_PRE, &snapshot)
        .await
        .context("Unable to back up the sheet before writing")
        .pub_result(ErrorType::Filesystem)?;
    info!("Saved a backup of '{sheet_name}' to {}", backup.display());

    sheet
        .write_ranges(updates)
        .await
        .with_context(|| format!("Unable to write {} rows to '{sheet_name}'", updates.len()))
        .pub_result(ErrorType::Spreadsheet)?;

    report.backup = Some(backup);
    Ok(Out::new(
        format!("Updated {} rows of '{sheet_name}'", updates.len()),
        report,
    ))
}
