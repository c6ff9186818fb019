//! Maps a `SummaryTable` onto the existing rows of a sheet tab by date.

use crate::error::{ErrorType, IntoResult, Res};
use crate::model::{normalize_date, Mapping, Metric, RowUpdate, SummaryTable};
use crate::Result;
use anyhow::{bail, Context};
use serde::Serialize;
use tracing::{debug, info, warn};

/// The header of the date column unless the config says otherwise.
pub const DEFAULT_DATE_HEADER: &str = "Date";

/// The result of reconciling a sheet against a summary table.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "updates", rename_all = "snake_case")]
pub enum Reconciliation {
    /// One update per dated row, in sheet order.
    Updates(Vec<RowUpdate>),
    /// Data rows exist but none of them has a date.
    NoDatedRows,
    /// The sheet is empty or holds only a header row.
    NoRows,
}

impl Reconciliation {
    pub fn updates(&self) -> &[RowUpdate] {
        match self {
            Reconciliation::Updates(updates) => updates,
            Reconciliation::NoDatedRows | Reconciliation::NoRows => &[],
        }
    }
}

/// Computes the row updates for one tab of the spreadsheet.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SheetReconciler {
    sheet_name: String,
    date_header: String,
}

/// Column positions resolved from the header row.
struct Columns {
    date: usize,
    metrics: Vec<(Metric, usize)>,
}

impl SheetReconciler {
    pub fn new(sheet_name: impl Into<String>, date_header: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            date_header: date_header.into().trim().to_string(),
        }
    }

    /// Produces an update for every row that has a date, writing that day's counters (or zeros
    /// when the day has no activity) into the five metric columns. Fails with
    /// `ErrorType::Configuration` before computing anything if the header row lacks a required
    /// column.
    pub fn reconcile(&self, rows: &[Vec<String>], summary: &SummaryTable) -> Result<Reconciliation> {
        let mut rows = rows.iter();
        let header_row = match rows.next() {
            Some(header_row) => header_row,
            None => {
                info!("No data found in sheet '{}'", self.sheet_name);
                return Ok(Reconciliation::NoRows);
            }
        };

        let columns = self
            .columns(&Mapping::new(header_row))
            .with_context(|| format!("Unable to use the header row of sheet '{}'", self.sheet_name))
            .pub_result(ErrorType::Configuration)?;

        let mut saw_data_row = false;
        let mut updates = Vec::new();
        for (ix, row) in rows.enumerate() {
            saw_data_row = true;
            // +1 for the header row
            if let Some(update) = self.update_row(&columns, ix + 1, row, summary) {
                updates.push(update);
            }
        }

        if !updates.is_empty() {
            debug!(
                "Computed {} row updates for sheet '{}'",
                updates.len(),
                self.sheet_name
            );
            Ok(Reconciliation::Updates(updates))
        } else if saw_data_row {
            info!(
                "No rows with a '{}' value found in sheet '{}'",
                self.date_header, self.sheet_name
            );
            Ok(Reconciliation::NoDatedRows)
        } else {
            info!("Sheet '{}' has a header but no data rows", self.sheet_name);
            Ok(Reconciliation::NoRows)
        }
    }

    fn columns(&self, mapping: &Mapping) -> Res<Columns> {
        let mut missing = Vec::new();
        let date = mapping.require(self.date_header.as_str());
        if let Err(e) = &date {
            missing.push(e.to_string());
        }
        let mut metrics = Vec::with_capacity(Metric::ALL.len());
        for metric in Metric::ALL {
            match mapping.require(metric.header()) {
                Ok(ix) => metrics.push((metric, ix)),
                Err(e) => missing.push(e.to_string()),
            }
        }
        if !missing.is_empty() {
            bail!("{}", missing.join("; "));
        }
        Ok(Columns {
            date: date?,
            metrics,
        })
    }

    fn update_row(
        &self,
        columns: &Columns,
        row_ix: usize,
        row: &[String],
        summary: &SummaryTable,
    ) -> Option<RowUpdate> {
        let cell = row.get(columns.date).map(|s| s.trim()).unwrap_or_default();
        if cell.is_empty() {
            return None;
        }
        let key = match normalize_date(cell) {
            Some(key) => key,
            None => {
                warn!(
                    "Skipping row {} of sheet '{}': unable to parse '{cell}' as a date",
                    row_ix + 1,
                    self.sheet_name
                );
                return None;
            }
        };

        let day = summary.get(&key).copied().unwrap_or_default();
        let mut values = row.to_vec();
        for &(metric, ix) in &columns.metrics {
            if values.len() <= ix {
                values.resize(ix + 1, String::new());
            }
            values[ix] = day.get(metric).to_string();
        }
        Some(RowUpdate::new(&self.sheet_name, row_ix, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DailySummary, DateKey};
    use chrono::NaiveDate;

    const HEADERS: [&str; 7] = [
        "Date",
        "Total Issues",
        "Completed Tasks",
        "Total Bugs",
        "Total US",
        "Completed US",
        "Notes",
    ];

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    fn summary(date: (i32, u32, u32), day: DailySummary) -> SummaryTable {
        let key = DateKey::from(NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap());
        std::iter::once((key, day)).collect()
    }

    fn reconciler() -> SheetReconciler {
        SheetReconciler::new("June 2024", DEFAULT_DATE_HEADER)
    }

    #[test]
    fn test_cross_format_date_match() {
        let sheet = rows(&[&HEADERS, &["06/05/2024", "", "", "", "", "", "standup"]]);
        let table = summary(
            (2024, 6, 5),
            DailySummary {
                total_tasks: 3,
                done_tasks: 2,
                total_bugs: 1,
                total_us: 4,
                done_us: 1,
            },
        );
        let result = reconciler().reconcile(&sheet, &table).unwrap();
        let updates = result.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].range, "'June 2024'!A2:G2");
        assert_eq!(
            updates[0].values,
            vec!["06/05/2024", "3", "2", "1", "4", "1", "standup"]
        );
    }

    #[test]
    fn test_empty_summary_zero_fills_dated_rows() {
        let sheet = rows(&[
            &HEADERS,
            &["Jun 3, 2024", "9", "9", "9", "9", "9", "keep"],
            &["", "7", "7", "7", "7", "7", ""],
            &["6/4/2024", "5", "5", "5", "5", "5", ""],
        ]);
        let result = reconciler()
            .reconcile(&sheet, &SummaryTable::new())
            .unwrap();
        let updates = result.updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].range, "'June 2024'!A2:G2");
        assert_eq!(
            updates[0].values,
            vec!["Jun 3, 2024", "0", "0", "0", "0", "0", "keep"]
        );
        // The undated row is skipped, not zeroed.
        assert_eq!(updates[1].range, "'June 2024'!A4:G4");
        assert_eq!(updates[1].values, vec!["6/4/2024", "0", "0", "0", "0", "0", ""]);
    }

    #[test]
    fn test_columns_found_by_name_in_any_order() {
        let sheet = rows(&[
            &[
                "Completed US",
                "Notes",
                "Total US",
                "Date",
                "Total Bugs",
                "Completed Tasks",
                "Total Issues",
            ],
            &["", "", "", "2024-06-05"],
        ]);
        let table = summary(
            (2024, 6, 5),
            DailySummary {
                total_tasks: 5,
                done_tasks: 4,
                total_bugs: 3,
                total_us: 2,
                done_us: 1,
            },
        );
        let result = reconciler().reconcile(&sheet, &table).unwrap();
        // The short row is padded out to the last metric column.
        assert_eq!(
            result.updates()[0].values,
            vec!["1", "", "2", "2024-06-05", "3", "4", "5"]
        );
        assert_eq!(result.updates()[0].range, "'June 2024'!A2:G2");
    }

    #[test]
    fn test_missing_column_is_configuration_error() {
        let sheet = rows(&[
            &["Date", "Total Issues", "Completed Tasks", "Total Bugs", "Total US"],
            &["06/05/2024", "", "", "", ""],
        ]);
        let err = reconciler()
            .reconcile(&sheet, &SummaryTable::new())
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Configuration);
        assert!(err.to_string().contains("'Completed US' was not found"));
    }

    #[test]
    fn test_missing_date_column_is_configuration_error() {
        let sheet = rows(&[&HEADERS, &["06/05/2024"]]);
        let err = SheetReconciler::new("June 2024", "Due Date")
            .reconcile(&sheet, &SummaryTable::new())
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Configuration);
        assert!(err.to_string().contains("'Due Date' was not found"));
    }

    #[test]
    fn test_date_header_is_trimmed() {
        let reconciler = SheetReconciler::new("June 2024", " Date ");
        let sheet = rows(&[&HEADERS, &["06/05/2024"]]);
        let result = reconciler.reconcile(&sheet, &SummaryTable::new()).unwrap();
        assert_eq!(result.updates().len(), 1);
    }

    #[test]
    fn test_duplicate_required_column_is_configuration_error() {
        let sheet = rows(&[
            &[
                "Date",
                "Total Issues",
                "Total Bugs",
                "Completed Tasks",
                "Total Bugs",
                "Total US",
                "Completed US",
            ],
            &["06/05/2024", "", "", "", "", "", ""],
        ]);
        let err = reconciler()
            .reconcile(&sheet, &SummaryTable::new())
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Configuration);
        assert!(err
            .to_string()
            .contains("'Total Bugs' appears more than once"));
    }

    #[test]
    fn test_sheet_date_renderings_match() {
        let sheet = rows(&[
            &HEADERS,
            &["Thu, Jun 5, 2024"],
            &["06/05/2024 10:00"],
            &["5-Jun-2024"],
            &["June 5 2024"],
            &["6/5/2024 10:00:00 AM"],
        ]);
        let table = summary(
            (2024, 6, 5),
            DailySummary {
                total_tasks: 2,
                ..Default::default()
            },
        );
        let result = reconciler().reconcile(&sheet, &table).unwrap();
        let updates = result.updates();
        assert_eq!(updates.len(), 5);
        for update in updates {
            assert_eq!(update.values[1], "2", "range: {}", update.range);
        }
    }

    #[test]
    fn test_no_rows_and_no_dated_rows_are_distinct() {
        let empty: Vec<Vec<String>> = Vec::new();
        assert_eq!(
            reconciler().reconcile(&empty, &SummaryTable::new()).unwrap(),
            Reconciliation::NoRows
        );

        let header_only = rows(&[&HEADERS]);
        assert_eq!(
            reconciler()
                .reconcile(&header_only, &SummaryTable::new())
                .unwrap(),
            Reconciliation::NoRows
        );

        let undated = rows(&[&HEADERS, &["", "1"], &["   "]]);
        assert_eq!(
            reconciler()
                .reconcile(&undated, &SummaryTable::new())
                .unwrap(),
            Reconciliation::NoDatedRows
        );
    }

    #[test]
    fn test_unparseable_date_cell_is_skipped() {
        let sheet = rows(&[&HEADERS, &["Totals", "1", "1", "1", "1", "1", ""]]);
        let mut table = SummaryTable::new();
        table
            .bucket(DateKey::Invalid)
            .increment(Metric::TotalTasks);
        let result = reconciler().reconcile(&sheet, &table).unwrap();
        assert_eq!(result, Reconciliation::NoDatedRows);
    }

    #[test]
    fn test_reconciliation_json() {
        let sheet = rows(&[&HEADERS, &["06/05/2024"]]);
        let result = reconciler()
            .reconcile(&sheet, &SummaryTable::new())
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "updates");
        assert_eq!(json["updates"][0]["range"], "'June 2024'!A2:F2");

        let json = serde_json::to_value(Reconciliation::NoRows).unwrap();
        assert_eq!(json["outcome"], "no_rows");
    }
}
