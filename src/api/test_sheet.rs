//! Implements the `Sheet` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without using Google Sheets.

use crate::api::Sheet;
use crate::error::Res;
use crate::model::RowUpdate;
use anyhow::{bail, Context};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// The tabs of one spreadsheet. The map key is the tab name and the value is its rows.
pub(crate) type Tabs = HashMap<String, Vec<Vec<String>>>;

/// Every `TestSheet` created in this process, keyed by spreadsheet id. A sync writes through one
/// `TestSheet` and a later request reads the result through another, so the data must outlive
/// each instance.
static SPREADSHEETS: LazyLock<Mutex<HashMap<String, Tabs>>> = LazyLock::new(Default::default);

/// The tab seeded by default.
const SEED_TAB: &str = "June 2024";

/// An implementation of the `Sheet` trait that does not use Google sheets. The first instance for
/// a given spreadsheet id is seeded with the data from this module.
pub(crate) struct TestSheet {
    spreadsheet_id: String,
}

impl TestSheet {
    pub(crate) fn new(spreadsheet_id: impl Into<String>) -> Self {
        let spreadsheet_id = spreadsheet_id.into();
        lock()
            .entry(spreadsheet_id.clone())
            .or_insert_with(default_data);
        Self { spreadsheet_id }
    }

    /// A copy of all tabs as they currently are.
    #[cfg(test)]
    pub(crate) fn tabs(&self) -> Tabs {
        lock()
            .get(&self.spreadsheet_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Replaces or creates the tab `sheet_name`.
    #[cfg(test)]
    pub(crate) fn set_tab(&self, sheet_name: &str, rows: Vec<Vec<String>>) {
        lock()
            .entry(self.spreadsheet_id.clone())
            .or_default()
            .insert(sheet_name.to_string(), rows);
    }

    #[cfg(test)]
    pub(crate) fn remove_tab(&self, sheet_name: &str) {
        if let Some(tabs) = lock().get_mut(&self.spreadsheet_id) {
            tabs.remove(sheet_name);
        }
    }
}

#[async_trait::async_trait]
impl Sheet for TestSheet {
    async fn get(&mut self, sheet_name: &str) -> Res<Vec<Vec<String>>> {
        trace!("get for {sheet_name}");
        lock()
            .get(&self.spreadsheet_id)
            .and_then(|tabs| tabs.get(sheet_name))
            .cloned()
            .with_context(|| format!("Unable to parse range: {sheet_name}"))
    }

    async fn write_ranges(&mut self, data: &[RowUpdate]) -> Res<()> {
        trace!("write_ranges for {} ranges", data.len());
        let targets = data
            .iter()
            .map(|update| parse_range(&update.range))
            .collect::<Res<Vec<_>>>()?;

        let mut spreadsheets = lock();
        let tabs = spreadsheets.entry(self.spreadsheet_id.clone()).or_default();

        // Validate every tab before touching any of them so a bad batch writes nothing.
        for target in &targets {
            if !tabs.contains_key(&target.sheet_name) {
                bail!("Unable to parse range: {}", target.sheet_name);
            }
        }

        for (target, update) in targets.iter().zip(data) {
            if let Some(rows) = tabs.get_mut(&target.sheet_name) {
                write_row(rows, target, &update.values);
            }
        }
        Ok(())
    }
}

fn lock() -> MutexGuard<'static, HashMap<String, Tabs>> {
    SPREADSHEETS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The start cell of an A1 range such as `'June 2024'!A3:G3`.
#[derive(Debug, Clone, Eq, PartialEq)]
struct Target {
    sheet_name: String,
    row_ix: usize,
    column_ix: usize,
}

fn parse_range(range: &str) -> Res<Target> {
    let (sheet, cells) = range
        .rsplit_once('!')
        .with_context(|| format!("The range '{range}' has no sheet name"))?;
    let sheet_name = match sheet.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        Some(quoted) => quoted.replace("''", "'"),
        None => sheet.to_string(),
    };

    let start = cells.split(':').next().unwrap_or(cells);
    let letters: String = start.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let digits = &start[letters.len()..];
    if letters.is_empty() {
        bail!("The range '{range}' has no start column");
    }
    let row: usize = digits
        .parse()
        .with_context(|| format!("The range '{range}' has no start row"))?;
    if row == 0 {
        bail!("The range '{range}' starts at row 0");
    }
    let column = letters
        .to_ascii_uppercase()
        .bytes()
        .fold(0usize, |acc, b| acc * 26 + usize::from(b - b'A') + 1);

    Ok(Target {
        sheet_name,
        row_ix: row - 1,
        column_ix: column - 1,
    })
}

fn write_row(rows: &mut Vec<Vec<String>>, target: &Target, values: &[String]) {
    if rows.len() <= target.row_ix {
        rows.resize(target.row_ix + 1, Vec::new());
    }
    let row = &mut rows[target.row_ix];
    let end = target.column_ix + values.len();
    if row.len() < end {
        row.resize(end, String::new());
    }
    row[target.column_ix..end].clone_from_slice(values);
}

/// Provides the seed data from this module.
fn default_data() -> Tabs {
    let mut map = HashMap::new();
    // The seed is a compile-time constant covered by tests, so a parse failure leaves the tab out.
    if let Ok(rows) = load_csv(SEED_DATA) {
        map.insert(SEED_TAB.to_string(), rows);
    }
    map
}

/// Loads data from a CSV-formatted string. Rows may have different lengths, like the rows the
/// Sheets API returns with trailing empty cells trimmed.
fn load_csv(csv_data: &str) -> Res<Vec<Vec<String>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(csv_data.as_bytes()));

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result.context("Invalid seed CSV")?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

/// Seed tracking data. `Completed US` comes before `Total US` to show that columns are found by
/// name.
const SEED_DATA: &str = r##"Date,Total Issues,Completed Tasks,Total Bugs,Completed US,Total US,Notes
06/03/2024
06/04/2024,9,9,9,9,9
06/05/2024,,,,,,Release day
06/06/2024
06/07/2024
Total,=SUM(B2:B6)
"##;
