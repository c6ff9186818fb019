//! Collaborators that talk to the outside world: the Google sheet, the Jira search API and the
//! OAuth token store. Each has an in-memory stand-in used when `Mode::Testing` is selected.

mod files;
mod jira;
mod oauth;
mod sheet;
mod test_issues;
mod test_sheet;

use crate::config::Config;
use crate::error::Res;
use crate::model::{DateRange, RowUpdate, TaskRecord};
use anyhow::Context;
use jira::JiraIssues;
use sheet::GoogleSheet;
use test_issues::TestIssues;

pub(crate) use oauth::TokenProvider;
pub(crate) use test_sheet::TestSheet;
#[cfg(test)]
pub(crate) use test_sheet::Tabs;

/// OAuth scopes required for reading and writing sheet values.
const OAUTH_SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

/// When this environment variable is set and non-empty, `Mode::from_env` returns `Mode::Testing`.
pub const TEST_MODE_ENV: &str = "TASKSTAT_IN_TEST_MODE";

/// Selects real or in-memory collaborators.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    /// Talk to Google Sheets and Jira.
    #[default]
    Google,
    /// Use the seeded in-memory sheet and issues.
    Testing,
}

impl Mode {
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Testing,
            _ => Mode::Google,
        }
    }
}

/// The spreadsheet store. Rows come back as formatted strings; trailing empty cells may be
/// missing from any row.
#[async_trait::async_trait]
pub(crate) trait Sheet {
    /// Reads every populated row of the tab named `sheet_name`.
    async fn get(&mut self, sheet_name: &str) -> Res<Vec<Vec<String>>>;

    /// Writes all `data` in one batch, interpreting values as if a user had typed them.
    async fn write_ranges(&mut self, data: &[RowUpdate]) -> Res<()>;
}

/// The issue tracker.
#[async_trait::async_trait]
pub(crate) trait IssueSource {
    /// Returns the issues whose story due date or generic due date falls in `range`.
    async fn fetch(&mut self, range: DateRange) -> Res<Vec<TaskRecord>>;
}

/// Creates the `Sheet` for the configured spreadsheet.
pub(crate) async fn sheet(config: &Config, mode: Mode) -> Res<Box<dyn Sheet + Send>> {
    match mode {
        Mode::Google => {
            let token_provider =
                TokenProvider::load(config.client_secret_path(), config.token_path()).await?;
            let sheet = GoogleSheet::new(config.spreadsheet_id(), token_provider)
                .await
                .context("Unable to create the Google Sheets client")?;
            Ok(Box::new(sheet))
        }
        Mode::Testing => Ok(Box::new(TestSheet::new(config.spreadsheet_id()))),
    }
}

/// Creates the `IssueSource` for the configured Jira instance.
pub(crate) fn issues(config: &Config, mode: Mode) -> Res<Box<dyn IssueSource + Send>> {
    match mode {
        Mode::Google => {
            let credentials = config.jira_credentials().cloned().context(
                "Jira credentials are missing. Pass --jira-email and --jira-api-key or set \
                JIRA_EMAIL and JIRA_API_KEY",
            )?;
            let jira = JiraIssues::new(
                config.jira_url(),
                credentials,
                config.assignee_jql(),
                config.story_due_date_field(),
            )?;
            Ok(Box::new(jira))
        }
        Mode::Testing => Ok(Box::new(TestIssues::new(config.story_due_date_field()))),
    }
}
