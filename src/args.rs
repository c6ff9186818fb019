//! These structs provide the CLI interface for the taskstat CLI.

use crate::config::{InitSettings, JiraCredentials};
use crate::model::parse_date;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing::level_filters::LevelFilter;

/// taskstat: Daily task completion statistics from Jira, written into a Google sheet.
///
/// The purpose of this program is to count, for each day in a date range, how many of your Jira
/// issues were due and how many were finished on time, and to write those counts into the matching
/// rows of a tracking Google sheet.
///
/// You will need set up Google OAuth credentials and a Jira API token for this.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration files.
    ///
    /// This is the first command you should run. You need a few things ready beforehand.
    ///
    /// - Decide what directory you want to store data in and pass this as --taskstat-home. By
    ///   default, it will be $HOME/taskstat.
    ///
    /// - Get the URL of your tracking Google Sheet and the name of the tab with one row per day.
    ///
    /// - Set up Google OAuth desktop credentials and download them to a file. You will pass this
    ///   as --client-secret.
    Init(InitArgs),
    /// Authenticate with Google Sheets via OAuth.
    Auth(AuthArgs),
    /// Fetch issues for a date range and print the per-day summary without touching the sheet.
    Report(RangeArgs),
    /// Fetch issues for a date range and write the per-day summary into the sheet.
    Sync(SyncArgs),
    /// Run an HTTP server that performs a sync for each request.
    Serve(ServeArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where taskstat data and configuration is held. Defaults to ~/taskstat
    #[arg(long, env = "TASKSTAT_HOME", default_value_t = default_taskstat_home())]
    taskstat_home: DisplayPath,

    /// The email address of your Jira account.
    #[arg(long, env = "JIRA_EMAIL", global = true)]
    jira_email: Option<String>,

    /// A Jira API token for the account given by --jira-email.
    #[arg(long, env = "JIRA_API_KEY", global = true, hide_env_values = true)]
    jira_api_key: Option<String>,
}

impl Common {
    pub fn new(log_level: LevelFilter, taskstat_home: PathBuf) -> Self {
        Self {
            log_level,
            taskstat_home: taskstat_home.into(),
            jira_email: None,
            jira_api_key: None,
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn taskstat_home(&self) -> &DisplayPath {
        &self.taskstat_home
    }

    /// Both values are needed; with only one of them there are no credentials.
    pub fn jira_credentials(&self) -> Option<JiraCredentials> {
        match (&self.jira_email, &self.jira_api_key) {
            (Some(email), Some(api_key)) if !email.is_empty() && !api_key.is_empty() => {
                Some(JiraCredentials::new(email, api_key))
            }
            _ => None,
        }
    }
}

/// (Not shown): Args for the `taskstat init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The URL to your Google sheet. It looks like this:
    /// https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    #[arg(long)]
    sheet_url: String,

    /// The name of the tab that has one row per day, e.g. "June 2024".
    #[arg(long)]
    sheet_name: String,

    /// The base URL of your Jira instance, e.g. https://example.atlassian.net
    #[arg(long)]
    jira_url: String,

    /// The path to your downloaded OAuth client credentials. This file will be moved to the
    /// default secrets location in the main data directory.
    #[arg(long)]
    client_secret: PathBuf,
}

impl InitArgs {
    pub fn new(
        sheet_url: impl Into<String>,
        sheet_name: impl Into<String>,
        jira_url: impl Into<String>,
        client_secret: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sheet_url: sheet_url.into(),
            sheet_name: sheet_name.into(),
            jira_url: jira_url.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn client_secret(&self) -> &Path {
        &self.client_secret
    }

    pub fn settings(&self) -> InitSettings {
        InitSettings {
            sheet_url: self.sheet_url.clone(),
            sheet_name: self.sheet_name.clone(),
            jira_url: self.jira_url.clone(),
        }
    }
}

/// (Not shown): Args for the `taskstat auth` command.
#[derive(Debug, Parser, Clone)]
pub struct AuthArgs {
    /// Verify and refresh authentication.
    #[arg(long)]
    verify: bool,
}

impl AuthArgs {
    pub fn new(verify: bool) -> Self {
        Self { verify }
    }

    pub fn verify(&self) -> bool {
        self.verify
    }
}

/// (Not shown): The inclusive date range for `report` and `sync`.
#[derive(Debug, Parser, Clone)]
pub struct RangeArgs {
    /// The first day to count, e.g. 2024-06-01 or 06/01/2024.
    #[arg(long, value_parser = parse_cli_date)]
    start: NaiveDate,

    /// The last day to count, inclusive.
    #[arg(long, value_parser = parse_cli_date)]
    end: NaiveDate,
}

impl RangeArgs {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

/// (Not shown): Args for the `taskstat sync` command.
#[derive(Debug, Parser, Clone)]
pub struct SyncArgs {
    #[clap(flatten)]
    range: RangeArgs,

    /// Compute and print the sheet updates without taking a backup or writing to the sheet.
    #[arg(long)]
    dry_run: bool,
}

impl SyncArgs {
    pub fn new(range: RangeArgs, dry_run: bool) -> Self {
        Self { range, dry_run }
    }

    pub fn range(&self) -> &RangeArgs {
        &self.range
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }
}

/// (Not shown): Args for the `taskstat serve` command.
#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// The port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// The address to bind to.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
}

impl ServeArgs {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            port,
            host: host.into(),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

fn parse_cli_date(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("'{s}' is not a date, use a format like 2024-06-01"))
}

fn default_taskstat_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("taskstat"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --taskstat-home or TASKSTAT_HOME instead of relying on the \
                default home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("taskstat")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
