//! Configuration file handling.
//!
//! The configuration file is stored at `$TASKSTAT_HOME/config.json` and holds the sheet and Jira
//! locations, the names the sync relies on, backup settings and authentication file paths. Jira
//! credentials are passed on the command line or in the environment and are never written to disk.

use crate::backup::Backup;
use crate::error::Res;
use crate::model::DEFAULT_STORY_DUE_DATE_FIELD;
use crate::reconcile::DEFAULT_DATE_HEADER;
use crate::utils;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "taskstat";
const CONFIG_VERSION: u8 = 1;
const BACKUP_COPIES: u32 = 5;
const SECRETS: &str = ".secrets";
const BACKUPS: &str = ".backups";
const CLIENT_SECRET_JSON: &str = "client_secret.json";
const TOKEN_JSON: &str = "token.json";
const CONFIG_JSON: &str = "config.json";
const DEFAULT_ASSIGNEE_JQL: &str = "assignee=currentuser()";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$TASKSTAT_HOME` and from there it loads `$TASKSTAT_HOME/config.json`. It provides
/// paths to other items that are either configurable or are expected in a certain location within
/// the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    backups: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    spreadsheet_id: String,
    jira_credentials: Option<JiraCredentials>,
}

/// The settings `Config::create` writes into a new `config.json`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InitSettings {
    /// e.g. `https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX`
    pub sheet_url: String,
    /// The tab that holds the per-day rows, e.g. `June 2024`.
    pub sheet_name: String,
    /// e.g. `https://example.atlassian.net`
    pub jira_url: String,
}

impl Config {
    /// Creates the data directory, its subdirectories and:
    /// - Creates an initial `config.json` file using `settings` along with default settings
    /// - Moves `secret_file` into its default location in the data dir.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of data directory, e.g. `$HOME/taskstat`
    /// - `secret_file` - The downloaded OAuth 2.0 client credentials JSON needed to start the Google
    ///   OAuth workflow. This will be moved from the `secret_file` path to its default location and
    ///   name in the data directory.
    /// - `settings` - Where the sheet and Jira live.
    ///
    /// # Errors
    /// - Returns an error if any file operations fail or the sheet URL is not a Google Sheets URL.
    pub async fn create(
        dir: impl Into<PathBuf>,
        secret_file: &Path,
        settings: &InitSettings,
    ) -> Res<Self> {
        // Fail before touching the filesystem.
        let spreadsheet_id = extract_spreadsheet_id(&settings.sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();
        url::Url::parse(&settings.jira_url)
            .with_context(|| format!("Invalid Jira URL '{}'", settings.jira_url))?;

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the taskstat home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let backups_dir = root.join(BACKUPS);
        utils::make_dir(&backups_dir).await?;
        let secrets_dir = root.join(SECRETS);
        utils::make_dir(&secrets_dir).await?;

        let secret_destination = secrets_dir.join(CLIENT_SECRET_JSON);
        utils::rename(secret_file, secret_destination).await?;
        let config_path = root.join(CONFIG_JSON);

        let config_file = ConfigFile {
            sheet_url: settings.sheet_url.clone(),
            sheet_name: settings.sheet_name.clone(),
            jira_url: settings.jira_url.clone(),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            backups: backups_dir,
            secrets: secrets_dir,
            config_path,
            config_file,
            spreadsheet_id,
            jira_credentials: None,
        })
    }

    /// This will
    /// - validate that `home` exists and that the config file exists
    /// - load the config file
    /// - validate that the backups and secrets directories exist
    /// - return the loaded configuration object
    pub async fn load(home: impl Into<PathBuf>) -> Res<Self> {
        let maybe_relative = home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The taskstat home directory is missing. Run 'taskstat init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let spreadsheet_id = extract_spreadsheet_id(&config_file.sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();

        let config = Self {
            root: root.clone(),
            backups: root.join(BACKUPS),
            secrets: root.join(SECRETS),
            config_path,
            config_file,
            spreadsheet_id,
            jira_credentials: None,
        };
        if !config.backups.is_dir() {
            bail!(
                "The backups directory is missing '{}'",
                config.backups.display()
            )
        }
        if !config.secrets.is_dir() {
            bail!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            )
        }
        Ok(config)
    }

    /// Attaches the Jira credentials for this run.
    pub fn with_jira_credentials(mut self, credentials: Option<JiraCredentials>) -> Self {
        self.jira_credentials = credentials;
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn backups(&self) -> &Path {
        &self.backups
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn sheet_name(&self) -> &str {
        &self.config_file.sheet_name
    }

    pub fn date_header(&self) -> &str {
        &self.config_file.date_header
    }

    pub fn jira_url(&self) -> &str {
        &self.config_file.jira_url
    }

    pub fn story_due_date_field(&self) -> &str {
        &self.config_file.story_due_date_field
    }

    pub fn assignee_jql(&self) -> &str {
        &self.config_file.assignee_jql
    }

    pub fn jira_credentials(&self) -> Option<&JiraCredentials> {
        self.jira_credentials.as_ref()
    }

    pub fn backup_copies(&self) -> u32 {
        self.config_file.backup_copies
    }

    /// Creates a new `Backup` instance for managing backup files.
    pub fn backup(&self) -> Backup {
        Backup::new(self)
    }

    /// Returns the stored `client_secret_path` if it is absolute, otherwise resolves the relative path.
    pub fn client_secret_path(&self) -> PathBuf {
        self.resolve_secrets_file_path(self.config_file.client_secret_path())
    }

    /// Returns the stored `token_path` if it is absolute, otherwise resolves the relative path.
    pub fn token_path(&self) -> PathBuf {
        self.resolve_secrets_file_path(self.config_file.token_path())
    }

    /// Checks if `p` is relative, and if so, resolves it. Returns it unchanged if it is absolute.
    fn resolve_secrets_file_path(&self, p: PathBuf) -> PathBuf {
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }
}

/// Jira basic-auth credentials: the account email and an API token.
#[derive(Clone, Eq, PartialEq)]
pub struct JiraCredentials {
    email: String,
    api_key: String,
}

impl JiraCredentials {
    pub fn new(email: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            api_key: api_key.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl Debug for JiraCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraCredentials")
            .field("email", &self.email)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "taskstat",
///   "config_version": 1,
///   "sheet_url": "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
///   "sheet_name": "June 2024",
///   "date_header": "Date",
///   "jira_url": "https://example.atlassian.net",
///   "story_due_date_field": "customfield_10033",
///   "assignee_jql": "assignee=currentuser()",
///   "backup_copies": 5,
///   "client_secret_path": ".secrets/client_secret.json",
///   "token_path": ".secrets/token.json"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "taskstat"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// URL to the Google Sheet
    sheet_url: String,

    /// The tab holding one row per day
    sheet_name: String,

    /// The header of the column holding each row's date
    #[serde(default = "default_date_header")]
    date_header: String,

    /// Base URL of the Jira instance
    jira_url: String,

    /// The Jira field that holds the story due date
    #[serde(default = "default_story_due_date_field")]
    story_due_date_field: String,

    /// JQL that selects whose issues are counted
    #[serde(default = "default_assignee_jql")]
    assignee_jql: String,

    /// Number of backup copies to keep
    #[serde(default = "default_backup_copies")]
    backup_copies: u32,

    /// Path to the OAuth 2.0 client credentials file (optional, relative to config.json or absolute)
    /// Defaults to $TASKSTAT_HOME/.secrets/client_secret.json if not specified
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret_path: Option<PathBuf>,

    /// Path to the OAuth token file (optional, relative to config.json or absolute)
    /// Defaults to $TASKSTAT_HOME/.secrets/token.json if not specified
    #[serde(skip_serializing_if = "Option::is_none")]
    token_path: Option<PathBuf>,
}

fn default_date_header() -> String {
    DEFAULT_DATE_HEADER.to_string()
}

fn default_story_due_date_field() -> String {
    DEFAULT_STORY_DUE_DATE_FIELD.to_string()
}

fn default_assignee_jql() -> String {
    DEFAULT_ASSIGNEE_JQL.to_string()
}

fn default_backup_copies() -> u32 {
    BACKUP_COPIES
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            sheet_url: String::new(),
            sheet_name: String::new(),
            date_header: default_date_header(),
            jira_url: String::new(),
            story_due_date_field: default_story_due_date_field(),
            assignee_jql: default_assignee_jql(),
            backup_copies: BACKUP_COPIES,
            client_secret_path: None,
            token_path: None,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if it belongs to another app.
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            !config.sheet_name.trim().is_empty(),
            "The sheet_name in {} is empty",
            path.display()
        );
        anyhow::ensure!(
            !config.date_header.trim().is_empty(),
            "The date_header in {} is empty",
            path.display()
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    /// If None, defaults to $TASKSTAT_HOME/.secrets/client_secret.json
    fn client_secret_path(&self) -> PathBuf {
        self.client_secret_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(CLIENT_SECRET_JSON))
    }

    /// If None, defaults to $TASKSTAT_HOME/.secrets/token.json
    fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(TOKEN_JSON))
    }
}

/// Extracts the spreadsheet ID from a Google Sheets URL
///
/// # Arguments
/// * `url` - The Google Sheets URL (e.g., "https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...")
///
/// # Returns
/// The spreadsheet ID or an error if the URL format is invalid.
fn extract_spreadsheet_id(url: &str) -> Res<&str> {
    // URL format: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...
    // or: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID?foo=bar
    let parts: Vec<&str> = url.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "d" && i + 1 < parts.len() {
            let id_part = parts[i + 1];
            let id = id_part
                .split(['?', '#'])
                .next()
                .unwrap_or(id_part);
            if id.is_empty() {
                break;
            }
            return Ok(id);
        }
    }
    bail!(
        "Invalid Google Sheets URL format '{url}'. Expected: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID"
    )
}
