use crate::commands::Out;
use crate::config::{Config, InitSettings};
use crate::error::{ErrorType, IntoResult};
use crate::Result;
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its subdirectories and:
/// - Creates an initial `config.json` file from `settings` along with default settings
/// - Moves `secret_file` into its default location in the data dir.
///
/// # Arguments
/// - `home` - The directory that will be the root of data directory, e.g. `$HOME/taskstat`
/// - `secret_file` - The downloaded OAuth 2.0 client credentials JSON needed to start the Google
///   OAuth workflow.
/// - `settings` - The sheet URL, tab name and Jira URL.
///
/// # Errors
/// - Returns an error if any file operations fail or a URL is invalid.
pub async fn init(home: &Path, secret_file: &Path, settings: &InitSettings) -> Result<Out<()>> {
    let config = Config::create(home, secret_file, settings)
        .await
        .context("Unable to create the data directory and configs")
        .pub_result(ErrorType::Configuration)?;
    Ok(format!(
        "Successfully created {}. Next, run 'taskstat auth'",
        config.config_path().display()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init() {
        let dir = TempDir::new().unwrap();
        let secret = dir.path().join("secret.json");
        std::fs::write(&secret, "{}").unwrap();
        let home = dir.path().join("home");
        let settings = InitSettings {
            sheet_url: "https://docs.google.com/spreadsheets/d/abc123/edit".to_string(),
            sheet_name: "June 2024".to_string(),
            jira_url: "https://example.atlassian.net".to_string(),
        };

        let out = init(&home, &secret, &settings).await.unwrap();
        assert!(out.message().contains("config.json"));
        assert!(home.join("config.json").is_file());

        // A second init fails because the secret file has already been moved.
        let err = init(&home, &secret, &settings).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Configuration);
    }
}
