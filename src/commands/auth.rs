//! Authentication command handlers for OAuth flow.
//!
//! This module implements the CLI commands for:
//! - `taskstat auth` - Initial OAuth consent flow
//! - `taskstat auth --verify` - Verify and refresh authentication

use crate::api::TokenProvider;
use crate::commands::Out;
use crate::config::Config;
use crate::error::{ErrorType, IntoResult};
use crate::Result;
use anyhow::Context;

/// Handles the `taskstat auth` command - runs the OAuth consent flow
///
/// This is the ONLY command that should open a browser for OAuth authentication.
///
/// 1. Loads client_secret.json
/// 2. Prints the consent URL and waits for Google to redirect back to a local port
/// 3. Saves tokens to token.json with the required scopes
///
/// # Errors
/// Returns an error if OAuth flow fails or if client_secret.json is missing
pub async fn auth(config: &Config) -> Result<Out<()>> {
    let _ = TokenProvider::initialize(config.client_secret_path(), config.token_path())
        .await
        .pub_result(ErrorType::Auth)?;
    Ok("Authentication complete".into())
}

/// Handles the `taskstat auth --verify` command - verifies authentication
///
/// This command NEVER opens a browser or triggers an interactive OAuth flow. It loads the cached
/// tokens and refreshes them, which proves the refresh token is still accepted.
///
/// # Errors
/// Returns an error if verification fails, credentials are missing, or tokens are invalid.
pub async fn auth_verify(config: &Config) -> Result<Out<()>> {
    let mut token_provider = TokenProvider::load(config.client_secret_path(), config.token_path())
        .await
        .context(
            "Unable to use the existing tokens found in the token JSON file. \n\n\
            You should run 'taskstat auth' (without the --verify flag).",
        )
        .pub_result(ErrorType::Auth)?;
    token_provider
        .refresh()
        .await
        .context("Unable to refresh the token")
        .pub_result(ErrorType::Auth)?;
    Ok("Your OAuth token is valid!".into())
}
