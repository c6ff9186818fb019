//! OAuth 2.0 authentication for the Google Sheets API.
//!
//! This module handles:
//! - Running the OAuth consent flow with a local callback server
//! - Persisting access and refresh tokens in token.json
//! - Refreshing the access token when it is about to expire

use crate::api::files::{File, SecretFile, TokenFile};
use crate::api::OAUTH_SCOPES;
use crate::error::Res;
use anyhow::{bail, Context};
use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// How long we wait for the user to finish the consent screen.
const CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

type GoogleClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Holds the OAuth client credentials and the token file, and hands out a valid access token.
#[derive(Debug, Clone)]
pub(crate) struct TokenProvider {
    secret: SecretFile,
    token: File<TokenFile>,
}

impl TokenProvider {
    /// Runs the interactive consent flow and saves the resulting tokens to `token_path`.
    pub(crate) async fn initialize(
        secret_path: impl AsRef<Path>,
        token_path: impl AsRef<Path>,
    ) -> Res<Self> {
        let secret = SecretFile::load(secret_path.as_ref()).await?;
        let token = consent_flow(&secret).await?;
        let token = File::new(token_path.as_ref(), token);
        token.save().await?;
        info!("Tokens saved to {}", token.path().display());
        Ok(Self { secret, token })
    }

    /// Loads existing credentials and tokens. Never opens a browser.
    pub(crate) async fn load(
        secret_path: impl AsRef<Path>,
        token_path: impl AsRef<Path>,
    ) -> Res<Self> {
        let secret = SecretFile::load(secret_path.as_ref()).await?;
        let token = TokenFile::load(token_path.as_ref()).await.with_context(|| {
            format!(
                "Unable to load the OAuth token from {}. You may need to run 'taskstat auth'",
                token_path.as_ref().display()
            )
        })?;
        Ok(Self { secret, token })
    }

    /// The current access token, which may be expired.
    pub(crate) fn token(&self) -> &str {
        self.token.data().access_token()
    }

    /// Returns an access token, refreshing it first if it expires within five minutes.
    pub(crate) async fn token_with_refresh(&mut self) -> Res<&str> {
        if self.token.data().is_expired() {
            debug!("Access token is expired or about to expire, refreshing");
            self.refresh().await?;
        }
        Ok(self.token())
    }

    /// Exchanges the refresh token for a new access token and saves it.
    pub(crate) async fn refresh(&mut self) -> Res<()> {
        let client = google_client(&self.secret, None)?;
        let http = http_client()?;
        let refresh_token = RefreshToken::new(self.token.data().refresh_token().to_string());
        let response = client
            .exchange_refresh_token(&refresh_token)
            .request_async(&http)
            .await
            .context("Failed to refresh the OAuth access token")?;

        let expires_at = expires_at(response.expires_in());
        self.token.data_mut().update(
            response.access_token().secret().clone(),
            expires_at,
            response.refresh_token().map(|t| t.secret().clone()),
        );
        self.token.save().await?;
        debug!("Token valid until: {}", self.token.data().expires_at());
        Ok(())
    }
}

/// Query parameters Google appends to the redirect.
#[derive(Debug, Default, Deserialize)]
struct Callback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn consent_flow(secret: &SecretFile) -> Res<TokenFile> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .context("Unable to bind a local port for the OAuth callback")?;
    let port = listener
        .local_addr()
        .context("Unable to read the OAuth callback address")?
        .port();
    let redirect = format!("http://localhost:{port}");

    let client = google_client(secret, Some(&redirect))?;
    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
    let mut request = client
        .authorize_url(CsrfToken::new_random)
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .set_pkce_challenge(pkce_challenge);
    for scope in OAUTH_SCOPES {
        request = request.add_scope(Scope::new(scope.to_string()));
    }
    let (auth_url, csrf) = request.url();

    let (callback_tx, mut callback_rx) = mpsc::channel::<Callback>(1);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let app = Router::new()
        .route("/", get(receive_callback))
        .with_state(callback_tx);
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    info!("Open this URL in your browser to authorize access to Google Sheets:\n\n{auth_url}\n");
    info!("Waiting for the authorization callback on {redirect}");

    let callback = tokio::time::timeout(CONSENT_TIMEOUT, callback_rx.recv()).await;
    let _ = shutdown_tx.send(());
    let _ = tokio::time::timeout(Duration::from_secs(5), server).await;

    let callback = match callback {
        Ok(Some(callback)) => callback,
        Ok(None) => bail!("The OAuth callback server stopped before receiving a response"),
        Err(_) => bail!(
            "Timed out after {} seconds waiting for the OAuth callback",
            CONSENT_TIMEOUT.as_secs()
        ),
    };
    if let Some(error) = callback.error {
        bail!("Google returned an OAuth error: {error}");
    }
    if callback.state.as_deref() != Some(csrf.secret().as_str()) {
        bail!("The OAuth callback state did not match, refusing the authorization code");
    }
    let code = callback
        .code
        .context("The OAuth callback did not include an authorization code")?;

    let http = http_client()?;
    let response = client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(pkce_verifier)
        .request_async(&http)
        .await
        .context("Failed to exchange the authorization code for tokens")?;

    let refresh_token = response
        .refresh_token()
        .context("Google did not return a refresh token")?
        .secret()
        .clone();
    let scopes = match response.scopes() {
        Some(scopes) => scopes.iter().map(|s| s.to_string()).collect(),
        None => OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
    };
    info!("Authorization successful!");
    Ok(TokenFile::new(
        scopes,
        response.access_token().secret().clone(),
        refresh_token,
        expires_at(response.expires_in()),
    ))
}

async fn receive_callback(
    State(tx): State<mpsc::Sender<Callback>>,
    Query(callback): Query<Callback>,
) -> &'static str {
    let _ = tx.send(callback).await;
    "Authorization received. You can close this window and return to the terminal."
}

fn google_client(secret: &SecretFile, redirect: Option<&str>) -> Res<GoogleClient> {
    let mut client = BasicClient::new(ClientId::new(secret.client_id().to_string()))
        .set_client_secret(ClientSecret::new(secret.client_secret().to_string()))
        .set_auth_uri(AuthUrl::new(secret.auth_uri().to_string()).context("Invalid auth_uri")?)
        .set_token_uri(
            TokenUrl::new(secret.token_uri().to_string()).context("Invalid token_uri")?,
        );
    if let Some(redirect) = redirect {
        client = client.set_redirect_uri(
            RedirectUrl::new(redirect.to_string()).context("Invalid OAuth redirect URL")?,
        );
    }
    Ok(client)
}

fn http_client() -> Res<reqwest::Client> {
    // The token endpoint must not be allowed to redirect us elsewhere.
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("Unable to build the HTTP client for OAuth")
}

fn expires_at(expires_in: Option<Duration>) -> DateTime<Utc> {
    let seconds = expires_in.map(|d| d.as_secs()).unwrap_or(3600);
    Utc::now() + chrono::Duration::seconds(seconds as i64)
}
