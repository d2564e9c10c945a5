//! Credential store turning authentication settings into GitHub sessions.
//!
//! [`CredentialStore`] holds the shared settings handle and establishes an
//! Octocrab-backed [`GitHubSession`] lazily, the first time a session is
//! asked for. Settings are read at establishment time rather than snapshotted
//! at construction, so updates applied between construction and the first
//! [`session`](CredentialStore::session) call are honoured. Missing fields
//! never make construction fail: without a token the session is simply
//! unauthenticated, and without a host it targets `github.com`.

use http::Uri;
use octocrab::Octocrab;
use thiserror::Error;
use tokio::sync::OnceCell;
use url::Url;

use crate::config::{AuthSettings, SharedAuthSettings};


/// API base used when the configured host is absent or `github.com`.
const GITHUB_COM_API_BASE: &str = "https://api.github.com";

/// Errors surfaced while establishing a GitHub session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// The configured GitHub host could not be turned into an API base URL.
    #[error("GitHub host is invalid: {message}")]
    InvalidHost {
        /// Parse error detail.
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build GitHub client: {message}")]
    ClientBuild {
        /// Error detail from the client builder.
        message: String,
    },
}

/// An established (possibly anonymous) GitHub session.
#[derive(Clone)]
pub struct GitHubSession {
    client: Octocrab,
    api_base: Url,
    identity: Option<String>,
    authenticated: bool,
}

impl GitHubSession {
    /// Returns the API client bound to this session.
    #[must_use]
    pub const fn client(&self) -> &Octocrab {
        &self.client
    }

    /// Returns the API base URL the session talks to.
    #[must_use]
    pub const fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// Returns the login the session acts as, when one was configured.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Reports whether the session carries an access token.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

impl std::fmt::Debug for GitHubSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubSession")
            .field("api_base", &self.api_base.as_str())
            .field("identity", &self.identity)
            .field("authenticated", &self.authenticated)
            .finish_non_exhaustive()
    }
}

/// Lazily-authenticating credential store.
///
/// Construction never fails, even when every settings field is unset; all
/// fallible work happens in [`session`](Self::session).
pub struct CredentialStore {
    settings: SharedAuthSettings,
    session: OnceCell<GitHubSession>,
}

impl CredentialStore {
    /// Creates a store reading from the given shared settings handle.
    #[must_use]
    pub fn new(settings: SharedAuthSettings) -> Self {
        Self {
            settings,
            session: OnceCell::new(),
        }
    }

    /// Returns the settings handle the store reads from.
    #[must_use]
    pub const fn settings(&self) -> &SharedAuthSettings {
        &self.settings
    }

    /// Returns the session, establishing it on first use.
    ///
    /// The settings are read live at this point; later updates do not alter
    /// an already-established session.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when the configured host is unusable or
    /// the client cannot be built.
    pub async fn session(&self) -> Result<&GitHubSession, CredentialError> {
        self.session
            .get_or_try_init(|| async { establish(&self.settings.snapshot()) })
            .await
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("session", &self.session.get())
            .finish_non_exhaustive()
    }
}

/// Builds a session from a settings snapshot.
fn establish(settings: &AuthSettings) -> Result<GitHubSession, CredentialError> {
    let api_base = derive_api_base(settings.host.as_deref())?;
    let base_uri: Uri = api_base
        .as_str()
        .parse()
        .map_err(|error: http::uri::InvalidUri| CredentialError::InvalidHost {
            message: error.to_string(),
        })?;

    let token = settings
        .access_token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty());

    let mut builder = Octocrab::builder();
    if let Some(token) = token {
        builder = builder.personal_token(token.to_owned());
    }
    let client = builder
        .base_uri(base_uri)
        .map_err(|error| CredentialError::ClientBuild {
            message: format!("base URI rejected: {error}"),
        })?
        .build()
        .map_err(|error| CredentialError::ClientBuild {
            message: error.to_string(),
        })?;

    tracing::debug!(
        api_base = %api_base,
        authenticated = token.is_some(),
        "GitHub session established"
    );

    Ok(GitHubSession {
        client,
        api_base,
        identity: settings.identity.clone(),
        authenticated: token.is_some(),
    })
}

/// Derives the GitHub API base URL from a host setting.
///
/// `github.com` (or an unset host) maps to `api.github.com`; anything else is
/// treated as a GitHub Enterprise host and given the `/api/v3` path.
fn derive_api_base(host: Option<&str>) -> Result<Url, CredentialError> {
    let invalid = |error: url::ParseError| CredentialError::InvalidHost {
        message: error.to_string(),
    };

    let trimmed = host.map(str::trim).filter(|value| !value.is_empty());
    let Some(value) = trimmed else {
        return Url::parse(GITHUB_COM_API_BASE).map_err(invalid);
    };
    if value.eq_ignore_ascii_case("github.com") || value.eq_ignore_ascii_case("www.github.com") {
        return Url::parse(GITHUB_COM_API_BASE).map_err(invalid);
    }

    let base = if value.contains("://") {
        value.to_owned()
    } else {
        format!("https://{value}")
    };
    let mut api_url = Url::parse(&base).map_err(invalid)?;
    if api_url.host_str().is_none() {
        return Err(CredentialError::InvalidHost {
            message: format!("no host in '{value}'"),
        });
    }
    api_url.set_path("api/v3");
    Ok(api_url)
}
