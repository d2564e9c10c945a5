//! Authentication settings and application configuration.
//!
//! Two concerns live here. [`SharedAuthSettings`] is the single mutable
//! settings instance shared by everything that reads authentication state:
//! the settings-change listener writes through [`SharedAuthSettings::update`]
//! and every holder of a clone observes the new values without re-wiring
//! references. [`BerthConfig`] is the layered CLI/environment/file
//! configuration used by the standalone binary to seed those settings.
//!
//! # Precedence
//!
//! `BerthConfig` values are loaded with the following precedence (lowest to
//! highest):
//!
//! 1. **Defaults** – Built-in application defaults
//! 2. **Configuration file** – `.berth.toml` in current directory, home
//!    directory, or XDG config directory
//! 3. **Environment variables** – `BERTH_IDENTITY`, `BERTH_HOST`,
//!    `BERTH_ACCESS_TOKEN`, or legacy `GITHUB_TOKEN`
//! 4. **Command-line arguments** – `--identity`, `--host`, `--access-token`

use std::env;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};


/// Snapshot of the three authentication-adjacent settings.
///
/// Every field is optional; the settings surface may leave any of them unset
/// and no validation happens here. Consumers decide how to react to missing
/// fields (see [`crate::credentials::CredentialStore`]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSettings {
    /// GitHub login the user wants to act as.
    pub identity: Option<String>,
    /// GitHub host, e.g. `github.com` or a GitHub Enterprise hostname.
    pub host: Option<String>,
    /// Personal access token used to authenticate API calls.
    pub access_token: Option<String>,
}

/// Shared mutable handle to the live authentication settings.
///
/// Clones are cheap and all point at the same instance, so a settings-change
/// notification applied through [`update`](Self::update) is visible to every
/// component holding a clone. Readers take point-in-time copies via
/// [`snapshot`](Self::snapshot); mutation and reads go through a lock so the
/// handle stays sound on a multi-threaded runtime.
#[derive(Debug, Clone, Default)]
pub struct SharedAuthSettings {
    inner: Arc<RwLock<AuthSettings>>,
}

impl SharedAuthSettings {
    /// Creates a handle seeded with the given settings.
    #[must_use]
    pub fn new(initial: AuthSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    /// Overwrites all three fields on the shared instance.
    ///
    /// `None` is accepted for any field; a host settings store is allowed to
    /// leave keys unset at any time.
    pub fn update(
        &self,
        identity: Option<String>,
        host: Option<String>,
        access_token: Option<String>,
    ) {
        #[expect(
            clippy::expect_used,
            reason = "RwLock poisoning is an unrecoverable error"
        )]
        let mut settings = self.inner.write().expect("settings lock poisoned");
        settings.identity = identity;
        settings.host = host;
        settings.access_token = access_token;
    }

    /// Returns a point-in-time copy of the current settings.
    #[must_use]
    pub fn snapshot(&self) -> AuthSettings {
        #[expect(
            clippy::expect_used,
            reason = "RwLock poisoning is an unrecoverable error"
        )]
        let settings = self.inner.read().expect("settings lock poisoned");
        settings.clone()
    }
}

/// Application configuration supporting CLI, environment, and file sources.
///
/// # Environment Variables
///
/// - `BERTH_IDENTITY` or `--identity`: GitHub login
/// - `BERTH_HOST` or `--host`: GitHub host
/// - `BERTH_ACCESS_TOKEN`, `GITHUB_TOKEN`, or `--access-token`: token
/// - `BERTH_REPO_PATH` or `--repo-path`: checkout to activate against
/// - `BERTH_STATE_FILE` or `--state-file`: persisted workspace state path
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig)]
#[serde(default)]
#[ortho_config(
    prefix = "BERTH",
    discovery(
        dotfile_name = ".berth.toml",
        config_file_name = "berth.toml",
        app_name = "berth"
    )
)]
pub struct BerthConfig {
    /// GitHub login to act as.
    #[ortho_config(cli_short = 'i')]
    pub identity: Option<String>,

    /// GitHub host, e.g. `github.com` or an Enterprise hostname.
    #[ortho_config()]
    pub host: Option<String>,

    /// Personal access token for GitHub API authentication.
    #[ortho_config(cli_short = 't')]
    pub access_token: Option<String>,

    /// Path inside the checkout to activate against. Defaults to the current
    /// directory.
    #[ortho_config(cli_short = 'p')]
    pub repo_path: Option<String>,

    /// Path of the JSON file backing persisted workspace state. Defaults to
    /// `.berth-state.json` inside the repository working directory.
    #[ortho_config()]
    pub state_file: Option<String>,

    /// Upper bound, in seconds, on the wait for a repository to open. When
    /// unset the wait is unbounded.
    #[ortho_config()]
    pub discovery_timeout_secs: Option<u64>,
}

impl BerthConfig {
    /// Builds the authentication settings snapshot this configuration
    /// describes.
    ///
    /// For backward compatibility with other GitHub tooling, a missing
    /// `access_token` falls back to the `GITHUB_TOKEN` environment variable.
    #[must_use]
    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            identity: self.identity.clone(),
            host: self.host.clone(),
            access_token: self
                .access_token
                .clone()
                .or_else(|| env::var("GITHUB_TOKEN").ok()),
        }
    }

    /// Returns the configured discovery timeout, if any.
    #[must_use]
    pub fn discovery_timeout(&self) -> Option<Duration> {
        self.discovery_timeout_secs.map(Duration::from_secs)
    }
}
