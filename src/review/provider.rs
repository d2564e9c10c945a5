//! Pull-request UI provider.

use std::sync::{Arc, Mutex};

use crate::config::SharedAuthSettings;
use crate::host::{HostError, UiRegistry, UiSurface};
use crate::repository::RepositoryState;

use super::ReviewMode;

/// Binds pull-request UI surfaces to a review mode instance.
///
/// Created once per activation, after review mode construction;
/// [`activate`](Self::activate) is the single call that wires UI to data.
pub struct PrProvider {
    settings: SharedAuthSettings,
    review_mode: Arc<ReviewMode>,
    ui: Arc<dyn UiRegistry>,
    registered: Mutex<Vec<UiSurface>>,
}

impl PrProvider {
    /// Creates a provider for the given review mode.
    #[must_use]
    pub fn new(
        settings: SharedAuthSettings,
        review_mode: Arc<ReviewMode>,
        ui: Arc<dyn UiRegistry>,
    ) -> Self {
        Self {
            settings,
            review_mode,
            ui,
            registered: Mutex::new(Vec::new()),
        }
    }

    /// Returns the review mode the provider renders.
    #[must_use]
    pub const fn review_mode(&self) -> &Arc<ReviewMode> {
        &self.review_mode
    }

    /// Registers the provider's UI surfaces and binds them to `repository`.
    ///
    /// The surfaces are titled from the review context and from the identity
    /// of the repository's GitHub session (falling back to the configured
    /// identity when the session is anonymous).
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Registration`] when the host rejects a surface.
    pub async fn activate(&self, repository: &Arc<RepositoryState>) -> Result<(), HostError> {
        let context = self.review_mode.context();
        let viewer = repository
            .github_session()
            .and_then(|session| session.identity().map(ToOwned::to_owned))
            .or_else(|| self.settings.snapshot().identity)
            .unwrap_or_else(|| "anonymous".to_owned());

        let tree = UiSurface::PullRequestTree {
            title: context.branch.as_ref().map_or_else(
                || "Pull requests".to_owned(),
                |branch| format!("Pull requests ({branch})"),
            ),
        };
        self.ui.register(tree.clone()).await?;

        let description = UiSurface::DescriptionView {
            title: format!("Review as {viewer}"),
        };
        self.ui.register(description.clone()).await?;

        #[expect(
            clippy::expect_used,
            reason = "Mutex poisoning is an unrecoverable error"
        )]
        let mut registered = self.registered.lock().expect("registration lock poisoned");
        registered.push(tree);
        registered.push(description);
        Ok(())
    }

    /// Returns the surfaces registered by [`activate`](Self::activate).
    #[must_use]
    pub fn registered_surfaces(&self) -> Vec<UiSurface> {
        #[expect(
            clippy::expect_used,
            reason = "Mutex poisoning is an unrecoverable error"
        )]
        let registered = self.registered.lock().expect("registration lock poisoned");
        registered.clone()
    }
}

impl std::fmt::Debug for PrProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrProvider")
            .field("review_mode", &self.review_mode)
            .finish_non_exhaustive()
    }
}
