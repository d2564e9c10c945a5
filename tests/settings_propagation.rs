//! Integration tests for configuration change propagation into the
//! lazily-built credential store and the settled workspace.

use std::sync::Arc;
use std::time::Duration;

use berth::activation::{ActivationCoordinator, cancellation};
use berth::config::{AuthSettings, SharedAuthSettings};
use berth::host::test_support::{FakeGitExtension, FakeSettingsSource, RecordingUiRegistry};
use berth::host::{InMemoryWorkspaceState, RepositoryHandle};
use berth::repository::GitStatusSnapshot;
use camino::Utf8PathBuf;

fn handle() -> RepositoryHandle {
    RepositoryHandle::new(Utf8PathBuf::from("/work/checkout"), None)
}

/// Waits until the shared settings handle reflects the expected snapshot.
async fn settled_settings(settings: &SharedAuthSettings, expected: &AuthSettings) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if &settings.snapshot() == expected {
                return;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("the settings listener should apply the change");
}

#[tokio::test]
async fn changes_before_first_status_reach_the_credential_store() {
    let (settings_source, change_tx) = FakeSettingsSource::new(AuthSettings::default());
    let ui = Arc::new(RecordingUiRegistry::new());
    let coordinator = ActivationCoordinator::new(
        Arc::new(FakeGitExtension::with_repositories(vec![handle()])),
        Arc::new(settings_source),
        ui,
        Arc::new(InMemoryWorkspaceState::new()),
    );

    let (_cancel, signal) = cancellation();
    let activation = coordinator
        .activate(signal)
        .await
        .expect("activation should arm its listeners");

    // The settings change lands after activation but before the first status
    // notification; the credential store must observe the new values.
    let updated = AuthSettings {
        identity: Some("octocat".to_owned()),
        host: Some("ghe.example.com".to_owned()),
        access_token: Some("ghp_updated".to_owned()),
    };
    change_tx
        .send(updated.clone())
        .expect("the change listener should be running");
    settled_settings(activation.auth_settings(), &updated).await;

    activation.repository().record_status(GitStatusSnapshot::default());
    let workspace = activation
        .settled()
        .await
        .expect("the chain should complete");

    let session = workspace
        .credentials
        .session()
        .await
        .expect("the session was established during the chain");
    assert_eq!(session.identity(), Some("octocat"));
    assert_eq!(session.api_base().as_str(), "https://ghe.example.com/api/v3");
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn changes_after_settlement_keep_the_shared_handle_current() {
    let (settings_source, change_tx) = FakeSettingsSource::new(AuthSettings::default());
    let ui = Arc::new(RecordingUiRegistry::new());
    let coordinator = ActivationCoordinator::new(
        Arc::new(FakeGitExtension::with_repositories(vec![handle()])),
        Arc::new(settings_source),
        ui,
        Arc::new(InMemoryWorkspaceState::new()),
    );

    let (_cancel, signal) = cancellation();
    let activation = coordinator
        .activate(signal)
        .await
        .expect("activation should arm its listeners");
    activation.repository().record_status(GitStatusSnapshot::default());
    let workspace = activation
        .settled()
        .await
        .expect("the chain should complete");

    // The workspace has settled; the change listener must still be running.
    let updated = AuthSettings {
        identity: Some("hubot".to_owned()),
        host: None,
        access_token: Some("ghp_rotated".to_owned()),
    };
    change_tx
        .send(updated.clone())
        .expect("the change listener should outlive settlement");
    settled_settings(workspace.credentials.settings(), &updated).await;

    // The already-established session stays as it was; only the shared
    // handle moves.
    let session = workspace
        .credentials
        .session()
        .await
        .expect("the session was established during the chain");
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn entirely_unset_settings_still_initialize_the_workspace() {
    let ui = Arc::new(RecordingUiRegistry::new());
    let coordinator = ActivationCoordinator::new(
        Arc::new(FakeGitExtension::with_repositories(vec![handle()])),
        Arc::new(FakeSettingsSource::quiet(AuthSettings::default())),
        Arc::clone(&ui) as Arc<dyn berth::host::UiRegistry>,
        Arc::new(InMemoryWorkspaceState::new()),
    );

    let (_cancel, signal) = cancellation();
    let activation = coordinator
        .activate(signal)
        .await
        .expect("activation should arm its listeners");
    activation.repository().record_status(GitStatusSnapshot::default());

    let workspace = activation
        .settled()
        .await
        .expect("missing settings must not stop initialization");

    let session = workspace
        .credentials
        .session()
        .await
        .expect("an anonymous session was established");
    assert!(!session.is_authenticated());
    assert_eq!(ui.register_count(), 2);
}
