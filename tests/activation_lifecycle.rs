//! Integration tests for the activation state machine: discovery ordering,
//! one-shot initialization, sequential dependencies, and failure semantics.

use std::sync::Arc;

use berth::activation::{
    ActivationCoordinator, ActivationError, ActivationState, cancellation,
};
use berth::config::AuthSettings;
use berth::host::test_support::{FakeGitExtension, FakeSettingsSource, RecordingUiRegistry};
use berth::host::{InMemoryWorkspaceState, RepositoryHandle};
use berth::repository::GitStatusSnapshot;
use camino::Utf8PathBuf;

fn handle(workdir: &str) -> RepositoryHandle {
    RepositoryHandle::new(Utf8PathBuf::from(workdir), None)
}

fn status() -> GitStatusSnapshot {
    GitStatusSnapshot {
        branch: Some("feature/login".to_owned()),
        ..GitStatusSnapshot::default()
    }
}

fn coordinator_over(
    git: FakeGitExtension,
    ui: Arc<RecordingUiRegistry>,
) -> ActivationCoordinator {
    ActivationCoordinator::new(
        Arc::new(git),
        Arc::new(FakeSettingsSource::quiet(AuthSettings::default())),
        ui,
        Arc::new(InMemoryWorkspaceState::new()),
    )
}

#[tokio::test]
async fn already_open_repository_initializes_on_first_status() {
    let repo_a = handle("/work/repo-a");
    let git = FakeGitExtension::with_repositories(vec![repo_a.clone()]);
    let ui = Arc::new(RecordingUiRegistry::new());

    let (_cancel, signal) = cancellation();
    let activation = coordinator_over(git, Arc::clone(&ui))
        .activate(signal)
        .await
        .expect("activation should arm its listeners");

    // Arming completes without any downstream construction.
    assert_eq!(activation.repository_handle(), &repo_a);
    assert_eq!(activation.state(), ActivationState::AwaitingFirstStatus);
    assert_eq!(ui.register_count(), 0);

    ui.bind_repository(Arc::clone(activation.repository()));
    activation.repository().record_status(status());

    let repository = Arc::clone(activation.repository());
    let workspace = activation
        .settled()
        .await
        .expect("the chain should complete");

    assert!(repository.is_connected());
    assert_eq!(ui.register_count(), 2);
    // The GitHub connection completed before any surface was registered.
    assert_eq!(ui.connection_flags(), vec![true, true]);
    assert_eq!(workspace.provider.registered_surfaces().len(), 2);
}

#[tokio::test]
async fn repeated_status_notifications_initialize_exactly_once() {
    let git = FakeGitExtension::with_repositories(vec![handle("/work/repo-a")]);
    let ui = Arc::new(RecordingUiRegistry::new());

    let (_cancel, signal) = cancellation();
    let activation = coordinator_over(git, Arc::clone(&ui))
        .activate(signal)
        .await
        .expect("activation should arm its listeners");

    // Status keeps firing for the life of the repository state.
    for _ in 0..5 {
        activation.repository().record_status(status());
    }

    let repository = Arc::clone(activation.repository());
    let mut state = activation.watch_state();
    activation
        .settled()
        .await
        .expect("the chain should complete");

    for _ in 0..3 {
        repository.record_status(status());
    }
    tokio::task::yield_now().await;

    assert_eq!(ui.register_count(), 2, "the chain must run exactly once");
    assert_eq!(
        *state.borrow_and_update(),
        ActivationState::Initialized,
        "later notifications must not disturb the settled state"
    );
}

#[tokio::test]
async fn late_opening_repository_suspends_activation_until_it_arrives() {
    let (git, open_tx) = FakeGitExtension::opening_later();
    let ui = Arc::new(RecordingUiRegistry::new());
    let coordinator = coordinator_over(git, Arc::clone(&ui));

    let (_cancel, signal) = cancellation();
    let pending = tokio::spawn(coordinator.activate(signal));
    tokio::task::yield_now().await;
    assert!(!pending.is_finished(), "activation must wait for a repository");

    let repo_b = handle("/work/repo-b");
    open_tx
        .send(repo_b.clone())
        .expect("the discovery wait should be listening");

    let activation = pending
        .await
        .expect("activation task should not panic")
        .expect("activation should complete once a repository opens");
    assert_eq!(activation.repository_handle(), &repo_b);

    activation.repository().record_status(status());
    let workspace = activation
        .settled()
        .await
        .expect("the chain should complete");
    assert_eq!(workspace.provider.registered_surfaces().len(), 2);
    assert_eq!(ui.register_count(), 2);
}

#[tokio::test]
async fn open_repository_skips_the_open_event_subscription() {
    let git = FakeGitExtension::with_repositories(vec![handle("/work/repo-a")]);
    let git = Arc::new(git);
    let ui = Arc::new(RecordingUiRegistry::new());

    let coordinator = ActivationCoordinator::new(
        Arc::clone(&git) as Arc<dyn berth::host::GitExtension>,
        Arc::new(FakeSettingsSource::quiet(AuthSettings::default())),
        Arc::clone(&ui) as Arc<dyn berth::host::UiRegistry>,
        Arc::new(InMemoryWorkspaceState::new()),
    );

    let (_cancel, signal) = cancellation();
    coordinator
        .activate(signal)
        .await
        .expect("activation should arm its listeners");

    assert!(
        !git.was_subscribed(),
        "an already-open repository must not arm the open-event wait"
    );
}

#[tokio::test]
async fn connection_failure_is_terminal_for_the_activation() {
    let git = FakeGitExtension::with_repositories(vec![handle("/work/repo-a")]);
    let ui = Arc::new(RecordingUiRegistry::new());

    let coordinator = ActivationCoordinator::new(
        Arc::new(git),
        Arc::new(FakeSettingsSource::quiet(AuthSettings {
            // A host that cannot be parsed makes session establishment fail.
            host: Some("not a valid host ::".to_owned()),
            ..AuthSettings::default()
        })),
        Arc::clone(&ui) as Arc<dyn berth::host::UiRegistry>,
        Arc::new(InMemoryWorkspaceState::new()),
    );

    let (_cancel, signal) = cancellation();
    let activation = coordinator
        .activate(signal)
        .await
        .expect("activation should arm its listeners");

    activation.repository().record_status(status());

    let repository = Arc::clone(activation.repository());
    let mut state = activation.watch_state();
    let error = activation
        .settled()
        .await
        .expect_err("the connection failure must surface");

    assert!(matches!(error, ActivationError::Connection(_)));
    assert!(!repository.is_connected());
    assert_eq!(
        ui.register_count(),
        0,
        "review mode and provider must never be built after a failed connection"
    );
    assert!(matches!(
        *state.borrow_and_update(),
        ActivationState::Failed { .. }
    ));

    // The latch stays tripped: later notifications do not retry.
    repository.record_status(status());
    tokio::task::yield_now().await;
    assert_eq!(ui.register_count(), 0);
    assert!(matches!(
        *state.borrow_and_update(),
        ActivationState::Failed { .. }
    ));
}

#[tokio::test]
async fn rejected_provider_activation_fails_the_chain() {
    let git = FakeGitExtension::with_repositories(vec![handle("/work/repo-a")]);
    let ui = Arc::new(RecordingUiRegistry::rejecting());

    let (_cancel, signal) = cancellation();
    let activation = coordinator_over(git, Arc::clone(&ui))
        .activate(signal)
        .await
        .expect("activation should arm its listeners");

    activation.repository().record_status(status());

    let repository = Arc::clone(activation.repository());
    let error = activation
        .settled()
        .await
        .expect_err("the rejection must surface");

    assert!(matches!(error, ActivationError::Provider(_)));
    // The connection had already completed when the provider was rejected.
    assert!(repository.is_connected());
}

#[tokio::test]
async fn cancelling_discovery_marks_the_activation_failed() {
    let (git, _open_tx) = FakeGitExtension::opening_later();
    let ui = Arc::new(RecordingUiRegistry::new());
    let coordinator = coordinator_over(git, ui);

    let (cancel, signal) = cancellation();
    let pending = tokio::spawn(coordinator.activate(signal));
    cancel.cancel();

    let error = pending
        .await
        .expect("activation task should not panic")
        .expect_err("cancellation must abort the wait");
    assert_eq!(error, ActivationError::DiscoveryCancelled);
}
