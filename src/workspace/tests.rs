//! Tests for the JSON-backed workspace state.

use camino::Utf8PathBuf;
use serde_json::json;
use tempfile::TempDir;

use crate::host::WorkspaceState;

use super::{JsonWorkspaceState, WorkspaceStateError};

fn state_path(temp: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().join("state.json"))
        .expect("temp path should be UTF-8")
}

#[test]
fn missing_file_loads_as_empty_state() {
    let temp = TempDir::new().expect("should create temp directory");

    let state = JsonWorkspaceState::load(state_path(&temp)).expect("load should succeed");

    assert_eq!(state.get("review.lastPullRequest"), None);
}

#[test]
fn inserted_values_survive_a_reload() {
    let temp = TempDir::new().expect("should create temp directory");
    let path = state_path(&temp);

    let state = JsonWorkspaceState::load(path.clone()).expect("load should succeed");
    state.insert("review.lastPullRequest", json!(1347));
    drop(state);

    let reloaded = JsonWorkspaceState::load(path).expect("reload should succeed");
    assert_eq!(reloaded.get("review.lastPullRequest"), Some(json!(1347)));
}

#[test]
fn insert_replaces_previous_values() {
    let temp = TempDir::new().expect("should create temp directory");
    let state = JsonWorkspaceState::load(state_path(&temp)).expect("load should succeed");

    state.insert("review.lastPullRequest", json!(1));
    state.insert("review.lastPullRequest", json!(2));

    assert_eq!(state.get("review.lastPullRequest"), Some(json!(2)));
}

#[test]
fn corrupt_file_surfaces_a_parse_error() {
    let temp = TempDir::new().expect("should create temp directory");
    let path = state_path(&temp);
    std::fs::write(&path, "not json at all").expect("should write file");

    let error = JsonWorkspaceState::load(path).expect_err("corrupt state cannot load");

    assert!(matches!(error, WorkspaceStateError::Parse { .. }));
}
