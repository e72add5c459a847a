//! Full apply flows across the workspace crates

use std::sync::Arc;

use preen_engine::SourceState;
use preen_system::{CanarySystem, Encryption, MemoryStateStore, RealSystem};
use preen_test_utils::{TestTree, XorEncryption};
use pretty_assertions::assert_eq;
use serde_json::json;

fn system() -> RealSystem {
    RealSystem::new(Box::new(MemoryStateStore::new()))
}

#[test]
fn full_tree_apply_then_reapply_is_idempotent() {
    let tree = TestTree::new();
    tree.source_file("dot_bashrc.tmpl", b"export EDITOR={{ editor }}\n");
    tree.source_dir("private_dot_ssh");
    tree.source_file("private_dot_ssh/config", b"Host *\n");
    tree.source_file("symlink_dot_vimrc", b".vim/vimrc");
    tree.source_dir("exact_dot_config");
    tree.source_file("exact_dot_config/settings", b"x=1\n");
    tree.target_file(".config/stale", b"gone soon");

    let system = system();
    let mut state = SourceState::new(tree.source()).with_template_data(json!({"editor": "vi"}));
    state.read(&system).unwrap();

    state.apply_all(&system, &tree.target()).unwrap();

    tree.assert_target_contents(".bashrc", b"export EDITOR=vi\n");
    tree.assert_target_contents(".ssh/config", b"Host *\n");
    tree.assert_target_symlink(".vimrc", ".vim/vimrc");
    tree.assert_target_contents(".config/settings", b"x=1\n");
    tree.assert_target_not_exists(".config/stale");

    // Second pass over an unchanged source performs no mutation at all
    let canary = CanarySystem::new(&system);
    state.apply_all(&canary, &tree.target()).unwrap();
    assert!(!canary.mutated());
}

#[test]
fn apply_then_remove_deletes_stale_targets() {
    let tree = TestTree::new();
    tree.source_file("kept", b"x");
    tree.source_file(".preenremove", b"legacy-*\n");
    tree.target_file("legacy-config", b"x");
    tree.target_file("legacy-cache", b"x");

    let system = system();
    let mut state = SourceState::new(tree.source());
    state.read(&system).unwrap();
    state.apply_all(&system, &tree.target()).unwrap();
    state.remove(&system, &tree.target()).unwrap();

    tree.assert_target_exists("kept");
    tree.assert_target_not_exists("legacy-config");
    tree.assert_target_not_exists("legacy-cache");
}

#[test]
fn encrypted_template_runs_the_whole_pipeline() {
    let tree = TestTree::new();
    let encryption = XorEncryption::default();
    let ciphertext = encryption
        .encrypt(b"token = {{ token }}\n")
        .unwrap();
    tree.source_file("encrypted_private_dot_apirc.tmpl", &ciphertext);

    let system = system();
    let mut state = SourceState::new(tree.source())
        .with_encryption(Arc::new(encryption))
        .with_template_data(json!({"token": "hunter2"}));
    state.read(&system).unwrap();
    state.apply_all(&system, &tree.target()).unwrap();

    tree.assert_target_contents(".apirc", b"token = hunter2\n");
}

#[test]
fn drifted_target_converges_back() {
    let tree = TestTree::new();
    tree.source_file("dot_gitconfig", b"[user]\nname = alice\n");

    let system = system();
    let mut state = SourceState::new(tree.source());
    state.read(&system).unwrap();
    state.apply_all(&system, &tree.target()).unwrap();

    // Drift: edit the target by hand
    tree.target_file(".gitconfig", b"[user]\nname = mallory\n");
    state.apply_all(&system, &tree.target()).unwrap();

    tree.assert_target_contents(".gitconfig", b"[user]\nname = alice\n");
}

#[test]
fn symlink_replaced_when_linkname_changes() {
    let tree = TestTree::new();
    tree.source_file("symlink_current", b"releases/v1");

    let system = system();
    let mut state = SourceState::new(tree.source());
    state.read(&system).unwrap();
    state.apply_all(&system, &tree.target()).unwrap();
    tree.assert_target_symlink("current", "releases/v1");

    // New source state with a different link target
    tree.source_file("symlink_current", b"releases/v2");
    let mut state = SourceState::new(tree.source());
    state.read(&system).unwrap();
    state.apply_all(&system, &tree.target()).unwrap();
    tree.assert_target_symlink("current", "releases/v2");
}

#[test]
fn apply_order_is_deterministic_and_parent_first() {
    let tree = TestTree::new();
    tree.source_dir("a/b/c");
    tree.source_file("a/b/c/leaf", b"x");
    tree.source_file("a/file", b"x");

    let system = system();
    let mut state = SourceState::new(tree.source());
    state.read(&system).unwrap();

    let names: Vec<_> = state.target_names().map(|n| n.to_string()).collect();
    assert_eq!(names, vec!["a", "a/b", "a/b/c", "a/b/c/leaf", "a/file"]);

    state.apply_all(&system, &tree.target()).unwrap();
    tree.assert_target_contents("a/b/c/leaf", b"x");
}
