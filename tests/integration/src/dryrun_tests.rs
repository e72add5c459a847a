//! Dry-run flows: previews must leave the target byte-for-byte untouched

use preen_engine::SourceState;
use preen_system::{CanarySystem, DryRunSystem, MemoryStateStore, RealSystem};
use preen_test_utils::TestTree;
use pretty_assertions::assert_eq;

fn system() -> RealSystem {
    RealSystem::new(Box::new(MemoryStateStore::new()))
}

#[test]
fn dry_run_apply_leaves_target_untouched() {
    let tree = TestTree::new();
    tree.source_file("dot_bashrc", b"export PATH\n");
    tree.source_dir("exact_dot_config");
    tree.source_file("exact_dot_config/settings", b"x=1\n");
    tree.target_file(".config/stale", b"doomed");
    tree.target_file(".bashrc", b"old contents");

    let system = system();
    let before = tree.target_snapshot();

    let mut state = SourceState::new(tree.source());
    state.read(&system).unwrap();
    let dry = DryRunSystem::new(&system);
    state.apply_all(&dry, &tree.target()).unwrap();

    assert_eq!(tree.target_snapshot(), before);
    tree.assert_target_contents(".bashrc", b"old contents");
    tree.assert_target_contents(".config/stale", b"doomed");
}

#[test]
fn canary_over_dry_run_reports_pending_work() {
    let tree = TestTree::new();
    tree.source_file("dot_bashrc", b"export PATH\n");

    let system = system();
    let mut state = SourceState::new(tree.source());
    state.read(&system).unwrap();

    let dry = DryRunSystem::new(&system);
    let canary = CanarySystem::new(&dry);
    state.apply_all(&canary, &tree.target()).unwrap();
    assert!(canary.mutated());
}

#[test]
fn canary_over_dry_run_is_quiet_after_real_apply() {
    let tree = TestTree::new();
    tree.source_file("dot_bashrc", b"export PATH\n");
    tree.source_file("symlink_dot_vimrc", b".vim/vimrc");

    let system = system();
    let mut state = SourceState::new(tree.source());
    state.read(&system).unwrap();
    state.apply_all(&system, &tree.target()).unwrap();

    let dry = DryRunSystem::new(&system);
    let canary = CanarySystem::new(&dry);
    state.apply_all(&canary, &tree.target()).unwrap();
    assert!(!canary.mutated());
}

#[test]
fn dry_run_remove_keeps_matching_targets() {
    let tree = TestTree::new();
    tree.source_file(".preenremove", b"legacy-*\n");
    tree.target_file("legacy-config", b"x");

    let system = system();
    let mut state = SourceState::new(tree.source());
    state.read(&system).unwrap();

    let dry = DryRunSystem::new(&system);
    state.remove(&dry, &tree.target()).unwrap();
    tree.assert_target_exists("legacy-config");

    state.remove(&system, &tree.target()).unwrap();
    tree.assert_target_not_exists("legacy-config");
}

#[test]
fn dry_run_script_neither_runs_nor_records() {
    let tree = TestTree::new();
    let marker = tree.scratch("marker");
    tree.source_file(
        "run_once_install.sh",
        format!("#!/bin/sh\necho ran >> {}\n", marker.display()).as_bytes(),
    );

    let system = system();
    let mut state = SourceState::new(tree.source());
    state.read(&system).unwrap();

    let dry = DryRunSystem::new(&system);
    state.apply_all(&dry, &tree.target()).unwrap();
    assert!(!marker.exists());

    // The real apply still runs it: nothing was recorded during the dry run
    state.apply_all(&system, &tree.target()).unwrap();
    assert!(marker.exists());
}

#[test]
fn evaluate_forces_every_lazy_cell_without_mutation() {
    let tree = TestTree::new();
    tree.source_file("dot_good.tmpl", b"value={{ 1 + 1 }}\n");
    tree.source_file("dot_bad.tmpl", b"{{ not_defined }}");

    let system = system();
    let mut state = SourceState::new(tree.source());
    state.read(&system).unwrap();

    let before = tree.target_snapshot();
    let err = state.evaluate(&system).unwrap_err();
    assert!(err.to_string().contains(".bad"), "{err}");
    assert_eq!(tree.target_snapshot(), before);
}
