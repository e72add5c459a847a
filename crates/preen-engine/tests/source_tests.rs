//! Walker and reconciliation-driver behavior

use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

use preen_engine::{Error, RelPath, SourceState};
use preen_system::{Encryption, MemoryStateStore, RealSystem, System};
use preen_test_utils::{TestTree, XorEncryption};
use serde_json::json;

fn system() -> RealSystem {
    RealSystem::new(Box::new(MemoryStateStore::new()))
}

fn read(tree: &TestTree, system: &dyn System) -> SourceState {
    let mut state = SourceState::new(tree.source());
    state.read(system).unwrap();
    state
}

#[test]
fn applies_files_dirs_and_symlinks() {
    let tree = TestTree::new();
    tree.source_file("dot_bashrc", b"export EDITOR=vi\n");
    tree.source_dir("dot_config/app");
    tree.source_file("dot_config/app/settings", b"key=value\n");
    tree.source_file("symlink_dot_profile", b".bashrc");

    let system = system();
    let state = read(&tree, &system);
    state.apply_all(&system, &tree.target()).unwrap();

    tree.assert_target_contents(".bashrc", b"export EDITOR=vi\n");
    tree.assert_target_contents(".config/app/settings", b"key=value\n");
    tree.assert_target_symlink(".profile", ".bashrc");
}

#[test]
fn derives_permissions_from_attributes_and_umask() {
    let tree = TestTree::new();
    tree.source_file("private_dot_netrc", b"machine example\n");
    tree.source_file("executable_bin", b"#!/bin/sh\n");
    tree.source_dir("private_dot_gnupg");

    let system = system();
    let mut state = SourceState::new(tree.source()).with_umask(0o022);
    state.read(&system).unwrap();
    state.apply_all(&system, &tree.target()).unwrap();

    let mode = |path: &str| {
        std::fs::symlink_metadata(tree.target().join(path))
            .unwrap()
            .permissions()
            .mode()
            & 0o7777
    };
    assert_eq!(mode(".netrc"), 0o600);
    assert_eq!(mode("bin"), 0o755);
    assert_eq!(mode(".gnupg"), 0o700);
}

#[test]
fn duplicate_targets_are_aggregated_and_nothing_applies() {
    let tree = TestTree::new();
    tree.source_file("foo", b"plain\n");
    tree.source_file("executable_foo", b"executable\n");
    tree.source_file("bar", b"plain\n");
    tree.source_file("empty_bar", b"other\n");

    let system = system();
    let mut state = SourceState::new(tree.source());
    let err = state.read(&system).unwrap_err();

    let Error::DuplicateTargets { duplicates } = err else {
        panic!("expected DuplicateTargets, got {err}");
    };
    assert_eq!(duplicates.len(), 2);
    assert_eq!(duplicates[0].target, RelPath::new("bar"));
    assert_eq!(duplicates[0].sources.len(), 2);
    assert_eq!(duplicates[1].target, RelPath::new("foo"));

    // Nothing was mapped, so nothing can be applied
    assert_eq!(state.target_names().count(), 0);
}

#[test]
fn ignore_file_hides_targets_from_the_mapping() {
    let tree = TestTree::new();
    tree.source_file(".preenignore", b"secret\nskipped_dir\n");
    tree.source_file("secret", b"x");
    tree.source_file("kept", b"x");
    tree.source_dir("skipped_dir");
    tree.source_file("skipped_dir/inner", b"x");

    let system = system();
    let state = read(&tree, &system);
    state.apply_all(&system, &tree.target()).unwrap();

    tree.assert_target_exists("kept");
    tree.assert_target_not_exists("secret");
    tree.assert_target_not_exists("skipped_dir");
}

#[test]
fn ignore_file_in_subdirectory_is_anchored_there() {
    let tree = TestTree::new();
    tree.source_dir("dot_config");
    tree.source_file("dot_config/.preenignore", b"cache\n");
    tree.source_file("dot_config/cache", b"x");
    tree.source_file("cache", b"top-level cache is unaffected");

    let system = system();
    let state = read(&tree, &system);
    state.apply_all(&system, &tree.target()).unwrap();

    tree.assert_target_not_exists(".config/cache");
    tree.assert_target_exists("cache");
}

#[test]
fn pattern_files_support_comments_blanks_and_negation() {
    let tree = TestTree::new();
    tree.source_file(
        ".preenignore",
        b"# everything under junk, except the keeper\njunk/*\n\n!junk/keeper\n",
    );
    tree.source_dir("junk");
    tree.source_file("junk/discarded", b"x");
    tree.source_file("junk/keeper", b"x");

    let system = system();
    let state = read(&tree, &system);
    state.apply_all(&system, &tree.target()).unwrap();

    tree.assert_target_exists("junk/keeper");
    tree.assert_target_not_exists("junk/discarded");
}

#[test]
fn ignore_patterns_are_template_expanded() {
    let tree = TestTree::new();
    tree.source_file(".preenignore", b"{{ hostname }}-only\n");
    tree.source_file("work-only", b"x");
    tree.source_file("everywhere", b"x");

    let system = system();
    let mut state =
        SourceState::new(tree.source()).with_template_data(json!({"hostname": "work"}));
    state.read(&system).unwrap();
    state.apply_all(&system, &tree.target()).unwrap();

    tree.assert_target_not_exists("work-only");
    tree.assert_target_exists("everywhere");
}

#[test]
fn templates_render_against_data_and_library() {
    let tree = TestTree::new();
    tree.source_file(".preentemplates/header", b"# managed for {{ user }}");
    tree.source_file(
        "dot_gitconfig.tmpl",
        b"{% include \"header\" %}\n[user]\n\tname = {{ user }}\n",
    );

    let system = system();
    let mut state = SourceState::new(tree.source()).with_template_data(json!({"user": "alice"}));
    state.read(&system).unwrap();
    state.apply_all(&system, &tree.target()).unwrap();

    tree.assert_target_contents(
        ".gitconfig",
        b"# managed for alice\n[user]\n\tname = alice\n",
    );
}

#[test]
fn template_failure_surfaces_at_evaluate_time() {
    let tree = TestTree::new();
    tree.source_file("broken.tmpl", b"{{ undefined_variable }}");

    let system = system();
    let state = read(&tree, &system);

    let err = state.evaluate(&system).unwrap_err();
    assert!(matches!(err, Error::Content { .. }));
    // Nothing was applied
    assert_eq!(tree.target_snapshot().len(), 0);
}

#[test]
fn encrypted_files_decrypt_through_the_backend() {
    let tree = TestTree::new();
    let encryption = XorEncryption::default();
    let ciphertext = encryption.encrypt(b"machine example login me\n").unwrap();
    tree.source_file("encrypted_private_dot_netrc", &ciphertext);

    let system = system();
    let mut state = SourceState::new(tree.source()).with_encryption(Arc::new(encryption));
    state.read(&system).unwrap();
    state.apply_all(&system, &tree.target()).unwrap();

    tree.assert_target_contents(".netrc", b"machine example login me\n");
}

#[test]
fn empty_rendered_content_resolves_to_absent() {
    let tree = TestTree::new();
    // Renders to nothing for this data
    tree.source_file(
        "conditional.tmpl",
        b"{% if enabled %}contents{% endif %}",
    );
    tree.target_file("conditional", b"stale");

    let system = system();
    let mut state =
        SourceState::new(tree.source()).with_template_data(json!({"enabled": false}));
    state.read(&system).unwrap();
    state.apply_all(&system, &tree.target()).unwrap();

    tree.assert_target_not_exists("conditional");
}

#[test]
fn exact_directory_prunes_unmapped_children() {
    let tree = TestTree::new();
    tree.source_dir("exact_dot_config");
    tree.source_file("exact_dot_config/kept", b"x");
    tree.target_file(".config/kept", b"old");
    tree.target_file(".config/stale", b"y");
    tree.target_dir(".config/stale_dir");

    let system = system();
    let state = read(&tree, &system);
    state.apply_all(&system, &tree.target()).unwrap();

    tree.assert_target_contents(".config/kept", b"x");
    tree.assert_target_not_exists(".config/stale");
    tree.assert_target_not_exists(".config/stale_dir");
}

#[test]
fn exact_directory_keeps_ignored_children() {
    let tree = TestTree::new();
    tree.source_file(".preenignore", b".config/local\n");
    tree.source_dir("exact_dot_config");
    tree.source_file("exact_dot_config/kept", b"x");
    tree.target_file(".config/local", b"machine-specific");

    let system = system();
    let state = read(&tree, &system);
    state.apply_all(&system, &tree.target()).unwrap();

    tree.assert_target_contents(".config/local", b"machine-specific");
}

#[test]
fn remove_file_deletes_matching_targets() {
    let tree = TestTree::new();
    tree.source_file(".preenremove", b"*.bak\n!important.bak\n");
    tree.target_file("old.bak", b"x");
    tree.target_file("important.bak", b"x");
    tree.target_file("unrelated", b"x");

    let system = system();
    let state = read(&tree, &system);
    state.remove(&system, &tree.target()).unwrap();

    tree.assert_target_not_exists("old.bak");
    tree.assert_target_exists("important.bak");
    tree.assert_target_exists("unrelated");
}

#[test]
fn version_marker_gates_application() {
    let tree = TestTree::new();
    tree.source_file(".preenversion", b"2.1.0\n");
    tree.source_file("file", b"x");

    let system = system();
    let state = read(&tree, &system);

    assert!(matches!(
        state.ensure_version(&semver::Version::new(1, 0, 0)),
        Err(Error::SourceTooOld { .. })
    ));
    assert!(state.ensure_version(&semver::Version::new(2, 1, 0)).is_ok());
}

#[test]
fn symlink_in_source_tree_is_a_classification_error() {
    let tree = TestTree::new();
    tree.source_file("real", b"x");
    std::os::unix::fs::symlink("real", tree.source().join("alias")).unwrap();

    let system = system();
    let mut state = SourceState::new(tree.source());
    let err = state.read(&system).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFileType { .. }));
}

#[test]
fn apply_one_applies_a_single_target() {
    let tree = TestTree::new();
    tree.source_file("first", b"1");
    tree.source_file("second", b"2");

    let system = system();
    let state = read(&tree, &system);
    state
        .apply_one(&system, &tree.target(), &RelPath::new("first"))
        .unwrap();

    tree.assert_target_contents("first", b"1");
    tree.assert_target_not_exists("second");
}

#[test]
fn apply_one_unknown_target_is_an_error() {
    let tree = TestTree::new();
    let system = system();
    let state = read(&tree, &system);

    let err = state
        .apply_one(&system, &tree.target(), &RelPath::new("missing"))
        .unwrap_err();
    assert!(matches!(err, Error::UnknownTarget { .. }));
}

#[test]
fn hidden_source_entries_are_skipped() {
    let tree = TestTree::new();
    tree.source_file(".git/config", b"x");
    tree.source_file(".hidden", b"x");
    tree.source_file("visible", b"x");

    let system = system();
    let state = read(&tree, &system);
    state.apply_all(&system, &tree.target()).unwrap();

    tree.assert_target_exists("visible");
    assert_eq!(state.target_names().count(), 1);
}
