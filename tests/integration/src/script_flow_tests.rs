//! Script execution flows, including once-script persistence across runs

use std::fs;

use preen_engine::SourceState;
use preen_system::{FileStateStore, MemoryStateStore, RealSystem};
use preen_test_utils::TestTree;
use pretty_assertions::assert_eq;

fn counting_script(marker: &std::path::Path) -> Vec<u8> {
    format!("#!/bin/sh\necho ran >> {}\n", marker.display()).into_bytes()
}

fn run_count(marker: &std::path::Path) -> usize {
    fs::read_to_string(marker).map(|s| s.lines().count()).unwrap_or(0)
}

#[test]
fn plain_script_runs_on_every_apply() {
    let tree = TestTree::new();
    let marker = tree.scratch("marker");
    tree.source_file("run_setup.sh", &counting_script(&marker));

    let system = RealSystem::new(Box::new(MemoryStateStore::new()));
    let mut state = SourceState::new(tree.source());
    state.read(&system).unwrap();

    state.apply_all(&system, &tree.target()).unwrap();
    state.apply_all(&system, &tree.target()).unwrap();
    assert_eq!(run_count(&marker), 2);
}

#[test]
fn once_script_state_survives_process_restart() {
    let tree = TestTree::new();
    let marker = tree.scratch("marker");
    let state_file = tree.scratch("preenstate.toml");
    tree.source_file("run_once_install.sh", &counting_script(&marker));

    // First run executes the script and records it on disk
    {
        let system = RealSystem::new(Box::new(FileStateStore::new(&state_file)));
        let mut state = SourceState::new(tree.source());
        state.read(&system).unwrap();
        state.apply_all(&system, &tree.target()).unwrap();
    }
    assert_eq!(run_count(&marker), 1);

    // Fresh store over the same file skips the recorded run
    {
        let system = RealSystem::new(Box::new(FileStateStore::new(&state_file)));
        let mut state = SourceState::new(tree.source());
        state.read(&system).unwrap();
        state.apply_all(&system, &tree.target()).unwrap();
    }
    assert_eq!(run_count(&marker), 1);
}

#[test]
fn once_script_reruns_when_contents_change() {
    let tree = TestTree::new();
    let marker = tree.scratch("marker");
    let state_file = tree.scratch("preenstate.toml");
    tree.source_file("run_once_install.sh", &counting_script(&marker));

    let system = RealSystem::new(Box::new(FileStateStore::new(&state_file)));
    let mut state = SourceState::new(tree.source());
    state.read(&system).unwrap();
    state.apply_all(&system, &tree.target()).unwrap();
    assert_eq!(run_count(&marker), 1);

    // Same name, new contents: the content hash changes, so it runs again
    let mut script = counting_script(&marker);
    script.extend_from_slice(b"# v2\n");
    tree.source_file("run_once_install.sh", &script);

    let mut state = SourceState::new(tree.source());
    state.read(&system).unwrap();
    state.apply_all(&system, &tree.target()).unwrap();
    assert_eq!(run_count(&marker), 2);
}

#[test]
fn templated_script_renders_before_running() {
    let tree = TestTree::new();
    let marker = tree.scratch("marker");
    tree.source_file(
        "run_greet.sh.tmpl",
        format!(
            "#!/bin/sh\necho {{{{ greeting }}}} > {}\n",
            marker.display()
        )
        .as_bytes(),
    );

    let system = RealSystem::new(Box::new(MemoryStateStore::new()));
    let mut state = SourceState::new(tree.source())
        .with_template_data(serde_json::json!({"greeting": "hello"}));
    state.read(&system).unwrap();
    state.apply_all(&system, &tree.target()).unwrap();

    assert_eq!(fs::read_to_string(&marker).unwrap(), "hello\n");
}

#[test]
fn failing_script_surfaces_its_exit_code() {
    let tree = TestTree::new();
    tree.source_file("run_broken.sh", b"#!/bin/sh\nexit 3\n");

    let system = RealSystem::new(Box::new(MemoryStateStore::new()));
    let mut state = SourceState::new(tree.source());
    state.read(&system).unwrap();

    let err = state.apply_all(&system, &tree.target()).unwrap_err();
    assert!(err.to_string().contains("broken"), "{err}");
}

#[test]
fn empty_script_is_a_noop() {
    let tree = TestTree::new();
    tree.source_file("run_nothing.sh", b"");

    let system = RealSystem::new(Box::new(MemoryStateStore::new()));
    let mut state = SourceState::new(tree.source());
    state.read(&system).unwrap();
    state.apply_all(&system, &tree.target()).unwrap();
    assert_eq!(tree.target_snapshot(), Vec::<String>::new());
}
