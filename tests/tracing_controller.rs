use graphtrace::graph::Graph;
use graphtrace::recording::{
    ControllerState, ExecutionSession, RecordingConfig, SessionState, TracingController,
    list_areas, read_metadata, read_trace,
};
use graphtrace::script::{Interpreter, compile};
use serde_json::json;
use tempfile::TempDir;

fn config(root: &TempDir, auto_delete: bool, max_records: usize) -> RecordingConfig {
    RecordingConfig {
        root: root.path().to_path_buf(),
        auto_delete,
        max_records,
    }
}

fn traced_run(controller: &mut TracingController, code: &str) -> ExecutionSession {
    let program = compile(code).unwrap();
    let mut graph = Graph::new();
    let mut session = ExecutionSession::new(code);
    let mut scope = controller.acquire(&mut session).unwrap();
    let result = Interpreter::new(&program, &mut graph, &mut scope).run();
    let state = if result.is_ok() {
        SessionState::Completed
    } else {
        SessionState::Failed
    };
    scope.finish(state).unwrap();
    session
}

#[test]
fn archived_area_matches_the_in_memory_trace() {
    let root = TempDir::new().unwrap();
    let mut controller = TracingController::new(config(&root, false, 100));
    let session = traced_run(&mut controller, "(define a 1)\n(define b (+ a 1))");

    let area = controller.last_area().unwrap().to_path_buf();
    assert_eq!(read_trace(&area).unwrap(), session.trace());
    let meta = read_metadata(&area).unwrap();
    assert_eq!(meta.state, SessionState::Completed);
    assert_eq!(meta.records, 2);
    assert_eq!(meta.code_hash, session.code_hash());
    assert!(meta.finished_at.is_some());

    let last = &session.trace()[1];
    assert_eq!(last.step, 1);
    assert_eq!(last.line, 2);
    assert_eq!(last.variables["b"], json!(2));
}

#[test]
fn record_cap_truncates_without_failing() {
    let root = TempDir::new().unwrap();
    let mut controller = TracingController::new(config(&root, true, 5));
    let session = traced_run(
        &mut controller,
        "(define i 0)\n(while (< i 100) (set! i (+ i 1)))",
    );
    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(session.trace().len(), 5);
    assert!(session.truncated());
}

#[test]
fn sequential_sessions_do_not_share_areas_or_records() {
    let root = TempDir::new().unwrap();
    let mut controller = TracingController::new(config(&root, false, 100));
    let first = traced_run(&mut controller, "(define secret 42)");
    let first_area = controller.last_area().unwrap().to_path_buf();
    let second = traced_run(&mut controller, "(define other 1)");
    let second_area = controller.last_area().unwrap().to_path_buf();

    assert_ne!(first.id(), second.id());
    assert_ne!(first_area, second_area);
    assert_eq!(list_areas(root.path()).unwrap().len(), 2);
    assert!(second
        .trace()
        .iter()
        .all(|record| !record.variables.contains_key("secret")));
    assert_eq!(read_trace(&second_area).unwrap(), second.trace());
}

#[test]
fn failed_run_is_recorded_as_aborted() {
    let root = TempDir::new().unwrap();
    let mut controller = TracingController::new(config(&root, true, 100));
    let session = traced_run(&mut controller, "(define a 1)\n(raise \"stop\")");
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(session.trace().len(), 1);
    assert_eq!(controller.state(), ControllerState::Unarmed);
    assert_eq!(controller.last_outcome(), Some(ControllerState::Aborted));
    assert!(list_areas(root.path()).unwrap().is_empty());
}
