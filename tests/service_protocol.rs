use std::path::PathBuf;
use std::sync::Arc;

use graphtrace::PROTOCOL_VERSION;
use graphtrace::service::Service;
use graphtrace::supervisor::{Supervisor, SupervisorConfig};
use serde_json::{Value, json};
use tempfile::TempDir;

fn service(root: &TempDir) -> Service {
    let mut config = SupervisorConfig {
        worker_program: Some(PathBuf::from(env!("CARGO_BIN_EXE_graphtrace-worker"))),
        ..SupervisorConfig::default()
    };
    config.recording.root = root.path().to_path_buf();
    Service::new(Arc::new(Supervisor::new(config).unwrap()))
}

fn exchange(service: &Service, requests: &[Value]) -> Vec<Value> {
    let input: String = requests
        .iter()
        .map(|request| format!("{}\n", request))
        .collect();
    let mut output = Vec::new();
    service.handle(input.as_bytes(), &mut output).unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn graph() -> Value {
    json!({
        "elements": {
            "nodes": [{"data": {"id": "a"}}, {"data": {"id": "b"}}],
            "edges": [{"data": {"id": "ab", "source": "a", "target": "b"}}]
        }
    })
}

#[test]
fn success_envelope_carries_hash_and_trace() {
    let root = TempDir::new().unwrap();
    let service = service(&root);
    let code = "(define count (len (nodes)))";
    let responses = exchange(
        &service,
        &[json!({"version": PROTOCOL_VERSION, "code": code, "graph": graph()})],
    );

    assert_eq!(responses.len(), 1);
    let data = &responses[0]["data"];
    assert_eq!(data["codeHash"], json!(graphtrace::recording::code_hash(code)));
    assert_eq!(
        data["execResult"],
        json!([{"step": 0, "line": 1, "variables": {"count": 2}}])
    );
    assert!(responses[0].get("errors").is_none());
}

#[test]
fn graph_may_arrive_as_a_json_string() {
    let root = TempDir::new().unwrap();
    let service = service(&root);
    let responses = exchange(
        &service,
        &[json!({
            "version": PROTOCOL_VERSION,
            "code": "(define n (has-node? \"b\"))",
            "graph": graph().to_string(),
        })],
    );
    assert_eq!(
        responses[0]["data"]["execResult"][0]["variables"]["n"],
        json!(true)
    );
}

#[test]
fn failures_produce_error_envelopes() {
    let root = TempDir::new().unwrap();
    let service = service(&root);
    let responses = exchange(
        &service,
        &[
            json!({"version": PROTOCOL_VERSION, "code": "(raise \"bad input\")", "graph": graph()}),
            json!({"version": PROTOCOL_VERSION, "code": "(define", "graph": graph()}),
            json!({"version": PROTOCOL_VERSION, "code": "(define a 1)", "graph": {
                "elements": {"nodes": [{"data": {"id": "a"}, "style": "{not json"}]}
            }}),
        ],
    );
    assert_eq!(responses.len(), 3);
    assert_eq!(
        responses[0],
        json!({"errors": [{"message": "Exception: bad input."}]})
    );
    for response in &responses[1..] {
        let message = response["errors"][0]["message"].as_str().unwrap();
        assert!(!message.is_empty());
        assert!(response.get("data").is_none());
    }
}
