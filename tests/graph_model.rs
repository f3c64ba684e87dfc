use graphtrace::ErrorKind;
use graphtrace::error::ModelError;
use graphtrace::graph::{Edge, Entity, EntityKind, EntityRef, Graph, Node, NodeSet, codec};
use serde_json::json;

fn scenario_a() -> Graph {
    codec::decode(&json!({
        "elements": {
            "nodes": [
                {"data": {"id": "a", "displayed": {"weight": 1}}},
                {"data": {"id": "b"}}
            ],
            "edges": [
                {"data": {"id": "ab", "source": "a", "target": "b", "directed": true}}
            ]
        }
    }))
    .unwrap()
}

#[test]
fn decodes_nodes_and_edges_by_identity() {
    let graph = scenario_a();
    let a = graph.get_node("a").unwrap();
    assert_eq!(a.property("weight"), Some(&json!(1)));

    let ab = graph.get_edge("ab").unwrap();
    assert!(ab.is_directed());
    let (incident, final_node) = ab.node_pair();
    assert_eq!(incident.to_string(), "a");
    assert_eq!(final_node.to_string(), "b");
    assert_eq!(graph.incident_node(ab).unwrap().identity().to_string(), "a");
    assert_eq!(graph.final_node(ab).unwrap().identity().to_string(), "b");
}

#[test]
fn dangling_endpoint_names_the_missing_node() {
    let err = codec::decode(&json!({
        "elements": {
            "nodes": [{"data": {"id": "a"}}, {"data": {"id": "b"}}],
            "edges": [{"data": {"id": "ac", "source": "a", "target": "c"}}]
        }
    }))
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
    assert!(err.to_string().contains("'c'"), "{}", err);
}

#[test]
fn add_edge_requires_both_endpoints() {
    let mut graph = Graph::new();
    graph.add_node(Node::new("a")).unwrap();
    let err = graph
        .add_edge(Edge::between("ax", "a".into(), "x".into()))
        .unwrap_err();
    assert!(matches!(err, ModelError::DanglingEndpoint { .. }));
    assert!(graph.edges().is_empty());

    graph.add_node(Node::new("x")).unwrap();
    graph
        .add_edge(Edge::between("ax", "a".into(), "x".into()))
        .unwrap();
    assert!(graph.has_edge("ax"));
}

#[test]
fn duplicate_identity_is_rejected() {
    let mut nodes = NodeSet::new();
    nodes.insert(Node::new("a")).unwrap();
    let err = nodes.insert(Node::new("a").with_name("other")).unwrap_err();
    assert!(matches!(
        err,
        ModelError::DuplicateIdentity {
            kind: EntityKind::Node,
            ..
        }
    ));
    assert_eq!(nodes.len(), 1);
}

#[test]
fn removing_a_node_in_use_fails() {
    let mut graph = scenario_a();
    let a = graph.get_node("a").unwrap().identity().clone();
    assert!(matches!(
        graph.remove_node(&a),
        Err(ModelError::NodeInUse(_))
    ));
    let ab = graph.get_edge("ab").unwrap().identity().clone();
    graph.remove_edge(&ab).unwrap();
    graph.remove_node(&a).unwrap();
    assert!(!graph.has_node("a"));
}

#[test]
fn neighbors_follow_direction() {
    let graph = scenario_a();
    let a = graph.get_node("a").unwrap().identity().clone();
    let b = graph.get_node("b").unwrap().identity().clone();
    assert_eq!(graph.neighbors(&a).len(), 1);
    assert!(graph.neighbors(&b).is_empty());
    assert_eq!(graph.incident_edges(&b).len(), 1);
}

#[test]
fn entities_of_different_kinds_do_not_compare() {
    let graph = scenario_a();
    let node = EntityRef::Node(graph.get_node("a").unwrap());
    let edge = EntityRef::Edge(graph.get_edge("ab").unwrap());
    assert!(matches!(
        node.try_cmp(&edge),
        Err(ModelError::IncomparableKinds { .. })
    ));
}
