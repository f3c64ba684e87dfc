use std::collections::BTreeSet;

use graphtrace::graph::{Entity, Graph, Node, NodeSet, codec};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

fn property_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[a-z ]{0,8}".prop_map(Value::from),
    ]
}

fn raw_graph() -> impl Strategy<Value = Value> {
    (
        prop::collection::btree_set("[a-z][a-z0-9_]{0,6}", 1..8),
        prop::collection::vec((any::<prop::sample::Index>(), any::<prop::sample::Index>(), any::<bool>()), 0..10),
        prop::collection::btree_map("[a-z]{1,5}", property_value(), 0..4),
    )
        .prop_map(|(ids, pairs, displayed)| {
            let ids: Vec<String> = ids.into_iter().collect();
            let displayed: Map<String, Value> = displayed.into_iter().collect();
            let nodes: Vec<Value> = ids
                .iter()
                .map(|id| json!({"data": {"id": id, "displayed": displayed}}))
                .collect();
            let edges: Vec<Value> = pairs
                .iter()
                .enumerate()
                .map(|(n, (source, target, directed))| {
                    json!({"data": {
                        "id": format!("e{}", n),
                        "source": source.get(&ids),
                        "target": target.get(&ids),
                        "directed": directed,
                    }})
                })
                .collect();
            json!({"elements": {"nodes": nodes, "edges": edges}})
        })
}

fn summary(graph: &Graph) -> (Vec<String>, Vec<String>, Vec<Map<String, Value>>) {
    (
        graph.nodes().identities().map(|id| id.to_string()).collect(),
        graph.edges().identities().map(|id| id.to_string()).collect(),
        graph
            .nodes()
            .iter()
            .map(|node| node.properties().as_map().clone())
            .chain(graph.edges().iter().map(|edge| edge.properties().as_map().clone()))
            .collect(),
    )
}

proptest! {
    #[test]
    fn decode_encode_decode_preserves_identities_and_properties(raw in raw_graph()) {
        let first = codec::decode(&raw).unwrap();
        let second = codec::decode(&codec::encode(&first)).unwrap();
        prop_assert_eq!(summary(&first), summary(&second));
        for edge in first.edges() {
            let again = second.edge(edge.identity()).unwrap();
            prop_assert_eq!(edge.node_pair(), again.node_pair());
            prop_assert_eq!(edge.is_directed(), again.is_directed());
        }
    }

    #[test]
    fn serialized_graph_decodes_like_the_object(raw in raw_graph()) {
        let text = serde_json::to_string(&raw).unwrap();
        let from_text = codec::decode_str(&text).unwrap();
        let from_value = codec::decode(&raw).unwrap();
        prop_assert_eq!(summary(&from_text), summary(&from_value));
    }

    #[test]
    fn element_set_keeps_first_of_each_identity(ids in prop::collection::vec("[a-d]", 0..20)) {
        let mut set = NodeSet::new();
        let mut expected = Vec::new();
        for id in &ids {
            let inserted = set.insert(Node::new(id.as_str())).is_ok();
            prop_assert_eq!(inserted, !expected.contains(id));
            if inserted {
                expected.push(id.clone());
            }
        }
        let order: Vec<String> = set.identities().map(|id| id.to_string()).collect();
        prop_assert_eq!(&order, &expected);

        let unique: BTreeSet<&String> = ids.iter().collect();
        prop_assert_eq!(set.len(), unique.len());
        for id in unique {
            prop_assert!(set.contains_str(id));
            prop_assert!(set.contains(&Node::new(id.as_str())));
        }
    }
}

#[test]
fn unparsable_style_is_a_format_error() {
    let err = codec::decode(&json!({
        "elements": {"nodes": [{"data": {"id": "a"}, "style": "{not json"}]}
    }))
    .unwrap_err();
    assert_eq!(err.kind(), graphtrace::ErrorKind::Format);
}

#[test]
fn encoding_adds_default_stylesheets() {
    let graph = codec::decode(&json!({
        "elements": {
            "nodes": [{"data": {"id": "a"}}, {"data": {"id": "b"}}],
            "edges": [{"data": {"id": "ab", "source": "a", "target": "b", "directed": true}}]
        }
    }))
    .unwrap();
    let encoded = codec::encode(&graph);
    assert_eq!(encoded["style"], Value::Array(codec::default_graph_styles()));
    let edge_styles = encoded["elements"]["edges"][0]["style"].as_array().unwrap();
    assert!(edge_styles.contains(&codec::default_directed_style().to_value()));
}
