//! Conversion between the external node/edge JSON format and [`Graph`].
//!
//! Input has the shape
//!
//! ```text
//! { "elements": { "nodes": [ { "data": { "id": .., "displayed": {..} } } ],
//!                 "edges": [ { "data": { "id": .., "source": .., "target": .. } } ] } }
//! ```
//!
//! Decoding happens in two passes: every entry is validated once into a typed
//! [`RawNode`] / [`RawEdge`], then the typed entries are assembled into a graph.

use serde_json::{Map, Value, json};

use super::{Edge, Entity, Graph, Identity, Node, NodeSet, StyleRule, StyleSet, validate};
use crate::error::ModelError;

const ENTRY_PREVIEW_LIMIT: usize = 120;

/// Stylesheet emitted at graph level on every encode.
pub fn default_graph_styles() -> Vec<Value> {
    vec![json!({
        "selector": "node",
        "style": {
            "label": "data(id)",
            "text-valign": "center",
            "text-halign": "center",
            "text-outline-color": "white",
            "text-outline-opacity": 1,
            "text-outline-width": 1,
            "height": "10px",
            "width": "10px",
            "font-size": "5px",
            "border-color": "black",
            "border-opacity": 1,
            "border-width": 1
        }
    })]
}

/// Default rule appended to the styles of directed edges.
pub fn default_directed_style() -> StyleRule {
    StyleRule::new(
        "edge",
        json!({
            "curve-style": "bezier",
            "target-arrow-shape": "triangle"
        }),
    )
}

/// Validated node entry.
#[derive(Debug, Clone)]
pub struct RawNode {
    /// Node identity (`data.id`).
    pub id: Identity,
    /// Properties copied from `data.displayed`.
    pub displayed: Map<String, Value>,
    /// Entry-level styles and classes.
    pub styles: StyleSet,
}

/// Validated edge entry.
#[derive(Debug, Clone)]
pub struct RawEdge {
    /// Edge identity (`data.id`).
    pub id: Identity,
    /// Incident node identity (`data.source`).
    pub source: Identity,
    /// Final node identity (`data.target`).
    pub target: Identity,
    /// Directedness (`data.directed`, default false).
    pub directed: bool,
    /// Properties copied from `data.displayed`.
    pub displayed: Map<String, Value>,
    /// Entry-level styles and classes.
    pub styles: StyleSet,
}

/// Typed intermediate produced by validating the external representation.
#[derive(Debug, Clone, Default)]
pub struct RawGraph {
    /// Node entries in input order.
    pub nodes: Vec<RawNode>,
    /// Edge entries in input order.
    pub edges: Vec<RawEdge>,
}

impl RawGraph {
    /// Validate the external representation. A JSON string is parsed first.
    pub fn parse(raw: &Value) -> Result<Self, ModelError> {
        if let Value::String(text) = raw {
            let parsed: Value = serde_json::from_str(text)
                .map_err(|err| ModelError::Format(format!("cannot decode graph JSON: {}", err)))?;
            return Self::parse(&parsed);
        }

        let root = raw
            .as_object()
            .ok_or_else(|| ModelError::Format("graph must be a mapping".into()))?;
        let elements = root
            .get("elements")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ModelError::Format("graph must contain an `elements` mapping".into())
            })?;

        let nodes = entry_list(elements, "nodes")?
            .iter()
            .enumerate()
            .map(|(index, entry)| parse_node(index, entry))
            .collect::<Result<Vec<_>, _>>()?;
        let edges = entry_list(elements, "edges")?
            .iter()
            .enumerate()
            .map(|(index, entry)| parse_edge(index, entry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { nodes, edges })
    }

    /// Assemble the graph, resolving edge endpoints against the decoded nodes.
    pub fn build(self) -> Result<Graph, ModelError> {
        let mut nodes = NodeSet::new();
        for raw in self.nodes {
            let mut node = Node::new(raw.id).with_styles(raw.styles);
            node.update_properties(&raw.displayed);
            nodes.insert(node)?;
        }

        let mut graph = Graph::from_sets(nodes, Default::default())?;
        for raw in self.edges {
            let mut edge = Edge::between(raw.id, raw.source, raw.target)
                .with_directed(raw.directed)
                .with_styles(raw.styles);
            edge.update_properties(&raw.displayed);
            graph.add_edge(edge)?;
        }
        Ok(graph)
    }
}

/// Decode the external representation into a [`Graph`].
pub fn decode(raw: &Value) -> Result<Graph, ModelError> {
    let graph = RawGraph::parse(raw)
        .and_then(RawGraph::build)
        .inspect_err(|err| tracing::debug!("graph decode failed: {}", err))?;
    tracing::debug!(
        nodes = graph.nodes().len(),
        edges = graph.edges().len(),
        "decoded graph"
    );
    Ok(graph)
}

/// Decode a serialized graph.
pub fn decode_str(text: &str) -> Result<Graph, ModelError> {
    decode(&Value::String(text.to_string()))
}

/// Encode a graph back into the external representation.
pub fn encode(graph: &Graph) -> Value {
    let nodes: Vec<Value> = graph.nodes().iter().map(encode_node).collect();
    let edges: Vec<Value> = graph.edges().iter().map(encode_edge).collect();
    json!({
        "elements": {
            "nodes": nodes,
            "edges": edges,
        },
        "style": default_graph_styles(),
    })
}

/// Encode a single node entry.
pub fn encode_node(node: &Node) -> Value {
    let mut entry = json!({
        "data": {
            "id": node.identity().to_json(),
            "displayed": node.properties().as_map().clone(),
        },
        "style": encode_rules(node.styles().rules().iter().cloned()),
    });
    attach_classes(&mut entry, node.styles());
    entry
}

/// Encode a single edge entry.
pub fn encode_edge(edge: &Edge) -> Value {
    let mut rules: Vec<StyleRule> = edge.styles().rules().to_vec();
    if edge.is_directed() {
        let default = default_directed_style();
        if !rules.contains(&default) {
            rules.push(default);
        }
    }

    let mut data = Map::new();
    data.insert("id".into(), edge.identity().to_json());
    data.insert("source".into(), edge.incident_node().to_json());
    data.insert("target".into(), edge.final_node().to_json());
    data.insert(
        "displayed".into(),
        Value::Object(edge.properties().as_map().clone()),
    );
    if edge.is_directed() {
        data.insert("directed".into(), Value::Bool(true));
    }

    let mut entry = json!({
        "data": Value::Object(data),
        "style": encode_rules(rules),
    });
    attach_classes(&mut entry, edge.styles());
    entry
}

fn encode_rules(rules: impl IntoIterator<Item = StyleRule>) -> Value {
    Value::Array(rules.into_iter().map(|rule| rule.to_value()).collect())
}

fn attach_classes(entry: &mut Value, styles: &StyleSet) {
    if styles.classes().is_empty() {
        return;
    }
    if let Some(object) = entry.as_object_mut() {
        object.insert("classes".into(), json!(styles.classes()));
    }
}

fn entry_list<'a>(elements: &'a Map<String, Value>, key: &str) -> Result<&'a [Value], ModelError> {
    match elements.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(other) => Err(ModelError::Format(format!(
            "`elements.{}` must be a list, got {}",
            key,
            preview(other)
        ))),
    }
}

fn parse_node(index: usize, entry: &Value) -> Result<RawNode, ModelError> {
    let data = entry_data(entry, "node", index)?;
    let raw_id = data.get("id").ok_or_else(|| {
        ModelError::Format(format!(
            "node entry #{} {} must contain a `data.id` field",
            index,
            preview(entry)
        ))
    })?;
    let id = validate::identity(raw_id, "node `data.id`")?;

    Ok(RawNode {
        displayed: displayed(data, "node", &id)?,
        styles: StyleSet::from_value(entry.get("style"), entry.get("classes"))?,
        id,
    })
}

fn parse_edge(index: usize, entry: &Value) -> Result<RawEdge, ModelError> {
    let data = entry_data(entry, "edge", index)?;
    let (Some(raw_id), Some(raw_source), Some(raw_target)) =
        (data.get("id"), data.get("source"), data.get("target"))
    else {
        return Err(ModelError::Format(format!(
            "edge entry #{} {} must contain `data.id`, `data.source` and `data.target` fields",
            index,
            preview(entry)
        )));
    };

    let id = validate::identity(raw_id, "edge `data.id`")?;
    let source = validate::identity(raw_source, "edge `data.source`")?;
    let target = validate::identity(raw_target, "edge `data.target`")?;
    let directed = match data.get("directed") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(other) => {
            return Err(ModelError::Format(format!(
                "edge '{}' `data.directed` must be a boolean, got {}",
                id, other
            )));
        }
    };

    Ok(RawEdge {
        displayed: displayed(data, "edge", &id)?,
        styles: StyleSet::from_value(entry.get("style"), entry.get("classes"))?,
        id,
        source,
        target,
        directed,
    })
}

fn entry_data<'a>(
    entry: &'a Value,
    kind: &str,
    index: usize,
) -> Result<&'a Map<String, Value>, ModelError> {
    entry
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            ModelError::Format(format!(
                "invalid format for {} entry #{} {}: expected a `data` mapping",
                kind,
                index,
                preview(entry)
            ))
        })
}

fn displayed(
    data: &Map<String, Value>,
    kind: &str,
    id: &Identity,
) -> Result<Map<String, Value>, ModelError> {
    match data.get("displayed") {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => {
            for key in map.keys() {
                validate::property_key(key)?;
            }
            Ok(map.clone())
        }
        Some(other) => Err(ModelError::Format(format!(
            "{} '{}' `data.displayed` must be a mapping, got {}",
            kind,
            id,
            preview(other)
        ))),
    }
}

fn preview(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() <= ENTRY_PREVIEW_LIMIT {
        text
    } else {
        let truncated: String = text.chars().take(ENTRY_PREVIEW_LIMIT).collect();
        format!("{}...", truncated)
    }
}
