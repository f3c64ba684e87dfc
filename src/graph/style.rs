//! Style rules and class labels attached to nodes and edges.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ModelError;

/// A single stylesheet rule: a selector plus a style mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRule {
    /// Selector the rule applies to.
    pub selector: String,
    /// Style declarations.
    pub style: Value,
    /// Any additional rule fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StyleRule {
    /// Create a rule from a selector and a style mapping.
    pub fn new(selector: impl Into<String>, style: Value) -> Self {
        Self {
            selector: selector.into(),
            style,
            extra: Map::new(),
        }
    }

    /// Validate a raw JSON rule.
    pub fn from_value(value: &Value) -> Result<Self, ModelError> {
        let object = value.as_object().ok_or_else(|| {
            ModelError::Format(format!("style rule {} must be a mapping", value))
        })?;
        let selector = object
            .get("selector")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ModelError::Format(format!("style rule {} must contain a `selector`", value))
            })?;
        let style = object.get("style").ok_or_else(|| {
            ModelError::Format(format!("style rule {} must contain a `style`", value))
        })?;

        let extra = object
            .iter()
            .filter(|(key, _)| key.as_str() != "selector" && key.as_str() != "style")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            selector: selector.to_string(),
            style: style.clone(),
            extra,
        })
    }

    /// Render the rule back to JSON.
    pub fn to_value(&self) -> Value {
        let mut object = self.extra.clone();
        object.insert("selector".into(), Value::from(self.selector.clone()));
        object.insert("style".into(), self.style.clone());
        Value::Object(object)
    }
}

/// Style rules plus class labels for one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleSet {
    rules: Vec<StyleRule>,
    classes: Vec<String>,
}

impl StyleSet {
    /// Create an empty style set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from pre-parsed rules and classes.
    pub fn from_rules(rules: Vec<StyleRule>, classes: Vec<String>) -> Self {
        Self { rules, classes }
    }

    /// Build from raw JSON rule and class lists.
    pub fn from_values(rules: &[Value], classes: &[Value]) -> Result<Self, ModelError> {
        let rules = rules
            .iter()
            .map(StyleRule::from_value)
            .collect::<Result<Vec<_>, _>>()?;
        let classes = classes
            .iter()
            .map(|class| {
                class.as_str().map(str::to_string).ok_or_else(|| {
                    ModelError::Format(format!("style class {} must be a string", class))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules, classes })
    }

    /// Build from a serialized JSON rule list.
    ///
    /// A string that does not decode is a format error; it never degrades to an
    /// empty style.
    pub fn from_json_str(rules: &str, classes: &[Value]) -> Result<Self, ModelError> {
        let parsed: Value = serde_json::from_str(rules).map_err(|err| {
            tracing::debug!("cannot decode style json: {}", err);
            ModelError::Format(format!("cannot decode style JSON: {}", err))
        })?;
        Self::from_rule_value(&parsed, classes)
    }

    /// Build from whatever shape appears in an external entry: a rule list, a
    /// single rule, a JSON string, or nothing at all.
    pub fn from_value(rules: Option<&Value>, classes: Option<&Value>) -> Result<Self, ModelError> {
        let classes = match classes {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(other) => {
                return Err(ModelError::Format(format!(
                    "style classes {} must be a list",
                    other
                )));
            }
        };
        match rules {
            None | Some(Value::Null) => Self::from_values(&[], &classes),
            Some(Value::String(text)) => Self::from_json_str(text, &classes),
            Some(other) => Self::from_rule_value(other, &classes),
        }
    }

    fn from_rule_value(rules: &Value, classes: &[Value]) -> Result<Self, ModelError> {
        match rules {
            Value::Array(items) => Self::from_values(items, classes),
            Value::Object(_) => Self::from_values(std::slice::from_ref(rules), classes),
            other => Err(ModelError::Format(format!(
                "styles {} must be a list of rules",
                other
            ))),
        }
    }

    /// Style rules in insertion order.
    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    /// Class labels in insertion order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Append a rule.
    pub fn push_rule(&mut self, rule: StyleRule) {
        self.rules.push(rule);
    }

    /// Append a class label if it is not present yet.
    pub fn add_class(&mut self, class: impl Into<String>) {
        let class = class.into();
        if !self.classes.contains(&class) {
            self.classes.push(class);
        }
    }

    /// Whether no rules and no classes are set.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.classes.is_empty()
    }
}
