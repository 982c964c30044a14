//! Dotted-key flattening of nested payloads.
//!
//! `{"client": {"id": 4, "tags": ["a"]}}` under prefix `__features__`
//! flattens to `__features__client.id = 4` and `__features__client.tags.0 = "a"`.
//! Empty objects and arrays below the root are kept as leaves so distinct
//! payloads never flatten to the same row. Object keys made of digits share
//! the key space of list indices.

use std::collections::HashSet;

use ensembler_plugin_common::{
    EnsembleInput, Row, Value, FEATURE_PREFIX, PREDICTION_COLUMN_PREFIX, TREATMENT_CONFIG_PREFIX,
};
use serde_json::Value as JsonValue;
use tracing::warn;

/// Append the leaves of `value` to `row`, keyed by `prefix` plus their dotted path.
///
/// A null root contributes nothing; a scalar root is stored under `prefix`.
pub fn flatten_into(row: &mut Row, prefix: &str, value: &JsonValue) {
    let mut stack: Vec<(String, &JsonValue)> = Vec::new();
    match value {
        JsonValue::Null => return,
        JsonValue::Object(_) | JsonValue::Array(_) => push_children(&mut stack, prefix, "", value),
        scalar => {
            row.insert(prefix, Value::from(scalar.clone()));
            return;
        }
    }

    while let Some((key, value)) = stack.pop() {
        if has_children(value) {
            push_children(&mut stack, &key, ".", value);
        } else {
            row.insert(key, Value::from(value.clone()));
        }
    }
}

pub fn flatten(prefix: &str, value: &JsonValue) -> Row {
    let mut row = Row::new();
    flatten_into(&mut row, prefix, value);
    row
}

fn has_children(value: &JsonValue) -> bool {
    match value {
        JsonValue::Object(map) => !map.is_empty(),
        JsonValue::Array(items) => !items.is_empty(),
        _ => false,
    }
}

// Children are pushed in reverse so they pop in document order.
fn push_children<'a>(
    stack: &mut Vec<(String, &'a JsonValue)>,
    base: &str,
    separator: &str,
    value: &'a JsonValue,
) {
    match value {
        JsonValue::Object(map) => {
            for (key, child) in map.iter().rev() {
                stack.push((format!("{base}{separator}{key}"), child));
            }
        }
        JsonValue::Array(items) => {
            for (idx, child) in items.iter().enumerate().rev() {
                stack.push((format!("{base}{separator}{idx}"), child));
            }
        }
        _ => {}
    }
}

enum Node {
    Leaf(Value),
    Branch(Vec<(String, Node)>),
}

impl Node {
    fn insert(&mut self, path: &str, value: Value) {
        let Node::Branch(children) = self else {
            return;
        };
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let slot = match children.iter().position(|(name, _)| name == head) {
            Some(idx) => idx,
            None => {
                children.push((head.to_string(), Node::Branch(Vec::new())));
                children.len() - 1
            }
        };
        match rest {
            Some(rest) => children[slot].1.insert(rest, value),
            None => children[slot].1 = Node::Leaf(value),
        }
    }

    /// Branches whose keys are exactly `0..n` in order become lists.
    fn into_value(self) -> Value {
        match self {
            Node::Leaf(value) => value,
            Node::Branch(children) => {
                let is_list = !children.is_empty()
                    && children
                        .iter()
                        .enumerate()
                        .all(|(idx, (name, _))| *name == idx.to_string());
                if is_list {
                    Value::List(children.into_iter().map(|(_, node)| node.into_value()).collect())
                } else {
                    Value::Map(
                        children
                            .into_iter()
                            .map(|(name, node)| (name, node.into_value()))
                            .collect(),
                    )
                }
            }
        }
    }
}

/// Rebuild a nested value from `(dotted path, leaf)` pairs.
pub fn unflatten<I, K>(entries: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: AsRef<str>,
{
    let mut root = Node::Branch(Vec::new());
    for (path, value) in entries {
        let path = path.as_ref();
        if path.is_empty() {
            return value;
        }
        root.insert(path, value);
    }
    root.into_value()
}

/// Split a flattened request row into the ensembler input.
///
/// Features keep their dotted keys with the feature prefix stripped. Route
/// responses are rebuilt and keyed as [`route_keys`] describes. The
/// experiment becomes the treatment config.
pub fn split_row(row: Row) -> EnsembleInput {
    let mut features = Row::new();
    let mut routes = Vec::new();
    let mut treatment = Vec::new();
    for (key, value) in row {
        if let Some(rest) = key.strip_prefix(FEATURE_PREFIX) {
            features.insert(rest, value);
        } else if let Some(rest) = key.strip_prefix(PREDICTION_COLUMN_PREFIX) {
            routes.push((rest.to_string(), value));
        } else if let Some(rest) = key.strip_prefix(TREATMENT_CONFIG_PREFIX) {
            treatment.push((rest.to_string(), value));
        } else {
            features.insert(key, value);
        }
    }

    let mut predictions = Row::new();
    if !routes.is_empty() {
        let entries: Vec<(String, Value)> = match unflatten(routes) {
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(idx, item)| (idx.to_string(), item))
                .collect(),
            Value::Map(row) => row.into_iter().collect(),
            other => vec![(String::new(), other)],
        };
        for (name, response) in route_keys(entries) {
            predictions.insert(name, response);
        }
    }

    let treatment_config = (!treatment.is_empty()).then(|| unflatten(treatment));
    EnsembleInput::new(features, predictions).with_treatment_config(treatment_config)
}

/// Key each route response by its `route` name, or by its index when the name
/// is missing or empty. When two responses would share a key, every response
/// is keyed by its index instead.
fn route_keys(entries: Vec<(String, Value)>) -> Vec<(String, Value)> {
    let named: Vec<String> = entries
        .iter()
        .map(|(idx, response)| match response.get("route").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => idx.clone(),
        })
        .collect();
    let unique = {
        let mut seen = HashSet::with_capacity(named.len());
        named.iter().all(|key| seen.insert(key.as_str()))
    };
    if unique {
        return named
            .into_iter()
            .zip(entries)
            .map(|(key, (_, response))| (key, response))
            .collect();
    }
    warn!(
        routes = entries.len(),
        "Route names are not unique; keying predictions by route index"
    );
    entries
}
