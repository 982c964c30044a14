//! Request body → ensembler input.

use ensembler_plugin_common::{
    EnsembleInput, Row, FEATURE_PREFIX, PREDICTION_COLUMN_PREFIX, TREATMENT_CONFIG_PREFIX,
};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::RequestError;
use crate::flatten::{flatten_into, split_row};

/// Parse a JSON body and normalize it.
pub fn normalize_body(body: &[u8]) -> Result<EnsembleInput, RequestError> {
    let payload: JsonValue =
        serde_json::from_slice(body).map_err(|err| RequestError::Malformed(err.to_string()))?;
    normalize(&payload)
}

/// Normalize `{request, response: {route_responses, experiment}}`.
///
/// Every part is optional; present parts must have the documented shape.
pub fn normalize(payload: &JsonValue) -> Result<EnsembleInput, RequestError> {
    let row = flatten_payload(payload)?;
    debug!(columns = row.len(), "Flattened request");
    Ok(split_row(row))
}

/// The single flattened row handed to the ensembler after splitting.
pub fn flatten_payload(payload: &JsonValue) -> Result<Row, RequestError> {
    let JsonValue::Object(body) = payload else {
        return Err(RequestError::Malformed(format!(
            "expected a JSON object, found {}",
            json_kind(payload)
        )));
    };
    let request = field(body, "request", "request", is_object)?;
    let response = field(body, "response", "response", is_object)?;
    let (route_responses, experiment) = match response {
        Some(JsonValue::Object(response)) => (
            field(response, "route_responses", "response.route_responses", |v| v.is_array())?,
            field(response, "experiment", "response.experiment", is_object)?,
        ),
        _ => (None, None),
    };

    let mut row = Row::new();
    if let Some(request) = request {
        flatten_into(&mut row, FEATURE_PREFIX, request);
    }
    if let Some(routes) = route_responses {
        flatten_into(&mut row, PREDICTION_COLUMN_PREFIX, routes);
    }
    if let Some(experiment) = experiment {
        flatten_into(&mut row, TREATMENT_CONFIG_PREFIX, experiment);
    }
    Ok(row)
}

fn field<'a>(
    map: &'a serde_json::Map<String, JsonValue>,
    key: &str,
    path: &str,
    accepts: impl Fn(&JsonValue) -> bool,
) -> Result<Option<&'a JsonValue>, RequestError> {
    match map.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(value) if accepts(value) => Ok(Some(value)),
        Some(value) => Err(RequestError::Malformed(format!(
            "`{path}` has unexpected type {}",
            json_kind(value)
        ))),
    }
}

fn is_object(value: &JsonValue) -> bool {
    value.is_object()
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
