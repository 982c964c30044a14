//! GRPC transport: `ensembler.v1.EnsemblerService/PredictValues`.
//!
//! Requests are converted to the JSON payload shape the HTTP endpoint
//! accepts and share its normalizer.

use std::sync::Arc;

use prost_types::value::Kind;
use serde_json::{Map, Number, Value as JsonValue};
use tonic::{Request, Response, Status};

use crate::runtime::{collect_headers, EnsemblerRuntime};

pub mod proto {
    tonic::include_proto!("ensembler.v1");
}

use proto::ensembler_service_server::{EnsemblerService, EnsemblerServiceServer};
use proto::{PredictValuesRequest, PredictValuesResponse};

pub struct GrpcEnsembler {
    runtime: Arc<EnsemblerRuntime>,
}

impl GrpcEnsembler {
    pub fn new(runtime: Arc<EnsemblerRuntime>) -> Self {
        Self { runtime }
    }
}

pub fn service(runtime: Arc<EnsemblerRuntime>) -> EnsemblerServiceServer<GrpcEnsembler> {
    EnsemblerServiceServer::new(GrpcEnsembler::new(runtime))
}

#[tonic::async_trait]
impl EnsemblerService for GrpcEnsembler {
    async fn predict_values(
        &self,
        request: Request<PredictValuesRequest>,
    ) -> Result<Response<PredictValuesResponse>, Status> {
        let headers = collect_headers(&request.metadata().clone().into_headers());
        let payload = request_payload(request.into_inner());
        let result = self.runtime.ensemble_json(&payload, Some(headers)).await?;
        Ok(Response::new(PredictValuesResponse {
            result: Some(json_to_proto(result)),
        }))
    }
}

/// `{request, response: {route_responses, experiment}}` for a GRPC request.
pub fn request_payload(request: PredictValuesRequest) -> JsonValue {
    let routes: Vec<JsonValue> = request
        .route_responses
        .into_iter()
        .map(|route| {
            let mut entry = Map::new();
            entry.insert("route".to_string(), JsonValue::String(route.route));
            entry.insert(
                "data".to_string(),
                route.data.map_or(JsonValue::Null, proto_to_json),
            );
            entry.insert("is_default".to_string(), JsonValue::Bool(route.is_default));
            JsonValue::Object(entry)
        })
        .collect();
    let mut response = Map::new();
    response.insert("route_responses".to_string(), JsonValue::Array(routes));
    response.insert(
        "experiment".to_string(),
        request.experiment.map_or(JsonValue::Null, struct_to_json),
    );

    let mut payload = Map::new();
    payload.insert(
        "request".to_string(),
        request.request.map_or(JsonValue::Null, struct_to_json),
    );
    payload.insert("response".to_string(), JsonValue::Object(response));
    JsonValue::Object(payload)
}

fn struct_to_json(value: prost_types::Struct) -> JsonValue {
    JsonValue::Object(
        value
            .fields
            .into_iter()
            .map(|(key, value)| (key, proto_to_json(value)))
            .collect(),
    )
}

/// Whole numbers come back as integers; protobuf carries every number as a double.
pub fn proto_to_json(value: prost_types::Value) -> JsonValue {
    match value.kind {
        None | Some(Kind::NullValue(_)) => JsonValue::Null,
        Some(Kind::BoolValue(value)) => JsonValue::Bool(value),
        Some(Kind::NumberValue(number)) => {
            if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
                JsonValue::from(number as i64)
            } else {
                Number::from_f64(number).map_or(JsonValue::Null, JsonValue::Number)
            }
        }
        Some(Kind::StringValue(value)) => JsonValue::String(value),
        Some(Kind::ListValue(list)) => {
            JsonValue::Array(list.values.into_iter().map(proto_to_json).collect())
        }
        Some(Kind::StructValue(value)) => struct_to_json(value),
    }
}

pub fn json_to_proto(value: JsonValue) -> prost_types::Value {
    let kind = match value {
        JsonValue::Null => Kind::NullValue(prost_types::NullValue::NullValue as i32),
        JsonValue::Bool(value) => Kind::BoolValue(value),
        JsonValue::Number(number) => Kind::NumberValue(number.as_f64().unwrap_or(f64::NAN)),
        JsonValue::String(value) => Kind::StringValue(value),
        JsonValue::Array(items) => Kind::ListValue(prost_types::ListValue {
            values: items.into_iter().map(json_to_proto).collect(),
        }),
        JsonValue::Object(map) => Kind::StructValue(prost_types::Struct {
            fields: map
                .into_iter()
                .map(|(key, value)| (key, json_to_proto(value)))
                .collect(),
        }),
    };
    prost_types::Value { kind: Some(kind) }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use proto::RouteResponse;

    fn string_value(value: &str) -> prost_types::Value {
        prost_types::Value {
            kind: Some(Kind::StringValue(value.to_string())),
        }
    }

    #[test]
    fn test_request_payload_shape() {
        let data = json_to_proto(json!({"version": "control"}));
        let experiment = match json_to_proto(json!({"configuration": {"name": "x"}})).kind {
            Some(Kind::StructValue(value)) => value,
            _ => unreachable!(),
        };
        let request = PredictValuesRequest {
            request: None,
            route_responses: vec![RouteResponse {
                route: "control".to_string(),
                data: Some(data),
                is_default: true,
            }],
            experiment: Some(experiment),
        };

        let payload = request_payload(request);
        assert_eq!(payload["request"], JsonValue::Null);
        assert_eq!(
            payload["response"]["route_responses"][0]["data"]["version"],
            json!("control")
        );
        assert_eq!(
            payload["response"]["experiment"]["configuration"]["name"],
            json!("x")
        );
    }

    #[test]
    fn test_numbers_keep_integers() {
        let value = json_to_proto(json!([4, 0.5, "s", null]));
        assert_eq!(proto_to_json(value), json!([4, 0.5, "s", null]));
        assert_eq!(proto_to_json(string_value("a")), json!("a"));
    }
}
