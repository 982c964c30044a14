mod common;

use clap::Parser;
use ensembler_runner::grpc::proto::ensembler_service_server::EnsemblerService;
use ensembler_runner::grpc::proto::{PredictValuesRequest, RouteResponse};
use ensembler_runner::grpc::{json_to_proto, proto_to_json, GrpcEnsembler};
use ensembler_runner::{run, Phase, RunnerArgs, RunnerError};
use serde_json::json;

use common::*;

fn args(extra: &[&str]) -> RunnerArgs {
    let mut argv = vec!["ensembler-runner", "--mlflow_ensembler_dir", "/models/ensembler"];
    argv.extend_from_slice(extra);
    RunnerArgs::try_parse_from(argv).unwrap()
}

#[tokio::test]
async fn test_dry_run_loads_without_serving() {
    let loader = StaticLoader(Some(routed_choice()));
    let runtime = run(&args(&["--dry_run"]), &loader, std::future::pending())
        .await
        .unwrap();
    assert_eq!(runtime.lifecycle().phase(), Phase::Ready);
}

#[tokio::test]
async fn test_missing_artifact_fails_startup() {
    let loader = StaticLoader(None);
    let err = run(&args(&["--dry_run"]), &loader, std::future::pending())
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::Load { .. }));
    assert!(err.to_string().contains("/models/ensembler"));
}

#[tokio::test]
async fn test_grpc_predict_values() {
    let service = GrpcEnsembler::new(ready_runtime(routed_choice()));
    let request = PredictValuesRequest {
        request: None,
        route_responses: vec![RouteResponse {
            route: "control".to_string(),
            data: Some(json_to_proto(json!({"version": "control"}))),
            is_default: false,
        }],
        experiment: None,
    };

    let response = service
        .predict_values(tonic::Request::new(request))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(proto_to_json(response.result.unwrap()), json!("control"));
}

#[tokio::test]
async fn test_grpc_ensembler_error_is_internal() {
    let service = GrpcEnsembler::new(ready_runtime(failing()));
    let status = service
        .predict_values(tonic::Request::new(PredictValuesRequest::default()))
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::Internal);
}

#[tokio::test]
async fn test_grpc_unnamed_routes_are_keyed_by_index() {
    let service = GrpcEnsembler::new(ready_runtime(prediction_keys()));
    let route = |data: i64| RouteResponse {
        route: String::new(),
        data: Some(json_to_proto(json!(data))),
        is_default: false,
    };
    let request = PredictValuesRequest {
        request: None,
        route_responses: vec![route(1), route(2)],
        experiment: None,
    };

    let response = service
        .predict_values(tonic::Request::new(request))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(proto_to_json(response.result.unwrap()), json!(["0", "1"]));
}
