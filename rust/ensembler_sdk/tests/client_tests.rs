mod common;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::Json;
use ensembler_engine::JobSpec;
use ensembler_sdk::{
    BuildImageRequest, ControlPlaneClient, Ensembler, EnsemblingJob, ImageRunnerType, JobStatus,
    ListOptions, RouterStatus, SdkError,
};
use serde_json::{json, Value};

use common::spawn_server;

const JOB_YAML: &str = r#"
metadata:
  name: nightly
spec:
  source:
    dataset:
      type: BQ
      bq_config:
        table: proj.ds.features
        features: [customer_id]
    join_on: [customer_id]
  predictions:
    model_a:
      dataset:
        type: BQ
        bq_config:
          table: proj.ds.model_a
      join_on: [customer_id]
      columns: [score]
  ensembler:
    uri: gs://bucket/ensembler
    result:
      column_name: result
      type: DOUBLE
  sink:
    type: CONSOLE
"#;

fn control_plane() -> axum::Router {
    axum::Router::new()
        .route(
            "/projects/{project}/routers",
            get(|Path(project): Path<i64>| async move {
                Json(json!([{
                    "id": 1,
                    "name": "router-1",
                    "project_id": project,
                    "environment_name": "dev",
                    "status": "deployed",
                    "endpoint": "http://router-1.dev"
                }]))
            }),
        )
        .route(
            "/projects/{project}/routers/{router}",
            get(|| async { (StatusCode::NOT_FOUND, "router not found") }),
        )
        .route(
            "/projects/{project}/routers/{router}/versions/{version}/deploy",
            post(|| async { StatusCode::ACCEPTED }),
        )
        .route(
            "/projects/{project}/ensemblers",
            get(|Query(query): Query<Value>| async move {
                Json(json!({
                    "results": [{"id": 7, "name": "ens", "type": "pyfunc", "echo": query}],
                    "paging": {"total": 1, "page": 1, "pages": 1}
                }))
            })
            .post(|Json(body): Json<Value>| async move {
                let mut created = body;
                created["id"] = json!(11);
                (StatusCode::CREATED, Json(created))
            }),
        )
        .route(
            "/projects/{project}/ensemblers/{ensembler}/images",
            put(|Json(body): Json<Value>| async move {
                if body["runner_type"] == json!("service") {
                    StatusCode::ACCEPTED
                } else {
                    StatusCode::BAD_REQUEST
                }
            }),
        )
        .route(
            "/projects/{project}/jobs",
            post(|Json(body): Json<Value>| async move {
                let mut created = body;
                created["id"] = json!(42);
                created["status"] = json!("pending");
                Json(created)
            }),
        )
}

#[test]
fn test_list_routers() {
    let client = ControlPlaneClient::new(spawn_server(control_plane())).unwrap();
    let routers = client.list_routers(5).unwrap();
    assert_eq!(routers.len(), 1);
    assert_eq!(routers[0].project_id, Some(5));
    assert_eq!(routers[0].status, RouterStatus::Deployed);
}

#[test]
fn test_non_2xx_is_api_error() {
    let client = ControlPlaneClient::new(spawn_server(control_plane())).unwrap();
    let err = client.get_router(5, 99).unwrap_err();
    match &err {
        SdkError::Api { status, body } => {
            assert_eq!(*status, 404);
            assert_eq!(body, "router not found");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_not_found());
}

#[test]
fn test_empty_success_body() {
    let client = ControlPlaneClient::new(spawn_server(control_plane())).unwrap();
    client.deploy_router_version(5, 1, 2).unwrap();
}

#[test]
fn test_ensemblers_round_trip() {
    let client = ControlPlaneClient::new(spawn_server(control_plane())).unwrap();
    let page = client
        .list_ensemblers(
            5,
            &ListOptions {
                page: Some(1),
                ..ListOptions::default()
            },
        )
        .unwrap();
    assert_eq!(page.results[0].id, Some(7));
    assert_eq!(page.paging.unwrap().total, 1);

    let created = client
        .create_ensembler(5, &Ensembler::pyfunc("ens", "gs://bucket/ens"))
        .unwrap();
    assert_eq!(created.id, Some(11));
    assert_eq!(created.artifact_uri.as_deref(), Some("gs://bucket/ens"));
}

#[test]
fn test_build_image() {
    let client = ControlPlaneClient::new(spawn_server(control_plane())).unwrap();
    client
        .build_ensembler_image(
            5,
            7,
            &BuildImageRequest {
                runner_type: ImageRunnerType::Service,
            },
        )
        .unwrap();
    let err = client
        .build_ensembler_image(
            5,
            7,
            &BuildImageRequest {
                runner_type: ImageRunnerType::Job,
            },
        )
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
}

#[test]
fn test_submit_job() {
    let client = ControlPlaneClient::new(spawn_server(control_plane())).unwrap();
    let spec = JobSpec::from_yaml(JOB_YAML).unwrap();
    let job = EnsemblingJob::new(7, "dev", spec.clone());

    let submitted = client.submit_job(5, &job).unwrap();
    assert_eq!(submitted.id, Some(42));
    assert_eq!(submitted.status, Some(JobStatus::Pending));
    assert_eq!(submitted.job_config, spec);
}
