// tests/endpoint_checks.rs
//
// Content, graph and bucket checks against an in-process fake read service.

mod common;

use std::time::Duration;

use axum::{extract::Path, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde_json::json;

use publish_sla_monitor::checks::{
    bucket::BucketCheck, content::ContentCheck, graph::GraphCheck, CheckResult, EndpointCheck,
    HttpProbe,
};
use publish_sla_monitor::model::VerificationTask;

async fn content(Path(id): Path<String>) -> impl IntoResponse {
    match id.as_str() {
        "abc" => (StatusCode::OK, Json(json!({"uuid": "abc", "publishReference": "tid_1"}))).into_response(),
        "garbled" => (StatusCode::OK, "<html>not json</html>").into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            (StatusCode::OK, Json(json!({"publishReference": "tid_1"}))).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn graph(Path(id): Path<String>) -> impl IntoResponse {
    match id.as_str() {
        "abc" => (StatusCode::OK, Json(json!({"properties": {"uuid": "abc", "publishReference": "tid_1"}})))
            .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn bucket(Path(id): Path<String>) -> StatusCode {
    if id == "abc" {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn fake_read_service() -> String {
    let router = Router::new()
        .route("/content/{id}", get(content))
        .route("/graph/{id}", get(graph))
        .route("/bucket/{id}", get(bucket));
    common::spawn_server(router).await
}

fn task(id: &str, tid: &str, endpoint: String, deleted: bool) -> VerificationTask {
    let mut ev = common::event(id, tid, Utc::now());
    ev.marked_deleted = deleted;
    VerificationTask::new(
        &ev,
        "prod-eu",
        common::metric("content", "/content/", 20, 2),
        endpoint,
    )
    .expect("valid task")
}

fn probe() -> HttpProbe {
    HttpProbe::new(Duration::from_millis(500), Duration::from_millis(500)).expect("client")
}

#[tokio::test]
async fn content_check_compares_publish_reference() {
    let base = fake_read_service().await;
    let check = ContentCheck::new(probe(), None);
    let ep = format!("{base}/content/");

    assert_eq!(
        check.is_finished(&task("abc", "tid_1", ep.clone(), false)).await,
        CheckResult::FINISHED
    );
    assert_eq!(
        check.is_finished(&task("abc", "tid_older", ep.clone(), false)).await,
        CheckResult::PENDING
    );
    assert_eq!(
        check.is_finished(&task("missing", "tid_1", ep.clone(), false)).await,
        CheckResult::PENDING
    );
    assert_eq!(
        check.is_finished(&task("garbled", "tid_1", ep, false)).await,
        CheckResult::PENDING
    );
}

#[tokio::test]
async fn deleted_content_is_finished_on_404() {
    let base = fake_read_service().await;
    let check = ContentCheck::new(probe(), None);
    let ep = format!("{base}/content/");
    assert_eq!(
        check.is_finished(&task("missing", "tid_1", ep.clone(), true)).await,
        CheckResult::FINISHED
    );
    // still present: the delete has not propagated
    assert_eq!(
        check.is_finished(&task("abc", "tid_2", ep, true)).await,
        CheckResult::PENDING
    );
}

#[tokio::test]
async fn probe_timeout_counts_as_not_finished() {
    let base = fake_read_service().await;
    let check = ContentCheck::new(probe(), None);
    let started = std::time::Instant::now();
    let res = check
        .is_finished(&task("slow", "tid_1", format!("{base}/content/"), false))
        .await;
    assert_eq!(res, CheckResult::PENDING);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn unreachable_endpoint_is_not_finished() {
    let check = ContentCheck::new(probe(), None);
    let res = check
        .is_finished(&task("abc", "tid_1", "http://127.0.0.1:9/content/".into(), false))
        .await;
    assert_eq!(res, CheckResult::PENDING);
}

#[tokio::test]
async fn graph_check_reads_nested_reference() {
    let base = fake_read_service().await;
    let check = GraphCheck::new(probe(), None);
    let ep = format!("{base}/graph/");
    assert_eq!(
        check.is_finished(&task("abc", "tid_1", ep.clone(), false)).await,
        CheckResult::FINISHED
    );
    assert_eq!(
        check.is_finished(&task("abc", "tid_9", ep, false)).await,
        CheckResult::PENDING
    );
}

#[tokio::test]
async fn bucket_check_is_existence_only() {
    let base = fake_read_service().await;
    let check = BucketCheck::new(probe(), None);
    let ep = format!("{base}/bucket");
    assert_eq!(
        check.is_finished(&task("abc", "whatever", ep.clone(), false)).await,
        CheckResult::FINISHED
    );
    assert_eq!(
        check.is_finished(&task("def", "whatever", ep, false)).await,
        CheckResult::PENDING
    );
}
