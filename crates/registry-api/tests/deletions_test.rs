mod helpers;

use helpers::{seeded_object, setup_test_app};
use registry_core::models::{Action, Role, Stage, WorkItemStatus};
use registry_db::test_helpers::{file, user, work_item_for};
use serde_json::Value;

#[tokio::test]
async fn test_requests_need_a_bearer_token() {
    let app = setup_test_app();
    let (obj, _) = seeded_object(&app);

    let response = app.server.post(&format!("/objects/{}/delete", obj.id)).await;
    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNAUTHORIZED");

    let response = app
        .server
        .post(&format!("/objects/{}/delete", obj.id))
        .add_header("Authorization", "Bearer not-a-jwt")
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_object_deletion_review_and_approval() {
    let app = setup_test_app();
    let (obj, admin) = seeded_object(&app);
    let auth = app.bearer(&admin);

    let response = app
        .server
        .post(&format!("/objects/{}/delete", obj.id))
        .add_header("Authorization", auth.clone())
        .await;
    assert_eq!(response.status_code(), 201);
    let request: Value = response.json();
    let id = request["id"].as_i64().unwrap();
    assert!(request["confirmed_by_id"].is_null());
    assert!(request.get("encrypted_confirmation_token").is_none());
    let token = app.review_token();

    let response = app
        .server
        .get(&format!("/deletions/review/{}?token=deadbeef", id))
        .add_header("Authorization", auth.clone())
        .await;
    assert_eq!(response.status_code(), 403);
    assert_eq!(response.json::<Value>()["code"], "INVALID_TOKEN");

    let response = app
        .server
        .get(&format!("/deletions/review/{}?token={}", id, token))
        .add_header("Authorization", auth.clone())
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["request"]["id"], id);

    let response = app
        .server
        .post(&format!("/deletions/approve/{}", id))
        .add_header("Authorization", auth.clone())
        .form(&[("token", token.as_str())])
        .await;
    assert_eq!(response.status_code(), 200);
    let confirmed: Value = response.json();
    assert_eq!(confirmed["confirmed_by_id"], admin.id);
    let work_item_id = confirmed["work_item_id"].as_i64().unwrap();
    assert_eq!(
        app.harness.queue.published(),
        vec![("delete_item".to_string(), work_item_id)]
    );

    let response = app
        .server
        .post(&format!("/deletions/approve/{}", id))
        .add_header("Authorization", auth)
        .form(&[("token", token.as_str())])
        .await;
    assert_eq!(response.status_code(), 409);
    assert_eq!(response.json::<Value>()["code"], "ALREADY_APPROVED");
    assert_eq!(app.harness.queue.published().len(), 1);
}

#[tokio::test]
async fn test_file_deletion_cancel_queues_nothing() {
    let app = setup_test_app();
    let (obj, admin) = seeded_object(&app);
    let gf = file(20, &obj);
    app.harness.store.add_file(gf.clone());
    let auth = app.bearer(&admin);

    let response = app
        .server
        .post(&format!("/files/{}/delete", gf.id))
        .add_header("Authorization", auth.clone())
        .await;
    assert_eq!(response.status_code(), 201);
    let id = response.json::<Value>()["id"].as_i64().unwrap();
    let token = app.review_token();

    let response = app
        .server
        .post(&format!("/deletions/cancel/{}", id))
        .add_header("Authorization", auth.clone())
        .form(&[("token", token.as_str())])
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["cancelled_by_id"], admin.id);
    assert!(app.harness.queue.published().is_empty());

    let response = app
        .server
        .get(&format!("/deletions/show/{}", id))
        .add_header("Authorization", auth)
        .await;
    assert_eq!(response.status_code(), 200);
    let details: Value = response.json();
    assert_eq!(details["request"]["generic_file_ids"][0], gf.id);
    assert_eq!(details["work_items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_pending_work_is_a_conflict() {
    let app = setup_test_app();
    let (obj, admin) = seeded_object(&app);
    app.harness.store.add_work_item(work_item_for(
        &obj,
        Action::Ingest,
        Stage::Store,
        WorkItemStatus::Started,
    ));

    let response = app
        .server
        .post(&format!("/objects/{}/delete", obj.id))
        .add_header("Authorization", app.bearer(&admin))
        .await;
    assert_eq!(response.status_code(), 409);
    assert_eq!(response.json::<Value>()["code"], "PENDING_WORK");
    assert!(app.harness.store.deletion_requests().is_empty());
}

#[tokio::test]
async fn test_institution_user_cannot_approve() {
    let app = setup_test_app();
    let (obj, admin) = seeded_object(&app);
    let depositor = user(5, 1, Role::InstUser);
    app.harness.store.add_user(depositor.clone());

    let response = app
        .server
        .post(&format!("/objects/{}/delete", obj.id))
        .add_header("Authorization", app.bearer(&admin))
        .await;
    let id = response.json::<Value>()["id"].as_i64().unwrap();
    let token = app.review_token();

    let response = app
        .server
        .post(&format!("/deletions/approve/{}", id))
        .add_header("Authorization", app.bearer(&depositor))
        .form(&[("token", token.as_str())])
        .await;
    assert_eq!(response.status_code(), 403);
    assert_eq!(response.json::<Value>()["code"], "PERMISSION_DENIED");
    let stored = app.harness.store.deletion_request(id).unwrap();
    assert!(stored.confirmed_by_id.is_none());
    assert!(app.harness.queue.published().is_empty());
}
