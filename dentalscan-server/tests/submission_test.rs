//! Upload, history, details and deletion of submissions

mod common;

use common::{create_test_server, image_base64, session, sign_in, upload, PUBLIC_URL};
use dentalscan_server::store::AuditStore;
use serde_json::{json, Value};

const TWO_MB: usize = 2 * 1024 * 1024;

#[tokio::test]
async fn test_upload_appears_in_history() {
    let (server, _state) = create_test_server();
    let cookie = sign_in(&server, "student-1", None).await;

    let response = server
        .post("/api/submission.upload")
        .add_cookie(session(&cookie))
        .json(&json!({
            "fileName": "molars.jpg",
            "fileSize": TWO_MB,
            "mimeType": "image/jpeg",
            "imageBase64": image_base64(TWO_MB),
        }))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    let submission_id = body["submissionId"].as_u64().unwrap();
    let image_url = body["imageUrl"].as_str().unwrap();
    assert!(image_url.starts_with(&format!("{}/files/submissions/", PUBLIC_URL)));
    assert!(image_url.ends_with("-molars.jpg"));

    let history: Value = server
        .get("/api/submission.getHistory")
        .add_cookie(session(&cookie))
        .await
        .json();
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["id"], submission_id);
    assert_eq!(history[0]["status"], "pending");
    assert_eq!(history[0]["imageQuality"], "good");
    assert_eq!(history[0]["fileSize"], TWO_MB);
}

#[tokio::test]
async fn test_uploaded_image_is_retrievable() {
    let (server, _state) = create_test_server();
    let cookie = sign_in(&server, "student-1", None).await;

    let response = server
        .post("/api/submission.upload")
        .add_cookie(session(&cookie))
        .json(&json!({
            "fileName": "front.png",
            "fileSize": 8,
            "mimeType": "image/png",
            "imageQuality": "fair",
            "imageBase64": "iVBORw0KGgo=",
        }))
        .await;
    let body: Value = response.json();
    let image_url = body["imageUrl"].as_str().unwrap();
    let path = image_url.strip_prefix(PUBLIC_URL).unwrap();

    let response = server.get(path).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.header("content-type"), "image/png");
    assert_eq!(
        response.as_bytes().as_ref(),
        &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]
    );
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected() {
    let (server, _state) = create_test_server();
    let cookie = sign_in(&server, "student-1", None).await;

    let response = server
        .post("/api/submission.upload")
        .add_cookie(session(&cookie))
        .json(&json!({
            "fileName": "huge.jpg",
            "fileSize": 10 * 1024 * 1024 + 1,
            "mimeType": "image/jpeg",
            "imageBase64": image_base64(16),
        }))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "BAD_REQUEST");
    assert_eq!(body["message"], "File size exceeds 10MB limit");

    let history: Value = server
        .get("/api/submission.getHistory")
        .add_cookie(session(&cookie))
        .await
        .json();
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_rejects_bad_payloads() {
    let (server, _state) = create_test_server();
    let cookie = sign_in(&server, "student-1", None).await;

    let response = server
        .post("/api/submission.upload")
        .add_cookie(session(&cookie))
        .json(&json!({
            "fileName": "scan.gif",
            "fileSize": 16,
            "mimeType": "image/gif",
            "imageBase64": image_base64(16),
        }))
        .await;
    assert_eq!(response.status_code(), 400);

    let response = server
        .post("/api/submission.upload")
        .add_cookie(session(&cookie))
        .json(&json!({
            "fileName": "scan.jpg",
            "fileSize": 16,
            "mimeType": "image/jpeg",
            "imageBase64": "not base64!",
        }))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_upload_records_event() {
    let (server, state) = create_test_server();
    let cookie = sign_in(&server, "student-1", None).await;

    let submission_id = upload(&server, &cookie).await;

    let events = state.store.list_events("submission_uploaded").unwrap();
    assert_eq!(events.len(), 1);
    let metadata = events[0].metadata.as_ref().unwrap();
    assert_eq!(metadata["submissionId"], submission_id);
    assert_eq!(metadata["fileSize"], 1024);
}

#[tokio::test]
async fn test_history_is_newest_first_and_paged() {
    let (server, _state) = create_test_server();
    let cookie = sign_in(&server, "student-1", None).await;

    let first = upload(&server, &cookie).await;
    let second = upload(&server, &cookie).await;
    let third = upload(&server, &cookie).await;

    let history: Value = server
        .get("/api/submission.getHistory")
        .add_cookie(session(&cookie))
        .await
        .json();
    let ids: Vec<u64> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![third, second, first]);

    let page: Value = server
        .get("/api/submission.getHistory")
        .add_query_param("limit", 1)
        .add_query_param("offset", 1)
        .add_cookie(session(&cookie))
        .await
        .json();
    let page = page.as_array().unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["id"], second);
}

#[tokio::test]
async fn test_history_only_shows_own_submissions() {
    let (server, _state) = create_test_server();
    let alice = sign_in(&server, "alice", None).await;
    let bob = sign_in(&server, "bob", None).await;

    upload(&server, &alice).await;

    let history: Value = server
        .get("/api/submission.getHistory")
        .add_cookie(session(&bob))
        .await
        .json();
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_details_of_foreign_or_missing_submission_not_found() {
    let (server, _state) = create_test_server();
    let alice = sign_in(&server, "alice", None).await;
    let bob = sign_in(&server, "bob", None).await;

    let submission_id = upload(&server, &alice).await;

    let response = server
        .get("/api/submission.getDetails")
        .add_query_param("submissionId", submission_id)
        .add_cookie(session(&bob))
        .await;
    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND");

    let response = server
        .get("/api/submission.getDetails")
        .add_query_param("submissionId", 9999)
        .add_cookie(session(&alice))
        .await;
    assert_eq!(response.status_code(), 404);

    let response = server
        .get("/api/submission.getDetails")
        .add_query_param("submissionId", submission_id)
        .add_cookie(session(&alice))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["submission"]["id"], submission_id);
    assert!(body["analysis"].is_null());
}

#[tokio::test]
async fn test_delete_submission() {
    let (server, _state) = create_test_server();
    let alice = sign_in(&server, "alice", None).await;
    let bob = sign_in(&server, "bob", None).await;

    let submission_id = upload(&server, &alice).await;
    let details: Value = server
        .get("/api/submission.getDetails")
        .add_query_param("submissionId", submission_id)
        .add_cookie(session(&alice))
        .await
        .json();
    let image_url = details["submission"]["imageUrl"].as_str().unwrap().to_string();

    // Someone else cannot delete it
    let response = server
        .post("/api/submission.delete")
        .add_cookie(session(&bob))
        .json(&json!({ "submissionId": submission_id }))
        .await;
    assert_eq!(response.status_code(), 404);

    let response = server
        .post("/api/submission.delete")
        .add_cookie(session(&alice))
        .json(&json!({ "submissionId": submission_id }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["success"], true);

    let response = server
        .get("/api/submission.getDetails")
        .add_query_param("submissionId", submission_id)
        .add_cookie(session(&alice))
        .await;
    assert_eq!(response.status_code(), 404);

    let response = server
        .get(image_url.strip_prefix(PUBLIC_URL).unwrap())
        .await;
    assert_eq!(response.status_code(), 404);

    // Deleting again is NOT_FOUND
    let response = server
        .post("/api/submission.delete")
        .add_cookie(session(&alice))
        .json(&json!({ "submissionId": submission_id }))
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_missing_file_not_found() {
    let (server, _state) = create_test_server();

    let response = server.get("/files/submissions/1/nothing.jpg").await;

    assert_eq!(response.status_code(), 404);
}
