use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use file_vault::config::AppConfig;
use file_vault::services::ingest::IngestService;
use file_vault::services::vault::Vault;
use file_vault::{AppState, create_app};
use http_body_util::BodyExt;
use sea_orm::Database;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "---------------------------123456789012345678901234567";

async fn setup_app() -> (Router, tempfile::TempDir) {
    let _ = tracing_subscriber::fmt::try_init();
    let tmp = tempfile::tempdir().unwrap();

    let config = AppConfig {
        storage_root: tmp.path().join("uploads"),
        max_file_size: 16 * 1024 * 1024,
        jwt_secret: "test_secret".to_string(),
        allowed_origins: vec![],
    };

    // One pooled connection: every request must see the same in-memory db
    let mut opt = sea_orm::ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1);
    let db = Database::connect(opt).await.unwrap();
    file_vault::infrastructure::database::run_migrations(&db)
        .await
        .unwrap();

    tokio::fs::create_dir_all(&config.storage_root).await.unwrap();
    let vault = Arc::new(Vault::new(config.storage_root.clone()));
    let ingest = Arc::new(IngestService::new(db.clone(), vault.clone()));

    let state = AppState {
        db,
        vault,
        ingest,
        config,
    };
    (create_app(state), tmp)
}

async fn register(app: &Router, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/register")
                .header("Content-Type", "application/json")
                .body(Body::from(format!(
                    r#"{{"email": "{}", "password": "password123"}}"#,
                    email
                )))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    json["token"].as_str().unwrap().to_string()
}

fn multipart_body(files: &[(&str, &[u8])], share_password: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    if let Some(password) = share_password {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"share_password\"\r\n\r\n\
                 {password}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn upload(
    app: &Router,
    token: &str,
    files: &[(&str, &[u8])],
    share_password: Option<&str>,
) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header("Authorization", format!("Bearer {token}"))
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(files, share_password)))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn get_with_token(app: &Router, token: &str, uri: &str) -> (StatusCode, bytes::Bytes) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn send_with_token(app: &Router, token: &str, method: &str, uri: &str) -> StatusCode {
    app.clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
}

fn files_on_disk(root: &std::path::Path) -> usize {
    let mut count = 0;
    for owner_dir in std::fs::read_dir(root).unwrap().flatten() {
        if owner_dir.path().is_dir() {
            count += std::fs::read_dir(owner_dir.path()).unwrap().count();
        }
    }
    count
}

#[tokio::test]
async fn test_end_to_end_upload_share_trash_purge() {
    let (app, _tmp) = setup_app().await;
    let token = register(&app, "u1@example.com").await;

    // Upload 12 bytes with no share password
    let outcomes = upload(&app, &token, &[("notes.txt", b"hello notes\n")], None).await;
    assert_eq!(outcomes.as_array().unwrap().len(), 1);
    let file = &outcomes[0]["file"];
    assert_eq!(file["size_bytes"], 12);
    assert_eq!(file["original_name"], "notes.txt");
    assert_eq!(file["has_share_password"], false);
    let file_id = file["id"].as_str().unwrap().to_string();
    let share_id = file["share_id"].as_str().unwrap().to_string();

    // Anonymous resolution streams the bytes back under the original name
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/share/{share_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("notes.txt"));
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"hello notes\n");

    // Listed as active, not trashed
    let (status, body) = get_with_token(&app, &token, "/files").await;
    assert_eq!(status, StatusCode::OK);
    let active: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(active.as_array().unwrap().len(), 1);
    let (_, body) = get_with_token(&app, &token, "/files/trash").await;
    let trash: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(trash.as_array().unwrap().is_empty());

    // Trash it: gone from active, present in trash
    let status = send_with_token(&app, &token, "POST", &format!("/files/{file_id}/trash")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = get_with_token(&app, &token, "/files").await;
    let active: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(active.as_array().unwrap().is_empty());
    let (_, body) = get_with_token(&app, &token, "/files/trash").await;
    let trash: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(trash.as_array().unwrap().len(), 1);

    // Purge: share link now resolves to nothing
    let status = send_with_token(&app, &token, "DELETE", &format!("/files/{file_id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/share/{share_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_owner_download_round_trips_bytes() {
    let (app, _tmp) = setup_app().await;
    let token = register(&app, "dl@example.com").await;

    let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    let outcomes = upload(&app, &token, &[("blob.bin", &payload)], None).await;
    assert_eq!(outcomes[0]["file"]["size_bytes"], 10_000);
    let file_id = outcomes[0]["file"]["id"].as_str().unwrap();

    let (status, body) = get_with_token(&app, &token, &format!("/files/{file_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], &payload[..]);
}

#[tokio::test]
async fn test_trash_restore_round_trip_preserves_metadata() {
    let (app, _tmp) = setup_app().await;
    let token = register(&app, "restore@example.com").await;

    let outcomes = upload(&app, &token, &[("keep.txt", b"keep me")], None).await;
    let before = outcomes[0]["file"].clone();
    let file_id = before["id"].as_str().unwrap().to_string();

    let status = send_with_token(&app, &token, "POST", &format!("/files/{file_id}/trash")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    // Trash again: no-op success
    let status = send_with_token(&app, &token, "POST", &format!("/files/{file_id}/trash")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let status = send_with_token(&app, &token, "POST", &format!("/files/{file_id}/restore")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = get_with_token(&app, &token, "/files").await;
    let active: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let after = &active[0];
    assert_eq!(after["id"], before["id"]);
    assert_eq!(after["share_id"], before["share_id"]);
    assert_eq!(after["size_bytes"], before["size_bytes"]);
    assert_eq!(after["created_at"], before["created_at"]);
    assert_eq!(after["trashed"], false);
}

#[tokio::test]
async fn test_purge_is_idempotent_and_clears_disk() {
    let (app, tmp) = setup_app().await;
    let token = register(&app, "purge@example.com").await;

    let outcomes = upload(&app, &token, &[("gone.txt", b"bytes")], None).await;
    let file_id = outcomes[0]["file"]["id"].as_str().unwrap().to_string();
    assert_eq!(files_on_disk(&tmp.path().join("uploads")), 1);

    let status = send_with_token(&app, &token, "DELETE", &format!("/files/{file_id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let status = send_with_token(&app, &token, "DELETE", &format!("/files/{file_id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert_eq!(files_on_disk(&tmp.path().join("uploads")), 0);
    let (_, body) = get_with_token(&app, &token, "/files").await;
    let active: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(active.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_same_name_uploads_get_distinct_records() {
    let (app, _tmp) = setup_app().await;
    let token = register(&app, "dupe@example.com").await;

    // Same display name twice in one batch, different contents
    let outcomes = upload(
        &app,
        &token,
        &[("report.pdf", b"first body"), ("report.pdf", b"second body!")],
        None,
    )
    .await;
    let a = &outcomes[0]["file"];
    let b = &outcomes[1]["file"];
    assert_ne!(a["id"], b["id"]);
    assert_ne!(a["share_id"], b["share_id"]);

    let (_, body_a) =
        get_with_token(&app, &token, &format!("/files/{}", a["id"].as_str().unwrap())).await;
    let (_, body_b) =
        get_with_token(&app, &token, &format!("/files/{}", b["id"].as_str().unwrap())).await;
    assert_eq!(&body_a[..], b"first body");
    assert_eq!(&body_b[..], b"second body!");
}

#[tokio::test]
async fn test_batch_share_password_applies_to_every_file() {
    let (app, _tmp) = setup_app().await;
    let token = register(&app, "batch@example.com").await;

    let outcomes = upload(
        &app,
        &token,
        &[("a.txt", b"aaa"), ("b.txt", b"bbb")],
        Some("pw123"),
    )
    .await;

    for outcome in outcomes.as_array().unwrap() {
        let file = &outcome["file"];
        assert_eq!(file["has_share_password"], true);
        let share_id = file["share_id"].as_str().unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/share/{share_id}?password=pw123"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_empty_upload_is_rejected() {
    let (app, _tmp) = setup_app().await;
    let token = register(&app, "empty@example.com").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header("Authorization", format!("Bearer {token}"))
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(&[], None)))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_backing_file_surfaces_as_fault_and_purge_heals() {
    let (app, tmp) = setup_app().await;
    let token = register(&app, "fault@example.com").await;

    let outcomes = upload(&app, &token, &[("lost.txt", b"soon gone")], None).await;
    let file_id = outcomes[0]["file"]["id"].as_str().unwrap().to_string();
    let share_id = outcomes[0]["file"]["share_id"].as_str().unwrap().to_string();

    // Pull the bytes out from under the catalog
    let uploads = tmp.path().join("uploads");
    for owner_dir in std::fs::read_dir(&uploads).unwrap().flatten() {
        for file in std::fs::read_dir(owner_dir.path()).unwrap().flatten() {
            std::fs::remove_file(file.path()).unwrap();
        }
    }

    // Both access paths report the inconsistency instead of silent success
    let (status, _) = get_with_token(&app, &token, &format!("/files/{file_id}")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/share/{share_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // Purge tolerates the already-missing bytes and removes the row
    let status = send_with_token(&app, &token, "DELETE", &format!("/files/{file_id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = get_with_token(&app, &token, "/files").await;
    let active: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(active.as_array().unwrap().is_empty());
}
