mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{png, TestApp};
use ocr_review_server::jobs::{JobState, JobStatus};
use ocr_review_server::routes;
use ocr_review_server::routes::jobs::{BatchSubmitResponse, CancelResponse, SubmitResponse};
use ocr_review_server::routes::results::{HitResponse, ResultsResponse};
use ocr_review_server::results::RegionStatus;
use ocr_review_server::storage::ImageRef;

fn server(app: &TestApp) -> TestServer {
    TestServer::new(routes::router(app.state.clone())).unwrap()
}

/// Upload an image and run OCR on it through the API
async fn reviewed_image(app: &TestApp, server: &TestServer) -> ImageRef {
    let image_ref = app.upload("page.png", 10).await;
    let submitted: SubmitResponse = server
        .post("/api/v1/ocr/jobs")
        .json(&json!({ "image_ref": image_ref }))
        .await
        .json();
    assert_eq!(app.wait_terminal(submitted.job_id).await, JobState::Done);
    image_ref
}

fn multipart_body(boundary: &str, files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (filename, data) in files {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

async fn post_multipart(app: &TestApp, uri: &str, files: &[(&str, Vec<u8>)]) -> (StatusCode, Value) {
    let boundary = "XBOUNDARYX";
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(multipart_body(boundary, files)))
        .unwrap();

    let response = routes::router(app.state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let server = server(&app);

    let body: Value = server.get("/health").await.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["ocr_providers"], json!(["static"]));

    server.get("/api/v1/health").await.assert_status_ok();
}

#[tokio::test]
async fn test_upload_deduplicates_identical_bytes() {
    let app = TestApp::new().await;

    let (status, first) = post_multipart(&app, "/api/v1/images", &[("scan.png", png(1))]).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["filename"], "scan.png");
    assert_eq!(first["width"], 100);
    assert_eq!(first["is_duplicate"], false);

    let (status, second) = post_multipart(&app, "/api/v1/images", &[("copy.png", png(1))]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["is_duplicate"], true);
    assert_eq!(second["image_ref"], first["image_ref"]);
}

#[tokio::test]
async fn test_upload_rejects_non_images() {
    let app = TestApp::new().await;
    let (status, body) =
        post_multipart(&app, "/api/v1/images", &[("notes.txt", b"hello".to_vec())]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_batch_upload_reports_rejections() {
    let app = TestApp::new().await;
    let (status, body) = post_multipart(
        &app,
        "/api/v1/images/batch",
        &[
            ("a.png", png(1)),
            ("empty.png", Vec::new()),
            ("b.png", png(2)),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["images"].as_array().unwrap().len(), 2);
    assert_eq!(body["rejected"][0]["filename"], "empty.png");

    let server = server(&app);
    let listed: Value = server.get("/api/v1/images").await.json();
    assert_eq!(listed["total"], 2);
}

#[tokio::test]
async fn test_serve_image_file() {
    let app = TestApp::new().await;
    let image_ref = app.upload("Seite 1.png", 3).await;
    let server = server(&app);

    let response = server.get(&format!("/api/v1/images/{}/file", image_ref)).await;
    response.assert_status_ok();
    assert_eq!(response.header(header::CONTENT_TYPE), "image/png");
    assert_eq!(
        response.header(header::CONTENT_DISPOSITION),
        "inline; filename*=UTF-8''Seite%201.png"
    );
    assert_eq!(response.as_bytes().to_vec(), png(3));

    server
        .get("/api/v1/images/missing/file")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_job_lifecycle_over_http() {
    let app = TestApp::new().await;
    let server = server(&app);
    let image_ref = app.upload("page.png", 10).await;

    let response = server
        .post("/api/v1/ocr/jobs")
        .json(&json!({ "image_ref": image_ref }))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let submitted: SubmitResponse = response.json();

    assert_eq!(app.wait_terminal(submitted.job_id).await, JobState::Done);
    let status: JobStatus = server
        .get(&format!("/api/v1/ocr/jobs/{}", submitted.job_id))
        .await
        .json();
    assert_eq!(status.state, JobState::Done);
    assert_eq!(status.progress, 100);
    assert_eq!(status.image_ref, Some(image_ref.clone()));

    let results: ResultsResponse = server
        .get(&format!("/api/v1/images/{}/results", image_ref))
        .await
        .json();
    assert_eq!(results.items.len(), 4);
    assert!(app.dir.path().join("results").join(format!("{}.json", image_ref)).exists());
}

#[tokio::test]
async fn test_submit_unknown_image_is_not_found() {
    let app = TestApp::new().await;
    let server = server(&app);
    let response = server
        .post("/api/v1/ocr/jobs")
        .json(&json!({ "image_ref": "nope" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_job_reports_unknown() {
    let app = TestApp::new().await;
    let server = server(&app);

    for id in ["not-a-job", "5f0c2c1e-54d4-4f1e-9a55-3b9b3b1d0c11"] {
        let response = server.get(&format!("/api/v1/ocr/jobs/{}", id)).await;
        response.assert_status_ok();
        let status: JobStatus = response.json();
        assert_eq!(status.state, JobState::Unknown);
        assert_eq!(status.job_id, id);
    }

    let cancelled: CancelResponse = server.delete("/api/v1/ocr/jobs/not-a-job").await.json();
    assert!(!cancelled.cancelled);
}

#[tokio::test]
async fn test_batch_without_refs_submits_all_images() {
    let app = TestApp::new().await;
    let server = server(&app);
    for shade in 1..=3 {
        app.upload(&format!("p{}.png", shade), shade).await;
    }

    let response = server.post("/api/v1/ocr/jobs/batch").await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: BatchSubmitResponse = response.json();
    assert_eq!(body.job_ids.len(), 3);

    for job_id in body.job_ids {
        assert_eq!(app.wait_terminal(job_id).await, JobState::Done);
    }
}

#[tokio::test]
async fn test_batch_skips_unknown_refs() {
    let app = TestApp::new().await;
    let server = server(&app);
    let image_ref = app.upload("p.png", 1).await;

    let body: BatchSubmitResponse = server
        .post("/api/v1/ocr/jobs/batch")
        .json(&json!({ "image_refs": [image_ref, "ghost"] }))
        .await
        .json();
    assert_eq!(body.job_ids.len(), 1);
}

#[tokio::test]
async fn test_patch_rename_and_status() {
    let app = TestApp::new().await;
    let server = server(&app);
    let image_ref = reviewed_image(&app, &server).await;
    let base = format!("/api/v1/images/{}/results", image_ref);

    let renamed: Value = server
        .patch(&format!("{}/3", base))
        .json(&json!({ "text": "München" }))
        .await
        .json();
    assert_eq!(renamed["text"], "München");
    assert_eq!(renamed["confidence"], 0.8);

    // legacy field name
    let renamed: Value = server
        .patch(&format!("{}/0", base))
        .json(&json!({ "name": "Anna", "status": "removed" }))
        .await
        .json();
    assert_eq!(renamed["text"], "Anna");
    assert_eq!(renamed["status"], "removed");

    server
        .patch(&format!("{}/0", base))
        .json(&json!({}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .patch(&format!("{}/9", base))
        .json(&json!({ "text": "x" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["details"], "index=9 len=4");
}

#[tokio::test]
async fn test_patch_text_and_status_together() {
    let app = TestApp::new().await;
    let server = server(&app);
    let image_ref = reviewed_image(&app, &server).await;
    let base = format!("/api/v1/images/{}/results", image_ref);
    let before = app.state.results().list(&image_ref);

    let updated: Value = server
        .patch(&format!("{}/2", base))
        .json(&json!({ "text": "B2", "status": "removed" }))
        .await
        .json();
    assert_eq!(updated["text"], "B2");
    assert_eq!(updated["status"], "removed");

    let after = app.state.results().list(&image_ref);
    assert_eq!(after[2].text, "B2");
    assert_eq!(after[2].status, RegionStatus::Removed);
    assert_eq!(after[2].bbox, before[2].bbox);
    for i in [0, 1, 3] {
        assert_eq!(after[i], before[i]);
    }

    // a bad status rejects the whole request, text included
    let response = server
        .patch(&format!("{}/3", base))
        .json(&json!({ "text": "Hamburg", "status": "deleted" }))
        .await;
    assert!(response.status_code().is_client_error());
    assert_eq!(app.state.results().list(&image_ref)[3].text, "Berlin");
}

#[tokio::test]
async fn test_remove_and_restore() {
    let app = TestApp::new().await;
    let server = server(&app);
    let image_ref = reviewed_image(&app, &server).await;
    let base = format!("/api/v1/images/{}/results/1", image_ref);

    let removed: Value = server.post(&format!("{}/remove", base)).await.json();
    assert_eq!(removed["status"], "removed");
    assert_eq!(app.state.results().list(&image_ref)[1].status, RegionStatus::Removed);

    let restored: Value = server.post(&format!("{}/restore", base)).await.json();
    assert_eq!(restored["status"], "active");
}

#[tokio::test]
async fn test_clean_hit_and_csv() {
    let app = TestApp::new().await;
    let server = server(&app);
    let image_ref = reviewed_image(&app, &server).await;
    let base = format!("/api/v1/images/{}", image_ref);

    let hit: HitResponse = server
        .get(&format!("{}/hit", base))
        .add_query_param("x", 15)
        .add_query_param("y", 10)
        .await
        .json();
    assert_eq!(hit.index, Some(1));

    let cleaned: ResultsResponse = server.post(&format!("{}/clean", base)).await.json();
    let statuses: Vec<RegionStatus> = cleaned.items.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            RegionStatus::Active,
            RegionStatus::Removed,
            RegionStatus::Removed,
            RegionStatus::Active
        ]
    );

    let hit: HitResponse = server
        .get(&format!("{}/hit", base))
        .add_query_param("x", 15)
        .add_query_param("y", 10)
        .await
        .json();
    assert_eq!(hit.index, Some(0));
    assert_eq!(hit.region.unwrap().text, "A");

    let miss: HitResponse = server
        .get(&format!("{}/hit", base))
        .add_query_param("x", 99)
        .add_query_param("y", 0)
        .await
        .json();
    assert!(miss.index.is_none());

    let csv = server.get(&format!("{}/export.csv", base)).await;
    assert_eq!(csv.header(header::CONTENT_TYPE), "text/csv; charset=utf-8");
    let lines: Vec<String> = csv.text().lines().map(|l| l.to_string()).collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "bbox,text,confidence,image");
    assert_eq!(lines[1], format!("\"[0, 0, 40, 20]\",A,90%,{}", image_ref));
}

#[tokio::test]
async fn test_zip_export() {
    let app = TestApp::new().await;
    let server = server(&app);
    let image_ref = reviewed_image(&app, &server).await;

    let response = server.get("/api/v1/exports/results.zip").await;
    response.assert_status_ok();
    assert_eq!(response.header(header::CONTENT_TYPE), "application/zip");

    let bytes = response.as_bytes().to_vec();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    assert_eq!(archive.len(), 1);
    let entry = archive.by_index(0).unwrap();
    assert_eq!(entry.name(), format!("{}.csv", image_ref));
}
