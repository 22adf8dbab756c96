mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::{detections, TestApp};
use ocr_review_server::client::{
    ClientError, EditOutcome, EditReconciler, HttpApi, LocalApi, PollingClient, ReviewApi,
    UndoOutcome,
};
use ocr_review_server::config::Config;
use ocr_review_server::jobs::JobState;
use ocr_review_server::ocr::StaticEngine;
use ocr_review_server::results::{Point, RegionStatus};
use ocr_review_server::routes;
use uuid::Uuid;

fn local(app: &TestApp) -> Arc<dyn ReviewApi> {
    Arc::new(LocalApi::new(app.state.clone()))
}

#[tokio::test]
async fn test_single_job_results_visible_when_done() {
    let app = TestApp::with_engine(
        StaticEngine::new(detections()).with_delay(Duration::from_millis(50)),
    )
    .await;
    let image_ref = app.upload("page.png", 1).await;

    let job_id = app.state.jobs().submit(&image_ref).await.unwrap();
    let mut seen = Vec::new();
    loop {
        let state = app.state.jobs().status_of(job_id).state;
        if seen.last() != Some(&state) {
            seen.push(state);
        }
        if state == JobState::Done {
            assert_eq!(app.state.results().list(&image_ref).len(), 4);
            break;
        }
        assert!(!state.is_terminal(), "job ended in {:?}", state);
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(seen.last(), Some(&JobState::Done));
    assert!(seen.contains(&JobState::Running));
}

#[tokio::test]
async fn test_polling_client_batch_of_three() {
    let app = TestApp::new().await;
    let mut refs = Vec::new();
    for shade in 1..=3 {
        refs.push(app.upload(&format!("p{}.png", shade), shade).await);
    }

    let client = PollingClient::new(local(&app), Duration::from_millis(5));
    let outcomes = client.run_batch(&refs).await.unwrap();

    let ids: HashSet<Uuid> = outcomes.iter().map(|o| o.job_id).collect();
    assert_eq!(ids.len(), 3);
    for outcome in &outcomes {
        assert_eq!(outcome.state(), JobState::Done);
        assert_eq!(outcome.results.as_ref().unwrap().len(), 4);
        assert!(refs.contains(outcome.image_ref().unwrap()));
    }
}

#[tokio::test]
async fn test_polling_unknown_job_terminates() {
    let app = TestApp::new().await;
    let client = PollingClient::new(local(&app), Duration::from_millis(1));

    let outcomes = client.wait_all(&[Uuid::new_v4()]).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].state(), JobState::Unknown);
    assert!(outcomes[0].results.is_none());
}

#[tokio::test]
async fn test_failed_job_reports_error() {
    let app = TestApp::with_engine(StaticEngine::failing("tesseract crashed")).await;
    let image_ref = app.upload("page.png", 1).await;

    let client = PollingClient::new(local(&app), Duration::from_millis(5));
    let outcome = client.run(&image_ref).await.unwrap();
    assert_eq!(outcome.state(), JobState::Error);
    assert!(outcome.status.error.unwrap().contains("tesseract crashed"));
    assert!(app.state.results().list(&image_ref).is_empty());
}

#[tokio::test]
async fn test_cancel_through_api() {
    let app = TestApp::with_engine(
        StaticEngine::new(detections()).with_delay(Duration::from_secs(5)),
    )
    .await;
    let image_ref = app.upload("page.png", 1).await;
    let api = local(&app);

    let job_id = api.submit(&image_ref).await.unwrap();
    assert!(api.cancel(job_id).await.unwrap());

    let client = PollingClient::new(api.clone(), Duration::from_millis(5));
    let outcomes = client.wait_all(&[job_id]).await.unwrap();
    assert_eq!(outcomes[0].state(), JobState::Error);
    assert_eq!(outcomes[0].status.error.as_deref(), Some("cancelled"));
    assert!(!api.cancel(job_id).await.unwrap());
}

#[tokio::test]
async fn test_rename_after_concurrent_shift() {
    let app = TestApp::new().await;
    let image_ref = app.upload("page.png", 1).await;
    let api = local(&app);
    PollingClient::new(api.clone(), Duration::from_millis(5))
        .run(&image_ref)
        .await
        .unwrap();

    let mut reconciler = EditReconciler::new(api.clone(), 10);
    reconciler.open(image_ref.clone()).await.unwrap();
    let target = reconciler.view()[2].identity();
    assert_eq!(reconciler.view()[2].text, "B");

    // a second job replaces the list with a shifted one
    let mut shifted = app.state.results().list(&image_ref);
    shifted.remove(0);
    app.state.results().commit(&image_ref, shifted).await;

    let outcome = reconciler.rename(target, "B (fixed)").await.unwrap();
    assert!(matches!(outcome, EditOutcome::Applied(ref r) if r.text == "B (fixed)"));

    let current = app.state.results().list(&image_ref);
    assert_eq!(current[1].text, "B (fixed)");
    assert_eq!(current[2].text, "Berlin");
    assert_eq!(reconciler.view(), current.as_slice());
}

#[tokio::test]
async fn test_remove_undo_and_stale_target() {
    let app = TestApp::new().await;
    let image_ref = app.upload("page.png", 1).await;
    let api = local(&app);
    PollingClient::new(api.clone(), Duration::from_millis(5))
        .run(&image_ref)
        .await
        .unwrap();

    let mut reconciler = EditReconciler::new(api.clone(), 10);
    reconciler.open(image_ref.clone()).await.unwrap();
    let before = reconciler.view().to_vec();

    let target = reconciler.hit(Point::new(70, 60)).unwrap().identity();
    reconciler.remove(target).await.unwrap();
    assert_eq!(
        app.state.results().list(&image_ref)[3].status,
        RegionStatus::Removed
    );

    assert!(matches!(reconciler.undo().await.unwrap(), UndoOutcome::Restored(_)));
    assert_eq!(app.state.results().list(&image_ref), before);

    // target gone before the edit lands
    app.state.results().commit(&image_ref, Vec::new()).await;
    assert_eq!(reconciler.remove(target).await.unwrap(), EditOutcome::Stale);
    assert!(reconciler.view().is_empty());
    assert!(reconciler.undo_stack().is_empty());
}

#[tokio::test]
async fn test_remove_stays_undoable_when_results_dir_is_gone() {
    let app = TestApp::new().await;
    let image_ref = app.upload("page.png", 1).await;
    let api = local(&app);
    PollingClient::new(api.clone(), Duration::from_millis(5))
        .run(&image_ref)
        .await
        .unwrap();

    let mut reconciler = EditReconciler::new(api.clone(), 10);
    reconciler.open(image_ref.clone()).await.unwrap();
    let before = reconciler.view().to_vec();

    std::fs::remove_dir_all(app.state.config().storage.results_dir()).unwrap();

    let target = before[0].identity();
    let outcome = reconciler.remove(target).await.unwrap();
    assert!(matches!(outcome, EditOutcome::Applied(_)));
    assert_eq!(
        app.state.results().list(&image_ref)[0].status,
        RegionStatus::Removed
    );
    assert_eq!(reconciler.undo_stack().len(), 1);

    assert!(matches!(reconciler.undo().await.unwrap(), UndoOutcome::Restored(_)));
    assert_eq!(app.state.results().list(&image_ref), before);
}

#[tokio::test]
async fn test_clean_keeps_text_over_confidence() {
    let app = TestApp::new().await;
    let image_ref = app.upload("page.png", 1).await;
    let api = local(&app);
    PollingClient::new(api.clone(), Duration::from_millis(5))
        .run(&image_ref)
        .await
        .unwrap();

    let mut reconciler = EditReconciler::new(api, 10);
    reconciler.open(image_ref.clone()).await.unwrap();
    let once = reconciler.clean().await.unwrap().to_vec();
    let active: Vec<&str> = once
        .iter()
        .filter(|r| r.is_active())
        .map(|r| r.text.as_str())
        .collect();
    assert_eq!(active, vec!["A", "Berlin"]);

    let twice = reconciler.clean().await.unwrap().to_vec();
    assert_eq!(once, twice);
}

#[tokio::test]
async fn test_http_client_end_to_end() {
    let app = TestApp::new().await;
    let image_ref = app.upload("page.png", 1).await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = routes::router(app.state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let http = HttpApi::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap();
    let api: Arc<dyn ReviewApi> = Arc::new(http);

    let outcome = PollingClient::new(api.clone(), Duration::from_millis(10))
        .run(&image_ref)
        .await
        .unwrap();
    assert_eq!(outcome.state(), JobState::Done);
    assert_eq!(outcome.results.as_ref().unwrap().len(), 4);

    let mut reconciler = EditReconciler::new(api.clone(), 10);
    reconciler.open(image_ref.clone()).await.unwrap();
    let target = reconciler.view()[3].identity();
    assert!(matches!(
        reconciler.rename(target, "Hamburg").await.unwrap(),
        EditOutcome::Applied(_)
    ));
    reconciler.remove(target).await.unwrap();
    assert_eq!(reconciler.view()[3].status, RegionStatus::Removed);
    assert!(matches!(reconciler.undo().await.unwrap(), UndoOutcome::Restored(_)));
    assert_eq!(reconciler.view()[3].text, "Hamburg");
    assert_eq!(reconciler.view()[3].status, RegionStatus::Active);

    let err = api
        .rename(&image_ref, 42, "nope")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotFound(_)));

    let unknown = api.status(Uuid::new_v4()).await.unwrap();
    assert_eq!(unknown.state, JobState::Unknown);
}

#[tokio::test]
async fn test_http_client_transport_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut config = Config::default().client;
    config.base_url = format!("http://{}", addr);
    config.request_timeout_secs = 2;
    let api = HttpApi::from_config(&config).unwrap();
    let err = api.status(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}
