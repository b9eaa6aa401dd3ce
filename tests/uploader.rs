mod common;

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{test_config, UPLOAD_PATH};
use startup_finder_sync::error::UploadError;
use startup_finder_sync::services::{BatchUploader, ChunkOutcome};
use startup_finder_sync::Record;

fn records(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            Record::new([
                ("Name", format!("startup-{i}")),
                ("Website", format!("https://finder.test/company_page/{i}")),
            ])
        })
        .collect()
}

async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .expect("request recording enabled")
        .iter()
        .map(|r| r.body_json::<Value>().expect("json body"))
        .collect()
}

#[tokio::test]
async fn uploads_in_chunks_of_ten_preserving_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .expect(3)
        .mount(&server)
        .await;

    let uploader = BatchUploader::new(&test_config(&server.uri()).upload).unwrap();
    let input = records(23);
    let report = uploader.upload(&input).await;

    assert!(report.is_success());
    assert_eq!(report.total_chunks, 3);
    assert_eq!(report.uploaded_records(), 23);

    let bodies = request_bodies(&server).await;
    let sizes: Vec<usize> = bodies
        .iter()
        .map(|b| b["records"].as_array().unwrap().len())
        .collect();
    assert_eq!(sizes, vec![10, 10, 3]);

    let names: Vec<String> = bodies
        .iter()
        .flat_map(|b| b["records"].as_array().unwrap().clone())
        .map(|r| r["fields"]["Name"].as_str().unwrap().to_string())
        .collect();
    let expected: Vec<String> = (0..23).map(|i| format!("startup-{i}")).collect();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn request_body_wraps_records_under_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(body_json(json!({"records": [
            {"fields": {"Name": "startup-0", "Website": "https://finder.test/company_page/0"}}
        ]})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let uploader = BatchUploader::new(&test_config(&server.uri()).upload).unwrap();
    assert!(uploader.upload(&records(1)).await.is_success());
}

#[tokio::test]
async fn first_rejected_chunk_stops_the_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": "INVALID_REQUEST"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let uploader = BatchUploader::new(&test_config(&server.uri()).upload).unwrap();
    let report = uploader.upload(&records(15)).await;

    assert!(!report.is_success());
    assert_eq!(report.chunks.len(), 1, "第二批不应被发送");
    let failed = report.failure().expect("failed chunk");
    assert_eq!(failed.index, 1);
    match &failed.outcome {
        ChunkOutcome::Failed(UploadError::Rejected { status, body }) => {
            assert_eq!(*status, 500);
            assert!(body.contains("INVALID_REQUEST"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn failure_after_a_successful_chunk_keeps_the_earlier_chunk() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(422).set_body_string("too many fields"))
        .mount(&server)
        .await;

    let uploader = BatchUploader::new(&test_config(&server.uri()).upload).unwrap();
    let report = uploader.upload(&records(25)).await;

    assert_eq!(report.succeeded_chunks(), 1);
    assert_eq!(report.uploaded_records(), 10);
    assert_eq!(report.failure().map(|c| c.index), Some(2));
    assert_eq!(request_bodies(&server).await.len(), 2);
}

#[tokio::test]
async fn uploading_the_same_page_twice_creates_duplicates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let uploader = BatchUploader::new(&test_config(&server.uri()).upload).unwrap();
    let page = records(4);
    assert!(uploader.upload(&page).await.is_success());
    assert!(uploader.upload(&page).await.is_success());

    // 不做去重：两次请求内容完全相同，远端会各自创建记录
    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0], bodies[1]);
}

#[tokio::test]
async fn empty_page_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let uploader = BatchUploader::new(&test_config(&server.uri()).upload).unwrap();
    let report = uploader.upload(&[]).await;
    assert!(report.is_success());
    assert_eq!(report.total_chunks, 0);
}

#[tokio::test]
async fn unreachable_endpoint_is_retried_then_reported() {
    let mut config = test_config("http://127.0.0.1:1").upload;
    config.max_attempts = 3;
    config.backoff_base_ms = 1;

    let uploader = BatchUploader::new(&config).unwrap();
    let report = uploader.upload(&records(2)).await;

    match report.failure().map(|c| &c.outcome) {
        Some(ChunkOutcome::Failed(UploadError::Transport { attempts, .. })) => {
            assert_eq!(*attempts, 3)
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn pauses_between_chunks_but_not_after_the_last() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri()).upload;
    config.chunk_delay_ms = 250;
    let uploader = BatchUploader::new(&config).unwrap();

    let started = Instant::now();
    let report = uploader.upload(&records(23)).await;
    let elapsed = started.elapsed();

    assert!(report.is_success());
    // 3 批之间只有 2 次停顿
    assert!(elapsed >= Duration::from_millis(500), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(750), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn single_chunk_is_not_followed_by_a_pause() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri()).upload;
    config.chunk_delay_ms = 1_000;
    let uploader = BatchUploader::new(&config).unwrap();

    let started = Instant::now();
    assert!(uploader.upload(&records(10)).await.is_success());
    assert!(started.elapsed() < Duration::from_millis(1_000));
}
