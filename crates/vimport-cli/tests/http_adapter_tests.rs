//! Tests of the HTTP adapter against a mock ingestion service

#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use vimport_cli::adapter::http::{local_camera_id, HttpSettings};
use vimport_cli::adapter::{HttpAdapter, RemoteAdapter, ShardManifest, UploadRequest};
use vimport_cli::error::CliError;
use vimport_common::{FileRecord, Location};
use wiremock::{
    matchers::{body_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn settings(server: &MockServer) -> HttpSettings {
    HttpSettings {
        server: server.uri(),
        post_url: format!("{}/upload/{{filename}}", server.uri()),
        auth_token: Some("abc".to_string()),
        device_id: Some("dev-1".to_string()),
        user_id: Some("user-1".to_string()),
    }
}

fn adapter(server: &MockServer) -> HttpAdapter {
    HttpAdapter::new(settings(server), Duration::from_secs(5)).unwrap()
}

// ============================================================================
// Camera registration
// ============================================================================

#[tokio::test]
async fn test_register_camera() {
    let mock_server = MockServer::start().await;
    let local_id = local_camera_id("porch");

    Mock::given(method("POST"))
        .and(path("/api/cameras/discovered"))
        .and(header("Authorization", "token abc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ local_id.clone(): {"camera_id": "remote-7"} })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let camera = adapter(&mock_server)
        .register_camera("porch", "localhost", 8080)
        .await
        .unwrap();

    assert_eq!(camera.camera_id, local_id);
    assert_eq!(camera.extra["camera_id"], "remote-7");

    let requests = mock_server.received_requests().await.unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let entry = &payload[&local_id];
    assert_eq!(entry["name"], "porch");
    assert_eq!(entry["acquisition_method"], "batch");
    assert_eq!(entry["device_id_discovering"], "dev-1");
    assert_eq!(entry["user_id"], "user-1");
    assert_eq!(entry["is_authenticated"], false);
}

#[tokio::test]
async fn test_register_camera_without_id_in_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/cameras/discovered"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"other": {}})))
        .mount(&mock_server)
        .await;

    let result = adapter(&mock_server).register_camera("porch", "localhost", 8080).await;
    assert!(matches!(result, Err(CliError::Registration { .. })));
}

#[tokio::test]
async fn test_register_camera_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/cameras/discovered"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let result = adapter(&mock_server).register_camera("porch", "localhost", 8080).await;
    assert!(matches!(result, Err(CliError::Http(_))));
}

// ============================================================================
// Job assignment
// ============================================================================

#[tokio::test]
async fn test_assign_job_orders_shards_by_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/jobs"))
        .and(body_json(json!({
            "device_id": "dev-1",
            "item_count": 10,
            "item_average_size_bytes": 1234
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": "job-42",
            "shard_map": {
                "sB": {"item_count": 6, "upload_url": "http://up/sB"},
                "sA": {"item_count": 4, "upload_url": "http://up/sA"}
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let job = adapter(&mock_server).assign_job(10, 1234).await.unwrap().unwrap();

    assert_eq!(job.job_id, "job-42");
    let shards: Vec<(&str, usize)> = job
        .shards
        .iter()
        .map(|s| (s.shard_id.as_str(), s.item_count))
        .collect();
    assert_eq!(shards, vec![("sA", 4), ("sB", 6)]);
    assert_eq!(job.capacity(), 10);
}

#[tokio::test]
async fn test_assign_job_bad_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let result = adapter(&mock_server).assign_job(1, 1).await;
    assert!(matches!(result, Err(CliError::Adapter(_))));
}

// ============================================================================
// Upload
// ============================================================================

struct Video {
    _dir: TempDir,
    path: PathBuf,
}

fn video(bytes: &[u8]) -> Video {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("porch-clip-1489000000.mp4");
    std::fs::write(&path, bytes).unwrap();
    Video { _dir: dir, path }
}

#[tokio::test]
async fn test_upload_video_posts_file_with_query() {
    let mock_server = MockServer::start().await;
    let file = video(b"mp4 bytes");
    let location = Location::new(Some(7.5), Some(-134.25));

    Mock::given(method("POST"))
        .and(path("/upload/porch.2017.k1.mp4"))
        .and(query_param("camera_id", "cam-1"))
        .and(query_param("timestamp", "2017-03-08T19:06:40.000"))
        .and(query_param("hash", "k1"))
        .and(query_param("access_token", "abc"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = UploadRequest {
        camera_name: "porch",
        camera_id: Some("cam-1"),
        path: &file.path,
        timestamp: "2017-03-08T19:06:40.000",
        location: &location,
        key: "k1",
        given_name: "porch.2017.k1.mp4",
    };
    assert!(adapter(&mock_server).upload_video(&request).await.unwrap());

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests[0].body, b"mp4 bytes");
    let location_param = requests[0]
        .url
        .query_pairs()
        .find(|(k, _)| k == "location")
        .map(|(_, v)| v.to_string())
        .unwrap();
    let location_json: serde_json::Value = serde_json::from_str(&location_param).unwrap();
    assert_eq!(location_json["location"]["lat"], 7.5);
}

#[tokio::test]
async fn test_upload_video_rejected() {
    let mock_server = MockServer::start().await;
    let file = video(b"mp4 bytes");
    let location = Location::unknown();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let request = UploadRequest {
        camera_name: "porch",
        camera_id: None,
        path: &file.path,
        timestamp: "t",
        location: &location,
        key: "k1",
        given_name: "g.mp4",
    };
    assert!(!adapter(&mock_server).upload_video(&request).await.unwrap());
}

#[tokio::test]
async fn test_upload_timeout_is_an_error() {
    let mock_server = MockServer::start().await;
    let file = video(b"slow");
    let location = Location::unknown();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let adapter = HttpAdapter::new(settings(&mock_server), Duration::from_millis(200)).unwrap();
    let request = UploadRequest {
        camera_name: "porch",
        camera_id: Some("cam-1"),
        path: &file.path,
        timestamp: "t",
        location: &location,
        key: "k1",
        given_name: "g.mp4",
    };
    assert!(adapter.upload_video(&request).await.is_err());
}

// ============================================================================
// Finalization
// ============================================================================

#[tokio::test]
async fn test_finalize_job_puts_hash_map_to_shard_url() {
    let mock_server = MockServer::start().await;

    let records = vec![
        FileRecord::new("k1", "/v/porch-a-1.mp4", "porch", "t1", "d").with_size(2_000_000),
        FileRecord::new("k2", "/v/porch-b-2.mp4", "porch", "t2", "d").with_size(500_000),
    ];
    let manifest = ShardManifest::new("job-42", "sA", format!("{}/shards/sA", mock_server.uri()), records);

    Mock::given(method("PUT"))
        .and(path("/shards/sA"))
        .and(body_json(json!({
            "job_id": "job-42",
            "shard_id": "sA",
            "item_count": 2,
            "hash_map": {
                "k1": {"original_filename": "/v/porch-a-1.mp4", "size_MB": 2.0},
                "k2": {"original_filename": "/v/porch-b-2.mp4", "size_MB": 0.5}
            }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    adapter(&mock_server).finalize_job(&manifest).await.unwrap();
}
