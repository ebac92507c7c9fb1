//! REST client tests against a mock manager backend

use ngxdash::api::{ApiClient, Lifecycle};
use ngxdash::config::ServerConfig;
use ngxdash::error::{ClientError, ErrorKind};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Client scoped to the mock server's `/api` root
fn client_for(server: &MockServer) -> ApiClient {
    let config = ServerConfig {
        base_url: server.uri(),
        ..Default::default()
    };
    ApiClient::new(&config).unwrap()
}

// ============================================================================
// nginx process
// ============================================================================

#[tokio::test]
async fn test_status_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/nginx/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "is_running": true,
                "pid": 1234,
                "uptime": "running",
                "version": "1.25.3",
                "config_valid": true,
                "updated_at": "2024-03-01T12:00:00Z"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let envelope = client_for(&server).status().await.unwrap();
    assert!(envelope.success);
    let status = envelope.data.unwrap();
    assert!(status.is_running);
    assert_eq!(status.pid, 1234);
    assert_eq!(status.version, "1.25.3");
}

#[tokio::test]
async fn test_lifecycle_posts_to_action_path() {
    let server = MockServer::start().await;
    for action in ["start", "stop", "restart", "reload"] {
        Mock::given(method("POST"))
            .and(path(format!("/api/nginx/{}", action)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": format!("nginx {} ok", action)
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = client_for(&server);
    for action in [
        Lifecycle::Start,
        Lifecycle::Stop,
        Lifecycle::Restart,
        Lifecycle::Reload,
    ] {
        let envelope = client.lifecycle(action).await.unwrap();
        assert!(envelope.success);
        assert_eq!(
            envelope.message.as_deref(),
            Some(format!("nginx {} ok", action.as_str()).as_str())
        );
    }
}

#[tokio::test]
async fn test_rejection_with_error_status_is_still_an_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/nginx/start"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "success": false,
            "message": "port in use"
        })))
        .mount(&server)
        .await;

    let envelope = client_for(&server).lifecycle(Lifecycle::Start).await.unwrap();
    assert!(!envelope.success);
    assert_eq!(envelope.message_or("fallback"), "port in use");
}

#[tokio::test]
async fn test_error_status_without_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/nginx/status"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let err = client_for(&server).status().await.unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 502 }));
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.to_string(), "request failed with status code 502");
}

#[tokio::test]
async fn test_unreachable_backend_is_a_transport_error() {
    // Bind and drop a listener to get a port nobody serves
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = ServerConfig {
        base_url: format!("http://127.0.0.1:{}", port),
        ..Default::default()
    };

    let err = ApiClient::new(&config).unwrap().status().await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
    assert_eq!(err.kind(), ErrorKind::Transport);
}

// ============================================================================
// config file
// ============================================================================

#[tokio::test]
async fn test_get_and_save_config() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": "worker_processes auto;\n"
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/config"))
        .and(body_json(json!({ "content": "worker_processes 2;\n" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Configuration saved successfully"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(client.get_config().await.unwrap(), "worker_processes auto;\n");
    assert_eq!(
        client.save_config("worker_processes 2;\n").await.unwrap(),
        "Configuration saved successfully"
    );
}

#[tokio::test]
async fn test_save_rejected_config() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "message": "Invalid configuration: unexpected \"}\""
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).save_config("}").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Rejected);
    assert_eq!(err.to_string(), "Invalid configuration: unexpected \"}\"");
}

#[tokio::test]
async fn test_validate_reports_invalid_config_as_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "valid": false,
            "message": "nginx: [emerg] unknown directive \"wrker_processes\""
        })))
        .mount(&server)
        .await;

    let report = client_for(&server)
        .validate_config("wrker_processes 1;")
        .await
        .unwrap();
    assert!(!report.valid);
    assert!(report.message.contains("unknown directive"));
}

#[tokio::test]
async fn test_validate_valid_config_without_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "valid": true
        })))
        .mount(&server)
        .await;

    let report = client_for(&server).validate_config("events {}").await.unwrap();
    assert!(report.valid);
    assert_eq!(report.message, "Configuration is valid");
}

#[tokio::test]
async fn test_validate_request_failure_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config/validate"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "message": "Invalid request body"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .validate_config("events {}")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Rejected);
    assert_eq!(err.to_string(), "Invalid request body");
}

#[tokio::test]
async fn test_get_template() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/config/template"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": "events {\n    worker_connections 1024;\n}\n"
        })))
        .mount(&server)
        .await;

    let template = client_for(&server).get_template().await.unwrap();
    assert!(template.starts_with("events {"));
}

// ============================================================================
// backups
// ============================================================================

#[tokio::test]
async fn test_list_backups() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/backup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{
                "id": "nginx_conf_20240301_120000.backup",
                "filename": "nginx_conf_20240301_120000.backup",
                "created_at": "2024-03-01T12:00:00Z",
                "size": 2048
            }]
        })))
        .mount(&server)
        .await;

    let backups = client_for(&server).list_backups().await.unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].id, "nginx_conf_20240301_120000.backup");
    assert_eq!(backups[0].size, 2048);
}

#[tokio::test]
async fn test_list_backups_null_data_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/backup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": null
        })))
        .mount(&server)
        .await;

    assert!(client_for(&server).list_backups().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restore_and_delete_backup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/backup/restore/nginx_conf_1.backup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Backup restored successfully"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/backup/nginx_conf_1.backup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(
        client.restore_backup("nginx_conf_1.backup").await.unwrap(),
        "Backup restored successfully"
    );
    assert_eq!(
        client.delete_backup("nginx_conf_1.backup").await.unwrap(),
        "Backup deleted"
    );
}

#[tokio::test]
async fn test_restore_missing_backup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/backup/restore/gone.backup"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "success": false,
            "message": "backup file not found"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .restore_backup("gone.backup")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Rejected);
    assert_eq!(err.to_string(), "backup file not found");
}

#[tokio::test]
async fn test_empty_backup_id_never_reaches_the_backend() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client_for(&server).delete_backup("").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Local);
}

#[tokio::test]
async fn test_download_backup_returns_raw_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/backup/download/nginx_conf_1.backup"))
        .respond_with(ResponseTemplate::new(200).set_body_string("worker_processes 1;\n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/backup/download/gone.backup"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "message": "backup file not found"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let bytes = client.download_backup("nginx_conf_1.backup").await.unwrap();
    assert_eq!(bytes, b"worker_processes 1;\n");

    let err = client.download_backup("gone.backup").await.unwrap_err();
    assert_eq!(err.to_string(), "backup file not found");
}
