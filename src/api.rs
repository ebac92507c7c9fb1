//! HTTP client for the manager REST API
//!
//! Every endpoint answers with a `{success, message, data}` envelope. The
//! client returns that envelope to the caller and logs any request that
//! fails before it produced one.

use crate::config::ServerConfig;
use crate::error::{ClientError, Result};
use crate::status::ServerStatus;
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Response envelope used by every backend endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
    /// Only present on config validation responses
    pub valid: Option<bool>,
}

impl<T> Envelope<T> {
    /// Message supplied by the backend, or `fallback` when it sent none
    pub fn message_or(&self, fallback: &str) -> String {
        match self.message.as_deref() {
            Some(msg) if !msg.is_empty() => msg.to_string(),
            _ => fallback.to_string(),
        }
    }

    /// Turn `success: false` into [`ClientError::Rejected`]
    pub fn into_result(self) -> Result<Option<T>> {
        if self.success {
            Ok(self.data)
        } else {
            Err(ClientError::rejected(self.message_or("request was rejected")))
        }
    }
}

/// A lifecycle action on the managed process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Start,
    Stop,
    Restart,
    Reload,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Start => "start",
            Lifecycle::Stop => "stop",
            Lifecycle::Restart => "restart",
            Lifecycle::Reload => "reload",
        }
    }

    /// Message used when the backend fails without explaining why
    pub fn failure_message(&self) -> &'static str {
        match self {
            Lifecycle::Start => "Failed to start nginx",
            Lifecycle::Stop => "Failed to stop nginx",
            Lifecycle::Restart => "Failed to restart nginx",
            Lifecycle::Reload => "Failed to reload nginx configuration",
        }
    }
}

/// One stored config backup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub id: String,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub size: u64,
}

/// Outcome of a config validation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub message: String,
}

#[derive(Serialize)]
struct ContentBody<'a> {
    content: &'a str,
}

/// Base-URL-scoped HTTP client with a fixed timeout
#[derive(Debug, Clone)]
pub struct ApiClient {
    root: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            root: config.api_root(),
            http,
        })
    }

    /// Root every request path is appended to, e.g. `http://host:8080/api`
    pub fn root(&self) -> &str {
        &self.root
    }

    async fn send<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Envelope<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let result = self.send_inner(method.clone(), path, body).await;
        if let Err(e) = &result {
            error!(%method, path, kind = e.kind().as_str(), error = %e, "API request failed");
        }
        result
    }

    async fn send_inner<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Envelope<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.root, path);
        debug!(%method, %url, "API request");

        let mut req = self.http.request(method, &url);
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        decode_envelope(status, &bytes)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>> {
        self.send::<T, ()>(Method::GET, path, None).await
    }

    // ------------------------------------------------------------------
    // nginx process
    // ------------------------------------------------------------------

    /// GET /nginx/status
    pub async fn status(&self) -> Result<Envelope<ServerStatus>> {
        self.get("/nginx/status").await
    }

    /// POST /nginx/{start,stop,restart,reload}
    pub async fn lifecycle(&self, action: Lifecycle) -> Result<Envelope<serde_json::Value>> {
        let path = format!("/nginx/{}", action.as_str());
        self.send::<_, ()>(Method::POST, &path, None).await
    }

    // ------------------------------------------------------------------
    // config file
    // ------------------------------------------------------------------

    /// GET /config
    pub async fn get_config(&self) -> Result<String> {
        let envelope: Envelope<String> = self.get("/config").await?;
        Ok(envelope.into_result()?.unwrap_or_default())
    }

    /// PUT /config, returns the backend's confirmation message
    pub async fn save_config(&self, content: &str) -> Result<String> {
        let envelope: Envelope<serde_json::Value> = self
            .send(Method::PUT, "/config", Some(&ContentBody { content }))
            .await?;
        let message = envelope.message_or("Configuration saved");
        envelope.into_result()?;
        Ok(message)
    }

    /// POST /config/validate
    ///
    /// An invalid config is a normal outcome, not an error. A failure that
    /// carries no `valid` verdict is returned as [`ClientError::Rejected`].
    pub async fn validate_config(&self, content: &str) -> Result<ValidationReport> {
        let envelope: Envelope<serde_json::Value> = self
            .send(Method::POST, "/config/validate", Some(&ContentBody { content }))
            .await?;
        let valid = match envelope.valid {
            Some(valid) => valid,
            // Bad request or the test run itself failed; no verdict on the config
            None if !envelope.success => {
                return Err(ClientError::rejected(
                    envelope.message_or("Configuration validation failed"),
                ))
            }
            None => true,
        };
        let fallback = if valid {
            "Configuration is valid"
        } else {
            "Configuration is invalid"
        };
        Ok(ValidationReport {
            valid,
            message: envelope.message_or(fallback),
        })
    }

    /// GET /config/template
    pub async fn get_template(&self) -> Result<String> {
        let envelope: Envelope<String> = self.get("/config/template").await?;
        Ok(envelope.into_result()?.unwrap_or_default())
    }

    // ------------------------------------------------------------------
    // backups
    // ------------------------------------------------------------------

    /// GET /backup
    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        // The backend sends `data: null` when the backup dir holds no files
        let envelope: Envelope<Vec<BackupInfo>> = self.get("/backup").await?;
        Ok(envelope.into_result()?.unwrap_or_default())
    }

    /// POST /backup/restore/{id}
    pub async fn restore_backup(&self, id: &str) -> Result<String> {
        let path = format!("/backup/restore/{}", encode_id(id)?);
        let envelope: Envelope<serde_json::Value> =
            self.send::<_, ()>(Method::POST, &path, None).await?;
        let message = envelope.message_or("Backup restored");
        envelope.into_result()?;
        Ok(message)
    }

    /// DELETE /backup/{id}
    pub async fn delete_backup(&self, id: &str) -> Result<String> {
        let path = format!("/backup/{}", encode_id(id)?);
        let envelope: Envelope<serde_json::Value> =
            self.send::<_, ()>(Method::DELETE, &path, None).await?;
        let message = envelope.message_or("Backup deleted");
        envelope.into_result()?;
        Ok(message)
    }

    /// GET /backup/download/{id}, raw file contents
    pub async fn download_backup(&self, id: &str) -> Result<Vec<u8>> {
        let path = format!("/backup/download/{}", encode_id(id)?);
        let url = format!("{}{}", self.root, path);

        let result = self.download_inner(&url).await;
        if let Err(e) = &result {
            error!(method = "GET", path, kind = e.kind().as_str(), error = %e, "API request failed");
        }
        result
    }

    async fn download_inner(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if status.is_success() {
            return Ok(bytes.to_vec());
        }

        // Errors still come back as an envelope
        match serde_json::from_slice::<Envelope<serde_json::Value>>(&bytes) {
            Ok(envelope) => Err(ClientError::rejected(
                envelope.message_or("backup download failed"),
            )),
            Err(_) => Err(ClientError::Status {
                status: status.as_u16(),
            }),
        }
    }
}

/// Decode a response body as an envelope.
///
/// The backend reports failures as `{success: false, message}` with a 4xx/5xx
/// status, so a decodable envelope wins over the HTTP status code.
fn decode_envelope<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<Envelope<T>> {
    match serde_json::from_slice::<Envelope<T>>(body) {
        Ok(envelope) => Ok(envelope),
        Err(_) if !status.is_success() => Err(ClientError::Status {
            status: status.as_u16(),
        }),
        Err(e) => Err(ClientError::Decode(e.to_string())),
    }
}

fn encode_id(id: &str) -> Result<String> {
    if id.trim().is_empty() {
        return Err(ClientError::InvalidArgument(
            "backup ID is required".to_string(),
        ));
    }
    Ok(urlencoding::encode(id).into_owned())
}
