//! Server status as reported by the manager backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last observed state of the managed nginx process.
///
/// Replaced wholesale on every update; fields missing from a payload fall
/// back to their stopped/unknown defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerStatus {
    pub is_running: bool,
    /// 0 when stopped
    pub pid: i64,
    pub uptime: String,
    pub version: String,
    pub config_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Display tone for a status, mirrors the dashboard's color coding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Success,
    Error,
}

impl StatusTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusTone::Success => "success",
            StatusTone::Error => "error",
        }
    }
}

impl ServerStatus {
    pub fn status_text(&self) -> &'static str {
        if self.is_running {
            "Running"
        } else {
            "Stopped"
        }
    }

    pub fn tone(&self) -> StatusTone {
        if self.is_running {
            StatusTone::Success
        } else {
            StatusTone::Error
        }
    }

    /// True when the fields a dashboard watches differ
    pub fn differs_from(&self, other: &ServerStatus) -> bool {
        self.is_running != other.is_running
            || self.pid != other.pid
            || self.config_valid != other.config_valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_stopped() {
        let status = ServerStatus::default();
        assert!(!status.is_running);
        assert_eq!(status.pid, 0);
        assert!(status.updated_at.is_none());
        assert_eq!(status.status_text(), "Stopped");
        assert_eq!(status.tone(), StatusTone::Error);
    }

    #[test]
    fn test_parse_backend_payload() {
        let json = r#"{
            "is_running": true,
            "pid": 1234,
            "uptime": "running",
            "version": "nginx/1.25.3",
            "config_valid": true,
            "updated_at": "2024-05-01T08:30:00.123456789+08:00"
        }"#;
        let status: ServerStatus = serde_json::from_str(json).unwrap();

        assert!(status.is_running);
        assert_eq!(status.pid, 1234);
        assert_eq!(status.version, "nginx/1.25.3");
        assert_eq!(status.status_text(), "Running");
        assert_eq!(status.tone().as_str(), "success");
        let updated = status.updated_at.unwrap();
        assert_eq!(updated.to_rfc3339(), "2024-05-01T00:30:00.123456789+00:00");
    }

    #[test]
    fn test_partial_payload_uses_defaults() {
        let status: ServerStatus =
            serde_json::from_str(r#"{"is_running": true, "updated_at": null}"#).unwrap();
        assert!(status.is_running);
        assert_eq!(status.pid, 0);
        assert!(status.version.is_empty());
        assert!(status.updated_at.is_none());
    }

    #[test]
    fn test_last_error_omitted_when_absent() {
        let json = serde_json::to_value(ServerStatus::default()).unwrap();
        assert!(json.get("last_error").is_none());
        assert_eq!(json["is_running"], false);
    }

    #[test]
    fn test_differs_from_ignores_timestamps() {
        let a = ServerStatus {
            is_running: true,
            pid: 10,
            ..Default::default()
        };
        let mut b = a.clone();
        b.updated_at = Some(Utc::now());
        b.uptime = "2h".to_string();
        assert!(!a.differs_from(&b));

        b.pid = 11;
        assert!(a.differs_from(&b));
    }
}
