//! Status push channel
//!
//! One task per `connect()`. The task opens the WebSocket, applies status
//! frames to the store, and after the channel closes waits the reconnect
//! delay and opens it again if nothing else has reconnected in the meantime.
//! The task holds only a weak reference to the store and stops when the
//! owning [`PushHandle`] is closed or dropped.

use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::status::ServerStatus;
use crate::store::StoreInner;
use futures::StreamExt;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Frame type that carries a status snapshot
pub const STATUS_FRAME: &str = "status";

/// Where the channel lives and how long to wait before reconnecting
#[derive(Debug, Clone)]
pub struct PushSettings {
    pub url: String,
    pub reconnect_delay: Duration,
}

impl PushSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            url: status_channel_url(&config.server.base_url, &config.push.path)?,
            reconnect_delay: config.push.reconnect_delay(),
        })
    }
}

/// Derive the channel URL from the backend origin: `http` becomes `ws`,
/// `https` becomes `wss`, host and port are kept, the path is replaced.
pub fn status_channel_url(base_url: &str, path: &str) -> Result<String> {
    let mut url = Url::parse(base_url)
        .map_err(|e| ClientError::Config(format!("invalid base URL '{}': {}", base_url, e)))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ClientError::Config(format!(
                "unsupported scheme '{}' in base URL",
                other
            )))
        }
    };

    url.set_scheme(scheme)
        .map_err(|_| ClientError::Config(format!("cannot derive {} URL from '{}'", scheme, base_url)))?;
    url.set_path(path);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url.to_string())
}

/// Inbound frame: `{type, data}`
#[derive(Debug, Clone, Deserialize)]
pub struct PushFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl PushFrame {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// The carried status, or `None` for frames of any other type
    pub fn into_status(self) -> Result<Option<ServerStatus>> {
        if self.kind != STATUS_FRAME {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(self.data)?))
    }
}

/// Owned handle to a running channel task
pub(crate) struct PushHandle {
    shutdown: watch::Sender<bool>,
    _task: JoinHandle<()>,
}

impl PushHandle {
    /// Stop the task; a reconnect waiting on its delay is cancelled too
    pub(crate) fn close(self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for PushHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

pub(crate) fn spawn(store: Weak<StoreInner>, generation: u64, settings: PushSettings) -> PushHandle {
    let (shutdown, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(run(store, generation, settings, shutdown_rx));
    PushHandle {
        shutdown,
        _task: task,
    }
}

enum SessionEnd {
    Shutdown,
    Closed,
}

async fn run(
    store: Weak<StoreInner>,
    generation: u64,
    settings: PushSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if let SessionEnd::Shutdown = session(&store, generation, &settings.url, &mut shutdown).await {
            debug!(generation, "Status channel task stopped");
            return;
        }

        match store.upgrade() {
            Some(inner) => {
                inner.apply_if_current(generation, |state| state.connected = false);
            }
            None => return,
        }
        info!(
            url = %settings.url,
            delay_ms = settings.reconnect_delay.as_millis() as u64,
            "Status channel closed, scheduling reconnect"
        );

        tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => return,
            _ = tokio::time::sleep(settings.reconnect_delay) => {}
        }

        // Connectivity only comes back through connect(), which retires
        // this generation
        let Some(inner) = store.upgrade() else { return };
        if !inner.is_current(generation) {
            debug!(generation, "Superseded while waiting, skipping reconnect");
            return;
        }
        info!(url = %settings.url, "Reconnecting status channel");
    }
}

async fn session(
    store: &Weak<StoreInner>,
    generation: u64,
    url: &str,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let connected = tokio::select! {
        _ = wait_for_shutdown(shutdown) => return SessionEnd::Shutdown,
        result = tokio_tungstenite::connect_async(url) => result,
    };

    let mut ws = match connected {
        Ok((ws, _)) => ws,
        Err(e) => {
            // A failed handshake is an error followed by a close
            record_error(store, generation, ClientError::from(e));
            return SessionEnd::Closed;
        }
    };

    match store.upgrade() {
        Some(inner) => {
            inner.apply_if_current(generation, |state| state.connected = true);
        }
        None => return SessionEnd::Shutdown,
    }
    info!(url, "Status channel connected");

    loop {
        tokio::select! {
            _ = wait_for_shutdown(shutdown) => {
                let _ = ws.close(None).await;
                return SessionEnd::Shutdown;
            }
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_text(store, generation, &text),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => handle_text(store, generation, text),
                    Err(_) => warn!("Dropping non UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Status channel closed by server");
                    return SessionEnd::Closed;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    // Reconnect is driven by the close that follows
                    record_error(store, generation, ClientError::from(e));
                    return SessionEnd::Closed;
                }
                None => return SessionEnd::Closed,
            }
        }
    }
}

fn handle_text(store: &Weak<StoreInner>, generation: u64, text: &str) {
    let status = match PushFrame::parse(text).and_then(PushFrame::into_status) {
        Ok(Some(status)) => status,
        Ok(None) => {
            debug!("Ignoring non-status push frame");
            return;
        }
        Err(e) => {
            record_error(store, generation, e);
            return;
        }
    };

    if let Some(inner) = store.upgrade() {
        debug!(running = status.is_running, pid = status.pid, "Status pushed");
        inner.apply_if_current(generation, |state| state.status = status);
    }
}

fn record_error(store: &Weak<StoreInner>, generation: u64, error: ClientError) {
    warn!(kind = error.kind().as_str(), error = %error, "Status channel error");
    if let Some(inner) = store.upgrade() {
        inner.apply_if_current(generation, |state| state.error = Some(error.to_string()));
    }
}

/// Resolves once shutdown was requested or the handle is gone
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
