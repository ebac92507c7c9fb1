//! Status store
//!
//! Holds the last status reported by the backend together with a busy flag,
//! the last error message and the push channel connectivity flag. The state
//! lives in a `watch` channel so views can subscribe and re-render on change.
//!
//! Both a fetch and a pushed frame fully replace the stored status. When the
//! two race, whichever resolves last wins; there is no sequence number to
//! tell which snapshot is newer.

use crate::api::{ApiClient, Envelope, Lifecycle};
use crate::config::Config;
use crate::error::Result;
use crate::push::{self, PushHandle, PushSettings};
use crate::status::{ServerStatus, StatusTone};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Snapshot of everything the store tracks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub status: ServerStatus,
    /// Operations currently holding the busy flag
    pub(crate) in_flight: usize,
    pub error: Option<String>,
    pub connected: bool,
}

impl StoreState {
    pub fn busy(&self) -> bool {
        self.in_flight > 0
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running
    }

    pub fn status_text(&self) -> &'static str {
        self.status.status_text()
    }

    pub fn tone(&self) -> StatusTone {
        self.status.tone()
    }
}

/// Result of a lifecycle action, meant for direct display to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[must_use]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

pub(crate) struct StoreInner {
    api: ApiClient,
    state: watch::Sender<StoreState>,
    push: PushSettings,
    channel: Mutex<Option<PushHandle>>,
    /// Bumped on every connect/disconnect; push tasks from an older
    /// generation may no longer touch the state
    generation: AtomicU64,
}

impl StoreInner {
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    /// Apply `f` only if `generation` is still the live channel.
    ///
    /// The generation check runs under the state lock, so a concurrent
    /// `disconnect()` either sees the write or overrides it.
    pub(crate) fn apply_if_current(
        &self,
        generation: u64,
        f: impl FnOnce(&mut StoreState),
    ) -> bool {
        self.state.send_if_modified(|state| {
            if !self.is_current(generation) {
                return false;
            }
            f(state);
            true
        })
    }
}

/// Explicitly constructed, cheaply cloneable store shared by all views
#[derive(Clone)]
pub struct StatusStore {
    inner: Arc<StoreInner>,
}

impl StatusStore {
    pub fn new(api: ApiClient, push: PushSettings) -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self {
            inner: Arc::new(StoreInner {
                api,
                state,
                push,
                channel: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api = ApiClient::new(&config.server)?;
        let push = PushSettings::from_config(config)?;
        Ok(Self::new(api, push))
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub fn push_settings(&self) -> &PushSettings {
        &self.inner.push
    }

    // ------------------------------------------------------------------
    // reads
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> StoreState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that is notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.inner.state.subscribe()
    }

    pub fn status(&self) -> ServerStatus {
        self.inner.state.borrow().status.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.state.borrow().busy()
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.borrow().error.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.borrow().is_running()
    }

    pub fn status_text(&self) -> &'static str {
        self.inner.state.borrow().status_text()
    }

    pub fn tone(&self) -> StatusTone {
        self.inner.state.borrow().tone()
    }

    // ------------------------------------------------------------------
    // requests
    // ------------------------------------------------------------------

    /// Mark an operation in flight and clear the previous error
    fn begin(&self) -> BusyGuard<'_> {
        self.inner.state.send_modify(|state| {
            state.in_flight += 1;
            state.error = None;
        });
        BusyGuard {
            state: &self.inner.state,
        }
    }

    fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.inner
            .state
            .send_modify(|state| state.error = Some(message));
    }

    /// Refresh the status from the backend.
    ///
    /// On failure the previous status is kept and the error message recorded.
    pub async fn fetch_status(&self) {
        let _busy = self.begin();

        match self.inner.api.status().await {
            Ok(Envelope {
                success: true,
                data: Some(status),
                ..
            }) => {
                debug!(running = status.is_running, pid = status.pid, "Status fetched");
                self.inner.state.send_modify(|state| state.status = status);
            }
            Ok(envelope) if envelope.success => {
                warn!("Status fetch returned no status");
                self.set_error("Failed to fetch status");
            }
            Ok(envelope) => {
                let message = envelope.message_or("Failed to fetch status");
                warn!(error = %message, "Status fetch rejected");
                self.set_error(message);
            }
            Err(e) => self.set_error(e.to_string()),
        }
    }

    pub async fn start(&self) -> ActionResult {
        self.run_action(Lifecycle::Start).await
    }

    pub async fn stop(&self) -> ActionResult {
        self.run_action(Lifecycle::Stop).await
    }

    pub async fn restart(&self) -> ActionResult {
        self.run_action(Lifecycle::Restart).await
    }

    pub async fn reload(&self) -> ActionResult {
        self.run_action(Lifecycle::Reload).await
    }

    /// Issue one lifecycle request; refresh the status only if it was acknowledged
    pub async fn run_action(&self, action: Lifecycle) -> ActionResult {
        let _busy = self.begin();

        let message = match self.inner.api.lifecycle(action).await {
            Ok(envelope) if envelope.success => {
                let message = envelope.message.unwrap_or_default();
                info!(action = action.as_str(), %message, "Lifecycle action acknowledged");
                self.fetch_status().await;
                return ActionResult::ok(message);
            }
            Ok(envelope) => envelope.message_or(action.failure_message()),
            Err(e) => e.to_string(),
        };

        warn!(action = action.as_str(), error = %message, "Lifecycle action failed");
        self.set_error(message.clone());
        ActionResult::failed(message)
    }

    // ------------------------------------------------------------------
    // push channel
    // ------------------------------------------------------------------

    /// Open the status push channel, closing any channel opened before.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let mut slot = self.inner.channel.lock();
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(previous) = slot.take() {
            debug!("Closing previous status channel");
            previous.close();
        }

        *slot = Some(push::spawn(
            Arc::downgrade(&self.inner),
            generation,
            self.inner.push.clone(),
        ));
    }

    /// Close the push channel and cancel any pending reconnect
    pub fn disconnect(&self) {
        let mut slot = self.inner.channel.lock();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);

        if let Some(handle) = slot.take() {
            handle.close();
            info!("Status channel disconnected");
        }
        self.inner
            .state
            .send_if_modified(|state| std::mem::replace(&mut state.connected, false));
    }
}

/// Releases the busy flag when dropped, on every exit path
struct BusyGuard<'a> {
    state: &'a watch::Sender<StoreState>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state
            .send_modify(|state| state.in_flight = state.in_flight.saturating_sub(1));
    }
}
