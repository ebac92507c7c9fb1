//! ngxdash - terminal dashboard for an nginx manager backend
//!
//! This library provides the client side of the manager:
//! - A REST client for the process, config and backup endpoints
//! - A status store mirroring the backend's view of the nginx process
//! - A live status channel that reconnects after the backend drops it
//! - A route table and terminal renderings of the dashboard pages

pub mod api;
pub mod config;
pub mod error;
pub mod push;
pub mod routes;
pub mod status;
pub mod store;
pub mod views;

pub use api::{ApiClient, BackupInfo, Lifecycle, ValidationReport};
pub use error::{ClientError, ErrorKind};
pub use status::{ServerStatus, StatusTone};
pub use store::{ActionResult, StatusStore, StoreState};
