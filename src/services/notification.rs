//! Notification dispatch
//!
//! Decisions notify the applicant. Delivery (email, SMS) belongs to a
//! collaborator behind the `Notifier` trait; the engine fires the side
//! effect exactly once per decided application and never fails the
//! decision on delivery errors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

/// What happened to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ApplicationApproved,
    ApplicationRejected,
    ManagerLinkApproved,
}

/// Payload handed to the delivery collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub recipient_email: String,
    pub business_name: String,
    /// Present on rejections; surfaced verbatim to the applicant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Delivery collaborator. Trait-based to allow mocking in tests.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, kind: NotificationKind, payload: &NotificationPayload) -> Result<(), String>;
}

/// Delivery stub that writes payloads to the log. Stands in for the real
/// email/SMS collaborator in development.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, kind: NotificationKind, payload: &NotificationPayload) -> Result<(), String> {
        let body = serde_json::to_string(payload).map_err(|e| e.to_string())?;
        info!(kind = ?kind, payload = %body, "notification dispatched");
        Ok(())
    }
}
