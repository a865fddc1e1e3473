// Ephemeral per-user notifications, delivered after a sync attempt.

use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Danger,
}

/// Payload pushed to the acting user's channel.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Failures stay on screen until dismissed; successes fade out.
    pub sticky: bool,
}

impl Notification {
    pub fn sync_success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            title: "Google Sheets".to_string(),
            message: message.into(),
            sticky: false,
        }
    }

    pub fn sync_failure(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Danger,
            title: "Error Google Sheets".to_string(),
            message: message.into(),
            sticky: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification channel closed for user {0}")]
    ChannelClosed(u64),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: u64, notification: Notification) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_is_sticky_and_success_is_not() {
        let ok = Notification::sync_success("Listo");
        assert_eq!(ok.kind, NotificationKind::Success);
        assert_eq!(ok.title, "Google Sheets");
        assert!(!ok.sticky);

        let bad = Notification::sync_failure("Sin credenciales");
        assert_eq!(bad.kind, NotificationKind::Danger);
        assert_eq!(bad.title, "Error Google Sheets");
        assert!(bad.sticky);
    }

    #[test]
    fn payload_serializes_with_lowercase_type() {
        let n = Notification::sync_failure("boom");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "danger");
        assert_eq!(json["sticky"], true);
    }
}
