// In-process notification bus: one unbounded channel per subscribed user.
// Messages to users without a live subscription are dropped, matching the
// fire-and-forget semantics of a UI notification bus.

use crate::core::notify::{Notification, Notifier, NotifyError};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

pub struct BusNotifier {
    channels: DashMap<u64, mpsc::UnboundedSender<Notification>>,
}

impl BusNotifier {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Opens (or replaces) the user's channel and returns the receiving end.
    pub fn subscribe(&self, user_id: u64) -> mpsc::UnboundedReceiver<Notification> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.insert(user_id, tx);
        rx
    }
}

impl Default for BusNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for BusNotifier {
    async fn notify(&self, user_id: u64, notification: Notification) -> Result<(), NotifyError> {
        let Some(sender) = self.channels.get(&user_id).map(|tx| tx.value().clone()) else {
            tracing::debug!(user_id, "No live channel for user, dropping notification");
            return Ok(());
        };

        if sender.send(notification).is_err() {
            // Receiver is gone; forget the stale channel.
            self.channels.remove(&user_id);
            return Err(NotifyError::ChannelClosed(user_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::notify::NotificationKind;

    #[tokio::test]
    async fn test_delivers_to_the_subscribed_user() {
        let bus = BusNotifier::new();
        let mut rx = bus.subscribe(7);

        bus.notify(7, Notification::sync_success("Listo"))
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, NotificationKind::Success);
        assert_eq!(received.message, "Listo");
    }

    #[tokio::test]
    async fn test_unsubscribed_user_is_a_quiet_drop() {
        let bus = BusNotifier::new();
        bus.notify(99, Notification::sync_success("Listo"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_receiver_reports_closed() {
        let bus = BusNotifier::new();
        let rx = bus.subscribe(7);
        drop(rx);

        let err = bus
            .notify(7, Notification::sync_failure("boom"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::ChannelClosed(7)));
    }
}
