//! Transient user-facing notices ("toasts").
//!
//! Commands report their outcome through the [`Notifier`]; front ends
//! subscribe and render each [`Notice`] for its `duration`.

use std::time::Duration;

use serde::{Serialize, Serializer};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use unimart_shared::constants::TOAST_DURATION;

const NOTICE_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    #[serde(rename = "durationMs", serialize_with = "millis")]
    pub duration: Duration,
}

fn millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTICE_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn notify(&self, kind: NoticeKind, message: impl Into<String>) {
        let notice = Notice {
            kind,
            message: message.into(),
            duration: TOAST_DURATION,
        };
        match kind {
            NoticeKind::Error => warn!(message = %notice.message, "notice"),
            _ => debug!(?kind, message = %notice.message, "notice"),
        }
        // Nobody listening is not an error.
        let _ = self.tx.send(notice);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(NoticeKind::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(NoticeKind::Error, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(NoticeKind::Info, message);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_notices() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        notifier.success("Product added successfully!");

        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.kind, NoticeKind::Success);
        assert_eq!(notice.duration, Duration::from_millis(2600));
        assert_eq!(
            serde_json::to_value(&notice).unwrap(),
            serde_json::json!({
                "kind": "success",
                "message": "Product added successfully!",
                "durationMs": 2600
            })
        );
    }

    #[test]
    fn notify_without_subscribers() {
        Notifier::new().error("nobody hears this");
    }
}
