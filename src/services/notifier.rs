//! Outbound notifications (email in production). Delivery is best-effort and
//! always detached from the request that triggered it.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub const TEMPLATE_REGISTRATION: &str = "registration_confirmation";
pub const TEMPLATE_PAYMENT_REMINDER: &str = "payment_reminder";
pub const TEMPLATE_REPLACEMENT: &str = "replacement_created";

#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub template: String,
    pub context: serde_json::Value,
    pub attachments: Vec<Attachment>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns whether the message was accepted for delivery.
    async fn send(&self, notification: Notification) -> bool;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, notification: Notification) -> bool {
        tracing::info!(
            recipient = %notification.recipient,
            template = %notification.template,
            subject = %notification.subject,
            attachments = notification.attachments.len(),
            "notification queued"
        );
        true
    }
}

#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Fire-and-forget front for a [`Notifier`].
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    in_flight: Arc<InFlight>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Spawns the send and returns immediately. A failed send is logged, never
    /// reported back to the caller.
    pub fn dispatch(&self, notification: Notification) {
        let notifier = self.notifier.clone();
        let in_flight = self.in_flight.clone();
        in_flight.count.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            let recipient = notification.recipient.clone();
            let template = notification.template.clone();
            if !notifier.send(notification).await {
                tracing::warn!(%recipient, %template, "notification delivery failed");
            }
            if in_flight.count.fetch_sub(1, Ordering::SeqCst) == 1 {
                in_flight.idle.notify_waiters();
            }
        });
    }

    /// Waits until every dispatched send has finished. One-shot processes
    /// call this before the runtime shuts down.
    pub async fn drain(&self) {
        loop {
            let idle = self.in_flight.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if self.in_flight.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            idle.await;
        }
    }
}
