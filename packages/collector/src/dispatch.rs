//! Rate-limited outbound dispatch.
//!
//! The pipeline treats notification delivery as fire-and-forget per item
//! with pacing between calls. Failures are isolated: one rejected message
//! never aborts the rest, and the report of confirmed deliveries is what
//! the orchestrator uses to decide which URLs enter the persistent cache.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::DispatchError;

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// One outbound item: a plain text/HTML message or a binary file with a
/// caption.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    Text(String),
    Document {
        filename: String,
        bytes: Vec<u8>,
        caption: String,
    },
}

/// Delivery target for notifications and exports.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), DispatchError>;
}

/// Per-item delivery outcome, index-aligned with the input slice.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub delivered: Vec<usize>,
    pub failed: Vec<(usize, String)>,
}

impl DispatchReport {
    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// Paces deliveries through a sink.
pub struct RateLimitedDispatcher {
    sink: Arc<dyn NotificationSink>,
    limiter: DirectRateLimiter,
}

impl RateLimitedDispatcher {
    /// Create a dispatcher delivering at most `per_second` items a second.
    /// Burst is capped at one so the gap between consecutive deliveries is
    /// always paced, not just the long-run average.
    pub fn new(sink: Arc<dyn NotificationSink>, per_second: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(nonzero!(1u32)))
            .allow_burst(nonzero!(1u32));
        Self {
            sink,
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Deliver every message, pacing between calls. Partial success is
    /// normal; the report says exactly which indices were confirmed.
    pub async fn dispatch_all(&self, messages: &[OutboundMessage]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (index, message) in messages.iter().enumerate() {
            self.limiter.until_ready().await;

            match self.sink.deliver(message).await {
                Ok(()) => report.delivered.push(index),
                Err(e) => {
                    tracing::warn!(index, error = %e, "delivery failed");
                    report.failed.push((index, e.to_string()));
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    /// Sink that fails for messages containing a marker.
    struct FlakySink {
        delivered: Mutex<Vec<String>>,
    }

    impl FlakySink {
        fn new() -> Self {
            Self {
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl NotificationSink for FlakySink {
        async fn deliver(&self, message: &OutboundMessage) -> Result<(), DispatchError> {
            let text = match message {
                OutboundMessage::Text(text) => text.clone(),
                OutboundMessage::Document { filename, .. } => filename.clone(),
            };
            if text.contains("fail") {
                return Err(DispatchError::Rejected {
                    reason: "sink said no".into(),
                });
            }
            self.delivered.lock().unwrap().push(text);
            Ok(())
        }
    }

    #[tokio::test]
    async fn partial_failure_is_reported_per_item() {
        let sink = Arc::new(FlakySink::new());
        let dispatcher = RateLimitedDispatcher::new(sink.clone(), 1000);

        let messages = vec![
            OutboundMessage::Text("job one".into()),
            OutboundMessage::Text("please fail".into()),
            OutboundMessage::Text("job three".into()),
        ];

        let report = dispatcher.dispatch_all(&messages).await;

        assert_eq!(report.delivered, vec![0, 2]);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.failed[0].0, 1);
        assert_eq!(sink.delivered.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn dispatch_is_paced() {
        let sink = Arc::new(FlakySink::new());
        // 10/sec: three messages need at least ~200ms.
        let dispatcher = RateLimitedDispatcher::new(sink, 10);

        let messages: Vec<_> = (0..3)
            .map(|i| OutboundMessage::Text(format!("job {}", i)))
            .collect();

        let start = Instant::now();
        let report = dispatcher.dispatch_all(&messages).await;
        let elapsed = start.elapsed();

        assert_eq!(report.delivered_count(), 3);
        assert!(
            elapsed.as_millis() >= 150,
            "pacing not applied: {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn documents_flow_through_the_same_contract() {
        let sink = Arc::new(FlakySink::new());
        let dispatcher = RateLimitedDispatcher::new(sink.clone(), 1000);

        let messages = vec![OutboundMessage::Document {
            filename: "jobs-2026-08-24.csv".into(),
            bytes: b"title,company\n".to_vec(),
            caption: "Daily export".into(),
        }];

        let report = dispatcher.dispatch_all(&messages).await;
        assert_eq!(report.delivered_count(), 1);
    }
}
