use tokio::sync::mpsc::error::TrySendError;
use tracing::{error, trace, warn};

use wikichat_types::events::ChatFrame;

use crate::registry::{ConnectionId, ConnectionRegistry, Payload};

/// Delivery summary for one `publish` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Fans chat frames out to every registered connection.
///
/// Each recipient has its own bounded queue. A recipient whose queue is full or
/// closed is unregistered; the others are unaffected and the publisher never
/// waits on any of them.
#[derive(Clone)]
pub struct BroadcastDispatcher {
    registry: ConnectionRegistry,
}

impl BroadcastDispatcher {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Serialize once and offer the frame to every live connection.
    pub fn publish(&self, frame: &ChatFrame) -> PublishReport {
        match serde_json::to_string(frame) {
            Ok(json) => self.publish_raw(Payload::from(json)),
            Err(e) => {
                error!("Failed to serialize chat frame: {}", e);
                PublishReport::default()
            }
        }
    }

    pub fn publish_raw(&self, payload: Payload) -> PublishReport {
        let mut report = PublishReport::default();
        let mut failed: Vec<ConnectionId> = Vec::new();

        for (id, outbound) in self.registry.snapshot() {
            match outbound.try_send(payload.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("Connection {} is not keeping up, dropping it", id);
                    failed.push(id);
                }
                Err(TrySendError::Closed(_)) => {
                    trace!("Connection {} already closed", id);
                    failed.push(id);
                }
            }
        }

        for id in failed {
            if self.registry.unregister(id) {
                report.dropped += 1;
            }
        }

        trace!(
            "Published frame to {} connections ({} dropped)",
            report.delivered,
            report.dropped
        );
        report
    }
}
