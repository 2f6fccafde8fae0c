use std::sync::Arc;

use tracing::warn;

use super::domain::{Timestamp, UserId};
use super::repository::{
    AuditEntry, AuditSink, CapabilityCheck, Clock, EventPublisher, Notification,
    NotificationQueue, WorkflowEvent,
};

/// Outbound collaborators shared by every engine service.
///
/// Notification, audit, and event failures are logged and swallowed so the primary
/// workflow change still commits.
#[derive(Clone)]
pub struct Collaborators {
    notifications: Arc<dyn NotificationQueue>,
    audit: Arc<dyn AuditSink>,
    events: Arc<dyn EventPublisher>,
    capabilities: Arc<dyn CapabilityCheck>,
    clock: Arc<dyn Clock>,
}

impl Collaborators {
    pub fn new(
        notifications: Arc<dyn NotificationQueue>,
        audit: Arc<dyn AuditSink>,
        events: Arc<dyn EventPublisher>,
        capabilities: Arc<dyn CapabilityCheck>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            notifications,
            audit,
            events,
            capabilities,
            clock,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn has_capability(&self, user: UserId, capability: &str) -> bool {
        self.capabilities.has_capability(user, capability)
    }

    pub(crate) fn notify(&self, notification: Notification) {
        let template = notification.template.clone();
        let user = notification.user_id;
        if let Err(err) = self.notifications.queue(notification) {
            warn!(%user, %template, error = %err, "failed to queue notification");
        }
    }

    pub(crate) fn audit(&self, entry: AuditEntry) {
        let action = entry.action;
        let entity_id = entry.entity_id;
        if let Err(err) = self.audit.log(entry) {
            warn!(action, entity_id, error = %err, "failed to write audit entry");
        }
    }

    pub(crate) fn publish(&self, event: WorkflowEvent) {
        if let Err(err) = self.events.publish(event) {
            warn!(error = %err, "failed to publish workflow event");
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
