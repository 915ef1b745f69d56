use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::approval::{ApprovalSlot, DelegationReason};
use crate::domain::employee::EmployeeId;
use crate::domain::leave::{LeaveRequest, LeaveStatus};
use crate::ports::CollaboratorError;

/// Facts about a transition that has already been committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowEvent {
    Submitted { request: LeaveRequest },
    DocumentUploaded { request: LeaveRequest },
    PartiallyApproved { request: LeaveRequest, slot: ApprovalSlot, actor_id: EmployeeId },
    Approved { request: LeaveRequest, actor_id: EmployeeId },
    Rejected { request: LeaveRequest, actor_id: EmployeeId },
    /// `previous_status` tells a withdrawn approval apart from a cancelled submission.
    Cancelled { request: LeaveRequest, previous_status: LeaveStatus },
    AutoRejected { request: LeaveRequest },
    Delegated {
        request: LeaveRequest,
        bypassed: Option<EmployeeId>,
        reason: DelegationReason,
    },
    DocumentReminder { request: LeaveRequest, urgent: bool },
    /// No approver could be resolved; the request keeps its current approver.
    DelegationFailed { request: LeaveRequest, approver: EmployeeId },
}

impl WorkflowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Submitted { .. } => "submitted",
            Self::DocumentUploaded { .. } => "document_uploaded",
            Self::PartiallyApproved { .. } => "partially_approved",
            Self::Approved { .. } => "approved",
            Self::Rejected { .. } => "rejected",
            Self::Cancelled { .. } => "cancelled",
            Self::AutoRejected { .. } => "auto_rejected",
            Self::Delegated { .. } => "delegated",
            Self::DocumentReminder { .. } => "document_reminder",
            Self::DelegationFailed { .. } => "delegation_failed",
        }
    }

    pub fn request(&self) -> &LeaveRequest {
        match self {
            Self::Submitted { request }
            | Self::DocumentUploaded { request }
            | Self::PartiallyApproved { request, .. }
            | Self::Approved { request, .. }
            | Self::Rejected { request, .. }
            | Self::Cancelled { request, .. }
            | Self::AutoRejected { request }
            | Self::Delegated { request, .. }
            | Self::DocumentReminder { request, .. }
            | Self::DelegationFailed { request, .. } => request,
        }
    }
}

#[async_trait::async_trait]
pub trait EffectHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &WorkflowEvent) -> Result<(), CollaboratorError>;
}

/// Runs handlers in registration order. A failing handler is logged and the
/// rest still run; nothing is rolled back.
#[derive(Clone, Default)]
pub struct EffectDispatcher {
    handlers: Vec<Arc<dyn EffectHandler>>,
}

impl EffectDispatcher {
    pub fn new(handlers: Vec<Arc<dyn EffectHandler>>) -> Self {
        Self { handlers }
    }

    pub fn with_handler(mut self, handler: Arc<dyn EffectHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Returns how many handler invocations failed.
    pub async fn dispatch(&self, events: &[WorkflowEvent]) -> usize {
        let mut failures = 0;
        for event in events {
            for handler in &self.handlers {
                if let Err(error) = handler.handle(event).await {
                    failures += 1;
                    warn!(
                        event_name = "workflow.effect.failed",
                        handler = handler.name(),
                        workflow_event = event.name(),
                        request_id = event.request().id.0,
                        error = %error,
                        "side effect failed after commit"
                    );
                }
            }
        }
        failures
    }
}
