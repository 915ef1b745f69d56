use serde::{Deserialize, Serialize};

use crate::domain::leave::LeaveStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    DocumentUploaded,
    /// `fully_resolved` is true once both approval slots are satisfied.
    SlotApproved { fully_resolved: bool },
    SlotRejected,
    CancelRequested,
    DocumentDeadlineMissed,
}

impl LifecycleEvent {
    /// Verb used in conflict messages.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::DocumentUploaded => "upload a document for",
            Self::SlotApproved { .. } => "approve",
            Self::SlotRejected => "reject",
            Self::CancelRequested => "cancel",
            Self::DocumentDeadlineMissed => "auto-reject",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: LeaveStatus,
    pub to: LeaveStatus,
    pub event: LifecycleEvent,
}
