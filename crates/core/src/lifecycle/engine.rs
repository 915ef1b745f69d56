use thiserror::Error;

use crate::domain::leave::LeaveStatus;
use crate::lifecycle::states::{LifecycleEvent, TransitionOutcome};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: LeaveStatus, event: LifecycleEvent },
}

/// The leave-request transition table.
#[derive(Clone, Copy, Debug, Default)]
pub struct LeaveLifecycle;

impl LeaveLifecycle {
    pub fn apply(
        &self,
        current: LeaveStatus,
        event: LifecycleEvent,
    ) -> Result<TransitionOutcome, TransitionError> {
        transition(current, event)
    }

    pub fn allows(&self, current: LeaveStatus, event: LifecycleEvent) -> bool {
        transition(current, event).is_ok()
    }
}

fn transition(
    current: LeaveStatus,
    event: LifecycleEvent,
) -> Result<TransitionOutcome, TransitionError> {
    use LeaveStatus::{Approved, Cancelled, PartiallyApproved, Pending, PendingDocument, Rejected};
    use LifecycleEvent::{
        CancelRequested, DocumentDeadlineMissed, DocumentUploaded, SlotApproved, SlotRejected,
    };

    let to = match (current, event) {
        (PendingDocument, DocumentUploaded) => Pending,
        (Pending, SlotApproved { fully_resolved }) | (PartiallyApproved, SlotApproved { fully_resolved }) => {
            if fully_resolved {
                Approved
            } else {
                PartiallyApproved
            }
        }
        (Pending, SlotRejected) | (PartiallyApproved, SlotRejected) | (PendingDocument, SlotRejected) => {
            Rejected
        }
        // Approved is terminal for decisions but the requester may still withdraw.
        (Pending, CancelRequested)
        | (PendingDocument, CancelRequested)
        | (PartiallyApproved, CancelRequested)
        | (Approved, CancelRequested) => Cancelled,
        (PendingDocument, DocumentDeadlineMissed) => Rejected,
        _ => return Err(TransitionError::InvalidTransition { state: current, event }),
    };

    Ok(TransitionOutcome { from: current, to, event })
}
