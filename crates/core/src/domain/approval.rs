use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::employee::EmployeeId;
use crate::domain::leave::{LeaveRequestId, LeaveStatus};

/// Which of the two approval decisions an actor fulfils.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalSlot {
    Manager,
    Hr,
}

impl ApprovalSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manager => "manager",
            Self::Hr => "hr",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "manager" => Some(Self::Manager),
            "hr" => Some(Self::Hr),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalActionKind {
    Approved,
    Rejected,
    Delegated,
}

impl ApprovalActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Delegated => "delegated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "delegated" => Some(Self::Delegated),
            _ => None,
        }
    }
}

/// An approval act not yet written to the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApprovalAction {
    pub actor_id: EmployeeId,
    pub kind: ApprovalActionKind,
    pub slot: Option<ApprovalSlot>,
    pub comments: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalAction {
    pub id: i64,
    pub leave_request_id: LeaveRequestId,
    pub actor_id: EmployeeId,
    pub kind: ApprovalActionKind,
    pub slot: Option<ApprovalSlot>,
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationReason {
    UnavailableOnLeave,
    Timeout,
    AlsoUnavailable,
}

impl DelegationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnavailableOnLeave => "unavailable_on_leave",
            Self::Timeout => "timeout",
            Self::AlsoUnavailable => "also_unavailable",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unavailable_on_leave" => Some(Self::UnavailableOnLeave),
            "timeout" => Some(Self::Timeout),
            "also_unavailable" => Some(Self::AlsoUnavailable),
            _ => None,
        }
    }
}

/// One step of a reporting-chain walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationHop {
    pub from_approver_id: EmployeeId,
    pub to_approver_id: EmployeeId,
    pub reason: DelegationReason,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationHopEntry {
    pub id: i64,
    pub leave_request_id: LeaveRequestId,
    pub hop: DelegationHop,
    pub created_at: DateTime<Utc>,
}

/// `old_status == None` marks the creation of the request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLogEntry {
    pub id: i64,
    pub leave_request_id: LeaveRequestId,
    pub old_status: Option<LeaveStatus>,
    pub new_status: LeaveStatus,
    pub actor_id: EmployeeId,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::{ApprovalActionKind, ApprovalSlot, DelegationReason};

    #[test]
    fn ledger_enums_round_trip_from_storage_encoding() {
        for slot in [ApprovalSlot::Manager, ApprovalSlot::Hr] {
            assert_eq!(ApprovalSlot::parse(slot.as_str()), Some(slot));
        }
        for kind in
            [ApprovalActionKind::Approved, ApprovalActionKind::Rejected, ApprovalActionKind::Delegated]
        {
            assert_eq!(ApprovalActionKind::parse(kind.as_str()), Some(kind));
        }
        for reason in [
            DelegationReason::UnavailableOnLeave,
            DelegationReason::Timeout,
            DelegationReason::AlsoUnavailable,
        ] {
            assert_eq!(DelegationReason::parse(reason.as_str()), Some(reason));
        }
    }
}
