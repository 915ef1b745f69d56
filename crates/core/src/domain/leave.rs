use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::employee::EmployeeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeaveRequestId(pub i64);

impl LeaveRequestId {
    /// Placeholder carried by a request that has not been persisted yet.
    pub const UNASSIGNED: LeaveRequestId = LeaveRequestId(0);
}

impl fmt::Display for LeaveRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveCategory {
    Casual,
    Sick,
    Annual,
    Unpaid,
}

impl LeaveCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Casual => "casual",
            Self::Sick => "sick",
            Self::Annual => "annual",
            Self::Unpaid => "unpaid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "casual" => Some(Self::Casual),
            "sick" => Some(Self::Sick),
            "annual" | "earned" => Some(Self::Annual),
            "unpaid" => Some(Self::Unpaid),
            _ => None,
        }
    }

    /// Unpaid leave is not drawn from an allowance.
    pub fn is_balance_tracked(&self) -> bool {
        !matches!(self, Self::Unpaid)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    PendingDocument,
    PartiallyApproved,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PendingDocument => "pending_document",
            Self::PartiallyApproved => "partially_approved",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "pending_document" => Some(Self::PendingDocument),
            "partially_approved" => Some(Self::PartiallyApproved),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Cancelled)
    }

    /// Statuses that block the requester from filing another request over the same dates.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Rejected | Self::Cancelled)
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotDecision {
    Pending,
    Approved,
    Rejected,
    NotRequired,
}

impl SlotDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::NotRequired => "not_required",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "not_required" => Some(Self::NotRequired),
            _ => None,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Approved | Self::NotRequired)
    }
}

/// Inclusive calendar date range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (end >= start).then_some(Self { start, end })
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }
}

/// Document-deadline reminder tiers. Each fires at most once per request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderTier {
    /// Sent once 24 hours or less remain.
    First,
    /// Sent once 12 hours or less remain; also settles the first tier.
    Urgent,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: LeaveRequestId,
    pub employee_id: EmployeeId,
    pub category: LeaveCategory,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub status: LeaveStatus,
    pub manager_approval: SlotDecision,
    pub hr_approval: SlotDecision,
    pub requires_dual_approval: bool,
    pub team_capacity_warning: bool,
    pub blackout_warning: bool,
    pub blackout_override: bool,
    pub rejection_reason: Option<String>,
    pub current_approver_id: Option<EmployeeId>,
    pub escalation_count: u32,
    pub approver_assigned_at: DateTime<Utc>,
    pub business_days: u32,
    pub document_ref: Option<String>,
    pub document_deadline: Option<DateTime<Utc>>,
    pub reminder_24h_sent: bool,
    pub reminder_12h_sent: bool,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeaveRequest {
    pub fn date_range(&self) -> DateRange {
        DateRange { start: self.start_date, end: self.end_date }
    }

    pub fn awaiting_manager(&self) -> bool {
        matches!(self.status, LeaveStatus::Pending | LeaveStatus::PartiallyApproved)
            && self.manager_approval == SlotDecision::Pending
    }

    pub fn awaiting_hr(&self) -> bool {
        matches!(self.status, LeaveStatus::Pending | LeaveStatus::PartiallyApproved)
            && self.hr_approval == SlotDecision::Pending
    }

    pub fn both_slots_satisfied(&self) -> bool {
        self.manager_approval == SlotDecision::Approved && self.hr_approval.is_satisfied()
    }

    pub fn is_delegated_approver(&self, employee_id: EmployeeId) -> bool {
        self.current_approver_id == Some(employee_id)
    }
}
