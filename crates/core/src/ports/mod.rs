//! Narrow contracts for the collaborators the workflow consults but does not own:
//! leave balances, team capacity, blackout calendars and notification delivery.

pub mod memory;

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::employee::EmployeeId;
use crate::domain::leave::{DateRange, LeaveCategory, LeaveRequestId};

pub use memory::{
    InMemoryBalanceService, InMemoryBlackoutService, InMemoryCapacityService,
    InMemoryNotificationSink, SentNotification,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("{collaborator} unavailable: {message}")]
    Unavailable { collaborator: &'static str, message: String },
    #[error("{collaborator} returned invalid data: {message}")]
    InvalidData { collaborator: &'static str, message: String },
}

impl CollaboratorError {
    pub fn unavailable(collaborator: &'static str, message: impl fmt::Display) -> Self {
        Self::Unavailable { collaborator, message: message.to_string() }
    }

    pub fn invalid_data(collaborator: &'static str, message: impl fmt::Display) -> Self {
        Self::InvalidData { collaborator, message: message.to_string() }
    }
}

#[async_trait::async_trait]
pub trait BalanceService: Send + Sync {
    async fn has_enough_balance(
        &self,
        employee_id: EmployeeId,
        category: LeaveCategory,
        year: i32,
        days: u32,
    ) -> Result<bool, CollaboratorError>;

    async fn deduct(
        &self,
        employee_id: EmployeeId,
        category: LeaveCategory,
        year: i32,
        days: u32,
    ) -> Result<(), CollaboratorError>;

    /// Returns days to an allowance when an approved request is withdrawn.
    async fn credit(
        &self,
        employee_id: EmployeeId,
        category: LeaveCategory,
        year: i32,
        days: u32,
    ) -> Result<(), CollaboratorError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCapacity {
    pub date: NaiveDate,
    /// Colleagues already on approved leave that day, plus the requester.
    pub projected_absent: u32,
    pub team_size: u32,
    pub max_absent: u32,
}

impl DailyCapacity {
    pub fn breached(&self) -> bool {
        self.projected_absent > self.max_absent
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityReport {
    pub would_breach: bool,
    pub per_date: Vec<DailyCapacity>,
}

impl CapacityReport {
    pub fn from_days(per_date: Vec<DailyCapacity>) -> Self {
        let would_breach = per_date.iter().any(DailyCapacity::breached);
        Self { would_breach, per_date }
    }

    pub fn breached_dates(&self) -> Vec<NaiveDate> {
        self.per_date.iter().filter(|day| day.breached()).map(|day| day.date).collect()
    }
}

#[async_trait::async_trait]
pub trait CapacityService: Send + Sync {
    async fn check_team_capacity(
        &self,
        requester_id: EmployeeId,
        department: &str,
        range: &DateRange,
    ) -> Result<CapacityReport, CollaboratorError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackoutPeriod {
    pub id: i64,
    pub department: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl BlackoutPeriod {
    pub fn range(&self) -> DateRange {
        DateRange { start: self.start_date, end: self.end_date }
    }
}

#[async_trait::async_trait]
pub trait BlackoutService: Send + Sync {
    async fn conflicting_periods(
        &self,
        department: &str,
        range: &DateRange,
    ) -> Result<Vec<BlackoutPeriod>, CollaboratorError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ApprovalRequested,
    RequestApproved,
    RequestPartiallyApproved,
    RequestRejected,
    RequestCancelled,
    DocumentRequired,
    DocumentUploaded,
    DocumentReminder,
    DocumentReminderUrgent,
    AutoRejected,
    Escalated,
    EscalationBypassed,
    DelegationFailed,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApprovalRequested => "approval_requested",
            Self::RequestApproved => "request_approved",
            Self::RequestPartiallyApproved => "request_partially_approved",
            Self::RequestRejected => "request_rejected",
            Self::RequestCancelled => "request_cancelled",
            Self::DocumentRequired => "document_required",
            Self::DocumentUploaded => "document_uploaded",
            Self::DocumentReminder => "document_reminder",
            Self::DocumentReminderUrgent => "document_reminder_urgent",
            Self::AutoRejected => "auto_rejected",
            Self::Escalated => "escalated",
            Self::EscalationBypassed => "escalation_bypassed",
            Self::DelegationFailed => "delegation_failed",
        }
    }
}

#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        recipient: EmployeeId,
        kind: NotificationKind,
        message: &str,
        request_id: Option<LeaveRequestId>,
    ) -> Result<(), CollaboratorError>;
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{CapacityReport, DailyCapacity};

    fn day(d: u32, projected_absent: u32) -> DailyCapacity {
        DailyCapacity {
            date: NaiveDate::from_ymd_opt(2024, 5, d).expect("date"),
            projected_absent,
            team_size: 10,
            max_absent: 3,
        }
    }

    #[test]
    fn capacity_report_flags_only_days_above_threshold() {
        let report = CapacityReport::from_days(vec![day(6, 2), day(7, 4), day(8, 3)]);

        assert!(report.would_breach);
        assert_eq!(report.breached_dates(), vec![NaiveDate::from_ymd_opt(2024, 5, 7).expect("date")]);
    }

    #[test]
    fn empty_capacity_report_never_breaches() {
        assert!(!CapacityReport::from_days(Vec::new()).would_breach);
    }
}
