use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use thiserror::Error;

use leaveflow_core::approvals::TransitionCommit;
use leaveflow_core::domain::approval::{ApprovalAction, DelegationHopEntry, StatusLogEntry};
use leaveflow_core::domain::employee::EmployeeId;
use leaveflow_core::domain::leave::{DateRange, LeaveRequest, LeaveRequestId, ReminderTier};
use leaveflow_core::errors::{ApplicationError, DomainError, PolicyViolation};
use leaveflow_core::ports::CollaboratorError;

pub mod availability;
pub mod balance;
pub mod calendar_rules;
pub mod employee;
pub mod leave_request;
pub mod memory;
pub mod notification;

pub use availability::RepositoryAvailabilityOracle;
pub use balance::SqlBalanceService;
pub use calendar_rules::{SqlBlackoutService, SqlCapacityService};
pub use employee::SqlEmployeeRepository;
pub use leave_request::SqlLeaveRequestRepository;
pub use memory::InMemoryLeaveRequestRepository;
pub use notification::SqlNotificationSink;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("leave request {id} changed since version {expected_version}")]
    Conflict { id: LeaveRequestId, expected_version: u32 },
    #[error("leave request {0} does not exist")]
    Missing(LeaveRequestId),
    #[error("employee {0} already has an active leave request over these dates")]
    Overlap(EmployeeId),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict { .. } => {
                ApplicationError::Domain(DomainError::ConcurrentModification)
            }
            RepositoryError::Missing(id) => {
                ApplicationError::Domain(DomainError::not_found("leave_request", id))
            }
            RepositoryError::Overlap(_) => {
                ApplicationError::Domain(DomainError::PolicyViolation(PolicyViolation::OverlappingRequest))
            }
            other => ApplicationError::Persistence(other.to_string()),
        }
    }
}

impl From<RepositoryError> for CollaboratorError {
    fn from(value: RepositoryError) -> Self {
        CollaboratorError::unavailable("database", value)
    }
}

/// Leave requests plus their append-only audit trail.
///
/// `insert` and `commit` write the row image and every audit row of a
/// [`TransitionCommit`] in one transaction, adding a status_log entry whenever
/// the status changed.
#[async_trait]
pub trait LeaveRequestRepository: Send + Sync {
    /// Fails with [`RepositoryError::Overlap`] when the requester already holds
    /// an active request over any of the dates; the check and the write are atomic.
    async fn insert(&self, commit: &TransitionCommit) -> Result<LeaveRequest, RepositoryError>;

    /// Fails with [`RepositoryError::Conflict`] when the stored version no
    /// longer matches the one the commit was computed from.
    async fn commit(&self, commit: &TransitionCommit) -> Result<LeaveRequest, RepositoryError>;

    async fn find_by_id(&self, id: LeaveRequestId) -> Result<Option<LeaveRequest>, RepositoryError>;

    async fn list_pending_for_manager(
        &self,
        approver_id: EmployeeId,
    ) -> Result<Vec<LeaveRequest>, RepositoryError>;

    async fn list_pending_for_hr(
        &self,
        hr_id: EmployeeId,
    ) -> Result<Vec<LeaveRequest>, RepositoryError>;

    async fn list_awaiting_document(&self) -> Result<Vec<LeaveRequest>, RepositoryError>;

    /// Requests whose manager slot has sat with the same approver since before `cutoff`.
    async fn list_stale(
        &self,
        cutoff: DateTime<Utc>,
        max_escalations: u32,
    ) -> Result<Vec<LeaveRequest>, RepositoryError>;

    async fn has_active_overlap(
        &self,
        employee_id: EmployeeId,
        range: &DateRange,
    ) -> Result<bool, RepositoryError>;

    async fn has_approved_overlap(
        &self,
        employee_id: EmployeeId,
        range: &DateRange,
    ) -> Result<bool, RepositoryError>;

    /// Atomic test-and-set. Returns `true` only for the caller that flipped the flag.
    async fn mark_reminder_sent(
        &self,
        id: LeaveRequestId,
        tier: ReminderTier,
    ) -> Result<bool, RepositoryError>;

    async fn delegation_history(
        &self,
        id: LeaveRequestId,
    ) -> Result<Vec<DelegationHopEntry>, RepositoryError>;

    async fn status_log(&self, id: LeaveRequestId) -> Result<Vec<StatusLogEntry>, RepositoryError>;

    async fn approval_actions(
        &self,
        id: LeaveRequestId,
    ) -> Result<Vec<ApprovalAction>, RepositoryError>;
}

/// Fixed-width UTC timestamps so that text comparison in SQL orders correctly.
pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

pub(crate) fn encode_date(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

pub(crate) fn decode_date(column: &str, raw: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

pub(crate) fn decode_enum<T>(
    column: &str,
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, RepositoryError> {
    parse(raw).ok_or_else(|| RepositoryError::Decode(format!("{column}: unknown value `{raw}`")))
}


#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use leaveflow_core::domain::employee::EmployeeId;
    use leaveflow_core::domain::leave::LeaveRequestId;
    use leaveflow_core::errors::{ApplicationError, DomainError, PolicyViolation};

    use super::{decode_timestamp, encode_timestamp, RepositoryError};

    #[test]
    fn timestamps_encode_to_sortable_text() {
        let early = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).single().expect("ts");
        let late = early + chrono::Duration::milliseconds(1500);

        assert_eq!(encode_timestamp(early), "2024-01-02T03:04:05.000000Z");
        assert!(encode_timestamp(early) < encode_timestamp(late));
        assert_eq!(decode_timestamp("t", &encode_timestamp(late)).expect("decode"), late);
    }

    #[test]
    fn version_conflict_surfaces_as_concurrent_modification() {
        let error = ApplicationError::from(RepositoryError::Conflict {
            id: LeaveRequestId(4),
            expected_version: 2,
        });
        assert_eq!(error, ApplicationError::Domain(DomainError::ConcurrentModification));
    }

    #[test]
    fn overlap_on_insert_surfaces_as_policy_violation() {
        let error = ApplicationError::from(RepositoryError::Overlap(EmployeeId(1)));
        assert_eq!(
            error,
            ApplicationError::Domain(DomainError::PolicyViolation(PolicyViolation::OverlappingRequest))
        );
    }
}
