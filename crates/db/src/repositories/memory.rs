use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use leaveflow_core::approvals::TransitionCommit;
use leaveflow_core::domain::approval::{ApprovalAction, DelegationHopEntry, StatusLogEntry};
use leaveflow_core::domain::employee::EmployeeId;
use leaveflow_core::domain::leave::{
    DateRange, LeaveRequest, LeaveRequestId, LeaveStatus, ReminderTier,
};

use super::{LeaveRequestRepository, RepositoryError};

#[derive(Default)]
struct State {
    next_request_id: i64,
    next_row_id: i64,
    requests: BTreeMap<LeaveRequestId, LeaveRequest>,
    status_log: Vec<StatusLogEntry>,
    actions: Vec<ApprovalAction>,
    hops: Vec<DelegationHopEntry>,
}

impl State {
    fn row_id(&mut self) -> i64 {
        self.next_row_id += 1;
        self.next_row_id
    }

    fn append_audit_rows(&mut self, id: LeaveRequestId, commit: &TransitionCommit) {
        if commit.status_changed() {
            let row_id = self.row_id();
            self.status_log.push(StatusLogEntry {
                id: row_id,
                leave_request_id: id,
                old_status: commit.previous_status,
                new_status: commit.request.status,
                actor_id: commit.actor_id,
                created_at: commit.at,
            });
        }
        for action in &commit.actions {
            let row_id = self.row_id();
            self.actions.push(ApprovalAction {
                id: row_id,
                leave_request_id: id,
                actor_id: action.actor_id,
                kind: action.kind,
                slot: action.slot,
                comments: action.comments.clone(),
                created_at: commit.at,
            });
        }
        for hop in &commit.hops {
            let row_id = self.row_id();
            self.hops.push(DelegationHopEntry {
                id: row_id,
                leave_request_id: id,
                hop: *hop,
                created_at: commit.at,
            });
        }
    }

    fn filtered(&self, predicate: impl Fn(&LeaveRequest) -> bool) -> Vec<LeaveRequest> {
        self.requests.values().filter(|request| predicate(request)).cloned().collect()
    }
}

/// Single-lock store with the same commit semantics as the SQL repository.
#[derive(Default)]
pub struct InMemoryLeaveRequestRepository {
    state: RwLock<State>,
}

impl InMemoryLeaveRequestRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LeaveRequestRepository for InMemoryLeaveRequestRepository {
    async fn insert(&self, commit: &TransitionCommit) -> Result<LeaveRequest, RepositoryError> {
        let mut state = self.state.write().await;
        let request = &commit.request;
        let overlapping = state.requests.values().any(|r| {
            r.employee_id == request.employee_id
                && r.status.is_active()
                && r.date_range().overlaps(&request.date_range())
        });
        if overlapping {
            return Err(RepositoryError::Overlap(request.employee_id));
        }
        state.next_request_id += 1;
        let id = LeaveRequestId(state.next_request_id);
        let stored = LeaveRequest { id, version: 0, ..commit.request.clone() };

        state.requests.insert(id, stored.clone());
        state.append_audit_rows(id, commit);
        Ok(stored)
    }

    async fn commit(&self, commit: &TransitionCommit) -> Result<LeaveRequest, RepositoryError> {
        let mut state = self.state.write().await;
        let id = commit.request.id;
        let current = state.requests.get(&id).ok_or(RepositoryError::Missing(id))?;
        if current.version != commit.request.version {
            return Err(RepositoryError::Conflict {
                id,
                expected_version: commit.request.version,
            });
        }

        let stored = LeaveRequest {
            version: current.version + 1,
            updated_at: commit.at,
            reminder_24h_sent: current.reminder_24h_sent,
            reminder_12h_sent: current.reminder_12h_sent,
            ..commit.request.clone()
        };
        state.requests.insert(id, stored.clone());
        state.append_audit_rows(id, commit);
        Ok(stored)
    }

    async fn find_by_id(&self, id: LeaveRequestId) -> Result<Option<LeaveRequest>, RepositoryError> {
        Ok(self.state.read().await.requests.get(&id).cloned())
    }

    async fn list_pending_for_manager(
        &self,
        approver_id: EmployeeId,
    ) -> Result<Vec<LeaveRequest>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.filtered(|r| r.awaiting_manager() && r.current_approver_id == Some(approver_id)))
    }

    async fn list_pending_for_hr(
        &self,
        hr_id: EmployeeId,
    ) -> Result<Vec<LeaveRequest>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.filtered(|r| {
            r.employee_id != hr_id
                && (r.awaiting_hr()
                    || (r.awaiting_manager() && r.current_approver_id == Some(hr_id)))
        }))
    }

    async fn list_awaiting_document(&self) -> Result<Vec<LeaveRequest>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.filtered(|r| {
            r.status == LeaveStatus::PendingDocument && r.document_deadline.is_some()
        }))
    }

    async fn list_stale(
        &self,
        cutoff: DateTime<Utc>,
        max_escalations: u32,
    ) -> Result<Vec<LeaveRequest>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.filtered(|r| {
            r.awaiting_manager()
                && r.current_approver_id.is_some()
                && r.approver_assigned_at < cutoff
                && r.escalation_count < max_escalations
        }))
    }

    async fn has_active_overlap(
        &self,
        employee_id: EmployeeId,
        range: &DateRange,
    ) -> Result<bool, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.requests.values().any(|r| {
            r.employee_id == employee_id && r.status.is_active() && r.date_range().overlaps(range)
        }))
    }

    async fn has_approved_overlap(
        &self,
        employee_id: EmployeeId,
        range: &DateRange,
    ) -> Result<bool, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.requests.values().any(|r| {
            r.employee_id == employee_id
                && r.status == LeaveStatus::Approved
                && r.date_range().overlaps(range)
        }))
    }

    async fn mark_reminder_sent(
        &self,
        id: LeaveRequestId,
        tier: ReminderTier,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(request) = state.requests.get_mut(&id) else {
            return Ok(false);
        };
        if request.status != LeaveStatus::PendingDocument {
            return Ok(false);
        }
        let flipped = match tier {
            ReminderTier::First if !request.reminder_24h_sent => {
                request.reminder_24h_sent = true;
                true
            }
            ReminderTier::Urgent if !request.reminder_12h_sent => {
                request.reminder_12h_sent = true;
                request.reminder_24h_sent = true;
                true
            }
            _ => false,
        };
        Ok(flipped)
    }

    async fn delegation_history(
        &self,
        id: LeaveRequestId,
    ) -> Result<Vec<DelegationHopEntry>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.hops.iter().filter(|hop| hop.leave_request_id == id).cloned().collect())
    }

    async fn status_log(&self, id: LeaveRequestId) -> Result<Vec<StatusLogEntry>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.status_log.iter().filter(|entry| entry.leave_request_id == id).cloned().collect())
    }

    async fn approval_actions(
        &self,
        id: LeaveRequestId,
    ) -> Result<Vec<ApprovalAction>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.actions.iter().filter(|action| action.leave_request_id == id).cloned().collect())
    }
}
