//! Entry points for every leave-request operation.
//!
//! Each mutating call loads what it needs, asks the pure transition functions
//! in `leaveflow_core::approvals` for a [`TransitionCommit`], persists it in one
//! repository transaction and only then dispatches side effects.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use leaveflow_core::approvals::{
    self, ApprovalContext, CreationAssessment, NewLeaveRequest, TransitionCommit,
};
use leaveflow_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use leaveflow_core::calendar;
use leaveflow_core::availability::AvailabilityOracle;
use leaveflow_core::delegation::{DelegationEngine, DelegationError, DelegationQuery};
use leaveflow_core::domain::approval::{
    ApprovalAction, DelegationHopEntry, DelegationReason, StatusLogEntry,
};
use leaveflow_core::domain::employee::{Employee, EmployeeId};
use leaveflow_core::domain::leave::{LeaveRequest, LeaveRequestId, LeaveStatus};
use leaveflow_core::effects::{EffectDispatcher, WorkflowEvent};
use leaveflow_core::errors::{ApplicationError, DomainError, PolicyViolation};
use leaveflow_core::org::OrgGraph;
use leaveflow_core::ports::{BalanceService, BlackoutService, CapacityService, NotificationSink};
use leaveflow_db::{
    DbPool, LeaveRequestRepository, RepositoryAvailabilityOracle, SqlBalanceService,
    SqlBlackoutService, SqlCapacityService, SqlEmployeeRepository, SqlLeaveRequestRepository,
    SqlNotificationSink,
};

use crate::effects::{BalanceEffects, NotificationEffects};

/// Advisory findings returned alongside a newly created request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CreationWarning {
    /// Approving would push the team past its absence limit on these days.
    TeamCapacity { dates: Vec<NaiveDate> },
    /// Approval will require an explicit override.
    Blackout { periods: Vec<String> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRequest {
    pub request: LeaveRequest,
    pub warnings: Vec<CreationWarning>,
}

/// Collaborators the service is wired with.
pub struct WorkflowDependencies {
    pub org: Arc<dyn OrgGraph>,
    pub requests: Arc<dyn LeaveRequestRepository>,
    pub availability: Arc<dyn AvailabilityOracle>,
    pub balance: Arc<dyn BalanceService>,
    pub capacity: Arc<dyn CapacityService>,
    pub blackout: Arc<dyn BlackoutService>,
    pub effects: EffectDispatcher,
    pub audit: Arc<dyn AuditSink>,
}

impl WorkflowDependencies {
    /// SQLite adapters for every collaborator, with notification and balance
    /// side effects registered in that order.
    pub fn sqlite(pool: DbPool, audit: Arc<dyn AuditSink>) -> Self {
        let org: Arc<dyn OrgGraph> = Arc::new(SqlEmployeeRepository::new(pool.clone()));
        let requests: Arc<dyn LeaveRequestRepository> =
            Arc::new(SqlLeaveRequestRepository::new(pool.clone()));
        let balance: Arc<dyn BalanceService> = Arc::new(SqlBalanceService::new(pool.clone()));
        let notifications: Arc<dyn NotificationSink> =
            Arc::new(SqlNotificationSink::new(pool.clone()));

        let effects = EffectDispatcher::default()
            .with_handler(Arc::new(NotificationEffects::new(notifications, org.clone())))
            .with_handler(Arc::new(BalanceEffects::new(balance.clone())));

        Self {
            availability: Arc::new(RepositoryAvailabilityOracle::new(requests.clone())),
            capacity: Arc::new(SqlCapacityService::new(pool.clone())),
            blackout: Arc::new(SqlBlackoutService::new(pool)),
            org,
            requests,
            balance,
            effects,
            audit,
        }
    }
}

pub struct LeaveWorkflowService {
    pub(crate) org: Arc<dyn OrgGraph>,
    pub(crate) requests: Arc<dyn LeaveRequestRepository>,
    availability: Arc<dyn AvailabilityOracle>,
    balance: Arc<dyn BalanceService>,
    capacity: Arc<dyn CapacityService>,
    blackout: Arc<dyn BlackoutService>,
    pub(crate) delegation: DelegationEngine,
    pub(crate) effects: EffectDispatcher,
    pub(crate) audit: Arc<dyn AuditSink>,
}

impl LeaveWorkflowService {
    pub fn new(deps: WorkflowDependencies) -> Self {
        Self {
            delegation: DelegationEngine::new(deps.org.clone(), deps.availability.clone()),
            org: deps.org,
            requests: deps.requests,
            availability: deps.availability,
            balance: deps.balance,
            capacity: deps.capacity,
            blackout: deps.blackout,
            effects: deps.effects,
            audit: deps.audit,
        }
    }

    pub async fn create_request(
        &self,
        input: NewLeaveRequest,
    ) -> Result<CreatedRequest, ApplicationError> {
        let validated = input.validate()?;
        let requester = self.employee(validated.employee_id).await?;
        let range = validated.range;

        if validated.category.is_balance_tracked() {
            for (year, days) in calendar::business_days_by_year(&range) {
                if !self
                    .balance
                    .has_enough_balance(requester.id, validated.category, year, days)
                    .await?
                {
                    return Err(DomainError::PolicyViolation(PolicyViolation::InsufficientBalance {
                        requested_days: validated.business_days,
                    })
                    .into());
                }
            }
        }

        if self.requests.has_active_overlap(requester.id, &range).await? {
            return Err(DomainError::PolicyViolation(PolicyViolation::OverlappingRequest).into());
        }

        let hr_employees = self.org.hr_employees().await?;
        let capacity =
            self.capacity.check_team_capacity(requester.id, &requester.department, &range).await?;
        let blackouts = self.blackout.conflicting_periods(&requester.department, &range).await?;

        let mut warnings = Vec::new();
        if capacity.would_breach {
            warnings.push(CreationWarning::TeamCapacity { dates: capacity.breached_dates() });
        }
        if !blackouts.is_empty() {
            warnings.push(CreationWarning::Blackout {
                periods: blackouts.iter().map(|period| period.name.clone()).collect(),
            });
        }
        let assessment = CreationAssessment {
            team_capacity_warning: capacity.would_breach,
            blackout_warning: !blackouts.is_empty(),
        };

        let now = Utc::now();
        let mut commit =
            approvals::plan_creation(&validated, &requester, &hr_employees, assessment, now);
        let bypassed = self.delegate_unavailable_approver(&mut commit).await?;

        let stored = self.requests.insert(&commit).await?;
        info!(
            event_name = "workflow.request.created",
            request_id = stored.id.0,
            employee_id = stored.employee_id.0,
            status = %stored.status,
            current_approver = ?stored.current_approver_id.map(|id| id.0),
            team_capacity_warning = stored.team_capacity_warning,
            blackout_warning = stored.blackout_warning,
            "leave request created"
        );

        let mut events = vec![WorkflowEvent::Submitted { request: stored.clone() }];
        if bypassed.is_some() {
            events.push(WorkflowEvent::Delegated {
                request: stored.clone(),
                bypassed,
                reason: DelegationReason::UnavailableOnLeave,
            });
        }
        self.effects.dispatch(&events).await;

        Ok(CreatedRequest { request: stored, warnings })
    }

    /// Creation-time delegation: runs only for requests that land in `pending`
    /// with an approver who is on approved leave during the requested dates.
    /// Returns the bypassed approver when the assignment changed.
    async fn delegate_unavailable_approver(
        &self,
        commit: &mut TransitionCommit,
    ) -> Result<Option<EmployeeId>, ApplicationError> {
        let request = &commit.request;
        let Some(approver) = request.current_approver_id else {
            return Ok(None);
        };
        if request.status != LeaveStatus::Pending
            || !self.availability.is_unavailable(approver, &request.date_range()).await?
        {
            return Ok(None);
        }

        let query = DelegationQuery {
            start_approver: approver,
            requester: request.employee_id,
            range: request.date_range(),
            reason: DelegationReason::UnavailableOnLeave,
            escalation_count: request.escalation_count,
        };
        match self.delegation.find_next_available_approver(&query).await {
            Ok(resolution) if resolution.changes_approver() => {
                commit.record_delegation(&resolution);
                Ok(Some(approver))
            }
            Ok(_) => Ok(None),
            Err(DelegationError::ResolutionFailure { hops_walked, .. }) => {
                warn!(
                    event_name = "workflow.delegation.unresolved",
                    employee_id = request.employee_id.0,
                    approver = approver.0,
                    hops_walked,
                    "no available approver at creation; keeping the assigned one"
                );
                self.audit.emit(
                    AuditEvent::new(
                        None,
                        format!("create-{}", request.employee_id),
                        "delegation.resolution_failed",
                        AuditCategory::Delegation,
                        EmployeeId::SYSTEM,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("approver", approver)
                    .with_metadata("requester", request.employee_id)
                    .with_metadata("hops_walked", hops_walked),
                );
                Ok(None)
            }
            Err(DelegationError::Lookup(error)) => Err(error.into()),
        }
    }

    pub async fn approve(
        &self,
        request_id: LeaveRequestId,
        actor_id: EmployeeId,
        blackout_override: bool,
        comments: Option<String>,
    ) -> Result<LeaveRequest, ApplicationError> {
        let request = self.get_request(request_id).await?;
        let requester = self.employee(request.employee_id).await?;
        let actor = self.employee(actor_id).await?;

        let commit = approvals::approve(
            &ApprovalContext { request: &request, requester: &requester, actor: &actor },
            blackout_override,
            comments,
            Utc::now(),
        )?;
        let slot = commit.actions.first().and_then(|action| action.slot);
        let saved = self.requests.commit(&commit).await?;
        self.log_transition("workflow.request.approved", &commit, &saved);

        let event = match (saved.status, slot) {
            (LeaveStatus::PartiallyApproved, Some(slot)) => {
                WorkflowEvent::PartiallyApproved { request: saved.clone(), slot, actor_id }
            }
            _ => WorkflowEvent::Approved { request: saved.clone(), actor_id },
        };
        self.effects.dispatch(&[event]).await;
        Ok(saved)
    }

    pub async fn reject(
        &self,
        request_id: LeaveRequestId,
        actor_id: EmployeeId,
        reason: &str,
    ) -> Result<LeaveRequest, ApplicationError> {
        let request = self.get_request(request_id).await?;
        let requester = self.employee(request.employee_id).await?;
        let actor = self.employee(actor_id).await?;

        let commit = approvals::reject(
            &ApprovalContext { request: &request, requester: &requester, actor: &actor },
            reason,
            Utc::now(),
        )?;
        let saved = self.requests.commit(&commit).await?;
        self.log_transition("workflow.request.rejected", &commit, &saved);

        self.effects.dispatch(&[WorkflowEvent::Rejected { request: saved.clone(), actor_id }]).await;
        Ok(saved)
    }

    pub async fn cancel(
        &self,
        request_id: LeaveRequestId,
        actor_id: EmployeeId,
    ) -> Result<LeaveRequest, ApplicationError> {
        let request = self.get_request(request_id).await?;
        let commit = approvals::cancel(&request, actor_id, Utc::now())?;
        let saved = self.requests.commit(&commit).await?;
        self.log_transition("workflow.request.cancelled", &commit, &saved);

        self.effects
            .dispatch(&[WorkflowEvent::Cancelled {
                request: saved.clone(),
                previous_status: request.status,
            }])
            .await;
        Ok(saved)
    }

    pub async fn upload_document(
        &self,
        request_id: LeaveRequestId,
        actor_id: EmployeeId,
        document_ref: &str,
    ) -> Result<LeaveRequest, ApplicationError> {
        let request = self.get_request(request_id).await?;
        let actor = self.employee(actor_id).await?;

        let commit = approvals::upload_document(&request, &actor, document_ref, Utc::now())?;
        let saved = self.requests.commit(&commit).await?;
        self.log_transition("workflow.request.document_uploaded", &commit, &saved);

        self.effects.dispatch(&[WorkflowEvent::DocumentUploaded { request: saved.clone() }]).await;
        Ok(saved)
    }

    pub async fn get_request(&self, id: LeaveRequestId) -> Result<LeaveRequest, ApplicationError> {
        self.requests
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("leave_request", id).into())
    }

    pub async fn get_pending_for_manager(
        &self,
        approver_id: EmployeeId,
    ) -> Result<Vec<LeaveRequest>, ApplicationError> {
        Ok(self.requests.list_pending_for_manager(approver_id).await?)
    }

    pub async fn get_pending_for_hr(
        &self,
        hr_id: EmployeeId,
    ) -> Result<Vec<LeaveRequest>, ApplicationError> {
        if !self.org.is_hr(hr_id).await? {
            return Err(DomainError::unauthorized(format!("employee {hr_id} is not HR")).into());
        }
        Ok(self.requests.list_pending_for_hr(hr_id).await?)
    }

    pub async fn get_delegation_history(
        &self,
        id: LeaveRequestId,
    ) -> Result<Vec<DelegationHopEntry>, ApplicationError> {
        self.get_request(id).await?;
        Ok(self.requests.delegation_history(id).await?)
    }

    pub async fn get_status_log(
        &self,
        id: LeaveRequestId,
    ) -> Result<Vec<StatusLogEntry>, ApplicationError> {
        self.get_request(id).await?;
        Ok(self.requests.status_log(id).await?)
    }

    pub async fn get_approval_actions(
        &self,
        id: LeaveRequestId,
    ) -> Result<Vec<ApprovalAction>, ApplicationError> {
        self.get_request(id).await?;
        Ok(self.requests.approval_actions(id).await?)
    }

    async fn employee(&self, id: EmployeeId) -> Result<Employee, ApplicationError> {
        self.org.employee(id).await?.ok_or_else(|| DomainError::not_found("employee", id).into())
    }

    fn log_transition(&self, event_name: &'static str, commit: &TransitionCommit, saved: &LeaveRequest) {
        info!(
            event_name,
            request_id = saved.id.0,
            actor_id = commit.actor_id.0,
            from = ?commit.previous_status.map(|status| status.as_str()),
            to = %saved.status,
            version = saved.version,
            "leave request transition committed"
        );
    }
}
