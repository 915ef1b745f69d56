use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use leaveflow_core::approvals;
use leaveflow_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use leaveflow_core::delegation::{DelegationError, DelegationQuery, MAX_ESCALATIONS};
use leaveflow_core::domain::approval::DelegationReason;
use leaveflow_core::domain::employee::EmployeeId;
use leaveflow_core::domain::leave::{LeaveRequest, ReminderTier};
use leaveflow_core::effects::WorkflowEvent;
use leaveflow_core::errors::ApplicationError;
use leaveflow_db::RepositoryError;

use crate::service::LeaveWorkflowService;

/// A manager slot untouched for this long is handed up the chain.
pub const STALE_APPROVAL_TIMEOUT_HOURS: i64 = 48;
const URGENT_REMINDER_HOURS: i64 = 12;
const FIRST_REMINDER_HOURS: i64 = 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepKind {
    DocumentDeadline,
    StaleApproval,
}

impl SweepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentDeadline => "document_deadline",
            Self::StaleApproval => "stale_approval",
        }
    }
}

/// `skipped` counts requests another writer got to first, or that had
/// nothing to change; requests not yet due count only as examined.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub sweep: SweepKind,
    pub correlation_id: String,
    pub examined: usize,
    pub acted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SweepReport {
    fn new(sweep: SweepKind) -> Self {
        Self {
            sweep,
            correlation_id: format!("sweep-{}", Uuid::new_v4()),
            examined: 0,
            acted: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

enum ItemOutcome {
    Acted,
    Skipped,
    Idle,
}

impl LeaveWorkflowService {
    /// Auto-rejects overdue document waits and sends the 24h and 12h reminders.
    pub async fn run_document_sweep(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, ApplicationError> {
        let mut report = SweepReport::new(SweepKind::DocumentDeadline);
        let candidates = self.requests.list_awaiting_document().await?;

        for request in candidates {
            report.examined += 1;
            match self.sweep_document(&request, now).await {
                Ok(outcome) => tally(&mut report, outcome),
                Err(error) => {
                    report.failed += 1;
                    warn!(
                        event_name = "scheduler.document_sweep.item_failed",
                        correlation_id = %report.correlation_id,
                        request_id = request.id.0,
                        error = %error,
                        "document sweep could not process request"
                    );
                }
            }
        }

        self.finish(&report);
        Ok(report)
    }

    async fn sweep_document(
        &self,
        request: &LeaveRequest,
        now: DateTime<Utc>,
    ) -> Result<ItemOutcome, ApplicationError> {
        let Some(deadline) = request.document_deadline else {
            return Ok(ItemOutcome::Idle);
        };
        let remaining = deadline - now;

        if remaining <= Duration::zero() {
            let commit = approvals::expire_document(request, now)?;
            return match self.requests.commit(&commit).await {
                Ok(saved) => {
                    info!(
                        event_name = "workflow.request.auto_rejected",
                        request_id = saved.id.0,
                        "medical document deadline passed"
                    );
                    self.effects.dispatch(&[WorkflowEvent::AutoRejected { request: saved }]).await;
                    Ok(ItemOutcome::Acted)
                }
                Err(RepositoryError::Conflict { .. }) => Ok(ItemOutcome::Skipped),
                Err(error) => Err(error.into()),
            };
        }

        let tier = if remaining <= Duration::hours(URGENT_REMINDER_HOURS) {
            (!request.reminder_12h_sent).then_some(ReminderTier::Urgent)
        } else if remaining <= Duration::hours(FIRST_REMINDER_HOURS) {
            (!request.reminder_24h_sent).then_some(ReminderTier::First)
        } else {
            None
        };
        let Some(tier) = tier else {
            return Ok(ItemOutcome::Idle);
        };

        if !self.requests.mark_reminder_sent(request.id, tier).await? {
            return Ok(ItemOutcome::Skipped);
        }
        let event = WorkflowEvent::DocumentReminder {
            request: request.clone(),
            urgent: tier == ReminderTier::Urgent,
        };
        self.effects.dispatch(&[event]).await;
        Ok(ItemOutcome::Acted)
    }

    /// Delegates manager slots that have waited longer than the stale timeout.
    pub async fn run_stale_approval_sweep(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, ApplicationError> {
        let mut report = SweepReport::new(SweepKind::StaleApproval);
        let cutoff = now - Duration::hours(STALE_APPROVAL_TIMEOUT_HOURS);
        let candidates = self.requests.list_stale(cutoff, MAX_ESCALATIONS).await?;

        for request in candidates {
            report.examined += 1;
            match self.sweep_stale(&request, now, &report.correlation_id).await {
                Ok(Some(outcome)) => tally(&mut report, outcome),
                Ok(None) => report.failed += 1,
                Err(error) => {
                    report.failed += 1;
                    warn!(
                        event_name = "scheduler.stale_sweep.item_failed",
                        correlation_id = %report.correlation_id,
                        request_id = request.id.0,
                        error = %error,
                        "stale-approval sweep could not process request"
                    );
                }
            }
        }

        self.finish(&report);
        Ok(report)
    }

    /// `Ok(None)` when no approver could be resolved.
    async fn sweep_stale(
        &self,
        request: &LeaveRequest,
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> Result<Option<ItemOutcome>, ApplicationError> {
        let Some(approver) = request.current_approver_id else {
            return Ok(Some(ItemOutcome::Skipped));
        };
        let query = DelegationQuery {
            start_approver: approver,
            requester: request.employee_id,
            range: request.date_range(),
            reason: DelegationReason::Timeout,
            escalation_count: request.escalation_count,
        };

        let resolution = match self.delegation.find_next_available_approver(&query).await {
            Ok(resolution) => resolution,
            Err(DelegationError::ResolutionFailure { hops_walked, .. }) => {
                self.report_unresolved(request, approver, hops_walked, correlation_id).await;
                return Ok(None);
            }
            Err(DelegationError::Lookup(error)) => return Err(error.into()),
        };
        if !resolution.changes_approver() {
            return Ok(Some(ItemOutcome::Skipped));
        }

        let commit = approvals::apply_delegation(request, &resolution, now)?;
        let saved = match self.requests.commit(&commit).await {
            Ok(saved) => saved,
            Err(RepositoryError::Conflict { .. }) => return Ok(Some(ItemOutcome::Skipped)),
            Err(error) => return Err(error.into()),
        };
        info!(
            event_name = "workflow.request.delegated",
            correlation_id,
            request_id = saved.id.0,
            from_approver = approver.0,
            to_approver = resolution.approver.0,
            hops = resolution.hops.len(),
            reached_hr = resolution.reached_hr,
            escalation_count = saved.escalation_count,
            "stale approval delegated"
        );

        let event = WorkflowEvent::Delegated {
            request: saved,
            bypassed: Some(approver),
            reason: DelegationReason::Timeout,
        };
        self.effects.dispatch(&[event]).await;
        Ok(Some(ItemOutcome::Acted))
    }

    async fn report_unresolved(
        &self,
        request: &LeaveRequest,
        approver: EmployeeId,
        hops_walked: usize,
        correlation_id: &str,
    ) {
        warn!(
            event_name = "workflow.delegation.unresolved",
            correlation_id,
            request_id = request.id.0,
            approver = approver.0,
            escalation_count = request.escalation_count,
            hops_walked,
            "no approver available; request left unchanged"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(request.id),
                correlation_id,
                "delegation.resolution_failed",
                AuditCategory::Delegation,
                EmployeeId::SYSTEM,
                AuditOutcome::Failed,
            )
            .with_metadata("approver", approver)
            .with_metadata("escalation_count", request.escalation_count)
            .with_metadata("hops_walked", hops_walked),
        );
        self.effects
            .dispatch(&[WorkflowEvent::DelegationFailed { request: request.clone(), approver }])
            .await;
    }

    fn finish(&self, report: &SweepReport) {
        info!(
            event_name = "scheduler.sweep.completed",
            sweep = report.sweep.as_str(),
            correlation_id = %report.correlation_id,
            examined = report.examined,
            acted = report.acted,
            skipped = report.skipped,
            failed = report.failed,
            "sweep completed"
        );
        self.audit.emit(
            AuditEvent::new(
                None,
                report.correlation_id.clone(),
                "scheduler.sweep.completed",
                AuditCategory::Scheduler,
                EmployeeId::SYSTEM,
                if report.failed == 0 { AuditOutcome::Success } else { AuditOutcome::Failed },
            )
            .with_metadata("sweep", report.sweep.as_str())
            .with_metadata("examined", report.examined)
            .with_metadata("acted", report.acted)
            .with_metadata("skipped", report.skipped)
            .with_metadata("failed", report.failed),
        );
    }
}

fn tally(report: &mut SweepReport, outcome: ItemOutcome) {
    match outcome {
        ItemOutcome::Acted => report.acted += 1,
        ItemOutcome::Skipped => report.skipped += 1,
        ItemOutcome::Idle => {}
    }
}
