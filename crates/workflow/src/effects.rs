use std::sync::Arc;

use leaveflow_core::calendar;
use leaveflow_core::domain::approval::ApprovalSlot;
use leaveflow_core::domain::employee::EmployeeId;
use leaveflow_core::domain::leave::{LeaveRequest, LeaveStatus};
use leaveflow_core::effects::{EffectHandler, WorkflowEvent};
use leaveflow_core::org::OrgGraph;
use leaveflow_core::ports::{BalanceService, CollaboratorError, NotificationKind, NotificationSink};

/// Tells approvers, requesters and HR what changed.
pub struct NotificationEffects {
    sink: Arc<dyn NotificationSink>,
    org: Arc<dyn OrgGraph>,
}

impl NotificationEffects {
    pub fn new(sink: Arc<dyn NotificationSink>, org: Arc<dyn OrgGraph>) -> Self {
        Self { sink, org }
    }

    async fn hr_recipients(&self, request: &LeaveRequest) -> Result<Vec<EmployeeId>, CollaboratorError> {
        Ok(self
            .org
            .hr_employees()
            .await?
            .into_iter()
            .map(|employee| employee.id)
            .filter(|id| *id != request.employee_id)
            .collect())
    }

    fn plan(
        &self,
        event: &WorkflowEvent,
        hr: &[EmployeeId],
    ) -> Vec<(EmployeeId, NotificationKind, String)> {
        let request = event.request();
        let id = request.id;
        let requester = request.employee_id;
        let approver = request.current_approver_id;
        let mut out = Vec::new();

        match event {
            WorkflowEvent::Submitted { .. } if request.status == LeaveStatus::PendingDocument => {
                out.push((
                    requester,
                    NotificationKind::DocumentRequired,
                    format!("Leave request #{id} needs a medical document before it can be reviewed"),
                ));
            }
            WorkflowEvent::Submitted { .. } | WorkflowEvent::DocumentUploaded { .. } => {
                // A submission already escalated at creation is announced by the
                // following `Delegated` event.
                let delegated_at_creation = matches!(event, WorkflowEvent::Submitted { .. })
                    && request.escalation_count > 0;
                if let Some(approver) = approver.filter(|_| !delegated_at_creation) {
                    out.push((
                        approver,
                        NotificationKind::ApprovalRequested,
                        format!("Leave request #{id} from employee {requester} awaits your approval"),
                    ));
                }
                if request.awaiting_hr() {
                    for hr_id in hr {
                        out.push((
                            *hr_id,
                            NotificationKind::ApprovalRequested,
                            format!("Leave request #{id} needs HR approval"),
                        ));
                    }
                }
                if matches!(event, WorkflowEvent::DocumentUploaded { .. }) {
                    out.push((
                        requester,
                        NotificationKind::DocumentUploaded,
                        format!("Document received for leave request #{id}"),
                    ));
                }
            }
            WorkflowEvent::PartiallyApproved { slot, actor_id, .. } => {
                out.push((
                    requester,
                    NotificationKind::RequestPartiallyApproved,
                    format!("Leave request #{id} was approved by {actor_id} ({})", slot.as_str()),
                ));
                if *slot == ApprovalSlot::Manager && request.awaiting_hr() {
                    for hr_id in hr.iter().filter(|hr_id| **hr_id != *actor_id) {
                        out.push((
                            *hr_id,
                            NotificationKind::ApprovalRequested,
                            format!("Leave request #{id} is manager-approved and needs HR approval"),
                        ));
                    }
                }
            }
            WorkflowEvent::Approved { .. } => out.push((
                requester,
                NotificationKind::RequestApproved,
                format!("Leave request #{id} is approved"),
            )),
            WorkflowEvent::Rejected { .. } => out.push((
                requester,
                NotificationKind::RequestRejected,
                format!(
                    "Leave request #{id} was rejected: {}",
                    request.rejection_reason.as_deref().unwrap_or("no reason given")
                ),
            )),
            WorkflowEvent::Cancelled { .. } => {
                if let Some(approver) = approver {
                    out.push((
                        approver,
                        NotificationKind::RequestCancelled,
                        format!("Leave request #{id} was cancelled by the requester"),
                    ));
                }
            }
            WorkflowEvent::AutoRejected { .. } => out.push((
                requester,
                NotificationKind::AutoRejected,
                format!("Leave request #{id} was rejected automatically: no medical document arrived in time"),
            )),
            WorkflowEvent::Delegated { bypassed, reason, .. } => {
                if let Some(bypassed) = bypassed {
                    out.push((
                        *bypassed,
                        NotificationKind::EscalationBypassed,
                        format!("Leave request #{id} was reassigned away from you ({})", reason.as_str()),
                    ));
                }
                if let Some(approver) = approver {
                    out.push((
                        approver,
                        NotificationKind::Escalated,
                        format!("Leave request #{id} was escalated to you ({})", reason.as_str()),
                    ));
                }
                out.push((
                    requester,
                    NotificationKind::Escalated,
                    format!("Leave request #{id} now awaits a different approver"),
                ));
            }
            WorkflowEvent::DocumentReminder { urgent, .. } => {
                let kind = if *urgent {
                    NotificationKind::DocumentReminderUrgent
                } else {
                    NotificationKind::DocumentReminder
                };
                out.push((requester, kind, format!("Upload the medical document for leave request #{id}")));
            }
            WorkflowEvent::DelegationFailed { approver, .. } => {
                out.push((
                    requester,
                    NotificationKind::DelegationFailed,
                    format!("Leave request #{id} could not be escalated and stays with {approver}"),
                ));
                out.push((
                    *approver,
                    NotificationKind::DelegationFailed,
                    format!("Leave request #{id} is overdue and no other approver is available"),
                ));
            }
        }
        out
    }
}

#[async_trait::async_trait]
impl EffectHandler for NotificationEffects {
    fn name(&self) -> &'static str {
        "notifications"
    }

    /// Every recipient is attempted; the last failure is reported.
    async fn handle(&self, event: &WorkflowEvent) -> Result<(), CollaboratorError> {
        let hr = self.hr_recipients(event.request()).await?;
        let mut outcome = Ok(());
        for (recipient, kind, message) in self.plan(event, &hr) {
            if let Err(error) =
                self.sink.notify(recipient, kind, &message, Some(event.request().id)).await
            {
                outcome = Err(error);
            }
        }
        outcome
    }
}

/// Draws business days from the allowance once a request is fully approved and
/// returns them when the requester withdraws an approved request.
pub struct BalanceEffects {
    balance: Arc<dyn BalanceService>,
}

impl BalanceEffects {
    pub fn new(balance: Arc<dyn BalanceService>) -> Self {
        Self { balance }
    }
}

#[async_trait::async_trait]
impl EffectHandler for BalanceEffects {
    fn name(&self) -> &'static str {
        "balance"
    }

    async fn handle(&self, event: &WorkflowEvent) -> Result<(), CollaboratorError> {
        match event {
            WorkflowEvent::Approved { request, .. } if request.category.is_balance_tracked() => {
                for (year, days) in calendar::business_days_by_year(&request.date_range()) {
                    self.balance.deduct(request.employee_id, request.category, year, days).await?;
                }
                Ok(())
            }
            WorkflowEvent::Cancelled { request, previous_status: LeaveStatus::Approved }
                if request.category.is_balance_tracked() =>
            {
                for (year, days) in calendar::business_days_by_year(&request.date_range()) {
                    self.balance.credit(request.employee_id, request.category, year, days).await?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
