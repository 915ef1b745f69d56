//! Pure leave-request transitions.
//!
//! Every mutating operation takes the current row image plus already-loaded
//! employees and returns a [`TransitionCommit`]: the next row image together
//! with the audit rows that must be persisted with it. Nothing here touches
//! storage, so a rejected operation never leaves a partial write behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::{
    business_day_count, document_deadline, requires_document, requires_dual_approval,
};
use crate::delegation::DelegationResolution;
use crate::domain::approval::{ApprovalActionKind, ApprovalSlot, DelegationHop, NewApprovalAction};
use crate::domain::employee::{Employee, EmployeeId};
use crate::domain::leave::{
    DateRange, LeaveCategory, LeaveRequest, LeaveRequestId, LeaveStatus, SlotDecision,
};
use crate::errors::DomainError;
use crate::lifecycle::{LeaveLifecycle, LifecycleEvent};

pub const AUTO_REJECT_REASON: &str = "Medical document was not uploaded before the deadline";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLeaveRequest {
    pub employee_id: EmployeeId,
    pub category: String,
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
    pub reason: String,
}

/// Input that passed shape validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedLeaveRequest {
    pub employee_id: EmployeeId,
    pub category: LeaveCategory,
    pub range: DateRange,
    pub reason: String,
    pub business_days: u32,
}

impl NewLeaveRequest {
    pub fn validate(&self) -> Result<ValidatedLeaveRequest, DomainError> {
        let category = LeaveCategory::parse(&self.category).ok_or_else(|| {
            DomainError::validation(format!("unsupported leave category `{}`", self.category))
        })?;
        let range = DateRange::new(self.start_date, self.end_date)
            .ok_or_else(|| DomainError::validation("end date must not be before start date"))?;
        let reason = self.reason.trim();
        if reason.is_empty() {
            return Err(DomainError::validation("reason must not be empty"));
        }
        let business_days = business_day_count(&range);
        if business_days == 0 {
            return Err(DomainError::validation("request must cover at least one working day"));
        }

        Ok(ValidatedLeaveRequest {
            employee_id: self.employee_id,
            category,
            range,
            reason: reason.to_owned(),
            business_days,
        })
    }
}

/// Advisory results gathered from the capacity and blackout collaborators.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationAssessment {
    pub team_capacity_warning: bool,
    pub blackout_warning: bool,
}

/// The next row image of a request plus the audit rows committed with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionCommit {
    /// Carries the version it was computed from; storage bumps it on commit.
    pub request: LeaveRequest,
    /// `None` for creation.
    pub previous_status: Option<LeaveStatus>,
    pub actor_id: EmployeeId,
    pub actions: Vec<NewApprovalAction>,
    pub hops: Vec<DelegationHop>,
    pub at: DateTime<Utc>,
}

impl TransitionCommit {
    fn update(request: &LeaveRequest, actor_id: EmployeeId, at: DateTime<Utc>) -> Self {
        Self {
            request: request.clone(),
            previous_status: Some(request.status),
            actor_id,
            actions: Vec::new(),
            hops: Vec::new(),
            at,
        }
    }

    pub fn status_changed(&self) -> bool {
        self.previous_status != Some(self.request.status)
    }

    /// Points the manager slot at the resolved approver and records one
    /// `delegated` action plus every hop taken.
    pub fn record_delegation(&mut self, resolution: &DelegationResolution) {
        if !resolution.changes_approver() {
            return;
        }
        let hop_count = u32::try_from(resolution.hops.len()).unwrap_or(u32::MAX);
        let previous = self.request.current_approver_id;

        self.request.current_approver_id = Some(resolution.approver);
        self.request.escalation_count = self.request.escalation_count.saturating_add(hop_count);
        self.request.approver_assigned_at = self.at;
        self.actions.push(NewApprovalAction {
            actor_id: EmployeeId::SYSTEM,
            kind: ApprovalActionKind::Delegated,
            slot: Some(ApprovalSlot::Manager),
            comments: Some(delegation_comment(previous, resolution)),
        });
        self.hops.extend(resolution.hops.iter().copied());
    }
}

fn delegation_comment(previous: Option<EmployeeId>, resolution: &DelegationResolution) -> String {
    let reason = resolution.hops.first().map(|hop| hop.reason.as_str()).unwrap_or("unknown");
    match previous {
        Some(previous) => format!(
            "delegated from {previous} to {} after {} hop(s) ({reason})",
            resolution.approver,
            resolution.hops.len()
        ),
        None => format!("delegated to {} ({reason})", resolution.approver),
    }
}

/// Rule 5: the requester's own manager acts first, HR when there is none.
/// Individuals, managers and HR staff all escalate the same way; the requester
/// is never their own approver.
pub fn initial_approver(requester: &Employee, hr_employees: &[Employee]) -> Option<EmployeeId> {
    requester.manager_id.filter(|manager_id| *manager_id != requester.id).or_else(|| {
        hr_employees.iter().map(|hr| hr.id).find(|hr_id| *hr_id != requester.id)
    })
}

pub fn plan_creation(
    input: &ValidatedLeaveRequest,
    requester: &Employee,
    hr_employees: &[Employee],
    assessment: CreationAssessment,
    now: DateTime<Utc>,
) -> TransitionCommit {
    let dual = requires_dual_approval(&input.range);
    let needs_document = requires_document(input.category, &input.range);
    let status = if needs_document { LeaveStatus::PendingDocument } else { LeaveStatus::Pending };

    let request = LeaveRequest {
        id: LeaveRequestId::UNASSIGNED,
        employee_id: requester.id,
        category: input.category,
        start_date: input.range.start,
        end_date: input.range.end,
        reason: input.reason.clone(),
        status,
        manager_approval: SlotDecision::Pending,
        hr_approval: if dual { SlotDecision::Pending } else { SlotDecision::NotRequired },
        requires_dual_approval: dual,
        team_capacity_warning: assessment.team_capacity_warning,
        blackout_warning: assessment.blackout_warning,
        blackout_override: false,
        rejection_reason: None,
        current_approver_id: initial_approver(requester, hr_employees),
        escalation_count: 0,
        approver_assigned_at: now,
        business_days: input.business_days,
        document_ref: None,
        document_deadline: needs_document.then(|| document_deadline(now)),
        reminder_24h_sent: false,
        reminder_12h_sent: false,
        version: 0,
        created_at: now,
        updated_at: now,
    };

    TransitionCommit {
        request,
        previous_status: None,
        actor_id: requester.id,
        actions: Vec::new(),
        hops: Vec::new(),
        at: now,
    }
}

/// The request being decided together with the two people involved.
#[derive(Clone, Copy, Debug)]
pub struct ApprovalContext<'a> {
    pub request: &'a LeaveRequest,
    pub requester: &'a Employee,
    pub actor: &'a Employee,
}

impl ApprovalContext<'_> {
    /// HR stands in for the manager when a manager- or HR-role requester
    /// reports to this HR employee or has nobody above them.
    fn hr_acts_as_manager(&self) -> bool {
        self.requester.is_manager_or_hr()
            && match self.requester.manager_id {
                Some(manager_id) => manager_id == self.actor.id,
                None => true,
            }
    }

    fn ensure_not_self(&self, operation: &str) -> Result<(), DomainError> {
        if self.actor.id == self.request.employee_id {
            return Err(DomainError::unauthorized(format!(
                "employees cannot {operation} their own leave request"
            )));
        }
        Ok(())
    }
}

/// Decides which approval slot the actor's decision fills.
pub fn resolve_slot(
    context: &ApprovalContext<'_>,
    operation: &'static str,
) -> Result<ApprovalSlot, DomainError> {
    let request = context.request;
    let actor = context.actor;
    let delegated = request.is_delegated_approver(actor.id);

    let slot = if actor.is_hr() {
        if (context.hr_acts_as_manager() || delegated)
            && request.manager_approval == SlotDecision::Pending
        {
            ApprovalSlot::Manager
        } else {
            ApprovalSlot::Hr
        }
    } else if context.requester.manager_id == Some(actor.id) || delegated {
        ApprovalSlot::Manager
    } else {
        return Err(DomainError::unauthorized(format!(
            "employee {} is neither the direct manager nor the current approver",
            actor.id
        )));
    };

    let decision = match slot {
        ApprovalSlot::Manager => request.manager_approval,
        ApprovalSlot::Hr => request.hr_approval,
    };
    if decision != SlotDecision::Pending {
        return Err(DomainError::StateConflict { operation, status: request.status });
    }

    Ok(slot)
}

pub fn approve(
    context: &ApprovalContext<'_>,
    blackout_override: bool,
    comments: Option<String>,
    now: DateTime<Utc>,
) -> Result<TransitionCommit, DomainError> {
    let request = context.request;
    context.ensure_not_self("approve")?;
    LeaveLifecycle.apply(request.status, LifecycleEvent::SlotApproved { fully_resolved: false })?;

    if request.blackout_warning && !request.blackout_override && !blackout_override {
        return Err(DomainError::PolicyViolation(
            crate::errors::PolicyViolation::BlackoutOverrideRequired,
        ));
    }

    let slot = resolve_slot(context, "approve")?;
    let mut commit = TransitionCommit::update(request, context.actor.id, now);
    let next = &mut commit.request;
    if blackout_override {
        next.blackout_override = true;
    }
    match slot {
        ApprovalSlot::Manager => next.manager_approval = SlotDecision::Approved,
        ApprovalSlot::Hr => next.hr_approval = SlotDecision::Approved,
    }

    let fully_resolved = next.both_slots_satisfied();
    next.status = LeaveLifecycle
        .apply(next.status, LifecycleEvent::SlotApproved { fully_resolved })?
        .to;
    next.updated_at = now;

    commit.actions.push(NewApprovalAction {
        actor_id: context.actor.id,
        kind: ApprovalActionKind::Approved,
        slot: Some(slot),
        comments: comments.filter(|text| !text.trim().is_empty()),
    });
    Ok(commit)
}

pub fn reject(
    context: &ApprovalContext<'_>,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<TransitionCommit, DomainError> {
    let request = context.request;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(DomainError::validation("a rejection reason is required"));
    }
    context.ensure_not_self("reject")?;
    let outcome = LeaveLifecycle.apply(request.status, LifecycleEvent::SlotRejected)?;

    let slot = resolve_slot(context, "reject")?;
    let mut commit = TransitionCommit::update(request, context.actor.id, now);
    let next = &mut commit.request;
    match slot {
        ApprovalSlot::Manager => next.manager_approval = SlotDecision::Rejected,
        ApprovalSlot::Hr => next.hr_approval = SlotDecision::Rejected,
    }
    next.status = outcome.to;
    next.rejection_reason = Some(reason.to_owned());
    next.updated_at = now;

    commit.actions.push(NewApprovalAction {
        actor_id: context.actor.id,
        kind: ApprovalActionKind::Rejected,
        slot: Some(slot),
        comments: Some(reason.to_owned()),
    });
    Ok(commit)
}

pub fn cancel(
    request: &LeaveRequest,
    actor_id: EmployeeId,
    now: DateTime<Utc>,
) -> Result<TransitionCommit, DomainError> {
    if actor_id != request.employee_id {
        return Err(DomainError::unauthorized("only the requester can cancel a leave request"));
    }
    let outcome = LeaveLifecycle.apply(request.status, LifecycleEvent::CancelRequested)?;

    let mut commit = TransitionCommit::update(request, actor_id, now);
    commit.request.status = outcome.to;
    commit.request.updated_at = now;
    Ok(commit)
}

pub fn upload_document(
    request: &LeaveRequest,
    actor: &Employee,
    document_ref: &str,
    now: DateTime<Utc>,
) -> Result<TransitionCommit, DomainError> {
    let document_ref = document_ref.trim();
    if document_ref.is_empty() {
        return Err(DomainError::validation("document reference must not be empty"));
    }
    if actor.id != request.employee_id && !actor.is_hr() {
        return Err(DomainError::unauthorized(
            "only the requester or HR can attach a medical document",
        ));
    }
    let outcome = LeaveLifecycle.apply(request.status, LifecycleEvent::DocumentUploaded)?;

    let mut commit = TransitionCommit::update(request, actor.id, now);
    let next = &mut commit.request;
    next.status = outcome.to;
    next.document_ref = Some(document_ref.to_owned());
    next.document_deadline = None;
    next.updated_at = now;
    Ok(commit)
}

/// Auto-rejection once the document deadline has passed. Attributed to SYSTEM.
pub fn expire_document(
    request: &LeaveRequest,
    now: DateTime<Utc>,
) -> Result<TransitionCommit, DomainError> {
    let outcome = LeaveLifecycle.apply(request.status, LifecycleEvent::DocumentDeadlineMissed)?;

    let mut commit = TransitionCommit::update(request, EmployeeId::SYSTEM, now);
    let next = &mut commit.request;
    next.status = outcome.to;
    next.rejection_reason = Some(AUTO_REJECT_REASON.to_owned());
    next.updated_at = now;
    commit.actions.push(NewApprovalAction {
        actor_id: EmployeeId::SYSTEM,
        kind: ApprovalActionKind::Rejected,
        slot: None,
        comments: Some(AUTO_REJECT_REASON.to_owned()),
    });
    Ok(commit)
}

pub fn apply_delegation(
    request: &LeaveRequest,
    resolution: &DelegationResolution,
    now: DateTime<Utc>,
) -> Result<TransitionCommit, DomainError> {
    if request.status.is_terminal() || request.manager_approval != SlotDecision::Pending {
        return Err(DomainError::StateConflict { operation: "delegate", status: request.status });
    }
    if !resolution.changes_approver() {
        return Err(DomainError::validation("delegation resolution contains no hops"));
    }

    let mut commit = TransitionCommit::update(request, EmployeeId::SYSTEM, now);
    commit.record_delegation(resolution);
    commit.request.updated_at = now;
    Ok(commit)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    use super::{
        apply_delegation, approve, cancel, expire_document, initial_approver, plan_creation,
        reject, resolve_slot, upload_document, ApprovalContext, CreationAssessment,
        NewLeaveRequest, AUTO_REJECT_REASON,
    };
    use crate::delegation::DelegationResolution;
    use crate::domain::approval::{
        ApprovalActionKind, ApprovalSlot, DelegationHop, DelegationReason,
    };
    use crate::domain::employee::{Employee, EmployeeId, EmployeeRole};
    use crate::domain::leave::{LeaveRequest, LeaveRequestId, LeaveStatus, SlotDecision};
    use crate::errors::{DomainError, PolicyViolation};
    use crate::org::test_support::employee;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).single().expect("timestamp")
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).expect("date")
    }

    fn hr() -> Employee {
        employee(90, EmployeeRole::Hr, None)
    }

    fn manager() -> Employee {
        employee(20, EmployeeRole::Manager, Some(30))
    }

    fn individual() -> Employee {
        employee(10, EmployeeRole::Individual, Some(20))
    }

    fn created(
        requester: &Employee,
        category: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> LeaveRequest {
        let input = NewLeaveRequest {
            employee_id: requester.id,
            category: category.to_owned(),
            start_date: start,
            end_date: end,
            reason: "family trip".to_owned(),
        }
        .validate()
        .expect("valid input");
        let mut request =
            plan_creation(&input, requester, &[hr()], CreationAssessment::default(), now()).request;
        request.id = LeaveRequestId(1);
        request
    }

    fn five_day(requester: &Employee) -> LeaveRequest {
        created(requester, "annual", date(4, 8), date(4, 12))
    }

    fn ctx<'a>(
        request: &'a LeaveRequest,
        requester: &'a Employee,
        actor: &'a Employee,
    ) -> ApprovalContext<'a> {
        ApprovalContext { request, requester, actor }
    }

    #[test]
    fn short_request_needs_only_the_manager() {
        let requester = individual();
        let request = created(&requester, "casual", date(4, 8), date(4, 9));

        assert_eq!(request.status, LeaveStatus::Pending);
        assert_eq!(request.hr_approval, SlotDecision::NotRequired);
        assert_eq!(request.current_approver_id, Some(EmployeeId(20)));
        assert_eq!(request.business_days, 2);

        let commit = approve(&ctx(&request, &requester, &manager()), false, None, now())
            .expect("manager approves");
        assert_eq!(commit.request.status, LeaveStatus::Approved);
        assert_eq!(commit.previous_status, Some(LeaveStatus::Pending));
        assert_eq!(commit.actions[0].slot, Some(ApprovalSlot::Manager));
    }

    #[test]
    fn long_sick_leave_waits_for_document_with_deadline() {
        let requester = individual();
        let request = created(&requester, "sick", date(4, 8), date(4, 12));

        assert_eq!(request.status, LeaveStatus::PendingDocument);
        assert!(request.requires_dual_approval);
        assert_eq!(request.document_deadline, Some(now() + chrono::Duration::days(3)));
    }

    #[test]
    fn input_validation_rejects_bad_shapes() {
        let base = NewLeaveRequest {
            employee_id: EmployeeId(10),
            category: "casual".to_owned(),
            start_date: date(4, 9),
            end_date: date(4, 8),
            reason: "x".to_owned(),
        };
        assert!(matches!(base.validate(), Err(DomainError::Validation(_))));

        let unknown = NewLeaveRequest { category: "sabbatical".to_owned(), end_date: date(4, 10), ..base.clone() };
        assert!(matches!(unknown.validate(), Err(DomainError::Validation(m)) if m.contains("sabbatical")));

        let weekend = NewLeaveRequest { start_date: date(4, 6), end_date: date(4, 7), ..base.clone() };
        assert!(matches!(weekend.validate(), Err(DomainError::Validation(_))));

        let blank = NewLeaveRequest { end_date: date(4, 10), reason: "  ".to_owned(), ..base };
        assert!(matches!(blank.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn rule_five_routes_to_manager_then_hr_and_never_self() {
        let hr_list = vec![employee(5, EmployeeRole::Hr, None), employee(6, EmployeeRole::Hr, None)];

        assert_eq!(initial_approver(&individual(), &hr_list), Some(EmployeeId(20)));
        assert_eq!(initial_approver(&manager(), &hr_list), Some(EmployeeId(30)));
        let orphan = employee(11, EmployeeRole::Individual, None);
        assert_eq!(initial_approver(&orphan, &hr_list), Some(EmployeeId(5)));
        let top_hr = employee(5, EmployeeRole::Hr, None);
        assert_eq!(initial_approver(&top_hr, &hr_list), Some(EmployeeId(6)));
        assert_eq!(initial_approver(&top_hr, &hr_list[..1]), None);
    }

    #[test]
    fn dual_approval_is_never_approved_with_a_pending_slot() {
        let requester = individual();
        let request = five_day(&requester);

        let after_manager = approve(&ctx(&request, &requester, &manager()), false, None, now())
            .expect("manager approves")
            .request;
        assert_eq!(after_manager.status, LeaveStatus::PartiallyApproved);
        assert_eq!(after_manager.hr_approval, SlotDecision::Pending);

        let after_hr = approve(&ctx(&after_manager, &requester, &hr()), false, None, now())
            .expect("hr approves")
            .request;
        assert_eq!(after_hr.status, LeaveStatus::Approved);
    }

    #[test]
    fn hr_first_fills_hr_slot_for_individual_requester() {
        let requester = individual();
        let request = five_day(&requester);

        let commit = approve(&ctx(&request, &requester, &hr()), false, None, now()).expect("hr");
        assert_eq!(commit.actions[0].slot, Some(ApprovalSlot::Hr));
        assert_eq!(commit.request.status, LeaveStatus::PartiallyApproved);
        assert_eq!(commit.request.manager_approval, SlotDecision::Pending);
    }

    #[test]
    fn hr_fills_both_slots_for_manager_without_a_boss() {
        let requester = employee(20, EmployeeRole::Manager, None);
        let request = five_day(&requester);
        assert_eq!(request.current_approver_id, Some(EmployeeId(90)));

        let first = approve(&ctx(&request, &requester, &hr()), false, None, now()).expect("first");
        assert_eq!(first.actions[0].slot, Some(ApprovalSlot::Manager));
        let second =
            approve(&ctx(&first.request, &requester, &hr()), false, None, now()).expect("second");
        assert_eq!(second.actions[0].slot, Some(ApprovalSlot::Hr));
        assert_eq!(second.request.status, LeaveStatus::Approved);
    }

    #[test]
    fn delegated_hr_approver_fills_manager_slot() {
        let requester = individual();
        let mut request = five_day(&requester);
        request.current_approver_id = Some(EmployeeId(90));

        let slot = resolve_slot(&ctx(&request, &requester, &hr()), "approve").expect("slot");
        assert_eq!(slot, ApprovalSlot::Manager);
    }

    #[test]
    fn unrelated_manager_is_unauthorized() {
        let requester = individual();
        let request = five_day(&requester);
        let stranger = employee(77, EmployeeRole::Manager, None);

        let error = approve(&ctx(&request, &requester, &stranger), false, None, now())
            .expect_err("not their report");
        assert!(matches!(error, DomainError::Unauthorized(_)));
    }

    #[test]
    fn delegated_manager_can_act_on_manager_slot() {
        let requester = individual();
        let mut request = five_day(&requester);
        request.current_approver_id = Some(EmployeeId(30));
        let grand_manager = employee(30, EmployeeRole::Manager, None);

        let commit = approve(&ctx(&request, &requester, &grand_manager), false, None, now())
            .expect("delegate approves");
        assert_eq!(commit.request.manager_approval, SlotDecision::Approved);
    }

    #[test]
    fn deciding_an_already_decided_slot_is_a_state_conflict() {
        let requester = individual();
        let request = five_day(&requester);
        let once = approve(&ctx(&request, &requester, &manager()), false, None, now())
            .expect("first approval")
            .request;

        let error = approve(&ctx(&once, &requester, &manager()), false, None, now())
            .expect_err("slot already decided");
        assert!(matches!(error, DomainError::StateConflict { operation: "approve", .. }));
    }

    #[test]
    fn self_action_is_forbidden_for_every_role() {
        let people = [
            individual(),
            manager(),
            employee(90, EmployeeRole::Hr, Some(20)),
            employee(91, EmployeeRole::Hr, None),
        ];
        for requester in people {
            let mut request = five_day(&requester);
            request.current_approver_id = Some(requester.id);

            let approval = approve(&ctx(&request, &requester, &requester), true, None, now());
            let rejection = reject(&ctx(&request, &requester, &requester), "no", now());

            assert!(matches!(approval, Err(DomainError::Unauthorized(_))), "{:?}", requester.role);
            assert!(matches!(rejection, Err(DomainError::Unauthorized(_))), "{:?}", requester.role);
        }
    }

    #[test]
    fn veto_rejects_regardless_of_other_slot() {
        let requester = individual();
        let request = five_day(&requester);
        let partial = approve(&ctx(&request, &requester, &manager()), false, None, now())
            .expect("manager")
            .request;

        let rejected = reject(&ctx(&partial, &requester, &hr()), "coverage gap", now())
            .expect("hr vetoes")
            .request;
        assert_eq!(rejected.status, LeaveStatus::Rejected);
        assert_eq!(rejected.manager_approval, SlotDecision::Approved);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("coverage gap"));

        let again = approve(&ctx(&rejected, &requester, &hr()), false, None, now());
        assert!(matches!(again, Err(DomainError::StateConflict { .. })));
    }

    #[test]
    fn rejection_requires_a_reason() {
        let requester = individual();
        let request = five_day(&requester);
        let error = reject(&ctx(&request, &requester, &manager()), "   ", now()).expect_err("blank");
        assert!(matches!(error, DomainError::Validation(_)));
    }

    #[test]
    fn blackout_override_is_required_once_and_remembered() {
        let requester = individual();
        let mut request = five_day(&requester);
        request.blackout_warning = true;

        let missing = approve(&ctx(&request, &requester, &manager()), false, None, now());
        assert_eq!(
            missing,
            Err(DomainError::PolicyViolation(PolicyViolation::BlackoutOverrideRequired))
        );

        let overridden = approve(&ctx(&request, &requester, &manager()), true, None, now())
            .expect("override supplied")
            .request;
        assert!(overridden.blackout_override);

        let hr_done = approve(&ctx(&overridden, &requester, &hr()), false, None, now())
            .expect("stored override carries over");
        assert_eq!(hr_done.request.status, LeaveStatus::Approved);
    }

    #[test]
    fn approval_is_blocked_while_document_is_missing() {
        let requester = individual();
        let request = created(&requester, "sick", date(4, 8), date(4, 12));

        let error = approve(&ctx(&request, &requester, &manager()), false, None, now())
            .expect_err("gated");
        assert!(matches!(
            error,
            DomainError::StateConflict { status: LeaveStatus::PendingDocument, .. }
        ));
    }

    #[test]
    fn document_upload_by_requester_or_hr_clears_deadline() {
        let requester = individual();
        let request = created(&requester, "sick", date(4, 8), date(4, 12));

        let by_peer = upload_document(&request, &manager(), "doc-1", now());
        assert!(matches!(by_peer, Err(DomainError::Unauthorized(_))));
        let blank = upload_document(&request, &requester, " ", now());
        assert!(matches!(blank, Err(DomainError::Validation(_))));

        let uploaded = upload_document(&request, &hr(), "s3://docs/1.pdf", now()).expect("hr");
        assert_eq!(uploaded.request.status, LeaveStatus::Pending);
        assert_eq!(uploaded.request.document_deadline, None);
        assert_eq!(uploaded.request.document_ref.as_deref(), Some("s3://docs/1.pdf"));

        let twice = upload_document(&uploaded.request, &requester, "doc-2", now());
        assert!(matches!(twice, Err(DomainError::StateConflict { .. })));
    }

    #[test]
    fn requester_may_withdraw_an_approved_request() {
        let requester = individual();
        let request = created(&requester, "casual", date(4, 8), date(4, 9));
        let approved = approve(&ctx(&request, &requester, &manager()), false, None, now())
            .expect("manager approves")
            .request;
        assert_eq!(approved.status, LeaveStatus::Approved);

        let commit = cancel(&approved, requester.id, now()).expect("withdraw");
        assert_eq!(commit.previous_status, Some(LeaveStatus::Approved));
        assert_eq!(commit.request.status, LeaveStatus::Cancelled);
        assert!(matches!(
            cancel(&approved, EmployeeId(20), now()),
            Err(DomainError::Unauthorized(_))
        ));
    }

    #[test]
    fn only_requester_cancels_and_only_once() {
        let requester = individual();
        let request = five_day(&requester);

        assert!(matches!(
            cancel(&request, EmployeeId(20), now()),
            Err(DomainError::Unauthorized(_))
        ));
        let cancelled = cancel(&request, requester.id, now()).expect("cancel").request;
        assert_eq!(cancelled.status, LeaveStatus::Cancelled);
        assert!(matches!(
            cancel(&cancelled, requester.id, now()),
            Err(DomainError::StateConflict { operation: "cancel", .. })
        ));
    }

    #[test]
    fn expired_document_is_rejected_by_system() {
        let requester = individual();
        let request = created(&requester, "sick", date(4, 8), date(4, 12));

        let commit = expire_document(&request, now()).expect("expire");
        assert_eq!(commit.actor_id, EmployeeId::SYSTEM);
        assert_eq!(commit.request.status, LeaveStatus::Rejected);
        assert_eq!(commit.request.rejection_reason.as_deref(), Some(AUTO_REJECT_REASON));
        assert_eq!(commit.actions[0].slot, None);
    }

    #[test]
    fn delegation_moves_approver_and_counts_hops() {
        let requester = individual();
        let request = five_day(&requester);
        let later = now() + chrono::Duration::hours(49);
        let resolution = DelegationResolution {
            approver: EmployeeId(90),
            hops: vec![
                DelegationHop {
                    from_approver_id: EmployeeId(20),
                    to_approver_id: EmployeeId(30),
                    reason: DelegationReason::Timeout,
                },
                DelegationHop {
                    from_approver_id: EmployeeId(30),
                    to_approver_id: EmployeeId(90),
                    reason: DelegationReason::AlsoUnavailable,
                },
            ],
            reached_hr: true,
        };

        let commit = apply_delegation(&request, &resolution, later).expect("delegate");
        assert_eq!(commit.request.current_approver_id, Some(EmployeeId(90)));
        assert_eq!(commit.request.escalation_count, 2);
        assert_eq!(commit.request.approver_assigned_at, later);
        assert_eq!(commit.request.status, LeaveStatus::Pending);
        assert!(!commit.status_changed());
        assert_eq!(commit.actions.len(), 1);
        assert_eq!(commit.actions[0].kind, ApprovalActionKind::Delegated);
        assert_eq!(commit.hops.len(), 2);

        let cancelled = cancel(&request, requester.id, now()).expect("cancel").request;
        assert!(matches!(
            apply_delegation(&cancelled, &resolution, later),
            Err(DomainError::StateConflict { operation: "delegate", .. })
        ));
    }
}
