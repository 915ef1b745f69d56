pub mod approvals;
pub mod audit;
pub mod availability;
pub mod calendar;
pub mod config;
pub mod delegation;
pub mod domain;
pub mod effects;
pub mod errors;
pub mod lifecycle;
pub mod org;
pub mod ports;

pub use approvals::{
    ApprovalContext, CreationAssessment, NewLeaveRequest, TransitionCommit, ValidatedLeaveRequest,
    AUTO_REJECT_REASON,
};
pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
pub use availability::{AvailabilityOracle, InMemoryAvailabilityOracle};
pub use delegation::{
    DelegationEngine, DelegationError, DelegationQuery, DelegationResolution, MAX_ESCALATIONS,
};
pub use domain::approval::{
    ApprovalAction, ApprovalActionKind, ApprovalSlot, DelegationHop, DelegationHopEntry,
    DelegationReason, NewApprovalAction, StatusLogEntry,
};
pub use domain::employee::{Employee, EmployeeId, EmployeeRole};
pub use domain::leave::{
    DateRange, LeaveCategory, LeaveRequest, LeaveRequestId, LeaveStatus, ReminderTier,
    SlotDecision,
};
pub use effects::{EffectDispatcher, EffectHandler, WorkflowEvent};
pub use errors::{ApplicationError, DomainError, InterfaceError, PolicyViolation};
pub use lifecycle::{LeaveLifecycle, LifecycleEvent, TransitionError};
pub use org::{InMemoryOrgGraph, OrgGraph};
pub use ports::{
    BalanceService, BlackoutPeriod, BlackoutService, CapacityReport, CapacityService,
    CollaboratorError, NotificationKind, NotificationSink,
};
