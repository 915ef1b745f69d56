pub mod effects;
pub mod scheduler;
pub mod service;
pub mod sweeps;

pub use effects::{BalanceEffects, NotificationEffects};
pub use scheduler::SweepScheduler;
pub use service::{CreatedRequest, CreationWarning, LeaveWorkflowService, WorkflowDependencies};
pub use sweeps::{SweepKind, SweepReport, STALE_APPROVAL_TIMEOUT_HOURS};
