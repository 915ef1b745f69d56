use tokio::sync::RwLock;

use crate::domain::employee::EmployeeId;
use crate::domain::leave::DateRange;
use crate::ports::CollaboratorError;

#[async_trait::async_trait]
pub trait AvailabilityOracle: Send + Sync {
    /// True iff the employee holds an approved leave intersecting `range` (inclusive).
    async fn is_unavailable(
        &self,
        employee_id: EmployeeId,
        range: &DateRange,
    ) -> Result<bool, CollaboratorError>;
}

#[derive(Default)]
pub struct InMemoryAvailabilityOracle {
    approved_leave: RwLock<Vec<(EmployeeId, DateRange)>>,
}

impl InMemoryAvailabilityOracle {
    pub fn with_leave(approved_leave: Vec<(EmployeeId, DateRange)>) -> Self {
        Self { approved_leave: RwLock::new(approved_leave) }
    }

    pub async fn add_leave(&self, employee_id: EmployeeId, range: DateRange) {
        self.approved_leave.write().await.push((employee_id, range));
    }
}

#[async_trait::async_trait]
impl AvailabilityOracle for InMemoryAvailabilityOracle {
    async fn is_unavailable(
        &self,
        employee_id: EmployeeId,
        range: &DateRange,
    ) -> Result<bool, CollaboratorError> {
        let approved_leave = self.approved_leave.read().await;
        Ok(approved_leave.iter().any(|(id, leave)| *id == employee_id && leave.overlaps(range)))
    }
}
