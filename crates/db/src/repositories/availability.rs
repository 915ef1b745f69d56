use std::sync::Arc;

use leaveflow_core::availability::AvailabilityOracle;
use leaveflow_core::domain::employee::EmployeeId;
use leaveflow_core::domain::leave::DateRange;
use leaveflow_core::ports::CollaboratorError;

use super::LeaveRequestRepository;

/// Availability derived from approved leave stored in the repository.
pub struct RepositoryAvailabilityOracle {
    requests: Arc<dyn LeaveRequestRepository>,
}

impl RepositoryAvailabilityOracle {
    pub fn new(requests: Arc<dyn LeaveRequestRepository>) -> Self {
        Self { requests }
    }
}

#[async_trait::async_trait]
impl AvailabilityOracle for RepositoryAvailabilityOracle {
    async fn is_unavailable(
        &self,
        employee_id: EmployeeId,
        range: &DateRange,
    ) -> Result<bool, CollaboratorError> {
        Ok(self.requests.has_approved_overlap(employee_id, range).await?)
    }
}
