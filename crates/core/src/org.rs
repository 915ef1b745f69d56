use std::collections::BTreeMap;

use crate::domain::employee::{Employee, EmployeeId};
use crate::ports::CollaboratorError;

/// Read-only view of the reporting hierarchy.
#[async_trait::async_trait]
pub trait OrgGraph: Send + Sync {
    async fn employee(&self, id: EmployeeId) -> Result<Option<Employee>, CollaboratorError>;

    /// All HR-role employees ordered by id. May be empty.
    async fn hr_employees(&self) -> Result<Vec<Employee>, CollaboratorError>;

    async fn direct_reports(&self, manager_id: EmployeeId)
        -> Result<Vec<Employee>, CollaboratorError>;

    async fn team_size(&self, department: &str) -> Result<u32, CollaboratorError>;

    async fn reporting_manager_of(
        &self,
        id: EmployeeId,
    ) -> Result<Option<Employee>, CollaboratorError> {
        let Some(employee) = self.employee(id).await? else {
            return Ok(None);
        };
        match employee.manager_id {
            Some(manager_id) => self.employee(manager_id).await,
            None => Ok(None),
        }
    }

    async fn is_hr(&self, id: EmployeeId) -> Result<bool, CollaboratorError> {
        Ok(self.employee(id).await?.is_some_and(|employee| employee.is_hr()))
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryOrgGraph {
    employees: BTreeMap<EmployeeId, Employee>,
}

impl InMemoryOrgGraph {
    pub fn new(employees: Vec<Employee>) -> Self {
        Self { employees: employees.into_iter().map(|employee| (employee.id, employee)).collect() }
    }
}

#[async_trait::async_trait]
impl OrgGraph for InMemoryOrgGraph {
    async fn employee(&self, id: EmployeeId) -> Result<Option<Employee>, CollaboratorError> {
        Ok(self.employees.get(&id).cloned())
    }

    async fn hr_employees(&self) -> Result<Vec<Employee>, CollaboratorError> {
        Ok(self.employees.values().filter(|employee| employee.is_hr()).cloned().collect())
    }

    async fn direct_reports(
        &self,
        manager_id: EmployeeId,
    ) -> Result<Vec<Employee>, CollaboratorError> {
        Ok(self
            .employees
            .values()
            .filter(|employee| employee.manager_id == Some(manager_id))
            .cloned()
            .collect())
    }

    async fn team_size(&self, department: &str) -> Result<u32, CollaboratorError> {
        let size = self
            .employees
            .values()
            .filter(|employee| employee.department.eq_ignore_ascii_case(department))
            .count();
        Ok(u32::try_from(size).unwrap_or(u32::MAX))
    }
}
