use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use leaveflow_core::domain::employee::{Employee, EmployeeId, EmployeeRole};
use leaveflow_core::org::OrgGraph;
use leaveflow_core::ports::CollaboratorError;

use super::{decode_enum, RepositoryError};
use crate::DbPool;

const EMPLOYEE_COLUMNS: &str = "id, name, email, role, department, manager_id";

/// SQL-backed org graph. Manager links are read as stored, dangling ones included.
#[derive(Clone)]
pub struct SqlEmployeeRepository {
    pool: DbPool,
}

impl SqlEmployeeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, employee: &Employee) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO employee (id, name, email, role, department, manager_id)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                role = excluded.role,
                department = excluded.department,
                manager_id = excluded.manager_id",
        )
        .bind(employee.id.0)
        .bind(&employee.name)
        .bind(&employee.email)
        .bind(employee.role.as_str())
        .bind(&employee.department)
        .bind(employee.manager_id.map(|id| id.0))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find(&self, id: EmployeeId) -> Result<Option<Employee>, RepositoryError> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employee WHERE id = ?");
        let row = sqlx::query(&sql).bind(id.0).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_employee).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Employee>, RepositoryError> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employee ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_employee).collect()
    }

    async fn list_where(
        &self,
        predicate: &str,
        bind: Option<i64>,
    ) -> Result<Vec<Employee>, RepositoryError> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employee WHERE {predicate} ORDER BY id");
        let mut query = sqlx::query(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_employee).collect()
    }
}

fn row_to_employee(row: &SqliteRow) -> Result<Employee, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
    let role: String = row.try_get("role").map_err(decode)?;
    let manager_id: Option<i64> = row.try_get("manager_id").map_err(decode)?;

    Ok(Employee {
        id: EmployeeId(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        email: row.try_get("email").map_err(decode)?,
        role: decode_enum("role", &role, EmployeeRole::parse)?,
        department: row.try_get("department").map_err(decode)?,
        manager_id: manager_id.map(EmployeeId),
    })
}

#[async_trait::async_trait]
impl OrgGraph for SqlEmployeeRepository {
    async fn employee(&self, id: EmployeeId) -> Result<Option<Employee>, CollaboratorError> {
        Ok(self.find(id).await?)
    }

    async fn hr_employees(&self) -> Result<Vec<Employee>, CollaboratorError> {
        Ok(self.list_where("role = 'hr'", None).await?)
    }

    async fn direct_reports(
        &self,
        manager_id: EmployeeId,
    ) -> Result<Vec<Employee>, CollaboratorError> {
        Ok(self.list_where("manager_id = ?", Some(manager_id.0)).await?)
    }

    async fn team_size(&self, department: &str) -> Result<u32, CollaboratorError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM employee WHERE department = ? COLLATE NOCASE",
        )
        .bind(department)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CollaboratorError::unavailable("org_graph", e))?;
        u32::try_from(count).map_err(|e| CollaboratorError::invalid_data("org_graph", e))
    }
}

#[cfg(test)]
mod tests {
    use leaveflow_core::domain::employee::{EmployeeId, EmployeeRole};
    use leaveflow_core::org::OrgGraph;

    use super::SqlEmployeeRepository;
    use crate::repositories::test_support::{employee, seed_small_org, setup};

    #[tokio::test]
    async fn upsert_replaces_existing_row() {
        let pool = setup().await;
        let repo = SqlEmployeeRepository::new(pool);
        repo.upsert(&employee(5, EmployeeRole::Individual, Some(2), "Sales")).await.expect("insert");
        repo.upsert(&employee(5, EmployeeRole::Manager, None, "Sales")).await.expect("update");

        let stored = repo.find(EmployeeId(5)).await.expect("find").expect("exists");
        assert_eq!(stored.role, EmployeeRole::Manager);
        assert_eq!(stored.manager_id, None);
        assert_eq!(repo.list().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn org_graph_queries_follow_stored_links() {
        let pool = setup().await;
        seed_small_org(&pool).await;
        let repo = SqlEmployeeRepository::new(pool);

        let hr = repo.hr_employees().await.expect("hr");
        assert_eq!(hr.iter().map(|e| e.id).collect::<Vec<_>>(), vec![EmployeeId(9)]);

        let manager = repo.reporting_manager_of(EmployeeId(1)).await.expect("lookup");
        assert_eq!(manager.map(|e| e.id), Some(EmployeeId(2)));

        let reports = repo.direct_reports(EmployeeId(3)).await.expect("reports");
        assert_eq!(reports.iter().map(|e| e.id).collect::<Vec<_>>(), vec![EmployeeId(2)]);
        assert_eq!(repo.team_size("engineering").await.expect("size"), 3);
        assert!(repo.is_hr(EmployeeId(9)).await.expect("is_hr"));
    }

    #[tokio::test]
    async fn dangling_manager_link_is_stored_and_resolves_to_nobody() {
        let pool = setup().await;
        let repo = SqlEmployeeRepository::new(pool);
        repo.upsert(&employee(4, EmployeeRole::Individual, Some(404), "Ops")).await.expect("insert");

        assert_eq!(repo.reporting_manager_of(EmployeeId(4)).await.expect("lookup"), None);
    }
}
