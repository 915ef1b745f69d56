use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_TABLES: &[&str] = &[
        "employee",
        "leave_request",
        "approval_action",
        "delegation_hop",
        "status_log",
        "leave_balance",
        "blackout_period",
        "department_policy",
        "notification",
    ];

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "employee",
        "leave_request",
        "approval_action",
        "delegation_hop",
        "status_log",
        "leave_balance",
        "blackout_period",
        "department_policy",
        "notification",
        "idx_employee_manager_id",
        "idx_employee_department",
        "idx_leave_request_employee_id",
        "idx_leave_request_status",
        "idx_leave_request_current_approver_id",
        "idx_approval_action_leave_request_id",
        "idx_delegation_hop_leave_request_id",
        "idx_status_log_leave_request_id",
        "idx_blackout_period_department",
        "idx_notification_employee_id",
        "leave_request_no_delete",
        "approval_action_no_update",
        "approval_action_no_delete",
        "delegation_hop_no_update",
        "delegation_hop_no_delete",
        "status_log_no_update",
        "status_log_no_delete",
    ];

    async fn table_count(pool: &sqlx::SqlitePool, table: &str) -> i64 {
        sqlx::query("SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(pool)
            .await
            .expect("query sqlite_master")
            .get::<i64, _>("count")
    }

    #[tokio::test]
    async fn migrations_create_baseline_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in MANAGED_TABLES {
            assert_eq!(table_count(&pool, table).await, 1, "table `{table}` should exist");
        }
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        for table in MANAGED_TABLES {
            assert_eq!(table_count(&pool, table).await, 0, "table `{table}` should be dropped");
        }
    }

    #[tokio::test]
    async fn migrations_up_down_up_preserves_schema_signature() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let initial_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            initial_signature.len(),
            MANAGED_SCHEMA_OBJECTS.len(),
            "initial migration pass should create all managed schema objects",
        );

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");
        assert!(
            managed_schema_signature(&pool).await.is_empty(),
            "managed schema objects should be removed after full undo",
        );

        run_pending(&pool).await.expect("re-run migrations");
        assert_eq!(
            managed_schema_signature(&pool).await,
            initial_signature,
            "up/down/up should preserve migration-managed schema signature",
        );
    }

    #[tokio::test]
    async fn hr_slot_cannot_be_not_required_on_dual_approval_rows() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");
        sqlx::query(
            "INSERT INTO employee (id, name, email, role, department) VALUES (1, 'A', 'a@x', 'individual', 'Ops')",
        )
        .execute(&pool)
        .await
        .expect("employee");

        let inserted = sqlx::query(
            "INSERT INTO leave_request (employee_id, category, start_date, end_date, reason, status,
                manager_approval, hr_approval, requires_dual_approval, approver_assigned_at,
                business_days, created_at, updated_at)
             VALUES (1, 'casual', '2024-05-06', '2024-05-10', 'x', 'pending', 'pending',
                'not_required', 1, '2024-05-01T00:00:00.000000Z', 5,
                '2024-05-01T00:00:00.000000Z', '2024-05-01T00:00:00.000000Z')",
        )
        .execute(&pool)
        .await;

        assert!(inserted.is_err(), "check constraint should reject inconsistent slots");
    }

    async fn managed_schema_signature(pool: &sqlx::SqlitePool) -> Vec<(String, String, String)> {
        let mut signature: Vec<(String, String, String)> = sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index', 'trigger')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .filter_map(|row| {
            let name = row.get::<String, _>("name");
            if MANAGED_SCHEMA_OBJECTS.contains(&name.as_str()) {
                Some((row.get::<String, _>("type"), name, row.get::<String, _>("sql")))
            } else {
                None
            }
        })
        .collect();
        signature.sort();
        signature
    }
}
