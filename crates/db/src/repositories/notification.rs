use chrono::Utc;
use sqlx::Row;

use leaveflow_core::domain::employee::EmployeeId;
use leaveflow_core::domain::leave::LeaveRequestId;
use leaveflow_core::ports::{CollaboratorError, NotificationKind, NotificationSink};

use super::{encode_timestamp, RepositoryError};
use crate::DbPool;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredNotification {
    pub id: i64,
    pub employee_id: EmployeeId,
    pub kind: String,
    pub message: String,
    pub leave_request_id: Option<LeaveRequestId>,
}

/// Persists notifications to the outbox table; delivery happens elsewhere.
pub struct SqlNotificationSink {
    pool: DbPool,
}

impl SqlNotificationSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list_for(
        &self,
        employee_id: EmployeeId,
    ) -> Result<Vec<StoredNotification>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, employee_id, kind, message, leave_request_id FROM notification
             WHERE employee_id = ? ORDER BY id",
        )
        .bind(employee_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
                let request_id: Option<i64> = row.try_get("leave_request_id").map_err(decode)?;
                Ok(StoredNotification {
                    id: row.try_get("id").map_err(decode)?,
                    employee_id: EmployeeId(row.try_get("employee_id").map_err(decode)?),
                    kind: row.try_get("kind").map_err(decode)?,
                    message: row.try_get("message").map_err(decode)?,
                    leave_request_id: request_id.map(LeaveRequestId),
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl NotificationSink for SqlNotificationSink {
    async fn notify(
        &self,
        recipient: EmployeeId,
        kind: NotificationKind,
        message: &str,
        request_id: Option<LeaveRequestId>,
    ) -> Result<(), CollaboratorError> {
        sqlx::query(
            "INSERT INTO notification (employee_id, kind, message, leave_request_id, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(recipient.0)
        .bind(kind.as_str())
        .bind(message)
        .bind(request_id.map(|id| id.0))
        .bind(encode_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| CollaboratorError::unavailable("notification_sink", e))?;
        Ok(())
    }
}
