use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use leaveflow_core::approvals::TransitionCommit;
use leaveflow_core::domain::approval::{
    ApprovalAction, ApprovalActionKind, ApprovalSlot, DelegationHop, DelegationHopEntry,
    DelegationReason, StatusLogEntry,
};
use leaveflow_core::domain::employee::EmployeeId;
use leaveflow_core::domain::leave::{
    DateRange, LeaveCategory, LeaveRequest, LeaveRequestId, LeaveStatus, ReminderTier,
    SlotDecision,
};

use super::{
    decode_date, decode_enum, decode_timestamp, encode_date, encode_timestamp,
    LeaveRequestRepository, RepositoryError,
};
use crate::DbPool;

const REQUEST_COLUMNS: &str = "id, employee_id, category, start_date, end_date, reason, status,
    manager_approval, hr_approval, requires_dual_approval, team_capacity_warning,
    blackout_warning, blackout_override, rejection_reason, current_approver_id,
    escalation_count, approver_assigned_at, business_days, document_ref, document_deadline,
    reminder_24h_sent, reminder_12h_sent, version, created_at, updated_at";

pub struct SqlLeaveRequestRepository {
    pool: DbPool,
}

impl SqlLeaveRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_where(
        &self,
        predicate: &str,
        binds: Vec<BindValue>,
    ) -> Result<Vec<LeaveRequest>, RepositoryError> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM leave_request WHERE {predicate} ORDER BY id");
        let mut query = sqlx::query(&sql);
        for value in binds {
            query = match value {
                BindValue::Int(value) => query.bind(value),
                BindValue::Text(value) => query.bind(value),
            };
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_request).collect()
    }

    async fn exists_overlap(
        &self,
        employee_id: EmployeeId,
        range: &DateRange,
        statuses: &str,
    ) -> Result<bool, RepositoryError> {
        let sql = format!(
            "SELECT EXISTS(
                SELECT 1 FROM leave_request
                WHERE employee_id = ? AND status IN ({statuses})
                  AND start_date <= ? AND end_date >= ?
             ) AS found"
        );
        let found: i64 = sqlx::query(&sql)
            .bind(employee_id.0)
            .bind(encode_date(range.end))
            .bind(encode_date(range.start))
            .fetch_one(&self.pool)
            .await?
            .try_get("found")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        Ok(found != 0)
    }
}

enum BindValue {
    Int(i64),
    Text(String),
}

fn row_to_request(row: &SqliteRow) -> Result<LeaveRequest, RepositoryError> {
    let get_text = |column: &str| -> Result<String, RepositoryError> {
        row.try_get::<String, _>(column).map_err(|e| RepositoryError::Decode(e.to_string()))
    };
    let get_opt_text = |column: &str| -> Result<Option<String>, RepositoryError> {
        row.try_get::<Option<String>, _>(column).map_err(|e| RepositoryError::Decode(e.to_string()))
    };
    let get_int = |column: &str| -> Result<i64, RepositoryError> {
        row.try_get::<i64, _>(column).map_err(|e| RepositoryError::Decode(e.to_string()))
    };
    let get_u32 = |column: &str| -> Result<u32, RepositoryError> {
        u32::try_from(get_int(column)?)
            .map_err(|_| RepositoryError::Decode(format!("{column}: out of range")))
    };
    let get_flag = |column: &str| -> Result<bool, RepositoryError> { Ok(get_int(column)? != 0) };

    let current_approver_id = row
        .try_get::<Option<i64>, _>("current_approver_id")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?
        .map(EmployeeId);
    let document_deadline = get_opt_text("document_deadline")?
        .map(|raw| decode_timestamp("document_deadline", &raw))
        .transpose()?;

    Ok(LeaveRequest {
        id: LeaveRequestId(get_int("id")?),
        employee_id: EmployeeId(get_int("employee_id")?),
        category: decode_enum("category", &get_text("category")?, LeaveCategory::parse)?,
        start_date: decode_date("start_date", &get_text("start_date")?)?,
        end_date: decode_date("end_date", &get_text("end_date")?)?,
        reason: get_text("reason")?,
        status: decode_enum("status", &get_text("status")?, LeaveStatus::parse)?,
        manager_approval: decode_enum(
            "manager_approval",
            &get_text("manager_approval")?,
            SlotDecision::parse,
        )?,
        hr_approval: decode_enum("hr_approval", &get_text("hr_approval")?, SlotDecision::parse)?,
        requires_dual_approval: get_flag("requires_dual_approval")?,
        team_capacity_warning: get_flag("team_capacity_warning")?,
        blackout_warning: get_flag("blackout_warning")?,
        blackout_override: get_flag("blackout_override")?,
        rejection_reason: get_opt_text("rejection_reason")?,
        current_approver_id,
        escalation_count: get_u32("escalation_count")?,
        approver_assigned_at: decode_timestamp(
            "approver_assigned_at",
            &get_text("approver_assigned_at")?,
        )?,
        business_days: get_u32("business_days")?,
        document_ref: get_opt_text("document_ref")?,
        document_deadline,
        reminder_24h_sent: get_flag("reminder_24h_sent")?,
        reminder_12h_sent: get_flag("reminder_12h_sent")?,
        version: get_u32("version")?,
        created_at: decode_timestamp("created_at", &get_text("created_at")?)?,
        updated_at: decode_timestamp("updated_at", &get_text("updated_at")?)?,
    })
}

async fn append_audit_rows(
    conn: &mut SqliteConnection,
    id: LeaveRequestId,
    commit: &TransitionCommit,
) -> Result<(), RepositoryError> {
    let at = encode_timestamp(commit.at);

    if commit.status_changed() {
        sqlx::query(
            "INSERT INTO status_log (leave_request_id, old_status, new_status, actor_id, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.0)
        .bind(commit.previous_status.map(|status| status.as_str()))
        .bind(commit.request.status.as_str())
        .bind(commit.actor_id.0)
        .bind(&at)
        .execute(&mut *conn)
        .await?;
    }

    for action in &commit.actions {
        sqlx::query(
            "INSERT INTO approval_action (leave_request_id, actor_id, action, slot, comments, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.0)
        .bind(action.actor_id.0)
        .bind(action.kind.as_str())
        .bind(action.slot.map(|slot| slot.as_str()))
        .bind(action.comments.as_deref())
        .bind(&at)
        .execute(&mut *conn)
        .await?;
    }

    for hop in &commit.hops {
        sqlx::query(
            "INSERT INTO delegation_hop (leave_request_id, from_approver_id, to_approver_id, reason, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.0)
        .bind(hop.from_approver_id.0)
        .bind(hop.to_approver_id.0)
        .bind(hop.reason.as_str())
        .bind(&at)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[async_trait::async_trait]
impl LeaveRequestRepository for SqlLeaveRequestRepository {
    async fn insert(&self, commit: &TransitionCommit) -> Result<LeaveRequest, RepositoryError> {
        let request = &commit.request;
        let mut tx = self.pool.begin().await?;

        // One statement, so a concurrent create for the same dates cannot slip
        // between the overlap check and the write.
        let inserted = sqlx::query(
            "INSERT INTO leave_request (employee_id, category, start_date, end_date, reason, status,
                manager_approval, hr_approval, requires_dual_approval, team_capacity_warning,
                blackout_warning, blackout_override, rejection_reason, current_approver_id,
                escalation_count, approver_assigned_at, business_days, document_ref,
                document_deadline, reminder_24h_sent, reminder_12h_sent, version, created_at,
                updated_at)
             SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?
             WHERE NOT EXISTS (
                SELECT 1 FROM leave_request
                WHERE employee_id = ?
                  AND status IN ('pending', 'pending_document', 'partially_approved', 'approved')
                  AND start_date <= ? AND end_date >= ?
             )",
        )
        .bind(request.employee_id.0)
        .bind(request.category.as_str())
        .bind(encode_date(request.start_date))
        .bind(encode_date(request.end_date))
        .bind(&request.reason)
        .bind(request.status.as_str())
        .bind(request.manager_approval.as_str())
        .bind(request.hr_approval.as_str())
        .bind(request.requires_dual_approval)
        .bind(request.team_capacity_warning)
        .bind(request.blackout_warning)
        .bind(request.blackout_override)
        .bind(request.rejection_reason.as_deref())
        .bind(request.current_approver_id.map(|id| id.0))
        .bind(i64::from(request.escalation_count))
        .bind(encode_timestamp(request.approver_assigned_at))
        .bind(i64::from(request.business_days))
        .bind(request.document_ref.as_deref())
        .bind(request.document_deadline.map(encode_timestamp))
        .bind(request.reminder_24h_sent)
        .bind(request.reminder_12h_sent)
        .bind(encode_timestamp(request.created_at))
        .bind(encode_timestamp(request.updated_at))
        .bind(request.employee_id.0)
        .bind(encode_date(request.end_date))
        .bind(encode_date(request.start_date))
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(RepositoryError::Overlap(request.employee_id));
        }

        let id = LeaveRequestId(inserted.last_insert_rowid());
        append_audit_rows(&mut tx, id, commit).await?;
        tx.commit().await?;

        Ok(LeaveRequest { id, version: 0, ..request.clone() })
    }

    async fn commit(&self, commit: &TransitionCommit) -> Result<LeaveRequest, RepositoryError> {
        let request = &commit.request;
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE leave_request SET
                status = ?, manager_approval = ?, hr_approval = ?, blackout_override = ?,
                rejection_reason = ?, current_approver_id = ?, escalation_count = ?,
                approver_assigned_at = ?, document_ref = ?, document_deadline = ?,
                version = version + 1, updated_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(request.status.as_str())
        .bind(request.manager_approval.as_str())
        .bind(request.hr_approval.as_str())
        .bind(request.blackout_override)
        .bind(request.rejection_reason.as_deref())
        .bind(request.current_approver_id.map(|id| id.0))
        .bind(i64::from(request.escalation_count))
        .bind(encode_timestamp(request.approver_assigned_at))
        .bind(request.document_ref.as_deref())
        .bind(request.document_deadline.map(encode_timestamp))
        .bind(encode_timestamp(commit.at))
        .bind(request.id.0)
        .bind(i64::from(request.version))
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tracing::debug!(
                event_name = "persistence.leave_request.version_conflict",
                request_id = request.id.0,
                expected_version = request.version,
                "optimistic concurrency check failed"
            );
            return Err(RepositoryError::Conflict {
                id: request.id,
                expected_version: request.version,
            });
        }

        append_audit_rows(&mut tx, request.id, commit).await?;
        tx.commit().await?;

        // Reminder flags are owned by `mark_reminder_sent`; reload so the
        // returned image reflects them.
        self.find_by_id(request.id).await?.ok_or(RepositoryError::Missing(request.id))
    }

    async fn find_by_id(&self, id: LeaveRequestId) -> Result<Option<LeaveRequest>, RepositoryError> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM leave_request WHERE id = ?");
        let row = sqlx::query(&sql).bind(id.0).fetch_optional(&self.pool).await?;

        match row {
            Some(ref r) => Ok(Some(row_to_request(r)?)),
            None => Ok(None),
        }
    }

    async fn list_pending_for_manager(
        &self,
        approver_id: EmployeeId,
    ) -> Result<Vec<LeaveRequest>, RepositoryError> {
        self.fetch_where(
            "status IN ('pending', 'partially_approved')
             AND manager_approval = 'pending' AND current_approver_id = ?",
            vec![BindValue::Int(approver_id.0)],
        )
        .await
    }

    async fn list_pending_for_hr(
        &self,
        hr_id: EmployeeId,
    ) -> Result<Vec<LeaveRequest>, RepositoryError> {
        self.fetch_where(
            "status IN ('pending', 'partially_approved')
             AND employee_id <> ?
             AND (hr_approval = 'pending'
                  OR (manager_approval = 'pending' AND current_approver_id = ?))",
            vec![BindValue::Int(hr_id.0), BindValue::Int(hr_id.0)],
        )
        .await
    }

    async fn list_awaiting_document(&self) -> Result<Vec<LeaveRequest>, RepositoryError> {
        self.fetch_where(
            "status = 'pending_document' AND document_deadline IS NOT NULL",
            Vec::new(),
        )
        .await
    }

    async fn list_stale(
        &self,
        cutoff: DateTime<Utc>,
        max_escalations: u32,
    ) -> Result<Vec<LeaveRequest>, RepositoryError> {
        self.fetch_where(
            "status IN ('pending', 'partially_approved')
             AND manager_approval = 'pending'
             AND current_approver_id IS NOT NULL
             AND approver_assigned_at < ?
             AND escalation_count < ?",
            vec![BindValue::Text(encode_timestamp(cutoff)), BindValue::Int(i64::from(max_escalations))],
        )
        .await
    }

    async fn has_active_overlap(
        &self,
        employee_id: EmployeeId,
        range: &DateRange,
    ) -> Result<bool, RepositoryError> {
        self.exists_overlap(
            employee_id,
            range,
            "'pending', 'pending_document', 'partially_approved', 'approved'",
        )
        .await
    }

    async fn has_approved_overlap(
        &self,
        employee_id: EmployeeId,
        range: &DateRange,
    ) -> Result<bool, RepositoryError> {
        self.exists_overlap(employee_id, range, "'approved'").await
    }

    async fn mark_reminder_sent(
        &self,
        id: LeaveRequestId,
        tier: ReminderTier,
    ) -> Result<bool, RepositoryError> {
        let sql = match tier {
            ReminderTier::First => {
                "UPDATE leave_request SET reminder_24h_sent = 1
                 WHERE id = ? AND status = 'pending_document' AND reminder_24h_sent = 0"
            }
            ReminderTier::Urgent => {
                "UPDATE leave_request SET reminder_12h_sent = 1, reminder_24h_sent = 1
                 WHERE id = ? AND status = 'pending_document' AND reminder_12h_sent = 0"
            }
        };
        let updated = sqlx::query(sql).bind(id.0).execute(&self.pool).await?;
        Ok(updated.rows_affected() == 1)
    }

    async fn delegation_history(
        &self,
        id: LeaveRequestId,
    ) -> Result<Vec<DelegationHopEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, leave_request_id, from_approver_id, to_approver_id, reason, created_at
             FROM delegation_hop WHERE leave_request_id = ? ORDER BY id",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
                let reason: String = row.try_get("reason").map_err(decode)?;
                let created_at: String = row.try_get("created_at").map_err(decode)?;
                Ok(DelegationHopEntry {
                    id: row.try_get("id").map_err(decode)?,
                    leave_request_id: LeaveRequestId(row.try_get("leave_request_id").map_err(decode)?),
                    hop: DelegationHop {
                        from_approver_id: EmployeeId(row.try_get("from_approver_id").map_err(decode)?),
                        to_approver_id: EmployeeId(row.try_get("to_approver_id").map_err(decode)?),
                        reason: decode_enum("reason", &reason, DelegationReason::parse)?,
                    },
                    created_at: decode_timestamp("created_at", &created_at)?,
                })
            })
            .collect()
    }

    async fn status_log(&self, id: LeaveRequestId) -> Result<Vec<StatusLogEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, leave_request_id, old_status, new_status, actor_id, created_at
             FROM status_log WHERE leave_request_id = ? ORDER BY id",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
                let old_status: Option<String> = row.try_get("old_status").map_err(decode)?;
                let new_status: String = row.try_get("new_status").map_err(decode)?;
                let created_at: String = row.try_get("created_at").map_err(decode)?;
                Ok(StatusLogEntry {
                    id: row.try_get("id").map_err(decode)?,
                    leave_request_id: LeaveRequestId(row.try_get("leave_request_id").map_err(decode)?),
                    old_status: old_status
                        .map(|raw| decode_enum("old_status", &raw, LeaveStatus::parse))
                        .transpose()?,
                    new_status: decode_enum("new_status", &new_status, LeaveStatus::parse)?,
                    actor_id: EmployeeId(row.try_get("actor_id").map_err(decode)?),
                    created_at: decode_timestamp("created_at", &created_at)?,
                })
            })
            .collect()
    }

    async fn approval_actions(
        &self,
        id: LeaveRequestId,
    ) -> Result<Vec<ApprovalAction>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, leave_request_id, actor_id, action, slot, comments, created_at
             FROM approval_action WHERE leave_request_id = ? ORDER BY id",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
                let action: String = row.try_get("action").map_err(decode)?;
                let slot: Option<String> = row.try_get("slot").map_err(decode)?;
                let created_at: String = row.try_get("created_at").map_err(decode)?;
                Ok(ApprovalAction {
                    id: row.try_get("id").map_err(decode)?,
                    leave_request_id: LeaveRequestId(row.try_get("leave_request_id").map_err(decode)?),
                    actor_id: EmployeeId(row.try_get("actor_id").map_err(decode)?),
                    kind: decode_enum("action", &action, ApprovalActionKind::parse)?,
                    slot: slot.map(|raw| decode_enum("slot", &raw, ApprovalSlot::parse)).transpose()?,
                    comments: row.try_get("comments").map_err(decode)?,
                    created_at: decode_timestamp("created_at", &created_at)?,
                })
            })
            .collect()
    }
}
