use chrono::{Datelike, Weekday};
use sqlx::Row;

use leaveflow_core::domain::employee::EmployeeId;
use leaveflow_core::domain::leave::DateRange;
use leaveflow_core::ports::{
    BlackoutPeriod, BlackoutService, CapacityReport, CapacityService, CollaboratorError,
    DailyCapacity,
};

use super::{decode_date, encode_date, RepositoryError};
use crate::DbPool;

pub const DEFAULT_MAX_ABSENT_PCT: u32 = 30;

pub struct SqlBlackoutService {
    pool: DbPool,
}

impl SqlBlackoutService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        department: &str,
        name: &str,
        range: &DateRange,
    ) -> Result<i64, RepositoryError> {
        let inserted = sqlx::query(
            "INSERT INTO blackout_period (department, name, start_date, end_date) VALUES (?, ?, ?, ?)",
        )
        .bind(department)
        .bind(name)
        .bind(encode_date(range.start))
        .bind(encode_date(range.end))
        .execute(&self.pool)
        .await?;
        Ok(inserted.last_insert_rowid())
    }

    async fn overlapping(
        &self,
        department: &str,
        range: &DateRange,
    ) -> Result<Vec<BlackoutPeriod>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, department, name, start_date, end_date FROM blackout_period
             WHERE department = ? COLLATE NOCASE AND start_date <= ? AND end_date >= ?
             ORDER BY start_date, id",
        )
        .bind(department)
        .bind(encode_date(range.end))
        .bind(encode_date(range.start))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
                let start: String = row.try_get("start_date").map_err(decode)?;
                let end: String = row.try_get("end_date").map_err(decode)?;
                Ok(BlackoutPeriod {
                    id: row.try_get("id").map_err(decode)?,
                    department: row.try_get("department").map_err(decode)?,
                    name: row.try_get("name").map_err(decode)?,
                    start_date: decode_date("start_date", &start)?,
                    end_date: decode_date("end_date", &end)?,
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl BlackoutService for SqlBlackoutService {
    async fn conflicting_periods(
        &self,
        department: &str,
        range: &DateRange,
    ) -> Result<Vec<BlackoutPeriod>, CollaboratorError> {
        Ok(self.overlapping(department, range).await?)
    }
}

/// Projects per-day absence for a department from approved leave. Weekends
/// are skipped; the requester always counts as absent.
pub struct SqlCapacityService {
    pool: DbPool,
}

impl SqlCapacityService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn set_policy(&self, department: &str, max_absent_pct: u32) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO department_policy (department, max_absent_pct) VALUES (?, ?)
             ON CONFLICT(department) DO UPDATE SET max_absent_pct = excluded.max_absent_pct",
        )
        .bind(department)
        .bind(i64::from(max_absent_pct))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn max_absent_pct(&self, department: &str) -> Result<u32, RepositoryError> {
        let pct: Option<i64> = sqlx::query_scalar(
            "SELECT max_absent_pct FROM department_policy WHERE department = ? COLLATE NOCASE",
        )
        .bind(department)
        .fetch_optional(&self.pool)
        .await?;
        match pct {
            Some(pct) => u32::try_from(pct)
                .map_err(|_| RepositoryError::Decode(format!("max_absent_pct: {pct} out of range"))),
            None => Ok(DEFAULT_MAX_ABSENT_PCT),
        }
    }

    async fn project(
        &self,
        requester_id: EmployeeId,
        department: &str,
        range: &DateRange,
    ) -> Result<CapacityReport, RepositoryError> {
        let team_size: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM employee WHERE department = ? COLLATE NOCASE",
        )
        .bind(department)
        .fetch_one(&self.pool)
        .await?;
        let team_size = u32::try_from(team_size).unwrap_or(u32::MAX);
        let max_absent = max_absent_for(team_size, self.max_absent_pct(department).await?);

        let mut per_date = Vec::new();
        for date in range.days().filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun)) {
            let day = encode_date(date);
            let colleagues: i64 = sqlx::query_scalar(
                "SELECT COUNT(DISTINCT lr.employee_id)
                 FROM leave_request lr
                 JOIN employee e ON e.id = lr.employee_id
                 WHERE e.department = ? COLLATE NOCASE
                   AND lr.employee_id <> ?
                   AND lr.status = 'approved'
                   AND lr.start_date <= ? AND lr.end_date >= ?",
            )
            .bind(department)
            .bind(requester_id.0)
            .bind(&day)
            .bind(&day)
            .fetch_one(&self.pool)
            .await?;

            per_date.push(DailyCapacity {
                date,
                projected_absent: u32::try_from(colleagues).unwrap_or(u32::MAX).saturating_add(1),
                team_size,
                max_absent,
            });
        }

        Ok(CapacityReport::from_days(per_date))
    }
}

/// At least one person may always be away.
fn max_absent_for(team_size: u32, pct: u32) -> u32 {
    (u64::from(team_size) * u64::from(pct) / 100).clamp(1, u64::from(u32::MAX)) as u32
}

#[async_trait::async_trait]
impl CapacityService for SqlCapacityService {
    async fn check_team_capacity(
        &self,
        requester_id: EmployeeId,
        department: &str,
        range: &DateRange,
    ) -> Result<CapacityReport, CollaboratorError> {
        Ok(self.project(requester_id, department, range).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use leaveflow_core::approvals::{self, ApprovalContext, CreationAssessment, NewLeaveRequest};
    use leaveflow_core::domain::employee::{EmployeeId, EmployeeRole};
    use leaveflow_core::domain::leave::DateRange;
    use leaveflow_core::ports::{BlackoutService, CapacityService};

    use super::{max_absent_for, SqlBlackoutService, SqlCapacityService};
    use crate::repositories::test_support::{employee, seed_small_org, setup};
    use crate::repositories::{LeaveRequestRepository, SqlLeaveRequestRepository};

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).expect("date")
    }

    #[test]
    fn max_absent_rounds_down_but_never_below_one() {
        assert_eq!(max_absent_for(10, 30), 3);
        assert_eq!(max_absent_for(3, 30), 1);
        assert_eq!(max_absent_for(0, 30), 1);
    }

    #[tokio::test]
    async fn blackout_lookup_is_department_scoped_and_inclusive() {
        let pool = setup().await;
        let blackouts = SqlBlackoutService::new(pool);
        let freeze = DateRange::new(date(12, 20), date(12, 31)).expect("range");
        blackouts.insert("Engineering", "Year-end freeze", &freeze).await.expect("insert");

        let touching = DateRange::new(date(12, 31), date(12, 31)).expect("range");
        let before = DateRange::new(date(12, 1), date(12, 19)).expect("range");

        let hits = blackouts.conflicting_periods("engineering", &touching).await.expect("query");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Year-end freeze");
        assert!(blackouts.conflicting_periods("Engineering", &before).await.expect("query").is_empty());
        assert!(blackouts.conflicting_periods("Sales", &touching).await.expect("query").is_empty());
    }

    #[tokio::test]
    async fn capacity_counts_approved_colleagues_plus_requester_on_weekdays() {
        let pool = setup().await;
        seed_small_org(&pool).await;
        let repo = SqlLeaveRequestRepository::new(pool.clone());
        let capacity = SqlCapacityService::new(pool);
        let now = Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).single().expect("ts");

        // Employee 2 takes Monday-Tuesday off, approved by 3.
        let colleague = employee(2, EmployeeRole::Manager, Some(3), "Engineering");
        let approver = employee(3, EmployeeRole::Manager, None, "Engineering");
        let input = NewLeaveRequest {
            employee_id: colleague.id,
            category: "casual".to_owned(),
            start_date: date(6, 3),
            end_date: date(6, 4),
            reason: "offsite".to_owned(),
        }
        .validate()
        .expect("valid");
        let stored = repo
            .insert(&approvals::plan_creation(&input, &colleague, &[], CreationAssessment::default(), now))
            .await
            .expect("insert");
        let commit = approvals::approve(
            &ApprovalContext { request: &stored, requester: &colleague, actor: &approver },
            false,
            None,
            now,
        )
        .expect("approve");
        repo.commit(&commit).await.expect("commit");

        // Saturday through Tuesday: two weekend days skipped.
        let window = DateRange::new(date(6, 1), date(6, 4)).expect("range");
        let report = capacity.check_team_capacity(EmployeeId(1), "Engineering", &window).await.expect("report");

        assert_eq!(report.per_date.len(), 2);
        assert!(report.per_date.iter().all(|day| day.projected_absent == 2));
        assert_eq!(report.per_date[0].max_absent, 1);
        assert!(report.would_breach);

        capacity.set_policy("Engineering", 100).await.expect("policy");
        let relaxed = capacity.check_team_capacity(EmployeeId(1), "Engineering", &window).await.expect("report");
        assert!(!relaxed.would_breach);
    }
}
