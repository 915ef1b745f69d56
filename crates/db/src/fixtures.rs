use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::Executor;

use leaveflow_core::domain::employee::EmployeeId;
use leaveflow_core::domain::leave::LeaveCategory;

use crate::connection::DbPool;
use crate::repositories::{encode_date, RepositoryError, SqlBalanceService};

const DEMO_EMPLOYEE_IDS: &[i64] = &[1, 2, 3, 4, 5, 6, 7, 8];
const DEMO_HR_IDS: &[i64] = &[5, 6];

/// Yearly allowance granted to every demo employee.
const DEMO_ALLOWANCES: &[(LeaveCategory, i64)] =
    &[(LeaveCategory::Casual, 12), (LeaveCategory::Sick, 10), (LeaveCategory::Annual, 20)];

const DEMO_BLACKOUT_NAME: &str = "Year-end release freeze";
const DEMO_BLACKOUT_DEPARTMENT: &str = "Engineering";

/// Demo organisation for local runs and smoke tests:
///
/// 1. Engineering chain Alice/Dara -> Bruno -> Chen (top of chain)
/// 2. Two HR employees, Esme and Farid
/// 3. A Sales pair and per-department absence policies
/// 4. Allowances for `year` and an Engineering year-end blackout
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed.sql");

    /// Idempotent: reloading keeps balances already used.
    pub async fn load(pool: &DbPool, year: i32) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;

        let (start, end) = blackout_window(year)?;
        sqlx::query(
            "INSERT INTO blackout_period (department, name, start_date, end_date)
             SELECT ?1, ?2, ?3, ?4
             WHERE NOT EXISTS (
                SELECT 1 FROM blackout_period
                WHERE department = ?1 AND name = ?2 AND start_date = ?3
             )",
        )
        .bind(DEMO_BLACKOUT_DEPARTMENT)
        .bind(DEMO_BLACKOUT_NAME)
        .bind(encode_date(start))
        .bind(encode_date(end))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let balances = SqlBalanceService::new(pool.clone());
        for employee_id in DEMO_EMPLOYEE_IDS {
            for (category, days) in DEMO_ALLOWANCES {
                balances.grant(EmployeeId(*employee_id), *category, year, Decimal::from(*days)).await?;
            }
        }

        Ok(SeedResult {
            year,
            employees: DEMO_EMPLOYEE_IDS.len(),
            hr_employees: DEMO_HR_IDS.len(),
            balances: DEMO_EMPLOYEE_IDS.len() * DEMO_ALLOWANCES.len(),
            blackout_periods: 1,
        })
    }

    pub async fn verify(pool: &DbPool, year: i32) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let employees: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM employee WHERE id IN {}",
            sql_array_from_ids(DEMO_EMPLOYEE_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("employees", employees == DEMO_EMPLOYEE_IDS.len() as i64));

        let hr: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM employee WHERE role = 'hr' AND id IN {}",
            sql_array_from_ids(DEMO_HR_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("hr-employees", hr == DEMO_HR_IDS.len() as i64));

        let balances: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM leave_balance WHERE year = ?1 AND employee_id IN {}",
            sql_array_from_ids(DEMO_EMPLOYEE_IDS)
        ))
        .bind(year)
        .fetch_one(pool)
        .await?;
        checks.push((
            "balances",
            balances == (DEMO_EMPLOYEE_IDS.len() * DEMO_ALLOWANCES.len()) as i64,
        ));

        let (start, _) = blackout_window(year)?;
        let blackout: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM blackout_period WHERE department = ?1 AND name = ?2 AND start_date = ?3",
        )
        .bind(DEMO_BLACKOUT_DEPARTMENT)
        .bind(DEMO_BLACKOUT_NAME)
        .bind(encode_date(start))
        .fetch_one(pool)
        .await?;
        checks.push(("blackout-period", blackout == 1));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

fn blackout_window(year: i32) -> Result<(NaiveDate, NaiveDate), RepositoryError> {
    let start = NaiveDate::from_ymd_opt(year, 12, 20);
    let end = NaiveDate::from_ymd_opt(year, 12, 31);
    start
        .zip(end)
        .ok_or_else(|| RepositoryError::Decode(format!("year {year} is out of range")))
}

fn sql_array_from_ids(ids: &[i64]) -> String {
    let joined = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
    format!("({joined})")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedResult {
    pub year: i32,
    pub employees: usize,
    pub hr_employees: usize,
    pub balances: usize,
    pub blackout_periods: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
