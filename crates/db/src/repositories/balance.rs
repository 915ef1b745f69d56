use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::Row;

use leaveflow_core::domain::employee::EmployeeId;
use leaveflow_core::domain::leave::LeaveCategory;
use leaveflow_core::ports::{BalanceService, CollaboratorError};

use super::RepositoryError;
use crate::DbPool;

/// Remaining allowance for one (employee, category, year).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BalanceRow {
    pub total_days: Decimal,
    pub used_days: Decimal,
}

impl BalanceRow {
    pub fn remaining(&self) -> Decimal {
        self.total_days - self.used_days
    }
}

pub struct SqlBalanceService {
    pool: DbPool,
}

impl SqlBalanceService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Sets the yearly allowance, keeping days already used.
    pub async fn grant(
        &self,
        employee_id: EmployeeId,
        category: LeaveCategory,
        year: i32,
        total_days: Decimal,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO leave_balance (employee_id, category, year, total_days, used_days)
             VALUES (?, ?, ?, ?, '0')
             ON CONFLICT(employee_id, category, year) DO UPDATE SET total_days = excluded.total_days",
        )
        .bind(employee_id.0)
        .bind(category.as_str())
        .bind(year)
        .bind(total_days.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find(
        &self,
        employee_id: EmployeeId,
        category: LeaveCategory,
        year: i32,
    ) -> Result<Option<BalanceRow>, RepositoryError> {
        let row = sqlx::query(
            "SELECT total_days, used_days FROM leave_balance
             WHERE employee_id = ? AND category = ? AND year = ?",
        )
        .bind(employee_id.0)
        .bind(category.as_str())
        .bind(year)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
        let total: String = row.try_get("total_days").map_err(decode)?;
        let used: String = row.try_get("used_days").map_err(decode)?;
        Ok(Some(BalanceRow {
            total_days: parse_days("total_days", &total)?,
            used_days: parse_days("used_days", &used)?,
        }))
    }

    async fn adjust_used(
        &self,
        employee_id: EmployeeId,
        category: LeaveCategory,
        year: i32,
        delta: Decimal,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let current: Option<String> = sqlx::query_scalar(
            "SELECT used_days FROM leave_balance WHERE employee_id = ? AND category = ? AND year = ?",
        )
        .bind(employee_id.0)
        .bind(category.as_str())
        .bind(year)
        .fetch_optional(&mut *tx)
        .await?;

        let used = match current {
            Some(raw) => parse_days("used_days", &raw)?,
            None => Decimal::ZERO,
        };
        let next = (used + delta).max(Decimal::ZERO);

        sqlx::query(
            "INSERT INTO leave_balance (employee_id, category, year, total_days, used_days)
             VALUES (?, ?, ?, '0', ?)
             ON CONFLICT(employee_id, category, year) DO UPDATE SET used_days = excluded.used_days",
        )
        .bind(employee_id.0)
        .bind(category.as_str())
        .bind(year)
        .bind(next.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn parse_days(column: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw).map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

#[async_trait::async_trait]
impl BalanceService for SqlBalanceService {
    async fn has_enough_balance(
        &self,
        employee_id: EmployeeId,
        category: LeaveCategory,
        year: i32,
        days: u32,
    ) -> Result<bool, CollaboratorError> {
        let row = self.find(employee_id, category, year).await?;
        Ok(row.is_some_and(|row| row.remaining() >= Decimal::from(days)))
    }

    async fn deduct(
        &self,
        employee_id: EmployeeId,
        category: LeaveCategory,
        year: i32,
        days: u32,
    ) -> Result<(), CollaboratorError> {
        Ok(self.adjust_used(employee_id, category, year, Decimal::from(days)).await?)
    }

    async fn credit(
        &self,
        employee_id: EmployeeId,
        category: LeaveCategory,
        year: i32,
        days: u32,
    ) -> Result<(), CollaboratorError> {
        Ok(self.adjust_used(employee_id, category, year, -Decimal::from(days)).await?)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use leaveflow_core::domain::employee::EmployeeId;
    use leaveflow_core::domain::leave::LeaveCategory;
    use leaveflow_core::ports::BalanceService;

    use super::SqlBalanceService;
    use crate::repositories::test_support::{seed_small_org, setup};

    #[tokio::test]
    async fn deduction_reduces_remaining_allowance() {
        let pool = setup().await;
        seed_small_org(&pool).await;
        let balances = SqlBalanceService::new(pool);
        balances
            .grant(EmployeeId(1), LeaveCategory::Casual, 2024, Decimal::from(10))
            .await
            .expect("grant");

        assert!(balances.has_enough_balance(EmployeeId(1), LeaveCategory::Casual, 2024, 10).await.expect("check"));
        balances.deduct(EmployeeId(1), LeaveCategory::Casual, 2024, 8).await.expect("deduct");
        assert!(!balances.has_enough_balance(EmployeeId(1), LeaveCategory::Casual, 2024, 3).await.expect("check"));

        let row = balances.find(EmployeeId(1), LeaveCategory::Casual, 2024).await.expect("find").expect("row");
        assert_eq!(row.used_days, Decimal::from(8));
        assert_eq!(row.remaining(), Decimal::from(2));
    }

    #[tokio::test]
    async fn credit_never_drops_below_zero_and_regrant_keeps_usage() {
        let pool = setup().await;
        seed_small_org(&pool).await;
        let balances = SqlBalanceService::new(pool);
        balances.grant(EmployeeId(1), LeaveCategory::Sick, 2024, Decimal::from(5)).await.expect("grant");
        balances.deduct(EmployeeId(1), LeaveCategory::Sick, 2024, 2).await.expect("deduct");
        balances.grant(EmployeeId(1), LeaveCategory::Sick, 2024, Decimal::from(7)).await.expect("regrant");

        let row = balances.find(EmployeeId(1), LeaveCategory::Sick, 2024).await.expect("find").expect("row");
        assert_eq!(row.remaining(), Decimal::from(5));

        balances.credit(EmployeeId(1), LeaveCategory::Sick, 2024, 9).await.expect("credit");
        let row = balances.find(EmployeeId(1), LeaveCategory::Sick, 2024).await.expect("find").expect("row");
        assert_eq!(row.used_days, Decimal::ZERO);
    }

    #[tokio::test]
    async fn missing_allowance_is_not_enough() {
        let pool = setup().await;
        seed_small_org(&pool).await;
        let balances = SqlBalanceService::new(pool);

        assert!(!balances.has_enough_balance(EmployeeId(1), LeaveCategory::Annual, 2024, 1).await.expect("check"));
    }
}
