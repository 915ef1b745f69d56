use std::collections::HashMap;

use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::domain::employee::EmployeeId;
use crate::domain::leave::{DateRange, LeaveCategory, LeaveRequestId};
use crate::ports::{
    BalanceService, BlackoutPeriod, BlackoutService, CapacityReport, CapacityService,
    CollaboratorError, NotificationKind, NotificationSink,
};

type BalanceKey = (EmployeeId, LeaveCategory, i32);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Allowance {
    total: Decimal,
    used: Decimal,
}

impl Allowance {
    fn remaining(&self) -> Decimal {
        self.total - self.used
    }
}

#[derive(Default)]
pub struct InMemoryBalanceService {
    allowances: RwLock<HashMap<BalanceKey, Allowance>>,
}

impl InMemoryBalanceService {
    pub async fn grant(&self, employee_id: EmployeeId, category: LeaveCategory, year: i32, days: u32) {
        let mut allowances = self.allowances.write().await;
        allowances.entry((employee_id, category, year)).or_default().total += Decimal::from(days);
    }

    pub async fn used_days(&self, employee_id: EmployeeId, category: LeaveCategory, year: i32) -> Decimal {
        let allowances = self.allowances.read().await;
        allowances.get(&(employee_id, category, year)).map(|allowance| allowance.used).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl BalanceService for InMemoryBalanceService {
    async fn has_enough_balance(
        &self,
        employee_id: EmployeeId,
        category: LeaveCategory,
        year: i32,
        days: u32,
    ) -> Result<bool, CollaboratorError> {
        let allowances = self.allowances.read().await;
        Ok(allowances
            .get(&(employee_id, category, year))
            .is_some_and(|allowance| allowance.remaining() >= Decimal::from(days)))
    }

    async fn deduct(
        &self,
        employee_id: EmployeeId,
        category: LeaveCategory,
        year: i32,
        days: u32,
    ) -> Result<(), CollaboratorError> {
        let mut allowances = self.allowances.write().await;
        allowances.entry((employee_id, category, year)).or_default().used += Decimal::from(days);
        Ok(())
    }

    async fn credit(
        &self,
        employee_id: EmployeeId,
        category: LeaveCategory,
        year: i32,
        days: u32,
    ) -> Result<(), CollaboratorError> {
        let mut allowances = self.allowances.write().await;
        let allowance = allowances.entry((employee_id, category, year)).or_default();
        allowance.used = (allowance.used - Decimal::from(days)).max(Decimal::ZERO);
        Ok(())
    }
}

/// Returns the same report for every query.
#[derive(Default)]
pub struct InMemoryCapacityService {
    report: RwLock<CapacityReport>,
}

impl InMemoryCapacityService {
    pub fn with_report(report: CapacityReport) -> Self {
        Self { report: RwLock::new(report) }
    }
}

#[async_trait::async_trait]
impl CapacityService for InMemoryCapacityService {
    async fn check_team_capacity(
        &self,
        _requester_id: EmployeeId,
        _department: &str,
        _range: &DateRange,
    ) -> Result<CapacityReport, CollaboratorError> {
        Ok(self.report.read().await.clone())
    }
}

#[derive(Default)]
pub struct InMemoryBlackoutService {
    periods: RwLock<Vec<BlackoutPeriod>>,
}

impl InMemoryBlackoutService {
    pub fn with_periods(periods: Vec<BlackoutPeriod>) -> Self {
        Self { periods: RwLock::new(periods) }
    }
}

#[async_trait::async_trait]
impl BlackoutService for InMemoryBlackoutService {
    async fn conflicting_periods(
        &self,
        department: &str,
        range: &DateRange,
    ) -> Result<Vec<BlackoutPeriod>, CollaboratorError> {
        let periods = self.periods.read().await;
        Ok(periods
            .iter()
            .filter(|period| period.department.eq_ignore_ascii_case(department))
            .filter(|period| period.range().overlaps(range))
            .cloned()
            .collect())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentNotification {
    pub recipient: EmployeeId,
    pub kind: NotificationKind,
    pub message: String,
    pub request_id: Option<LeaveRequestId>,
}

#[derive(Default)]
pub struct InMemoryNotificationSink {
    sent: RwLock<Vec<SentNotification>>,
    failing: bool,
}

impl InMemoryNotificationSink {
    /// A sink whose every delivery fails, for exercising error isolation.
    pub fn failing() -> Self {
        Self { sent: RwLock::default(), failing: true }
    }

    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.read().await.clone()
    }

    pub async fn sent_to(&self, recipient: EmployeeId) -> Vec<SentNotification> {
        self.sent.read().await.iter().filter(|n| n.recipient == recipient).cloned().collect()
    }
}

#[async_trait::async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn notify(
        &self,
        recipient: EmployeeId,
        kind: NotificationKind,
        message: &str,
        request_id: Option<LeaveRequestId>,
    ) -> Result<(), CollaboratorError> {
        if self.failing {
            return Err(CollaboratorError::unavailable("notification_sink", "delivery disabled"));
        }
        self.sent.write().await.push(SentNotification {
            recipient,
            kind,
            message: message.to_owned(),
            request_id,
        });
        Ok(())
    }
}
