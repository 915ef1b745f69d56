pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, ping, table_exists, DbPool};
pub use fixtures::{DemoSeedDataset, SeedResult, VerificationResult};
pub use repositories::{
    InMemoryLeaveRequestRepository, LeaveRequestRepository, RepositoryAvailabilityOracle,
    RepositoryError, SqlBalanceService, SqlBlackoutService, SqlCapacityService,
    SqlEmployeeRepository, SqlLeaveRequestRepository, SqlNotificationSink,
};
