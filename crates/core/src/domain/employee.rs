use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmployeeId(pub i64);

impl EmployeeId {
    /// Attribution for transitions performed by the scheduler rather than a person.
    pub const SYSTEM: EmployeeId = EmployeeId(0);

    pub fn is_system(&self) -> bool {
        *self == Self::SYSTEM
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeRole {
    Individual,
    Manager,
    Hr,
}

impl EmployeeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Manager => "manager",
            Self::Hr => "hr",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "individual" | "employee" => Some(Self::Individual),
            "manager" => Some(Self::Manager),
            "hr" => Some(Self::Hr),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub email: String,
    pub role: EmployeeRole,
    pub department: String,
    pub manager_id: Option<EmployeeId>,
}

impl Employee {
    pub fn is_hr(&self) -> bool {
        self.role == EmployeeRole::Hr
    }

    /// Manager- and HR-role employees escalate to their own manager.
    pub fn is_manager_or_hr(&self) -> bool {
        matches!(self.role, EmployeeRole::Manager | EmployeeRole::Hr)
    }
}
