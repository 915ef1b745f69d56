use thiserror::Error;

use crate::domain::leave::LeaveStatus;
use crate::lifecycle::TransitionError;
use crate::ports::CollaboratorError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyViolation {
    InsufficientBalance { requested_days: u32 },
    BlackoutOverrideRequired,
    OverlappingRequest,
}

impl std::fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientBalance { requested_days } => {
                write!(f, "insufficient leave balance for {requested_days} working day(s)")
            }
            Self::BlackoutOverrideRequired => {
                f.write_str("request overlaps a blackout period; approval requires an explicit override")
            }
            Self::OverlappingRequest => {
                f.write_str("an active leave request already covers some of these dates")
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("not authorized: {0}")]
    Unauthorized(String),
    #[error("cannot {operation} a request in status `{status}`")]
    StateConflict { operation: &'static str, status: LeaveStatus },
    #[error("request was modified concurrently; reload and retry")]
    ConcurrentModification,
    #[error("policy violation: {0}")]
    PolicyViolation(PolicyViolation),
}

impl From<TransitionError> for DomainError {
    fn from(value: TransitionError) -> Self {
        match value {
            TransitionError::InvalidTransition { state, event } => {
                Self::StateConflict { operation: event.operation(), status: state }
            }
        }
    }
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::StateConflict { .. } | Self::ConcurrentModification)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<CollaboratorError> for ApplicationError {
    fn from(value: CollaboratorError) -> Self {
        Self::Integration(value.to_string())
    }
}

impl ApplicationError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(error) => Some(error),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested leave request or employee does not exist.",
            Self::Forbidden { .. } => "You are not allowed to perform this action on this request.",
            Self::Conflict { .. } => {
                "The request is no longer in a state that allows this action. Refresh and retry."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    fn correlation_id_mut(&mut self) -> &mut String {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let mut mapped = InterfaceError::from(self);
        *mapped.correlation_id_mut() = correlation_id.into();
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                let message = error.to_string();
                match error {
                    DomainError::Validation(_) | DomainError::PolicyViolation(_) => {
                        Self::BadRequest { message, correlation_id }
                    }
                    DomainError::NotFound { .. } => Self::NotFound { message, correlation_id },
                    DomainError::Unauthorized(_) => Self::Forbidden { message, correlation_id },
                    DomainError::StateConflict { .. } | DomainError::ConcurrentModification => {
                        Self::Conflict { message, correlation_id }
                    }
                }
            }
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}
