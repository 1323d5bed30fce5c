use super::dialer::DialerError;
use super::store::StoreError;

/// Caller-correctable input problems.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("{0}")]
    Invalid(String),
}

/// Failure taxonomy shared by every pipeline operation. Any error aborts the enclosing
/// store transaction; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("invalid value '{value}' for {field}")]
    InvalidEnumValue { field: &'static str, value: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("calling service failed: {0}")]
    Upstream(#[from] DialerError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Machine-readable kind included in HTTP error bodies.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation_error",
            Self::InvalidEnumValue { .. } => "invalid_enum_value",
            Self::Conflict(_) => "conflict",
            Self::Upstream(_) => "upstream_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::Conflict(detail) => Self::Conflict(detail),
            StoreError::Unavailable(detail) => Self::Internal(detail),
        }
    }
}
