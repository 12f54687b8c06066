//! Service-level error: a domain failure or a store failure.

use thiserror::Error;

use millerp_core::DomainError;

use crate::store::StoreError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    /// Stable machine-readable code, shared with the API envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Domain(e) => e.code(),
            ServiceError::Store(StoreError::Duplicate(_))
            | ServiceError::Store(StoreError::VersionMismatch { .. }) => "CONFLICT",
            ServiceError::Store(StoreError::Invalid(_)) => "VALIDATION_ERROR",
            ServiceError::Store(StoreError::Missing(_)) => "INTERNAL_ERROR",
        }
    }

    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            ServiceError::Store(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_map_to_conflict_code() {
        let err = ServiceError::from(StoreError::Duplicate("sku X".to_string()));
        assert_eq!(err.code(), "CONFLICT");
        assert_eq!(
            ServiceError::from(DomainError::not_found("goods issue")).code(),
            "NOT_FOUND"
        );
    }
}
