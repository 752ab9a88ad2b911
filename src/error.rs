use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
    #[error("validation failed: {0}")]
    Validation(#[from] crate::services::store::ValidationError),
    #[error("save failed: {0}")]
    Save(#[from] crate::services::store::SaveError),
    #[error("not found")]
    NotFound,
    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;
