use catalog::CatalogError;
use compile::LocatableError;
use execution::QueryError;
use storage::{codec::CodecError, RecordError, StoreError};
use thiserror::Error;

/// Every failure a statement can end with. The message is complete and renders
/// on a single line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    DuplicateEntity(String),
    #[error("{0}")]
    InvalidSchema(String),
    #[error("{0}")]
    UniqueConstraintViolation(String),
    #[error("{0}")]
    ForeignKeyConstraintViolation(String),
    #[error("{0}")]
    StoreUnavailable(String),
}

impl DriverError {
    /// Name of the error kind, as reported to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            DriverError::NotFound(_) => "NotFound",
            DriverError::DuplicateEntity(_) => "DuplicateEntity",
            DriverError::InvalidSchema(_) => "InvalidSchema",
            DriverError::UniqueConstraintViolation(_) => "UniqueConstraintViolation",
            DriverError::ForeignKeyConstraintViolation(_) => "ForeignKeyConstraintViolation",
            DriverError::StoreUnavailable(_) => "StoreUnavailable",
        }
    }
}

impl From<CatalogError> for DriverError {
    fn from(err: CatalogError) -> Self {
        let message = err.to_string();
        match err {
            CatalogError::NotFound(_) => DriverError::NotFound(message),
            CatalogError::DuplicateEntity(_) => DriverError::DuplicateEntity(message),
            CatalogError::InvalidSchema(_) => DriverError::InvalidSchema(message),
            CatalogError::ForeignKeyConstraintViolation(_) => {
                DriverError::ForeignKeyConstraintViolation(message)
            }
            CatalogError::Io(_) | CatalogError::Serialization(_) => {
                DriverError::StoreUnavailable(message)
            }
        }
    }
}

impl From<StoreError> for DriverError {
    fn from(err: StoreError) -> Self {
        if err.is_not_found() {
            DriverError::NotFound(err.to_string())
        } else if err.is_duplicate() {
            DriverError::DuplicateEntity(err.to_string())
        } else {
            DriverError::StoreUnavailable(err.to_string())
        }
    }
}

impl From<CodecError> for DriverError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Encoding(_) => {
                DriverError::StoreUnavailable(format!("corrupt document: {}", err))
            }
            _ => DriverError::InvalidSchema(err.to_string()),
        }
    }
}

impl From<RecordError> for DriverError {
    fn from(err: RecordError) -> Self {
        let message = err.to_string();
        match err {
            RecordError::NotFound(_) => DriverError::NotFound(message),
            RecordError::DuplicateEntity(_) => DriverError::DuplicateEntity(message),
            RecordError::InvalidSchema(_) => DriverError::InvalidSchema(message),
            RecordError::UniqueConstraintViolation(_) => {
                DriverError::UniqueConstraintViolation(message)
            }
            RecordError::ForeignKeyConstraintViolation(_) => {
                DriverError::ForeignKeyConstraintViolation(message)
            }
            RecordError::Catalog(err) => err.into(),
            RecordError::Store(err) => err.into(),
            RecordError::Codec(err) => err.into(),
        }
    }
}

impl From<QueryError> for DriverError {
    fn from(err: QueryError) -> Self {
        let message = err.to_string();
        match err {
            QueryError::NotFound(_) => DriverError::NotFound(message),
            QueryError::InvalidJoin(_) | QueryError::UndefinedProjection => {
                DriverError::InvalidSchema(message)
            }
            QueryError::Record(err) => err.into(),
            QueryError::Catalog(err) => err.into(),
        }
    }
}

impl From<LocatableError> for DriverError {
    fn from((err, _): LocatableError) -> Self {
        DriverError::InvalidSchema(format!("malformed statement: {}", err))
    }
}

impl From<std::io::Error> for DriverError {
    fn from(err: std::io::Error) -> Self {
        DriverError::StoreUnavailable(err.to_string())
    }
}
