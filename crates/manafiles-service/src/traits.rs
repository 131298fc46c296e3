use async_trait::async_trait;
use bytes::Bytes;
use manafiles_core::category::CategorySummary;
use manafiles_core::password_reset::{ConfirmReset, RequestReset, ResetTicket, VerifyReset};
use manafiles_core::user::{Login, Signup};
use manafiles_core::{Category, FileRecord, ManafilesError, Session, User};
use manafiles_db::DbError;
use manafiles_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("duplicate user: {0}")]
    DuplicateUser(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DbError> for ServiceError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(msg) => ServiceError::NotFound(msg),
            DbError::Forbidden(msg) => ServiceError::Forbidden(msg),
            DbError::Conflict(msg) | DbError::InvalidReference(msg) => {
                ServiceError::InvalidInput(msg)
            }
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => ServiceError::NotFound(format!("content {key}")),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<ManafilesError> for ServiceError {
    fn from(e: ManafilesError) -> Self {
        match e {
            ManafilesError::MissingField(field) => ServiceError::MissingField(field),
            ManafilesError::InvalidInput(msg) => ServiceError::InvalidInput(msg),
        }
    }
}

/// A file as submitted by a client, before it has an id or an owner.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Display label. Blank means "derive from `filename`".
    pub name: String,
    pub category: Category,
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Account and file operations.
///
/// The HTTP routes program against `LocalService`; `HttpService` speaks the
/// same contract over the wire.
#[async_trait]
pub trait FileService: Send + Sync {
    // -- Accounts --
    async fn signup(&self, input: &Signup) -> Result<User, ServiceError>;
    async fn login(&self, input: &Login) -> Result<Session, ServiceError>;
    async fn logout(&self, session: &Session) -> Result<(), ServiceError>;
    /// Resolve a raw bearer token to a live session.
    async fn authenticate(&self, token: &str) -> Result<Session, ServiceError>;

    // -- Password reset --
    async fn request_password_reset(&self, input: &RequestReset) -> Result<(), ServiceError>;
    async fn verify_reset_code(&self, input: &VerifyReset) -> Result<ResetTicket, ServiceError>;
    async fn reset_password(&self, input: &ConfirmReset) -> Result<(), ServiceError>;

    // -- Files --
    async fn upload_file(
        &self,
        session: &Session,
        upload: UploadFile,
    ) -> Result<FileRecord, ServiceError>;
    /// The caller's records in `category`; empty for anonymous callers.
    async fn list_files(
        &self,
        session: Option<&Session>,
        category: Category,
    ) -> Result<Vec<FileRecord>, ServiceError>;
    async fn get_file(&self, session: &Session, id: &str) -> Result<FileRecord, ServiceError>;
    async fn download_file(
        &self,
        session: &Session,
        id: &str,
    ) -> Result<(FileRecord, Bytes), ServiceError>;
    async fn delete_file(&self, session: &Session, id: &str) -> Result<(), ServiceError>;
    async fn category_summary(
        &self,
        session: Option<&Session>,
    ) -> Result<Vec<CategorySummary>, ServiceError>;
}
