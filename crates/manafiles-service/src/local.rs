use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use manafiles_core::access;
use manafiles_core::category::CategorySummary;
use manafiles_core::file::{label_from_filename, DEFAULT_CONTENT_TYPE};
use manafiles_core::password_reset::{
    ConfirmReset, PasswordReset, RequestReset, ResetTicket, VerifyReset, MAX_RESET_ATTEMPTS,
};
use manafiles_core::user::{CreateUser, Login, Signup};
use manafiles_core::{Category, FileRecord, Session, User};
use manafiles_db::{Database, DbError};
use manafiles_store::{file_content_key, ObjectStore};

use crate::credentials::{
    constant_time_eq, generate_reset_code, generate_token, hash_password_blocking, sha256_hex,
    verify_password_blocking,
};
use crate::{FileService, LogCodeSender, ResetCodeSender, ServiceError, UploadFile};

pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// In-process implementation over a `Database` and an `ObjectStore`.
pub struct LocalService {
    db: Arc<dyn Database>,
    store: Arc<dyn ObjectStore>,
    session_ttl: Duration,
    code_sender: Arc<dyn ResetCodeSender>,
}

impl LocalService {
    pub fn new(db: Arc<dyn Database>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            db,
            store,
            session_ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            code_sender: Arc::new(LogCodeSender),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_code_sender(mut self, sender: Arc<dyn ResetCodeSender>) -> Self {
        self.code_sender = sender;
        self
    }

    pub fn db(&self) -> &Arc<dyn Database> {
        &self.db
    }

    /// Re-check the session against the database and return its user.
    async fn caller(&self, session: &Session) -> Result<User, ServiceError> {
        Ok(self.authenticate(&session.token).await?.user)
    }

    async fn owned_file(&self, user: &User, id: &str) -> Result<FileRecord, ServiceError> {
        let record = self.db.get_file(id).await?;
        if !access::can_access(&record, &user.id) {
            return Err(ServiceError::Forbidden(format!(
                "file {id} belongs to another user"
            )));
        }
        Ok(record)
    }
}

fn invalid_code() -> ServiceError {
    ServiceError::InvalidCredentials("invalid or expired reset code".into())
}

#[async_trait]
impl FileService for LocalService {
    async fn signup(&self, input: &Signup) -> Result<User, ServiceError> {
        let input = input.normalized()?;

        if self.db.find_user_by_username(&input.username).await?.is_some() {
            return Err(ServiceError::DuplicateUser(format!(
                "username '{}' is taken",
                input.username
            )));
        }
        if let Some(email) = &input.email {
            if self.db.find_user_by_email(email).await?.is_some() {
                return Err(ServiceError::DuplicateUser(
                    "email is already registered".into(),
                ));
            }
        }

        let password_hash = hash_password_blocking(input.password.clone()).await?;
        let user = self
            .db
            .create_user(&CreateUser {
                username: input.username.clone(),
                email: input.email.clone(),
                password_hash,
            })
            .await
            .map_err(|e| match e {
                // lost a race with a concurrent signup
                DbError::Conflict(msg) => ServiceError::DuplicateUser(msg),
                other => other.into(),
            })?;

        tracing::info!(user_id = %user.id, username = %user.username, "user signed up");
        Ok(user)
    }

    async fn login(&self, input: &Login) -> Result<Session, ServiceError> {
        let username = input.username.trim();
        if username.is_empty() {
            return Err(ServiceError::MissingField("username".into()));
        }
        if input.password.is_empty() {
            return Err(ServiceError::MissingField("password".into()));
        }

        let bad = || ServiceError::InvalidCredentials("invalid username or password".into());
        let user = self
            .db
            .find_user_by_username(username)
            .await?
            .ok_or_else(bad)?;
        let ok = verify_password_blocking(input.password.clone(), user.password_hash.clone())
            .await?;
        if !ok {
            tracing::debug!(username, "login rejected");
            return Err(bad());
        }

        let token = generate_token();
        let expires_at = Utc::now() + self.session_ttl;
        self.db
            .create_session(&user.id, &sha256_hex(&token), expires_at)
            .await?;

        tracing::info!(user_id = %user.id, "session opened");
        Ok(Session {
            token,
            user,
            expires_at,
        })
    }

    async fn logout(&self, session: &Session) -> Result<(), ServiceError> {
        let record = self
            .db
            .find_session_by_hash(&sha256_hex(&session.token))
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("unknown session".into()))?;
        self.db.delete_session(&record.id).await?;
        tracing::info!(user_id = %record.user_id, "session closed");
        Ok(())
    }

    async fn authenticate(&self, token: &str) -> Result<Session, ServiceError> {
        let record = self
            .db
            .find_session_by_hash(&sha256_hex(token))
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("invalid session token".into()))?;

        if record.is_expired(Utc::now()) {
            if let Err(e) = self.db.delete_session(&record.id).await {
                tracing::warn!(session_id = %record.id, error = %e, "failed to drop expired session");
            }
            return Err(ServiceError::Unauthorized("session expired".into()));
        }

        let user = self.db.get_user(&record.user_id).await.map_err(|e| match e {
            DbError::NotFound(_) => ServiceError::Unauthorized("invalid session token".into()),
            other => other.into(),
        })?;
        Ok(Session {
            token: token.to_string(),
            user,
            expires_at: record.expires_at,
        })
    }

    async fn request_password_reset(&self, input: &RequestReset) -> Result<(), ServiceError> {
        let email = input.email.trim();
        if email.is_empty() {
            return Err(ServiceError::MissingField("email".into()));
        }
        let user = self
            .db
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::NotFound("no account with that email".into()))?;

        let code = generate_reset_code();
        let expires_at = PasswordReset::expiry_from(Utc::now());
        self.db
            .create_password_reset(&user.id, &sha256_hex(&code), expires_at)
            .await?;
        self.code_sender.send(&user, email, &code).await?;
        Ok(())
    }

    async fn verify_reset_code(&self, input: &VerifyReset) -> Result<ResetTicket, ServiceError> {
        let user = self
            .db
            .find_user_by_email(input.email.trim())
            .await?
            .ok_or_else(invalid_code)?;
        let reset = self
            .db
            .latest_pending_reset(&user.id)
            .await?
            .ok_or_else(invalid_code)?;

        if reset.is_expired(Utc::now()) || reset.attempts_exhausted() {
            return Err(invalid_code());
        }
        if !constant_time_eq(&sha256_hex(input.code.trim()), &reset.code_hash) {
            let attempts = self.db.record_failed_reset_attempt(&reset.id).await?;
            if attempts >= MAX_RESET_ATTEMPTS {
                self.db.delete_resets_for_user(&user.id).await?;
                tracing::warn!(user_id = %user.id, attempts, "reset code discarded after repeated failures");
            }
            return Err(invalid_code());
        }

        let reset_token = generate_token();
        self.db
            .mark_reset_verified(&reset.id, &sha256_hex(&reset_token))
            .await?;
        Ok(ResetTicket { reset_token })
    }

    async fn reset_password(&self, input: &ConfirmReset) -> Result<(), ServiceError> {
        if input.new_password.is_empty() {
            return Err(ServiceError::MissingField("new_password".into()));
        }
        let reset = self
            .db
            .find_reset_by_token(&sha256_hex(&input.reset_token))
            .await?
            .filter(|r| !r.is_expired(Utc::now()))
            .ok_or_else(|| {
                ServiceError::InvalidCredentials("invalid or expired reset token".into())
            })?;

        let password_hash = hash_password_blocking(input.new_password.clone()).await?;
        self.db
            .update_user_password(&reset.user_id, &password_hash)
            .await?;
        self.db.delete_resets_for_user(&reset.user_id).await?;
        let revoked = self.db.delete_sessions_for_user(&reset.user_id).await?;

        tracing::info!(user_id = %reset.user_id, revoked, "password reset completed");
        Ok(())
    }

    async fn upload_file(
        &self,
        session: &Session,
        upload: UploadFile,
    ) -> Result<FileRecord, ServiceError> {
        let owner = self.caller(session).await?;

        let name = match upload.name.trim() {
            "" => label_from_filename(&upload.filename),
            given => given.to_string(),
        };
        if name.is_empty() {
            return Err(ServiceError::MissingField("name".into()));
        }
        if upload.data.is_empty() {
            return Err(ServiceError::MissingField("file".into()));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let content_ref = file_content_key(&owner.id, &id);
        let record = FileRecord {
            id,
            owner_id: owner.id.clone(),
            name,
            category: upload.category,
            content_ref,
            original_filename: upload.filename.trim().to_string(),
            content_type: upload
                .content_type
                .filter(|ct| !ct.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            size_bytes: upload.data.len() as i64,
            created_at: Utc::now(),
        };

        self.store.put(&record.content_ref, upload.data).await?;
        let stored = match self.db.insert_file(&record).await {
            Ok(stored) => stored,
            Err(e) => {
                if let Err(cleanup) = self.store.delete(&record.content_ref).await {
                    tracing::warn!(key = %record.content_ref, error = %cleanup, "orphaned upload content");
                }
                return Err(e.into());
            }
        };

        tracing::info!(
            file_id = %stored.id,
            owner_id = %stored.owner_id,
            category = stored.category.as_str(),
            size = stored.size_bytes,
            "file uploaded"
        );
        Ok(stored)
    }

    async fn list_files(
        &self,
        session: Option<&Session>,
        category: Category,
    ) -> Result<Vec<FileRecord>, ServiceError> {
        let session = match session {
            Some(s) => Some(self.authenticate(&s.token).await?),
            None => None,
        };
        let Some(owner) = access::owner_scope(session.as_ref()) else {
            return Ok(Vec::new());
        };
        let records = self.db.list_files_by_category(category, owner).await?;
        Ok(access::filter_visible(&records, Some(owner), category)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn get_file(&self, session: &Session, id: &str) -> Result<FileRecord, ServiceError> {
        let user = self.caller(session).await?;
        self.owned_file(&user, id).await
    }

    async fn download_file(
        &self,
        session: &Session,
        id: &str,
    ) -> Result<(FileRecord, Bytes), ServiceError> {
        let user = self.caller(session).await?;
        let record = self.owned_file(&user, id).await?;
        let data = self.store.get(&record.content_ref).await?;
        Ok((record, data))
    }

    async fn delete_file(&self, session: &Session, id: &str) -> Result<(), ServiceError> {
        let user = self.caller(session).await?;
        let record = self.db.delete_file(id, &user.id).await?;
        if let Err(e) = self.store.delete(&record.content_ref).await {
            tracing::warn!(key = %record.content_ref, error = %e, "failed to delete file content");
        }
        tracing::info!(file_id = %record.id, owner_id = %record.owner_id, "file deleted");
        Ok(())
    }

    async fn category_summary(
        &self,
        session: Option<&Session>,
    ) -> Result<Vec<CategorySummary>, ServiceError> {
        let Some(session) = session else {
            return Ok(Category::ALL
                .iter()
                .map(|c| CategorySummary::new(*c, 0))
                .collect());
        };
        let user = self.caller(session).await?;
        let counts = self.db.count_files_by_category(&user.id).await?;
        Ok(counts
            .into_iter()
            .map(|(category, n)| CategorySummary::new(category, n))
            .collect())
    }
}
