use async_trait::async_trait;
use manafiles_core::User;

use crate::ServiceError;

/// Delivers a password reset code to the account's email address.
#[async_trait]
pub trait ResetCodeSender: Send + Sync {
    async fn send(&self, user: &User, email: &str, code: &str) -> Result<(), ServiceError>;
}

/// Writes the code to the log instead of sending mail.
pub struct LogCodeSender;

#[async_trait]
impl ResetCodeSender for LogCodeSender {
    async fn send(&self, user: &User, email: &str, code: &str) -> Result<(), ServiceError> {
        tracing::info!(username = %user.username, email, code, "password reset code issued");
        Ok(())
    }
}
