use async_trait::async_trait;
use bytes::Bytes;
use manafiles_core::category::CategorySummary;
use manafiles_core::password_reset::{ConfirmReset, RequestReset, ResetTicket, VerifyReset};
use manafiles_core::user::{Login, Signup};
use manafiles_core::{Category, FileRecord, Session, User};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};

use crate::{FileService, ServiceError, UploadFile};

/// Async HTTP client implementation of FileService.
/// Connects to a running manafiles-server.
pub struct HttpService {
    base_url: String,
    client: Client,
}

impl HttpService {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn with_auth(builder: RequestBuilder, session: Option<&Session>) -> RequestBuilder {
        match session {
            Some(s) => builder.bearer_auth(&s.token),
            None => builder,
        }
    }

    /// Check if the server is reachable. Not authenticated.
    pub async fn health_check(&self) -> Result<(), ServiceError> {
        let resp = self
            .client
            .get(self.url("/api/health"))
            .send()
            .await
            .map_err(|e| ServiceError::Internal(format!("connection failed: {e}")))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ServiceError::Internal(format!(
                "health check failed: {}",
                resp.status()
            )))
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, ServiceError> {
        builder
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        session: Option<&Session>,
    ) -> Result<T, ServiceError> {
        let builder = Self::with_auth(self.client.get(self.url(path)), session);
        handle_response(self.send(builder).await?).await
    }

    async fn post_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        session: Option<&Session>,
    ) -> Result<T, ServiceError> {
        let builder = Self::with_auth(self.client.post(self.url(path)).json(body), session);
        handle_response(self.send(builder).await?).await
    }

    /// POST whose success response carries no body.
    async fn post_empty<B: serde::Serialize>(
        &self,
        path: &str,
        body: Option<&B>,
        session: Option<&Session>,
    ) -> Result<(), ServiceError> {
        let mut builder = self.client.post(self.url(path));
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let resp = self.send(Self::with_auth(builder, session)).await?;
        expect_success(resp).await
    }

    async fn delete_req(&self, path: &str, session: &Session) -> Result<(), ServiceError> {
        let builder = Self::with_auth(self.client.delete(self.url(path)), Some(session));
        expect_success(self.send(builder).await?).await
    }

    /// Fetch the raw bytes of a file.
    pub async fn get_content(&self, session: &Session, id: &str) -> Result<Bytes, ServiceError> {
        let builder = Self::with_auth(
            self.client.get(self.url(&format!("/api/files/{id}/content"))),
            Some(session),
        );
        let resp = self.send(builder).await?;
        let status = resp.status();
        if status.is_success() {
            resp.bytes()
                .await
                .map_err(|e| ServiceError::Internal(format!("read body: {e}")))
        } else {
            Err(parse_error_with_status(status, resp).await)
        }
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        resp.json::<T>()
            .await
            .map_err(|e| ServiceError::Internal(format!("json decode: {e}")))
    } else {
        Err(parse_error_with_status(status, resp).await)
    }
}

async fn expect_success(resp: reqwest::Response) -> Result<(), ServiceError> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(parse_error_with_status(status, resp).await)
    }
}

async fn parse_error_with_status(status: StatusCode, resp: reqwest::Response) -> ServiceError {
    let body = resp.text().await.unwrap_or_default();
    let msg = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"].as_str().map(String::from))
        .unwrap_or(body);
    error_from_status(status, msg)
}

/// Rebuild a `ServiceError` from a status code and the server's message,
/// which is the `Display` form of the original error.
fn error_from_status(status: StatusCode, msg: String) -> ServiceError {
    let strip = |prefix: &str| msg.strip_prefix(prefix).map(String::from);
    match status {
        StatusCode::NOT_FOUND => ServiceError::NotFound(strip("not found: ").unwrap_or(msg)),
        StatusCode::UNAUTHORIZED => {
            ServiceError::Unauthorized(strip("unauthorized: ").unwrap_or(msg))
        }
        StatusCode::FORBIDDEN => ServiceError::Forbidden(strip("forbidden: ").unwrap_or(msg)),
        StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE => {
            if let Some(m) = strip("duplicate user: ") {
                ServiceError::DuplicateUser(m)
            } else if let Some(m) = strip("invalid credentials: ") {
                ServiceError::InvalidCredentials(m)
            } else if let Some(m) = strip("missing field: ") {
                ServiceError::MissingField(m)
            } else {
                ServiceError::InvalidInput(strip("invalid input: ").unwrap_or(msg))
            }
        }
        _ => ServiceError::Internal(strip("internal error: ").unwrap_or(msg)),
    }
}

#[async_trait]
impl FileService for HttpService {
    async fn signup(&self, input: &Signup) -> Result<User, ServiceError> {
        let session: Session = self.post_json("/api/signup", input, None).await?;
        Ok(session.user)
    }

    async fn login(&self, input: &Login) -> Result<Session, ServiceError> {
        self.post_json("/api/login", input, None).await
    }

    async fn logout(&self, session: &Session) -> Result<(), ServiceError> {
        self.post_empty::<()>("/api/logout", None, Some(session))
            .await
    }

    async fn authenticate(&self, token: &str) -> Result<Session, ServiceError> {
        let builder = self.client.get(self.url("/api/me")).bearer_auth(token);
        handle_response(self.send(builder).await?).await
    }

    async fn request_password_reset(&self, input: &RequestReset) -> Result<(), ServiceError> {
        self.post_empty("/api/password-reset/request", Some(input), None)
            .await
    }

    async fn verify_reset_code(&self, input: &VerifyReset) -> Result<ResetTicket, ServiceError> {
        self.post_json("/api/password-reset/verify", input, None)
            .await
    }

    async fn reset_password(&self, input: &ConfirmReset) -> Result<(), ServiceError> {
        self.post_empty("/api/password-reset/confirm", Some(input), None)
            .await
    }

    async fn upload_file(
        &self,
        session: &Session,
        upload: UploadFile,
    ) -> Result<FileRecord, ServiceError> {
        let mut part = Part::bytes(upload.data.to_vec()).file_name(upload.filename);
        if let Some(ct) = upload.content_type.as_deref() {
            part = part
                .mime_str(ct)
                .map_err(|e| ServiceError::InvalidInput(format!("content type: {e}")))?;
        }
        let form = Form::new()
            .text("name", upload.name)
            .text("category", upload.category.as_str())
            .part("file", part);

        let builder = Self::with_auth(
            self.client.post(self.url("/api/files")).multipart(form),
            Some(session),
        );
        handle_response(self.send(builder).await?).await
    }

    async fn list_files(
        &self,
        session: Option<&Session>,
        category: Category,
    ) -> Result<Vec<FileRecord>, ServiceError> {
        self.get_json(&format!("/api/files?category={}", category.as_str()), session)
            .await
    }

    async fn get_file(&self, session: &Session, id: &str) -> Result<FileRecord, ServiceError> {
        self.get_json(&format!("/api/files/{id}"), Some(session))
            .await
    }

    async fn download_file(
        &self,
        session: &Session,
        id: &str,
    ) -> Result<(FileRecord, Bytes), ServiceError> {
        let record = self.get_file(session, id).await?;
        let data = self.get_content(session, id).await?;
        Ok((record, data))
    }

    async fn delete_file(&self, session: &Session, id: &str) -> Result<(), ServiceError> {
        self.delete_req(&format!("/api/files/{id}"), session).await
    }

    async fn category_summary(
        &self,
        session: Option<&Session>,
    ) -> Result<Vec<CategorySummary>, ServiceError> {
        self.get_json("/api/categories", session).await
    }
}
