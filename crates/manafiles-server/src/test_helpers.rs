use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use manafiles_core::User;
use manafiles_db::SqliteDatabase;
use manafiles_service::{LocalService, ResetCodeSender, ServiceError};
use manafiles_store::LocalStore;
use tempfile::TempDir;
use tokio::net::TcpListener;

use crate::{AppState, InnerAppState};

/// Upload limit used by test servers.
pub const TEST_MAX_UPLOAD_BYTES: usize = 1024 * 1024;

/// Keeps issued reset codes in memory instead of mailing them.
#[derive(Default)]
pub struct CapturedCodes {
    codes: Mutex<Vec<(String, String)>>,
}

impl CapturedCodes {
    /// Most recent code sent to `email`.
    pub fn last_for(&self, email: &str) -> Option<String> {
        self.codes
            .lock()
            .ok()?
            .iter()
            .rev()
            .find(|(to, _)| to.eq_ignore_ascii_case(email))
            .map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl ResetCodeSender for CapturedCodes {
    async fn send(&self, _user: &User, email: &str, code: &str) -> Result<(), ServiceError> {
        self.codes
            .lock()
            .map_err(|_| ServiceError::Internal("lock poisoned".into()))?
            .push((email.to_string(), code.to_string()));
        Ok(())
    }
}

/// App state over in-memory SQLite and a temp-dir object store. The store
/// lives as long as the returned `TempDir`.
pub fn test_state(codes: Arc<CapturedCodes>) -> (AppState, TempDir) {
    let tmp = tempfile::tempdir().unwrap();
    let db = Arc::new(SqliteDatabase::open_in_memory().unwrap());
    let store = Arc::new(LocalStore::new(tmp.path()));
    let service = LocalService::new(db, store).with_code_sender(codes);
    let state = Arc::new(InnerAppState {
        service,
        max_upload_bytes: TEST_MAX_UPLOAD_BYTES,
    });
    (state, tmp)
}

pub fn test_router() -> (Router, TempDir) {
    let (state, tmp) = test_state(Arc::new(CapturedCodes::default()));
    (crate::build_router(state), tmp)
}

/// A running test server with base_url and background task handle.
pub struct TestServer {
    pub base_url: String,
    pub codes: Arc<CapturedCodes>,
    _handle: tokio::task::JoinHandle<()>,
    _tmp: TempDir,
}

/// Spawn an axum test server on a random port. Returns the TestServer
/// with the `base_url` (e.g. "http://127.0.0.1:12345").
pub async fn spawn_test_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let codes = Arc::new(CapturedCodes::default());
    let (state, tmp) = test_state(codes.clone());
    let handle = tokio::spawn(async move {
        crate::serve(listener, state).await.unwrap();
    });
    TestServer {
        base_url: format!("http://{addr}"),
        codes,
        _handle: handle,
        _tmp: tmp,
    }
}
