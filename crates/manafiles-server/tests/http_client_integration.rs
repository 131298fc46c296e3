//! Integration tests for HttpService against a real server.
//!
//! Each test spawns an in-process axum server on 127.0.0.1:0 with in-memory
//! SQLite and a temp-dir object store, then drives it through the HTTP client.

use bytes::Bytes;
use manafiles_core::password_reset::{ConfirmReset, RequestReset, VerifyReset};
use manafiles_core::user::{Login, Signup};
use manafiles_core::{Category, Session};
use manafiles_server::test_helpers::{spawn_test_server, TestServer};
use manafiles_service::{FileService, HttpService, ServiceError, UploadFile};

async fn connect() -> (TestServer, HttpService) {
    let server = spawn_test_server().await;
    let svc = HttpService::new(&server.base_url);
    (server, svc)
}

fn signup(username: &str, email: &str, password: &str) -> Signup {
    Signup {
        username: username.into(),
        email: Some(email.into()),
        password: password.into(),
    }
}

fn login(username: &str, password: &str) -> Login {
    Login {
        username: username.into(),
        password: password.into(),
    }
}

fn upload(name: &str, category: Category, filename: &str, data: &[u8]) -> UploadFile {
    UploadFile {
        name: name.into(),
        category,
        filename: filename.into(),
        content_type: Some("application/pdf".into()),
        data: Bytes::copy_from_slice(data),
    }
}

async fn user_session(svc: &HttpService, username: &str) -> Session {
    svc.signup(&signup(username, &format!("{username}@example.com"), "pw"))
        .await
        .unwrap();
    svc.login(&login(username, "pw")).await.unwrap()
}

#[tokio::test]
async fn health_check_via_http() {
    let (_server, svc) = connect().await;
    svc.health_check().await.unwrap();
}

#[tokio::test]
async fn signup_login_scenario_via_http() {
    let (_server, svc) = connect().await;

    let alice = svc.signup(&signup("alice", "a@x.com", "pw1")).await.unwrap();
    assert_eq!(alice.username, "alice");
    assert_eq!(alice.email.as_deref(), Some("a@x.com"));

    let err = svc
        .signup(&signup("alice", "b@y.com", "pw2"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateUser(_)), "{err}");

    let session = svc.login(&login("alice", "pw1")).await.unwrap();
    assert_eq!(session.user.id, alice.id);

    let err = svc.login(&login("alice", "wrong")).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidCredentials(_)), "{err}");

    let err = svc
        .signup(&Signup {
            username: "bob".into(),
            email: None,
            password: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::MissingField(ref f) if f == "password"), "{err}");
}

#[tokio::test]
async fn session_lifecycle_via_http() {
    let (_server, svc) = connect().await;
    let session = user_session(&svc, "alice").await;

    let me = svc.authenticate(&session.token).await.unwrap();
    assert_eq!(me.user.username, "alice");

    svc.logout(&session).await.unwrap();
    let err = svc.authenticate(&session.token).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)), "{err}");
}

#[tokio::test]
async fn file_crud_via_http() {
    let (_server, svc) = connect().await;
    let alice = user_session(&svc, "alice").await;

    let rec = svc
        .upload_file(&alice, upload("Passport", Category::Documents, "passport.pdf", b"%PDF"))
        .await
        .unwrap();
    assert_eq!(rec.name, "Passport");
    assert_eq!(rec.owner_id, alice.user.id);
    assert_eq!(rec.content_type, "application/pdf");
    assert_eq!(rec.original_filename, "passport.pdf");

    let listed = svc
        .list_files(Some(&alice), Category::Documents)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, rec.id);
    assert!(svc
        .list_files(Some(&alice), Category::Notes)
        .await
        .unwrap()
        .is_empty());

    let (meta, data) = svc.download_file(&alice, &rec.id).await.unwrap();
    assert_eq!(meta.id, rec.id);
    assert_eq!(data.as_ref(), b"%PDF");

    let summary = svc.category_summary(Some(&alice)).await.unwrap();
    let docs = summary
        .iter()
        .find(|s| s.category == Category::Documents)
        .unwrap();
    assert_eq!(docs.file_count, 1);

    svc.delete_file(&alice, &rec.id).await.unwrap();
    assert!(svc
        .list_files(Some(&alice), Category::Documents)
        .await
        .unwrap()
        .is_empty());
    let err = svc.get_file(&alice, &rec.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)), "{err}");
}

#[tokio::test]
async fn anonymous_callers_see_nothing() {
    let (_server, svc) = connect().await;
    let alice = user_session(&svc, "alice").await;
    svc.upload_file(&alice, upload("pic", Category::Images, "pic.png", b"png"))
        .await
        .unwrap();

    assert!(svc.list_files(None, Category::Images).await.unwrap().is_empty());
    let summary = svc.category_summary(None).await.unwrap();
    assert_eq!(summary.len(), 4);
    assert!(summary.iter().all(|s| s.file_count == 0));
}

#[tokio::test]
async fn other_users_get_forbidden() {
    let (_server, svc) = connect().await;
    let alice = user_session(&svc, "alice").await;
    let bob = user_session(&svc, "bob").await;
    let rec = svc
        .upload_file(&alice, upload("cert", Category::Certificates, "c.pem", b"secret"))
        .await
        .unwrap();

    assert!(svc
        .list_files(Some(&bob), Category::Certificates)
        .await
        .unwrap()
        .is_empty());
    let err = svc.download_file(&bob, &rec.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)), "{err}");
    let err = svc.delete_file(&bob, &rec.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)), "{err}");

    assert_eq!(
        svc.list_files(Some(&alice), Category::Certificates)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn upload_validation_via_http() {
    let (_server, svc) = connect().await;
    let alice = user_session(&svc, "alice").await;

    let rec = svc
        .upload_file(&alice, upload("", Category::Notes, "shopping list.txt", b"milk"))
        .await
        .unwrap();
    assert_eq!(rec.name, "shopping list");

    let err = svc
        .upload_file(&alice, upload("empty", Category::Notes, "e.txt", b""))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::MissingField(ref f) if f == "file"), "{err}");
}

#[tokio::test]
async fn expired_or_bogus_token_is_rejected() {
    let (_server, svc) = connect().await;
    let forged = Session {
        token: "mf_forged".into(),
        user: svc.signup(&signup("eve", "e@x.com", "pw")).await.unwrap(),
        expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
    };

    let err = svc
        .list_files(Some(&forged), Category::Images)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)), "{err}");
    let err = svc
        .upload_file(&forged, upload("x", Category::Images, "x.png", b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)), "{err}");
}

#[tokio::test]
async fn password_reset_via_http() {
    let (server, svc) = connect().await;
    svc.signup(&signup("alice", "a@x.com", "old")).await.unwrap();
    let old_session = svc.login(&login("alice", "old")).await.unwrap();

    let err = svc
        .request_password_reset(&RequestReset {
            email: "ghost@x.com".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)), "{err}");

    svc.request_password_reset(&RequestReset {
        email: "a@x.com".into(),
    })
    .await
    .unwrap();
    let code = server.codes.last_for("a@x.com").unwrap();

    let ticket = svc
        .verify_reset_code(&VerifyReset {
            email: "a@x.com".into(),
            code,
        })
        .await
        .unwrap();
    svc.reset_password(&ConfirmReset {
        reset_token: ticket.reset_token,
        new_password: "new".into(),
    })
    .await
    .unwrap();

    let err = svc.login(&login("alice", "old")).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidCredentials(_)), "{err}");
    svc.login(&login("alice", "new")).await.unwrap();
    let err = svc.authenticate(&old_session.token).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)), "{err}");
}
