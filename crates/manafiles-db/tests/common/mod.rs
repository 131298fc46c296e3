// Backend-agnostic integration tests for the Database trait.
//
// Each public async function accepts `&dyn Database` so the same assertions
// can run against any backend that implements it.

use chrono::{Duration, Utc};
use manafiles_core::user::CreateUser;
use manafiles_core::{Category, FileRecord};
use manafiles_db::{Database, DbError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn make_user(db: &dyn Database, username: &str, email: Option<&str>) -> String {
    db.create_user(&CreateUser {
        username: username.to_string(),
        email: email.map(String::from),
        password_hash: "$argon2id$test".to_string(),
    })
    .await
    .unwrap()
    .id
}

fn make_record(owner_id: &str, name: &str, category: Category) -> FileRecord {
    let id = uuid::Uuid::new_v4().to_string();
    FileRecord {
        content_ref: format!("files/{owner_id}/{id}"),
        id,
        owner_id: owner_id.to_string(),
        name: name.to_string(),
        category,
        original_filename: format!("{name}.txt"),
        content_type: "text/plain".to_string(),
        size_bytes: 12,
        created_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub async fn test_user_accounts(db: &dyn Database) {
    let id = make_user(db, "alice", Some("alice@example.com")).await;

    let user = db.get_user(&id).await.unwrap();
    assert_eq!(user.username, "alice");

    let by_name = db.find_user_by_username("alice").await.unwrap().unwrap();
    assert_eq!(by_name.id, id);
    let by_email = db
        .find_user_by_email("Alice@Example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_email.id, id);

    db.update_user_password(&id, "$argon2id$new").await.unwrap();
    assert_eq!(db.get_user(&id).await.unwrap().password_hash, "$argon2id$new");

    let err = db
        .create_user(&CreateUser {
            username: "alice".into(),
            email: None,
            password_hash: "x".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));

    let err = db
        .create_user(&CreateUser {
            username: "alice2".into(),
            email: Some("alice@example.com".into()),
            password_hash: "x".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));

    assert_eq!(db.list_users().await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// A stored record shows up exactly once in its owner's category listing.
pub async fn test_add_then_list(db: &dyn Database) {
    let alice = make_user(db, "alice", None).await;
    let rec = make_record(&alice, "passport", Category::Documents);
    db.insert_file(&rec).await.unwrap();

    let listed = db
        .list_files_by_category(Category::Documents, &alice)
        .await
        .unwrap();
    assert_eq!(listed.iter().filter(|f| f.id == rec.id).count(), 1);

    let images = db
        .list_files_by_category(Category::Images, &alice)
        .await
        .unwrap();
    assert!(images.is_empty());
}

pub async fn test_remove_then_list(db: &dyn Database) {
    let alice = make_user(db, "alice", None).await;
    let keep = make_record(&alice, "keep", Category::Notes);
    let drop = make_record(&alice, "drop", Category::Notes);
    db.insert_file(&keep).await.unwrap();
    db.insert_file(&drop).await.unwrap();

    let removed = db.delete_file(&drop.id, &alice).await.unwrap();
    assert_eq!(removed.id, drop.id);

    let listed = db
        .list_files_by_category(Category::Notes, &alice)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, keep.id);
    assert!(matches!(
        db.get_file(&drop.id).await.unwrap_err(),
        DbError::NotFound(_)
    ));
}

/// No listing of one user ever contains a record owned by another.
pub async fn test_owner_isolation(db: &dyn Database) {
    let alice = make_user(db, "alice", None).await;
    let bob = make_user(db, "bob", None).await;
    for cat in Category::ALL {
        db.insert_file(&make_record(&alice, "a", *cat)).await.unwrap();
        db.insert_file(&make_record(&bob, "b", *cat)).await.unwrap();
    }

    for cat in Category::ALL {
        let listed = db.list_files_by_category(*cat, &alice).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed.iter().all(|f| f.owner_id == alice && f.category == *cat));
    }
}

pub async fn test_delete_rules(db: &dyn Database) {
    let alice = make_user(db, "alice", None).await;
    let bob = make_user(db, "bob", None).await;
    let rec = make_record(&alice, "cert", Category::Certificates);
    db.insert_file(&rec).await.unwrap();

    let err = db.delete_file(&rec.id, &bob).await.unwrap_err();
    assert!(matches!(err, DbError::Forbidden(_)));
    assert!(db.get_file(&rec.id).await.is_ok());

    let err = db.delete_file("no-such-file", &alice).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));
}

pub async fn test_insert_rejections(db: &dyn Database) {
    let alice = make_user(db, "alice", None).await;
    let rec = make_record(&alice, "once", Category::Images);
    db.insert_file(&rec).await.unwrap();

    let err = db.insert_file(&rec).await.unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));

    let orphan = make_record("ghost", "orphan", Category::Images);
    let err = db.insert_file(&orphan).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidReference(_)));
}

pub async fn test_category_counts(db: &dyn Database) {
    let alice = make_user(db, "alice", None).await;
    let bob = make_user(db, "bob", None).await;
    db.insert_file(&make_record(&alice, "x", Category::Images))
        .await
        .unwrap();
    db.insert_file(&make_record(&alice, "y", Category::Images))
        .await
        .unwrap();
    db.insert_file(&make_record(&bob, "z", Category::Documents))
        .await
        .unwrap();

    let counts = db.count_files_by_category(&alice).await.unwrap();
    assert_eq!(counts.len(), Category::ALL.len());
    assert_eq!(counts[0], (Category::Images, 2));
    assert!(counts[1..].iter().all(|(_, n)| *n == 0));
}

// ---------------------------------------------------------------------------
// Sessions and resets
// ---------------------------------------------------------------------------

pub async fn test_sessions(db: &dyn Database) {
    let alice = make_user(db, "alice", None).await;
    let expires = Utc::now() + Duration::hours(24);
    let s = db.create_session(&alice, "hash-a", expires).await.unwrap();

    let found = db.find_session_by_hash("hash-a").await.unwrap().unwrap();
    assert_eq!(found.id, s.id);
    assert_eq!(found.user_id, alice);

    db.create_session(&alice, "hash-b", expires).await.unwrap();
    assert_eq!(db.delete_sessions_for_user(&alice).await.unwrap(), 2);
    assert!(db.find_session_by_hash("hash-a").await.unwrap().is_none());
}

pub async fn test_password_resets(db: &dyn Database) {
    let alice = make_user(db, "alice", Some("alice@example.com")).await;
    let now = Utc::now();
    let reset = db
        .create_password_reset(&alice, "code-hash", now + Duration::minutes(15))
        .await
        .unwrap();

    let pending = db.latest_pending_reset(&alice).await.unwrap().unwrap();
    assert_eq!(pending.id, reset.id);
    assert_eq!(db.record_failed_reset_attempt(&reset.id).await.unwrap(), 1);
    let pending = db.latest_pending_reset(&alice).await.unwrap().unwrap();
    assert_eq!(pending.attempts, 1);

    db.mark_reset_verified(&reset.id, "ticket-hash").await.unwrap();
    assert!(db.latest_pending_reset(&alice).await.unwrap().is_none());
    let by_ticket = db.find_reset_by_token("ticket-hash").await.unwrap().unwrap();
    assert_eq!(by_ticket.user_id, alice);

    db.delete_resets_for_user(&alice).await.unwrap();
    assert!(db.find_reset_by_token("ticket-hash").await.unwrap().is_none());
}

pub async fn test_purge_expired(db: &dyn Database) {
    let alice = make_user(db, "alice", None).await;
    let now = Utc::now();
    db.create_session(&alice, "stale", now - Duration::seconds(1))
        .await
        .unwrap();
    db.create_session(&alice, "live", now + Duration::hours(1))
        .await
        .unwrap();

    assert_eq!(db.purge_expired(now).await.unwrap(), 1);
    assert!(db.find_session_by_hash("stale").await.unwrap().is_none());
    assert!(db.find_session_by_hash("live").await.unwrap().is_some());
}
