//! Integration tests for the credential strategy store
//!
//! Runs the full write / default read / clear read cycle against a real
//! SQLite database with an in-memory master key.

use std::sync::Arc;

use tempfile::TempDir;
use uuid::Uuid;
use vcsvault_core::domain::security::{MasterKey, MasterKeyRepository};
use vcsvault_core::infrastructure::security::InMemoryMasterKeyRepository;
use vcsvault_core::prelude::*;

struct Fixture {
    db: Database,
    store: StrategyStore,
    keys: Arc<InMemoryMasterKeyRepository>,
    app_id: Uuid,
}

async fn fixture() -> Fixture {
    let db = Database::in_memory()
        .await
        .expect("Failed to create test database");
    let app_id = register(&db, "my-app").await;

    let keys = Arc::new(InMemoryMasterKeyRepository::new());
    let store = StrategyStore::sqlite(db.pool().clone(), Box::new(keys.clone()));
    store.initialize().await.expect("Failed to initialize store");

    Fixture {
        db,
        store,
        keys,
        app_id,
    }
}

async fn register(db: &Database, name: &str) -> Uuid {
    let app = Application::new("TEST_PROJECT", name).unwrap();
    ApplicationRepository::new(db.pool().clone())
        .insert(&app)
        .await
        .expect("Failed to register application");
    app.id
}

fn https_with_stray_ssh_content() -> ConnectionStrategy {
    ConnectionStrategy {
        branch: "{{.git.branch}}".to_string(),
        connection_type: ConnectionType::Https,
        default_branch: "master".to_string(),
        user: "user".to_string(),
        password: "password".to_string(),
        ssh_key: String::new(),
        ssh_key_content: "content".to_string(),
    }
}

#[tokio::test]
async fn test_lifecycle_https_then_password_update_then_ssh() {
    let f = fixture().await;
    let mut strategy = https_with_stray_ssh_content();

    // write https with stray ssh content
    let shown = f.store.write(f.app_id, &strategy).await.unwrap();
    assert_eq!(shown.password, PASSWORD_PLACEHOLDER);

    let read = f.store.read_default(f.app_id).await.unwrap();
    assert_eq!(read.user, "user");
    assert_eq!(read.password, PASSWORD_PLACEHOLDER);
    assert_eq!(read.ssh_key_content, "");
    assert_eq!(read.branch, "{{.git.branch}}");
    assert_eq!(read.default_branch, "master");
    assert_eq!(read, shown);

    // update the password
    strategy.password = "password2".to_string();
    f.store.write(f.app_id, &strategy).await.unwrap();

    let clear = f.store.read_clear(f.app_id).await.unwrap();
    assert_eq!(clear.user, "user");
    assert_eq!(clear.password, "password2");
    assert_eq!(clear.ssh_key_content, "");

    let read = f.store.read_default(f.app_id).await.unwrap();
    assert_eq!(read.user, "user");
    assert_eq!(read.password, PASSWORD_PLACEHOLDER);
    assert_eq!(read.ssh_key_content, "");

    // switch to ssh
    strategy.connection_type = ConnectionType::Ssh;
    strategy.ssh_key_content = "ssh_key".to_string();
    strategy.ssh_key = "ssh_key".to_string();
    f.store.write(f.app_id, &strategy).await.unwrap();

    let read = f.store.read_default(f.app_id).await.unwrap();
    assert_eq!(read.user, "user");
    assert_eq!(read.password, PASSWORD_PLACEHOLDER);
    assert_eq!(read.ssh_key_content, "");
    assert_eq!(read.ssh_key, "ssh_key");
    assert_eq!(read.connection_type, ConnectionType::Ssh);

    // the privileged path reveals the active ssh lane only
    let clear = f.store.read_clear(f.app_id).await.unwrap();
    assert_eq!(clear.ssh_key_content, "ssh_key");
    assert_eq!(clear.password, "");

    // back to https: the retained password is visible again
    strategy.connection_type = ConnectionType::Https;
    strategy.password = PASSWORD_PLACEHOLDER.to_string();
    f.store.write(f.app_id, &strategy).await.unwrap();

    let clear = f.store.read_clear(f.app_id).await.unwrap();
    assert_eq!(clear.password, "password2");
    assert_eq!(clear.ssh_key_content, "");
}

#[tokio::test]
async fn test_default_read_never_returns_plaintext_or_empty_password() {
    let f = fixture().await;

    for password in ["password", "", "p@ss w0rd"] {
        let strategy = ConnectionStrategy::https("user", password);
        f.store.write(f.app_id, &strategy).await.unwrap();

        let read = f.store.read_default(f.app_id).await.unwrap();
        assert_eq!(read.password, PASSWORD_PLACEHOLDER);
        assert!(!read.password.is_empty());
    }
}

#[tokio::test]
async fn test_https_never_returns_ssh_content() {
    let f = fixture().await;

    f.store
        .write(f.app_id, &https_with_stray_ssh_content())
        .await
        .unwrap();

    assert_eq!(f.store.read_default(f.app_id).await.unwrap().ssh_key_content, "");
    assert_eq!(f.store.read_clear(f.app_id).await.unwrap().ssh_key_content, "");
}

#[tokio::test]
async fn test_round_trip_write_read_default_write() {
    let f = fixture().await;

    f.store
        .write(f.app_id, &ConnectionStrategy::https("user", "P1"))
        .await
        .unwrap();

    let mut read = f.store.read_default(f.app_id).await.unwrap();
    assert_eq!(read.password, PASSWORD_PLACEHOLDER);

    read.password = "P2".to_string();
    f.store.write(f.app_id, &read).await.unwrap();

    let clear = f.store.read_clear(f.app_id).await.unwrap();
    assert_eq!(clear.password, "P2");
}

#[tokio::test]
async fn test_writing_back_default_read_keeps_password() {
    let f = fixture().await;

    f.store
        .write(f.app_id, &ConnectionStrategy::https("user", "password"))
        .await
        .unwrap();

    let mut read = f.store.read_default(f.app_id).await.unwrap();
    read.user = "renamed".to_string();
    f.store.write(f.app_id, &read).await.unwrap();

    let clear = f.store.read_clear(f.app_id).await.unwrap();
    assert_eq!(clear.user, "renamed");
    assert_eq!(clear.password, "password");
}

#[tokio::test]
async fn test_default_read_is_idempotent() {
    let f = fixture().await;

    let strategy = ConnectionStrategy::ssh("deploy-key", "private").with_branches("dev", "main");
    f.store.write(f.app_id, &strategy).await.unwrap();

    let first = f.store.read_default(f.app_id).await.unwrap();
    let second = f.store.read_default(f.app_id).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_write_does_not_mutate_caller_value() {
    let f = fixture().await;
    let strategy = https_with_stray_ssh_content();
    let before = strategy.clone();

    let shown = f.store.write(f.app_id, &strategy).await.unwrap();
    assert_eq!(strategy, before);
    assert_ne!(shown, strategy);
}

#[tokio::test]
async fn test_ssh_to_https_clears_ssh_lane() {
    let f = fixture().await;

    let mut strategy = ConnectionStrategy::ssh("deploy-key", "private-key");
    strategy.user = "user".to_string();
    f.store.write(f.app_id, &strategy).await.unwrap();

    strategy.connection_type = ConnectionType::Https;
    strategy.ssh_key_content = String::new();
    let shown = f.store.write(f.app_id, &strategy).await.unwrap();
    assert_eq!(shown.ssh_key, "");

    // back to ssh without new content: the old content is gone
    strategy.connection_type = ConnectionType::Ssh;
    f.store.write(f.app_id, &strategy).await.unwrap();

    let clear = f.store.read_clear(f.app_id).await.unwrap();
    assert_eq!(clear.ssh_key, "deploy-key");
    assert_eq!(clear.ssh_key_content, "");
}

#[tokio::test]
async fn test_ssh_write_without_content_keeps_stored_content() {
    let f = fixture().await;

    f.store
        .write(f.app_id, &ConnectionStrategy::ssh("deploy-key", "private-key"))
        .await
        .unwrap();

    // a default read round-trips with empty content
    let read = f.store.read_default(f.app_id).await.unwrap();
    f.store.write(f.app_id, &read).await.unwrap();

    let clear = f.store.read_clear(f.app_id).await.unwrap();
    assert_eq!(clear.ssh_key_content, "private-key");
}

#[tokio::test]
async fn test_password_lane_survives_connection_type_switch() {
    let f = fixture().await;

    f.store
        .write(f.app_id, &ConnectionStrategy::https("user", "password"))
        .await
        .unwrap();

    let mut ssh = ConnectionStrategy::ssh("deploy-key", "private-key");
    ssh.password = PASSWORD_PLACEHOLDER.to_string();
    f.store.write(f.app_id, &ssh).await.unwrap();

    // the inactive password lane is not populated on a clear read
    let clear = f.store.read_clear(f.app_id).await.unwrap();
    assert_eq!(clear.password, "");
    assert_eq!(clear.ssh_key_content, "private-key");

    let https = ConnectionStrategy::https("user", PASSWORD_PLACEHOLDER);
    f.store.write(f.app_id, &https).await.unwrap();

    let clear = f.store.read_clear(f.app_id).await.unwrap();
    assert_eq!(clear.password, "password");
    assert_eq!(clear.ssh_key_content, "");
}

#[tokio::test]
async fn test_https_to_ssh_after_default_read_hides_password() {
    let f = fixture().await;

    f.store
        .write(f.app_id, &ConnectionStrategy::https("user", "password"))
        .await
        .unwrap();

    let mut strategy = f.store.read_default(f.app_id).await.unwrap();
    strategy.connection_type = ConnectionType::Ssh;
    strategy.ssh_key = "ssh_key".to_string();
    strategy.ssh_key_content = "ssh_key".to_string();
    f.store.write(f.app_id, &strategy).await.unwrap();

    let clear = f.store.read_clear(f.app_id).await.unwrap();
    assert_eq!(clear.password, "");
    assert_eq!(clear.ssh_key_content, "ssh_key");
}

#[tokio::test]
async fn test_missing_strategy_is_not_found() {
    let f = fixture().await;

    let err = f.store.read_default(f.app_id).await.unwrap_err();
    assert!(matches!(err, Error::StrategyNotFound(_)));
    assert_eq!(err.code(), "E001");

    let err = f.store.read_clear(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, Error::StrategyNotFound(_)));
}

#[tokio::test]
async fn test_write_for_unknown_application_fails() {
    let f = fixture().await;

    let err = f
        .store
        .write(Uuid::new_v4(), &ConnectionStrategy::https("user", "password"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ApplicationNotFound(_)));
}

#[tokio::test]
async fn test_ssh_without_key_reference_is_rejected() {
    let f = fixture().await;

    let err = f
        .store
        .write(f.app_id, &ConnectionStrategy::ssh("", "private-key"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(f.store.read_default(f.app_id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_unknown_connection_type_is_rejected_at_the_boundary() {
    let err = "svn".parse::<ConnectionType>().unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let json = r#"{"branch":"","connection_type":"svn","default_branch":"","user":"","password":"","ssh_key":"","ssh_key_content":""}"#;
    assert!(serde_json::from_str::<ConnectionStrategy>(json).is_err());
}

#[tokio::test]
async fn test_stored_columns_never_hold_plaintext() {
    let f = fixture().await;

    f.store
        .write(f.app_id, &ConnectionStrategy::ssh("deploy-key", "very-private-key"))
        .await
        .unwrap();
    let mut with_password = ConnectionStrategy::ssh("deploy-key", "");
    with_password.password = "very-secret-password".to_string();
    f.store.write(f.app_id, &with_password).await.unwrap();

    let row: (Option<String>, Option<String>, Option<String>, Option<String>) = sqlx::query_as(
        r#"
        SELECT password_ciphertext, password_nonce, ssh_key_content_ciphertext, ssh_key_content_nonce
        FROM application_vcs_strategies WHERE application_id = ?
        "#,
    )
    .bind(f.app_id.to_string())
    .fetch_one(f.db.pool())
    .await
    .unwrap();

    let columns = [row.0, row.1, row.2, row.3];
    assert!(columns.iter().all(Option::is_some));
    for column in columns.iter().flatten() {
        assert!(!column.contains("very-secret-password"));
        assert!(!column.contains("very-private-key"));
    }
}

#[tokio::test]
async fn test_sealed_value_moved_to_other_application_fails() {
    let f = fixture().await;
    let other = register(&f.db, "other-app").await;

    f.store
        .write(f.app_id, &ConnectionStrategy::https("user", "password"))
        .await
        .unwrap();
    f.store
        .write(other, &ConnectionStrategy::https("user", "other-password"))
        .await
        .unwrap();

    sqlx::query(
        r#"
        UPDATE application_vcs_strategies
        SET (password_ciphertext, password_nonce) = (
            SELECT password_ciphertext, password_nonce
            FROM application_vcs_strategies WHERE application_id = ?
        )
        WHERE application_id = ?
        "#,
    )
    .bind(f.app_id.to_string())
    .bind(other.to_string())
    .execute(f.db.pool())
    .await
    .unwrap();

    let err = f.store.read_clear(other).await.unwrap_err();
    assert!(matches!(err, Error::Decryption(_)));

    // the default path is unaffected
    assert_eq!(
        f.store.read_default(other).await.unwrap().password,
        PASSWORD_PLACEHOLDER
    );
}

#[tokio::test]
async fn test_clear_read_with_different_master_key_fails() {
    let f = fixture().await;

    f.store
        .write(f.app_id, &ConnectionStrategy::https("user", "password"))
        .await
        .unwrap();

    f.keys.store(&MasterKey::generate()).await.unwrap();

    let err = f.store.read_clear(f.app_id).await.unwrap_err();
    assert!(matches!(err, Error::Decryption(_)));
    assert_eq!(err.code(), "E300");
}

#[tokio::test]
async fn test_rotation_preserves_every_secret() {
    let f = fixture().await;
    let second = register(&f.db, "second-app").await;
    let third = register(&f.db, "no-secrets").await;

    f.store
        .write(f.app_id, &ConnectionStrategy::https("user", "password"))
        .await
        .unwrap();
    f.store
        .write(second, &ConnectionStrategy::ssh("deploy-key", "private-key"))
        .await
        .unwrap();
    f.store
        .write(third, &ConnectionStrategy::https("user", ""))
        .await
        .unwrap();

    let rotated = f.store.rotate_master_key().await.unwrap();
    assert_eq!(rotated, 2);

    assert_eq!(f.store.read_clear(f.app_id).await.unwrap().password, "password");
    assert_eq!(
        f.store.read_clear(second).await.unwrap().ssh_key_content,
        "private-key"
    );
    assert_eq!(f.store.read_clear(third).await.unwrap().password, "");
}

#[tokio::test]
async fn test_deleting_application_removes_strategy() {
    let f = fixture().await;

    f.store
        .write(f.app_id, &ConnectionStrategy::https("user", "password"))
        .await
        .unwrap();

    let removed = ApplicationRepository::new(f.db.pool().clone())
        .delete(f.app_id)
        .await
        .unwrap();
    assert!(removed);

    let err = f.store.read_default(f.app_id).await.unwrap_err();
    assert!(matches!(err, Error::StrategyNotFound(_)));
}

#[tokio::test]
async fn test_strategies_persist_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("vault.db");
    let key = MasterKey::generate();

    let app_id = {
        let db = Database::open(&path).await.unwrap();
        let app_id = register(&db, "persisted").await;
        let store = StrategyStore::sqlite(
            db.pool().clone(),
            Box::new(InMemoryMasterKeyRepository::with_key(key.clone())),
        );
        store
            .write(app_id, &ConnectionStrategy::https("user", "password"))
            .await
            .unwrap();
        db.close().await;
        app_id
    };

    let db = Database::open(&path).await.unwrap();
    let store = StrategyStore::sqlite(
        db.pool().clone(),
        Box::new(InMemoryMasterKeyRepository::with_key(key)),
    );
    assert_eq!(store.read_clear(app_id).await.unwrap().password, "password");
}

#[test]
fn test_debug_output_hides_secrets() {
    let strategy = https_with_stray_ssh_content();
    let debug = format!("{:?}", strategy);

    assert!(!debug.contains("\"password\""));
    assert!(!debug.contains("\"content\""));
    assert!(debug.contains("user"));
}
