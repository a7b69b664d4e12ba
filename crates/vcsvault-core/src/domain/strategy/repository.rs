//! SQLite strategy repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::entity::ConnectionType;
use super::record::{ResealedSecrets, SecretUpdate, StoredStrategy, StrategyWrite};
use super::repository_trait::StrategyRepositoryTrait;
use crate::domain::security::SealedSecret;
use crate::error::{Error, Result};

const SELECT_COLUMNS: &str = r#"
    application_id, connection_type, branch, default_branch, username, ssh_key,
    password_ciphertext, password_nonce,
    ssh_key_content_ciphertext, ssh_key_content_nonce,
    created_at, updated_at
"#;

/// Repository for strategy database operations
#[derive(Debug, Clone)]
pub struct SqliteStrategyRepository {
    pool: SqlitePool,
}

impl SqliteStrategyRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl StrategyRepositoryTrait for SqliteStrategyRepository {
    async fn upsert(&self, write: &StrategyWrite) -> Result<StoredStrategy> {
        let application_id = write.application_id.to_string();
        let now = Utc::now();
        let password = write.password.sealed();
        let ssh_key_content = write.ssh_key_content.sealed();

        let mut tx = self.pool.begin().await?;

        let owner: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM applications WHERE id = ?")
            .bind(&application_id)
            .fetch_optional(&mut *tx)
            .await?;
        if owner.is_none() {
            return Err(Error::ApplicationNotFound(application_id));
        }

        // ?11 and ?12 select whether each sealed pair keeps its stored value
        let row: StrategyRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO application_vcs_strategies (
                application_id, connection_type, branch, default_branch, username, ssh_key,
                password_ciphertext, password_nonce,
                ssh_key_content_ciphertext, ssh_key_content_nonce,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?13, ?13)
            ON CONFLICT(application_id) DO UPDATE SET
                connection_type = excluded.connection_type,
                branch = excluded.branch,
                default_branch = excluded.default_branch,
                username = excluded.username,
                ssh_key = excluded.ssh_key,
                password_ciphertext = CASE WHEN ?11 THEN password_ciphertext ELSE excluded.password_ciphertext END,
                password_nonce = CASE WHEN ?11 THEN password_nonce ELSE excluded.password_nonce END,
                ssh_key_content_ciphertext = CASE WHEN ?12 THEN ssh_key_content_ciphertext ELSE excluded.ssh_key_content_ciphertext END,
                ssh_key_content_nonce = CASE WHEN ?12 THEN ssh_key_content_nonce ELSE excluded.ssh_key_content_nonce END,
                updated_at = excluded.updated_at
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(&application_id)
        .bind(write.connection_type.as_str())
        .bind(&write.branch)
        .bind(&write.default_branch)
        .bind(&write.user)
        .bind(&write.ssh_key)
        .bind(password.map(|s| s.ciphertext.as_str()))
        .bind(password.map(|s| s.nonce.as_str()))
        .bind(ssh_key_content.map(|s| s.ciphertext.as_str()))
        .bind(ssh_key_content.map(|s| s.nonce.as_str()))
        .bind(write.password.is_keep())
        .bind(write.ssh_key_content.is_keep())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            application_id = %write.application_id,
            keep_password = write.password.is_keep(),
            clear_password = matches!(write.password, SecretUpdate::Clear),
            keep_ssh_key_content = write.ssh_key_content.is_keep(),
            "Upserted strategy row"
        );

        row.into_stored()
    }

    async fn get(&self, application_id: Uuid) -> Result<Option<StoredStrategy>> {
        let row: Option<StrategyRow> = sqlx::query_as(&format!(
            "SELECT {} FROM application_vcs_strategies WHERE application_id = ?",
            SELECT_COLUMNS
        ))
        .bind(application_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(StrategyRow::into_stored).transpose()
    }

    async fn list(&self) -> Result<Vec<StoredStrategy>> {
        let rows: Vec<StrategyRow> = sqlx::query_as(&format!(
            "SELECT {} FROM application_vcs_strategies ORDER BY application_id",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StrategyRow::into_stored).collect()
    }

    async fn replace_secrets(&self, secrets: &[ResealedSecrets]) -> Result<u64> {
        if secrets.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut updated = 0;

        for entry in secrets {
            let result = sqlx::query(
                r#"
                UPDATE application_vcs_strategies
                SET password_ciphertext = ?, password_nonce = ?,
                    ssh_key_content_ciphertext = ?, ssh_key_content_nonce = ?,
                    updated_at = ?
                WHERE application_id = ?
                "#,
            )
            .bind(entry.password.as_ref().map(|s| s.ciphertext.as_str()))
            .bind(entry.password.as_ref().map(|s| s.nonce.as_str()))
            .bind(entry.ssh_key_content.as_ref().map(|s| s.ciphertext.as_str()))
            .bind(entry.ssh_key_content.as_ref().map(|s| s.nonce.as_str()))
            .bind(now)
            .bind(entry.application_id.to_string())
            .execute(&mut *tx)
            .await?;

            updated += result.rows_affected();
        }

        tx.commit().await?;
        Ok(updated)
    }
}

/// Internal row type for database queries
#[derive(sqlx::FromRow)]
struct StrategyRow {
    application_id: String,
    connection_type: String,
    branch: String,
    default_branch: String,
    username: String,
    ssh_key: String,
    password_ciphertext: Option<String>,
    password_nonce: Option<String>,
    ssh_key_content_ciphertext: Option<String>,
    ssh_key_content_nonce: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StrategyRow {
    fn into_stored(self) -> Result<StoredStrategy> {
        let application_id = Uuid::parse_str(&self.application_id)
            .map_err(|e| Error::Parse(format!("Invalid application ID: {}", e)))?;
        let connection_type = ConnectionType::parse(&self.connection_type)?;

        Ok(StoredStrategy {
            application_id,
            connection_type,
            branch: self.branch,
            default_branch: self.default_branch,
            user: self.username,
            ssh_key: self.ssh_key,
            password: sealed_pair(self.password_ciphertext, self.password_nonce),
            ssh_key_content: sealed_pair(
                self.ssh_key_content_ciphertext,
                self.ssh_key_content_nonce,
            ),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn sealed_pair(ciphertext: Option<String>, nonce: Option<String>) -> Option<SealedSecret> {
    match (ciphertext, nonce) {
        (Some(ciphertext), Some(nonce)) => Some(SealedSecret { ciphertext, nonce }),
        _ => None,
    }
}
