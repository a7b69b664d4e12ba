//! Application repository for database operations

use super::entity::Application;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Repository for application database operations
#[derive(Debug, Clone)]
pub struct ApplicationRepository {
    pool: SqlitePool,
}

impl ApplicationRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new application
    ///
    /// Fails with `Error::Validation` when the project already has an
    /// application with the same name.
    pub async fn insert(&self, app: &Application) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO applications (id, project_key, name, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(app.id.to_string())
        .bind(&app.project_key)
        .bind(&app.name)
        .bind(app.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Error::Validation(format!(
                "application '{}' already exists in project '{}'",
                app.name, app.project_key
            )),
            other => Error::Persistence(other),
        })?;

        tracing::info!(application_id = %app.id, project = %app.project_key, name = %app.name, "Registered application");
        Ok(())
    }

    /// Check whether an application exists
    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM applications WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    /// Get an application by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<Application>> {
        let row: Option<ApplicationRow> = sqlx::query_as(
            "SELECT id, project_key, name, created_at FROM applications WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ApplicationRow::into_application).transpose()
    }

    /// Get an application by project key and name
    pub async fn get_by_project_and_name(
        &self,
        project_key: &str,
        name: &str,
    ) -> Result<Option<Application>> {
        let row: Option<ApplicationRow> = sqlx::query_as(
            r#"
            SELECT id, project_key, name, created_at
            FROM applications
            WHERE project_key = ? AND name = ?
            "#,
        )
        .bind(project_key)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ApplicationRow::into_application).transpose()
    }

    /// List the applications of a project, ordered by name
    pub async fn list_by_project(&self, project_key: &str) -> Result<Vec<Application>> {
        let rows: Vec<ApplicationRow> = sqlx::query_as(
            r#"
            SELECT id, project_key, name, created_at
            FROM applications
            WHERE project_key = ?
            ORDER BY name
            "#,
        )
        .bind(project_key)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(ApplicationRow::into_application)
            .collect()
    }

    /// Delete an application; its strategy goes with it
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM applications WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Database row for an application
#[derive(sqlx::FromRow)]
struct ApplicationRow {
    id: String,
    project_key: String,
    name: String,
    created_at: DateTime<Utc>,
}

impl ApplicationRow {
    fn into_application(self) -> Result<Application> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| Error::Parse(format!("Invalid application ID: {}", e)))?;

        Ok(Application {
            id,
            project_key: self.project_key,
            name: self.name,
            created_at: self.created_at,
        })
    }
}
