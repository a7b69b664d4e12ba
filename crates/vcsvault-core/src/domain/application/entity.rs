//! Application entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Maximum length of an application name
const MAX_NAME_LEN: usize = 256;

/// An application registered under a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    /// Unique identifier
    pub id: Uuid,
    /// Key of the owning project
    pub project_key: String,
    /// Name, unique within the project
    pub name: String,
    /// When the application was registered
    pub created_at: DateTime<Utc>,
}

impl Application {
    /// Create a new application, validating key and name
    pub fn new(project_key: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let project_key = project_key.into();
        let name = name.into();

        if project_key.trim().is_empty() {
            return Err(Error::Validation("project key cannot be empty".to_string()));
        }
        if name.trim().is_empty() {
            return Err(Error::Validation("application name cannot be empty".to_string()));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(Error::Validation(format!(
                "application name exceeds {} characters",
                MAX_NAME_LEN
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            project_key,
            name,
            created_at: Utc::now(),
        })
    }
}
