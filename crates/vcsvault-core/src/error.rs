//! Error types for vcsvault

use thiserror::Error;

/// Result type alias using vcsvault's Error
pub type Result<T> = std::result::Result<T, Error>;

/// vcsvault error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Entity errors (E001-E099)
    #[error("No repository strategy stored for application '{0}'. Set one with `vcsvault strategy set {0}`.")]
    StrategyNotFound(String),

    #[error("Application '{0}' not found. Run `vcsvault app list <project>` to see applications.")]
    ApplicationNotFound(String),

    // Input errors (E100-E199)
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    // Storage errors (E200-E299)
    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    // Security errors (E300-E399)
    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Master key unavailable: {0}")]
    MasterKeyUnavailable(String),

    #[error("Keyring error: {0}")]
    Keyring(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::StrategyNotFound(_) => "E001",
            Self::ApplicationNotFound(_) => "E002",
            Self::Validation(_) => "E100",
            Self::Parse(_) => "E101",
            Self::Persistence(_) => "E200",
            Self::Decryption(_) => "E300",
            Self::Encryption(_) => "E301",
            Self::MasterKeyUnavailable(_) => "E302",
            Self::Keyring(_) => "E303",
            Self::Other(_) => "E999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::StrategyNotFound(id) => Some(format!("vcsvault strategy set {}", id)),
            Self::ApplicationNotFound(_) => Some("vcsvault app list <project>".to_string()),
            Self::Decryption(_) => {
                Some("Check that the master key matches the one used to write".to_string())
            }
            Self::MasterKeyUnavailable(_) => Some("vcsvault key init".to_string()),
            _ => None,
        }
    }

    /// Whether the error means the requested record does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::StrategyNotFound(_) | Self::ApplicationNotFound(_)
        )
    }
}
