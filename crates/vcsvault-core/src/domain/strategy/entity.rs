//! Repository connection strategy entity
//!
//! Defines the `ConnectionStrategy` value, its connection types and the
//! redaction applied on default reads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Token returned in place of a stored password on default reads.
///
/// Writing it back means "keep the current password".
pub const PASSWORD_PLACEHOLDER: &str = "**********";

/// How the repository is reached; selects which secret lane is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    /// User and password over HTTPS
    #[default]
    Https,
    /// SSH key
    Ssh,
}

impl ConnectionType {
    /// Parse a connection type, rejecting anything but `https` and `ssh`
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "https" => Ok(Self::Https),
            "ssh" => Ok(Self::Ssh),
            other => Err(Error::Validation(format!(
                "unknown connection type '{}', expected 'https' or 'ssh'",
                other
            ))),
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::Ssh => "ssh",
        }
    }

    /// Whether the SSH lane is the active one
    pub fn is_ssh(&self) -> bool {
        matches!(self, Self::Ssh)
    }
}

impl FromStr for ConnectionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Credentials and parameters used to connect to a source repository
///
/// `password` and `ssh_key_content` are secrets. Values handed out by the
/// store's default read carry [`PASSWORD_PLACEHOLDER`] and an empty key
/// content instead of the real values.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionStrategy {
    /// Branch to build; may hold a template such as `{{.git.branch}}`
    pub branch: String,
    /// Active connection type
    pub connection_type: ConnectionType,
    /// Default branch of the repository
    pub default_branch: String,
    /// User name, never secret
    pub user: String,
    /// Password (HTTPS lane)
    pub password: String,
    /// Reference to a stored SSH key (SSH lane)
    pub ssh_key: String,
    /// SSH private key content (SSH lane)
    pub ssh_key_content: String,
}

impl ConnectionStrategy {
    /// Create an HTTPS strategy with user and password
    pub fn https(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            connection_type: ConnectionType::Https,
            user: user.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    /// Create an SSH strategy from a key reference and key content
    pub fn ssh(ssh_key: impl Into<String>, ssh_key_content: impl Into<String>) -> Self {
        Self {
            connection_type: ConnectionType::Ssh,
            ssh_key: ssh_key.into(),
            ssh_key_content: ssh_key_content.into(),
            ..Default::default()
        }
    }

    /// Set the branch and default branch
    pub fn with_branches(mut self, branch: impl Into<String>, default_branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self.default_branch = default_branch.into();
        self
    }

    /// Check the record is structurally valid for its connection type
    pub fn validate(&self) -> Result<()> {
        if self.connection_type.is_ssh() && self.ssh_key.trim().is_empty() {
            return Err(Error::Validation(
                "an ssh connection needs an ssh key reference".to_string(),
            ));
        }

        let fields = [
            ("branch", &self.branch),
            ("default_branch", &self.default_branch),
            ("user", &self.user),
            ("ssh_key", &self.ssh_key),
        ];
        for (name, value) in fields {
            if value.contains('\0') {
                return Err(Error::Validation(format!("{} contains a NUL byte", name)));
            }
        }

        Ok(())
    }

    /// Whether the password field carries the placeholder rather than a value
    pub fn password_is_placeholder(&self) -> bool {
        self.password == PASSWORD_PLACEHOLDER
    }

    /// The value a default read returns for this strategy
    ///
    /// The password always becomes the placeholder, the key content is
    /// always emptied and the key reference survives only on SSH.
    pub fn redacted(&self) -> Self {
        Self {
            branch: self.branch.clone(),
            connection_type: self.connection_type,
            default_branch: self.default_branch.clone(),
            user: self.user.clone(),
            password: PASSWORD_PLACEHOLDER.to_string(),
            ssh_key: if self.connection_type.is_ssh() {
                self.ssh_key.clone()
            } else {
                String::new()
            },
            ssh_key_content: String::new(),
        }
    }
}

impl fmt::Debug for ConnectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mask(value: &str) -> &'static str {
            if value.is_empty() { "" } else { "[REDACTED]" }
        }

        f.debug_struct("ConnectionStrategy")
            .field("branch", &self.branch)
            .field("connection_type", &self.connection_type)
            .field("default_branch", &self.default_branch)
            .field("user", &self.user)
            .field("password", &mask(&self.password))
            .field("ssh_key", &self.ssh_key)
            .field("ssh_key_content", &mask(&self.ssh_key_content))
            .finish()
    }
}
