//! Repository identifiers naming remote interfaces

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Globally unique name of an interface, e.g. `IDL:jtsxa/OTSResource:1.0`
///
/// Format is `IDL:<scoped/name>:<major>.<minor>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryId(Cow<'static, str>);

/// Repository id every object reference implicitly supports
pub const OBJECT_ID: RepositoryId = RepositoryId::from_static("IDL:omg.org/CORBA/Object:1.0");

impl RepositoryId {
    /// Wrap a compile-time constant without validation
    pub const fn from_static(id: &'static str) -> Self {
        Self(Cow::Borrowed(id))
    }

    /// Parse and validate a repository id
    pub fn parse(s: &str) -> Result<Self, RepositoryIdError> {
        let rest = s
            .strip_prefix("IDL:")
            .ok_or_else(|| RepositoryIdError::MissingPrefix(s.to_string()))?;

        let (name, version) = rest
            .rsplit_once(':')
            .ok_or_else(|| RepositoryIdError::MissingVersion(s.to_string()))?;

        if name.is_empty() || name.split('/').any(str::is_empty) {
            return Err(RepositoryIdError::InvalidName(s.to_string()));
        }

        let valid_version = version
            .split_once('.')
            .is_some_and(|(major, minor)| is_number(major) && is_number(minor));
        if !valid_version {
            return Err(RepositoryIdError::MissingVersion(s.to_string()));
        }

        Ok(Self(Cow::Owned(s.to_string())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unscoped interface name (`OTSResource` for `IDL:jtsxa/OTSResource:1.0`)
    pub fn interface_name(&self) -> &str {
        let scoped = self
            .0
            .strip_prefix("IDL:")
            .and_then(|rest| rest.rsplit_once(':'))
            .map(|(name, _)| name)
            .unwrap_or(&self.0);
        scoped.rsplit('/').next().unwrap_or(scoped)
    }
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors that can occur when parsing a repository id
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryIdError {
    #[error("Repository id must start with 'IDL:': {0}")]
    MissingPrefix(String),

    #[error("Repository id must end with ':<major>.<minor>': {0}")]
    MissingVersion(String),

    #[error("Invalid interface name in repository id: {0}")]
    InvalidName(String),
}
