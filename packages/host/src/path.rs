//! Absolute paths in the host's logical filesystem namespace.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors related to path parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// A path component is not allowed.
    #[error("invalid path component '{component}' at position {position}: {message}")]
    InvalidComponent {
        component: String,
        position: usize,
        message: String,
    },

    /// The path string is invalid.
    #[error("invalid path: {message}")]
    InvalidPath { message: String },
}

/// A validated absolute path such as `/persist/saves/slot1`.
///
/// Components may not be `.` or `..` and may not contain NUL bytes.
/// Repeated and trailing slashes are normalized away.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MountPath {
    components: Vec<String>,
}

impl MountPath {
    /// The namespace root, `/`.
    pub fn root() -> Self {
        MountPath {
            components: Vec::new(),
        }
    }

    /// Parse an absolute path string.
    ///
    /// ```rust
    /// use persistfs_host::MountPath;
    ///
    /// let path = MountPath::parse("/persist/saves/").unwrap();
    /// assert_eq!(path.to_string(), "/persist/saves");
    /// assert!(MountPath::parse("persist").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, PathError> {
        if !s.starts_with('/') {
            return Err(PathError::InvalidPath {
                message: format!("'{}' is not absolute", s),
            });
        }

        Ok(MountPath {
            components: Self::split_relative(s)?,
        })
    }

    /// Split and validate a relative path such as `saves/slot1`.
    pub fn split_relative(s: &str) -> Result<Vec<String>, PathError> {
        let components: Vec<String> = s
            .split('/')
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .collect();

        for (i, component) in components.iter().enumerate() {
            Self::validate_component(component, i)?;
        }

        Ok(components)
    }

    fn validate_component(component: &str, position: usize) -> Result<(), PathError> {
        let message = match component {
            "." | ".." => "relative components are not allowed",
            c if c.contains('\0') => "NUL bytes are not allowed",
            _ => return Ok(()),
        };

        Err(PathError::InvalidComponent {
            component: component.to_string(),
            position,
            message: message.to_string(),
        })
    }

    /// Append a relative path to this one.
    pub fn join(&self, relative: &str) -> Result<Self, PathError> {
        let mut components = self.components.clone();
        components.extend(Self::split_relative(relative)?);
        Ok(MountPath { components })
    }

    /// The parent directory, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.components.split_last()?;
        Some(MountPath {
            components: rest.to_vec(),
        })
    }

    /// The final component, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.components.last().map(|s| s.as_str())
    }

    /// Check if this is the namespace root.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Iterate over components.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|s| s.as_str())
    }

    /// Check if this path has the given prefix.
    pub fn has_prefix(&self, prefix: &MountPath) -> bool {
        prefix.components.len() <= self.components.len()
            && prefix.components == self.components[..prefix.components.len()]
    }

    /// The `/`-joined remainder after `prefix`, used as a durable store key.
    ///
    /// Returns `None` if the prefix doesn't match.
    pub fn strip_prefix(&self, prefix: &MountPath) -> Option<String> {
        if self.has_prefix(prefix) {
            Some(self.components[prefix.components.len()..].join("/"))
        } else {
            None
        }
    }
}

impl fmt::Display for MountPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for MountPath {
    type Error = PathError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        MountPath::parse(&s)
    }
}

impl From<MountPath> for String {
    fn from(path: MountPath) -> Self {
        path.to_string()
    }
}
