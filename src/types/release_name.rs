// ABOUTME: Helm-compatible release name validation.
// ABOUTME: Release names double as the project identifier and label value.

use std::fmt;
use thiserror::Error;

/// Helm rejects release names longer than this.
const MAX_LEN: usize = 53;

#[derive(Debug, Error)]
pub enum ReleaseNameError {
    #[error("release name cannot be empty")]
    Empty,

    #[error("release name exceeds maximum length of {MAX_LEN} characters")]
    TooLong,

    #[error("release name must start and end with a lowercase letter or digit")]
    BadBoundary,

    #[error("release name must be lowercase")]
    NotLowercase,

    #[error("invalid character in release name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseName(String);

impl ReleaseName {
    pub fn new(value: &str) -> Result<Self, ReleaseNameError> {
        if value.is_empty() {
            return Err(ReleaseNameError::Empty);
        }

        if value.len() > MAX_LEN {
            return Err(ReleaseNameError::TooLong);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(ReleaseNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '.' {
                return Err(ReleaseNameError::InvalidChar(c));
            }
        }

        let is_edge = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
        if !is_edge(value.chars().next()) || !is_edge(value.chars().last()) {
            return Err(ReleaseNameError::BadBoundary);
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Label selector matching the pods Helm charts tag with the instance label.
    pub fn instance_selector(&self) -> String {
        format!("app.kubernetes.io/instance={}", self.0)
    }
}

impl fmt::Display for ReleaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
