//! Diagnostics returned by resource operations
//!
//! Every failure a user should see ends up here, either converted from an
//! [`ApiError`] with `?` or raised directly by a resource.

use super::data::ResourceData;
use crate::harness::http::format_harness_error;
use crate::harness::ApiError;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One user-visible message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Attribute path the message refers to, e.g. `variation` or `git_details.0.store_type`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(summary)
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
        };
        write!(f, "{}: {}", label, self.summary)?;
        if let Some(ref attribute) = self.attribute {
            write!(f, " (attribute {})", attribute)?;
        }
        if let Some(ref detail) = self.detail {
            write!(f, "\n  {}", detail)?;
        }
        Ok(())
    }
}

/// Ordered list of diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single error
    pub fn error(summary: impl Into<String>) -> Self {
        Self(vec![Diagnostic::error(summary)])
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    /// `Ok` unless an error was collected
    pub fn into_result(self) -> Result<(), Diagnostics> {
        if self.has_errors() {
            Err(self)
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        Self(vec![diagnostic])
    }
}

impl From<ApiError> for Diagnostics {
    fn from(err: ApiError) -> Self {
        let mut diagnostic = Diagnostic::error(format_harness_error(&err));
        if let ApiError::Http {
            code: Some(ref code),
            ..
        } = err
        {
            diagnostic = diagnostic.with_detail(format!("error code {}", code));
        }
        Self(vec![diagnostic])
    }
}

/// Convert a failed read into diagnostics, except "not found": the entity
/// is gone remotely, so the id is cleared and the read succeeds.
pub fn handle_read_error(err: ApiError, d: &mut ResourceData) -> Result<(), Diagnostics> {
    if err.is_not_found() {
        tracing::warn!("Resource {} not found, removing from state: {}", d.id(), err);
        d.clear_id();
        return Ok(());
    }
    Err(err.into())
}

/// A conflict on create means the identifier is already taken
pub fn handle_create_error(err: ApiError, what: &str) -> Diagnostics {
    if err.is_conflict() {
        return Diagnostics::error(format!("{} already exists", what));
    }
    err.into()
}
