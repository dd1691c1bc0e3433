//! Sweeper for leftover test applications
//!
//! Acceptance runs create applications named with a common prefix; the
//! sweeper pages through every application and deletes the matching ones.

use crate::harness::{ApiError, HarnessClient};
use crate::services::application::{delete_application, list_applications};

/// Prefix used by acceptance test fixtures
pub const DEFAULT_PREFIX: &str = "Test";

const PAGE_SIZE: usize = 100;

pub struct Sweeper<'a> {
    client: &'a HarnessClient,
    prefix: String,
}

impl<'a> Sweeper<'a> {
    pub fn new(client: &'a HarnessClient) -> Self {
        Self {
            client,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Delete every application whose name starts with the prefix and
    /// return how many were removed
    pub async fn sweep_applications(&self) -> Result<usize, ApiError> {
        let mut offset = 0;
        let mut matching = Vec::new();

        loop {
            let page = list_applications(self.client, PAGE_SIZE, offset).await?;
            let has_more = page.len() == PAGE_SIZE;
            offset += page.len();

            matching.extend(
                page.into_iter()
                    .filter(|app| app.name.starts_with(&self.prefix)),
            );

            if !has_more {
                break;
            }
        }

        tracing::info!("Sweeping {} application(s) prefixed {:?}", matching.len(), self.prefix);

        let mut deleted = 0;
        for app in matching {
            match delete_application(self.client, &app.id).await {
                Ok(()) => deleted += 1,
                Err(e) if e.is_not_found() => {
                    tracing::debug!("Application {} already gone", app.name);
                }
                Err(e) => {
                    tracing::error!("Failed to delete application {}: {}", app.name, e);
                    return Err(e);
                }
            }
        }

        Ok(deleted)
    }
}
