//! Harness API interaction module
//!
//! This module provides the thin client every resource goes through:
//! credentials, URL building, request dispatch and error classification.
//!
//! # Module Structure
//!
//! - [`auth`] - API key handling and environment variable names
//! - [`client`] - Main Harness client for making API requests
//! - [`error`] - Typed API errors (not found, conflict, ...)
//! - [`graphql`] - GraphQL query execution for first-generation entities
//! - [`http`] - HTTP utilities for REST API calls
//! - [`query`] - Query string building with optional scope values
//!
//! # Example
//!
//! ```ignore
//! use crate::harness::client::{Api, HarnessClient};
//!
//! async fn example(client: &HarnessClient) -> Result<(), ApiError> {
//!     let url = client.account_query().append_to(&client.ng_url("environmentsV2/prod"));
//!     let env = client.get(Api::NextGen, &url).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod graphql;
pub mod http;
pub mod query;

pub use client::{Api, HarnessClient};
pub use error::ApiError;
pub use query::QueryParams;
