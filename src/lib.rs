//! Harness resources for Terraform
//!
//! Exposes Harness entities as resources and data sources with a declarative
//! schema, a thin API client and a lifecycle driver used by the CLI.

pub mod config;
pub mod harness;
pub mod provider;
pub mod resource;
pub mod services;
pub mod sweep;

/// Version injected at compile time via HARNESS_PROVIDER_VERSION (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("HARNESS_PROVIDER_VERSION") {
    Some(v) => v,
    None => "dev",
};
