//! File-based tenant provisioning for MarketGate
//!
//! This crate implements the `TenantSource` trait using a YAML or TOML file
//! listing tenant definitions. It is the provisioning collaborator that
//! keeps a `TenantRegistry` populated.
//!
//! # Features
//! - YAML (default) and TOML (`.toml` extension) formats
//! - Field defaults matching the standard market provisioning
//! - Real-time file watching with `notify`
//! - Built-in `us`/`uk`/`jp` markets for running without a file
//!
//! # Example
//! ```no_run
//! # use marketgate_config_file::FileTenantSource;
//! # use marketgate_core::{TenantProvisioner, TenantRegistry};
//! # use std::sync::Arc;
//! # async fn example() -> marketgate_core::Result<()> {
//! let registry = Arc::new(TenantRegistry::new());
//! let source = FileTenantSource::new("~/.marketgate/tenants.yaml").await?;
//! TenantProvisioner::new(registry).sync(&source).await?;
//! # Ok(())
//! # }
//! ```

mod definition;
mod file_source;

pub use definition::{TenantDefinition, TenantsFile, builtin_markets, builtin_source};
pub use file_source::FileTenantSource;
