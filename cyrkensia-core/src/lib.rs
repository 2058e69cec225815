//! cyrkensia-core: catalog and gated delivery for a music origin server
//!
//! This crate provides:
//! - layered configuration ([`config`])
//! - htpasswd-backed HTTP Basic credential checks ([`auth`])
//! - traversal-safe resolution of request paths ([`paths`])
//! - the album catalog built from the content root ([`catalog`])
//! - the public host info document ([`hostinfo`])
//!
//! HTTP wiring lives in `cyrkensia-server`.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod hostinfo;
pub mod paths;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use auth::{AuthOutcome, CredentialStore};
pub use catalog::{Album, AlbumMetadata, Author, CatalogSnapshot, METADATA_FILE};
pub use config::{ConfigLayer, ConfigResolver, Owner, ServerConfig, TlsPaths};
pub use error::{Error, ErrorClass, Result};
pub use hostinfo::HostInfo;

/// Crate metadata attached to every response
pub mod meta {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const NAME_RICH: &str = "Cyrkensia";
    pub const REPOSITORY: &str = env!("CARGO_PKG_REPOSITORY");
    pub const LICENSE: &str = "EUPL-1.2";
    pub const LICENSE_RICH: &str = "European Union Public License v1.2";
    pub const LICENSE_URL: &str = "https://joinup.ec.europa.eu/collection/eupl/eupl-text-eupl-12";
    /// Colon-separated, as Cargo provides them
    pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
    /// `Server` header value
    pub const USERAGENT: &str = concat!("Cyrkensia/", env!("CARGO_PKG_VERSION"));
}
