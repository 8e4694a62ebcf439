//! Identity-directory service client.
//!
//! The console provisions an identity in an external directory for every
//! Q profile user. The directory is an opaque collaborator: the trait
//! below is the only seam the rest of the crate sees, so handlers and
//! services can be tested against a mock.

mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use http::HttpDirectoryClient;

/// An identity as known to the directory service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryIdentity {
    pub identity_id: String,
    pub username: String,
    pub email: String,
}

/// Client for the external identity-directory service
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Create a directory identity for a new user
    async fn create_identity(&self, username: &str, email: &str) -> Result<DirectoryIdentity>;

    /// Delete a directory identity; deleting an unknown id is not an error
    async fn delete_identity(&self, identity_id: &str) -> Result<()>;

    /// Look up an existing identity
    async fn describe_identity(&self, identity_id: &str) -> Result<DirectoryIdentity>;
}

#[cfg(test)]
mockall::mock! {
    pub Directory {}

    #[async_trait]
    impl DirectoryClient for Directory {
        async fn create_identity(&self, username: &str, email: &str) -> Result<DirectoryIdentity>;
        async fn delete_identity(&self, identity_id: &str) -> Result<()>;
        async fn describe_identity(&self, identity_id: &str) -> Result<DirectoryIdentity>;
    }
}
