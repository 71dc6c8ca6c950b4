//! Branch API Port
//!
//! Read-only view of the remote database API needed to open a shell:
//! branch listing, branch lookup and branch status with credentials.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroizing;

/// Failure reported by the remote API.
///
/// Only "not found" is distinguished; everything else is opaque.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Other(String),
}

/// A database branch as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Branch {
    pub name: String,

    #[serde(default)]
    pub ready: bool,
}

/// Ephemeral connection credentials for one branch
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BranchCredentials {
    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: Zeroizing<String>,
}

/// Branch provisioning state with its credentials
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BranchStatus {
    #[serde(default)]
    pub ready: bool,

    #[serde(default)]
    pub credentials: BranchCredentials,
}

/// Trait for the remote branch API
#[async_trait]
pub trait BranchApi: Send + Sync {
    /// List the branches of a database
    async fn list_branches(
        &self,
        organization: &str,
        database: &str,
    ) -> Result<Vec<Branch>, ApiError>;

    /// Look up a single branch
    async fn get_branch(
        &self,
        organization: &str,
        database: &str,
        branch: &str,
    ) -> Result<Branch, ApiError>;

    /// Fetch the branch status, including ephemeral credentials
    async fn get_branch_status(
        &self,
        organization: &str,
        database: &str,
        branch: &str,
    ) -> Result<BranchStatus, ApiError>;
}
