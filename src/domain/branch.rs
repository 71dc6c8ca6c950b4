//! Branch Validation and Credential Brokering
//!
//! Both steps are single API calls whose errors are translated into the
//! session's error taxonomy. Nothing here retries: a missing or unready
//! branch ends the run.

use tracing::debug;

use super::target::Target;
use crate::error::{Result, ShellError};
use crate::ports::{ApiError, BranchApi, BranchCredentials};

fn translate(target: &Target, error: ApiError) -> ShellError {
    match error {
        ApiError::NotFound => ShellError::TargetNotFound {
            organization: target.organization.clone(),
            database: target.database.clone(),
            branch: target.branch.clone(),
        },
        ApiError::Other(msg) => ShellError::Upstream(msg),
    }
}

/// Confirm that the target branch exists.
///
/// # Errors
///
/// `TargetNotFound` when the API reports the branch missing, `Upstream`
/// for any other failure.
pub async fn validate_branch(api: &dyn BranchApi, target: &Target) -> Result<()> {
    api.get_branch(&target.organization, &target.database, &target.branch)
        .await
        .map_err(|e| translate(target, e))?;

    debug!(target = %target, "Branch exists");
    Ok(())
}

/// Request ephemeral credentials for a validated branch.
///
/// # Errors
///
/// - `TargetNotFound` if the branch vanished since validation
/// - `BranchNotReady` if it is still provisioning (no user yet, or not ready)
/// - `Upstream` for any other failure
pub async fn fetch_credentials(api: &dyn BranchApi, target: &Target) -> Result<BranchCredentials> {
    let status = api
        .get_branch_status(&target.organization, &target.database, &target.branch)
        .await
        .map_err(|e| translate(target, e))?;

    if !status.ready || status.credentials.user.is_empty() {
        return Err(ShellError::BranchNotReady {
            organization: target.organization.clone(),
            database: target.database.clone(),
            branch: target.branch.clone(),
        });
    }

    debug!(target = %target, user = %status.credentials.user, "Obtained branch credentials");
    Ok(status.credentials)
}
