//! Target Resolution
//!
//! Turns a database name and an optional branch name into a fully
//! qualified [`Target`], asking the operator only when the choice is
//! ambiguous.

use std::fmt;

use tracing::{debug, info};

use crate::error::{Result, ShellError};
use crate::ports::{ApiError, BranchApi, BranchPicker};

/// The remote branch a session connects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub organization: String,
    pub database: String,
    pub branch: String,
}

impl Target {
    #[must_use]
    pub fn new(
        organization: impl Into<String>,
        database: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            database: database.into(),
            branch: branch.into(),
        }
    }

    /// Remote instance identifier, `organization/database/branch`
    #[must_use]
    pub fn instance(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.organization, self.database, self.branch)
    }
}

/// Resolves the branch to connect to
pub struct TargetResolver<'a> {
    api: &'a dyn BranchApi,
    picker: &'a dyn BranchPicker,
}

impl<'a> TargetResolver<'a> {
    #[must_use]
    pub fn new(api: &'a dyn BranchApi, picker: &'a dyn BranchPicker) -> Self {
        Self { api, picker }
    }

    /// Resolve `database` and an optional `branch` within `organization`.
    ///
    /// A given branch name is taken as is. Otherwise the branches are
    /// listed: a single branch is selected automatically, several are
    /// offered to the picker.
    ///
    /// # Errors
    ///
    /// - `AmbiguousTarget` when several branches exist and no prompt is possible
    /// - `DatabaseNotFound` / `NoBranches` when there is nothing to choose from
    /// - `Upstream` for any other API failure
    pub async fn resolve(
        &self,
        organization: &str,
        database: &str,
        branch: Option<&str>,
    ) -> Result<Target> {
        if let Some(branch) = branch.filter(|b| !b.is_empty()) {
            return Ok(Target::new(organization, database, branch));
        }

        let branches = self
            .api
            .list_branches(organization, database)
            .await
            .map_err(|e| match e {
                ApiError::NotFound => ShellError::DatabaseNotFound {
                    organization: organization.to_string(),
                    database: database.to_string(),
                },
                ApiError::Other(msg) => ShellError::Upstream(msg),
            })?;

        let mut names: Vec<String> = branches.into_iter().map(|b| b.name).collect();

        let branch = match names.len() {
            0 => {
                return Err(ShellError::NoBranches {
                    organization: organization.to_string(),
                    database: database.to_string(),
                });
            }
            1 => {
                let only = names.remove(0);
                debug!(database = %database, branch = %only, "Selected the only branch");
                only
            }
            count => {
                if !self.picker.is_interactive() {
                    return Err(ShellError::AmbiguousTarget {
                        organization: organization.to_string(),
                        database: database.to_string(),
                        count,
                    });
                }
                let picked = self.picker.pick(database, &names).await?;
                info!(database = %database, branch = %picked, "Branch selected");
                picked
            }
        };

        Ok(Target::new(organization, database, branch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::{MockBranchApi, MockPicker};

    #[test]
    fn test_target_instance() {
        let target = Target::new("acme", "shop", "main");
        assert_eq!(target.instance(), "acme/shop/main");
        assert_eq!(target.to_string(), "acme/shop/main");
    }

    #[tokio::test]
    async fn test_explicit_branch_skips_listing() {
        let api = MockBranchApi::new();
        let picker = MockPicker::non_interactive();
        let resolver = TargetResolver::new(&api, &picker);

        let target = resolver.resolve("acme", "shop", Some("dev")).await.unwrap();
        assert_eq!(target, Target::new("acme", "shop", "dev"));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_branch_name_triggers_listing() {
        let api = MockBranchApi::new().with_branch("shop", "main", "u", "p");
        let picker = MockPicker::non_interactive();
        let resolver = TargetResolver::new(&api, &picker);

        let target = resolver.resolve("acme", "shop", Some("")).await.unwrap();
        assert_eq!(target.branch, "main");
        assert_eq!(api.calls(), vec!["list:shop".to_string()]);
    }

    #[tokio::test]
    async fn test_single_branch_selected_without_prompt() {
        let api = MockBranchApi::new().with_branch("shop", "main", "u", "p");
        let picker = MockPicker::choosing(Some("other"));
        let resolver = TargetResolver::new(&api, &picker);

        let target = resolver.resolve("acme", "shop", None).await.unwrap();
        assert_eq!(target.branch, "main");
        assert!(picker.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_multiple_branches_non_interactive_is_ambiguous() {
        let api = MockBranchApi::new()
            .with_branch("shop", "main", "u", "p")
            .with_branch("shop", "dev", "u", "p");
        let picker = MockPicker::non_interactive();
        let resolver = TargetResolver::new(&api, &picker);

        let result = resolver.resolve("acme", "shop", None).await;
        match result.unwrap_err() {
            ShellError::AmbiguousTarget {
                organization,
                database,
                count,
            } => {
                assert_eq!(organization, "acme");
                assert_eq!(database, "shop");
                assert_eq!(count, 2);
            }
            other => panic!("Expected AmbiguousTarget, got: {other:?}"),
        }
        assert!(picker.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_multiple_branches_interactive_prompts() {
        let api = MockBranchApi::new()
            .with_branch("shop", "main", "u", "p")
            .with_branch("shop", "dev", "u", "p");
        let picker = MockPicker::choosing(Some("dev"));
        let resolver = TargetResolver::new(&api, &picker);

        let target = resolver.resolve("acme", "shop", None).await.unwrap();
        assert_eq!(target.branch, "dev");
        assert_eq!(
            picker.prompts(),
            vec![vec!["main".to_string(), "dev".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_unknown_database() {
        let api = MockBranchApi::new();
        let picker = MockPicker::non_interactive();
        let resolver = TargetResolver::new(&api, &picker);

        let result = resolver.resolve("acme", "ghost", None).await;
        assert!(matches!(
            result,
            Err(ShellError::DatabaseNotFound { ref database, .. }) if database == "ghost"
        ));
    }

    #[tokio::test]
    async fn test_listing_failure_is_upstream() {
        let api = MockBranchApi::new().failing_with(ApiError::Other("503".to_string()));
        let picker = MockPicker::non_interactive();
        let resolver = TargetResolver::new(&api, &picker);

        let result = resolver.resolve("acme", "shop", None).await;
        assert!(matches!(result, Err(ShellError::Upstream(ref msg)) if msg == "503"));
    }
}
