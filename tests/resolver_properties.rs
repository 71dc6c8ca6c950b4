//! Property-based tests for target resolution.
//!
//! Whatever the branch list looks like, the resolver either picks the only
//! branch, defers to the picker, or refuses with a precise error.

use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;
use proptest::prelude::*;

use branch_shell::domain::TargetResolver;
use branch_shell::error::{Result, ShellError};
use branch_shell::ports::{ApiError, Branch, BranchApi, BranchPicker, BranchStatus};

struct ListOnly {
    names: Vec<String>,
}

#[async_trait]
impl BranchApi for ListOnly {
    async fn list_branches(&self, _: &str, _: &str) -> std::result::Result<Vec<Branch>, ApiError> {
        Ok(self
            .names
            .iter()
            .map(|name| Branch {
                name: name.clone(),
                ready: true,
            })
            .collect())
    }

    async fn get_branch(&self, _: &str, _: &str, _: &str) -> std::result::Result<Branch, ApiError> {
        Err(ApiError::Other("not used".to_string()))
    }

    async fn get_branch_status(
        &self,
        _: &str,
        _: &str,
        _: &str,
    ) -> std::result::Result<BranchStatus, ApiError> {
        Err(ApiError::Other("not used".to_string()))
    }
}

/// Picks the option at `index % len`, recording what it was offered
struct IndexPicker {
    interactive: bool,
    index: usize,
    offered: Mutex<Option<Vec<String>>>,
}

#[async_trait]
impl BranchPicker for IndexPicker {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    async fn pick(&self, _: &str, branches: &[String]) -> Result<String> {
        *self.offered.lock().unwrap() = Some(branches.to_vec());
        Ok(branches[self.index % branches.len()].clone())
    }
}

fn resolve(
    names: &[String],
    branch: Option<&str>,
    picker: &IndexPicker,
) -> Result<branch_shell::Target> {
    let api = ListOnly {
        names: names.to_vec(),
    };
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(TargetResolver::new(&api, picker).resolve("acme", "shop", branch))
}

fn branch_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z][a-z0-9-]{0,15}", 0..8)
        .prop_map(|set: BTreeSet<String>| set.into_iter().collect())
}

fn picker(interactive: bool, index: usize) -> IndexPicker {
    IndexPicker {
        interactive,
        index,
        offered: Mutex::new(None),
    }
}

proptest! {
    /// An explicit branch is taken verbatim, whatever the listing says.
    #[test]
    fn explicit_branch_is_used_as_given(names in branch_names(), branch in "[a-z][a-z0-9-]{0,15}") {
        let p = picker(true, 0);
        let target = resolve(&names, Some(&branch), &p).unwrap();
        prop_assert_eq!(target.branch, branch);
        prop_assert_eq!(target.organization, "acme");
        prop_assert!(p.offered.lock().unwrap().is_none());
    }

    /// With no branch given the outcome depends only on the branch count
    /// and whether a prompt is possible.
    #[test]
    fn outcome_follows_branch_count(
        names in branch_names(),
        interactive in any::<bool>(),
        index in 0usize..16,
    ) {
        let p = picker(interactive, index);
        let result = resolve(&names, None, &p);

        match names.len() {
            0 => {
                let is_no_branches = matches!(result, Err(ShellError::NoBranches { .. }));
                prop_assert!(is_no_branches);
            }
            1 => {
                prop_assert_eq!(result.unwrap().branch, names[0].clone());
                prop_assert!(p.offered.lock().unwrap().is_none());
            }
            n if !interactive => {
                let is_ambiguous = matches!(
                    result,
                    Err(ShellError::AmbiguousTarget { count, .. }) if count == n
                );
                prop_assert!(is_ambiguous);
            }
            n => {
                let target = result.unwrap();
                prop_assert_eq!(&target.branch, &names[index % n]);
                prop_assert_eq!(p.offered.lock().unwrap().clone(), Some(names.clone()));
            }
        }
    }

    /// An empty branch argument behaves exactly like an absent one.
    #[test]
    fn empty_branch_means_absent(names in branch_names(), index in 0usize..16) {
        let with_empty = resolve(&names, Some(""), &picker(false, index));
        let with_none = resolve(&names, None, &picker(false, index));
        prop_assert_eq!(
            with_empty.map(|t| t.branch).map_err(|e| e.to_string()),
            with_none.map(|t| t.branch).map_err(|e| e.to_string())
        );
    }
}
