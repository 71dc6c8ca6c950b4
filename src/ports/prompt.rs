//! Branch Picker Port

use async_trait::async_trait;

use crate::error::Result;

/// Interactive branch selection.
///
/// Implementations report whether a human can answer; the resolver never
/// calls [`BranchPicker::pick`] when [`BranchPicker::is_interactive`] is false.
#[async_trait]
pub trait BranchPicker: Send + Sync {
    /// Whether a prompt can be shown and answered
    fn is_interactive(&self) -> bool;

    /// Ask the operator to choose one of `branches` of `database`.
    /// Implementations that block on the terminal must do so off the
    /// async workers.
    async fn pick(&self, database: &str, branches: &[String]) -> Result<String>;
}
