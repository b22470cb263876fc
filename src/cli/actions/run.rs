use crate::cli::actions::{Action, backfill, migrate, server};
use anyhow::Result;

/// Execute the provided action.
// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Server(args) => server::execute(args).await,
        Action::Migrate(args) => migrate::execute(args).await,
        Action::BackfillKeys(args) => backfill::execute(args).await,
    }
}
