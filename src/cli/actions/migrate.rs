use crate::{cli::actions::server::redact_dsn, store::PgAccountStore};
use anyhow::Result;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub dsn: String,
}

/// Apply `sql/schema.sql`. Statements are idempotent, so reruns are safe.
/// # Errors
/// Returns an error if the database is unreachable or a statement fails.
pub async fn execute(args: Args) -> Result<()> {
    info!("Applying schema to {}", redact_dsn(&args.dsn));
    let store = PgAccountStore::connect(&args.dsn).await?;
    let applied = store.apply_schema().await?;
    info!("Applied {applied} schema statement(s)");
    Ok(())
}
