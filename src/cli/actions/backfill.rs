use crate::{
    provisioning::{BackfillEntry, BackfillOutcome, backfill_test_keys},
    store::PgAccountStore,
};
use anyhow::Result;
use std::fmt::Write as _;

#[derive(Debug)]
pub struct Args {
    pub dsn: String,
}

/// Give every merchant without an active key a `test` pair and print the
/// report. Generated secrets are printed once and never stored in clear.
/// # Errors
/// Returns an error if the database is unreachable or merchants cannot be listed.
pub async fn execute(args: Args) -> Result<()> {
    let store = PgAccountStore::connect(&args.dsn).await?;
    let entries = backfill_test_keys(&store).await?;
    println!("{}", render_report(&entries));
    Ok(())
}

fn render_report(entries: &[BackfillEntry]) -> String {
    let mut report = String::new();
    let mut generated = 0_usize;
    let mut failed = 0_usize;

    for entry in entries {
        let _ = writeln!(report, "{} ({})", entry.merchant_name, entry.merchant_id);
        match &entry.outcome {
            BackfillOutcome::Existing(count) => {
                let _ = writeln!(report, "  already has {count} active key(s)");
            }
            BackfillOutcome::Generated {
                public_key,
                secret_key,
            } => {
                generated += 1;
                let _ = writeln!(report, "  public key: {public_key}");
                let _ = writeln!(report, "  secret key: {secret_key}");
            }
            BackfillOutcome::Failed(reason) => {
                failed += 1;
                let _ = writeln!(report, "  failed: {reason}");
            }
        }
    }

    let _ = write!(
        report,
        "{} merchant(s), {generated} generated, {failed} failed",
        entries.len()
    );
    report
}
