use crate::api::{DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW};
use crate::cli::{
    actions::{Action, backfill, migrate, server},
    commands::{CMD_BACKFILL_KEYS, CMD_MIGRATE, identity, rate_limit, web},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    match matches.subcommand_name() {
        Some(CMD_MIGRATE) => Ok(Action::Migrate(migrate::Args { dsn })),
        Some(CMD_BACKFILL_KEYS) => Ok(Action::BackfillKeys(backfill::Args { dsn })),
        _ => server_args(matches, dsn).map(Action::Server),
    }
}

fn server_args(matches: &clap::ArgMatches, dsn: String) -> Result<server::Args> {
    let identity_url = matches
        .get_one::<String>(identity::ARG_IDENTITY_URL)
        .cloned()
        .context("missing required argument: --identity-url")?;
    let identity_anon_key = matches
        .get_one::<String>(identity::ARG_IDENTITY_ANON_KEY)
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --identity-anon-key")?;
    let identity_service_key = matches
        .get_one::<String>(identity::ARG_IDENTITY_SERVICE_KEY)
        .cloned()
        .filter(|key| !key.trim().is_empty())
        .map(SecretString::from);

    let login_window_seconds = matches
        .get_one::<u64>(rate_limit::ARG_LOGIN_WINDOW_SECONDS)
        .copied()
        .unwrap_or(DEFAULT_WINDOW.as_secs());

    Ok(server::Args {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn,
        identity_url,
        identity_anon_key,
        identity_service_key,
        site_url: required_default(matches, web::ARG_SITE_URL)?,
        dashboard_url: required_default(matches, web::ARG_DASHBOARD_URL)?,
        cookie_domain: matches.get_one::<String>(web::ARG_COOKIE_DOMAIN).cloned(),
        cookie_name: matches.get_one::<String>(web::ARG_COOKIE_NAME).cloned(),
        cookie_insecure: matches.get_flag(web::ARG_COOKIE_INSECURE),
        login_max_attempts: matches
            .get_one::<u32>(rate_limit::ARG_LOGIN_MAX_ATTEMPTS)
            .copied()
            .unwrap_or(DEFAULT_MAX_ATTEMPTS),
        login_window: Duration::from_secs(login_window_seconds),
        public_dir: matches.get_one::<PathBuf>(web::ARG_PUBLIC_DIR).cloned(),
        environment: required_default(matches, web::ARG_ENVIRONMENT)?,
    })
}

fn required_default(matches: &clap::ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .with_context(|| format!("missing required argument: --{name}"))
}
