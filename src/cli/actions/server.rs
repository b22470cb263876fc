use crate::{
    api::{self, AuthConfig, FixedWindowRateLimiter},
    identity::GoTrueClient,
    session::{CookieBridge, cookie_domain_for_site, cookie_name_for_identity_url},
};
use anyhow::Result;
use secrecy::SecretString;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub identity_url: String,
    pub identity_anon_key: SecretString,
    pub identity_service_key: Option<SecretString>,
    pub site_url: String,
    pub dashboard_url: String,
    pub cookie_domain: Option<String>,
    pub cookie_name: Option<String>,
    pub cookie_insecure: bool,
    pub login_max_attempts: u32,
    pub login_window: Duration,
    pub public_dir: Option<PathBuf>,
    pub environment: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the identity client cannot be built, the database is
/// unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let cookies = cookie_bridge(&args);
    log_startup_args(&args, &cookies);

    let has_service_key = args.identity_service_key.is_some();
    let identity = GoTrueClient::new(
        &args.identity_url,
        args.identity_anon_key,
        args.identity_service_key,
    )?;

    let auth_config = AuthConfig::new(args.site_url)
        .with_dashboard_url(args.dashboard_url)
        .with_environment(args.environment)
        .with_identity_configured(true, true)
        .with_cookie_domain_configured(args.cookie_domain.is_some());

    if !has_service_key {
        info!("No identity service key; failed sign-ups will leave their identity user behind");
    }

    let rate_limiter = FixedWindowRateLimiter::new(args.login_max_attempts, args.login_window);

    api::new(
        args.port,
        &args.dsn,
        Arc::new(identity),
        auth_config,
        cookies,
        Arc::new(rate_limiter),
        args.public_dir,
    )
    .await
}

/// Explicit cookie settings win; otherwise the name follows the provider
/// project and the domain follows the site.
fn cookie_bridge(args: &Args) -> CookieBridge {
    let name = args
        .cookie_name
        .clone()
        .unwrap_or_else(|| cookie_name_for_identity_url(&args.identity_url));
    let domain = args
        .cookie_domain
        .clone()
        .or_else(|| cookie_domain_for_site(&args.site_url));
    CookieBridge::new(name)
        .with_domain(domain)
        .with_secure(!args.cookie_insecure)
}

fn log_startup_args(args: &Args, cookies: &CookieBridge) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("identity_url", args.identity_url.clone()),
        (
            "identity_service_key_set",
            args.identity_service_key.is_some().to_string(),
        ),
        ("site_url", args.site_url.clone()),
        ("dashboard_url", args.dashboard_url.clone()),
        ("cookie_name", cookies.name().to_string()),
        (
            "cookie_domain",
            cookies.domain().unwrap_or("host-only").to_string(),
        ),
        ("cookie_secure", cookies.secure().to_string()),
        (
            "login_limit",
            format!(
                "{} per {}s",
                args.login_max_attempts,
                args.login_window.as_secs()
            ),
        ),
        (
            "public_dir",
            args.public_dir
                .as_ref()
                .map_or_else(|| "none".to_string(), |dir| dir.display().to_string()),
        ),
        ("environment", args.environment.clone()),
    ];
    log_entries("Startup configuration", &entries);
}

pub(super) fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\n{title}:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
