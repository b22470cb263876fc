use clap::{Arg, ArgAction, Command};

pub const ARG_SITE_URL: &str = "site-url";
pub const ARG_DASHBOARD_URL: &str = "dashboard-url";
pub const ARG_COOKIE_DOMAIN: &str = "cookie-domain";
pub const ARG_COOKIE_NAME: &str = "cookie-name";
pub const ARG_COOKIE_INSECURE: &str = "cookie-insecure";
pub const ARG_PUBLIC_DIR: &str = "public-dir";
pub const ARG_ENVIRONMENT: &str = "environment";

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_url_args(command);
    with_cookie_args(command)
}

fn with_url_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SITE_URL)
                .long(ARG_SITE_URL)
                .help("Public site URL used for email links and CORS")
                .env("ONBOARDING_SITE_URL")
                .default_value("https://deonpay.mx"),
        )
        .arg(
            Arg::new(ARG_DASHBOARD_URL)
                .long(ARG_DASHBOARD_URL)
                .help("Dashboard URL users are redirected to after sign-in")
                .env("ONBOARDING_DASHBOARD_URL")
                .default_value("https://dashboard.deonpay.mx"),
        )
        .arg(
            Arg::new(ARG_PUBLIC_DIR)
                .long(ARG_PUBLIC_DIR)
                .help("Directory with static pages served for non-API routes")
                .env("ONBOARDING_PUBLIC_DIR")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            Arg::new(ARG_ENVIRONMENT)
                .long(ARG_ENVIRONMENT)
                .help("Deployment environment; `development` adds error details to responses")
                .env("ONBOARDING_ENVIRONMENT")
                .default_value("production"),
        )
}

fn with_cookie_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_COOKIE_DOMAIN)
                .long(ARG_COOKIE_DOMAIN)
                .help("Session cookie domain (default: parent domain of --site-url)")
                .env("ONBOARDING_COOKIE_DOMAIN"),
        )
        .arg(
            Arg::new(ARG_COOKIE_NAME)
                .long(ARG_COOKIE_NAME)
                .help("Session cookie name (default: derived from --identity-url)")
                .env("ONBOARDING_COOKIE_NAME"),
        )
        .arg(
            Arg::new(ARG_COOKIE_INSECURE)
                .long(ARG_COOKIE_INSECURE)
                .help("Omit the Secure cookie attribute (plain HTTP development)")
                .env("ONBOARDING_COOKIE_INSECURE")
                .action(ArgAction::SetTrue),
        )
}
