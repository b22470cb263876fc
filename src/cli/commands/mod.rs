pub mod identity;
pub mod logging;
pub mod rate_limit;
pub mod web;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const CMD_MIGRATE: &str = "migrate";
pub const CMD_BACKFILL_KEYS: &str = "backfill-keys";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("onboarding")
        .about("Merchant onboarding: sign-up, sign-in and session cookies")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand(Command::new(CMD_MIGRATE).about("Apply the database schema and exit"))
        .subcommand(
            Command::new(CMD_BACKFILL_KEYS)
                .about("Generate test API keys for merchants that have none"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("ONBOARDING_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .env("ONBOARDING_DSN")
                .hide_env_values(true)
                .required(true),
        );

    let command = identity::with_args(command);
    let command = web::with_args(command);
    let command = rate_limit::with_args(command);
    logging::with_args(command)
}
