use clap::{Arg, Command};

pub const ARG_IDENTITY_URL: &str = "identity-url";
pub const ARG_IDENTITY_ANON_KEY: &str = "identity-anon-key";
pub const ARG_IDENTITY_SERVICE_KEY: &str = "identity-service-key";

/// Identity provider endpoint and keys. Only the server needs them, so
/// `dispatch` checks presence instead of clap.
#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_IDENTITY_URL)
                .long(ARG_IDENTITY_URL)
                .help("Identity provider project URL, example: https://abcd.supabase.co")
                .env("ONBOARDING_IDENTITY_URL"),
        )
        .arg(
            Arg::new(ARG_IDENTITY_ANON_KEY)
                .long(ARG_IDENTITY_ANON_KEY)
                .help("Identity provider public (anon) key")
                .env("ONBOARDING_IDENTITY_ANON_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_IDENTITY_SERVICE_KEY)
                .long(ARG_IDENTITY_SERVICE_KEY)
                .help("Identity provider service key, used to delete users after a failed sign-up")
                .env("ONBOARDING_IDENTITY_SERVICE_KEY")
                .hide_env_values(true),
        )
}
