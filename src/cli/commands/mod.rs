pub mod logging;
pub mod session;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_DATA_PATH: &str = "data-path";
pub const ARG_USERS_FILE: &str = "users-file";
pub const ARG_SYNC_TOKEN: &str = "sync-token";
pub const ARG_FRONTEND_ORIGIN: &str = "frontend-origin";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::api::GIT_COMMIT_HASH)
            .into_boxed_str(),
    );

    let command = Command::new("nawafed")
        .about("Tender intake backend")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("NAWAFED_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DATA_PATH)
                .long(ARG_DATA_PATH)
                .help("Directory holding kv.json and tender uploads")
                .env("DATA_PATH")
                .default_value("/data"),
        )
        .arg(
            Arg::new(ARG_USERS_FILE)
                .long(ARG_USERS_FILE)
                .help("User directory JSON file (default: <data-path>/users.json)")
                .env("NAWAFED_USERS_FILE"),
        )
        .arg(
            Arg::new(ARG_SYNC_TOKEN)
                .long(ARG_SYNC_TOKEN)
                .help("Token required for key/value writes; unset rejects every write")
                .env("SYNC_TOKEN")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_FRONTEND_ORIGIN)
                .long(ARG_FRONTEND_ORIGIN)
                .help("Frontend origin allowed to send credentials, example: https://app.nawafed.dev")
                .env("NAWAFED_FRONTEND_ORIGIN"),
        );

    let command = session::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "nawafed");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Tender intake backend".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(
            [
                ("SESSION_SECRET", Some(SECRET)),
                ("NAWAFED_PORT", None),
                ("DATA_PATH", None),
                ("SESSION_IDLE_SECONDS", None),
                ("SESSION_COOKIE_NAME", None),
                ("SESSION_SAMESITE", None),
                ("SYNC_TOKEN", None),
            ],
            || {
                let matches = new().get_matches_from(vec!["nawafed"]);
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(8080));
                assert_eq!(
                    matches.get_one::<String>(ARG_DATA_PATH).map(String::as_str),
                    Some("/data")
                );
                assert_eq!(
                    matches
                        .get_one::<u64>(session::ARG_SESSION_IDLE_SECONDS)
                        .copied(),
                    Some(1800)
                );
                assert_eq!(
                    matches
                        .get_one::<String>(session::ARG_SESSION_COOKIE_NAME)
                        .map(String::as_str),
                    Some("nwgd_session")
                );
                assert!(matches.get_one::<String>(ARG_SYNC_TOKEN).is_none());
            },
        );
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        temp_env::with_vars([("SESSION_SECRET", None::<&str>)], || {
            let result = new().try_get_matches_from(vec!["nawafed"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("SESSION_SECRET", Some(SECRET)),
                ("NAWAFED_PORT", Some("443")),
                ("DATA_PATH", Some("/srv/nawafed")),
                ("SESSION_IDLE_SECONDS", Some("60")),
                ("SESSION_SAMESITE", Some("strict")),
                ("SYNC_TOKEN", Some("sync")),
                ("NAWAFED_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["nawafed"]);
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>(ARG_DATA_PATH).map(String::as_str),
                    Some("/srv/nawafed")
                );
                assert_eq!(
                    matches
                        .get_one::<u64>(session::ARG_SESSION_IDLE_SECONDS)
                        .copied(),
                    Some(60)
                );
                assert_eq!(
                    matches
                        .get_one::<String>(session::ARG_SESSION_SAMESITE)
                        .map(String::as_str),
                    Some("strict")
                );
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("NAWAFED_LOG_LEVEL", Some(level)),
                    ("SESSION_SECRET", Some(SECRET)),
                ],
                || {
                    let matches = new().get_matches_from(vec!["nawafed"]);
                    assert_eq!(
                        matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                        u8::try_from(index).ok()
                    );
                },
            );
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5_usize {
            temp_env::with_vars(
                [
                    ("NAWAFED_LOG_LEVEL", None::<&str>),
                    ("SESSION_SECRET", Some(SECRET)),
                ],
                || {
                    let mut args = vec!["nawafed".to_string()];
                    if index > 0 {
                        args.push(format!("-{}", "v".repeat(index)));
                    }

                    let matches = new().get_matches_from(args);
                    assert_eq!(
                        matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                        u8::try_from(index).ok()
                    );
                },
            );
        }
    }
}
