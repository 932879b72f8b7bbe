//! Map parsed command-line arguments to the action to run.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{
    session, ARG_DATA_PATH, ARG_FRONTEND_ORIGIN, ARG_PORT, ARG_SYNC_TOKEN, ARG_USERS_FILE,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::path::PathBuf;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let data_path = matches
        .get_one::<String>(ARG_DATA_PATH)
        .map(PathBuf::from)
        .context("missing required argument: --data-path")?;
    let users_file = matches
        .get_one::<String>(ARG_USERS_FILE)
        .map_or_else(|| data_path.join("users.json"), PathBuf::from);
    let sync_token = matches
        .get_one::<String>(ARG_SYNC_TOKEN)
        .filter(|token| !token.is_empty())
        .cloned()
        .map(SecretString::from);
    let frontend_origin = matches
        .get_one::<String>(ARG_FRONTEND_ORIGIN)
        .filter(|origin| !origin.trim().is_empty())
        .cloned();

    let session = session::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        data_path,
        users_file,
        sync_token,
        frontend_origin,
        session,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use crate::guard::SameSite;
    use secrecy::ExposeSecret;

    #[test]
    fn server_args_from_flags() {
        temp_env::with_vars([("NAWAFED_USERS_FILE", None::<&str>)], || {
            let matches = commands::new().try_get_matches_from([
                "nawafed",
                "--port",
                "9000",
                "--data-path",
                "/tmp/nawafed",
                "--session-secret",
                "s3cret",
                "--session-samesite",
                "none",
                "--sync-token",
                "tok",
            ]);
            assert!(matches.is_ok());
            let Ok(matches) = matches else { return };
            let result = handler(&matches);
            assert!(result.is_ok());
            let Ok(Action::Server(args)) = result else { return };

            assert_eq!(args.port, 9000);
            assert_eq!(args.users_file, PathBuf::from("/tmp/nawafed/users.json"));
            assert_eq!(
                args.sync_token.as_ref().map(|token| token.expose_secret()),
                Some("tok")
            );
            assert_eq!(args.session.same_site, SameSite::None);
            assert_eq!(args.session.secret.expose_secret(), "s3cret");
        });
    }

    #[test]
    fn invalid_same_site_is_fatal() -> Result<()> {
        let matches = commands::new().try_get_matches_from([
            "nawafed",
            "--session-secret",
            "s3cret",
            "--session-samesite",
            "sometimes",
        ])?;
        assert!(handler(&matches).is_err());
        Ok(())
    }

    #[test]
    fn users_file_from_env() {
        temp_env::with_vars(
            [
                ("SESSION_SECRET", Some("s3cret")),
                ("NAWAFED_USERS_FILE", Some("/etc/nawafed/users.json")),
                ("SYNC_TOKEN", Some("")),
            ],
            || {
                let matches = commands::new().get_matches_from(["nawafed"]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.users_file, PathBuf::from("/etc/nawafed/users.json"));
                    assert!(args.sync_token.is_none());
                    assert!(!format!("{args:?}").contains("s3cret"));
                }
            },
        );
    }
}
