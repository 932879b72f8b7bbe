use crate::{
    api::{self, Services, SyncToken},
    cli::commands::session,
    guard::SessionGuard,
    kv::KvStore,
    tenders::TenderService,
    users::FileUserDirectory,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{path::PathBuf, sync::Arc};
use tracing::{debug, info};

pub struct Args {
    pub port: u16,
    pub data_path: PathBuf,
    pub users_file: PathBuf,
    pub sync_token: Option<SecretString>,
    pub frontend_origin: Option<String>,
    pub session: session::Options,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("data_path", &self.data_path)
            .field("users_file", &self.users_file)
            .field("sync_token", &self.sync_token.as_ref().map(|_| "***"))
            .field("frontend_origin", &self.frontend_origin)
            .field("session", &self.session)
            .finish()
    }
}

/// Build the shared services from the parsed arguments.
///
/// # Errors
/// Returns an error on an empty session secret, an unreadable user directory or
/// an unusable data path.
pub async fn services(args: &Args) -> Result<Services> {
    let guard = SessionGuard::new(args.session.guard_config()?)
        .context("Failed to initialize session guard")?;

    let users = FileUserDirectory::load(&args.users_file)?;
    debug!("Loaded {} users from {}", users.len(), args.users_file.display());

    let kv = KvStore::open(&args.data_path).await?;

    if args.sync_token.is_none() {
        info!("SYNC_TOKEN not set, key/value writes are disabled");
    }

    Ok(Services {
        guard: Arc::new(guard),
        users: Arc::new(users),
        kv: Arc::new(kv),
        tenders: Arc::new(TenderService::new(args.data_path.clone())),
        sync_token: SyncToken::new(args.sync_token.clone()),
    })
}

/// Execute the server action.
/// # Errors
/// Returns an error if configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Starting server with {:?}", args);
    let services = services(&args).await?;
    api::new(args.port, args.frontend_origin.as_deref(), services).await
}
