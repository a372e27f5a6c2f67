use {
    anyhow::Result,
    clap::Subcommand,
    snowgate_config::{SnowgateConfig, StorageBackend},
    snowgate_oauth::{CredentialStore, FileTokenStore},
};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Show which users hold a ServiceNow token.
    Status,
    /// Drop a user's stored token.
    Logout {
        /// User id as seen by the gateway (cookie id or proxy header value).
        #[arg(long)]
        user: String,
    },
}

pub fn handle_auth(action: AuthAction, config: &SnowgateConfig) -> Result<()> {
    if config.storage.backend == StorageBackend::Memory {
        println!("Token storage is in-memory; nothing is persisted between runs.");
        return Ok(());
    }

    let store = FileTokenStore::with_path(config.storage.tokens_path());
    match action {
        AuthAction::Status => {
            let lines = status_lines(&store, snowgate_oauth::now_secs());
            if lines.is_empty() {
                println!("No authenticated users.");
            }
            for line in lines {
                println!("{line}");
            }
            Ok(())
        },
        AuthAction::Logout { user } => {
            store.delete(&user)?;
            println!("Removed stored token for {user}");
            Ok(())
        },
    }
}

fn status_lines(store: &dyn CredentialStore, now: u64) -> Vec<String> {
    store
        .list()
        .into_iter()
        .filter_map(|user| {
            let tokens = store.load(&user)?;
            let expiry = match tokens.expires_at {
                None => "no expiry".to_string(),
                Some(ts) if ts > now => {
                    let remaining = ts - now;
                    let hours = remaining / 3600;
                    let mins = (remaining % 3600) / 60;
                    format!("valid ({hours}h {mins}m remaining)")
                },
                Some(_) if tokens.has_refresh_token() => "expired, refreshable".to_string(),
                Some(_) => "expired".to_string(),
            };
            Some(format!("{user} [{expiry}]"))
        })
        .collect()
}
