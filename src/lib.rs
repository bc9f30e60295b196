pub mod api;
pub mod chat;
pub mod commands;
pub mod config;
pub mod db;
#[cfg(feature = "desktop")]
pub mod desktop;
pub mod error;
pub mod quiz;

use api::ApiClient;
use chat::ChatHandle;
use config::ClientConfig;
use db::models::Session;
use db::Database;
use error::AppError;
use std::sync::Once;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Everything the command layer needs: local storage plus the one open
/// conversation, if any.
pub struct AppState {
    pub db: Database,
    chat: Mutex<ActiveChat>,
}

/// The open conversation. `generation` moves on every open and close so an
/// `open_chat` that finishes late can tell it was superseded.
#[derive(Default)]
struct ActiveChat {
    handle: Option<ChatHandle>,
    generation: u64,
}

impl AppState {
    pub fn new(app_dir: &std::path::Path) -> Result<Self, AppError> {
        Ok(Self::with_database(Database::new(app_dir)?))
    }

    pub fn in_memory() -> Result<Self, AppError> {
        Ok(Self::with_database(Database::open_in_memory()?))
    }

    fn with_database(db: Database) -> Self {
        Self {
            db,
            chat: Mutex::new(ActiveChat::default()),
        }
    }

    pub fn config(&self) -> Result<ClientConfig, AppError> {
        Ok(ClientConfig::load(&self.db)?)
    }

    /// Client for public endpoints; carries the token when signed in.
    pub fn api(&self) -> Result<ApiClient, AppError> {
        let token = self.db.load_session()?.map(|s| s.access_token);
        Ok(ApiClient::new(self.config()?.api_config(token)))
    }

    /// Client for endpoints that need a signed-in user.
    pub fn authed_api(&self) -> Result<(ApiClient, Session), AppError> {
        let session = self.db.load_session()?.ok_or(AppError::NotSignedIn)?;
        let api = ApiClient::new(
            self.config()?
                .api_config(Some(session.access_token.clone())),
        );
        Ok((api, session))
    }
}

static TRACING: Once = Once::new();

/// Installs the fmt subscriber once; `RUST_LOG` overrides the default
/// `learnhub_client=info` filter.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("learnhub_client=info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authed_api_requires_session() {
        init_tracing();
        let state = AppState::in_memory().unwrap();
        assert!(matches!(state.authed_api(), Err(AppError::NotSignedIn)));
        assert!(state.api().unwrap().config().token.is_none());

        state.db.save_session("u1", "tok", None).unwrap();
        let (api, session) = state.authed_api().unwrap();
        assert_eq!(session.user_id, "u1");
        assert_eq!(api.config().token.as_deref(), Some("tok"));
    }
}
