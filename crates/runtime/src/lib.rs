use std::sync::Arc;

use anyhow::{Context, Result};
use parley_chats::{ChatService, MessageService, ReconcileReport};
use parley_config::AppConfig;
use parley_database::{
    initialize_database, ChatRepository, MessageRepository, SessionRepository, UserRepository,
};
use parley_orchestrator::{ChatManagement, Messaging, UserManagement};
use parley_users::{SessionService, UserService};
use sqlx::SqlitePool;
use tracing::{info, warn};

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    /// Installs the global subscriber. `RUST_LOG` wins over `default_filter`.
    pub fn init_tracing(default_filter: &str) -> Result<()> {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_filter))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

pub type SqlChatManagement = ChatManagement<ChatRepository, UserRepository, SessionRepository>;
pub type SqlMessaging =
    Messaging<ChatRepository, UserRepository, MessageRepository, SessionRepository>;
pub type SqlUserManagement = UserManagement<ChatRepository, UserRepository, SessionRepository>;

/// Every workflow wired against one SQLite pool.
#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub chats: Arc<SqlChatManagement>,
    pub messaging: Arc<SqlMessaging>,
    pub accounts: Arc<SqlUserManagement>,
    chat_service: ChatService<ChatRepository, UserRepository>,
    sessions: SessionService<SessionRepository>,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise database")?;

        let chat_repo = ChatRepository::new(db_pool.clone());
        let user_repo = UserRepository::new(db_pool.clone());
        let message_repo = MessageRepository::new(db_pool.clone());
        let session_repo = SessionRepository::new(db_pool.clone());

        let chat_service = ChatService::new(chat_repo, user_repo.clone());
        let sessions = SessionService::new(session_repo);

        let chats = Arc::new(ChatManagement::new(chat_service.clone(), sessions.clone()));
        let messaging = Arc::new(Messaging::new(
            chat_service.clone(),
            MessageService::new(message_repo),
            sessions.clone(),
        ));
        let accounts = Arc::new(UserManagement::new(
            UserService::new(user_repo),
            chat_service.clone(),
            sessions.clone(),
            config.session.ttl(),
        ));

        info!(
            database = %config.database.url,
            session_ttl_seconds = config.session.ttl_seconds,
            "backend services ready"
        );

        Ok(Self {
            db_pool,
            chats,
            messaging,
            accounts,
            chat_service,
            sessions,
        })
    }

    /// Repairs drift between chat member lists and user chat indexes.
    pub async fn reconcile_memberships(&self) -> Result<ReconcileReport> {
        let report = self
            .chat_service
            .reconcile_memberships()
            .await
            .context("membership reconciliation failed")?;
        if report.unknown_members > 0 {
            warn!(
                unknown_members = report.unknown_members,
                "chats list members without a user record"
            );
        }
        Ok(report)
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64> {
        let purged = self
            .sessions
            .purge_expired()
            .await
            .context("failed to purge expired sessions")?;
        info!(purged, "expired sessions purged");
        Ok(purged)
    }
}
