//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize all subsystems in dependency order:
//!   keys → proxy store → permissions → sessions → upstream client
//! - Start background tasks (session expiry)
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::auth::{AuthorizationGate, PermissionStore, SessionStore};
use crate::config::GatewayConfig;
use crate::http::{AppState, GatewayServer, UpstreamClient};
use crate::lifecycle::Shutdown;
use crate::net::tls::load_tls_config;
use crate::signing::{KeyError, RequestSigner, SigningKeyPair};
use crate::storage::{KvStore, ProxyDirectory, SledStore, StoreError};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60);
const DRAIN_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("signing keys: {0}")]
    Keys(#[from] KeyError),

    #[error("proxy store: {0}")]
    Storage(#[from] StoreError),

    #[error("permissions file: {0}")]
    Permissions(std::io::Error),

    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("listener: {0}")]
    Listener(std::io::Error),
}

/// Load keys from the environment and open the durable stores.
pub fn bootstrap(config: &GatewayConfig) -> Result<AppState, StartupError> {
    let keys = SigningKeyPair::from_env()?;

    let store = SledStore::open(&config.storage.db_path)?;
    tracing::info!(path = %config.storage.db_path, "Proxy directory opened");

    let permissions = match &config.permissions.persistence_path {
        Some(path) => {
            PermissionStore::load_from_file(Path::new(path)).map_err(StartupError::Permissions)?
        }
        None => PermissionStore::new(None),
    };

    build_state(config, keys, Arc::new(store), permissions)
}

/// Assemble handler state from already-initialized parts, seeding the
/// configured roles.
pub fn build_state(
    config: &GatewayConfig,
    keys: SigningKeyPair,
    store: Arc<dyn KvStore>,
    permissions: PermissionStore,
) -> Result<AppState, StartupError> {
    for assignment in &config.permissions.roles {
        permissions.assign_role(assignment.user_id, assignment.role)?;
        tracing::info!(
            user_id = assignment.user_id,
            role = ?assignment.role,
            "Seeded role"
        );
    }

    Ok(AppState {
        signer: RequestSigner::new(keys),
        proxies: ProxyDirectory::new(store),
        gate: AuthorizationGate::new(Arc::new(permissions)),
        sessions: Arc::new(SessionStore::new(&config.session)),
        upstream: UpstreamClient::new(&config.upstream),
        default_node_url: Arc::from(config.upstream.default_node_url.as_str()),
    })
}

/// Run the gateway until `shutdown` fires.
pub async fn serve(
    config: &GatewayConfig,
    state: AppState,
    shutdown: &Shutdown,
) -> Result<(), StartupError> {
    spawn_session_purge(state.sessions.clone(), shutdown);

    let addr: SocketAddr = config
        .listener
        .bind_address
        .parse()
        .map_err(|_| StartupError::BindAddress(config.listener.bind_address.clone()))?;
    let server = GatewayServer::new(config, state);

    match &config.listener.tls {
        Some(tls) => {
            let tls = load_tls_config(tls).await.map_err(StartupError::Listener)?;
            server
                .run_tls(addr, tls, shutdown.subscribe(), DRAIN_DEADLINE)
                .await
                .map_err(StartupError::Listener)
        }
        None => {
            let listener = TcpListener::bind(addr)
                .await
                .map_err(StartupError::Listener)?;
            server
                .run(listener, shutdown.subscribe())
                .await
                .map_err(StartupError::Listener)
        }
    }
}

fn spawn_session_purge(sessions: Arc<SessionStore>, shutdown: &Shutdown) {
    let mut stop = shutdown.subscribe();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = sessions.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, "Expired sessions removed");
                    }
                }
                _ = stop.recv() => break,
            }
        }
    });
}
