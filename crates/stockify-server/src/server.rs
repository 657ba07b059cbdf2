use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{Router, routing::get};
use stockify_auth::config::AuthConfig;
use stockify_auth::{
    AuthError, CredentialVerifier, GrantHandler, InMemoryRevocationStore, InMemoryUserStore,
    KeyManager, RetryingRevocationStore, RevocationStore, StaticClientRegistry, TokenIssuer,
    TokenVerifier,
};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;

/// The token service's components, built once and shared for the process
/// lifetime.
pub struct AuthComponents {
    pub keys: Arc<KeyManager>,
    pub grants: Arc<GrantHandler>,
    pub verifier: Arc<TokenVerifier>,
    pub revocation: Arc<dyn RevocationStore>,
}

impl AuthComponents {
    /// Loads the signing keys and wires the grant handler.
    ///
    /// Client secrets and user passwords given in plaintext are hashed here.
    pub fn build(cfg: &AuthConfig) -> Result<Self, AuthError> {
        cfg.validate()?;

        let keys = Arc::new(KeyManager::load(&cfg.signing, cfg.issuer.clone())?);

        let clients = StaticClientRegistry::from_config(&cfg.clients)?;
        let users = InMemoryUserStore::from_config(&cfg.users)?;
        tracing::info!(
            clients = clients.len(),
            users = cfg.users.len(),
            "Loaded client registrations and users"
        );

        let revocation: Arc<dyn RevocationStore> = Arc::new(RetryingRevocationStore::new(
            Arc::new(InMemoryRevocationStore::new()),
            cfg.revocation.clone(),
        ));

        let leeway = cfg.oauth.clock_skew.as_secs();
        let verifier = TokenVerifier::new(keys.clone()).with_leeway(leeway);
        let resource_verifier = match &cfg.resource.resource_id {
            Some(resource_id) => verifier.clone().with_resource_id(resource_id.clone()),
            None => verifier.clone(),
        };

        let grants = GrantHandler::new(
            Arc::new(clients),
            CredentialVerifier::new(Arc::new(users)),
            TokenIssuer::new(keys.clone()),
            verifier,
            revocation.clone(),
            cfg.oauth.refresh_token_policy,
        );

        Ok(Self {
            keys,
            grants: Arc::new(grants),
            verifier: Arc::new(resource_verifier),
            revocation,
        })
    }
}

pub fn build_app(cfg: &AppConfig, auth: &AuthComponents) -> Router {
    stockify_auth::router(
        auth.grants.clone(),
        auth.keys.clone(),
        auth.verifier.clone(),
    )
    .route("/healthz", get(healthz))
    .layer(TraceLayer::new_for_http())
    .layer(axum::extract::DefaultBodyLimit::max(
        cfg.server.body_limit_bytes,
    ))
}

async fn healthz() -> &'static str {
    "ok"
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self) -> Result<StockifyServer, AuthError> {
        let auth = AuthComponents::build(&self.config.auth)?;
        let app = build_app(&self.config, &auth);

        Ok(StockifyServer {
            addr: self.addr,
            app,
            revocation: auth.revocation,
            cleanup_interval: self.config.auth.revocation.cleanup_interval,
        })
    }
}

pub struct StockifyServer {
    addr: SocketAddr,
    app: Router,
    revocation: Arc<dyn RevocationStore>,
    cleanup_interval: Duration,
}

impl StockifyServer {
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let cleanup = tokio::spawn(cleanup_used_tokens(
            self.revocation.clone(),
            self.cleanup_interval,
        ));

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        cleanup.abort();
        served?;
        Ok(())
    }
}

/// Periodically drops used-token entries whose tokens have expired.
async fn cleanup_used_tokens(store: Arc<dyn RevocationStore>, every: Duration) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        match store.cleanup_expired(now).await {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "Purged expired used-token entries"),
            Err(e) => tracing::warn!(error = %e, "Used-token cleanup failed"),
        }
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use stockify_auth::config::{ClientConfig, UserConfig};
    use tower::ServiceExt;

    fn test_config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.auth.signing.generate_ephemeral = true;
        cfg.auth.clients = vec![ClientConfig {
            client_id: "c1".to_string(),
            secret: Some("s1".to_string()),
            ..ClientConfig::default()
        }];
        cfg.auth.users = vec![UserConfig {
            username: "alice".to_string(),
            password: Some("wonderland".to_string()),
            ..UserConfig::default()
        }];
        cfg
    }

    #[test]
    fn test_build_requires_key_source() {
        let mut cfg = test_config();
        cfg.auth.signing.generate_ephemeral = false;
        let err = ServerBuilder::new().with_config(cfg).build().err().unwrap();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_signin_through_full_stack() {
        let server = ServerBuilder::new()
            .with_config(test_config())
            .build()
            .unwrap();

        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/signin")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(
                        "grant_type=password&username=alice&password=wonderland\
                         &client_id=c1&client_secret=s1",
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["scope"], "read write");
        assert_eq!(json["expires_in"], 3600);
    }

    #[tokio::test]
    async fn test_healthz() {
        let server = ServerBuilder::new()
            .with_config(test_config())
            .build()
            .unwrap();

        let response = server
            .router()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
