use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::extractors::TrustedProxies;
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, trace_id, IpThrottle,
};
use crate::routes::{auth, health, portal, pricing, validation};
use domain::services::{
    AccountMailer, EmailSender, PricingService, RateLimiter, SecurityMonitor, VerificationService,
};
use domain::stores::{
    InMemoryStore, PortalUserStore, PricingStrategyStore, RateLimitStore, SecurityEventStore,
    VerificationTokenStore,
};
use persistence::{
    PortalUserRepository, PricingStrategyRepository, RateLimitRepository, SecurityEventRepository,
    VerificationTokenRepository,
};

/// The record stores the services run against.
#[derive(Clone)]
pub struct Stores {
    pub strategies: Arc<dyn PricingStrategyStore>,
    pub tokens: Arc<dyn VerificationTokenStore>,
    pub rate_limits: Arc<dyn RateLimitStore>,
    pub security_events: Arc<dyn SecurityEventStore>,
    pub users: Arc<dyn PortalUserStore>,
}

impl Stores {
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            strategies: Arc::new(PricingStrategyRepository::new(pool.clone())),
            tokens: Arc::new(VerificationTokenRepository::new(pool.clone())),
            rate_limits: Arc::new(RateLimitRepository::new(pool.clone())),
            security_events: Arc::new(SecurityEventRepository::new(pool.clone())),
            users: Arc::new(PortalUserRepository::new(pool.clone())),
        }
    }

    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            strategies: store.clone(),
            tokens: store.clone(),
            rate_limits: store.clone(),
            security_events: store.clone(),
            users: store,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Present when backed by PostgreSQL; pinged by the readiness check.
    pub pool: Option<PgPool>,
    pub pricing: Arc<PricingService>,
    pub verification: Arc<VerificationService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub security: Arc<SecurityMonitor>,
    pub mailer: Arc<AccountMailer>,
    pub users: Arc<dyn PortalUserStore>,
    pub throttle: Option<Arc<IpThrottle>>,
    pub trusted_proxies: TrustedProxies,
}

impl FromRef<AppState> for TrustedProxies {
    fn from_ref(state: &AppState) -> Self {
        state.trusted_proxies.clone()
    }
}

impl AppState {
    pub fn new(
        config: Config,
        stores: Stores,
        sender: Arc<dyn EmailSender>,
        pool: Option<PgPool>,
    ) -> Self {
        let verification = Arc::new(VerificationService::new(
            stores.tokens,
            stores.users.clone(),
            config.security.token_lifetimes(),
        ));
        let mailer = Arc::new(AccountMailer::new(
            verification.clone(),
            sender,
            config.email.mailer_settings(),
        ));
        let throttle = IpThrottle::new(config.security.rate_limit_per_minute).map(Arc::new);
        let trusted_proxies = TrustedProxies::new(config.security.trusted_proxies.clone());

        Self {
            pool,
            pricing: Arc::new(PricingService::new(stores.strategies)),
            verification,
            rate_limiter: Arc::new(RateLimiter::new(stores.rate_limits)),
            security: Arc::new(SecurityMonitor::new(stores.security_events)),
            mailer,
            users: stores.users,
            throttle,
            trusted_proxies,
            config: Arc::new(config),
        }
    }
}

/// Wiring over an in-memory store, used by tests and local runs without a database.
pub fn create_app_in_memory(
    config: Config,
    store: Arc<InMemoryStore>,
    sender: Arc<dyn EmailSender>,
) -> Router {
    router(AppState::new(config, Stores::in_memory(store), sender, None))
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

pub fn router(state: AppState) -> Router {
    let config = state.config.clone();

    let api_routes = Router::new()
        // Pricing (v1)
        .route(
            "/api/v1/pricing/strategy",
            get(pricing::get_strategy).put(pricing::save_strategy),
        )
        .route("/api/v1/pricing/quote", post(pricing::quote))
        // Customer portal (v1)
        .route("/api/v1/portal/register", post(portal::register))
        .route("/api/v1/portal/login", post(portal::login))
        .route(
            "/api/v1/portal/verification",
            post(portal::send_verification),
        )
        .route("/api/v1/portal/verify-email", post(portal::verify_email))
        .route(
            "/api/v1/portal/validate/customer",
            post(validation::validate_customer),
        )
        .route(
            "/api/v1/portal/validate/business",
            post(validation::validate_business),
        )
        .route(
            "/api/v1/portal/validate/booking",
            post(validation::validate_booking),
        )
        // Password reset (v1)
        .route("/api/v1/auth/forgot-password", post(auth::forgot_password))
        .route("/api/v1/auth/reset-password", post(auth::reset_password))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors_layer(&config))
        .with_state(state)
}
