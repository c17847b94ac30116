//! Hallbook Booking Server
//!
//! Venue availability, conflict-checked reservations and payment-gated
//! confirmation over PostgreSQL, with an optional Redis cache for the
//! available-dates listing.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use hallbook_api::{configure_routes, json_config, path_config, query_config};
use hallbook_auth::JwtService;
use hallbook_cache::RedisCache;
use hallbook_core::{traits::AvailabilityCache, AppConfig};
use hallbook_db::{
    create_pool, run_migrations, PgAnalyticsRepository, PgBookingRepository, PgVenueRepository,
};
use hallbook_services::{
    AnalyticsService, BookingEngine, ExpirySweeper, HmacSha256Verifier,
    PaymentConfirmationHandler,
};
use std::env;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "hallbook={lvl},hallbook_api={lvl},hallbook_services={lvl},hallbook_db={lvl},hallbook_cache={lvl},hallbook_auth={lvl},actix_web=info,sqlx=warn",
            lvl = log_level
        ))
    });

    let json = env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);
    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    }
}

fn startup_error(context: &str, e: impl std::fmt::Display) -> io::Error {
    error!("{}: {}", context, e);
    io::Error::other(format!("{}: {}", context, e))
}

/// Connect to Redis if configured; the service runs without the cache otherwise
async fn connect_cache(config: &AppConfig) -> Option<Arc<dyn AvailabilityCache>> {
    let redis = config.redis.as_ref()?;

    match RedisCache::new(&redis.url).await {
        Ok(cache) => {
            info!("Redis cache connected");
            Some(Arc::new(cache))
        }
        Err(e) => {
            warn!("Redis unavailable, serving availability without cache: {}", e);
            None
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting Hallbook v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().map_err(|e| startup_error("Invalid configuration", e))?;
    config
        .booking
        .validate()
        .map_err(|e| startup_error("Invalid booking policy", e))?;

    info!("Connecting to database...");
    let pool = create_pool(&config.database)
        .await
        .map_err(|e| startup_error("Failed to create database pool", e))?;

    if config.database.run_migrations {
        run_migrations(&pool)
            .await
            .map_err(|e| startup_error("Failed to run migrations", e))?;
    }

    info!(
        "Database connection established with {} max connections",
        config.database.max_connections
    );

    let cache = connect_cache(&config).await;
    let policy = config.booking.clone();

    let bookings = Arc::new(PgBookingRepository::new(
        pool.clone(),
        Duration::from_secs(policy.store_timeout_secs),
    ));
    let venues = Arc::new(PgVenueRepository::new(pool.clone()));
    let analytics_repo = Arc::new(PgAnalyticsRepository::new(pool.clone()));

    let engine = Arc::new(BookingEngine::new(
        bookings.clone(),
        venues.clone(),
        cache.clone(),
        policy.clone(),
    ));
    let payments = Arc::new(PaymentConfirmationHandler::new(
        bookings,
        Arc::new(HmacSha256Verifier::new(&config.payment.gateway_secret)),
        cache,
        policy.max_payment_attempts,
    ));
    let analytics = Arc::new(AnalyticsService::new(analytics_repo, venues));

    let jwt_service = Arc::new(JwtService::new(
        &config.auth.jwt_secret,
        config.auth.jwt_expiration_secs,
    ));

    let sweeper = ExpirySweeper::new(engine.clone(), policy.expiry_sweep_interval_secs).spawn();

    let bind_addr = config.server_addr();
    let workers = config.server.workers;
    let cors_origins = config.server.cors_origins.clone();

    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, workers
    );

    let engine_data = web::Data::from(engine);
    let payments_data = web::Data::from(payments);
    let analytics_data = web::Data::from(analytics);

    let result = HttpServer::new(move || {
        let cors_origins_inner = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                let origins: Vec<&str> = cors_origins_inner.split(',').collect();
                if let Ok(origin_str) = origin.to_str() {
                    origins.iter().any(|o| o.trim() == origin_str)
                } else {
                    false
                }
            })
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
                header::COOKIE,
                header::HeaderName::from_static("idempotency-key"),
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(engine_data.clone())
            .app_data(payments_data.clone())
            .app_data(analytics_data.clone())
            .app_data(web::Data::new(jwt_service.clone()))
            .app_data(json_config())
            .app_data(query_config())
            .app_data(path_config())
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure_routes)
            .route(
                "/",
                web::get().to(|| async {
                    HttpResponse::Found()
                        .append_header(("Location", "/api/v1/health"))
                        .finish()
                }),
            )
    })
    .workers(workers)
    .bind(&bind_addr)?
    .run()
    .await;

    sweeper.abort();
    info!("Hallbook stopped");
    result
}
