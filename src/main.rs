//! LibraryHub Server - School and Community Library Management
//!
//! REST API server for library circulation.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use libraryhub_server::{
    api,
    config::{AppConfig, LoggingConfig},
    repository::Repository,
    services::{email::SmtpMailer, Services},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    tracing::info!("Starting LibraryHub Server v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let repository = Repository::new(pool.clone());
    let mailer = Arc::new(SmtpMailer::new(config.email.clone()));
    let services = Services::new(repository, &config, mailer);

    services
        .users
        .bootstrap_admin()
        .await
        .context("Failed to create the initial administrator")?;

    if config.maintenance.interval_seconds > 0 {
        services
            .maintenance
            .clone()
            .spawn(Duration::from_secs(config.maintenance.interval_seconds));
        tracing::info!(
            interval_seconds = config.maintenance.interval_seconds,
            "Maintenance task started"
        );
    }

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
        pool,
    };

    let app = create_router(state)?;

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("libraryhub_server={},tower_http=debug", logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Create the application router with all routes
fn create_router(state: AppState) -> anyhow::Result<Router> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Login attempts are limited per client IP
    let governor = GovernorConfigBuilder::default()
        .per_second(state.config.auth.login_per_second)
        .burst_size(state.config.auth.login_burst)
        .finish()
        .context("Invalid login rate limit")?;
    let login = Router::new()
        .route("/auth/login", post(api::auth::login))
        .layer(GovernorLayer {
            config: Arc::new(governor),
        });

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Own account
        .route("/auth/me", get(api::auth::me))
        .route("/auth/profile", put(api::auth::update_profile))
        .route("/auth/password", put(api::auth::change_password))
        // Users
        .route("/users", get(api::users::list_users).post(api::users::create_user))
        .route(
            "/users/:id",
            get(api::users::get_user)
                .put(api::users::update_user)
                .delete(api::users::delete_user),
        )
        // Organisation
        .route(
            "/centres",
            get(api::organisation::list_centres).post(api::organisation::create_centre),
        )
        .route(
            "/centres/:id",
            get(api::organisation::get_centre)
                .put(api::organisation::update_centre)
                .delete(api::organisation::delete_centre),
        )
        .route("/centres/:id/schools", get(api::organisation::schools_by_centre))
        .route(
            "/schools",
            get(api::organisation::list_schools).post(api::organisation::create_school),
        )
        .route("/grades", get(api::organisation::list_grades))
        .route("/categories", get(api::organisation::list_categories))
        .route(
            "/subjects",
            get(api::organisation::list_subjects).post(api::organisation::create_subject),
        )
        .route("/admin/seed", post(api::organisation::seed_reference_data))
        // Books
        .route("/books", get(api::books::list_books).post(api::books::create_book))
        .route("/books/import", post(api::books::import_books))
        .route("/books/sample-csv", get(api::books::books_sample_csv))
        .route(
            "/books/:id",
            get(api::books::get_book)
                .put(api::books::update_book)
                .delete(api::books::delete_book),
        )
        // Students
        .route(
            "/students",
            get(api::students::list_students).post(api::students::create_student),
        )
        .route("/students/import", post(api::students::import_students))
        .route("/students/sample-csv", get(api::students::students_sample_csv))
        .route(
            "/students/:id",
            get(api::students::get_student)
                .put(api::students::update_student)
                .delete(api::students::delete_student),
        )
        .route("/students/:id/account", post(api::students::create_student_account))
        // Borrower circulation
        .route("/borrows", post(api::borrows::request_borrow))
        .route("/borrows/my", get(api::borrows::my_borrows))
        .route("/borrows/:id/cancel", post(api::borrows::cancel_borrow))
        .route("/borrows/:id/renew", post(api::borrows::renew_borrow))
        .route("/teacher/books", get(api::borrows::teacher_books))
        .route("/teacher/bulk-request", post(api::borrows::bulk_borrow_request))
        .route("/teacher/bulk-reserve", post(api::borrows::bulk_reserve))
        // Staff circulation
        .route("/borrows/pending", get(api::borrows::pending_requests))
        .route("/borrows/active", get(api::borrows::active_borrows))
        .route("/borrows/history", get(api::borrows::borrow_history))
        .route("/borrows/:id/issue", post(api::borrows::issue_borrow))
        .route("/borrows/:id/reject", post(api::borrows::reject_borrow))
        .route("/borrows/:id/return", post(api::borrows::receive_return))
        .route(
            "/borrows/users/:user_id/pending",
            get(api::borrows::user_pending_requests),
        )
        .route("/borrows/users/:user_id/bulk-issue", post(api::borrows::bulk_issue))
        .route("/borrows/users/:user_id/bulk-reject", post(api::borrows::bulk_reject))
        .route(
            "/borrows/users/:user_id/active",
            get(api::borrows::user_active_borrows),
        )
        .route("/borrows/users/:user_id/history", get(api::borrows::user_history))
        // Reservations
        .route(
            "/reservations",
            get(api::reservations::list_reservations).post(api::reservations::reserve_book),
        )
        .route(
            "/reservations/:id/cancel",
            post(api::reservations::cancel_reservation),
        )
        .route(
            "/reservations/users/:user_id",
            get(api::reservations::user_reservations),
        )
        // Notifications
        .route(
            "/notifications",
            get(api::notifications::list_notifications).delete(api::notifications::clear_all),
        )
        .route("/notifications/recent", get(api::notifications::recent_notifications))
        .route("/notifications/unread-count", get(api::notifications::unread_count))
        .route("/notifications/read-all", post(api::notifications::mark_all_read))
        .route("/notifications/:id/read", post(api::notifications::mark_read))
        .route(
            "/notifications/:id",
            axum::routing::delete(api::notifications::delete_notification),
        )
        // Teacher sub-lending
        .route("/teacher/my-books", get(api::teacher_issues::my_books))
        .route("/teacher/borrows/:borrow_id", get(api::teacher_issues::manage_book))
        .route(
            "/teacher/borrows/:borrow_id/issue",
            post(api::teacher_issues::issue_to_student),
        )
        .route("/teacher/issues", get(api::teacher_issues::all_issues))
        .route("/teacher/issues/:id", put(api::teacher_issues::update_issue))
        .route("/teacher/issues/:id/return", post(api::teacher_issues::receive_return))
        // Catalogue
        .route(
            "/catalogue",
            get(api::catalogue::list_catalogue).post(api::catalogue::add_to_catalogue),
        )
        .route("/catalogue/books-by-centre", get(api::catalogue::books_by_centre))
        .route(
            "/catalogue/:id",
            get(api::catalogue::view_entry)
                .put(api::catalogue::update_entry)
                .delete(api::catalogue::delete_entry),
        )
        // Dashboard
        .route("/dashboard", get(api::dashboard::dashboard))
        .merge(login)
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Ok(Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        ))
}
