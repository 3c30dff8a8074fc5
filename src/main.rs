use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use exam_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    routes, AppState,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let admin_api = Router::new()
        .route(
            "/api/admin/blueprints",
            get(routes::blueprints::list_blueprints).post(routes::blueprints::create_blueprint),
        )
        .route(
            "/api/admin/blueprints/:id",
            get(routes::blueprints::get_blueprint),
        )
        .route(
            "/api/admin/blueprints/:id/materials",
            post(routes::blueprints::add_material),
        )
        .route(
            "/api/admin/exams",
            get(routes::exams::list_exams).post(routes::exams::create_exam),
        )
        .route("/api/admin/exams/:id", get(routes::exams::get_exam))
        .route(
            "/api/admin/sections/:id/questions",
            get(routes::exams::get_section_questions),
        )
        .route(
            "/api/admin/exams/:id/shortages",
            get(routes::exams::get_shortages),
        )
        .route(
            "/api/admin/exams/:id/generate-missing-ai",
            post(routes::exams::generate_missing_ai),
        )
        .route(
            "/api/admin/questions",
            post(routes::questions::create_question),
        )
        .layer(axum::middleware::from_fn_with_state(
            exam_backend::middleware::rate_limit::new_rps_state(config.admin_rps),
            exam_backend::middleware::rate_limit::rps_middleware,
        ));

    let app = base_routes
        .merge(admin_api)
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
