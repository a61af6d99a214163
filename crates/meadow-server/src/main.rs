use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use meadow_api::{ApiConfig, AppState, AppStateInner, auth, comments, posts, users};
use meadow_mailer::SendGridMailer;

/// Every handler's database work must finish inside this window; a stalled
/// connection cannot hold a request slot indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

struct Config {
    host: String,
    port: u16,
    db_path: String,
    env: String,
    frontend_url: String,
    from_email: String,
    sendgrid_api_key: String,
    invitation_exp_hours: u64,
}

fn env_string(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

fn load_config() -> anyhow::Result<Config> {
    Ok(Config {
        host: env_string("MEADOW_HOST", "0.0.0.0"),
        port: env_string("MEADOW_PORT", "8080").parse()?,
        db_path: env_string("MEADOW_DB_PATH", "meadow.db"),
        env: env_string("MEADOW_ENV", "development"),
        frontend_url: env_string("MEADOW_FRONTEND_URL", "http://localhost:3000"),
        from_email: env_string("MEADOW_FROM_EMAIL", "hello@meadow.local"),
        sendgrid_api_key: env_string("MEADOW_SENDGRID_API_KEY", ""),
        invitation_exp_hours: env_string("MEADOW_INVITATION_EXP_HOURS", "72").parse()?,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meadow=debug,tower_http=debug".into()),
        )
        .init();

    let cfg = load_config()?;

    // Init database
    let db = meadow_db::Database::open(&PathBuf::from(&cfg.db_path))?;

    // Outbound mail; anything but production stays in sandbox mode.
    let mailer = Arc::new(SendGridMailer::new(
        cfg.sendgrid_api_key.clone(),
        cfg.from_email.clone(),
    ));

    let state: AppState = Arc::new(AppStateInner {
        db,
        mailer,
        config: ApiConfig {
            env: cfg.env.clone(),
            frontend_url: cfg.frontend_url.clone(),
            invitation_ttl: Duration::from_secs(cfg.invitation_exp_hours * 3600),
            sandbox_mail: cfg.env != "production",
        },
    });

    let v1 = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/users/activate/{token}", put(auth::activate))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}/follow", put(users::follow))
        .route("/users/{id}/unfollow", put(users::unfollow))
        .route("/users/{id}/feed", get(posts::feed))
        .route("/posts", post(posts::create_post))
        .route(
            "/posts/{id}",
            get(posts::get_post)
                .patch(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/posts/{id}/comments", post(comments::create_comment));

    let app = Router::new()
        .route("/health", get(health))
        .nest("/v1", v1)
        .with_state(state)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    info!("Meadow server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "env": state.config.env,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
