use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use club_portal::{
    auth::{AdminCredentials, SessionKeys},
    config::Config,
    email::{Mailer, OutboxMailer, SmtpMailer},
    registration::Registrar,
    store::{postgres::connect_to_db, MemoryStore, PgStore, Store},
    AppState,
};
use envconfig::Envconfig;
use std::{sync::Arc, time::Duration};
use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(true)
        .init();

    let config = Config::init_from_env().context("failed to load configuration")?;

    let store: Arc<dyn Store> = match &config.db_url {
        Some(db_url) => Arc::new(PgStore::new(connect_to_db(db_url)?)),
        None => {
            tracing::warn!("DATABASE_URL is not set, data will only live in memory");
            Arc::new(MemoryStore::default())
        }
    };
    tracing::info!(backend = store.backend(), "store ready");

    let mailer: Arc<dyn Mailer> = match (&config.email_username, &config.email_password) {
        (Some(username), Some(password)) => {
            let smtp = SmtpMailer::new(
                &config.smtp_relay,
                username,
                password,
                &config.email_from_name,
            )
            .context("invalid email configuration")?;
            if let Err(e) = smtp.sanity_check().await {
                tracing::warn!(
                    error = %e,
                    "email sanity check failed, confirmation emails will not be delivered"
                );
            }
            Arc::new(smtp)
        }
        _ => {
            tracing::warn!("EMAIL_USERNAME/EMAIL_PASSWORD not set, emails are only logged");
            Arc::new(OutboxMailer::default())
        }
    };

    let sessions = SessionKeys::from_base64_secret(
        &config.session_secret,
        Duration::from_secs(config.session_ttl_hours * 60 * 60),
        config.frontend_origin.is_some(),
    )
    .context("SESSION_SECRET is not valid base64")?;
    let admin = AdminCredentials::new(&config.admin_username, &config.admin_password_hash)
        .map_err(|e| anyhow::anyhow!("ADMIN_PASSWORD_HASH is not a valid argon2 hash: {e}"))?;

    let state = AppState {
        registrar: Registrar::new(store, mailer, &config.club_name),
        sessions: Arc::new(sessions),
        admin: Arc::new(admin),
    };

    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = match &config.frontend_origin {
        Some(origin) => CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
            .allow_origin(
                origin
                    .parse::<HeaderValue>()
                    .context("FRONTEND_ORIGIN is not a valid origin")?,
            )
            .allow_credentials(true),
        None => CorsLayer::new()
            .allow_methods(methods)
            .allow_headers(Any)
            .allow_origin(Any),
    };
    let app = club_portal::app(state).layer(cors);

    tracing::info!(port = config.port, "listening");
    axum::Server::bind(&([0, 0, 0, 0], config.port).into())
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
