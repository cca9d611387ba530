use std::sync::Arc;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use intranet::{
    api::{self, state::AppState},
    config::Settings,
    service::ServiceContext,
    MIGRATOR,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "intranet=debug,tower_http=debug,axum=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    if settings.auth.secret_key == Settings::default().auth.secret_key && !settings.server.debug {
        tracing::warn!("Running with the default secret key outside debug mode; set INTRANET__AUTH__SECRET_KEY");
    }

    tracing::info!("Starting ACJogos-RJ intranet on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    MIGRATOR.run(&db_pool).await?;

    // Create service context
    let service_context = Arc::new(ServiceContext::from_settings(db_pool.clone(), &settings)?);

    match service_context.auth_service.cleanup_expired_sessions().await {
        Ok(0) => {}
        Ok(n) => tracing::info!("Removed {} expired sessions", n),
        Err(e) => tracing::warn!("Failed to clean up expired sessions: {}", e),
    }

    match service_context.member_repo.has_staff().await {
        Ok(false) => tracing::warn!(
            "No staff account yet; create one with `seed createsuperuser --username <u> --email <e> --password <p>`"
        ),
        Ok(true) => {}
        Err(e) => tracing::warn!("Failed to check for staff accounts: {}", e),
    }

    let app_state = AppState::new(service_context, Arc::new(settings.clone()));
    let app = api::create_app(app_state);

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}
