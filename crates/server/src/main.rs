use std::sync::Arc;

use anyhow::{Context, Result};
use chatbi_core::TableSchema;
use collaborators::{DemoQueryExecutor, LlmAgents, LlmClient, SqliteQueryExecutor};
use db::SessionRepository;
use events::EventBus;
use orchestrator::collaborators::QueryExecutor;
use orchestrator::{CollaboratorRegistry, Orchestrator};
use server::config::AppConfig;
use server::{create_router, state::AppState};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server=info,orchestrator=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    if config.llm.api_key.is_none() {
        warn!("No API key configured (CHATBI_API_KEY), LLM requests will likely be rejected");
    }

    let (executor, catalog) = data_source(&config).await?;
    info!(tables = catalog.len(), "Schema catalog ready");

    let agents = Arc::new(LlmAgents::new(LlmClient::new(config.llm_config())));
    let registry = CollaboratorRegistry::from_agents(agents, executor);

    let event_bus = EventBus::new();
    let mut orchestrator = Orchestrator::new(config.orchestrator_config(), registry)
        .context("Failed to build orchestrator")?
        .with_catalog(Arc::new(catalog))
        .with_event_bus(event_bus.clone());

    let mut state_repository = None;
    if let Some(audit_url) = &config.database.audit_url {
        let pool = db::create_pool(audit_url)
            .await
            .with_context(|| format!("Failed to open audit database {}", audit_url))?;
        db::run_migrations(&pool)
            .await
            .context("Failed to run audit migrations")?;
        let repository = Arc::new(SessionRepository::new(pool));
        orchestrator = orchestrator.with_session_repo(Arc::clone(&repository));
        state_repository = Some(repository);
        info!(url = %audit_url, "Session audit log enabled");
    }

    let mut state = AppState::new(orchestrator, event_bus);
    if let Some(repository) = state_repository {
        state = state.with_session_repository(repository);
    }

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address()))?;
    info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Query executor and schema catalog. Without a database the demo
/// product/sales data is served.
async fn data_source(config: &AppConfig) -> Result<(Arc<dyn QueryExecutor>, Vec<TableSchema>)> {
    match &config.database.url {
        Some(url) => {
            let mut executor = SqliteQueryExecutor::connect(url)
                .await
                .with_context(|| format!("Failed to open database {}", url))?;
            if let Some(max_rows) = config.database.max_rows {
                executor = executor.with_max_rows(max_rows);
            }
            let catalog = if config.tables.is_empty() {
                executor
                    .load_catalog()
                    .await
                    .context("Failed to introspect database schema")?
            } else {
                config.tables.clone()
            };
            info!(url = %url, "Answering questions from database");
            let executor: Arc<dyn QueryExecutor> = Arc::new(executor);
            Ok((executor, catalog))
        }
        None => {
            warn!("No database configured, running in demo mode");
            let catalog = if config.tables.is_empty() {
                vec![TableSchema::new("products")
                    .with_description("Demo product sales")
                    .with_column("product_name", "TEXT")
                    .with_column("sales", "REAL")]
            } else {
                config.tables.clone()
            };
            let executor: Arc<dyn QueryExecutor> = Arc::new(DemoQueryExecutor);
            Ok((executor, catalog))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
