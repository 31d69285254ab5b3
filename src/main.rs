use std::sync::Arc;

use anyhow::Context;

use quote_intake::config::IntakeConfig;
use quote_intake::intake::{SessionDeps, SessionRegistry, spawn_sweep_task};
use quote_intake::routes::{AppState, quote_routes};
use quote_intake::submission::HttpTransport;
use quote_intake::vehicles::{VehicleDataProvider, VpicClient, catalog_source};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = IntakeConfig::from_env().context("Invalid QUOTE_* configuration")?;

    eprintln!("🚗 Quote Intake v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api/quote", config.port);
    eprintln!("   Events: ws://0.0.0.0:{}/ws/quote/{{id}}", config.port);
    eprintln!("   Catalog: {}", config.catalog_source);
    eprintln!("   Vehicle lookup: {}", config.vpic_base_url);
    eprintln!("   Submissions: {}", config.submission_url);
    eprintln!(
        "   Simulated wait: {}s",
        config.simulation.duration.as_secs()
    );
    eprintln!(
        "   Session idle TTL: {}s\n",
        config.sessions.idle_ttl.as_secs()
    );

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .build()
        .context("Failed to build HTTP client")?;

    let provider = Arc::new(VehicleDataProvider::new(
        Arc::new(VpicClient::new(client.clone(), &config.vpic_base_url)),
        catalog_source(&config.catalog_source, client.clone()),
    ));

    let registry = SessionRegistry::new(
        SessionDeps {
            provider: Arc::clone(&provider),
            transport: Arc::new(HttpTransport::new(client, &config.submission_url)),
            simulation: config.simulation.clone(),
        },
        config.sessions.idle_ttl,
    );
    let _sweep_handle = spawn_sweep_task(Arc::clone(&registry), config.sessions.sweep_interval);

    let app = quote_routes(AppState { registry, provider });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Quote intake server started");
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
