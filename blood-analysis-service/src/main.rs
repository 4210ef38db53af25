use blood_analysis::AnalysisConfig;
use blood_analysis_service::create_app;
use tokio::net::TcpListener;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = AnalysisConfig::from_env();
    if !config.has_fallback_key() {
        warn!("OPENROUTER_API_KEY is not set; requests without a personal OpenAI key will be rejected by the fallback provider");
    }
    info!("Provider configuration: {:?}", config);

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .unwrap_or(3000);

    let app = create_app(config);
    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    let addr = listener.local_addr()?;

    info!("Blood Test Analysis Service starting on {}", addr);
    info!("Health check endpoint: http://{}/health", addr);
    info!("Text analysis endpoint: POST http://{}/api/analyze", addr);
    info!("Image analysis endpoint: POST http://{}/api/analyze/image", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
