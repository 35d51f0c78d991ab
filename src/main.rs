// src/main.rs
use fit_check::api;
use fit_check::config::AppConfig;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(err) = dotenvy::dotenv() {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("⚠️ Could not load .env: {}", err);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let app_config = AppConfig::from_env();
    let api_config = app_config.api.clone();
    let settings = app_config.containment.clone();

    info!("🚀 Fit check service starting...");
    let session = match settings.build_session() {
        Ok(session) => session,
        Err(err) => {
            error!("❌ Could not build the fit session: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = api::start_api_server(api_config, settings, session).await {
        error!("❌ API server terminated with an error: {}", err);
        std::process::exit(1);
    }
}
