use clap::Parser;
use site_cms::utils::error::ErrorSeverity;
use site_cms::utils::{logger, validation::Validate};
use site_cms::{build_router, open_store, AppConfig, AppState, CliConfig, Result};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    let (mut config, from_file) = match site_cms::config::load_or_default(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("❌ {}", e);
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(3);
        }
    };
    if let Some(bind) = &cli.bind {
        config.server.bind = bind.clone();
    }

    // 初始化日誌
    logger::init_logger(&config.logging.format, cli.verbose);

    tracing::info!("🚀 Starting site-cms v{}", env!("CARGO_PKG_VERSION"));
    if from_file {
        tracing::info!("📄 Configuration loaded from {}", cli.config.display());
    } else {
        tracing::warn!("⚠️  {} not found, using defaults", cli.config.display());
    }
    config.warn_unset_env_vars();

    if let Err(e) = serve(config).await {
        tracing::error!(
            "❌ Server failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low | ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        };
        std::process::exit(exit_code);
    }

    Ok(())
}

async fn serve(config: AppConfig) -> Result<()> {
    // 驗證配置
    config.validate()?;
    let addr = config.bind_addr()?;

    let store = open_store(&config).await?;
    let state = AppState::new(config, store)?;
    state.auth.bootstrap(&state.config.auth).await?;

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("✅ Listening on http://{}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("❌ Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("❌ Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("🛑 Shutdown signal received, draining connections...");
}
