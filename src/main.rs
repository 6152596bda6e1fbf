use rusty_options::config::AppConfig;
use rusty_options::server;
use rusty_options::state::AppState;

#[tokio::main]
async fn main() {
    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("rusty_options starting");

    // Load config
    let cfg = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        max_lattice_steps = cfg.limits.max_lattice_steps,
        max_grid_steps = cfg.limits.max_grid_steps,
        max_surface_work = cfg.limits.max_surface_work,
        max_monte_carlo_work = cfg.limits.max_monte_carlo_work,
        cors_allow_origin = %cfg.cors_allow_origin,
        "compute limits loaded"
    );

    let addr = cfg.bind_addr();
    let app_state = AppState::new(cfg);

    let app = match server::router(app_state) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("router error: {e}");
            std::process::exit(1);
        }
    };

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("bind error: {e}");
            std::process::exit(1);
        });

    tracing::info!("server listening on {addr}");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("server error: {e}");
    }

    tracing::info!("rusty_options shut down");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
