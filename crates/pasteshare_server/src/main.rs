//! PasteShare API server entrypoint.

use pasteshare_core::DEFAULT_PORT;
use pasteshare_server::{serve_router, AppState, Config, Database};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pasteshare=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        None => {}
        Some("--help") => {
            print_help();
            return Ok(());
        }
        Some(other) => {
            anyhow::bail!(
                "Unknown argument: '{}'. Use --help to see supported options.",
                other
            );
        }
    }

    let config = Config::from_env();
    let database = Database::new(&config.db_path)?;
    let state = AppState::new(config.clone(), database)?;
    tracing::info!(
        "Storing entries in {} and blobs in {}",
        config.db_path,
        config.blob_dir
    );

    let sweeper = state.orphan_sweeper().start(config.sweep_interval());

    let allow_public = pasteshare_server::config::env_flag_enabled("ALLOW_PUBLIC_ACCESS");
    if allow_public {
        tracing::warn!("Public access enabled - server will accept requests from any origin");
    }

    let bind_addr = pasteshare_server::resolve_bind_address(&config, allow_public);
    if !bind_addr.ip().is_loopback() {
        tracing::warn!(
            "Binding to non-localhost address: {} - ensure proper security measures are in place",
            bind_addr
        );
    }

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let actual_addr = listener.local_addr().unwrap_or(bind_addr);
    tracing::info!("PasteShare running at http://{}", actual_addr);

    let serve_result = serve_router(listener, state, allow_public, shutdown_signal()).await;
    drop(sweeper);
    tracing::info!("PasteShare stopped");

    serve_result?;
    Ok(())
}

fn print_help() {
    println!("PasteShare Server\n");
    println!("Usage: pasteshare [--help]\n");
    println!("Environment variables:");
    println!("  DB_PATH               Entry database directory (default: ~/.cache/pasteshare/db)");
    println!("  BLOB_DIR              Attachment directory (default: ~/.cache/pasteshare/uploads)");
    println!("  PORT                  Server port (default: {})", DEFAULT_PORT);
    println!(
        "  BIND                  Override bind address (e.g. 0.0.0.0:{})",
        DEFAULT_PORT
    );
    println!("  PUBLIC_BASE_URL       Base for signed blob links (default: http://localhost:PORT)");
    println!("  URL_SIGNING_KEY       Secret for signed blob links (default: random per start)");
    println!("  MAX_SNIPPET_LENGTH    Characters per snippet (default: 30000)");
    println!("  MAX_SNIPPET_COUNT     Snippets per paste (default: 10)");
    println!("  MAX_ATTACHMENT_BYTES  Bytes per image (default: 10MB)");
    println!("  MAX_ATTACHMENT_COUNT  Images per paste (default: 3)");
    println!("  SWEEP_INTERVAL_SECS   Orphan sweep interval (default: 600)");
    println!("  SWEEP_GRACE_SECS      Minimum blob age before sweeping (default: 600)");
    println!("  SIGNED_URL_TTL_SECS   Signed link lifetime (default: 300)");
    println!("  ALLOW_PUBLIC_ACCESS   Allow CORS from any origin");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
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
    tracing::info!("Shutdown signal received");
}
