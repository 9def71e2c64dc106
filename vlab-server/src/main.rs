//! vlab-server - Thera Virtual Lab service entry point

use anyhow::Result;
use clap::Parser;
use tracing::info;
use vlab_common::config::{prepare_data_dir, resolve_data_dir};
use vlab_common::db::init::init_database;
use vlab_server::{build_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "vlab-server", about = "Thera Virtual Lab HTTP service")]
struct Args {
    /// Data folder holding the SQLite database
    #[arg(long)]
    data_dir: Option<String>,

    /// Port to listen on
    #[arg(long, env = "VLAB_PORT", default_value_t = 5780)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Log build identification immediately for instant startup feedback
    info!("Starting Thera Virtual Lab (vlab-server) v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let data_dir = resolve_data_dir(args.data_dir.as_deref(), "VLAB_DATA_DIR");
    let db_path = prepare_data_dir(&data_dir)?;
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path).await?;

    let state = AppState::new(pool);
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("vlab-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
