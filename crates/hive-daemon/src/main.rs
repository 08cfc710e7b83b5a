//! hive-daemon: the hive signaling server.
//!
//! Single OS process running a Tokio async runtime. Peers connect over
//! WebSocket; the store is one SQLite file in the data directory.

mod config;

use std::sync::Arc;

use hive_tracker::Tracker;
use hive_transport::{AppState, SessionTable};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::config::DaemonConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config (before logging, which reads the level from it)
    let config = DaemonConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("hive={}", config.logging.log_level).parse()?),
        )
        .init();

    info!("Hive daemon starting");

    // Ensure data directory exists
    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open database
    let db_path = config.db_path();
    let db = hive_tracker::store(hive_db::open(&db_path)?);
    info!("Database opened at {:?}", db_path);

    // 3. Wire tracker to the session table
    let sessions = Arc::new(SessionTable::new());
    let tracker = Tracker::new(db, sessions.clone(), sessions.clone());

    // 4. Clear peers left active by a previous run, before any session exists
    tracker.reconciler.startup_sweep().await?;

    // 5. Create shutdown channel
    let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

    // 6. Start periodic reconciliation
    let reconciler = tracker.reconciler.clone();
    let interval = config.reconcile_interval();
    let sweep_shutdown = shutdown_tx.subscribe();
    let sweep_task = tokio::spawn(async move {
        reconciler.run_periodic(interval, sweep_shutdown).await;
    });
    info!("Periodic reconciliation every {:?}", interval);

    // 7. Bind and serve until Ctrl-C or server failure
    let listener = TcpListener::bind(&config.server.listen_addr).await?;
    let state = AppState::new(tracker, sessions, config.transport());
    let mut server = tokio::spawn(hive_transport::serve(listener, state, shutdown_tx.subscribe()));

    let server_exited = tokio::select! {
        result = &mut server => {
            log_server_exit(result);
            true
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
            false
        }
    };

    // Graceful shutdown
    info!("Daemon shutting down gracefully");
    let _ = shutdown_tx.send(());
    if !server_exited {
        log_server_exit(server.await);
    }
    if let Err(e) = sweep_task.await {
        error!("Reconciliation task failed: {}", e);
    }

    info!("Daemon stopped");
    Ok(())
}

fn log_server_exit(result: Result<anyhow::Result<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Server error: {}", e),
        Err(e) => error!("Server task failed: {}", e),
    }
}
