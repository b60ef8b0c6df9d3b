use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

mod actors;
mod bus;
mod state;

use puttlink::{PuttlinkMessage, WebserverSection};
use state::SystemState;

#[derive(Parser, Debug, Clone)]
#[command(name = "puttlink", about = "Two-device mini-golf relay server")]
struct Config {
    /// Config file path (default: ~/.config/puttlink/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the relay server bind address for this run (not persisted)
    #[arg(long)]
    bind: Option<String>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("puttlink=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::debug!("debug logging enabled");

    let cli = Config::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(state::config::default_config_path);
    let state = Arc::new(SystemState::from_path(config_path));
    tracing::info!("config: {}", state.system.path().display());

    // No server configured: enable the default one and persist it.
    if cli.bind.is_none() && state.system.snapshot().webserver.is_empty() {
        state.system.update(|c| {
            c.webserver.insert(
                "0".into(),
                WebserverSection {
                    name: "Relay Server".into(),
                    bind: "0.0.0.0:3030".into(),
                },
            );
        });
    }

    if let Some(bind) = cli.bind {
        state.system.override_in_memory(|c| {
            match c.webserver.values_mut().next() {
                Some(ws) => ws.bind = bind,
                None => {
                    c.webserver.insert(
                        "0".into(),
                        WebserverSection {
                            name: "Relay Server".into(),
                            bind,
                        },
                    );
                }
            }
        });
    }

    let rt = tokio::runtime::Runtime::new()?;
    let _guard = rt.enter();

    // Single unified bus
    let (bus_tx, _) = broadcast::channel::<PuttlinkMessage>(1024);

    let snap = state.system.snapshot();
    let resolved = actors::resolve_actors(&snap);
    if resolved.is_empty() {
        tracing::warn!("no actors configured; nothing to serve");
    }
    for ra in resolved {
        tracing::info!("starting actor '{}' ({})", ra.id, ra.name);
        actors::start_actor(ra.id, ra.actor, &state, &bus_tx);
    }

    // Drain bus (keeps broadcast channel healthy when no other subscriber)
    let mut drain_rx = bus_tx.subscribe();
    let drain_handle = tokio::spawn(async move {
        loop {
            match drain_rx.recv().await {
                Ok(_) => {}
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("drain subscriber lagged, dropped {n} events");
                }
            }
        }
    });

    rt.block_on(async { tokio::signal::ctrl_c().await })?;

    tracing::info!("shutting down...");
    for id in state.actor_ids() {
        state.stop_actor(&id);
    }
    // Drop bus_tx closes the broadcast channel as secondary signal
    drop(bus_tx);
    drain_handle.abort();

    Ok(())
}
