//! Axum web server: room directory, device pages, and the relay WebSocket.

pub mod routes;
pub mod ws;

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::routing::get;
use tokio::sync::{RwLock, broadcast};
use tower_http::cors::CorsLayer;

use crate::actors::{Actor, actor_names};
use crate::bus::{BusReceiver, BusSender, BusTx};
use crate::state::SystemState;
use puttlink::{
    ActorState, ActorStatus, ActorStatusResponse, PuttlinkEvent, PuttlinkMessage, RoomActivity,
    RoomActivityKind,
};

const MAX_ACTIVITY: usize = 1000;

fn new_actor(name: String) -> ActorStatusResponse {
    ActorStatusResponse {
        name,
        status: ActorStatus::Starting,
        telemetry: HashMap::new(),
    }
}

/// Shared state for the web layer.
pub struct WebState {
    pub root: Arc<SystemState>,
    pub bus_tx: BusTx,
    pub actors: RwLock<HashMap<String, ActorStatusResponse>>,
    pub activity: RwLock<VecDeque<PuttlinkMessage>>,
    pub addr: SocketAddr,
    pub actor_id: String,
    pub ws_count: AtomicU64,
    pub request_count: AtomicU64,
    pub relayed_count: AtomicU64,
    pub dropped_count: AtomicU64,
}

impl WebState {
    /// Publish a room directory change on the bus.
    pub fn room_activity(&self, room_id: &str, kind: RoomActivityKind, connected: usize) {
        let _ = self.bus_tx.send(
            PuttlinkMessage::new(RoomActivity {
                room_id: room_id.to_string(),
                kind,
                connected,
            })
            .source(&self.actor_id),
        );
    }
}

fn emit_status(status: ActorStatus, state: &WebState) {
    let counter = |c: &AtomicU64| c.load(Ordering::Relaxed).to_string();
    let mut telemetry = HashMap::from([
        ("bind".into(), state.addr.to_string()),
        ("websockets".into(), counter(&state.ws_count)),
        ("requests".into(), counter(&state.request_count)),
        ("relayed".into(), counter(&state.relayed_count)),
        ("dropped".into(), counter(&state.dropped_count)),
        ("rooms".into(), state.root.relay.room_count().to_string()),
        ("sockets".into(), state.root.relay.socket_count().to_string()),
    ]);
    if status == ActorStatus::Disconnected {
        telemetry.insert("error".into(), "bind failed".into());
    }
    let _ = state
        .bus_tx
        .send(PuttlinkMessage::new(ActorState::new(status, telemetry)).source(&state.actor_id));
}

pub(super) fn emit_telemetry(state: &WebState) {
    emit_status(ActorStatus::Connected, state);
}

// ---------------------------------------------------------------------------
// WebActor
// ---------------------------------------------------------------------------

/// Runs the axum server on a dedicated thread with its own tokio runtime.
pub struct WebActor {
    addr: SocketAddr,
    shutdown_tx: Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
}

impl WebActor {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            shutdown_tx: Mutex::new(None),
        }
    }
}

impl Actor for WebActor {
    fn start(&self, state: Arc<SystemState>, sender: BusSender, _receiver: BusReceiver) {
        let addr = self.addr;
        let actor_id = sender.actor_id().to_string();
        let bus_tx = sender.raw_sender().clone();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        *self.shutdown_tx.lock().unwrap_or_else(|e| e.into_inner()) = Some(shutdown_tx);

        std::thread::Builder::new()
            .name(actor_id.clone())
            .spawn(move || {
                let rt = tokio::runtime::Runtime::new()
                    .expect("failed to create relay server runtime");
                rt.block_on(run(addr, actor_id, state, bus_tx, shutdown_rx));
            })
            .expect("failed to spawn relay server thread");
    }

    fn stop(&self) {
        if let Some(tx) = self
            .shutdown_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            let _ = tx.send(());
        }
    }
}

pub fn router(state: Arc<WebState>) -> Router {
    let counter_state = Arc::clone(&state);
    let count_middleware = axum::middleware::from_fn(move |req, next: axum::middleware::Next| {
        let st = Arc::clone(&counter_state);
        async move {
            st.request_count.fetch_add(1, Ordering::Relaxed);
            next.run(req).await
        }
    });

    Router::new()
        .route("/", get(routes::get_index))
        .route("/create-room", get(routes::get_create_room))
        .route("/rooms", get(routes::get_rooms))
        .route("/game", get(routes::get_display))
        .route("/controller", get(routes::get_controller))
        .route("/api/status", get(routes::get_status))
        .route("/api/activity", get(routes::get_activity))
        .route("/ws", get(ws::ws_upgrade))
        .layer(count_middleware)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until shutdown is signalled.
async fn run(
    addr: SocketAddr,
    actor_id: String,
    root: Arc<SystemState>,
    bus_tx: BusTx,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    let names = actor_names(&root.system.snapshot());
    let actors = names
        .into_iter()
        .map(|(id, name)| (id, new_actor(name)))
        .collect();

    let state = Arc::new(WebState {
        root,
        bus_tx: bus_tx.clone(),
        actors: RwLock::new(actors),
        activity: RwLock::new(VecDeque::with_capacity(MAX_ACTIVITY)),
        addr,
        actor_id,
        ws_count: AtomicU64::new(0),
        request_count: AtomicU64::new(0),
        relayed_count: AtomicU64::new(0),
        dropped_count: AtomicU64::new(0),
    });

    tokio::spawn(state_updater(Arc::clone(&state), bus_tx.subscribe()));

    let telemetry_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));
        loop {
            interval.tick().await;
            emit_telemetry(&telemetry_state);
        }
    });

    let app = router(Arc::clone(&state));

    let mut shutdown_rx = shutdown_rx;
    let listener = loop {
        match tokio::net::TcpListener::bind(addr).await {
            Ok(l) => break l,
            Err(e) => {
                tracing::warn!("relay server: failed to bind {addr}: {e}, retrying in 3s");
                emit_status(ActorStatus::Disconnected, &state);
                tokio::select! {
                    _ = tokio::time::sleep(std::time::Duration::from_secs(3)) => continue,
                    _ = &mut shutdown_rx => return,
                }
            }
        }
    };

    tracing::info!("relay server listening on {addr}");
    emit_status(ActorStatus::Connected, &state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async { drop(shutdown_rx.await) })
        .await
        .ok();
}

/// Keeps the cached actor table and activity log current.
async fn state_updater(state: Arc<WebState>, mut bus_rx: broadcast::Receiver<PuttlinkMessage>) {
    loop {
        match bus_rx.recv().await {
            Ok(msg) => apply_bus_event(&state, msg).await,
            Err(broadcast::error::RecvError::Closed) => break,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("status updater: lagged, dropped {n} events");
            }
        }
    }
}

async fn apply_bus_event(state: &WebState, msg: PuttlinkMessage) {
    match &msg.event {
        PuttlinkEvent::ActorStatus(update) => {
            let mut actors = state.actors.write().await;
            let actor = actors
                .entry(msg.source.clone())
                .or_insert_with(|| new_actor(String::new()));
            actor.status = update.status;
            actor.telemetry = update.telemetry.clone();
        }
        PuttlinkEvent::RoomActivity(_) | PuttlinkEvent::Alert(_) => {
            let mut activity = state.activity.write().await;
            if activity.len() >= MAX_ACTIVITY {
                activity.pop_front();
            }
            activity.push_back(msg);
        }
    }
}
