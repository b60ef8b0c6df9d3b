//! Actor trait and config-driven actor resolution.

pub mod mock;
pub mod web;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::bus::{BusReceiver, BusSender, BusTx};
use crate::state::SystemState;
use crate::state::config::{PuttlinkConfig, global_id};

/// A self-managed actor. `start()` clones what it needs and spawns its own
/// thread; the shutdown flag reaches it through `BusReceiver::is_shutdown()`.
pub trait Actor: Send + Sync {
    fn start(&self, state: Arc<SystemState>, sender: BusSender, receiver: BusReceiver);

    fn stop(&self) {}
}

pub struct ResolvedActor {
    pub id: String,
    pub name: String,
    pub actor: Box<dyn Actor>,
}

/// Build every configured actor. Sections with bad addresses or missing
/// rooms are logged and skipped.
pub fn resolve_actors(config: &PuttlinkConfig) -> Vec<ResolvedActor> {
    let mut actors = Vec::new();

    for (index, ws) in &config.webserver {
        let id = global_id("webserver", index);
        match ws.bind.parse::<SocketAddr>() {
            Ok(addr) => actors.push(ResolvedActor {
                id,
                name: ws.name.clone(),
                actor: Box::new(web::WebActor::new(addr)),
            }),
            Err(e) => {
                tracing::warn!("webserver '{id}': invalid bind address '{}': {e}", ws.bind);
            }
        }
    }

    // displays first so a controller's room already has someone listening
    for (index, section) in &config.mock_display {
        let id = global_id("mock_display", index);
        if section.room.is_empty() {
            tracing::warn!("mock display '{id}': no room configured, skipping");
            continue;
        }
        actors.push(ResolvedActor {
            id,
            name: section.name.clone(),
            actor: Box::new(mock::display::MockDisplayActor {
                room: section.room.clone(),
            }),
        });
    }

    for (index, section) in &config.mock_controller {
        let id = global_id("mock_controller", index);
        if section.room.is_empty() {
            tracing::warn!("mock controller '{id}': no room configured, skipping");
            continue;
        }
        actors.push(ResolvedActor {
            id,
            name: section.name.clone(),
            actor: Box::new(mock::controller::MockControllerActor {
                room: section.room.clone(),
                swing_interval_secs: section.swing_interval_secs,
                mode: section.mode,
            }),
        });
    }

    actors
}

/// Wire bus handles for `actor`, start it, and register it.
pub fn start_actor(id: String, actor: Box<dyn Actor>, state: &Arc<SystemState>, bus_tx: &BusTx) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let sender = BusSender::new(id.clone(), bus_tx.clone(), Arc::clone(&shutdown));
    let receiver = sender.subscribe();
    actor.start(Arc::clone(state), sender, receiver);
    state.register_actor(id, actor, shutdown);
}

/// Actor id -> display name, for the status endpoint.
pub fn actor_names(config: &PuttlinkConfig) -> HashMap<String, String> {
    let mut names = HashMap::new();
    for (index, ws) in &config.webserver {
        names.insert(global_id("webserver", index), ws.name.clone());
    }
    for (index, section) in &config.mock_display {
        names.insert(global_id("mock_display", index), section.name.clone());
    }
    for (index, section) in &config.mock_controller {
        names.insert(global_id("mock_controller", index), section.name.clone());
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use puttlink::{MockControllerSection, MockDisplaySection, WebserverSection};

    #[test]
    fn resolves_configured_sections() {
        let mut config = PuttlinkConfig::default();
        config.webserver.insert(
            "bad".into(),
            WebserverSection {
                name: "Broken".into(),
                bind: "not an address".into(),
            },
        );
        config.mock_display.insert(
            "0".into(),
            MockDisplaySection {
                name: "Green".into(),
                room: "lobby001".into(),
            },
        );
        config.mock_controller.insert(
            "0".into(),
            MockControllerSection {
                name: "Phone".into(),
                room: String::new(),
                swing_interval_secs: 8.0,
                mode: Default::default(),
            },
        );

        let mut ids: Vec<_> = resolve_actors(&config).into_iter().map(|a| a.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["mock_display.0", "webserver.0"]);

        let names = actor_names(&config);
        assert_eq!(names["webserver.0"], "Relay Server");
        assert_eq!(names["mock_controller.0"], "Phone");
    }
}
