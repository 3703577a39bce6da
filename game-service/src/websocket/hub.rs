use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use shared::ConnectionId;
use tokio::sync::mpsc;

use crate::coordinator::{Broadcaster, ServerMessage};

#[derive(Default)]
struct HubState {
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>,
    groups: HashMap<String, HashSet<ConnectionId>>,
}

/// Live connections and the session groups they belong to. Each connection
/// owns an unbounded outbound channel drained by its writer task.
#[derive(Default)]
pub struct ConnectionHub {
    state: RwLock<HubState>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connection_id: ConnectionId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.write().connections.insert(connection_id, tx);
        tracing::debug!(connection_id = %connection_id, "Connection registered");
        rx
    }

    /// Removes the connection and every group membership it held.
    pub fn unregister(&self, connection_id: ConnectionId) {
        let mut state = self.write();
        state.connections.remove(&connection_id);
        state.groups.retain(|_, members| {
            members.remove(&connection_id);
            !members.is_empty()
        });
        tracing::debug!(connection_id = %connection_id, "Connection unregistered");
    }

    pub fn connection_count(&self) -> usize {
        self.read().connections.len()
    }

    pub fn group_size(&self, group: &str) -> usize {
        self.read().groups.get(group).map_or(0, HashSet::len)
    }

    // A poisoned lock only means another connection task panicked mid-update;
    // the maps themselves stay consistent.
    fn read(&self) -> RwLockReadGuard<'_, HubState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HubState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Broadcaster for ConnectionHub {
    fn is_live(&self, connection_id: ConnectionId) -> bool {
        self.read()
            .connections
            .get(&connection_id)
            .is_some_and(|tx| !tx.is_closed())
    }

    fn join_group(&self, connection_id: ConnectionId, group: &str) {
        let mut state = self.write();
        if !state.connections.contains_key(&connection_id) {
            return;
        }
        state
            .groups
            .entry(group.to_string())
            .or_default()
            .insert(connection_id);
    }

    fn leave_group(&self, connection_id: ConnectionId, group: &str) {
        let mut state = self.write();
        if let Some(members) = state.groups.get_mut(group) {
            members.remove(&connection_id);
            if members.is_empty() {
                state.groups.remove(group);
            }
        }
    }

    fn send_to(&self, connection_id: ConnectionId, message: ServerMessage) {
        let state = self.read();
        match state.connections.get(&connection_id) {
            Some(tx) => {
                if tx.send(message).is_err() {
                    tracing::debug!(connection_id = %connection_id, "Dropping message for closed connection");
                }
            }
            None => {
                tracing::debug!(connection_id = %connection_id, "Dropping message for unknown connection");
            }
        }
    }

    fn broadcast(&self, group: &str, message: ServerMessage) {
        let state = self.read();
        let Some(members) = state.groups.get(group) else {
            return;
        };
        for connection_id in members {
            if let Some(tx) = state.connections.get(connection_id) {
                let _ = tx.send(message.clone());
            }
        }
    }
}
