//! Registry of live browser clients.
//!
//! The [`Hub`] is an actor: one task owns the client map and applies
//! commands in arrival order. Everyone else talks to it through a
//! [`HubHandle`] (or a non-owning [`WeakHubHandle`]), so the map has a
//! single writer and needs no lock.
//!
//! ```text
//!  Client A ─┐  register / unregister / send
//!  Client B ─┼──────────────► [ command channel ] ──► Hub task ──► clients map
//!  Consumer ─┘                                          │
//!                                                       └─► per-client outbound channel
//! ```

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::domain::{ClientId, ConnectionId, OutboundPayload};

/// Errors returned by hub operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HubError {
    #[error("hub is not running")]
    Closed,

    #[error("client {0} is not connected")]
    NotConnected(ClientId),
}

/// Hub-side view of a registered client: where to write its frames.
#[derive(Debug, Clone)]
pub struct ClientEntry {
    pub id: ClientId,
    pub connection_id: ConnectionId,
    pub outbound: mpsc::UnboundedSender<OutboundPayload>,
}

/// Who a sent payload is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Client(ClientId),
    All,
}

enum HubCommand {
    Register(ClientEntry),
    Unregister {
        id: ClientId,
        connection_id: ConnectionId,
    },
    Send {
        target: Target,
        payload: OutboundPayload,
    },
    Deliver {
        to: ClientId,
        payload: OutboundPayload,
        reply: oneshot::Sender<Result<(), HubError>>,
    },
    Count(oneshot::Sender<usize>),
    Lookup(ClientId, oneshot::Sender<Option<ConnectionId>>),
}

/// The registry actor. Create with [`Hub::new`] and drive with [`Hub::run`],
/// or use [`Hub::spawn`].
pub struct Hub {
    clients: HashMap<ClientId, ClientEntry>,
    commands: mpsc::UnboundedReceiver<HubCommand>,
}

impl Hub {
    pub fn new() -> (Self, HubHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Self {
            clients: HashMap::new(),
            commands: rx,
        };
        (hub, HubHandle { commands: tx })
    }

    /// Start the hub on the current runtime.
    pub fn spawn() -> HubHandle {
        let (hub, handle) = Self::new();
        tokio::spawn(hub.run());
        handle
    }

    /// Apply commands until every [`HubHandle`] has been dropped.
    pub async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            self.apply(command);
        }
        tracing::debug!(clients = self.clients.len(), "Hub stopped");
    }

    fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register(entry) => {
                tracing::debug!(
                    client_id = %entry.id,
                    connection_id = %entry.connection_id,
                    "Client registered"
                );
                self.clients.insert(entry.id.clone(), entry);
            }
            HubCommand::Unregister { id, connection_id } => {
                self.unregister(&id, connection_id);
            }
            HubCommand::Send { target, payload } => {
                self.send(target, payload);
            }
            HubCommand::Deliver { to, payload, reply } => {
                let result = if self.clients.contains_key(&to) {
                    self.send(Target::Client(to.clone()), payload);
                    if self.clients.contains_key(&to) {
                        Ok(())
                    } else {
                        Err(HubError::NotConnected(to))
                    }
                } else {
                    Err(HubError::NotConnected(to))
                };
                let _ = reply.send(result);
            }
            HubCommand::Count(reply) => {
                let _ = reply.send(self.clients.len());
            }
            HubCommand::Lookup(id, reply) => {
                let _ = reply.send(self.clients.get(&id).map(|entry| entry.connection_id));
            }
        }
    }

    // Only the socket that owns the entry may remove it; a newer socket
    // registered under the same ID survives the old one's exit.
    fn unregister(&mut self, id: &ClientId, connection_id: ConnectionId) {
        match self.clients.get(id) {
            Some(entry) if entry.connection_id == connection_id => {
                self.clients.remove(id);
                tracing::debug!(client_id = %id, %connection_id, "Client unregistered");
            }
            _ => {}
        }
    }

    fn send(&mut self, target: Target, payload: OutboundPayload) {
        let recipients: Vec<&ClientEntry> = match &target {
            Target::Client(id) => self.clients.get(id).into_iter().collect(),
            Target::All => self.clients.values().collect(),
        };

        if recipients.is_empty() {
            tracing::debug!(?target, "No client to send to");
            return;
        }

        let mut disconnected = Vec::new();
        for entry in recipients {
            if entry.outbound.send(payload.clone()).is_err() {
                disconnected.push((entry.id.clone(), entry.connection_id));
            }
        }

        for (id, connection_id) in disconnected {
            tracing::warn!(client_id = %id, "Outbound write failed, dropping client");
            self.unregister(&id, connection_id);
        }
    }
}

/// Owning handle to a running [`Hub`]. The hub stops once all are dropped.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    /// Insert or overwrite the client under its ID.
    pub fn register(&self, entry: ClientEntry) -> Result<(), HubError> {
        self.dispatch(HubCommand::Register(entry))
    }

    /// Remove the client if it is still registered by this connection.
    /// Unknown IDs are ignored.
    pub fn unregister(&self, id: ClientId, connection_id: ConnectionId) -> Result<(), HubError> {
        self.dispatch(HubCommand::Unregister { id, connection_id })
    }

    /// Queue `payload` for the target(s). Does not wait for delivery.
    pub fn send(&self, target: Target, payload: OutboundPayload) -> Result<(), HubError> {
        self.dispatch(HubCommand::Send { target, payload })
    }

    /// Hand `payload` to the client registered as `to`, waiting for the hub
    /// to confirm the client exists and its outbound channel is open.
    pub async fn deliver(&self, to: ClientId, payload: OutboundPayload) -> Result<(), HubError> {
        let (reply, response) = oneshot::channel();
        self.dispatch(HubCommand::Deliver { to, payload, reply })?;
        response.await.map_err(|_| HubError::Closed)?
    }

    /// Number of registered clients.
    pub async fn client_count(&self) -> Result<usize, HubError> {
        let (reply, response) = oneshot::channel();
        self.dispatch(HubCommand::Count(reply))?;
        response.await.map_err(|_| HubError::Closed)
    }

    /// Connection currently registered under `id`, if any.
    pub async fn lookup(&self, id: &ClientId) -> Result<Option<ConnectionId>, HubError> {
        let (reply, response) = oneshot::channel();
        self.dispatch(HubCommand::Lookup(id.clone(), reply))?;
        response.await.map_err(|_| HubError::Closed)
    }

    /// Non-owning handle for clients.
    pub fn downgrade(&self) -> WeakHubHandle {
        WeakHubHandle {
            commands: self.commands.downgrade(),
        }
    }

    fn dispatch(&self, command: HubCommand) -> Result<(), HubError> {
        self.commands.send(command).map_err(|_| HubError::Closed)
    }
}

/// Handle that does not keep the hub alive.
#[derive(Clone)]
pub struct WeakHubHandle {
    commands: mpsc::WeakUnboundedSender<HubCommand>,
}

impl WeakHubHandle {
    /// Returns `None` once the hub has shut down.
    pub fn upgrade(&self) -> Option<HubHandle> {
        self.commands
            .upgrade()
            .map(|commands| HubHandle { commands })
    }
}
