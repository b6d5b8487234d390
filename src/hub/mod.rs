//! Connection registry.
//!
//! The registry map is owned by a single coordinating task. Every mutation and
//! delivery is a command on one bounded queue, handled strictly in arrival order, so
//! a `register` followed by a `send_to_user` always sees the new connection. Nothing
//! outside the task touches the map.
//!
//! Room membership and public keys live in [`crate::chat::ChatHub`] behind a
//! read/write lock instead: that state is read on every room send and rarely written.

mod connection;

pub use connection::{Connection, FrameReceiver, TrySendError};

use crate::protocol::{Frame, PushEnvelope, PushType};
use crate::types::{ConnectionId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

/// Snapshot of registry size
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HubStats {
    pub online_users: usize,
    pub connections: usize,
}

enum Target {
    User(UserId),
    Users(Vec<UserId>),
    All,
}

enum Query {
    ConnectionsOf(UserId, oneshot::Sender<Vec<ConnectionId>>),
    OnlineUsers(oneshot::Sender<Vec<UserId>>),
    Stats(oneshot::Sender<HubStats>),
}

enum Command {
    Register(Connection),
    Unregister {
        user_id: UserId,
        connection_id: ConnectionId,
    },
    Deliver {
        target: Target,
        frame: Frame,
    },
    Query(Query),
}

/// Handle to the registry task. Cheap to clone; the task stops when the last handle is dropped.
#[derive(Clone)]
pub struct Hub {
    commands: mpsc::Sender<Command>,
}

impl Hub {
    /// Spawn the coordinating task with a command queue of `queue_depth` entries
    pub fn spawn(queue_depth: usize) -> Self {
        let (commands, rx) = mpsc::channel(queue_depth.max(1));
        tokio::spawn(run(rx));
        Self { commands }
    }

    async fn submit(&self, command: Command) {
        if self.commands.send(command).await.is_err() {
            tracing::warn!("Hub task has stopped, dropping command");
        }
    }

    /// Make `connection` a delivery target for subsequent sends to its user
    pub async fn register(&self, connection: Connection) {
        self.submit(Command::Register(connection)).await;
    }

    /// Remove a connection. Unknown or already evicted connections are ignored.
    pub async fn unregister(&self, user_id: UserId, connection_id: ConnectionId) {
        self.submit(Command::Unregister {
            user_id,
            connection_id,
        })
        .await;
    }

    /// Push `{type, payload}` to every live connection of `user_id`.
    ///
    /// Waits only while the hub's own queue is full. Users without connections are skipped.
    pub async fn send_to_user<T: Serialize>(&self, user_id: UserId, kind: PushType, payload: &T) {
        if let Some(frame) = encode(kind, payload) {
            self.send_frame(vec![user_id], frame).await;
        }
    }

    /// Push `{type, payload}` to every connected user
    pub async fn broadcast_all<T: Serialize>(&self, kind: PushType, payload: &T) {
        if let Some(frame) = encode(kind, payload) {
            self.submit(Command::Deliver {
                target: Target::All,
                frame,
            })
            .await;
        }
    }

    /// Push an already encoded frame to each of `user_ids`
    pub async fn send_frame(&self, mut user_ids: Vec<UserId>, frame: Frame) {
        let target = match user_ids.len() {
            0 => return,
            1 => Target::User(user_ids.remove(0)),
            _ => Target::Users(user_ids),
        };
        self.submit(Command::Deliver { target, frame }).await;
    }

    async fn query<R: Default>(&self, make: impl FnOnce(oneshot::Sender<R>) -> Query) -> R {
        let (tx, rx) = oneshot::channel();
        self.submit(Command::Query(make(tx))).await;
        rx.await.unwrap_or_default()
    }

    /// Ids of the user's live connections
    pub async fn connections_of(&self, user_id: UserId) -> Vec<ConnectionId> {
        self.query(|tx| Query::ConnectionsOf(user_id, tx)).await
    }

    /// Users with at least one live connection
    pub async fn online_users(&self) -> Vec<UserId> {
        self.query(Query::OnlineUsers).await
    }

    pub async fn stats(&self) -> HubStats {
        self.query(Query::Stats).await
    }
}

fn encode<T: Serialize>(kind: PushType, payload: &T) -> Option<Frame> {
    match PushEnvelope::new(kind, payload).encode() {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::error!(%kind, "Failed to serialize push payload: {}", e);
            None
        }
    }
}

async fn run(mut commands: mpsc::Receiver<Command>) {
    let mut registry = Registry::default();
    tracing::debug!("Hub task started");

    while let Some(command) = commands.recv().await {
        registry.handle(command);
    }

    tracing::debug!("Hub task stopped");
}

/// Live connections per user. Owned exclusively by the hub task.
#[derive(Default)]
struct Registry {
    users: HashMap<UserId, HashMap<ConnectionId, Connection>>,
}

impl Registry {
    fn handle(&mut self, command: Command) {
        match command {
            Command::Register(connection) => self.register(connection),
            Command::Unregister {
                user_id,
                connection_id,
            } => self.unregister(&user_id, &connection_id),
            Command::Deliver { target, frame } => match target {
                Target::User(user_id) => self.deliver(&user_id, &frame),
                Target::Users(user_ids) => {
                    for user_id in &user_ids {
                        self.deliver(user_id, &frame);
                    }
                }
                Target::All => {
                    let user_ids: Vec<UserId> = self.users.keys().copied().collect();
                    for user_id in &user_ids {
                        self.deliver(user_id, &frame);
                    }
                }
            },
            Command::Query(query) => self.answer(query),
        }
    }

    fn register(&mut self, connection: Connection) {
        let user_id = connection.user_id();
        let connection_id = connection.id();
        let connections = self.users.entry(user_id).or_default();
        connections.insert(connection_id, connection);

        tracing::debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            connections = connections.len(),
            "Connection registered"
        );
    }

    fn unregister(&mut self, user_id: &UserId, connection_id: &ConnectionId) {
        let Some(connections) = self.users.get_mut(user_id) else {
            return;
        };
        if connections.remove(connection_id).is_none() {
            return;
        }
        if connections.is_empty() {
            self.users.remove(user_id);
        }

        tracing::debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            "Connection unregistered"
        );
    }

    fn deliver(&mut self, user_id: &UserId, frame: &Frame) {
        let Some(connections) = self.users.get_mut(user_id) else {
            tracing::debug!(user_id = %user_id, "No live connections, dropping push");
            return;
        };

        connections.retain(|connection_id, connection| {
            match connection.try_push(frame.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        user_id = %user_id,
                        connection_id = %connection_id,
                        "Outbound queue full, evicting slow consumer"
                    );
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(
                        user_id = %user_id,
                        connection_id = %connection_id,
                        "Writer gone, removing connection"
                    );
                    false
                }
            }
        });

        if connections.is_empty() {
            self.users.remove(user_id);
        }
    }

    fn answer(&self, query: Query) {
        // Receivers may have given up waiting; nothing to do then
        match query {
            Query::ConnectionsOf(user_id, reply) => {
                let ids = self
                    .users
                    .get(&user_id)
                    .map(|c| c.keys().copied().collect())
                    .unwrap_or_default();
                let _ = reply.send(ids);
            }
            Query::OnlineUsers(reply) => {
                let _ = reply.send(self.users.keys().copied().collect());
            }
            Query::Stats(reply) => {
                let _ = reply.send(HubStats {
                    online_users: self.users.len(),
                    connections: self.users.values().map(HashMap::len).sum(),
                });
            }
        }
    }
}
