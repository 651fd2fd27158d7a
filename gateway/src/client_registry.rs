// gateway/src/client_registry.rs
use actix::{Message, Recipient};
use common::ServerMessage;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Delivered to a live client connection
#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub enum Notice {
    Send(ServerMessage),
    Disconnect,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Unable to find client to ack.")]
    NotFound,

    #[error("client {0} is not accepting messages")]
    Undeliverable(Uuid),
}

/// A live, authenticated push connection
pub struct Client {
    pub id: Uuid,
    token: String,
    connection: Recipient<Notice>,
}

impl Client {
    /// Non-blocking: a full or closed mailbox fails immediately
    fn deliver(&self, notice: Notice) -> Result<(), RegistryError> {
        self.connection
            .try_send(notice)
            .map_err(|_| RegistryError::Undeliverable(self.id))
    }
}

/// Tracks live client connections keyed by session token.
///
/// Every mutation and iteration happens under one mutex. Deliveries use the
/// connection's mailbox via `try_send`, so holding the lock never waits on a
/// slow client.
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<Vec<Client>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Client>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection whose token has already been validated
    pub fn register(&self, token: impl Into<String>, connection: Recipient<Notice>) -> Uuid {
        let id = Uuid::new_v4();
        let mut clients = self.lock();
        clients.push(Client {
            id,
            token: token.into(),
            connection,
        });
        tracing::info!(client_id = %id, "- {} attached client(s)", clients.len());
        id
    }

    pub fn unregister(&self, id: Uuid) -> bool {
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|c| c.id != id);
        let removed = clients.len() != before;
        if removed {
            tracing::info!(client_id = %id, "- {} attached client(s)", clients.len());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Acknowledge a command to the connection holding `token`
    pub fn send_ack(&self, token: &str, command: &str) -> Result<(), RegistryError> {
        let clients = self.lock();
        let client = clients
            .iter()
            .find(|c| c.token == token)
            .ok_or(RegistryError::NotFound)?;
        client.deliver(Notice::Send(ServerMessage::ack(command)))
    }

    /// Tell every connection to refresh. Failures are logged per client and
    /// never stop delivery to the rest. Returns the number delivered.
    pub fn broadcast_refresh(&self) -> usize {
        let clients = self.lock();
        let mut delivered = 0;
        for client in clients.iter() {
            match client.deliver(Notice::Send(ServerMessage::Refresh)) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::error!("Unable to write to socket: {}", e),
            }
        }
        tracing::debug!("Refresh delivered to {}/{} client(s)", delivered, clients.len());
        delivered
    }

    /// Close every connection and empty the registry. Returns the number of
    /// connections told to close.
    pub fn teardown(&self) -> usize {
        let clients: Vec<Client> = self.lock().drain(..).collect();
        tracing::info!("Stopping client hub ({} attached client(s)).", clients.len());
        let mut closed = 0;
        for client in clients {
            match client.deliver(Notice::Disconnect) {
                Ok(()) => closed += 1,
                Err(e) => tracing::warn!("Unable to close socket: {}", e),
            }
        }
        closed
    }
}
