// common/src/messages.rs
use serde::{Deserialize, Serialize};

/// Push notification sent from the gateway to a live client socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// A command request was accepted for processing
    Ack { command: String },
    /// Installed applications changed; clients should re-query
    Refresh,
    /// Keep-alive reply
    Ping,
}

/// Frame received from a client socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Ping,
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    pub fn ack(command: impl Into<String>) -> Self {
        ServerMessage::Ack { command: command.into() }
    }

    pub fn to_json(&self) -> String {
        // Plain enum of strings; serialization cannot fail
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}
