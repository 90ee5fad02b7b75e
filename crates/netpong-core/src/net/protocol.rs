use super::messages::{ClientMessage, ServerMessage, StateMsg};

/// Path on which the server (and the relay) accept game sockets.
pub const WS_PATH: &str = "/ws";

/// Maximum accepted frame size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

fn check_size(text: &str) -> Result<(), ProtocolError> {
    if text.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(text.len()));
    }
    Ok(())
}

/// Encode a `ClientMessage` as a JSON text frame.
pub fn encode_client_message(msg: &ClientMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

/// Encode a `ServerMessage` as a JSON text frame.
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

/// Decode a JSON text frame into a `ClientMessage`.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    check_size(text)?;
    serde_json::from_str(text).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode a JSON text frame into a `ServerMessage`.
pub fn decode_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    check_size(text)?;
    serde_json::from_str(text).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Receiver-side filter that discards snapshots older than the newest seen.
#[derive(Debug, Default)]
pub struct SeqGate {
    last_seq: Option<u64>,
}

impl SeqGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `snapshot` should be rendered. Equal `seq` is accepted
    /// so the on-join snapshot and the following tick may share a number.
    pub fn accept(&mut self, snapshot: &StateMsg) -> bool {
        match self.last_seq {
            Some(last) if snapshot.seq < last => false,
            _ => {
                self.last_seq = Some(snapshot.seq);
                true
            },
        }
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }
}
