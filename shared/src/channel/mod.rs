//! Channel message types.
//!
//! These types are shared between `bridge-server` and its clients and are
//! used for both in-process (memory) and network (TCP) transports. One
//! `ChannelMessage` carries one event: a handshake, a method call, a method
//! result, or a connection-state broadcast.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use uuid::Uuid;

pub mod codec;
pub mod payload;
pub mod transport;
pub use codec::{CodecError, read_message, write_message};
pub use payload::*;
pub use transport::{MemoryTransport, TcpTransport, Transport};

/// Protocol version carried in the handshake.
pub const PROTOCOL_VERSION: u16 = 1;

/// Channel event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Client introduction, sent once after connecting
    Handshake = 0,
    /// Named operation with an argument map
    MethodCall = 1,
    /// Reply to a method call, correlated by the call's request id
    MethodResult = 2,
    /// Connection-state broadcast
    StateEvent = 3,
}

impl TryFrom<u8> for EventType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EventType::Handshake),
            1 => Ok(EventType::MethodCall),
            2 => Ok(EventType::MethodResult),
            3 => Ok(EventType::StateEvent),
            _ => Err(()),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Handshake => write!(f, "handshake"),
            EventType::MethodCall => write!(f, "method_call"),
            EventType::MethodResult => write!(f, "method_result"),
            EventType::StateEvent => write!(f, "state_event"),
        }
    }
}

/// Channel message envelope.
///
/// `request_id` identifies the message itself; `correlation_id` links a
/// `MethodResult` back to the `MethodCall` it answers. The payload is the
/// JSON-serialized body for the event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub request_id: Uuid,
    pub event_type: EventType,
    pub correlation_id: Option<Uuid>,
    pub payload: Vec<u8>,
}

impl ChannelMessage {
    pub fn new(event_type: EventType, payload: Vec<u8>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            event_type,
            correlation_id: None,
            payload,
        }
    }

    /// Set the correlation id (used on `MethodResult` replies).
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Create a handshake message.
    pub fn handshake(payload: &HandshakePayload) -> Self {
        Self::new(
            EventType::Handshake,
            serde_json::to_vec(payload).expect("Failed to serialize handshake payload"),
        )
    }

    /// Create a method call message.
    pub fn method_call(payload: &MethodCallPayload) -> Self {
        Self::new(
            EventType::MethodCall,
            serde_json::to_vec(payload).expect("Failed to serialize method call"),
        )
    }

    /// Create a method result answering the call with id `correlation_id`.
    pub fn method_result(payload: &MethodResultPayload, correlation_id: Uuid) -> Self {
        Self::new(
            EventType::MethodResult,
            serde_json::to_vec(payload).expect("Failed to serialize method result"),
        )
        .with_correlation_id(correlation_id)
    }

    /// Create a connection-state broadcast.
    pub fn state_event(payload: &StateEventPayload) -> Self {
        Self::new(
            EventType::StateEvent,
            serde_json::to_vec(payload).expect("Failed to serialize state event"),
        )
    }

    /// Parse the payload as the given type.
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }

    pub fn is_result(&self) -> bool {
        matches!(self.event_type, EventType::MethodResult)
    }

    pub fn is_call(&self) -> bool {
        matches!(self.event_type, EventType::MethodCall)
    }
}
