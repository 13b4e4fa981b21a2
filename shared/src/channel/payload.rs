use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::ConnectionState;

// ==================== Handshake ====================

/// Handshake payload (client -> server).
///
/// Carries the client's protocol version so the server can reject
/// incompatible peers before any method traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakePayload {
    /// Protocol version
    pub version: u16,
    /// Client name/identifier
    pub client_name: Option<String>,
    /// Client version
    pub client_version: Option<String>,
}

// ==================== Method calls ====================

/// Method call payload (client -> server).
///
/// One RPC-shaped call: a method name plus an argument map. The names are
/// spelled exactly as application frameworks spell them on this boundary
/// (`getList`, `connectPrinter`, `close`, `printBytes`, ...).
///
/// # Examples
/// - `method`: "connectPrinter", `arguments`: `{ "name": "EPSON TM-T20II" }`
/// - `method`: "printBytes", `arguments`: `{ "bytes": [27, 64, 10] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCallPayload {
    /// Operation name
    pub method: String,
    /// Operation arguments (may be empty)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub arguments: serde_json::Map<String, Value>,
}

impl MethodCallPayload {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            arguments: serde_json::Map::new(),
        }
    }

    pub fn with_arguments(
        method: impl Into<String>,
        arguments: serde_json::Map<String, Value>,
    ) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// Method result payload (server -> client).
///
/// Mirrors the three outcomes a method-call boundary can produce: a value,
/// a delivery error, or "nobody answers to that name".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResultPayload {
    /// The call ran; `value` is whatever the operation returned
    Success {
        #[serde(default)]
        value: Value,
    },
    /// The call could not be carried out at the channel level
    Error {
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    /// No operation is registered under this name
    NotImplemented { method: String },
}

impl MethodResultPayload {
    /// Successful result carrying an arbitrary value.
    pub fn ok(value: impl Into<Value>) -> Self {
        Self::Success {
            value: value.into(),
        }
    }

    /// Successful result carrying a boolean flag, the dominant shape on
    /// this boundary.
    pub fn flag(success: bool) -> Self {
        Self::Success {
            value: Value::Bool(success),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn not_implemented(method: impl Into<String>) -> Self {
        Self::NotImplemented {
            method: method.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented { .. })
    }

    /// The boolean flag of a successful result, if that is what it carries.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Success {
                value: Value::Bool(flag),
            } => Some(*flag),
            _ => None,
        }
    }
}

// ==================== State events ====================

/// Connection-state event payload (server -> all clients).
///
/// Numeric codes, exactly as the original state stream reports them:
/// 0 = none/failed, 1 = connecting, 2 = connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEventPayload {
    pub state: u8,
}

impl From<ConnectionState> for StateEventPayload {
    fn from(state: ConnectionState) -> Self {
        Self {
            state: state.event_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_call_arguments_default_to_empty() {
        let parsed: MethodCallPayload = serde_json::from_str(r#"{"method":"close"}"#).unwrap();
        assert_eq!(parsed.method, "close");
        assert!(parsed.arguments.is_empty());
    }

    #[test]
    fn test_result_status_tagging() {
        let json = serde_json::to_value(MethodResultPayload::flag(false)).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["value"], false);

        let json = serde_json::to_value(MethodResultPayload::not_implemented("frobnicate")).unwrap();
        assert_eq!(json["status"], "not_implemented");
        assert_eq!(json["method"], "frobnicate");
    }

    #[test]
    fn test_as_flag() {
        assert_eq!(MethodResultPayload::flag(true).as_flag(), Some(true));
        assert_eq!(MethodResultPayload::ok(Value::Null).as_flag(), None);
        assert_eq!(
            MethodResultPayload::error("channel-error", "boom").as_flag(),
            None
        );
    }

    #[test]
    fn test_state_event_codes() {
        assert_eq!(StateEventPayload::from(ConnectionState::None).state, 0);
        assert_eq!(StateEventPayload::from(ConnectionState::Connecting).state, 1);
        assert_eq!(StateEventPayload::from(ConnectionState::Connected).state, 2);
        assert_eq!(StateEventPayload::from(ConnectionState::Failed).state, 0);
    }
}
