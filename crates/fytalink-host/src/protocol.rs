// ── Integration protocol messages ──
//
// Every frame is a JSON object tagged by `kind`: `req` from the remote,
// `resp` and `event` from the driver (the remote also sends `event`s).
// Inbound frames are decoded into closed enums; anything unrecognised is
// reported, never silently routed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Raw inbound envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    kind: String,
    #[serde(default)]
    id: Option<u64>,
    msg: String,
    #[serde(default)]
    msg_data: Value,
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Request { id: u64, request: Request },
    Event(RemoteEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    GetDriverVersion,
    GetDriverMetadata,
    GetDeviceState,
    GetAvailableEntities,
    GetEntityStates,
    SubscribeEvents(EntityIds),
    UnsubscribeEvents(EntityIds),
    EntityCommand(EntityCommand),
    SetupDriver(SetupDriver),
    SetDriverUserData(DriverUserData),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteEvent {
    Connect,
    Disconnect,
    EnterStandby,
    ExitStandby,
    AbortDriverSetup,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EntityIds {
    #[serde(default)]
    pub entity_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityCommand {
    pub entity_id: String,
    pub cmd_id: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SetupDriver {
    #[serde(default)]
    pub setup_data: Map<String, Value>,
    #[serde(default)]
    pub reconfigure: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DriverUserData {
    #[serde(default)]
    pub input_values: Map<String, Value>,
    #[serde(default)]
    pub confirm: Option<bool>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("request {id} has unknown msg '{msg}'")]
    UnknownRequest { id: u64, msg: String },

    #[error("unknown event '{0}'")]
    UnknownEvent(String),

    #[error("unexpected message kind '{0}'")]
    UnexpectedKind(String),

    #[error("request without id")]
    MissingId,
}

impl Inbound {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        match envelope.kind.as_str() {
            "req" => {
                let id = envelope.id.ok_or(ProtocolError::MissingId)?;
                let request = Request::decode(id, &envelope.msg, envelope.msg_data)?;
                Ok(Self::Request { id, request })
            }
            "event" => RemoteEvent::decode(&envelope.msg).map(Self::Event),
            other => Err(ProtocolError::UnexpectedKind(other.to_owned())),
        }
    }
}

impl Request {
    fn decode(id: u64, msg: &str, data: Value) -> Result<Self, ProtocolError> {
        Ok(match msg {
            "get_driver_version" => Self::GetDriverVersion,
            "get_driver_metadata" => Self::GetDriverMetadata,
            "get_device_state" => Self::GetDeviceState,
            "get_available_entities" => Self::GetAvailableEntities,
            "get_entity_states" => Self::GetEntityStates,
            "subscribe_events" => Self::SubscribeEvents(payload(data)?),
            "unsubscribe_events" => Self::UnsubscribeEvents(payload(data)?),
            "entity_command" => Self::EntityCommand(payload(data)?),
            "setup_driver" => Self::SetupDriver(payload(data)?),
            "set_driver_user_data" => Self::SetDriverUserData(payload(data)?),
            other => {
                return Err(ProtocolError::UnknownRequest {
                    id,
                    msg: other.to_owned(),
                });
            }
        })
    }
}

impl RemoteEvent {
    fn decode(msg: &str) -> Result<Self, ProtocolError> {
        match msg {
            "connect" => Ok(Self::Connect),
            "disconnect" => Ok(Self::Disconnect),
            "enter_standby" => Ok(Self::EnterStandby),
            "exit_standby" => Ok(Self::ExitStandby),
            "abort_driver_setup" => Ok(Self::AbortDriverSetup),
            other => Err(ProtocolError::UnknownEvent(other.to_owned())),
        }
    }
}

/// Missing or `null` payloads decode as the type's defaults.
fn payload<T: serde::de::DeserializeOwned>(data: Value) -> Result<T, ProtocolError> {
    let data = if data.is_null() {
        Value::Object(Map::new())
    } else {
        data
    };
    Ok(serde_json::from_value(data)?)
}

// ── Outbound ─────────────────────────────────────────────────────────

/// A frame sent to the remote.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outbound {
    Resp {
        req_id: u64,
        code: u16,
        msg: String,
        msg_data: Value,
    },
    Event {
        msg: String,
        cat: EventCategory,
        msg_data: Value,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCategory {
    Device,
    Entity,
}

/// Error codes carried in error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    BadRequest,
    NotFound,
    ServerError,
    NotImplemented,
}

impl ErrorCode {
    fn http(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::ServerError => 500,
            Self::NotImplemented => 501,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::ServerError => "SERVER_ERROR",
            Self::NotImplemented => "NOT_IMPLEMENTED",
        }
    }
}

impl Outbound {
    /// First frame on every connection.
    pub fn authentication() -> Self {
        Self::response(0, "authentication", json!({}))
    }

    pub fn response(req_id: u64, msg: &str, msg_data: Value) -> Self {
        Self::Resp {
            req_id,
            code: 200,
            msg: msg.to_owned(),
            msg_data,
        }
    }

    /// Plain acknowledgement.
    pub fn ok(req_id: u64) -> Self {
        Self::response(req_id, "result", json!({}))
    }

    pub fn error(req_id: u64, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Resp {
            req_id,
            code: code.http(),
            msg: "result".into(),
            msg_data: json!({ "code": code.as_str(), "message": message.into() }),
        }
    }

    pub fn event(msg: &str, cat: EventCategory, msg_data: Value) -> Self {
        Self::Event {
            msg: msg.to_owned(),
            cat,
            msg_data,
        }
    }

    pub fn device_state(state: &str) -> Self {
        Self::event("device_state", EventCategory::Device, json!({ "state": state }))
    }

    pub fn entity_change(entity_id: &str, attributes: Map<String, Value>) -> Self {
        Self::event(
            "entity_change",
            EventCategory::Entity,
            json!({
                "entity_type": "sensor",
                "entity_id": entity_id,
                "attributes": attributes,
            }),
        )
    }

    pub fn setup_change(event_type: &str, state: &str, error: Option<&str>) -> Self {
        let mut data = json!({ "event_type": event_type, "state": state });
        if let (Some(error), Some(obj)) = (error, data.as_object_mut()) {
            obj.insert("error".into(), Value::from(error));
        }
        Self::event("driver_setup_change", EventCategory::Device, data)
    }

    pub fn req_id(&self) -> Option<u64> {
        match self {
            Self::Resp { req_id, .. } => Some(*req_id),
            Self::Event { .. } => None,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}
