use std::{collections::BTreeMap, fmt};

use switchyard_common::{GeneratedResponse, InboundMessage};

/// Type tag carried by every port. Wiring is only allowed between equal tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortType {
    Message,
    Response,
    Text,
    Integer,
    Json,
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Message => "message",
            Self::Response => "response",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Json => "json",
        })
    }
}

/// A named, typed input or output of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub name: String,
    pub port_type: PortType,
    pub description: String,
    /// Only meaningful on inputs: required inputs must be wired.
    pub required: bool,
}

impl Port {
    pub fn required(
        name: impl Into<String>,
        port_type: PortType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            port_type,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        port_type: PortType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, port_type, description)
        }
    }
}

/// A value flowing along a wire.
#[derive(Debug, Clone, PartialEq)]
pub enum PortValue {
    Message(InboundMessage),
    Response(GeneratedResponse),
    Text(String),
    Integer(i64),
    Json(serde_json::Value),
}

impl PortValue {
    pub fn port_type(&self) -> PortType {
        match self {
            Self::Message(_) => PortType::Message,
            Self::Response(_) => PortType::Response,
            Self::Text(_) => PortType::Text,
            Self::Integer(_) => PortType::Integer,
            Self::Json(_) => PortType::Json,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text a user would see for this value.
    pub fn render(&self) -> String {
        match self {
            Self::Message(m) => m.text.clone(),
            Self::Response(r) => r.content.clone(),
            Self::Text(s) => s.clone(),
            Self::Integer(n) => n.to_string(),
            Self::Json(v) => v.to_string(),
        }
    }
}

impl From<InboundMessage> for PortValue {
    fn from(msg: InboundMessage) -> Self {
        Self::Message(msg)
    }
}

impl From<GeneratedResponse> for PortValue {
    fn from(resp: GeneratedResponse) -> Self {
        Self::Response(resp)
    }
}

impl From<String> for PortValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for PortValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<i64> for PortValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

/// Values keyed by port name.
pub type PortValues = BTreeMap<String, PortValue>;

/// Look up a port by name.
pub(crate) fn find<'a>(ports: &'a [Port], name: &str) -> Option<&'a Port> {
    ports.iter().find(|p| p.name == name)
}
