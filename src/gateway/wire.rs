//! Decoded request and response frames.

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request verb. Unrecognised verbs are kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Method {
    Subscribe,
    Unsubscribe,
    Get,
    Post,
    Patch,
    Delete,
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Subscribe => "SUBSCRIBE",
            Method::Unsubscribe => "UNSUBSCRIBE",
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Other(other) => other,
        }
    }
}

impl From<String> for Method {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "SUBSCRIBE" => Method::Subscribe,
            "UNSUBSCRIBE" => Method::Unsubscribe,
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            _ => Method::Other(raw),
        }
    }
}

impl From<&str> for Method {
    fn from(raw: &str) -> Self {
        Method::from(raw.to_string())
    }
}

impl From<Method> for String {
    fn from(method: Method) -> Self {
        match method {
            Method::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Client-chosen id, echoed in the response. Also the subscription id.
    #[serde(default)]
    pub id: String,

    #[serde(default = "default_method")]
    pub method: Method,

    pub path: String,

    /// Raw query string, without the leading `?`.
    #[serde(default)]
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

fn default_method() -> Method {
    Method::Get
}

impl Request {
    pub fn new(id: impl Into<String>, method: impl Into<Method>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            path: path.into(),
            query: String::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Answer to one request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// Result of a direct request. `status` is absent on success.
    Direct {
        id: String,
        method: Method,
        body: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
    },

    /// Acknowledgement of a (un)subscribe or of a request on an unknown path.
    Ack {
        id: String,
        method: Method,
        path: String,
        query: String,
    },
}

impl Response {
    pub fn ack(request: &Request) -> Self {
        Response::Ack {
            id: request.id.clone(),
            method: request.method.clone(),
            path: request.path.clone(),
            query: request.query.clone(),
        }
    }

    pub fn ok(request: &Request, body: serde_json::Value) -> Self {
        Response::Direct {
            id: request.id.clone(),
            method: request.method.clone(),
            body,
            status: None,
        }
    }

    /// Error response carrying the message as body and its status code.
    pub fn error(request: &Request, error: &SyncError) -> Self {
        Response::Direct {
            id: request.id.clone(),
            method: request.method.clone(),
            body: serde_json::Value::String(error.to_string()),
            status: Some(error.status()),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Response::Direct { id, .. } | Response::Ack { id, .. } => id,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Response::Direct { status, .. } => *status,
            Response::Ack { .. } => None,
        }
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        match self {
            Response::Direct { body, .. } => Some(body),
            Response::Ack { .. } => None,
        }
    }
}
