//! Uniform JSON response envelope for handlers.
//!
//! # Responsibilities
//! - Carry an application outcome (`Code`, `Message`) plus optional `Data`
//! - Always answer HTTP 200; the real outcome lives in the body
//! - Omit `Data` entirely when the payload is empty
//!
//! # Design Decisions
//! - Payload type is a parameter; the default is a JSON object map
//! - Success → Failed is the only state transition and cannot be undone
//! - A serialization failure never fails the transport: it is logged and
//!   the response goes out as 200 with an empty body

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::hash::BuildHasher;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value};

/// Application code for success.
pub const SUCCESS_CODE: i32 = 0;
/// Application code for failure.
pub const ERROR_CODE: i32 = 1;
/// Message carried by a fresh envelope.
pub const SUCCESS_MESSAGE: &str = "success";

/// Payloads that can sit in the `Data` field.
pub trait Payload: Serialize {
    /// Empty payloads are left out of the JSON body.
    fn is_empty(&self) -> bool;
}

impl Payload for Map<String, Value> {
    fn is_empty(&self) -> bool {
        Map::is_empty(self)
    }
}

impl<T: Serialize> Payload for Option<T> {
    fn is_empty(&self) -> bool {
        self.is_none()
    }
}

impl<T: Serialize> Payload for Vec<T> {
    fn is_empty(&self) -> bool {
        Vec::is_empty(self)
    }
}

impl<K: Serialize, V: Serialize, S: BuildHasher> Payload for HashMap<K, V, S> {
    fn is_empty(&self) -> bool {
        HashMap::is_empty(self)
    }
}

impl<K: Serialize, V: Serialize> Payload for BTreeMap<K, V> {
    fn is_empty(&self) -> bool {
        BTreeMap::is_empty(self)
    }
}

/// Success/failure envelope returned by handlers.
///
/// Serializes as `{"Code":0,"Message":"success","Data":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<T: Payload = Map<String, Value>> {
    #[serde(rename = "Code")]
    code: i32,

    #[serde(rename = "Message")]
    message: String,

    #[serde(rename = "Data", skip_serializing_if = "Payload::is_empty")]
    data: T,
}

impl<T: Payload + Default> Envelope<T> {
    /// A success envelope with an empty payload.
    pub fn new() -> Self {
        Self::with_data(T::default())
    }
}

impl<T: Payload + Default> Default for Envelope<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Payload> Envelope<T> {
    /// A success envelope carrying `data`.
    pub fn with_data(data: T) -> Self {
        Self {
            code: SUCCESS_CODE,
            message: SUCCESS_MESSAGE.to_string(),
            data,
        }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Record a failure. There is no way back to success afterwards.
    pub fn fail(&mut self, err: impl Display) {
        self.code = ERROR_CODE;
        self.message = err.to_string();
    }

    /// Serialize to the wire JSON.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// HTTP 200 carrying the JSON body.
    pub fn write(self) -> Response {
        let body = match self.to_json() {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(code = self.code, error = %e, "Failed to serialize response envelope");
                Vec::new()
            }
        };

        let mut response = (StatusCode::OK, body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }

    /// Like [`write`](Self::write), first recording `err` if there is one.
    pub fn write_with_error<E: Display>(mut self, err: Option<E>) -> Response {
        if let Some(err) = err {
            self.fail(err);
        }
        self.write()
    }
}

impl Envelope<Map<String, Value>> {
    /// Set a key in the default object payload.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

impl<T: Serialize> Envelope<Option<T>> {
    /// Success with `Some(value)`, or failure carrying the error text and no data.
    pub fn from_result<E: Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::with_data(Some(value)),
            Err(err) => {
                let mut envelope = Self::with_data(None);
                envelope.fail(err);
                envelope
            }
        }
    }
}

impl<T: Payload> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        self.write()
    }
}
