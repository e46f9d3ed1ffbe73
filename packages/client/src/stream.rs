//! Geo-replicated streams.
//!
//! [`Streams`] manages streams over REST. Publishing and consuming happen
//! over a WebSocket the caller opens; [`StreamTopic`] builds its URLs and
//! [`StreamMessage`] / [`producer_frame`] handle the JSON frames.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::{ApiWrapper, Output};
use crate::error::{Error, ErrorKind, Result};
use crate::executor::Executor;
use crate::request::Request;

const LOCAL_PREFIX: &str = "c8locals.";
const GLOBAL_PREFIX: &str = "c8globals.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamInfo {
    /// Fully qualified name, e.g. `c8globals.orders`.
    pub topic: String,
    #[serde(default)]
    pub local: bool,
}

impl StreamInfo {
    /// The stream name without its locality prefix.
    pub fn name(&self) -> &str {
        self.topic
            .strip_prefix(GLOBAL_PREFIX)
            .or_else(|| self.topic.strip_prefix(LOCAL_PREFIX))
            .unwrap_or(&self.topic)
    }
}

#[derive(Debug, Clone)]
pub struct Streams<E: Executor> {
    executor: E,
}

impl<E: Executor> ApiWrapper for Streams<E> {
    type Executor = E;

    fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: Executor> Streams<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn list(&self, global: bool) -> Result<Output<E, Vec<StreamInfo>>> {
        let request = Request::get("/_api/streams").with_param("global", global);
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::StreamList, &resp));
            }
            Ok(resp.field::<Vec<StreamInfo>>("result")?)
        })
    }

    pub fn has(&self, name: &str, global: bool) -> Result<Output<E, bool>> {
        let name = name.to_string();
        let request = Request::get("/_api/streams").with_param("global", global);
        self.execute(request, move |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::StreamList, &resp));
            }
            let streams = resp.field::<Vec<StreamInfo>>("result")?;
            Ok(streams.iter().any(|s| s.name() == name || s.topic == name))
        })
    }

    pub fn create(&self, name: &str, global: bool) -> Result<Output<E, bool>> {
        let request = Request::post(format!("/_api/streams/{}", name)).with_param("global", global);
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::StreamCreate, &resp));
            }
            Ok(true)
        })
    }

    pub fn delete(&self, name: &str, global: bool) -> Result<Output<E, bool>> {
        let request =
            Request::delete(format!("/_api/streams/{}", name)).with_param("global", global);
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::StreamDelete, &resp));
            }
            Ok(true)
        })
    }
}

/// Address of one stream for the realtime WebSocket API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTopic {
    pub tenant: String,
    pub fabric: String,
    pub stream: String,
    pub global: bool,
}

impl StreamTopic {
    pub fn new(
        tenant: impl Into<String>,
        fabric: impl Into<String>,
        stream: impl Into<String>,
        global: bool,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            fabric: fabric.into(),
            stream: stream.into(),
            global,
        }
    }

    fn path(&self, role: &str, host: &str) -> String {
        let locality = if self.global { "c8global" } else { "c8local" };
        format!(
            "wss://{}/_ws/ws/v2/{}/persistent/{}/{}.{}/{}",
            host, role, self.tenant, locality, self.fabric, self.stream
        )
    }

    pub fn consumer_url(&self, host: &str, subscription: &str) -> String {
        format!("{}/{}", self.path("consumer", host), subscription)
    }

    pub fn producer_url(&self, host: &str) -> String {
        self.path("producer", host)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InboundFrame {
    message_id: String,
    payload: String,
    #[serde(default)]
    properties: BTreeMap<String, String>,
    #[serde(default)]
    publish_time: Option<String>,
}

/// A message received on a consumer socket.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMessage {
    pub message_id: String,
    pub payload: Vec<u8>,
    pub properties: BTreeMap<String, String>,
    pub publish_time: Option<String>,
}

impl StreamMessage {
    pub fn decode(frame: &str) -> Result<Self> {
        let frame: InboundFrame = serde_json::from_str(frame).map_err(|e| {
            Error::client(ErrorKind::StreamMessage, format!("malformed frame: {}", e))
        })?;
        let payload = STANDARD.decode(frame.payload.as_bytes()).map_err(|e| {
            Error::client(ErrorKind::StreamMessage, format!("payload is not base64: {}", e))
        })?;

        Ok(Self {
            message_id: frame.message_id,
            payload,
            properties: frame.properties,
            publish_time: frame.publish_time,
        })
    }

    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// The acknowledgement frame to send back for this message.
    pub fn ack(&self) -> String {
        serde_json::json!({ "messageId": self.message_id }).to_string()
    }
}

/// Frame publishing `payload` on a producer socket.
pub fn producer_frame(payload: &[u8], properties: &BTreeMap<String, String>) -> String {
    let mut frame = serde_json::json!({ "payload": STANDARD.encode(payload) });
    if !properties.is_empty() {
        frame["properties"] = Value::from(
            properties
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                .collect::<serde_json::Map<String, Value>>(),
        );
    }
    frame.to_string()
}
