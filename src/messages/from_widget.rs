//! Inbound (`FromWidget`) request bodies (spec §6.3).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{type, content, state_key?}` -- the body of a `send_event` request.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEventRequest {
    #[serde(rename = "type")]
    pub event_type: String,
    pub content: Value,
    #[serde(default)]
    pub state_key: Option<String>,
}

/// `{event_id, room_id?}`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEventResponse {
    pub event_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

/// `{type, content, state_key?, delay_ms}` -- MSC4157's `send_delayed_event`,
/// carried over from the teacher's newer fork (see `DESIGN.md`).
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendDelayedEventRequest {
    #[serde(rename = "type")]
    pub event_type: String,
    pub content: Value,
    #[serde(default)]
    pub state_key: Option<String>,
    pub delay_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendDelayedEventResponse {
    pub room_id: String,
    pub delay_id: String,
}

/// `{type?, state_key?, limit?}` -- the body of a `read_events` request.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadEventsRequest {
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub state_key: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReadEventsResponse {
    pub events: Vec<Value>,
}

/// `{type, encrypted, messages: {userId: {deviceId: content}}}` (MSC3819).
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendToDeviceRequest {
    #[serde(rename = "type")]
    pub event_type: String,
    pub encrypted: bool,
    pub messages: BTreeMap<String, BTreeMap<String, Value>>,
}

/// `{uri}`.
#[derive(Clone, Debug, Deserialize)]
pub struct NavigateRequest {
    pub uri: String,
}

/// `{action, delay_id}` (MSC4157).
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDelayedEventRequest {
    pub action: String,
    pub delay_id: String,
}

/// `{state: "allowed"|"blocked", access_token?, expires_in?,
/// matrix_server_name?, token_type?}`.
///
/// Spec §6.3 also names a `"request"` state, but nothing in this reducer's
/// `get_openid` dispatch (spec §4.4.1) ever emits it as a widget-facing
/// reply -- a cache miss emits `RequestOpenId` to the orchestrator instead,
/// with no immediate response to the widget -- so no `Pending` variant is
/// modeled here.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "state")]
#[serde(rename_all = "lowercase")]
pub enum OpenIdResponseBody {
    Allowed {
        access_token: String,
        expires_in: u64,
        matrix_server_name: String,
        token_type: String,
    },
    Blocked,
}

impl From<&crate::state_machine::openid::OpenIdCredentials> for OpenIdResponseBody {
    fn from(creds: &crate::state_machine::openid::OpenIdCredentials) -> Self {
        Self::Allowed {
            access_token: creds.access_token.clone(),
            expires_in: creds.expires_in_seconds,
            matrix_server_name: creds.homeserver.clone(),
            token_type: creds.token_type.clone(),
        }
    }
}

/// `{supported_versions: [...]}` -- the `supported_api_versions` response
/// body (spec §4.4.1, §6.6).
#[derive(Clone, Debug, Serialize)]
pub struct SupportedApiVersionsResponse {
    pub supported_versions: Vec<&'static str>,
}

/// The API versions this driver understands (spec §6.6).
pub const SUPPORTED_API_VERSIONS: &[&str] =
    &["0.0.1", "0.0.2", "MSC2762", "MSC2871", "MSC3819", "MSC4157"];

impl Default for SupportedApiVersionsResponse {
    fn default() -> Self {
        Self { supported_versions: SUPPORTED_API_VERSIONS.to_vec() }
    }
}
