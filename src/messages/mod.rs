//! Wire envelope types for the widget postMessage protocol (spec §6.2, §6.3).

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod from_widget;
pub mod to_widget;

/// `"FromWidget"` or `"ToWidget"` (spec §6.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Api {
    FromWidget,
    ToWidget,
}

/// The raw inbound envelope, before the reducer dispatches on `action`.
///
/// Unlike the teacher's `IncomingMessageKind` (which tags on `api` and fans
/// out into a closed enum of known actions at deserialize time), this crate
/// keeps `data` as an untyped [`Value`] here and lets
/// [`crate::state_machine::StateMachine::process_from_widget`] decide how to
/// interpret it per `action` -- an unrecognized action must still produce
/// `M_UNRECOGNIZED` rather than fail to deserialize (spec §4.4.1).
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetMessage {
    pub api: Api,
    #[serde(default)]
    pub request_id: Option<String>,
    pub widget_id: String,
    pub action: String,
    #[serde(default)]
    pub data: Value,
}

/// An outgoing message the orchestrator serializes and hands to the
/// transport.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub api: Api,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub widget_id: String,
    pub action: String,
    pub data: Value,
}

/// `{}` -- the body of requests/responses that carry no data.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct Empty {}

/// The wire error envelope (spec §6.3).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix_error: Option<Value>,
}
