//! The typed actions a [`super::StateMachine`] reducer call emits.
//!
//! Emitting a list of actions instead of performing side effects directly is
//! what keeps the reducer pure and testable without a Matrix client (spec §9
//! "Purity of the reducer").

use serde_json::Value;

use crate::error::ErrorCode;

/// One effect the [`super::StateMachine`] wants executed, in emission order.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Send a message to the widget. Covers both normal responses
    /// (`request_id` set) and the `error` action (spec §4.4.1, §7).
    SendToWidget { request_id: Option<String>, action: String, data: Value },

    /// Ask the Matrix client for an OpenID token on the widget's behalf.
    RequestOpenId { request_id: String },

    /// Forward an approved `send_event` request to the Matrix client.
    SendMatrixEvent {
        request_id: String,
        event_type: String,
        state_key: Option<String>,
        content: Value,
    },

    /// Forward an approved MSC4157 `send_delayed_event` request.
    SendDelayedEvent {
        request_id: String,
        event_type: String,
        state_key: Option<String>,
        content: Value,
        delay_ms: u64,
    },

    /// Forward an approved `read_events` request.
    ReadMatrixEvents {
        request_id: String,
        event_type: Option<String>,
        state_key: Option<String>,
        limit: Option<u32>,
    },

    /// Forward an approved `send_to_device` request.
    SendToDeviceMessage {
        request_id: String,
        event_type: String,
        encrypted: bool,
        messages: Value,
    },

    /// Forward an approved `update_delayed_event` request (MSC4157).
    UpdateDelayedEvent { request_id: String, delay_id: String, action: String },

    /// Navigate the widget/host to `uri`. Never gated by capability (spec
    /// §4.4.1).
    Navigate { request_id: Option<String>, uri: String },
}

impl Action {
    /// Builds the canonical `error` [`Action::SendToWidget`] (spec §7).
    pub fn error(request_id: Option<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::SendToWidget {
            request_id,
            action: "error".to_owned(),
            data: serde_json::json!({ "code": code.as_str(), "message": message.into() }),
        }
    }
}
