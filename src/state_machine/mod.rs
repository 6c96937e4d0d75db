//! The pure reducer at the heart of the driver (spec §4.4).
//!
//! [`StateMachine`] owns a [`MachineState`] and exposes the two reducer entry
//! points spec §4.4 names -- [`StateMachine::process_from_widget`] and
//! [`StateMachine::process_capability_approval`] -- plus a third,
//! [`StateMachine::process_openid_resolution`], split out of the latter so
//! that resolving a `get_openid` fetch never forces the capability FSM into
//! `Negotiated` on its own (see that method's docs). Each computes a fresh
//! state from the current one and a message, then atomically swaps it in
//! (spec §3.6). None of them perform I/O; every external effect is
//! represented as an [`Action`] for the orchestrator to execute.

pub mod actions;
pub mod openid;

pub use actions::Action;
pub use openid::{OpenIdCredentials, OpenIdDecision, OpenIdState};

use serde_json::Value;
use tracing::{info, warn};

use crate::{
    capability::{CapabilitySet, FilterContext, MatrixEventContent, MatrixEventFilterInput},
    error::{Error, ErrorCode},
    filter_engine::is_crypto_event,
    messages::{
        from_widget::{
            NavigateRequest, OpenIdResponseBody, ReadEventsRequest, SendDelayedEventRequest,
            SendEventRequest, SendToDeviceRequest, SupportedApiVersionsResponse,
            UpdateDelayedEventRequest,
        },
        to_widget::CapabilitiesNotification,
        WidgetMessage,
    },
    pending::PendingRegistry,
    time::{Clock, SystemClock},
};

/// Where capability negotiation stands (spec §3.3, §4.4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapabilityState {
    Unset,
    Negotiating,
    Negotiated,
}

/// The reducer's owned state (spec §3.3).
///
/// Not `Clone`: `pending` holds a `PendingRegistry` which isn't `Clone`
/// (nothing in this crate needs a whole-state snapshot -- the orchestrator
/// only ever clones individual fields off `state()`).
#[derive(Debug)]
pub struct MachineState<C: Clock = SystemClock> {
    pub capability_state: CapabilityState,
    pub requested_capabilities: Option<CapabilitySet>,
    pub approved_capabilities: CapabilitySet,
    pub openid_state: Option<OpenIdState>,
    pub pending: PendingRegistry<String, C>,
}

/// Tunable defaults, threaded into [`PendingRegistry`] and this machine
/// (spec §6.6).
#[derive(Clone, Debug)]
pub struct Config {
    pub max_pending: usize,
    pub timeout: std::time::Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self { max_pending: crate::pending::DEFAULT_MAX_PENDING, timeout: crate::pending::DEFAULT_TIMEOUT }
    }
}

/// Prefix used to distinguish a pending `get_openid` request from any other
/// pending request id (spec §3.5, §4.4.1).
const OPENID_PENDING_PREFIX: &str = "openid:";

/// The reducer. Generic over the time source so expiry-dependent behaviour
/// (OpenID cache hits, pending timeouts) is deterministic in tests.
pub struct StateMachine<C: Clock = SystemClock> {
    state: MachineState<C>,
    clock: C,
    user_id: String,
    device_id: Option<String>,
}

impl StateMachine<SystemClock> {
    pub fn new(config: Config, user_id: impl Into<String>, device_id: Option<String>) -> Self {
        Self::with_clock(config, user_id, device_id, SystemClock)
    }
}

impl<C: Clock + Clone> StateMachine<C> {
    pub fn with_clock(
        config: Config,
        user_id: impl Into<String>,
        device_id: Option<String>,
        clock: C,
    ) -> Self {
        let pending = PendingRegistry::with_clock(config.max_pending, config.timeout, clock.clone());
        Self {
            state: MachineState {
                capability_state: CapabilityState::Unset,
                requested_capabilities: None,
                approved_capabilities: CapabilitySet::default(),
                openid_state: None,
                pending,
            },
            clock,
            user_id: user_id.into(),
            device_id,
        }
    }

    /// Read-only access to the current state.
    pub fn state(&self) -> &MachineState<C> {
        &self.state
    }

    fn filter_ctx(&self) -> FilterContext<'_> {
        FilterContext { user_id: &self.user_id, device_id: self.device_id.as_deref() }
    }

    /// Records that the widget has been asked what capabilities it wants.
    ///
    /// This is the `Unset -> Negotiating` transition of spec §4.4.3's FSM.
    /// The spec names the transition but not an entry point for it: asking
    /// the widget and awaiting its reply is the orchestrator's job (it's
    /// non-pure I/O), so this method just records the ask once the
    /// orchestrator has it. No actions are emitted.
    pub fn begin_negotiation(&mut self, requested: CapabilitySet) {
        info!("beginning capability negotiation");
        self.state.capability_state = CapabilityState::Negotiating;
        self.state.requested_capabilities = Some(requested);
    }

    /// Entry point #1 (spec §4.4.1): dispatches an inbound widget message.
    pub fn process_from_widget(&mut self, message: &WidgetMessage) -> Vec<Action> {
        let request_id = message.request_id.clone();

        // "A missing request_id on any action requiring a response is a
        // protocol violation: the message is dropped silently" (spec
        // §4.4.1). `navigate` is the one action that doesn't require a
        // response.
        if message.action != "navigate" && request_id.is_none() {
            warn!(action = %message.action, "dropping widget message without a request id");
            return vec![];
        }

        match message.action.as_str() {
            "supported_api_versions" => vec![Action::SendToWidget {
                request_id,
                action: "supported_api_versions".to_owned(),
                data: serde_json::to_value(SupportedApiVersionsResponse::default())
                    .expect("serializable"),
            }],
            "content_loaded" => self.handle_content_loaded(request_id),
            "get_openid" => self.handle_get_openid(request_id),
            "send_event" => self.handle_send_event(request_id, &message.data),
            "send_delayed_event" => self.handle_send_delayed_event(request_id, &message.data),
            "read_events" => self.handle_read_events(request_id, &message.data),
            "send_to_device" => self.handle_send_to_device(request_id, &message.data),
            "update_delayed_event" => self.handle_update_delayed_event(request_id, &message.data),
            "navigate" => self.handle_navigate(request_id, &message.data),
            other => {
                warn!(action = %other, "unrecognized widget action");
                vec![Action::error(request_id, ErrorCode::Unrecognized, format!("Unknown action: {other}"))]
            }
        }
    }

    /// Entry point #2 (spec §4.4.2).
    pub fn process_capability_approval(
        &mut self,
        approved: CapabilitySet,
        openid: Option<OpenIdDecision>,
    ) -> Vec<Action> {
        info!("capability negotiation complete");
        self.state.capability_state = CapabilityState::Negotiated;
        self.state.approved_capabilities = approved;

        let mut actions = Vec::new();

        if let Some(id) = self.state.pending.oldest(|id| !id.starts_with(OPENID_PENDING_PREFIX)) {
            if self.state.pending.extract(&id, |_, _| {}).is_some() {
                actions.push(Action::SendToWidget {
                    request_id: Some(id),
                    action: "capabilities".to_owned(),
                    data: serde_json::to_value(CapabilitiesNotification {
                        capabilities: self.state.approved_capabilities.serialize(),
                    })
                    .expect("serializable"),
                });
            }
        }

        if let Some(openid) = openid {
            actions.extend(self.resolve_openid(openid));
        }

        actions
    }

    /// Entry point #3: resolves an outstanding `get_openid` request (the
    /// `RequestOpenId` action) against the client's decision.
    ///
    /// Unlike [`Self::process_capability_approval`], this does **not** touch
    /// `capability_state`/`approved_capabilities` -- a widget may call
    /// `get_openid` before ever negotiating capabilities (spec §4.4.1's
    /// `get_openid` row has no capability-state gate), and resolving that
    /// fetch must not be observable as a premature `Unset`/`Negotiating` ->
    /// `Negotiated` transition (spec §4.4.3: "allowed only for ...", which
    /// doesn't list `get_openid`).
    pub fn process_openid_resolution(&mut self, decision: OpenIdDecision) -> Vec<Action> {
        self.resolve_openid(decision)
    }

    /// Caches the decision (if allowed) and answers the oldest pending
    /// `openid:<id>` request, if any.
    fn resolve_openid(&mut self, decision: OpenIdDecision) -> Vec<Action> {
        let mut actions = Vec::new();
        match decision {
            OpenIdDecision::Allowed(credentials) => {
                self.state.openid_state = Some(OpenIdState::new(credentials.clone(), self.clock.now()));
                if let Some(id) = self.state.pending.oldest(|id| id.starts_with(OPENID_PENDING_PREFIX)) {
                    if self.state.pending.extract(&id, |_, _| {}).is_some() {
                        actions.push(openid_credentials_action(
                            strip_openid_prefix(&id),
                            &OpenIdResponseBody::from(&credentials),
                        ));
                    }
                }
            }
            OpenIdDecision::Blocked => {
                if let Some(id) = self.state.pending.oldest(|id| id.starts_with(OPENID_PENDING_PREFIX)) {
                    if self.state.pending.extract(&id, |_, _| {}).is_some() {
                        actions.push(openid_credentials_action(strip_openid_prefix(&id), &OpenIdResponseBody::Blocked));
                    }
                }
            }
        }
        actions
    }

    /// Sweeps timed-out pending requests, returning a best-effort
    /// `M_TIMEOUT` error action for each (spec §5 "Cancellation / timeouts").
    /// The widget is free to ignore these.
    pub fn expire_pending(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        self.state.pending.remove_expired(|id, _payload| {
            warn!(request_id = %id, "pending request expired");
            actions.push(Action::error(Some(strip_openid_prefix(id).to_owned()), ErrorCode::Timeout, "request timed out"));
        });
        actions
    }

    /// Drops every pending request without invoking `on_expired` callbacks,
    /// for use when the orchestrator is being disposed (spec §3.6: disposal
    /// "clears pending", unlike [`Self::expire_pending`] which only sweeps
    /// requests that have actually timed out).
    pub fn clear_pending(&mut self) {
        self.state.pending.clear();
    }

    fn handle_content_loaded(&mut self, request_id: Option<String>) -> Vec<Action> {
        match self.state.capability_state {
            CapabilityState::Negotiated => vec![Action::SendToWidget {
                request_id,
                action: "capabilities".to_owned(),
                data: serde_json::to_value(CapabilitiesNotification {
                    capabilities: self.state.approved_capabilities.serialize(),
                })
                .expect("serializable"),
            }],
            _ => {
                // Negotiation hasn't resolved yet: hold this request so
                // `process_capability_approval` can answer it once it does,
                // instead of leaving the widget's `content_loaded` hanging
                // forever (spec §9's open question on this field).
                if let Some(id) = request_id {
                    if let Err(err) = self.state.pending.insert(id, "content_loaded".to_owned()) {
                        warn!(error = %err, "failed to track pending content_loaded");
                    }
                }
                vec![]
            }
        }
    }

    fn handle_get_openid(&mut self, request_id: Option<String>) -> Vec<Action> {
        let request_id = request_id.expect("checked by caller");

        if let Some(openid_state) = &self.state.openid_state {
            if !openid_state.is_expired(&self.clock) {
                return vec![Action::SendToWidget {
                    request_id: Some(request_id),
                    action: "openid_credentials".to_owned(),
                    data: serde_json::to_value(OpenIdResponseBody::from(&openid_state.credentials))
                        .expect("serializable"),
                }];
            }
        }

        match self.state.pending.insert(format!("{OPENID_PENDING_PREFIX}{request_id}"), request_id.clone()) {
            Ok(()) => vec![Action::RequestOpenId { request_id }],
            Err(Error::TooManyPending { max }) => {
                vec![Action::error(Some(request_id), ErrorCode::LimitExceeded, format!("too many pending requests (max {max})"))]
            }
            Err(_) => unreachable!("insert only returns TooManyPending"),
        }
    }

    fn handle_send_event(&mut self, request_id: Option<String>, data: &Value) -> Vec<Action> {
        let request_id = request_id.expect("checked by caller");
        let req: SendEventRequest = match serde_json::from_value(data.clone()) {
            Ok(req) => req,
            Err(_) => return vec![Action::error(Some(request_id), ErrorCode::InvalidRequest, "malformed send_event body")],
        };

        if is_crypto_event(&req.event_type) {
            return vec![Action::error(Some(request_id), ErrorCode::Forbidden, "crypto events cannot be sent by a widget")];
        }

        let ctx = self.filter_ctx();
        if !self.state.approved_capabilities.can_send(&req.event_type, req.state_key.as_deref(), &ctx) {
            return vec![Action::error(Some(request_id), ErrorCode::Forbidden, "missing capability to send this event")];
        }

        vec![Action::SendMatrixEvent {
            request_id,
            event_type: req.event_type,
            state_key: req.state_key,
            content: req.content,
        }]
    }

    fn handle_send_delayed_event(&mut self, request_id: Option<String>, data: &Value) -> Vec<Action> {
        let request_id = request_id.expect("checked by caller");
        let req: SendDelayedEventRequest = match serde_json::from_value(data.clone()) {
            Ok(req) => req,
            Err(_) => {
                return vec![Action::error(Some(request_id), ErrorCode::InvalidRequest, "malformed send_delayed_event body")]
            }
        };

        if is_crypto_event(&req.event_type) {
            return vec![Action::error(Some(request_id), ErrorCode::Forbidden, "crypto events cannot be sent by a widget")];
        }

        if !self.state.approved_capabilities.send_delayed_event {
            return vec![Action::error(Some(request_id), ErrorCode::Forbidden, "missing capability to send delayed events")];
        }

        vec![Action::SendDelayedEvent {
            request_id,
            event_type: req.event_type,
            state_key: req.state_key,
            content: req.content,
            delay_ms: req.delay_ms,
        }]
    }

    fn handle_read_events(&mut self, request_id: Option<String>, data: &Value) -> Vec<Action> {
        let request_id = request_id.expect("checked by caller");
        let req: ReadEventsRequest = match serde_json::from_value(data.clone()) {
            Ok(req) => req,
            Err(_) => return vec![Action::error(Some(request_id), ErrorCode::InvalidRequest, "malformed read_events body")],
        };

        let ctx = self.filter_ctx();
        let input = req.event_type.as_ref().map(|event_type| MatrixEventFilterInput {
            event_type: event_type.clone(),
            state_key: req.state_key.clone(),
            content: MatrixEventContent::default(),
        });

        if !self.state.approved_capabilities.can_read_event(input.as_ref(), &ctx) {
            return vec![Action::error(Some(request_id), ErrorCode::Forbidden, "missing capability to read this event type")];
        }

        vec![Action::ReadMatrixEvents {
            request_id,
            event_type: req.event_type,
            state_key: req.state_key,
            limit: req.limit,
        }]
    }

    fn handle_send_to_device(&mut self, request_id: Option<String>, data: &Value) -> Vec<Action> {
        let request_id = request_id.expect("checked by caller");
        let req: SendToDeviceRequest = match serde_json::from_value(data.clone()) {
            Ok(req) => req,
            Err(_) => return vec![Action::error(Some(request_id), ErrorCode::InvalidRequest, "malformed send_to_device body")],
        };

        if is_crypto_event(&req.event_type) {
            return vec![Action::error(Some(request_id), ErrorCode::Forbidden, "crypto events cannot be sent by a widget")];
        }

        if !self.state.approved_capabilities.can_send_to_device(&req.event_type) {
            return vec![Action::error(
                Some(request_id),
                ErrorCode::Forbidden,
                "missing capability to send to-device messages of this type",
            )];
        }

        vec![Action::SendToDeviceMessage {
            request_id,
            event_type: req.event_type,
            encrypted: req.encrypted,
            messages: serde_json::to_value(req.messages).expect("serializable"),
        }]
    }

    fn handle_update_delayed_event(&mut self, request_id: Option<String>, data: &Value) -> Vec<Action> {
        let request_id = request_id.expect("checked by caller");
        let req: UpdateDelayedEventRequest = match serde_json::from_value(data.clone()) {
            Ok(req) => req,
            Err(_) => {
                return vec![Action::error(Some(request_id), ErrorCode::InvalidRequest, "malformed update_delayed_event body")]
            }
        };

        if !self.state.approved_capabilities.update_delayed_event {
            return vec![Action::error(Some(request_id), ErrorCode::Forbidden, "missing capability to update delayed events")];
        }

        vec![Action::UpdateDelayedEvent { request_id, delay_id: req.delay_id, action: req.action }]
    }

    fn handle_navigate(&mut self, request_id: Option<String>, data: &Value) -> Vec<Action> {
        match serde_json::from_value::<NavigateRequest>(data.clone()) {
            Ok(req) => vec![Action::Navigate { request_id, uri: req.uri }],
            Err(_) => match request_id {
                Some(id) => vec![Action::error(Some(id), ErrorCode::InvalidRequest, "malformed navigate body")],
                None => vec![],
            },
        }
    }
}

fn strip_openid_prefix(id: &str) -> &str {
    id.strip_prefix(OPENID_PENDING_PREFIX).unwrap_or(id)
}

fn openid_credentials_action(request_id: &str, body: &OpenIdResponseBody) -> Action {
    Action::SendToWidget {
        request_id: Some(request_id.to_owned()),
        action: "openid_credentials".to_owned(),
        data: serde_json::to_value(body).expect("serializable"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches2::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::time::tests_support::TestClock;

    fn machine() -> StateMachine<Arc<TestClock>> {
        StateMachine::with_clock(
            Config::default(),
            "@alice:example.org",
            Some("DEVICE1".to_owned()),
            Arc::new(TestClock::new()),
        )
    }

    fn from_widget(request_id: &str, action: &str, data: Value) -> WidgetMessage {
        WidgetMessage {
            api: crate::messages::Api::FromWidget,
            request_id: Some(request_id.to_owned()),
            widget_id: "widget".to_owned(),
            action: action.to_owned(),
            data,
        }
    }

    #[test]
    fn supported_versions_probe() {
        let mut m = machine();
        let actions = m.process_from_widget(&from_widget("r1", "supported_api_versions", json!({})));
        assert_eq!(actions.len(), 1);
        assert_matches!(&actions[0], Action::SendToWidget { action, data, .. } => {
            assert_eq!(action, "supported_api_versions");
            assert_eq!(
                data["supported_versions"],
                json!(["0.0.1", "0.0.2", "MSC2762", "MSC2871", "MSC3819", "MSC4157"])
            );
        });
    }

    #[test]
    fn send_denied_before_negotiation() {
        let mut m = machine();
        let actions = m.process_from_widget(&from_widget(
            "r2",
            "send_event",
            json!({ "type": "m.room.message", "content": { "body": "hi" } }),
        ));
        assert_eq!(actions.len(), 1);
        assert_matches!(&actions[0], Action::SendToWidget { action, data, .. } => {
            assert_eq!(action, "error");
            assert_eq!(data["code"], "M_FORBIDDEN");
        });
    }

    #[test]
    fn send_allowed_after_approval() {
        let mut m = machine();
        let approved = CapabilitySet::parse(["org.matrix.msc2762.send.event:m.room.message"]);
        m.process_capability_approval(approved, None);

        let actions = m.process_from_widget(&from_widget(
            "r3",
            "send_event",
            json!({ "type": "m.room.message", "content": { "body": "hi" } }),
        ));
        assert_eq!(actions.len(), 1);
        assert_matches!(&actions[0], Action::SendMatrixEvent { event_type, state_key, content, .. } => {
            assert_eq!(event_type, "m.room.message");
            assert_eq!(*state_key, None);
            assert_eq!(content["body"], "hi");
        });
    }

    #[test]
    fn crypto_block_overrides_permission() {
        let mut m = machine();
        let approved = CapabilitySet::parse(["org.matrix.msc2762.send.event:m.room"]);
        m.process_capability_approval(approved, None);

        let actions = m.process_from_widget(&from_widget(
            "r4",
            "send_event",
            json!({ "type": "m.room.encrypted", "content": {} }),
        ));
        assert_eq!(actions.len(), 1);
        assert_matches!(&actions[0], Action::SendToWidget { action, data, .. } => {
            assert_eq!(action, "error");
            assert_eq!(data["code"], "M_FORBIDDEN");
        });
    }

    #[test]
    fn openid_cache_hit_skips_request() {
        let mut m = machine();
        let credentials = OpenIdCredentials::new("tok", 3600, "example.org");
        m.process_capability_approval(CapabilitySet::default(), Some(OpenIdDecision::Allowed(credentials.clone())));

        let actions = m.process_from_widget(&from_widget("r5", "get_openid", json!({})));
        assert_eq!(actions.len(), 1);
        assert_matches!(&actions[0], Action::SendToWidget { action, data, .. } => {
            assert_eq!(action, "openid_credentials");
            assert_eq!(data["state"], "allowed");
            assert_eq!(data["access_token"], "tok");
        });
    }

    #[test]
    fn openid_cache_miss_requests_token_then_resolves() {
        let mut m = machine();
        let actions = m.process_from_widget(&from_widget("r6", "get_openid", json!({})));
        assert_eq!(actions.len(), 1);
        assert_matches!(&actions[0], Action::RequestOpenId { request_id } => {
            assert_eq!(request_id, "r6");
        });
        assert_eq!(m.state().pending.len(), 1);

        let credentials = OpenIdCredentials::new("tok2", 60, "example.org");
        let resolved = m.process_capability_approval(CapabilitySet::default(), Some(OpenIdDecision::Allowed(credentials)));
        assert_eq!(resolved.len(), 1);
        assert_matches!(&resolved[0], Action::SendToWidget { request_id, action, data } => {
            assert_eq!(request_id.as_deref(), Some("r6"));
            assert_eq!(action, "openid_credentials");
            assert_eq!(data["access_token"], "tok2");
        });
        assert_eq!(m.state().pending.len(), 0);
    }

    #[test]
    fn capability_string_round_trip() {
        let set = CapabilitySet::parse([
            "org.matrix.msc2762.send.event:m.room.message#m.text",
            "org.matrix.msc2762.send.state_event:m.room.member|@u:x",
            "require_client",
            "org.matrix.msc4157.send.delayed_event",
        ]);
        assert!(set.requires_client);
        assert!(set.send_delayed_event);
        assert!(!set.update_delayed_event);

        let round_tripped = CapabilitySet::parse(set.serialize());
        assert_eq!(set, round_tripped);
    }

    #[test]
    fn unknown_action_is_unrecognized() {
        let mut m = machine();
        let actions = m.process_from_widget(&from_widget("r7", "not_a_real_action", json!({})));
        assert_eq!(actions.len(), 1);
        assert_matches!(&actions[0], Action::SendToWidget { action, data, .. } => {
            assert_eq!(action, "error");
            assert_eq!(data["code"], "M_UNRECOGNIZED");
        });
    }

    #[test]
    fn message_missing_request_id_is_dropped() {
        let mut m = machine();
        let msg = WidgetMessage {
            api: crate::messages::Api::FromWidget,
            request_id: None,
            widget_id: "widget".to_owned(),
            action: "send_event".to_owned(),
            data: json!({ "type": "m.room.message", "content": {} }),
        };
        assert_eq!(m.process_from_widget(&msg), vec![]);
    }

    #[test]
    fn navigate_is_never_gated() {
        let mut m = machine();
        let actions = m.process_from_widget(&from_widget("r8", "navigate", json!({ "uri": "https://example.org" })));
        assert_matches!(&actions[0], Action::Navigate { uri, .. } => {
            assert_eq!(uri, "https://example.org");
        });
    }

    #[test]
    fn content_loaded_before_negotiation_defers_until_approved() {
        let mut m = machine();
        let actions = m.process_from_widget(&from_widget("r9", "content_loaded", json!({})));
        assert_eq!(actions, vec![]);
        assert_eq!(m.state().pending.len(), 1);

        let resolved = m.process_capability_approval(
            CapabilitySet::parse(["org.matrix.msc2762.send.event:m.room.message"]),
            None,
        );
        assert_eq!(resolved.len(), 1);
        assert_matches!(&resolved[0], Action::SendToWidget { request_id, action, .. } => {
            assert_eq!(request_id.as_deref(), Some("r9"));
            assert_eq!(action, "capabilities");
        });
    }

    #[test]
    fn reducer_is_pure_for_identical_inputs() {
        let mut m1 = machine();
        let mut m2 = machine();
        let approved = CapabilitySet::parse(["org.matrix.msc2762.send.event:m.room.message"]);
        m1.process_capability_approval(approved.clone(), None);
        m2.process_capability_approval(approved, None);

        let msg = from_widget("r10", "send_event", json!({ "type": "m.room.message", "content": {} }));
        let a1 = m1.process_from_widget(&msg);
        let a2 = m2.process_from_widget(&msg);
        assert_eq!(a1, a2);
    }
}
