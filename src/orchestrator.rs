//! Non-pure glue that drives a [`StateMachine`] against a real transport,
//! Matrix client and capability UI (spec §4.5, §6.1).
//!
//! Mirrors the split the teacher's `widget::client` module makes between the
//! pure message handler and the surrounding `run` loop / `WidgetProxy`: the
//! [`Orchestrator`] owns the reducer, the transport and the collaborator
//! handles, executes whatever [`Action`]s a reducer call emits, and commits
//! the resulting state. It never re-implements dispatch logic itself --
//! that's the reducer's job.

use std::time::Duration;

use async_trait::async_trait;
use ruma::{OwnedEventId, OwnedRoomId};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

use crate::{
    capability::{CapabilitySet, FilterContext, MatrixEventContent, MatrixEventFilterInput},
    error::{Error, ErrorCode},
    filter_engine::FilterEngine,
    messages::{
        from_widget::{ReadEventsResponse, SendDelayedEventResponse, SendEventResponse},
        Api, Empty, OutgoingMessage, WidgetMessage,
    },
    state_machine::{Action, Config, OpenIdCredentials, OpenIdDecision, StateMachine},
};

/// How often [`Orchestrator::run`] sweeps [`crate::pending::PendingRegistry`]
/// for timed-out requests. Independent of the registry's own per-entry
/// `timeout` (spec §6.6); this just bounds how stale an expired entry can get
/// before its best-effort `M_TIMEOUT` is emitted.
const PENDING_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// The bidirectional stream of framed JSON strings a widget speaks over
/// (spec §6.1). Implemented over postMessage/WebView channels in a real
/// host; out of scope here.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Waits for the next inbound frame. `None` signals the stream is
    /// exhausted (the widget went away) and the orchestrator should stop.
    async fn recv(&mut self) -> Option<String>;

    /// Sends a frame to the widget. An error here is surfaced as a
    /// best-effort `M_TRANSPORT_ERROR`, never a panic (spec §7).
    async fn send(&self, frame: String) -> Result<(), Error>;

    /// Tears the transport down. Idempotent.
    async fn dispose(&mut self);
}

/// A single matched room/state event, as delivered by the Matrix client's
/// sync. Carries just enough for the [`FilterEngine`] and for forwarding
/// verbatim to the widget.
#[derive(Clone, Debug)]
pub struct SyncEvent {
    pub room_id: OwnedRoomId,
    pub event_type: String,
    pub state_key: Option<String>,
    pub content: MatrixEventContent,
    /// The full event, forwarded to the widget unchanged.
    pub raw: Value,
}

impl SyncEvent {
    fn filter_input(&self) -> MatrixEventFilterInput {
        MatrixEventFilterInput {
            event_type: self.event_type.clone(),
            state_key: self.state_key.clone(),
            content: self.content.clone(),
        }
    }
}

/// The external collaborator that turns approved requests into real Matrix
/// traffic (spec §1's "Matrix client" collaborator). A production host backs
/// this with `ruma`/HTTP; tests back it with a hand-written mock (spec
/// SPEC_FULL.md §D).
#[async_trait]
pub trait MatrixClient: Send + Sync {
    async fn send_event(
        &self,
        event_type: &str,
        state_key: Option<&str>,
        content: Value,
    ) -> Result<OwnedEventId, Error>;

    async fn send_delayed_event(
        &self,
        event_type: &str,
        state_key: Option<&str>,
        content: Value,
        delay_ms: u64,
    ) -> Result<(OwnedRoomId, String), Error>;

    async fn update_delayed_event(&self, delay_id: &str, action: &str) -> Result<(), Error>;

    async fn read_events(
        &self,
        event_type: Option<&str>,
        state_key: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<Value>, Error>;

    async fn send_to_device(
        &self,
        event_type: &str,
        encrypted: bool,
        messages: Value,
    ) -> Result<(), Error>;

    async fn get_openid(&self) -> Result<OpenIdCredentials, Error>;
}

/// Asynchronously prompts the user to approve or deny a widget's requested
/// capabilities (spec §1's "capability UI" collaborator).
#[async_trait]
pub trait CapabilityUi: Send + Sync {
    async fn request_capabilities(&self, requested: &CapabilitySet) -> CapabilitySet;
}

/// Owns the machine, the registry (inside the machine), the transport and
/// the collaborator handles. The machine holds no references back, so there
/// is no cycle to break on drop (spec §9 "Cyclic ownership").
pub struct Orchestrator<T, M, U> {
    machine: StateMachine,
    transport: T,
    matrix_client: M,
    capability_ui: U,
    sync_events: mpsc::UnboundedReceiver<SyncEvent>,
    filter_ctx: (String, Option<String>),
}

impl<T, M, U> Orchestrator<T, M, U>
where
    T: Transport,
    M: MatrixClient,
    U: CapabilityUi,
{
    pub fn new(
        config: Config,
        user_id: impl Into<String>,
        device_id: Option<String>,
        transport: T,
        matrix_client: M,
        capability_ui: U,
        sync_events: mpsc::UnboundedReceiver<SyncEvent>,
    ) -> Self {
        let user_id = user_id.into();
        Self {
            machine: StateMachine::new(config, user_id.clone(), device_id.clone()),
            transport,
            matrix_client,
            capability_ui,
            sync_events,
            filter_ctx: (user_id, device_id),
        }
    }

    fn ctx(&self) -> FilterContext<'_> {
        FilterContext { user_id: &self.filter_ctx.0, device_id: self.filter_ctx.1.as_deref() }
    }

    /// Runs the orchestrator until the transport is exhausted. Mirrors the
    /// teacher's `client::run` loop: read a frame, dispatch it through the
    /// reducer, execute the emitted actions in order, commit. Sync events and
    /// a periodic pending-request sweep are interleaved via `tokio::select!`
    /// rather than separate top-level loops, since all three sources mutate
    /// the same state.
    pub async fn run(&mut self) {
        let mut expiry_tick = tokio::time::interval(PENDING_SWEEP_INTERVAL);
        expiry_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                frame = self.transport.recv() => {
                    match frame {
                        Some(raw) => self.handle_frame(&raw).await,
                        None => break,
                    }
                }
                Some(event) = self.sync_events.recv() => {
                    self.forward_if_permitted(event).await;
                }
                _ = expiry_tick.tick() => {
                    let actions = self.machine.expire_pending();
                    self.execute(actions).await;
                }
            }
        }

        // The transport branch is biased ahead of the sync-event one, so a
        // transport that's already exhausted can win the select before a
        // sync event queued just before disconnect ever gets polled. Drain
        // whatever's buffered rather than dropping it on the floor.
        while let Ok(event) = self.sync_events.try_recv() {
            self.forward_if_permitted(event).await;
        }

        self.dispose().await;
    }

    /// Parses one inbound frame and executes whatever the reducer emits.
    ///
    /// An unparseable frame is dropped silently (spec §6.1's "transport must
    /// surface errors... without terminating"; a malformed body is the
    /// widget's problem, not a transport fault). A frame that parses but
    /// carries no usable `request_id` is handled by the reducer itself (spec
    /// §4.4.1).
    async fn handle_frame(&mut self, raw: &str) {
        let message: WidgetMessage = match serde_json::from_str(raw) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "dropping unparseable widget frame");
                return;
            }
        };

        if message.action == "content_loaded" && self.machine.state().requested_capabilities.is_none() {
            // First content_loaded begins negotiation (teacher's `init_on_load`
            // path, client/handler/incoming.rs's `ContentLoadedRequest`).
            self.negotiate().await;
        }

        let actions = self.machine.process_from_widget(&message);
        self.execute(actions).await;
    }

    /// Asks the capability UI what the widget may do, then feeds the answer
    /// (and any cached/just-fetched OpenID decision) back through the
    /// reducer's second entry point.
    async fn negotiate(&mut self) {
        // The requested set itself isn't part of this core's wire protocol
        // (spec treats it as data the widget supplied out of band, e.g. via
        // a prior `capabilities` exchange); an empty ask means "approve
        // nothing" rather than stalling forever.
        let requested = self.machine.state().requested_capabilities.clone().unwrap_or_default();
        self.machine.begin_negotiation(requested.clone());

        let approved = self.capability_ui.request_capabilities(&requested).await;
        let actions = self.machine.process_capability_approval(approved, None);
        self.execute(actions).await;
    }

    /// Executes a reducer's emitted actions in order (spec §4.5 "Action
    /// dispatch ordering"). A failure while executing one action produces a
    /// best-effort `M_UNKNOWN` error back to the widget rather than aborting
    /// the remaining actions.
    async fn execute(&mut self, actions: Vec<Action>) {
        for action in actions {
            if let Err(err) = self.execute_one(action).await {
                warn!(error = %err, "action execution failed");
            }
        }
    }

    async fn execute_one(&mut self, action: Action) -> Result<(), Error> {
        match action {
            Action::SendToWidget { request_id, action, data } => {
                self.send_to_widget(request_id, action, data).await
            }
            Action::RequestOpenId { request_id } => {
                let decision = match self.matrix_client.get_openid().await {
                    Ok(credentials) => OpenIdDecision::Allowed(credentials),
                    Err(_) => OpenIdDecision::Blocked,
                };
                // `process_openid_resolution` only stores the credential and
                // answers the pending `openid:<id>` -- it never touches
                // `capability_state`, so a `get_openid` sent before any
                // negotiation can't be observed forcing a premature
                // `Negotiated` (spec §4.4.3).
                let _ = request_id;
                for action in self.machine.process_openid_resolution(decision) {
                    if let Action::SendToWidget { request_id, action, data } = action {
                        self.send_to_widget(request_id, action, data).await?;
                    }
                }
                Ok(())
            }
            Action::SendMatrixEvent { request_id, event_type, state_key, content } => {
                match self.matrix_client.send_event(&event_type, state_key.as_deref(), content).await {
                    Ok(event_id) => {
                        let body = SendEventResponse { event_id: event_id.to_string(), room_id: None };
                        self.reply_ok(request_id, "send_event", serde_json::to_value(body).expect("serializable"))
                            .await
                    }
                    Err(err) => self.reply_error(Some(request_id), ErrorCode::Unknown, err).await,
                }
            }
            Action::SendDelayedEvent { request_id, event_type, state_key, content, delay_ms } => {
                match self
                    .matrix_client
                    .send_delayed_event(&event_type, state_key.as_deref(), content, delay_ms)
                    .await
                {
                    Ok((room_id, delay_id)) => {
                        let body = SendDelayedEventResponse { room_id: room_id.to_string(), delay_id };
                        self.reply_ok(
                            request_id,
                            "send_delayed_event",
                            serde_json::to_value(body).expect("serializable"),
                        )
                        .await
                    }
                    Err(err) => self.reply_error(Some(request_id), ErrorCode::Unknown, err).await,
                }
            }
            Action::ReadMatrixEvents { request_id, event_type, state_key, limit } => {
                match self
                    .matrix_client
                    .read_events(event_type.as_deref(), state_key.as_deref(), limit)
                    .await
                {
                    Ok(events) => {
                        let body = ReadEventsResponse { events };
                        self.reply_ok(request_id, "read_events", serde_json::to_value(body).expect("serializable"))
                            .await
                    }
                    Err(err) => self.reply_error(Some(request_id), ErrorCode::Unknown, err).await,
                }
            }
            Action::SendToDeviceMessage { request_id, event_type, encrypted, messages } => {
                match self.matrix_client.send_to_device(&event_type, encrypted, messages).await {
                    Ok(()) => {
                        self.reply_ok(request_id, "send_to_device", serde_json::to_value(Empty::default()).expect("serializable"))
                            .await
                    }
                    Err(err) => self.reply_error(Some(request_id), ErrorCode::Unknown, err).await,
                }
            }
            Action::UpdateDelayedEvent { request_id, delay_id, action } => {
                match self.matrix_client.update_delayed_event(&delay_id, &action).await {
                    Ok(()) => {
                        self.reply_ok(
                            request_id,
                            "update_delayed_event",
                            serde_json::to_value(Empty::default()).expect("serializable"),
                        )
                        .await
                    }
                    Err(err) => self.reply_error(Some(request_id), ErrorCode::Unknown, err).await,
                }
            }
            Action::Navigate { request_id, uri } => {
                // Spec §9's open question: navigation has no meaningful
                // failure mode in this core, so it's always acknowledged.
                let _ = uri;
                if let Some(id) = request_id {
                    self.reply_ok(id, "navigate", serde_json::to_value(Empty::default()).expect("serializable")).await
                } else {
                    Ok(())
                }
            }
        }
    }

    async fn reply_ok(&self, request_id: String, action: &str, data: Value) -> Result<(), Error> {
        self.send_to_widget(Some(request_id), action.to_owned(), data).await
    }

    async fn reply_error(
        &self,
        request_id: Option<String>,
        code: ErrorCode,
        err: Error,
    ) -> Result<(), Error> {
        self.send_to_widget(
            request_id,
            "error".to_owned(),
            serde_json::json!({ "code": code.as_str(), "message": err.to_string() }),
        )
        .await
    }

    async fn send_to_widget(
        &self,
        request_id: Option<String>,
        action: String,
        data: Value,
    ) -> Result<(), Error> {
        let message = OutgoingMessage {
            api: Api::ToWidget,
            request_id,
            widget_id: String::new(),
            action,
            data,
        };
        let frame = serde_json::to_string(&message).expect("serializable");
        // An already-serializing `SendToWidget` silently fails rather than
        // recursing into another error action (spec §4.5).
        let _ = self.transport.send(frame).await;
        Ok(())
    }

    /// Filters one sync-delivered event against the approved read
    /// capabilities (crypto denylist first, unconditionally) and forwards it
    /// if it passes (spec §4.5).
    async fn forward_if_permitted(&self, event: SyncEvent) {
        let engine = FilterEngine::compile(&self.machine.state().approved_capabilities.read);
        let input = event.filter_input();
        if !engine.matches(&input, &self.ctx()) {
            return;
        }

        let action = if event.state_key.is_some() { "notify_state_update" } else { "notify_new_event" };
        let _ = self.send_to_widget(None, action.to_owned(), event.raw.clone()).await;
    }

    /// Cancels subscriptions, clears pending state and closes the transport
    /// (spec §3.6, §5 "Disposing the orchestrator").
    pub async fn dispose(&mut self) {
        self.sync_events.close();
        self.machine.clear_pending();
        self.transport.dispose().await;
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use ruma::{owned_event_id, owned_room_id};

    use super::*;
    use crate::capability::CapabilitySet;

    struct MockTransport {
        inbox: VecDeque<String>,
        outbox: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn recv(&mut self) -> Option<String> {
            self.inbox.pop_front()
        }

        async fn send(&self, frame: String) -> Result<(), Error> {
            self.outbox.lock().unwrap().push(frame);
            Ok(())
        }

        async fn dispose(&mut self) {}
    }

    struct MockClient;

    #[async_trait]
    impl MatrixClient for MockClient {
        async fn send_event(
            &self,
            _event_type: &str,
            _state_key: Option<&str>,
            _content: Value,
        ) -> Result<OwnedEventId, Error> {
            Ok(owned_event_id!("$abc:example.org"))
        }

        async fn send_delayed_event(
            &self,
            _event_type: &str,
            _state_key: Option<&str>,
            _content: Value,
            _delay_ms: u64,
        ) -> Result<(OwnedRoomId, String), Error> {
            Ok((owned_room_id!("!room:example.org"), "delay1".to_owned()))
        }

        async fn update_delayed_event(&self, _delay_id: &str, _action: &str) -> Result<(), Error> {
            Ok(())
        }

        async fn read_events(
            &self,
            _event_type: Option<&str>,
            _state_key: Option<&str>,
            _limit: Option<u32>,
        ) -> Result<Vec<Value>, Error> {
            Ok(vec![])
        }

        async fn send_to_device(
            &self,
            _event_type: &str,
            _encrypted: bool,
            _messages: Value,
        ) -> Result<(), Error> {
            Ok(())
        }

        async fn get_openid(&self) -> Result<OpenIdCredentials, Error> {
            Ok(OpenIdCredentials::new("tok", 3600, "example.org"))
        }
    }

    struct ApproveAll;

    #[async_trait]
    impl CapabilityUi for ApproveAll {
        async fn request_capabilities(&self, requested: &CapabilitySet) -> CapabilitySet {
            requested.clone()
        }
    }

    fn orchestrator(
        frames: Vec<&str>,
    ) -> (Orchestrator<MockTransport, MockClient, ApproveAll>, Arc<Mutex<Vec<String>>>) {
        let outbox = Arc::new(Mutex::new(Vec::new()));
        let transport =
            MockTransport { inbox: frames.into_iter().map(str::to_owned).collect(), outbox: outbox.clone() };
        let (_tx, rx) = mpsc::unbounded_channel();
        let orchestrator = Orchestrator::new(
            Config::default(),
            "@alice:example.org",
            None,
            transport,
            MockClient,
            ApproveAll,
            rx,
        );
        (orchestrator, outbox)
    }

    #[tokio::test]
    async fn supported_versions_round_trip_through_transport() {
        let (mut orch, outbox) = orchestrator(vec![
            r#"{"api":"FromWidget","requestId":"r1","widgetId":"w","action":"supported_api_versions","data":{}}"#,
        ]);
        orch.run().await;

        let sent = outbox.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let parsed: Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(parsed["action"], "supported_api_versions");
        assert_eq!(parsed["requestId"], "r1");
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped_without_reply() {
        let (mut orch, outbox) = orchestrator(vec!["not json"]);
        orch.run().await;
        assert!(outbox.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn content_loaded_negotiates_then_answers_send_event() {
        let (mut orch, outbox) = orchestrator(vec![
            r#"{"api":"FromWidget","requestId":"r1","widgetId":"w","action":"content_loaded","data":{}}"#,
        ]);
        orch.run().await;

        let sent = outbox.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let parsed: Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(parsed["action"], "capabilities");
    }

    #[tokio::test]
    async fn sync_event_forwarding_respects_crypto_denylist() {
        let (tx, rx) = mpsc::unbounded_channel();
        let outbox = Arc::new(Mutex::new(Vec::new()));
        let transport = MockTransport { inbox: VecDeque::new(), outbox: outbox.clone() };
        let mut orch =
            Orchestrator::new(Config::default(), "@alice:example.org", None, transport, MockClient, ApproveAll, rx);

        tx.send(SyncEvent {
            room_id: owned_room_id!("!r:example.org"),
            event_type: "m.room.encrypted".to_owned(),
            state_key: None,
            content: MatrixEventContent::default(),
            raw: serde_json::json!({ "type": "m.room.encrypted" }),
        })
        .unwrap();
        drop(tx);

        orch.run().await;
        assert!(outbox.lock().unwrap().is_empty());
    }

    struct FailingClient;

    #[async_trait]
    impl MatrixClient for FailingClient {
        async fn send_event(
            &self,
            _event_type: &str,
            _state_key: Option<&str>,
            _content: Value,
        ) -> Result<OwnedEventId, Error> {
            Err(Error::custom("homeserver rejected the event"))
        }

        async fn send_delayed_event(
            &self,
            _event_type: &str,
            _state_key: Option<&str>,
            _content: Value,
            _delay_ms: u64,
        ) -> Result<(OwnedRoomId, String), Error> {
            Err(Error::custom("homeserver rejected the event"))
        }

        async fn update_delayed_event(&self, _delay_id: &str, _action: &str) -> Result<(), Error> {
            Err(Error::custom("homeserver rejected the event"))
        }

        async fn read_events(
            &self,
            _event_type: Option<&str>,
            _state_key: Option<&str>,
            _limit: Option<u32>,
        ) -> Result<Vec<Value>, Error> {
            Err(Error::custom("homeserver rejected the event"))
        }

        async fn send_to_device(
            &self,
            _event_type: &str,
            _encrypted: bool,
            _messages: Value,
        ) -> Result<(), Error> {
            Err(Error::custom("homeserver rejected the event"))
        }

        async fn get_openid(&self) -> Result<OpenIdCredentials, Error> {
            Err(Error::custom("homeserver rejected the event"))
        }
    }

    struct ApproveWith(CapabilitySet);

    #[async_trait]
    impl CapabilityUi for ApproveWith {
        async fn request_capabilities(&self, _requested: &CapabilitySet) -> CapabilitySet {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn matrix_client_failure_surfaces_as_unknown_error() {
        let approved = CapabilitySet::parse(["org.matrix.msc2762.send.event:m.room.message"]);
        let outbox = Arc::new(Mutex::new(Vec::new()));
        let transport = MockTransport {
            inbox: VecDeque::from([
                r#"{"api":"FromWidget","requestId":"r1","widgetId":"w","action":"content_loaded","data":{}}"#
                    .to_owned(),
                r#"{"api":"FromWidget","requestId":"r2","widgetId":"w","action":"send_event","data":{"type":"m.room.message","content":{"body":"hi"}}}"#
                    .to_owned(),
            ]),
            outbox: outbox.clone(),
        };
        let (_tx, rx) = mpsc::unbounded_channel();
        let mut orch = Orchestrator::new(
            Config::default(),
            "@alice:example.org",
            None,
            transport,
            FailingClient,
            ApproveWith(approved),
            rx,
        );

        orch.run().await;

        let sent = outbox.lock().unwrap();
        // One `capabilities` push answering `content_loaded`, then one
        // `error` answering `send_event`.
        assert_eq!(sent.len(), 2);
        let parsed: Value = serde_json::from_str(&sent[1]).unwrap();
        assert_eq!(parsed["requestId"], "r2");
        assert_eq!(parsed["action"], "error");
        assert_eq!(parsed["data"]["code"], "M_UNKNOWN");
    }
}
