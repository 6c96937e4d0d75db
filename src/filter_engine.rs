//! Compiled lookup structures over a list of [`EventFilter`]s, plus the
//! hard-coded crypto-event denylist (spec §4.2).
//!
//! The denylist is checked independently of any capability: it must never be
//! reachable through a user-granted permission, however permissive.

use std::collections::{HashMap, HashSet};

use crate::capability::{
    EventFilter, FilterContext, MatrixEventFilterInput, MessageLikeEventFilter, StateEventFilter,
};

/// Event types that are never forwarded to a widget and never acceptable as
/// a `send_event`/`send_to_device` target, regardless of capability state
/// (spec §4.2).
pub fn is_crypto_event(event_type: &str) -> bool {
    matches!(
        event_type,
        "m.room_key" | "m.room_key_request" | "m.forwarded_room_key" | "m.room.encrypted"
    ) || event_type.starts_with("m.secret.")
        || event_type.starts_with("m.room_key.")
        || event_type.starts_with("m.room_key_request.")
        || event_type.starts_with("m.forwarded_room_key.")
}

/// Pre-compiled matcher over one side (`read` or `send`) of a
/// [`crate::capability::CapabilitySet`].
///
/// Matching short-circuits on the first hit, in the order spec §4.2
/// prescribes: exact-type hit, then prefix scan, then type-indexed
/// second pass, then a full per-event scan over whatever's left.
#[derive(Debug, Default)]
pub struct FilterEngine {
    exact_message_types: HashSet<String>,
    exact_state_types: HashSet<String>,
    prefix_types: Vec<String>,
    message_index: HashMap<String, Vec<EventFilter>>,
    state_index: HashMap<String, Vec<EventFilter>>,
    complex: Vec<EventFilter>,
}

impl FilterEngine {
    pub fn compile(filters: &[EventFilter]) -> Self {
        let mut engine = Self::default();

        for filter in filters {
            match filter {
                EventFilter::MessageLike(MessageLikeEventFilter::WithType(t)) => {
                    let t = t.as_str().to_owned();
                    engine.exact_message_types.insert(t.clone());
                    engine.prefix_types.push(t);
                }
                EventFilter::MessageLike(MessageLikeEventFilter::RoomMessageWithMsgtype(_)) => {
                    engine
                        .message_index
                        .entry("m.room.message".to_owned())
                        .or_default()
                        .push(filter.clone());
                }
                EventFilter::State(StateEventFilter::WithType(t)) => {
                    engine.exact_state_types.insert(t.as_str().to_owned());
                    engine.state_index.entry(t.as_str().to_owned()).or_default().push(filter.clone());
                }
                EventFilter::State(StateEventFilter::WithTypeAndStateKey(t, _)) => {
                    engine.state_index.entry(t.as_str().to_owned()).or_default().push(filter.clone());
                    engine.complex.push(filter.clone());
                }
                EventFilter::ToDevice(to_device) => {
                    engine
                        .message_index
                        .entry(to_device.event_type.clone())
                        .or_default()
                        .push(filter.clone());
                }
            }
        }

        engine
    }

    /// Whether `ev` may be forwarded/sent under the filters this engine was
    /// compiled from. The crypto denylist is checked first and cannot be
    /// overridden by any of them.
    pub fn matches(&self, ev: &MatrixEventFilterInput, ctx: &FilterContext<'_>) -> bool {
        if is_crypto_event(&ev.event_type) {
            return false;
        }

        if ev.state_key.is_none() && self.exact_message_types.contains(&ev.event_type) {
            return true;
        }
        if ev.state_key.is_some() && self.exact_state_types.contains(&ev.event_type) {
            return true;
        }

        if ev.state_key.is_none() && self.prefix_types.iter().any(|p| ev.event_type.starts_with(p.as_str()))
        {
            return true;
        }

        if let Some(filters) = self.message_index.get(&ev.event_type) {
            if filters.iter().any(|f| f.matches(ev, ctx)) {
                return true;
            }
        }
        if let Some(filters) = self.state_index.get(&ev.event_type) {
            if filters.iter().any(|f| f.matches(ev, ctx)) {
                return true;
            }
        }

        self.complex.iter().any(|f| f.matches(ev, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{MatrixEventContent, ToDeviceEventFilter};

    fn ctx<'a>() -> FilterContext<'a> {
        FilterContext { user_id: "@alice:example.org", device_id: Some("DEV") }
    }

    fn ev(event_type: &str, state_key: Option<&str>) -> MatrixEventFilterInput {
        MatrixEventFilterInput {
            event_type: event_type.to_owned(),
            state_key: state_key.map(str::to_owned),
            content: MatrixEventContent::default(),
        }
    }

    #[test]
    fn crypto_denylist_overrides_any_filter() {
        let filters = vec![EventFilter::MessageLike(MessageLikeEventFilter::WithType("m.room".into()))];
        let engine = FilterEngine::compile(&filters);
        assert!(!engine.matches(&ev("m.room.encrypted", None), &ctx()));
        assert!(!engine.matches(&ev("m.secret.storage.key", None), &ctx()));
        assert!(!engine.matches(&ev("m.room_key_request.foo", None), &ctx()));
    }

    #[test]
    fn exact_and_prefix_message_like_paths() {
        let filters = vec![
            EventFilter::MessageLike(MessageLikeEventFilter::WithType("m.room.topic".into())),
            EventFilter::MessageLike(MessageLikeEventFilter::WithType("io.element.".into())),
        ];
        let engine = FilterEngine::compile(&filters);
        assert!(engine.matches(&ev("m.room.topic", None), &ctx()));
        assert!(engine.matches(&ev("io.element.call.member", None), &ctx()));
        assert!(!engine.matches(&ev("m.room.message", None), &ctx()));
    }

    #[test]
    fn state_with_type_and_state_key_uses_complex_scan() {
        let filters = vec![EventFilter::State(StateEventFilter::WithTypeAndStateKey(
            "m.call.member".into(),
            "{userId}_{deviceId}".into(),
        ))];
        let engine = FilterEngine::compile(&filters);
        assert!(engine.matches(&ev("m.call.member", Some("@alice:example.org_DEV")), &ctx()));
        assert!(!engine.matches(&ev("m.call.member", Some("@bob:example.org_DEV")), &ctx()));
    }

    #[test]
    fn to_device_indexed_by_exact_type() {
        let filters =
            vec![EventFilter::ToDevice(ToDeviceEventFilter { event_type: "m.call.invite".into() })];
        let engine = FilterEngine::compile(&filters);
        assert!(engine.matches(&ev("m.call.invite", None), &ctx()));
        assert!(!engine.matches(&ev("m.call.hangup", None), &ctx()));
    }
}
