//! Event filters: the typed predicates a capability string compiles into
//! (spec §3.2).

use ruma::events::{MessageLikeEventType, StateEventType};
use serde::{Deserialize, Serialize};

/// A single compiled capability filter.
///
/// Mirrors the teacher's own `widget::EventFilter` sum type (a thin wrapper
/// the upstream driver builds from the same `org.matrix.msc2762.*` capability
/// strings), generalized with a `ToDevice` variant for MSC3819.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventFilter {
    MessageLike(MessageLikeEventFilter),
    State(StateEventFilter),
    ToDevice(ToDeviceEventFilter),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageLikeEventFilter {
    /// Matches any message-like event whose type starts with this prefix.
    ///
    /// A plain capability type (no trailing `*`) and an explicit wildcard
    /// (`m.room.*`) both end up here with the star stripped — see
    /// [`super::parse`].
    WithType(MessageLikeEventType),
    /// Matches `m.room.message` events with this exact `content.msgtype`.
    RoomMessageWithMsgtype(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateEventFilter {
    WithType(StateEventType),
    /// `state_key` is a template that may contain `{userId}`/`{deviceId}`
    /// placeholders, expanded against a [`FilterContext`] at match time.
    WithTypeAndStateKey(StateEventType, String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToDeviceEventFilter {
    pub event_type: String,
}

/// Per-widget values substituted into `{userId}`/`{deviceId}` state-key
/// templates. Matching is otherwise context-free.
#[derive(Clone, Copy, Debug)]
pub struct FilterContext<'a> {
    pub user_id: &'a str,
    pub device_id: Option<&'a str>,
}

impl FilterContext<'_> {
    pub(crate) fn expand(&self, pattern: &str) -> String {
        pattern.replace("{userId}", self.user_id).replace("{deviceId}", self.device_id.unwrap_or(""))
    }
}

/// `content.msgtype`, the only content field any filter in this crate cares
/// about (spec §3.2's `RoomMessageWithMsgtype`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MatrixEventContent {
    pub msgtype: Option<String>,
}

/// The event shape filters are matched against, built uniformly from a
/// timeline/state event delivered by sync or from an outgoing `send_event`
/// request before it is dispatched.
#[derive(Clone, Debug, Default)]
pub struct MatrixEventFilterInput {
    pub event_type: String,
    pub state_key: Option<String>,
    pub content: MatrixEventContent,
}

impl EventFilter {
    /// Whether `self` matches `ev` (spec §3.2's per-variant match column).
    pub fn matches(&self, ev: &MatrixEventFilterInput, ctx: &FilterContext<'_>) -> bool {
        match self {
            Self::MessageLike(MessageLikeEventFilter::WithType(t)) => {
                ev.state_key.is_none() && ev.event_type.starts_with(t.as_str())
            }
            Self::MessageLike(MessageLikeEventFilter::RoomMessageWithMsgtype(m)) => {
                ev.event_type == "m.room.message"
                    && ev.state_key.is_none()
                    && ev.content.msgtype.as_deref() == Some(m.as_str())
            }
            Self::State(StateEventFilter::WithType(t)) => {
                ev.state_key.is_some() && ev.event_type == t.as_str()
            }
            Self::State(StateEventFilter::WithTypeAndStateKey(t, pattern)) => match &ev.state_key {
                Some(key) => ev.event_type == t.as_str() && ctx.expand(pattern) == *key,
                None => false,
            },
            Self::ToDevice(ToDeviceEventFilter { event_type }) => ev.event_type == *event_type,
        }
    }

    /// Canonical wire form (spec §6.4): the inverse of [`super::parse`].
    pub fn serialize(&self) -> String {
        match self {
            Self::MessageLike(MessageLikeEventFilter::WithType(t)) => t.as_str().to_owned(),
            Self::MessageLike(MessageLikeEventFilter::RoomMessageWithMsgtype(m)) => {
                format!("m.room.message#{m}")
            }
            Self::State(StateEventFilter::WithType(t)) => t.as_str().to_owned(),
            Self::State(StateEventFilter::WithTypeAndStateKey(t, key)) => {
                format!("{}|{key}", t.as_str())
            }
            Self::ToDevice(ToDeviceEventFilter { event_type }) => event_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>() -> FilterContext<'a> {
        FilterContext { user_id: "@alice:example.org", device_id: Some("DEVICE1") }
    }

    #[test]
    fn message_like_prefix_matches() {
        let filter = EventFilter::MessageLike(MessageLikeEventFilter::WithType("m.room".into()));
        let ev = MatrixEventFilterInput { event_type: "m.room.message".into(), ..Default::default() };
        assert!(filter.matches(&ev, &ctx()));
    }

    #[test]
    fn room_message_requires_msgtype() {
        let filter =
            EventFilter::MessageLike(MessageLikeEventFilter::RoomMessageWithMsgtype("m.text".into()));
        let matching = MatrixEventFilterInput {
            event_type: "m.room.message".into(),
            content: MatrixEventContent { msgtype: Some("m.text".into()) },
            ..Default::default()
        };
        let mismatching = MatrixEventFilterInput {
            event_type: "m.room.message".into(),
            content: MatrixEventContent { msgtype: Some("m.image".into()) },
            ..Default::default()
        };
        assert!(filter.matches(&matching, &ctx()));
        assert!(!filter.matches(&mismatching, &ctx()));
    }

    #[test]
    fn state_key_template_expands_before_compare() {
        let filter = EventFilter::State(StateEventFilter::WithTypeAndStateKey(
            "m.call.member".into(),
            "{userId}_{deviceId}".into(),
        ));
        let ev = MatrixEventFilterInput {
            event_type: "m.call.member".into(),
            state_key: Some("@alice:example.org_DEVICE1".into()),
            ..Default::default()
        };
        let wrong_key = MatrixEventFilterInput {
            event_type: "m.call.member".into(),
            state_key: Some("@bob:example.org_DEVICE1".into()),
            ..Default::default()
        };
        assert!(filter.matches(&ev, &ctx()));
        assert!(!filter.matches(&wrong_key, &ctx()));
    }

    #[test]
    fn serialize_round_trips_canonical_forms() {
        let filters = vec![
            EventFilter::MessageLike(MessageLikeEventFilter::WithType("m.room.message".into())),
            EventFilter::MessageLike(MessageLikeEventFilter::RoomMessageWithMsgtype("m.text".into())),
            EventFilter::State(StateEventFilter::WithTypeAndStateKey(
                "m.room.member".into(),
                "@u:x".into(),
            )),
        ];
        assert_eq!(filters[0].serialize(), "m.room.message");
        assert_eq!(filters[1].serialize(), "m.room.message#m.text");
        assert_eq!(filters[2].serialize(), "m.room.member|@u:x");
    }
}
