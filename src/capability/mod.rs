//! Capability parsing and the send/read gate (spec §4.1).

pub mod filter;

pub use filter::{
    EventFilter, FilterContext, MatrixEventContent, MatrixEventFilterInput, MessageLikeEventFilter,
    StateEventFilter, ToDeviceEventFilter,
};

/// What a widget may do, as negotiated via capability strings.
///
/// `read`/`send` order is preserved from parsing (duplicates are tolerated;
/// matching just iterates), matching spec §3.1.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CapabilitySet {
    pub read: Vec<EventFilter>,
    pub send: Vec<EventFilter>,
    pub requires_client: bool,
    pub update_delayed_event: bool,
    pub send_delayed_event: bool,
}

#[derive(Clone, Copy)]
enum EventClass {
    MessageLike,
    State,
    ToDevice,
}

impl CapabilitySet {
    /// Parses a raw capability string list into a [`CapabilitySet`].
    ///
    /// Malformed or unrecognized entries are silently skipped — the widget
    /// just doesn't gain that capability, per spec §4.1.
    pub fn parse<S: AsRef<str>>(capabilities: impl IntoIterator<Item = S>) -> Self {
        let mut set = Self::default();
        for raw in capabilities {
            let raw = raw.as_ref();
            match raw.split_once(':') {
                Some((prefix, spec)) => parse_prefixed(&mut set, prefix, spec),
                None => parse_bare(&mut set, raw),
            }
        }
        set
    }

    /// Serializes every filter back to its canonical capability string
    /// (spec §6.4), plus the flag-only forms. Order is `send` flags first,
    /// then `read`/`send` filters as stored.
    pub fn serialize(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.requires_client {
            out.push("require_client".to_owned());
        }
        if self.send_delayed_event {
            out.push("org.matrix.msc4157.send.delayed_event".to_owned());
        }
        if self.update_delayed_event {
            out.push("org.matrix.msc4157.update.delayed_event".to_owned());
        }
        for filter in &self.send {
            out.push(format!("{}{}", send_prefix(filter), filter.serialize()));
        }
        for filter in &self.read {
            out.push(format!("{}{}", read_prefix(filter), filter.serialize()));
        }
        out
    }

    /// Gate for an outbound `send_event`/`send_to_device` style request
    /// (spec §4.1). Crypto-event blocking is **not** performed here — that
    /// is the [`crate::filter_engine`] denylist, checked independently by
    /// the reducer so it can never be bypassed by a permissive capability.
    pub fn can_send(&self, event_type: &str, state_key: Option<&str>, ctx: &FilterContext<'_>) -> bool {
        match state_key {
            Some(key) => self.send.iter().any(|f| match f {
                EventFilter::State(StateEventFilter::WithType(t)) => t.as_str() == event_type,
                EventFilter::State(StateEventFilter::WithTypeAndStateKey(t, pattern)) => {
                    t.as_str() == event_type && ctx.expand(pattern) == key
                }
                _ => false,
            }),
            None => self.send.iter().any(|f| match f {
                EventFilter::MessageLike(MessageLikeEventFilter::WithType(t)) => {
                    event_type.starts_with(t.as_str())
                }
                EventFilter::MessageLike(MessageLikeEventFilter::RoomMessageWithMsgtype(_)) => {
                    event_type == "m.room.message"
                }
                _ => false,
            }),
        }
    }

    /// Whether `send` contains any to-device filter for `event_type`.
    pub fn can_send_to_device(&self, event_type: &str) -> bool {
        self.send.iter().any(|f| matches!(f, EventFilter::ToDevice(t) if t.event_type == event_type))
    }

    /// Full event/content-aware read gate (spec §4.1's `canReadEvent`).
    ///
    /// A `None` event type is treated as "read all allowed" whenever `read`
    /// is non-empty — see spec §9's open question; this crate follows the
    /// source's lenience rather than guessing at a fix.
    pub fn can_read_event(&self, event: Option<&MatrixEventFilterInput>, ctx: &FilterContext<'_>) -> bool {
        match event {
            Some(ev) => self.read.iter().any(|f| f.matches(ev, ctx)),
            None => !self.read.is_empty(),
        }
    }
}

fn send_prefix(filter: &EventFilter) -> &'static str {
    match filter {
        EventFilter::MessageLike(_) => "org.matrix.msc2762.send.event:",
        EventFilter::State(_) => "org.matrix.msc2762.send.state_event:",
        EventFilter::ToDevice(_) => "org.matrix.msc3819.send.to_device:",
    }
}

fn read_prefix(filter: &EventFilter) -> &'static str {
    match filter {
        EventFilter::MessageLike(_) => "org.matrix.msc2762.read.event:",
        EventFilter::State(_) => "org.matrix.msc2762.read.state_event:",
        EventFilter::ToDevice(_) => "org.matrix.msc3819.read.to_device:",
    }
}

fn parse_bare(set: &mut CapabilitySet, raw: &str) {
    match raw {
        "require_client" | "io.element.require_client" => set.requires_client = true,
        "org.matrix.msc4157.send.delayed_event" => set.send_delayed_event = true,
        "org.matrix.msc4157.update.delayed_event" => set.update_delayed_event = true,
        _ => {}
    }
}

fn parse_prefixed(set: &mut CapabilitySet, prefix: &str, spec: &str) {
    match prefix {
        "org.matrix.msc2762.send.event" => push_event(&mut set.send, spec, EventClass::MessageLike),
        "org.matrix.msc2762.read.event" => push_event(&mut set.read, spec, EventClass::MessageLike),
        "org.matrix.msc2762.send.state_event" => push_event(&mut set.send, spec, EventClass::State),
        "org.matrix.msc2762.read.state_event" => push_event(&mut set.read, spec, EventClass::State),
        "org.matrix.msc3819.send.to_device" => push_event(&mut set.send, spec, EventClass::ToDevice),
        "org.matrix.msc3819.read.to_device" => push_event(&mut set.read, spec, EventClass::ToDevice),
        _ if prefix.starts_with("io.element.") => parse_io_element(set, prefix, spec),
        _ => {}
    }
}

/// `io.element.*` capabilities with `.send.`/`.read.` in the prefix map onto
/// event filters the same way the canonical `org.matrix.msc2762.*` forms do
/// (spec §4.1 last row, restored from the teacher's production parser — see
/// `DESIGN.md`).
fn parse_io_element(set: &mut CapabilitySet, prefix: &str, spec: &str) {
    let class = if prefix.ends_with("to_device") {
        EventClass::ToDevice
    } else if prefix.ends_with("state_event") {
        EventClass::State
    } else {
        EventClass::MessageLike
    };

    if prefix.contains(".send.") {
        push_event(&mut set.send, spec, class);
    } else if prefix.contains(".read.") {
        push_event(&mut set.read, spec, class);
    }
}

fn push_event(list: &mut Vec<EventFilter>, spec: &str, class: EventClass) {
    if matches!(class, EventClass::ToDevice) {
        list.push(EventFilter::ToDevice(ToDeviceEventFilter { event_type: spec.to_owned() }));
        return;
    }

    if let Some((event_type, msgtype)) = spec.split_once('#') {
        if event_type == "m.room.message" {
            list.push(EventFilter::MessageLike(MessageLikeEventFilter::RoomMessageWithMsgtype(
                msgtype.to_owned(),
            )));
        } else {
            list.push(EventFilter::MessageLike(MessageLikeEventFilter::WithType(event_type.into())));
        }
        return;
    }

    if let Some((event_type, state_key)) = spec.split_once('|') {
        list.push(EventFilter::State(StateEventFilter::WithTypeAndStateKey(
            event_type.into(),
            state_key.to_owned(),
        )));
        return;
    }

    // A plain type. Strip a trailing `*` so the syntactic wildcard form and
    // the semantic prefix match of `MessageLikeWithType` are unified, per
    // spec §9 "Filter wildcards".
    let stripped = spec.strip_suffix('*').unwrap_or(spec);
    match class {
        EventClass::MessageLike => {
            list.push(EventFilter::MessageLike(MessageLikeEventFilter::WithType(stripped.into())))
        }
        EventClass::State => list.push(EventFilter::State(StateEventFilter::WithType(stripped.into()))),
        EventClass::ToDevice => unreachable!("handled above"),
    }
}
