//! Outbound (`ToWidget`) request/response bodies (spec §6.3, §6.4).
//!
//! These are the shapes the *orchestrator* (not the pure reducer) sends to a
//! widget: telling it what capabilities were approved and forwarding matched
//! room/state events. Driver-initiated capability negotiation over the wire
//! (a request to the widget asking what it wants, with its own reply body to
//! deserialize) isn't implemented in this core -- see `DESIGN.md`'s
//! dependency notes -- so there is no inbound counterpart here.

use serde::Serialize;

/// The `notify_capabilities` / `capabilities` push, telling a widget what was
/// actually approved.
#[derive(Clone, Debug, Serialize)]
pub struct CapabilitiesNotification {
    pub capabilities: Vec<String>,
}
