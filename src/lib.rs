//! A capability-gated message broker between a Matrix client and an
//! untrusted, embedded widget.
//!
//! Widgets exchange framed request/response messages with the host over a
//! transport this crate treats as an external collaborator; every request is
//! checked against a negotiated [`capability::CapabilitySet`] before it is
//! translated into a Matrix operation, and matching room/state events are
//! forwarded back. The wire protocol is derived from Matrix MSC2762,
//! MSC2871, MSC3819, MSC4157, MSC2873 and MSC4039.
//!
//! The crate splits into a pure core and a thin non-pure shell around it:
//!
//! - [`capability`] and [`filter_engine`] decide *what* a widget may do.
//! - [`pending`] tracks in-flight requests so responses can be matched back
//!   up and stale ones expired.
//! - [`state_machine`] is the reducer: `(state, message) -> (state, actions)`,
//!   with no I/O of its own.
//! - [`orchestrator`] is the only part of this crate that touches a real
//!   transport, Matrix client or capability UI.
//! - [`url_template`] is a small, unrelated pure helper for widget URL
//!   construction (spec §6.5); it has no bearing on capability enforcement.

pub mod capability;
pub mod error;
pub mod filter_engine;
pub mod messages;
pub mod orchestrator;
pub mod pending;
pub mod state_machine;
pub mod time;
pub mod url_template;

pub use error::{Error, Result};
