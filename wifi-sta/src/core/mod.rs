//! Core connection state machine.
//!
//! This module holds the pieces the client wires together: the
//! mutex-guarded connection state, the event fan-out registry and the
//! driver event handler that drives both.

pub(crate) mod handler;
pub(crate) mod registry;
pub(crate) mod state;
