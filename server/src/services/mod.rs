//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own room membership, fan-out and snapshot persistence so
//! route handlers can stay focused on protocol translation.

pub mod room;
pub mod snapshot;
