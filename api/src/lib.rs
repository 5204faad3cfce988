//! Read-only HTTP API over the synced chain records.
//!
//! This is the outbound interface to presentation: the browser UI reads the
//! block list, per-hash records, the reports feed, and the sync status
//! (liveness, `now`, possible-gap marker) from here. The single write
//! operation is switching the active node endpoint, which the endpoint
//! drawer in the UI needs.

pub mod error;
pub mod handlers;
pub mod pagination;
pub mod server;

pub use error::ApiError;
pub use server::{ApiServer, ApiState};
