//! Application layer containing the pharmacy workflow orchestration.
//!
//! `PharmacyEngine` owns the in-memory records behind a single `tokio` lock
//! and drives every mutation through signing and persistence before it
//! becomes visible. `Session` tracks who is logged in on a front end.

pub mod analytics;
pub mod engine;
pub mod session;
