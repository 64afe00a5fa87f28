//! Service layer for Siteflow
//!
//! Load the entity, run the engine, commit the new state together with
//! its side effects (stock decrement, issuance history) as one guarded
//! multi-path update, then enqueue the notifications. The engine stays
//! pure; this crate owns every suspension point.
//!
//! Concurrency policy:
//!
//! - **Status transitions** commit through a guarded update keyed on
//!   the entity document as read. A racing writer surfaces as
//!   [`ServiceError::ConcurrentConflict`]; the caller re-reads and
//!   retries deliberately, never by accident.
//! - **Comment appends and read-state flips** use a bounded
//!   compare-and-swap retry loop, so racing comments both land.

#![deny(unsafe_code)]

mod config;
mod error;
mod paths;
mod service;

pub use config::*;
pub use error::*;
pub use paths::*;
pub use service::*;
