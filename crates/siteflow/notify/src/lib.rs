//! Notification outbox and dispatcher for Siteflow
//!
//! Engine events wanting human attention are not sent fire-and-forget:
//! the service enqueues them into a durable [`Outbox`] (persisted
//! through the entity store), and a [`Dispatcher`] drains due entries,
//! resolves recipients through the [`UserDirectory`], renders an
//! [`EmailMessage`] and hands it to the [`Mailer`]. Failed sends retry
//! with exponential backoff until `max_attempts`, then park as dead.
//!
//! Delivery failure never rolls back a committed entity state; the
//! outbox decouples commit success from notification success.

#![deny(unsafe_code)]

mod directory;
mod dispatcher;
mod error;
mod mailer;
mod message;
mod outbox;

pub use directory::*;
pub use dispatcher::*;
pub use error::*;
pub use mailer::*;
pub use message::*;
pub use outbox::*;
