//! Background host for the Marchiver browser extension.
//!
//! Routes extension requests to the archive API and settings store and
//! speaks the native-messaging protocol on stdin/stdout.

pub mod notify;
pub mod reply;
pub mod request;
pub mod router;
pub mod transport;
pub mod triggers;

#[cfg(test)]
mod test_support;

pub use notify::{Notification, Notifier};
pub use reply::Reply;
pub use request::{Action, Request, Timing};
pub use router::{ActionRouter, Dispatch};
pub use triggers::Trigger;
