//! Deployment notifications

pub mod channels;
pub mod dispatcher;

pub use dispatcher::{LogNotifier, NotificationDispatcher, NotificationLevel};
