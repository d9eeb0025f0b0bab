//! Message routing and subscription management module
//!
//! This module owns the subscription registry (pattern tree plus
//! per-subscriber index) and the dispatcher that fans inbound messages out
//! to the matching handlers.

pub mod dispatcher;
/// Routing and subscription error types
pub mod error;
/// Handler callbacks and subscriber identities
pub mod handler;
pub mod subscription_registry;

// Re-export commonly used types for convenience
pub use dispatcher::{CacheStrategy, DispatchReport, Dispatcher};
pub use error::RegistryError;
pub use handler::{Handler, HandlerError, HandlerResult, SubscriberKey};
pub use subscription_registry::{
	AddOutcome, RemoveOutcome, SubscriptionId, SubscriptionRegistry,
};

#[cfg(test)]
mod subscription_registry_tests;
