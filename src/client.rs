//! MQTT client module
//!
//! This module provides the router that owns a broker session: connection
//! configuration, the lifecycle state machine and the rumqttc event loop
//! that feeds it.

/// Connecting a router through rumqttc
pub mod async_client;
pub mod config;
/// Router error types
pub mod error;
/// Topic router and its lifecycle
pub mod router;

// Re-export commonly used types for convenience
pub use config::{BrokerConfig, RouterConfig, RouterSettings, TransportScheme};
pub use error::{ConnectionEstablishmentError, RouterError};
pub use router::MqttRouter;
