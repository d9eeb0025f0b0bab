//! # MQTT Topic Router
//!
//! Client-side routing of MQTT messages to dynamically registered handlers.
//!
//! ## Features
//!
//! - **Pattern Tree**: MQTT wildcard patterns (`+`, `#`) matched segment by
//!   segment
//! - **Per-subscriber Slots**: re-registering replaces the subscriber's own
//!   handler without touching other subscribers on the same pattern
//! - **Isolated Dispatch**: a failing or panicking handler never stops its
//!   siblings
//! - **Explicit Lifecycle**: the tree is cleared whenever the connection is
//!   closed or reconfigured
//! - **Typed Payloads**: optional decoding into numeric, boolean, string or
//!   JSON values before the handler runs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mqtt_topic_router::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = RouterConfig::new(BrokerConfig::default());
//!     let connection = MqttConnection::open(&config).await?;
//!     let router = connection.router().clone();
//!
//!     router.subscribe("unit1/+/temperature", |topic, payload| {
//!         println!("{topic}: {}", String::from_utf8_lossy(payload));
//!     })?;
//!
//!     router.subscribe_decoded(
//!         "pump-card",
//!         "unit1/pump/$state",
//!         PayloadKind::String,
//!         |topic, value| {
//!             println!("{topic} -> {value:?}");
//!             Ok(())
//!         },
//!     )?;
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     connection.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Pattern Matching
//!
//! - `+` matches exactly one topic level (e.g., `unit1/+/temperature`)
//! - `#` matches one or more trailing levels (e.g., `unit1/#`); a lone `#`
//!   matches every topic

#![warn(missing_docs)]

// Core modules
pub mod client;
pub mod connection;
pub mod payload;
pub mod routing;
pub mod topic;

// === Core Public API ===
pub use client::{
	BrokerConfig, MqttRouter, RouterConfig, RouterError, RouterSettings,
	TransportScheme,
};
pub use connection::{
	BrokerTransport, ConnectionEvent, ConnectionState, MqttConnection,
	MqttTransport, SessionId, TransportEvent,
};
pub use payload::{PayloadKind, PayloadValue};
pub use routing::{
	DispatchReport, Handler, HandlerError, HandlerResult, SubscriberKey,
	SubscriptionId,
};

// Essential external types
pub use rumqttc::QoS;

// Topic pattern types (for manual pattern handling)
pub use topic::{TopicPatternError, TopicPatternPath};

/// Result type alias for operations that may fail with RouterError
pub type Result<T> = std::result::Result<T, RouterError>;

/// Prelude module for convenient imports
///
/// ```rust
/// use mqtt_topic_router::prelude::*;
/// ```
pub mod prelude {
	//! Essential types for most applications

	pub use crate::{
		BrokerConfig, ConnectionEvent, ConnectionState, HandlerResult,
		MqttConnection, MqttRouter, PayloadKind, PayloadValue, QoS, Result,
		RouterConfig, RouterError, SubscriberKey,
	};
}

/// Advanced types and utilities for complex use cases
///
/// - Custom transports and manual event feeding
/// - Direct access to the dispatcher and registry
/// - Validation utilities
pub mod advanced {
	//! Advanced types for complex use cases

	pub use crate::connection::{
		is_local_disconnect, ErrorNotifier, TransportError,
		LOCAL_DISCONNECT_REASON,
	};
	pub use crate::routing::{
		AddOutcome, CacheStrategy, Dispatcher, RemoveOutcome,
		SubscriptionRegistry,
	};
	pub use crate::topic::{
		limits, validation, TopicMatcherNode, TopicPath, TopicPatternItem,
	};
}

/// Error types used throughout the library
///
/// ```rust
/// use mqtt_topic_router::errors::*;
/// ```
pub mod errors {
	//! All error types used in the library

	pub use crate::client::{ConnectionEstablishmentError, RouterError};
	pub use crate::connection::TransportError;
	pub use crate::payload::PayloadDecodeError;
	pub use crate::routing::{HandlerError, RegistryError};
	pub use crate::topic::{TopicError, TopicMatcherError, TopicPatternError};
}
