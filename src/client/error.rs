use rumqttc::{ConnectReturnCode, ConnectionError};
use thiserror::Error;

use crate::connection::{ConnectionState, TransportError};
use crate::routing::RegistryError;
use crate::topic::TopicPatternError;

/// Errors that can occur in router operations
#[derive(Debug, Error)]
pub enum RouterError {
	/// Operation needs a live connection
	#[error("Not connected to the broker (state: {state})")]
	NotConnected {
		/// State at the time of the call
		state: ConnectionState,
	},

	/// Broker request could not be queued
	#[error("Transport error: {0}")]
	Transport(#[from] TransportError),

	/// Invalid topic pattern
	#[error("Topic pattern error: {0}")]
	TopicPattern(#[from] TopicPatternError),

	/// Registry bookkeeping failed
	#[error("Subscription error: {0}")]
	Subscription(#[from] RegistryError),

	/// Invalid configuration parameter values
	#[error("Invalid configuration value: {0}")]
	ConfigurationValue(String),

	/// Initial handshake with the broker failed
	#[error("Failed to connect: {0}")]
	ConnectionEstablishment(#[from] ConnectionEstablishmentError),

	/// Event loop task ended abnormally
	#[error("Event loop task failed: {0}")]
	EventLoop(String),
}

impl RouterError {
	/// Shorthand for [`RouterError::NotConnected`]
	pub fn not_connected(state: ConnectionState) -> Self {
		RouterError::NotConnected { state }
	}
}

/// Failures of the initial broker handshake
#[derive(Debug, Error)]
pub enum ConnectionEstablishmentError {
	/// Network-level failure
	#[error("Network error: {0}")]
	Network(#[from] ConnectionError),

	/// Broker refused the connection
	#[error("Broker rejected connection: {code:?}")]
	BrokerRejected {
		/// CONNACK return code sent by the broker
		code: ConnectReturnCode,
	},

	/// No CONNACK within the configured time
	#[error("Connection timed out after {timeout_millis}ms")]
	Timeout {
		/// Configured timeout
		timeout_millis: u64,
	},
}

/// Result alias for router operations
pub type Result<T> = std::result::Result<T, RouterError>;
