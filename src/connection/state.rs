use std::fmt;

/// Lifecycle state of the broker connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
	/// No configuration has been applied yet
	#[default]
	Uninitialized,
	/// Transport attached, waiting for the broker handshake
	Connecting,
	/// Handshake done; subscriptions are accepted
	Connected,
	/// Transport failed; the transport's own retry may reconnect it
	Error,
	/// Torn down; the pattern tree has been cleared
	Closed,
}

impl ConnectionState {
	/// Returns true when subscribe requests can reach the broker
	pub fn is_connected(self) -> bool {
		self == ConnectionState::Connected
	}

	/// Returns true when a transport is attached (connecting, connected or
	/// recovering from an error)
	pub fn has_transport(self) -> bool {
		matches!(
			self,
			ConnectionState::Connecting
				| ConnectionState::Connected
				| ConnectionState::Error
		)
	}
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			| ConnectionState::Uninitialized => "uninitialized",
			| ConnectionState::Connecting => "connecting",
			| ConnectionState::Connected => "connected",
			| ConnectionState::Error => "error",
			| ConnectionState::Closed => "closed",
		};
		write!(f, "{name}")
	}
}

/// Identity of one attached transport.
///
/// Every [`attach`](crate::MqttRouter::attach) starts a new session. Events
/// fed in with an older id come from a driver that has been replaced and
/// are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
	pub(crate) fn first() -> Self {
		SessionId(0)
	}

	pub(crate) fn next(self) -> Self {
		SessionId(self.0.wrapping_add(1))
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "session-{}", self.0)
	}
}

/// Lifecycle notifications published to the outside
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
	/// Broker handshake completed
	Connected,
	/// User-visible connection error, already deduplicated
	Error(String),
	/// Connection torn down
	Closed,
}
