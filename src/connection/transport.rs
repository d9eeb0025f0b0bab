//! Seam between the router and the broker connection.
//!
//! The router never talks to the network directly. Outbound requests go
//! through [`BrokerTransport`], inbound traffic arrives as
//! [`TransportEvent`]s fed to the router by whatever drives the connection
//! (the rumqttc event loop in production, a test harness in tests).

use arcstr::ArcStr;
use bytes::Bytes;
use rumqttc::{AsyncClient, ClientError, QoS, SubscribeFilter};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Reason reported when the local side tears the connection down on
/// purpose. It is not a fault and never reaches the user.
pub const LOCAL_DISCONNECT_REASON: &str = "client disconnecting";

/// Errors raised by the broker transport
#[derive(Debug, Error)]
pub enum TransportError {
	/// The request forwarder has stopped, so the request was not queued
	#[error("Transport closed")]
	Closed,

	/// Any other transport failure
	#[error("Transport failure: {0}")]
	Other(String),
}

/// Outbound requests the router issues to the broker.
///
/// Calls are fire-and-forget: they queue the request and return without
/// waiting for the broker's acknowledgement.
pub trait BrokerTransport: Send + Sync + 'static {
	/// Requests a broker-level subscription for `pattern`
	fn subscribe(&self, pattern: &str) -> Result<(), TransportError>;
	/// Requests subscriptions for all `patterns` at once.
	///
	/// Used to restore every active pattern after a reconnect. Transports
	/// that can batch should send a single request.
	fn subscribe_many(
		&self,
		patterns: &[ArcStr],
	) -> Result<(), TransportError> {
		patterns
			.iter()
			.try_for_each(|pattern| self.subscribe(pattern))
	}
	/// Requests removal of the broker-level subscription for `pattern`
	fn unsubscribe(&self, pattern: &str) -> Result<(), TransportError>;
	/// Ends the connection
	fn disconnect(&self) -> Result<(), TransportError>;
}

/// Inbound events delivered by the connection driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
	/// Broker accepted the connection
	Connected,
	/// Message published on `topic`
	Message {
		/// Concrete topic of the message
		topic: String,
		/// Opaque payload bytes
		payload: Bytes,
	},
	/// Transport-level failure, with a human readable reason
	Error(String),
	/// Connection ended (remote disconnect or retries exhausted)
	Closed,
}

impl TransportEvent {
	/// Convenience constructor for message events
	pub fn message(
		topic: impl Into<String>,
		payload: impl Into<Bytes>,
	) -> Self {
		TransportEvent::Message {
			topic: topic.into(),
			payload: payload.into(),
		}
	}
}

#[derive(Debug)]
enum BrokerRequest {
	Subscribe(Vec<String>),
	Unsubscribe(String),
	Disconnect,
}

/// [`BrokerTransport`] backed by a rumqttc [`AsyncClient`].
///
/// Requests are queued without bound and forwarded by a background task
/// that awaits room in the rumqttc request channel, so a burst of
/// subscriptions larger than that channel is delayed rather than lost.
#[derive(Debug, Clone)]
pub struct MqttTransport {
	requests: mpsc::UnboundedSender<BrokerRequest>,
}

impl MqttTransport {
	/// Wraps `client`; broker subscriptions are requested with `qos`.
	///
	/// Spawns the forwarding task, so it must be called inside a tokio
	/// runtime. The task ends after a disconnect or once every clone of the
	/// transport is dropped.
	pub fn new(client: AsyncClient, qos: QoS) -> Self {
		let (requests, queue) = mpsc::unbounded_channel();
		tokio::spawn(forward_requests(client, qos, queue));
		Self { requests }
	}

	fn enqueue(&self, request: BrokerRequest) -> Result<(), TransportError> {
		self.requests
			.send(request)
			.map_err(|_| TransportError::Closed)
	}
}

impl BrokerTransport for MqttTransport {
	fn subscribe(&self, pattern: &str) -> Result<(), TransportError> {
		self.enqueue(BrokerRequest::Subscribe(vec![pattern.to_string()]))
	}

	fn subscribe_many(
		&self,
		patterns: &[ArcStr],
	) -> Result<(), TransportError> {
		if patterns.is_empty() {
			return Ok(());
		}
		let patterns = patterns.iter().map(ToString::to_string).collect();
		self.enqueue(BrokerRequest::Subscribe(patterns))
	}

	fn unsubscribe(&self, pattern: &str) -> Result<(), TransportError> {
		self.enqueue(BrokerRequest::Unsubscribe(pattern.to_string()))
	}

	fn disconnect(&self) -> Result<(), TransportError> {
		self.enqueue(BrokerRequest::Disconnect)
	}
}

async fn forward_requests(
	client: AsyncClient,
	qos: QoS,
	mut queue: mpsc::UnboundedReceiver<BrokerRequest>,
) {
	while let Some(request) = queue.recv().await {
		let result: Result<(), ClientError> = match &request {
			| BrokerRequest::Subscribe(patterns) if patterns.len() == 1 => {
				client.subscribe(patterns[0].clone(), qos).await
			}
			| BrokerRequest::Subscribe(patterns) => {
				let filters = patterns
					.iter()
					.map(|pattern| SubscribeFilter::new(pattern.clone(), qos));
				client.subscribe_many(filters).await
			}
			| BrokerRequest::Unsubscribe(pattern) => {
				client.unsubscribe(pattern.clone()).await
			}
			| BrokerRequest::Disconnect => {
				if let Err(err) = client.disconnect().await {
					debug!(
						error = %err,
						"Disconnect request was not delivered"
					);
				}
				break;
			}
		};
		if let Err(err) = result {
			warn!(
				request = ?request,
				error = %err,
				"Broker request was not delivered"
			);
		}
	}
	debug!("Broker request forwarder stopped");
}
