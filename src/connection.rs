//! MQTT connection management module
//!
//! Connection state, the transport seam used by the router, error
//! notification and the [`MqttConnection`] handle that owns the event loop
//! task of a live broker session.

pub mod notifier;
pub mod state;
pub mod transport;

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, warn};

pub use notifier::{is_local_disconnect, ErrorNotifier};
pub use state::{ConnectionEvent, ConnectionState, SessionId};
pub use transport::{
	BrokerTransport, MqttTransport, TransportError, TransportEvent,
	LOCAL_DISCONNECT_REASON,
};

use crate::client::{MqttRouter, RouterConfig, RouterError};

/// MQTT connection handle for lifecycle management
///
/// Keeps the event loop task of one broker session. It should be kept alive
/// for the duration of the session and shut down explicitly.
pub struct MqttConnection {
	router: MqttRouter<MqttTransport>,
	event_loop_handle: Option<JoinHandle<()>>,
	shutdown_timeout: Duration,
}

impl MqttConnection {
	pub(crate) fn new(
		router: MqttRouter<MqttTransport>,
		event_loop_handle: JoinHandle<()>,
		shutdown_timeout: Duration,
	) -> Self {
		Self {
			router,
			event_loop_handle: Some(event_loop_handle),
			shutdown_timeout,
		}
	}

	/// Creates a router from `config.settings` and connects it.
	///
	/// Keep the returned connection alive for the session and call
	/// [`shutdown`](Self::shutdown) when done.
	pub async fn open(config: &RouterConfig) -> Result<Self, RouterError> {
		let router = MqttRouter::<MqttTransport>::new(config.settings.clone());
		router.connect(config).await
	}

	/// Router driven by this connection
	pub fn router(&self) -> &MqttRouter<MqttTransport> {
		&self.router
	}

	/// Gracefully shutdown the connection by:
	/// 1. Closing the router (clears every registration, queues DISCONNECT)
	/// 2. Waiting for the event loop to see the DISCONNECT and finish
	///
	/// The event loop task is aborted if it does not finish in time.
	pub async fn shutdown(mut self) -> Result<(), RouterError> {
		self.router.close();

		let Some(mut handle) = self.event_loop_handle.take() else {
			warn!("No event loop handle available to await");
			return Ok(());
		};
		match tokio::time::timeout(self.shutdown_timeout, &mut handle).await {
			| Ok(Ok(())) => Ok(()),
			| Ok(Err(err)) => {
				warn!(error = %err, "Event loop task failed");
				Err(RouterError::EventLoop(err.to_string()))
			}
			| Err(_) => {
				warn!(
					timeout = ?self.shutdown_timeout,
					"Event loop did not stop in time, aborting it"
				);
				handle.abort();
				Ok(())
			}
		}
	}

	/// Replaces the session with a new one built from `config`.
	///
	/// The router is shared by both sessions, but its pattern tree is
	/// cleared in between: consumers have to subscribe again.
	pub async fn reconfigure(
		self,
		config: &RouterConfig,
	) -> Result<MqttConnection, RouterError> {
		let router = self.router.clone();
		self.shutdown().await?;
		router.connect(config).await
	}
}

impl std::fmt::Debug for MqttConnection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MqttConnection")
			.field("router", &self.router)
			.field("running", &self.event_loop_handle.is_some())
			.finish()
	}
}

impl Drop for MqttConnection {
	fn drop(&mut self) {
		if self.event_loop_handle.is_some() {
			error!(
				"MqttConnection dropped without calling shutdown(). Please \
				 call shutdown() and await its completion before dropping."
			);
		}
	}
}
