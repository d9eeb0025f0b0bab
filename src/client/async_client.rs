use std::time::Duration;

use rumqttc::Packet::{self, Disconnect, Publish};
use rumqttc::{
	AsyncClient, ConnAck, ConnectReturnCode, ConnectionError, EventLoop,
};
use rumqttc::{Event::Incoming, Event::Outgoing};
use tokio::time;
use tracing::{debug, error, info, warn};

use super::config::RouterConfig;
use super::error::{ConnectionEstablishmentError, Result, RouterError};
use super::router::MqttRouter;
use crate::connection::{
	MqttConnection, MqttTransport, SessionId, TransportEvent,
	LOCAL_DISCONNECT_REASON,
};

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(100);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

impl MqttRouter<MqttTransport> {
	/// Connects this router to the broker described by `config`.
	///
	/// Any previous connection of this router is torn down first, so the
	/// new session starts with an empty pattern tree. Waits for the
	/// broker's CONNACK, then spawns the task that feeds broker events into
	/// the router. Events of the replaced connection's loop are ignored
	/// from here on.
	pub async fn connect(
		&self,
		config: &RouterConfig,
	) -> Result<MqttConnection> {
		let options = config.to_mqtt_options()?;
		let settings = &config.settings;
		let (client, new_event_loop) =
			AsyncClient::new(options, settings.event_loop_capacity);
		let session = self.attach_to_broker(
			MqttTransport::new(client, settings.subscribe_qos),
			config.broker.broker_address(),
		);

		let timeout_millis = settings.connection_timeout_millis;
		let connection_timeout = Duration::from_millis(timeout_millis);
		let established = time::timeout(
			connection_timeout,
			establish_connection(new_event_loop),
		)
		.await
		.map_err(|_| ConnectionEstablishmentError::Timeout { timeout_millis })
		.and_then(|result| result);

		let connected_event_loop = match established {
			| Ok(event_loop) => event_loop,
			| Err(err) => {
				self.handle_session_event(
					session,
					TransportEvent::Error(err.to_string()),
				);
				self.handle_session_event(session, TransportEvent::Closed);
				return Err(RouterError::ConnectionEstablishment(err));
			}
		};
		self.handle_session_event(session, TransportEvent::Connected);

		let router = self.clone();
		let max_consecutive_errors = settings.max_consecutive_errors;
		let event_loop_handle = tokio::spawn(async move {
			let driver = SessionDriver { router, session };
			run(connected_event_loop, driver, max_consecutive_errors).await;
		});
		Ok(MqttConnection::new(
			self.clone(),
			event_loop_handle,
			connection_timeout,
		))
	}
}

async fn establish_connection(
	mut event_loop: EventLoop,
) -> std::result::Result<EventLoop, ConnectionEstablishmentError> {
	loop {
		match event_loop.poll().await {
			| Ok(Incoming(Packet::ConnAck(ConnAck { code, .. }))) => {
				if code == ConnectReturnCode::Success {
					debug!("MQTT connection established successfully");
					return Ok(event_loop);
				} else {
					debug!(code = ?code, "MQTT connection rejected by broker");
					return Err(ConnectionEstablishmentError::BrokerRejected {
						code,
					});
				}
			}
			| Ok(notification) => {
				debug!(
					notification = ?notification,
					"Bootstrap phase notification"
				);
			}
			| Err(connection_err) => {
				debug!(
					error = %connection_err,
					"MQTT connection error during bootstrap phase"
				);
				return Err(ConnectionEstablishmentError::Network(
					connection_err,
				));
			}
		}
	}
}

/// Human readable reason for a transport error.
///
/// A closed request channel means our own client went away, which is the
/// local disconnect case.
fn error_reason(err: &ConnectionError) -> String {
	match err {
		| ConnectionError::RequestsDone => LOCAL_DISCONNECT_REASON.to_string(),
		| other => other.to_string(),
	}
}

fn retry_delay(error_count: u32) -> Duration {
	let exponent = error_count.saturating_sub(1).min(10);
	let delay = INITIAL_RETRY_DELAY * 2_u32.pow(exponent);
	delay.min(MAX_RETRY_DELAY)
}

/// Router handle of one event loop, tagged with the session it drives
struct SessionDriver {
	router: MqttRouter<MqttTransport>,
	session: SessionId,
}

impl SessionDriver {
	fn handle_event(&self, event: TransportEvent) {
		self.router.handle_session_event(self.session, event);
	}

	fn is_replaced(&self) -> bool {
		self.router.session_id() != self.session
	}
}

/// Feeds broker events into the router until a DISCONNECT is seen in
/// either direction or too many consecutive errors occur.
async fn run(
	mut event_loop: EventLoop,
	driver: SessionDriver,
	max_consecutive_errors: u32,
) {
	let mut error_count = 0;

	loop {
		let polled = event_loop.poll().await;
		if driver.is_replaced() {
			info!(
				session = %driver.session,
				"Session replaced, stopping event loop"
			);
			break;
		}
		match polled {
			| Ok(Incoming(Packet::ConnAck(ConnAck {
				session_present,
				code: ConnectReturnCode::Success,
			}))) => {
				error_count = 0;
				info!(session_present, "MQTT reconnected");
				driver.handle_event(TransportEvent::Connected);
			}
			| Ok(Incoming(Packet::ConnAck(ConnAck { code, .. }))) => {
				warn!(code = ?code, "Broker rejected reconnection");
				driver.handle_event(TransportEvent::Error(format!(
					"broker rejected connection: {code:?}"
				)));
			}
			| Ok(Incoming(Publish(p))) => {
				error_count = 0;
				debug!(
					topic = %p.topic,
					payload_size = p.payload.len(),
					"Received MQTT message"
				);
				driver.handle_event(TransportEvent::Message {
					topic: p.topic,
					payload: p.payload,
				});
			}
			| Ok(Incoming(Disconnect)) => {
				info!("Received MQTT Disconnect packet from server");
				driver.handle_event(TransportEvent::Closed);
				break;
			}
			| Ok(Outgoing(rumqttc::Outgoing::Disconnect)) => {
				info!("Sent MQTT Disconnect packet to server");
				break;
			}
			| Ok(notification) => {
				error_count = 0;
				debug!(
					notification = ?notification,
					"Received OTHER MQTT notification"
				);
			}
			| Err(err) => {
				error_count += 1;
				error!(
					error_count = error_count,
					error = %err,
					"MQTT event loop error"
				);
				let local = matches!(err, ConnectionError::RequestsDone);
				driver.handle_event(TransportEvent::Error(error_reason(&err)));

				if local || error_count >= max_consecutive_errors {
					if !local {
						error!(
							error_count = error_count,
							max_errors = max_consecutive_errors,
							"Too many consecutive errors, terminating event \
							 loop"
						);
					}
					driver.handle_event(TransportEvent::Closed);
					break;
				}

				let delay = retry_delay(error_count);
				warn!(
					delay = ?delay,
					error_count = error_count,
					"Retrying MQTT connection"
				);
				time::sleep(delay).await;
			}
		}
	}
	info!("MQTT event loop terminated");
}
