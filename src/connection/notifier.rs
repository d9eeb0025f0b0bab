use tracing::debug;

use super::transport::LOCAL_DISCONNECT_REASON;

/// Turns a stream of transport error reasons into user-visible
/// notifications.
///
/// Deliberate local disconnects are dropped, and a reason identical to the
/// last one reported in this session is not reported again, so a flapping
/// connection produces a single notice.
///
/// When the broker address is known it is appended to the notice, so the
/// user can tell a wrong address from a broker that is down.
#[derive(Debug, Default)]
pub struct ErrorNotifier {
	last_reported: Option<String>,
	broker_address: Option<String>,
}

impl ErrorNotifier {
	/// Creates a notifier that has reported nothing yet
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a notifier whose notices name `broker_address`
	pub fn for_broker(broker_address: impl Into<String>) -> Self {
		Self {
			last_reported: None,
			broker_address: Some(broker_address.into()),
		}
	}

	/// Broker address named in notices, if any
	pub fn broker_address(&self) -> Option<&str> {
		self.broker_address.as_deref()
	}

	/// Returns the notification text for `reason`, or `None` if it must
	/// not be shown.
	pub fn notify(&mut self, reason: &str) -> Option<String> {
		if is_local_disconnect(reason) {
			debug!(reason = %reason, "Suppressed local disconnect error");
			return None;
		}
		if self.last_reported.as_deref() == Some(reason) {
			debug!(reason = %reason, "Suppressed repeated connection error");
			return None;
		}
		self.last_reported = Some(reason.to_string());
		let notice = match &self.broker_address {
			| Some(address) => format!(
				"MQTT connection error: {reason}. Is configuration for \
				 mqtt.broker_address correct? Currently set to {address}"
			),
			| None => format!("MQTT connection error: {reason}"),
		};
		Some(notice)
	}

	/// Forgets the last reported reason; used when a session ends.
	pub fn reset(&mut self) {
		self.last_reported = None;
	}
}

/// Returns true for reasons produced by an intentional local teardown.
pub fn is_local_disconnect(reason: &str) -> bool {
	reason == LOCAL_DISCONNECT_REASON
}
