//! Configuration for connecting a router to the broker

use std::time::Duration;

use rumqttc::{MqttOptions, QoS, Transport};
use serde::Deserialize;
use uuid::Uuid;

use super::error::RouterError;

/// Network transport used to reach the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportScheme {
	/// Plain MQTT over TCP
	Tcp,
	/// MQTT over TLS
	Tls,
	/// MQTT over WebSocket
	#[default]
	Ws,
	/// MQTT over secure WebSocket
	Wss,
}

/// Broker address and credentials.
///
/// Deserializes from the `mqtt` section of the dashboard configuration;
/// every field has a default so a partial section is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
	/// Broker host name
	#[serde(alias = "broker_address")]
	pub host: String,
	/// Broker port
	#[serde(alias = "broker_ws_port")]
	pub port: u16,
	/// Transport to use
	#[serde(alias = "ws_protocol")]
	pub scheme: TransportScheme,
	/// Request path for WebSocket transports
	pub ws_path: String,
	/// Optional user name
	pub username: Option<String>,
	/// Optional password, only sent together with a user name
	pub password: Option<String>,
	/// Keep-alive interval in seconds
	pub keep_alive_secs: u64,
	/// MQTT client id; generated when not set
	pub client_id: Option<String>,
}

impl Default for BrokerConfig {
	fn default() -> Self {
		Self {
			host: "localhost".to_string(),
			port: 9001,
			scheme: TransportScheme::Ws,
			ws_path: "/mqtt".to_string(),
			username: None,
			password: None,
			keep_alive_secs: 2 * 60,
			client_id: None,
		}
	}
}

impl BrokerConfig {
	/// Creates a config for `host:port` with default settings otherwise
	pub fn new(host: impl Into<String>, port: u16, scheme: TransportScheme) -> Self {
		Self {
			host: host.into(),
			port,
			scheme,
			..Self::default()
		}
	}

	/// Address handed to rumqttc: the bare host for TCP/TLS, a full URL for
	/// WebSocket transports.
	pub fn broker_address(&self) -> String {
		match self.scheme {
			| TransportScheme::Tcp | TransportScheme::Tls => self.host.clone(),
			| TransportScheme::Ws | TransportScheme::Wss => {
				let scheme = if self.scheme == TransportScheme::Ws {
					"ws"
				} else {
					"wss"
				};
				let path = if self.ws_path.starts_with('/') {
					self.ws_path.clone()
				} else {
					format!("/{}", self.ws_path)
				};
				format!("{scheme}://{}:{}{path}", self.host, self.port)
			}
		}
	}
}

/// Router-level performance and behavior settings
#[derive(Debug, Clone)]
pub struct RouterSettings {
	/// Size of the parsed-topic LRU cache (0 disables it)
	pub topic_cache_size: usize,
	/// Capacity of the rumqttc request channel
	pub event_loop_capacity: usize,
	/// QoS used for broker subscriptions
	pub subscribe_qos: QoS,
	/// Time allowed for the initial broker handshake
	pub connection_timeout_millis: u64,
	/// Consecutive transport errors after which the event loop gives up
	pub max_consecutive_errors: u32,
	/// Buffered lifecycle events per listener
	pub event_channel_capacity: usize,
}

impl Default for RouterSettings {
	fn default() -> Self {
		Self {
			topic_cache_size: 100,
			event_loop_capacity: 10,
			subscribe_qos: QoS::AtMostOnce,
			connection_timeout_millis: 5000,
			max_consecutive_errors: 10,
			event_channel_capacity: 16,
		}
	}
}

/// Configuration for [`MqttRouter::connect`](crate::MqttRouter::connect)
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
	/// Broker address and credentials
	pub broker: BrokerConfig,
	/// Router behavior settings
	pub settings: RouterSettings,
}

impl RouterConfig {
	/// Create config with default settings
	pub fn new(broker: BrokerConfig) -> Self {
		Self {
			broker,
			settings: RouterSettings::default(),
		}
	}

	/// Create config for a plain TCP broker on localhost:1883
	pub fn localhost() -> Self {
		Self::new(BrokerConfig::new("localhost", 1883, TransportScheme::Tcp))
	}

	/// Checks values rumqttc would reject or silently misuse
	pub fn validate(&self) -> Result<(), RouterError> {
		if self.broker.host.trim().is_empty() {
			return Err(RouterError::ConfigurationValue(
				"broker host must not be empty".to_string(),
			));
		}
		if self.broker.port == 0 {
			return Err(RouterError::ConfigurationValue(
				"broker port must be greater than 0".to_string(),
			));
		}
		if self.broker.password.is_some() && self.broker.username.is_none() {
			return Err(RouterError::ConfigurationValue(
				"password given without username".to_string(),
			));
		}
		if self.settings.event_loop_capacity == 0
			|| self.settings.event_channel_capacity == 0
		{
			return Err(RouterError::ConfigurationValue(
				"channel capacities must be greater than 0".to_string(),
			));
		}
		Ok(())
	}

	/// Builds rumqttc connection options
	pub fn to_mqtt_options(&self) -> Result<MqttOptions, RouterError> {
		self.validate()?;
		let broker = &self.broker;
		let client_id = broker.client_id.clone().unwrap_or_else(generate_client_id);

		let mut options =
			MqttOptions::new(client_id, broker.broker_address(), broker.port);
		options.set_keep_alive(Duration::from_secs(broker.keep_alive_secs));
		if let Some(username) = &broker.username {
			options.set_credentials(
				username.clone(),
				broker.password.clone().unwrap_or_default(),
			);
		}
		match broker.scheme {
			| TransportScheme::Tcp => {}
			| TransportScheme::Tls => {
				options.set_transport(Transport::tls_with_default_config());
			}
			| TransportScheme::Ws => {
				options.set_transport(Transport::Ws);
			}
			| TransportScheme::Wss => {
				options.set_transport(Transport::wss_with_default_config());
			}
		}
		Ok(options)
	}
}

fn generate_client_id() -> String {
	let uuid = Uuid::new_v4().simple().to_string();
	format!("topic-router-{}", &uuid[..8])
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_match_dashboard() {
		let broker = BrokerConfig::default();
		assert_eq!(broker.host, "localhost");
		assert_eq!(broker.port, 9001);
		assert_eq!(broker.scheme, TransportScheme::Ws);
		assert_eq!(broker.keep_alive_secs, 120);
		assert_eq!(broker.broker_address(), "ws://localhost:9001/mqtt");
	}

	#[test]
	fn test_deserialize_dashboard_section() {
		let broker: BrokerConfig = serde_json::from_str(
			r#"{
				"broker_address": "leader.local",
				"broker_ws_port": 9443,
				"ws_protocol": "wss",
				"username": "pioreactor",
				"password": "raspberry"
			}"#,
		)
		.unwrap();

		assert_eq!(broker.host, "leader.local");
		assert_eq!(broker.port, 9443);
		assert_eq!(broker.scheme, TransportScheme::Wss);
		assert_eq!(broker.username.as_deref(), Some("pioreactor"));
		assert_eq!(broker.broker_address(), "wss://leader.local:9443/mqtt");
	}

	#[test]
	fn test_partial_section_uses_defaults() {
		let broker: BrokerConfig =
			serde_json::from_str(r#"{"host": "10.0.0.2"}"#).unwrap();
		assert_eq!(broker.host, "10.0.0.2");
		assert_eq!(broker.port, 9001);
		assert_eq!(broker.username, None);
	}

	#[test]
	fn test_tcp_address_is_bare_host() {
		let broker = BrokerConfig::new("broker", 1883, TransportScheme::Tcp);
		assert_eq!(broker.broker_address(), "broker");

		let mut ws = BrokerConfig::new("broker", 8080, TransportScheme::Ws);
		ws.ws_path = "ws".to_string();
		assert_eq!(ws.broker_address(), "ws://broker:8080/ws");
	}

	#[test]
	fn test_validate() {
		assert!(RouterConfig::localhost().validate().is_ok());

		let mut config = RouterConfig::localhost();
		config.broker.port = 0;
		assert!(matches!(
			config.validate(),
			Err(RouterError::ConfigurationValue(_))
		));

		let mut config = RouterConfig::localhost();
		config.broker.password = Some("secret".to_string());
		assert!(config.validate().is_err());

		let mut config = RouterConfig::localhost();
		config.broker.host = " ".to_string();
		assert!(config.to_mqtt_options().is_err());
	}

	#[test]
	fn test_mqtt_options() {
		let mut config = RouterConfig::localhost();
		config.broker.client_id = Some("dashboard".to_string());
		config.broker.keep_alive_secs = 30;

		let options = config.to_mqtt_options().unwrap();
		assert_eq!(options.client_id(), "dashboard");
		assert_eq!(options.broker_address(), ("localhost".to_string(), 1883));
		assert_eq!(options.keep_alive(), Duration::from_secs(30));
	}
}
