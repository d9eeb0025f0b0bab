//! Logs every message published on the given topic patterns.
//!
//! ```bash
//! RUST_LOG=info cargo run --example monitor -- 'pioreactor/+/+/temperature_automation/#'
//! ```
//!
//! Broker settings come from the environment (or `demos/.env`):
//! `MQTT_BROKER_HOST`, `MQTT_BROKER_PORT`, `MQTT_BROKER_SCHEME`
//! (`tcp`, `tls`, `ws`, `wss`), `MQTT_USERNAME`, `MQTT_PASSWORD`.

use std::env;

use mqtt_topic_router::prelude::*;
use mqtt_topic_router::TransportScheme;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn setup_tracing() {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| "info".into());
	tracing_subscriber::registry()
		.with(filter)
		.with(tracing_subscriber::fmt::layer().with_target(true).compact())
		.init();
}

fn broker_config() -> BrokerConfig {
	dotenv::from_filename("demos/.env").ok();
	dotenv::dotenv().ok();

	let mut broker = BrokerConfig::default();
	if let Ok(host) = env::var("MQTT_BROKER_HOST") {
		broker.host = host;
	}
	if let Some(port) = env::var("MQTT_BROKER_PORT")
		.ok()
		.and_then(|port| port.parse().ok())
	{
		broker.port = port;
	}
	match env::var("MQTT_BROKER_SCHEME").as_deref() {
		| Ok("tcp") => broker.scheme = TransportScheme::Tcp,
		| Ok("tls") => broker.scheme = TransportScheme::Tls,
		| Ok("ws") => broker.scheme = TransportScheme::Ws,
		| Ok("wss") => broker.scheme = TransportScheme::Wss,
		| Ok(other) => warn!(scheme = %other, "Unknown scheme, using default"),
		| Err(_) => {}
	}
	broker.username = env::var("MQTT_USERNAME").ok();
	broker.password = env::var("MQTT_PASSWORD").ok();
	broker
}

#[tokio::main]
async fn main() -> Result<()> {
	setup_tracing();

	let mut patterns: Vec<String> = env::args().skip(1).collect();
	if patterns.is_empty() {
		patterns.push("#".to_string());
	}

	let config = RouterConfig::new(broker_config());
	info!(address = %config.broker.broker_address(), "Connecting");

	let connection = MqttConnection::open(&config).await?;
	let router = connection.router().clone();

	let mut events = router.events();
	tokio::spawn(async move {
		while let Ok(event) = events.recv().await {
			match event {
				| ConnectionEvent::Connected => info!("Connected"),
				| ConnectionEvent::Error(message) => error!("{message}"),
				| ConnectionEvent::Closed => {
					info!("Connection closed");
					break;
				}
			}
		}
	});

	for pattern in &patterns {
		router.subscribe_as("monitor", pattern, |topic, payload| {
			info!(
				topic = %topic,
				payload = %String::from_utf8_lossy(payload),
				"Message"
			);
			Ok(())
		})?;
		info!(pattern = %pattern, "Subscribed");
	}

	if tokio::signal::ctrl_c().await.is_err() {
		warn!("Failed to listen for Ctrl-C, shutting down");
	}
	connection.shutdown().await?;
	Ok(())
}
