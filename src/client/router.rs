use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arcstr::ArcStr;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use super::config::RouterSettings;
use super::error::{Result, RouterError};
use crate::connection::{
	BrokerTransport, ConnectionEvent, ConnectionState, ErrorNotifier,
	MqttTransport, SessionId, TransportEvent,
};
use crate::payload::{PayloadKind, PayloadValue};
use crate::routing::{
	CacheStrategy, DispatchReport, Dispatcher, Handler, HandlerResult,
	SubscriberKey, SubscriptionId,
};
use crate::topic::{validation, TopicPatternPath};

/// Client-side topic router bound to one broker session.
///
/// Owns the pattern tree, the attached transport and the connection state.
/// Cloning is cheap and every clone drives the same router, so it can be
/// handed to every consumer that subscribes.
///
/// All tree mutation goes through [`subscribe`](Self::subscribe),
/// [`unsubscribe`](Self::unsubscribe) and [`close`](Self::close).
pub struct MqttRouter<T: BrokerTransport = MqttTransport> {
	inner: Arc<RouterInner<T>>,
}

struct RouterInner<T> {
	dispatcher: Dispatcher,
	session: Mutex<Session<T>>,
	state: watch::Sender<ConnectionState>,
	events: broadcast::Sender<ConnectionEvent>,
	settings: RouterSettings,
}

struct Session<T> {
	id: SessionId,
	transport: Option<Arc<T>>,
	notifier: ErrorNotifier,
}

impl<T: BrokerTransport> Clone for MqttRouter<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T: BrokerTransport> std::fmt::Debug for MqttRouter<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MqttRouter")
			.field("state", &self.state())
			.field("dispatcher", &self.inner.dispatcher)
			.finish()
	}
}

impl<T: BrokerTransport> Default for MqttRouter<T> {
	fn default() -> Self {
		Self::new(RouterSettings::default())
	}
}

impl<T: BrokerTransport> MqttRouter<T> {
	/// Creates an uninitialized router with an empty pattern tree
	pub fn new(settings: RouterSettings) -> Self {
		let (state, _) = watch::channel(ConnectionState::Uninitialized);
		let (events, _) =
			broadcast::channel(settings.event_channel_capacity.max(1));
		Self {
			inner: Arc::new(RouterInner {
				dispatcher: Dispatcher::new(CacheStrategy::from_size(
					settings.topic_cache_size,
				)),
				session: Mutex::new(Session {
					id: SessionId::first(),
					transport: None,
					notifier: ErrorNotifier::new(),
				}),
				state,
				events,
				settings,
			}),
		}
	}

	/// Settings the router was created with
	pub fn settings(&self) -> &RouterSettings {
		&self.inner.settings
	}

	/// Current connection state
	pub fn state(&self) -> ConnectionState {
		*self.inner.state.borrow()
	}

	/// Id of the most recently attached session
	pub fn session_id(&self) -> SessionId {
		self.session().id
	}

	/// Receiver that observes every state change
	pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
		self.inner.state.subscribe()
	}

	/// Receiver for `connected` / `error` / `closed` notifications
	pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
		self.inner.events.subscribe()
	}

	fn session(&self) -> MutexGuard<'_, Session<T>> {
		self.inner
			.session
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
	}

	fn set_state(&self, state: ConnectionState) -> ConnectionState {
		let previous = self.inner.state.send_replace(state);
		if previous != state {
			debug!(from = %previous, to = %state, "Connection state changed");
		}
		previous
	}

	fn emit(&self, event: ConnectionEvent) {
		// No listeners is fine
		let _ = self.inner.events.send(event);
	}

	/// Attaches a freshly configured transport and moves to `Connecting`.
	///
	/// A previously attached transport is torn down first, so the new
	/// connection starts with an empty pattern tree. Returns the id the
	/// connection driver passes to [`handle_session_event`] so that a
	/// replaced driver cannot disturb the new session.
	///
	/// [`handle_session_event`]: Self::handle_session_event
	pub fn attach(&self, transport: T) -> SessionId {
		self.attach_with_notifier(transport, ErrorNotifier::new())
	}

	/// Like [`attach`](Self::attach), with error notices naming
	/// `broker_address`.
	pub fn attach_to_broker(
		&self,
		transport: T,
		broker_address: impl Into<String>,
	) -> SessionId {
		let notifier = ErrorNotifier::for_broker(broker_address);
		self.attach_with_notifier(transport, notifier)
	}

	fn attach_with_notifier(
		&self,
		transport: T,
		notifier: ErrorNotifier,
	) -> SessionId {
		let mut session = self.session();
		if session.transport.is_some() {
			info!("Replacing existing broker connection");
			self.teardown(&mut session);
		}
		session.id = session.id.next();
		session.transport = Some(Arc::new(transport));
		session.notifier = notifier;
		self.set_state(ConnectionState::Connecting);
		debug!(session = %session.id, "Transport attached");
		session.id
	}

	/// Feeds one event for the current session into the router.
	pub fn handle_event(&self, event: TransportEvent) {
		self.route_event(None, event);
	}

	/// Feeds one event from the driver of session `id` into the router.
	///
	/// Events of a session that has since been replaced or closed are
	/// dropped.
	pub fn handle_session_event(&self, id: SessionId, event: TransportEvent) {
		self.route_event(Some(id), event);
	}

	fn route_event(&self, origin: Option<SessionId>, event: TransportEvent) {
		match event {
			| TransportEvent::Connected => self.on_connected(origin),
			| TransportEvent::Message { topic, payload } => {
				if self.is_current(&self.session(), origin) {
					self.dispatch(&topic, &payload);
				}
			}
			| TransportEvent::Error(reason) => self.on_error(origin, &reason),
			| TransportEvent::Closed => self.close_session(origin),
		}
	}

	fn is_current(
		&self,
		session: &Session<T>,
		origin: Option<SessionId>,
	) -> bool {
		match origin {
			| Some(id) if id != session.id => {
				debug!(
					session = %id,
					current = %session.id,
					"Dropping event from a replaced session"
				);
				false
			}
			| _ => true,
		}
	}

	fn on_connected(&self, origin: Option<SessionId>) {
		let session = self.session();
		if !self.is_current(&session, origin) {
			return;
		}
		let Some(transport) = session.transport.clone() else {
			debug!("Ignoring connected event without an attached transport");
			return;
		};
		let previous = self.set_state(ConnectionState::Connected);
		info!(previous_state = %previous, "Connected to MQTT broker");

		// Registrations survive a transport-level reconnect; the broker
		// side has to be told about them again.
		let patterns = self.inner.dispatcher.active_patterns();
		if !patterns.is_empty() {
			if let Err(err) = transport.subscribe_many(&patterns) {
				error!(
					patterns = patterns.len(),
					error = %err,
					"Failed to resubscribe"
				);
			}
		}
		drop(session);
		self.emit(ConnectionEvent::Connected);
	}

	fn on_error(&self, origin: Option<SessionId>, reason: &str) {
		let mut session = self.session();
		if !self.is_current(&session, origin) {
			return;
		}
		if session.transport.is_none() {
			debug!(
				reason = %reason,
				"Ignoring transport error without an attached transport"
			);
			return;
		}
		self.set_state(ConnectionState::Error);
		let notice = session.notifier.notify(reason);
		drop(session);

		if let Some(message) = notice {
			error!(reason = %reason, "MQTT connection error");
			self.emit(ConnectionEvent::Error(message));
		}
	}

	/// Ends the transport and clears every registration.
	///
	/// Idempotent. Handlers removed here are never invoked for messages
	/// dispatched after this returns.
	pub fn close(&self) {
		self.close_session(None);
	}

	fn close_session(&self, origin: Option<SessionId>) {
		let mut session = self.session();
		if !self.is_current(&session, origin) {
			return;
		}
		let previous = self.state();
		if previous == ConnectionState::Closed && session.transport.is_none() {
			return;
		}
		self.teardown(&mut session);
		drop(session);
		info!(previous_state = %previous, "MQTT connection closed");
		self.emit(ConnectionEvent::Closed);
	}

	fn teardown(&self, session: &mut Session<T>) {
		if let Some(transport) = session.transport.take() {
			if let Err(err) = transport.disconnect() {
				debug!(
					error = %err,
					"Disconnect request failed during teardown"
				);
			}
		}
		self.inner.dispatcher.clear();
		session.notifier.reset();
		self.set_state(ConnectionState::Closed);
	}

	/// Registers an anonymous callback on `pattern`.
	///
	/// Anonymous registrations share one slot per pattern, so subscribing
	/// again on the same pattern replaces the previous callback.
	pub fn subscribe<F>(
		&self,
		pattern: &str,
		callback: F,
	) -> Result<SubscriptionId>
	where
		F: Fn(&str, &[u8]) + Send + Sync + 'static,
	{
		self.subscribe_handler(
			SubscriberKey::anonymous(),
			pattern,
			Handler::infallible(callback),
		)
	}

	/// Registers `callback` on `pattern` on behalf of `subscriber`.
	///
	/// Replaces only this subscriber's previous callback on the pattern.
	pub fn subscribe_as<F>(
		&self,
		subscriber: impl Into<SubscriberKey>,
		pattern: &str,
		callback: F,
	) -> Result<SubscriptionId>
	where
		F: Fn(&str, &[u8]) -> HandlerResult + Send + Sync + 'static,
	{
		self.subscribe_handler(
			subscriber.into(),
			pattern,
			Handler::new(callback),
		)
	}

	/// Registers a callback that receives payloads decoded as `kind`.
	///
	/// A payload that fails to decode counts as a handler failure and is
	/// logged by the dispatcher; the callback is not invoked for it.
	pub fn subscribe_decoded<F>(
		&self,
		subscriber: impl Into<SubscriberKey>,
		pattern: &str,
		kind: PayloadKind,
		callback: F,
	) -> Result<SubscriptionId>
	where
		F: Fn(&str, PayloadValue) -> HandlerResult + Send + Sync + 'static,
	{
		let handler = Handler::new(move |topic, payload| {
			let value = kind.decode(payload)?;
			callback(topic, value)
		});
		self.subscribe_handler(subscriber.into(), pattern, handler)
	}

	/// Registers a prepared [`Handler`].
	///
	/// Fails with [`RouterError::NotConnected`] unless the router is
	/// connected, and with a topic error for malformed patterns. The broker
	/// subscription is requested only for the first handler on a pattern.
	pub fn subscribe_handler(
		&self,
		subscriber: SubscriberKey,
		pattern: &str,
		handler: Handler,
	) -> Result<SubscriptionId> {
		let pattern = parse_pattern(pattern)?;
		let session = self.session();
		let state = self.state();
		let transport = match (&session.transport, state) {
			| (Some(transport), ConnectionState::Connected) => {
				Arc::clone(transport)
			}
			| _ => return Err(RouterError::not_connected(state)),
		};

		let mqtt_pattern = pattern.mqtt_pattern();
		let outcome = self
			.inner
			.dispatcher
			.register(subscriber.clone(), pattern, handler);
		if outcome.needs_subscribe {
			if let Err(err) = transport.subscribe(&mqtt_pattern) {
				warn!(
					pattern = %mqtt_pattern,
					error = %err,
					"Broker subscribe failed, rolling back registration"
				);
				let _ = self.inner.dispatcher.remove_subscription(outcome.id);
				return Err(err.into());
			}
		}
		debug!(
			subscription_id = %outcome.id,
			subscriber = %subscriber,
			pattern = %mqtt_pattern,
			replaced = ?outcome.replaced,
			"Subscribed"
		);
		Ok(outcome.id)
	}

	/// Removes every handler registered on exactly `pattern`.
	///
	/// Unknown patterns are a no-op. Wildcards are matched literally, so
	/// `a/+` removes the `a/+` registration, not `a/b`.
	pub fn unsubscribe(&self, pattern: &str) -> Result<()> {
		let pattern = parse_pattern(pattern)?;
		self.unsubscribe_with(|dispatcher| {
			dispatcher.remove_pattern(&pattern).into_iter().collect()
		})
		.map(|_| ())
	}

	/// Removes `subscriber`'s handler on `pattern`, leaving other
	/// subscribers on the same pattern in place.
	pub fn unsubscribe_as(
		&self,
		subscriber: impl Into<SubscriberKey>,
		pattern: &str,
	) -> Result<()> {
		let pattern = parse_pattern(pattern)?;
		let subscriber = subscriber.into();
		self.unsubscribe_with(|dispatcher| {
			dispatcher
				.remove_subscriber_pattern(&subscriber, &pattern)
				.into_iter()
				.collect()
		})
		.map(|_| ())
	}

	/// Removes every handler owned by `subscriber` and returns how many
	/// patterns it held.
	pub fn unsubscribe_subscriber(
		&self,
		subscriber: impl Into<SubscriberKey>,
	) -> Result<usize> {
		let subscriber = subscriber.into();
		self.unsubscribe_with(|dispatcher| {
			dispatcher.remove_subscriber(&subscriber)
		})
	}

	/// Removes a single registration by id.
	pub fn remove_subscription(&self, id: SubscriptionId) -> Result<()> {
		let mut lookup_error = None;
		self.unsubscribe_with(|dispatcher| {
			match dispatcher.remove_subscription(id) {
				| Ok(outcome) => vec![outcome],
				| Err(err) => {
					lookup_error = Some(err);
					Vec::new()
				}
			}
		})?;
		match lookup_error {
			| Some(err) => Err(err.into()),
			| None => Ok(()),
		}
	}

	fn unsubscribe_with<F>(&self, remove: F) -> Result<usize>
	where F: FnOnce(&Dispatcher) -> Vec<crate::routing::RemoveOutcome> {
		let session = self.session();
		let state = self.state();
		if !state.has_transport() {
			return Err(RouterError::not_connected(state));
		}

		let outcomes = remove(&self.inner.dispatcher);
		let Some(transport) = session.transport.as_ref() else {
			return Ok(outcomes.len());
		};

		let mut first_error = None;
		for outcome in outcomes.iter().filter(|outcome| outcome.now_empty) {
			let pattern = outcome.pattern.mqtt_pattern();
			debug!(pattern = %pattern, "Unsubscribing from broker");
			if let Err(err) = transport.unsubscribe(&pattern) {
				warn!(
					pattern = %pattern,
					error = %err,
					"Broker unsubscribe failed"
				);
				first_error.get_or_insert(err);
			}
		}
		match first_error {
			| Some(err) => Err(err.into()),
			| None => Ok(outcomes.len()),
		}
	}

	/// Delivers one inbound message to every matching handler.
	pub fn dispatch(&self, topic: &str, payload: &[u8]) -> DispatchReport {
		let report = self.inner.dispatcher.dispatch(topic, payload);
		debug!(
			topic = %topic,
			payload_size = payload.len(),
			matched = report.matched,
			failed = report.failed,
			"Dispatched message"
		);
		report
	}

	/// Patterns that currently have at least one handler
	pub fn active_patterns(&self) -> Vec<ArcStr> {
		self.inner.dispatcher.active_patterns()
	}

	/// Patterns owned by `subscriber`
	pub fn patterns_of(
		&self,
		subscriber: impl Into<SubscriberKey>,
	) -> Vec<ArcStr> {
		self.inner.dispatcher.patterns_of(&subscriber.into())
	}

	/// Number of live registrations
	pub fn subscription_count(&self) -> usize {
		self.inner.dispatcher.len()
	}
}

fn parse_pattern(pattern: &str) -> Result<TopicPatternPath> {
	validation::validate_pattern_for_subscription(pattern)?;
	Ok(TopicPatternPath::new_from_string(pattern)?)
}
