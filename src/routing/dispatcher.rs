//! Inbound message dispatch.
//!
//! The dispatcher owns the subscription registry behind a single lock. Each
//! dispatch takes the lock only long enough to compute the match and clone
//! the matched handlers, then invokes them with the lock released. This
//! gives the two guarantees callers rely on:
//!
//! - a handler removed before `dispatch` starts is never invoked for that
//!   message (removal is a synchronization point);
//! - handlers may subscribe or unsubscribe from inside their callback
//!   without deadlocking.

use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arcstr::ArcStr;
use lru::LruCache;
use tracing::{debug, error, warn};

use super::error::RegistryError;
use super::handler::{Handler, HandlerError, SubscriberKey};
use super::subscription_registry::{
	AddOutcome, RemoveOutcome, SubscriptionId, SubscriptionRegistry,
};
use crate::topic::{TopicPath, TopicPatternPath};

/// Caching of parsed inbound topics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStrategy {
	/// Keep up to N parsed topics in an LRU cache
	Lru(NonZeroUsize),
	/// Parse every inbound topic
	NoCache,
}

impl CacheStrategy {
	/// LRU cache of `size` topics, or no cache for `0`
	pub fn from_size(size: usize) -> Self {
		NonZeroUsize::new(size)
			.map_or(CacheStrategy::NoCache, CacheStrategy::Lru)
	}
}

impl Default for CacheStrategy {
	fn default() -> Self {
		CacheStrategy::from_size(100)
	}
}

/// Summary of one dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
	/// Handlers whose pattern matched the topic
	pub matched: usize,
	/// Handlers that returned an error or panicked
	pub failed: usize,
}

type MatchedHandler = (SubscriptionId, SubscriberKey, Handler);

/// Routes inbound messages to the handlers registered for their topic.
#[derive(Debug)]
pub struct Dispatcher {
	registry: Mutex<SubscriptionRegistry<Handler>>,
	topic_cache: Option<Mutex<LruCache<ArcStr, Arc<TopicPath>>>>,
}

impl Default for Dispatcher {
	fn default() -> Self {
		Self::new(CacheStrategy::default())
	}
}

impl Dispatcher {
	pub fn new(cache_strategy: CacheStrategy) -> Self {
		let topic_cache = match cache_strategy {
			| CacheStrategy::Lru(size) => Some(Mutex::new(LruCache::new(size))),
			| CacheStrategy::NoCache => None,
		};
		Self {
			registry: Mutex::new(SubscriptionRegistry::new()),
			topic_cache,
		}
	}

	fn registry(&self) -> MutexGuard<'_, SubscriptionRegistry<Handler>> {
		// Handlers never run under this lock
		self.registry.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Registers `handler` for `subscriber` on `pattern`, replacing that
	/// subscriber's previous handler on the same pattern.
	pub fn register(
		&self,
		subscriber: SubscriberKey,
		pattern: TopicPatternPath,
		handler: Handler,
	) -> AddOutcome {
		self.registry().add_subscription(subscriber, pattern, handler)
	}

	/// Removes every handler on exactly `pattern`.
	pub fn remove_pattern(
		&self,
		pattern: &TopicPatternPath,
	) -> Option<RemoveOutcome> {
		self.registry().remove_pattern(pattern)
	}

	/// Removes one subscriber's handler on `pattern`.
	pub fn remove_subscriber_pattern(
		&self,
		subscriber: &SubscriberKey,
		pattern: &TopicPatternPath,
	) -> Option<RemoveOutcome> {
		self.registry().remove_subscriber_pattern(subscriber, pattern)
	}

	/// Removes every handler owned by `subscriber`.
	pub fn remove_subscriber(
		&self,
		subscriber: &SubscriberKey,
	) -> Vec<RemoveOutcome> {
		self.registry().remove_subscriber(subscriber)
	}

	/// Removes a single registration.
	pub fn remove_subscription(
		&self,
		id: SubscriptionId,
	) -> Result<RemoveOutcome, RegistryError> {
		self.registry().remove_subscription(id)
	}

	/// Drops every registration and cached topic.
	pub fn clear(&self) {
		self.registry().clear();
		if let Some(cache) = &self.topic_cache {
			cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
		}
	}

	/// Unique patterns that currently have handlers
	pub fn active_patterns(&self) -> Vec<ArcStr> {
		self.registry().active_patterns()
	}

	/// Patterns currently owned by `subscriber`
	pub fn patterns_of(&self, subscriber: &SubscriberKey) -> Vec<ArcStr> {
		self.registry().patterns_of(subscriber)
	}

	/// Number of live registrations
	pub fn len(&self) -> usize {
		self.registry().len()
	}

	pub fn is_empty(&self) -> bool {
		self.registry().is_empty()
	}

	/// Handlers matching `topic`, cloned out of the registry.
	pub fn snapshot(&self, topic: &str) -> Vec<Handler> {
		let topic_path = self.topic_path(topic);
		self.registry()
			.matching(&topic_path)
			.into_iter()
			.cloned()
			.collect()
	}

	fn snapshot_entries(&self, topic: &TopicPath) -> Vec<MatchedHandler> {
		self.registry()
			.matching_entries(topic)
			.into_iter()
			.map(|(id, subscriber, handler)| {
				(id, subscriber.clone(), handler.clone())
			})
			.collect()
	}

	fn topic_path(&self, topic: &str) -> Arc<TopicPath> {
		let Some(cache) = &self.topic_cache else {
			return Arc::new(TopicPath::new(topic));
		};
		let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
		if let Some(path) = cache.get(topic) {
			return Arc::clone(path);
		}
		let path = Arc::new(TopicPath::new(topic));
		cache.put(path.path(), Arc::clone(&path));
		path
	}

	/// Invokes every handler matching `topic` with `(topic, payload)`.
	///
	/// Handlers run in match order. An error or panic in one handler is
	/// logged and does not stop the others.
	pub fn dispatch(&self, topic: &str, payload: &[u8]) -> DispatchReport {
		let topic_path = self.topic_path(topic);
		let handlers = self.snapshot_entries(&topic_path);
		let mut report = DispatchReport {
			matched: handlers.len(),
			failed: 0,
		};

		if handlers.is_empty() {
			debug!(topic = %topic, "No handlers registered for topic");
			return report;
		}

		for (id, subscriber, handler) in handlers {
			let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
				handler.call(topic, payload)
			}));
			let err = match outcome {
				| Ok(Ok(())) => continue,
				| Ok(Err(err)) => err,
				| Err(panic_payload) => {
					HandlerError::Panicked(panic_message(panic_payload.as_ref()))
				}
			};
			report.failed += 1;
			match &err {
				| HandlerError::Panicked(_) => error!(
					subscription_id = %id,
					subscriber = %subscriber,
					topic = %topic,
					error = %err,
					"Message handler panicked"
				),
				| _ => warn!(
					subscription_id = %id,
					subscriber = %subscriber,
					topic = %topic,
					payload_size = payload.len(),
					error = %err,
					"Message handler failed"
				),
			}
		}
		report
	}
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		(*message).to_string()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"non-string panic payload".to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	type Log = Arc<Mutex<Vec<String>>>;

	fn pattern(pattern: &str) -> TopicPatternPath {
		TopicPatternPath::new_from_string(pattern).unwrap()
	}

	fn recording(log: &Log, name: &'static str) -> Handler {
		let log = Arc::clone(log);
		Handler::infallible(move |topic, payload| {
			log.lock().unwrap().push(format!(
				"{name}:{topic}:{}",
				String::from_utf8_lossy(payload)
			));
		})
	}

	fn entries(log: &Log) -> Vec<String> {
		log.lock().unwrap().clone()
	}

	#[test]
	fn test_dispatch_invokes_matches_in_order() {
		let log = Log::default();
		let dispatcher = Dispatcher::default();
		dispatcher.register(
			"hash".into(),
			pattern("unit1/#"),
			recording(&log, "hash"),
		);
		dispatcher.register(
			"plus".into(),
			pattern("unit1/+/temperature"),
			recording(&log, "plus"),
		);
		dispatcher.register(
			"exact".into(),
			pattern("unit1/probeA/temperature"),
			recording(&log, "exact"),
		);

		let report = dispatcher.dispatch("unit1/probeA/temperature", b"21.5");

		assert_eq!(report, DispatchReport { matched: 3, failed: 0 });
		assert_eq!(entries(&log), vec![
			"exact:unit1/probeA/temperature:21.5",
			"plus:unit1/probeA/temperature:21.5",
			"hash:unit1/probeA/temperature:21.5",
		]);
	}

	#[test]
	fn test_failing_handlers_are_isolated() {
		let log = Log::default();
		let dispatcher = Dispatcher::default();
		dispatcher.register(
			"first".into(),
			pattern("a/b"),
			recording(&log, "first"),
		);
		dispatcher.register(
			"errors".into(),
			pattern("a/b"),
			Handler::new(|_, _| Err(HandlerError::failed("bad payload"))),
		);
		dispatcher.register(
			"panics".into(),
			pattern("a/b"),
			Handler::infallible(|_, _| panic!("handler bug")),
		);
		dispatcher.register(
			"last".into(),
			pattern("a/b"),
			recording(&log, "last"),
		);

		let report = dispatcher.dispatch("a/b", b"x");

		assert_eq!(report, DispatchReport { matched: 4, failed: 2 });
		assert_eq!(entries(&log), vec!["first:a/b:x", "last:a/b:x"]);
	}

	#[test]
	fn test_removed_handler_not_invoked_afterwards() {
		let log = Log::default();
		let dispatcher = Dispatcher::default();
		dispatcher.register(
			SubscriberKey::anonymous(),
			pattern("a/b"),
			recording(&log, "h1"),
		);

		assert!(dispatcher.remove_pattern(&pattern("a/b")).is_some());
		assert_eq!(dispatcher.dispatch("a/b", b"1").matched, 0);
		assert!(entries(&log).is_empty());

		dispatcher.register(
			SubscriberKey::anonymous(),
			pattern("a/b"),
			recording(&log, "h3"),
		);
		dispatcher.dispatch("a/b", b"2");
		assert_eq!(entries(&log), vec!["h3:a/b:2"]);
	}

	#[test]
	fn test_handler_can_unsubscribe_during_dispatch() {
		let log = Log::default();
		let dispatcher = Arc::new(Dispatcher::default());

		let inner = Arc::clone(&dispatcher);
		let inner_log = Arc::clone(&log);
		dispatcher.register(
			"once".into(),
			pattern("jobs/+"),
			Handler::infallible(move |topic, _| {
				inner_log.lock().unwrap().push(format!("once:{topic}"));
				inner.remove_subscriber(&"once".into());
			}),
		);
		dispatcher.register(
			"always".into(),
			pattern("jobs/+"),
			recording(&log, "always"),
		);

		// Both run for the in-flight message, only the survivor afterwards
		assert_eq!(dispatcher.dispatch("jobs/pump", b"on").matched, 2);
		assert_eq!(dispatcher.dispatch("jobs/pump", b"off").matched, 1);
		assert_eq!(entries(&log), vec![
			"once:jobs/pump",
			"always:jobs/pump:on",
			"always:jobs/pump:off",
		]);
	}

	#[test]
	fn test_clear_drops_everything() {
		let log = Log::default();
		let dispatcher = Dispatcher::default();
		dispatcher.register("a".into(), pattern("#"), recording(&log, "all"));
		dispatcher.register(
			"b".into(),
			pattern("x/+/z"),
			recording(&log, "xz"),
		);

		dispatcher.clear();

		assert!(dispatcher.is_empty());
		for topic in ["x/y/z", "a", "anything/at/all"] {
			assert!(dispatcher.snapshot(topic).is_empty());
		}
		assert!(entries(&log).is_empty());
	}

	#[test]
	fn test_topic_cache_does_not_change_results() {
		let log = Log::default();
		let cached = Dispatcher::new(CacheStrategy::from_size(1));
		let uncached = Dispatcher::new(CacheStrategy::NoCache);
		for dispatcher in [&cached, &uncached] {
			dispatcher.register(
				"s".into(),
				pattern("a/+"),
				recording(&log, "s"),
			);
		}

		for topic in ["a/1", "a/2", "a/1", "b/1"] {
			assert_eq!(
				cached.dispatch(topic, b"").matched,
				uncached.dispatch(topic, b"").matched
			);
		}
		assert_eq!(CacheStrategy::from_size(0), CacheStrategy::NoCache);
	}
}
