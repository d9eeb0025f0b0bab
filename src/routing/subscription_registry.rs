#![allow(missing_docs)]
use std::collections::HashMap;
use std::fmt::Display;

use arcstr::ArcStr;
use tracing::debug;

use super::error::RegistryError;
use super::handler::SubscriberKey;
use crate::topic::{
	Len, TopicMatcherError, TopicMatcherNode, TopicPath, TopicPatternPath,
};

/// A subscription identifier.
///
/// Every registration gets a fresh id, so two registrations of the same
/// callback on the same pattern are still told apart.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, PartialOrd, Ord)]
pub struct SubscriptionId(usize);

impl Display for SubscriptionId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "SubscriptionId({})", self.0)
	}
}

/// One registration stored at a tree node
#[derive(Debug)]
struct HandlerEntry<T> {
	subscriber: SubscriberKey,
	id: SubscriptionId,
	handler: T,
}

/// Handlers whose pattern terminates at one node, in registration order.
/// Holds at most one entry per subscriber.
#[derive(Debug)]
pub struct HandlerTable<T> {
	entries: Vec<HandlerEntry<T>>,
}

impl<T> Default for HandlerTable<T> {
	fn default() -> Self {
		Self {
			entries: Vec::new(),
		}
	}
}

impl<T> Len for HandlerTable<T> {
	fn len(&self) -> usize {
		self.entries.len()
	}
}

impl<T> HandlerTable<T> {
	/// Inserts `handler` for `subscriber`, evicting that subscriber's
	/// previous entry. Returns the evicted id.
	fn replace(
		&mut self,
		subscriber: SubscriberKey,
		id: SubscriptionId,
		handler: T,
	) -> Option<SubscriptionId> {
		let replaced = self
			.entries
			.iter()
			.position(|entry| entry.subscriber == subscriber)
			.map(|pos| self.entries.remove(pos).id);
		self.entries.push(HandlerEntry {
			subscriber,
			id,
			handler,
		});
		replaced
	}

	fn remove_id(&mut self, id: SubscriptionId) {
		self.entries.retain(|entry| entry.id != id);
	}

	fn drain_ids(&mut self) -> Vec<SubscriptionId> {
		self.entries.drain(..).map(|entry| entry.id).collect()
	}
}

/// Outcome of [`SubscriptionRegistry::add_subscription`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
	/// Id of the new registration
	pub id: SubscriptionId,
	/// The pattern had no handlers before, so the broker must be asked
	/// to subscribe
	pub needs_subscribe: bool,
	/// Registration of the same subscriber that this one replaced
	pub replaced: Option<SubscriptionId>,
}

/// Outcome of a removal that may leave a pattern without handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveOutcome {
	/// Pattern the removed registrations belonged to
	pub pattern: TopicPatternPath,
	/// Ids that were removed
	pub removed: Vec<SubscriptionId>,
	/// The pattern has no handlers left, so the broker subscription can go
	pub now_empty: bool,
}

#[derive(Debug)]
struct SubscriptionRecord {
	pattern: TopicPatternPath,
	subscriber: SubscriberKey,
}

/// Topic pattern tree plus the indexes needed to replace or clear a
/// subscriber's registrations without touching anybody else's.
///
/// `T` is the stored handler type. Matching returns handlers in tree
/// traversal order (literal, `+`, `#`) and registration order within a node.
#[derive(Debug)]
pub struct SubscriptionRegistry<T> {
	topic_matcher: TopicMatcherNode<HandlerTable<T>>,
	subscriptions: HashMap<SubscriptionId, SubscriptionRecord>,
	by_subscriber: HashMap<SubscriberKey, HashMap<ArcStr, SubscriptionId>>,
	next_id: usize,
}

impl<T> Default for SubscriptionRegistry<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> SubscriptionRegistry<T> {
	pub fn new() -> Self {
		Self {
			topic_matcher: TopicMatcherNode::new(),
			subscriptions: HashMap::new(),
			by_subscriber: HashMap::new(),
			next_id: 0,
		}
	}

	/// Registers `handler` for `subscriber` on `pattern`.
	///
	/// The subscriber's previous handler on the same pattern, if any, is
	/// replaced. Handlers of other subscribers on the pattern are kept.
	pub fn add_subscription(
		&mut self,
		subscriber: SubscriberKey,
		pattern: TopicPatternPath,
		handler: T,
	) -> AddOutcome {
		let id = SubscriptionId(self.next_id);
		self.next_id = self.next_id.wrapping_add(1);

		let table = self.topic_matcher.get_or_create_subscription_table(&pattern);
		let needs_subscribe = table.is_empty();
		let replaced = table.replace(subscriber.clone(), id, handler);

		if let Some(old_id) = replaced {
			self.subscriptions.remove(&old_id);
			debug!(
				subscriber = %subscriber,
				pattern = %pattern,
				replaced = %old_id,
				"Replaced subscriber handler"
			);
		}
		self.by_subscriber
			.entry(subscriber.clone())
			.or_default()
			.insert(pattern.mqtt_pattern(), id);
		self.subscriptions.insert(
			id,
			SubscriptionRecord {
				pattern,
				subscriber,
			},
		);

		AddOutcome {
			id,
			needs_subscribe,
			replaced,
		}
	}

	/// Removes a single registration by id.
	pub fn remove_subscription(
		&mut self,
		id: SubscriptionId,
	) -> Result<RemoveOutcome, RegistryError> {
		let record = self
			.subscriptions
			.remove(&id)
			.ok_or(RegistryError::SubscriptionNotFound { id })?;
		self.forget_subscriber_pattern(&record.subscriber, &record.pattern, id);

		let now_empty = self.update_pattern(&record.pattern, |table| {
			table.remove_id(id)
		})?;

		Ok(RemoveOutcome {
			pattern: record.pattern,
			removed: vec![id],
			now_empty,
		})
	}

	/// Drops every handler registered on exactly `pattern`, whoever owns it.
	///
	/// Returns `None` when nothing was registered on the pattern.
	pub fn remove_pattern(
		&mut self,
		pattern: &TopicPatternPath,
	) -> Option<RemoveOutcome> {
		let mut removed = Vec::new();
		match self
			.topic_matcher
			.update_node(pattern.slice(), |table| removed = table.drain_ids())
		{
			| Ok(_) => {}
			| Err(TopicMatcherError::PathNotFound { .. }) => return None,
		}

		for id in &removed {
			if let Some(record) = self.subscriptions.remove(id) {
				self.forget_subscriber_pattern(
					&record.subscriber,
					pattern,
					*id,
				);
			}
		}

		if removed.is_empty() {
			return None;
		}
		Some(RemoveOutcome {
			pattern: pattern.clone(),
			removed,
			now_empty: true,
		})
	}

	/// Removes `subscriber`'s handler on `pattern`, leaving other
	/// subscribers on that pattern in place.
	pub fn remove_subscriber_pattern(
		&mut self,
		subscriber: &SubscriberKey,
		pattern: &TopicPatternPath,
	) -> Option<RemoveOutcome> {
		let id = *self.by_subscriber.get(subscriber)?.get(pattern.as_str())?;
		self.remove_subscription(id).ok()
	}

	/// Removes every registration owned by `subscriber`.
	pub fn remove_subscriber(
		&mut self,
		subscriber: &SubscriberKey,
	) -> Vec<RemoveOutcome> {
		let Some(owned) = self.by_subscriber.remove(subscriber) else {
			return Vec::new();
		};
		let mut ids: Vec<SubscriptionId> = owned.into_values().collect();
		ids.sort();
		ids.into_iter()
			.filter_map(|id| self.remove_subscription(id).ok())
			.collect()
	}

	/// Returns every handler whose pattern matches `topic`.
	pub fn matching<'a>(&'a self, topic: &TopicPath) -> Vec<&'a T> {
		self.topic_matcher
			.find_by_path(topic)
			.into_iter()
			.flat_map(|table| table.entries.iter())
			.map(|entry| &entry.handler)
			.collect()
	}

	/// Returns `(id, subscriber, handler)` for every match, for callers that
	/// need to know who a handler belongs to.
	pub fn matching_entries<'a>(
		&'a self,
		topic: &TopicPath,
	) -> Vec<(SubscriptionId, &'a SubscriberKey, &'a T)> {
		self.topic_matcher
			.find_by_path(topic)
			.into_iter()
			.flat_map(|table| table.entries.iter())
			.map(|entry| (entry.id, &entry.subscriber, &entry.handler))
			.collect()
	}

	/// Unique broker patterns with at least one handler, sorted.
	pub fn active_patterns(&self) -> Vec<ArcStr> {
		let mut patterns: Vec<ArcStr> = self
			.subscriptions
			.values()
			.map(|record| record.pattern.mqtt_pattern())
			.collect();
		patterns.sort();
		patterns.dedup();
		patterns
	}

	/// Patterns currently owned by `subscriber`, sorted.
	pub fn patterns_of(&self, subscriber: &SubscriberKey) -> Vec<ArcStr> {
		let mut patterns: Vec<ArcStr> = self
			.by_subscriber
			.get(subscriber)
			.map(|owned| owned.keys().cloned().collect())
			.unwrap_or_default();
		patterns.sort();
		patterns
	}

	/// Looks up the pattern and owner of a registration.
	pub fn get_subscription(
		&self,
		id: SubscriptionId,
	) -> Result<(&TopicPatternPath, &SubscriberKey), RegistryError> {
		self.subscriptions
			.get(&id)
			.map(|record| (&record.pattern, &record.subscriber))
			.ok_or(RegistryError::SubscriptionNotFound { id })
	}

	/// Drops every node and registration.
	pub fn clear(&mut self) {
		// Replacing the root drops every stored handler
		self.topic_matcher = TopicMatcherNode::new();
		self.subscriptions.clear();
		self.by_subscriber.clear();
	}

	/// Number of live registrations
	pub fn len(&self) -> usize {
		self.subscriptions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.subscriptions.is_empty()
	}

	fn update_pattern<F>(
		&mut self,
		pattern: &TopicPatternPath,
		f: F,
	) -> Result<bool, RegistryError>
	where
		F: FnOnce(&mut HandlerTable<T>),
	{
		let mut now_empty = false;
		self.topic_matcher.update_node(pattern.slice(), |table| {
			f(table);
			now_empty = table.is_empty();
		})?;
		Ok(now_empty)
	}

	fn forget_subscriber_pattern(
		&mut self,
		subscriber: &SubscriberKey,
		pattern: &TopicPatternPath,
		id: SubscriptionId,
	) {
		if let Some(owned) = self.by_subscriber.get_mut(subscriber) {
			if owned.get(pattern.as_str()) == Some(&id) {
				owned.remove(pattern.as_str());
			}
			if owned.is_empty() {
				self.by_subscriber.remove(subscriber);
			}
		}
	}
}
