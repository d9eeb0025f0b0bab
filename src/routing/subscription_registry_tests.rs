use super::error::RegistryError;
use super::handler::SubscriberKey;
use super::subscription_registry::SubscriptionRegistry;
use crate::topic::{TopicPath, TopicPatternPath};

fn pattern(pattern: &str) -> TopicPatternPath {
	TopicPatternPath::new_from_string(pattern).unwrap()
}

fn matching(registry: &SubscriptionRegistry<&'static str>, topic: &str) -> Vec<&'static str> {
	registry
		.matching(&TopicPath::new(topic))
		.into_iter()
		.copied()
		.collect()
}

fn anon() -> SubscriberKey {
	SubscriberKey::anonymous()
}

#[test]
fn test_first_registration_needs_subscribe() {
	let mut registry = SubscriptionRegistry::new();

	let first = registry.add_subscription("card".into(), pattern("a/b"), "h1");
	assert!(first.needs_subscribe);
	assert_eq!(first.replaced, None);

	let second = registry.add_subscription(
		"chart".into(),
		pattern("a/b"),
		"h2",
	);
	assert!(!second.needs_subscribe);
	assert_ne!(first.id, second.id);
	assert_eq!(matching(&registry, "a/b"), vec!["h1", "h2"]);
}

#[test]
fn test_same_subscriber_replaces_not_appends() {
	let mut registry = SubscriptionRegistry::new();

	let h1 = registry.add_subscription(anon(), pattern("a/b"), "h1");
	let h2 = registry.add_subscription(anon(), pattern("a/b"), "h2");

	assert_eq!(h2.replaced, Some(h1.id));
	assert_eq!(matching(&registry, "a/b"), vec!["h2"]);
	assert_eq!(registry.len(), 1);
	assert!(registry.get_subscription(h1.id).is_err());
}

#[test]
fn test_replace_is_scoped_to_subscriber() {
	let mut registry = SubscriptionRegistry::new();

	registry.add_subscription(
		"card".into(),
		pattern("unit1/+/state"),
		"card-v1",
	);
	registry.add_subscription(
		"chart".into(),
		pattern("unit1/+/state"),
		"chart",
	);
	// Remount of the card must not clobber the chart
	registry.add_subscription(
		"card".into(),
		pattern("unit1/+/state"),
		"card-v2",
	);

	assert_eq!(matching(&registry, "unit1/pump/state"), vec!["chart", "card-v2"]);
}

#[test]
fn test_remove_pattern_clears_all_subscribers() {
	let mut registry = SubscriptionRegistry::new();
	registry.add_subscription("card".into(), pattern("a/b"), "h1");
	registry.add_subscription("chart".into(), pattern("a/b"), "h2");
	registry.add_subscription("chart".into(), pattern("a/c"), "h3");

	let outcome = registry.remove_pattern(&pattern("a/b")).unwrap();
	assert_eq!(outcome.removed.len(), 2);
	assert!(outcome.now_empty);

	assert!(matching(&registry, "a/b").is_empty());
	assert_eq!(matching(&registry, "a/c"), vec!["h3"]);
	assert!(registry.patterns_of(&"card".into()).is_empty());
	assert_eq!(registry.patterns_of(&"chart".into()), vec!["a/c"]);
}

#[test]
fn test_remove_unknown_pattern_is_noop() {
	let mut registry = SubscriptionRegistry::new();
	registry.add_subscription(anon(), pattern("a/b/c"), "h1");

	assert!(registry.remove_pattern(&pattern("a/b")).is_none());
	assert!(registry.remove_pattern(&pattern("x/y")).is_none());
	assert!(registry.remove_pattern(&pattern("a/+/c")).is_none());
	assert_eq!(matching(&registry, "a/b/c"), vec!["h1"]);
}

#[test]
fn test_wildcard_removal_uses_wildcard_branch() {
	let mut registry = SubscriptionRegistry::new();
	registry.add_subscription(anon(), pattern("a/+"), "plus");
	registry.add_subscription(anon(), pattern("a/b"), "literal");

	registry.remove_pattern(&pattern("a/+")).unwrap();

	assert_eq!(matching(&registry, "a/b"), vec!["literal"]);
	assert!(matching(&registry, "a/x").is_empty());
}

#[test]
fn test_remove_subscriber_pattern_keeps_others() {
	let mut registry = SubscriptionRegistry::new();
	registry.add_subscription("card".into(), pattern("a/b"), "h1");
	registry.add_subscription("chart".into(), pattern("a/b"), "h2");

	let outcome = registry
		.remove_subscriber_pattern(&"card".into(), &pattern("a/b"))
		.unwrap();
	assert!(!outcome.now_empty);
	assert_eq!(matching(&registry, "a/b"), vec!["h2"]);

	let outcome = registry
		.remove_subscriber_pattern(&"chart".into(), &pattern("a/b"))
		.unwrap();
	assert!(outcome.now_empty);
	assert!(registry.is_empty());

	assert!(registry
		.remove_subscriber_pattern(&"chart".into(), &pattern("a/b"))
		.is_none());
}

#[test]
fn test_remove_subscriber_drops_all_its_patterns() {
	let mut registry = SubscriptionRegistry::new();
	registry.add_subscription(
		"card".into(),
		pattern("unit1/monitor/$state"),
		"s",
	);
	registry.add_subscription(
		"card".into(),
		pattern("unit1/+/temperature"),
		"t",
	);
	registry.add_subscription(
		"chart".into(),
		pattern("unit1/+/temperature"),
		"c",
	);

	let outcomes = registry.remove_subscriber(&"card".into());

	assert_eq!(outcomes.len(), 2);
	let emptied: Vec<String> = outcomes
		.iter()
		.filter(|outcome| outcome.now_empty)
		.map(|outcome| outcome.pattern.to_string())
		.collect();
	assert_eq!(emptied, vec!["unit1/monitor/$state"]);
	assert_eq!(matching(&registry, "unit1/probe/temperature"), vec!["c"]);
	assert!(registry.remove_subscriber(&"card".into()).is_empty());
}

#[test]
fn test_remove_subscription_by_id() {
	let mut registry = SubscriptionRegistry::new();
	let added = registry.add_subscription(anon(), pattern("a/#"), "h");

	let outcome = registry.remove_subscription(added.id).unwrap();
	assert!(outcome.now_empty);
	assert_eq!(outcome.pattern, pattern("a/#"));

	assert_eq!(
		registry.remove_subscription(added.id).unwrap_err(),
		RegistryError::SubscriptionNotFound { id: added.id }
	);
}

#[test]
fn test_active_patterns_are_unique_and_sorted() {
	let mut registry = SubscriptionRegistry::new();
	registry.add_subscription("b".into(), pattern("z/#"), "1");
	registry.add_subscription("a".into(), pattern("a/+"), "2");
	registry.add_subscription("b".into(), pattern("a/+"), "3");

	assert_eq!(registry.active_patterns(), vec!["a/+", "z/#"]);
}

#[test]
fn test_clear_resets_everything() {
	let mut registry = SubscriptionRegistry::new();
	registry.add_subscription("card".into(), pattern("#"), "all");
	registry.add_subscription("card".into(), pattern("a/b"), "ab");

	registry.clear();

	assert!(registry.is_empty());
	assert!(registry.active_patterns().is_empty());
	assert!(registry.patterns_of(&"card".into()).is_empty());
	for topic in ["a/b", "a", "x/y/z"] {
		assert!(matching(&registry, topic).is_empty());
	}

	let added = registry.add_subscription(
		"card".into(),
		pattern("a/b"),
		"again",
	);
	assert!(added.needs_subscribe);
}

#[test]
fn test_resubscribe_after_unsubscribe() {
	let mut registry = SubscriptionRegistry::new();
	registry.add_subscription(anon(), pattern("a/b"), "h1");
	registry.remove_pattern(&pattern("a/b"));
	assert!(matching(&registry, "a/b").is_empty());

	let added = registry.add_subscription(anon(), pattern("a/b"), "h3");
	assert!(added.needs_subscribe);
	assert_eq!(matching(&registry, "a/b"), vec!["h3"]);
}
