//! Tests for TopicPatternPath parsing and validation

use arcstr::Substr;

use super::{TopicPatternError, TopicPatternItem, TopicPatternPath};

#[test]
fn test_literal_pattern() {
	let pattern = TopicPatternPath::new_from_string("sensors/temperature")
		.unwrap();

	assert_eq!(pattern.len(), 2);
	assert_eq!(pattern.as_str(), "sensors/temperature");
	assert_eq!(pattern.mqtt_pattern(), "sensors/temperature");
	assert!(!pattern.has_wildcards());
	assert_eq!(
		pattern.slice(),
		&[
			TopicPatternItem::Str(Substr::from("sensors")),
			TopicPatternItem::Str(Substr::from("temperature")),
		]
	);
}

#[test]
fn test_wildcard_pattern() {
	let pattern = TopicPatternPath::new_from_string("unit1/+/temperature/#");
	assert!(pattern.is_ok(), "trailing # after + is valid");

	let pattern = TopicPatternPath::new_from_string("unit1/#/temperature");
	assert_eq!(
		pattern.unwrap_err(),
		TopicPatternError::hash_position("unit1/#/temperature")
	);

	let pattern =
		TopicPatternPath::new_from_string("unit1/+/temperature").unwrap();
	assert!(pattern.has_wildcards());
	let items: Vec<&str> =
		pattern.iter().map(TopicPatternItem::as_str).collect();
	assert_eq!(items, vec!["unit1", "+", "temperature"]);

	let pattern = TopicPatternPath::new_from_string("unit1/#").unwrap();
	assert_eq!(pattern.slice().last(), Some(&TopicPatternItem::Hash));
}

#[test]
fn test_hash_must_be_last() {
	let err = TopicPatternPath::new_from_string("a/#/c").unwrap_err();
	assert_eq!(err, TopicPatternError::hash_position("a/#/c"));

	assert!(TopicPatternPath::new_from_string("#").is_ok());
	assert!(TopicPatternPath::new_from_string("+/+/#").is_ok());
}

#[test]
fn test_mixed_wildcard_segment_rejected() {
	for bad in ["a/b+/c", "a/#b", "sensor+", "a/+#"] {
		let err = TopicPatternPath::new_from_string(bad).unwrap_err();
		assert!(
			matches!(err, TopicPatternError::WildcardUsage { .. }),
			"{bad} should be rejected, got {err:?}"
		);
	}
}

#[test]
fn test_empty_pattern_rejected() {
	assert_eq!(
		TopicPatternPath::new_from_string("").unwrap_err(),
		TopicPatternError::EmptyTopic
	);
}

#[test]
fn test_dollar_segments_are_literal() {
	let pattern =
		TopicPatternPath::new_from_string("pioreactor/unit1/$experiment/monitor/$state")
			.unwrap();
	assert!(!pattern.has_wildcards());
	assert_eq!(pattern.len(), 5);
}

#[test]
fn test_empty_levels_are_kept() {
	let pattern = TopicPatternPath::new_from_string("a//b").unwrap();
	let items: Vec<&str> = pattern.iter().map(TopicPatternItem::as_str).collect();
	assert_eq!(items, vec!["a", "", "b"]);
}

#[test]
fn test_conversions() {
	let from_str: TopicPatternPath = "a/+".parse().unwrap();
	let from_string = TopicPatternPath::try_from(String::from("a/+")).unwrap();
	let from_ref = TopicPatternPath::try_from("a/+").unwrap();

	assert_eq!(from_str, from_string);
	assert_eq!(from_string, from_ref);
	assert_eq!(from_ref.to_string(), "a/+");
}
