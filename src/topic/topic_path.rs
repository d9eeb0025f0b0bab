#![allow(missing_docs)]

use std::fmt;

use arcstr::{ArcStr, Substr};

/// Concrete topic of an inbound message, split on `/`.
///
/// Segments borrow from the shared topic string, so cloning is cheap and
/// the parsed form can be cached between messages on the same topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPath {
	pub path: ArcStr,
	pub segments: Vec<Substr>,
}

impl TopicPath {
	pub fn new(path: impl Into<ArcStr>) -> Self {
		let path = path.into();
		let segments: Vec<Substr> =
			path.split('/').map(|s| path.substr_from(s)).collect();
		Self { path, segments }
	}

	pub fn path(&self) -> ArcStr {
		self.path.clone()
	}

	pub fn as_str(&self) -> &str {
		&self.path
	}
}

impl fmt::Display for TopicPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.path)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_splits_on_slash() {
		let topic = TopicPath::new("unit1/probeA/temperature");
		let segments: Vec<&str> =
			topic.segments.iter().map(|s| s.as_str()).collect();
		assert_eq!(segments, vec!["unit1", "probeA", "temperature"]);
		assert_eq!(topic.to_string(), "unit1/probeA/temperature");
	}

	#[test]
	fn test_empty_topic_is_single_empty_segment() {
		let topic = TopicPath::new("");
		assert_eq!(topic.segments.len(), 1);
		assert!(topic.segments[0].is_empty());
	}
}
