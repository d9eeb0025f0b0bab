use std::convert::TryFrom;
use std::fmt::{self, Display};
use std::slice::Iter;
use std::str::FromStr;

use arcstr::ArcStr;

use super::error::validation;
use super::topic_pattern_item::{TopicPatternError, TopicPatternItem};

/// Parsed MQTT subscription pattern with wildcard support.
///
/// Construction validates the pattern once, so everything downstream
/// (tree insertion, removal, broker requests) can assume a well-formed
/// pattern: non-empty, `#` only in last position and no wildcard characters
/// inside literal segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPatternPath {
	/// Pattern text as sent to the broker, e.g. `"sensors/+/data"`
	pattern: ArcStr,
	segments: Vec<TopicPatternItem>,
}

impl TopicPatternPath {
	/// Parses and validates a subscription pattern.
	pub fn new_from_string(
		topic_pattern: impl Into<ArcStr>,
	) -> Result<Self, TopicPatternError> {
		let topic_pattern = topic_pattern.into();
		validation::validate_pattern_for_subscription(&topic_pattern)?;

		let segments = topic_pattern
			.split('/')
			.map(|s| topic_pattern.substr_from(s))
			.map(TopicPatternItem::try_from)
			.collect::<Result<Vec<_>, _>>()?;

		if let Some(hash_pos) = segments
			.iter()
			.position(|s| matches!(s, TopicPatternItem::Hash))
		{
			if hash_pos != segments.len() - 1 {
				return Err(TopicPatternError::hash_position(
					topic_pattern.as_str(),
				));
			}
		}

		Ok(Self {
			pattern: topic_pattern,
			segments,
		})
	}

	/// Returns the pattern string used for broker subscribe/unsubscribe.
	pub fn mqtt_pattern(&self) -> ArcStr {
		self.pattern.clone()
	}

	/// Returns the pattern string.
	pub fn as_str(&self) -> &str {
		&self.pattern
	}

	/// Iterates over the parsed segments.
	pub fn iter(&self) -> Iter<'_, TopicPatternItem> {
		self.segments.iter()
	}

	/// Returns the parsed segments.
	pub fn slice(&self) -> &[TopicPatternItem] {
		&self.segments
	}

	/// Number of segments in the pattern.
	pub fn len(&self) -> usize {
		self.segments.len()
	}

	/// Always false for a successfully parsed pattern.
	pub fn is_empty(&self) -> bool {
		self.segments.is_empty()
	}

	/// Returns true if the pattern contains `+` or `#`.
	pub fn has_wildcards(&self) -> bool {
		self.segments.iter().any(TopicPatternItem::is_wildcard)
	}
}

impl Display for TopicPatternPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.pattern)
	}
}

impl FromStr for TopicPatternPath {
	type Err = TopicPatternError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new_from_string(s)
	}
}

impl TryFrom<&str> for TopicPatternPath {
	type Error = TopicPatternError;

	fn try_from(value: &str) -> Result<Self, Self::Error> {
		Self::new_from_string(value)
	}
}

impl TryFrom<String> for TopicPatternPath {
	type Error = TopicPatternError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new_from_string(value)
	}
}

impl TryFrom<ArcStr> for TopicPatternPath {
	type Error = TopicPatternError;

	fn try_from(value: ArcStr) -> Result<Self, Self::Error> {
		Self::new_from_string(value)
	}
}
