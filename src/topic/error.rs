//! Error types and utilities for the topic module
//!
//! This module contains the composite error type and shared constants
//! for the entire topic module, while individual error types remain
//! in their respective modules.

use thiserror::Error;

use super::topic_matcher::TopicMatcherError;
use super::topic_pattern_item::TopicPatternError;

/// Comprehensive error type for all topic-related operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicError {
	/// Topic pattern parsing or validation error
	#[error("Topic pattern error: {0}")]
	Pattern(#[from] TopicPatternError),

	/// Topic matching operation error
	#[error("Topic matcher error: {0}")]
	Matcher(#[from] TopicMatcherError),
}

/// Convenient Result type for topic operations
pub type TopicResult<T> = Result<T, TopicError>;

/// Convenient Result type for pattern operations
pub type PatternResult<T> = Result<T, TopicPatternError>;

/// Convenient Result type for matcher operations
pub type MatcherResult<T> = Result<T, TopicMatcherError>;

/// Topic processing limits and constants
pub mod limits {
	/// Maximum topic nesting depth allowed
	pub const MAX_TOPIC_DEPTH: usize = 32;

	/// Maximum length of a single topic segment
	pub const MAX_SEGMENT_LENGTH: usize = 256;

	/// Maximum total topic path length
	pub const MAX_TOPIC_LENGTH: usize = 1024;
}

/// Validation utilities for topic operations
pub mod validation {
	use super::limits::*;
	use super::TopicPatternError;

	/// Validates the raw pattern string before it is split into segments.
	///
	/// Wildcard placement is checked separately while parsing segments.
	pub fn validate_pattern_for_subscription(
		pattern: &str,
	) -> Result<(), TopicPatternError> {
		if pattern.is_empty() || pattern.trim().is_empty() {
			return Err(TopicPatternError::EmptyTopic);
		}

		if pattern.len() > MAX_TOPIC_LENGTH {
			return Err(TopicPatternError::limit_exceeded(format!(
				"Pattern too long: {} > {}",
				pattern.len(),
				MAX_TOPIC_LENGTH
			)));
		}

		if pattern.contains('\0') {
			return Err(TopicPatternError::limit_exceeded(
				"Null byte in pattern",
			));
		}

		let depth = pattern.split('/').count();
		if depth > MAX_TOPIC_DEPTH {
			return Err(TopicPatternError::limit_exceeded(format!(
				"Pattern too deep: {depth} segments > {MAX_TOPIC_DEPTH}"
			)));
		}

		if let Some(segment) = pattern
			.split('/')
			.find(|segment| segment.len() > MAX_SEGMENT_LENGTH)
		{
			return Err(TopicPatternError::limit_exceeded(format!(
				"Segment too long: {} > {}",
				segment.len(),
				MAX_SEGMENT_LENGTH
			)));
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::limits::*;
	use super::validation::validate_pattern_for_subscription;
	use super::*;

	#[test]
	fn test_rejects_blank_patterns() {
		assert_eq!(
			validate_pattern_for_subscription(""),
			Err(TopicPatternError::EmptyTopic)
		);
		assert_eq!(
			validate_pattern_for_subscription("   "),
			Err(TopicPatternError::EmptyTopic)
		);
	}

	#[test]
	fn test_depth_limit() {
		let at_limit = vec!["a"; MAX_TOPIC_DEPTH].join("/");
		assert!(validate_pattern_for_subscription(&at_limit).is_ok());

		let too_deep = vec!["a"; MAX_TOPIC_DEPTH + 1].join("/");
		assert!(matches!(
			validate_pattern_for_subscription(&too_deep),
			Err(TopicPatternError::LimitExceeded { .. })
		));
	}

	#[test]
	fn test_segment_and_length_limits() {
		let long_segment = "x".repeat(MAX_SEGMENT_LENGTH + 1);
		assert!(validate_pattern_for_subscription(&long_segment).is_err());

		let long_topic = "ab/".repeat(MAX_TOPIC_LENGTH / 3 + 1);
		assert!(validate_pattern_for_subscription(&long_topic).is_err());

		assert!(validate_pattern_for_subscription("a/\0/b").is_err());
	}

	#[test]
	fn test_topic_error_wraps_sources() {
		let err: TopicError = TopicPatternError::EmptyTopic.into();
		assert_eq!(
			err.to_string(),
			"Topic pattern error: Topic pattern cannot be empty"
		);
	}
}
