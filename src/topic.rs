//! Topic handling module
//!
//! This module provides components for working with MQTT topic patterns,
//! including parsing, validation and the pattern tree used to match inbound
//! topics against registered subscriptions.

// Submodules
pub mod error;
pub mod topic_matcher;
pub mod topic_path;
pub mod topic_pattern_item;
/// Topic pattern parsing and validation
pub mod topic_pattern_path;

#[cfg(test)]
mod topic_pattern_path_tests;

// Re-export commonly used types for convenience
pub use error::{MatcherResult, PatternResult, TopicError, TopicResult};
// Re-export constants and validation utilities
pub use error::{limits, validation};
pub use topic_matcher::{Len, TopicMatcherError, TopicMatcherNode};
pub use topic_path::TopicPath;
pub use topic_pattern_item::{TopicPatternError, TopicPatternItem};
pub use topic_pattern_path::TopicPatternPath;
