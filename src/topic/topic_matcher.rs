#![allow(missing_docs)]
use std::collections::HashMap;

use arcstr::Substr;
use thiserror::Error;

use super::topic_path::TopicPath;
use super::topic_pattern_item::TopicPatternItem;
use super::topic_pattern_path::TopicPatternPath;

/// Errors that can occur during topic tree operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicMatcherError {
	/// No node exists along the given pattern path
	#[error("No subscriptions registered at '{segment}' (position {position})")]
	PathNotFound { segment: String, position: usize },
}

impl TopicMatcherError {
	/// Creates a new PathNotFound error
	pub fn path_not_found(segment: impl Into<String>, position: usize) -> Self {
		Self::PathNotFound {
			segment: segment.into(),
			position,
		}
	}
}

/// Size information for the per-node subscription data.
///
/// Empty data is dropped from the tree so that nodes disappear once the
/// last handler beneath them is removed.
pub trait Len {
	fn len(&self) -> usize;
	fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl<T> Len for Vec<T> {
	fn len(&self) -> usize {
		self.len()
	}
	fn is_empty(&self) -> bool {
		self.is_empty()
	}
}

/// Node of the topic pattern tree.
///
/// Literal segments live in `literal_children`; the `+` branch gets its own
/// child and `#` only ever stores data, since it must be the final segment.
#[derive(Debug)]
pub struct TopicMatcherNode<T> {
	/// Patterns ending exactly here
	terminal: Option<T>,
	literal_children: HashMap<Substr, TopicMatcherNode<T>>,
	/// Subtree for a `+` at the next level
	plus_child: Option<Box<TopicMatcherNode<T>>>,
	/// Patterns ending in `#` at the next level
	hash_terminal: Option<T>,
}

impl<T: Default + Len> Default for TopicMatcherNode<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Default + Len> TopicMatcherNode<T> {
	/// Creates an empty tree root
	pub fn new() -> Self {
		Self {
			terminal: None,
			literal_children: HashMap::new(),
			plus_child: None,
			hash_terminal: None,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.terminal.as_ref().is_none_or(T::is_empty)
			&& self.literal_children.is_empty()
			&& self.plus_child.is_none()
			&& self
				.hash_terminal
				.as_ref()
				.is_none_or(T::is_empty)
	}

	/// Descends along `topic_path`, creating missing nodes, and returns the
	/// data slot where the pattern terminates.
	pub fn get_or_create_subscription_table(
		&mut self,
		topic_path: &TopicPatternPath,
	) -> &mut T {
		let mut node = self;

		for segment in topic_path.iter() {
			match segment {
				| TopicPatternItem::Str(s) => {
					node = node
						.literal_children
						.entry(s.clone())
						.or_default()
				}
				| TopicPatternItem::Plus => {
					node = node
						.plus_child
						.get_or_insert_with(|| Box::new(TopicMatcherNode::new()))
				}
				| TopicPatternItem::Hash => {
					// Hash wildcard must be the last segment
					return node
						.hash_terminal
						.get_or_insert_with(T::default);
				}
			}
		}
		node.terminal.get_or_insert_with(T::default)
	}

	/// Applies `f` to the data where `topic_path` terminates, then prunes
	/// data and nodes left empty.
	///
	/// Wildcards in `topic_path` select the wildcard branches they were
	/// inserted under. Returns `Ok(true)` when this node itself became empty.
	pub fn update_node<F>(
		&mut self,
		topic_path: &[TopicPatternItem],
		f: F,
	) -> Result<bool, TopicMatcherError>
	where
		F: FnOnce(&mut T),
	{
		self.update_node_at(topic_path, 0, f)
	}

	fn update_node_at<F>(
		&mut self,
		topic_path: &[TopicPatternItem],
		position: usize,
		f: F,
	) -> Result<bool, TopicMatcherError>
	where
		F: FnOnce(&mut T),
	{
		let (current_segment, rest_segments) = match topic_path {
			| [] => {
				let data = self.terminal.as_mut().ok_or_else(|| {
					TopicMatcherError::path_not_found("", position)
				})?;
				f(data);
				if data.is_empty() {
					self.terminal = None
				}
				return Ok(self.is_empty());
			}
			| [current, rest @ ..] => (current, rest),
		};

		match current_segment {
			| TopicPatternItem::Str(s) => {
				let child_node =
					self.literal_children.get_mut(s).ok_or_else(|| {
						TopicMatcherError::path_not_found(s.as_str(), position)
					})?;
				if child_node.update_node_at(rest_segments, position + 1, f)? {
					self.literal_children.remove(s);
				}
			}
			| TopicPatternItem::Plus => {
				let child_node = self
					.plus_child
					.as_mut()
					.ok_or_else(|| {
						TopicMatcherError::path_not_found("+", position)
					})?;
				if child_node.update_node_at(rest_segments, position + 1, f)? {
					self.plus_child = None;
				}
			}
			| TopicPatternItem::Hash => {
				let hash_data = self
					.hash_terminal
					.as_mut()
					.ok_or_else(|| {
						TopicMatcherError::path_not_found("#", position)
					})?;
				f(hash_data);
				if hash_data.is_empty() {
					self.hash_terminal = None;
				}
			}
		}
		Ok(self.is_empty())
	}

	/// Recursively collects all subscription data that matches the given
	/// topic path segments.
	///
	/// Branch order is literal, then `+`, then `#`, so results are stable.
	fn collect_matches<'a>(
		&'a self,
		topic: &[Substr],
		out: &mut Vec<&'a T>,
	) {
		match topic {
			| [] => {
				// `#` needs at least one remaining segment, so `a/#` does
				// not match `a`
				self.terminal
					.iter()
					.for_each(|data| out.push(data));
			}
			| [segment, rest @ ..] => {
				if let Some(child) = self.literal_children.get(segment) {
					child.collect_matches(
						rest,
						out,
					);
				}
				self.plus_child
					.iter()
					.for_each(|plus_node| {
						plus_node.collect_matches(
							rest,
							out,
						)
					});
				self.hash_terminal
					.iter()
					.for_each(|hash_data| out.push(hash_data));
			}
		}
	}

	/// Data of every pattern matching `topic`
	pub fn find_by_path<'a>(&'a self, topic: &TopicPath) -> Vec<&'a T> {
		let mut matches = Vec::new();
		self.collect_matches(
			&topic.segments,
			&mut matches,
		);
		matches
	}

	/// Counts nodes in this subtree, including this one.
	pub fn node_count(&self) -> usize {
		1 + self
			.literal_children
			.values()
			.map(TopicMatcherNode::node_count)
			.sum::<usize>()
			+ self
				.plus_child
				.as_ref()
				.map_or(0, |node| node.node_count())
	}
}
