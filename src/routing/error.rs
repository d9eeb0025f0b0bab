use thiserror::Error;

use super::subscription_registry::SubscriptionId;
use crate::topic::TopicMatcherError;

/// Errors from the subscription registry
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
	/// Subscription with given ID was not found
	#[error("Subscription {id} not found")]
	SubscriptionNotFound {
		/// Missing subscription
		id: SubscriptionId,
	},

	/// Registry index and pattern tree disagree
	#[error("Pattern tree out of sync with registry: {0}")]
	TreeOutOfSync(#[from] TopicMatcherError),
}
