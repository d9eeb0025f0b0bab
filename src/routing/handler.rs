//! Message handler callbacks and their error type

use std::fmt;
use std::sync::Arc;

use arcstr::ArcStr;
use thiserror::Error;

use crate::payload::PayloadDecodeError;

/// Failure reported by a handler while processing one message.
///
/// Handler failures are isolated: the dispatcher logs them and keeps
/// invoking the remaining handlers for the same message.
#[derive(Debug, Error)]
pub enum HandlerError {
	/// Handler returned an application error
	#[error("Handler failed: {0}")]
	Failed(#[source] Box<dyn std::error::Error + Send + Sync>),

	/// Payload could not be decoded into the declared value kind
	#[error("Failed to decode payload: {0}")]
	Decode(#[from] PayloadDecodeError),

	/// Handler panicked; the panic message is preserved
	#[error("Handler panicked: {0}")]
	Panicked(String),
}

impl HandlerError {
	/// Wraps any error type as a handler failure
	pub fn failed(
		err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
	) -> Self {
		Self::Failed(err.into())
	}
}

/// Result returned by every handler invocation
pub type HandlerResult = Result<(), HandlerError>;

type Callback = dyn Fn(&str, &[u8]) -> HandlerResult + Send + Sync;

/// Registered message callback, invoked with `(topic, payload)`.
///
/// Cloning shares the same callback. The dispatcher clones matched handlers
/// out of the registry before invoking them, so a concurrent unsubscribe
/// never mutates a list that is being iterated.
#[derive(Clone)]
pub struct Handler {
	callback: Arc<Callback>,
}

impl Handler {
	/// Creates a handler from a fallible callback
	pub fn new<F>(callback: F) -> Self
	where F: Fn(&str, &[u8]) -> HandlerResult + Send + Sync + 'static {
		Self {
			callback: Arc::new(callback),
		}
	}

	/// Creates a handler from a callback that cannot fail
	pub fn infallible<F>(callback: F) -> Self
	where F: Fn(&str, &[u8]) + Send + Sync + 'static {
		Self::new(move |topic, payload| {
			callback(topic, payload);
			Ok(())
		})
	}

	/// Invokes the callback
	pub fn call(&self, topic: &str, payload: &[u8]) -> HandlerResult {
		(self.callback)(topic, payload)
	}

	/// Returns true if both handlers share the same callback
	pub fn ptr_eq(&self, other: &Handler) -> bool {
		Arc::ptr_eq(&self.callback, &other.callback)
	}
}

impl fmt::Debug for Handler {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Handler")
			.field("callback", &Arc::as_ptr(&self.callback))
			.finish()
	}
}

/// Identity of a logical consumer (a UI panel, a session, a job view).
///
/// A subscriber owns at most one handler per pattern: registering again
/// for the same pattern replaces its previous handler without touching
/// other subscribers on that pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberKey(ArcStr);

impl SubscriberKey {
	/// Creates a key from a consumer name
	pub fn new(name: impl Into<ArcStr>) -> Self {
		Self(name.into())
	}

	/// Key used by registrations that do not name their consumer.
	///
	/// All anonymous registrations share it, so each pattern holds at most
	/// one anonymous handler.
	pub fn anonymous() -> Self {
		Self(arcstr::literal!(""))
	}

	/// Returns true for the shared anonymous key
	pub fn is_anonymous(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns the consumer name
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Default for SubscriberKey {
	fn default() -> Self {
		Self::anonymous()
	}
}

impl fmt::Display for SubscriberKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_anonymous() {
			write!(f, "<anonymous>")
		} else {
			write!(f, "{}", self.0)
		}
	}
}

impl From<&str> for SubscriberKey {
	fn from(name: &str) -> Self {
		Self::new(name)
	}
}

impl From<String> for SubscriberKey {
	fn from(name: String) -> Self {
		Self::new(name)
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use super::*;

	#[test]
	fn test_handler_receives_topic_and_payload() {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let seen_clone = Arc::clone(&seen);
		let handler = Handler::infallible(move |topic, payload| {
			seen_clone
				.lock()
				.unwrap()
				.push((topic.to_string(), payload.to_vec()));
		});

		handler.call("a/b", b"42").unwrap();
		assert_eq!(
			*seen.lock().unwrap(),
			vec![("a/b".to_string(), b"42".to_vec())]
		);
	}

	#[test]
	fn test_handler_identity_is_by_registration() {
		let first = Handler::infallible(|_, _| {});
		let second = Handler::infallible(|_, _| {});
		assert!(first.ptr_eq(&first.clone()));
		assert!(!first.ptr_eq(&second));
	}

	#[test]
	fn test_failed_handler_error() {
		let handler = Handler::new(|_, _| Err(HandlerError::failed("boom")));
		let err = handler.call("a", b"").unwrap_err();
		assert_eq!(err.to_string(), "Handler failed: boom");
	}

	#[test]
	fn test_subscriber_key() {
		assert!(SubscriberKey::default().is_anonymous());
		assert_eq!(SubscriberKey::anonymous().to_string(), "<anonymous>");

		let key = SubscriberKey::from("PioreactorCard");
		assert!(!key.is_anonymous());
		assert_eq!(key.as_str(), "PioreactorCard");
		assert_eq!(key, SubscriberKey::new(String::from("PioreactorCard")));
	}
}
