//! Typed payload decoding.
//!
//! Published settings declare their value kind once (`numeric`, `boolean`,
//! `string`, `json`). Subscriptions made with a [`PayloadKind`] get their
//! payload decoded into a [`PayloadValue`] before the handler runs, instead
//! of every handler coercing raw bytes on its own.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Declared kind of a published value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
	/// Floating point number; empty payload means "no value"
	Numeric,
	/// Boolean flag; empty payload means "no value"
	Boolean,
	/// UTF-8 text, passed through unchanged
	String,
	/// Arbitrary JSON document
	Json,
}

/// Decoded payload, tagged with its kind
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
	/// Decoded number, `None` for an empty payload
	Numeric(Option<f64>),
	/// Decoded flag, `None` for an empty payload
	Boolean(Option<bool>),
	/// Payload text
	String(String),
	/// Parsed JSON document, `Null` for an empty payload
	Json(serde_json::Value),
}

/// Errors raised while decoding a payload into its declared kind
#[derive(Debug, Error)]
pub enum PayloadDecodeError {
	/// Payload is not a number
	#[error("Expected a number, got '{payload}'")]
	InvalidNumber {
		/// Offending payload text
		payload: String,
	},

	/// Payload is not valid JSON
	#[error("Invalid JSON payload: {0}")]
	InvalidJson(#[from] serde_json::Error),
}

impl PayloadKind {
	/// Decodes raw payload bytes into this kind.
	///
	/// Booleans follow the broker-side convention: `1`, `true` and `True`
	/// are true, any other non-empty payload is false.
	pub fn decode(self, payload: &[u8]) -> Result<PayloadValue, PayloadDecodeError> {
		let text = String::from_utf8_lossy(payload);
		let value = match self {
			| PayloadKind::Numeric => {
				if text.is_empty() {
					PayloadValue::Numeric(None)
				} else {
					let number = text.trim().parse::<f64>().map_err(|_| {
						PayloadDecodeError::InvalidNumber {
							payload: text.to_string(),
						}
					})?;
					PayloadValue::Numeric(Some(number))
				}
			}
			| PayloadKind::Boolean => {
				if text.is_empty() {
					PayloadValue::Boolean(None)
				} else {
					PayloadValue::Boolean(Some(matches!(
						text.as_ref(),
						"1" | "true" | "True"
					)))
				}
			}
			| PayloadKind::String => PayloadValue::String(text.into_owned()),
			| PayloadKind::Json => {
				if payload.is_empty() {
					PayloadValue::Json(serde_json::Value::Null)
				} else {
					PayloadValue::Json(serde_json::from_slice(payload)?)
				}
			}
		};
		Ok(value)
	}
}

impl fmt::Display for PayloadKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			| PayloadKind::Numeric => "numeric",
			| PayloadKind::Boolean => "boolean",
			| PayloadKind::String => "string",
			| PayloadKind::Json => "json",
		};
		write!(f, "{name}")
	}
}

impl PayloadValue {
	/// Returns the kind this value was decoded as
	pub fn kind(&self) -> PayloadKind {
		match self {
			| PayloadValue::Numeric(_) => PayloadKind::Numeric,
			| PayloadValue::Boolean(_) => PayloadKind::Boolean,
			| PayloadValue::String(_) => PayloadKind::String,
			| PayloadValue::Json(_) => PayloadKind::Json,
		}
	}

	/// Numeric value, if this is a non-empty number
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			| PayloadValue::Numeric(value) => *value,
			| _ => None,
		}
	}

	/// Boolean value, if this is a non-empty flag
	pub fn as_bool(&self) -> Option<bool> {
		match self {
			| PayloadValue::Boolean(value) => *value,
			| _ => None,
		}
	}

	/// Text value, if this is a string
	pub fn as_str(&self) -> Option<&str> {
		match self {
			| PayloadValue::String(value) => Some(value),
			| _ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_numeric() {
		assert_eq!(
			PayloadKind::Numeric.decode(b"37.5").unwrap(),
			PayloadValue::Numeric(Some(37.5))
		);
		assert_eq!(
			PayloadKind::Numeric.decode(b"").unwrap(),
			PayloadValue::Numeric(None)
		);
		assert!(matches!(
			PayloadKind::Numeric.decode(b"warm"),
			Err(PayloadDecodeError::InvalidNumber { .. })
		));
	}

	#[test]
	fn test_boolean() {
		for truthy in [&b"1"[..], b"true", b"True"] {
			assert_eq!(
				PayloadKind::Boolean.decode(truthy).unwrap().as_bool(),
				Some(true)
			);
		}
		for falsy in [&b"0"[..], b"false", b"TRUE", b"yes"] {
			assert_eq!(
				PayloadKind::Boolean.decode(falsy).unwrap().as_bool(),
				Some(false)
			);
		}
		assert_eq!(
			PayloadKind::Boolean.decode(b"").unwrap(),
			PayloadValue::Boolean(None)
		);
	}

	#[test]
	fn test_string_and_json() {
		assert_eq!(
			PayloadKind::String.decode(b"ready").unwrap().as_str(),
			Some("ready")
		);
		assert_eq!(
			PayloadKind::Json.decode(br#"{"app": "24.1"}"#).unwrap(),
			PayloadValue::Json(json!({"app": "24.1"}))
		);
		assert_eq!(
			PayloadKind::Json.decode(b"").unwrap(),
			PayloadValue::Json(serde_json::Value::Null)
		);
		assert!(PayloadKind::Json.decode(b"{not json").is_err());
	}

	#[test]
	fn test_kind_serde_names() {
		let kind: PayloadKind = serde_json::from_str("\"numeric\"").unwrap();
		assert_eq!(kind, PayloadKind::Numeric);
		assert_eq!(serde_json::to_string(&PayloadKind::Json).unwrap(), "\"json\"");
		assert_eq!(PayloadKind::Boolean.to_string(), "boolean");
		assert_eq!(
			PayloadKind::Numeric.decode(b"1").unwrap().kind(),
			PayloadKind::Numeric
		);
	}
}
