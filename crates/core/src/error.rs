//! Error taxonomy for the confdal workspace.

use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type Result<T, E = ConfdalError> = core::result::Result<T, E>;

/// Whether a [`ConfdalError::NotFound`] names a class or an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
	/// A class accessed by name does not exist in the schema.
	Class,
	/// An object accessed by id does not exist in the backing store.
	Object,
}

impl core::fmt::Display for NotFoundKind {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			NotFoundKind::Class => f.write_str("class"),
			NotFoundKind::Object => f.write_str("object"),
		}
	}
}

/// Errors raised by the registry, factory, and backing-store interface.
#[derive(Debug, Error)]
pub enum ConfdalError {
	/// Requested class or record does not exist in the backing store/schema.
	#[error("{kind} not found: '{data}'")]
	NotFound {
		/// What kind of entity was missing.
		kind: NotFoundKind,
		/// The class name or object id that failed to resolve.
		data: String,
	},

	/// No constructor is registered for the class, and (when upcast was
	/// allowed) none for any of its ancestors either.
	#[error("class not registered: '{class}'")]
	ClassNotRegistered {
		/// The class name with no registered constructor.
		class: String,
	},

	/// Attribute or relationship access on a wrapper whose record was removed.
	#[error("deleted object '{id}@{class}'")]
	DeletedObject {
		/// Concrete class of the deleted wrapper.
		class: String,
		/// External identity of the deleted wrapper.
		id: String,
	},

	/// Lower-level failure wrapped with resolution context.
	///
	/// Never swallows the original cause: when a cause exists it is chained
	/// via `source()`.
	#[error("{context}")]
	Generic {
		/// What was being resolved when the failure occurred.
		context: String,
		/// The chained cause, if any.
		#[source]
		source: Option<Box<ConfdalError>>,
	},
}

impl ConfdalError {
	/// A class accessed by name was not found in the schema.
	pub fn not_found_class(name: impl Into<String>) -> Self {
		ConfdalError::NotFound {
			kind: NotFoundKind::Class,
			data: name.into(),
		}
	}

	/// An object accessed by id was not found in the backing store.
	pub fn not_found_object(id: impl Into<String>) -> Self {
		ConfdalError::NotFound {
			kind: NotFoundKind::Object,
			data: id.into(),
		}
	}

	/// No constructor registered under `class`.
	pub fn class_not_registered(class: impl Into<String>) -> Self {
		ConfdalError::ClassNotRegistered {
			class: class.into(),
		}
	}

	/// Access to a wrapper whose underlying record was removed.
	pub fn deleted_object(class: impl Into<String>, id: impl Into<String>) -> Self {
		ConfdalError::DeletedObject {
			class: class.into(),
			id: id.into(),
		}
	}

	/// A contextual failure with no lower-level cause.
	pub fn generic(context: impl Into<String>) -> Self {
		ConfdalError::Generic {
			context: context.into(),
			source: None,
		}
	}

	/// A contextual failure chaining the original cause.
	pub fn generic_with(context: impl Into<String>, cause: ConfdalError) -> Self {
		ConfdalError::Generic {
			context: context.into(),
			source: Some(Box::new(cause)),
		}
	}

	/// True if this is a [`ConfdalError::NotFound`] of the given kind.
	pub fn is_not_found(&self, wanted: NotFoundKind) -> bool {
		matches!(self, ConfdalError::NotFound { kind, .. } if *kind == wanted)
	}
}

#[cfg(test)]
mod tests {
	use std::error::Error as _;

	use super::*;

	#[test]
	fn display_includes_context() {
		assert_eq!(
			ConfdalError::not_found_class("Detector").to_string(),
			"class not found: 'Detector'"
		);
		assert_eq!(
			ConfdalError::not_found_object("sensor-1").to_string(),
			"object not found: 'sensor-1'"
		);
		assert_eq!(
			ConfdalError::deleted_object("Sensor", "sensor-1").to_string(),
			"deleted object 'sensor-1@Sensor'"
		);
	}

	#[test]
	fn generic_chains_cause() {
		let cause = ConfdalError::not_found_class("Missing");
		let err = ConfdalError::generic_with("wrong database schema", cause);

		assert_eq!(err.to_string(), "wrong database schema");
		let source = err.source().expect("cause must be chained");
		assert_eq!(source.to_string(), "class not found: 'Missing'");
	}

	#[test]
	fn not_found_kind_matching() {
		let err = ConfdalError::not_found_object("x");
		assert!(err.is_not_found(NotFoundKind::Object));
		assert!(!err.is_not_found(NotFoundKind::Class));
	}
}
