//! The narrow interface the registry consumes from the backing store.
//!
//! The backing-store engine (schema introspection, storage, queries,
//! persistence) lives behind this trait. The registry only needs hierarchy
//! queries, record fetch, and attribute/relationship reads.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::record::ConfigRecord;
use crate::schema::ClassInfo;

/// Attribute value of a record.
///
/// Typed accessors belong to generated wrapper code; the registry only moves
/// opaque values between the store and wrappers.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
	/// Boolean attribute.
	Bool(bool),
	/// Integer attribute.
	Int(i64),
	/// Floating-point attribute.
	Float(f64),
	/// String attribute.
	Text(String),
	/// Multi-valued attribute.
	List(Vec<AttributeValue>),
}

impl AttributeValue {
	/// Returns the integer value if this is an `Int`.
	pub fn as_int(&self) -> Option<i64> {
		match self {
			AttributeValue::Int(v) => Some(*v),
			_ => None,
		}
	}

	/// Returns the string value if this is a `Text`.
	pub fn as_text(&self) -> Option<&str> {
		match self {
			AttributeValue::Text(v) => Some(v),
			_ => None,
		}
	}

	/// Returns the boolean value if this is a `Bool`.
	pub fn as_bool(&self) -> Option<bool> {
		match self {
			AttributeValue::Bool(v) => Some(*v),
			_ => None,
		}
	}
}

/// Attribute name to value map for one record.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// Result of resolving a relationship on a record.
#[derive(Debug, Clone)]
pub enum RelValue {
	/// Single-valued relationship, currently unset.
	None,
	/// Single-valued relationship.
	One(ConfigRecord),
	/// Multi-valued relationship, in store order.
	Many(Vec<ConfigRecord>),
}

/// Interface into the schema-driven backing store.
///
/// Implementations must be safe to call from multiple threads; the registry
/// invokes the store concurrently from reader threads and the notification
/// thread.
pub trait ConfigStore: Send + Sync {
	/// All class names known to the schema, in declaration order.
	fn class_list(&self) -> Vec<String>;

	/// Hierarchy description for one class.
	///
	/// Fails with [`NotFound`](crate::ConfdalError::NotFound) (kind class)
	/// for unknown names.
	fn class_info(&self, name: &str) -> Result<ClassInfo>;

	/// Direct superclasses of `class` in schema declaration order.
	///
	/// The order matters: the factory's upcast fallback walks it first match
	/// wins.
	fn superclasses_of(&self, class: &str) -> Result<Vec<String>>;

	/// True iff a record of class `actual` can be viewed as `target`, i.e.
	/// `actual` is `target` or one of its subclasses.
	fn try_cast(&self, target: &str, actual: &str) -> bool;

	/// True iff `a` is a strict subclass of `b`.
	fn is_subclass_of(&self, a: &str, b: &str) -> bool {
		a != b && self.try_cast(b, a)
	}

	/// Fetches the record of `class` (or a subclass) with external identity
	/// `id`.
	///
	/// `depth_hint` and `class_filter` are pass-through preload hints; stores
	/// may ignore them. Fails with [`NotFound`](crate::ConfdalError::NotFound)
	/// kind class for unknown classes and kind object for unknown ids.
	fn fetch_record(
		&self,
		class: &str,
		id: &str,
		depth_hint: u32,
		class_filter: Option<&[String]>,
	) -> Result<ConfigRecord>;

	/// Reads the attribute values of `record`.
	///
	/// Fails with [`NotFound`](crate::ConfdalError::NotFound) kind object if
	/// the underlying record no longer exists.
	fn attributes(&self, record: &ConfigRecord) -> Result<AttributeMap>;

	/// Resolves the relationship `name` on `record`.
	fn relationship(&self, record: &ConfigRecord, name: &str) -> Result<RelValue>;
}
