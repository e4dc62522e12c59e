//! Class hierarchy description supplied by the backing store.

/// Description of one class in the schema.
///
/// The hierarchy forms a DAG: multiple inheritance is allowed, cycles are
/// not. The registry treats this data as read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
	/// Class name.
	pub name: String,
	/// Direct superclasses in schema declaration order.
	pub superclasses: Vec<String>,
	/// Transitive subclass closure.
	pub subclasses: Vec<String>,
}

impl ClassInfo {
	/// True if this class has no superclasses.
	pub fn is_root(&self) -> bool {
		self.superclasses.is_empty()
	}
}
