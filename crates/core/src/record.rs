//! Handles to backing-store records.

/// Internal identity token of a backing-store record.
///
/// Stable across re-reads of the same logical record. A record that is
/// destroyed and re-created under the same external name gets a different
/// token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordToken(pub u64);

/// Cheap handle to one backing-store record instance.
///
/// The `generation` distinguishes record *instances* for the same logical
/// record: the store bumps it when it re-materializes a record (e.g. after
/// an unload/reload cycle). The registry rebinds a cached wrapper when it is
/// handed a handle with the same token but a newer generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRecord {
	token: RecordToken,
	generation: u64,
	uid: String,
	class: String,
}

impl ConfigRecord {
	/// Creates a record handle. Normally only backing-store implementations
	/// call this.
	pub fn new(
		token: RecordToken,
		generation: u64,
		uid: impl Into<String>,
		class: impl Into<String>,
	) -> Self {
		Self {
			token,
			generation,
			uid: uid.into(),
			class: class.into(),
		}
	}

	/// Internal identity token.
	#[inline]
	pub fn token(&self) -> RecordToken {
		self.token
	}

	/// Instance generation of the underlying record.
	#[inline]
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// External, user-visible identity.
	#[inline]
	pub fn uid(&self) -> &str {
		&self.uid
	}

	/// Concrete class name of the record.
	#[inline]
	pub fn class_name(&self) -> &str {
		&self.class
	}

	/// True if both handles refer to the same underlying record instance.
	#[inline]
	pub fn same_instance(&self, other: &ConfigRecord) -> bool {
		self.token == other.token && self.generation == other.generation
	}
}

impl core::fmt::Display for ConfigRecord {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		write!(f, "'{}@{}'", self.uid, self.class)
	}
}
