//! Canonical interned class-name references.
//!
//! The domain map and the constructor table are keyed by class, and both sit
//! on hot lookup paths. Interning gives every distinct class-name string one
//! canonical [`Symbol`] whose equality and hash are pointer operations, so
//! map lookups never re-hash string contents.

use std::hash::{Hash, Hasher};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Canonical reference to an interned class-name string.
///
/// Two symbols compare equal iff they came from the same [`ClassNames`] table
/// and name the same string; equality is pointer identity, not value
/// comparison. Symbols are stable for the lifetime of the process.
#[derive(Clone, Copy)]
pub struct Symbol(&'static str);

impl Symbol {
	/// Returns the interned string.
	#[inline]
	pub fn as_str(self) -> &'static str {
		self.0
	}
}

impl PartialEq for Symbol {
	#[inline]
	fn eq(&self, other: &Self) -> bool {
		std::ptr::eq(self.0, other.0)
	}
}

impl Eq for Symbol {}

impl Hash for Symbol {
	#[inline]
	fn hash<H: Hasher>(&self, state: &mut H) {
		(self.0.as_ptr() as usize).hash(state);
	}
}

impl core::fmt::Display for Symbol {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.write_str(self.0)
	}
}

impl core::fmt::Debug for Symbol {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_tuple("Symbol").field(&self.0).finish()
	}
}

/// Append-only, thread-safe table of known class names.
///
/// Interned strings are leaked so previously returned [`Symbol`]s are never
/// invalidated. Schemas hold at most a few hundred classes, so the table
/// never grows past a trivial size.
#[derive(Default)]
pub struct ClassNames {
	table: Mutex<FxHashMap<&'static str, Symbol>>,
}

impl ClassNames {
	/// Creates an empty table.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the canonical symbol for `name`, interning it on first use.
	pub fn intern(&self, name: &str) -> Symbol {
		let mut table = self.table.lock();
		if let Some(&sym) = table.get(name) {
			return sym;
		}
		let leaked: &'static str = Box::leak(name.to_owned().into_boxed_str());
		let sym = Symbol(leaked);
		table.insert(leaked, sym);
		sym
	}

	/// Returns the symbol for `name` if it was interned before, without
	/// interning it.
	pub fn get(&self, name: &str) -> Option<Symbol> {
		self.table.lock().get(name).copied()
	}

	/// Number of distinct interned names.
	pub fn len(&self) -> usize {
		self.table.lock().len()
	}

	/// True if nothing has been interned yet.
	pub fn is_empty(&self) -> bool {
		self.table.lock().is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn intern_is_canonical() {
		let names = ClassNames::new();
		let a = names.intern("Detector");
		let b = names.intern("Detector");
		let c = names.intern(&String::from("Detector"));

		assert_eq!(a, b);
		assert_eq!(a, c);
		assert!(std::ptr::eq(a.as_str(), b.as_str()));
		assert_eq!(names.len(), 1);
	}

	#[test]
	fn distinct_names_distinct_symbols() {
		let names = ClassNames::new();
		let a = names.intern("Detector");
		let b = names.intern("Sensor");

		assert_ne!(a, b);
		assert_eq!(names.len(), 2);
	}

	#[test]
	fn symbols_stay_stable_as_table_grows() {
		let names = ClassNames::new();
		let first = names.intern("Class0");
		for i in 1..500 {
			names.intern(&format!("Class{i}"));
		}
		assert_eq!(names.intern("Class0"), first);
		assert_eq!(first.as_str(), "Class0");
	}

	#[test]
	fn get_does_not_intern() {
		let names = ClassNames::new();
		assert!(names.get("Detector").is_none());
		let sym = names.intern("Detector");
		assert_eq!(names.get("Detector"), Some(sym));
	}

	#[test]
	fn separate_tables_do_not_share_symbols() {
		let left = ClassNames::new();
		let right = ClassNames::new();
		// Same string value, different canonical references.
		assert_ne!(left.intern("Detector"), right.intern("Detector"));
	}
}
