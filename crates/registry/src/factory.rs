//! Class factory: runtime class-name-keyed constructor registry.
//!
//! Constructors are registered once at startup (generated wrapper code calls
//! [`DalFactory::register_class`] per class) and looked up on every cache
//! miss. Lookup is polymorphic: when no exact constructor exists for a
//! record's actual class, the factory can walk the superclass chain and fall
//! back to the nearest registered ancestor.

use std::collections::hash_map::Entry;
use std::sync::Arc;

use confdal_core::{ClassNames, ConfdalError, ConfigRecord, ConfigStore, Result, Symbol};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::object::{DalObject, TypedObject};
use crate::registry::DalRegistry;

/// Constructor producing an uninitialized wrapper for one class.
pub type Constructor = fn(&Arc<DalRegistry>, ConfigRecord) -> Arc<dyn DalObject>;

fn construct<T: TypedObject>(
	registry: &Arc<DalRegistry>,
	record: ConfigRecord,
) -> Arc<dyn DalObject> {
	T::construct(registry, record)
}

/// Process-scoped wrapper constructor registry plus class-name interner.
///
/// The two tables have independent locks: registration happens at startup
/// and may run slow user code, while interning sits on the lookup hot path.
#[derive(Default)]
pub struct DalFactory {
	constructors: Mutex<FxHashMap<Symbol, Constructor>>,
	class_names: ClassNames,
}

impl DalFactory {
	/// Creates an empty factory.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the canonical reference for `name`, interning it on first
	/// use. Returned symbols are never invalidated.
	pub fn known_class(&self, name: &str) -> Symbol {
		self.class_names.intern(name)
	}

	/// Returns the canonical reference for `name` only if it is already
	/// known.
	pub fn lookup_class(&self, name: &str) -> Option<Symbol> {
		self.class_names.get(name)
	}

	/// Registers `ctor` under `class_name`.
	///
	/// A duplicate registration under the same name keeps the first
	/// constructor; the no-op is logged so misbehaving generated code is
	/// observable.
	pub fn register(&self, class_name: &str, ctor: Constructor) {
		let sym = self.known_class(class_name);
		let mut map = self.constructors.lock();
		match map.entry(sym) {
			Entry::Occupied(_) => {
				tracing::debug!(class = class_name, "class was already registered");
			}
			Entry::Vacant(entry) => {
				tracing::debug!(class = class_name, "register class");
				entry.insert(ctor);
			}
		}
	}

	/// Registers the wrapper type `T` under its static class name.
	pub fn register_class<T: TypedObject>(&self) {
		self.register(T::CLASS_NAME, construct::<T>);
	}

	fn constructor(&self, name: &str) -> Option<Constructor> {
		let sym = self.class_names.get(name)?;
		self.constructors.lock().get(&sym).copied()
	}

	/// Instantiates the concrete wrapper for `record`'s actual class.
	///
	/// With `upcast_unregistered`, an unregistered class falls back to the
	/// first registered ancestor found by a depth-first walk of the
	/// superclass chain in schema declaration order; the wrapper is then an
	/// instance of that ancestor's concrete class. Without it, or when the
	/// walk exhausts the chain, fails with
	/// [`ClassNotRegistered`](ConfdalError::ClassNotRegistered).
	pub fn instantiate(
		&self,
		store: &dyn ConfigStore,
		registry: &Arc<DalRegistry>,
		record: &ConfigRecord,
		upcast_unregistered: bool,
	) -> Result<Arc<dyn DalObject>> {
		self.instantiate_class(store, registry, record, record.class_name(), upcast_unregistered)
	}

	fn instantiate_class(
		&self,
		store: &dyn ConfigStore,
		registry: &Arc<DalRegistry>,
		record: &ConfigRecord,
		class: &str,
		upcast_unregistered: bool,
	) -> Result<Arc<dyn DalObject>> {
		if let Some(ctor) = self.constructor(class) {
			tracing::trace!(uid = record.uid(), class, "building object");
			return Ok(ctor(registry, record.clone()));
		}
		if upcast_unregistered {
			for parent in store.superclasses_of(class)? {
				match self.instantiate_class(store, registry, record, &parent, true) {
					Err(ConfdalError::ClassNotRegistered { .. }) => continue,
					other => return other,
				}
			}
		}
		Err(ConfdalError::class_not_registered(class))
	}

	/// Variant taking an explicit fallback class instead of walking the
	/// hierarchy, for callers that already know which ancestor to use.
	pub fn instantiate_as(
		&self,
		registry: &Arc<DalRegistry>,
		record: &ConfigRecord,
		fallback_class: &str,
	) -> Result<Arc<dyn DalObject>> {
		if let Some(ctor) = self.constructor(record.class_name()) {
			return Ok(ctor(registry, record.clone()));
		}
		match self.constructor(fallback_class) {
			Some(ctor) => {
				tracing::trace!(
					uid = record.uid(),
					class = record.class_name(),
					fallback = fallback_class,
					"building object via explicit fallback"
				);
				Ok(ctor(registry, record.clone()))
			}
			None => Err(ConfdalError::class_not_registered(fallback_class)),
		}
	}
}
