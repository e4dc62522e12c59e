//! Domain-partitioned object cache.
//!
//! The registry hands out shared wrapper objects for backing-store records
//! and guarantees one wrapper per record instance. Caches are partitioned by
//! class domain (see [`crate::domains`]): lookups for unrelated class
//! hierarchies never contend on the same lock.

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use confdal_core::{
	ConfdalError, ConfigRecord, ConfigStore, NotFoundKind, RecordToken, RelValue, Result, Symbol,
};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::domains::{DomainId, find_class_domains};
use crate::factory::DalFactory;
use crate::object::{DalObject, ObjectCore, TypedObject, view_as};

/// One domain's cache: wrapper objects keyed by record token, with a
/// secondary external-identity index for by-name lookups.
#[derive(Default)]
struct DomainCache {
	by_token: FxHashMap<RecordToken, Arc<dyn DalObject>>,
	by_uid: FxHashMap<String, RecordToken>,
}

/// Cache region for one inheritance-connected class cluster.
struct CacheDomain {
	cache: Mutex<DomainCache>,
}

impl CacheDomain {
	fn new() -> Arc<Self> {
		Arc::new(Self {
			cache: Mutex::new(DomainCache::default()),
		})
	}
}

/// Immutable class-to-domain routing table, published as a snapshot.
///
/// Readers load the current snapshot lock-free; [`DalRegistry::clear`] and
/// [`DalRegistry::rebuild_domains`] publish a replacement atomically.
struct DomainTable {
	map: FxHashMap<Symbol, DomainId>,
	domains: Vec<Arc<CacheDomain>>,
}

impl DomainTable {
	fn empty() -> Self {
		Self {
			map: FxHashMap::default(),
			domains: Vec::new(),
		}
	}

	fn from_partition(factory: &DalFactory, partition: &[BTreeSet<String>]) -> Self {
		let mut map = FxHashMap::default();
		let mut domains = Vec::with_capacity(partition.len());
		for (index, classes) in partition.iter().enumerate() {
			let id = DomainId(index as u32);
			for class in classes {
				map.insert(factory.known_class(class), id);
			}
			domains.push(CacheDomain::new());
		}
		Self { map, domains }
	}
}

/// Shared object cache and factory front-end over one backing store.
///
/// Constructed with [`DalRegistry::new`] and always handled as
/// `Arc<DalRegistry>`: wrapper objects keep a [`std::sync::Weak`] reference
/// back so relationship accessors can route lookups through the cache.
pub struct DalRegistry {
	/// Self-reference handed to wrapper constructors; never dangles while a
	/// method runs on `&self` behind the owning `Arc`.
	this: Weak<DalRegistry>,
	store: Arc<dyn ConfigStore>,
	factory: Arc<DalFactory>,
	table: ArcSwap<DomainTable>,
	upcast_unregistered: bool,
}

impl DalRegistry {
	/// Creates a registry over `store` with a fresh factory and strict
	/// instantiation (unregistered classes fail).
	pub fn new(store: Arc<dyn ConfigStore>) -> Result<Arc<Self>> {
		Self::with_options(store, Arc::new(DalFactory::new()), false)
	}

	/// Creates a registry sharing `factory`. With `upcast_unregistered`,
	/// records of unregistered classes are wrapped as their nearest
	/// registered ancestor instead of failing.
	pub fn with_options(
		store: Arc<dyn ConfigStore>,
		factory: Arc<DalFactory>,
		upcast_unregistered: bool,
	) -> Result<Arc<Self>> {
		let registry = Arc::new_cyclic(|this| Self {
			this: this.clone(),
			store,
			factory,
			table: ArcSwap::from_pointee(DomainTable::empty()),
			upcast_unregistered,
		});
		registry.rebuild_domains()?;
		Ok(registry)
	}

	fn this(&self) -> Result<Arc<Self>> {
		self.this
			.upgrade()
			.ok_or_else(|| ConfdalError::generic("registry is being dropped"))
	}

	/// The backing store this registry reads from.
	pub fn store(&self) -> &Arc<dyn ConfigStore> {
		&self.store
	}

	/// The class factory used for wrapper construction.
	pub fn factory(&self) -> &Arc<DalFactory> {
		&self.factory
	}

	/// Interns `name` in the shared class-name table.
	pub fn known_class(&self, name: &str) -> Symbol {
		self.factory.known_class(name)
	}

	/// Recomputes the class domain partition from the current schema and
	/// publishes it with empty caches. Call after a schema change.
	pub fn rebuild_domains(&self) -> Result<()> {
		let partition = find_class_domains(self.store.as_ref())?;
		let table = DomainTable::from_partition(&self.factory, &partition);
		tracing::debug!(
			domains = table.domains.len(),
			classes = table.map.len(),
			"rebuilt class domains"
		);
		self.table.store(Arc::new(table));
		Ok(())
	}

	/// Drops every cached wrapper together with the domain routing, as on
	/// a database unload. Previously handed-out wrappers stop being
	/// [`DalRegistry::is_valid`]; call [`DalRegistry::rebuild_domains`]
	/// when the next schema is loaded.
	pub fn clear(&self) {
		self.table.store(Arc::new(DomainTable::empty()));
		tracing::debug!("cleared object caches and domain map");
	}

	fn domain_for(&self, class: &str) -> Option<Arc<CacheDomain>> {
		let sym = self.factory.lookup_class(class)?;
		let table = self.table.load();
		let id = *table.map.get(&sym)?;
		Some(table.domains[id.index()].clone())
	}

	/// Returns the shared wrapper for `record`, viewed as `T`.
	///
	/// Creates and caches the wrapper on first sight of the record's token;
	/// later calls for the same token return the same wrapper. A cached
	/// wrapper bound to an older generation of the record is rebound and
	/// goes Stale. Newly created wrappers are initialized when `init_object`
	/// is set; cached ones are returned as they are.
	///
	/// The wrapper is returned as the `T`-typed view: the concrete type
	/// itself, or the ancestor view a subclass wrapper offers through
	/// [`DalObject::upcast`], so a record of a subclass is reachable under
	/// any ancestor's API. Soft misses return `Ok(None)`: the record's
	/// class is unrelated to `T`, or the wrapper provides no `T` view.
	pub fn get<T: TypedObject>(
		&self,
		record: &ConfigRecord,
		init_children: bool,
		init_object: bool,
	) -> Result<Option<Arc<T>>> {
		if !self.store.try_cast(T::CLASS_NAME, record.class_name()) {
			tracing::trace!(
				record = %record,
				target = T::CLASS_NAME,
				"class mismatch, no object returned"
			);
			return Ok(None);
		}
		let domain = self
			.domain_for(record.class_name())
			.ok_or_else(|| ConfdalError::not_found_class(record.class_name()))?;

		let (object, created) = {
			let mut cache = domain.cache.lock();
			match cache.by_token.get(&record.token()).cloned() {
				Some(existing) => {
					let mut st = existing.core().lock();
					if st.record.generation() != record.generation() {
						tracing::debug!(record = %record, "rebinding object to new record instance");
						st.rebind(record.clone());
					}
					drop(st);
					(existing, false)
				}
				None => {
					let object = self.factory.instantiate(
						self.store.as_ref(),
						&self.this()?,
						record,
						self.upcast_unregistered,
					)?;
					cache.by_token.insert(record.token(), object.clone());
					cache.by_uid.insert(record.uid().to_owned(), record.token());
					(object, true)
				}
			}
		};

		if created && init_object {
			object.init(init_children)?;
		}
		Ok(view_as::<T>(object))
	}

	/// Looks up the object of class `T` (or a subclass) with external
	/// identity `id`, fetching the record from the store on a cache miss.
	///
	/// `depth_hint` and `class_filter` are forwarded to the store as preload
	/// hints. Returns `Ok(None)` when no such object exists. An unknown
	/// class `T` means the store was built from a different schema and is
	/// reported as a hard error.
	pub fn get_by_name<T: TypedObject>(
		&self,
		id: &str,
		init_children: bool,
		init_object: bool,
		depth_hint: u32,
		class_filter: Option<&[String]>,
	) -> Result<Option<Arc<T>>> {
		if let Some(object) = self.find::<T>(id) {
			return Ok(Some(object));
		}
		let record = match self.store.fetch_record(T::CLASS_NAME, id, depth_hint, class_filter) {
			Ok(record) => record,
			Err(cause) if cause.is_not_found(NotFoundKind::Class) => {
				let context = format!(
					"wrong database schema, cannot find class '{}'",
					T::CLASS_NAME
				);
				return Err(ConfdalError::generic_with(context, cause));
			}
			Err(cause) if cause.is_not_found(NotFoundKind::Object) => {
				tracing::trace!(id, class = T::CLASS_NAME, "object not found");
				return Ok(None);
			}
			Err(cause) => return Err(cause),
		};
		self.get::<T>(&record, init_children, init_object)
	}

	/// Cache-only lookup by external identity. Never touches the store and
	/// never creates or initializes anything.
	pub fn find<T: TypedObject>(&self, id: &str) -> Option<Arc<T>> {
		let domain = self.domain_for(T::CLASS_NAME)?;
		let object = {
			let cache = domain.cache.lock();
			let token = *cache.by_uid.get(id)?;
			cache.by_token.get(&token)?.clone()
		};
		view_as::<T>(object)
	}

	/// True iff `object` is currently held by this registry's caches.
	///
	/// Identity is the shared [`ObjectCore`], so an ancestor view of a
	/// cached wrapper is as valid as the wrapper itself. A false result
	/// means the wrapper predates a [`DalRegistry::clear`] or belongs to
	/// another registry; its data must not be trusted.
	pub fn is_valid(&self, object: &dyn DalObject) -> bool {
		let needle: *const ObjectCore = object.core();
		let table = self.table.load();
		for domain in &table.domains {
			let cache = domain.cache.lock();
			for entry in cache.by_token.values() {
				if std::ptr::eq(entry.core(), needle) {
					return true;
				}
			}
		}
		false
	}

	/// Applies a change notification for one class: every named object that
	/// is cached goes Stale and reloads on next use. Unknown ids and classes
	/// are ignored (nothing cached means nothing to invalidate).
	///
	/// Removed objects are invalidated like modified ones; their deletion
	/// surfaces when the reload fails, or eagerly via
	/// [`DalRegistry::mark_deleted`].
	pub fn update(&self, class: &str, modified: &[String], removed: &[String], created: &[String]) {
		let Some(domain) = self.domain_for(class) else {
			tracing::debug!(class, "update notification for unknown class, ignored");
			return;
		};
		let mut touched = 0usize;
		let cache = domain.cache.lock();
		for id in modified.iter().chain(removed).chain(created) {
			let Some(token) = cache.by_uid.get(id) else {
				continue;
			};
			if let Some(object) = cache.by_token.get(token) {
				object.core().lock().mark_unread();
				touched += 1;
			}
		}
		tracing::debug!(class, touched, "processed update notification");
	}

	/// Marks the named objects Deleted. Every later accessor and `init` on
	/// them fails with [`DeletedObject`](ConfdalError::DeletedObject).
	pub fn mark_deleted(&self, class: &str, ids: &[String]) {
		let Some(domain) = self.domain_for(class) else {
			return;
		};
		let cache = domain.cache.lock();
		for id in ids {
			let Some(token) = cache.by_uid.get(id) else {
				continue;
			};
			if let Some(object) = cache.by_token.get(token) {
				let mut st = object.core().lock();
				st.is_deleted = true;
				tracing::debug!(class, id = id.as_str(), "object marked deleted");
			}
		}
	}

	/// Applies a rename notification: the cached object with external
	/// identity `old_id` (if any) is re-indexed and rebound under `new_id`.
	/// Its internal identity and cached data are unaffected.
	pub fn rename(&self, class: &str, old_id: &str, new_id: &str) {
		let Some(domain) = self.domain_for(class) else {
			tracing::debug!(class, "rename notification for unknown class, ignored");
			return;
		};
		let mut cache = domain.cache.lock();
		let Some(token) = cache.by_uid.remove(old_id) else {
			return;
		};
		cache.by_uid.insert(new_id.to_owned(), token);
		if let Some(object) = cache.by_token.get(&token) {
			let mut st = object.core().lock();
			st.uid = new_id.to_owned();
			st.record = ConfigRecord::new(
				st.record.token(),
				st.record.generation(),
				new_id,
				st.record.class_name().to_owned(),
			);
			tracing::debug!(class, old_id, new_id, "object renamed");
		}
	}

	/// Marks every cached object Stale. Each reloads from the store on its
	/// next use. Used after a bulk change with no per-object notification.
	pub fn unread_all(&self) {
		let table = self.table.load();
		for domain in &table.domains {
			let cache = domain.cache.lock();
			for object in cache.by_token.values() {
				object.core().lock().mark_unread();
			}
		}
		tracing::debug!("marked all cached objects unread");
	}

	fn relationship(
		&self,
		record: &ConfigRecord,
		name: &str,
		target: &str,
	) -> Result<RelValue> {
		self.store.relationship(record, name).map_err(|cause| {
			let context = format!(
				"cannot get an object of class '{target}' via relationship '{name}' of {record}"
			);
			ConfdalError::generic_with(context, cause)
		})
	}

	/// Resolves a single-valued relationship of `record` through the cache.
	///
	/// Generated wrapper accessors call this from [`DalObject::read`].
	/// `init_children` decides whether referenced objects load eagerly; a
	/// shallow resolve leaves them Stale until first access. Returns
	/// `Ok(None)` for an unset relationship or when the referenced object
	/// cannot be viewed as `T`.
	pub fn ref_one<T: TypedObject>(
		&self,
		record: &ConfigRecord,
		name: &str,
		init_children: bool,
	) -> Result<Option<Arc<T>>> {
		match self.relationship(record, name, T::CLASS_NAME)? {
			RelValue::None => Ok(None),
			RelValue::One(target) => self.get::<T>(&target, init_children, init_children),
			RelValue::Many(_) => Err(ConfdalError::generic(format!(
				"relationship '{name}' of {record} is multi-valued"
			))),
		}
	}

	/// Resolves a multi-valued relationship of `record` through the cache,
	/// in store order. Referenced objects that cannot be viewed as `T` are
	/// skipped.
	pub fn ref_many<T: TypedObject>(
		&self,
		record: &ConfigRecord,
		name: &str,
		init_children: bool,
	) -> Result<Vec<Arc<T>>> {
		let targets = match self.relationship(record, name, T::CLASS_NAME)? {
			RelValue::None => Vec::new(),
			RelValue::One(target) => vec![target],
			RelValue::Many(targets) => targets,
		};
		let mut objects = Vec::with_capacity(targets.len());
		for target in &targets {
			if let Some(object) = self.get::<T>(target, init_children, init_children)? {
				objects.push(object);
			}
		}
		Ok(objects)
	}
}
