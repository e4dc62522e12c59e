//! Wrapper object base contract.
//!
//! Every generated per-class wrapper embeds an [`ObjectCore`] and implements
//! [`DalObject`] (plus [`TypedObject`] for its static class name). The core
//! carries the lifecycle state machine:
//!
//! ```text
//! Uninitialized → Live ↔ Stale → Deleted
//! ```
//!
//! Uninitialized is transient during construction (`was_read` false, nothing
//! loaded yet). Live means the wrapper's data matches the current backing
//! record. Stale is entered on invalidation and exited by the next
//! [`DalObject::init`]. Deleted is terminal.
//!
//! A subclass wrapper embeds one wrapper per ancestor class, all sharing the
//! concrete wrapper's [`ObjectCore`], and hands them out through
//! [`DalObject::upcast`]. That is how a record of a subclass is reachable
//! under an ancestor's typed API.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use confdal_core::{ConfdalError, ConfigRecord, NotFoundKind, RecordToken, Result, Symbol};
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::registry::DalRegistry;

/// Mutable lifecycle state of one wrapper, guarded by the per-object lock.
pub(crate) struct ObjectState {
	/// Current backing-store record handle.
	pub(crate) record: ConfigRecord,
	/// External identity; follows rename notifications.
	pub(crate) uid: String,
	/// False while attributes/relationships must be (re)loaded before use.
	pub(crate) was_read: bool,
	/// Set once the underlying record has been removed. Terminal.
	pub(crate) is_deleted: bool,
	/// Thread currently running [`DalObject::read`], if any.
	loading: Option<ThreadId>,
	/// Bumped on every invalidation so an in-flight load that raced one
	/// cannot mark the object Live with pre-invalidation data.
	epoch: u64,
}

impl ObjectState {
	/// Rebinds to a fresh record instance of the same external identity.
	/// The old attribute data predates the new instance, so the object goes
	/// back to Stale.
	pub(crate) fn rebind(&mut self, record: ConfigRecord) {
		self.record = record;
		self.mark_unread();
	}

	/// Invalidates the loaded data: back to Stale, and any load already in
	/// flight completes without reaching Live.
	pub(crate) fn mark_unread(&mut self) {
		self.was_read = false;
		self.epoch += 1;
	}
}

/// Shared lifecycle state embedded in every wrapper object.
///
/// The concrete class is fixed at construction and lives outside the lock;
/// everything else mutates under the per-object mutex. Ancestor views of a
/// subclass wrapper hold the same core via `Arc`, so there is one lifecycle
/// state per cached object no matter which typed view touches it.
pub struct ObjectCore {
	class: Symbol,
	state: Mutex<ObjectState>,
	loaded: Condvar,
}

impl ObjectCore {
	/// Creates the core of an uninitialized wrapper bound to `record`.
	pub fn new(class: Symbol, record: ConfigRecord) -> Self {
		let uid = record.uid().to_owned();
		Self {
			class,
			state: Mutex::new(ObjectState {
				record,
				uid,
				was_read: false,
				is_deleted: false,
				loading: None,
				epoch: 0,
			}),
			loaded: Condvar::new(),
		}
	}

	/// Concrete class name, immutable after construction.
	#[inline]
	pub fn class_name(&self) -> Symbol {
		self.class
	}

	/// External identity.
	pub fn uid(&self) -> String {
		self.state.lock().uid.clone()
	}

	/// Internal identity token of the bound record.
	pub fn token(&self) -> RecordToken {
		self.state.lock().record.token()
	}

	/// Snapshot of the current record handle.
	pub fn record(&self) -> ConfigRecord {
		self.state.lock().record.clone()
	}

	/// True if the wrapper's data matches the current backing record.
	pub fn was_read(&self) -> bool {
		self.state.lock().was_read
	}

	/// True once the underlying record has been removed.
	pub fn is_deleted(&self) -> bool {
		self.state.lock().is_deleted
	}

	/// Fails with [`DeletedObject`](ConfdalError::DeletedObject) if the
	/// record was removed. Wrappers call this at the top of every attribute
	/// and relationship accessor.
	pub fn ensure_live(&self) -> Result<()> {
		let st = self.state.lock();
		if st.is_deleted {
			return Err(ConfdalError::deleted_object(self.class.as_str(), st.uid.as_str()));
		}
		Ok(())
	}

	pub(crate) fn lock(&self) -> MutexGuard<'_, ObjectState> {
		self.state.lock()
	}
}

/// Lifecycle contract every wrapper object satisfies.
///
/// Wrapper construction stores the record handle and nothing else; the
/// actual attribute/relationship load happens in [`DalObject::init`], driven
/// by the registry or lazily by the first accessor.
pub trait DalObject: Send + Sync + 'static {
	/// The embedded lifecycle core.
	fn core(&self) -> &ObjectCore;

	/// Loads attributes and relationships from the backing store via the
	/// wrapper's registry handle. `init_children` asks the wrapper to
	/// eagerly resolve referenced objects too.
	///
	/// Called by [`DalObject::init`]; wrappers do not call this directly.
	fn read(&self, record: &ConfigRecord, init_children: bool) -> Result<()>;

	/// Type-erased handle used by the registry to downcast to the concrete
	/// wrapper type.
	fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

	/// This wrapper viewed as ancestor class `class`.
	///
	/// Generated subclass wrappers return their embedded base view (which
	/// shares this wrapper's [`ObjectCore`]) and delegate further up the
	/// chain. The default has no ancestors to offer.
	fn upcast(self: Arc<Self>, class: &str) -> Option<Arc<dyn DalObject>> {
		let _ = class;
		None
	}

	/// External identity.
	fn uid(&self) -> String {
		self.core().uid()
	}

	/// Concrete class name, fixed at creation.
	fn class_name(&self) -> Symbol {
		self.core().class_name()
	}

	/// True once the underlying record has been removed.
	fn is_deleted(&self) -> bool {
		self.core().is_deleted()
	}

	/// Drives the Stale→Live transition. Idempotent when already Live.
	///
	/// One thread at a time owns the load; concurrent callers block until
	/// it finishes, so `Ok(())` always means the data is loaded. The owning
	/// thread itself passes straight through, which lets a relationship
	/// cycle resolve back into this object and terminate.
	///
	/// A read failure leaves the object Stale and surfaces as
	/// [`Generic`](ConfdalError::Generic) with the cause chained; a read
	/// that finds the record gone marks the object Deleted and fails with
	/// [`DeletedObject`](ConfdalError::DeletedObject).
	fn init(&self, init_children: bool) -> Result<()> {
		let core = self.core();
		let me = thread::current().id();
		let (record, epoch) = {
			let mut st = core.lock();
			loop {
				if st.is_deleted {
					return Err(ConfdalError::deleted_object(
						core.class_name().as_str(),
						st.uid.as_str(),
					));
				}
				if st.was_read {
					return Ok(());
				}
				match st.loading {
					Some(owner) if owner == me => return Ok(()),
					Some(_) => core.loaded.wait(&mut st),
					None => break,
				}
			}
			st.loading = Some(me);
			(st.record.clone(), st.epoch)
		};

		let outcome = self.read(&record, init_children);
		let mut st = core.lock();
		st.loading = None;
		core.loaded.notify_all();
		match outcome {
			Ok(()) => {
				// An invalidation that raced the load wins: stay Stale so
				// the next access reloads.
				if st.epoch == epoch {
					st.was_read = true;
				}
				Ok(())
			}
			Err(cause) => {
				if cause.is_not_found(NotFoundKind::Object) {
					st.is_deleted = true;
					return Err(ConfdalError::deleted_object(
						core.class_name().as_str(),
						st.uid.as_str(),
					));
				}
				let context = format!("failed to init '{}@{}'", st.uid, core.class_name());
				Err(ConfdalError::generic_with(context, cause))
			}
		}
	}
}

impl fmt::Debug for dyn DalObject {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DalObject")
			.field("class", &self.class_name().as_str())
			.field("uid", &self.uid())
			.finish()
	}
}

/// Wrapper type with a static class name, as emitted by the code generator.
pub trait TypedObject: DalObject + Sized {
	/// Schema class this wrapper type represents.
	const CLASS_NAME: &'static str;

	/// Builds an uninitialized wrapper bound to `record`.
	///
	/// Must have no side effects beyond storing the handles; the wrapper
	/// keeps a [`std::sync::Weak`] registry reference so relationship
	/// accessors can route lookups back through the registry.
	fn construct(registry: &Arc<DalRegistry>, record: ConfigRecord) -> Arc<Self>;
}

/// Resolves a type-erased cached wrapper to the typed view `T`: the exact
/// concrete type, or the ancestor view the concrete wrapper offers for
/// `T::CLASS_NAME`.
pub fn view_as<T: TypedObject>(object: Arc<dyn DalObject>) -> Option<Arc<T>> {
	if let Ok(exact) = object.clone().as_any().downcast::<T>() {
		return Some(exact);
	}
	object.upcast(T::CLASS_NAME)?.as_any().downcast::<T>().ok()
}

/// Formats an optional wrapper reference for log and error messages:
/// `(null)`, `(deleted object uid@Class)`, or `'uid@Class'`.
pub struct ObjectRef<'a>(pub Option<&'a dyn DalObject>);

impl core::fmt::Display for ObjectRef<'_> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self.0 {
			None => f.write_str("(null)"),
			Some(obj) if obj.is_deleted() => {
				write!(f, "(deleted object {}@{})", obj.uid(), obj.class_name())
			}
			Some(obj) => write!(f, "'{}@{}'", obj.uid(), obj.class_name()),
		}
	}
}
