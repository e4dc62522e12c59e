//! Object cache and class factory over a schema-driven configuration store.
//!
//! The registry layer sits between generated per-class wrapper types and a
//! [`ConfigStore`] backend. It guarantees a single shared wrapper per record
//! instance, partitions its caches by inheritance-connected class domains,
//! and drives the wrapper lifecycle (Stale reloads, rebinds, deletion).

pub mod domains;
pub mod factory;
pub mod object;
pub mod registry;

pub use confdal_core::{
	AttributeMap, AttributeValue, ConfdalError, ConfigRecord, ConfigStore, NotFoundKind,
	RecordToken, RelValue, Result, Symbol,
};

pub use crate::domains::{DomainId, find_class_domains};
pub use crate::factory::{Constructor, DalFactory};
pub use crate::object::{DalObject, ObjectCore, ObjectRef, TypedObject, view_as};
pub use crate::registry::DalRegistry;
