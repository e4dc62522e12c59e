//! Core types shared across the confdal object layer.
//!
//! This crate defines the vocabulary the registry and factory crates speak:
//! - [`ConfdalError`]: the error taxonomy for the whole workspace
//! - [`Symbol`] / [`ClassNames`]: canonical interned class-name references
//! - [`ClassInfo`]: the class hierarchy as supplied by the backing store
//! - [`ConfigRecord`]: a cheap handle to one backing-store record instance
//! - [`ConfigStore`]: the narrow interface consumed from the backing store

pub mod error;
pub mod record;
pub mod schema;
pub mod store;
pub mod symbol;

pub use error::{ConfdalError, NotFoundKind, Result};
pub use record::{ConfigRecord, RecordToken};
pub use schema::ClassInfo;
pub use store::{AttributeMap, AttributeValue, ConfigStore, RelValue};
pub use symbol::{ClassNames, Symbol};
