//! In-memory reference implementation of [`ConfigStore`].
//!
//! Backs the registry's tests and gives embedders without a native backend a
//! working store. The schema is declared as `(class, direct superclasses)`
//! pairs; records can be inserted, destroyed, renamed, and re-materialized at
//! runtime to drive the registry's invalidation and rebind paths.
//!
//! Identity rules follow the record contract:
//! - a destroyed record re-inserted under the same uid gets a fresh token,
//! - [`MemStore::touch`] bumps the record generation, modeling the store
//!   re-materializing the same logical record after an unload/reload cycle.

use std::collections::{BTreeMap, VecDeque};

use confdal_core::{
	AttributeMap, ClassInfo, ConfdalError, ConfigRecord, ConfigStore, RecordToken, RelValue, Result,
};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone, Default)]
struct ClassDecl {
	superclasses: Vec<String>,
	direct_subclasses: Vec<String>,
}

/// Relationship targets, stored as `(class, uid)` references and resolved to
/// live handles at query time.
#[derive(Debug, Clone)]
enum Relationship {
	One(Option<(String, String)>),
	Many(Vec<(String, String)>),
}

#[derive(Debug, Clone)]
struct Slot {
	record: ConfigRecord,
	attrs: AttributeMap,
	rels: BTreeMap<String, Relationship>,
}

#[derive(Default)]
struct Inner {
	/// Class declaration order.
	order: Vec<String>,
	classes: FxHashMap<String, ClassDecl>,
	/// Keyed by (concrete class, uid).
	records: FxHashMap<(String, String), Slot>,
	next_token: u64,
}

/// Mutable in-memory backing store.
#[derive(Default)]
pub struct MemStore {
	inner: RwLock<Inner>,
}

impl MemStore {
	/// Creates an empty store with no classes.
	pub fn new() -> Self {
		Self::default()
	}

	/// Declares a class with its direct superclasses, in declaration order.
	///
	/// Superclasses must have been declared first.
	pub fn define_class(&self, name: &str, superclasses: &[&str]) -> Result<()> {
		let mut inner = self.inner.write();
		for sup in superclasses {
			if !inner.classes.contains_key(*sup) {
				return Err(ConfdalError::not_found_class(*sup));
			}
		}
		if inner.classes.contains_key(name) {
			return Err(ConfdalError::generic(format!(
				"class '{name}' is already defined"
			)));
		}
		inner.order.push(name.to_owned());
		inner.classes.insert(
			name.to_owned(),
			ClassDecl {
				superclasses: superclasses.iter().map(|s| (*s).to_owned()).collect(),
				direct_subclasses: Vec::new(),
			},
		);
		for sup in superclasses {
			if let Some(decl) = inner.classes.get_mut(*sup) {
				decl.direct_subclasses.push(name.to_owned());
			}
		}
		Ok(())
	}

	/// Creates a record of `class` with external identity `uid`.
	///
	/// Each insert allocates a fresh identity token, including re-inserts
	/// after [`destroy`](Self::destroy).
	pub fn insert(&self, class: &str, uid: &str, attrs: AttributeMap) -> Result<ConfigRecord> {
		let mut inner = self.inner.write();
		if !inner.classes.contains_key(class) {
			return Err(ConfdalError::not_found_class(class));
		}
		let key = (class.to_owned(), uid.to_owned());
		if inner.records.contains_key(&key) {
			return Err(ConfdalError::generic(format!(
				"record '{uid}@{class}' already exists"
			)));
		}
		inner.next_token += 1;
		let record = ConfigRecord::new(RecordToken(inner.next_token), 1, uid, class);
		tracing::debug!(%record, token = inner.next_token, "insert record");
		inner.records.insert(
			key,
			Slot {
				record: record.clone(),
				attrs,
				rels: BTreeMap::new(),
			},
		);
		Ok(record)
	}

	/// Removes the record. A later insert under the same uid is a different
	/// logical record with a new token.
	pub fn destroy(&self, class: &str, uid: &str) -> Result<()> {
		let mut inner = self.inner.write();
		let key = (class.to_owned(), uid.to_owned());
		match inner.records.remove(&key) {
			Some(slot) => {
				tracing::debug!(record = %slot.record, "destroy record");
				Ok(())
			}
			None => Err(ConfdalError::not_found_object(uid)),
		}
	}

	/// Re-materializes the record instance: same logical record and token,
	/// next generation. Returns the new handle.
	pub fn touch(&self, class: &str, uid: &str) -> Result<ConfigRecord> {
		let mut inner = self.inner.write();
		let key = (class.to_owned(), uid.to_owned());
		let slot = inner
			.records
			.get_mut(&key)
			.ok_or_else(|| ConfdalError::not_found_object(uid))?;
		let old = &slot.record;
		slot.record = ConfigRecord::new(old.token(), old.generation() + 1, uid, class);
		Ok(slot.record.clone())
	}

	/// Replaces the attribute map of an existing record.
	pub fn set_attributes(&self, class: &str, uid: &str, attrs: AttributeMap) -> Result<()> {
		let mut inner = self.inner.write();
		let key = (class.to_owned(), uid.to_owned());
		let slot = inner
			.records
			.get_mut(&key)
			.ok_or_else(|| ConfdalError::not_found_object(uid))?;
		slot.attrs = attrs;
		Ok(())
	}

	/// Changes a record's external identity, fixing up relationship targets
	/// that point at it.
	pub fn rename(&self, class: &str, old_uid: &str, new_uid: &str) -> Result<()> {
		let mut inner = self.inner.write();
		let old_key = (class.to_owned(), old_uid.to_owned());
		let mut slot = inner
			.records
			.remove(&old_key)
			.ok_or_else(|| ConfdalError::not_found_object(old_uid))?;
		slot.record = ConfigRecord::new(
			slot.record.token(),
			slot.record.generation(),
			new_uid,
			class,
		);
		tracing::debug!(class, old_uid, new_uid, "rename record");
		inner
			.records
			.insert((class.to_owned(), new_uid.to_owned()), slot);

		let target = (class.to_owned(), old_uid.to_owned());
		for slot in inner.records.values_mut() {
			for rel in slot.rels.values_mut() {
				match rel {
					Relationship::One(Some(t)) if *t == target => t.1 = new_uid.to_owned(),
					Relationship::Many(ts) => {
						for t in ts.iter_mut().filter(|t| **t == target) {
							t.1 = new_uid.to_owned();
						}
					}
					_ => {}
				}
			}
		}
		Ok(())
	}

	/// Sets a single-valued relationship.
	pub fn link_one(
		&self,
		class: &str,
		uid: &str,
		name: &str,
		target: Option<(&str, &str)>,
	) -> Result<()> {
		self.set_rel(
			class,
			uid,
			name,
			Relationship::One(target.map(|(c, u)| (c.to_owned(), u.to_owned()))),
		)
	}

	/// Sets a multi-valued relationship, in the given order.
	pub fn link_many(&self, class: &str, uid: &str, name: &str, targets: &[(&str, &str)]) -> Result<()> {
		self.set_rel(
			class,
			uid,
			name,
			Relationship::Many(
				targets
					.iter()
					.map(|(c, u)| ((*c).to_owned(), (*u).to_owned()))
					.collect(),
			),
		)
	}

	fn set_rel(&self, class: &str, uid: &str, name: &str, rel: Relationship) -> Result<()> {
		let mut inner = self.inner.write();
		let key = (class.to_owned(), uid.to_owned());
		let slot = inner
			.records
			.get_mut(&key)
			.ok_or_else(|| ConfdalError::not_found_object(uid))?;
		slot.rels.insert(name.to_owned(), rel);
		Ok(())
	}
}

impl Inner {
	/// Transitive subclass closure of `name`, in breadth-first declaration
	/// order.
	fn subclass_closure(&self, name: &str) -> Vec<String> {
		let mut seen = FxHashSet::default();
		let mut queue: VecDeque<&str> = VecDeque::from([name]);
		let mut out = Vec::new();
		while let Some(class) = queue.pop_front() {
			if let Some(decl) = self.classes.get(class) {
				for sub in &decl.direct_subclasses {
					if seen.insert(sub.clone()) {
						out.push(sub.clone());
						queue.push_back(sub);
					}
				}
			}
		}
		out
	}

	/// True iff `actual` is `target` or a subclass of `target`.
	fn castable(&self, target: &str, actual: &str) -> bool {
		if target == actual {
			return self.classes.contains_key(target);
		}
		let mut queue: Vec<&str> = vec![actual];
		let mut seen = FxHashSet::default();
		while let Some(class) = queue.pop() {
			if let Some(decl) = self.classes.get(class) {
				for sup in &decl.superclasses {
					if sup == target {
						return true;
					}
					if seen.insert(sup.as_str()) {
						queue.push(sup);
					}
				}
			}
		}
		false
	}

	fn slot(&self, record: &ConfigRecord) -> Result<&Slot> {
		let key = (record.class_name().to_owned(), record.uid().to_owned());
		match self.records.get(&key) {
			// A reused uid with a different token is a different logical
			// record: the one behind this handle is gone.
			Some(slot) if slot.record.token() == record.token() => Ok(slot),
			_ => Err(ConfdalError::not_found_object(record.uid())),
		}
	}
}

impl ConfigStore for MemStore {
	fn class_list(&self) -> Vec<String> {
		self.inner.read().order.clone()
	}

	fn class_info(&self, name: &str) -> Result<ClassInfo> {
		let inner = self.inner.read();
		let decl = inner
			.classes
			.get(name)
			.ok_or_else(|| ConfdalError::not_found_class(name))?;
		Ok(ClassInfo {
			name: name.to_owned(),
			superclasses: decl.superclasses.clone(),
			subclasses: inner.subclass_closure(name),
		})
	}

	fn superclasses_of(&self, class: &str) -> Result<Vec<String>> {
		let inner = self.inner.read();
		inner
			.classes
			.get(class)
			.map(|decl| decl.superclasses.clone())
			.ok_or_else(|| ConfdalError::not_found_class(class))
	}

	fn try_cast(&self, target: &str, actual: &str) -> bool {
		self.inner.read().castable(target, actual)
	}

	fn fetch_record(
		&self,
		class: &str,
		id: &str,
		_depth_hint: u32,
		_class_filter: Option<&[String]>,
	) -> Result<ConfigRecord> {
		let inner = self.inner.read();
		if !inner.classes.contains_key(class) {
			return Err(ConfdalError::not_found_class(class));
		}
		let key = (class.to_owned(), id.to_owned());
		if let Some(slot) = inner.records.get(&key) {
			return Ok(slot.record.clone());
		}
		// The query class includes its subclasses.
		for sub in inner.subclass_closure(class) {
			if let Some(slot) = inner.records.get(&(sub, id.to_owned())) {
				return Ok(slot.record.clone());
			}
		}
		Err(ConfdalError::not_found_object(id))
	}

	fn attributes(&self, record: &ConfigRecord) -> Result<AttributeMap> {
		let inner = self.inner.read();
		Ok(inner.slot(record)?.attrs.clone())
	}

	fn relationship(&self, record: &ConfigRecord, name: &str) -> Result<RelValue> {
		let inner = self.inner.read();
		let slot = inner.slot(record)?;
		let rel = slot.rels.get(name).ok_or_else(|| {
			ConfdalError::generic(format!(
				"cannot find relationship '{}' in class '{}' for object '{}'",
				name,
				record.class_name(),
				record.uid()
			))
		})?;
		let resolve = |target: &(String, String)| -> Result<ConfigRecord> {
			let slot = inner
				.records
				.get(target)
				.ok_or_else(|| ConfdalError::not_found_object(&target.1))?;
			Ok(slot.record.clone())
		};
		match rel {
			Relationship::One(None) => Ok(RelValue::None),
			Relationship::One(Some(target)) => Ok(RelValue::One(resolve(target)?)),
			Relationship::Many(targets) => Ok(RelValue::Many(
				targets.iter().map(resolve).collect::<Result<Vec<_>>>()?,
			)),
		}
	}
}

#[cfg(test)]
mod tests {
	use confdal_core::{AttributeValue, NotFoundKind};

	use super::*;

	fn detector_schema() -> MemStore {
		let store = MemStore::new();
		store.define_class("Detector", &[]).unwrap();
		store.define_class("Sensor", &["Detector"]).unwrap();
		store.define_class("Camera", &["Sensor"]).unwrap();
		store.define_class("PowerSupply", &[]).unwrap();
		store
	}

	fn attrs(power: i64) -> AttributeMap {
		let mut map = AttributeMap::new();
		map.insert("power".to_owned(), AttributeValue::Int(power));
		map
	}

	#[test]
	fn class_info_closes_over_subclasses() {
		let store = detector_schema();
		let info = store.class_info("Detector").unwrap();
		assert!(info.is_root());
		assert_eq!(info.subclasses, vec!["Sensor", "Camera"]);

		let leaf = store.class_info("Camera").unwrap();
		assert_eq!(leaf.superclasses, vec!["Sensor"]);
		assert!(leaf.subclasses.is_empty());
	}

	#[test]
	fn try_cast_walks_ancestors() {
		let store = detector_schema();
		assert!(store.try_cast("Detector", "Camera"));
		assert!(store.try_cast("Sensor", "Sensor"));
		assert!(!store.try_cast("Camera", "Detector"));
		assert!(!store.try_cast("PowerSupply", "Camera"));
		assert!(!store.try_cast("Nope", "Nope"));
	}

	#[test]
	fn is_subclass_of_is_strict() {
		let store = detector_schema();
		assert!(store.is_subclass_of("Camera", "Detector"));
		assert!(store.is_subclass_of("Sensor", "Detector"));
		assert!(!store.is_subclass_of("Detector", "Detector"));
		assert!(!store.is_subclass_of("Detector", "Camera"));
	}

	#[test]
	fn subclass_closure_is_breadth_first() {
		let store = MemStore::new();
		store.define_class("A", &[]).unwrap();
		store.define_class("B", &["A"]).unwrap();
		store.define_class("C", &["A"]).unwrap();
		store.define_class("E", &["B"]).unwrap();
		store.define_class("F", &["C"]).unwrap();

		// Direct subclasses first, then the next generation.
		let info = store.class_info("A").unwrap();
		assert_eq!(info.subclasses, vec!["B", "C", "E", "F"]);
	}

	#[test]
	fn fetch_includes_subclasses() {
		let store = detector_schema();
		store.insert("Camera", "cam-1", attrs(5)).unwrap();

		let rec = store.fetch_record("Detector", "cam-1", 0, None).unwrap();
		assert_eq!(rec.class_name(), "Camera");

		let err = store.fetch_record("Detector", "missing", 0, None).unwrap_err();
		assert!(err.is_not_found(NotFoundKind::Object));
		let err = store.fetch_record("Nope", "cam-1", 0, None).unwrap_err();
		assert!(err.is_not_found(NotFoundKind::Class));
	}

	#[test]
	fn reinsert_gets_fresh_token() {
		let store = detector_schema();
		let first = store.insert("Sensor", "s1", attrs(1)).unwrap();
		store.destroy("Sensor", "s1").unwrap();
		let second = store.insert("Sensor", "s1", attrs(2)).unwrap();

		assert_ne!(first.token(), second.token());
		// The old handle no longer resolves.
		let err = store.attributes(&first).unwrap_err();
		assert!(err.is_not_found(NotFoundKind::Object));
	}

	#[test]
	fn touch_bumps_generation_only() {
		let store = detector_schema();
		let first = store.insert("Sensor", "s1", attrs(1)).unwrap();
		let second = store.touch("Sensor", "s1").unwrap();

		assert_eq!(first.token(), second.token());
		assert_eq!(second.generation(), first.generation() + 1);
		assert!(!first.same_instance(&second));
		// Both handles still read the same logical record.
		assert!(store.attributes(&first).is_ok());
	}

	#[test]
	fn relationships_resolve_live_handles() {
		let store = detector_schema();
		store.insert("Sensor", "s1", attrs(1)).unwrap();
		store.insert("PowerSupply", "ps-a", attrs(0)).unwrap();
		store.insert("PowerSupply", "ps-b", attrs(0)).unwrap();
		store
			.link_one("Sensor", "s1", "supply", Some(("PowerSupply", "ps-a")))
			.unwrap();
		store
			.link_many("Sensor", "s1", "backups", &[("PowerSupply", "ps-a"), ("PowerSupply", "ps-b")])
			.unwrap();

		let rec = store.fetch_record("Sensor", "s1", 0, None).unwrap();
		match store.relationship(&rec, "supply").unwrap() {
			RelValue::One(target) => assert_eq!(target.uid(), "ps-a"),
			other => panic!("expected One, got {other:?}"),
		}
		match store.relationship(&rec, "backups").unwrap() {
			RelValue::Many(targets) => {
				assert_eq!(targets.len(), 2);
				assert_eq!(targets[1].uid(), "ps-b");
			}
			other => panic!("expected Many, got {other:?}"),
		}
		assert!(store.relationship(&rec, "nope").is_err());
	}

	#[test]
	fn rename_relinks_references() {
		let store = detector_schema();
		store.insert("Sensor", "s1", attrs(1)).unwrap();
		store.insert("PowerSupply", "ps-a", attrs(0)).unwrap();
		store
			.link_one("Sensor", "s1", "supply", Some(("PowerSupply", "ps-a")))
			.unwrap();

		store.rename("PowerSupply", "ps-a", "ps-z").unwrap();
		let rec = store.fetch_record("Sensor", "s1", 0, None).unwrap();
		match store.relationship(&rec, "supply").unwrap() {
			RelValue::One(target) => assert_eq!(target.uid(), "ps-z"),
			other => panic!("expected One, got {other:?}"),
		}
	}
}
