//! Class domain partitioning.
//!
//! Domains cluster the class hierarchy into inheritance-connected regions so
//! the cache can subdivide object identities: callers working with unrelated
//! classes never contend on the same cache region.

use std::collections::BTreeSet;

use confdal_core::{ConfigStore, Result};

/// Identifier of one class domain.
///
/// Ids index into the domain table they were built with; they are stable for
/// the lifetime of that table but carry no meaning across rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainId(pub u32);

impl DomainId {
	/// Index into the owning table's domain list.
	#[inline]
	pub fn index(self) -> usize {
		self.0 as usize
	}
}

/// Partitions all known classes into inheritance-connected clusters.
///
/// Seeds one candidate domain per root class (a class with no superclasses)
/// from the root plus its transitive subclass set, then merges every
/// previously accepted domain sharing at least one class with the candidate.
/// The result is a disjoint cover of the full class set: two classes land in
/// the same domain iff some inheritance path connects them, possibly through
/// a shared descendant under multiple inheritance.
///
/// O(roots × domains), which is fine for schemas of a few hundred classes.
pub fn find_class_domains(store: &dyn ConfigStore) -> Result<Vec<BTreeSet<String>>> {
	let mut seeds = Vec::new();
	for name in store.class_list() {
		let info = store.class_info(&name)?;
		if info.is_root() {
			seeds.push(info);
		}
	}

	let mut domains: Vec<BTreeSet<String>> = Vec::new();
	for info in seeds {
		let mut candidate: BTreeSet<String> = BTreeSet::new();
		candidate.insert(info.name.clone());
		candidate.extend(info.subclasses.iter().cloned());

		// A shared subclass connects this candidate to an already accepted
		// domain: fold that domain into the candidate and drop it.
		domains.retain(|domain| {
			if domain.iter().any(|class| candidate.contains(class)) {
				candidate.extend(domain.iter().cloned());
				false
			} else {
				true
			}
		});

		domains.push(candidate);
	}
	Ok(domains)
}
