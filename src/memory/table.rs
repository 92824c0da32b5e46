use super::node::{NodeData, NodeRef};
use crate::{
	binding::{BindingId, BindingKey},
	host::{Target, WeakTable},
};
use core::fmt::{self, Debug, Formatter};
use hashbrown::HashMap;
use std::rc::Weak;

/// Below this size, [`WeakNodeTable::prune`] doesn't bother scanning.
const PRUNE_FLOOR: usize = 64;

type Key = (*const NodeData, Option<BindingKey>);

/// A [`WeakTable`] for [`NodeRef`]s.
///
/// Entries are keyed by node address and hold a [`Weak`] reference to their node.
/// The [`Weak`] keeps the allocation (but not the node) alive, so an address can't be reused
/// by a different node while its entry exists. Entries of dropped nodes are removed by [`prune`](`WeakNodeTable::prune`).
#[derive(Default)]
pub struct WeakNodeTable {
	entries: HashMap<Key, (Weak<NodeData>, BindingId)>,
	/// Size after the last pruning pass. Pruning is skipped until the table has doubled since.
	watermark: usize,
}
impl WeakNodeTable {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Removes all entries of dropped nodes, regardless of table size.
	pub fn drain_expired(&mut self) -> usize {
		let before = self.entries.len();
		self.entries.retain(|_, (node, _)| node.strong_count() > 0);
		self.watermark = self.entries.len();
		before - self.entries.len()
	}

	fn key(target: Target<'_, NodeRef>) -> Key {
		match target {
			Target::Element(node) => (node.as_ptr(), None),
			Target::Attribute(owner, name) => (owner.as_ptr(), Some(name.clone())),
		}
	}

	fn node(target: Target<'_, NodeRef>) -> &NodeRef {
		match target {
			Target::Element(node) | Target::Attribute(node, _) => node,
		}
	}
}
impl WeakTable<NodeRef> for WeakNodeTable {
	fn get(&self, target: Target<'_, NodeRef>) -> Option<BindingId> {
		self.entries.get(&Self::key(target)).map(|&(_, binding)| binding)
	}

	fn insert(&mut self, target: Target<'_, NodeRef>, binding: BindingId) -> Option<BindingId> {
		let node = Self::node(target).downgrade();
		self.entries.insert(Self::key(target), (node, binding)).map(|(_, previous)| previous)
	}

	fn remove(&mut self, target: Target<'_, NodeRef>) -> Option<BindingId> {
		self.entries.remove(&Self::key(target)).map(|(_, previous)| previous)
	}

	fn prune(&mut self) -> usize {
		if self.entries.len() < PRUNE_FLOOR.max(self.watermark * 2) {
			return 0;
		}
		self.drain_expired()
	}

	fn len_hint(&self) -> Option<usize> {
		Some(self.entries.len())
	}
}
impl Debug for WeakNodeTable {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("WeakNodeTable")
			.field("len", &self.entries.len())
			.field("watermark", &self.watermark)
			.finish()
	}
}
