//! The seam between the lifecycle runtime and the tree it is attached to.
//!
//! A [`Host`] provides namespace-qualified element and attribute lookup, a mutation notification mechanism
//! and a [`WeakTable`] implementation that associates lifecycle records with its nodes without keeping them alive.
//!
//! Two hosts ship with this crate: the in-memory [`memory::Document`](`crate::memory::Document`)
//! and [`web::WebHost`](`crate::web::WebHost`) for a browser [***Document***](https://developer.mozilla.org/en-US/docs/Web/API/Document).

use crate::{binding::BindingKey, error::HostError, BindingId};
use core::fmt::Debug;

/// A tree substrate the runtime can observe and query.
pub trait Host: 'static {
	/// A cheap, cloneable handle with stable identity.
	type Node: Clone + Debug + 'static;

	/// The capability set an element binding applies to its matching nodes during conversion.
	type Extension: Clone + 'static;

	/// Keeps a mutation subscription alive. Dropping it should stop deliveries.
	type Observer;

	type Table: WeakTable<Self::Node>;

	/// The node that represents the whole tree (a document).
	fn root(&self) -> Self::Node;

	/// All **descendant** elements of `root` (excluding `root` itself) in document order
	/// whose namespace and local name match.
	fn elements_by_name(&self, root: &Self::Node, namespace: &str, local_name: &str) -> Vec<Self::Node>;

	/// The owner elements of all attributes with this namespace and local name,
	/// found anywhere in the descendant-or-self subtree of `root`.
	///
	/// `root` may be a document or an element.
	fn attribute_owners(&self, root: &Self::Node, namespace: &str, local_name: &str) -> Vec<Self::Node>;

	/// The prefix the tree currently associates with `namespace`, if any.
	fn lookup_prefix(&self, namespace: &str) -> Option<String>;

	/// `(qualified name, value)` of each attribute on the document element.
	fn declared_attributes(&self) -> Vec<(String, String)>;

	fn is_element(&self, node: &Self::Node) -> bool;

	/// `(namespace, local name)` if `node` is an element.
	fn element_name(&self, node: &Self::Node) -> Option<(Option<String>, String)>;

	fn has_attribute(&self, node: &Self::Node, namespace: &str, local_name: &str) -> bool;

	fn attribute_value(&self, node: &Self::Node, namespace: &str, local_name: &str) -> Option<String>;

	fn apply_extension(&self, node: &Self::Node, extension: &Self::Extension);

	/// Exposes an element binding under a non-namespaced name, for consumers that only understand those.
	///
	/// # Errors
	///
	/// Iff the host has no such mechanism or refuses the name.
	fn define_flat_alias(&self, name: &str, key: &BindingKey, extension: Option<&Self::Extension>) -> Result<(), HostError>;

	/// Subscribes `callback` to mutation batches below `root`.
	///
	/// # Errors
	///
	/// Iff the subscription could not be created.
	fn observe(&self, root: &Self::Node, options: ObserveOptions, callback: Box<dyn FnMut(Vec<MutationRecord<Self::Node>>)>) -> Result<Self::Observer, HostError>;

	fn new_table(&self) -> Self::Table;

	/// Whether `node` is an element with exactly this namespace and local name.
	fn is_named(&self, node: &Self::Node, namespace: &str, local_name: &str) -> bool {
		matches!(self.element_name(node), Some((Some(ns), local)) if ns == namespace && local == local_name)
	}
}

/// What a lifecycle record is about.
#[derive(Debug)]
pub enum Target<'a, N> {
	Element(&'a N),
	/// An attribute, identified through its owner element since attributes
	/// are not independently observable in every host.
	Attribute(&'a N, &'a BindingKey),
}
// Not derived, which would require `N: Copy`.
impl<N> Clone for Target<'_, N> {
	fn clone(&self) -> Self {
		*self
	}
}
impl<N> Copy for Target<'_, N> {}

/// A weakly-keyed association from [`Target`]s to [`BindingId`]s.
///
/// Implementations must not extend the lifetime of any node.
pub trait WeakTable<N> {
	fn get(&self, target: Target<'_, N>) -> Option<BindingId>;

	/// Returns the previous value.
	fn insert(&mut self, target: Target<'_, N>, binding: BindingId) -> Option<BindingId>;

	/// Returns the previous value.
	fn remove(&mut self, target: Target<'_, N>) -> Option<BindingId>;

	/// Drops records of nodes that don't exist anymore and returns how many were dropped.
	fn prune(&mut self) -> usize {
		0
	}

	/// The number of records currently held, if known.
	fn len_hint(&self) -> Option<usize> {
		None
	}
}

/// One entry of a mutation batch.
#[derive(Debug, Clone)]
pub enum MutationRecord<N> {
	/// Children of `target` were inserted and/or removed.
	ChildList { target: N, added: Vec<N>, removed: Vec<N> },
	/// An attribute on `target` was set or removed. `old_value` is [`None`] iff it was absent before.
	Attributes {
		target: N,
		namespace: Option<String>,
		local_name: String,
		old_value: Option<String>,
	},
}

/// Which mutations a [`Host::observe`] subscription reports.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserveOptions {
	pub child_list: bool,
	pub subtree: bool,
	pub attributes: bool,
	pub attribute_old_value: bool,
}
impl ObserveOptions {
	/// Everything the reconciler needs: structural changes and attribute presence, in the whole subtree.
	pub const RECONCILER: Self = Self {
		child_list: true,
		subtree: true,
		attributes: true,
		attribute_old_value: true,
	};
}
