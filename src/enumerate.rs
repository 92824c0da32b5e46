//! Materialized subtree queries.
//!
//! Results are collected into [`Vec`]s before any lifecycle callback runs,
//! since callbacks may mutate the tree and that mustn't invalidate the iteration.

use crate::{binding::BindingKey, host::Host};

/// The descendant-or-self elements of `root` named `key`, in document order.
pub fn matching_elements<H: Host>(host: &H, root: &H::Node, key: &BindingKey) -> Vec<H::Node> {
	let mut found = Vec::new();
	if host.is_named(root, key.namespace(), key.local_name()) {
		found.push(root.clone());
	}
	found.extend(host.elements_by_name(root, key.namespace(), key.local_name()));
	found
}

/// The owners of all attributes named `key` in the descendant-or-self subtree of `root`.
pub fn matching_attributes<H: Host>(host: &H, root: &H::Node, key: &BindingKey) -> Vec<H::Node> {
	host.attribute_owners(root, key.namespace(), key.local_name())
}
