use crate::{
	binding::{BindingKind, RegisteredBinding},
	enumerate,
	host::{Host, MutationRecord},
	XmlBindings,
};
use std::rc::Rc;
use tracing::{debug, instrument, trace};

type Matches<H> = Vec<(Rc<RegisteredBinding<H>>, Vec<<H as Host>::Node>)>;

/*
	Every added node has to be searched recursively, since it's not possible to tell in advance
	whether its descendants will get their own mutation records:

	- After `parent.replace_children(vec![div])` with `div` already holding `child`,
	  `child` is only reachable through `div`.
	- After `parent.append_child(&div)` followed by `div.append_child(&child)`,
	  `child` is reported both through `div` and on its own.

	This means *nodes can be seen multiple times*, which the idempotent transitions absorb.
*/
impl<H: Host> XmlBindings<H> {
	/// Processes one mutation batch in delivery order.
	///
	/// This is what the installed observer calls, but feeding it records manually is fine too.
	#[instrument(skip_all, fields(records = records.len()))]
	pub fn reconcile(&self, records: &[MutationRecord<H::Node>]) {
		for record in records {
			match record {
				MutationRecord::ChildList { target: _, added, removed } => {
					for node in added.iter().filter(|node| self.host.is_element(node)) {
						self.attach_subtree(node);
					}
					for node in removed.iter().filter(|node| self.host.is_element(node)) {
						self.detach_subtree(node);
					}
				}
				MutationRecord::Attributes {
					target,
					namespace,
					local_name,
					old_value,
				} => self.attribute_changed(target, namespace.as_deref(), local_name, old_value.is_none()),
			}
		}

		let mut tracker = self.tracker.borrow_mut();
		tracker.prune::<H::Node>();
		if let (Some(conversions), Some(attachments)) = tracker.len_hint::<H::Node>() {
			debug!("Lifecycle records (conversions/attachments): {}/{}", conversions, attachments);
		}
	}

	/// Converts, then attaches, every node in the descendant-or-self subtree of `root` that matches a registered binding.
	///
	/// All conversions (element bindings first, then attribute bindings) happen before the first attachment.
	pub fn attach_subtree(&self, root: &H::Node) {
		let (elements, attributes) = self.subtree_matches(root);
		debug!("Attaching subtree: {} element and {} attribute binding(s) matched.", elements.len(), attributes.len());

		for (binding, nodes) in &elements {
			for node in nodes {
				self.convert_element(node, binding);
			}
		}
		for (binding, owners) in &attributes {
			for owner in owners {
				self.convert_attribute(owner, binding);
			}
		}

		for (binding, nodes) in &elements {
			for node in nodes {
				self.attach_element(node, binding);
			}
		}
		for (binding, owners) in &attributes {
			for owner in owners {
				self.attach_attribute(owner, binding);
			}
		}
	}

	/// Detaches every node in the descendant-or-self subtree of `root` that matches a registered binding.
	///
	/// Conversion records are left untouched.
	pub fn detach_subtree(&self, root: &H::Node) {
		let (elements, attributes) = self.subtree_matches(root);
		debug!("Detaching subtree: {} element and {} attribute binding(s) matched.", elements.len(), attributes.len());

		for (binding, nodes) in &elements {
			for node in nodes {
				self.detach_element(node, binding);
			}
		}
		for (binding, owners) in &attributes {
			for owner in owners {
				self.detach_attribute(owner, binding);
			}
		}
	}

	/// Only presence transitions matter. Value-only changes are ignored.
	fn attribute_changed(&self, target: &H::Node, namespace: Option<&str>, local_name: &str, was_absent: bool) {
		let namespace = match namespace {
			Some(namespace) => namespace,
			None => return,
		};
		let binding = self.registry.borrow().get(BindingKind::Attribute, namespace, local_name);
		let binding = match binding {
			Some(binding) => binding,
			None => return,
		};

		if self.host.has_attribute(target, namespace, local_name) {
			if was_absent {
				self.attach_attribute(target, &binding);
			} else {
				trace!("Value-only change of {}.", binding.key());
			}
		} else {
			self.detach_attribute(target, &binding);
		}
	}

	/// Enumerates once per registered binding, so that the conversion and attachment passes see the same nodes.
	fn subtree_matches(&self, root: &H::Node) -> (Matches<H>, Matches<H>) {
		let (element_bindings, attribute_bindings) = {
			let registry = self.registry.borrow();
			(registry.snapshot(BindingKind::Element), registry.snapshot(BindingKind::Attribute))
		};

		let elements = element_bindings
			.into_iter()
			.map(|binding| {
				let nodes = enumerate::matching_elements(&self.host, root, binding.key());
				(binding, nodes)
			})
			.filter(|(_, nodes)| !nodes.is_empty())
			.collect();
		let attributes = attribute_bindings
			.into_iter()
			.map(|binding| {
				let owners = enumerate::matching_attributes(&self.host, root, binding.key());
				(binding, owners)
			})
			.filter(|(_, owners)| !owners.is_empty())
			.collect();
		(elements, attributes)
	}
}
