//! An owned, namespace-aware in-memory tree implementing [`Host`].
//!
//! Mutations made through [`NodeRef`] are queued as [`MutationRecord`]s for each observer whose root contains
//! the mutation target, and delivered in batches by [`Document::flush`], which plays the role of a microtask checkpoint.
//!
//! ```
//! use xml_bindings_dom::memory::{Document, XMLNS_NAMESPACE};
//!
//! let document = Document::new();
//! let root = document.create_element_ns(Some("urn:example"), "ex:root");
//! root.set_attribute_ns(Some(XMLNS_NAMESPACE), "xmlns:ex", "urn:example").unwrap();
//! document.node().append_child(&root).unwrap();
//!
//! assert_eq!(document.document_element(), Some(root));
//! assert_eq!(document.lookup_prefix("urn:example").as_deref(), Some("ex"));
//! ```

mod node;
mod table;

pub use node::{Attr, NodeRef};
pub use table::WeakNodeTable;

use crate::{
	binding::BindingKey,
	error::HostError,
	host::{Host, MutationRecord, ObserveOptions},
};
use core::{
	any::Any,
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
};
use hashbrown::{hash_map::Entry, HashMap};
use node::NodeKind;
use std::rc::{Rc, Weak};
use tracing::trace;

/// The namespace of `xmlns` and `xmlns:*` attributes.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// The capability set applied by element bindings: any shared value, readable through [`NodeRef::extension_as`].
pub type Extension = Rc<dyn Any>;

type ObserverCallback = Box<dyn FnMut(Vec<MutationRecord<NodeRef>>)>;

/// A shared handle to an in-memory document. Clones refer to the same document.
#[derive(Clone)]
pub struct Document(pub(crate) Rc<DocumentShared>);

pub(crate) struct DocumentShared {
	node: NodeRef,
	observers: RefCell<Vec<Weak<ObserverSlot>>>,
	delivering: Cell<bool>,
	flat_aliases: RefCell<HashMap<String, BindingKey>>,
}

struct ObserverSlot {
	root: NodeRef,
	options: ObserveOptions,
	/// Roots of subtrees removed from the observed subtree since the last delivery.
	/// Mutations inside them are still reported until then, like the DOM's transient registered observers.
	transient: RefCell<Vec<NodeRef>>,
	queue: RefCell<Vec<MutationRecord<NodeRef>>>,
	callback: RefCell<ObserverCallback>,
}

/// Keeps a [`Document::observe`] subscription alive. Dropping it disconnects the observer.
pub struct MutationObserver(Rc<ObserverSlot>);
impl MutationObserver {
	/// Removes and returns records that weren't delivered yet.
	#[must_use]
	pub fn take_records(&self) -> Vec<MutationRecord<NodeRef>> {
		self.0.queue.take()
	}
}
impl Debug for MutationObserver {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("MutationObserver")
			.field("root", &self.0.root)
			.field("options", &self.0.options)
			.field("queued", &self.0.queue.borrow().len())
			.finish()
	}
}

impl Default for Document {
	fn default() -> Self {
		Self::new()
	}
}
impl Document {
	/// Creates an empty document.
	#[must_use]
	pub fn new() -> Self {
		Self(Rc::new_cyclic(|shared| DocumentShared {
			node: NodeRef::new(shared.clone(), NodeKind::Document),
			observers: RefCell::default(),
			delivering: Cell::new(false),
			flat_aliases: RefCell::default(),
		}))
	}

	/// The document node, root of the tree.
	#[must_use]
	pub fn node(&self) -> NodeRef {
		self.0.node.clone()
	}

	/// The first element child of the document node.
	#[must_use]
	pub fn document_element(&self) -> Option<NodeRef> {
		self.0.node.children().into_iter().find(NodeRef::is_element)
	}

	/// Creates a detached element. `qualified_name` may carry a prefix (`prefix:local`).
	#[must_use]
	pub fn create_element_ns(&self, namespace: Option<&str>, qualified_name: &str) -> NodeRef {
		NodeRef::new_element(Rc::downgrade(&self.0), namespace, qualified_name)
	}

	#[must_use]
	pub fn create_text_node(&self, data: &str) -> NodeRef {
		NodeRef::new_text(Rc::downgrade(&self.0), data)
	}

	/// The prefix the document element (or, failing that, nothing) binds to `namespace`.
	#[must_use]
	pub fn lookup_prefix(&self, namespace: &str) -> Option<String> {
		self.document_element()?.locate_prefix(namespace)
	}

	/// The element binding key defined for a flat alias name, if any.
	#[must_use]
	pub fn flat_alias(&self, name: &str) -> Option<BindingKey> {
		self.0.flat_aliases.borrow().get(name).cloned()
	}

	/// Subscribes `callback` to mutations of `root` (and its subtree, if requested).
	pub fn observe(&self, root: &NodeRef, options: ObserveOptions, callback: impl 'static + FnMut(Vec<MutationRecord<NodeRef>>)) -> MutationObserver {
		let slot = Rc::new(ObserverSlot {
			root: root.clone(),
			options,
			transient: RefCell::default(),
			queue: RefCell::default(),
			callback: RefCell::new(Box::new(callback)),
		});
		self.0.observers.borrow_mut().push(Rc::downgrade(&slot));
		MutationObserver(slot)
	}

	/// Delivers all queued mutation records, one batch per observer, until no observer has any left.
	///
	/// Records queued by the callbacks themselves are delivered in further rounds of the same call.
	/// Calls made from inside a callback return immediately, since the outer call delivers their records anyway.
	///
	/// Returns the number of records delivered.
	pub fn flush(&self) -> usize {
		if self.0.delivering.replace(true) {
			return 0;
		}
		let _guard = DeliveringGuard(&self.0.delivering);

		let mut delivered = 0;
		loop {
			let slots: Vec<Rc<ObserverSlot>> = self.0.observers.borrow().iter().filter_map(Weak::upgrade).collect();
			let mut any = false;
			for slot in slots {
				let records = slot.queue.take();
				if records.is_empty() {
					continue;
				}
				slot.transient.borrow_mut().clear();
				any = true;
				delivered += records.len();
				trace!("Delivering {} mutation record(s).", records.len());
				(slot.callback.borrow_mut())(records);
			}
			if !any {
				break;
			}
		}
		self.0.observers.borrow_mut().retain(|slot| slot.strong_count() > 0);
		delivered
	}
}
impl Debug for Document {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Document")
			.field("document_element", &self.document_element())
			.field("observers", &self.0.observers.borrow().iter().filter(|slot| slot.strong_count() > 0).count())
			.finish()
	}
}

struct DeliveringGuard<'a>(&'a Cell<bool>);
impl Drop for DeliveringGuard<'_> {
	fn drop(&mut self) {
		self.0.set(false);
	}
}

impl DocumentShared {
	/// Keeps `removed` observed by every subtree observer that covered `parent`.
	pub(crate) fn track_removal(&self, parent: &NodeRef, removed: &NodeRef) {
		let observers = self.observers.borrow();
		for slot in observers.iter().filter_map(Weak::upgrade) {
			if slot.options.subtree && slot.covers(parent) {
				slot.transient.borrow_mut().push(removed.clone());
			}
		}
	}

	pub(crate) fn queue(&self, record: &MutationRecord<NodeRef>) {
		let observers = self.observers.borrow();
		for slot in observers.iter().filter_map(Weak::upgrade) {
			if let Some(record) = slot.filter(record) {
				slot.queue.borrow_mut().push(record);
			}
		}
	}
}

impl ObserverSlot {
	fn covers(&self, node: &NodeRef) -> bool {
		self.root.is_inclusive_ancestor_of(node) || self.transient.borrow().iter().any(|removed| removed.is_inclusive_ancestor_of(node))
	}

	fn filter(&self, record: &MutationRecord<NodeRef>) -> Option<MutationRecord<NodeRef>> {
		let target = match record {
			MutationRecord::ChildList { target, .. } if self.options.child_list => target,
			MutationRecord::Attributes { target, .. } if self.options.attributes => target,
			_ => return None,
		};
		let in_scope = if self.options.subtree {
			self.covers(target)
		} else {
			self.root == *target
		};
		if !in_scope {
			return None;
		}

		match record {
			MutationRecord::Attributes {
				target,
				namespace,
				local_name,
				old_value: _,
			} if !self.options.attribute_old_value => Some(MutationRecord::Attributes {
				target: target.clone(),
				namespace: namespace.clone(),
				local_name: local_name.clone(),
				old_value: None,
			}),
			record => Some(record.clone()),
		}
	}
}

impl Host for Document {
	type Node = NodeRef;
	type Extension = Extension;
	type Observer = MutationObserver;
	type Table = WeakNodeTable;

	fn root(&self) -> NodeRef {
		self.node()
	}

	fn elements_by_name(&self, root: &NodeRef, namespace: &str, local_name: &str) -> Vec<NodeRef> {
		root.descendants().into_iter().filter(|node| node.is_named(namespace, local_name)).collect()
	}

	fn attribute_owners(&self, root: &NodeRef, namespace: &str, local_name: &str) -> Vec<NodeRef> {
		let mut owners = Vec::new();
		if root.has_attribute_ns(Some(namespace), local_name) {
			owners.push(root.clone());
		}
		owners.extend(root.descendants().into_iter().filter(|node| node.has_attribute_ns(Some(namespace), local_name)));
		owners
	}

	fn lookup_prefix(&self, namespace: &str) -> Option<String> {
		Document::lookup_prefix(self, namespace)
	}

	fn declared_attributes(&self) -> Vec<(String, String)> {
		self.document_element()
			.map(|element| element.attributes().into_iter().map(|attr| (attr.qualified_name(), attr.value)).collect())
			.unwrap_or_default()
	}

	fn is_element(&self, node: &NodeRef) -> bool {
		node.is_element()
	}

	fn element_name(&self, node: &NodeRef) -> Option<(Option<String>, String)> {
		node.local_name().map(|local_name| (node.namespace_uri(), local_name))
	}

	fn has_attribute(&self, node: &NodeRef, namespace: &str, local_name: &str) -> bool {
		node.has_attribute_ns(Some(namespace), local_name)
	}

	fn attribute_value(&self, node: &NodeRef, namespace: &str, local_name: &str) -> Option<String> {
		node.get_attribute_ns(Some(namespace), local_name)
	}

	fn apply_extension(&self, node: &NodeRef, extension: &Extension) {
		node.set_extension(extension.clone());
	}

	fn define_flat_alias(&self, name: &str, key: &BindingKey, _extension: Option<&Extension>) -> Result<(), HostError> {
		match self.0.flat_aliases.borrow_mut().entry(name.to_owned()) {
			Entry::Occupied(occupied) if occupied.get() != key => Err(HostError::Rejected(format!("{:?} is already defined for {}.", name, occupied.get()))),
			Entry::Occupied(_) => Ok(()),
			Entry::Vacant(vacant) => {
				vacant.insert(key.clone());
				Ok(())
			}
		}
	}

	fn observe(&self, root: &NodeRef, options: ObserveOptions, callback: Box<dyn FnMut(Vec<MutationRecord<NodeRef>>)>) -> Result<MutationObserver, HostError> {
		Ok(Document::observe(self, root, options, callback))
	}

	fn new_table(&self) -> WeakNodeTable {
		WeakNodeTable::new()
	}

	fn is_named(&self, node: &NodeRef, namespace: &str, local_name: &str) -> bool {
		node.is_named(namespace, local_name)
	}
}
