use super::{Document, DocumentShared};
use crate::{error::TreeError, host::MutationRecord};
use core::{
	any::Any,
	cell::RefCell,
	fmt::{self, Debug, Formatter},
	hash::{Hash, Hasher},
};
use std::rc::{Rc, Weak};

/// A shared handle to one node of an in-memory [`Document`].
///
/// Equality and hashing are by identity. Children are held strongly and parents weakly,
/// so a detached subtree lives exactly as long as some handle into it.
#[derive(Clone)]
pub struct NodeRef(pub(crate) Rc<NodeData>);

pub(crate) struct NodeData {
	document: Weak<DocumentShared>,
	kind: NodeKind,
	parent: RefCell<Weak<NodeData>>,
	children: RefCell<Vec<NodeRef>>,
	attributes: RefCell<Vec<Attr>>,
	extension: RefCell<Option<Rc<dyn Any>>>,
}

pub(crate) enum NodeKind {
	Document,
	Element(QualifiedName),
	Text(RefCell<String>),
}

pub(crate) struct QualifiedName {
	namespace: Option<String>,
	prefix: Option<String>,
	local_name: String,
}
impl QualifiedName {
	fn parse(namespace: Option<&str>, qualified_name: &str) -> Self {
		let (prefix, local_name) = split_qualified_name(qualified_name);
		Self {
			namespace: namespace.filter(|namespace| !namespace.is_empty()).map(str::to_owned),
			prefix: prefix.map(str::to_owned),
			local_name: local_name.to_owned(),
		}
	}

	fn qualified(&self) -> String {
		match &self.prefix {
			Some(prefix) => format!("{}:{}", prefix, self.local_name),
			None => self.local_name.clone(),
		}
	}
}

fn split_qualified_name(qualified_name: &str) -> (Option<&str>, &str) {
	match qualified_name.split_once(':') {
		Some((prefix, local_name)) if !prefix.is_empty() && !local_name.is_empty() => (Some(prefix), local_name),
		_ => (None, qualified_name),
	}
}

/// One attribute of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
	pub namespace: Option<String>,
	pub prefix: Option<String>,
	pub local_name: String,
	pub value: String,
}
impl Attr {
	#[must_use]
	pub fn qualified_name(&self) -> String {
		match &self.prefix {
			Some(prefix) => format!("{}:{}", prefix, self.local_name),
			None => self.local_name.clone(),
		}
	}

	fn is(&self, namespace: Option<&str>, local_name: &str) -> bool {
		self.namespace.as_deref() == namespace.filter(|namespace| !namespace.is_empty()) && self.local_name == local_name
	}
}

impl NodeRef {
	pub(crate) fn new(document: Weak<DocumentShared>, kind: NodeKind) -> Self {
		Self(Rc::new(NodeData {
			document,
			kind,
			parent: RefCell::default(),
			children: RefCell::default(),
			attributes: RefCell::default(),
			extension: RefCell::default(),
		}))
	}

	pub(crate) fn new_element(document: Weak<DocumentShared>, namespace: Option<&str>, qualified_name: &str) -> Self {
		Self::new(document, NodeKind::Element(QualifiedName::parse(namespace, qualified_name)))
	}

	pub(crate) fn new_text(document: Weak<DocumentShared>, data: &str) -> Self {
		Self::new(document, NodeKind::Text(RefCell::new(data.to_owned())))
	}

	pub(crate) fn downgrade(&self) -> Weak<NodeData> {
		Rc::downgrade(&self.0)
	}

	pub(crate) fn as_ptr(&self) -> *const NodeData {
		Rc::as_ptr(&self.0)
	}

	#[must_use]
	pub fn is_element(&self) -> bool {
		matches!(self.0.kind, NodeKind::Element(_))
	}

	#[must_use]
	pub fn is_text(&self) -> bool {
		matches!(self.0.kind, NodeKind::Text(_))
	}

	#[must_use]
	pub fn is_document(&self) -> bool {
		matches!(self.0.kind, NodeKind::Document)
	}

	#[must_use]
	pub fn namespace_uri(&self) -> Option<String> {
		match &self.0.kind {
			NodeKind::Element(name) => name.namespace.clone(),
			NodeKind::Document | NodeKind::Text(_) => None,
		}
	}

	#[must_use]
	pub fn prefix(&self) -> Option<String> {
		match &self.0.kind {
			NodeKind::Element(name) => name.prefix.clone(),
			NodeKind::Document | NodeKind::Text(_) => None,
		}
	}

	#[must_use]
	pub fn local_name(&self) -> Option<String> {
		match &self.0.kind {
			NodeKind::Element(name) => Some(name.local_name.clone()),
			NodeKind::Document | NodeKind::Text(_) => None,
		}
	}

	pub(crate) fn is_named(&self, namespace: &str, local_name: &str) -> bool {
		match &self.0.kind {
			NodeKind::Element(name) => name.namespace.as_deref() == Some(namespace) && name.local_name == local_name,
			NodeKind::Document | NodeKind::Text(_) => false,
		}
	}

	/// The text of a text node.
	#[must_use]
	pub fn data(&self) -> Option<String> {
		match &self.0.kind {
			NodeKind::Text(data) => Some(data.borrow().clone()),
			NodeKind::Document | NodeKind::Element(_) => None,
		}
	}

	#[must_use]
	pub fn owner_document(&self) -> Option<Document> {
		self.0.document.upgrade().map(Document)
	}

	#[must_use]
	pub fn parent(&self) -> Option<NodeRef> {
		self.0.parent.borrow().upgrade().map(NodeRef)
	}

	#[must_use]
	pub fn children(&self) -> Vec<NodeRef> {
		self.0.children.borrow().clone()
	}

	/// All descendants in document order, excluding `self`.
	#[must_use]
	pub fn descendants(&self) -> Vec<NodeRef> {
		let mut found = Vec::new();
		let mut stack: Vec<NodeRef> = self.children().into_iter().rev().collect();
		while let Some(node) = stack.pop() {
			stack.extend(node.children().into_iter().rev());
			found.push(node);
		}
		found
	}

	#[must_use]
	pub fn is_inclusive_ancestor_of(&self, other: &NodeRef) -> bool {
		let mut current = Some(other.clone());
		while let Some(node) = current {
			if node == *self {
				return true;
			}
			current = node.parent();
		}
		false
	}

	/// Whether this node is in its document's tree.
	#[must_use]
	pub fn is_connected(&self) -> bool {
		self.owner_document().map_or(false, |document| document.node().is_inclusive_ancestor_of(self))
	}

	/// # Errors
	///
	/// See [`insert_before`](`NodeRef::insert_before`).
	pub fn append_child(&self, child: &NodeRef) -> Result<(), TreeError> {
		self.insert_before(child, None)
	}

	/// Inserts `child` before `reference`, or at the end if `reference` is [`None`].
	///
	/// `child` is removed from its current parent first.
	///
	/// # Errors
	///
	/// - [`TreeError::InvalidNodeType`] iff `self` can't have children or `child` is a document.
	/// - [`TreeError::HierarchyRequest`] iff `child` is an inclusive ancestor of `self`.
	/// - [`TreeError::NotFound`] iff `reference` isn't a child of `self`.
	pub fn insert_before(&self, child: &NodeRef, reference: Option<&NodeRef>) -> Result<(), TreeError> {
		self.validate_insertion(child)?;
		if let Some(reference) = reference {
			if reference.parent().as_ref() != Some(self) {
				return Err(TreeError::NotFound);
			}
		}

		let reference = match reference {
			Some(reference) if reference == child => reference.next_sibling(),
			reference => reference.cloned(),
		};
		child.detach_from_parent();

		{
			let mut children = self.0.children.borrow_mut();
			let index = reference
				.and_then(|reference| children.iter().position(|c| *c == reference))
				.unwrap_or(children.len());
			children.insert(index, child.clone());
		}
		*child.0.parent.borrow_mut() = self.downgrade();

		self.queue(MutationRecord::ChildList {
			target: self.clone(),
			added: vec![child.clone()],
			removed: vec![],
		});
		Ok(())
	}

	/// # Errors
	///
	/// [`TreeError::NotFound`] iff `child` isn't a child of `self`.
	pub fn remove_child(&self, child: &NodeRef) -> Result<NodeRef, TreeError> {
		if child.parent().as_ref() != Some(self) {
			return Err(TreeError::NotFound);
		}
		child.detach_from_parent();
		Ok(child.clone())
	}

	/// Removes this node from its parent, if it has one.
	pub fn remove(&self) {
		self.detach_from_parent();
	}

	/// Replaces all children at once, reported as a single mutation record (like assigning `innerHTML`).
	///
	/// Like the DOM's `replaceChildren`, `nodes` are first removed from their current parents (including `self`),
	/// which is reported separately. A node listed more than once ends up at its last position.
	///
	/// # Errors
	///
	/// Like [`insert_before`](`NodeRef::insert_before`). Nothing is changed on error.
	pub fn replace_children(&self, nodes: Vec<NodeRef>) -> Result<(), TreeError> {
		for node in &nodes {
			self.validate_insertion(node)?;
		}
		let mut added: Vec<NodeRef> = Vec::with_capacity(nodes.len());
		for node in nodes.into_iter().rev() {
			if !added.contains(&node) {
				added.push(node);
			}
		}
		added.reverse();

		for node in &added {
			node.detach_from_parent();
		}

		let removed = self.0.children.replace(added.clone());
		for old in &removed {
			*old.0.parent.borrow_mut() = Weak::new();
			self.track_removal(old);
		}
		for node in &added {
			*node.0.parent.borrow_mut() = self.downgrade();
		}

		if !removed.is_empty() || !added.is_empty() {
			self.queue(MutationRecord::ChildList {
				target: self.clone(),
				added,
				removed,
			});
		}
		Ok(())
	}

	/// Sets a namespaced attribute. `qualified_name` may carry a prefix.
	///
	/// # Errors
	///
	/// [`TreeError::InvalidNodeType`] iff `self` isn't an element.
	pub fn set_attribute_ns(&self, namespace: Option<&str>, qualified_name: &str, value: &str) -> Result<(), TreeError> {
		if !self.is_element() {
			return Err(TreeError::InvalidNodeType);
		}
		let name = QualifiedName::parse(namespace, qualified_name);
		self.set_attribute_inner(name, value);
		Ok(())
	}

	/// Sets an attribute without namespace. `name` is taken verbatim as local name, even if it contains a colon,
	/// which is how HTML parsers treat `xmlns:prefix` declarations.
	///
	/// # Errors
	///
	/// [`TreeError::InvalidNodeType`] iff `self` isn't an element.
	pub fn set_attribute(&self, name: &str, value: &str) -> Result<(), TreeError> {
		if !self.is_element() {
			return Err(TreeError::InvalidNodeType);
		}
		let name = QualifiedName {
			namespace: None,
			prefix: None,
			local_name: name.to_owned(),
		};
		self.set_attribute_inner(name, value);
		Ok(())
	}

	fn set_attribute_inner(&self, name: QualifiedName, value: &str) {
		let old_value = {
			let mut attributes = self.0.attributes.borrow_mut();
			match attributes.iter_mut().find(|attr| attr.is(name.namespace.as_deref(), &name.local_name)) {
				Some(existing) => Some(core::mem::replace(&mut existing.value, value.to_owned())),
				None => {
					attributes.push(Attr {
						namespace: name.namespace.clone(),
						prefix: name.prefix.clone(),
						local_name: name.local_name.clone(),
						value: value.to_owned(),
					});
					None
				}
			}
		};

		self.queue(MutationRecord::Attributes {
			target: self.clone(),
			namespace: name.namespace,
			local_name: name.local_name,
			old_value,
		});
	}

	/// Returns the removed value, if the attribute was present.
	pub fn remove_attribute_ns(&self, namespace: Option<&str>, local_name: &str) -> Option<String> {
		let removed = {
			let mut attributes = self.0.attributes.borrow_mut();
			let index = attributes.iter().position(|attr| attr.is(namespace, local_name))?;
			attributes.remove(index)
		};

		self.queue(MutationRecord::Attributes {
			target: self.clone(),
			namespace: removed.namespace,
			local_name: removed.local_name,
			old_value: Some(removed.value.clone()),
		});
		Some(removed.value)
	}

	#[must_use]
	pub fn get_attribute_ns(&self, namespace: Option<&str>, local_name: &str) -> Option<String> {
		self.0
			.attributes
			.borrow()
			.iter()
			.find(|attr| attr.is(namespace, local_name))
			.map(|attr| attr.value.clone())
	}

	#[must_use]
	pub fn has_attribute_ns(&self, namespace: Option<&str>, local_name: &str) -> bool {
		self.0.attributes.borrow().iter().any(|attr| attr.is(namespace, local_name))
	}

	#[must_use]
	pub fn attributes(&self) -> Vec<Attr> {
		self.0.attributes.borrow().clone()
	}

	/// The extension most recently applied by a binding, if any.
	#[must_use]
	pub fn extension(&self) -> Option<Rc<dyn Any>> {
		self.0.extension.borrow().clone()
	}

	/// [`extension`](`NodeRef::extension`), downcast to `T`.
	#[must_use]
	pub fn extension_as<T: 'static>(&self) -> Option<Rc<T>> {
		self.extension().and_then(|extension| extension.downcast::<T>().ok())
	}

	pub(crate) fn set_extension(&self, extension: Rc<dyn Any>) {
		*self.0.extension.borrow_mut() = Some(extension);
	}

	/// The prefix this element or its ancestors bind to `namespace`.
	pub(crate) fn locate_prefix(&self, namespace: &str) -> Option<String> {
		let mut current = Some(self.clone());
		while let Some(element) = current.filter(NodeRef::is_element) {
			if element.namespace_uri().as_deref() == Some(namespace) {
				if let Some(prefix) = element.prefix() {
					return Some(prefix);
				}
			}
			let declared = element
				.0
				.attributes
				.borrow()
				.iter()
				.find(|attr| attr.prefix.as_deref() == Some("xmlns") && attr.value == namespace)
				.map(|attr| attr.local_name.clone());
			if declared.is_some() {
				return declared;
			}
			current = element.parent();
		}
		None
	}

	/// `prefix:local` for elements, or just `local` without prefix.
	#[must_use]
	pub fn qualified_name(&self) -> Option<String> {
		match &self.0.kind {
			NodeKind::Element(name) => Some(name.qualified()),
			NodeKind::Document | NodeKind::Text(_) => None,
		}
	}

	fn next_sibling(&self) -> Option<NodeRef> {
		let parent = self.parent()?;
		let children = parent.0.children.borrow();
		let index = children.iter().position(|c| c == self)?;
		children.get(index + 1).cloned()
	}

	fn validate_insertion(&self, child: &NodeRef) -> Result<(), TreeError> {
		if self.is_text() || child.is_document() {
			return Err(TreeError::InvalidNodeType);
		}
		if child.is_inclusive_ancestor_of(self) {
			return Err(TreeError::HierarchyRequest);
		}
		Ok(())
	}

	fn detach_from_parent(&self) {
		let parent = match self.parent() {
			Some(parent) => parent,
			None => return,
		};
		parent.0.children.borrow_mut().retain(|c| c != self);
		*self.0.parent.borrow_mut() = Weak::new();
		parent.track_removal(self);

		parent.queue(MutationRecord::ChildList {
			target: parent.clone(),
			added: vec![],
			removed: vec![self.clone()],
		});
	}

	fn track_removal(&self, removed: &NodeRef) {
		if let Some(document) = self.0.document.upgrade() {
			document.track_removal(self, removed);
		}
	}

	fn queue(&self, record: MutationRecord<NodeRef>) {
		if let Some(document) = self.0.document.upgrade() {
			document.queue(&record);
		}
	}
}
impl PartialEq for NodeRef {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}
impl Eq for NodeRef {}
impl Hash for NodeRef {
	fn hash<S: Hasher>(&self, state: &mut S) {
		self.as_ptr().hash(state);
	}
}
impl Debug for NodeRef {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match &self.0.kind {
			NodeKind::Document => f.write_str("#document"),
			NodeKind::Element(name) => match &name.namespace {
				Some(namespace) => write!(f, "<{} xmlns={:?}>", name.qualified(), namespace),
				None => write!(f, "<{}>", name.qualified()),
			},
			NodeKind::Text(data) => {
				if cfg!(feature = "dangerous-logging") {
					write!(f, "#text {:?}", data.borrow())
				} else {
					f.write_str("#text")
				}
			}
		}
	}
}
