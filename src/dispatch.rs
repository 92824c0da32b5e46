//! Idempotent lifecycle transitions.
//!
//! Each transition consults the [`Tracker`](`crate::tracker::Tracker`) first and only invokes the user callback
//! if the record actually changes, which makes repeated delivery of the same logical event harmless.
//! Records are updated even if the callback fails.

use crate::{
	binding::{BindingKey, Hook, RegisteredBinding, Subject},
	host::{Host, Target},
	XmlBindings,
};
use tracing::{trace, trace_span, warn};

impl<H: Host> XmlBindings<H> {
	/// Initializes `node` with `binding`, unless it already was initialized with this exact binding.
	///
	/// The binding's extension is applied before its `on_initialize` callback runs.
	pub fn convert_element(&self, node: &H::Node, binding: &RegisteredBinding<H>) {
		if !self.tracker.borrow_mut().mark_converted(Target::Element(node), binding.id()) {
			return;
		}
		trace!("Converting element with {}.", binding.key());

		if let Some(extension) = binding.extension() {
			self.host.apply_extension(node, extension);
		}
		invoke(binding, Hook::Initialize, &Subject::Element(node.clone()));
	}

	/// Converts `node` if necessary, then attaches it unless it is already attached.
	pub fn attach_element(&self, node: &H::Node, binding: &RegisteredBinding<H>) {
		self.convert_element(node, binding);
		if !self.tracker.borrow_mut().mark_attached(Target::Element(node), binding.id()) {
			return;
		}
		trace!("Attaching element with {}.", binding.key());

		invoke(binding, Hook::Attach, &Subject::Element(node.clone()));
	}

	/// Detaches `node` if it is attached.
	///
	/// `on_detach` runs while the node still counts as attached.
	pub fn detach_element(&self, node: &H::Node, binding: &RegisteredBinding<H>) {
		if self.tracker.borrow().attachment(Target::Element(node)).is_none() {
			return;
		}
		trace!("Detaching element with {}.", binding.key());

		invoke(binding, Hook::Detach, &Subject::Element(node.clone()));
		self.tracker.borrow_mut().clear_attached(Target::Element(node));
	}

	/// Like [`convert_element`](`XmlBindings::convert_element`), for the attribute named by `binding` on `owner`.
	pub fn convert_attribute(&self, owner: &H::Node, binding: &RegisteredBinding<H>) {
		let key = binding.key();
		if !self.tracker.borrow_mut().mark_converted(Target::Attribute(owner, key), binding.id()) {
			return;
		}
		trace!("Converting attribute {}.", key);

		invoke(binding, Hook::Initialize, &self.attribute_subject(owner, key));
	}

	pub fn attach_attribute(&self, owner: &H::Node, binding: &RegisteredBinding<H>) {
		self.convert_attribute(owner, binding);
		let key = binding.key();
		if !self.tracker.borrow_mut().mark_attached(Target::Attribute(owner, key), binding.id()) {
			return;
		}
		trace!("Attaching attribute {}.", key);

		invoke(binding, Hook::Attach, &self.attribute_subject(owner, key));
	}

	pub fn detach_attribute(&self, owner: &H::Node, binding: &RegisteredBinding<H>) {
		let key = binding.key();
		if self.tracker.borrow().attachment(Target::Attribute(owner, key)).is_none() {
			return;
		}
		trace!("Detaching attribute {}.", key);

		invoke(binding, Hook::Detach, &self.attribute_subject(owner, key));
		self.tracker.borrow_mut().clear_attached(Target::Attribute(owner, key));
	}

	fn attribute_subject(&self, owner: &H::Node, key: &BindingKey) -> Subject<H::Node> {
		Subject::Attribute {
			owner: owner.clone(),
			name: key.clone(),
			value: self.host.attribute_value(owner, key.namespace(), key.local_name()),
		}
	}
}

fn invoke<H: Host>(binding: &RegisteredBinding<H>, hook: Hook, subject: &Subject<H::Node>) {
	let callback = match binding.callback(hook) {
		Some(callback) => callback,
		None => return,
	};

	let span = trace_span!("Invoking", %hook, binding = %binding.key());
	let _enter = span.enter();
	if let Err(error) = callback(subject) {
		match subject {
			// Attribute values are page content.
			Subject::Attribute { value, .. } if cfg!(feature = "dangerous-logging") => {
				warn!("{} of {} failed for {:?} (value {:?}): {}", hook, binding.key(), subject.node(), value, error);
			}
			Subject::Element(node) | Subject::Attribute { owner: node, .. } => {
				warn!("{} of {} failed for {:?}: {}", hook, binding.key(), node, error);
			}
		}
	}
}
