use crate::{
	binding::{Binding, BindingId, BindingKey, BindingKind, RegisteredBinding},
	enumerate,
	error::RegistrationError,
	host::{Host, MutationRecord, ObserveOptions, Target},
	registry::Registry,
	tracker::Tracker,
};
use core::{
	cell::RefCell,
	fmt::{self, Debug, Formatter},
};
use std::rc::{Rc, Weak};
use tracing::{debug, info, instrument, trace, warn};

/// Runtime configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
	/// Whether element bindings are also exposed as `prefix-local-name` through [`Host::define_flat_alias`].
	///
	/// Defaults to `true`.
	pub flat_aliases: bool,
}
impl Default for Options {
	fn default() -> Self {
		Self::new()
	}
}
impl Options {
	#[must_use]
	pub const fn new() -> Self {
		Self { flat_aliases: true }
	}

	#[must_use]
	pub const fn flat_aliases(mut self, flat_aliases: bool) -> Self {
		self.flat_aliases = flat_aliases;
		self
	}
}

/// Attached to one [`Host`] tree, this `struct` keeps every node matching a registered binding
/// converted and attached while it's in the tree, and detached once it leaves it.
///
/// Instances are always shared as [`Rc`], since the mutation observer installed on the host
/// refers back to them weakly. Dropping the last [`Rc`] drops the observer.
///
/// # Re-entrancy
///
/// No internal borrow is held while a lifecycle callback runs.
/// Callbacks may query lifecycle state, mutate the tree and register further bindings.
pub struct XmlBindings<H: Host> {
	pub(crate) tracker: RefCell<Tracker<H::Table>>,
	pub(crate) registry: RefCell<Registry<H>>,
	pub(crate) host: H,
	options: Options,
	observer: RefCell<Option<H::Observer>>,
	this: Weak<Self>,
}
impl<H: Host> XmlBindings<H> {
	#[must_use]
	pub fn new(host: H) -> Rc<Self> {
		Self::with_options(host, Options::default())
	}

	#[must_use]
	pub fn with_options(host: H, options: Options) -> Rc<Self> {
		Rc::new_cyclic(|this| Self {
			tracker: RefCell::new(Tracker::new(host.new_table(), host.new_table())),
			registry: RefCell::new(Registry::new()),
			host,
			options,
			observer: RefCell::new(None),
			this: this.clone(),
		})
	}

	/// Registers `binding` for elements in `namespace` named `local_name`.
	///
	/// Matching elements already in the tree are converted and attached before this method returns.
	/// Where a prefix for `namespace` is known, the binding is also exposed as `prefix-local_name`
	/// (see [`Options::flat_aliases`]).
	///
	/// The mutation observer is installed before that initial sweep (if it isn't yet),
	/// so tree changes made by callbacks during the sweep are reconciled once the host delivers them.
	///
	/// Registering the same key again replaces the previous binding.
	///
	/// # Errors
	///
	/// [`RegistrationError::InvalidArgument`] iff `namespace` is empty or `local_name` isn't an XML NCName.
	#[instrument(skip(self, binding))]
	pub fn register_element(&self, namespace: &str, local_name: &str, binding: Binding<H>) -> Result<BindingId, RegistrationError> {
		let binding = self.registry.borrow_mut().insert(BindingKind::Element, namespace, local_name, binding)?;
		self.ensure_observer();

		let matches = enumerate::matching_elements(&self.host, &self.host.root(), binding.key());
		for node in &matches {
			self.convert_element(node, &binding);
		}
		for node in &matches {
			self.attach_element(node, &binding);
		}
		info!("Registered element binding {} (#{}); {} element(s) already present.", binding.key(), binding.id().get(), matches.len());

		if self.options.flat_aliases {
			self.define_flat_alias(&binding);
		}
		Ok(binding.id())
	}

	/// Registers `binding` for attributes in `namespace` named `local_name`.
	///
	/// Matching attributes already in the tree are converted and attached before this method returns.
	///
	/// Registering the same key again replaces the previous binding.
	///
	/// # Errors
	///
	/// [`RegistrationError::InvalidArgument`] iff `namespace` is empty or `local_name` isn't an XML NCName.
	#[instrument(skip(self, binding))]
	pub fn register_attribute(&self, namespace: &str, local_name: &str, binding: Binding<H>) -> Result<BindingId, RegistrationError> {
		let binding = self.registry.borrow_mut().insert(BindingKind::Attribute, namespace, local_name, binding)?;
		self.ensure_observer();

		let owners = enumerate::matching_attributes(&self.host, &self.host.root(), binding.key());
		for owner in &owners {
			self.convert_attribute(owner, &binding);
		}
		for owner in &owners {
			self.attach_attribute(owner, &binding);
		}
		info!("Registered attribute binding {} (#{}); {} attribute(s) already present.", binding.key(), binding.id().get(), owners.len());
		Ok(binding.id())
	}

	#[must_use]
	pub fn element_binding(&self, namespace: &str, local_name: &str) -> Option<Rc<RegisteredBinding<H>>> {
		self.registry.borrow().get(BindingKind::Element, namespace, local_name)
	}

	#[must_use]
	pub fn attribute_binding(&self, namespace: &str, local_name: &str) -> Option<Rc<RegisteredBinding<H>>> {
		self.registry.borrow().get(BindingKind::Attribute, namespace, local_name)
	}

	/// The binding `node` was last converted with, if any.
	#[must_use]
	pub fn element_conversion(&self, node: &H::Node) -> Option<BindingId> {
		self.tracker.borrow().conversion(Target::Element(node))
	}

	#[must_use]
	pub fn is_element_attached(&self, node: &H::Node) -> bool {
		self.tracker.borrow().attachment(Target::Element(node)).is_some()
	}

	/// The binding the attribute on `owner` was last converted with, if any.
	#[must_use]
	pub fn attribute_conversion(&self, owner: &H::Node, namespace: &str, local_name: &str) -> Option<BindingId> {
		let key = BindingKey::new(namespace, local_name);
		self.tracker.borrow().conversion(Target::Attribute(owner, &key))
	}

	#[must_use]
	pub fn is_attribute_attached(&self, owner: &H::Node, namespace: &str, local_name: &str) -> bool {
		let key = BindingKey::new(namespace, local_name);
		self.tracker.borrow().attachment(Target::Attribute(owner, &key)).is_some()
	}

	/// Whether the reconciler is currently subscribed to the host's mutations.
	#[must_use]
	pub fn is_observing(&self) -> bool {
		self.observer.borrow().is_some()
	}

	#[must_use]
	pub fn host(&self) -> &H {
		&self.host
	}

	#[must_use]
	pub fn options(&self) -> Options {
		self.options
	}

	fn define_flat_alias(&self, binding: &RegisteredBinding<H>) {
		let key = binding.key();
		let prefix = match self.resolve_prefix(key.namespace()) {
			Some(prefix) => prefix,
			None => return debug!("No prefix is declared for {:?}; Skipping flat alias of {}.", key.namespace(), key),
		};

		let name = format!("{}-{}", prefix, key.local_name());
		match self.host.define_flat_alias(&name, key, binding.extension()) {
			Ok(()) => debug!("Defined flat alias {:?} for {}.", name, key),
			Err(error) => warn!("Failed to define flat alias {:?} for {}: {}", name, key, error),
		}
	}

	/// Falls back to the document element's `xmlns:*` attributes,
	/// which some hosts (HTML parsers in particular) don't treat as namespace declarations.
	fn resolve_prefix(&self, namespace: &str) -> Option<String> {
		if let Some(prefix) = self.host.lookup_prefix(namespace).filter(|prefix| !prefix.is_empty()) {
			return Some(prefix);
		}
		self.host.declared_attributes().into_iter().find_map(|(name, value)| {
			if value == namespace {
				name.strip_prefix("xmlns:").filter(|prefix| !prefix.is_empty()).map(str::to_owned)
			} else {
				None
			}
		})
	}

	fn ensure_observer(&self) {
		if self.observer.borrow().is_some() {
			return;
		}

		let this = self.this.clone();
		let callback = Box::new(move |records: Vec<MutationRecord<H::Node>>| match this.upgrade() {
			Some(this) => this.reconcile(&records),
			None => debug!("Runtime dropped. Ignoring {} mutation record(s).", records.len()),
		});

		match self.host.observe(&self.host.root(), ObserveOptions::RECONCILER, callback) {
			Ok(observer) => {
				trace!("Installed mutation observer.");
				*self.observer.borrow_mut() = Some(observer);
			}
			Err(error) => warn!("Failed to install the mutation observer (will retry on the next registration): {}", error),
		}
	}
}
impl<H: Host + Debug> Debug for XmlBindings<H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("XmlBindings")
			.field("host", &self.host)
			.field("options", &self.options)
			.field("registry", &self.registry)
			.field("observing", &self.is_observing())
			.finish_non_exhaustive()
	}
}
