use crate::{error::CallbackError, host::Host};
use core::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;

/// A `(namespace, local name)` pair.
///
/// Compared structurally, so `("ab", "c")` and `("a", "bc")` are distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingKey {
	namespace: Rc<str>,
	local_name: Rc<str>,
}
impl BindingKey {
	#[must_use]
	pub fn new(namespace: &str, local_name: &str) -> Self {
		Self {
			namespace: namespace.into(),
			local_name: local_name.into(),
		}
	}

	#[must_use]
	pub fn namespace(&self) -> &str {
		&self.namespace
	}

	#[must_use]
	pub fn local_name(&self) -> &str {
		&self.local_name
	}
}
/// Clark notation: `{namespace}local-name`.
impl Display for BindingKey {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{{{}}}{}", self.namespace, self.local_name)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
	Element,
	Attribute,
}

/// Identifies one registration within one [`XmlBindings`](`crate::XmlBindings`) instance.
///
/// Re-registering a key yields a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub(crate) u32);
impl BindingId {
	#[must_use]
	pub fn get(self) -> u32 {
		self.0
	}
}

/// The node a lifecycle callback is invoked for.
#[derive(Debug, Clone)]
pub enum Subject<N> {
	Element(N),
	Attribute {
		owner: N,
		name: BindingKey,
		/// Read from `owner` when the transition runs, so this is [`None`] during detachment after removal.
		value: Option<String>,
	},
}
impl<N> Subject<N> {
	/// The element itself or the attribute's owner.
	pub fn node(&self) -> &N {
		match self {
			Subject::Element(node) | Subject::Attribute { owner: node, .. } => node,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
	Initialize,
	Attach,
	Detach,
}
impl Display for Hook {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Hook::Initialize => "on_initialize",
			Hook::Attach => "on_attach",
			Hook::Detach => "on_detach",
		})
	}
}

pub type Callback<N> = Box<dyn Fn(&Subject<N>) -> Result<(), CallbackError>>;

/// Behavior for one custom element or custom attribute, before registration.
///
/// ```
/// use xml_bindings_dom::{memory::Document, Binding};
///
/// let binding = Binding::<Document>::new()
/// 	.on_attach(|subject| {
/// 		println!("attached: {:?}", subject.node());
/// 		Ok(())
/// 	});
/// # drop(binding);
/// ```
pub struct Binding<H: Host> {
	pub(crate) extension: Option<H::Extension>,
	pub(crate) on_initialize: Option<Callback<H::Node>>,
	pub(crate) on_attach: Option<Callback<H::Node>>,
	pub(crate) on_detach: Option<Callback<H::Node>>,
}
impl<H: Host> Default for Binding<H> {
	fn default() -> Self {
		Self::new()
	}
}
impl<H: Host> Binding<H> {
	#[must_use]
	pub fn new() -> Self {
		Self {
			extension: None,
			on_initialize: None,
			on_attach: None,
			on_detach: None,
		}
	}

	/// Applied to each matching element when it is converted. Ignored for attribute bindings.
	#[must_use]
	pub fn extension(mut self, extension: H::Extension) -> Self {
		self.extension = Some(extension);
		self
	}

	#[must_use]
	pub fn on_initialize(mut self, callback: impl 'static + Fn(&Subject<H::Node>) -> Result<(), CallbackError>) -> Self {
		self.on_initialize = Some(Box::new(callback));
		self
	}

	#[must_use]
	pub fn on_attach(mut self, callback: impl 'static + Fn(&Subject<H::Node>) -> Result<(), CallbackError>) -> Self {
		self.on_attach = Some(Box::new(callback));
		self
	}

	#[must_use]
	pub fn on_detach(mut self, callback: impl 'static + Fn(&Subject<H::Node>) -> Result<(), CallbackError>) -> Self {
		self.on_detach = Some(Box::new(callback));
		self
	}
}
impl<H: Host> Debug for Binding<H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Binding")
			.field("extension", &self.extension.is_some())
			.field("on_initialize", &self.on_initialize.is_some())
			.field("on_attach", &self.on_attach.is_some())
			.field("on_detach", &self.on_detach.is_some())
			.finish()
	}
}

/// A [`Binding`] as stored in the [`Registry`](`crate::registry::Registry`). Immutable.
pub struct RegisteredBinding<H: Host> {
	id: BindingId,
	kind: BindingKind,
	key: BindingKey,
	definition: Binding<H>,
}
impl<H: Host> RegisteredBinding<H> {
	pub(crate) fn new(id: BindingId, kind: BindingKind, key: BindingKey, definition: Binding<H>) -> Self {
		Self { id, kind, key, definition }
	}

	#[must_use]
	pub fn id(&self) -> BindingId {
		self.id
	}

	#[must_use]
	pub fn kind(&self) -> BindingKind {
		self.kind
	}

	#[must_use]
	pub fn key(&self) -> &BindingKey {
		&self.key
	}

	#[must_use]
	pub fn extension(&self) -> Option<&H::Extension> {
		match self.kind {
			BindingKind::Element => self.definition.extension.as_ref(),
			BindingKind::Attribute => None,
		}
	}

	pub(crate) fn callback(&self, hook: Hook) -> Option<&Callback<H::Node>> {
		match hook {
			Hook::Initialize => self.definition.on_initialize.as_ref(),
			Hook::Attach => self.definition.on_attach.as_ref(),
			Hook::Detach => self.definition.on_detach.as_ref(),
		}
	}
}
impl<H: Host> Debug for RegisteredBinding<H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("RegisteredBinding")
			.field("id", &self.id)
			.field("kind", &self.kind)
			.field("key", &self.key)
			.field("definition", &self.definition)
			.finish()
	}
}
