use crate::{
	binding::{Binding, BindingId, BindingKey, BindingKind, RegisteredBinding},
	error::RegistrationError,
	host::Host,
};
use core::{
	fmt::{self, Debug, Formatter},
	hash::{Hash, Hasher},
};
use hashbrown::{Equivalent, HashMap};
use std::rc::Rc;
use tracing::warn;

/// Element and attribute bindings of one runtime, keyed by [`BindingKey`].
///
/// At most one binding is held per key and kind. Inserting an existing key replaces the previous binding.
pub struct Registry<H: Host> {
	elements: HashMap<BindingKey, Rc<RegisteredBinding<H>>>,
	attributes: HashMap<BindingKey, Rc<RegisteredBinding<H>>>,
	next_id: u32,
}
impl<H: Host> Default for Registry<H> {
	fn default() -> Self {
		Self::new()
	}
}
impl<H: Host> Registry<H> {
	#[must_use]
	pub fn new() -> Self {
		Self {
			elements: HashMap::new(),
			attributes: HashMap::new(),
			next_id: 0,
		}
	}

	/// # Errors
	///
	/// Iff `namespace` is empty or `local_name` is not an XML NCName.
	pub fn insert(&mut self, kind: BindingKind, namespace: &str, local_name: &str, definition: Binding<H>) -> Result<Rc<RegisteredBinding<H>>, RegistrationError> {
		validate_key(namespace, local_name)?;
		let key = BindingKey::new(namespace, local_name);

		let id = BindingId(self.next_id);
		self.next_id = self.next_id.checked_add(1).ok_or_else(|| RegistrationError::InvalidArgument("Too many registrations.".to_owned()))?;

		let registered = Rc::new(RegisteredBinding::new(id, kind, key.clone(), definition));
		if let Some(replaced) = self.table_mut(kind).insert(key, registered.clone()) {
			warn!("Replaced {:?} binding {} (#{}) with #{}.", kind, replaced.key(), replaced.id().get(), id.get());
		}
		Ok(registered)
	}

	#[must_use]
	pub fn get(&self, kind: BindingKind, namespace: &str, local_name: &str) -> Option<Rc<RegisteredBinding<H>>> {
		// Avoids allocating a key for each lookup, which happens for every attribute mutation.
		self.table(kind).get(&KeyRef(namespace, local_name)).cloned()
	}

	/// A snapshot of all bindings of `kind`, so that callbacks may register more while it is processed.
	#[must_use]
	pub fn snapshot(&self, kind: BindingKind) -> Vec<Rc<RegisteredBinding<H>>> {
		self.table(kind).values().cloned().collect()
	}

	#[must_use]
	pub fn len(&self, kind: BindingKind) -> usize {
		self.table(kind).len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.elements.is_empty() && self.attributes.is_empty()
	}

	fn table(&self, kind: BindingKind) -> &HashMap<BindingKey, Rc<RegisteredBinding<H>>> {
		match kind {
			BindingKind::Element => &self.elements,
			BindingKind::Attribute => &self.attributes,
		}
	}

	fn table_mut(&mut self, kind: BindingKind) -> &mut HashMap<BindingKey, Rc<RegisteredBinding<H>>> {
		match kind {
			BindingKind::Element => &mut self.elements,
			BindingKind::Attribute => &mut self.attributes,
		}
	}
}
impl<H: Host> Debug for Registry<H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Registry")
			.field("elements", &self.elements.keys().collect::<Vec<_>>())
			.field("attributes", &self.attributes.keys().collect::<Vec<_>>())
			.field("next_id", &self.next_id)
			.finish()
	}
}

/// Hashes exactly like [`BindingKey`].
struct KeyRef<'a>(&'a str, &'a str);
impl Hash for KeyRef<'_> {
	fn hash<S: Hasher>(&self, state: &mut S) {
		self.0.hash(state);
		self.1.hash(state);
	}
}
impl Equivalent<BindingKey> for KeyRef<'_> {
	fn equivalent(&self, key: &BindingKey) -> bool {
		self.0 == key.namespace() && self.1 == key.local_name()
	}
}

fn validate_key(namespace: &str, local_name: &str) -> Result<(), RegistrationError> {
	if namespace.is_empty() {
		return Err(RegistrationError::InvalidArgument("The namespace must not be empty.".to_owned()));
	}
	if !is_nc_name(local_name) {
		return Err(RegistrationError::InvalidArgument(format!("{:?} is not a valid local name.", local_name)));
	}
	Ok(())
}

/// XML 1.0 (Fifth Edition) `NCName`: a `Name` without colons.
pub(crate) fn is_nc_name(name: &str) -> bool {
	let mut chars = name.chars();
	chars.next().map_or(false, is_name_start_char) && chars.all(is_name_char)
}

fn is_name_start_char(c: char) -> bool {
	matches!(c,
		'A'..='Z' | '_' | 'a'..='z'
		| '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}'
		| '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' | '\u{200C}'..='\u{200D}'
		| '\u{2070}'..='\u{218F}' | '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}'
		| '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' | '\u{10000}'..='\u{EFFFF}'
	)
}

fn is_name_char(c: char) -> bool {
	is_name_start_char(c) || matches!(c, '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}
