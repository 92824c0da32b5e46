//! [`Host`] for a browser [***Document***](https://developer.mozilla.org/en-US/docs/Web/API/Document).
//!
//! Elements are found through [***getElementsByTagNameNS***](https://developer.mozilla.org/en-US/docs/Web/API/Document/getElementsByTagNameNS),
//! attributes through a [DOM3 XPath](https://developer.mozilla.org/en-US/docs/Web/API/Document/evaluate) query
//! and mutations through a [***MutationObserver***](https://developer.mozilla.org/en-US/docs/Web/API/MutationObserver).
//!
//! Extensions are prototype objects that are spliced into matching elements' prototype chain.
//! Flat aliases are defined through `document.registerElement` where the page provides it (for example through a polyfill).

use crate::{
	binding::{BindingId, BindingKey},
	error::HostError,
	host::{Host, MutationRecord, ObserveOptions, Target, WeakTable},
};
use core::fmt::{self, Debug, Formatter};
use js_sys::{Array, Function, Map, Object, Reflect, WeakMap};
use tracing::{error, trace};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{Document, Element, HtmlCollection, MutationObserver, MutationObserverInit, Node, NodeList};

/// Wraps the [`web_sys::Document`] the runtime is attached to.
#[derive(Debug, Clone)]
pub struct WebHost {
	document: Document,
}
impl WebHost {
	#[must_use]
	pub fn new(document: Document) -> Self {
		Self { document }
	}

	#[must_use]
	pub fn document(&self) -> &Document {
		&self.document
	}
}

/// Keeps the [`web_sys::MutationObserver`] and its callback alive. Disconnects on drop.
pub struct WebObserver {
	observer: MutationObserver,
	_callback: Closure<dyn FnMut(Array, JsValue)>,
}
impl Drop for WebObserver {
	fn drop(&mut self) {
		self.observer.disconnect();
		trace!("Disconnected mutation observer.");
	}
}
impl Debug for WebObserver {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("WebObserver").field("observer", &self.observer).finish_non_exhaustive()
	}
}

/// Lifecycle records in JavaScript [***WeakMap***](https://developer.mozilla.org/en-US/docs/Web/JavaScript/Reference/Global_Objects/WeakMap)s,
/// so that they are collected together with their nodes.
///
/// Attribute records are stored per owner element, in a [***Map***](https://developer.mozilla.org/en-US/docs/Web/JavaScript/Reference/Global_Objects/Map)
/// keyed by the attribute's [`BindingKey`] in Clark notation.
#[derive(Debug)]
pub struct JsWeakTable {
	elements: WeakMap,
	attributes: WeakMap,
}
impl Default for JsWeakTable {
	fn default() -> Self {
		Self {
			elements: WeakMap::new(),
			attributes: WeakMap::new(),
		}
	}
}
impl JsWeakTable {
	fn attribute_map(&self, owner: &Node) -> Option<Map> {
		self.attributes.get(owner.unchecked_ref::<Object>()).dyn_into::<Map>().ok()
	}
}
impl WeakTable<Node> for JsWeakTable {
	fn get(&self, target: Target<'_, Node>) -> Option<BindingId> {
		match target {
			Target::Element(node) => binding_id(&self.elements.get(node.unchecked_ref::<Object>())),
			Target::Attribute(owner, key) => self.attribute_map(owner).and_then(|map| binding_id(&map.get(&attribute_key(key)))),
		}
	}

	fn insert(&mut self, target: Target<'_, Node>, binding: BindingId) -> Option<BindingId> {
		let value = JsValue::from_f64(f64::from(binding.get()));
		match target {
			Target::Element(node) => {
				let key = node.unchecked_ref::<Object>();
				let previous = binding_id(&self.elements.get(key));
				self.elements.set(key, &value);
				previous
			}
			Target::Attribute(owner, key) => {
				let map = match self.attribute_map(owner) {
					Some(map) => map,
					None => {
						let map = Map::new();
						self.attributes.set(owner.unchecked_ref::<Object>(), &map);
						map
					}
				};
				let key = attribute_key(key);
				let previous = binding_id(&map.get(&key));
				map.set(&key, &value);
				previous
			}
		}
	}

	fn remove(&mut self, target: Target<'_, Node>) -> Option<BindingId> {
		match target {
			Target::Element(node) => {
				let key = node.unchecked_ref::<Object>();
				let previous = binding_id(&self.elements.get(key));
				self.elements.delete(key);
				previous
			}
			Target::Attribute(owner, key) => {
				let map = self.attribute_map(owner)?;
				let key = attribute_key(key);
				let previous = binding_id(&map.get(&key));
				map.delete(&key);
				previous
			}
		}
	}
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn binding_id(value: &JsValue) -> Option<BindingId> {
	value.as_f64().map(|id| BindingId(id as u32))
}

fn attribute_key(key: &BindingKey) -> JsValue {
	JsValue::from_str(&key.to_string())
}

fn js_error(error: JsValue) -> HostError {
	HostError::Js(format!("{:?}", error))
}

impl Host for WebHost {
	type Node = Node;
	type Extension = Object;
	type Observer = WebObserver;
	type Table = JsWeakTable;

	fn root(&self) -> Node {
		self.document.clone().into()
	}

	fn elements_by_name(&self, root: &Node, namespace: &str, local_name: &str) -> Vec<Node> {
		let collection = if let Some(element) = root.dyn_ref::<Element>() {
			element.get_elements_by_tag_name_ns(Some(namespace), local_name)
		} else if let Some(document) = root.dyn_ref::<Document>() {
			document.get_elements_by_tag_name_ns(Some(namespace), local_name)
		} else {
			return Vec::new();
		};

		match collection {
			Ok(collection) => collect_elements(&collection),
			Err(error) => {
				error!("getElementsByTagNameNS failed: {:?}", error);
				Vec::new()
			}
		}
	}

	fn attribute_owners(&self, root: &Node, namespace: &str, local_name: &str) -> Vec<Node> {
		let document = match root.dyn_ref::<Document>() {
			Some(document) => document.clone(),
			None => match root.owner_document() {
				Some(document) => document,
				None => return Vec::new(),
			},
		};

		let expression = attribute_query(namespace, local_name);
		let result = match document.evaluate(&expression, root) {
			Ok(result) => result,
			Err(error) => {
				error!("Failed to evaluate {:?}: {:?}", expression, error);
				return Vec::new();
			}
		};

		// Materialized before returning: The iterator is invalidated by any later tree mutation.
		let mut owners = Vec::new();
		loop {
			match result.iterate_next() {
				Ok(Some(node)) => match node.dyn_into::<Element>() {
					Ok(owner) => owners.push(owner.into()),
					Err(node) => error!("Attribute query matched a non-element: {:?}", node),
				},
				Ok(None) => break,
				Err(error) => {
					error!("Attribute query iteration failed: {:?}", error);
					break;
				}
			}
		}
		owners
	}

	fn lookup_prefix(&self, namespace: &str) -> Option<String> {
		self.document.lookup_prefix(Some(namespace))
	}

	fn declared_attributes(&self) -> Vec<(String, String)> {
		let element = match self.document.document_element() {
			Some(element) => element,
			None => return Vec::new(),
		};
		let attributes = element.attributes();
		(0..attributes.length())
			.filter_map(|i| attributes.item(i))
			.map(|attr| (attr.name(), attr.value()))
			.collect()
	}

	fn is_element(&self, node: &Node) -> bool {
		node.node_type() == Node::ELEMENT_NODE
	}

	fn element_name(&self, node: &Node) -> Option<(Option<String>, String)> {
		node.dyn_ref::<Element>().map(|element| (element.namespace_uri(), element.local_name()))
	}

	fn has_attribute(&self, node: &Node, namespace: &str, local_name: &str) -> bool {
		node.dyn_ref::<Element>().map_or(false, |element| element.has_attribute_ns(Some(namespace), local_name))
	}

	fn attribute_value(&self, node: &Node, namespace: &str, local_name: &str) -> Option<String> {
		node.dyn_ref::<Element>().and_then(|element| element.get_attribute_ns(Some(namespace), local_name))
	}

	fn apply_extension(&self, node: &Node, extension: &Object) {
		Object::set_prototype_of(node.unchecked_ref::<Object>(), extension);
	}

	fn define_flat_alias(&self, name: &str, key: &BindingKey, extension: Option<&Object>) -> Result<(), HostError> {
		let register = Reflect::get(&self.document, &JsValue::from_str("registerElement")).map_err(js_error)?;
		let register = register
			.dyn_into::<Function>()
			.map_err(|_| HostError::Unsupported("`document.registerElement` is not available.".to_owned()))?;

		let definition = Object::new();
		if let Some(prototype) = extension {
			Reflect::set(&definition, &JsValue::from_str("prototype"), prototype).map_err(js_error)?;
		}
		register.call2(&self.document, &JsValue::from_str(name), &definition).map_err(js_error)?;
		trace!("Called `document.registerElement({:?}, …)` for {}.", name, key);
		Ok(())
	}

	fn observe(&self, root: &Node, options: ObserveOptions, mut callback: Box<dyn FnMut(Vec<MutationRecord<Node>>)>) -> Result<WebObserver, HostError> {
		let closure = Closure::wrap(Box::new(move |records: Array, _observer: JsValue| {
			let batch = records
				.iter()
				.filter_map(|record| record.dyn_into::<web_sys::MutationRecord>().ok())
				.filter_map(|record| convert_record(&record))
				.collect();
			callback(batch);
		}) as Box<dyn FnMut(Array, JsValue)>);

		let observer = MutationObserver::new(closure.as_ref().unchecked_ref::<Function>()).map_err(js_error)?;
		observer.observe_with_options(root, &observer_init(options)).map_err(js_error)?;
		Ok(WebObserver { observer, _callback: closure })
	}

	fn new_table(&self) -> JsWeakTable {
		JsWeakTable::default()
	}
}

#[allow(deprecated)]
fn observer_init(options: ObserveOptions) -> MutationObserverInit {
	let mut init = MutationObserverInit::new();
	init.child_list(options.child_list)
		.subtree(options.subtree)
		.attributes(options.attributes)
		.attribute_old_value(options.attribute_old_value);
	init
}

fn convert_record(record: &web_sys::MutationRecord) -> Option<MutationRecord<Node>> {
	let target = record.target()?;
	match record.type_().as_str() {
		"childList" => Some(MutationRecord::ChildList {
			target,
			added: collect_nodes(&record.added_nodes()),
			removed: collect_nodes(&record.removed_nodes()),
		}),
		"attributes" => Some(MutationRecord::Attributes {
			target,
			namespace: record.attribute_namespace(),
			local_name: record.attribute_name()?,
			old_value: record.old_value(),
		}),
		_ => None,
	}
}

fn collect_nodes(nodes: &NodeList) -> Vec<Node> {
	(0..nodes.length()).filter_map(|i| nodes.item(i)).collect()
}

fn collect_elements(elements: &HtmlCollection) -> Vec<Node> {
	(0..elements.length()).filter_map(|i| elements.item(i)).map(Node::from).collect()
}

/// Selects the owners of all attributes with this namespace and local name in the descendant-or-self subtree of the context node.
fn attribute_query(namespace: &str, local_name: &str) -> String {
	format!(
		"descendant-or-self::*[@*[namespace-uri()={}][local-name()={}]]",
		xpath_string_literal(namespace),
		xpath_string_literal(local_name)
	)
}

/// Quotes `value` as an XPath 1.0 string literal, which has no escape sequences.
#[must_use]
pub fn xpath_string_literal(value: &str) -> String {
	if !value.contains('"') {
		format!("\"{}\"", value)
	} else if !value.contains('\'') {
		format!("'{}'", value)
	} else {
		format!("concat(\"{}\")", value.replace('"', "\",'\"',\""))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn string_literals() {
		assert_eq!(xpath_string_literal("urn:x"), "\"urn:x\"");
		assert_eq!(xpath_string_literal("say \"hi\""), "'say \"hi\"'");
		assert_eq!(xpath_string_literal("it's \"quoted\""), "concat(\"it's \",'\"',\"quoted\",'\"',\"\")");
	}

	#[test]
	fn query_is_relative_to_the_context_node() {
		assert_eq!(
			attribute_query("urn:x", "flag"),
			"descendant-or-self::*[@*[namespace-uri()=\"urn:x\"][local-name()=\"flag\"]]"
		);
	}
}
