#![cfg(target_arch = "wasm32")]

use std::{cell::RefCell, rc::Rc, sync::Once};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, HtmlBodyElement, Node};
use xml_bindings_dom::{web::WebHost, Binding, Host, XmlBindings};

wasm_bindgen_test_configure!(run_in_browser);

const X: &str = "urn:example:x";

static LOG_INITIALIZED: Once = Once::new();

fn init_tracing() {
	//TODO: Fail on Warning or Error.
	LOG_INITIALIZED.call_once(tracing_wasm::set_as_global_default);
}

#[wasm_bindgen_test]
fn existing_elements_and_attributes() {
	init_tracing();

	let document = window().unwrap().document().unwrap();
	let body = document.body().unwrap().dyn_into::<HtmlBodyElement>().unwrap();

	let element = document.create_element_ns(Some(X), "x:item").unwrap();
	let owner = document.create_element("div").unwrap();
	owner.set_attribute_ns(Some(X), "x:flag", "quote's \"here\"").unwrap();
	body.append_child(&element).unwrap();
	body.append_child(&owner).unwrap();

	let host = WebHost::new(document.clone());
	assert_eq!(host.attribute_owners(&body.clone().into(), X, "flag"), vec![Node::from(owner.clone())]);

	let seen = Rc::new(RefCell::new(Vec::new()));
	let bindings = XmlBindings::new(host);
	bindings
		.register_element(
			X,
			"item",
			Binding::<WebHost>::new().on_attach({
				let seen = Rc::clone(&seen);
				move |subject| {
					seen.borrow_mut().push(subject.node().clone());
					Ok(())
				}
			}),
		)
		.unwrap();
	bindings
		.register_attribute(
			X,
			"flag",
			Binding::<WebHost>::new().on_attach({
				let seen = Rc::clone(&seen);
				move |subject| {
					seen.borrow_mut().push(subject.node().clone());
					Ok(())
				}
			}),
		)
		.unwrap();

	assert!(bindings.is_observing());
	assert_eq!(*seen.borrow(), vec![Node::from(element.clone()), Node::from(owner.clone())]);
	assert!(bindings.is_element_attached(&element.clone().into()));
	assert!(bindings.is_attribute_attached(&owner.clone().into(), X, "flag"));

	element.remove();
	owner.remove();
}
