use std::rc::Rc;
use xml_bindings_dom::{memory::Document, Binding, BindingKey, Host, HostError, Options, RegistrationError, XmlBindings};

use recorder_::{document_with_root, init_tracing, item, Event, Recorder, ValueRecorder, X, XHTML};

const A: &str = "urn:example:a";

#[test]
fn existing_nodes_are_handled_before_returning() {
	init_tracing();
	let (document, root) = document_with_root();
	let (f, g) = (item(&document), item(&document));
	root.append_child(&f).unwrap();
	f.append_child(&g).unwrap();

	let bindings = XmlBindings::new(document);
	let recorder = Recorder::default();
	let id = bindings.register_element(X, "item", recorder.binding()).unwrap();

	assert_eq!(
		recorder.events(),
		vec![Event::Initialize(f.clone()), Event::Initialize(g.clone()), Event::Attach(f.clone()), Event::Attach(g.clone())]
	);
	assert_eq!(bindings.element_conversion(&f), Some(id));
	assert_eq!(bindings.element_conversion(&g), Some(id));
	assert_eq!(bindings.element_binding(X, "item").map(|binding| binding.id()), Some(id));
}

#[test]
fn existing_attributes_are_handled_before_returning() {
	let (document, root) = document_with_root();
	let (f, g) = (item(&document), item(&document));
	f.set_attribute_ns(Some(A), "a:flag", "f").unwrap();
	g.set_attribute_ns(Some(A), "a:flag", "g").unwrap();
	root.append_child(&f).unwrap();
	f.append_child(&g).unwrap();

	let bindings = XmlBindings::new(document);
	let values = ValueRecorder::default();
	let id = bindings.register_attribute(A, "flag", values.binding()).unwrap();

	assert_eq!(
		values.events(),
		vec![
			("initialize", Some("f".to_owned())),
			("initialize", Some("g".to_owned())),
			("attach", Some("f".to_owned())),
			("attach", Some("g".to_owned())),
		]
	);
	for owner in [&f, &g] {
		assert_eq!(bindings.attribute_conversion(owner, A, "flag"), Some(id));
		assert!(bindings.is_attribute_attached(owner, A, "flag"));
	}
	assert_eq!(bindings.attribute_binding(A, "flag").map(|binding| binding.id()), Some(id));
}

#[test]
fn document_element_matches() {
	let (document, root) = document_with_root();
	let bindings = XmlBindings::new(document);
	let recorder = Recorder::default();
	bindings.register_element(X, "root", recorder.binding()).unwrap();

	assert_eq!(recorder.events(), vec![Event::Initialize(root.clone()), Event::Attach(root)]);
}

#[test]
fn malformed_keys_are_rejected() {
	let (document, _) = document_with_root();
	let bindings = XmlBindings::new(document);

	for (namespace, local_name) in [("", "item"), (X, ""), (X, "x:item"), (X, "1item"), (X, "two words")] {
		assert!(matches!(
			bindings.register_element(namespace, local_name, Recorder::default().binding()),
			Err(RegistrationError::InvalidArgument(_))
		));
		assert!(matches!(
			bindings.register_attribute(namespace, local_name, Recorder::default().binding()),
			Err(RegistrationError::InvalidArgument(_))
		));
	}
	assert!(!bindings.is_observing());
	assert!(bindings.element_binding(X, "x:item").is_none());
}

#[test]
fn observer_is_installed_on_first_registration() {
	let (document, _) = document_with_root();
	let bindings = XmlBindings::new(document);
	assert!(!bindings.is_observing());

	bindings.register_attribute(A, "flag", Binding::<Document>::new()).unwrap();
	assert!(bindings.is_observing());
}

#[test]
fn dropping_the_runtime_stops_deliveries() {
	let (document, root) = document_with_root();
	let bindings = XmlBindings::new(document.clone());
	let recorder = Recorder::default();
	bindings.register_element(X, "item", recorder.binding()).unwrap();
	drop(bindings);

	root.append_child(&item(&document)).unwrap();
	assert_eq!(document.flush(), 0);
	assert!(recorder.events().is_empty());
}

#[test]
fn callbacks_may_register_bindings() {
	let (document, root) = document_with_root();
	let other = document.create_element_ns(Some(X), "x:other");
	root.append_child(&item(&document)).unwrap();
	root.append_child(&other).unwrap();

	let bindings = XmlBindings::new(document);
	let recorder = Recorder::default();
	let binding = Binding::<Document>::new().on_initialize({
		let bindings = Rc::downgrade(&bindings);
		let recorder = recorder.clone();
		move |_| {
			let bindings = bindings.upgrade().ok_or("runtime dropped")?;
			bindings.register_element(X, "other", recorder.binding())?;
			Ok(())
		}
	});
	bindings.register_element(X, "item", binding).unwrap();

	assert_eq!(recorder.events(), vec![Event::Initialize(other.clone()), Event::Attach(other.clone())]);
	assert!(bindings.is_element_attached(&other));
}

#[test]
fn flat_aliases_use_the_declared_prefix() {
	let (document, _) = document_with_root();
	let bindings = XmlBindings::new(document.clone());
	bindings.register_element(X, "item", Binding::<Document>::new()).unwrap();

	assert_eq!(document.flat_alias("x-item"), Some(BindingKey::new(X, "item")));
}

#[test]
fn flat_aliases_fall_back_to_plain_xmlns_attributes() {
	let document = Document::new();
	let html = document.create_element_ns(Some(XHTML), "html");
	html.set_attribute("xmlns:ex", A).unwrap();
	document.node().append_child(&html).unwrap();
	assert_eq!(document.lookup_prefix(A), None);

	let bindings = XmlBindings::new(document.clone());
	bindings.register_element(A, "widget", Binding::<Document>::new()).unwrap();

	assert_eq!(document.flat_alias("ex-widget"), Some(BindingKey::new(A, "widget")));
}

#[test]
fn flat_aliases_need_a_prefix() {
	let (document, _) = document_with_root();
	let bindings = XmlBindings::new(document.clone());
	bindings.register_element(A, "widget", Binding::<Document>::new()).unwrap();

	assert_eq!(document.flat_alias("a-widget"), None);
	assert_eq!(document.flat_alias("-widget"), None);
}

#[test]
fn flat_aliases_can_be_disabled() {
	let (document, _) = document_with_root();
	let bindings = XmlBindings::with_options(document.clone(), Options::new().flat_aliases(false));
	bindings.register_element(X, "item", Binding::<Document>::new()).unwrap();

	assert!(!bindings.options().flat_aliases);
	assert_eq!(document.flat_alias("x-item"), None);
}

#[test]
fn conflicting_flat_aliases_are_rejected() {
	let (document, _) = document_with_root();
	let bindings = XmlBindings::new(document.clone());
	bindings.register_element(X, "item", Binding::<Document>::new()).unwrap();

	assert_eq!(Host::define_flat_alias(&document, "x-item", &BindingKey::new(X, "item"), None), Ok(()));
	assert!(matches!(
		Host::define_flat_alias(&document, "x-item", &BindingKey::new(A, "item"), None),
		Err(HostError::Rejected(_))
	));
	assert_eq!(document.flat_alias("x-item"), Some(BindingKey::new(X, "item")));
}
