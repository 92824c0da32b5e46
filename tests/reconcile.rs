use xml_bindings_dom::{
	memory::{Document, NodeRef},
	MutationRecord, XmlBindings,
};

use recorder_::{document_with_root, init_tracing, item, Event, Recorder, ValueRecorder, X, XHTML};

const A: &str = "urn:example:a";

fn div(document: &Document) -> NodeRef {
	document.create_element_ns(Some(XHTML), "div")
}

#[test]
fn nested_insertions_are_reported_once() {
	init_tracing();
	let (document, root) = document_with_root();
	let bindings = XmlBindings::new(document.clone());
	let recorder = Recorder::default();
	bindings.register_element(X, "item", recorder.binding()).unwrap();

	// The item is reachable through both records.
	let container = div(&document);
	let node = item(&document);
	root.append_child(&container).unwrap();
	container.append_child(&node).unwrap();
	assert_eq!(document.flush(), 2);

	assert_eq!(recorder.events(), vec![Event::Initialize(node.clone()), Event::Attach(node)]);
}

#[test]
fn repeated_batches_are_absorbed() {
	let (document, root) = document_with_root();
	let bindings = XmlBindings::new(document.clone());
	let recorder = Recorder::default();
	bindings.register_element(X, "item", recorder.binding()).unwrap();

	let node = item(&document);
	root.append_child(&node).unwrap();
	let records = vec![MutationRecord::ChildList {
		target: root.clone(),
		added: vec![node.clone()],
		removed: vec![],
	}];
	bindings.reconcile(&records);
	bindings.reconcile(&records);
	document.flush();

	assert_eq!(recorder.initialized(&node), 1);
	assert_eq!(recorder.attached(&node), 1);
}

#[test]
fn removal_detaches_once() {
	let (document, root) = document_with_root();
	let node = item(&document);
	let container = div(&document);
	container.append_child(&node).unwrap();
	root.append_child(&container).unwrap();

	let bindings = XmlBindings::new(document.clone());
	let recorder = Recorder::default();
	let id = bindings.register_element(X, "item", recorder.binding()).unwrap();
	recorder.clear();

	container.remove();
	document.flush();

	assert_eq!(recorder.events(), vec![Event::Detach(node.clone())]);
	assert!(!bindings.is_element_attached(&node));
	assert_eq!(bindings.element_conversion(&node), Some(id));
}

#[test]
fn moves_detach_then_attach() {
	let (document, root) = document_with_root();
	let (from, to) = (div(&document), div(&document));
	let node = item(&document);
	from.append_child(&node).unwrap();
	root.append_child(&from).unwrap();
	root.append_child(&to).unwrap();

	let bindings = XmlBindings::new(document.clone());
	let recorder = Recorder::default();
	bindings.register_element(X, "item", recorder.binding()).unwrap();
	recorder.clear();

	to.append_child(&node).unwrap();
	document.flush();

	assert_eq!(recorder.events(), vec![Event::Detach(node.clone()), Event::Attach(node.clone())]);
	assert!(bindings.is_element_attached(&node));
}

#[test]
fn replaced_children_are_searched_recursively() {
	let (document, root) = document_with_root();
	let old = item(&document);
	root.append_child(&old).unwrap();

	let bindings = XmlBindings::new(document.clone());
	let recorder = Recorder::default();
	bindings.register_element(X, "item", recorder.binding()).unwrap();
	recorder.clear();

	// Assembled outside the tree, so there is no record for `new` itself.
	let container = div(&document);
	let new = item(&document);
	container.append_child(&new).unwrap();
	root.replace_children(vec![container]).unwrap();
	assert_eq!(document.flush(), 1);

	assert_eq!(recorder.events(), vec![Event::Initialize(new.clone()), Event::Attach(new), Event::Detach(old)]);
}

#[test]
fn subtrees_are_converted_before_attachment() {
	let (document, root) = document_with_root();
	let bindings = XmlBindings::new(document.clone());
	let recorder = Recorder::default();
	bindings.register_element(X, "item", recorder.binding()).unwrap();

	let container = div(&document);
	let (a, b) = (item(&document), item(&document));
	container.append_child(&a).unwrap();
	container.append_child(&b).unwrap();
	root.append_child(&container).unwrap();
	document.flush();

	assert_eq!(
		recorder.events(),
		vec![Event::Initialize(a.clone()), Event::Initialize(b.clone()), Event::Attach(a), Event::Attach(b)]
	);
}

#[test]
fn text_nodes_are_skipped() {
	let (document, root) = document_with_root();
	let bindings = XmlBindings::new(document.clone());
	let recorder = Recorder::default();
	bindings.register_element(X, "item", recorder.binding()).unwrap();
	bindings.register_attribute(A, "flag", ValueRecorder::default().binding()).unwrap();

	let text = document.create_text_node("item");
	root.append_child(&text).unwrap();
	text.remove();
	assert_eq!(document.flush(), 2);

	assert!(recorder.events().is_empty());
	assert_eq!(bindings.element_conversion(&text), None);
}

#[test]
fn attributes_follow_presence() {
	init_tracing();
	let (document, root) = document_with_root();
	let node = item(&document);
	root.append_child(&node).unwrap();

	let bindings = XmlBindings::new(document.clone());
	let values = ValueRecorder::default();
	bindings.register_attribute(A, "flag", values.binding()).unwrap();
	assert!(values.events().is_empty());

	node.set_attribute_ns(Some(A), "a:flag", "1").unwrap();
	document.flush();
	assert!(bindings.is_attribute_attached(&node, A, "flag"));

	node.set_attribute_ns(Some(A), "a:flag", "2").unwrap();
	document.flush();

	node.remove_attribute_ns(Some(A), "flag");
	document.flush();
	assert!(!bindings.is_attribute_attached(&node, A, "flag"));

	node.set_attribute_ns(Some(A), "a:flag", "3").unwrap();
	document.flush();

	assert_eq!(
		values.events(),
		vec![
			("initialize", Some("1".to_owned())),
			("attach", Some("1".to_owned())),
			("detach", None),
			("attach", Some("3".to_owned())),
		]
	);
}

#[test]
fn unnamespaced_attributes_are_ignored() {
	let (document, root) = document_with_root();
	let bindings = XmlBindings::new(document.clone());
	let values = ValueRecorder::default();
	bindings.register_attribute(A, "flag", values.binding()).unwrap();

	root.set_attribute("flag", "1").unwrap();
	document.flush();

	assert!(values.events().is_empty());
	assert_eq!(bindings.attribute_conversion(&root, A, "flag"), None);
}

#[test]
fn attributes_arrive_with_their_owner() {
	let (document, root) = document_with_root();
	let bindings = XmlBindings::new(document.clone());
	let values = ValueRecorder::default();
	let id = bindings.register_attribute(A, "flag", values.binding()).unwrap();

	let container = div(&document);
	let node = item(&document);
	container.set_attribute_ns(Some(A), "a:flag", "outer").unwrap();
	node.set_attribute_ns(Some(A), "a:flag", "inner").unwrap();
	container.append_child(&node).unwrap();
	root.append_child(&container).unwrap();
	document.flush();

	assert_eq!(bindings.attribute_conversion(&container, A, "flag"), Some(id));
	assert_eq!(bindings.attribute_conversion(&node, A, "flag"), Some(id));
	assert_eq!(
		values.events(),
		vec![
			("initialize", Some("outer".to_owned())),
			("initialize", Some("inner".to_owned())),
			("attach", Some("outer".to_owned())),
			("attach", Some("inner".to_owned())),
		]
	);

	container.remove();
	document.flush();
	assert!(!bindings.is_attribute_attached(&container, A, "flag"));
	assert!(!bindings.is_attribute_attached(&node, A, "flag"));
}

#[test]
fn callback_mutations_are_delivered_in_the_same_flush() {
	init_tracing();
	let (document, root) = document_with_root();
	let bindings = XmlBindings::new(document.clone());
	let recorder = Recorder::default();

	// Every item grows one item child, up to a depth of three.
	let binding = recorder.binding().on_attach({
		let document = document.clone();
		move |subject| {
			let node = subject.node();
			let depth = std::iter::successors(node.parent(), NodeRef::parent).filter(|ancestor| ancestor.local_name().as_deref() == Some("item")).count();
			if depth < 2 && node.children().is_empty() {
				node.append_child(&item(&document))?;
			}
			Ok(())
		}
	});
	bindings.register_element(X, "item", binding).unwrap();

	let top = item(&document);
	root.append_child(&top).unwrap();
	document.flush();

	let middle = top.children().pop().unwrap();
	let bottom = middle.children().pop().unwrap();
	assert!(bottom.children().is_empty());
	for node in [&top, &middle, &bottom] {
		assert!(bindings.is_element_attached(node));
		assert_eq!(recorder.initialized(node), 1);
	}
	assert_eq!(document.flush(), 0);
}

#[test]
fn subtrees_can_be_processed_manually() {
	let (document, _) = document_with_root();
	let bindings = XmlBindings::new(document.clone());
	let recorder = Recorder::default();
	bindings.register_element(X, "item", recorder.binding()).unwrap();

	// Never inserted, so only the manual passes see it.
	let container = div(&document);
	let node = item(&document);
	container.append_child(&node).unwrap();

	bindings.attach_subtree(&container);
	bindings.attach_subtree(&container);
	bindings.detach_subtree(&container);
	assert_eq!(document.flush(), 0);

	assert_eq!(recorder.events(), vec![Event::Initialize(node.clone()), Event::Attach(node.clone()), Event::Detach(node)]);
}

#[test]
fn removals_inside_removed_subtrees_are_delivered() {
	let (document, root) = document_with_root();
	let container = div(&document);
	let node = item(&document);
	container.append_child(&node).unwrap();
	root.append_child(&container).unwrap();

	let bindings = XmlBindings::new(document.clone());
	let recorder = Recorder::default();
	bindings.register_element(X, "item", recorder.binding()).unwrap();
	recorder.clear();

	// By the time this batch is reconciled, `node` isn't under `container` anymore.
	container.remove();
	node.remove();
	assert_eq!(document.flush(), 2);
	assert_eq!(recorder.events(), vec![Event::Detach(node.clone())]);
	assert!(!bindings.is_element_attached(&node));

	root.append_child(&node).unwrap();
	document.flush();
	assert_eq!(recorder.events(), vec![Event::Detach(node.clone()), Event::Attach(node.clone())]);

	// Only until the next delivery.
	recorder.clear();
	container.append_child(&item(&document)).unwrap();
	assert_eq!(document.flush(), 0);
	assert!(recorder.events().is_empty());
}

#[test]
fn attribute_removals_after_owner_removal_are_delivered() {
	let (document, root) = document_with_root();
	let node = item(&document);
	node.set_attribute_ns(Some(A), "a:flag", "1").unwrap();
	root.append_child(&node).unwrap();

	let bindings = XmlBindings::new(document.clone());
	let values = ValueRecorder::default();
	bindings.register_attribute(A, "flag", values.binding()).unwrap();

	node.remove();
	node.remove_attribute_ns(Some(A), "flag");
	document.flush();
	assert!(!bindings.is_attribute_attached(&node, A, "flag"));

	node.set_attribute_ns(Some(A), "a:flag", "2").unwrap();
	root.append_child(&node).unwrap();
	document.flush();
	assert!(bindings.is_attribute_attached(&node, A, "flag"));

	assert_eq!(
		values.events(),
		vec![
			("initialize", Some("1".to_owned())),
			("attach", Some("1".to_owned())),
			("detach", None),
			("attach", Some("2".to_owned())),
		]
	);
}

#[test]
fn replacing_with_a_current_child_detaches_and_reattaches_it() {
	let (document, root) = document_with_root();
	let (kept, dropped) = (item(&document), item(&document));
	root.append_child(&kept).unwrap();
	root.append_child(&dropped).unwrap();

	let bindings = XmlBindings::new(document.clone());
	let recorder = Recorder::default();
	bindings.register_element(X, "item", recorder.binding()).unwrap();
	recorder.clear();

	root.replace_children(vec![kept.clone()]).unwrap();
	assert_eq!(document.flush(), 2);

	assert_eq!(recorder.events(), vec![Event::Detach(kept.clone()), Event::Attach(kept.clone()), Event::Detach(dropped.clone())]);
	assert!(bindings.is_element_attached(&kept));
	assert!(!bindings.is_element_attached(&dropped));
}

#[test]
fn replacing_with_duplicates_keeps_the_last_position() {
	let (document, root) = document_with_root();
	let (a, b) = (item(&document), item(&document));

	root.replace_children(vec![a.clone(), b.clone(), a.clone()]).unwrap();

	assert_eq!(root.children(), vec![b, a]);
}
